//! dialogforge: prompt-chain generation jobs
//!
//! Users define generators (ordered chains of prompt templates) and launch generation
//! jobs that call a chat-completion API repeatedly to produce candidate dialogs. Jobs
//! survive interruption: progress and elapsed time are committed per item, and a
//! stopped or failed job resumes where it left off.

pub mod cli;
pub mod config;
pub mod control;
pub mod dialog;
pub mod error;
pub mod generation;
pub mod generator;
pub mod job;
pub mod logging;
pub mod provider;
pub mod store;
pub mod types;
