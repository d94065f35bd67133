//! Integration tests for the dialogforge generation backend

mod cli_flow;
mod control_flow;
mod counter_properties;
mod runner_pipeline;
mod test_utils;
