//! Identifier types shared across the store, pipeline, and CLI.

/// Generation job identifier (allocated by the store)
pub type JobId = u64;

/// Generator identifier
pub type GeneratorId = u64;

/// Dialog identifier
pub type DialogId = u64;

/// Project identifier (owned by the surrounding CRUD layer; opaque here)
pub type ProjectId = u64;

/// User identifier (owned by the surrounding CRUD layer; opaque here)
pub type UserId = u64;

