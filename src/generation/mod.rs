//! Generation pipeline: chain execution, retry policy, job runner, and dispatch.

pub mod chain;
pub mod dispatch;
pub mod retry;
pub mod runner;

pub use chain::{execute_chain, PLACEHOLDER};
pub use dispatch::{TaskDispatcher, TaskHandle, TokioDispatcher, Watch};
pub use retry::{classify, ErrorClass, RetryOutcome, RetryPolicy};
pub use runner::{CancelSignal, JobRunner, RunReport};
