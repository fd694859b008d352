// crates/resilience/src/lib.rs
//! Resilience patterns for calls to the metadata source and the search engine
//!
//! - Retry with exponential backoff for async operations
//! - Deadlines with cancellable pauses, used while waiting on indexing tasks
//! - Timeout and cancellation wrappers for single futures
//!
//! # Example
//!
//! ```rust
//! use bookshelf_resilience::{Deadline, RetryPolicy};
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::new(3).with_initial_delay(Duration::from_millis(100));
//! assert_eq!(policy.max_attempts(), 3);
//! ```

mod deadline;
mod error;
mod retry;

pub use deadline::{with_cancellation, with_timeout, Deadline, WaitOutcome};
pub use error::{ResilienceError, ResilienceResult};
pub use retry::{with_retry, RetryPolicy};
pub use tokio_util::sync::CancellationToken;
