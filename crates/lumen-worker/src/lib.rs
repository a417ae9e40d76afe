//! Lumen worker
//!
//! An in-process job queue: submissions are buffered on a bounded channel,
//! a dispatcher hands them to at most `max_workers` concurrent tasks, and each
//! submitter awaits its own job through a [`JobHandle`]. Recoverable failures
//! are retried with exponential backoff up to `max_attempts`.

pub mod context;
pub mod queue;

pub use context::{JobAttempt, JobHandler};
pub use queue::{compute_retry_backoff, JobHandle, QueueError, TaskQueue, TaskQueueConfig};
