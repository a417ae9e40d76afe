//! Retry classification for queued jobs.
//!
//! Job handlers return `anyhow::Result`. Wrapping an error in [`TaskError`]
//! tells the queue whether another attempt could succeed; unclassified errors
//! are treated as recoverable.

use std::fmt;

use crate::error::{AppError, ErrorMetadata};

#[derive(Debug)]
pub struct TaskError {
    recoverable: bool,
    source: anyhow::Error,
}

impl TaskError {
    pub fn recoverable(source: impl Into<anyhow::Error>) -> Self {
        Self {
            recoverable: true,
            source: source.into(),
        }
    }

    pub fn unrecoverable(source: impl Into<anyhow::Error>) -> Self {
        Self {
            recoverable: false,
            source: source.into(),
        }
    }

    /// Classify an [`AppError`] by its own metadata.
    pub fn from_app_error(err: AppError) -> Self {
        if err.is_recoverable() {
            Self::recoverable(err)
        } else {
            Self::unrecoverable(err)
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.recoverable
    }

    pub fn into_inner(self) -> anyhow::Error {
        self.source
    }

    /// Inspect an `anyhow::Error` returned by a handler.
    pub fn is_error_recoverable(err: &anyhow::Error) -> bool {
        if let Some(task_err) = err.downcast_ref::<TaskError>() {
            return task_err.recoverable;
        }
        if let Some(app_err) = err.downcast_ref::<AppError>() {
            return app_err.is_recoverable();
        }
        true
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl std::error::Error for TaskError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.source()
    }
}

/// Convenience conversions on results headed for the job queue.
pub trait TaskResultExt<T> {
    fn unrecoverable(self) -> Result<T, TaskError>;
    fn recoverable(self) -> Result<T, TaskError>;
}

impl<T, E> TaskResultExt<T> for Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn unrecoverable(self) -> Result<T, TaskError> {
        self.map_err(TaskError::unrecoverable)
    }

    fn recoverable(self) -> Result<T, TaskError> {
        self.map_err(TaskError::recoverable)
    }
}
