//! Job handler trait
//!
//! The queue is generic over the work it runs. A handler receives the job
//! payload and the attempt it is running as; returning an error wrapped in
//! [`lumen_core::TaskError::unrecoverable`] stops further attempts.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Which attempt of a job is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobAttempt {
    pub job_id: Uuid,
    /// 1-based attempt number.
    pub number: u32,
    pub max_attempts: u32,
}

impl JobAttempt {
    /// No retry follows this attempt, whatever its outcome.
    pub fn is_last(&self) -> bool {
        self.number >= self.max_attempts
    }
}

#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    type Job: Send + Sync + 'static;
    type Output: Send + 'static;

    async fn handle(&self, job: &Self::Job, attempt: JobAttempt) -> Result<Self::Output>;
}
