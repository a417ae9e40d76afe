use lumen_core::{AppError, TaskError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use crate::context::{JobAttempt, JobHandler};

#[derive(Debug, Clone)]
pub struct TaskQueueConfig {
    /// Jobs running at once.
    pub max_workers: usize,
    /// Attempts per job, including the first.
    pub max_attempts: u32,
    /// Submissions buffered before `submit` waits.
    pub queue_size: usize,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
}

impl Default for TaskQueueConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            max_attempts: 2,
            queue_size: 1000,
            retry_base_delay: Duration::from_millis(250),
            retry_max_delay: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("job queue is shut down")]
    Closed,

    #[error("job {0} was dropped before it completed")]
    Lost(Uuid),

    #[error("job failed after {attempts} attempt(s): {source}")]
    Failed {
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },
}

impl From<QueueError> for AppError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Failed { source, .. } => AppError::from(source),
            other => AppError::Internal(other.to_string()),
        }
    }
}

/// Exponential backoff before attempt `attempt + 1`.
pub fn compute_retry_backoff(attempt: u32, config: &TaskQueueConfig) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    config
        .retry_base_delay
        .saturating_mul(factor)
        .min(config.retry_max_delay)
}

struct Envelope<H: JobHandler> {
    id: Uuid,
    job: H::Job,
    reply: oneshot::Sender<Result<H::Output, QueueError>>,
}

/// Completion handle for one submitted job.
///
/// Dropping the handle does not cancel the job.
pub struct JobHandle<T> {
    id: Uuid,
    rx: oneshot::Receiver<Result<T, QueueError>>,
}

impl<T> JobHandle<T> {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn wait(self) -> Result<T, QueueError> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(QueueError::Lost(self.id)),
        }
    }
}

/// Bounded worker pool running jobs through a single [`JobHandler`].
pub struct TaskQueue<H: JobHandler> {
    tx: mpsc::Sender<Envelope<H>>,
    shutdown_tx: mpsc::Sender<()>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl<H: JobHandler> TaskQueue<H> {
    /// Start the dispatcher. Must be called from within a Tokio runtime.
    pub fn start(handler: Arc<H>, config: TaskQueueConfig) -> Self {
        let config = TaskQueueConfig {
            max_workers: config.max_workers.max(1),
            max_attempts: config.max_attempts.max(1),
            queue_size: config.queue_size.max(1),
            ..config
        };

        let (tx, rx) = mpsc::channel(config.queue_size);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        tracing::info!(
            max_workers = config.max_workers,
            max_attempts = config.max_attempts,
            queue_size = config.queue_size,
            "Task queue started"
        );

        let dispatcher = tokio::spawn(Self::dispatch(handler, config, rx, shutdown_rx));

        Self {
            tx,
            shutdown_tx,
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }

    /// Enqueue a job, waiting for buffer space if the queue is full.
    pub async fn submit(&self, job: H::Job) -> Result<JobHandle<H::Output>, QueueError> {
        let id = Uuid::new_v4();
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope { id, job, reply })
            .await
            .map_err(|_| QueueError::Closed)?;

        tracing::debug!(job_id = %id, "Job enqueued");
        Ok(JobHandle { id, rx })
    }

    pub async fn submit_and_wait(&self, job: H::Job) -> Result<H::Output, QueueError> {
        self.submit(job).await?.wait().await
    }

    /// Stop accepting work and wait for running jobs to finish. Jobs still
    /// buffered are dropped and their handles resolve to [`QueueError::Lost`].
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.try_send(());
        if let Some(handle) = self.dispatcher.lock().await.take() {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Task queue dispatcher panicked");
            }
        }
        tracing::info!("Task queue stopped");
    }

    async fn dispatch(
        handler: Arc<H>,
        config: TaskQueueConfig,
        mut rx: mpsc::Receiver<Envelope<H>>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let semaphore = Arc::new(Semaphore::new(config.max_workers));
        let config = Arc::new(config);

        loop {
            let envelope = tokio::select! {
                _ = shutdown_rx.recv() => break,
                envelope = rx.recv() => match envelope {
                    Some(envelope) => envelope,
                    None => break,
                },
            };

            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            let handler = handler.clone();
            let config = config.clone();
            let span = tracing::info_span!("job", job_id = %envelope.id);

            tokio::spawn(
                async move {
                    let _permit = permit;
                    let Envelope { id, job, reply } = envelope;
                    let result = run_with_retry(handler.as_ref(), &job, id, &config).await;
                    if reply.send(result).is_err() {
                        tracing::debug!("Job finished after its waiter went away");
                    }
                }
                .instrument(span),
            );
        }

        rx.close();
        let workers = u32::try_from(config.max_workers).unwrap_or(u32::MAX);
        let _ = semaphore.acquire_many(workers).await;
    }
}

async fn run_with_retry<H: JobHandler>(
    handler: &H,
    job: &H::Job,
    job_id: Uuid,
    config: &TaskQueueConfig,
) -> Result<H::Output, QueueError> {
    let start = std::time::Instant::now();
    let mut number = 1;

    loop {
        let attempt = JobAttempt {
            job_id,
            number,
            max_attempts: config.max_attempts,
        };

        match handler.handle(job, attempt).await {
            Ok(output) => {
                tracing::info!(
                    attempt = number,
                    duration_ms = start.elapsed().as_millis(),
                    "Job completed"
                );
                return Ok(output);
            }
            Err(err) => {
                let recoverable = TaskError::is_error_recoverable(&err);
                if !recoverable || attempt.is_last() {
                    tracing::error!(
                        attempt = number,
                        recoverable,
                        error = %err,
                        duration_ms = start.elapsed().as_millis(),
                        "Job failed"
                    );
                    let source = match err.downcast::<TaskError>() {
                        Ok(task_err) => task_err.into_inner(),
                        Err(err) => err,
                    };
                    return Err(QueueError::Failed {
                        attempts: number,
                        source,
                    });
                }

                let delay = compute_retry_backoff(number, config);
                tracing::warn!(
                    attempt = number,
                    error = %err,
                    retry_in_ms = delay.as_millis(),
                    "Job attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                number += 1;
            }
        }
    }
}
