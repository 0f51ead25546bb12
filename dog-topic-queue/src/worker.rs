use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tracing::{info, warn, error, debug};

use crate::{
    QueueResult, QueueError, JobRecord, WorkerIdentity,
    backend::QueueBackend,
    job::JobHandler,
    service::QueueService,
};

/// Options for a polling worker
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// Topic to lease from
    pub topic: String,
    /// Identity recorded on every lease
    pub identity: WorkerIdentity,
    /// Retry limit passed to `get_job`; the service configuration when unset
    pub max_retries: Option<u32>,
    /// Lease duration passed to `get_job`; the service configuration when unset
    pub block_duration: Option<Duration>,
    /// Sleep between polls when nothing is leasable
    pub poll_interval: Duration,
    /// Sleep after a backend error
    pub error_backoff: Duration,
}

impl WorkerOptions {
    pub fn new(topic: impl Into<String>, identity: WorkerIdentity) -> Self {
        Self {
            topic: topic.into(),
            identity,
            max_retries: None,
            block_duration: None,
            poll_interval: Duration::from_millis(100),
            error_backoff: Duration::from_secs(1),
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn with_block_duration(mut self, block_duration: Duration) -> Self {
        self.block_duration = Some(block_duration);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_error_backoff(mut self, error_backoff: Duration) -> Self {
        self.error_backoff = error_backoff;
        self
    }
}

/// Handle for managing worker lifecycle
pub struct WorkerHandle {
    shutdown_tx: oneshot::Sender<()>,
    join_handle: JoinHandle<QueueResult<()>>,
}

impl WorkerHandle {
    /// Gracefully shutdown the worker
    ///
    /// A job being handled when this is called is resolved before the loop exits.
    pub async fn shutdown(self) -> QueueResult<()> {
        let _ = self.shutdown_tx.send(());
        self.join_handle.await.map_err(|e| QueueError::Internal(format!("Worker join error: {}", e)))?
    }

    pub fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }
}

/// Polling worker for one topic
pub struct Worker<B: QueueBackend + ?Sized> {
    service: QueueService<B>,
    options: WorkerOptions,
}

impl<B: QueueBackend + ?Sized + 'static> Worker<B> {
    pub fn new(service: QueueService<B>, options: WorkerOptions) -> Self {
        Self { service, options }
    }

    /// Spawn the poll loop on the tokio runtime
    pub fn spawn<H: JobHandler>(self, handler: H) -> WorkerHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let topic = self.options.topic.clone();
        let identity = self.options.identity.clone();
        let handler = Arc::new(handler);

        let join_handle = tokio::spawn(async move { self.run(handler, shutdown_rx).await });

        info!("Started worker {} for topic: {}", identity, topic);

        WorkerHandle {
            shutdown_tx,
            join_handle,
        }
    }

    /// Run the worker loop
    async fn run<H: JobHandler>(self, handler: Arc<H>, mut shutdown_rx: oneshot::Receiver<()>) -> QueueResult<()> {
        info!("Worker {} polling topic {}", self.options.identity, self.options.topic);

        loop {
            // Shutdown is only observed between jobs so a leased job is always resolved
            if !matches!(shutdown_rx.try_recv(), Err(TryRecvError::Empty)) {
                info!("Worker shutdown requested");
                break;
            }

            let pause = match self.process_next_job(handler.as_ref()).await {
                Ok(true) => continue,
                Ok(false) => self.options.poll_interval,
                Err(e) => {
                    error!("Error processing job: {}", e);
                    self.options.error_backoff
                }
            };

            tokio::select! {
                _ = &mut shutdown_rx => {
                    info!("Worker shutdown requested");
                    break;
                }
                _ = tokio::time::sleep(pause) => {}
            }
        }

        info!("Worker stopped");
        Ok(())
    }

    /// Lease and resolve one job; `false` when nothing was leasable
    pub async fn process_next_job<H: JobHandler + ?Sized>(&self, handler: &H) -> QueueResult<bool> {
        let config = self.service.config();
        let job = self
            .service
            .get_job(
                &self.options.topic,
                &self.options.identity.worker_id,
                &self.options.identity.hostname,
                self.options.max_retries.unwrap_or(config.max_retries),
                self.options.block_duration.unwrap_or(config.block_duration),
            )
            .await?;

        let Some(job) = job else {
            return Ok(false);
        };

        debug!("Processing job {} (retries {})", job.id, job.retries);
        self.resolve(&job, handler.handle(&job).await).await?;
        Ok(true)
    }

    async fn resolve(&self, job: &JobRecord, outcome: Result<(), crate::JobError>) -> QueueResult<()> {
        match outcome {
            Ok(()) => {
                self.service.ack_job(&job.id).await?;
                info!("Job {} completed successfully", job.id);
            }
            Err(job_error) if job_error.is_retryable() => {
                self.service.error_job(&job.id, job_error.message(), false).await?;
                warn!("Job {} failed, will retry: {}", job.id, job_error);
            }
            Err(job_error) => {
                self.service.error_job(&job.id, job_error.message(), true).await?;
                error!("Job {} failed permanently: {}", job.id, job_error);
            }
        }
        Ok(())
    }
}
