use std::sync::Arc;
use std::time::Duration;
use chrono::{SubsecRound, Utc};
use serde_json::Value;
use tracing::{debug, error, info, instrument};

use crate::{
    QueueResult, QueueError, JobId, JobRecord, Payload, TopicStats,
    backend::{QueueBackend, JobFilter, JobUpdate, JobSort},
    config::QueueConfig,
    observability::StatsTracker,
    validation,
};

/// Topic queue service with lease semantics
///
/// Holds no mutable state of its own: every coordination decision is made
/// by the backend, so any number of services may share one store.
pub struct QueueService<B: QueueBackend + ?Sized> {
    backend: Arc<B>,
    stats: StatsTracker<B>,
    config: QueueConfig,
}

impl<B: QueueBackend> QueueService<B> {
    /// Create a new queue service
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, QueueConfig::default())
    }

    /// Create service with custom configuration
    pub fn with_config(backend: B, config: QueueConfig) -> Self {
        Self::from_arc(Arc::new(backend), config)
    }
}

impl<B: QueueBackend + ?Sized> QueueService<B> {
    /// Create service over a shared backend
    pub fn from_arc(backend: Arc<B>, config: QueueConfig) -> Self {
        Self {
            stats: StatsTracker::new(backend.clone()),
            backend,
            config,
        }
    }

    /// Enqueue a job on `topic`
    #[instrument(skip(self, payload))]
    pub async fn add_job(&self, topic: &str, payload: Payload) -> QueueResult<JobRecord> {
        validation::validate_topic(topic)?;
        validation::validate_payload(&payload)?;

        let record = JobRecord::new(topic, payload);
        let job = self.backend.insert(record).await.map_err(|e| {
            error!("QueueService.add_job failed: {}", e);
            e
        })?;

        self.stats.increment_add_stat(topic).await;
        debug!("Added job {} to topic {}", job.id, topic);
        Ok(job)
    }

    /// Enqueue a job from an untyped JSON payload
    ///
    /// The payload must be a flat object of scalar values.
    pub async fn add_job_json(&self, topic: &str, payload: Value) -> QueueResult<JobRecord> {
        validation::validate_topic(topic)?;
        let payload = Payload::try_from(payload)?;
        self.add_job(topic, payload).await
    }

    /// Lease the oldest eligible job on `topic`
    ///
    /// Returns `None` when nothing is leasable; callers decide when to poll again.
    #[instrument(skip(self))]
    pub async fn get_job(
        &self,
        topic: &str,
        worker_id: &str,
        worker_hostname: &str,
        max_retries: u32,
        block_duration: Duration,
    ) -> QueueResult<Option<JobRecord>> {
        validation::validate_topic(topic)?;
        let block = chrono::Duration::from_std(block_duration)
            .map_err(|_| QueueError::validation(format!("Block duration out of range: {:?}", block_duration)))?;

        let now = Utc::now().trunc_subsecs(3);
        let blocked_until = now
            .checked_add_signed(block)
            .ok_or_else(|| QueueError::validation(format!("Block duration out of range: {:?}", block_duration)))?;

        let leased = self
            .backend
            .find_one_and_update(
                JobFilter::Leasable {
                    topic: topic.to_string(),
                    now,
                    max_retries,
                },
                JobUpdate::Lease {
                    blocked_until,
                    worker_id: worker_id.to_string(),
                    worker_hostname: worker_hostname.to_string(),
                },
                JobSort::Oldest,
            )
            .await
            .map_err(|e| {
                error!("QueueService.get_job failed: {}", e);
                e
            })?;

        match leased {
            Some(job) => {
                self.stats.increment_get_stat(topic).await;
                debug!("Leased job {} to {}@{} (retries {})", job.id, worker_id, worker_hostname, job.retries);
                Ok(Some(job))
            }
            None => {
                debug!("No leasable job on topic {}", topic);
                Ok(None)
            }
        }
    }

    /// Lease using the configured retry limit and block duration
    pub async fn lease_job(
        &self,
        topic: &str,
        worker_id: &str,
        worker_hostname: &str,
    ) -> QueueResult<Option<JobRecord>> {
        self.get_job(
            topic,
            worker_id,
            worker_hostname,
            self.config.max_retries,
            self.config.block_duration,
        )
        .await
    }

    /// Acknowledge successful completion
    #[instrument(skip(self))]
    pub async fn ack_job(&self, job_id: &JobId) -> QueueResult<JobRecord> {
        validation::validate_job_id(job_id)?;

        let job = self
            .update_by_id(job_id, JobUpdate::Ack, "ack_job")
            .await?;

        self.stats.increment_done_stat(&job.topic).await;
        debug!("Acknowledged job {}", job.id);
        Ok(job)
    }

    /// Record a failure
    ///
    /// `done = true` fails the job permanently; `done = false` leaves it
    /// leasable again once its block window elapses, within the retry limit.
    #[instrument(skip(self))]
    pub async fn error_job(&self, job_id: &JobId, error_message: &str, done: bool) -> QueueResult<JobRecord> {
        validation::validate_job_id(job_id)?;
        validation::validate_error_message(error_message)?;

        let update = JobUpdate::Fail {
            error: error_message.to_string(),
            done,
        };
        let job = self.update_by_id(job_id, update, "error_job").await?;

        self.stats.increment_error_stat(&job.topic).await;
        debug!("Recorded error on job {} (done: {})", job.id, done);
        Ok(job)
    }

    /// Permanent failure, the default disposition of `error_job`
    pub async fn fail_job(&self, job_id: &JobId, error_message: &str) -> QueueResult<JobRecord> {
        self.error_job(job_id, error_message, true).await
    }

    /// Remove done jobs and jobs past the configured retry limit
    #[instrument(skip(self))]
    pub async fn clean_queue(&self) -> QueueResult<u64> {
        let removed = self
            .backend
            .delete_many(JobFilter::Finished {
                max_retries: self.config.max_retries,
            })
            .await
            .map_err(|e| {
                error!("QueueService.clean_queue failed: {}", e);
                e
            })?;

        debug!("Cleaned {} jobs", removed);
        Ok(removed)
    }

    /// Remove every job
    #[instrument(skip(self))]
    pub async fn reset_queue(&self) -> QueueResult<u64> {
        let removed = self.backend.delete_many(JobFilter::All).await.map_err(|e| {
            error!("QueueService.reset_queue failed: {}", e);
            e
        })?;

        info!("Reset queue, removed {} jobs", removed);
        Ok(removed)
    }

    /// Every job, oldest first
    pub async fn fetch_queues(&self) -> QueueResult<Vec<JobRecord>> {
        let jobs = self.backend.find(JobFilter::All).await.map_err(|e| {
            error!("QueueService.fetch_queues failed: {}", e);
            e
        })?;

        debug!("QueueService.fetch_queues returned {} jobs", jobs.len());
        Ok(jobs)
    }

    /// Counters for one topic
    pub async fn topic_stats(&self, topic: &str) -> QueueResult<Option<TopicStats>> {
        validation::validate_topic(topic)?;
        self.backend.topic_stats(topic).await
    }

    /// Counters for every topic
    pub async fn fetch_stats(&self) -> QueueResult<Vec<TopicStats>> {
        self.backend.all_stats().await
    }

    /// Get backend reference
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Get configuration
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    async fn update_by_id(&self, job_id: &JobId, update: JobUpdate, operation: &str) -> QueueResult<JobRecord> {
        self.backend
            .find_one_and_update(JobFilter::ById(job_id.clone()), update, JobSort::Unordered)
            .await
            .map_err(|e| {
                error!("QueueService.{} failed: {}", operation, e);
                e
            })?
            .ok_or_else(|| QueueError::JobNotFound(job_id.to_string()))
    }
}

impl<B: QueueBackend + ?Sized> Clone for QueueService<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            stats: self.stats.clone(),
            config: self.config.clone(),
        }
    }
}
