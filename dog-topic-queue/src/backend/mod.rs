#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::{JobId, JobRecord, QueueResult, StatKind, TopicStats};

/// Record selector understood by every backend
#[derive(Debug, Clone, PartialEq)]
pub enum JobFilter {
    /// Every job
    All,

    /// Exactly one job by id
    ById(JobId),

    /// Jobs of a topic that may be leased at `now`
    Leasable {
        topic: String,
        now: DateTime<Utc>,
        max_retries: u32,
    },

    /// Jobs that are done or have exhausted their retry budget
    Finished { max_retries: u32 },
}

impl JobFilter {
    /// Evaluate the filter against a record (used by in-process backends)
    pub fn matches(&self, record: &JobRecord) -> bool {
        match self {
            Self::All => true,
            Self::ById(id) => &record.id == id,
            Self::Leasable { topic, now, max_retries } => {
                &record.topic == topic && record.is_leasable(*now, *max_retries)
            }
            Self::Finished { max_retries } => record.done || record.retries_exhausted(*max_retries),
        }
    }
}

/// Mutation applied atomically to the record selected by a filter
#[derive(Debug, Clone, PartialEq)]
pub enum JobUpdate {
    /// Block the job, record the worker, and count the lease
    Lease {
        blocked_until: DateTime<Utc>,
        worker_id: String,
        worker_hostname: String,
    },

    /// Mark the job done
    Ack,

    /// Record an error; `done` makes the failure permanent
    Fail { error: String, done: bool },
}

impl JobUpdate {
    pub fn apply(&self, record: &mut JobRecord) {
        match self {
            Self::Lease { blocked_until, worker_id, worker_hostname } => {
                record.lease(*blocked_until, worker_id.clone(), worker_hostname.clone())
            }
            Self::Ack => record.ack(),
            Self::Fail { error, done } => record.fail(error.clone(), *done),
        }
    }
}

/// Which matching record `find_one_and_update` picks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobSort {
    /// Oldest `created_at` first, insertion order on ties
    #[default]
    Oldest,

    /// Any match (used for id lookups)
    Unordered,
}

/// Backend trait for queue storage primitives
///
/// `find_one_and_update` must select and mutate in a single atomic step:
/// no other caller may observe or update the selected record between the
/// two. Lease mutual exclusion depends on it.
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Persist a new job record
    async fn insert(&self, record: JobRecord) -> QueueResult<JobRecord>;

    /// Atomically select one record, apply `update`, and return the new value
    async fn find_one_and_update(
        &self,
        filter: JobFilter,
        update: JobUpdate,
        sort: JobSort,
    ) -> QueueResult<Option<JobRecord>>;

    /// All records matching `filter`, oldest first
    async fn find(&self, filter: JobFilter) -> QueueResult<Vec<JobRecord>>;

    /// Delete every record matching `filter`, returning the count
    async fn delete_many(&self, filter: JobFilter) -> QueueResult<u64>;

    /// Atomic upsert-and-increment of one topic counter
    async fn increment_stat(&self, topic: &str, kind: StatKind) -> QueueResult<TopicStats>;

    /// Counters for one topic, if any event has been recorded
    async fn topic_stats(&self, topic: &str) -> QueueResult<Option<TopicStats>>;

    /// Counters for every topic
    async fn all_stats(&self) -> QueueResult<Vec<TopicStats>>;
}

#[async_trait]
impl<B: QueueBackend + ?Sized> QueueBackend for Arc<B> {
    async fn insert(&self, record: JobRecord) -> QueueResult<JobRecord> {
        (**self).insert(record).await
    }

    async fn find_one_and_update(
        &self,
        filter: JobFilter,
        update: JobUpdate,
        sort: JobSort,
    ) -> QueueResult<Option<JobRecord>> {
        (**self).find_one_and_update(filter, update, sort).await
    }

    async fn find(&self, filter: JobFilter) -> QueueResult<Vec<JobRecord>> {
        (**self).find(filter).await
    }

    async fn delete_many(&self, filter: JobFilter) -> QueueResult<u64> {
        (**self).delete_many(filter).await
    }

    async fn increment_stat(&self, topic: &str, kind: StatKind) -> QueueResult<TopicStats> {
        (**self).increment_stat(topic, kind).await
    }

    async fn topic_stats(&self, topic: &str) -> QueueResult<Option<TopicStats>> {
        (**self).topic_stats(topic).await
    }

    async fn all_stats(&self) -> QueueResult<Vec<TopicStats>> {
        (**self).all_stats().await
    }
}
