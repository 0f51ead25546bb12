use std::collections::HashMap;
use std::sync::Arc;
use async_trait::async_trait;
use parking_lot::RwLock;

use crate::{
    QueueResult, JobRecord, StatKind, TopicStats,
    backend::{QueueBackend, JobFilter, JobUpdate, JobSort},
};

/// In-memory backend for testing and development
///
/// Jobs are kept in insertion order so FIFO ties resolve deterministically.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    /// Job records in insertion order
    pub(crate) jobs: Arc<RwLock<Vec<JobRecord>>>,

    /// Counters indexed by topic
    pub(crate) stats: Arc<RwLock<HashMap<String, TopicStats>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored jobs
    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }
}

#[async_trait]
impl QueueBackend for MemoryBackend {
    async fn insert(&self, record: JobRecord) -> QueueResult<JobRecord> {
        self.jobs.write().push(record.clone());
        Ok(record)
    }

    async fn find_one_and_update(
        &self,
        filter: JobFilter,
        update: JobUpdate,
        sort: JobSort,
    ) -> QueueResult<Option<JobRecord>> {
        // Selection and mutation happen under one write guard
        let mut jobs = self.jobs.write();

        let mut candidates = jobs
            .iter()
            .enumerate()
            .filter(|(_, record)| filter.matches(record));

        let selected = match sort {
            JobSort::Oldest => candidates
                .min_by_key(|(index, record)| (record.created_at, *index))
                .map(|(index, _)| index),
            JobSort::Unordered => candidates.next().map(|(index, _)| index),
        };

        Ok(selected.map(|index| {
            let record = &mut jobs[index];
            update.apply(record);
            record.clone()
        }))
    }

    async fn find(&self, filter: JobFilter) -> QueueResult<Vec<JobRecord>> {
        let jobs = self.jobs.read();
        let mut matched: Vec<JobRecord> = jobs
            .iter()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect();

        // Stable sort keeps insertion order within equal timestamps
        matched.sort_by_key(|record| record.created_at);
        Ok(matched)
    }

    async fn delete_many(&self, filter: JobFilter) -> QueueResult<u64> {
        let mut jobs = self.jobs.write();
        let before = jobs.len();
        jobs.retain(|record| !filter.matches(record));
        Ok((before - jobs.len()) as u64)
    }

    async fn increment_stat(&self, topic: &str, kind: StatKind) -> QueueResult<TopicStats> {
        let mut stats = self.stats.write();
        let entry = stats
            .entry(topic.to_string())
            .or_insert_with(|| TopicStats::new(topic));
        entry.increment(kind);
        Ok(entry.clone())
    }

    async fn topic_stats(&self, topic: &str) -> QueueResult<Option<TopicStats>> {
        Ok(self.stats.read().get(topic).cloned())
    }

    async fn all_stats(&self) -> QueueResult<Vec<TopicStats>> {
        let mut all: Vec<TopicStats> = self.stats.read().values().cloned().collect();
        all.sort_by(|a, b| a.topic.cmp(&b.topic));
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Payload;
    use chrono::{Duration, Utc};

    fn job(topic: &str) -> JobRecord {
        JobRecord::new(topic, Payload::new().with("k", "v"))
    }

    fn lease_update() -> JobUpdate {
        JobUpdate::Lease {
            blocked_until: Utc::now() + Duration::seconds(30),
            worker_id: "w1".to_string(),
            worker_hostname: "host1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_lease_picks_oldest_with_insertion_tiebreak() {
        let backend = MemoryBackend::new();
        let created_at = Utc::now();

        let mut first = job("email");
        first.created_at = created_at;
        let mut second = job("email");
        second.created_at = created_at;

        backend.insert(first.clone()).await.unwrap();
        backend.insert(second.clone()).await.unwrap();

        let filter = JobFilter::Leasable { topic: "email".into(), now: Utc::now(), max_retries: 3 };
        let leased = backend
            .find_one_and_update(filter.clone(), lease_update(), JobSort::Oldest)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(leased.id, first.id);
        assert_eq!(leased.retries, 1);

        let leased = backend
            .find_one_and_update(filter.clone(), lease_update(), JobSort::Oldest)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(leased.id, second.id);

        let none = backend.find_one_and_update(filter, lease_update(), JobSort::Oldest).await.unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_leasable_filter_is_topic_scoped() {
        let backend = MemoryBackend::new();
        backend.insert(job("sms")).await.unwrap();

        let filter = JobFilter::Leasable { topic: "email".into(), now: Utc::now(), max_retries: 3 };
        let leased = backend.find_one_and_update(filter, lease_update(), JobSort::Oldest).await.unwrap();
        assert!(leased.is_none());
    }

    #[tokio::test]
    async fn test_delete_many_counts_removed() {
        let backend = MemoryBackend::new();
        let mut done = job("email");
        done.done = true;
        backend.insert(done).await.unwrap();
        backend.insert(job("email")).await.unwrap();

        let removed = backend.delete_many(JobFilter::Finished { max_retries: 3 }).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(backend.len(), 1);

        let removed = backend.delete_many(JobFilter::All).await.unwrap();
        assert_eq!(removed, 1);
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_increment_stat_upserts() {
        let backend = MemoryBackend::new();
        assert!(backend.topic_stats("email").await.unwrap().is_none());

        backend.increment_stat("email", StatKind::Added).await.unwrap();
        let stats = backend.increment_stat("email", StatKind::Added).await.unwrap();
        assert_eq!(stats.added, 2);
        assert_eq!(stats.getted, 0);

        backend.increment_stat("sms", StatKind::Failed).await.unwrap();
        let all = backend.all_stats().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].topic, "email");
        assert_eq!(all[1].failed, 1);
    }
}
