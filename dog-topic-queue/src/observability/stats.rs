use std::sync::Arc;
use tracing::{debug, warn};

use crate::{backend::QueueBackend, StatKind};

/// Best-effort per-topic counters
///
/// Every increment is an atomic upsert in the backend. Failures are logged
/// and swallowed so they never fail the job transition that triggered them.
pub struct StatsTracker<B: QueueBackend + ?Sized> {
    backend: Arc<B>,
}

impl<B: QueueBackend + ?Sized> StatsTracker<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub async fn increment_add_stat(&self, topic: &str) {
        self.increment(topic, StatKind::Added).await;
    }

    pub async fn increment_get_stat(&self, topic: &str) {
        self.increment(topic, StatKind::Getted).await;
    }

    pub async fn increment_done_stat(&self, topic: &str) {
        self.increment(topic, StatKind::Done).await;
    }

    pub async fn increment_error_stat(&self, topic: &str) {
        self.increment(topic, StatKind::Failed).await;
    }

    async fn increment(&self, topic: &str, kind: StatKind) {
        match self.backend.increment_stat(topic, kind).await {
            Ok(stats) => {
                debug!("Incremented {} stat for topic {} to {}", kind, topic, stats.get(kind));
            }
            Err(e) => {
                warn!("Failed to increment {} stat for topic {}: {}", kind, topic, e);
            }
        }
    }
}

impl<B: QueueBackend + ?Sized> Clone for StatsTracker<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
        }
    }
}
