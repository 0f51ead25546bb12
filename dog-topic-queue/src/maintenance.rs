use std::time::Duration;
use tokio::time::interval;
use tracing::{info, warn, debug};

use crate::{backend::QueueBackend, service::QueueService, QueueResult};

/// Periodic `clean_queue` runner
pub struct QueueJanitor<B: QueueBackend + ?Sized> {
    service: QueueService<B>,
    interval: Duration,
}

impl<B: QueueBackend + ?Sized> QueueJanitor<B> {
    /// Create a janitor that runs every 30 seconds
    pub fn new(service: QueueService<B>) -> Self {
        Self {
            service,
            interval: Duration::from_secs(30),
        }
    }

    pub fn with_interval(service: QueueService<B>, interval: Duration) -> Self {
        Self { service, interval }
    }

    /// Run until the task is dropped or aborted
    pub async fn start(self) -> QueueResult<()> {
        let mut ticker = interval(self.interval);

        info!("Starting queue janitor with interval: {:?}", self.interval);

        loop {
            ticker.tick().await;

            match self.run_once().await {
                Ok(removed) => {
                    if removed > 0 {
                        info!("Janitor removed {} finished jobs", removed);
                    } else {
                        debug!("No finished jobs to remove");
                    }
                }
                Err(e) => {
                    warn!("Error during queue cleanup: {}", e);
                }
            }
        }
    }

    /// Run one cleanup cycle
    pub async fn run_once(&self) -> QueueResult<u64> {
        self.service.clean_queue().await
    }
}
