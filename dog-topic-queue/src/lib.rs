//! # dog-topic-queue: Persistent topic-based job queue
//!
//! **Lease-based job queue with per-topic counters**
//!
//! Producers add jobs to named topics. Workers lease the oldest eligible job,
//! which blocks it for a configurable window, then acknowledge or fail it.
//! A job whose block window lapses without a resolution becomes leasable
//! again until it has been leased more than `max_retries` times.
//!
//! ## Features
//!
//! - **Atomic leasing**: select-and-update is a single backend operation, so
//!   concurrent `get_job` calls never hand the same job out twice
//! - **Pluggable storage**: `QueueBackend` with in-memory and SQLite backends
//! - **Per-topic stats**: `added`, `getted`, `done` and `failed` counters that
//!   never fail a queue operation
//! - **Polling workers**: `Worker` drives a `JobHandler` with graceful shutdown
//! - **Structured logging**: `tracing` with optional JSON output and a
//!   size-rotated log file
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dog_topic_queue::prelude::*;
//! use std::time::Duration;
//!
//! # async fn run() -> QueueResult<()> {
//! let queue = QueueService::new(MemoryBackend::new());
//!
//! queue
//!     .add_job("email", Payload::new().with("to", "a@b.com").with("subject", "Hi"))
//!     .await?;
//!
//! if let Some(job) = queue
//!     .get_job("email", "worker-1", "host-a", 3, Duration::from_secs(30))
//!     .await?
//! {
//!     queue.ack_job(&job.id).await?;
//! }
//!
//! let stats = queue.topic_stats("email").await?;
//! # Ok(())
//! # }
//! ```

pub mod types;
pub mod error;
pub mod validation;
pub mod config;
pub mod backend;
pub mod observability;
pub mod service;
pub mod job;
pub mod worker;
pub mod maintenance;

// Core API exports
pub use service::QueueService;
pub use types::{JobId, JobRecord, Payload, PayloadValue, StatKind, TopicStats, WorkerIdentity};
pub use error::{QueueError, QueueResult, JobError};
pub use config::{QueueConfig, LogConfig};
pub use backend::QueueBackend;
pub use job::JobHandler;
pub use worker::{Worker, WorkerHandle, WorkerOptions};
pub use maintenance::QueueJanitor;

// Observability exports
pub use observability::{StatsTracker, RollingFileWriter};

#[cfg(feature = "tracing-basic")]
pub use observability::init_logging;

// Backend implementations
#[cfg(feature = "memory")]
pub use backend::memory::MemoryBackend;

#[cfg(feature = "sqlite")]
pub use backend::sqlite::SqliteBackend;

/// Common imports for producers and workers
pub mod prelude {
    pub use crate::{
        QueueService, QueueBackend, QueueConfig, Worker, WorkerOptions, JobHandler
    };

    pub use crate::{
        JobId, JobRecord, Payload, PayloadValue, TopicStats, WorkerIdentity,
        QueueError, QueueResult, JobError
    };

    #[cfg(feature = "memory")]
    pub use crate::MemoryBackend;

    #[cfg(feature = "sqlite")]
    pub use crate::SqliteBackend;

    pub use async_trait::async_trait;
}
