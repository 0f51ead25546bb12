use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use super::{JobId, Payload};

/// Job record - the persisted unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Unique job identifier
    pub id: JobId,

    /// Topic the job belongs to
    pub topic: String,

    /// Flat job payload
    pub payload: Payload,

    /// Set once the job is acknowledged or permanently failed
    pub done: bool,

    /// Last error message (if any)
    pub error: Option<String>,

    /// Number of times the job has been leased
    pub retries: u32,

    /// Job is not leasable before this instant
    pub blocked_until: Option<DateTime<Utc>>,

    /// Worker currently (or last) holding the lease
    pub worker_id: Option<String>,

    pub worker_hostname: Option<String>,

    /// When the job was created
    pub created_at: DateTime<Utc>,
}

impl JobRecord {
    /// Create a fresh, immediately leasable record
    pub fn new(topic: impl Into<String>, payload: Payload) -> Self {
        Self {
            id: JobId::new(),
            topic: topic.into(),
            payload,
            done: false,
            error: None,
            retries: 0,
            blocked_until: None,
            worker_id: None,
            worker_hostname: None,
            // Millisecond precision matches what durable backends persist
            created_at: Utc::now().trunc_subsecs(3),
        }
    }

    /// Check whether the lease window has elapsed
    pub fn is_unblocked(&self, now: DateTime<Utc>) -> bool {
        self.blocked_until.map_or(true, |until| until <= now)
    }

    /// Check whether the retry budget has been exhausted
    pub fn retries_exhausted(&self, max_retries: u32) -> bool {
        self.retries > max_retries
    }

    /// A job is leasable iff not done, unblocked, and within its retry budget
    pub fn is_leasable(&self, now: DateTime<Utc>, max_retries: u32) -> bool {
        !self.done && self.is_unblocked(now) && !self.retries_exhausted(max_retries)
    }

    /// Check if the job failed permanently
    pub fn is_failed(&self) -> bool {
        self.done && self.error.is_some()
    }

    /// Take a lease on the job
    pub fn lease(&mut self, blocked_until: DateTime<Utc>, worker_id: String, worker_hostname: String) {
        self.blocked_until = Some(blocked_until);
        self.worker_id = Some(worker_id);
        self.worker_hostname = Some(worker_hostname);
        self.retries += 1;
    }

    /// Acknowledge successful completion
    pub fn ack(&mut self) {
        self.done = true;
    }

    /// Record a failure; `done` decides between permanent and retryable
    pub fn fail(&mut self, error: String, done: bool) {
        self.error = Some(error);
        self.done = done;
    }
}
