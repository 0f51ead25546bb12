use crate::{JobError, JobRecord};
use async_trait::async_trait;

/// Trait for processing leased jobs of one topic
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    /// Process a leased job
    ///
    /// `Ok` acknowledges the job, `JobError::Retryable` leaves it leasable
    /// after its block window, `JobError::Permanent` fails it for good.
    async fn handle(&self, job: &JobRecord) -> Result<(), JobError>;
}

#[async_trait]
impl<F, Fut> JobHandler for F
where
    F: Fn(JobRecord) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<(), JobError>> + Send + 'static,
{
    async fn handle(&self, job: &JobRecord) -> Result<(), JobError> {
        (self)(job.clone()).await
    }
}
