//! Job sink port: where producers submit evaluation jobs.

use std::future::Future;
use std::sync::Arc;

use autorule_domain::error::AutoruleError;

use crate::job::EvaluationJob;

/// Accepts evaluation jobs for the worker pool.
pub trait JobSink {
    /// Enqueue a job, waiting for capacity if the queue is full.
    ///
    /// Fails with [`AutoruleError::QueueClosed`] once the consumer is gone.
    fn submit(&self, job: EvaluationJob) -> impl Future<Output = Result<(), AutoruleError>> + Send;
}

impl<T: JobSink + Send + Sync> JobSink for Arc<T> {
    fn submit(&self, job: EvaluationJob) -> impl Future<Output = Result<(), AutoruleError>> + Send {
        (**self).submit(job)
    }
}
