//! Evaluation jobs and the bounded queue that carries them to the workers.

use std::sync::Arc;

use tokio::sync::mpsc;

use autorule_domain::context::TriggerContext;
use autorule_domain::error::AutoruleError;
use autorule_domain::execution::ExecutionRecord;
use autorule_domain::id::ExecutionId;
use autorule_domain::rule::Rule;
use autorule_domain::time::Timestamp;

use crate::ports::{ExecutionLogStore, JobSink};

/// One unit of work: evaluate `rule` against `context`.
#[derive(Debug, Clone)]
pub struct EvaluationJob {
    pub rule: Arc<Rule>,
    pub context: Arc<TriggerContext>,
    /// The already persisted record this job advances: `Pending` when
    /// queued, `ConditionsMet` when a delayed run comes back for its actions.
    pub record: ExecutionRecord,
}

impl EvaluationJob {
    #[must_use]
    pub fn new(rule: Arc<Rule>, context: Arc<TriggerContext>, record: ExecutionRecord) -> Self {
        Self {
            rule,
            context,
            record,
        }
    }
}

/// Append a `Pending` record for `rule` fired by `context`, then queue the
/// job that will advance it.
///
/// The record is written before the job is queued: a job lost from the
/// queue (shutdown, crash) still leaves a record for start-up recovery to
/// abandon.
///
/// # Errors
///
/// Returns the log store's error if the record cannot be written, or
/// [`AutoruleError::QueueClosed`] if the queue is gone. In the latter case
/// the record stays `Pending`.
pub async fn enqueue<L, S>(
    log: &L,
    sink: &S,
    rule: Arc<Rule>,
    context: Arc<TriggerContext>,
    now: Timestamp,
) -> Result<ExecutionId, AutoruleError>
where
    L: ExecutionLogStore,
    S: JobSink,
{
    let record = log
        .append(ExecutionRecord::pending(&rule, &context, now))
        .await?;
    let id = record.id;
    sink.submit(EvaluationJob::new(rule, context, record)).await?;
    Ok(id)
}

/// Create a bounded job queue.
///
/// # Panics
///
/// Panics if `capacity` is zero, like [`mpsc::channel`].
#[must_use]
pub fn job_queue(capacity: usize) -> (JobSender, JobReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (JobSender { tx }, JobReceiver { rx })
}

/// Producer half of the job queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct JobSender {
    tx: mpsc::Sender<EvaluationJob>,
}

impl JobSink for JobSender {
    async fn submit(&self, job: EvaluationJob) -> Result<(), AutoruleError> {
        self.tx
            .send(job)
            .await
            .map_err(|_| AutoruleError::QueueClosed)
    }
}

/// Consumer half of the job queue, owned by the worker pool.
#[derive(Debug)]
pub struct JobReceiver {
    rx: mpsc::Receiver<EvaluationJob>,
}

impl JobReceiver {
    /// Next job, or `None` once every sender is dropped and the queue drained.
    pub async fn recv(&mut self) -> Option<EvaluationJob> {
        self.rx.recv().await
    }

    /// Stop accepting new jobs; already queued jobs can still be received.
    pub fn close(&mut self) {
        self.rx.close();
    }
}
