//! Execution coordinator: drives one evaluation job through the execution
//! state machine, persisting the record at every transition and after every
//! action step.

use std::sync::Arc;
use std::time::Duration;

use autorule_domain::context::TriggerContext;
use autorule_domain::error::{AutoruleError, TransitionError};
use autorule_domain::execution::{ExecutionRecord, ExecutionStatus};
use autorule_domain::rule::Rule;
use autorule_domain::time::Timestamp;

use crate::actions::{ActionExecutor, ActionRegistry};
use crate::condition_evaluator::ConditionEvaluator;
use crate::job::EvaluationJob;
use crate::ports::{Clock, EntityLookup, ExecutionLogStore};

/// How a [`ExecutionCoordinator::run`] call ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// The record reached a terminal status.
    Finished(ExecutionRecord),
    /// Conditions passed but the rule asks for a delay; `job` carries the
    /// `ConditionsMet` record and must be run again at `run_at`.
    Deferred {
        job: Box<EvaluationJob>,
        run_at: Timestamp,
    },
}

/// Advances the execution records carried by jobs.
///
/// Holds no per-run state, so one instance serves all workers.
pub struct ExecutionCoordinator<L, E, C> {
    log: L,
    evaluator: ConditionEvaluator<E>,
    executor: ActionExecutor<C>,
    clock: C,
}

impl<L, E, C> ExecutionCoordinator<L, E, C>
where
    L: ExecutionLogStore,
    E: EntityLookup,
    C: Clock + Clone,
{
    pub fn new(
        log: L,
        lookup: E,
        registry: Arc<ActionRegistry>,
        action_timeout: Duration,
        clock: C,
    ) -> Self {
        Self {
            log,
            evaluator: ConditionEvaluator::new(lookup),
            executor: ActionExecutor::new(registry, action_timeout, clock.clone()),
            clock,
        }
    }

    /// Run `job` as far as it can go right now.
    ///
    /// A `Pending` record is evaluated; a `ConditionsMet` record coming back
    /// from its execution delay goes straight to its actions.
    ///
    /// # Errors
    ///
    /// Returns [`AutoruleError::Transition`] for a record in any other
    /// state, or the log store's error when a record cannot be written. The
    /// run stops there; the record stays non-terminal until abandoned.
    #[tracing::instrument(
        skip_all,
        fields(
            rule_id = %job.rule.id,
            tenant = %job.context.tenant_id,
            execution_id = %job.record.id,
        )
    )]
    pub async fn run(&self, job: EvaluationJob) -> Result<RunOutcome, AutoruleError> {
        match job.record.status {
            ExecutionStatus::Pending => self.evaluate(job).await,
            ExecutionStatus::ConditionsMet => {
                let EvaluationJob {
                    rule,
                    context,
                    record,
                } = job;
                self.run_actions(&rule, &context, record)
                    .await
                    .map(RunOutcome::Finished)
            }
            status => Err(TransitionError {
                from: status,
                to: ExecutionStatus::Evaluating,
            }
            .into()),
        }
    }

    async fn evaluate(&self, job: EvaluationJob) -> Result<RunOutcome, AutoruleError> {
        let EvaluationJob {
            rule,
            context,
            mut record,
        } = job;

        self.advance(&mut record, ExecutionStatus::Evaluating).await?;
        let evaluation = self.evaluator.evaluate(&rule, &context).await;
        record.conditions = evaluation.trace;

        if !evaluation.passed {
            self.advance(&mut record, ExecutionStatus::ConditionsNotMet)
                .await?;
            tracing::info!(status = %record.status, "execution finished");
            return Ok(RunOutcome::Finished(record));
        }

        if let Some(delay) = rule.execution_delay() {
            let run_at = self.clock.now() + delay;
            record.delayed_until = Some(run_at);
            self.advance(&mut record, ExecutionStatus::ConditionsMet).await?;
            tracing::info!(%run_at, "actions deferred by execution delay");
            return Ok(RunOutcome::Deferred {
                job: Box::new(EvaluationJob::new(rule, context, record)),
                run_at,
            });
        }

        self.advance(&mut record, ExecutionStatus::ConditionsMet).await?;
        self.run_actions(&rule, &context, record)
            .await
            .map(RunOutcome::Finished)
    }

    /// Run the actions in ascending order, writing the record after each
    /// step and stopping at the first failure.
    async fn run_actions(
        &self,
        rule: &Rule,
        context: &Arc<TriggerContext>,
        mut record: ExecutionRecord,
    ) -> Result<ExecutionRecord, AutoruleError> {
        record.delayed_until = None;
        self.advance(&mut record, ExecutionStatus::RunningActions).await?;

        let mut next = ExecutionStatus::Completed;
        for action in rule.ordered_actions() {
            let step = self.executor.run_step(action, context).await;
            let failure = (!step.succeeded()).then(|| step.message.clone().unwrap_or_default());
            record.steps.push(step);
            self.persist(&mut record).await?;

            if let Some(error) = failure {
                tracing::warn!(
                    order = action.order,
                    action_type = %action.action_type,
                    %error,
                    "action failed, skipping remaining actions"
                );
                record.error = Some(error);
                next = ExecutionStatus::Failed;
                break;
            }
        }
        self.advance(&mut record, next).await?;

        tracing::info!(
            status = %record.status,
            steps = record.steps.len(),
            "execution finished"
        );
        Ok(record)
    }

    /// Apply a transition and persist the record before going on.
    async fn advance(
        &self,
        record: &mut ExecutionRecord,
        next: ExecutionStatus,
    ) -> Result<(), AutoruleError> {
        record.transition(next, self.clock.now())?;
        self.persist(record).await
    }

    async fn persist(&self, record: &mut ExecutionRecord) -> Result<(), AutoruleError> {
        let status = record.status;
        *record = self.log.update(record.clone()).await.inspect_err(|error| {
            tracing::error!(%error, %status, "failed to persist execution record");
        })?;
        Ok(())
    }
}
