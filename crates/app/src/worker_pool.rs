//! Worker pool: consumes the job queue with bounded concurrency.

use std::sync::Arc;

use tokio::sync::{Semaphore, watch};

use crate::coordinator::{ExecutionCoordinator, RunOutcome};
use crate::job::{EvaluationJob, JobReceiver};
use crate::ports::{Clock, EntityLookup, ExecutionLogStore, JobSink};

/// Runs up to `workers` jobs at once, each in its own task.
///
/// Jobs deferred by an execution delay are handed to a sleeper task that
/// re-submits them through `sink` when due, so no worker slot is held
/// while waiting.
pub struct WorkerPool<L, E, C, S> {
    coordinator: Arc<ExecutionCoordinator<L, E, C>>,
    sink: S,
    clock: C,
    workers: usize,
}

impl<L, E, C, S> WorkerPool<L, E, C, S>
where
    L: ExecutionLogStore + Send + Sync + 'static,
    E: EntityLookup + Send + Sync + 'static,
    C: Clock + Clone + 'static,
    S: JobSink + Clone + Send + Sync + 'static,
{
    /// # Panics
    ///
    /// Panics if `workers` is zero.
    pub fn new(
        coordinator: Arc<ExecutionCoordinator<L, E, C>>,
        sink: S,
        clock: C,
        workers: usize,
    ) -> Self {
        assert!(workers > 0, "worker pool needs at least one worker");
        Self {
            coordinator,
            sink,
            clock,
            workers,
        }
    }

    /// Receive and run jobs until `shutdown` flips or the queue closes,
    /// then wait for in-flight jobs to finish.
    pub async fn run(&self, mut jobs: JobReceiver, mut shutdown: watch::Receiver<bool>) {
        let permits = Arc::new(Semaphore::new(self.workers));
        loop {
            if *shutdown.borrow() {
                break;
            }
            let job = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                job = jobs.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };
            let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                break;
            };
            let coordinator = Arc::clone(&self.coordinator);
            let sink = self.sink.clone();
            let clock = self.clock.clone();
            tokio::spawn(async move {
                let _permit = permit;
                handle_job(&coordinator, sink, clock, job).await;
            });
        }

        jobs.close();
        let workers = u32::try_from(self.workers).unwrap_or(u32::MAX);
        // Every permit back means every spawned job has finished.
        let _drained = permits.acquire_many(workers).await;
        tracing::info!("worker pool stopped");
    }
}

async fn handle_job<L, E, C, S>(
    coordinator: &ExecutionCoordinator<L, E, C>,
    sink: S,
    clock: C,
    job: EvaluationJob,
) where
    L: ExecutionLogStore,
    E: EntityLookup,
    C: Clock + Clone,
    S: JobSink + Send + 'static,
{
    match coordinator.run(job).await {
        Ok(RunOutcome::Finished(_)) => {}
        Ok(RunOutcome::Deferred { job, run_at }) => {
            let wait = (run_at - clock.now()).to_std().unwrap_or_default();
            tokio::spawn(async move {
                tokio::time::sleep(wait).await;
                if let Err(error) = sink.submit(*job).await {
                    tracing::error!(%error, "failed to re-submit delayed job");
                }
            });
        }
        Err(error) => tracing::error!(%error, "execution run aborted"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use autorule_domain::change::EventKind;
    use autorule_domain::execution::ExecutionStatus;

    use crate::actions::ActionRegistry;
    use crate::clock::ManualClock;
    use crate::dispatcher::TriggerDispatcher;
    use crate::job::{JobSender, job_queue};
    use crate::testing::{self, InMemoryExecutionLog, InMemoryRuleRepo, MapLookup, RecordingHandler};

    type TestPool = WorkerPool<Arc<InMemoryExecutionLog>, MapLookup, ManualClock, JobSender>;

    fn pool(
        workers: usize,
    ) -> (TestPool, JobSender, JobReceiver, Arc<InMemoryExecutionLog>) {
        let registry = ActionRegistry::new();
        registry.register("set-field", RecordingHandler::default());
        let log = Arc::new(InMemoryExecutionLog::default());
        let clock = ManualClock::new(testing::at("2024-01-01T12:00:00Z"));
        let coordinator = Arc::new(ExecutionCoordinator::new(
            Arc::clone(&log),
            MapLookup::default(),
            Arc::new(registry),
            Duration::from_secs(5),
            clock.clone(),
        ));
        let (sender, receiver) = job_queue(16);
        let pool = WorkerPool::new(coordinator, sender.clone(), clock, workers);
        (pool, sender, receiver, log)
    }

    async fn job(log: &InMemoryExecutionLog, after_status: &str) -> EvaluationJob {
        testing::enqueued(
            log,
            testing::flag_active_orders_rule(),
            testing::updated_order("1", after_status, "new"),
        )
        .await
    }

    async fn wait_for_terminal(log: &InMemoryExecutionLog, count: usize) {
        loop {
            let done = log.all().iter().filter(|r| r.is_terminal()).count();
            if done >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn should_run_queued_jobs_to_completion() {
        let (pool, sender, receiver, log) = pool(2);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move { pool.run(receiver, shutdown_rx).await });

        sender.submit(job(&log, "active").await).await.unwrap();
        sender.submit(job(&log, "inactive").await).await.unwrap();
        wait_for_terminal(&log, 2).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        let mut statuses: Vec<ExecutionStatus> = log.all().iter().map(|r| r.status).collect();
        statuses.sort_by_key(|s| s.as_str());
        assert_eq!(
            statuses,
            [ExecutionStatus::Completed, ExecutionStatus::ConditionsNotMet]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_resubmit_delayed_job_without_blocking_workers() {
        let (pool, sender, receiver, log) = pool(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move { pool.run(receiver, shutdown_rx).await });

        let mut rule = testing::flag_active_orders_rule();
        rule.execution_delay_secs = Some(60);
        let delayed = testing::enqueued(&log, rule, testing::updated_order("1", "active", "new")).await;
        sender.submit(delayed).await.unwrap();
        // Runs on the single worker while the delayed job sleeps.
        sender.submit(job(&log, "inactive").await).await.unwrap();

        wait_for_terminal(&log, 1).await;
        let parked = log
            .all()
            .into_iter()
            .find(|r| r.status == ExecutionStatus::ConditionsMet);
        assert!(parked.is_some_and(|r| r.delayed_until.is_some()));

        wait_for_terminal(&log, 2).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert!(
            log.all()
                .iter()
                .any(|r| r.status == ExecutionStatus::Completed)
        );
    }

    #[tokio::test]
    async fn should_stop_when_queue_is_closed() {
        let (pool, sender, mut receiver, log) = pool(1);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        sender.submit(job(&log, "active").await).await.unwrap();
        receiver.close();

        pool.run(receiver, shutdown_rx).await;

        // Already queued jobs are still drained.
        assert_eq!(log.all()[0].status, ExecutionStatus::Completed);
    }

    #[tokio::test]
    async fn should_leave_dispatched_jobs_pending_until_abandoned_when_stopped_first() {
        let (pool, sender, receiver, log) = pool(1);
        let dispatcher = TriggerDispatcher::new(
            InMemoryRuleRepo::with(vec![testing::flag_active_orders_rule()]),
            Arc::clone(&log),
            sender,
            ManualClock::new(testing::at("2024-01-01T12:00:00Z")),
        );

        let dispatched = dispatcher
            .dispatch(testing::order_notification(
                "1",
                EventKind::Updated,
                None,
                Some(testing::snapshot([("status", "active".into())])),
            ))
            .await
            .unwrap();
        assert_eq!(dispatched, 1);
        assert_eq!(log.all()[0].status, ExecutionStatus::Pending);

        let (_shutdown_tx, shutdown_rx) = watch::channel(true);
        pool.run(receiver, shutdown_rx).await;

        let records = log.all();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, ExecutionStatus::Pending);

        let abandoned = log
            .abandon_incomplete(testing::at("2024-01-01T12:05:00Z"))
            .await
            .unwrap();
        assert_eq!(abandoned, 1);
        assert_eq!(log.all()[0].status, ExecutionStatus::Abandoned);
    }
}
