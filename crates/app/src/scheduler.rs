//! Scheduler: submits jobs for schedule rules whose cron matches the
//! current UTC minute.
//!
//! Each rule is submitted at most once per minute: the tick is recorded on
//! the rule through [`RuleRepository::record_scheduled_tick`] before the job
//! goes out, so a second tick within the same minute (or a restart) finds it
//! already claimed. Running several schedulers against one store still needs
//! a single elected leader.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use autorule_domain::context::TriggerContext;
use autorule_domain::error::AutoruleError;
use autorule_domain::rule::TriggerKind;
use autorule_domain::time;

use crate::job;
use crate::ports::{Clock, ExecutionLogStore, JobSink, RuleRepository};

/// Periodic cron matcher feeding the job queue.
///
/// `cadence` must stay well under a minute: a late tick is skipped, not
/// replayed, so a cadence close to 60 seconds can step over a whole minute.
pub struct Scheduler<R, L, S, C> {
    rules: R,
    log: L,
    sink: S,
    clock: C,
    cadence: Duration,
}

impl<R, L, S, C> Scheduler<R, L, S, C>
where
    R: RuleRepository,
    L: ExecutionLogStore,
    S: JobSink,
    C: Clock,
{
    pub fn new(rules: R, log: L, sink: S, clock: C, cadence: Duration) -> Self {
        Self {
            rules,
            log,
            sink,
            clock,
            cadence,
        }
    }

    /// Evaluate the current minute once. Returns how many jobs were submitted.
    ///
    /// # Errors
    ///
    /// Returns a storage error if rules cannot be listed, the tick cannot be
    /// recorded or the `Pending` record cannot be written, or
    /// [`AutoruleError::QueueClosed`] if the queue is gone.
    pub async fn tick(&self) -> Result<usize, AutoruleError> {
        let tick = time::floor_minute(self.clock.now());
        let rules = self
            .rules
            .list_active(None, TriggerKind::Schedule)
            .await?;

        let mut submitted = 0;
        for rule in rules {
            if !rule.trigger.matches_tick(tick) {
                continue;
            }
            if rule.last_scheduled_tick.is_some_and(|last| last >= tick) {
                tracing::debug!(rule_id = %rule.id, %tick, "tick already submitted");
                continue;
            }
            if !self.rules.record_scheduled_tick(rule.id, tick).await? {
                continue;
            }

            let rule_id = rule.id;
            let context = TriggerContext::from_tick(rule.tenant_id.clone(), tick);
            let execution_id = job::enqueue(
                &self.log,
                &self.sink,
                Arc::new(rule),
                Arc::new(context),
                self.clock.now(),
            )
            .await?;
            tracing::info!(%rule_id, %tick, %execution_id, "scheduled evaluation job submitted");
            submitted += 1;
        }
        Ok(submitted)
    }

    /// Tick at the configured cadence until `shutdown` flips.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.cadence);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = interval.tick() => match self.tick().await {
                    Ok(_) => {}
                    Err(AutoruleError::QueueClosed) => {
                        tracing::error!("job queue closed, scheduler stopping");
                        break;
                    }
                    Err(error) => tracing::error!(%error, "scheduler tick failed"),
                },
            }
        }
        tracing::info!("scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autorule_domain::change::EventKind;
    use autorule_domain::context::TriggerSource;
    use autorule_domain::id::TenantId;
    use autorule_domain::rule::Rule;
    use chrono::TimeDelta;

    use autorule_domain::execution::{ExecutionStatus, TriggerSnapshot};

    use crate::clock::ManualClock;
    use crate::testing::{self, InMemoryExecutionLog, InMemoryRuleRepo, SpyJobSink};

    type TestScheduler =
        Scheduler<Arc<InMemoryRuleRepo>, Arc<InMemoryExecutionLog>, Arc<SpyJobSink>, ManualClock>;

    fn nightly(tenant: &str) -> Rule {
        Rule::builder()
            .tenant(tenant)
            .name("Nightly")
            .schedule("0 2 * * *")
            .build()
            .unwrap()
    }

    fn scheduler(
        rules: Vec<Rule>,
        clock: &ManualClock,
    ) -> (TestScheduler, Arc<SpyJobSink>) {
        let (scheduler, _, sink) = scheduler_with_log(rules, clock);
        (scheduler, sink)
    }

    fn scheduler_with_log(
        rules: Vec<Rule>,
        clock: &ManualClock,
    ) -> (TestScheduler, Arc<InMemoryExecutionLog>, Arc<SpyJobSink>) {
        let log = Arc::new(InMemoryExecutionLog::default());
        let sink = Arc::new(SpyJobSink::default());
        let scheduler = Scheduler::new(
            Arc::new(InMemoryRuleRepo::with(rules)),
            Arc::clone(&log),
            Arc::clone(&sink),
            clock.clone(),
            Duration::from_secs(30),
        );
        (scheduler, log, sink)
    }

    #[tokio::test]
    async fn should_record_pending_execution_for_scheduled_job() {
        let clock = ManualClock::new(testing::at("2024-01-01T02:00:20Z"));
        let (scheduler, log, sink) = scheduler_with_log(vec![nightly("acme")], &clock);

        scheduler.tick().await.unwrap();

        let records = log.all();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, ExecutionStatus::Pending);
        assert_eq!(records[0].id, sink.jobs()[0].record.id);
        assert_eq!(
            records[0].trigger,
            TriggerSnapshot::Schedule {
                tick: testing::at("2024-01-01T02:00:00Z")
            }
        );
    }

    #[tokio::test]
    async fn should_submit_once_at_matching_minute_and_not_next_minute() {
        let clock = ManualClock::new(testing::at("2024-01-01T02:00:00Z"));
        let (scheduler, sink) = scheduler(vec![nightly("acme")], &clock);

        assert_eq!(scheduler.tick().await.unwrap(), 1);
        let jobs = sink.jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(
            jobs[0].context.source,
            TriggerSource::Schedule {
                tick: testing::at("2024-01-01T02:00:00Z")
            }
        );

        clock.set(testing::at("2024-01-01T02:01:00Z"));
        assert_eq!(scheduler.tick().await.unwrap(), 0);
        assert_eq!(sink.jobs().len(), 1);
    }

    #[tokio::test]
    async fn should_be_idempotent_within_a_minute() {
        let clock = ManualClock::new(testing::at("2024-01-01T02:00:05Z"));
        let (scheduler, sink) = scheduler(vec![nightly("acme")], &clock);

        assert_eq!(scheduler.tick().await.unwrap(), 1);
        clock.advance(TimeDelta::seconds(30));
        assert_eq!(scheduler.tick().await.unwrap(), 0);
        assert_eq!(sink.jobs().len(), 1);
        assert_eq!(
            sink.jobs()[0].context.fired_at,
            testing::at("2024-01-01T02:00:00Z")
        );
    }

    #[tokio::test]
    async fn should_fire_again_on_next_matching_day() {
        let clock = ManualClock::new(testing::at("2024-01-01T02:00:00Z"));
        let (scheduler, sink) = scheduler(vec![nightly("acme")], &clock);

        scheduler.tick().await.unwrap();
        clock.advance(TimeDelta::days(1));
        assert_eq!(scheduler.tick().await.unwrap(), 1);
        assert_eq!(sink.jobs().len(), 2);
    }

    #[tokio::test]
    async fn should_schedule_rules_of_every_tenant() {
        let clock = ManualClock::new(testing::at("2024-01-01T02:00:00Z"));
        let (scheduler, sink) = scheduler(vec![nightly("acme"), nightly("globex")], &clock);

        assert_eq!(scheduler.tick().await.unwrap(), 2);
        let mut tenants: Vec<TenantId> = sink
            .jobs()
            .iter()
            .map(|j| j.context.tenant_id.clone())
            .collect();
        tenants.sort();
        assert_eq!(tenants, [TenantId::new("acme"), TenantId::new("globex")]);
    }

    #[tokio::test]
    async fn should_ignore_inactive_and_event_rules() {
        let mut inactive = nightly("acme");
        inactive.active = false;
        let event = Rule::builder()
            .tenant("acme")
            .name("On update")
            .on_event("order", EventKind::Updated)
            .build()
            .unwrap();
        let clock = ManualClock::new(testing::at("2024-01-01T02:00:00Z"));
        let (scheduler, sink) = scheduler(vec![inactive, event], &clock);

        assert_eq!(scheduler.tick().await.unwrap(), 0);
        assert!(sink.jobs().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn should_tick_until_shutdown() {
        let clock = ManualClock::new(testing::at("2024-01-01T02:00:00Z"));
        let (scheduler, sink) = scheduler(vec![nightly("acme")], &clock);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move { scheduler.run(shutdown_rx).await });
        // The first interval tick completes immediately.
        while sink.jobs().is_empty() {
            tokio::task::yield_now().await;
        }
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(sink.jobs().len(), 1);
    }
}
