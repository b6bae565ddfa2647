//! Trigger dispatcher: turns change notifications into evaluation jobs.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use autorule_domain::change::ChangeNotification;
use autorule_domain::context::TriggerContext;
use autorule_domain::error::AutoruleError;
use autorule_domain::rule::TriggerKind;

use crate::job;
use crate::ports::{Clock, ExecutionLogStore, JobSink, RuleRepository};

/// Matches notifications against active event rules and submits one job
/// per matching rule. Holds no state between notifications.
pub struct TriggerDispatcher<R, L, S, C> {
    rules: R,
    log: L,
    sink: S,
    clock: C,
}

impl<R, L, S, C> TriggerDispatcher<R, L, S, C>
where
    R: RuleRepository,
    L: ExecutionLogStore,
    S: JobSink,
    C: Clock,
{
    pub fn new(rules: R, log: L, sink: S, clock: C) -> Self {
        Self {
            rules,
            log,
            sink,
            clock,
        }
    }

    /// Record a `Pending` execution and submit a job for every active rule
    /// of the notification's tenant whose subject type and event kind match
    /// exactly. Returns how many were submitted.
    ///
    /// # Errors
    ///
    /// Returns a storage error if rules cannot be listed or a record cannot
    /// be written, or [`AutoruleError::QueueClosed`] if the queue is gone.
    /// Jobs submitted before the failure stay submitted.
    #[tracing::instrument(
        skip_all,
        fields(
            tenant = %notification.tenant_id,
            subject_type = %notification.subject_type,
            subject_id = %notification.subject_id,
            event_kind = %notification.event_kind,
        )
    )]
    pub async fn dispatch(
        &self,
        notification: ChangeNotification,
    ) -> Result<usize, AutoruleError> {
        let rules = self
            .rules
            .list_active(Some(&notification.tenant_id), TriggerKind::Event)
            .await?;
        let matching: Vec<_> = rules
            .into_iter()
            .filter(|rule| rule.trigger.matches_change(&notification))
            .collect();
        if matching.is_empty() {
            return Ok(0);
        }

        let fired_at = self.clock.now();
        let context = Arc::new(TriggerContext::from_change(notification, fired_at));
        let mut submitted = 0;
        for rule in matching {
            let rule_id = rule.id;
            let rule_name = rule.name.clone();
            let execution_id = job::enqueue(
                &self.log,
                &self.sink,
                Arc::new(rule),
                Arc::clone(&context),
                fired_at,
            )
            .await?;
            tracing::info!(%rule_id, %rule_name, %execution_id, "evaluation job submitted");
            submitted += 1;
        }
        Ok(submitted)
    }

    /// Dispatch notifications from `feed` until `shutdown` flips or the feed
    /// closes.
    ///
    /// A lagging subscriber loses notifications; the loss is logged and the
    /// loop carries on.
    pub async fn run(
        &self,
        feed: broadcast::Receiver<ChangeNotification>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut stream = BroadcastStream::new(feed);
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
                item = stream.next() => match item {
                    Some(Ok(notification)) => match self.dispatch(notification).await {
                        Ok(_) => {}
                        Err(AutoruleError::QueueClosed) => {
                            tracing::error!("job queue closed, dispatcher stopping");
                            break;
                        }
                        Err(error) => tracing::error!(%error, "dispatch failed"),
                    },
                    Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                        tracing::warn!(skipped, "change feed lagged, notifications dropped");
                    }
                    None => break,
                },
            }
        }
        tracing::info!("trigger dispatcher stopped");
    }
}
