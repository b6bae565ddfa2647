//! In-memory port implementations and fixtures shared by the unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use autorule_domain::change::{ChangeNotification, EventKind};
use autorule_domain::context::TriggerContext;
use autorule_domain::error::{AutoruleError, NotFoundError, TransitionError};
use autorule_domain::execution::{ExecutionRecord, ExecutionStatus};
use autorule_domain::id::{ExecutionId, RuleId, TenantId};
use autorule_domain::rule::{Action, Condition, Operator, Rule, TriggerKind};
use autorule_domain::time::Timestamp;
use autorule_domain::value::{Parameters, Snapshot, Value};

use crate::actions::{ActionFault, ActionHandler, ActionOutcome};
use crate::job::EvaluationJob;
use crate::ports::{
    EntityLookup, EntityRef, ExecutionLogStore, ExecutionQuery, JobSink, LookupResult,
    RuleRepository,
};

pub fn at(text: &str) -> Timestamp {
    text.parse().unwrap()
}

pub fn snapshot<const N: usize>(fields: [(&str, Value); N]) -> Snapshot {
    fields
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// `status equal "active"` → `set-field {field: "flag", value: true}` on
/// updated orders of tenant `acme`.
pub fn flag_active_orders_rule() -> Rule {
    Rule::builder()
        .tenant("acme")
        .name("Flag active orders")
        .on_event("order", EventKind::Updated)
        .condition(Condition::new("status", Operator::Equal, "active"))
        .action(
            Action::new(0, "set-field")
                .with_parameter("field", "flag")
                .with_parameter("value", true),
        )
        .build()
        .unwrap()
}

pub fn order_notification(
    subject_id: &str,
    kind: EventKind,
    before: Option<Snapshot>,
    after: Option<Snapshot>,
) -> ChangeNotification {
    ChangeNotification {
        tenant_id: TenantId::new("acme"),
        subject_type: "order".to_string(),
        event_kind: kind,
        subject_id: subject_id.to_string(),
        before,
        after,
    }
}

pub fn updated_order(subject_id: &str, after_status: &str, before_status: &str) -> TriggerContext {
    TriggerContext::from_change(
        order_notification(
            subject_id,
            EventKind::Updated,
            Some(snapshot([("status", Value::from(before_status))])),
            Some(snapshot([("status", Value::from(after_status))])),
        ),
        at("2024-01-01T12:00:00Z"),
    )
}

/// A job carrying a fresh, unpersisted `Pending` record.
pub fn job(rule: Rule, context: TriggerContext) -> EvaluationJob {
    let record = ExecutionRecord::pending(&rule, &context, context.fired_at);
    EvaluationJob::new(Arc::new(rule), Arc::new(context), record)
}

/// A job whose `Pending` record is already in `log`, as dispatch leaves it.
pub async fn enqueued(
    log: &InMemoryExecutionLog,
    rule: Rule,
    context: TriggerContext,
) -> EvaluationJob {
    let job = job(rule, context);
    log.append(job.record.clone()).await.unwrap();
    job
}

pub fn subject_id(context: &TriggerContext) -> &str {
    context.change().map_or("", |n| n.subject_id.as_str())
}

// ── Rule repository ────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryRuleRepo {
    store: Mutex<HashMap<RuleId, Rule>>,
}

impl InMemoryRuleRepo {
    pub fn with(rules: Vec<Rule>) -> Self {
        Self {
            store: Mutex::new(rules.into_iter().map(|r| (r.id, r)).collect()),
        }
    }
}

impl RuleRepository for InMemoryRuleRepo {
    async fn create(&self, rule: Rule) -> Result<Rule, AutoruleError> {
        self.store.lock().unwrap().insert(rule.id, rule.clone());
        Ok(rule)
    }

    async fn get_by_id(&self, id: RuleId) -> Result<Option<Rule>, AutoruleError> {
        Ok(self.store.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_name(
        &self,
        tenant_id: &TenantId,
        name: &str,
    ) -> Result<Option<Rule>, AutoruleError> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .values()
            .find(|r| r.tenant_id == *tenant_id && r.name == name)
            .cloned())
    }

    async fn list(&self, tenant_id: &TenantId) -> Result<Vec<Rule>, AutoruleError> {
        let mut rules: Vec<Rule> = self
            .store
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.tenant_id == *tenant_id)
            .cloned()
            .collect();
        rules.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rules)
    }

    async fn list_active(
        &self,
        tenant_id: Option<&TenantId>,
        kind: TriggerKind,
    ) -> Result<Vec<Rule>, AutoruleError> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.active && r.trigger.kind() == kind)
            .filter(|r| tenant_id.is_none_or(|t| r.tenant_id == *t))
            .cloned()
            .collect())
    }

    async fn update(&self, rule: Rule) -> Result<Rule, AutoruleError> {
        self.store.lock().unwrap().insert(rule.id, rule.clone());
        Ok(rule)
    }

    async fn delete(&self, id: RuleId) -> Result<(), AutoruleError> {
        self.store.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn record_scheduled_tick(
        &self,
        id: RuleId,
        tick: Timestamp,
    ) -> Result<bool, AutoruleError> {
        let mut store = self.store.lock().unwrap();
        let Some(rule) = store.get_mut(&id) else {
            return Ok(false);
        };
        if rule.last_scheduled_tick.is_some_and(|last| last >= tick) {
            return Ok(false);
        }
        rule.last_scheduled_tick = Some(tick);
        Ok(true)
    }
}

// ── Execution log ──────────────────────────────────────────────────

/// Keeps every written version of each record, so tests can check the
/// sequence of persisted statuses.
#[derive(Default)]
pub struct InMemoryExecutionLog {
    records: Mutex<HashMap<ExecutionId, ExecutionRecord>>,
    history: Mutex<Vec<ExecutionRecord>>,
}

impl InMemoryExecutionLog {
    pub fn all(&self) -> Vec<ExecutionRecord> {
        self.records.lock().unwrap().values().cloned().collect()
    }

    pub fn history(&self) -> Vec<ExecutionRecord> {
        self.history.lock().unwrap().clone()
    }
}

impl ExecutionLogStore for InMemoryExecutionLog {
    async fn append(&self, record: ExecutionRecord) -> Result<ExecutionRecord, AutoruleError> {
        self.records
            .lock()
            .unwrap()
            .insert(record.id, record.clone());
        self.history.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn update(&self, record: ExecutionRecord) -> Result<ExecutionRecord, AutoruleError> {
        let mut records = self.records.lock().unwrap();
        let Some(stored) = records.get(&record.id) else {
            return Err(NotFoundError {
                entity: "Execution",
                id: record.id.to_string(),
            }
            .into());
        };
        if stored.is_terminal() {
            return Err(TransitionError {
                from: stored.status,
                to: record.status,
            }
            .into());
        }
        records.insert(record.id, record.clone());
        self.history.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn get_by_id(&self, id: ExecutionId) -> Result<Option<ExecutionRecord>, AutoruleError> {
        Ok(self.records.lock().unwrap().get(&id).cloned())
    }

    async fn query(&self, query: &ExecutionQuery) -> Result<Vec<ExecutionRecord>, AutoruleError> {
        let mut found: Vec<ExecutionRecord> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        if let Some(limit) = query.limit {
            found.truncate(limit);
        }
        Ok(found)
    }

    async fn abandon_incomplete(&self, now: Timestamp) -> Result<u64, AutoruleError> {
        let mut count = 0;
        for record in self.records.lock().unwrap().values_mut() {
            if !record.is_terminal() {
                record
                    .transition(ExecutionStatus::Abandoned, now)
                    .unwrap();
                count += 1;
            }
        }
        Ok(count)
    }
}

// ── Entity lookup ──────────────────────────────────────────────────

#[derive(Default)]
pub struct MapLookup {
    entries: HashMap<(String, String, String), LookupResult>,
    failing: bool,
}

impl MapLookup {
    pub fn with_value(
        mut self,
        entity: (&str, &str),
        field: &str,
        value: impl Into<Value>,
    ) -> Self {
        self.entries.insert(
            (entity.0.to_string(), entity.1.to_string(), field.to_string()),
            LookupResult::Value(value.into()),
        );
        self
    }

    pub fn with_relation(
        mut self,
        entity: (&str, &str),
        field: &str,
        target: (&str, &str),
    ) -> Self {
        self.entries.insert(
            (entity.0.to_string(), entity.1.to_string(), field.to_string()),
            LookupResult::Related(EntityRef::new(target.0, target.1)),
        );
        self
    }

    /// Every lookup fails with a storage error.
    pub fn failing() -> Self {
        Self {
            entries: HashMap::new(),
            failing: true,
        }
    }
}

impl EntityLookup for MapLookup {
    async fn lookup(
        &self,
        _tenant_id: &TenantId,
        entity: &EntityRef,
        field: &str,
    ) -> Result<LookupResult, AutoruleError> {
        if self.failing {
            return Err(AutoruleError::Storage("lookup backend offline".into()));
        }
        let key = (
            entity.entity_type.clone(),
            entity.entity_id.clone(),
            field.to_string(),
        );
        Ok(self
            .entries
            .get(&key)
            .cloned()
            .unwrap_or(LookupResult::NotFound))
    }
}

// ── Job sink ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct SpyJobSink {
    jobs: Mutex<Vec<EvaluationJob>>,
}

impl SpyJobSink {
    pub fn jobs(&self) -> Vec<EvaluationJob> {
        self.jobs.lock().unwrap().clone()
    }
}

impl JobSink for SpyJobSink {
    async fn submit(&self, job: EvaluationJob) -> Result<(), AutoruleError> {
        self.jobs.lock().unwrap().push(job);
        Ok(())
    }
}

// ── Action handlers ────────────────────────────────────────────────

/// Succeeds and records the `(action_type, parameters)` it was called with.
#[derive(Default, Clone)]
pub struct RecordingHandler {
    calls: Arc<Mutex<Vec<Parameters>>>,
}

impl RecordingHandler {
    pub fn calls(&self) -> Vec<Parameters> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActionHandler for RecordingHandler {
    async fn execute(
        &self,
        parameters: &Parameters,
        _context: &TriggerContext,
    ) -> Result<ActionOutcome, ActionFault> {
        self.calls.lock().unwrap().push(parameters.clone());
        Ok(ActionOutcome::success("done").with_effect(Value::Boolean(true)))
    }
}

/// Reports a business failure.
pub struct RejectingHandler;

#[async_trait]
impl ActionHandler for RejectingHandler {
    async fn execute(
        &self,
        _parameters: &Parameters,
        _context: &TriggerContext,
    ) -> Result<ActionOutcome, ActionFault> {
        Ok(ActionOutcome::failure("recipient unknown"))
    }
}

/// Returns an unexpected fault.
pub struct FaultyHandler;

#[async_trait]
impl ActionHandler for FaultyHandler {
    async fn execute(
        &self,
        _parameters: &Parameters,
        _context: &TriggerContext,
    ) -> Result<ActionOutcome, ActionFault> {
        Err("connection reset".into())
    }
}

pub struct PanickingHandler;

#[async_trait]
impl ActionHandler for PanickingHandler {
    async fn execute(
        &self,
        _parameters: &Parameters,
        _context: &TriggerContext,
    ) -> Result<ActionOutcome, ActionFault> {
        panic!("handler bug");
    }
}

/// Sleeps before succeeding.
pub struct SlowHandler(pub Duration);

#[async_trait]
impl ActionHandler for SlowHandler {
    async fn execute(
        &self,
        _parameters: &Parameters,
        _context: &TriggerContext,
    ) -> Result<ActionOutcome, ActionFault> {
        tokio::time::sleep(self.0).await;
        Ok(ActionOutcome::success("slept"))
    }
}
