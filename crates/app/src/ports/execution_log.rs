//! Execution log port: persistence for execution records.

use std::future::Future;
use std::sync::Arc;

use autorule_domain::error::AutoruleError;
use autorule_domain::execution::{ExecutionRecord, ExecutionStatus, TriggerSnapshot};
use autorule_domain::id::{ExecutionId, RuleId, TenantId};
use autorule_domain::time::Timestamp;

/// Filter for [`ExecutionLogStore::query`]. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionQuery {
    pub tenant_id: Option<TenantId>,
    pub rule_id: Option<RuleId>,
    pub status: Option<ExecutionStatus>,
    pub subject_type: Option<String>,
    pub subject_id: Option<String>,
    /// Inclusive lower bound on `started_at`.
    pub since: Option<Timestamp>,
    /// Exclusive upper bound on `started_at`.
    pub until: Option<Timestamp>,
    pub limit: Option<usize>,
}

impl ExecutionQuery {
    #[must_use]
    pub fn for_tenant(tenant_id: TenantId) -> Self {
        Self {
            tenant_id: Some(tenant_id),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn rule(mut self, rule_id: RuleId) -> Self {
        self.rule_id = Some(rule_id);
        self
    }

    #[must_use]
    pub fn status(mut self, status: ExecutionStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn subject(
        mut self,
        subject_type: impl Into<String>,
        subject_id: impl Into<String>,
    ) -> Self {
        self.subject_type = Some(subject_type.into());
        self.subject_id = Some(subject_id.into());
        self
    }

    #[must_use]
    pub fn between(mut self, since: Timestamp, until: Timestamp) -> Self {
        self.since = Some(since);
        self.until = Some(until);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// In-memory evaluation of the filter, limit excluded.
    #[must_use]
    pub fn matches(&self, record: &ExecutionRecord) -> bool {
        let (subject_type, subject_id) = match &record.trigger {
            TriggerSnapshot::Event {
                subject_type,
                subject_id,
                ..
            } => (Some(subject_type.as_str()), Some(subject_id.as_str())),
            TriggerSnapshot::Schedule { .. } => (None, None),
        };
        self.tenant_id.as_ref().is_none_or(|t| *t == record.tenant_id)
            && self.rule_id.is_none_or(|id| id == record.rule_id)
            && self.status.is_none_or(|s| s == record.status)
            && self
                .subject_type
                .as_deref()
                .is_none_or(|t| subject_type == Some(t))
            && self
                .subject_id
                .as_deref()
                .is_none_or(|id| subject_id == Some(id))
            && self.since.is_none_or(|since| record.started_at >= since)
            && self.until.is_none_or(|until| record.started_at < until)
    }
}

/// Store for [`ExecutionRecord`]s.
///
/// Writes are keyed by record id; concurrent writers to different records
/// never contend.
pub trait ExecutionLogStore {
    /// Persist a new record.
    fn append(
        &self,
        record: ExecutionRecord,
    ) -> impl Future<Output = Result<ExecutionRecord, AutoruleError>> + Send;

    /// Overwrite an existing record.
    ///
    /// Fails with [`AutoruleError::Transition`] when the stored record is
    /// already terminal.
    fn update(
        &self,
        record: ExecutionRecord,
    ) -> impl Future<Output = Result<ExecutionRecord, AutoruleError>> + Send;

    /// Get a record by its unique identifier.
    fn get_by_id(
        &self,
        id: ExecutionId,
    ) -> impl Future<Output = Result<Option<ExecutionRecord>, AutoruleError>> + Send;

    /// Records matching `query`, newest first.
    fn query(
        &self,
        query: &ExecutionQuery,
    ) -> impl Future<Output = Result<Vec<ExecutionRecord>, AutoruleError>> + Send;

    /// Mark every non-terminal record as abandoned, returning how many were.
    fn abandon_incomplete(
        &self,
        now: Timestamp,
    ) -> impl Future<Output = Result<u64, AutoruleError>> + Send;
}

impl<T: ExecutionLogStore + Send + Sync> ExecutionLogStore for Arc<T> {
    fn append(
        &self,
        record: ExecutionRecord,
    ) -> impl Future<Output = Result<ExecutionRecord, AutoruleError>> + Send {
        (**self).append(record)
    }

    fn update(
        &self,
        record: ExecutionRecord,
    ) -> impl Future<Output = Result<ExecutionRecord, AutoruleError>> + Send {
        (**self).update(record)
    }

    fn get_by_id(
        &self,
        id: ExecutionId,
    ) -> impl Future<Output = Result<Option<ExecutionRecord>, AutoruleError>> + Send {
        (**self).get_by_id(id)
    }

    fn query(
        &self,
        query: &ExecutionQuery,
    ) -> impl Future<Output = Result<Vec<ExecutionRecord>, AutoruleError>> + Send {
        (**self).query(query)
    }

    fn abandon_incomplete(
        &self,
        now: Timestamp,
    ) -> impl Future<Output = Result<u64, AutoruleError>> + Send {
        (**self).abandon_incomplete(now)
    }
}
