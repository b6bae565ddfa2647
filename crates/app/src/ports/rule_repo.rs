//! Rule repository port: persistence for rules.

use std::future::Future;
use std::sync::Arc;

use autorule_domain::error::AutoruleError;
use autorule_domain::id::{RuleId, TenantId};
use autorule_domain::rule::{Rule, TriggerKind};
use autorule_domain::time::Timestamp;

/// Repository for persisting and querying [`Rule`]s.
///
/// The engine only reads through this port, apart from
/// [`record_scheduled_tick`](RuleRepository::record_scheduled_tick).
pub trait RuleRepository {
    /// Create a new rule in storage.
    fn create(&self, rule: Rule) -> impl Future<Output = Result<Rule, AutoruleError>> + Send;

    /// Get a rule by its unique identifier.
    fn get_by_id(
        &self,
        id: RuleId,
    ) -> impl Future<Output = Result<Option<Rule>, AutoruleError>> + Send;

    /// Find a tenant's rule by its (unique) name.
    fn find_by_name(
        &self,
        tenant_id: &TenantId,
        name: &str,
    ) -> impl Future<Output = Result<Option<Rule>, AutoruleError>> + Send;

    /// All rules of a tenant, ordered by name.
    fn list(
        &self,
        tenant_id: &TenantId,
    ) -> impl Future<Output = Result<Vec<Rule>, AutoruleError>> + Send;

    /// Active rules with the given trigger kind, for one tenant or for all
    /// tenants when `tenant_id` is `None`.
    fn list_active(
        &self,
        tenant_id: Option<&TenantId>,
        kind: TriggerKind,
    ) -> impl Future<Output = Result<Vec<Rule>, AutoruleError>> + Send;

    /// Replace an existing rule.
    fn update(&self, rule: Rule) -> impl Future<Output = Result<Rule, AutoruleError>> + Send;

    /// Delete a rule by its unique identifier.
    fn delete(&self, id: RuleId) -> impl Future<Output = Result<(), AutoruleError>> + Send;

    /// Advance the rule's last scheduled tick to `tick`.
    ///
    /// Returns `false` without writing when the stored tick is already at or
    /// past `tick`, so two concurrent callers cannot both claim a minute.
    fn record_scheduled_tick(
        &self,
        id: RuleId,
        tick: Timestamp,
    ) -> impl Future<Output = Result<bool, AutoruleError>> + Send;
}

impl<T: RuleRepository + Send + Sync> RuleRepository for Arc<T> {
    fn create(&self, rule: Rule) -> impl Future<Output = Result<Rule, AutoruleError>> + Send {
        (**self).create(rule)
    }

    fn get_by_id(
        &self,
        id: RuleId,
    ) -> impl Future<Output = Result<Option<Rule>, AutoruleError>> + Send {
        (**self).get_by_id(id)
    }

    fn find_by_name(
        &self,
        tenant_id: &TenantId,
        name: &str,
    ) -> impl Future<Output = Result<Option<Rule>, AutoruleError>> + Send {
        (**self).find_by_name(tenant_id, name)
    }

    fn list(
        &self,
        tenant_id: &TenantId,
    ) -> impl Future<Output = Result<Vec<Rule>, AutoruleError>> + Send {
        (**self).list(tenant_id)
    }

    fn list_active(
        &self,
        tenant_id: Option<&TenantId>,
        kind: TriggerKind,
    ) -> impl Future<Output = Result<Vec<Rule>, AutoruleError>> + Send {
        (**self).list_active(tenant_id, kind)
    }

    fn update(&self, rule: Rule) -> impl Future<Output = Result<Rule, AutoruleError>> + Send {
        (**self).update(rule)
    }

    fn delete(&self, id: RuleId) -> impl Future<Output = Result<(), AutoruleError>> + Send {
        (**self).delete(id)
    }

    fn record_scheduled_tick(
        &self,
        id: RuleId,
        tick: Timestamp,
    ) -> impl Future<Output = Result<bool, AutoruleError>> + Send {
        (**self).record_scheduled_tick(id, tick)
    }
}
