//! Rule service: use-cases for managing rules.

use autorule_domain::error::{AutoruleError, ConflictError, NotFoundError};
use autorule_domain::id::{RuleId, TenantId};
use autorule_domain::rule::Rule;
use autorule_domain::time::now;

use crate::ports::RuleRepository;

/// Application service for rule CRUD.
///
/// Definition errors are caught here, at save time; the engine itself
/// never validates rules.
pub struct RuleService<R> {
    repo: R,
}

impl<R: RuleRepository> RuleService<R> {
    /// Create a new service backed by the given repository.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Create a new rule after validating it and checking its name is free.
    ///
    /// # Errors
    ///
    /// Returns [`AutoruleError::Validation`] if the definition is invalid,
    /// [`AutoruleError::Conflict`] if the tenant already has a rule with
    /// that name, or a storage error from the repository.
    #[tracing::instrument(skip(self, rule), fields(tenant = %rule.tenant_id, rule_name = %rule.name))]
    pub async fn create_rule(&self, mut rule: Rule) -> Result<Rule, AutoruleError> {
        rule.validate()?;
        self.ensure_name_free(&rule).await?;
        let ts = now();
        rule.created_at = ts;
        rule.updated_at = ts;
        rule.last_scheduled_tick = None;
        self.repo.create(rule).await
    }

    /// Look up a tenant's rule by id.
    ///
    /// # Errors
    ///
    /// Returns [`AutoruleError::NotFound`] when no rule with `id` exists for
    /// this tenant, or a storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn get_rule(&self, tenant_id: &TenantId, id: RuleId) -> Result<Rule, AutoruleError> {
        self.repo
            .get_by_id(id)
            .await?
            .filter(|rule| rule.tenant_id == *tenant_id)
            .ok_or_else(|| {
                NotFoundError {
                    entity: "Rule",
                    id: id.to_string(),
                }
                .into()
            })
    }

    /// List a tenant's rules.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_rules(&self, tenant_id: &TenantId) -> Result<Vec<Rule>, AutoruleError> {
        self.repo.list(tenant_id).await
    }

    /// Replace an existing rule's definition.
    ///
    /// `created_at` and the scheduler bookkeeping are kept from the stored
    /// rule. In-flight executions of the old definition are not affected.
    ///
    /// # Errors
    ///
    /// Returns [`AutoruleError::Validation`], [`AutoruleError::NotFound`],
    /// [`AutoruleError::Conflict`] on a name clash, or a storage error.
    #[tracing::instrument(skip(self, rule), fields(rule_id = %rule.id))]
    pub async fn update_rule(&self, mut rule: Rule) -> Result<Rule, AutoruleError> {
        rule.validate()?;
        let existing = self.get_rule(&rule.tenant_id, rule.id).await?;
        if existing.name != rule.name {
            self.ensure_name_free(&rule).await?;
        }
        rule.created_at = existing.created_at;
        rule.last_scheduled_tick = existing.last_scheduled_tick;
        rule.updated_at = now();
        self.repo.update(rule).await
    }

    /// Activate or deactivate a rule. Deactivation only suppresses future
    /// dispatches; jobs already submitted still run.
    ///
    /// # Errors
    ///
    /// Returns [`AutoruleError::NotFound`] or a storage error.
    #[tracing::instrument(skip(self))]
    pub async fn set_active(
        &self,
        tenant_id: &TenantId,
        id: RuleId,
        active: bool,
    ) -> Result<Rule, AutoruleError> {
        let mut rule = self.get_rule(tenant_id, id).await?;
        if rule.active == active {
            return Ok(rule);
        }
        rule.active = active;
        rule.updated_at = now();
        self.repo.update(rule).await
    }

    /// Delete a tenant's rule. Its execution records are kept.
    ///
    /// # Errors
    ///
    /// Returns [`AutoruleError::NotFound`] or a storage error.
    #[tracing::instrument(skip(self))]
    pub async fn delete_rule(&self, tenant_id: &TenantId, id: RuleId) -> Result<(), AutoruleError> {
        self.get_rule(tenant_id, id).await?;
        self.repo.delete(id).await
    }

    async fn ensure_name_free(&self, rule: &Rule) -> Result<(), AutoruleError> {
        match self.repo.find_by_name(&rule.tenant_id, &rule.name).await? {
            Some(other) if other.id != rule.id => Err(ConflictError {
                entity: "Rule",
                key: rule.name.clone(),
            }
            .into()),
            _ => Ok(()),
        }
    }
}
