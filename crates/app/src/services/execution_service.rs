//! Execution service: read access to the execution log.

use autorule_domain::error::{AutoruleError, NotFoundError};
use autorule_domain::execution::ExecutionRecord;
use autorule_domain::id::{ExecutionId, TenantId};

use crate::ports::{ExecutionLogStore, ExecutionQuery};

/// Application service for querying execution records.
pub struct ExecutionService<L> {
    log: L,
}

impl<L: ExecutionLogStore> ExecutionService<L> {
    /// Create a new service backed by the given log store.
    pub fn new(log: L) -> Self {
        Self { log }
    }

    /// Look up a tenant's execution record by id.
    ///
    /// # Errors
    ///
    /// Returns [`AutoruleError::NotFound`] when no record with `id` exists
    /// for this tenant, or a storage error from the log store.
    #[tracing::instrument(skip(self))]
    pub async fn get_execution(
        &self,
        tenant_id: &TenantId,
        id: ExecutionId,
    ) -> Result<ExecutionRecord, AutoruleError> {
        self.log
            .get_by_id(id)
            .await?
            .filter(|record| record.tenant_id == *tenant_id)
            .ok_or_else(|| {
                NotFoundError {
                    entity: "Execution",
                    id: id.to_string(),
                }
                .into()
            })
    }

    /// A tenant's records matching `query`, newest first.
    ///
    /// The query is always scoped to `tenant_id`, whatever tenant it names.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the log store.
    #[tracing::instrument(skip(self))]
    pub async fn list_executions(
        &self,
        tenant_id: &TenantId,
        query: ExecutionQuery,
    ) -> Result<Vec<ExecutionRecord>, AutoruleError> {
        let query = ExecutionQuery {
            tenant_id: Some(tenant_id.clone()),
            ..query
        };
        self.log.query(&query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autorule_domain::execution::ExecutionStatus;
    use autorule_domain::id::RuleId;
    use autorule_domain::rule::Rule;

    use crate::testing::{self, InMemoryExecutionLog};

    fn record(rule: &Rule, subject_id: &str, started_at: &str) -> ExecutionRecord {
        ExecutionRecord::pending(
            rule,
            &testing::updated_order(subject_id, "active", "new"),
            testing::at(started_at),
        )
    }

    async fn seeded() -> (ExecutionService<InMemoryExecutionLog>, Rule, Vec<ExecutionRecord>) {
        let log = InMemoryExecutionLog::default();
        let rule = testing::flag_active_orders_rule();
        let mut records = vec![
            record(&rule, "1", "2024-01-01T10:00:00Z"),
            record(&rule, "2", "2024-01-01T11:00:00Z"),
            record(&rule, "1", "2024-01-01T12:00:00Z"),
        ];
        records[1]
            .fail("boom", testing::at("2024-01-01T11:00:01Z"))
            .unwrap();
        for r in &records {
            log.append(r.clone()).await.unwrap();
        }
        let mut foreign = record(&rule, "1", "2024-01-01T13:00:00Z");
        foreign.tenant_id = TenantId::new("globex");
        log.append(foreign).await.unwrap();
        (ExecutionService::new(log), rule, records)
    }

    #[tokio::test]
    async fn should_get_execution_of_own_tenant_only() {
        let (svc, _, records) = seeded().await;
        let id = records[0].id;

        assert_eq!(
            svc.get_execution(&TenantId::new("acme"), id)
                .await
                .unwrap()
                .id,
            id
        );
        assert!(matches!(
            svc.get_execution(&TenantId::new("globex"), id).await,
            Err(AutoruleError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn should_list_newest_first_with_filters() {
        let (svc, rule, records) = seeded().await;
        let acme = TenantId::new("acme");

        let all = svc
            .list_executions(&acme, ExecutionQuery::default().rule(rule.id))
            .await
            .unwrap();
        let ids: Vec<_> = all.iter().map(|r| r.id).collect();
        assert_eq!(ids, [records[2].id, records[1].id, records[0].id]);

        let failed = svc
            .list_executions(
                &acme,
                ExecutionQuery::default().status(ExecutionStatus::Failed),
            )
            .await
            .unwrap();
        assert_eq!(failed.len(), 1);

        let subject = svc
            .list_executions(&acme, ExecutionQuery::default().subject("order", "1"))
            .await
            .unwrap();
        assert_eq!(subject.len(), 2);

        let window = svc
            .list_executions(
                &acme,
                ExecutionQuery::default().between(
                    testing::at("2024-01-01T10:30:00Z"),
                    testing::at("2024-01-01T12:00:00Z"),
                ),
            )
            .await
            .unwrap();
        assert_eq!(window.len(), 1);

        let limited = svc
            .list_executions(&acme, ExecutionQuery::default().limit(1))
            .await
            .unwrap();
        assert_eq!(limited[0].id, records[2].id);
    }

    #[tokio::test]
    async fn should_scope_listing_to_the_given_tenant() {
        let (svc, _, records) = seeded().await;

        let unscoped = svc
            .list_executions(&TenantId::new("acme"), ExecutionQuery::default())
            .await
            .unwrap();
        assert_eq!(unscoped.len(), records.len());
        assert!(unscoped.iter().all(|r| r.tenant_id.as_str() == "acme"));

        let other_tenant = svc
            .list_executions(
                &TenantId::new("acme"),
                ExecutionQuery::for_tenant(TenantId::new("globex")),
            )
            .await
            .unwrap();
        assert_eq!(other_tenant.len(), records.len());

        let globex = svc
            .list_executions(&TenantId::new("globex"), ExecutionQuery::default())
            .await
            .unwrap();
        assert_eq!(globex.len(), 1);
        let unknown = svc
            .list_executions(
                &TenantId::new("initech"),
                ExecutionQuery::default().rule(RuleId::new()),
            )
            .await
            .unwrap();
        assert!(unknown.is_empty());
    }
}
