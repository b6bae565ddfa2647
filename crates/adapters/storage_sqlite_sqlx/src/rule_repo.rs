//! `SQLite` implementation of [`RuleRepository`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use autorule_app::ports::RuleRepository;
use autorule_domain::error::{AutoruleError, NotFoundError};
use autorule_domain::id::{RuleId, TenantId};
use autorule_domain::rule::{Rule, TriggerKind};
use autorule_domain::time::Timestamp;

use crate::column::{decode_json, decode_opt_ts, decode_tag, decode_ts, encode_json, encode_ts};
use crate::error::{StorageError, conflict_or_storage};

struct Wrapper(Rule);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<Rule> {
        value.map(|w| w.0)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: uuid::Uuid = row.try_get("id")?;
        let tenant_id: String = row.try_get("tenant_id")?;
        let trigger_json: String = row.try_get("trigger_data")?;
        let combination: String = row.try_get("combination")?;
        let delay: Option<i64> = row.try_get("execution_delay_secs")?;
        let conditions_json: String = row.try_get("conditions")?;
        let actions_json: String = row.try_get("actions")?;
        let last_tick: Option<String> = row.try_get("last_scheduled_tick")?;
        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;

        Ok(Self(Rule {
            id: RuleId::from_uuid(id),
            tenant_id: TenantId::new(tenant_id),
            name: row.try_get("name")?,
            trigger: decode_json(&trigger_json)?,
            combination: decode_tag(combination)?,
            active: row.try_get("active")?,
            execution_delay_secs: delay.and_then(|secs| u64::try_from(secs).ok()),
            conditions: decode_json(&conditions_json)?,
            actions: decode_json(&actions_json)?,
            last_scheduled_tick: decode_opt_ts(last_tick)?,
            created_at: decode_ts(&created_at)?,
            updated_at: decode_ts(&updated_at)?,
        }))
    }
}

/// Rule columns in bind order, shared by insert and update.
struct Columns {
    trigger_kind: &'static str,
    trigger: String,
    combination: &'static str,
    delay: Option<i64>,
    conditions: String,
    actions: String,
    last_scheduled_tick: Option<String>,
    created_at: String,
    updated_at: String,
}

impl Columns {
    fn encode(rule: &Rule) -> Result<Self, StorageError> {
        Ok(Self {
            trigger_kind: rule.trigger.kind().as_str(),
            trigger: encode_json(&rule.trigger)?,
            combination: rule.combination.as_str(),
            delay: rule
                .execution_delay_secs
                .map(|secs| i64::try_from(secs).unwrap_or(i64::MAX)),
            conditions: encode_json(&rule.conditions)?,
            actions: encode_json(&rule.actions)?,
            last_scheduled_tick: rule.last_scheduled_tick.map(encode_ts),
            created_at: encode_ts(rule.created_at),
            updated_at: encode_ts(rule.updated_at),
        })
    }
}

const INSERT: &str = r"
    INSERT INTO rules (
        id, tenant_id, name, trigger_kind, trigger_data, combination, active,
        execution_delay_secs, conditions, actions, last_scheduled_tick,
        created_at, updated_at
    )
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
";

const UPDATE: &str = r"
    UPDATE rules SET
        tenant_id = ?, name = ?, trigger_kind = ?, trigger_data = ?,
        combination = ?, active = ?, execution_delay_secs = ?, conditions = ?,
        actions = ?, last_scheduled_tick = ?, created_at = ?, updated_at = ?
    WHERE id = ?
";

const SELECT_BY_ID: &str = "SELECT * FROM rules WHERE id = ?";
const SELECT_BY_NAME: &str = "SELECT * FROM rules WHERE tenant_id = ? AND name = ?";
const SELECT_BY_TENANT: &str = "SELECT * FROM rules WHERE tenant_id = ? ORDER BY name";
const SELECT_ACTIVE: &str =
    "SELECT * FROM rules WHERE active = 1 AND trigger_kind = ? ORDER BY tenant_id, name";
const SELECT_ACTIVE_FOR_TENANT: &str =
    "SELECT * FROM rules WHERE active = 1 AND trigger_kind = ? AND tenant_id = ? ORDER BY name";
const CLAIM_TICK: &str = r"
    UPDATE rules SET last_scheduled_tick = ?
    WHERE id = ? AND (last_scheduled_tick IS NULL OR last_scheduled_tick < ?)
";

/// `SQLite`-backed rule repository.
#[derive(Clone)]
pub struct SqliteRuleRepository {
    pool: SqlitePool,
}

impl SqliteRuleRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl RuleRepository for SqliteRuleRepository {
    async fn create(&self, rule: Rule) -> Result<Rule, AutoruleError> {
        let columns = Columns::encode(&rule)?;

        sqlx::query(INSERT)
            .bind(rule.id.as_uuid())
            .bind(rule.tenant_id.as_str())
            .bind(&rule.name)
            .bind(columns.trigger_kind)
            .bind(&columns.trigger)
            .bind(columns.combination)
            .bind(rule.active)
            .bind(columns.delay)
            .bind(&columns.conditions)
            .bind(&columns.actions)
            .bind(&columns.last_scheduled_tick)
            .bind(&columns.created_at)
            .bind(&columns.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|err| conflict_or_storage(err, "Rule", &rule.name))?;

        Ok(rule)
    }

    async fn get_by_id(&self, id: RuleId) -> Result<Option<Rule>, AutoruleError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(Wrapper::maybe(row))
    }

    async fn find_by_name(
        &self,
        tenant_id: &TenantId,
        name: &str,
    ) -> Result<Option<Rule>, AutoruleError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_NAME)
            .bind(tenant_id.as_str())
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(Wrapper::maybe(row))
    }

    async fn list(&self, tenant_id: &TenantId) -> Result<Vec<Rule>, AutoruleError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_BY_TENANT)
            .bind(tenant_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn list_active(
        &self,
        tenant_id: Option<&TenantId>,
        kind: TriggerKind,
    ) -> Result<Vec<Rule>, AutoruleError> {
        let query = match tenant_id {
            Some(tenant_id) => sqlx::query_as(SELECT_ACTIVE_FOR_TENANT)
                .bind(kind.as_str())
                .bind(tenant_id.as_str()),
            None => sqlx::query_as(SELECT_ACTIVE).bind(kind.as_str()),
        };
        let rows: Vec<Wrapper> = query
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn update(&self, rule: Rule) -> Result<Rule, AutoruleError> {
        let columns = Columns::encode(&rule)?;

        let result = sqlx::query(UPDATE)
            .bind(rule.tenant_id.as_str())
            .bind(&rule.name)
            .bind(columns.trigger_kind)
            .bind(&columns.trigger)
            .bind(columns.combination)
            .bind(rule.active)
            .bind(columns.delay)
            .bind(&columns.conditions)
            .bind(&columns.actions)
            .bind(&columns.last_scheduled_tick)
            .bind(&columns.created_at)
            .bind(&columns.updated_at)
            .bind(rule.id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|err| conflict_or_storage(err, "Rule", &rule.name))?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError {
                entity: "Rule",
                id: rule.id.to_string(),
            }
            .into());
        }
        Ok(rule)
    }

    async fn delete(&self, id: RuleId) -> Result<(), AutoruleError> {
        sqlx::query("DELETE FROM rules WHERE id = ?")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }

    async fn record_scheduled_tick(
        &self,
        id: RuleId,
        tick: Timestamp,
    ) -> Result<bool, AutoruleError> {
        let tick = encode_ts(tick);
        let result = sqlx::query(CLAIM_TICK)
            .bind(&tick)
            .bind(id.as_uuid())
            .bind(&tick)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(result.rows_affected() == 1)
    }
}
