//! `SQLite` implementation of [`ExecutionLogStore`].

use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, QueryBuilder, Row, Sqlite, SqlitePool};

use autorule_app::ports::{ExecutionLogStore, ExecutionQuery};
use autorule_domain::error::{AutoruleError, NotFoundError, TransitionError};
use autorule_domain::execution::{ExecutionRecord, ExecutionStatus, TriggerSnapshot};
use autorule_domain::id::{ExecutionId, RuleId, TenantId};
use autorule_domain::rule::TriggerKind;
use autorule_domain::time::Timestamp;

use crate::column::{decode_json, decode_opt_ts, decode_ts, encode_json, encode_ts};
use crate::error::StorageError;

struct Wrapper(ExecutionRecord);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<ExecutionRecord> {
        value.map(|w| w.0)
    }
}

fn decode_err(err: impl std::error::Error + Send + Sync + 'static) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(err))
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: uuid::Uuid = row.try_get("id")?;
        let tenant_id: String = row.try_get("tenant_id")?;
        let rule_id: uuid::Uuid = row.try_get("rule_id")?;
        let trigger_kind: String = row.try_get("trigger_kind")?;
        let trigger_json: String = row.try_get("trigger_data")?;
        let status: String = row.try_get("status")?;
        let conditions_json: String = row.try_get("conditions")?;
        let steps_json: String = row.try_get("steps")?;
        let delayed_until: Option<String> = row.try_get("delayed_until")?;
        let started_at: String = row.try_get("started_at")?;
        let finished_at: Option<String> = row.try_get("finished_at")?;

        Ok(Self(ExecutionRecord {
            id: ExecutionId::from_uuid(id),
            tenant_id: TenantId::new(tenant_id),
            rule_id: RuleId::from_uuid(rule_id),
            rule_name: row.try_get("rule_name")?,
            trigger_kind: TriggerKind::from_str(&trigger_kind).map_err(decode_err)?,
            trigger: decode_json(&trigger_json)?,
            status: ExecutionStatus::from_str(&status).map_err(decode_err)?,
            conditions: decode_json(&conditions_json)?,
            steps: decode_json(&steps_json)?,
            error: row.try_get("error")?,
            delayed_until: decode_opt_ts(delayed_until)?,
            started_at: decode_ts(&started_at)?,
            finished_at: decode_opt_ts(finished_at)?,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO executions (
        id, tenant_id, rule_id, rule_name, trigger_kind, trigger_data,
        subject_type, subject_id, status, conditions, steps, error,
        delayed_until, started_at, finished_at
    )
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
";

/// Terminal records are never rewritten.
const UPDATE_OPEN: &str = r"
    UPDATE executions SET
        status = ?, conditions = ?, steps = ?, error = ?, delayed_until = ?,
        finished_at = ?
    WHERE id = ?
      AND status NOT IN ('conditions_not_met', 'completed', 'failed', 'abandoned')
";

const ABANDON_OPEN: &str = r"
    UPDATE executions SET status = 'abandoned', delayed_until = NULL, finished_at = ?
    WHERE status NOT IN ('conditions_not_met', 'completed', 'failed', 'abandoned')
";

const SELECT_BY_ID: &str = "SELECT * FROM executions WHERE id = ?";
const SELECT_STATUS: &str = "SELECT status FROM executions WHERE id = ?";

fn subject(record: &ExecutionRecord) -> (Option<&str>, Option<&str>) {
    match &record.trigger {
        TriggerSnapshot::Event {
            subject_type,
            subject_id,
            ..
        } => (Some(subject_type.as_str()), Some(subject_id.as_str())),
        TriggerSnapshot::Schedule { .. } => (None, None),
    }
}

/// `SQLite`-backed execution log.
#[derive(Clone)]
pub struct SqliteExecutionLogStore {
    pool: SqlitePool,
}

impl SqliteExecutionLogStore {
    /// Create a new log store using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Explain why an update touched no row.
    async fn rejected_update(&self, record: &ExecutionRecord) -> AutoruleError {
        let stored: Result<Option<(String,)>, _> = sqlx::query_as(SELECT_STATUS)
            .bind(record.id.as_uuid())
            .fetch_optional(&self.pool)
            .await;
        match stored {
            Ok(None) => NotFoundError {
                entity: "Execution",
                id: record.id.to_string(),
            }
            .into(),
            Ok(Some((status,))) => match ExecutionStatus::from_str(&status) {
                Ok(from) => TransitionError {
                    from,
                    to: record.status,
                }
                .into(),
                Err(err) => StorageError::from(decode_err(err)).into(),
            },
            Err(err) => StorageError::from(err).into(),
        }
    }
}

impl ExecutionLogStore for SqliteExecutionLogStore {
    async fn append(&self, record: ExecutionRecord) -> Result<ExecutionRecord, AutoruleError> {
        let trigger_json = encode_json(&record.trigger)?;
        let conditions_json = encode_json(&record.conditions)?;
        let steps_json = encode_json(&record.steps)?;
        let (subject_type, subject_id) = subject(&record);

        sqlx::query(INSERT)
            .bind(record.id.as_uuid())
            .bind(record.tenant_id.as_str())
            .bind(record.rule_id.as_uuid())
            .bind(&record.rule_name)
            .bind(record.trigger_kind.as_str())
            .bind(&trigger_json)
            .bind(subject_type)
            .bind(subject_id)
            .bind(record.status.as_str())
            .bind(&conditions_json)
            .bind(&steps_json)
            .bind(&record.error)
            .bind(record.delayed_until.map(encode_ts))
            .bind(encode_ts(record.started_at))
            .bind(record.finished_at.map(encode_ts))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(record)
    }

    async fn update(&self, record: ExecutionRecord) -> Result<ExecutionRecord, AutoruleError> {
        let conditions_json = encode_json(&record.conditions)?;
        let steps_json = encode_json(&record.steps)?;

        let result = sqlx::query(UPDATE_OPEN)
            .bind(record.status.as_str())
            .bind(&conditions_json)
            .bind(&steps_json)
            .bind(&record.error)
            .bind(record.delayed_until.map(encode_ts))
            .bind(record.finished_at.map(encode_ts))
            .bind(record.id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        if result.rows_affected() == 0 {
            return Err(self.rejected_update(&record).await);
        }
        Ok(record)
    }

    async fn get_by_id(&self, id: ExecutionId) -> Result<Option<ExecutionRecord>, AutoruleError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(Wrapper::maybe(row))
    }

    async fn query(&self, query: &ExecutionQuery) -> Result<Vec<ExecutionRecord>, AutoruleError> {
        let mut builder: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("SELECT * FROM executions WHERE 1 = 1");
        if let Some(tenant_id) = &query.tenant_id {
            builder
                .push(" AND tenant_id = ")
                .push_bind(tenant_id.as_str().to_string());
        }
        if let Some(rule_id) = query.rule_id {
            builder.push(" AND rule_id = ").push_bind(rule_id.as_uuid());
        }
        if let Some(status) = query.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(subject_type) = &query.subject_type {
            builder
                .push(" AND subject_type = ")
                .push_bind(subject_type.clone());
        }
        if let Some(subject_id) = &query.subject_id {
            builder
                .push(" AND subject_id = ")
                .push_bind(subject_id.clone());
        }
        if let Some(since) = query.since {
            builder.push(" AND started_at >= ").push_bind(encode_ts(since));
        }
        if let Some(until) = query.until {
            builder.push(" AND started_at < ").push_bind(encode_ts(until));
        }
        builder.push(" ORDER BY started_at DESC");
        if let Some(limit) = query.limit {
            let limit = i64::try_from(limit).unwrap_or(i64::MAX);
            builder.push(" LIMIT ").push_bind(limit);
        }

        let rows: Vec<Wrapper> = builder
            .build_query_as::<Wrapper>()
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn abandon_incomplete(&self, now: Timestamp) -> Result<u64, AutoruleError> {
        let result = sqlx::query(ABANDON_OPEN)
            .bind(encode_ts(now))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        let abandoned = result.rows_affected();
        if abandoned > 0 {
            tracing::warn!(abandoned, "marked unfinished executions as abandoned");
        }
        Ok(abandoned)
    }
}
