use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use rolegate_application::{AuditQuery, AuditRepository, AuditWriteOutcome};
use rolegate_core::{AppError, AppResult, SubjectId};
use rolegate_domain::{AuditEntry, AuditOutcome, IdempotencyKey};

use crate::postgres_errors::store_error;
use crate::postgres_identity_store::stored_role;


/// PostgreSQL-backed append-only audit repository.
#[derive(Clone)]
pub struct PostgresAuditRepository {
    pool: PgPool,
}

impl PostgresAuditRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert(&self, entry: &AuditEntry) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO audit_entries (
                entry_id,
                idempotency_key,
                actor,
                target,
                old_role,
                new_role,
                outcome,
                detail,
                recorded_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (idempotency_key) WHERE idempotency_key IS NOT NULL DO NOTHING
            "#,
        )
        .bind(entry.entry_id)
        .bind(entry.idempotency_key.as_ref().map(IdempotencyKey::as_str))
        .bind(entry.actor.as_str())
        .bind(entry.target.as_str())
        .bind(entry.old_role.map(|role| role.as_str()))
        .bind(entry.new_role.as_str())
        .bind(entry.outcome.as_str())
        .bind(entry.detail.as_deref())
        .bind(entry.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(|error| store_error(error, "append audit entry"))?;

        Ok(result.rows_affected() == 1)
    }
}

#[derive(Debug, FromRow)]
struct AuditEntryRow {
    entry_id: Uuid,
    idempotency_key: Option<String>,
    actor: String,
    target: String,
    old_role: Option<String>,
    new_role: String,
    outcome: String,
    detail: Option<String>,
    recorded_at: DateTime<Utc>,
}

impl TryFrom<AuditEntryRow> for AuditEntry {
    type Error = AppError;

    fn try_from(row: AuditEntryRow) -> Result<Self, Self::Error> {
        let subject = |value: String| {
            SubjectId::new(value).map_err(|error| {
                AppError::Internal(format!("stored audit subject is invalid: {error}"))
            })
        };

        Ok(Self {
            entry_id: row.entry_id,
            idempotency_key: row.idempotency_key.map(IdempotencyKey::new).transpose()?,
            actor: subject(row.actor)?,
            target: subject(row.target)?,
            old_role: row.old_role.as_deref().map(stored_role).transpose()?,
            new_role: stored_role(&row.new_role)?,
            recorded_at: row.recorded_at,
            outcome: AuditOutcome::from_str(&row.outcome)?,
            detail: row.detail,
        })
    }
}

const SELECT_COLUMNS: &str = "entry_id, idempotency_key, actor, target, old_role, new_role, \
                              outcome, detail, recorded_at";

#[async_trait]
impl AuditRepository for PostgresAuditRepository {
    async fn write_audit_if_absent(
        &self,
        key: &IdempotencyKey,
        entry: AuditEntry,
    ) -> AppResult<AuditWriteOutcome> {
        if self.insert(&entry).await? {
            return Ok(AuditWriteOutcome {
                inserted: true,
                existing: None,
            });
        }

        Ok(AuditWriteOutcome {
            inserted: false,
            existing: self.find_by_idempotency_key(key).await?,
        })
    }

    async fn append_entry(&self, entry: AuditEntry) -> AppResult<()> {
        self.insert(&entry).await.map(|_| ())
    }

    async fn find_by_idempotency_key(
        &self,
        key: &IdempotencyKey,
    ) -> AppResult<Option<AuditEntry>> {
        let row = sqlx::query_as::<_, AuditEntryRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM audit_entries WHERE idempotency_key = $1"
        ))
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| store_error(error, "load audit entry"))?;

        row.map(AuditEntry::try_from).transpose()
    }

    async fn list_entries(&self, query: AuditQuery) -> AppResult<Vec<AuditEntry>> {
        let query = query.normalized();
        let rows = sqlx::query_as::<_, AuditEntryRow>(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM audit_entries
            WHERE ($1::TEXT IS NULL OR actor = $1)
                AND ($2::TEXT IS NULL OR target = $2)
                AND ($3::TEXT IS NULL OR outcome = $3)
            ORDER BY recorded_at DESC, entry_id
            LIMIT $4
            OFFSET $5
            "#
        ))
        .bind(query.actor.as_ref().map(SubjectId::as_str))
        .bind(query.target.as_ref().map(SubjectId::as_str))
        .bind(query.outcome.map(|outcome| outcome.as_str()))
        .bind(i64::try_from(query.limit).unwrap_or(i64::MAX))
        .bind(i64::try_from(query.offset).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| store_error(error, "list audit entries"))?;

        rows.into_iter().map(AuditEntry::try_from).collect()
    }
}
