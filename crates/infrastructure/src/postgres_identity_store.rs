use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::debug;

use rolegate_application::{ClaimWriteOutcome, IdentityStore, RoleClaimWrite};
use rolegate_core::{AppError, AppResult, SubjectId};
use rolegate_domain::{IdempotencyKey, Role, RoleChangeRecord, UserRecord};

use crate::postgres_errors::store_error;


/// PostgreSQL-backed identity store.
///
/// A claim write and its role change record commit in one transaction, so
/// the record doubles as the idempotency index for the key.
#[derive(Clone)]
pub struct PostgresIdentityStore {
    pool: PgPool,
}

impl PostgresIdentityStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a user, or resets the role of an existing one.
    pub async fn upsert_user(&self, subject: &SubjectId, role: Option<Role>) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (subject, role)
            VALUES ($1, $2)
            ON CONFLICT (subject) DO UPDATE
            SET role = EXCLUDED.role,
                last_modified_at = now()
            "#,
        )
        .bind(subject.as_str())
        .bind(role.map(|role| role.as_str()))
        .execute(&self.pool)
        .await
        .map_err(|error| store_error(error, "upsert user"))?;

        Ok(())
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    subject: String,
    role: Option<String>,
    last_modified_at: DateTime<Utc>,
    last_modified_by: Option<String>,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            subject: stored_subject(row.subject)?,
            role: row.role.as_deref().map(stored_role).transpose()?,
            last_modified_at: row.last_modified_at,
            last_modified_by: row.last_modified_by.map(stored_subject).transpose()?,
        })
    }
}

#[derive(Debug, FromRow)]
struct RoleChangeRow {
    idempotency_key: String,
    actor: String,
    target: String,
    previous_role: Option<String>,
    new_role: String,
    fingerprint: String,
    applied_at: DateTime<Utc>,
}

impl TryFrom<RoleChangeRow> for RoleChangeRecord {
    type Error = AppError;

    fn try_from(row: RoleChangeRow) -> Result<Self, Self::Error> {
        Ok(Self {
            idempotency_key: IdempotencyKey::new(row.idempotency_key)?,
            actor: stored_subject(row.actor)?,
            target: stored_subject(row.target)?,
            previous_role: row.previous_role.as_deref().map(stored_role).transpose()?,
            new_role: stored_role(&row.new_role)?,
            applied_at: row.applied_at,
            fingerprint: row.fingerprint,
        })
    }
}

fn stored_subject(value: String) -> AppResult<SubjectId> {
    SubjectId::new(value)
        .map_err(|error| AppError::Internal(format!("stored subject is invalid: {error}")))
}

pub(crate) fn stored_role(value: &str) -> AppResult<Role> {
    Role::from_str(value)
        .map_err(|error| AppError::Internal(format!("stored role is invalid: {error}")))
}

const SELECT_ROLE_CHANGE: &str = r#"
    SELECT idempotency_key, actor, target, previous_role, new_role, fingerprint, applied_at
    FROM role_change_records
    WHERE idempotency_key = $1
"#;

#[async_trait]
impl IdentityStore for PostgresIdentityStore {
    async fn get_user(&self, subject: &SubjectId) -> AppResult<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT subject, role, last_modified_at, last_modified_by
            FROM users
            WHERE subject = $1
            "#,
        )
        .bind(subject.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| store_error(error, "load user"))?;

        row.map(UserRecord::try_from).transpose()
    }

    async fn apply_role_claim(&self, write: RoleClaimWrite) -> AppResult<ClaimWriteOutcome> {
        let mut transaction = self
            .pool
            .begin()
            .await
            .map_err(|error| store_error(error, "begin role claim transaction"))?;

        let current_role = sqlx::query_scalar::<_, Option<String>>(
            r#"
            SELECT role
            FROM users
            WHERE subject = $1
            FOR UPDATE
            "#,
        )
        .bind(write.target.as_str())
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| store_error(error, "lock user for role claim"))?;

        let Some(current_role) = current_role else {
            return Err(AppError::TargetNotFound(format!(
                "subject '{}' has no user record",
                write.target
            )));
        };

        let inserted = sqlx::query_as::<_, RoleChangeRow>(
            r#"
            INSERT INTO role_change_records (
                idempotency_key,
                actor,
                target,
                previous_role,
                new_role,
                fingerprint
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (idempotency_key) DO NOTHING
            RETURNING
                idempotency_key, actor, target, previous_role, new_role, fingerprint, applied_at
            "#,
        )
        .bind(write.idempotency_key.as_str())
        .bind(write.actor.as_str())
        .bind(write.target.as_str())
        .bind(current_role)
        .bind(write.role.as_str())
        .bind(write.fingerprint.as_str())
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| store_error(error, "record role change"))?;

        let Some(inserted) = inserted else {
            transaction
                .rollback()
                .await
                .map_err(|error| store_error(error, "roll back duplicate role claim"))?;
            debug!(
                idempotency_key = %write.idempotency_key,
                "role change already recorded for key"
            );

            let existing = sqlx::query_as::<_, RoleChangeRow>(SELECT_ROLE_CHANGE)
                .bind(write.idempotency_key.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(|error| store_error(error, "load recorded role change"))?;
            return Ok(ClaimWriteOutcome::AlreadyApplied(existing.try_into()?));
        };

        sqlx::query(
            r#"
            UPDATE users
            SET role = $2,
                last_modified_at = $3,
                last_modified_by = $4
            WHERE subject = $1
            "#,
        )
        .bind(write.target.as_str())
        .bind(write.role.as_str())
        .bind(inserted.applied_at)
        .bind(write.actor.as_str())
        .execute(&mut *transaction)
        .await
        .map_err(|error| store_error(error, "write role claim"))?;

        transaction
            .commit()
            .await
            .map_err(|error| store_error(error, "commit role claim"))?;

        Ok(ClaimWriteOutcome::Applied(inserted.try_into()?))
    }

    async fn find_role_change(&self, key: &IdempotencyKey) -> AppResult<Option<RoleChangeRecord>> {
        let row = sqlx::query_as::<_, RoleChangeRow>(SELECT_ROLE_CHANGE)
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| store_error(error, "load role change"))?;

        row.map(RoleChangeRecord::try_from).transpose()
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|error| store_error(error, "reach identity store"))?;

        Ok(())
    }
}
