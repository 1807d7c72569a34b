use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use rolegate_application::{ClaimWriteOutcome, IdentityStore, RoleClaimWrite};
use rolegate_core::{AppError, AppResult, SubjectId};
use rolegate_domain::{IdempotencyKey, Role, RoleChangeRecord, UserRecord};

#[derive(Debug, Default)]
struct StoreState {
    users: HashMap<SubjectId, UserRecord>,
    role_changes: HashMap<IdempotencyKey, RoleChangeRecord>,
}

/// In-memory identity store for local development and tests.
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    state: RwLock<StoreState>,
}

impl InMemoryIdentityStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with the given users.
    #[must_use]
    pub fn with_users(users: impl IntoIterator<Item = UserRecord>) -> Self {
        let users = users
            .into_iter()
            .map(|user| (user.subject.clone(), user))
            .collect();

        Self {
            state: RwLock::new(StoreState {
                users,
                role_changes: HashMap::new(),
            }),
        }
    }

    /// Inserts or replaces a user record.
    pub async fn upsert_user(&self, subject: SubjectId, role: Option<Role>) {
        self.state
            .write()
            .await
            .users
            .insert(subject.clone(), UserRecord::new(subject, role));
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn get_user(&self, subject: &SubjectId) -> AppResult<Option<UserRecord>> {
        Ok(self.state.read().await.users.get(subject).cloned())
    }

    async fn apply_role_claim(&self, write: RoleClaimWrite) -> AppResult<ClaimWriteOutcome> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.role_changes.get(&write.idempotency_key) {
            return Ok(ClaimWriteOutcome::AlreadyApplied(existing.clone()));
        }

        let applied_at = Utc::now();
        let Some(user) = state.users.get_mut(&write.target) else {
            return Err(AppError::TargetNotFound(format!(
                "subject '{}' has no user record",
                write.target
            )));
        };

        let previous_role = user.role.replace(write.role);
        user.last_modified_at = applied_at;
        user.last_modified_by = Some(write.actor.clone());

        let record = RoleChangeRecord {
            idempotency_key: write.idempotency_key.clone(),
            actor: write.actor,
            target: write.target,
            previous_role,
            new_role: write.role,
            applied_at,
            fingerprint: write.fingerprint,
        };
        state
            .role_changes
            .insert(write.idempotency_key, record.clone());

        Ok(ClaimWriteOutcome::Applied(record))
    }

    async fn find_role_change(&self, key: &IdempotencyKey) -> AppResult<Option<RoleChangeRecord>> {
        Ok(self.state.read().await.role_changes.get(key).cloned())
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}
