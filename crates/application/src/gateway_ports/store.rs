use async_trait::async_trait;

use rolegate_core::{AppResult, SubjectId};
use rolegate_domain::{IdempotencyKey, Role, RoleChangeRecord, UserRecord};

/// Conditional claim write keyed by idempotency key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleClaimWrite {
    /// Key owning the write.
    pub idempotency_key: IdempotencyKey,
    /// Subject performing the change.
    pub actor: SubjectId,
    /// Subject whose claim is written.
    pub target: SubjectId,
    /// Role to write.
    pub role: Role,
    /// Fingerprint of the `(target, role)` pair.
    pub fingerprint: String,
}

/// Result of a conditional claim write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimWriteOutcome {
    /// This call inserted the key and wrote the claim.
    Applied(RoleChangeRecord),
    /// The key was already taken; carries the winning change.
    AlreadyApplied(RoleChangeRecord),
}

impl ClaimWriteOutcome {
    /// Returns the change record regardless of which call won.
    #[must_use]
    pub fn record(&self) -> &RoleChangeRecord {
        match self {
            Self::Applied(record) | Self::AlreadyApplied(record) => record,
        }
    }
}

/// Port to the identity store that owns user records.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Reads a user record, `None` when the subject does not exist.
    async fn get_user(&self, subject: &SubjectId) -> AppResult<Option<UserRecord>>;

    /// Inserts the idempotency record if absent and writes the role claim.
    ///
    /// Both happen in one atomic unit: when the key already exists nothing is
    /// written and the existing record is returned. Fails with
    /// `AppError::TargetNotFound` when the target has no user record.
    async fn apply_role_claim(&self, write: RoleClaimWrite) -> AppResult<ClaimWriteOutcome>;

    /// Returns the change recorded for an idempotency key.
    async fn find_role_change(&self, key: &IdempotencyKey) -> AppResult<Option<RoleChangeRecord>>;

    /// Checks store reachability.
    async fn ping(&self) -> AppResult<()>;
}
