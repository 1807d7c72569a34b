use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use rolegate_core::{AppError, AppResult, SubjectId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::Role;

/// Longest idempotency key stored verbatim.
pub const IDEMPOTENCY_KEY_MAX_LENGTH: usize = 128;

/// Key that collapses retries of one logical request into a single effect.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Creates a key from a stored value.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() || value.len() > IDEMPOTENCY_KEY_MAX_LENGTH {
            return Err(AppError::Internal(format!(
                "idempotency key must be 1..={IDEMPOTENCY_KEY_MAX_LENGTH} bytes"
            )));
        }

        Ok(Self(value))
    }

    /// Derives the key for a caller-supplied value.
    ///
    /// A missing or blank value yields a fresh random key. Values longer than
    /// [`IDEMPOTENCY_KEY_MAX_LENGTH`] are replaced by their SHA-256 digest so
    /// the same input always maps to the same key.
    #[must_use]
    pub fn from_caller(value: Option<&str>) -> Self {
        match value.map(str::trim).filter(|value| !value.is_empty()) {
            None => Self::generate(),
            Some(value) if value.len() > IDEMPOTENCY_KEY_MAX_LENGTH => {
                Self(format!("sha256:{:x}", Sha256::digest(value.as_bytes())))
            }
            Some(value) => Self(value.to_owned()),
        }
    }

    /// Generates a random key for requests that did not supply one.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for IdempotencyKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Role assignment request as received from the transport.
///
/// Fields stay optional so presence is checked by authorization rather than
/// by deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleAssignmentRequest {
    /// Subject whose role claim should change.
    pub target_subject_id: Option<String>,
    /// Requested role name.
    pub role: Option<String>,
    /// Caller-supplied idempotency key.
    pub idempotency_key: Option<String>,
}

/// Result returned for an applied role change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignmentResult {
    /// Subject whose claim was written.
    pub target: SubjectId,
    /// Role now held by the target.
    pub role: Role,
    /// Commit timestamp of the claim write.
    pub applied_at: DateTime<Utc>,
}

impl RoleAssignmentResult {
    /// Returns a human-readable confirmation.
    #[must_use]
    pub fn message(&self) -> String {
        format!("role '{}' assigned to subject '{}'", self.role, self.target)
    }
}

/// Idempotency index row written atomically with the claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleChangeRecord {
    /// Idempotency key owning this change.
    pub idempotency_key: IdempotencyKey,
    /// Subject that invoked the change.
    pub actor: SubjectId,
    /// Subject whose claim was written.
    pub target: SubjectId,
    /// Role held before the write.
    pub previous_role: Option<Role>,
    /// Role written.
    pub new_role: Role,
    /// Commit timestamp.
    pub applied_at: DateTime<Utc>,
    /// Fingerprint of the `(target, role)` pair that was applied.
    pub fingerprint: String,
}

impl RoleChangeRecord {
    /// Returns the caller-facing result for this change.
    #[must_use]
    pub fn result(&self) -> RoleAssignmentResult {
        RoleAssignmentResult {
            target: self.target.clone(),
            role: self.new_role,
            applied_at: self.applied_at,
        }
    }
}

/// Hex SHA-256 over the target and role of a request.
#[must_use]
pub fn request_fingerprint(target: &SubjectId, role: Role) -> String {
    let mut hasher = Sha256::new();
    hasher.update(target.as_str().as_bytes());
    hasher.update([0_u8]);
    hasher.update(role.as_str().as_bytes());
    format!("{:x}", hasher.finalize())
}
