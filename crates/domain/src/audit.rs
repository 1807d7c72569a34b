use std::str::FromStr;

use chrono::{DateTime, Utc};
use rolegate_core::{AppError, SubjectId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{IdempotencyKey, Role, RoleAssignmentResult, RoleChangeRecord};

/// Terminal outcome captured by an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    /// Role claim was written.
    Applied,
    /// Request was refused after authorization.
    Denied,
    /// Request failed because of a store or internal fault.
    Failed,
}

impl AuditOutcome {
    /// Returns a stable storage value for this outcome.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Denied => "denied",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for AuditOutcome {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "applied" => Ok(Self::Applied),
            "denied" => Ok(Self::Denied),
            "failed" => Ok(Self::Failed),
            _ => Err(AppError::Internal(format!(
                "unknown audit outcome value '{value}'"
            ))),
        }
    }
}

/// Append-only record of one role change invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Stable entry identifier.
    pub entry_id: Uuid,
    /// Idempotency key; only applied entries are keyed.
    pub idempotency_key: Option<IdempotencyKey>,
    /// Subject that invoked the change.
    pub actor: SubjectId,
    /// Subject whose role claim was targeted.
    pub target: SubjectId,
    /// Role before the change, when known.
    pub old_role: Option<Role>,
    /// Requested role.
    pub new_role: Role,
    /// When the outcome was recorded.
    pub recorded_at: DateTime<Utc>,
    /// Terminal outcome.
    pub outcome: AuditOutcome,
    /// Optional human-readable detail.
    pub detail: Option<String>,
}

impl AuditEntry {
    /// Builds the keyed `applied` entry for a committed role change.
    #[must_use]
    pub fn applied(record: &RoleChangeRecord) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            idempotency_key: Some(record.idempotency_key.clone()),
            actor: record.actor.clone(),
            target: record.target.clone(),
            old_role: record.previous_role,
            new_role: record.new_role,
            recorded_at: record.applied_at,
            outcome: AuditOutcome::Applied,
            detail: Some(format!(
                "assigned role '{}' to '{}'",
                record.new_role, record.target
            )),
        }
    }

    /// Builds an unkeyed entry for a request that did not apply.
    #[must_use]
    pub fn unapplied(
        actor: SubjectId,
        target: SubjectId,
        new_role: Role,
        outcome: AuditOutcome,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            idempotency_key: None,
            actor,
            target,
            old_role: None,
            new_role,
            recorded_at: Utc::now(),
            outcome,
            detail: Some(detail.into()),
        }
    }

    /// Returns the caller-facing result recorded by an applied entry.
    #[must_use]
    pub fn applied_result(&self) -> Option<RoleAssignmentResult> {
        (self.outcome == AuditOutcome::Applied).then(|| RoleAssignmentResult {
            target: self.target.clone(),
            role: self.new_role,
            applied_at: self.recorded_at,
        })
    }
}
