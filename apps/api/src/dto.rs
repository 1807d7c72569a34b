use chrono::{DateTime, Utc};
use rolegate_domain::{AuditEntry, RoleAssignmentRequest, RoleAssignmentResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Health response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Incoming role assignment payload. Every field is optional on the wire;
/// presence is checked by the gateway.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRoleRequest {
    #[serde(default)]
    pub target_subject_id: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl From<AssignRoleRequest> for RoleAssignmentRequest {
    fn from(value: AssignRoleRequest) -> Self {
        Self {
            target_subject_id: value.target_subject_id,
            role: value.role,
            idempotency_key: value.idempotency_key,
        }
    }
}

/// Success envelope for an applied or recorded role assignment.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAssignmentResponse {
    pub success: bool,
    pub target_subject_id: String,
    pub role: &'static str,
    pub applied_at: DateTime<Utc>,
    pub message: String,
}

impl From<RoleAssignmentResult> for RoleAssignmentResponse {
    fn from(value: RoleAssignmentResult) -> Self {
        Self {
            success: true,
            message: value.message(),
            target_subject_id: value.target.into(),
            role: value.role.as_str(),
            applied_at: value.applied_at,
        }
    }
}

/// Failure envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    success: bool,
    error_kind: &'static str,
    message: String,
}

impl ErrorResponse {
    pub fn new(error_kind: &'static str, message: String) -> Self {
        Self {
            success: false,
            error_kind,
            message,
        }
    }
}

/// Query string accepted by the audit listing.
#[derive(Debug, Default, Deserialize)]
pub struct AuditLogQuery {
    pub actor: Option<String>,
    pub target: Option<String>,
    pub outcome: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// API representation of an audit entry.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntryResponse {
    pub entry_id: Uuid,
    pub idempotency_key: Option<String>,
    pub actor: String,
    pub target_subject_id: String,
    pub old_role: Option<&'static str>,
    pub new_role: &'static str,
    pub outcome: &'static str,
    pub detail: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl From<AuditEntry> for AuditEntryResponse {
    fn from(value: AuditEntry) -> Self {
        Self {
            entry_id: value.entry_id,
            idempotency_key: value.idempotency_key.map(|key| key.as_str().to_owned()),
            actor: value.actor.into(),
            target_subject_id: value.target.into(),
            old_role: value.old_role.map(|role| role.as_str()),
            new_role: value.new_role.as_str(),
            outcome: value.outcome.as_str(),
            detail: value.detail,
            recorded_at: value.recorded_at,
        }
    }
}
