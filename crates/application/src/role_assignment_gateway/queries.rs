use rolegate_core::{AppError, AppResult, CallerIdentity};
use rolegate_domain::{AuditEntry, IdempotencyKey, RoleAssignmentResult};

use crate::AuditQuery;

use super::RoleAssignmentGateway;
use super::authorization::require_admin;

impl RoleAssignmentGateway {
    /// Returns the result recorded for an idempotency key.
    ///
    /// Callers that disconnected before a response use this to observe the
    /// outcome. Read-only: a claim without audit entry is reported from the
    /// change record and repaired by the next apply with the same key.
    pub async fn lookup_role_assignment(
        &self,
        caller: &CallerIdentity,
        idempotency_key: &str,
    ) -> AppResult<RoleAssignmentResult> {
        require_admin(caller)?;
        let key = IdempotencyKey::from_caller(Some(idempotency_key));

        if let Some(result) = self
            .audit_repository
            .find_by_idempotency_key(&key)
            .await?
            .and_then(|entry| entry.applied_result())
        {
            return Ok(result);
        }

        self.identity_store
            .find_role_change(&key)
            .await?
            .map(|record| record.result())
            .ok_or_else(|| {
                AppError::TargetNotFound(format!(
                    "no role assignment recorded for idempotency key '{key}'"
                ))
            })
    }

    /// Fails unless the caller may read the audit trail.
    pub fn authorize_audit_reader(&self, caller: &CallerIdentity) -> AppResult<()> {
        require_admin(caller)
    }

    /// Lists audit entries newest first for admin callers.
    pub async fn list_audit_entries(
        &self,
        caller: &CallerIdentity,
        query: AuditQuery,
    ) -> AppResult<Vec<AuditEntry>> {
        self.authorize_audit_reader(caller)?;
        self.audit_repository
            .list_entries(query.normalized())
            .await
    }
}
