use tracing::{debug, info, warn};

use rolegate_core::{AppError, AppResult};
use rolegate_domain::{
    AuditEntry, IdempotencyKey, RoleAssignmentResult, RoleChangeRecord, request_fingerprint,
};

use crate::{ClaimWriteOutcome, RoleClaimWrite};

use super::{AuthorizedRoleChange, RoleAssignmentGateway};

impl RoleAssignmentGateway {
    /// Applies an authorized role change exactly once per idempotency key.
    ///
    /// A key that already has an audit entry returns the recorded result
    /// without touching the store. A key whose claim was written but never
    /// audited gets its audit entry repaired; the claim write is not
    /// repeated.
    pub async fn apply_role_change(
        &self,
        change: &AuthorizedRoleChange,
        idempotency_key: &IdempotencyKey,
    ) -> AppResult<RoleAssignmentResult> {
        if let Some(entry) = self
            .audit_repository
            .find_by_idempotency_key(idempotency_key)
            .await?
        {
            if &entry.target != change.target() || entry.new_role != change.role() {
                warn!(
                    idempotency_key = %idempotency_key,
                    recorded_target = %entry.target,
                    recorded_role = %entry.new_role,
                    "idempotency key reused with a different request, returning recorded result"
                );
            }
            debug!(idempotency_key = %idempotency_key, "returning recorded role change");
            return recorded_result(&entry, idempotency_key);
        }

        if let Some(record) = self.identity_store.find_role_change(idempotency_key).await? {
            warn!(
                idempotency_key = %idempotency_key,
                target = %record.target,
                "role claim written without audit entry, repairing audit trail"
            );
            return self.record_applied(change, record).await;
        }

        let Some(user) = self.identity_store.get_user(change.target()).await? else {
            return Err(AppError::TargetNotFound(format!(
                "subject '{}' has no user record",
                change.target()
            )));
        };
        debug!(
            target = %user.subject,
            current_role = user.role.map(|role| role.as_str()).unwrap_or("none"),
            requested_role = %change.role(),
            "writing role claim"
        );

        let outcome = self
            .identity_store
            .apply_role_claim(RoleClaimWrite {
                idempotency_key: idempotency_key.clone(),
                actor: change.actor().clone(),
                target: change.target().clone(),
                role: change.role(),
                fingerprint: request_fingerprint(change.target(), change.role()),
            })
            .await?;

        let record = match outcome {
            ClaimWriteOutcome::Applied(record) => {
                info!(
                    actor = %record.actor,
                    target = %record.target,
                    role = %record.new_role,
                    idempotency_key = %record.idempotency_key,
                    "role claim applied"
                );
                record
            }
            ClaimWriteOutcome::AlreadyApplied(record) => {
                debug!(
                    idempotency_key = %record.idempotency_key,
                    "concurrent request already applied this key"
                );
                record
            }
        };

        self.record_applied(change, record).await
    }

    async fn record_applied(
        &self,
        change: &AuthorizedRoleChange,
        record: RoleChangeRecord,
    ) -> AppResult<RoleAssignmentResult> {
        if record.fingerprint != request_fingerprint(change.target(), change.role()) {
            warn!(
                idempotency_key = %record.idempotency_key,
                recorded_target = %record.target,
                recorded_role = %record.new_role,
                requested_target = %change.target(),
                requested_role = %change.role(),
                "idempotency key reused with a different request, returning recorded result"
            );
        }

        let written = self
            .audit_repository
            .write_audit_if_absent(&record.idempotency_key, AuditEntry::applied(&record))
            .await?;

        match written.existing {
            Some(existing) if !written.inserted => {
                recorded_result(&existing, &record.idempotency_key)
            }
            _ => Ok(record.result()),
        }
    }
}

fn recorded_result(
    entry: &AuditEntry,
    idempotency_key: &IdempotencyKey,
) -> AppResult<RoleAssignmentResult> {
    entry.applied_result().ok_or_else(|| {
        AppError::Internal(format!(
            "audit entry '{}' for key '{idempotency_key}' is not an applied entry",
            entry.entry_id
        ))
    })
}
