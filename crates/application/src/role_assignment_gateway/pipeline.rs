use tracing::{debug, error, info, warn};

use rolegate_core::{AppError, AppResult, CallerIdentity, SubjectId};
use rolegate_domain::{
    AuditEntry, AuditOutcome, IdempotencyKey, RequestState, RoleAssignmentRequest,
    RoleAssignmentResult,
};

use super::{AuthorizedRoleChange, RoleAssignmentGateway};

impl RoleAssignmentGateway {
    /// Runs a verified caller's request through rate limiting, authorization
    /// and the idempotent apply step.
    ///
    /// The apply step runs on its own task: once started it completes even if
    /// the caller goes away, and its outcome stays observable through
    /// [`RoleAssignmentGateway::lookup_role_assignment`].
    pub async fn assign_role(
        &self,
        caller: &CallerIdentity,
        request: RoleAssignmentRequest,
    ) -> AppResult<RoleAssignmentResult> {
        let actor = caller.subject();
        let state = RequestState::Received.advance(RequestState::Verified)?;
        debug!(actor = %actor, state = state.as_str(), "role assignment received");

        if let Err(error) = self
            .rate_limit_service
            .check_rate_limit(&self.rate_limit_rule, actor.as_str())
            .await
        {
            return Err(finish(state, error, actor));
        }

        let change = match self.authorize(caller, &request) {
            Ok(change) => change,
            Err(error) => return Err(finish(state, error, actor)),
        };
        let state = state.advance(RequestState::Authorized)?;
        debug!(
            actor = %actor,
            target = %change.target(),
            role = %change.role(),
            state = state.as_str(),
            "role assignment authorized"
        );

        let idempotency_key = IdempotencyKey::from_caller(request.idempotency_key.as_deref());
        let applied = match self.apply_detached(change.clone(), idempotency_key.clone()).await {
            Ok(result) => result,
            Err(error) => match self.audit_unapplied(&change, &idempotency_key, &error).await {
                Some(result) => result,
                None => return Err(finish(state, error, actor)),
            },
        };

        let state = state.advance(RequestState::Applied)?;
        debug!(actor = %actor, state = state.as_str(), "role assignment finished");
        Ok(applied)
    }

    async fn apply_detached(
        &self,
        change: AuthorizedRoleChange,
        idempotency_key: IdempotencyKey,
    ) -> AppResult<RoleAssignmentResult> {
        let gateway = self.clone();
        let task = tokio::spawn(async move {
            gateway
                .retry_policy
                .run("apply_role_change", || {
                    gateway.apply_role_change(&change, &idempotency_key)
                })
                .await
        });

        task.await.map_err(|join_error| {
            AppError::Internal(format!("role change task did not complete: {join_error}"))
        })?
    }

    /// Records the outcome of an apply step that returned an error.
    ///
    /// The claim may have been committed before the error, for instance when
    /// only the keyed audit write failed. A committed claim gets its applied
    /// entry instead of a failed one and its result is returned.
    async fn audit_unapplied(
        &self,
        change: &AuthorizedRoleChange,
        idempotency_key: &IdempotencyKey,
        failure: &AppError,
    ) -> Option<RoleAssignmentResult> {
        match self.identity_store.find_role_change(idempotency_key).await {
            Ok(Some(record)) => {
                return match self
                    .audit_repository
                    .write_audit_if_absent(idempotency_key, AuditEntry::applied(&record))
                    .await
                {
                    Ok(written) => {
                        info!(
                            idempotency_key = %idempotency_key,
                            target = %record.target,
                            "audit entry recorded for committed role claim after apply error"
                        );
                        match written.existing {
                            Some(existing) if !written.inserted => existing.applied_result(),
                            _ => Some(record.result()),
                        }
                    }
                    Err(audit_error) => {
                        error!(
                            idempotency_key = %idempotency_key,
                            target = %record.target,
                            error = %audit_error,
                            "role claim committed without audit entry"
                        );
                        None
                    }
                };
            }
            Ok(None) => {}
            Err(lookup_error) => warn!(
                idempotency_key = %idempotency_key,
                error = %lookup_error,
                "could not check for a committed role claim"
            ),
        }

        let outcome = match failure {
            AppError::TargetNotFound(_) => AuditOutcome::Denied,
            _ => AuditOutcome::Failed,
        };
        let entry = AuditEntry::unapplied(
            change.actor().clone(),
            change.target().clone(),
            change.role(),
            outcome,
            format!("{}: {failure}", failure.kind()),
        );

        if let Err(audit_error) = self.audit_repository.append_entry(entry).await {
            error!(
                actor = %change.actor(),
                target = %change.target(),
                outcome = outcome.as_str(),
                error = %audit_error,
                "failed to record audit entry for unapplied role change"
            );
        }

        None
    }
}

fn finish(state: RequestState, failure: AppError, actor: &SubjectId) -> AppError {
    match state.terminate(&failure) {
        Ok(terminal) if failure.is_internal() => error!(
            actor = %actor,
            state = terminal.as_str(),
            error = %failure,
            "role assignment failed"
        ),
        Ok(terminal) => warn!(
            actor = %actor,
            state = terminal.as_str(),
            error_kind = failure.kind(),
            error = %failure,
            "role assignment ended without change"
        ),
        Err(transition_error) => error!(
            actor = %actor,
            error = %transition_error,
            "role assignment reached an invalid state"
        ),
    }

    failure
}
