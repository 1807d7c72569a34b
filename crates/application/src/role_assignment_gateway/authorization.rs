use rolegate_core::{AppError, AppResult, CallerIdentity, SubjectId};
use rolegate_domain::{Role, RoleAssignmentRequest};

use super::RoleAssignmentGateway;

const ADMIN_CLAIM: &str = "admin";
const ROLE_CLAIM: &str = "role";

/// Role change that passed the authorization policy.
///
/// Only [`RoleAssignmentGateway::authorize`] builds this value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedRoleChange {
    actor: SubjectId,
    target: SubjectId,
    role: Role,
}

impl AuthorizedRoleChange {
    /// Returns the authorized caller.
    #[must_use]
    pub fn actor(&self) -> &SubjectId {
        &self.actor
    }

    /// Returns the subject whose claim will change.
    #[must_use]
    pub fn target(&self) -> &SubjectId {
        &self.target
    }

    /// Returns the role to assign.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }
}

impl RoleAssignmentGateway {
    /// Decides whether `caller` may perform `request`.
    ///
    /// Checks run in order: admin claim, role name, target presence,
    /// self-demotion. No side effects.
    pub fn authorize(
        &self,
        caller: &CallerIdentity,
        request: &RoleAssignmentRequest,
    ) -> AppResult<AuthorizedRoleChange> {
        authorize_request(caller, request)
    }
}

pub(super) fn require_admin(caller: &CallerIdentity) -> AppResult<()> {
    if caller.claims().bool_claim(ADMIN_CLAIM) == Some(true) {
        return Ok(());
    }

    Err(AppError::PermissionDenied(format!(
        "subject '{}' does not carry the '{ADMIN_CLAIM}' claim",
        caller.subject()
    )))
}

/// Current privilege of the caller: its role claim when recognized,
/// otherwise admin, since only admin-claim holders reach this check.
fn caller_role(caller: &CallerIdentity) -> Role {
    caller
        .claims()
        .string_claim(ROLE_CLAIM)
        .and_then(|value| Role::from_transport(value).ok())
        .unwrap_or(Role::Admin)
}

fn authorize_request(
    caller: &CallerIdentity,
    request: &RoleAssignmentRequest,
) -> AppResult<AuthorizedRoleChange> {
    require_admin(caller)?;

    let role = match request.role.as_deref().map(str::trim) {
        Some(value) if !value.is_empty() => Role::from_transport(value)?,
        _ => return Err(AppError::UnknownRole("role is required".to_owned())),
    };

    let target = match request.target_subject_id.as_deref() {
        Some(value) => SubjectId::new(value)?,
        None => {
            return Err(AppError::TargetNotFound(
                "targetSubjectId is required".to_owned(),
            ));
        }
    };

    if &target == caller.subject() {
        let current = caller_role(caller);
        if role.is_lower_than(current) {
            return Err(AppError::SelfDemotionDenied(format!(
                "subject '{target}' cannot lower their own role from '{current}' to '{role}'"
            )));
        }
    }

    Ok(AuthorizedRoleChange {
        actor: caller.subject().clone(),
        target,
        role,
    })
}
