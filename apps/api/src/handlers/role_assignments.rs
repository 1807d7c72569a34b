use axum::Json;
use axum::body::Bytes;
use axum::extract::{Extension, Path, State};
use rolegate_core::CallerIdentity;
use tracing::debug;

use crate::dto::{AssignRoleRequest, RoleAssignmentResponse};
use crate::error::ApiResult;
use crate::state::AppState;

/// Applies a role assignment.
///
/// A body that is not a JSON object of the expected shape is treated as a
/// request with no fields, so the caller gets the same error kinds the
/// gateway reports for missing fields.
pub async fn assign_role_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    body: Bytes,
) -> ApiResult<Json<RoleAssignmentResponse>> {
    let payload = serde_json::from_slice::<AssignRoleRequest>(&body).unwrap_or_else(|error| {
        debug!(actor = %caller.subject(), %error, "unreadable role assignment payload");
        AssignRoleRequest::default()
    });

    let result = state
        .gateway
        .assign_role(&caller, payload.into())
        .await?;

    Ok(Json(RoleAssignmentResponse::from(result)))
}

pub async fn lookup_role_assignment_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(idempotency_key): Path<String>,
) -> ApiResult<Json<RoleAssignmentResponse>> {
    let result = state
        .gateway
        .lookup_role_assignment(&caller, idempotency_key.as_str())
        .await?;

    Ok(Json(RoleAssignmentResponse::from(result)))
}
