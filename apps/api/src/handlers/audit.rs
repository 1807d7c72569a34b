use std::str::FromStr;

use axum::Json;
use axum::extract::{Extension, Query, State};
use rolegate_application::AuditQuery;
use rolegate_core::{CallerIdentity, SubjectId};
use rolegate_domain::AuditOutcome;

use crate::dto::{AuditEntryResponse, AuditLogQuery};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_audit_log_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Query(query): Query<AuditLogQuery>,
) -> ApiResult<Json<Vec<AuditEntryResponse>>> {
    let outcome = match query.outcome.as_deref().map(AuditOutcome::from_str) {
        Some(Ok(outcome)) => Some(outcome),
        // An unrecognized outcome filter matches nothing.
        Some(Err(_)) => {
            state.gateway.authorize_audit_reader(&caller)?;
            return Ok(Json(Vec::new()));
        }
        None => None,
    };
    let defaults = AuditQuery::default();

    let entries = state
        .gateway
        .list_audit_entries(
            &caller,
            AuditQuery {
                limit: query.limit.unwrap_or(defaults.limit),
                offset: query.offset.unwrap_or(defaults.offset),
                actor: query.actor.and_then(|actor| SubjectId::new(actor).ok()),
                target: query.target.and_then(|target| SubjectId::new(target).ok()),
                outcome,
            },
        )
        .await?
        .into_iter()
        .map(AuditEntryResponse::from)
        .collect();

    Ok(Json(entries))
}
