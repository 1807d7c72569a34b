use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use rolegate_core::AppError;

use crate::error::ApiResult;
use crate::state::AppState;

const BEARER_SCHEME: &str = "Bearer";

/// Verifies the bearer token and exposes the caller as a request extension.
pub async fn require_bearer_identity(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .ok_or_else(|| AppError::InvalidToken("bearer token required".to_owned()))?;

    let identity = state.gateway.verify_caller(token).await?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Extracts the credentials of a `Bearer` authorization value. The scheme
/// name is matched case-insensitively.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim_start().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case(BEARER_SCHEME) && !token.is_empty()).then_some(token)
}
