use axum::Json;
use axum::extract::State;

use crate::dto::HealthResponse;
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn health_handler(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    state.gateway.store_health().await?;

    Ok(Json(HealthResponse { status: "ok" }))
}
