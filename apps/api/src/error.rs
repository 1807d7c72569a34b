use axum::Json;
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use rolegate_core::AppError;
use tracing::error;

use crate::dto::ErrorResponse;

/// Seconds a client should wait before retrying after a store outage.
const STORE_RETRY_AFTER_SECONDS: &str = "1";

/// HTTP API error wrapper around core application errors.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(value: AppError) -> Self {
        Self(value)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0 {
            AppError::InvalidToken(_) | AppError::MissingClaims(_) => StatusCode::UNAUTHORIZED,
            AppError::PermissionDenied(_) | AppError::SelfDemotionDenied(_) => {
                StatusCode::FORBIDDEN
            }
            AppError::UnknownRole(_) => StatusCode::BAD_REQUEST,
            AppError::TargetNotFound(_) => StatusCode::NOT_FOUND,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Configuration(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if self.0.is_internal() {
            error!(error = %self.0, "request failed with internal error");
            "an internal error occurred".to_owned()
        } else {
            self.0.to_string()
        };

        let payload = Json(ErrorResponse::new(self.0.kind(), message));
        let mut response = (status, payload).into_response();
        if matches!(self.0, AppError::StoreUnavailable(_)) {
            response.headers_mut().insert(
                RETRY_AFTER,
                HeaderValue::from_static(STORE_RETRY_AFTER_SECONDS),
            );
        }

        response
    }
}

/// Standard API result type.
pub type ApiResult<T> = Result<T, ApiError>;
