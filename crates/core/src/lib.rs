//! Shared primitives for all Rust crates in Rolegate.

#![forbid(unsafe_code)]

/// Authentication primitives shared across services.
pub mod auth;

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use auth::{CallerIdentity, ClaimSet};

/// Result type used across Rolegate crates.
pub type AppResult<T> = Result<T, AppError>;

/// Opaque, non-empty subject identifier issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubjectId(String);

impl SubjectId {
    /// Creates a validated subject identifier.
    ///
    /// Surrounding whitespace is trimmed; an empty value is rejected as an
    /// unknown target because no account can carry it.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(AppError::TargetNotFound(
                "subject id must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for SubjectId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

impl From<SubjectId> for String {
    fn from(value: SubjectId) -> Self {
        value.0
    }
}

/// Error taxonomy surfaced by the gateway.
///
/// Every variant except [`AppError::StoreUnavailable`] is final: repeating the
/// same call cannot change the outcome.
#[derive(Debug, Error)]
pub enum AppError {
    /// Token could not be verified or has expired.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Verified token carries no claim set.
    #[error("missing claims: {0}")]
    MissingClaims(String),

    /// Caller lacks the admin claim.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Caller tried to lower their own privilege level.
    #[error("self-demotion denied: {0}")]
    SelfDemotionDenied(String),

    /// Requested role is not part of the recognized role set.
    #[error("unknown role: {0}")]
    UnknownRole(String),

    /// Target subject has no user record.
    #[error("target not found: {0}")]
    TargetNotFound(String),

    /// Actor exceeded the role change rate limit.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Identity store could not be reached.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Invalid process configuration detected at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the stable error kind exposed to callers.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidToken(_) => "InvalidToken",
            Self::MissingClaims(_) => "MissingClaims",
            Self::PermissionDenied(_) => "PermissionDenied",
            Self::SelfDemotionDenied(_) => "SelfDemotionDenied",
            Self::UnknownRole(_) => "UnknownRole",
            Self::TargetNotFound(_) => "TargetNotFound",
            Self::RateLimited(_) => "RateLimited",
            Self::StoreUnavailable(_) => "StoreUnavailable",
            Self::Configuration(_) | Self::Internal(_) => "InternalError",
        }
    }

    /// Returns whether re-invoking the failed operation may succeed.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }

    /// Returns whether the error hides internal detail from callers.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Internal(_))
    }
}
