use async_trait::async_trait;
use chrono::{DateTime, Utc};

use rolegate_core::{AppResult, ClaimSet};

/// Token payload returned by the identity provider after verification.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedToken {
    /// Subject claim.
    pub subject: String,
    /// Custom claims, empty when the token carries none.
    pub claims: ClaimSet,
    /// Token issue time.
    pub issued_at: DateTime<Utc>,
}

/// Port to the external identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verifies a raw bearer token.
    ///
    /// Fails with `AppError::InvalidToken` when the signature does not verify,
    /// the token is malformed, or it has expired.
    async fn verify_token(&self, raw_token: &str) -> AppResult<VerifiedToken>;
}
