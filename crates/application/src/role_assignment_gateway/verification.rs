use rolegate_core::{AppError, AppResult, CallerIdentity, SubjectId};

use super::RoleAssignmentGateway;

impl RoleAssignmentGateway {
    /// Verifies a raw bearer token and extracts the caller identity.
    ///
    /// Fails with `InvalidToken` when the provider rejects the token and with
    /// `MissingClaims` when the verified token has no custom claims.
    pub async fn verify_caller(&self, raw_token: &str) -> AppResult<CallerIdentity> {
        let raw_token = raw_token.trim();
        if raw_token.is_empty() {
            return Err(AppError::InvalidToken("bearer token is empty".to_owned()));
        }

        let verified = self.identity_provider.verify_token(raw_token).await?;
        let subject = SubjectId::new(verified.subject).map_err(|_| {
            AppError::InvalidToken("verified token has an empty subject".to_owned())
        })?;

        CallerIdentity::new(subject, verified.claims, verified.issued_at)
    }
}
