//! Claims-based gateway for role claim assignment.
//!
//! A request moves through `verify_caller`, the per-actor rate limit,
//! `authorize` and `apply_role_change`. Only the last step touches the
//! identity store.

use std::sync::Arc;

use crate::{
    AuditRepository, IdentityProvider, IdentityStore, RateLimitRule, RateLimitService, RetryPolicy,
};

mod apply;
mod authorization;
mod pipeline;
mod queries;
mod verification;

#[cfg(test)]
mod tests;

pub use authorization::AuthorizedRoleChange;

/// Application service guarding role claim mutations.
#[derive(Clone)]
pub struct RoleAssignmentGateway {
    identity_provider: Arc<dyn IdentityProvider>,
    identity_store: Arc<dyn IdentityStore>,
    audit_repository: Arc<dyn AuditRepository>,
    rate_limit_service: RateLimitService,
    rate_limit_rule: RateLimitRule,
    retry_policy: RetryPolicy,
}

impl RoleAssignmentGateway {
    /// Creates a gateway with the default rate limit rule and retry policy.
    #[must_use]
    pub fn new(
        identity_provider: Arc<dyn IdentityProvider>,
        identity_store: Arc<dyn IdentityStore>,
        audit_repository: Arc<dyn AuditRepository>,
        rate_limit_service: RateLimitService,
    ) -> Self {
        Self {
            identity_provider,
            identity_store,
            audit_repository,
            rate_limit_service,
            rate_limit_rule: RateLimitRule::role_changes(),
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Replaces the per-actor rate limit rule.
    #[must_use]
    pub fn with_rate_limit_rule(mut self, rule: RateLimitRule) -> Self {
        self.rate_limit_rule = rule;
        self
    }

    /// Replaces the retry policy used for store writes.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Returns the active rate limit rule.
    #[must_use]
    pub fn rate_limit_rule(&self) -> &RateLimitRule {
        &self.rate_limit_rule
    }

    /// Checks identity store reachability.
    pub async fn store_health(&self) -> rolegate_core::AppResult<()> {
        self.identity_store.ping().await
    }
}
