use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use rolegate_core::{AppError, AppResult};

use super::config::RateLimitRule;
use super::ports::RateLimitRepository;

/// Application service for rate limiting.
#[derive(Clone)]
pub struct RateLimitService {
    repository: Arc<dyn RateLimitRepository>,
}

impl RateLimitService {
    /// Creates a new rate limit service.
    #[must_use]
    pub fn new(repository: Arc<dyn RateLimitRepository>) -> Self {
        Self { repository }
    }

    /// Checks whether the given key is within the rate limit.
    ///
    /// Records the attempt and returns `Ok(())` if allowed, or
    /// `Err(AppError::RateLimited)` if the limit has been exceeded.
    pub async fn check_rate_limit(&self, rule: &RateLimitRule, key: &str) -> AppResult<()> {
        let composite_key = rule.counter_key(key);
        let info = self
            .repository
            .record_attempt(&composite_key, rule.max_attempts, rule.window_seconds)
            .await?;

        if info.attempt_count > rule.max_attempts {
            warn!(
                key = %composite_key,
                attempt_count = info.attempt_count,
                max_attempts = rule.max_attempts,
                oldest_attempt_at = %info.oldest_attempt_at,
                "rate limit exceeded"
            );
            return Err(AppError::RateLimited(format!(
                "at most {} role changes per {} seconds, please try again later",
                rule.max_attempts, rule.window_seconds
            )));
        }

        Ok(())
    }

    /// Drops keys with no attempt inside the rule's window.
    pub async fn cleanup(&self, rule: &RateLimitRule) -> AppResult<u64> {
        let cutoff = Utc::now() - rule.window();
        self.repository.cleanup_expired(cutoff).await
    }
}
