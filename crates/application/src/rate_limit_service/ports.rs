use async_trait::async_trait;
use chrono::{DateTime, Utc};

use rolegate_core::AppResult;

/// Repository port for sliding-window attempt logs.
#[async_trait]
pub trait RateLimitRepository: Send + Sync {
    /// Counts the attempts for `key` made within the last
    /// `window_duration_seconds`, including this one.
    ///
    /// The attempt is stored only while the count stays within
    /// `max_attempts`, so rejected calls never extend the window and a key
    /// holds at most `max_attempts` timestamps.
    async fn record_attempt(
        &self,
        key: &str,
        max_attempts: i32,
        window_duration_seconds: i64,
    ) -> AppResult<AttemptInfo>;

    /// Drops keys whose most recent attempt is older than the cutoff.
    async fn cleanup_expired(&self, before: DateTime<Utc>) -> AppResult<u64>;
}

/// Attempt count observed for a key over the trailing window.
#[derive(Debug, Clone)]
pub struct AttemptInfo {
    /// Attempts within the window, including the one just made.
    pub attempt_count: i32,
    /// Oldest attempt still inside the window.
    pub oldest_attempt_at: DateTime<Utc>,
}
