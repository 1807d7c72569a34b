use chrono::Duration;

use rolegate_core::{AppError, AppResult};

/// Counter category for role changes.
const ROLE_CHANGE_CATEGORY: &str = "role_change";

/// Allows at most `max_attempts` calls per actor in any trailing
/// `window_seconds` span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitRule {
    /// Prefixed to every counter key.
    pub category: String,
    pub max_attempts: i32,
    pub window_seconds: i64,
}

impl RateLimitRule {
    #[must_use]
    pub fn new(category: impl Into<String>, max_attempts: i32, window_seconds: i64) -> Self {
        Self {
            category: category.into(),
            max_attempts,
            window_seconds,
        }
    }

    /// Role-change rule with the default limit of 10 per minute.
    #[must_use]
    pub fn role_changes() -> Self {
        Self::new(ROLE_CHANGE_CATEGORY, 10, 60)
    }

    /// Role-change rule with configured limits, both of which must be
    /// positive.
    pub fn role_changes_with(max_attempts: i32, window_seconds: i64) -> AppResult<Self> {
        if max_attempts < 1 || window_seconds < 1 {
            return Err(AppError::Configuration(format!(
                "role change rate limit needs positive attempts and window, got {max_attempts} \
                 per {window_seconds}s"
            )));
        }

        Ok(Self::new(ROLE_CHANGE_CATEGORY, max_attempts, window_seconds))
    }

    pub(crate) fn counter_key(&self, actor: &str) -> String {
        format!("{}:{actor}", self.category)
    }

    pub(crate) fn window(&self) -> Duration {
        Duration::seconds(self.window_seconds)
    }
}
