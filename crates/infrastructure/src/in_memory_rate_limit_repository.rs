//! Process-local rate limit repository with a bounded key table.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use rolegate_application::{AttemptInfo, RateLimitRepository};
use rolegate_core::{AppError, AppResult};

/// Default cap on tracked keys.
pub const DEFAULT_MAX_TRACKED_KEYS: usize = 10_000;

/// Sliding-window attempt logs kept in process memory.
///
/// Each key holds the timestamps of its allowed attempts, oldest first. At
/// most `max_tracked_keys` keys are held. When a new key arrives at
/// capacity, keys without a live attempt are dropped first, then the key
/// that has been idle longest.
#[derive(Debug)]
pub struct InMemoryRateLimitRepository {
    attempts: Mutex<HashMap<String, VecDeque<DateTime<Utc>>>>,
    max_tracked_keys: usize,
}

impl InMemoryRateLimitRepository {
    /// Creates a repository tracking at most `max_tracked_keys` keys.
    #[must_use]
    pub fn new(max_tracked_keys: usize) -> Self {
        Self {
            attempts: Mutex::new(HashMap::new()),
            max_tracked_keys: max_tracked_keys.max(1),
        }
    }

    /// Returns the number of tracked keys.
    pub async fn tracked_keys(&self) -> usize {
        self.attempts.lock().await.len()
    }

    async fn record_attempt_at(
        &self,
        key: &str,
        max_attempts: i32,
        window_duration_seconds: i64,
        now: DateTime<Utc>,
    ) -> AppResult<AttemptInfo> {
        if window_duration_seconds <= 0 {
            return Err(AppError::Configuration(
                "rate limit window must be greater than zero seconds".to_owned(),
            ));
        }

        let window_start = now - Duration::seconds(window_duration_seconds);
        let mut attempts = self.attempts.lock().await;
        if !attempts.contains_key(key) {
            make_room(&mut attempts, self.max_tracked_keys, window_start);
        }

        let log = attempts.entry(key.to_owned()).or_default();
        while log.front().is_some_and(|attempt| *attempt <= window_start) {
            log.pop_front();
        }

        let attempt_count = i32::try_from(log.len())
            .unwrap_or(i32::MAX)
            .saturating_add(1);
        if attempt_count <= max_attempts {
            log.push_back(now);
        }

        Ok(AttemptInfo {
            attempt_count,
            oldest_attempt_at: log.front().copied().unwrap_or(now),
        })
    }
}

impl Default for InMemoryRateLimitRepository {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TRACKED_KEYS)
    }
}

fn make_room(
    attempts: &mut HashMap<String, VecDeque<DateTime<Utc>>>,
    capacity: usize,
    window_start: DateTime<Utc>,
) {
    if attempts.len() < capacity {
        return;
    }

    attempts.retain(|_, log| log.back().is_some_and(|latest| *latest > window_start));
    while attempts.len() >= capacity {
        let Some(idlest) = attempts
            .iter()
            .min_by_key(|(_, log)| log.back().copied())
            .map(|(key, _)| key.clone())
        else {
            break;
        };
        attempts.remove(&idlest);
    }
}

#[async_trait]
impl RateLimitRepository for InMemoryRateLimitRepository {
    async fn record_attempt(
        &self,
        key: &str,
        max_attempts: i32,
        window_duration_seconds: i64,
    ) -> AppResult<AttemptInfo> {
        self.record_attempt_at(key, max_attempts, window_duration_seconds, Utc::now()).await
    }

    async fn cleanup_expired(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let mut attempts = self.attempts.lock().await;
        let tracked = attempts.len();
        attempts.retain(|_, log| log.back().is_some_and(|latest| *latest >= before));

        Ok((tracked - attempts.len()) as u64)
    }
}
