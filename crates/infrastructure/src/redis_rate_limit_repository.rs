//! Redis-backed rate limit repository shared across gateway instances.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use redis::Script;
use redis::aio::ConnectionManager;
use uuid::Uuid;

use rolegate_application::{AttemptInfo, RateLimitRepository};
use rolegate_core::{AppError, AppResult};

/// Keeps a sorted set of allowed attempt times per key, scored in
/// milliseconds. Entries older than the window are trimmed before counting
/// and a rejected attempt is not added.
const RECORD_ATTEMPT_SCRIPT: &str = r#"
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local max_attempts = tonumber(ARGV[3])

redis.call('ZREMRANGEBYSCORE', KEYS[1], '-inf', now - window)
local count = redis.call('ZCARD', KEYS[1]) + 1

if count <= max_attempts then
  redis.call('ZADD', KEYS[1], now, ARGV[4])
  redis.call('PEXPIRE', KEYS[1], window)
end

local oldest = redis.call('ZRANGE', KEYS[1], 0, 0, 'WITHSCORES')
if oldest[2] then
  return {count, math.floor(tonumber(oldest[2]))}
end

return {count, now}
"#;

/// Redis implementation of the rate limit repository port.
#[derive(Clone)]
pub struct RedisRateLimitRepository {
    connection: ConnectionManager,
    key_prefix: String,
}

impl RedisRateLimitRepository {
    /// Opens a managed connection to `redis_url`.
    pub async fn connect(redis_url: &str, key_prefix: impl Into<String>) -> AppResult<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|error| AppError::Configuration(format!("invalid REDIS_URL: {error}")))?;
        let connection = ConnectionManager::new(client).await.map_err(|error| {
            AppError::StoreUnavailable(format!("failed to connect to redis: {error}"))
        })?;

        Ok(Self {
            connection,
            key_prefix: key_prefix.into(),
        })
    }

    fn key_for(&self, key: &str) -> String {
        format!("{}:{key}", self.key_prefix)
    }
}

fn redis_error(error: redis::RedisError) -> AppError {
    if error.is_io_error() || error.is_timeout() || error.is_connection_dropped() {
        AppError::StoreUnavailable(format!("redis rate limit store unreachable: {error}"))
    } else {
        AppError::Internal(format!("failed to record redis rate limit attempt: {error}"))
    }
}

#[async_trait]
impl RateLimitRepository for RedisRateLimitRepository {
    async fn record_attempt(
        &self,
        key: &str,
        max_attempts: i32,
        window_duration_seconds: i64,
    ) -> AppResult<AttemptInfo> {
        if window_duration_seconds <= 0 {
            return Err(AppError::Configuration(
                "rate limit window must be greater than zero seconds".to_owned(),
            ));
        }

        let mut connection = self.connection.clone();
        let (attempt_count, oldest_attempt_millis): (i64, i64) = Script::new(RECORD_ATTEMPT_SCRIPT)
            .key(self.key_for(key))
            .arg(Utc::now().timestamp_millis())
            .arg(window_duration_seconds.saturating_mul(1_000))
            .arg(max_attempts)
            .arg(Uuid::new_v4().to_string())
            .invoke_async(&mut connection)
            .await
            .map_err(redis_error)?;

        let attempt_count = i32::try_from(attempt_count).unwrap_or(i32::MAX);
        let oldest_attempt_at = Utc
            .timestamp_millis_opt(oldest_attempt_millis)
            .single()
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "invalid redis attempt timestamp: {oldest_attempt_millis}"
                ))
            })?;

        Ok(AttemptInfo {
            attempt_count,
            oldest_attempt_at,
        })
    }

    async fn cleanup_expired(&self, _before: DateTime<Utc>) -> AppResult<u64> {
        // Each key expires one window after its latest allowed attempt.
        Ok(0)
    }
}
