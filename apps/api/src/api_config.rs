use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use rolegate_core::{AppError, SubjectId};
use rolegate_domain::Role;
use tracing_subscriber::EnvFilter;

/// Where user records, role change records and audit entries live.
#[derive(Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Postgres { database_url: String },
}

/// Where per-actor rate limit counters live.
#[derive(Clone, PartialEq, Eq)]
pub enum RateLimitBackend {
    Memory { max_tracked_keys: usize },
    Redis { redis_url: String },
}

/// Key material used to verify bearer tokens.
#[derive(Clone, PartialEq, Eq)]
pub enum TokenVerification {
    SharedSecret(String),
    PublicKeyPem(String),
}

#[derive(Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub api_host: String,
    pub api_port: u16,
    pub store_backend: StoreBackend,
    pub token_verification: TokenVerification,
    pub token_issuer: Option<String>,
    pub token_audience: Option<String>,
    pub rate_limit_backend: RateLimitBackend,
    pub rate_limit_max_attempts: i32,
    pub rate_limit_window_seconds: i64,
    pub store_retry_max_attempts: u32,
    pub store_retry_base_delay: Duration,
    pub max_concurrent_requests: usize,
    pub dev_seed_users: Vec<(SubjectId, Option<Role>)>,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let mut config = Self::from_lookup(|name| env::var(name).ok())?;
        config.migrate_only = env::args().nth(1).as_deref() == Some("migrate");

        if config.migrate_only && !matches!(config.store_backend, StoreBackend::Postgres { .. }) {
            return Err(AppError::Configuration(
                "the migrate command requires STORE_BACKEND=postgres".to_owned(),
            ));
        }

        Ok(config)
    }

    /// Builds the configuration from a variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let store_backend = match lookup("STORE_BACKEND").as_deref().unwrap_or("memory") {
            "memory" => StoreBackend::Memory,
            "postgres" => StoreBackend::Postgres {
                database_url: lookup("DATABASE_URL").ok_or_else(|| {
                    AppError::Configuration(
                        "DATABASE_URL is required when STORE_BACKEND=postgres".to_owned(),
                    )
                })?,
            },
            other => {
                return Err(AppError::Configuration(format!(
                    "STORE_BACKEND must be either 'memory' or 'postgres', got '{other}'"
                )));
            }
        };

        let token_verification = match (
            lookup("TOKEN_SIGNING_SECRET"),
            lookup("TOKEN_PUBLIC_KEY_PEM"),
        ) {
            (Some(secret), None) => TokenVerification::SharedSecret(secret),
            (None, Some(pem)) => TokenVerification::PublicKeyPem(pem),
            (Some(_), Some(_)) => {
                return Err(AppError::Configuration(
                    "set only one of TOKEN_SIGNING_SECRET or TOKEN_PUBLIC_KEY_PEM".to_owned(),
                ));
            }
            (None, None) => {
                return Err(AppError::Configuration(
                    "TOKEN_SIGNING_SECRET or TOKEN_PUBLIC_KEY_PEM is required".to_owned(),
                ));
            }
        };

        let rate_limit_backend = match lookup("RATE_LIMIT_BACKEND").as_deref().unwrap_or("memory")
        {
            "memory" => RateLimitBackend::Memory {
                max_tracked_keys: parsed(&lookup, "RATE_LIMIT_MAX_TRACKED_KEYS", 10_000)?,
            },
            "redis" => RateLimitBackend::Redis {
                redis_url: lookup("REDIS_URL").ok_or_else(|| {
                    AppError::Configuration(
                        "REDIS_URL is required when RATE_LIMIT_BACKEND=redis".to_owned(),
                    )
                })?,
            },
            other => {
                return Err(AppError::Configuration(format!(
                    "RATE_LIMIT_BACKEND must be either 'memory' or 'redis', got '{other}'"
                )));
            }
        };

        let rate_limit_max_attempts = parsed(&lookup, "RATE_LIMIT_MAX_ATTEMPTS", 10)?;
        let rate_limit_window_seconds = parsed(&lookup, "RATE_LIMIT_WINDOW_SECONDS", 60)?;
        if rate_limit_max_attempts < 1 || rate_limit_window_seconds < 1 {
            return Err(AppError::Configuration(
                "rate limit attempts and window must be positive".to_owned(),
            ));
        }

        let max_concurrent_requests = parsed(&lookup, "API_MAX_CONCURRENT_REQUESTS", 10)?;
        if max_concurrent_requests == 0 {
            return Err(AppError::Configuration(
                "API_MAX_CONCURRENT_REQUESTS must be at least 1".to_owned(),
            ));
        }

        Ok(Self {
            migrate_only: false,
            api_host: lookup("API_HOST").unwrap_or_else(|| "127.0.0.1".to_owned()),
            api_port: parsed(&lookup, "API_PORT", 3001)?,
            store_backend,
            token_verification,
            token_issuer: lookup("TOKEN_ISSUER"),
            token_audience: lookup("TOKEN_AUDIENCE"),
            rate_limit_backend,
            rate_limit_max_attempts,
            rate_limit_window_seconds,
            store_retry_max_attempts: parsed(&lookup, "STORE_RETRY_MAX_ATTEMPTS", 3)?,
            store_retry_base_delay: Duration::from_millis(parsed(
                &lookup,
                "STORE_RETRY_BASE_DELAY_MS",
                50,
            )?),
            max_concurrent_requests,
            dev_seed_users: lookup("DEV_SEED_USERS")
                .map(|value| parse_seed_users(&value))
                .transpose()?
                .unwrap_or_default(),
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Configuration(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn parsed<T>(lookup: impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|error| AppError::Configuration(format!("invalid {name} '{value}': {error}"))),
        None => Ok(default),
    }
}

/// Parses `subject=role` pairs separated by commas; an empty role seeds a
/// user without a role claim.
fn parse_seed_users(value: &str) -> Result<Vec<(SubjectId, Option<Role>)>, AppError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (subject, role) = pair.split_once('=').unwrap_or((pair, ""));
            let subject = SubjectId::new(subject).map_err(|_| {
                AppError::Configuration(format!("invalid DEV_SEED_USERS entry '{pair}'"))
            })?;
            let role = match role.trim() {
                "" => None,
                role => Some(Role::from_str(role).map_err(|error| {
                    AppError::Configuration(format!(
                        "invalid DEV_SEED_USERS entry '{pair}': {error}"
                    ))
                })?),
            };

            Ok((subject, role))
        })
        .collect()
}
