use std::sync::Arc;
use std::time::Duration;

use rolegate_application::{
    AuditRepository, IdentityProvider, IdentityStore, RateLimitRepository, RateLimitRule,
    RateLimitService, RetryPolicy, RoleAssignmentGateway,
};
use rolegate_core::AppError;
use rolegate_domain::UserRecord;
use rolegate_infrastructure::{
    InMemoryAuditRepository, InMemoryIdentityStore, InMemoryRateLimitRepository,
    JwtIdentityProvider, PostgresAuditRepository, PostgresIdentityStore,
    RedisRateLimitRepository,
};
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::api_config::{ApiConfig, RateLimitBackend, TokenVerification};
use crate::state::AppState;

const REDIS_KEY_PREFIX: &str = "rolegate:rate_limit";
const STORE_RETRY_MAX_DELAY: Duration = Duration::from_secs(1);

/// Wires adapters into the gateway. With a pool the Postgres adapters are
/// used, otherwise the in-memory ones.
pub async fn build_app_state(
    config: &ApiConfig,
    pool: Option<&PgPool>,
) -> Result<(AppState, RateLimitService), AppError> {
    let identity_provider: Arc<dyn IdentityProvider> = match &config.token_verification {
        TokenVerification::SharedSecret(secret) => Arc::new(JwtIdentityProvider::hs256(
            secret,
            config.token_issuer.as_deref(),
            config.token_audience.as_deref(),
        )?),
        TokenVerification::PublicKeyPem(pem) => Arc::new(JwtIdentityProvider::rs256_pem(
            pem,
            config.token_issuer.as_deref(),
            config.token_audience.as_deref(),
        )?),
    };

    let (identity_store, audit_repository): (Arc<dyn IdentityStore>, Arc<dyn AuditRepository>) =
        match pool {
            Some(pool) => {
                let store = PostgresIdentityStore::new(pool.clone());
                for (subject, role) in &config.dev_seed_users {
                    store.upsert_user(subject, *role).await?;
                }
                (
                    Arc::new(store),
                    Arc::new(PostgresAuditRepository::new(pool.clone())),
                )
            }
            None => {
                warn!("using in-memory identity store; role changes are lost on restart");
                (
                    Arc::new(InMemoryIdentityStore::with_users(
                        config
                            .dev_seed_users
                            .iter()
                            .map(|(subject, role)| UserRecord::new(subject.clone(), *role)),
                    )),
                    Arc::new(InMemoryAuditRepository::new()),
                )
            }
        };
    if !config.dev_seed_users.is_empty() {
        info!(count = config.dev_seed_users.len(), "seeded development users");
    }

    let rate_limit_repository: Arc<dyn RateLimitRepository> = match &config.rate_limit_backend {
        RateLimitBackend::Memory { max_tracked_keys } => {
            Arc::new(InMemoryRateLimitRepository::new(*max_tracked_keys))
        }
        RateLimitBackend::Redis { redis_url } => {
            Arc::new(RedisRateLimitRepository::connect(redis_url, REDIS_KEY_PREFIX).await?)
        }
    };
    let rate_limit_service = RateLimitService::new(rate_limit_repository);

    let gateway = RoleAssignmentGateway::new(
        identity_provider,
        identity_store,
        audit_repository,
        rate_limit_service.clone(),
    )
    .with_rate_limit_rule(RateLimitRule::role_changes_with(
        config.rate_limit_max_attempts,
        config.rate_limit_window_seconds,
    )?)
    .with_retry_policy(RetryPolicy::new(
        config.store_retry_max_attempts,
        config.store_retry_base_delay,
        STORE_RETRY_MAX_DELAY,
    ));

    Ok((AppState { gateway }, rate_limit_service))
}

/// Drops expired rate limit windows once per window length.
pub fn spawn_rate_limit_cleanup(
    rate_limit_service: RateLimitService,
    rule: RateLimitRule,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = Duration::from_secs(rule.window_seconds.unsigned_abs().max(1));
        let mut interval = tokio::time::interval(period);
        interval.tick().await;

        loop {
            interval.tick().await;
            match rate_limit_service.cleanup(&rule).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "expired rate limit windows removed"),
                Err(error) => warn!(%error, "rate limit cleanup failed"),
            }
        }
    })
}
