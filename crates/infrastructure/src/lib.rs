//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_audit_repository;
mod in_memory_identity_store;
mod in_memory_rate_limit_repository;
mod jwt_identity_provider;
mod postgres_audit_repository;
mod postgres_errors;
mod postgres_identity_store;
mod redis_rate_limit_repository;

pub use in_memory_audit_repository::InMemoryAuditRepository;
pub use in_memory_identity_store::InMemoryIdentityStore;
pub use in_memory_rate_limit_repository::{DEFAULT_MAX_TRACKED_KEYS, InMemoryRateLimitRepository};
pub use jwt_identity_provider::JwtIdentityProvider;
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_identity_store::PostgresIdentityStore;
pub use redis_rate_limit_repository::RedisRateLimitRepository;
