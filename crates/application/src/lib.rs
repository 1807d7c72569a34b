//! Application services and ports.

#![forbid(unsafe_code)]

mod gateway_ports;
mod rate_limit_service;
mod retry;
mod role_assignment_gateway;

pub use gateway_ports::{
    AUDIT_QUERY_MAX_LIMIT, AuditQuery, AuditRepository, AuditWriteOutcome, ClaimWriteOutcome,
    IdentityProvider, IdentityStore, RoleClaimWrite, VerifiedToken,
};
pub use rate_limit_service::{AttemptInfo, RateLimitRepository, RateLimitRule, RateLimitService};
pub use retry::RetryPolicy;
pub use role_assignment_gateway::{AuthorizedRoleChange, RoleAssignmentGateway};
