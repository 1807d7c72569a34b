mod audit;
mod identity;
mod store;

pub use audit::{AUDIT_QUERY_MAX_LIMIT, AuditQuery, AuditRepository, AuditWriteOutcome};
pub use identity::{IdentityProvider, VerifiedToken};
pub use store::{ClaimWriteOutcome, IdentityStore, RoleClaimWrite};
