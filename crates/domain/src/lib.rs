//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod audit;
mod request;
mod role;
mod state;
mod user;

pub use audit::{AuditEntry, AuditOutcome};
pub use request::{
    IDEMPOTENCY_KEY_MAX_LENGTH, IdempotencyKey, RoleAssignmentRequest, RoleAssignmentResult,
    RoleChangeRecord, request_fingerprint,
};
pub use role::Role;
pub use state::RequestState;
pub use user::UserRecord;
