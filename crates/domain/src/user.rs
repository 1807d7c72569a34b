use chrono::{DateTime, Utc};
use rolegate_core::SubjectId;
use serde::{Deserialize, Serialize};

use crate::Role;

/// User account as stored by the identity store.
///
/// The gateway only ever writes `role`; the remaining fields are read for
/// audit purposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Primary key.
    pub subject: SubjectId,
    /// Current role claim, absent for accounts never assigned a role.
    pub role: Option<Role>,
    /// Timestamp of the most recent modification.
    pub last_modified_at: DateTime<Utc>,
    /// Subject that performed the most recent modification.
    pub last_modified_by: Option<SubjectId>,
}

impl UserRecord {
    /// Creates a record for a freshly provisioned account.
    #[must_use]
    pub fn new(subject: SubjectId, role: Option<Role>) -> Self {
        Self {
            subject,
            role,
            last_modified_at: Utc::now(),
            last_modified_by: None,
        }
    }
}
