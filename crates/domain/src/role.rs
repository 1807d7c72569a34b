use std::fmt::{Display, Formatter};
use std::str::FromStr;

use rolegate_core::AppError;
use serde::{Deserialize, Serialize};

/// Roles that may be stored in a user's role claim.
///
/// Declaration order is privilege order: later variants outrank earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Read-only access.
    Viewer,
    /// Content editing access.
    Editor,
    /// Full administrative access.
    Admin,
}

impl Role {
    /// Returns a stable storage value for this role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Editor => "editor",
            Self::Admin => "admin",
        }
    }

    /// Returns the privilege level used for self-demotion checks.
    #[must_use]
    pub fn privilege_level(&self) -> u8 {
        match self {
            Self::Viewer => 10,
            Self::Editor => 20,
            Self::Admin => 30,
        }
    }

    /// Returns whether this role grants strictly less privilege than `other`.
    #[must_use]
    pub fn is_lower_than(&self, other: Role) -> bool {
        self.privilege_level() < other.privilege_level()
    }

    /// Returns all recognized roles, lowest privilege first.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Role] = &[Role::Viewer, Role::Editor, Role::Admin];

        ALL
    }

    /// Parses a transport value into a role.
    pub fn from_transport(value: &str) -> Result<Self, AppError> {
        Self::from_str(value)
    }
}

impl Display for Role {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "viewer" => Ok(Self::Viewer),
            "editor" => Ok(Self::Editor),
            "admin" => Ok(Self::Admin),
            _ => Err(AppError::UnknownRole(format!(
                "'{value}' is not a recognized role"
            ))),
        }
    }
}
