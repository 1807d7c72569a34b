use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{AppError, AppResult, SubjectId};

/// Custom claims attached to a verified token.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimSet(Map<String, Value>);

impl ClaimSet {
    /// Creates a claim set from a JSON object.
    #[must_use]
    pub fn new(claims: Map<String, Value>) -> Self {
        Self(claims)
    }

    /// Returns whether the set carries no claims at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the raw claim value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Returns the claim as a boolean. Non-boolean values read as `None`.
    #[must_use]
    pub fn bool_claim(&self, name: &str) -> Option<bool> {
        self.0.get(name).and_then(Value::as_bool)
    }

    /// Returns the claim as a string. Non-string values read as `None`.
    #[must_use]
    pub fn string_claim(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }
}

impl FromIterator<(String, Value)> for ClaimSet {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Caller identity derived from a verified authentication token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallerIdentity {
    subject: SubjectId,
    claims: ClaimSet,
    issued_at: DateTime<Utc>,
}

impl CallerIdentity {
    /// Creates a caller identity from verified token data.
    ///
    /// Fails with [`AppError::MissingClaims`] when the token carried no
    /// custom claims.
    pub fn new(subject: SubjectId, claims: ClaimSet, issued_at: DateTime<Utc>) -> AppResult<Self> {
        if claims.is_empty() {
            return Err(AppError::MissingClaims(format!(
                "token for subject '{subject}' carries no claims"
            )));
        }

        Ok(Self {
            subject,
            claims,
            issued_at,
        })
    }

    /// Returns the stable subject claim from the identity provider.
    #[must_use]
    pub fn subject(&self) -> &SubjectId {
        &self.subject
    }

    /// Returns the verified custom claims.
    #[must_use]
    pub fn claims(&self) -> &ClaimSet {
        &self.claims
    }

    /// Returns when the token was issued.
    #[must_use]
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }
}
