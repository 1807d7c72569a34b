//! Per-request lifecycle.
//!
//! `Received → Verified → Authorized → Applied`; `Rejected` and `Failed` are
//! terminal states reachable from any non-terminal state.

use rolegate_core::{AppError, AppResult};

/// Lifecycle state of one role assignment request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestState {
    /// Request arrived, caller not yet verified.
    Received,
    /// Caller token verified.
    Verified,
    /// Policy allows the change.
    Authorized,
    /// Role claim committed.
    Applied,
    /// Request refused; `reason` is the error kind.
    Rejected {
        /// Stable error kind.
        reason: &'static str,
    },
    /// Request failed; `reason` is the error kind.
    Failed {
        /// Stable error kind.
        reason: &'static str,
    },
}

impl RequestState {
    /// Returns a stable label for logging.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Verified => "verified",
            Self::Authorized => "authorized",
            Self::Applied => "applied",
            Self::Rejected { .. } => "rejected",
            Self::Failed { .. } => "failed",
        }
    }

    /// Returns whether no further transition is possible.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Applied | Self::Rejected { .. } | Self::Failed { .. }
        )
    }

    /// Moves to `next` when the transition is legal.
    pub fn advance(self, next: RequestState) -> AppResult<RequestState> {
        let legal = match (&self, &next) {
            (current, _) if current.is_terminal() => false,
            (_, Self::Rejected { .. } | Self::Failed { .. }) => true,
            (Self::Received, Self::Verified)
            | (Self::Verified, Self::Authorized)
            | (Self::Authorized, Self::Applied) => true,
            _ => false,
        };

        if legal {
            Ok(next)
        } else {
            Err(AppError::Internal(format!(
                "illegal request state transition {} -> {}",
                self.as_str(),
                next.as_str()
            )))
        }
    }

    /// Moves to the terminal state matching `error`.
    ///
    /// Store and internal faults fail the request; every other kind rejects
    /// it.
    pub fn terminate(self, error: &AppError) -> AppResult<RequestState> {
        let reason = error.kind();
        let next = if error.is_retriable() || error.is_internal() {
            Self::Failed { reason }
        } else {
            Self::Rejected { reason }
        };
        self.advance(next)
    }
}
