use async_trait::async_trait;

use rolegate_core::{AppResult, SubjectId};
use rolegate_domain::{AuditEntry, AuditOutcome, IdempotencyKey};

/// Largest page returned by audit listings.
pub const AUDIT_QUERY_MAX_LIMIT: usize = 200;

/// Result of a keyed, insert-if-absent audit write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditWriteOutcome {
    /// Whether this call inserted the entry.
    pub inserted: bool,
    /// Entry already stored under the key when nothing was inserted.
    pub existing: Option<AuditEntry>,
}

/// Query parameters for audit listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditQuery {
    /// Maximum rows returned.
    pub limit: usize,
    /// Number of rows skipped for offset pagination.
    pub offset: usize,
    /// Optional actor filter.
    pub actor: Option<SubjectId>,
    /// Optional target filter.
    pub target: Option<SubjectId>,
    /// Optional outcome filter.
    pub outcome: Option<AuditOutcome>,
}

impl AuditQuery {
    /// Clamps the limit into `1..=AUDIT_QUERY_MAX_LIMIT`.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.limit = self.limit.clamp(1, AUDIT_QUERY_MAX_LIMIT);
        self
    }

    /// Returns whether an entry satisfies the filters.
    #[must_use]
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.actor.as_ref().is_none_or(|actor| actor == &entry.actor)
            && self.target.as_ref().is_none_or(|target| target == &entry.target)
            && self.outcome.is_none_or(|outcome| outcome == entry.outcome)
    }
}

impl Default for AuditQuery {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
            actor: None,
            target: None,
            outcome: None,
        }
    }
}

/// Append-only audit trail port.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Inserts a keyed entry unless one already exists for the key.
    async fn write_audit_if_absent(
        &self,
        key: &IdempotencyKey,
        entry: AuditEntry,
    ) -> AppResult<AuditWriteOutcome>;

    /// Appends an unkeyed entry.
    async fn append_entry(&self, entry: AuditEntry) -> AppResult<()>;

    /// Returns the entry stored under an idempotency key.
    async fn find_by_idempotency_key(&self, key: &IdempotencyKey)
    -> AppResult<Option<AuditEntry>>;

    /// Lists entries newest first.
    async fn list_entries(&self, query: AuditQuery) -> AppResult<Vec<AuditEntry>>;
}
