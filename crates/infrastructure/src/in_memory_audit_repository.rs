use async_trait::async_trait;
use tokio::sync::RwLock;

use rolegate_application::{AuditQuery, AuditRepository, AuditWriteOutcome};
use rolegate_core::AppResult;
use rolegate_domain::{AuditEntry, IdempotencyKey};

/// In-memory append-only audit trail.
#[derive(Debug, Default)]
pub struct InMemoryAuditRepository {
    entries: RwLock<Vec<AuditEntry>>,
}

impl InMemoryAuditRepository {
    /// Creates an empty audit trail.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditRepository for InMemoryAuditRepository {
    async fn write_audit_if_absent(
        &self,
        key: &IdempotencyKey,
        entry: AuditEntry,
    ) -> AppResult<AuditWriteOutcome> {
        let mut entries = self.entries.write().await;
        if let Some(existing) = entries
            .iter()
            .find(|stored| stored.idempotency_key.as_ref() == Some(key))
        {
            return Ok(AuditWriteOutcome {
                inserted: false,
                existing: Some(existing.clone()),
            });
        }

        entries.push(entry);
        Ok(AuditWriteOutcome {
            inserted: true,
            existing: None,
        })
    }

    async fn append_entry(&self, entry: AuditEntry) -> AppResult<()> {
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn find_by_idempotency_key(
        &self,
        key: &IdempotencyKey,
    ) -> AppResult<Option<AuditEntry>> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .find(|entry| entry.idempotency_key.as_ref() == Some(key))
            .cloned())
    }

    async fn list_entries(&self, query: AuditQuery) -> AppResult<Vec<AuditEntry>> {
        let query = query.normalized();
        let entries = self.entries.read().await;

        Ok(entries
            .iter()
            .rev()
            .filter(|entry| query.matches(entry))
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect())
    }
}
