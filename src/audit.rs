// Audit-log collaborator. Appends are best-effort: the orchestrator
// swallows failures so a broken audit sink can never roll back a committed
// transition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::info;

use crate::models::UserId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub before: Value,
    pub after: Value,
    pub user_id: Option<UserId>,
    pub recorded_at: DateTime<Utc>,
}

#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(&self, record: AuditRecord) -> anyhow::Result<()>;
}

/// Writes audit records as structured log events.
#[derive(Debug, Default)]
pub struct TracingAuditLog;

#[async_trait]
impl AuditLog for TracingAuditLog {
    async fn append(&self, record: AuditRecord) -> anyhow::Result<()> {
        info!(
            action = %record.action,
            entity_type = %record.entity_type,
            entity_id = %record.entity_id,
            user_id = ?record.user_id,
            before = %record.before,
            after = %record.after,
            "audit"
        );
        Ok(())
    }
}

/// Collects records in memory so tests can assert on them.
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    records: Mutex<Vec<AuditRecord>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl AuditLog for InMemoryAuditLog {
    async fn append(&self, record: AuditRecord) -> anyhow::Result<()> {
        self.records.lock().await.push(record);
        Ok(())
    }
}

/// An always-failing sink, for verifying that audit failures are swallowed.
#[derive(Debug, Default)]
pub struct FailingAuditLog;

#[async_trait]
impl AuditLog for FailingAuditLog {
    async fn append(&self, _record: AuditRecord) -> anyhow::Result<()> {
        anyhow::bail!("audit sink unavailable")
    }
}
