use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{CatalogueVersionId, FilingId, ProjectId};
use crate::status::FilingStatus;

/// The unit of work progressing through the review workflow.
///
/// `version` is the optimistic-concurrency marker: the store bumps it on
/// every write, and the transition orchestrator compares it during its
/// reverify step to detect a concurrent writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filing {
    pub id: FilingId,
    pub project_id: ProjectId,
    pub catalogue_version: CatalogueVersionId,
    pub status: FilingStatus,
    /// Live aggregate over the newest draft per question.
    pub current_score: f64,
    /// Computed once, on entering `final`.
    pub final_score: Option<f64>,
    /// Write-once: stamped on the draft -> v1 edge.
    pub first_submit_at: Option<DateTime<Utc>>,
    /// Write-once: stamped on entering `final`.
    pub finalized_at: Option<DateTime<Utc>>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Filing {
    pub fn new(project_id: ProjectId, catalogue_version: CatalogueVersionId) -> Self {
        let now = Utc::now();
        Self {
            id: FilingId::new(),
            project_id,
            catalogue_version,
            status: FilingStatus::Draft,
            current_score: 0.0,
            final_score: None,
            first_submit_at: None,
            finalized_at: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}
