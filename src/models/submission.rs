use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{FilingId, QuestionId, RevisionId, SubmissionId};

/// One submitted round of a filing. Unique per (filing, round).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub filing_id: FilingId,
    pub round: u32,
    pub submitted_at: DateTime<Utc>,
    pub score: f64,
}

impl Submission {
    pub fn new(filing_id: FilingId, round: u32, score: f64) -> Self {
        Self {
            id: SubmissionId::new(),
            filing_id,
            round,
            submitted_at: Utc::now(),
            score,
        }
    }
}

/// Immutable link tuple binding a snapshot revision into a submission.
/// Created once per (submission, question), never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionAnswer {
    pub submission_id: SubmissionId,
    pub question_id: QuestionId,
    pub answer_revision_id: RevisionId,
}
