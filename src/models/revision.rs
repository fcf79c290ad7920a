use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{FilingId, QuestionId, RevisionId, UserId};

/// One revision of an answer to one question of one filing.
///
/// While `is_draft` is true this is the single live editable copy for its
/// (filing, question) pair. Snapshots (`is_draft` false) are frozen into a
/// submission and immutable afterwards, except for the auditor annotation
/// fields during the auditor-review stage that immediately follows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRevision {
    pub id: RevisionId,
    pub filing_id: FilingId,
    pub question_id: QuestionId,
    pub author_id: UserId,
    pub revision_index: u32,
    pub is_draft: bool,
    pub answer_text: String,
    pub model_score: Option<f64>,
    pub model_reason: Option<String>,
    pub model_suggestion: Option<String>,
    pub auditor_score: Option<f64>,
    pub auditor_reason: Option<String>,
    pub auditor_suggestion: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl AnswerRevision {
    /// A fresh empty draft at revision index 0.
    pub fn new_draft(filing_id: FilingId, question_id: QuestionId, author_id: UserId) -> Self {
        Self {
            id: RevisionId::new(),
            filing_id,
            question_id,
            author_id,
            revision_index: 0,
            is_draft: true,
            answer_text: String::new(),
            model_score: None,
            model_reason: None,
            model_suggestion: None,
            auditor_score: None,
            auditor_reason: None,
            auditor_suggestion: None,
            updated_at: Utc::now(),
        }
    }

    /// Clone this revision into an immutable snapshot with a new id.
    pub fn freeze(&self, revision_index: u32) -> Self {
        Self {
            id: RevisionId::new(),
            revision_index,
            is_draft: false,
            updated_at: Utc::now(),
            ..self.clone()
        }
    }

    pub fn has_answer(&self) -> bool {
        !self.answer_text.trim().is_empty()
    }
}
