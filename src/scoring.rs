// Deterministic score aggregation. Pure per-revision rules plus
// store-backed recomputes that skip the write when nothing changed.

use std::collections::HashMap;

use tracing::debug;

use crate::models::{AnswerRevision, Filing, FilingId, QuestionId, Submission};
use crate::storage::{ReviewTx, StoreError};

/// Round to the nearest half point.
pub fn quantize_to_half(x: f64) -> f64 {
    (x * 2.0).round() / 2.0
}

/// Live drafts trust the model first; the auditor has not seen them yet.
pub fn effective_draft_score(rev: &AnswerRevision) -> f64 {
    rev.model_score.or(rev.auditor_score).unwrap_or(0.0)
}

/// Snapshots trust the auditor first; their judgment is authoritative once
/// the answer is frozen.
pub fn effective_snapshot_score(rev: &AnswerRevision) -> f64 {
    rev.auditor_score.or(rev.model_score).unwrap_or(0.0)
}

/// Finalization deliberately favors whichever of model/auditor scored
/// higher. This is a different rule from `effective_snapshot_score` and must
/// stay one.
pub fn final_question_score(rev: &AnswerRevision) -> f64 {
    match (rev.model_score, rev.auditor_score) {
        (Some(model), Some(auditor)) => model.max(auditor),
        (Some(model), None) => model,
        (None, Some(auditor)) => auditor,
        (None, None) => 0.0,
    }
}

/// Live aggregate over the newest draft per question.
pub async fn current_score(tx: &dyn ReviewTx, filing: FilingId) -> Result<f64, StoreError> {
    let drafts = tx.drafts(filing).await?;
    // One live draft per question is the invariant; keep the newest should a
    // stale duplicate ever surface.
    let mut newest: HashMap<QuestionId, AnswerRevision> = HashMap::new();
    for draft in drafts {
        match newest.get(&draft.question_id) {
            Some(existing) if existing.updated_at >= draft.updated_at => {}
            _ => {
                newest.insert(draft.question_id, draft);
            }
        }
    }
    let total: f64 = newest.values().map(effective_draft_score).sum();
    Ok(quantize_to_half(total))
}

/// Canonical score of one submission, over its linked snapshots.
pub async fn submission_score(
    tx: &dyn ReviewTx,
    submission: &Submission,
) -> Result<f64, StoreError> {
    let mut total = 0.0;
    for link in tx.submission_answers(submission.id).await? {
        if let Some(snapshot) = tx.revision(link.answer_revision_id).await? {
            total += effective_snapshot_score(&snapshot);
        }
    }
    Ok(quantize_to_half(total))
}

/// Final score over the last submission's snapshots, max(model, auditor)
/// per question.
pub async fn final_score(tx: &dyn ReviewTx, filing: FilingId) -> Result<f64, StoreError> {
    let Some(last) = tx.latest_submission(filing).await? else {
        return Ok(0.0);
    };
    let mut total = 0.0;
    for link in tx.submission_answers(last.id).await? {
        if let Some(snapshot) = tx.revision(link.answer_revision_id).await? {
            total += final_question_score(&snapshot);
        }
    }
    Ok(quantize_to_half(total))
}

/// Recompute and store `filing.current_score`. Returns whether it changed;
/// equal values write nothing.
pub async fn apply_current_score(
    tx: &mut dyn ReviewTx,
    filing: &mut Filing,
) -> Result<bool, StoreError> {
    let recomputed = current_score(&*tx, filing.id).await?;
    if recomputed == filing.current_score {
        return Ok(false);
    }
    debug!(
        filing = %filing.id,
        from = filing.current_score,
        to = recomputed,
        "current score changed"
    );
    filing.current_score = recomputed;
    tx.update_filing(filing.clone()).await?;
    Ok(true)
}

/// Recompute and store a submission's score. No-op write when unchanged.
pub async fn apply_submission_score(
    tx: &mut dyn ReviewTx,
    submission: &mut Submission,
) -> Result<bool, StoreError> {
    let recomputed = submission_score(&*tx, submission).await?;
    if recomputed == submission.score {
        return Ok(false);
    }
    submission.score = recomputed;
    tx.update_submission(submission.clone()).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FilingId, QuestionId, UserId};

    fn rev(model: Option<f64>, auditor: Option<f64>) -> AnswerRevision {
        AnswerRevision {
            model_score: model,
            auditor_score: auditor,
            ..AnswerRevision::new_draft(FilingId::new(), QuestionId::new(), UserId::new())
        }
    }

    #[test]
    fn quantize_rounds_to_nearest_half() {
        assert_eq!(quantize_to_half(6.0), 6.0);
        assert_eq!(quantize_to_half(6.2), 6.0);
        assert_eq!(quantize_to_half(6.26), 6.5);
        assert_eq!(quantize_to_half(6.75), 7.0);
        assert_eq!(quantize_to_half(0.0), 0.0);
    }

    #[test]
    fn draft_rule_prefers_model_snapshot_rule_prefers_auditor() {
        let r = rev(Some(2.0), Some(4.0));
        assert_eq!(effective_draft_score(&r), 2.0);
        assert_eq!(effective_snapshot_score(&r), 4.0);

        let model_only = rev(Some(2.0), None);
        assert_eq!(effective_draft_score(&model_only), 2.0);
        assert_eq!(effective_snapshot_score(&model_only), 2.0);

        let auditor_only = rev(None, Some(4.0));
        assert_eq!(effective_draft_score(&auditor_only), 4.0);
        assert_eq!(effective_snapshot_score(&auditor_only), 4.0);

        let neither = rev(None, None);
        assert_eq!(effective_draft_score(&neither), 0.0);
        assert_eq!(effective_snapshot_score(&neither), 0.0);
    }

    #[test]
    fn final_rule_takes_the_higher_judgment() {
        assert_eq!(final_question_score(&rev(Some(2.0), Some(3.0))), 3.0);
        assert_eq!(final_question_score(&rev(Some(4.0), Some(1.0))), 4.0);
        assert_eq!(final_question_score(&rev(None, Some(1.5))), 1.5);
        assert_eq!(final_question_score(&rev(Some(2.5), None)), 2.5);
        assert_eq!(final_question_score(&rev(None, None)), 0.0);
    }

    #[test]
    fn draft_and_final_totals_diverge_per_rule() {
        // Drafts: A model=2, B auditor=4 -> current 6.0.
        let a = rev(Some(2.0), None);
        let b = rev(None, Some(4.0));
        let current = quantize_to_half(effective_draft_score(&a) + effective_draft_score(&b));
        assert_eq!(current, 6.0);

        // Finalization: A (2,3), B (4,1) -> max(2,3)+max(4,1) = 7.0.
        let a = rev(Some(2.0), Some(3.0));
        let b = rev(Some(4.0), Some(1.0));
        let fin = quantize_to_half(final_question_score(&a) + final_question_score(&b));
        assert_eq!(fin, 7.0);
    }
}
