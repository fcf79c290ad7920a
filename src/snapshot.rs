// Submission snapshotting: freezes the live drafts of a round into
// immutable revisions, idempotently per (filing, round).

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::models::{AnswerRevision, Filing, QuestionId, Submission, SubmissionAnswer};
use crate::scoring;
use crate::status::{role_gate, Role, RoundPlan, Stage};
use crate::storage::{ReviewTx, StoreError};
use crate::workflow::WorkflowError;

/// Auditor judgment written onto a snapshot during review.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditorAnnotation {
    pub score: Option<f64>,
    pub reason: Option<String>,
    pub suggestion: Option<String>,
}

pub struct SnapshotService {
    plan: RoundPlan,
}

impl SnapshotService {
    pub fn new(plan: RoundPlan) -> Self {
        Self { plan }
    }

    /// Freeze the filing's drafts into the submission for `round`.
    ///
    /// Preconditions: every catalogue question has a non-blank draft,
    /// otherwise `PrereqFailed` names the first offending question.
    /// Idempotent: an existing submission row is reused, questions already
    /// linked are skipped, and a duplicate-key race on link creation is a
    /// benign no-op. The round score is seeded from the filing's current
    /// aggregate and then recomputed canonically from the snapshots.
    pub async fn create_snapshot(
        &self,
        tx: &mut dyn ReviewTx,
        filing: &Filing,
        round: u32,
    ) -> Result<Submission, WorkflowError> {
        if round == 0 || round > self.plan.max_rounds() {
            return Err(WorkflowError::RoundOutOfBounds {
                round,
                max_rounds: self.plan.max_rounds(),
            });
        }

        let questions = tx.questions(filing.catalogue_version).await?;
        let mut drafts = Vec::with_capacity(questions.len());
        for question in &questions {
            match tx.draft(filing.id, question.id).await? {
                Some(draft) if draft.has_answer() => drafts.push((question.id, draft)),
                _ => {
                    return Err(WorkflowError::PrereqFailed {
                        question: question.id,
                        detail: format!("question \"{}\" has no answer yet", question.prompt),
                    });
                }
            }
        }

        let mut submission = match tx.submission(filing.id, round).await? {
            Some(existing) => {
                debug!(filing = %filing.id, round, "reusing existing submission");
                existing
            }
            None => {
                let created = Submission::new(filing.id, round, filing.current_score);
                tx.insert_submission(created.clone()).await?;
                created
            }
        };

        let linked: Vec<QuestionId> = tx
            .submission_answers(submission.id)
            .await?
            .into_iter()
            .map(|a| a.question_id)
            .collect();

        for (question_id, draft) in drafts {
            if linked.contains(&question_id) {
                continue;
            }
            let next_index = tx
                .max_revision_index(filing.id, question_id)
                .await?
                .map_or(1, |max| max + 1);
            let snapshot = draft.freeze(next_index);
            tx.insert_revision(snapshot.clone()).await?;
            let link = SubmissionAnswer {
                submission_id: submission.id,
                question_id,
                answer_revision_id: snapshot.id,
            };
            match tx.insert_submission_answer(link).await {
                Ok(()) => {}
                // Another caller created the link first; theirs stands.
                Err(StoreError::Duplicate(_)) => {}
                Err(err) => return Err(err.into()),
            }
        }

        scoring::apply_submission_score(tx, &mut submission).await?;
        info!(
            filing = %filing.id,
            round,
            score = submission.score,
            "round snapshot created"
        );
        Ok(submission)
    }

    /// Write auditor judgment onto the snapshot of the round currently
    /// under review. Snapshots are otherwise immutable; this is the single
    /// exception carved out by the field-ownership table.
    pub async fn annotate_snapshot(
        &self,
        tx: &mut dyn ReviewTx,
        filing: &Filing,
        question: QuestionId,
        actor_role: Role,
        annotation: AuditorAnnotation,
    ) -> Result<AnswerRevision, WorkflowError> {
        let stage = self.plan.stage_of(filing.status)?;
        let round = match stage {
            Stage::AuditorReview { round } => round,
            _ => {
                return Err(WorkflowError::ForbiddenAction {
                    role: actor_role,
                    action: "annotate snapshot".to_string(),
                    stage,
                });
            }
        };
        if !role_gate::writable_fields(stage, actor_role).auditor_annotations {
            return Err(WorkflowError::ForbiddenAction {
                role: actor_role,
                action: "annotate snapshot".to_string(),
                stage,
            });
        }

        let submission = tx
            .submission(filing.id, round)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("submission for round {round}")))?;
        let link = tx
            .submission_answers(submission.id)
            .await?
            .into_iter()
            .find(|a| a.question_id == question)
            .ok_or_else(|| {
                WorkflowError::NotFound(format!("snapshot for question {question}"))
            })?;
        let mut snapshot = tx
            .revision(link.answer_revision_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("revision {}", link.answer_revision_id)))?;

        snapshot.auditor_score = annotation.score;
        snapshot.auditor_reason = annotation.reason;
        snapshot.auditor_suggestion = annotation.suggestion;
        snapshot.updated_at = chrono::Utc::now();
        tx.update_revision(snapshot.clone()).await?;

        let mut submission = submission;
        scoring::apply_submission_score(tx, &mut submission).await?;
        Ok(snapshot)
    }
}
