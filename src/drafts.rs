// Draft management: regenerating editable drafts at review boundaries,
// lazy creation on first access, and the lock-gated save path.

use std::sync::Arc;
use tracing::{debug, info};

use crate::grader::GradeOutcome;
use crate::locks::QuestionLockService;
use crate::models::{AnswerRevision, Filing, FilingId, QuestionId, UserId};
use crate::scoring;
use crate::status::{role_gate, Role, RoundPlan};
use crate::storage::{ReviewStore, ReviewTx};
use crate::workflow::WorkflowError;

/// Regenerates the live drafts from a round's snapshots when a filing moves
/// from auditor review back to client editing.
pub struct DraftSpawner {
    plan: RoundPlan,
}

impl DraftSpawner {
    pub fn new(plan: RoundPlan) -> Self {
        Self { plan }
    }

    /// Upsert one live draft per snapshot of `from_round`, carrying the
    /// answer text, model fields and auditor annotations forward as
    /// read-only context. Valid only for auditor-review -> client-edit
    /// boundaries, and safe to re-run for the same boundary.
    pub async fn refresh_drafts(
        &self,
        tx: &mut dyn ReviewTx,
        filing: &Filing,
        from_round: u32,
        to_round: u32,
    ) -> Result<usize, WorkflowError> {
        if from_round % 2 != 1 || to_round != from_round + 1 {
            return Err(WorkflowError::InvalidStatus(format!(
                "rounds {from_round} -> {to_round} are not an auditor-review/client-edit boundary"
            )));
        }
        if to_round > self.plan.max_rounds() {
            return Err(WorkflowError::MaxRoundsReached(format!(
                "round {to_round} exceeds max_rounds {}",
                self.plan.max_rounds()
            )));
        }

        let submission = tx
            .submission(filing.id, from_round)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("submission for round {from_round}")))?;

        let mut refreshed = 0;
        for link in tx.submission_answers(submission.id).await? {
            let snapshot = tx.revision(link.answer_revision_id).await?.ok_or_else(|| {
                WorkflowError::NotFound(format!("revision {}", link.answer_revision_id))
            })?;

            match tx.draft(filing.id, link.question_id).await? {
                Some(mut draft) => {
                    draft.revision_index = to_round;
                    draft.answer_text = snapshot.answer_text.clone();
                    draft.model_score = snapshot.model_score;
                    draft.model_reason = snapshot.model_reason.clone();
                    draft.model_suggestion = snapshot.model_suggestion.clone();
                    draft.auditor_score = snapshot.auditor_score;
                    draft.auditor_reason = snapshot.auditor_reason.clone();
                    draft.auditor_suggestion = snapshot.auditor_suggestion.clone();
                    draft.updated_at = chrono::Utc::now();
                    tx.update_revision(draft).await?;
                }
                None => {
                    let mut draft = snapshot.clone();
                    draft.id = crate::models::RevisionId::new();
                    draft.is_draft = true;
                    draft.revision_index = to_round;
                    draft.updated_at = chrono::Utc::now();
                    tx.insert_revision(draft).await?;
                }
            }
            refreshed += 1;
        }
        info!(filing = %filing.id, from_round, to_round, refreshed, "drafts refreshed");
        Ok(refreshed)
    }

    /// Prepare the freshly spawned drafts for client editing: the auditor
    /// guidance stays as context, model reason/suggestion are cleared, and
    /// the model score is dropped only where an auditor score supersedes it.
    /// Recomputes the filing's current score afterwards.
    pub async fn prepare_for_edit(
        &self,
        tx: &mut dyn ReviewTx,
        filing: &mut Filing,
    ) -> Result<(), WorkflowError> {
        for mut draft in tx.drafts(filing.id).await? {
            let mut changed = false;
            if draft.model_reason.take().is_some() {
                changed = true;
            }
            if draft.model_suggestion.take().is_some() {
                changed = true;
            }
            if draft.auditor_score.is_some() && draft.model_score.take().is_some() {
                changed = true;
            }
            if changed {
                draft.updated_at = chrono::Utc::now();
                tx.update_revision(draft).await?;
            }
        }
        scoring::apply_current_score(tx, filing).await?;
        Ok(())
    }
}

/// The client-facing draft surface: lazy creation, the lock-protected save
/// critical section, and applying grader output.
pub struct DraftWorkspace {
    store: Arc<dyn ReviewStore>,
    locks: Arc<QuestionLockService>,
    plan: RoundPlan,
}

impl DraftWorkspace {
    pub fn new(
        store: Arc<dyn ReviewStore>,
        locks: Arc<QuestionLockService>,
        plan: RoundPlan,
    ) -> Self {
        Self { store, locks, plan }
    }

    /// Fetch the live draft for (filing, question), creating an empty one
    /// on first access. This is the edit surface, so it is gated on the
    /// same field-ownership table as saving.
    pub async fn open_draft(
        &self,
        filing_id: FilingId,
        question_id: QuestionId,
        author: UserId,
        role: Role,
    ) -> Result<AnswerRevision, WorkflowError> {
        let mut tx = self.store.begin().await?;
        let filing = tx
            .filing(filing_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("filing {filing_id}")))?;
        let questions = tx.questions(filing.catalogue_version).await?;
        if !questions.iter().any(|q| q.id == question_id) {
            return Err(WorkflowError::NotFound(format!("question {question_id}")));
        }
        let stage = self.plan.stage_of(filing.status)?;
        if !role_gate::writable_fields(stage, role).answer_text {
            return Err(WorkflowError::ForbiddenAction {
                role,
                action: "open draft".to_string(),
                stage,
            });
        }

        if let Some(existing) = tx.draft(filing_id, question_id).await? {
            return Ok(existing);
        }

        let draft = AnswerRevision::new_draft(filing_id, question_id, author);
        debug!(filing = %filing_id, question = %question_id, "draft created lazily");
        tx.insert_revision(draft.clone()).await?;
        tx.commit().await?;
        Ok(draft)
    }

    /// Persist edited answer text. Requires an active question lock owned
    /// by the caller (refreshing its TTL), making this a lock-protected
    /// critical section. Recomputes the filing's current score.
    pub async fn save_draft(
        &self,
        filing_id: FilingId,
        question_id: QuestionId,
        user: UserId,
        role: Role,
        answer_text: String,
    ) -> Result<AnswerRevision, WorkflowError> {
        self.locks
            .ensure_lock_held(filing_id, question_id, user, true)
            .await?;

        let mut tx = self.store.begin().await?;
        let mut filing = tx
            .filing(filing_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("filing {filing_id}")))?;
        let stage = self.plan.stage_of(filing.status)?;
        if !role_gate::writable_fields(stage, role).answer_text {
            return Err(WorkflowError::ForbiddenAction {
                role,
                action: "edit answer text".to_string(),
                stage,
            });
        }

        let mut draft = match tx.draft(filing_id, question_id).await? {
            Some(existing) => existing,
            None => {
                let created = AnswerRevision::new_draft(filing_id, question_id, user);
                tx.insert_revision(created.clone()).await?;
                created
            }
        };
        draft.answer_text = answer_text;
        draft.updated_at = chrono::Utc::now();
        tx.update_revision(draft.clone()).await?;

        scoring::apply_current_score(&mut *tx, &mut filing).await?;
        tx.commit().await?;
        Ok(draft)
    }

    /// Write grader output onto the live draft as plain data and recompute
    /// the current score. The grading call itself belongs to the
    /// surrounding application.
    pub async fn apply_grading(
        &self,
        filing_id: FilingId,
        question_id: QuestionId,
        role: Role,
        outcome: &GradeOutcome,
    ) -> Result<AnswerRevision, WorkflowError> {
        let mut tx = self.store.begin().await?;
        let mut filing = tx
            .filing(filing_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("filing {filing_id}")))?;
        let stage = self.plan.stage_of(filing.status)?;
        if !role_gate::writable_fields(stage, role).model_fields {
            return Err(WorkflowError::ForbiddenAction {
                role,
                action: "apply grading".to_string(),
                stage,
            });
        }

        let mut draft = tx
            .draft(filing_id, question_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("draft for question {question_id}")))?;
        draft.model_score = Some(outcome.score);
        draft.model_reason = Some(outcome.reason.clone());
        draft.model_suggestion = Some(outcome.suggestion.clone());
        draft.updated_at = chrono::Utc::now();
        tx.update_revision(draft.clone()).await?;

        scoring::apply_current_score(&mut *tx, &mut filing).await?;
        tx.commit().await?;
        Ok(draft)
    }
}
