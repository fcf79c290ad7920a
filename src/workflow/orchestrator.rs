// Atomic filing transitions: every write of one transition commits together
// or not at all. Concurrency control is optimistic: read the status and
// version marker, do the work, reverify against the committed row, commit.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::audit::{AuditLog, AuditRecord};
use crate::drafts::DraftSpawner;
use crate::models::{Filing, FilingId, UserId};
use crate::notify::ChangeNotifier;
use crate::scoring;
use crate::snapshot::SnapshotService;
use crate::status::{role_gate, FilingStatus, Role, RoundPlan, Stage, WorkflowAction};
use crate::storage::{ReviewStore, ReviewTx, StoreError};
use crate::telemetry::generate_correlation_id;
use crate::workflow::WorkflowError;

#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub filing_id: FilingId,
    pub actor_role: Role,
    pub action: WorkflowAction,
    pub actor_user_id: UserId,
    pub reason: Option<String>,
    /// Explicit target status; defaults to the action's implied target.
    pub target: Option<FilingStatus>,
}

impl TransitionRequest {
    pub fn new(
        filing_id: FilingId,
        actor_role: Role,
        action: WorkflowAction,
        actor_user_id: UserId,
    ) -> Self {
        Self {
            filing_id,
            actor_role,
            action,
            actor_user_id,
            reason: None,
            target: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_target(mut self, target: FilingStatus) -> Self {
        self.target = Some(target);
        self
    }
}

#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub from: FilingStatus,
    pub to: FilingStatus,
    /// The filing as committed, re-read after the transaction.
    pub filing: Filing,
}

/// The deterministic rule table deciding which transitions freeze a round.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotRules;

impl SnapshotRules {
    pub fn round_for(
        &self,
        plan: &RoundPlan,
        from: FilingStatus,
        to: FilingStatus,
    ) -> Option<u32> {
        match (from, to) {
            (FilingStatus::Draft, FilingStatus::Submitted(1)) => Some(1),
            (FilingStatus::Submitted(even), FilingStatus::Submitted(odd))
                if even % 2 == 0 && odd == even + 1 =>
            {
                Some(odd)
            }
            (FilingStatus::Submitted(last), FilingStatus::Final)
                if last == plan.max_rounds() && last % 2 == 0 =>
            {
                Some(last)
            }
            _ => None,
        }
    }
}

/// Extension points around a transition. Prerequisites run before any write
/// and reject by returning an error; the snapshot decision defaults to the
/// rule table.
#[async_trait]
pub trait TransitionHooks: Send + Sync {
    async fn check_prerequisites(
        &self,
        tx: &mut dyn ReviewTx,
        filing: &Filing,
        from: FilingStatus,
        to: FilingStatus,
    ) -> Result<(), WorkflowError> {
        let _ = (tx, filing, from, to);
        Ok(())
    }

    fn snapshot_round(
        &self,
        plan: &RoundPlan,
        from: FilingStatus,
        to: FilingStatus,
    ) -> Option<u32> {
        SnapshotRules.round_for(plan, from, to)
    }
}

/// Default hooks: no prerequisite check, rule-table snapshots.
#[derive(Debug, Default)]
pub struct DefaultHooks;

impl TransitionHooks for DefaultHooks {}

pub struct TransitionOrchestrator {
    store: Arc<dyn ReviewStore>,
    plan: RoundPlan,
    snapshots: SnapshotService,
    spawner: DraftSpawner,
    hooks: Arc<dyn TransitionHooks>,
    audit: Arc<dyn AuditLog>,
    notifier: Arc<dyn ChangeNotifier>,
}

impl TransitionOrchestrator {
    pub fn new(
        store: Arc<dyn ReviewStore>,
        plan: RoundPlan,
        audit: Arc<dyn AuditLog>,
        notifier: Arc<dyn ChangeNotifier>,
    ) -> Self {
        Self {
            store,
            plan,
            snapshots: SnapshotService::new(plan),
            spawner: DraftSpawner::new(plan),
            hooks: Arc::new(DefaultHooks),
            audit,
            notifier,
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn TransitionHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn plan(&self) -> &RoundPlan {
        &self.plan
    }

    /// Execute one transition as an atomic unit. Validation failures reject
    /// before any write; a concurrent writer detected at the reverify step
    /// aborts with `Conflict` and rolls everything back; audit and
    /// notification failures never undo a committed transition.
    pub async fn transition(
        &self,
        request: TransitionRequest,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let correlation_id = generate_correlation_id();
        let mut tx = self.store.begin().await?;

        // Step 1: read status + update marker inside the unit.
        let filing = tx
            .filing(request.filing_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("filing {}", request.filing_id)))?;
        let observed_status = filing.status;
        let observed_version = filing.version;
        let before_image = json!({
            "status": observed_status.to_string(),
            "current_score": filing.current_score,
            "final_score": filing.final_score,
        });

        // Step 2: status machine + role gate, before any write.
        let stage = self.plan.stage_of(observed_status)?;
        let next = self
            .plan
            .next_status(observed_status)
            .ok_or(WorkflowError::NoNext)?;
        let target = request.target.unwrap_or(match request.action {
            WorkflowAction::Submit | WorkflowAction::Advance => next,
            WorkflowAction::Finalize => FilingStatus::Final,
        });
        if !self.plan.contains(target) {
            return Err(WorkflowError::InvalidStatus(target.to_string()));
        }
        let next_pos = next.position(&self.plan);
        let target_pos = target.position(&self.plan);
        if target_pos < next_pos {
            return Err(WorkflowError::Backward {
                target: target.to_string(),
                next: next.to_string(),
            });
        }
        if target_pos > next_pos {
            return Err(WorkflowError::Skip {
                target: target.to_string(),
                next: next.to_string(),
            });
        }
        if !role_gate::allows(&self.plan, stage, request.actor_role, request.action) {
            return Err(WorkflowError::ForbiddenAction {
                role: request.actor_role,
                action: request.action.to_string(),
                stage,
            });
        }

        // Step 3: pluggable prerequisite check.
        self.hooks
            .check_prerequisites(&mut *tx, &filing, observed_status, target)
            .await?;

        let mut filing = filing;
        let target_stage = self.plan.stage_of(target)?;

        // Step 4: review -> edit boundaries regenerate the drafts.
        if let (Stage::AuditorReview { round: from_round }, Stage::ClientEdit { round: to_round }) =
            (stage, target_stage)
        {
            self.spawner
                .refresh_drafts(&mut *tx, &filing, from_round, to_round)
                .await?;
        }

        // Step 5: snapshot side effect per the rule table.
        if let Some(round) = self.hooks.snapshot_round(&self.plan, observed_status, target) {
            self.snapshots
                .create_snapshot(&mut *tx, &filing, round)
                .await?;
        }

        // Step 6: reverify the committed row for early abort; the guarded
        // commit below repeats this check under the store lock and is the
        // authoritative one.
        match tx.filing_committed(request.filing_id).await? {
            Some(committed)
                if committed.status == observed_status
                    && committed.version == observed_version => {}
            _ => {
                warn!(
                    filing = %request.filing_id,
                    from = %observed_status,
                    to = %target,
                    "optimistic reverify failed; rolling back"
                );
                return Err(WorkflowError::Conflict);
            }
        }

        // Steps 7-9: persist the new status, write-once stamps, and scores.
        let now = Utc::now();
        filing.status = target;
        if observed_status == FilingStatus::Draft && filing.first_submit_at.is_none() {
            filing.first_submit_at = Some(now);
        }
        if target == FilingStatus::Final && filing.finalized_at.is_none() {
            filing.finalized_at = Some(now);
        }
        if matches!(target_stage, Stage::ClientEdit { .. }) {
            self.spawner.prepare_for_edit(&mut *tx, &mut filing).await?;
        }
        if target == FilingStatus::Final {
            filing.final_score = Some(scoring::final_score(&*tx, filing.id).await?);
        }
        tx.update_filing(filing.clone()).await?;
        match tx.commit_guarded(request.filing_id, observed_version).await {
            Ok(()) => {}
            Err(StoreError::Stale(_)) => {
                warn!(
                    filing = %request.filing_id,
                    from = %observed_status,
                    to = %target,
                    "filing changed between reverify and commit; rolling back"
                );
                return Err(WorkflowError::Conflict);
            }
            Err(err) => return Err(err.into()),
        }

        // Re-read the committed value for the response.
        let committed = self
            .store
            .filing(request.filing_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("filing {}", request.filing_id)))?;

        // Step 10: best-effort audit; failure never rolls the transition back.
        let record = AuditRecord {
            action: format!("transition:{}", request.action),
            entity_type: "filing".to_string(),
            entity_id: request.filing_id.to_string(),
            before: before_image,
            after: json!({
                "status": committed.status.to_string(),
                "current_score": committed.current_score,
                "final_score": committed.final_score,
                "reason": request.reason,
            }),
            user_id: Some(request.actor_user_id),
            recorded_at: now,
        };
        if let Err(err) = self.audit.append(record).await {
            warn!(error = %err, filing = %request.filing_id, "audit append failed; transition stands");
        }

        // Step 11: fire-and-forget change notification.
        self.notify_subscribers(&committed, observed_status, &correlation_id);

        info!(
            filing = %request.filing_id,
            from = %observed_status,
            to = %target,
            actor = %request.actor_user_id,
            correlation_id = %correlation_id,
            "filing transitioned"
        );
        Ok(TransitionOutcome {
            from: observed_status,
            to: target,
            filing: committed,
        })
    }

    fn notify_subscribers(&self, filing: &Filing, from: FilingStatus, correlation_id: &str) {
        let notifier = Arc::clone(&self.notifier);
        let topic = format!("filing.{}", filing.id);
        let message_id = correlation_id.to_string();
        let payload = json!({
            "filing_id": filing.id.to_string(),
            "from": from.to_string(),
            "to": filing.status.to_string(),
            "current_score": filing.current_score,
            "final_score": filing.final_score,
        });
        tokio::spawn(async move {
            notifier
                .publish(&topic, &message_id, "status_changed", payload)
                .await;
        });
    }
}
