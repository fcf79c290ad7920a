// Single source of truth for "who may do what at which stage".
// Both the write-path validators and the test suite consume these tables;
// nothing else in the crate hand-rolls a permission check.

use serde::{Deserialize, Serialize};

use crate::status::{FilingStatus, RoundPlan, Stage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Auditor,
    Admin,
}

/// Workflow actions a caller can request from the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowAction {
    /// Client hands the current drafts over for review.
    Submit,
    /// Auditor moves a reviewed round back to the client.
    Advance,
    /// Auditor closes the filing into `final`.
    Finalize,
}

impl std::fmt::Display for WorkflowAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowAction::Submit => write!(f, "submit"),
            WorkflowAction::Advance => write!(f, "advance"),
            WorkflowAction::Finalize => write!(f, "finalize"),
        }
    }
}

/// Permitted actions for (stage, role). Admin always gets the union of the
/// client and auditor columns.
pub fn permitted_actions(plan: &RoundPlan, stage: Stage, role: Role) -> Vec<WorkflowAction> {
    let mut actions = Vec::new();
    let client_side = matches!(role, Role::Client | Role::Admin);
    let auditor_side = matches!(role, Role::Auditor | Role::Admin);

    match stage {
        Stage::Draft => {
            if client_side {
                actions.push(WorkflowAction::Submit);
            }
        }
        Stage::ClientEdit { round } => {
            if client_side {
                actions.push(WorkflowAction::Submit);
            }
            if auditor_side && round == plan.max_rounds() {
                actions.push(WorkflowAction::Finalize);
            }
        }
        Stage::AuditorReview { round } => {
            if auditor_side {
                let next = plan.next_status(FilingStatus::Submitted(round));
                if next == Some(FilingStatus::Final) {
                    actions.push(WorkflowAction::Finalize);
                } else {
                    actions.push(WorkflowAction::Advance);
                }
            }
        }
        Stage::Final => {}
    }
    actions
}

pub fn allows(plan: &RoundPlan, stage: Stage, role: Role, action: WorkflowAction) -> bool {
    permitted_actions(plan, stage, role).contains(&action)
}

/// Which field groups of an AnswerRevision a role may write at a stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldSet {
    /// The draft's answer text.
    pub answer_text: bool,
    /// model_score / model_reason / model_suggestion on the live draft.
    pub model_fields: bool,
    /// auditor_score / auditor_reason / auditor_suggestion on the snapshot
    /// of the round currently under review.
    pub auditor_annotations: bool,
}

impl FieldSet {
    const NONE: FieldSet = FieldSet {
        answer_text: false,
        model_fields: false,
        auditor_annotations: false,
    };

    fn union(self, other: FieldSet) -> FieldSet {
        FieldSet {
            answer_text: self.answer_text || other.answer_text,
            model_fields: self.model_fields || other.model_fields,
            auditor_annotations: self.auditor_annotations || other.auditor_annotations,
        }
    }
}

/// Field-ownership table. Clients (and grading on their behalf) touch drafts
/// during editing stages; auditors touch only the annotation fields of the
/// round under review; nobody writes anything at `final`.
pub fn writable_fields(stage: Stage, role: Role) -> FieldSet {
    let client_fields = match stage {
        Stage::Draft | Stage::ClientEdit { .. } => FieldSet {
            answer_text: true,
            model_fields: true,
            auditor_annotations: false,
        },
        _ => FieldSet::NONE,
    };
    let auditor_fields = match stage {
        Stage::AuditorReview { .. } => FieldSet {
            answer_text: false,
            model_fields: false,
            auditor_annotations: true,
        },
        _ => FieldSet::NONE,
    };

    match role {
        Role::Client => client_fields,
        Role::Auditor => auditor_fields,
        Role::Admin => client_fields.union(auditor_fields),
    }
}
