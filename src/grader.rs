// External grader collaborator. The workflow core never calls the grader
// itself; the surrounding application does, and feeds the outcome back in
// as plain data via DraftWorkspace::apply_grading.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeRequest {
    pub rubric: String,
    pub answer_text: String,
    /// Follow-up mode: the auditor's feedback from the previous round, so
    /// the grader can judge whether it was addressed.
    pub prior_auditor_feedback: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeOutcome {
    pub score: f64,
    pub reason: String,
    pub suggestion: String,
}

#[async_trait]
pub trait Grader: Send + Sync {
    async fn grade(&self, request: GradeRequest) -> anyhow::Result<GradeOutcome>;
}

/// Replays canned outcomes in order; for tests and demos.
#[derive(Debug, Default)]
pub struct ScriptedGrader {
    outcomes: tokio::sync::Mutex<Vec<GradeOutcome>>,
}

impl ScriptedGrader {
    pub fn new(outcomes: Vec<GradeOutcome>) -> Self {
        Self {
            outcomes: tokio::sync::Mutex::new(outcomes),
        }
    }
}

#[async_trait]
impl Grader for ScriptedGrader {
    async fn grade(&self, _request: GradeRequest) -> anyhow::Result<GradeOutcome> {
        let mut outcomes = self.outcomes.lock().await;
        if outcomes.is_empty() {
            anyhow::bail!("scripted grader ran out of outcomes");
        }
        Ok(outcomes.remove(0))
    }
}
