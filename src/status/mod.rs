// Filing status state machine - pure ordering and validation, no side effects

pub mod role_gate;

pub use role_gate::{FieldSet, Role, WorkflowAction};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Canonical filing status: `draft`, `v1_submitted` .. `vN_submitted`, `final`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilingStatus {
    Draft,
    /// `vK_submitted` for round K in 1..=max_rounds.
    Submitted(u32),
    Final,
}

impl FilingStatus {
    /// Strict monotonic position in the canonical order:
    /// draft = 0, vK = K, final = max_rounds + 1.
    pub fn position(&self, plan: &RoundPlan) -> u32 {
        match self {
            FilingStatus::Draft => 0,
            FilingStatus::Submitted(round) => *round,
            FilingStatus::Final => plan.max_rounds() + 1,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(FilingStatus::Draft),
            "final" => Some(FilingStatus::Final),
            other => {
                let round = other.strip_prefix('v')?.strip_suffix("_submitted")?;
                round.parse().ok().map(FilingStatus::Submitted)
            }
        }
    }
}

impl fmt::Display for FilingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilingStatus::Draft => write!(f, "draft"),
            FilingStatus::Submitted(round) => write!(f, "v{round}_submitted"),
            FilingStatus::Final => write!(f, "final"),
        }
    }
}

impl Serialize for FilingStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FilingStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        FilingStatus::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown filing status: {s}")))
    }
}

/// Which kind of work happens while a filing sits in a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// Initial authoring, before the first submission.
    Draft,
    /// Odd submitted rounds: the auditor reviews the just-snapshotted answers.
    AuditorReview { round: u32 },
    /// Even submitted rounds: the client revises the regenerated drafts.
    ClientEdit { round: u32 },
    /// Terminal; nobody edits anything.
    Final,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("max_rounds must be even, got {0}")]
    OddRounds(u32),
    #[error("max_rounds must be at least 2, got {0}")]
    TooFewRounds(u32),
    #[error("status {status} is outside the round plan (max_rounds = {max_rounds})")]
    OutOfPlan { status: String, max_rounds: u32 },
}

/// The configured round structure of the workflow. Immutable once built;
/// every status computation is a pure function over it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundPlan {
    max_rounds: u32,
}

impl RoundPlan {
    pub fn new(max_rounds: u32) -> Result<Self, PlanError> {
        if max_rounds < 2 {
            return Err(PlanError::TooFewRounds(max_rounds));
        }
        if max_rounds % 2 != 0 {
            return Err(PlanError::OddRounds(max_rounds));
        }
        Ok(Self { max_rounds })
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    /// True when `status` is one of the statuses this plan can visit.
    pub fn contains(&self, status: FilingStatus) -> bool {
        match status {
            FilingStatus::Draft | FilingStatus::Final => true,
            FilingStatus::Submitted(round) => (1..=self.max_rounds).contains(&round),
        }
    }

    /// The single legal successor, or `None` from `final`.
    pub fn next_status(&self, status: FilingStatus) -> Option<FilingStatus> {
        match status {
            FilingStatus::Draft => Some(FilingStatus::Submitted(1)),
            FilingStatus::Submitted(round) if round < self.max_rounds => {
                Some(FilingStatus::Submitted(round + 1))
            }
            FilingStatus::Submitted(_) => Some(FilingStatus::Final),
            FilingStatus::Final => None,
        }
    }

    pub fn stage_of(&self, status: FilingStatus) -> Result<Stage, PlanError> {
        if !self.contains(status) {
            return Err(PlanError::OutOfPlan {
                status: status.to_string(),
                max_rounds: self.max_rounds,
            });
        }
        Ok(match status {
            FilingStatus::Draft => Stage::Draft,
            FilingStatus::Submitted(round) if round % 2 == 1 => Stage::AuditorReview { round },
            FilingStatus::Submitted(round) => Stage::ClientEdit { round },
            FilingStatus::Final => Stage::Final,
        })
    }

    pub fn is_last_submitted_round(&self, status: FilingStatus) -> bool {
        matches!(status, FilingStatus::Submitted(round) if round == self.max_rounds)
    }

    /// All statuses of this plan in canonical order.
    pub fn statuses(&self) -> impl Iterator<Item = FilingStatus> + '_ {
        std::iter::once(FilingStatus::Draft)
            .chain((1..=self.max_rounds).map(FilingStatus::Submitted))
            .chain(std::iter::once(FilingStatus::Final))
    }
}
