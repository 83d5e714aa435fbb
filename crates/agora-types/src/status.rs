use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle contract implemented by every status enum. The store refuses
/// writes that would violate `can_transition_to`.
pub trait LifecycleState: Sized {
    fn is_terminal(&self) -> bool;
    fn can_transition_to(&self, next: &Self) -> bool;
}

/// Tournament phases. One-way through the happy path; `Failed` is reachable
/// from any non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TournamentStatus {
    Pending,
    Collecting,
    Testing,
    Evaluating,
    Completed,
    Failed,
}

impl LifecycleState for TournamentStatus {
    fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    fn can_transition_to(&self, next: &Self) -> bool {
        use TournamentStatus::*;
        match (self, next) {
            (Pending, Collecting) => true,
            (Collecting, Testing) => true,
            (Testing, Evaluating) => true,
            (Evaluating, Completed) => true,

            // Failure is terminal from any live phase.
            (Pending | Collecting | Testing | Evaluating, Failed) => true,

            _ => false,
        }
    }
}

impl fmt::Display for TournamentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Collecting => "collecting",
            Self::Testing => "testing",
            Self::Evaluating => "evaluating",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Validating,
    Validated,
    Failed,
    Disqualified,
}

impl LifecycleState for SubmissionStatus {
    fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Disqualified)
    }

    fn can_transition_to(&self, next: &Self) -> bool {
        use SubmissionStatus::*;
        match (self, next) {
            (Pending, Validating) => true,
            (Validating, Validated) => true,
            (Pending | Validating, Failed) => true,
            // Disqualification happens at aggregation, after any of the
            // submission's runs failed or timed out.
            (Validated, Disqualified) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Validating => "validating",
            Self::Validated => "validated",
            Self::Failed => "failed",
            Self::Disqualified => "disqualified",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Timeout,
}

impl RunStatus {
    /// A run in any of these states disqualifies its submission at
    /// aggregation time.
    pub fn disqualifies(&self) -> bool {
        matches!(self, Self::Failed | Self::Timeout)
    }
}

impl LifecycleState for RunStatus {
    fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Timeout)
    }

    fn can_transition_to(&self, next: &Self) -> bool {
        use RunStatus::*;
        match (self, next) {
            (Pending, Running) => true,
            (Running, Completed | Failed | Timeout) => true,
            // Launch failures never reach Running.
            (Pending, Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
        };
        write!(f, "{}", s)
    }
}
