use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of a [`ScenarioRunner`](crate::ScenarioRunner).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunnerPhase {
    Pending,
    /// Executing the step at this index of the sequence.
    Running(usize),
    Completed,
    Failed,
    Destroying,
    Terminal,
}

impl fmt::Display for RunnerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerPhase::Pending => write!(f, "pending"),
            RunnerPhase::Running(i) => write!(f, "running({i})"),
            RunnerPhase::Completed => write!(f, "completed"),
            RunnerPhase::Failed => write!(f, "failed"),
            RunnerPhase::Destroying => write!(f, "destroying"),
            RunnerPhase::Terminal => write!(f, "terminal"),
        }
    }
}

pub fn validate_transition(from: RunnerPhase, to: RunnerPhase) -> Result<(), CoreError> {
    let valid = match (from, to) {
        (RunnerPhase::Pending, RunnerPhase::Running(0)) => true,
        (RunnerPhase::Running(i), RunnerPhase::Running(j)) => j == i + 1,
        // Pending -> Completed only for an empty sequence; Pending -> Failed
        // when the scenario cannot start (lock, state load, driver drift).
        (
            RunnerPhase::Pending | RunnerPhase::Running(_),
            RunnerPhase::Completed | RunnerPhase::Failed,
        )
        | (
            RunnerPhase::Completed | RunnerPhase::Failed,
            RunnerPhase::Destroying | RunnerPhase::Terminal,
        )
        | (RunnerPhase::Destroying, RunnerPhase::Terminal) => true,
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}
