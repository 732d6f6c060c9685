use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Teardown policy at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestroyStrategy {
    #[default]
    Always,
    /// Leave instances for inspection; the operator tears them down later.
    Never,
}

impl fmt::Display for DestroyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DestroyStrategy::Always => write!(f, "always"),
            DestroyStrategy::Never => write!(f, "never"),
        }
    }
}

impl FromStr for DestroyStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "always" => Ok(DestroyStrategy::Always),
            "never" => Ok(DestroyStrategy::Never),
            other => Err(format!(
                "invalid destroy strategy '{other}', expected 'always' or 'never'"
            )),
        }
    }
}

/// How the scenario's sequence ended, as seen by the destroy policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Succeeded,
    Failed,
}

/// Whether a destroy must run at a terminal point of the sequence.
///
/// The runner calls this on both the early-abort path and the natural end,
/// so the two never diverge.
pub fn should_destroy(strategy: DestroyStrategy, _status: RunStatus) -> bool {
    match strategy {
        DestroyStrategy::Always => true,
        DestroyStrategy::Never => false,
    }
}
