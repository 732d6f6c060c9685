use corral_schema::{ScenarioDescriptor, Step};
use serde::{Deserialize, Serialize};

/// Outcome of one step invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepResult {
    pub step: Step,
    pub success: bool,
    /// The step had nothing to do. Skipped steps count as successful.
    pub skipped: bool,
    pub diagnostics: String,
}

impl StepResult {
    pub fn succeeded(step: Step, diagnostics: impl Into<String>) -> Self {
        Self {
            step,
            success: true,
            skipped: false,
            diagnostics: diagnostics.into(),
        }
    }

    pub fn failed(step: Step, diagnostics: impl Into<String>) -> Self {
        Self {
            step,
            success: false,
            skipped: false,
            diagnostics: diagnostics.into(),
        }
    }

    pub fn skipped(step: Step, reason: impl Into<String>) -> Self {
        Self {
            step,
            success: true,
            skipped: true,
            diagnostics: reason.into(),
        }
    }
}

/// Runs one lifecycle step for a scenario.
///
/// Implementations block until the step finishes. Any failure, including one
/// to launch the underlying process, is reported as an unsuccessful
/// [`StepResult`] rather than an error, so one broken step never aborts
/// sibling scenarios.
pub trait StepExecutor: Send + Sync {
    fn run(&self, scenario: &ScenarioDescriptor, step: Step, extra_args: &[String]) -> StepResult;
}
