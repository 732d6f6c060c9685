use crate::runner::RunOutcome;
use corral_runtime::StepResult;
use corral_schema::{ScenarioDescriptor, ScenarioName, Step};

/// Observer for scenario and step progress.
///
/// Called from worker threads in parallel mode, hence `Send + Sync`. All
/// methods default to no-ops.
pub trait ProgressSink: Send + Sync {
    fn scenario_started(&self, _scenario: &ScenarioDescriptor) {}
    fn step_started(&self, _scenario: &ScenarioName, _step: Step) {}
    fn step_finished(&self, _scenario: &ScenarioName, _result: &StepResult) {}
    fn scenario_finished(&self, _outcome: &RunOutcome) {}
}

pub struct NoProgress;

impl ProgressSink for NoProgress {}
