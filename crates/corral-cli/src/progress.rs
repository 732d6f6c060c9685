use corral_core::{ProgressSink, RunOutcome};
use corral_runtime::StepResult;
use corral_schema::{ScenarioDescriptor, ScenarioName, Step};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// One spinner per running scenario, cleared when the scenario finishes.
#[derive(Default)]
pub struct SpinnerProgress {
    multi: MultiProgress,
    bars: Mutex<HashMap<ScenarioName, ProgressBar>>,
}

impl SpinnerProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_bar(&self, scenario: &ScenarioName, f: impl FnOnce(&ProgressBar)) {
        let bars = self.bars.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pb) = bars.get(scenario) {
            f(pb);
        }
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {msg} {elapsed:.dim}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", " "])
}

impl ProgressSink for SpinnerProgress {
    fn scenario_started(&self, scenario: &ScenarioDescriptor) {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(spinner_style());
        pb.set_message(format!("{}: starting", scenario.name));
        pb.enable_steady_tick(Duration::from_millis(80));
        self.bars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(scenario.name.clone(), pb);
    }

    fn step_started(&self, scenario: &ScenarioName, step: Step) {
        self.with_bar(scenario, |pb| pb.set_message(format!("{scenario}: {step}")));
    }

    fn step_finished(&self, scenario: &ScenarioName, result: &StepResult) {
        if !result.success {
            self.with_bar(scenario, |pb| {
                pb.set_message(format!("{scenario}: {} failed", result.step));
            });
        }
    }

    fn scenario_finished(&self, outcome: &RunOutcome) {
        let pb = self
            .bars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&outcome.scenario);
        if let Some(pb) = pb {
            pb.finish_and_clear();
            self.multi.remove(&pb);
        }
    }
}
