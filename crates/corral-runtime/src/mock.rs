use crate::executor::{StepExecutor, StepResult};
use corral_schema::{DriverName, PlatformName, ScenarioDescriptor, ScenarioName, Step};
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// One recorded call into a [`ScriptedExecutor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorCall {
    pub scenario: ScenarioName,
    pub step: Step,
    pub driver: DriverName,
    pub platform: Option<PlatformName>,
    pub extra_args: Vec<String>,
}

/// In-memory executor with scripted failures.
///
/// Every step succeeds unless registered with [`fail_on`](Self::fail_on) or
/// [`skip_on`](Self::skip_on). All calls are recorded in order.
#[derive(Default)]
pub struct ScriptedExecutor {
    failures: HashSet<(String, Step)>,
    skips: HashSet<(String, Step)>,
    delay: Option<Duration>,
    calls: Mutex<Vec<ExecutorCall>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn fail_on(mut self, scenario: &str, step: Step) -> Self {
        self.failures.insert((scenario.to_owned(), step));
        self
    }

    #[must_use]
    pub fn skip_on(mut self, scenario: &str, step: Step) -> Self {
        self.skips.insert((scenario.to_owned(), step));
        self
    }

    /// Sleep this long inside every call, to make concurrent runs overlap.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<ExecutorCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Steps invoked for `scenario`, in order.
    pub fn steps_for(&self, scenario: &str) -> Vec<Step> {
        self.calls()
            .into_iter()
            .filter(|c| c.scenario == scenario)
            .map(|c| c.step)
            .collect()
    }

    pub fn count(&self, scenario: &str, step: Step) -> usize {
        self.steps_for(scenario)
            .into_iter()
            .filter(|s| *s == step)
            .count()
    }
}

impl StepExecutor for ScriptedExecutor {
    fn run(&self, scenario: &ScenarioDescriptor, step: Step, extra_args: &[String]) -> StepResult {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ExecutorCall {
                scenario: scenario.name.clone(),
                step,
                driver: scenario.driver_name.clone(),
                platform: scenario.platform_filter.clone(),
                extra_args: extra_args.to_vec(),
            });

        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        let key = (scenario.name.to_string(), step);
        if self.failures.contains(&key) {
            StepResult::failed(step, format!("scripted failure of {step}"))
        } else if self.skips.contains(&key) {
            StepResult::skipped(step, format!("scripted skip of {step}"))
        } else {
            StepResult::succeeded(step, format!("scripted {step}"))
        }
    }
}
