use crate::concurrency::{run_bounded, ScenarioLock, ShutdownFlag};
use crate::policy::DestroyStrategy;
use crate::progress::{NoProgress, ProgressSink};
use crate::runner::{RunContext, RunOutcome, ScenarioRunner};
use crate::{exit, CoreError};
use corral_runtime::{DriverRegistry, StepExecutor};
use corral_schema::{
    DriverName, PlatformName, ScenarioCatalog, ScenarioDescriptor, ScenarioName,
    ScenarioSelector, StateLocation, Step,
};
use corral_store::StateStore;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// One invocation of the test sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub selector: ScenarioSelector,
    pub destroy: DestroyStrategy,
    pub parallel: bool,
    /// Replaces every selected scenario's configured driver.
    pub driver_name: Option<DriverName>,
    /// Restricts every selected scenario to this declared platform.
    pub platform_name: Option<PlatformName>,
    /// Passed verbatim to every step.
    pub extra_args: Vec<String>,
}

impl Default for RunRequest {
    fn default() -> Self {
        Self {
            selector: ScenarioSelector::Default,
            destroy: DestroyStrategy::Always,
            parallel: false,
            driver_name: None,
            platform_name: None,
            extra_args: Vec::new(),
        }
    }
}

/// Outcomes of one orchestrated run, in resolution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub outcomes: Vec<RunOutcome>,
}

impl RunReport {
    pub fn success(&self) -> bool {
        self.outcomes.iter().all(RunOutcome::succeeded)
    }

    pub fn failed(&self) -> impl Iterator<Item = &RunOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded())
    }

    pub fn get(&self, scenario: &str) -> Option<&RunOutcome> {
        self.outcomes.iter().find(|o| o.scenario == scenario)
    }

    pub fn exit_code(&self) -> u8 {
        if self.success() {
            exit::SUCCESS
        } else {
            exit::SCENARIO_FAILURE
        }
    }

    pub fn into_map(self) -> BTreeMap<ScenarioName, RunOutcome> {
        self.outcomes
            .into_iter()
            .map(|o| (o.scenario.clone(), o))
            .collect()
    }
}

/// Persisted state of one scenario, as shown by `corral list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioStatus {
    pub name: ScenarioName,
    pub driver: DriverName,
    pub platforms: Vec<PlatformName>,
    pub sequence: Vec<Step>,
    pub state_location: StateLocation,
    pub created: bool,
    pub converged: bool,
    pub last_driver_name: Option<DriverName>,
    pub updated_at: Option<String>,
}

/// Resolves run requests against a catalog and dispatches scenario runners.
pub struct Orchestrator {
    catalog: ScenarioCatalog,
    drivers: Arc<DriverRegistry>,
    executor: Arc<dyn StepExecutor>,
    store: StateStore,
    max_concurrency: usize,
    progress: Arc<dyn ProgressSink>,
    shutdown: ShutdownFlag,
}

impl Orchestrator {
    pub fn new(
        catalog: ScenarioCatalog,
        drivers: Arc<DriverRegistry>,
        executor: Arc<dyn StepExecutor>,
    ) -> Self {
        Self {
            catalog,
            drivers,
            executor,
            store: StateStore::new(),
            max_concurrency: std::thread::available_parallelism().map_or(1, NonZeroUsize::get),
            progress: Arc::new(NoProgress),
            shutdown: ShutdownFlag::new(),
        }
    }

    /// Upper bound on scenarios running at once in parallel mode.
    #[must_use]
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    pub fn with_shutdown(mut self, shutdown: ShutdownFlag) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn catalog(&self) -> &ScenarioCatalog {
        &self.catalog
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Select scenarios, check parallel preconditions, and apply overrides.
    ///
    /// Every check here runs before any scenario starts, so a bad request
    /// never leaves half the selection executed.
    pub fn resolve(&self, request: &RunRequest) -> Result<Vec<ScenarioDescriptor>, CoreError> {
        let selected = self.catalog.list(&request.selector)?;
        if request.parallel {
            validate_parallel(request.destroy, &selected)?;
        }

        let mut resolved = Vec::with_capacity(selected.len());
        for scenario in selected {
            let scenario = match &request.driver_name {
                Some(driver) => scenario.with_driver(driver.clone()),
                None => scenario,
            };
            let scenario = match &request.platform_name {
                Some(platform) => scenario.with_platform(platform.clone())?,
                None => scenario,
            };
            self.drivers.select(scenario.driver_name.as_str())?;
            resolved.push(scenario);
        }
        Ok(resolved)
    }

    pub fn run(&self, request: &RunRequest) -> Result<RunReport, CoreError> {
        let scenarios = self.resolve(request)?;
        if scenarios.is_empty() {
            warn!("no scenarios selected");
        }
        info!(
            "running {} scenario(s) {} with destroy {}",
            scenarios.len(),
            if request.parallel {
                format!("in parallel (max {})", self.max_concurrency)
            } else {
                "sequentially".to_owned()
            },
            request.destroy
        );

        let ctx = RunContext {
            executor: self.executor.as_ref(),
            store: self.store,
            strategy: request.destroy,
            extra_args: &request.extra_args,
            progress: self.progress.as_ref(),
            shutdown: &self.shutdown,
        };
        let run_one = |scenario: &ScenarioDescriptor| ScenarioRunner::new(scenario, ctx).run();

        let outcomes = if request.parallel {
            run_bounded(&scenarios, self.max_concurrency, run_one)
        } else {
            scenarios.iter().map(run_one).collect()
        };
        Ok(RunReport { outcomes })
    }

    /// Forget persisted state for the selected scenarios. Instances are not
    /// touched.
    pub fn reset(&self, selector: &ScenarioSelector) -> Result<Vec<ScenarioName>, CoreError> {
        let selected = self.catalog.list(selector)?;
        let mut names = Vec::with_capacity(selected.len());
        for scenario in selected {
            let _lock = ScenarioLock::try_acquire(&scenario.state_location)?;
            self.store.reset(&scenario.state_location)?;
            info!("reset state of scenario '{}'", scenario.name);
            names.push(scenario.name);
        }
        Ok(names)
    }

    pub fn status(&self) -> Result<Vec<ScenarioStatus>, CoreError> {
        self.catalog
            .iter()
            .map(|scenario| {
                let state = self.store.load(&scenario.state_location)?;
                Ok(ScenarioStatus {
                    name: scenario.name.clone(),
                    driver: scenario.driver_name.clone(),
                    platforms: scenario.platforms.clone(),
                    sequence: scenario.step_sequence.clone(),
                    state_location: scenario.state_location.clone(),
                    created: state.created,
                    converged: state.converged,
                    last_driver_name: state.last_driver_name,
                    updated_at: state.updated_at,
                })
            })
            .collect()
    }
}

/// Parallel runs need a non-empty selection, a state location per scenario,
/// and teardown at the end of every scenario.
fn validate_parallel(
    destroy: DestroyStrategy,
    scenarios: &[ScenarioDescriptor],
) -> Result<(), CoreError> {
    if scenarios.is_empty() {
        return Err(CoreError::ParallelPrecondition(
            "no scenarios selected".to_owned(),
        ));
    }
    if destroy == DestroyStrategy::Never {
        return Err(CoreError::ParallelPrecondition(
            "destroy strategy 'never' cannot be combined with parallel mode".to_owned(),
        ));
    }

    let mut owners: HashMap<&StateLocation, &ScenarioName> = HashMap::new();
    for scenario in scenarios {
        if let Some(other) = owners.insert(&scenario.state_location, &scenario.name) {
            return Err(CoreError::ParallelPrecondition(format!(
                "scenarios '{other}' and '{}' share state location {}",
                scenario.name, scenario.state_location
            )));
        }
    }
    Ok(())
}

/// Run `request` and map the result to a process exit code.
///
/// `on_report` sees the report of a dispatched run before the code is
/// derived; it is not called when validation rejects the request.
pub fn run_scenarios(
    orchestrator: &Orchestrator,
    request: &RunRequest,
    on_report: impl FnOnce(&RunReport),
) -> u8 {
    match orchestrator.run(request) {
        Ok(report) => {
            on_report(&report);
            for outcome in report.failed() {
                match (&outcome.failed_step, &outcome.error) {
                    (_, Some(e)) => error!("scenario '{}': {e}", outcome.scenario),
                    (Some(step), None) => {
                        error!("scenario '{}': step {step} failed", outcome.scenario);
                    }
                    (None, None) => error!("scenario '{}' failed", outcome.scenario),
                }
            }
            report.exit_code()
        }
        Err(e) => {
            error!("{e}");
            e.exit_code()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(name: &str, location: &str) -> ScenarioDescriptor {
        ScenarioDescriptor::new(
            name,
            "delegated",
            vec![Step::Create],
            StateLocation::new(location),
        )
    }

    #[test]
    fn parallel_rejects_empty_selection() {
        let err = validate_parallel(DestroyStrategy::Always, &[]).unwrap_err();
        assert!(matches!(err, CoreError::ParallelPrecondition(_)));
    }

    #[test]
    fn parallel_rejects_never() {
        let err =
            validate_parallel(DestroyStrategy::Never, &[scenario("a", "/s/a")]).unwrap_err();
        assert!(err.to_string().contains("never"));
    }

    #[test]
    fn parallel_rejects_shared_location() {
        let err = validate_parallel(
            DestroyStrategy::Always,
            &[scenario("a", "/s/x"), scenario("b", "/s/y"), scenario("c", "/s/x")],
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("'a'") && msg.contains("'c'"), "got: {msg}");
    }

    #[test]
    fn parallel_accepts_distinct_locations() {
        validate_parallel(
            DestroyStrategy::Always,
            &[scenario("a", "/s/a"), scenario("b", "/s/b")],
        )
        .unwrap();
    }

    #[test]
    fn report_exit_code() {
        let ok = RunOutcome {
            scenario: ScenarioName::new("a"),
            all_steps_succeeded: true,
            failed_step: None,
            destroyed: true,
            phase: crate::RunnerPhase::Terminal,
            error: None,
            steps: Vec::new(),
        };
        let bad = RunOutcome {
            scenario: ScenarioName::new("b"),
            all_steps_succeeded: false,
            failed_step: Some(Step::Converge),
            ..ok.clone()
        };
        let report = RunReport {
            outcomes: vec![ok.clone()],
        };
        assert_eq!(report.exit_code(), exit::SUCCESS);

        let report = RunReport {
            outcomes: vec![ok, bad],
        };
        assert_eq!(report.exit_code(), exit::SCENARIO_FAILURE);
        assert_eq!(report.failed().count(), 1);
        assert!(report.get("b").is_some());
        assert_eq!(report.into_map().len(), 2);
    }

    #[test]
    fn report_serializes_step_names() {
        let report = RunReport {
            outcomes: vec![RunOutcome {
                scenario: ScenarioName::new("default"),
                all_steps_succeeded: false,
                failed_step: Some(Step::SideEffect),
                destroyed: false,
                phase: crate::RunnerPhase::Terminal,
                error: None,
                steps: Vec::new(),
            }],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcomes"][0]["scenario"], "default");
        assert_eq!(json["outcomes"][0]["failed_step"], "side_effect");
    }
}
