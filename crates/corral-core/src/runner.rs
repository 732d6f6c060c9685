use crate::concurrency::{ScenarioLock, ShutdownFlag};
use crate::lifecycle::{validate_transition, RunnerPhase};
use crate::policy::{should_destroy, DestroyStrategy, RunStatus};
use crate::progress::ProgressSink;
use crate::CoreError;
use corral_runtime::{StepExecutor, StepResult};
use corral_schema::{ScenarioDescriptor, ScenarioName, Step};
use corral_store::{ScenarioState, StateStore};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Inputs shared by every runner of one orchestrated run.
#[derive(Clone, Copy)]
pub struct RunContext<'a> {
    pub executor: &'a dyn StepExecutor,
    pub store: StateStore,
    pub strategy: DestroyStrategy,
    pub extra_args: &'a [String],
    pub progress: &'a dyn ProgressSink,
    pub shutdown: &'a ShutdownFlag,
}

/// Result of driving one scenario to its terminal phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub scenario: ScenarioName,
    pub all_steps_succeeded: bool,
    /// First step that failed. `None` when the scenario failed before any
    /// step ran or was interrupted between steps.
    pub failed_step: Option<Step>,
    /// A destroy ran during this run and no later step recreated instances.
    pub destroyed: bool,
    /// Last phase reached; `Terminal` unless the state machine was misused.
    pub phase: RunnerPhase,
    pub error: Option<String>,
    pub steps: Vec<StepResult>,
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        self.all_steps_succeeded
    }
}

/// Why the sequence stopped early.
struct Abort {
    step: Option<Step>,
    error: Option<CoreError>,
}

impl Abort {
    fn step(step: Step) -> Self {
        Self {
            step: Some(step),
            error: None,
        }
    }

    fn error(step: Option<Step>, error: CoreError) -> Self {
        Self {
            step,
            error: Some(error),
        }
    }
}

/// Drives a single scenario through its step sequence.
///
/// ```text
/// Pending -> Running(0) -> ... -> Running(n-1) -> Completed -+-> Terminal
///                  \                                          |
///                   +--------------------------> Failed ------+-> Destroying -> Terminal
/// ```
///
/// The destroy policy is consulted on both the natural end and every abort
/// path. State is persisted after each successful step; a successful destroy
/// clears it.
pub struct ScenarioRunner<'a> {
    scenario: &'a ScenarioDescriptor,
    ctx: RunContext<'a>,
    phase: RunnerPhase,
    state: ScenarioState,
    steps: Vec<StepResult>,
    persist: bool,
    destroy_ran: bool,
    failed: bool,
    failed_step: Option<Step>,
    error: Option<String>,
}

impl<'a> ScenarioRunner<'a> {
    pub fn new(scenario: &'a ScenarioDescriptor, ctx: RunContext<'a>) -> Self {
        Self {
            scenario,
            ctx,
            phase: RunnerPhase::Pending,
            state: ScenarioState::default(),
            steps: Vec::new(),
            persist: true,
            destroy_ran: false,
            failed: false,
            failed_step: None,
            error: None,
        }
    }

    pub fn phase(&self) -> RunnerPhase {
        self.phase
    }

    pub fn run(mut self) -> RunOutcome {
        let scenario = self.scenario;
        info!(
            "scenario '{}': {} steps, driver '{}', destroy {}",
            scenario.name,
            scenario.step_sequence.len(),
            scenario.driver_name,
            self.ctx.strategy
        );
        self.ctx.progress.scenario_started(scenario);

        if let Err(e) = self.drive() {
            warn!("scenario '{}': {e}", scenario.name);
            self.record_failure(None, Some(e.to_string()));
        }

        let outcome = RunOutcome {
            scenario: scenario.name.clone(),
            all_steps_succeeded: !self.failed,
            failed_step: self.failed_step,
            destroyed: self.destroy_ran && !self.state.created,
            phase: self.phase,
            error: self.error.take(),
            steps: std::mem::take(&mut self.steps),
        };
        if outcome.all_steps_succeeded {
            info!("scenario '{}': passed", scenario.name);
        } else {
            match outcome.failed_step {
                Some(step) => warn!("scenario '{}': failed at {step}", scenario.name),
                None => warn!("scenario '{}': failed", scenario.name),
            }
        }
        self.ctx.progress.scenario_finished(&outcome);
        outcome
    }

    fn transition(&mut self, to: RunnerPhase) -> Result<(), CoreError> {
        validate_transition(self.phase, to)?;
        debug!("scenario '{}': {} -> {to}", self.scenario.name, self.phase);
        self.phase = to;
        Ok(())
    }

    fn drive(&mut self) -> Result<(), CoreError> {
        let _lock = match ScenarioLock::try_acquire(&self.scenario.state_location) {
            Ok(lock) => lock,
            // Held elsewhere or unusable: leave the instances alone.
            Err(e) => return self.fail_before_start(e),
        };

        let status = match self.load_state() {
            Ok(()) => match self.run_sequence() {
                Ok(()) => {
                    self.transition(RunnerPhase::Completed)?;
                    RunStatus::Succeeded
                }
                Err(abort) => {
                    self.record_failure(abort.step, abort.error.map(|e| e.to_string()));
                    self.transition(RunnerPhase::Failed)?;
                    RunStatus::Failed
                }
            },
            Err(e @ CoreError::DriverDrift { .. }) => return self.fail_before_start(e),
            Err(e) => {
                // Unreadable record: tear down per policy, write nothing.
                warn!("scenario '{}': {e}", self.scenario.name);
                self.persist = false;
                self.record_failure(None, Some(e.to_string()));
                self.transition(RunnerPhase::Failed)?;
                RunStatus::Failed
            }
        };

        if self.needs_teardown(status) {
            self.transition(RunnerPhase::Destroying)?;
            self.teardown();
        }
        self.transition(RunnerPhase::Terminal)
    }

    fn fail_before_start(&mut self, e: CoreError) -> Result<(), CoreError> {
        warn!("scenario '{}': {e}", self.scenario.name);
        self.record_failure(None, Some(e.to_string()));
        self.transition(RunnerPhase::Failed)?;
        self.transition(RunnerPhase::Terminal)
    }

    /// Load the record and refuse to touch instances created by a different
    /// driver.
    fn load_state(&mut self) -> Result<(), CoreError> {
        let scenario = self.scenario;
        let mut state = self.ctx.store.load(&scenario.state_location)?;

        if state.created {
            if let Some(previous) = &state.last_driver_name {
                if *previous != scenario.driver_name {
                    return Err(CoreError::DriverDrift {
                        scenario: scenario.name.to_string(),
                        previous: previous.to_string(),
                        current: scenario.driver_name.to_string(),
                    });
                }
            }
        }

        state.completed_steps.clear();
        self.state = state;
        Ok(())
    }

    fn run_sequence(&mut self) -> Result<(), Abort> {
        let scenario = self.scenario;
        for (index, &step) in scenario.step_sequence.iter().enumerate() {
            if self.ctx.shutdown.is_requested() {
                return Err(Abort::error(
                    None,
                    CoreError::Interrupted(scenario.name.to_string()),
                ));
            }
            self.transition(RunnerPhase::Running(index))
                .map_err(|e| Abort::error(Some(step), e))?;
            self.execute(step)?;
        }
        Ok(())
    }

    fn execute(&mut self, step: Step) -> Result<(), Abort> {
        let scenario = self.scenario;

        if step == Step::Idempotence
            && !(self.state.converged && self.state.has_completed(Step::Converge))
        {
            let reason = "converge has not completed in this run".to_owned();
            self.steps.push(StepResult::failed(step, reason.clone()));
            return Err(Abort::error(
                Some(step),
                CoreError::SequenceViolation {
                    scenario: scenario.name.to_string(),
                    step,
                    reason,
                },
            ));
        }

        let policy_skip = step == Step::Destroy && self.ctx.strategy == DestroyStrategy::Never;
        self.ctx.progress.step_started(&scenario.name, step);
        let result = if policy_skip {
            StepResult::skipped(step, "destroy strategy is 'never'")
        } else {
            self.ctx.executor.run(scenario, step, self.ctx.extra_args)
        };
        self.ctx.progress.step_finished(&scenario.name, &result);
        debug!(
            "scenario '{}': {step} success={} skipped={}",
            scenario.name, result.success, result.skipped
        );

        let success = result.success;
        self.steps.push(result);
        if !success {
            return Err(Abort::step(step));
        }

        let instances_destroyed = step == Step::Destroy && !policy_skip;
        match step {
            Step::Create => {
                self.state.created = true;
                self.state.last_driver_name = Some(scenario.driver_name.clone());
            }
            // Converged instances exist, whether or not this run created them.
            Step::Converge => {
                self.state.created = true;
                self.state.converged = true;
                self.state.last_driver_name = Some(scenario.driver_name.clone());
            }
            Step::Destroy if instances_destroyed => {
                self.state.created = false;
                self.state.converged = false;
                self.state.last_driver_name = None;
                self.destroy_ran = true;
            }
            _ => {}
        }
        self.state.record_completed(step);
        self.persist(step, instances_destroyed)
    }

    fn persist(&mut self, step: Step, instances_destroyed: bool) -> Result<(), Abort> {
        if !self.persist {
            return Ok(());
        }
        let location = &self.scenario.state_location;
        let result = if instances_destroyed {
            self.ctx.store.reset(location)
        } else {
            self.ctx.store.save(location, &self.state)
        };
        result.map_err(|e| {
            // Teardown may still run, but nothing further is written.
            self.persist = false;
            Abort::error(Some(step), e.into())
        })
    }

    fn needs_teardown(&self, status: RunStatus) -> bool {
        if !should_destroy(self.ctx.strategy, status) {
            return false;
        }
        match status {
            RunStatus::Succeeded => self.scenario.step_sequence.last() != Some(&Step::Destroy),
            RunStatus::Failed => self.failed_step != Some(Step::Destroy),
        }
    }

    fn teardown(&mut self) {
        info!("scenario '{}': destroying instances", self.scenario.name);
        if let Err(abort) = self.execute(Step::Destroy) {
            let message = abort
                .error
                .map_or_else(|| "teardown destroy failed".to_owned(), |e| e.to_string());
            self.record_failure(Some(Step::Destroy), Some(message));
        }
    }

    /// The first failure fixes `failed_step`; later errors are appended.
    fn record_failure(&mut self, step: Option<Step>, error: Option<String>) {
        if !self.failed {
            self.failed = true;
            self.failed_step = step;
        }
        if let Some(message) = error {
            match &mut self.error {
                Some(existing) => {
                    existing.push_str("; ");
                    existing.push_str(&message);
                }
                None => self.error = Some(message),
            }
        }
    }
}
