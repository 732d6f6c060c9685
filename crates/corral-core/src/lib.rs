//! Scenario sequencing and orchestration for Corral.
//!
//! This crate ties the scenario catalog, state store, and step executors
//! together. The `ScenarioRunner` walks one scenario's step sequence as a small
//! state machine, consulting the destroy policy on every terminal path; the
//! `Orchestrator` resolves which scenarios a request targets, validates
//! parallel-mode preconditions, and dispatches runners sequentially or through
//! a bounded worker pool.

pub mod concurrency;
pub mod lifecycle;
pub mod orchestrator;
pub mod policy;
pub mod progress;
pub mod runner;

pub use concurrency::{install_signal_handler, run_bounded, ScenarioLock, ShutdownFlag};
pub use lifecycle::{validate_transition, RunnerPhase};
pub use orchestrator::{run_scenarios, Orchestrator, RunReport, RunRequest, ScenarioStatus};
pub use policy::{should_destroy, DestroyStrategy, RunStatus};
pub use progress::{NoProgress, ProgressSink};
pub use runner::{RunContext, RunOutcome, ScenarioRunner};

use corral_schema::Step;
use thiserror::Error;

/// Process exit codes reported by [`run_scenarios`].
pub mod exit {
    pub const SUCCESS: u8 = 0;
    /// At least one scenario did not complete successfully.
    pub const SCENARIO_FAILURE: u8 = 1;
    /// Unknown scenario, missing default, invalid config, unknown driver or platform.
    pub const CONFIG_ERROR: u8 = 2;
    /// State store failure outside a scenario run.
    pub const STORE_ERROR: u8 = 3;
    /// Parallel mode requested with an unsafe or empty selection.
    pub const PRECONDITION_ERROR: u8 = 4;
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("config error: {0}")]
    Config(#[from] corral_schema::SchemaError),
    #[error("store error: {0}")]
    Store(#[from] corral_store::StoreError),
    #[error("driver error: {0}")]
    Runtime(#[from] corral_runtime::RuntimeError),
    #[error("parallel precondition failed: {0}")]
    ParallelPrecondition(String),
    #[error("sequence violation in scenario '{scenario}' at {step}: {reason}")]
    SequenceViolation {
        scenario: String,
        step: Step,
        reason: String,
    },
    #[error(
        "driver drift in scenario '{scenario}': instances were created with driver '{previous}' but this run uses '{current}'; destroy them first"
    )]
    DriverDrift {
        scenario: String,
        previous: String,
        current: String,
    },
    #[error("scenario '{0}' interrupted")]
    Interrupted(String),
    #[error("invalid runner transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Stable exit code for errors that abort a run before any scenario executes.
    pub fn exit_code(&self) -> u8 {
        match self {
            CoreError::Config(_) | CoreError::Runtime(_) => exit::CONFIG_ERROR,
            CoreError::Store(_) | CoreError::Io(_) => exit::STORE_ERROR,
            CoreError::ParallelPrecondition(_) => exit::PRECONDITION_ERROR,
            CoreError::SequenceViolation { .. }
            | CoreError::DriverDrift { .. }
            | CoreError::Interrupted(_)
            | CoreError::InvalidTransition { .. } => exit::SCENARIO_FAILURE,
        }
    }
}
