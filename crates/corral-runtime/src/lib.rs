//! Driver registry and step execution for Corral scenarios.
//!
//! This crate is the boundary to the outside world: the `Driver` trait and the
//! explicitly populated `DriverRegistry`, the `StepExecutor` trait the sequencer
//! calls once per lifecycle step, a process-spawning `CommandExecutor` that
//! runs the scenario's provisioner, verifier, and dependency commands, and a
//! `ScriptedExecutor` for exercising the sequencer without external tools.

pub mod command;
pub mod driver;
pub mod executor;
pub mod mock;

pub use command::CommandExecutor;
pub use driver::{DelegatedDriver, Driver, DriverRegistry, LocalDriver};
pub use executor::{StepExecutor, StepResult};
pub use mock::{ExecutorCall, ScriptedExecutor};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unknown driver '{name}' (available: {available})")]
    UnknownDriver { name: String, available: String },
    #[error("driver '{0}' is not available on this system")]
    DriverUnavailable(String),
    #[error("driver '{0}' is already registered")]
    DuplicateDriver(String),
    #[error("playbook not found: {0}")]
    PlaybookNotFound(String),
    #[error("step execution failed: {0}")]
    ExecFailed(String),
}
