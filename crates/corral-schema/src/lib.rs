//! Scenario schema for Corral.
//!
//! This crate defines the configuration layer: the closed lifecycle step
//! vocabulary (`Step`), identifier newtypes, TOML scenario and project config
//! parsing, immutable `ScenarioDescriptor`s, filesystem scenario discovery
//! (`FsScenarioSource`), and the descriptor store used to resolve which
//! scenarios a run targets (`ScenarioCatalog`).

pub mod catalog;
pub mod project;
pub mod scenario;
pub mod source;
pub mod step;
pub mod types;

pub use catalog::{ScenarioCatalog, ScenarioSelector};
pub use project::{ProjectConfig, RunSection, StoreSection, PROJECT_CONFIG_FILE};
pub use scenario::{
    parse_scenario_file, parse_scenario_str, validate_scenario_name, CommandSection,
    DriverSection, PlatformSection, PlaybooksSection, ProvisionerSection, ScenarioConfigV1,
    ScenarioDescriptor, ScenarioSection, SchemaError, DEFAULT_DRIVER,
};
pub use source::{FsScenarioSource, ScenarioSource, SCENARIO_CONFIG_FILE};
pub use step::{Step, TEST_SEQUENCE};
pub use types::{DriverName, PlatformName, ScenarioName, StateLocation};
