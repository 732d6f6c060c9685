use crate::step::{Step, TEST_SEQUENCE};
use crate::types::{DriverName, PlatformName, ScenarioName, StateLocation};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_DRIVER: &str = "delegated";

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read scenario config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse scenario config: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("unsupported config_version: {0}, expected 1")]
    UnsupportedVersion(u32),
    #[error("unknown lifecycle step '{0}'")]
    UnknownStep(String),
    #[error("scenario '{0}' has an empty step sequence")]
    EmptySequence(String),
    #[error("invalid scenario name: {0}")]
    InvalidName(String),
    #[error("scenario '{scenario}' has invalid state_dir '{state_dir}': must be a single [a-zA-Z0-9_-] path segment")]
    InvalidStateDir { scenario: String, state_dir: String },
    #[error("scenario '{0}' not found")]
    ScenarioNotFound(String),
    #[error("no scenario name given and no default scenario configured")]
    AmbiguousDefault,
    #[error("scenario '{0}' is defined more than once")]
    DuplicateScenario(String),
    #[error("platform '{platform}' is not declared by scenario '{scenario}'")]
    UnknownPlatform { scenario: String, platform: String },
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfigV1 {
    pub config_version: u32,
    #[serde(default)]
    pub driver: DriverSection,
    #[serde(default)]
    pub platforms: Vec<PlatformSection>,
    #[serde(default)]
    pub provisioner: ProvisionerSection,
    #[serde(default)]
    pub verifier: Option<CommandSection>,
    #[serde(default)]
    pub dependency: Option<CommandSection>,
    #[serde(default)]
    pub scenario: ScenarioSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DriverSection {
    #[serde(default = "default_driver")]
    pub name: String,
}

impl Default for DriverSection {
    fn default() -> Self {
        Self {
            name: default_driver(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PlatformSection {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ProvisionerSection {
    #[serde(default = "default_provisioner_command")]
    pub command: Vec<String>,
    #[serde(default)]
    pub playbooks: PlaybooksSection,
}

impl Default for ProvisionerSection {
    fn default() -> Self {
        Self {
            command: default_provisioner_command(),
            playbooks: PlaybooksSection::default(),
        }
    }
}

/// Playbook paths per step, relative to the scenario directory.
///
/// Only `converge` has a default; a step without a playbook is skipped.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PlaybooksSection {
    #[serde(default)]
    pub create: Option<PathBuf>,
    #[serde(default)]
    pub prepare: Option<PathBuf>,
    #[serde(default = "default_converge_playbook")]
    pub converge: Option<PathBuf>,
    #[serde(default)]
    pub side_effect: Option<PathBuf>,
    #[serde(default)]
    pub verify: Option<PathBuf>,
    #[serde(default)]
    pub cleanup: Option<PathBuf>,
    #[serde(default)]
    pub destroy: Option<PathBuf>,
}

impl Default for PlaybooksSection {
    fn default() -> Self {
        Self {
            create: None,
            prepare: None,
            converge: default_converge_playbook(),
            side_effect: None,
            verify: None,
            cleanup: None,
            destroy: None,
        }
    }
}

impl PlaybooksSection {
    /// Playbook backing `step`. Syntax and idempotence reuse the converge
    /// playbook; dependency has none.
    pub fn for_step(&self, step: Step) -> Option<&Path> {
        let entry = match step {
            Step::Create => &self.create,
            Step::Prepare => &self.prepare,
            Step::Converge | Step::Syntax | Step::Idempotence => &self.converge,
            Step::SideEffect => &self.side_effect,
            Step::Verify => &self.verify,
            Step::Cleanup => &self.cleanup,
            Step::Destroy => &self.destroy,
            Step::Dependency => return None,
        };
        entry.as_deref()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CommandSection {
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ScenarioSection {
    #[serde(default)]
    pub test_sequence: Option<Vec<Step>>,
    /// Overrides the state directory name (defaults to the scenario name).
    #[serde(default)]
    pub state_dir: Option<String>,
}

fn default_driver() -> String {
    DEFAULT_DRIVER.to_owned()
}

fn default_provisioner_command() -> Vec<String> {
    vec!["ansible-playbook".to_owned()]
}

#[allow(clippy::unnecessary_wraps)]
fn default_converge_playbook() -> Option<PathBuf> {
    Some(PathBuf::from("converge.yml"))
}

pub fn parse_scenario_str(input: &str) -> Result<ScenarioConfigV1, SchemaError> {
    let config: ScenarioConfigV1 = toml::from_str(input)?;
    if config.config_version != 1 {
        return Err(SchemaError::UnsupportedVersion(config.config_version));
    }
    Ok(config)
}

pub fn parse_scenario_file(path: impl AsRef<Path>) -> Result<ScenarioConfigV1, SchemaError> {
    let content = fs::read_to_string(path)?;
    parse_scenario_str(&content)
}

pub fn validate_scenario_name(name: &str) -> Result<(), SchemaError> {
    if name.is_empty() || name.len() > 64 {
        return Err(SchemaError::InvalidName(
            "scenario name must be 1-64 characters".to_owned(),
        ));
    }
    if !is_path_segment(name) {
        return Err(SchemaError::InvalidName(format!(
            "'{name}' must match [a-zA-Z0-9_-]"
        )));
    }
    Ok(())
}

/// A `state_dir` override names a sibling of the default state directory and
/// must never resolve outside the state root.
fn validate_state_dir(scenario: &str, state_dir: &str) -> Result<(), SchemaError> {
    if state_dir.is_empty() || state_dir.len() > 64 || !is_path_segment(state_dir) {
        return Err(SchemaError::InvalidStateDir {
            scenario: scenario.to_owned(),
            state_dir: state_dir.to_owned(),
        });
    }
    Ok(())
}

fn is_path_segment(s: &str) -> bool {
    s.bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Immutable description of one scenario, fixed at config-load time.
///
/// Run-time overrides produce modified copies through [`with_driver`](Self::with_driver)
/// and [`with_platform`](Self::with_platform); the catalog's copy is never touched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScenarioDescriptor {
    pub name: ScenarioName,
    pub driver_name: DriverName,
    pub platform_filter: Option<PlatformName>,
    pub platforms: Vec<PlatformName>,
    pub step_sequence: Vec<Step>,
    pub state_location: StateLocation,
    pub directory: PathBuf,
    pub provisioner: ProvisionerSection,
    pub verifier: Option<CommandSection>,
    pub dependency: Option<CommandSection>,
}

impl ScenarioDescriptor {
    /// Minimal descriptor with default provisioner settings.
    pub fn new(
        name: impl Into<ScenarioName>,
        driver_name: impl Into<DriverName>,
        step_sequence: Vec<Step>,
        state_location: StateLocation,
    ) -> Self {
        let directory = state_location.as_path().to_path_buf();
        Self {
            name: name.into(),
            driver_name: driver_name.into(),
            platform_filter: None,
            platforms: Vec::new(),
            step_sequence,
            state_location,
            directory,
            provisioner: ProvisionerSection::default(),
            verifier: None,
            dependency: None,
        }
    }

    /// Build a descriptor from a parsed config file. State for the scenario
    /// lives under `state_root/<state_dir or name>`.
    pub fn from_config(
        name: &str,
        config: ScenarioConfigV1,
        directory: &Path,
        state_root: &Path,
    ) -> Result<Self, SchemaError> {
        validate_scenario_name(name)?;
        let step_sequence = config
            .scenario
            .test_sequence
            .unwrap_or_else(|| TEST_SEQUENCE.to_vec());
        if step_sequence.is_empty() {
            return Err(SchemaError::EmptySequence(name.to_owned()));
        }
        let state_dir = config.scenario.state_dir.as_deref().unwrap_or(name);
        validate_state_dir(name, state_dir)?;

        Ok(Self {
            name: ScenarioName::new(name),
            driver_name: DriverName::new(config.driver.name),
            platform_filter: None,
            platforms: config
                .platforms
                .into_iter()
                .map(|p| PlatformName::new(p.name))
                .collect(),
            step_sequence,
            state_location: StateLocation::new(state_root.join(state_dir)),
            directory: directory.to_path_buf(),
            provisioner: config.provisioner,
            verifier: config.verifier,
            dependency: config.dependency,
        })
    }

    #[must_use]
    pub fn with_driver(&self, driver: DriverName) -> Self {
        Self {
            driver_name: driver,
            ..self.clone()
        }
    }

    /// Restrict the run to one declared platform.
    pub fn with_platform(&self, platform: PlatformName) -> Result<Self, SchemaError> {
        if !self.platforms.contains(&platform) {
            return Err(SchemaError::UnknownPlatform {
                scenario: self.name.to_string(),
                platform: platform.into_inner(),
            });
        }
        Ok(Self {
            platform_filter: Some(platform),
            ..self.clone()
        })
    }
}
