use crate::scenario::{parse_scenario_file, ScenarioDescriptor};
use crate::SchemaError;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

pub const SCENARIO_CONFIG_FILE: &str = "scenario.toml";

/// Supplies scenario descriptors in a stable order.
pub trait ScenarioSource {
    fn discover(&self) -> Result<Vec<ScenarioDescriptor>, SchemaError>;
}

impl ScenarioSource for Vec<ScenarioDescriptor> {
    fn discover(&self) -> Result<Vec<ScenarioDescriptor>, SchemaError> {
        Ok(self.clone())
    }
}

/// Discovers scenarios as `<scenarios_dir>/<name>/scenario.toml`.
///
/// Directories are visited in name order so `--all` runs are reproducible.
/// Directories without a config file are ignored.
pub struct FsScenarioSource {
    scenarios_dir: PathBuf,
    state_root: PathBuf,
}

impl FsScenarioSource {
    pub fn new(scenarios_dir: impl Into<PathBuf>, state_root: impl Into<PathBuf>) -> Self {
        Self {
            scenarios_dir: scenarios_dir.into(),
            state_root: state_root.into(),
        }
    }
}

impl ScenarioSource for FsScenarioSource {
    fn discover(&self) -> Result<Vec<ScenarioDescriptor>, SchemaError> {
        if !self.scenarios_dir.exists() {
            debug!(
                "scenario directory {} does not exist",
                self.scenarios_dir.display()
            );
            return Ok(Vec::new());
        }

        let mut dirs = Vec::new();
        for entry in fs::read_dir(&self.scenarios_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() && entry.path().join(SCENARIO_CONFIG_FILE).is_file() {
                dirs.push(entry.path());
            }
        }
        dirs.sort();

        let mut descriptors = Vec::with_capacity(dirs.len());
        for dir in dirs {
            let name = dir
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| {
                    SchemaError::InvalidName(format!("non-UTF-8 directory {}", dir.display()))
                })?
                .to_owned();
            let config = parse_scenario_file(dir.join(SCENARIO_CONFIG_FILE))?;
            let descriptor =
                ScenarioDescriptor::from_config(&name, config, &dir, &self.state_root)?;
            debug!(
                "discovered scenario '{}' (driver {})",
                descriptor.name, descriptor.driver_name
            );
            descriptors.push(descriptor);
        }
        Ok(descriptors)
    }
}
