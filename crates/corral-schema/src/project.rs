use crate::types::ScenarioName;
use crate::SchemaError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const PROJECT_CONFIG_FILE: &str = "corral.toml";

/// Project-wide settings read from `corral.toml` at the project root.
///
/// Every field is optional; a project without the file runs with defaults.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    #[serde(default = "default_scenarios_dir")]
    pub scenarios_dir: PathBuf,
    #[serde(default)]
    pub run: RunSection,
    #[serde(default)]
    pub store: StoreSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RunSection {
    #[serde(default = "default_scenario")]
    pub default_scenario: Option<ScenarioName>,
    /// Upper bound on scenarios running at once in parallel mode.
    #[serde(default)]
    pub max_concurrency: Option<usize>,
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            default_scenario: default_scenario(),
            max_concurrency: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StoreSection {
    #[serde(default)]
    pub root: Option<PathBuf>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            scenarios_dir: default_scenarios_dir(),
            run: RunSection::default(),
            store: StoreSection::default(),
        }
    }
}

fn default_scenarios_dir() -> PathBuf {
    PathBuf::from("corral")
}

#[allow(clippy::unnecessary_wraps)]
fn default_scenario() -> Option<ScenarioName> {
    Some(ScenarioName::new("default"))
}

impl ProjectConfig {
    /// Load `corral.toml` from `project_dir`, falling back to defaults when
    /// the file does not exist.
    pub fn load(project_dir: &Path) -> Result<Self, SchemaError> {
        let path = project_dir.join(PROJECT_CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Effective concurrency bound, never zero.
    pub fn max_concurrency(&self) -> usize {
        self.run
            .max_concurrency
            .or_else(|| std::thread::available_parallelism().ok().map(usize::from))
            .unwrap_or(1)
            .max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(config, ProjectConfig::default());
        assert_eq!(config.scenarios_dir, PathBuf::from("corral"));
        assert_eq!(
            config.run.default_scenario.as_deref(),
            Some("default")
        );
    }

    #[test]
    fn loads_overrides() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(PROJECT_CONFIG_FILE),
            r#"
scenarios_dir = "molecule"

[run]
default_scenario = "smoke"
max_concurrency = 3

[store]
root = "/var/tmp/corral"
"#,
        )
        .unwrap();
        let config = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(config.scenarios_dir, PathBuf::from("molecule"));
        assert_eq!(config.run.default_scenario.as_deref(), Some("smoke"));
        assert_eq!(config.max_concurrency(), 3);
        assert_eq!(config.store.root, Some(PathBuf::from("/var/tmp/corral")));
    }

    #[test]
    fn zero_concurrency_clamped_to_one() {
        let mut config = ProjectConfig::default();
        config.run.max_concurrency = Some(0);
        assert_eq!(config.max_concurrency(), 1);
    }

    #[test]
    fn rejects_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(PROJECT_CONFIG_FILE),
            "[run]\nworkers = 4\n",
        )
        .unwrap();
        assert!(ProjectConfig::load(dir.path()).is_err());
    }
}
