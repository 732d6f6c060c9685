pub mod list;
pub mod reset;

use corral_core::{CoreError, Orchestrator};
use corral_runtime::{CommandExecutor, DriverRegistry};
use corral_schema::{
    FsScenarioSource, ProjectConfig, ScenarioCatalog, ScenarioName, ScenarioSelector, SchemaError,
};
use corral_store::StoreLayout;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const DEFAULT_STORE_ROOT: &str = "~/.cache/corral";

/// A loaded project with its discovered scenarios.
pub struct Project {
    pub root: PathBuf,
    pub config: ProjectConfig,
    pub catalog: ScenarioCatalog,
}

impl Project {
    pub fn load(dir: &Path, store_override: Option<&Path>) -> Result<Self, CoreError> {
        let root = dir.canonicalize().map_err(SchemaError::Io)?;
        let config = ProjectConfig::load(&root)?;

        let store_root = store_override
            .map(Path::to_path_buf)
            .or_else(|| config.store.root.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_ROOT));
        let project_name = root
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("project");
        let state_root = StoreLayout::new(expand_tilde(&store_root)).project_dir(project_name);

        let source = FsScenarioSource::new(root.join(&config.scenarios_dir), state_root);
        let catalog = ScenarioCatalog::from_source(&source, config.run.default_scenario.clone())?;
        debug!(
            "project {} has {} scenario(s)",
            root.display(),
            catalog.len()
        );
        Ok(Self {
            root,
            config,
            catalog,
        })
    }

    pub fn scenarios_dir(&self) -> PathBuf {
        self.root.join(&self.config.scenarios_dir)
    }

    /// Orchestrator backed by the process-spawning executor and builtin drivers.
    pub fn orchestrator(&self) -> Orchestrator {
        let drivers = Arc::new(DriverRegistry::builtin());
        let executor = Arc::new(CommandExecutor::new(Arc::clone(&drivers)));
        Orchestrator::new(self.catalog.clone(), drivers, executor)
            .with_max_concurrency(self.config.max_concurrency())
    }
}

pub fn selector(scenario_name: Option<String>, all: bool) -> ScenarioSelector {
    match scenario_name {
        Some(name) => ScenarioSelector::Named(ScenarioName::new(name)),
        None if all => ScenarioSelector::All,
        None => ScenarioSelector::Default,
    }
}

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, CoreError> {
    serde_json::to_string_pretty(value).map_err(|e| CoreError::Io(e.into()))
}

/// Color a padded state label for table output.
pub fn colorize_state(label: &str) -> String {
    use console::Style;
    match label.trim_end() {
        "converged" => Style::new().green().apply_to(label).to_string(),
        "created" => Style::new().yellow().apply_to(label).to_string(),
        "absent" => Style::new().dim().apply_to(label).to_string(),
        _ => label.to_owned(),
    }
}

pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}
