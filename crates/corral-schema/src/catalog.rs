use crate::scenario::ScenarioDescriptor;
use crate::source::ScenarioSource;
use crate::types::ScenarioName;
use crate::SchemaError;
use std::collections::HashSet;

/// Which scenarios a run targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioSelector {
    /// The project's configured default scenario.
    Default,
    Named(ScenarioName),
    All,
}

/// Immutable store of the scenario descriptors known to a project.
#[derive(Debug, Clone)]
pub struct ScenarioCatalog {
    scenarios: Vec<ScenarioDescriptor>,
    default_scenario: Option<ScenarioName>,
}

impl ScenarioCatalog {
    pub fn new(
        scenarios: Vec<ScenarioDescriptor>,
        default_scenario: Option<ScenarioName>,
    ) -> Result<Self, SchemaError> {
        let mut seen = HashSet::new();
        for s in &scenarios {
            if !seen.insert(s.name.as_str()) {
                return Err(SchemaError::DuplicateScenario(s.name.to_string()));
            }
        }
        Ok(Self {
            scenarios,
            default_scenario,
        })
    }

    pub fn from_source(
        source: &dyn ScenarioSource,
        default_scenario: Option<ScenarioName>,
    ) -> Result<Self, SchemaError> {
        Self::new(source.discover()?, default_scenario)
    }

    pub fn get(&self, name: &str) -> Result<&ScenarioDescriptor, SchemaError> {
        self.scenarios
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| SchemaError::ScenarioNotFound(name.to_owned()))
    }

    /// Resolve a selector to descriptors. `All` keeps discovery order.
    pub fn list(&self, selector: &ScenarioSelector) -> Result<Vec<ScenarioDescriptor>, SchemaError> {
        match selector {
            ScenarioSelector::All => Ok(self.scenarios.clone()),
            ScenarioSelector::Named(name) => Ok(vec![self.get(name)?.clone()]),
            ScenarioSelector::Default => {
                let name = self
                    .default_scenario
                    .as_ref()
                    .ok_or(SchemaError::AmbiguousDefault)?;
                Ok(vec![self.get(name)?.clone()])
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScenarioDescriptor> {
        self.scenarios.iter()
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}
