use crate::RuntimeError;
use corral_schema::ScenarioDescriptor;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// An infrastructure driver a scenario can be instantiated through.
///
/// Provisioning itself happens in the scenario's create/destroy steps; the
/// driver reports whether it is available and sets the environment every
/// step process of the scenario sees.
pub trait Driver: Send + Sync {
    fn name(&self) -> &str;

    fn available(&self) -> bool;

    fn environment(&self, _scenario: &ScenarioDescriptor) -> Vec<(String, String)> {
        Vec::new()
    }
}

/// Instances are managed entirely by the scenario's own create and destroy
/// playbooks.
pub struct DelegatedDriver;

impl Driver for DelegatedDriver {
    fn name(&self) -> &'static str {
        "delegated"
    }

    fn available(&self) -> bool {
        true
    }
}

/// Steps run against the local host; there is nothing to provision.
pub struct LocalDriver;

impl Driver for LocalDriver {
    fn name(&self) -> &'static str {
        "local"
    }

    fn available(&self) -> bool {
        true
    }

    fn environment(&self, _scenario: &ScenarioDescriptor) -> Vec<(String, String)> {
        vec![("CORRAL_CONNECTION".to_owned(), "local".to_owned())]
    }
}

/// Set of drivers resolvable by name, populated explicitly at startup.
#[derive(Default)]
pub struct DriverRegistry {
    drivers: BTreeMap<String, Arc<dyn Driver>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the drivers shipped with Corral.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.drivers.insert(
            DelegatedDriver.name().to_owned(),
            Arc::new(DelegatedDriver),
        );
        registry
            .drivers
            .insert(LocalDriver.name().to_owned(), Arc::new(LocalDriver));
        registry
    }

    pub fn register(&mut self, driver: Arc<dyn Driver>) -> Result<(), RuntimeError> {
        let name = driver.name().to_owned();
        if self.drivers.contains_key(&name) {
            return Err(RuntimeError::DuplicateDriver(name));
        }
        self.drivers.insert(name, driver);
        Ok(())
    }

    pub fn names(&self) -> BTreeSet<String> {
        self.drivers.keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.drivers.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Driver>, RuntimeError> {
        self.drivers
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownDriver {
                name: name.to_owned(),
                available: self.names().into_iter().collect::<Vec<_>>().join(", "),
            })
    }

    /// Look up `name` and confirm the driver can run on this host.
    pub fn select(&self, name: &str) -> Result<Arc<dyn Driver>, RuntimeError> {
        let driver = self.get(name)?;
        if !driver.available() {
            return Err(RuntimeError::DriverUnavailable(name.to_owned()));
        }
        Ok(driver)
    }
}
