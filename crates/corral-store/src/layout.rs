use corral_schema::StateLocation;
use std::path::PathBuf;

const STATE_FILE: &str = "state.json";
const LOCK_FILE: &str = "state.lock";

/// Directory layout of the Corral state store.
///
/// ```text
/// <root>/<project>/<scenario>/state.json
/// <root>/<project>/<scenario>/state.lock
/// ```
///
/// The `<project>/<scenario>` directory is the scenario's [`StateLocation`].
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Parent of all scenario state locations for one project.
    #[inline]
    pub fn project_dir(&self, project: &str) -> PathBuf {
        self.root.join(project)
    }

    #[inline]
    pub fn state_file(location: &StateLocation) -> PathBuf {
        location.as_path().join(STATE_FILE)
    }

    #[inline]
    pub fn lock_file(location: &StateLocation) -> PathBuf {
        location.as_path().join(LOCK_FILE)
    }
}
