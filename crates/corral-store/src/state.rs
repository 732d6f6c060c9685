use crate::layout::StoreLayout;
use crate::{fsync_dir, StoreError};
use corral_schema::{DriverName, StateLocation, Step};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use tempfile::NamedTempFile;
use tracing::debug;

/// Persisted lifecycle state of one scenario.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScenarioState {
    #[serde(default)]
    pub created: bool,
    #[serde(default)]
    pub converged: bool,
    /// Steps completed in the current run, in first-completion order.
    #[serde(default)]
    pub completed_steps: Vec<Step>,
    #[serde(default)]
    pub last_driver_name: Option<DriverName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// blake3 checksum over the record with this field unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl ScenarioState {
    /// Append `step` unless it already completed in this run.
    pub fn record_completed(&mut self, step: Step) {
        if !self.completed_steps.contains(&step) {
            self.completed_steps.push(step);
        }
    }

    pub fn has_completed(&self, step: Step) -> bool {
        self.completed_steps.contains(&step)
    }

    fn compute_checksum(&self) -> Result<String, StoreError> {
        let mut copy = self.clone();
        copy.checksum = None;
        let json = serde_json::to_string_pretty(&copy)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }

    fn validate(&self, location: &StateLocation) -> Result<(), StoreError> {
        if self.converged && !self.created {
            return Err(StoreError::InvalidState {
                location: location.to_string(),
                reason: "converged flag set without created flag".to_owned(),
            });
        }
        Ok(())
    }
}

/// Reads, atomically replaces, and resets scenario state records.
///
/// There is no locking here: callers guarantee a location is driven by one
/// runner at a time.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateStore;

impl StateStore {
    pub fn new() -> Self {
        Self
    }

    /// Load the record at `location`, or a zero-valued state if none exists.
    pub fn load(&self, location: &StateLocation) -> Result<ScenarioState, StoreError> {
        let path = StoreLayout::state_file(location);
        if !path.exists() {
            return Ok(ScenarioState::default());
        }
        let content = fs::read_to_string(&path)?;
        let state: ScenarioState = serde_json::from_str(&content)?;

        if let Some(ref expected) = state.checksum {
            let actual = state.compute_checksum()?;
            if actual != *expected {
                return Err(StoreError::IntegrityFailure {
                    location: location.to_string(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }
        state.validate(location)?;
        Ok(state)
    }

    /// Replace the record at `location`. Readers see either the old record or
    /// the complete new one, never a partial write.
    pub fn save(&self, location: &StateLocation, state: &ScenarioState) -> Result<(), StoreError> {
        state.validate(location)?;

        let dir = location.as_path();
        fs::create_dir_all(dir)?;

        let mut record = state.clone();
        record.updated_at = Some(chrono::Utc::now().to_rfc3339());
        record.checksum = None;
        record.checksum = Some(record.compute_checksum()?);
        let content = serde_json::to_string_pretty(&record)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(StoreLayout::state_file(location))
            .map_err(|e| StoreError::Io(e.error))?;
        fsync_dir(dir)?;

        debug!("saved state at {location}");
        Ok(())
    }

    /// Remove the record at `location`. Resetting an absent record succeeds.
    pub fn reset(&self, location: &StateLocation) -> Result<(), StoreError> {
        let path = StoreLayout::state_file(location);
        if path.exists() {
            fs::remove_file(&path)?;
            fsync_dir(location.as_path())?;
            debug!("reset state at {location}");
        }
        Ok(())
    }

    pub fn exists(&self, location: &StateLocation) -> bool {
        StoreLayout::state_file(location).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location() -> (tempfile::TempDir, StateLocation) {
        let dir = tempfile::tempdir().unwrap();
        let loc = StateLocation::new(dir.path().join("project").join("default"));
        (dir, loc)
    }

    fn converged_state() -> ScenarioState {
        ScenarioState {
            created: true,
            converged: true,
            completed_steps: vec![Step::Create, Step::Converge],
            last_driver_name: Some(DriverName::new("delegated")),
            updated_at: None,
            checksum: None,
        }
    }

    #[test]
    fn load_missing_returns_default() {
        let (_dir, loc) = location();
        let state = StateStore::new().load(&loc).unwrap();
        assert_eq!(state, ScenarioState::default());
        assert!(!StateStore::new().exists(&loc));
    }

    #[test]
    fn save_then_load_preserves_fields() {
        let (_dir, loc) = location();
        let store = StateStore::new();
        store.save(&loc, &converged_state()).unwrap();

        let loaded = store.load(&loc).unwrap();
        assert!(loaded.created);
        assert!(loaded.converged);
        assert_eq!(loaded.completed_steps, [Step::Create, Step::Converge]);
        assert_eq!(loaded.last_driver_name.as_deref(), Some("delegated"));
        assert!(loaded.updated_at.is_some());
        assert!(loaded.checksum.is_some());
    }

    #[test]
    fn save_overwrites_previous_record() {
        let (_dir, loc) = location();
        let store = StateStore::new();
        store.save(&loc, &converged_state()).unwrap();

        let mut next = converged_state();
        next.converged = false;
        next.completed_steps = vec![Step::Create];
        store.save(&loc, &next).unwrap();

        let loaded = store.load(&loc).unwrap();
        assert!(!loaded.converged);
        assert_eq!(loaded.completed_steps, [Step::Create]);
    }

    #[test]
    fn save_leaves_no_temp_files() {
        let (_dir, loc) = location();
        let store = StateStore::new();
        for _ in 0..5 {
            store.save(&loc, &converged_state()).unwrap();
        }
        let entries: Vec<_> = fs::read_dir(loc.as_path())
            .unwrap()
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries, ["state.json"]);
    }

    #[test]
    fn reset_is_idempotent() {
        let (_dir, loc) = location();
        let store = StateStore::new();
        store.save(&loc, &converged_state()).unwrap();

        store.reset(&loc).unwrap();
        assert!(!store.exists(&loc));
        store.reset(&loc).unwrap();
        assert_eq!(store.load(&loc).unwrap(), ScenarioState::default());
    }

    #[test]
    fn tampered_record_fails_integrity_check() {
        let (_dir, loc) = location();
        let store = StateStore::new();
        store.save(&loc, &converged_state()).unwrap();

        let path = StoreLayout::state_file(&loc);
        let content = fs::read_to_string(&path).unwrap();
        fs::write(&path, content.replace("delegated", "podman")).unwrap();

        assert!(matches!(
            store.load(&loc),
            Err(StoreError::IntegrityFailure { .. })
        ));
    }

    #[test]
    fn record_without_checksum_is_accepted() {
        let (_dir, loc) = location();
        fs::create_dir_all(loc.as_path()).unwrap();
        fs::write(
            StoreLayout::state_file(&loc),
            r#"{"created": true, "converged": false, "completed_steps": ["create"]}"#,
        )
        .unwrap();
        let loaded = StateStore::new().load(&loc).unwrap();
        assert!(loaded.created);
        assert_eq!(loaded.completed_steps, [Step::Create]);
    }

    #[test]
    fn converged_without_created_rejected_on_save() {
        let (_dir, loc) = location();
        let state = ScenarioState {
            converged: true,
            ..ScenarioState::default()
        };
        assert!(matches!(
            StateStore::new().save(&loc, &state),
            Err(StoreError::InvalidState { .. })
        ));
    }

    #[test]
    fn converged_without_created_rejected_on_load() {
        let (_dir, loc) = location();
        fs::create_dir_all(loc.as_path()).unwrap();
        fs::write(
            StoreLayout::state_file(&loc),
            r#"{"created": false, "converged": true}"#,
        )
        .unwrap();
        assert!(matches!(
            StateStore::new().load(&loc),
            Err(StoreError::InvalidState { .. })
        ));
    }

    #[test]
    fn record_completed_deduplicates() {
        let mut state = ScenarioState::default();
        state.record_completed(Step::Cleanup);
        state.record_completed(Step::Destroy);
        state.record_completed(Step::Cleanup);
        assert_eq!(state.completed_steps, [Step::Cleanup, Step::Destroy]);
        assert!(state.has_completed(Step::Destroy));
        assert!(!state.has_completed(Step::Verify));
    }
}
