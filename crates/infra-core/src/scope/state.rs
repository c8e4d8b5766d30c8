//! Persisted scope state
//!
//! Lets a scope outlive the process that created it: the handles are written
//! to a TOML file so a later run can destroy them.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::reconcile::ResourceHandle;
use crate::{Error, Result};

const STATE_VERSION: &str = "1.0";

/// One tracked resource in a state file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEntry {
    pub logical_id: String,
    pub handle: ResourceHandle,
}

impl StateEntry {
    pub fn new(logical_id: impl Into<String>, handle: ResourceHandle) -> Self {
        Self {
            logical_id: logical_id.into(),
            handle,
        }
    }
}

/// On-disk form of a scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeState {
    /// Format version for forward compatibility
    version: String,
    scope: String,
    #[serde(default)]
    entries: Vec<StateEntry>,
}

impl ScopeState {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            version: STATE_VERSION.to_string(),
            scope: scope.into(),
            entries: Vec::new(),
        }
    }

    /// Load state from a TOML file under a shared lock
    pub fn load(path: &Path) -> Result<Self> {
        let lock = lock_file(path)?;
        lock.lock_shared()?;
        let content = fs::read_to_string(path)?;
        let state: ScopeState = toml::from_str(&content)?;

        if state.version != STATE_VERSION {
            return Err(Error::State {
                message: format!(
                    "unsupported state version {} in {}",
                    state.version,
                    path.display()
                ),
            });
        }
        Ok(state)
    }

    /// Load state if the file exists, otherwise start empty
    pub fn load_or_new(path: &Path, scope: &str) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::new(scope))
        }
    }

    /// Save atomically: exclusive lock, write to a temp file, rename
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
        }

        let lock = lock_file(path)?;
        lock.lock_exclusive()?;

        let temp_path = path.with_extension("toml.tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, path)?;

        Ok(())
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn entries(&self) -> &[StateEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add or replace the entry for its logical id
    pub fn add_entry(&mut self, entry: StateEntry) {
        match self
            .entries
            .iter_mut()
            .find(|e| e.logical_id == entry.logical_id)
        {
            Some(existing) => existing.handle = entry.handle,
            None => self.entries.push(entry),
        }
    }

    pub fn remove_entry(&mut self, logical_id: &str) -> Option<StateEntry> {
        let position = self.entries.iter().position(|e| e.logical_id == logical_id)?;
        Some(self.entries.remove(position))
    }

    pub fn get(&self, logical_id: &str) -> Option<&StateEntry> {
        self.entries.iter().find(|e| e.logical_id == logical_id)
    }

    /// Keep only entries whose logical id is in `logical_ids`
    pub fn retain_ids(&mut self, logical_ids: &[String]) {
        self.entries
            .retain(|e| logical_ids.iter().any(|id| id == &e.logical_id));
    }
}

/// Open the sidecar lock for `path`.
///
/// Saves replace the state file by rename, so locking the state file itself
/// would leave later writers locking a different inode.
fn lock_file(path: &Path) -> Result<File> {
    let mut lock_path = path.as_os_str().to_owned();
    lock_path.push(".lock");
    Ok(OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(PathBuf::from(lock_path))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::Origin;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn handle(name: &str) -> ResourceHandle {
        ResourceHandle::new(
            "worker",
            name,
            format!("/accounts/a/workers/workers/{}", name),
            Origin::Created,
        )
    }

    #[test]
    fn save_is_atomic_and_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state").join("scope.toml");

        let mut state = ScopeState::new("test-run");
        state.add_entry(StateEntry::new("api", handle("api").with_id(Some("id-1".into()))));
        state.add_entry(StateEntry::new("mailer", handle("mailer")));
        state.save(&path).unwrap();

        assert!(!path.with_extension("toml.tmp").exists());

        let loaded = ScopeState::load(&path).unwrap();
        assert_eq!(loaded, state);

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("version = \"1.0\""));
        assert!(raw.contains("origin = \"created\""));
    }

    #[test]
    fn add_entry_replaces_same_logical_id() {
        let mut state = ScopeState::new("s");
        state.add_entry(StateEntry::new("api", handle("one")));
        state.add_entry(StateEntry::new("other", handle("two")));
        state.add_entry(StateEntry::new("api", handle("three")));

        assert_eq!(state.entries().len(), 2);
        assert_eq!(state.entries()[0].handle.name, "three");
    }

    #[test]
    fn remove_and_retain() {
        let mut state = ScopeState::new("s");
        for id in ["a", "b", "c"] {
            state.add_entry(StateEntry::new(id, handle(id)));
        }

        assert!(state.remove_entry("b").is_some());
        assert!(state.remove_entry("b").is_none());

        state.retain_ids(&["c".to_string()]);
        assert_eq!(state.entries().len(), 1);
        assert!(state.get("c").is_some());
    }

    #[test]
    fn concurrent_saves_are_serialized() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scope.toml");

        let writers: Vec<_> = (0..8)
            .map(|i| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let mut state = ScopeState::new("s");
                    let id = format!("w{}", i);
                    state.add_entry(StateEntry::new(&id, handle(&id)));
                    state.save(&path).unwrap();
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let loaded = ScopeState::load(&path).unwrap();
        assert_eq!(loaded.entries().len(), 1);
        assert!(dir.path().join("scope.toml.lock").exists());
        assert!(!path.with_extension("toml.tmp").exists());
    }

    #[test]
    fn missing_file_starts_empty() {
        let dir = tempdir().unwrap();
        let state = ScopeState::load_or_new(&dir.path().join("none.toml"), "fresh").unwrap();
        assert!(state.is_empty());
        assert_eq!(state.scope(), "fresh");
    }

    #[test]
    fn unknown_version_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scope.toml");
        fs::write(&path, "version = \"9.9\"\nscope = \"s\"\n").unwrap();
        assert!(matches!(ScopeState::load(&path), Err(Error::State { .. })));
    }
}
