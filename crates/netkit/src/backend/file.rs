//! JSON state-file backend.
//!
//! Stores groups in a single JSON document and rewrites it after every
//! mutation. Useful for rehearsing an apply offline and for reviewing what
//! the reconciler would do to a recorded snapshot.

use crate::backend::Backend;
use crate::backend::memory::GroupStore;
use crate::error::{Error, Result};
use crate::types::{Grant, Scope, SecurityGroup};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Backend persisting groups to a JSON file.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    guard: Mutex<()>,
}

impl FileBackend {
    /// Open (or lazily create) a state file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    /// Path of the state file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<GroupStore> {
        if !self.path.exists() {
            log::debug!("State file {} does not exist, starting empty", self.path.display());
            return Ok(GroupStore::default());
        }
        let content = std::fs::read_to_string(&self.path).map_err(|source| Error::StateFile {
            path: self.path.clone(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(GroupStore::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, store: &GroupStore) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| Error::StateFile {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let content = serde_json::to_string_pretty(store)?;
        std::fs::write(&self.path, content).map_err(|source| Error::StateFile {
            path: self.path.clone(),
            source,
        })?;
        log::debug!("Saved {} groups to {}", store.groups.len(), self.path.display());
        Ok(())
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut GroupStore) -> Result<T>) -> Result<T> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let mut store = self.load()?;
        let value = f(&mut store)?;
        self.save(&store)?;
        Ok(value)
    }
}

impl Backend for FileBackend {
    fn list_groups(&self, scope: &Scope) -> Result<Vec<SecurityGroup>> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.load()?.list(scope))
    }

    fn create_group(&self, name: &str, description: &str, vpc_id: Option<&str>) -> Result<String> {
        self.mutate(|store| store.create(name, description, vpc_id))
    }

    fn authorize(
        &self,
        group_id: &str,
        protocol: &str,
        from_port: u16,
        to_port: u16,
        grant: &Grant,
    ) -> Result<()> {
        self.mutate(|store| store.authorize(group_id, protocol, from_port, to_port, grant))
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
