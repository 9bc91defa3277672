//! In-memory backend.
//!
//! Behaves like the real API where it matters to a reconciler: ids are
//! assigned on creation, names are unique per VPC, unknown groups and
//! duplicate grants are rejected.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::types::{Grant, Scope, SecurityGroup};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Group storage shared by the in-memory and file backends.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct GroupStore {
    #[serde(default)]
    pub next_id: u64,
    #[serde(default)]
    pub groups: Vec<SecurityGroup>,
}

impl GroupStore {
    pub fn list(&self, scope: &Scope) -> Vec<SecurityGroup> {
        self.groups
            .iter()
            .filter(|g| scope.contains(g.vpc_id.as_deref()))
            .cloned()
            .collect()
    }

    pub fn create(&mut self, name: &str, description: &str, vpc_id: Option<&str>) -> Result<String> {
        if name.trim().is_empty() {
            return Err(Error::InvalidRequest {
                message: "group name must not be empty".to_string(),
            });
        }
        if description.trim().is_empty() {
            return Err(Error::InvalidRequest {
                message: format!("group '{name}' needs a non-empty description"),
            });
        }
        if self
            .groups
            .iter()
            .any(|g| g.name == name && g.vpc_id.as_deref() == vpc_id)
        {
            return Err(Error::DuplicateGroup {
                name: name.to_string(),
            });
        }

        self.next_id += 1;
        let id = format!("sg-{:08x}", self.next_id);
        self.groups.push(SecurityGroup::new(
            &id,
            name,
            description,
            vpc_id.map(str::to_string),
        ));
        Ok(id)
    }

    pub fn authorize(
        &mut self,
        group_id: &str,
        protocol: &str,
        from_port: u16,
        to_port: u16,
        grant: &Grant,
    ) -> Result<()> {
        if from_port > to_port {
            return Err(Error::InvalidRequest {
                message: format!("invalid port range {from_port}-{to_port}"),
            });
        }
        if let Grant::SourceGroup(source) = grant
            && !self.groups.iter().any(|g| &g.id == source)
        {
            return Err(Error::GroupNotFound { id: source.clone() });
        }

        let group = self
            .groups
            .iter_mut()
            .find(|g| g.id == group_id)
            .ok_or_else(|| Error::GroupNotFound {
                id: group_id.to_string(),
            })?;

        if group.has_grant(protocol, from_port, to_port, grant) {
            return Err(Error::DuplicateRule {
                group_id: group_id.to_string(),
                rule: format!("{protocol} {from_port}-{to_port} {grant}"),
            });
        }

        group.add_grant(protocol, from_port, to_port, grant.clone());
        Ok(())
    }
}

#[derive(Debug, Default)]
struct State {
    store: GroupStore,
    listing_lag: bool,
    unsettled: HashSet<String>,
    failing_groups: HashSet<String>,
}

/// In-memory backend with shared state.
///
/// Clones share the same groups, so a test can hand one clone to the
/// reconciler and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend whose listings miss groups created since the previous
    /// listing, like an eventually-consistent API.
    pub fn with_listing_lag() -> Self {
        let backend = Self::new();
        backend.lock().listing_lag = true;
        backend
    }

    /// Make every create and authorize touching this group name or id fail
    /// with a permission error.
    pub fn fail_on(&self, name_or_id: impl Into<String>) {
        self.lock().failing_groups.insert(name_or_id.into());
    }

    /// Snapshot of every group, ignoring scope and lag.
    pub fn groups(&self) -> Vec<SecurityGroup> {
        self.lock().store.groups.clone()
    }

    /// Find a group by name.
    pub fn group_named(&self, name: &str) -> Option<SecurityGroup> {
        self.lock().store.groups.iter().find(|g| g.name == name).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Backend for MemoryBackend {
    fn list_groups(&self, scope: &Scope) -> Result<Vec<SecurityGroup>> {
        let mut state = self.lock();
        let unsettled = std::mem::take(&mut state.unsettled);
        Ok(state
            .store
            .list(scope)
            .into_iter()
            .filter(|g| !unsettled.contains(&g.id))
            .collect())
    }

    fn create_group(&self, name: &str, description: &str, vpc_id: Option<&str>) -> Result<String> {
        let mut state = self.lock();
        if state.failing_groups.contains(name) {
            return Err(Error::Permission {
                message: format!("not allowed to create '{name}'"),
            });
        }
        let id = state.store.create(name, description, vpc_id)?;
        if state.listing_lag {
            state.unsettled.insert(id.clone());
        }
        Ok(id)
    }

    fn authorize(
        &self,
        group_id: &str,
        protocol: &str,
        from_port: u16,
        to_port: u16,
        grant: &Grant,
    ) -> Result<()> {
        let mut state = self.lock();
        let group_name = state
            .store
            .groups
            .iter()
            .find(|g| g.id == group_id)
            .map(|g| g.name.clone());
        if state.failing_groups.contains(group_id)
            || group_name.is_some_and(|n| state.failing_groups.contains(&n))
        {
            return Err(Error::Permission {
                message: format!("not allowed to modify '{group_id}'"),
            });
        }
        state
            .store
            .authorize(group_id, protocol, from_port, to_port, grant)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
