//! Remote state: the groups that already exist, normalized for comparison.

use crate::error::Result;
use crate::rule::{self, GroupHandle, PortRange, Protocol, ResolvedRule, ResolvedTarget};
use netkit::backend::Backend;
use netkit::{Grant, IpPermission, Scope, SecurityGroup};
use serde::Serialize;
use std::collections::HashMap;

/// A group as it exists remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteGroup {
    pub id: String,
    pub name: String,
    pub description: String,
    pub vpc: Option<String>,
    /// One rule per authorized grant
    pub rules: Vec<ResolvedRule>,
}

impl RemoteGroup {
    /// Normalize a group from the API.
    pub fn from_security_group(group: &SecurityGroup) -> Self {
        let rules = group
            .permissions
            .iter()
            .flat_map(|permission| normalize_permission(&group.id, permission))
            .collect();

        Self {
            id: group.id.clone(),
            name: group.name.clone(),
            description: group.description.clone(),
            vpc: group.vpc_id.clone(),
            rules,
        }
    }

    /// Whether the group already holds an equal rule.
    pub fn has_rule(&self, rule: &ResolvedRule) -> bool {
        self.rules.contains(rule)
    }
}

/// Expand one permission into a rule per grant, dropping what the rule
/// language cannot express.
fn normalize_permission(group_id: &str, permission: &IpPermission) -> Vec<ResolvedRule> {
    let Some(protocol) = Protocol::from_name(&permission.protocol) else {
        log::debug!(
            "{group_id}: skipping permission with unsupported protocol '{}'",
            permission.protocol
        );
        return Vec::new();
    };
    let Some(ports) = PortRange::new(permission.from_port, permission.to_port) else {
        log::debug!(
            "{group_id}: skipping permission with port range {}-{}",
            permission.from_port,
            permission.to_port
        );
        return Vec::new();
    };

    permission
        .grants
        .iter()
        .filter_map(|grant| {
            let target = match grant {
                Grant::Cidr(text) => match rule::parse_cidr(text) {
                    Ok(cidr) => ResolvedTarget::Cidr(cidr),
                    Err(e) => {
                        log::debug!("{group_id}: skipping grant {text}: {e}");
                        return None;
                    }
                },
                Grant::SourceGroup(id) => ResolvedTarget::Group(GroupHandle::Existing(id.clone())),
            };
            Some(ResolvedRule::new(protocol, ports, target))
        })
        .collect()
}

/// Every remote group in scope, indexed by id and by `(name, vpc)`.
#[derive(Debug, Clone, Default)]
pub struct RemoteSnapshot {
    groups: Vec<RemoteGroup>,
    by_id: HashMap<String, usize>,
    by_name: HashMap<(String, Option<String>), usize>,
}

impl RemoteSnapshot {
    /// List and normalize every group visible in the scope.
    pub fn load(backend: &dyn Backend, scope: &Scope) -> Result<Self> {
        let groups = backend.list_groups(scope)?;
        log::debug!("Listed {} remote groups from {}", groups.len(), backend.name());
        Ok(Self::from_groups(
            groups.iter().map(RemoteGroup::from_security_group),
        ))
    }

    /// Build a snapshot from already-normalized groups.
    pub fn from_groups(groups: impl IntoIterator<Item = RemoteGroup>) -> Self {
        let mut snapshot = Self::default();
        for group in groups {
            snapshot.insert(group);
        }
        snapshot
    }

    /// Add a group created during this run that the listing did not return.
    /// Does nothing if the id is already known.
    pub fn record_created(
        &mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        vpc: Option<String>,
    ) {
        let id = id.into();
        if self.by_id.contains_key(&id) {
            return;
        }
        log::debug!("Recording created group {id} missing from listing");
        self.insert(RemoteGroup {
            id,
            name: name.into(),
            description: description.into(),
            vpc,
            rules: Vec::new(),
        });
    }

    fn insert(&mut self, group: RemoteGroup) {
        let index = self.groups.len();
        self.by_id.insert(group.id.clone(), index);
        self.by_name
            .entry((group.name.clone(), group.vpc.clone()))
            .or_insert(index);
        self.groups.push(group);
    }

    /// Find a group by name within a VPC (or among unscoped groups).
    pub fn find(&self, name: &str, vpc: Option<&str>) -> Option<&RemoteGroup> {
        self.by_name
            .get(&(name.to_string(), vpc.map(str::to_string)))
            .map(|&i| &self.groups[i])
    }

    pub fn get(&self, id: &str) -> Option<&RemoteGroup> {
        self.by_id.get(id).map(|&i| &self.groups[i])
    }

    /// Every group with this name, across VPCs.
    pub fn named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a RemoteGroup> + 'a {
        self.groups.iter().filter(move |g| g.name == name)
    }

    pub fn groups(&self) -> &[RemoteGroup] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
