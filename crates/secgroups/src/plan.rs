//! Reconciliation: what has to be created and authorized so the remote
//! topology matches the desired one.

use crate::desired::DesiredState;
use crate::error::{Error, Result};
use crate::remote::{RemoteGroup, RemoteSnapshot};
use crate::rule::{GroupHandle, GroupRef, ResolvedRule, ResolvedTarget, Rule, Target};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// A group that does not exist remotely yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupCreate {
    pub name: String,
    pub description: String,
    pub vpc: Option<String>,
}

/// Rules to authorize on one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupUpdate {
    pub name: String,
    pub vpc: Option<String>,
    /// Remote id, or `Pending` when the group is created by the same plan
    pub handle: GroupHandle,
    /// Missing rules, in desired order
    pub rules: Vec<ResolvedRule>,
}

/// The operations needed to converge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationPlan {
    pub creates: Vec<GroupCreate>,
    pub updates: Vec<GroupUpdate>,
}

impl ReconciliationPlan {
    /// Check if there is nothing to do
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.updates.is_empty()
    }

    /// Number of rules to authorize across all groups
    pub fn rule_count(&self) -> usize {
        self.updates.iter().map(|u| u.rules.len()).sum()
    }

    /// The update for a group, if it has missing rules
    pub fn update_for(&self, name: &str) -> Option<&GroupUpdate> {
        self.updates.iter().find(|u| u.name == name)
    }

    /// Whether the plan creates the named group
    pub fn creates_group(&self, name: &str) -> bool {
        self.creates.iter().any(|c| c.name == name)
    }
}

/// Compute the plan for a desired topology against a remote snapshot.
///
/// Fails before producing anything if a group reference cannot be resolved.
pub fn plan(desired: &DesiredState, remote: &RemoteSnapshot) -> Result<ReconciliationPlan> {
    let resolver = Resolver::new(desired, remote);
    let mut plan = ReconciliationPlan::default();

    for spec in &desired.groups {
        let existing = remote.find(&spec.name, spec.vpc.as_deref());
        if existing.is_none() {
            plan.creates.push(GroupCreate {
                name: spec.name.clone(),
                description: spec.description.clone(),
                vpc: spec.vpc.clone(),
            });
        }

        let resolved = spec
            .rules
            .iter()
            .map(|rule| resolver.resolve(rule, &spec.name, spec.vpc.as_deref()))
            .collect::<Result<Vec<_>>>()?;

        let rules = filter_existing_rules(&resolved, existing);
        if rules.is_empty() {
            continue;
        }

        let handle = existing.map_or_else(
            || GroupHandle::Pending(spec.name.clone()),
            |g| GroupHandle::Existing(g.id.clone()),
        );
        plan.updates.push(GroupUpdate {
            name: spec.name.clone(),
            vpc: spec.vpc.clone(),
            handle,
            rules,
        });
    }

    log::debug!(
        "Planned {} group creations and {} rule authorizations",
        plan.creates.len(),
        plan.rule_count()
    );
    Ok(plan)
}

/// Drop rules the remote group already holds, and repeats within the list.
/// Order is preserved. With no remote group every rule is missing.
pub fn filter_existing_rules(
    rules: &[ResolvedRule],
    remote: Option<&RemoteGroup>,
) -> Vec<ResolvedRule> {
    let mut seen = HashSet::with_capacity(rules.len());
    rules
        .iter()
        .filter(|rule| !remote.is_some_and(|group| group.has_rule(rule)))
        .filter(|rule| seen.insert(*rule))
        .cloned()
        .collect()
}

/// Resolves name references against the desired topology first, then the
/// remote one.
pub(crate) struct Resolver<'a> {
    handles: HashMap<&'a str, GroupHandle>,
    remote: &'a RemoteSnapshot,
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(desired: &'a DesiredState, remote: &'a RemoteSnapshot) -> Self {
        let mut handles = HashMap::with_capacity(desired.groups.len());
        for spec in &desired.groups {
            let handle = match remote.find(&spec.name, spec.vpc.as_deref()) {
                Some(group) => GroupHandle::Existing(group.id.clone()),
                None => GroupHandle::Pending(spec.name.clone()),
            };
            handles.entry(spec.name.as_str()).or_insert(handle);
        }
        Self { handles, remote }
    }

    /// Resolve a rule owned by the group `owner` in `owner_vpc`.
    pub(crate) fn resolve(
        &self,
        rule: &Rule,
        owner: &str,
        owner_vpc: Option<&str>,
    ) -> Result<ResolvedRule> {
        let target = match &rule.target {
            Target::Cidr(cidr) => ResolvedTarget::Cidr(*cidr),
            Target::Group(GroupRef::Id(id)) => {
                ResolvedTarget::Group(GroupHandle::Existing(id.clone()))
            }
            Target::Group(GroupRef::Name(name)) => {
                ResolvedTarget::Group(self.resolve_name(name, owner, owner_vpc)?)
            }
        };
        Ok(ResolvedRule::new(rule.protocol, rule.ports, target))
    }

    fn resolve_name(&self, name: &str, owner: &str, owner_vpc: Option<&str>) -> Result<GroupHandle> {
        if let Some(handle) = self.handles.get(name) {
            return Ok(handle.clone());
        }
        if let Some(group) = self.remote.find(name, owner_vpc) {
            return Ok(GroupHandle::Existing(group.id.clone()));
        }

        let candidates: Vec<&RemoteGroup> = self.remote.named(name).collect();
        match candidates.as_slice() {
            [only] => Ok(GroupHandle::Existing(only.id.clone())),
            [] => Err(Error::UnresolvedReference {
                name: name.to_string(),
                group: owner.to_string(),
            }),
            many => Err(Error::AmbiguousReference {
                name: name.to_string(),
                group: owner.to_string(),
                candidates: many.iter().map(|g| g.id.clone()).collect(),
            }),
        }
    }
}
