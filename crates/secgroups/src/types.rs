//! Options and results of an apply run.

use netkit::Scope;
use serde::Serialize;

/// Options for applying a plan
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Compute the plan but issue no mutating calls
    pub dry_run: bool,
    /// Maximum number of concurrent API calls
    pub jobs: usize,
    /// Which groups to list when reloading remote state
    pub scope: Scope,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 4,
            scope: Scope::All,
        }
    }
}

impl ExecuteOptions {
    /// Fully sequential execution.
    pub fn sequential() -> Self {
        Self {
            jobs: 1,
            ..Default::default()
        }
    }
}

/// Phases of an apply run, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    CreateGroups,
    AuthorizeRules,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::CreateGroups => "Creating groups",
            Phase::AuthorizeRules => "Authorizing rules",
        }
    }
}

/// Outcome of one mutating step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepResult {
    /// Group created with this id
    Created { id: String },
    /// Rule authorized
    Authorized,
    /// The API reported the group or rule as already present
    AlreadyPresent,
    /// Step failed
    Failed { error: String },
}

impl StepResult {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

/// A mutation that failed, and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    /// Group name, or `group: rule` for an authorization
    pub entity: String,
    pub error: String,
}

/// Counters of an apply run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplySummary {
    /// Groups created by this run
    pub new_group_count: usize,
    /// Pre-existing groups that received at least one new rule
    pub updated_group_count: usize,
    /// Rules authorized across all groups
    pub authorized_rule_count: usize,
    pub failures: Vec<Failure>,
}

impl ApplySummary {
    /// Check if every mutation succeeded
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Check if the run changed anything remotely
    pub fn has_changes(&self) -> bool {
        self.new_group_count > 0 || self.authorized_rule_count > 0
    }

    pub(crate) fn fail(&mut self, entity: impl Into<String>, error: impl Into<String>) {
        self.failures.push(Failure {
            entity: entity.into(),
            error: error.into(),
        });
    }
}
