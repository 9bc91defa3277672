//! # secgroups
//!
//! Declarative security groups: describe groups and their ingress rules in
//! a document, compare them with what exists remotely, and authorize what is
//! missing.
//!
//! - [`rule`] - the rule grammar (`tcp port 80, 443 0.0.0.0/0`)
//! - [`desired`] - documents and the desired topology
//! - [`remote`] - normalized remote state
//! - [`plan`] - reference resolution and diffing
//! - [`executor`] - ordered, concurrent application of a plan
//! - [`session`] - the entry point tying them together
//!
//! Reconciliation is additive: rules present remotely but absent from the
//! document are left alone.

#![warn(clippy::all)]

pub mod context;
pub mod desired;
pub mod error;
pub mod executor;
pub mod plan;
pub mod remote;
pub mod rule;
pub mod session;
pub mod types;

pub use context::{LogProgress, NoProgress, ProgressCallback};
pub use desired::{DEFAULT_DESCRIPTION, DesiredState, Document, DocumentFormat, GroupSpec};
pub use error::{Error, Result};
pub use executor::apply;
pub use plan::{GroupCreate, GroupUpdate, ReconciliationPlan, filter_existing_rules, plan};
pub use remote::{RemoteGroup, RemoteSnapshot};
pub use rule::{
    Cidr, GrammarError, GroupHandle, GroupRef, PortRange, Protocol, ResolvedRule, ResolvedTarget,
    Rule, RuleLine, Target,
};
pub use session::{ReconciliationSession, configure};
pub use types::{ApplySummary, ExecuteOptions, Failure, Phase, StepResult};
