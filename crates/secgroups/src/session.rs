//! Reconciliation session: a desired topology bound to a remote API.
//!
//! ```
//! use netkit::backend::memory::MemoryBackend;
//! use secgroups::{DesiredState, Document, DocumentFormat, configure};
//!
//! let document = Document::from_str_with_format(
//!     "web:\n  options:\n    rules:\n      - \"tcp port 80 0.0.0.0/0\"\n",
//!     DocumentFormat::Yaml,
//! )
//! .unwrap();
//! let desired = DesiredState::load(&document).unwrap();
//!
//! let mut session = configure(desired, MemoryBackend::new()).unwrap();
//! let summary = session.apply().unwrap();
//! assert_eq!(summary.new_group_count, 1);
//!
//! session.apply().unwrap();
//! assert_eq!(session.new_group_count(), 0);
//! ```

use crate::context::{NoProgress, ProgressCallback};
use crate::desired::DesiredState;
use crate::error::Result;
use crate::executor;
use crate::plan::{self, ReconciliationPlan, Resolver};
use crate::remote::{RemoteGroup, RemoteSnapshot};
use crate::rule::{ResolvedRule, Rule};
use crate::types::{ApplySummary, ExecuteOptions};
use netkit::backend::Backend;

/// Bind a desired topology to a backend and load the remote state.
pub fn configure<B: Backend>(desired: DesiredState, backend: B) -> Result<ReconciliationSession<B>> {
    ReconciliationSession::new(desired, backend, ExecuteOptions::default())
}

/// A desired topology, a backend and the latest remote snapshot.
pub struct ReconciliationSession<B: Backend> {
    desired: DesiredState,
    backend: B,
    options: ExecuteOptions,
    remote: RemoteSnapshot,
    last: ApplySummary,
}

impl<B: Backend> ReconciliationSession<B> {
    /// Create a session with explicit options and load the remote state.
    pub fn new(desired: DesiredState, backend: B, options: ExecuteOptions) -> Result<Self> {
        let mut session = Self {
            desired,
            backend,
            options,
            remote: RemoteSnapshot::default(),
            last: ApplySummary::default(),
        };
        session.reload_remote_groups()?;
        Ok(session)
    }

    /// Replace the execution options.
    pub fn with_options(mut self, options: ExecuteOptions) -> Self {
        self.options = options;
        self
    }

    /// Fetch the remote state again, replacing the current snapshot.
    pub fn reload_remote_groups(&mut self) -> Result<()> {
        self.remote = RemoteSnapshot::load(&self.backend, &self.options.scope)?;
        Ok(())
    }

    /// Compute the plan against the current snapshot.
    pub fn plan(&self) -> Result<ReconciliationPlan> {
        plan::plan(&self.desired, &self.remote)
    }

    /// Plan and apply, then reload the remote state.
    pub fn apply(&mut self) -> Result<ApplySummary> {
        self.apply_with_progress(&NoProgress)
    }

    /// Like [`apply`](Self::apply), reporting each step.
    pub fn apply_with_progress<P: ProgressCallback + ?Sized>(
        &mut self,
        progress: &P,
    ) -> Result<ApplySummary> {
        let plan = self.plan()?;
        let summary = executor::apply(&self.desired, &plan, &self.backend, &self.options, progress)?;
        if summary.has_changes() {
            self.reload_remote_groups()?;
        }
        self.last = summary.clone();
        Ok(summary)
    }

    /// Resolve `rules` as if owned by `remote_group` and drop those it
    /// already holds.
    pub fn filter_existing_rules(
        &self,
        rules: &[Rule],
        remote_group: &RemoteGroup,
    ) -> Result<Vec<ResolvedRule>> {
        let resolver = Resolver::new(&self.desired, &self.remote);
        let resolved = rules
            .iter()
            .map(|rule| resolver.resolve(rule, &remote_group.name, remote_group.vpc.as_deref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(plan::filter_existing_rules(&resolved, Some(remote_group)))
    }

    /// Groups created by the last apply.
    pub fn new_group_count(&self) -> usize {
        self.last.new_group_count
    }

    /// Pre-existing groups that received rules in the last apply.
    pub fn updated_group_count(&self) -> usize {
        self.last.updated_group_count
    }

    pub fn last_summary(&self) -> &ApplySummary {
        &self.last
    }

    pub fn desired(&self) -> &DesiredState {
        &self.desired
    }

    pub fn remote(&self) -> &RemoteSnapshot {
        &self.remote
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desired::{Document, DocumentFormat};
    use netkit::backend::memory::MemoryBackend;
    use netkit::Grant;

    const SAMPLE: &str = r#"
web_server:
  description: public web tier
  options:
    rules:
      - "tcp port 80, 443 0.0.0.0/0"
      - "tcp port 22 10.0.0.1/32"
app:
  options:
    rules:
      - "tcp port 8080 web_server"
      - "udp port 8125 10.0.0.0/8"
"#;

    fn desired(yaml: &str) -> DesiredState {
        DesiredState::load(&Document::from_str_with_format(yaml, DocumentFormat::Yaml).unwrap())
            .unwrap()
    }

    fn session(yaml: &str, backend: &MemoryBackend) -> ReconciliationSession<MemoryBackend> {
        configure(desired(yaml), backend.clone()).unwrap()
    }

    #[test]
    fn test_creation_no_existing_groups() {
        let backend = MemoryBackend::new();
        let mut session = session(SAMPLE, &backend);

        session.apply().unwrap();
        assert_eq!(session.updated_group_count(), 0);
        assert!(session.new_group_count() > 0);

        session.apply().unwrap();
        assert_eq!(session.new_group_count(), 0);
        assert_eq!(session.updated_group_count(), 0);
    }

    #[test]
    fn test_apply_then_plan_is_empty() {
        let backend = MemoryBackend::new();
        let mut session = session(SAMPLE, &backend);
        session.apply().unwrap();
        assert!(session.plan().unwrap().is_empty());

        // A fresh session against the same remote agrees
        assert!(session_plan_empty(SAMPLE, &backend));
    }

    fn session_plan_empty(yaml: &str, backend: &MemoryBackend) -> bool {
        session(yaml, backend).plan().unwrap().is_empty()
    }

    #[test]
    fn test_no_description() {
        let backend = MemoryBackend::new();
        let mut session = session("test_no_description:\n  options: {}\n", &backend);
        session.apply().unwrap();

        assert!(session.new_group_count() > 0);
        let group = backend.group_named("test_no_description").unwrap();
        assert_eq!(group.description, crate::DEFAULT_DESCRIPTION);
    }

    #[test]
    fn test_vpc() {
        let backend = MemoryBackend::new();
        let mut session = session("test_vpc:\n  options:\n    vpc: vpc_id123\n", &backend);
        session.apply().unwrap();

        assert!(session.new_group_count() > 0);
        assert_eq!(backend.groups()[0].vpc_id.as_deref(), Some("vpc_id123"));
    }

    #[test]
    fn test_new_rule_updates_existing_group() {
        let backend = MemoryBackend::new();
        session(SAMPLE, &backend).apply().unwrap();

        let grown = SAMPLE.replace("10.0.0.1/32\"", "10.0.0.1/32\"\n      - \"tcp port 8443 0.0.0.0/0\"");
        let mut session = session(&grown, &backend);
        let summary = session.apply().unwrap();
        assert_eq!(summary.new_group_count, 0);
        assert_eq!(summary.updated_group_count, 1);
        assert_eq!(summary.authorized_rule_count, 1);
    }

    /// Remote fixture: test_group holds tcp/22 from 192.168.1.1 and
    /// tcp/100-110 from test_group2.
    fn existing_groups() -> (MemoryBackend, String) {
        let backend = MemoryBackend::new();
        let sg = backend
            .create_group("test_group", "first group", None)
            .unwrap();
        let sg2 = backend
            .create_group("test_group2", "second group", None)
            .unwrap();
        backend
            .authorize(&sg, "tcp", 22, 22, &Grant::Cidr("192.168.1.1/32".into()))
            .unwrap();
        backend
            .authorize(&sg, "tcp", 100, 110, &Grant::SourceGroup(sg2))
            .unwrap();
        (backend, sg)
    }

    fn filter(session: &ReconciliationSession<MemoryBackend>, sg: &str, line: &str) -> usize {
        let rules = Rule::parse(line).unwrap();
        let group = session.remote().get(sg).unwrap();
        session.filter_existing_rules(&rules, group).unwrap().len()
    }

    #[test]
    fn test_remove_duplicate() {
        let (backend, sg) = existing_groups();
        let session = configure(DesiredState::default(), backend).unwrap();
        assert_eq!(filter(&session, &sg, "tcp port 22 192.168.1.1"), 0);
        assert_eq!(filter(&session, &sg, "tcp port 100-110 test_group2"), 0);
    }

    #[test]
    fn test_make_sure_wrong_group_isnt_removed() {
        let (backend, sg) = existing_groups();
        let mut session = configure(DesiredState::default(), backend.clone()).unwrap();
        backend
            .create_group("test_group3", "third group", None)
            .unwrap();
        session.reload_remote_groups().unwrap();
        assert_eq!(filter(&session, &sg, "tcp port 100-110 test_group3"), 1);
    }

    #[test]
    fn test_leave_different_ip() {
        let (backend, sg) = existing_groups();
        let session = configure(DesiredState::default(), backend).unwrap();
        assert_eq!(filter(&session, &sg, "tcp port 22 192.168.1.2"), 1);
    }

    #[test]
    fn test_leave_different_protocol() {
        let (backend, sg) = existing_groups();
        let session = configure(DesiredState::default(), backend).unwrap();
        assert_eq!(filter(&session, &sg, "udp port 22 192.168.1.1"), 1);
    }

    #[test]
    fn test_unresolved_reference_fails_before_mutation() {
        let backend = MemoryBackend::new();
        let mut session = session(
            "app:\n  options:\n    rules:\n      - \"tcp port 80 nowhere\"\nweb: {}\n",
            &backend,
        );
        let err = session.apply().unwrap_err();
        assert!(err.is_pre_mutation());
        assert!(backend.groups().is_empty());
    }
}
