//! Execution engine - creates groups, then authorizes rules
//!
//! Creation runs first so that rules referencing a new group can be
//! authorized with its real id. Between the two phases the remote state is
//! reloaded and the plan recomputed. Rules on one group are authorized in
//! order by a single worker; different groups proceed in parallel.

use crate::context::ProgressCallback;
use crate::desired::DesiredState;
use crate::error::{Error, Result};
use crate::plan::{GroupCreate, GroupUpdate, ReconciliationPlan, plan as compute_plan};
use crate::remote::RemoteSnapshot;
use crate::rule::{GroupHandle, ResolvedRule, ResolvedTarget};
use crate::types::{ApplySummary, ExecuteOptions, Failure, Phase, StepResult};
use netkit::backend::Backend;
use rayon::prelude::*;
use std::collections::HashSet;

/// Apply a plan against a backend
///
/// # Arguments
/// * `desired` - Desired topology the plan was computed from
/// * `plan` - Plan to apply
/// * `backend` - Remote API
/// * `options` - Execution options (dry_run, jobs, scope)
/// * `progress` - Progress callback
///
/// # Returns
/// Summary of the run. Per-entity API failures are listed in it; an `Err`
/// means the run stopped (remote state could not be reloaded, or the
/// recomputed plan no longer resolves).
pub fn apply<P: ProgressCallback + ?Sized>(
    desired: &DesiredState,
    plan: &ReconciliationPlan,
    backend: &dyn Backend,
    options: &ExecuteOptions,
    progress: &P,
) -> Result<ApplySummary> {
    if plan.is_empty() {
        log::debug!("Nothing to apply");
        return Ok(ApplySummary::default());
    }
    if options.dry_run {
        log::info!(
            "Dry run: skipping {} group creations and {} rule authorizations",
            plan.creates.len(),
            plan.rule_count()
        );
        return Ok(ApplySummary::default());
    }

    let workers = Workers::new(options.jobs)?;
    let mut summary = ApplySummary::default();

    // Phase 1: create groups
    let mut created: Vec<(&GroupCreate, String)> = Vec::new();
    if !plan.creates.is_empty() {
        progress.on_phase_start(Phase::CreateGroups, plan.creates.len());
        let results = workers.map(&plan.creates, |create| {
            let result = create_group(create, backend);
            progress.on_step_complete(&create.name, &result);
            result
        });
        progress.on_phase_complete(Phase::CreateGroups);

        for (create, result) in plan.creates.iter().zip(results) {
            match result {
                StepResult::Created { id } => created.push((create, id)),
                StepResult::Failed { error } => summary.fail(&create.name, error),
                StepResult::Authorized | StepResult::AlreadyPresent => {}
            }
        }
        summary.new_group_count = created.len();
    }

    // Phase 2: reload and re-plan so pending references get real ids
    let mut remote = RemoteSnapshot::load(backend, &options.scope)?;
    for (create, id) in &created {
        remote.record_created(id, &create.name, &create.description, create.vpc.clone());
    }
    let replanned = compute_plan(desired, &remote)?;
    let created_ids: HashSet<&str> = created.iter().map(|(_, id)| id.as_str()).collect();

    // Phase 3: authorize rules
    if !replanned.updates.is_empty() {
        progress.on_phase_start(Phase::AuthorizeRules, replanned.rule_count());
        let outcomes = workers.map(&replanned.updates, |update| {
            authorize_group(update, backend, progress)
        });
        progress.on_phase_complete(Phase::AuthorizeRules);

        for (update, outcome) in replanned.updates.iter().zip(outcomes) {
            summary.authorized_rule_count += outcome.authorized;
            let is_new = update.handle.id().is_some_and(|id| created_ids.contains(id));
            if outcome.authorized > 0 && !is_new {
                summary.updated_group_count += 1;
            }
            summary.failures.extend(outcome.failures);
        }
    }

    log::debug!(
        "Applied: {} new groups, {} updated groups, {} rules, {} failures",
        summary.new_group_count,
        summary.updated_group_count,
        summary.authorized_rule_count,
        summary.failures.len()
    );
    Ok(summary)
}

fn create_group(create: &GroupCreate, backend: &dyn Backend) -> StepResult {
    match backend.create_group(&create.name, &create.description, create.vpc.as_deref()) {
        Ok(id) => StepResult::Created { id },
        Err(e) if e.is_ignorable() => StepResult::AlreadyPresent,
        Err(e) => StepResult::Failed {
            error: e.to_string(),
        },
    }
}

#[derive(Default)]
struct GroupOutcome {
    authorized: usize,
    failures: Vec<Failure>,
}

/// Authorize one group's rules in order.
fn authorize_group<P: ProgressCallback + ?Sized>(
    update: &GroupUpdate,
    backend: &dyn Backend,
    progress: &P,
) -> GroupOutcome {
    let mut outcome = GroupOutcome::default();

    for rule in &update.rules {
        let entity = format!("{}: {rule}", update.name);
        let result = match update.handle.id() {
            Some(group_id) => authorize_rule(group_id, rule, backend),
            None => StepResult::Failed {
                error: format!("group '{}' was not created", update.name),
            },
        };
        progress.on_step_complete(&entity, &result);

        match result {
            StepResult::Authorized => outcome.authorized += 1,
            StepResult::Failed { error } => outcome.failures.push(Failure { entity, error }),
            StepResult::Created { .. } | StepResult::AlreadyPresent => {}
        }
    }

    outcome
}

fn authorize_rule(group_id: &str, rule: &ResolvedRule, backend: &dyn Backend) -> StepResult {
    let Some(grant) = rule.grant() else {
        let source = match &rule.target {
            ResolvedTarget::Group(GroupHandle::Pending(name)) => name.as_str(),
            _ => "source",
        };
        return StepResult::Failed {
            error: format!("source group '{source}' was not created"),
        };
    };

    match backend.authorize(
        group_id,
        rule.protocol.as_str(),
        rule.ports.from(),
        rule.ports.to(),
        &grant,
    ) {
        Ok(()) => StepResult::Authorized,
        Err(e) if e.is_ignorable() => StepResult::AlreadyPresent,
        Err(e) => StepResult::Failed {
            error: e.to_string(),
        },
    }
}

/// Runs steps sequentially, or on a bounded rayon pool when `jobs > 1`.
struct Workers {
    pool: Option<rayon::ThreadPool>,
}

impl Workers {
    fn new(jobs: usize) -> Result<Self> {
        if jobs <= 1 {
            return Ok(Self { pool: None });
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .map_err(|e| Error::ThreadPool(e.to_string()))?;
        Ok(Self { pool: Some(pool) })
    }

    /// Map over items, keeping input order in the output.
    fn map<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        match &self.pool {
            Some(pool) if items.len() > 1 => pool.install(|| items.par_iter().map(f).collect()),
            _ => items.iter().map(f).collect(),
        }
    }
}
