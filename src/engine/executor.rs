//! Apply with confirmation, progress and a final summary

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use netkit::backend::Backend;
use secgroups::{ApplySummary, DesiredState, ExecuteOptions, ReconciliationPlan};

use crate::progress::ApplyProgress;

use super::differ::display_plan;

/// Options for an interactive apply
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Don't make changes, just show what would happen
    pub dry_run: bool,
    /// Number of parallel API calls
    pub jobs: usize,
    /// Skip confirmation prompts
    pub yes: bool,
    /// Hide progress output
    pub quiet: bool,
}

/// Show the plan, confirm, apply, and print the summary
///
/// Returns `None` when there was nothing to do or the user declined.
pub fn execute(
    desired: &DesiredState,
    plan: &ReconciliationPlan,
    backend: &dyn Backend,
    opts: &RunOptions,
) -> Result<Option<ApplySummary>> {
    display_plan(plan);

    if plan.is_empty() {
        return Ok(None);
    }

    if opts.dry_run {
        println!();
        println!("  {} Dry run - no changes made", "ℹ".blue());
        return Ok(None);
    }

    if !opts.yes && !confirm_proceed()? {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok(None);
    }

    let options = ExecuteOptions {
        dry_run: false,
        jobs: opts.jobs.max(1),
        ..Default::default()
    };
    let progress = ApplyProgress::new(opts.quiet);
    let summary = secgroups::apply(desired, plan, backend, &options, &progress)
        .context("Apply stopped")?;

    print_summary(&summary);
    Ok(Some(summary))
}

/// Confirm with user
fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Apply these changes?")
        .default(false)
        .interact()?;

    Ok(confirmed)
}

/// Print final summary
pub fn print_summary(summary: &ApplySummary) {
    println!();
    if summary.is_success() {
        println!("  {} Security groups applied successfully!", "✓".green().bold());
    } else {
        println!("  {} Security groups applied with errors", "⚠".yellow().bold());
    }

    if summary.new_group_count > 0 {
        println!("    • {} created", crate::ui::plural(summary.new_group_count, "group"));
    }
    if summary.updated_group_count > 0 {
        println!("    • {} updated", crate::ui::plural(summary.updated_group_count, "group"));
    }
    if summary.authorized_rule_count > 0 {
        println!(
            "    • {} authorized",
            crate::ui::plural(summary.authorized_rule_count, "rule")
        );
    }
    if !summary.failures.is_empty() {
        println!("    • {} {}", summary.failures.len(), "failed".red());
        for failure in &summary.failures {
            println!("      {} {}: {}", "✗".red(), failure.entity, failure.error.dimmed());
        }
    }
}
