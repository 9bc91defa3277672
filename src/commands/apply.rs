use anyhow::{Context as AnyhowContext, Result, bail};
use netkit::Scope;
use secgroups::RemoteSnapshot;

use crate::Context;
use crate::cli::ApplyArgs;
use crate::engine::{self, RunOptions};

pub fn run(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let desired = super::load_desired(&args.file)?;
    let client = ctx.settings.client()?;

    let remote = RemoteSnapshot::load(&client, &Scope::All)
        .context("Could not list remote security groups")?;
    let plan = secgroups::plan(&desired, &remote)?;

    let opts = RunOptions {
        dry_run: args.dry_run,
        jobs: args.jobs.unwrap_or(ctx.settings.apply.jobs),
        yes: args.yes,
        quiet: ctx.quiet,
    };

    let Some(summary) = engine::execute(&desired, &plan, &client, &opts)? else {
        return Ok(());
    };

    if !summary.is_success() {
        bail!(
            "{} of the planned changes failed; run apply again once the cause is fixed",
            summary.failures.len()
        );
    }
    Ok(())
}
