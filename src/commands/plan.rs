use anyhow::{Context as AnyhowContext, Result};
use netkit::Scope;
use netkit::backend::Backend;
use secgroups::RemoteSnapshot;

use crate::Context;
use crate::cli::PlanArgs;
use crate::engine;
use crate::ui;

pub fn run(ctx: &Context, args: &PlanArgs) -> Result<()> {
    let desired = super::load_desired(&args.file)?;
    let client = ctx.settings.client()?;

    let remote = RemoteSnapshot::load(&client, &Scope::All)
        .context("Could not list remote security groups")?;
    let plan = secgroups::plan(&desired, &remote)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    if !ctx.quiet {
        ui::info(&format!(
            "Compared {} against {} on the {} backend",
            ui::plural(desired.groups.len(), "desired group"),
            ui::plural(remote.len(), "remote group"),
            client.name()
        ));
    }
    engine::display_plan(&plan);
    Ok(())
}
