use anyhow::Result;

use crate::Context;
use crate::cli::ValidateArgs;
use crate::ui;

pub fn run(ctx: &Context, args: &ValidateArgs) -> Result<()> {
    let desired = super::load_desired(&args.file)?;

    if ctx.quiet {
        return Ok(());
    }

    ui::success(&format!(
        "{} is valid: {}, {}",
        args.file.display(),
        ui::plural(desired.groups.len(), "group"),
        ui::plural(desired.rule_count(), "rule")
    ));
    if ctx.verbose > 0 {
        for group in &desired.groups {
            ui::kv(
                &group.name,
                &format!(
                    "{} ({})",
                    ui::plural(group.rules.len(), "rule"),
                    group.vpc.as_deref().unwrap_or("no vpc")
                ),
            );
        }
    }
    Ok(())
}
