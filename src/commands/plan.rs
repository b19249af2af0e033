use anyhow::{Result, bail};
use converge::compute_diffs;

use crate::Context;
use crate::engine::differ::display_plan;
use crate::ui;

pub fn run(ctx: &Context, target: Option<&str>) -> Result<()> {
    let (plan, apply_ctx) = super::open(ctx, target)?;
    if plan.is_empty() {
        ui::warn("No resources match");
        return Ok(());
    }

    if !ctx.quiet {
        ui::header("Plan");
        super::print_context(ctx, &apply_ctx, &plan)?;
    }
    let report = compute_diffs(&plan, &apply_ctx);
    display_plan(&report);

    if report.has_errors() {
        bail!("{} resource(s) failed to plan", report.errors.len());
    }
    if report.summary().has_changes() && !ctx.quiet {
        println!();
        ui::info("Run `dirsync apply` to make these changes");
    }
    Ok(())
}
