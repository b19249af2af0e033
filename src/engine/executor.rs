//! Execution engine - dirsync executor with UI integration

use anyhow::Result;
use colored::Colorize;
use converge::{
    ApplyContext, ApplyResult, ExecuteOptions, ExecuteSummary, ExecutionPlan, compute_diffs,
};

use crate::progress::{BarProgress, PromptConfirm};

use super::differ::display_plan;

/// Plan, show, confirm and apply
pub fn run(
    plan: &ExecutionPlan,
    ctx: &ApplyContext,
    opts: &ExecuteOptions,
    yes: bool,
    quiet: bool,
) -> Result<ExecuteSummary> {
    let report = compute_diffs(plan, ctx);
    display_plan(&report);

    let progress = BarProgress::new(quiet);
    let mut confirm = PromptConfirm { yes };
    let summary = converge::execute(plan, &report, ctx, opts, &progress, &mut confirm)?;

    if opts.dry_run {
        println!();
        println!("  {} Dry run - no changes made", "ℹ".blue());
    } else if summary.total() > 0 {
        print_summary(&summary);
    }
    Ok(summary)
}

/// Print final summary
fn print_summary(summary: &ExecuteSummary) {
    println!();
    if summary.is_success() {
        println!("  {} Directory converged", "✓".green().bold());
    } else {
        println!("  {} Applied with errors", "⚠".yellow().bold());
    }

    if summary.created > 0 {
        println!("    • {} resources created", summary.created);
    }
    if summary.modified > 0 {
        println!("    • {} resources modified", summary.modified);
    }
    if summary.removed > 0 {
        println!("    • {} resources removed", summary.removed);
    }
    if summary.skipped > 0 {
        println!("    • {} resources skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "resources".red());
    }

    let created: Vec<_> = summary.created_ids().collect();
    if !created.is_empty() {
        println!();
        println!("  {} Record these object IDs in your config:", "→".cyan());
        for (address, id) in created {
            println!("    {address:<30} id = \"{id}\"");
        }
    }

    for outcome in summary.failures() {
        if let ApplyResult::Failed { error, advice } = &outcome.result {
            println!();
            println!("  {} {}", "✗".red(), outcome.address.bold());
            println!("    {error}");
            println!("    {}", advice.dimmed());
        }
    }
}
