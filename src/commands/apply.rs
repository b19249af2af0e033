use anyhow::{Context as _, Result, bail};
use converge::{ApplyContext, Cancellation, ExecuteOptions};

use crate::Context;
use crate::cli::ApplyArgs;
use crate::engine;
use crate::ui;

/// Make the directory match the configuration
pub fn run(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let (plan, apply_ctx) = super::open(ctx, args.target.as_deref())?;
    execute(ctx, args, plan, apply_ctx, "Apply")
}

/// Delete every configured object
pub fn destroy(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let (plan, apply_ctx) = super::open(ctx, args.target.as_deref())?;
    execute(ctx, args, engine::teardown(plan), apply_ctx, "Destroy")
}

fn execute(
    ctx: &Context,
    args: &ApplyArgs,
    plan: converge::ExecutionPlan,
    apply_ctx: ApplyContext,
    title: &str,
) -> Result<()> {
    if plan.is_empty() {
        ui::warn("No resources match");
        return Ok(());
    }
    if !ctx.quiet {
        ui::header(title);
        super::print_context(ctx, &apply_ctx, &plan)?;
    }
    let apply_ctx = cancel_on_interrupt(apply_ctx)?;

    let opts = ExecuteOptions {
        dry_run: args.dry_run,
        jobs: args.jobs.max(1),
        verbose: ctx.verbose > 0,
    };
    let summary = engine::run(&plan, &apply_ctx, &opts, args.yes, ctx.quiet)?;

    if apply_ctx.cancel.is_cancelled() {
        bail!("Interrupted; {} resource(s) not applied", summary.skipped);
    }
    if !summary.is_success() {
        bail!("{} resource(s) failed", summary.failed);
    }
    Ok(())
}

/// Cancel on the first Ctrl-C; in-flight steps finish and nothing new starts
fn cancel_on_interrupt(apply_ctx: ApplyContext) -> Result<ApplyContext> {
    let cancel = Cancellation::new();
    let handle = cancel.clone();
    ctrlc::set_handler(move || {
        if interrupt(&handle) {
            std::process::exit(130);
        }
    })
    .context("Could not install the Ctrl-C handler")?;
    Ok(apply_ctx.with_cancellation(cancel))
}

/// Record an interrupt. Returns true when one was already pending.
fn interrupt(cancel: &Cancellation) -> bool {
    if cancel.is_cancelled() {
        return true;
    }
    log::warn!("interrupted; waiting for in-flight steps, press Ctrl-C again to exit now");
    cancel.cancel();
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use converge::{Resource, plan_resource};
    use graphkit::{Client, MockBackend};
    use std::sync::Arc;

    use crate::resource::GroupResource;

    #[test]
    fn test_interrupt_cancels_then_exits() {
        let cancel = Cancellation::new();
        assert!(!interrupt(&cancel));
        assert!(cancel.is_cancelled());
        assert!(interrupt(&cancel));
    }

    #[test]
    fn test_interrupt_stops_pending_steps() {
        let mock = MockBackend::new();
        let cancel = Cancellation::new();
        let apply_ctx = ApplyContext::new(Client::with_backend(Arc::new(mock.clone())))
            .with_cancellation(cancel.clone());
        let group: GroupResource = toml::from_str(
            r#"
            name = "eng"
            display_name = "Engineering"
            security_enabled = true
            "#,
        )
        .unwrap();
        assert_eq!(plan_resource(&group, &apply_ctx).unwrap(), converge::Action::Create);

        interrupt(&cancel);
        assert!(group.create(&apply_ctx).is_err());
        assert!(mock.writes().is_empty());
    }
}
