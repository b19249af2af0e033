pub mod apply;
pub mod plan;
pub mod show;

use anyhow::Result;
use converge::{ApplyContext, ExecutionPlan};
use graphkit::Client;

use crate::Context;
use crate::config::{self, DirsyncConfig, ProviderConfig};
use crate::engine;
use crate::ui;

/// Load the configuration and connect to the directory
fn open(ctx: &Context, target: Option<&str>) -> Result<(ExecutionPlan, ApplyContext)> {
    let config = DirsyncConfig::load(ctx.config.as_deref())?;
    log::info!("loaded {} resource(s)", config.resource_count());
    let client = config.provider.client()?;
    let apply_ctx = apply_context(&config.provider, client);
    let plan = engine::build_plan(config.into_plan(), target);
    Ok((plan, apply_ctx))
}

/// Show where the run reads from and acts as
fn print_context(ctx: &Context, apply_ctx: &ApplyContext, plan: &ExecutionPlan) -> Result<()> {
    let path = config::config_path(ctx.config.as_deref())?;
    ui::kv("Config", &path.display().to_string());
    ui::kv("Caller", apply_ctx.caller().unwrap_or("(not set)"));
    ui::kv("Resources", &ui::plural(plan.total_resources(), "resource"));
    Ok(())
}

/// Context for lifecycle calls, acting as the configured caller
fn apply_context(provider: &ProviderConfig, client: Client) -> ApplyContext {
    let apply_ctx = ApplyContext::new(client);
    match &provider.caller_object_id {
        Some(caller) => apply_ctx.with_caller(caller.clone()),
        None => {
            log::warn!(
                "provider.caller_object_id is not set; new objects are created without a provisional owner"
            );
            apply_ctx
        }
    }
}
