//! Execution engine - applies planned changes with parallelism and per-entity locks

use crate::context::{ApplyContext, ConfirmCallback, ProgressCallback};
use crate::diff::{DiffReport, ResourceDiff};
use crate::planner::ExecutionPlan;
use crate::resource::Resource;
use crate::types::{Action, ApplyResult, Change, ExecuteOptions, ExecuteSummary};
use anyhow::{Result, bail};
use rayon::prelude::*;
use std::sync::{Arc, Mutex};

/// Execute the changes of a planned run
///
/// # Arguments
/// * `plan` - The resources, as planned
/// * `report` - Diffs computed from `plan` by [`crate::compute_diffs`]
/// * `ctx` - Client, caller, locks and cancellation flag
/// * `opts` - Execution options (dry_run, jobs, verbose)
/// * `progress` - Progress callback
/// * `confirm` - Confirmation callback
///
/// # Returns
/// Summary of execution results. A failing resource does not stop the
/// others; its error is recorded in the summary.
pub fn execute<P, C>(
    plan: &ExecutionPlan,
    report: &DiffReport,
    ctx: &ApplyContext,
    opts: &ExecuteOptions,
    progress: &P,
    confirm: &mut C,
) -> Result<ExecuteSummary>
where
    P: ProgressCallback,
    C: ConfirmCallback,
{
    if report.has_errors() {
        bail!(
            "{} resource(s) failed to plan; nothing was applied",
            report.errors.len()
        );
    }

    let changes: Vec<&ResourceDiff> = report.changes().collect();
    if changes.is_empty() {
        return Ok(ExecuteSummary::default());
    }

    if opts.dry_run {
        let mut summary = ExecuteSummary::default();
        for diff in &changes {
            summary.add_result(
                &diff.address,
                ApplyResult::Skipped {
                    reason: "Dry run".into(),
                },
            );
        }
        return Ok(summary);
    }

    // Confirm before proceeding
    if !confirm.confirm("Apply changes?")? {
        let mut summary = ExecuteSummary::default();
        for diff in &changes {
            summary.add_result(
                &diff.address,
                ApplyResult::Skipped {
                    reason: "Declined".into(),
                },
            );
        }
        return Ok(summary);
    }

    let mut work = Vec::with_capacity(changes.len());
    for diff in changes {
        let Some(resource) = plan.resources.get(diff.index) else {
            bail!("diff for {} does not belong to this plan", diff.address);
        };
        work.push((resource.as_ref(), diff));
    }

    progress.on_batch_start(work.len());
    let results = if opts.jobs <= 1 || work.len() == 1 {
        execute_sequential(&work, ctx, opts.verbose, progress)
    } else {
        execute_parallel(&work, ctx, opts.jobs, opts.verbose, progress)?
    };
    progress.on_batch_complete();

    let mut summary = ExecuteSummary::default();
    for (address, result) in results {
        summary.add_result(&address, result);
    }
    Ok(summary)
}

type Work<'a> = (&'a dyn Resource, &'a ResourceDiff);

fn execute_sequential<P: ProgressCallback>(
    work: &[Work<'_>],
    ctx: &ApplyContext,
    verbose: bool,
    progress: &P,
) -> Vec<(String, ApplyResult)> {
    work.iter()
        .map(|(resource, diff)| {
            progress.on_resource_start(&diff.address, &diff.description);
            let result = apply_resource(*resource, diff, ctx, verbose);
            progress.on_resource_complete(&diff.address, &result);
            (diff.address.clone(), result)
        })
        .collect()
}

/// Execute resources in parallel using rayon
fn execute_parallel<P: ProgressCallback>(
    work: &[Work<'_>],
    ctx: &ApplyContext,
    jobs: usize,
    verbose: bool,
    progress: &P,
) -> Result<Vec<(String, ApplyResult)>> {
    let results: Arc<Mutex<Vec<(String, ApplyResult)>>> = Arc::new(Mutex::new(Vec::new()));

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create thread pool: {}", e))?;

    pool.install(|| {
        work.par_iter().for_each(|(resource, diff)| {
            progress.on_resource_start(&diff.address, &diff.description);
            let result = apply_resource(*resource, diff, ctx, verbose);
            progress.on_resource_complete(&diff.address, &result);
            let mut guard = match results.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.push((diff.address.clone(), result));
        });
    });

    let results = Arc::try_unwrap(results)
        .map_err(|_| anyhow::anyhow!("Failed to unwrap results"))?;
    Ok(match results.into_inner() {
        Ok(results) => results,
        Err(poisoned) => poisoned.into_inner(),
    })
}

/// Apply a single planned change
fn apply_resource(resource: &dyn Resource, diff: &ResourceDiff, ctx: &ApplyContext, verbose: bool) -> ApplyResult {
    if ctx.cancel.is_cancelled() {
        return ApplyResult::Skipped {
            reason: "Cancelled".into(),
        };
    }
    let outcome = match (&diff.action, diff.id.as_deref()) {
        (Action::None, _) => Ok(ApplyResult::NoChange),
        (Action::Create, _) => resource.create(ctx).map(|id| {
            confirm_converged(resource, ctx, &id, verbose);
            ApplyResult::Created { id }
        }),
        (Action::Update(changes), Some(id)) => {
            let _lock = ctx.locks.acquire(diff.kind, id);
            resource.update(ctx, id, changes).map(|()| {
                confirm_converged(resource, ctx, id, verbose);
                ApplyResult::Modified
            })
        }
        (Action::Delete, Some(id)) => {
            let _lock = ctx.locks.acquire(diff.kind, id);
            resource.delete(ctx, id).map(|()| ApplyResult::Removed)
        }
        (Action::Update(_) | Action::Delete, None) => Ok(ApplyResult::Skipped {
            reason: "No object ID".into(),
        }),
    };

    match outcome {
        Ok(result) => {
            if verbose {
                log::info!("{}: {result:?}", diff.address);
            } else {
                log::debug!("{}: {result:?}", diff.address);
            }
            result
        }
        Err(e) => {
            log::error!("{}: {e}", diff.address);
            ApplyResult::Failed {
                error: e.to_string(),
                advice: e.category().advice().to_string(),
            }
        }
    }
}

/// Re-read an applied entity and warn about anything still differing.
fn confirm_converged(resource: &dyn Resource, ctx: &ApplyContext, id: &str, verbose: bool) {
    match resource.changes(ctx, id) {
        Ok(Some(changes)) => {
            for message in drift_messages(&resource.address(), &changes, verbose) {
                log::warn!("{message}");
            }
        }
        Ok(None) => log::warn!("{} is not readable yet", resource.address()),
        Err(e) => log::warn!("could not re-read {}: {e}", resource.address()),
    }
}

/// Warnings for fields that still differ after an apply.
///
/// Verbose runs get one line per change with both values; otherwise the
/// differing fields are listed on a single line.
fn drift_messages(address: &str, changes: &[Change], verbose: bool) -> Vec<String> {
    if changes.is_empty() {
        return Vec::new();
    }
    if verbose {
        return changes
            .iter()
            .map(|change| format!("{address} has not converged: {change}"))
            .collect();
    }
    let fields: Vec<&str> = changes.iter().map(|change| change.field.as_str()).collect();
    vec![format!(
        "{address} has not converged on {}; run with -v for details",
        fields.join(", ")
    )]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{AutoConfirm, AutoDecline, NoProgress};
    use crate::diff::compute_diffs;
    use crate::testing::{TestGroup, context};
    use graphkit::{EntityKind, Group};

    fn plan_of(resources: Vec<TestGroup>) -> ExecutionPlan {
        let mut plan = ExecutionPlan::new();
        for resource in resources {
            plan.add_resource(Box::new(resource));
        }
        plan
    }

    #[test]
    fn test_execute_empty_plan() {
        let (_mock, ctx) = context();
        let plan = ExecutionPlan::new();
        let report = compute_diffs(&plan, &ctx);
        let result = execute(
            &plan,
            &report,
            &ctx,
            &ExecuteOptions::default(),
            &NoProgress,
            &mut AutoConfirm,
        )
        .unwrap();

        assert_eq!(result.total(), 0);
    }

    #[test]
    fn test_execute_creates_in_parallel() {
        let (mock, ctx) = context();
        let plan = plan_of(vec![
            TestGroup::new("a", "A"),
            TestGroup::new("b", "B"),
            TestGroup::new("c", "C"),
        ]);
        let report = compute_diffs(&plan, &ctx);
        let summary = execute(
            &plan,
            &report,
            &ctx,
            &ExecuteOptions::default(),
            &NoProgress,
            &mut AutoConfirm,
        )
        .unwrap();

        assert_eq!(summary.created, 3);
        assert_eq!(summary.created_ids().count(), 3);
        for (_, id) in summary.created_ids() {
            assert!(mock.object(EntityKind::Group, id).is_some());
        }
    }

    #[test]
    fn test_execute_update_and_delete() {
        let (mock, ctx) = context();
        let keep = mock.insert(&Group {
            display_name: Some("Old".into()),
            ..Group::default()
        });
        let drop = mock.insert(&Group::default());

        let plan = plan_of(vec![
            TestGroup::new("keep", "New").with_id(&keep),
            TestGroup::new("drop", "Drop").with_id(&drop).absent(),
        ]);
        let report = compute_diffs(&plan, &ctx);
        let summary = execute(
            &plan,
            &report,
            &ctx,
            &ExecuteOptions { jobs: 1, ..ExecuteOptions::default() },
            &NoProgress,
            &mut AutoConfirm,
        )
        .unwrap();

        assert_eq!(summary.modified, 1);
        assert_eq!(summary.removed, 1);
        assert_eq!(mock.object(EntityKind::Group, &keep).unwrap()["displayName"], "New");
        assert!(mock.object(EntityKind::Group, &drop).is_none());
        assert!(!ctx.locks.is_held(EntityKind::Group, &keep));
    }

    #[test]
    fn test_execute_failure_does_not_stop_others() {
        let (mock, ctx) = context();
        let gone = mock.insert(&Group::default());
        let plan = plan_of(vec![
            TestGroup::new("gone", "Gone").with_id(&gone).absent(),
            TestGroup::new("new", "New"),
        ]);
        let report = compute_diffs(&plan, &ctx);
        // deleted behind our back between plan and apply
        graphkit::Backend::delete(&mock, EntityKind::Group, &gone).unwrap();

        let summary = execute(
            &plan,
            &report,
            &ctx,
            &ExecuteOptions { jobs: 1, ..ExecuteOptions::default() },
            &NoProgress,
            &mut AutoConfirm,
        )
        .unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.created, 1);
        let failure = summary.failures().next().unwrap();
        assert_eq!(failure.address, "group.gone");
        assert!(matches!(&failure.result, ApplyResult::Failed { error, .. } if error.contains("not found")));
    }

    #[test]
    fn test_execute_declined() {
        let (mock, ctx) = context();
        let plan = plan_of(vec![TestGroup::new("a", "A")]);
        let report = compute_diffs(&plan, &ctx);
        let summary = execute(
            &plan,
            &report,
            &ctx,
            &ExecuteOptions::default(),
            &NoProgress,
            &mut AutoDecline,
        )
        .unwrap();

        assert_eq!(summary.skipped, 1);
        assert!(mock.writes().is_empty());
    }

    #[test]
    fn test_execute_dry_run() {
        let (mock, ctx) = context();
        let plan = plan_of(vec![TestGroup::new("a", "A")]);
        let report = compute_diffs(&plan, &ctx);
        let summary = execute(
            &plan,
            &report,
            &ctx,
            &ExecuteOptions { dry_run: true, ..ExecuteOptions::default() },
            &NoProgress,
            &mut AutoConfirm,
        )
        .unwrap();

        assert_eq!(summary.skipped, 1);
        assert!(mock.writes().is_empty());
    }

    #[test]
    fn test_execute_refuses_plan_errors() {
        let (mock, ctx) = context();
        mock.insert(&Group {
            display_name: Some("Taken".into()),
            ..Group::default()
        });
        let plan = plan_of(vec![TestGroup::new("dup", "Taken").guarded()]);
        let report = compute_diffs(&plan, &ctx);
        mock.clear_calls();

        let result = execute(
            &plan,
            &report,
            &ctx,
            &ExecuteOptions::default(),
            &NoProgress,
            &mut AutoConfirm,
        );
        assert!(result.is_err());
        assert!(mock.writes().is_empty());
    }

    #[test]
    fn test_execute_after_cancel_starts_nothing() {
        let (mock, ctx) = context();
        let plan = plan_of(vec![TestGroup::new("a", "A"), TestGroup::new("b", "B")]);
        let report = compute_diffs(&plan, &ctx);
        ctx.cancel.cancel();

        let summary = execute(
            &plan,
            &report,
            &ctx,
            &ExecuteOptions::default(),
            &NoProgress,
            &mut AutoConfirm,
        )
        .unwrap();

        assert_eq!(summary.skipped, 2);
        assert!(mock.writes().is_empty());
    }

    #[test]
    fn test_drift_messages() {
        let changes = vec![
            Change::new("display_name", "\"A\"", "\"B\""),
            Change::new("members", "[]", "[\"u1\"]"),
        ];
        assert!(drift_messages("group.a", &[], true).is_empty());

        let terse = drift_messages("group.a", &changes, false);
        assert_eq!(
            terse,
            vec!["group.a has not converged on display_name, members; run with -v for details".to_string()]
        );

        let detailed = drift_messages("group.a", &changes, true);
        assert_eq!(detailed.len(), 2);
        assert!(detailed[0].starts_with("group.a has not converged: "));
        assert!(detailed[0].contains("\"B\""));
    }

    #[test]
    fn test_execute_verbose_applies_the_same_changes() {
        let (mock, ctx) = context();
        let plan = plan_of(vec![TestGroup::new("a", "A"), TestGroup::new("b", "B")]);
        let report = compute_diffs(&plan, &ctx);
        let summary = execute(
            &plan,
            &report,
            &ctx,
            &ExecuteOptions {
                verbose: true,
                ..ExecuteOptions::default()
            },
            &NoProgress,
            &mut AutoConfirm,
        )
        .unwrap();

        assert_eq!(summary.created, 2);
        assert_eq!(mock.writes().len(), 2);
    }
}
