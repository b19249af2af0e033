//! # Converge
//!
//! Declarative reconciliation of directory entities.
//!
//! This crate provides the building blocks for bringing remote directory
//! objects to a configured state, and the machinery to plan and apply a set
//! of them.
//!
//! ## Core Concepts
//!
//! - **difference**: ordered set difference used for every relation diff
//! - **relation**: owners/members reconciliation with lock-out safe ordering
//!   and the provisional-owner bootstrap for new entities
//! - **collection**: two-call disable-then-replace for app roles and
//!   permission scopes
//! - **guard**: duplicate display-name check, run at plan and apply time
//! - **Resource**: the per-entity lifecycle (validate, check, changes,
//!   create, update, delete)
//! - **ExecutionPlan** / **compute_diffs** / **execute**: plan every
//!   resource, then apply the changes in parallel with per-entity locks
//!
//! ## Example
//!
//! ```ignore
//! use converge::{ApplyContext, AutoConfirm, ExecuteOptions, ExecutionPlan, NoProgress};
//!
//! let ctx = ApplyContext::new(client).with_caller(caller_id);
//! let mut plan = ExecutionPlan::new();
//! plan.add_resource(Box::new(group_resource));
//!
//! let report = converge::compute_diffs(&plan, &ctx);
//! let summary = converge::execute(
//!     &plan,
//!     &report,
//!     &ctx,
//!     &ExecuteOptions::default(),
//!     &NoProgress,
//!     &mut AutoConfirm,
//! )?;
//! ```
//!
//! ## Callback Traits
//!
//! - [`ProgressCallback`]: Receives progress updates
//! - [`ConfirmCallback`]: Handles user confirmations
//!
//! This allows the crate to be used without hard dependencies on a
//! specific UI framework.

pub mod collection;
pub mod context;
pub mod diff;
pub mod difference;
pub mod executor;
pub mod guard;
pub mod journal;
pub mod lock;
pub mod planner;
pub mod relation;
pub mod resource;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export main types at crate root
pub use collection::{
    AppRoles, NestedCollection, PermissionScopes, ReplaceOutcome, Toggle, replace_collection, retired_ids,
};
pub use context::{ApplyContext, AutoConfirm, AutoDecline, ConfirmCallback, NoProgress, ProgressCallback};
pub use diff::{DiffReport, DiffSummary, PlanError, ResourceDiff, compute_diffs, group_by_kind};
pub use difference::{contains_ignore_case, difference, difference_ignore_case};
pub use executor::execute;
pub use guard::{ensure_unique, find_by_name, odata_filter, renamed_to};
pub use journal::{Cancellation, Journal};
pub use lock::{LockGuard, LockRegistry};
pub use planner::{ExecutionPlan, plan_resource};
pub use relation::{
    OwnerBootstrap, RelationDelta, RelationOutcome, StepOrder, add_to_relation, reconcile_relation,
    remove_from_relation,
};
pub use resource::{BoxedResource, Resource};
pub use types::{
    Action, ApplyResult, Change, ChangeSet, Ensure, ExecuteOptions, ExecuteSummary, ResourceOutcome,
};
