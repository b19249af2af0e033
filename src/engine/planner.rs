//! Execution planner - dirsync-specific extensions

use converge::{
    ApplyContext, BoxedResource, Change, Ensure, ExecutionPlan, Resource,
};
use graphkit::{EntityKind, Result};
use std::fmt;

/// Build the plan for a run, keeping only resources matching `target`
pub fn build_plan(plan: ExecutionPlan, target: Option<&str>) -> ExecutionPlan {
    let total = plan.total_resources();
    let plan = plan.filter_by_target(target);
    if let Some(target) = target {
        log::debug!(
            "target {target} selects {} of {total} resources",
            plan.total_resources()
        );
    }
    plan
}

/// Turn a plan into one that removes every managed entity
///
/// Resources are reversed so dependents (service principals, policies)
/// come before what they refer to.
pub fn teardown(plan: ExecutionPlan) -> ExecutionPlan {
    let mut teardown = ExecutionPlan::new();
    for resource in plan.resources.into_iter().rev() {
        teardown.add_resource(Box::new(Teardown(resource)));
    }
    teardown
}

/// A resource whose desired state is always absent
struct Teardown(BoxedResource);

impl fmt::Debug for Teardown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Teardown").field(&self.0).finish()
    }
}

impl Resource for Teardown {
    fn kind(&self) -> EntityKind {
        self.0.kind()
    }

    fn name(&self) -> &str {
        self.0.name()
    }

    fn id(&self) -> Option<&str> {
        self.0.id()
    }

    fn ensure(&self) -> Ensure {
        Ensure::Absent
    }

    fn description(&self) -> String {
        self.0.description()
    }

    fn validate(&self) -> Result<()> {
        self.0.validate()
    }

    fn changes(&self, ctx: &ApplyContext, id: &str) -> Result<Option<Vec<Change>>> {
        self.0.changes(ctx, id)
    }

    fn create(&self, ctx: &ApplyContext) -> Result<String> {
        self.0.create(ctx)
    }

    fn update(&self, ctx: &ApplyContext, id: &str, changes: &[Change]) -> Result<()> {
        self.0.update(ctx, id, changes)
    }

    fn delete(&self, ctx: &ApplyContext, id: &str) -> Result<()> {
        self.0.delete(ctx, id)
    }
}
