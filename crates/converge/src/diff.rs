//! Diff computation for resources

use crate::context::ApplyContext;
use crate::planner::{ExecutionPlan, plan_resource};
use crate::resource::Resource;
use crate::types::{Action, Change};
use graphkit::EntityKind;
use std::collections::BTreeMap;

/// Planned action for one resource
#[derive(Debug, Clone)]
pub struct ResourceDiff {
    /// Position of the resource in the plan
    pub index: usize,
    /// Resource address, e.g. `group.admins`
    pub address: String,
    /// Entity kind
    pub kind: EntityKind,
    /// Human-readable description
    pub description: String,
    /// Object ID, when the entity exists
    pub id: Option<String>,
    /// What will happen
    pub action: Action,
}

impl ResourceDiff {
    /// Plan one resource
    pub fn from_resource(
        index: usize,
        resource: &dyn Resource,
        ctx: &ApplyContext,
    ) -> Result<Self, PlanError> {
        let action = plan_resource(resource, ctx).map_err(|source| PlanError {
            address: resource.address(),
            source,
        })?;
        Ok(Self {
            index,
            address: resource.address(),
            kind: resource.kind(),
            description: resource.description(),
            id: resource.id().map(str::to_string),
            action,
        })
    }

    /// Check if this diff represents an addition
    pub fn is_addition(&self) -> bool {
        matches!(self.action, Action::Create)
    }

    /// Check if this diff represents a removal
    pub fn is_removal(&self) -> bool {
        matches!(self.action, Action::Delete)
    }

    /// Check if this diff represents a modification
    pub fn is_modification(&self) -> bool {
        matches!(self.action, Action::Update(_))
    }

    /// Attribute changes of an update
    pub fn changes(&self) -> &[Change] {
        match &self.action {
            Action::Update(changes) => changes,
            _ => &[],
        }
    }
}

/// A resource that could not be planned
#[derive(Debug, thiserror::Error)]
#[error("{address}: {source}")]
pub struct PlanError {
    /// Resource address
    pub address: String,
    /// Underlying failure
    #[source]
    pub source: graphkit::Error,
}

/// Planned actions and planning failures of a whole plan
#[derive(Debug, Default)]
pub struct DiffReport {
    /// Every successfully planned resource, converged ones included
    pub diffs: Vec<ResourceDiff>,
    /// Resources that failed to plan
    pub errors: Vec<PlanError>,
}

impl DiffReport {
    /// Diffs that change something
    pub fn changes(&self) -> impl Iterator<Item = &ResourceDiff> {
        self.diffs.iter().filter(|diff| diff.action.is_change())
    }

    /// Summary statistics
    pub fn summary(&self) -> DiffSummary {
        DiffSummary::from_diffs(&self.diffs)
    }

    /// Whether any resource failed to plan
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Plan every resource
///
/// Failures are collected rather than returned early so all problems are
/// reported at once.
pub fn compute_diffs(plan: &ExecutionPlan, ctx: &ApplyContext) -> DiffReport {
    let mut report = DiffReport::default();
    for (index, resource) in plan.resources.iter().enumerate() {
        match ResourceDiff::from_resource(index, resource.as_ref(), ctx) {
            Ok(diff) => report.diffs.push(diff),
            Err(err) => report.errors.push(err),
        }
    }
    report
}

/// Diff summary statistics
#[derive(Debug, Clone, Default)]
pub struct DiffSummary {
    /// Number of entities to create
    pub additions: usize,
    /// Number of entities to delete
    pub removals: usize,
    /// Number of entities to update
    pub modifications: usize,
    /// Number of converged entities
    pub unchanged: usize,
}

impl DiffSummary {
    /// Create a summary from a list of diffs
    pub fn from_diffs(diffs: &[ResourceDiff]) -> Self {
        let mut summary = Self::default();
        for diff in diffs {
            if diff.is_addition() {
                summary.additions += 1;
            } else if diff.is_removal() {
                summary.removals += 1;
            } else if diff.is_modification() {
                summary.modifications += 1;
            } else {
                summary.unchanged += 1;
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.additions + self.removals + self.modifications
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

/// Group diffs by entity kind
pub fn group_by_kind<'a, I>(diffs: I) -> BTreeMap<EntityKind, Vec<&'a ResourceDiff>>
where
    I: IntoIterator<Item = &'a ResourceDiff>,
{
    let mut groups: BTreeMap<EntityKind, Vec<&ResourceDiff>> = BTreeMap::new();
    for diff in diffs {
        groups.entry(diff.kind).or_default().push(diff);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TestGroup, context};
    use graphkit::Group;

    #[test]
    fn test_compute_diffs_collects_errors() {
        let (mock, ctx) = context();
        let existing = mock.insert(&Group {
            display_name: Some("Taken".into()),
            ..Group::default()
        });

        let mut plan = ExecutionPlan::new();
        plan.add_resource(Box::new(TestGroup::new("new", "Fresh")));
        plan.add_resource(Box::new(TestGroup::new("dup", "Taken").guarded()));
        plan.add_resource(Box::new(TestGroup::new("same", "Taken").with_id(&existing)));

        let report = compute_diffs(&plan, &ctx);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].address, "group.dup");
        assert!(report.errors[0].to_string().contains(&existing));

        let summary = report.summary();
        assert_eq!(summary.additions, 1);
        assert_eq!(summary.unchanged, 1);
        assert_eq!(report.changes().count(), 1);
    }

    #[test]
    fn test_group_by_kind() {
        let (_mock, ctx) = context();
        let mut plan = ExecutionPlan::new();
        plan.add_resource(Box::new(TestGroup::new("a", "A")));
        plan.add_resource(Box::new(TestGroup::new("b", "B")));

        let report = compute_diffs(&plan, &ctx);
        let groups = group_by_kind(&report.diffs);
        assert_eq!(groups[&EntityKind::Group].len(), 2);
    }
}
