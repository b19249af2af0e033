//! Execution planner - decides what to do with each resource

use crate::context::ApplyContext;
use crate::resource::{BoxedResource, Resource};
use crate::types::{Action, Ensure};
use graphkit::{EntityKind, Result};

/// The resources of one run, in configuration order
pub struct ExecutionPlan {
    /// Resources to reconcile
    pub resources: Vec<BoxedResource>,
}

impl ExecutionPlan {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self {
            resources: Vec::new(),
        }
    }

    /// Add a resource to the plan
    pub fn add_resource(&mut self, resource: BoxedResource) {
        self.resources.push(resource);
    }

    /// Filter plan to only include resources matching a predicate
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&dyn Resource) -> bool,
    {
        Self {
            resources: self
                .resources
                .into_iter()
                .filter(|r| predicate(r.as_ref()))
                .collect(),
        }
    }

    /// Filter plan to only include resources matching a target pattern
    ///
    /// Target format: "type" or "type.name", e.g. `group` or `group.admins`
    pub fn filter_by_target(self, target: Option<&str>) -> Self {
        match target {
            None => self,
            Some(t) => {
                let (kind, name) = parse_target(t);
                self.filter(|r| matches_filter(r, kind, name.as_deref()))
            }
        }
    }

    /// Total number of resources in the plan
    pub fn total_resources(&self) -> usize {
        self.resources.len()
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl Default for ExecutionPlan {
    fn default() -> Self {
        Self::new()
    }
}

/// Decide the action for one resource.
///
/// Reads the remote entity; runs the resource's plan-time checks before a
/// create or update.
pub fn plan_resource(resource: &dyn Resource, ctx: &ApplyContext) -> Result<Action> {
    resource.validate()?;

    let observed = match resource.id() {
        Some(id) => resource.changes(ctx, id)?,
        None => None,
    };

    let action = match (resource.ensure(), resource.id(), observed) {
        (Ensure::Absent, _, None) => Action::None,
        (Ensure::Absent, Some(_), Some(_)) => Action::Delete,
        (Ensure::Present, id, None) => {
            if let Some(id) = id {
                log::warn!("{} {id} no longer exists and will be recreated", resource.kind());
            }
            resource.check(ctx, None, &[])?;
            Action::Create
        }
        (Ensure::Present, Some(id), Some(changes)) => {
            if changes.is_empty() {
                Action::None
            } else {
                resource.check(ctx, Some(id), &changes)?;
                Action::Update(changes)
            }
        }
        (_, None, Some(_)) => Action::None,
    };

    log::debug!("planned {}: {action:?}", resource.address());
    Ok(action)
}

/// Parse a target string like "type.name" into (kind, name)
fn parse_target(target: &str) -> (Option<EntityKind>, Option<String>) {
    match target.split_once('.') {
        Some((kind, name)) => (kind.parse().ok(), Some(name.to_string())),
        None => match target.parse() {
            Ok(kind) => (Some(kind), None),
            Err(_) => (None, Some(target.to_string())),
        },
    }
}

/// Check if a resource matches the filter criteria
fn matches_filter(resource: &dyn Resource, kind: Option<EntityKind>, name: Option<&str>) -> bool {
    if let Some(kind) = kind
        && resource.kind() != kind
    {
        return false;
    }

    if let Some(n) = name
        && resource.name() != n
    {
        return false;
    }

    true
}
