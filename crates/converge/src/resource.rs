//! Resource trait for declarative directory management
//!
//! A Resource is one configured entity. It knows how to compare itself with
//! the remote entity and how to create, update and delete it.

use crate::context::ApplyContext;
use crate::types::{Change, Ensure};
use graphkit::{EntityKind, Result};
use std::fmt;

/// Lifecycle of one configured entity
///
/// Implementations are called by the planner (`validate`, `check`,
/// `changes`) and the executor (`create`, `update`, `delete`). Every call
/// reads observed state fresh; nothing is cached between calls.
///
/// # Example
///
/// ```ignore
/// impl Resource for GroupResource {
///     fn kind(&self) -> EntityKind { EntityKind::Group }
///     fn name(&self) -> &str { &self.name }
///     fn id(&self) -> Option<&str> { self.id.as_deref() }
///     fn description(&self) -> String { format!("Group {}", self.display_name) }
///
///     fn changes(&self, ctx: &ApplyContext, id: &str) -> Result<Option<Vec<Change>>> {
///         let Some(current) = ctx.client.accessor::<Group>().get(id)? else {
///             return Ok(None);
///         };
///         Ok(Some(self.diff(&current)))
///     }
///     // create, update, delete ...
/// }
/// ```
pub trait Resource: Send + Sync + fmt::Debug {
    /// Entity kind
    fn kind(&self) -> EntityKind;

    /// Configuration label, unique per kind
    fn name(&self) -> &str;

    /// Object ID of the managed entity, if it has been created
    fn id(&self) -> Option<&str>;

    /// Whether the entity should exist
    fn ensure(&self) -> Ensure {
        Ensure::Present
    }

    /// Human-readable description of the entity
    fn description(&self) -> String;

    /// Address used in plans and targets, e.g. `group.admins`
    fn address(&self) -> String {
        format!("{}.{}", self.kind().resource_type(), self.name())
    }

    /// Static checks on the configuration, without remote calls
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Plan-time remote checks before a create (`id` is `None`) or an update
    fn check(&self, _ctx: &ApplyContext, _id: Option<&str>, _changes: &[Change]) -> Result<()> {
        Ok(())
    }

    /// Differences between the remote entity and the configuration.
    ///
    /// Returns `None` when the entity no longer exists.
    fn changes(&self, ctx: &ApplyContext, id: &str) -> Result<Option<Vec<Change>>>;

    /// Create the entity and return its object ID
    fn create(&self, ctx: &ApplyContext) -> Result<String>;

    /// Converge an existing entity
    fn update(&self, ctx: &ApplyContext, id: &str, changes: &[Change]) -> Result<()>;

    /// Delete the entity; a missing entity is an error
    fn delete(&self, ctx: &ApplyContext, id: &str) -> Result<()>;
}

/// A boxed resource for type-erased storage
pub type BoxedResource = Box<dyn Resource>;
