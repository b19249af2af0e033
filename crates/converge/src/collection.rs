//! Disable-then-replace for nested collections
//!
//! App roles and permission scopes can only be written as a whole, and the
//! directory refuses to drop or change an item that is still enabled. A
//! replacement therefore takes two updates: one that disables every current
//! item, and one that writes the desired collection. The two calls are
//! never merged.

use crate::journal::Journal;
use graphkit::{AppRole, Application, Client, Entity, Error, PermissionScope, Result};
use serde::Serialize;
use serde_json::{Value, json};

/// An item with an enabled flag
pub trait Toggle: Clone + PartialEq + Serialize + Send + Sync {
    /// Caller-assigned item id
    fn item_id(&self) -> &str;

    /// Whether the item is enabled
    fn is_enabled(&self) -> bool;

    /// Set the enabled flag
    fn set_enabled(&mut self, enabled: bool);
}

impl Toggle for AppRole {
    fn item_id(&self) -> &str {
        &self.id
    }

    fn is_enabled(&self) -> bool {
        self.is_enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.is_enabled = enabled;
    }
}

impl Toggle for PermissionScope {
    fn item_id(&self) -> &str {
        &self.id
    }

    fn is_enabled(&self) -> bool {
        self.is_enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.is_enabled = enabled;
    }
}

/// Describes where a nested collection lives on its owning entity
pub trait NestedCollection {
    /// Entity holding the collection
    type Owner: Entity;
    /// Collection item
    type Item: Toggle;
    /// Name used in logs and journal steps
    const LABEL: &'static str;

    /// Current items of an entity
    fn items(owner: &Self::Owner) -> Vec<Self::Item>;

    /// PATCH body that sets the collection to `items`
    fn patch(items: &[Self::Item]) -> Value;
}

/// `appRoles` of an application
#[derive(Debug, Clone, Copy)]
pub struct AppRoles;

impl NestedCollection for AppRoles {
    type Owner = Application;
    type Item = AppRole;
    const LABEL: &'static str = "app roles";

    fn items(owner: &Application) -> Vec<AppRole> {
        owner.app_roles.clone().unwrap_or_default()
    }

    fn patch(items: &[AppRole]) -> Value {
        json!({ "appRoles": items })
    }
}

/// `api.oauth2PermissionScopes` of an application
#[derive(Debug, Clone, Copy)]
pub struct PermissionScopes;

impl NestedCollection for PermissionScopes {
    type Owner = Application;
    type Item = PermissionScope;
    const LABEL: &'static str = "permission scopes";

    fn items(owner: &Application) -> Vec<PermissionScope> {
        owner.permission_scopes().to_vec()
    }

    fn patch(items: &[PermissionScope]) -> Value {
        json!({ "api": { "oauth2PermissionScopes": items } })
    }
}

/// Result of a collection replacement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOutcome {
    /// Remote collection already matched
    Unchanged,
    /// Collection was rewritten
    Replaced {
        /// Items disabled by the first call
        disabled: usize,
        /// Items written by the second call
        written: usize,
        /// Previous items whose id is no longer desired
        retired: usize,
    },
}

/// Ids of `existing` items that `desired` no longer carries
pub fn retired_ids<T: Toggle>(existing: &[T], desired: &[T]) -> Vec<String> {
    existing
        .iter()
        .filter(|item| !desired.iter().any(|d| d.item_id() == item.item_id()))
        .map(|item| item.item_id().to_string())
        .collect()
}

/// Replace collection `C` of the journaled entity with `desired`.
///
/// The entity is fetched fresh; a caller-supplied copy may carry stale
/// enabled flags. A missing entity is `NotFound`.
pub fn replace_collection<C: NestedCollection>(
    client: &Client,
    journal: &mut Journal,
    desired: &[C::Item],
) -> Result<ReplaceOutcome> {
    let id = journal.require_id()?;
    let accessor = client.accessor::<C::Owner>();
    let current = journal.read(|| {
        accessor
            .get(&id)?
            .ok_or_else(|| Error::not_found(<C::Owner as Entity>::KIND, id.as_str()))
    })?;

    let existing = C::items(&current);
    if existing.as_slice() == desired {
        log::debug!("{} {id}: {} unchanged", <C::Owner as Entity>::KIND, C::LABEL);
        return Ok(ReplaceOutcome::Unchanged);
    }

    let retired = retired_ids(&existing, desired);
    let disabled = existing.len();
    if !existing.is_empty() {
        let all_disabled: Vec<C::Item> = existing
            .into_iter()
            .map(|mut item| {
                if item.is_enabled() {
                    log::debug!("{id}: disabling {} item {}", C::LABEL, item.item_id());
                }
                item.set_enabled(false);
                item
            })
            .collect();
        journal.step(format!("disabling {disabled} {}", C::LABEL), || {
            accessor.update_raw(&id, &C::patch(&all_disabled))
        })?;
    }

    journal.step(format!("writing {} {}", desired.len(), C::LABEL), || {
        accessor.update_raw(&id, &C::patch(desired))
    })?;

    log::info!(
        "{} {id}: replaced {} ({disabled} disabled, {} written)",
        <C::Owner as Entity>::KIND,
        C::LABEL,
        desired.len()
    );
    if !retired.is_empty() {
        log::info!("{} {id}: retired {} {}", <C::Owner as Entity>::KIND, C::LABEL, retired.join(", "));
    }
    Ok(ReplaceOutcome::Replaced {
        disabled,
        written: desired.len(),
        retired: retired.len(),
    })
}
