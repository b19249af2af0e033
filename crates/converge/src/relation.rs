//! Relationship reconciliation for owners and members
//!
//! Reconciling a relation fetches the current ids, diffs them against the
//! desired ids and issues at most one add call and one remove call. Owner
//! changes are ordered so the entity never passes through a state without
//! owners or without the acting principal while it is still needed.

use crate::difference::{contains_ignore_case, difference_ignore_case};
use crate::journal::Journal;
use graphkit::{Client, Entity, Relation, Result};

/// Order of the add and remove calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOrder {
    /// Remove stale ids, then add new ones
    RemoveFirst,
    /// Add new ids, then remove stale ones
    AddFirst,
}

/// Ids to add and remove to turn the existing set into the desired one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationDelta {
    /// Desired ids missing remotely
    pub to_add: Vec<String>,
    /// Remote ids that are not desired
    pub to_remove: Vec<String>,
}

impl RelationDelta {
    /// Diff existing ids against desired ids, ignoring ASCII case
    pub fn compute(existing: &[String], desired: &[String]) -> Self {
        let mut unique: Vec<String> = Vec::with_capacity(desired.len());
        for id in desired {
            if !contains_ignore_case(&unique, id) {
                unique.push(id.clone());
            }
        }
        Self {
            to_add: difference_ignore_case(&unique, existing),
            to_remove: difference_ignore_case(existing, &unique),
        }
    }

    /// Whether nothing needs to change
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    /// Pick the call order for this delta.
    ///
    /// Owners are added first when the removals would leave the relation
    /// empty or take away the acting principal. Everything else removes
    /// first.
    pub fn order(&self, relation: Relation, existing: &[String], acting: Option<&str>) -> StepOrder {
        if relation != Relation::Owners || self.to_add.is_empty() || self.to_remove.is_empty() {
            return StepOrder::RemoveFirst;
        }
        let empties = difference_ignore_case(existing, &self.to_remove).is_empty();
        let drops_acting = acting.is_some_and(|caller| contains_ignore_case(&self.to_remove, caller));
        if empties || drops_acting {
            StepOrder::AddFirst
        } else {
            StepOrder::RemoveFirst
        }
    }
}

/// What a reconciliation changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationOutcome {
    /// Ids that were added
    pub added: Vec<String>,
    /// Ids that were removed
    pub removed: Vec<String>,
}

impl RelationOutcome {
    /// Whether any call was made
    pub fn changed(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

/// Bring `relation` of the journaled entity to exactly `desired`.
///
/// `acting` is the principal performing the change and influences the
/// order of owner updates.
pub fn reconcile_relation<T: Entity>(
    client: &Client,
    journal: &mut Journal,
    relation: Relation,
    desired: &[String],
    acting: Option<&str>,
) -> Result<RelationOutcome> {
    let id = journal.require_id()?;
    let accessor = client.accessor::<T>();
    let existing = journal.read(|| accessor.list_relation(&id, relation))?;

    let delta = RelationDelta::compute(&existing, desired);
    if delta.is_empty() {
        log::debug!("{} {id}: {relation} already up to date", T::KIND);
        return Ok(RelationOutcome::default());
    }

    match delta.order(relation, &existing, acting) {
        StepOrder::AddFirst => {
            add_to_relation::<T>(client, journal, relation, &delta.to_add)?;
            remove_from_relation::<T>(client, journal, relation, &delta.to_remove)?;
        }
        StepOrder::RemoveFirst => {
            remove_from_relation::<T>(client, journal, relation, &delta.to_remove)?;
            add_to_relation::<T>(client, journal, relation, &delta.to_add)?;
        }
    }

    log::info!(
        "{} {id}: {relation} +{} -{}",
        T::KIND,
        delta.to_add.len(),
        delta.to_remove.len()
    );
    Ok(RelationOutcome {
        added: delta.to_add,
        removed: delta.to_remove,
    })
}

/// Add ids to a relation as one journaled step. Empty input issues no call.
pub fn add_to_relation<T: Entity>(
    client: &Client,
    journal: &mut Journal,
    relation: Relation,
    ids: &[String],
) -> Result<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let id = journal.require_id()?;
    let accessor = client.accessor::<T>();
    journal.step(format!("adding {} {relation}", ids.len()), || {
        accessor.add_relation(&id, relation, ids)
    })
}

/// Remove ids from a relation as one journaled step. Empty input issues no call.
pub fn remove_from_relation<T: Entity>(
    client: &Client,
    journal: &mut Journal,
    relation: Relation,
    ids: &[String],
) -> Result<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let id = journal.require_id()?;
    let accessor = client.accessor::<T>();
    journal.step(format!("removing {} {relation}", ids.len()), || {
        accessor.remove_relation(&id, relation, ids)
    })
}

/// Temporary ownership of a newly created entity by the acting principal.
///
/// The caller is the only initial owner so it can keep writing to the
/// entity. Desired owners are added next, and the caller is released last
/// unless it is one of them.
#[derive(Debug, Clone, Copy)]
pub struct OwnerBootstrap<'a> {
    caller: &'a str,
    desired: &'a [String],
}

impl<'a> OwnerBootstrap<'a> {
    /// Bootstrap `desired` owners on behalf of `caller`
    pub fn new(caller: &'a str, desired: &'a [String]) -> Self {
        Self { caller, desired }
    }

    /// Owners to attach at creation
    pub fn initial_owners(&self) -> Vec<String> {
        vec![self.caller.to_string()]
    }

    /// Desired owners other than the caller
    pub fn additional_owners(&self) -> Vec<String> {
        let mut owners: Vec<String> = Vec::new();
        for owner in self.desired {
            if !owner.eq_ignore_ascii_case(self.caller) && !owners.contains(owner) {
                owners.push(owner.clone());
            }
        }
        owners
    }

    /// Whether the caller must be removed at the end
    pub fn releases_caller(&self) -> bool {
        !contains_ignore_case(self.desired, self.caller)
    }

    /// Add the desired owners next to the caller.
    pub fn add_desired<T: Entity>(&self, client: &Client, journal: &mut Journal) -> Result<()> {
        add_to_relation::<T>(client, journal, Relation::Owners, &self.additional_owners())
    }

    /// Remove the caller unless it is a desired owner.
    pub fn release<T: Entity>(&self, client: &Client, journal: &mut Journal) -> Result<()> {
        if !self.releases_caller() {
            return Ok(());
        }
        remove_from_relation::<T>(client, journal, Relation::Owners, &[self.caller.to_string()])
    }
}
