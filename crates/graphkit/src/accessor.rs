//! Typed access to one entity kind.
//!
//! An [`Accessor`] wraps a [`Backend`] and converts between JSON and the
//! entity structs in [`crate::types`]. It adds no behaviour of its own
//! besides checking that a relation applies to the kind.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::types::{Entity, Relation};
use serde_json::Value;
use std::marker::PhantomData;

/// Typed accessor for entities of kind `T::KIND`.
pub struct Accessor<'a, T: Entity> {
    backend: &'a dyn Backend,
    _entity: PhantomData<T>,
}

impl<'a, T: Entity> Accessor<'a, T> {
    /// Create an accessor over a backend.
    pub fn new(backend: &'a dyn Backend) -> Self {
        Self {
            backend,
            _entity: PhantomData,
        }
    }

    /// Fetch an entity; `None` when it does not exist.
    pub fn get(&self, id: &str) -> Result<Option<T>> {
        self.backend
            .get(T::KIND, id)?
            .map(decode::<T>)
            .transpose()
    }

    /// List entities matching an OData filter.
    pub fn list(&self, filter: Option<&str>) -> Result<Vec<T>> {
        self.backend
            .list(T::KIND, filter)?
            .into_iter()
            .map(decode::<T>)
            .collect()
    }

    /// Create an entity with initial owners and return the stored version.
    pub fn create(&self, entity: &T, owners: &[String]) -> Result<T> {
        let body = serde_json::to_value(entity)?;
        let created = self.backend.create(T::KIND, &body, owners)?;
        decode(created)
    }

    /// Send the serialized entity as a partial update.
    ///
    /// Fields left as `None` are not sent and stay as they are remotely.
    pub fn update(&self, id: &str, entity: &T) -> Result<()> {
        let mut patch = serde_json::to_value(entity)?;
        if let Value::Object(map) = &mut patch {
            map.remove("id");
        }
        self.backend.update(T::KIND, id, &patch)
    }

    /// Send a raw JSON patch.
    pub fn update_raw(&self, id: &str, patch: &Value) -> Result<()> {
        self.backend.update(T::KIND, id, patch)
    }

    /// Delete an entity; `false` if it was already gone.
    pub fn delete(&self, id: &str) -> Result<bool> {
        self.backend.delete(T::KIND, id)
    }

    /// Object IDs currently in a relation.
    pub fn list_relation(&self, id: &str, relation: Relation) -> Result<Vec<String>> {
        self.check_relation(relation)?;
        self.backend.list_relation(T::KIND, id, relation)
    }

    /// Add object IDs to a relation.
    pub fn add_relation(&self, id: &str, relation: Relation, ids: &[String]) -> Result<()> {
        self.check_relation(relation)?;
        if ids.is_empty() {
            return Ok(());
        }
        self.backend.add_relation(T::KIND, id, relation, ids)
    }

    /// Remove object IDs from a relation.
    pub fn remove_relation(&self, id: &str, relation: Relation, ids: &[String]) -> Result<()> {
        self.check_relation(relation)?;
        if ids.is_empty() {
            return Ok(());
        }
        self.backend.remove_relation(T::KIND, id, relation, ids)
    }

    fn check_relation(&self, relation: Relation) -> Result<()> {
        if T::KIND.supports(relation) {
            Ok(())
        } else {
            Err(Error::validation(
                T::KIND,
                relation.path(),
                format!("{} do not have {relation}", T::KIND),
            ))
        }
    }
}

fn decode<T: Entity>(value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| Error::InvalidResponse(format!("decoding {}: {e}", T::KIND)))
}
