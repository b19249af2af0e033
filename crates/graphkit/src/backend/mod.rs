//! Backend trait and implementations for talking to the directory.
//!
//! This module provides the [`Backend`] trait, the JSON-level contract every
//! directory implementation fulfils. The production implementation is
//! [`graph::GraphBackend`]; [`MockBackend`] keeps everything in memory and
//! records each call so reconciliation can be tested without network access.
//!
//! # Testing
//!
//! ```
//! use graphkit::backend::{Backend, MockBackend};
//! use graphkit::{EntityKind, Relation};
//!
//! let mock = MockBackend::new();
//! let id = mock.insert_raw(EntityKind::Group, serde_json::json!({ "displayName": "Admins" }));
//! mock.set_relation(EntityKind::Group, &id, Relation::Members, &["u1"]);
//!
//! let members = mock.list_relation(EntityKind::Group, &id, Relation::Members).unwrap();
//! assert_eq!(members, vec!["u1".to_string()]);
//! ```

pub mod graph;

use crate::error::{Error, Result};
use crate::types::{Entity, EntityKind, Relation};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// Directory access at the JSON level.
///
/// "Not found" is a value, not an error: `get` returns `None` and `delete`
/// returns `false` so callers can treat an already-missing object as a no-op.
pub trait Backend: Send + Sync {
    /// Fetch one entity.
    fn get(&self, kind: EntityKind, id: &str) -> Result<Option<Value>>;

    /// List entities, optionally with an OData filter expression.
    fn list(&self, kind: EntityKind, filter: Option<&str>) -> Result<Vec<Value>>;

    /// Create an entity and return its server representation.
    ///
    /// `owners` are attached as initial owners of the new object.
    fn create(&self, kind: EntityKind, body: &Value, owners: &[String]) -> Result<Value>;

    /// Apply a partial update.
    fn update(&self, kind: EntityKind, id: &str, patch: &Value) -> Result<()>;

    /// Delete an entity. Returns `false` if it did not exist.
    fn delete(&self, kind: EntityKind, id: &str) -> Result<bool>;

    /// List the object IDs in a relation.
    fn list_relation(&self, kind: EntityKind, id: &str, relation: Relation) -> Result<Vec<String>>;

    /// Add object IDs to a relation. Adding a present ID succeeds.
    fn add_relation(&self, kind: EntityKind, id: &str, relation: Relation, ids: &[String]) -> Result<()>;

    /// Remove object IDs from a relation. Removing an absent ID succeeds.
    fn remove_relation(
        &self,
        kind: EntityKind,
        id: &str,
        relation: Relation,
        ids: &[String],
    ) -> Result<()>;
}

/// Operation names, used to target injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// [`Backend::get`]
    Get,
    /// [`Backend::list`]
    List,
    /// [`Backend::create`]
    Create,
    /// [`Backend::update`]
    Update,
    /// [`Backend::delete`]
    Delete,
    /// [`Backend::list_relation`]
    ListRelation,
    /// [`Backend::add_relation`]
    AddRelation,
    /// [`Backend::remove_relation`]
    RemoveRelation,
}

/// A call received by [`MockBackend`].
///
/// Calls are recorded before injected failures are applied, so a failed
/// call still shows up in [`MockBackend::calls`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    /// Read one object.
    Get {
        /// Kind of entity.
        kind: EntityKind,
        /// Object ID.
        id: String,
    },
    /// Read a collection.
    List {
        /// Kind of entity.
        kind: EntityKind,
        /// Filter expression, if any.
        filter: Option<String>,
    },
    /// Create an object.
    Create {
        /// Kind of entity.
        kind: EntityKind,
        /// JSON body as sent.
        body: Value,
        /// Owners bound at creation.
        owners: Vec<String>,
    },
    /// Patch an object.
    Update {
        /// Kind of entity.
        kind: EntityKind,
        /// Object ID.
        id: String,
        /// JSON patch as sent.
        patch: Value,
    },
    /// Delete an object.
    Delete {
        /// Kind of entity.
        kind: EntityKind,
        /// Object ID.
        id: String,
    },
    /// Read a relation.
    ListRelation {
        /// Kind of the parent entity.
        kind: EntityKind,
        /// Parent object ID.
        id: String,
        /// Relation read.
        relation: Relation,
    },
    /// Add IDs to a relation.
    AddRelation {
        /// Kind of the parent entity.
        kind: EntityKind,
        /// Parent object ID.
        id: String,
        /// Relation changed.
        relation: Relation,
        /// IDs added.
        ids: Vec<String>,
    },
    /// Remove IDs from a relation.
    RemoveRelation {
        /// Kind of the parent entity.
        kind: EntityKind,
        /// Parent object ID.
        id: String,
        /// Relation changed.
        relation: Relation,
        /// IDs removed.
        ids: Vec<String>,
    },
}

impl Call {
    /// Operation of this call.
    #[must_use]
    pub fn operation(&self) -> Operation {
        match self {
            Self::Get { .. } => Operation::Get,
            Self::List { .. } => Operation::List,
            Self::Create { .. } => Operation::Create,
            Self::Update { .. } => Operation::Update,
            Self::Delete { .. } => Operation::Delete,
            Self::ListRelation { .. } => Operation::ListRelation,
            Self::AddRelation { .. } => Operation::AddRelation,
            Self::RemoveRelation { .. } => Operation::RemoveRelation,
        }
    }

    /// Whether the call changes remote state.
    #[must_use]
    pub fn is_write(&self) -> bool {
        !matches!(
            self.operation(),
            Operation::Get | Operation::List | Operation::ListRelation
        )
    }
}

#[derive(Debug)]
struct Failure {
    operation: Operation,
    skip: usize,
    status: u16,
    message: String,
}

#[derive(Debug, Default)]
struct MockState {
    objects: BTreeMap<(EntityKind, String), Value>,
    relations: HashMap<(EntityKind, String, Relation), Vec<String>>,
    calls: Vec<Call>,
    failures: VecDeque<Failure>,
    read_lag: usize,
    lagging: HashMap<(EntityKind, String), usize>,
    next_id: u64,
}

/// In-memory backend for testing.
///
/// Besides storing objects and relations it mimics the parts of the real
/// API that matter for reconciliation:
/// - `displayName eq '...'` filters match case-insensitively, like the
///   real server, so callers must re-check names themselves
/// - enabled app roles and permission scopes cannot be removed or changed
/// - newly created objects can be made invisible for a number of reads
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    /// Create a new empty mock backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every newly created object invisible to the next `reads` gets.
    #[must_use]
    pub fn with_read_lag(self, reads: usize) -> Self {
        self.state().read_lag = reads;
        self
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Store a typed entity, assigning an ID if it has none. Returns the ID.
    pub fn insert<T: Entity>(&self, entity: &T) -> String {
        let mut value = serde_json::to_value(entity).unwrap_or_else(|_| Value::Object(Map::new()));
        if let (Some(id), Value::Object(map)) = (entity.id(), &mut value) {
            map.insert("id".to_string(), Value::String(id.to_string()));
        }
        self.insert_raw(T::KIND, value)
    }

    /// Store a raw JSON object, assigning an ID if it has none. Returns the ID.
    pub fn insert_raw(&self, kind: EntityKind, value: Value) -> String {
        let mut state = self.state();
        let mut object = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let id = match object.get("id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => {
                let id = state.generate_id();
                object.insert("id".to_string(), Value::String(id.clone()));
                id
            }
        };
        state.objects.insert((kind, id.clone()), Value::Object(object));
        id
    }

    /// Replace the contents of a relation.
    pub fn set_relation(&self, kind: EntityKind, id: &str, relation: Relation, ids: &[&str]) {
        self.state().relations.insert(
            (kind, id.to_string(), relation),
            ids.iter().map(|s| (*s).to_string()).collect(),
        );
    }

    /// Current contents of a relation.
    #[must_use]
    pub fn relation(&self, kind: EntityKind, id: &str, relation: Relation) -> Vec<String> {
        self.state()
            .relations
            .get(&(kind, id.to_string(), relation))
            .cloned()
            .unwrap_or_default()
    }

    /// Stored JSON of an object.
    #[must_use]
    pub fn object(&self, kind: EntityKind, id: &str) -> Option<Value> {
        self.state().objects.get(&(kind, id.to_string())).cloned()
    }

    /// Fail the next call of `operation` with the given HTTP status.
    pub fn fail_next(&self, operation: Operation, status: u16, message: impl Into<String>) {
        self.fail_after(operation, 0, status, message);
    }

    /// Let `skip` calls of `operation` succeed, then fail the next one.
    pub fn fail_after(&self, operation: Operation, skip: usize, status: u16, message: impl Into<String>) {
        self.state().failures.push_back(Failure {
            operation,
            skip,
            status,
            message: message.into(),
        });
    }

    /// All calls received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Calls that change remote state.
    #[must_use]
    pub fn writes(&self) -> Vec<Call> {
        self.state()
            .calls
            .iter()
            .filter(|call| call.is_write())
            .cloned()
            .collect()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }
}

impl MockState {
    fn generate_id(&mut self) -> String {
        self.next_id += 1;
        format!("00000000-0000-4000-8000-{:012x}", self.next_id)
    }

    /// Record a call and return an injected failure if one is queued for it.
    fn record(&mut self, call: Call, kind: EntityKind, id: Option<&str>) -> Result<()> {
        let operation = call.operation();
        self.calls.push(call);

        let Some(index) = self.failures.iter().position(|f| f.operation == operation) else {
            return Ok(());
        };
        if self.failures[index].skip > 0 {
            self.failures[index].skip -= 1;
            return Ok(());
        }
        match self.failures.remove(index) {
            Some(failure) => Err(Error::remote(
                kind,
                id,
                format!("{operation:?}"),
                Some(failure.status),
                failure.message,
            )),
            None => Ok(()),
        }
    }

    fn require(&self, kind: EntityKind, id: &str) -> Result<()> {
        if self.objects.contains_key(&(kind, id.to_string())) {
            Ok(())
        } else {
            Err(Error::not_found(kind, id))
        }
    }
}

impl Backend for MockBackend {
    fn get(&self, kind: EntityKind, id: &str) -> Result<Option<Value>> {
        let mut state = self.state();
        state.record(
            Call::Get {
                kind,
                id: id.to_string(),
            },
            kind,
            Some(id),
        )?;

        let key = (kind, id.to_string());
        if let Some(remaining) = state.lagging.get_mut(&key)
            && *remaining > 0
        {
            *remaining -= 1;
            return Ok(None);
        }
        Ok(state.objects.get(&key).cloned())
    }

    fn list(&self, kind: EntityKind, filter: Option<&str>) -> Result<Vec<Value>> {
        let mut state = self.state();
        state.record(
            Call::List {
                kind,
                filter: filter.map(str::to_string),
            },
            kind,
            None,
        )?;

        let wanted = filter.and_then(parse_display_name_filter);
        Ok(state
            .objects
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|(_, value)| value)
            .filter(|value| match &wanted {
                None => true,
                Some(name) => value
                    .get("displayName")
                    .and_then(Value::as_str)
                    .is_some_and(|actual| actual.eq_ignore_ascii_case(name)),
            })
            .cloned()
            .collect())
    }

    fn create(&self, kind: EntityKind, body: &Value, owners: &[String]) -> Result<Value> {
        let mut state = self.state();
        state.record(
            Call::Create {
                kind,
                body: body.clone(),
                owners: owners.to_vec(),
            },
            kind,
            None,
        )?;

        let mut object = match body {
            Value::Object(map) => map.clone(),
            _ => {
                return Err(Error::remote(
                    kind,
                    None,
                    "creating",
                    Some(400),
                    "request body must be an object",
                ));
            }
        };

        let id = match (kind, object.get("id").and_then(Value::as_str)) {
            (EntityKind::Domain, Some(name)) => name.to_string(),
            (EntityKind::Domain, None) => {
                return Err(Error::remote(kind, None, "creating", Some(400), "domain name is required"));
            }
            _ => state.generate_id(),
        };
        object.insert("id".to_string(), Value::String(id.clone()));
        match kind {
            EntityKind::Application => {
                let app_id = state.generate_id();
                object.insert("appId".to_string(), Value::String(app_id));
            }
            EntityKind::Domain => {
                object.insert("isVerified".to_string(), Value::Bool(false));
            }
            _ => {}
        }

        let created = Value::Object(object);
        state.objects.insert((kind, id.clone()), created.clone());
        if !owners.is_empty() {
            state
                .relations
                .insert((kind, id.clone(), Relation::Owners), owners.to_vec());
        }
        if state.read_lag > 0 {
            let lag = state.read_lag;
            state.lagging.insert((kind, id), lag);
        }
        Ok(created)
    }

    fn update(&self, kind: EntityKind, id: &str, patch: &Value) -> Result<()> {
        let mut state = self.state();
        state.record(
            Call::Update {
                kind,
                id: id.to_string(),
                patch: patch.clone(),
            },
            kind,
            Some(id),
        )?;
        state.require(kind, id)?;

        let key = (kind, id.to_string());
        let current = state.objects.get(&key).cloned().unwrap_or(Value::Null);
        for pointer in ["/appRoles", "/api/oauth2PermissionScopes"] {
            if let Some(replacement) = patch.pointer(pointer) {
                check_enabled_items_kept(current.pointer(pointer), replacement).map_err(|message| {
                    Error::remote(kind, Some(id), "updating", Some(400), message)
                })?;
            }
        }

        if let Some(object) = state.objects.get_mut(&key) {
            merge(object, patch);
        }
        Ok(())
    }

    fn delete(&self, kind: EntityKind, id: &str) -> Result<bool> {
        let mut state = self.state();
        state.record(
            Call::Delete {
                kind,
                id: id.to_string(),
            },
            kind,
            Some(id),
        )?;

        let removed = state.objects.remove(&(kind, id.to_string())).is_some();
        state.relations.retain(|(k, i, _), _| !(*k == kind && i == id));
        Ok(removed)
    }

    fn list_relation(&self, kind: EntityKind, id: &str, relation: Relation) -> Result<Vec<String>> {
        let mut state = self.state();
        state.record(
            Call::ListRelation {
                kind,
                id: id.to_string(),
                relation,
            },
            kind,
            Some(id),
        )?;
        state.require(kind, id)?;

        Ok(state
            .relations
            .get(&(kind, id.to_string(), relation))
            .cloned()
            .unwrap_or_default())
    }

    fn add_relation(&self, kind: EntityKind, id: &str, relation: Relation, ids: &[String]) -> Result<()> {
        let mut state = self.state();
        state.record(
            Call::AddRelation {
                kind,
                id: id.to_string(),
                relation,
                ids: ids.to_vec(),
            },
            kind,
            Some(id),
        )?;
        state.require(kind, id)?;

        let entries = state
            .relations
            .entry((kind, id.to_string(), relation))
            .or_default();
        for member in ids {
            if !entries.contains(member) {
                entries.push(member.clone());
            }
        }
        Ok(())
    }

    fn remove_relation(
        &self,
        kind: EntityKind,
        id: &str,
        relation: Relation,
        ids: &[String],
    ) -> Result<()> {
        let mut state = self.state();
        state.record(
            Call::RemoveRelation {
                kind,
                id: id.to_string(),
                relation,
                ids: ids.to_vec(),
            },
            kind,
            Some(id),
        )?;
        state.require(kind, id)?;

        if let Some(entries) = state.relations.get_mut(&(kind, id.to_string(), relation)) {
            entries.retain(|member| !ids.contains(member));
        }
        Ok(())
    }
}

/// Extract the name from a `displayName eq '<name>'` filter.
fn parse_display_name_filter(filter: &str) -> Option<String> {
    let quoted = filter.trim().strip_prefix("displayName eq ")?;
    let inner = quoted.strip_prefix('\'')?.strip_suffix('\'')?;
    Some(inner.replace("''", "'"))
}

/// Enabled items must survive a replacement unchanged (apart from being
/// disabled), mirroring the directory's disable-before-remove rule.
fn check_enabled_items_kept(current: Option<&Value>, replacement: &Value) -> std::result::Result<(), String> {
    let Some(Value::Array(current)) = current else {
        return Ok(());
    };
    let replacement = replacement.as_array().map(Vec::as_slice).unwrap_or_default();

    for item in current {
        if item.get("isEnabled").and_then(Value::as_bool) != Some(true) {
            continue;
        }
        let id = item.get("id");
        let Some(next) = replacement.iter().find(|candidate| candidate.get("id") == id) else {
            return Err(format!(
                "cannot remove enabled item {}; disable it first",
                id.map(Value::to_string).unwrap_or_default()
            ));
        };
        let mut disabled = item.clone();
        let mut next_disabled = next.clone();
        for value in [&mut disabled, &mut next_disabled] {
            if let Value::Object(map) = value {
                map.insert("isEnabled".to_string(), Value::Bool(false));
            }
        }
        if disabled != next_disabled {
            return Err(format!(
                "cannot change enabled item {}; disable it first",
                id.map(Value::to_string).unwrap_or_default()
            ));
        }
    }
    Ok(())
}

/// Merge a PATCH body into a stored object. Objects merge, everything else
/// is replaced.
fn merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(key) {
                    Some(existing) if existing.is_object() && value.is_object() => merge(existing, value),
                    _ => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_mock_backend_get_missing() {
        let mock = MockBackend::new();
        assert!(mock.get(EntityKind::Group, "nope").unwrap().is_none());
        assert_eq!(mock.calls().len(), 1);
    }

    #[test]
    fn test_mock_backend_create_assigns_id() {
        let mock = MockBackend::new();
        let created = mock
            .create(EntityKind::Group, &json!({ "displayName": "Admins" }), &ids(&["caller"]))
            .unwrap();
        let id = created["id"].as_str().unwrap().to_string();

        assert!(mock.object(EntityKind::Group, &id).is_some());
        assert_eq!(mock.relation(EntityKind::Group, &id, Relation::Owners), ids(&["caller"]));
    }

    #[test]
    fn test_mock_backend_domain_uses_name_as_id() {
        let mock = MockBackend::new();
        let created = mock
            .create(EntityKind::Domain, &json!({ "id": "contoso.com" }), &[])
            .unwrap();
        assert_eq!(created["id"], "contoso.com");
        assert_eq!(created["isVerified"], false);
    }

    #[test]
    fn test_mock_backend_filter_is_case_insensitive() {
        let mock = MockBackend::new();
        mock.insert_raw(EntityKind::Group, json!({ "displayName": "Admins" }));
        mock.insert_raw(EntityKind::Group, json!({ "displayName": "ADMINS" }));
        mock.insert_raw(EntityKind::Group, json!({ "displayName": "Readers" }));

        let found = mock
            .list(EntityKind::Group, Some("displayName eq 'admins'"))
            .unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_parse_display_name_filter_unescapes_quotes() {
        assert_eq!(
            parse_display_name_filter("displayName eq 'O''Brien'"),
            Some("O'Brien".to_string())
        );
        assert_eq!(parse_display_name_filter("startswith(displayName,'a')"), None);
    }

    #[test]
    fn test_mock_backend_relations_are_idempotent() {
        let mock = MockBackend::new();
        let id = mock.insert_raw(EntityKind::Group, json!({}));
        mock.add_relation(EntityKind::Group, &id, Relation::Members, &ids(&["u1", "u2"]))
            .unwrap();
        mock.add_relation(EntityKind::Group, &id, Relation::Members, &ids(&["u2"]))
            .unwrap();
        mock.remove_relation(EntityKind::Group, &id, Relation::Members, &ids(&["u9"]))
            .unwrap();

        assert_eq!(
            mock.relation(EntityKind::Group, &id, Relation::Members),
            ids(&["u1", "u2"])
        );
    }

    #[test]
    fn test_mock_backend_relation_on_missing_object() {
        let mock = MockBackend::new();
        let err = mock
            .list_relation(EntityKind::Group, "missing", Relation::Owners)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_mock_backend_rejects_removing_enabled_role() {
        let mock = MockBackend::new();
        let id = mock.insert_raw(
            EntityKind::Application,
            json!({ "appRoles": [{ "id": "r1", "isEnabled": true, "displayName": "Admin" }] }),
        );

        let replace = json!({ "appRoles": [{ "id": "r2", "isEnabled": true }] });
        assert!(mock.update(EntityKind::Application, &id, &replace).is_err());

        let disable = json!({ "appRoles": [{ "id": "r1", "isEnabled": false, "displayName": "Admin" }] });
        mock.update(EntityKind::Application, &id, &disable).unwrap();
        mock.update(EntityKind::Application, &id, &replace).unwrap();

        let stored = mock.object(EntityKind::Application, &id).unwrap();
        assert_eq!(stored["appRoles"][0]["id"], "r2");
    }

    #[test]
    fn test_mock_backend_merges_nested_patch() {
        let mock = MockBackend::new();
        let id = mock.insert_raw(
            EntityKind::Application,
            json!({ "displayName": "App", "api": { "requestedAccessTokenVersion": 2 } }),
        );
        mock.update(
            EntityKind::Application,
            &id,
            &json!({ "api": { "oauth2PermissionScopes": [] } }),
        )
        .unwrap();

        let stored = mock.object(EntityKind::Application, &id).unwrap();
        assert_eq!(stored["displayName"], "App");
        assert_eq!(stored["api"]["requestedAccessTokenVersion"], 2);
        assert_eq!(stored["api"]["oauth2PermissionScopes"], json!([]));
    }

    #[test]
    fn test_mock_backend_injected_failure_fires_once() {
        let mock = MockBackend::new();
        let id = mock.insert_raw(EntityKind::Group, json!({}));
        mock.fail_next(Operation::AddRelation, 429, "throttled");

        let first = mock.add_relation(EntityKind::Group, &id, Relation::Members, &ids(&["u1"]));
        assert_eq!(first.unwrap_err().status(), Some(429));
        mock.add_relation(EntityKind::Group, &id, Relation::Members, &ids(&["u1"]))
            .unwrap();
        assert_eq!(mock.writes().len(), 2);
    }

    #[test]
    fn test_mock_backend_read_lag() {
        let mock = MockBackend::new().with_read_lag(2);
        let created = mock.create(EntityKind::User, &json!({}), &[]).unwrap();
        let id = created["id"].as_str().unwrap();

        assert!(mock.get(EntityKind::User, id).unwrap().is_none());
        assert!(mock.get(EntityKind::User, id).unwrap().is_none());
        assert!(mock.get(EntityKind::User, id).unwrap().is_some());
    }

    #[test]
    fn test_mock_backend_delete() {
        let mock = MockBackend::new();
        let id = mock.insert_raw(EntityKind::Group, json!({}));
        mock.set_relation(EntityKind::Group, &id, Relation::Members, &["u1"]);

        assert!(mock.delete(EntityKind::Group, &id).unwrap());
        assert!(!mock.delete(EntityKind::Group, &id).unwrap());
        assert!(mock.relation(EntityKind::Group, &id, Relation::Members).is_empty());
    }

    #[test]
    fn test_failed_call_is_still_recorded() {
        let mock = MockBackend::new();
        mock.fail_next(Operation::Get, 503, "unavailable");
        assert!(mock.get(EntityKind::Group, "g1").is_err());

        let calls = mock.calls();
        assert_eq!(
            calls,
            vec![Call::Get {
                kind: EntityKind::Group,
                id: "g1".to_string()
            }]
        );
        assert_eq!(calls[0].operation(), Operation::Get);
        assert!(!calls[0].is_write());
    }
}
