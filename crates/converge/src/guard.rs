//! Duplicate display-name guard
//!
//! The server-side `eq` filter is not trusted to be exact, so every match
//! is re-checked locally with case-sensitive equality.

use crate::types::Change;
use graphkit::{Client, Entity, Error, Result};

/// OData filter selecting entities by display name
pub fn odata_filter(name: &str) -> String {
    format!("displayName eq '{}'", name.replace('\'', "''"))
}

/// Entities whose display name is exactly `name`
pub fn find_by_name<T: Entity>(client: &Client, name: &str) -> Result<Vec<T>> {
    let candidates = client.accessor::<T>().list(Some(&odata_filter(name)))?;
    let matches: Vec<T> = candidates
        .into_iter()
        .filter(|entity| entity.display_name() == Some(name))
        .collect();

    if let Some(entity) = matches.iter().find(|entity| entity.id().is_none()) {
        return Err(Error::InvalidResponse(format!(
            "{} named {name:?} returned without an object ID: {entity:?}",
            T::KIND
        )));
    }
    Ok(matches)
}

/// Fail with `DuplicateName` if another entity already uses `name`.
///
/// `own_id` is the id of the entity being renamed, if it exists, so it does
/// not conflict with itself.
pub fn ensure_unique<T: Entity>(client: &Client, name: &str, own_id: Option<&str>) -> Result<()> {
    let matches = find_by_name::<T>(client, name)?;
    match matches.iter().filter_map(|entity| entity.id()).find(|id| Some(*id) != own_id) {
        Some(existing_id) => Err(Error::DuplicateName {
            kind: T::KIND,
            name: name.to_string(),
            existing_id: existing_id.to_string(),
        }),
        None => Ok(()),
    }
}

/// The new display name, if the planned changes rename the entity.
pub fn renamed_to(changes: &[Change]) -> Option<&str> {
    changes
        .iter()
        .find(|change| change.field == "display_name")
        .map(|change| change.to.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphkit::{EntityKind, Group, MockBackend};
    use std::sync::Arc;

    fn setup(names: &[&str]) -> (MockBackend, Client, Vec<String>) {
        let mock = MockBackend::new();
        let ids = names
            .iter()
            .map(|name| {
                mock.insert(&Group {
                    display_name: Some((*name).to_string()),
                    ..Group::default()
                })
            })
            .collect();
        let client = Client::with_backend(Arc::new(mock.clone()));
        (mock, client, ids)
    }

    #[test]
    fn test_odata_filter_escapes_quotes() {
        assert_eq!(odata_filter("O'Brien"), "displayName eq 'O''Brien'");
    }

    #[test]
    fn test_find_by_name_rechecks_case() {
        let (_mock, client, ids) = setup(&["Admins", "ADMINS", "Readers"]);
        let found = find_by_name::<Group>(&client, "Admins").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id.as_deref(), Some(ids[0].as_str()));
    }

    #[test]
    fn test_ensure_unique_names_existing_id() {
        let (_mock, client, ids) = setup(&["Admins", "Admins"]);
        let err = ensure_unique::<Group>(&client, "Admins", None).unwrap_err();
        match err {
            Error::DuplicateName { kind, name, existing_id } => {
                assert_eq!(kind, EntityKind::Group);
                assert_eq!(name, "Admins");
                assert!(ids.contains(&existing_id));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_ensure_unique_ignores_self() {
        let (_mock, client, ids) = setup(&["Admins"]);
        ensure_unique::<Group>(&client, "Admins", Some(&ids[0])).unwrap();
        assert!(ensure_unique::<Group>(&client, "Admins", Some("other")).is_err());
    }

    #[test]
    fn test_ensure_unique_free_name() {
        let (mock, client, _ids) = setup(&["Admins"]);
        ensure_unique::<Group>(&client, "admins", None).unwrap();
        assert!(mock.writes().is_empty());
    }

    #[test]
    fn test_renamed_to() {
        let changes = vec![
            Change::new("description", "a", "b"),
            Change::new("display_name", "Old", "New"),
        ];
        assert_eq!(renamed_to(&changes), Some("New"));
        assert_eq!(renamed_to(&changes[..1]), None);
    }
}
