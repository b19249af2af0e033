//! Directory resources
//!
//! One module per entity kind. Every configuration block deserializes into a
//! resource implementing [`converge::Resource`]; the helpers here hold the
//! lifecycle steps the kinds share:
//! - creation with the acting principal as provisional owner
//! - read-after-create wait
//! - owner reconciliation
//! - delete that treats a missing object as a failure

pub mod application;
pub mod conditional_access_policy;
pub mod domain;
pub mod group;
pub mod service_principal;
pub mod user;

pub use application::ApplicationResource;
pub use conditional_access_policy::ConditionalAccessPolicyResource;
pub use domain::DomainResource;
pub use group::GroupResource;
pub use service_principal::ServicePrincipalResource;
pub use user::UserResource;

use converge::{
    ApplyContext, Change, Journal, OwnerBootstrap, RelationDelta, add_to_relation,
    reconcile_relation,
};
use graphkit::{Entity, EntityKind, Error, Relation, Result};
use uuid::Uuid;

/// Fail unless `value` has visible content
pub(crate) fn require_non_empty(kind: EntityKind, field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(kind, field, "must not be empty"));
    }
    Ok(())
}

/// Fail unless every id is a UUID
pub(crate) fn validate_object_ids(kind: EntityKind, field: &str, ids: &[String]) -> Result<()> {
    for id in ids {
        if Uuid::parse_str(id).is_err() {
            return Err(Error::validation(
                kind,
                field,
                format!("{id:?} is not a valid UUID"),
            ));
        }
    }
    Ok(())
}

/// Fail unless `value` is one of `allowed`
pub(crate) fn validate_one_of(
    kind: EntityKind,
    field: &str,
    value: &str,
    allowed: &[&str],
) -> Result<()> {
    if allowed.contains(&value) {
        return Ok(());
    }
    Err(Error::validation(
        kind,
        field,
        format!("{value:?} is not one of {}", allowed.join(", ")),
    ))
}

/// Whether any of `fields` is among the planned changes
pub(crate) fn touches(changes: &[Change], fields: &[&str]) -> bool {
    changes
        .iter()
        .any(|change| fields.contains(&change.field.as_str()))
}

/// Create an entity that carries owners.
///
/// With a known caller the entity is created with the caller as its only
/// owner, the desired owners are added, `then` runs (members, nested
/// collections), and the caller is removed last unless it is a desired
/// owner. Without a caller the desired owners are added right after
/// creation.
pub(crate) fn create_owned<T, F>(
    ctx: &ApplyContext,
    entity: &T,
    owners: Option<&[String]>,
    then: F,
) -> Result<String>
where
    T: Entity,
    F: FnOnce(&mut Journal) -> Result<()>,
{
    let desired = owners.unwrap_or_default();
    let bootstrap = ctx
        .caller()
        .map(|caller| OwnerBootstrap::new(caller, desired));
    let initial = bootstrap.map(|b| b.initial_owners()).unwrap_or_default();

    let mut journal = ctx.journal(T::KIND, None);
    let id = create_step(ctx, &mut journal, entity, &initial)?;

    match bootstrap {
        Some(bootstrap) => bootstrap.add_desired::<T>(&ctx.client, &mut journal)?,
        None => {
            let owners = RelationDelta::compute(&[], desired).to_add;
            add_to_relation::<T>(&ctx.client, &mut journal, Relation::Owners, &owners)?;
        }
    }

    then(&mut journal)?;

    if let Some(bootstrap) = bootstrap {
        bootstrap.release::<T>(&ctx.client, &mut journal)?;
    }
    Ok(id)
}

/// Create an entity without owners
pub(crate) fn create_unowned<T: Entity>(ctx: &ApplyContext, entity: &T) -> Result<String> {
    let mut journal = ctx.journal(T::KIND, None);
    create_step(ctx, &mut journal, entity, &[])
}

/// Issue the create call and wait until the new object can be read back
fn create_step<T: Entity>(
    ctx: &ApplyContext,
    journal: &mut Journal,
    entity: &T,
    initial_owners: &[String],
) -> Result<String> {
    let accessor = ctx.client.accessor::<T>();
    let created = journal.step(format!("creating {}", T::KIND), || {
        accessor.create(entity, initial_owners)
    })?;
    let id = created
        .id()
        .map(str::to_string)
        .ok_or_else(|| Error::InvalidResponse(format!("created {} has no object ID", T::KIND)))?;
    journal.set_id(&id);

    journal.read(|| ctx.client.wait_until_readable::<T>(&id))?;
    log::info!("created {} {id}", T::KIND);
    Ok(id)
}

/// Reconcile owners when the configuration manages them
pub(crate) fn reconcile_owners<T: Entity>(
    ctx: &ApplyContext,
    journal: &mut Journal,
    owners: Option<&[String]>,
) -> Result<()> {
    if let Some(owners) = owners {
        reconcile_relation::<T>(&ctx.client, journal, Relation::Owners, owners, ctx.caller())?;
    }
    Ok(())
}

/// Read a relation for diffing, only when the configuration manages it
pub(crate) fn observed_relation<T: Entity>(
    ctx: &ApplyContext,
    id: &str,
    relation: Relation,
    desired: Option<&[String]>,
) -> Result<Vec<String>> {
    match desired {
        Some(_) => ctx.client.accessor::<T>().list_relation(id, relation),
        None => Ok(Vec::new()),
    }
}

/// Delete an entity; an object that is already gone is an error
pub(crate) fn delete_entity<T: Entity>(ctx: &ApplyContext, id: &str) -> Result<()> {
    if ctx.client.accessor::<T>().delete(id)? {
        log::info!("deleted {} {id}", T::KIND);
        Ok(())
    } else {
        Err(Error::not_found(T::KIND, id))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use converge::ApplyContext;
    use graphkit::{Client, ConsistencyConfig, MockBackend};
    use std::sync::Arc;
    use std::time::Duration;

    pub const CALLER: &str = "9f1c0b2e-0000-4000-8000-00000000ca11";
    pub const U1: &str = "11111111-1111-4111-8111-111111111111";
    pub const U2: &str = "22222222-2222-4222-8222-222222222222";
    pub const U3: &str = "33333333-3333-4333-8333-333333333333";
    pub const U4: &str = "44444444-4444-4444-8444-444444444444";

    /// Context over a fresh mock backend, acting as [`CALLER`]
    pub fn context() -> (MockBackend, ApplyContext) {
        let mock = MockBackend::new();
        (mock.clone(), context_for(mock))
    }

    /// Context over an existing mock backend, acting as [`CALLER`]
    pub fn context_for(mock: MockBackend) -> ApplyContext {
        let client = Client::with_backend(Arc::new(mock)).with_consistency(ConsistencyConfig {
            attempts: 4,
            base_delay: Duration::from_millis(1),
        });
        ApplyContext::new(client).with_caller(CALLER)
    }

    pub fn ids(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use graphkit::backend::{Call, Operation};
    use graphkit::{Application, Domain, Group, MockBackend};

    #[test]
    fn test_validate_object_ids() {
        assert!(validate_object_ids(EntityKind::Group, "owners", &ids(&[U1, U2])).is_ok());
        let err = validate_object_ids(EntityKind::Group, "owners", &ids(&[U1, "bob"])).unwrap_err();
        assert!(err.to_string().contains("\"bob\""));
    }

    #[test]
    fn test_require_non_empty() {
        assert!(require_non_empty(EntityKind::User, "display_name", "Ada").is_ok());
        assert!(require_non_empty(EntityKind::User, "display_name", "  ").is_err());
    }

    #[test]
    fn test_touches() {
        let changes = vec![Change::new("members", "1 item", "2 items")];
        assert!(touches(&changes, &["members", "owners"]));
        assert!(!touches(&changes, &["display_name"]));
    }

    #[test]
    fn test_create_owned_bootstraps_and_releases_caller() {
        let (mock, ctx) = context();
        let group = Group {
            display_name: Some("Ops".into()),
            ..Group::default()
        };
        let owners = ids(&[U1]);

        let id = create_owned(&ctx, &group, Some(&owners), |_| Ok(())).unwrap();

        assert_eq!(mock.relation(EntityKind::Group, &id, Relation::Owners), ids(&[U1]));
        let calls = mock.writes();
        assert!(matches!(&calls[0], Call::Create { owners, .. } if owners == &ids(&[CALLER])));
        assert!(matches!(&calls[1], Call::AddRelation { ids: added, .. } if added == &ids(&[U1])));
        assert!(matches!(&calls[2], Call::RemoveRelation { ids: removed, .. } if removed == &ids(&[CALLER])));
        assert_eq!(calls.len(), 3);
    }

    #[test]
    fn test_create_owned_keeps_caller_when_desired() {
        let (mock, ctx) = context();
        let owners = ids(&[&CALLER.to_uppercase(), U1]);

        let id = create_owned(&ctx, &Application::default(), Some(&owners), |_| Ok(())).unwrap();

        let current = mock.relation(EntityKind::Application, &id, Relation::Owners);
        assert!(current.contains(&CALLER.to_string()));
        assert!(current.contains(&U1.to_string()));
        assert!(
            !mock
                .writes()
                .iter()
                .any(|call| call.operation() == Operation::RemoveRelation)
        );
    }

    #[test]
    fn test_create_owned_without_caller() {
        let mock = MockBackend::new();
        let ctx = ApplyContext::new(graphkit::Client::with_backend(std::sync::Arc::new(mock.clone())));
        let owners = ids(&[U1, U1, U2]);

        let id = create_owned(&ctx, &Group::default(), Some(&owners), |_| Ok(())).unwrap();

        assert_eq!(mock.relation(EntityKind::Group, &id, Relation::Owners), ids(&[U1, U2]));
        assert!(matches!(&mock.writes()[0], Call::Create { owners, .. } if owners.is_empty()));
    }

    #[test]
    fn test_create_owned_waits_for_read_lag() {
        let mock = MockBackend::new().with_read_lag(2);
        let ctx = context_for(mock.clone());

        let id = create_owned(&ctx, &Group::default(), None, |_| Ok(())).unwrap();
        assert!(mock.object(EntityKind::Group, &id).is_some());
    }

    #[test]
    fn test_create_owned_partial_failure_names_object() {
        let (mock, ctx) = context();
        mock.fail_next(Operation::AddRelation, 403, "Insufficient privileges");
        let owners = ids(&[U1]);

        let err = create_owned(&ctx, &Group::default(), Some(&owners), |_| Ok(())).unwrap_err();
        match err {
            Error::PartialReconciliation { id, completed, .. } => {
                assert!(id.is_some());
                assert_eq!(completed, vec!["creating group".to_string()]);
            }
            other => panic!("expected partial reconciliation, got {other:?}"),
        }
    }

    #[test]
    fn test_delete_entity_missing_is_error() {
        let (mock, ctx) = context();
        let id = mock.insert(&Domain {
            id: Some("contoso.com".into()),
            ..Domain::default()
        });
        delete_entity::<Domain>(&ctx, &id).unwrap();

        let err = delete_entity::<Domain>(&ctx, &id).unwrap_err();
        assert!(err.is_not_found());
    }
}
