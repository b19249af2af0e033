//! Service principal resource - the tenant-local instance of an application

use converge::{ApplyContext, Change, ChangeSet, Ensure, Resource};
use graphkit::{EntityKind, Error, Relation, Result, ServicePrincipal};
use serde::Deserialize;

use super::{
    create_owned, delete_entity, observed_relation, reconcile_owners, touches, validate_object_ids,
};

const PATCHED_FIELDS: &[&str] = &["account_enabled", "app_role_assignment_required", "tags"];

/// A `[[service_principal]]` block
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServicePrincipalResource {
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub ensure: Ensure,
    /// Client ID of the application; cannot change after creation
    pub app_id: String,
    #[serde(default)]
    pub account_enabled: Option<bool>,
    #[serde(default)]
    pub app_role_assignment_required: Option<bool>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub owners: Option<Vec<String>>,
}

impl ServicePrincipalResource {
    fn desired(&self) -> ServicePrincipal {
        ServicePrincipal {
            account_enabled: self.account_enabled,
            app_role_assignment_required: self.app_role_assignment_required,
            tags: self.tags.clone(),
            ..ServicePrincipal::default()
        }
    }
}

impl Resource for ServicePrincipalResource {
    fn kind(&self) -> EntityKind {
        EntityKind::ServicePrincipal
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn ensure(&self) -> Ensure {
        self.ensure
    }

    fn description(&self) -> String {
        format!("Service principal for {}", self.app_id)
    }

    fn validate(&self) -> Result<()> {
        let kind = EntityKind::ServicePrincipal;
        validate_object_ids(kind, "app_id", std::slice::from_ref(&self.app_id))?;
        validate_object_ids(kind, "owners", self.owners.as_deref().unwrap_or_default())
    }

    fn check(&self, _ctx: &ApplyContext, id: Option<&str>, changes: &[Change]) -> Result<()> {
        if id.is_some() && touches(changes, &["app_id"]) {
            return Err(Error::validation(
                EntityKind::ServicePrincipal,
                "app_id",
                "cannot change on an existing service principal; delete and recreate it",
            ));
        }
        Ok(())
    }

    fn changes(&self, ctx: &ApplyContext, id: &str) -> Result<Option<Vec<Change>>> {
        let Some(current) = ctx.client.accessor::<ServicePrincipal>().get(id)? else {
            return Ok(None);
        };

        let mut changes = ChangeSet::new();
        changes
            .summary(
                "app_id",
                !current
                    .app_id
                    .as_deref()
                    .is_some_and(|app_id| app_id.eq_ignore_ascii_case(&self.app_id)),
                current.app_id.as_deref().unwrap_or("(unset)"),
                self.app_id.as_str(),
            )
            .field(
                "account_enabled",
                current.account_enabled.as_ref(),
                self.account_enabled.as_ref(),
            )
            .field(
                "app_role_assignment_required",
                current.app_role_assignment_required.as_ref(),
                self.app_role_assignment_required.as_ref(),
            )
            .set(
                "tags",
                current.tags.as_deref().unwrap_or_default(),
                self.tags.as_deref(),
            );

        let owners = observed_relation::<ServicePrincipal>(
            ctx,
            id,
            Relation::Owners,
            self.owners.as_deref(),
        )?;
        changes.ids("owners", &owners, self.owners.as_deref());

        Ok(Some(changes.into_changes()))
    }

    fn create(&self, ctx: &ApplyContext) -> Result<String> {
        let service_principal = ServicePrincipal {
            app_id: Some(self.app_id.clone()),
            ..self.desired()
        };
        create_owned(ctx, &service_principal, self.owners.as_deref(), |_| Ok(()))
    }

    fn update(&self, ctx: &ApplyContext, id: &str, changes: &[Change]) -> Result<()> {
        let mut journal = ctx.journal(EntityKind::ServicePrincipal, Some(id));
        if touches(changes, PATCHED_FIELDS) {
            let accessor = ctx.client.accessor::<ServicePrincipal>();
            let desired = self.desired();
            journal.step("updating service principal", || accessor.update(id, &desired))?;
        }
        reconcile_owners::<ServicePrincipal>(ctx, &mut journal, self.owners.as_deref())
    }

    fn delete(&self, ctx: &ApplyContext, id: &str) -> Result<()> {
        delete_entity::<ServicePrincipal>(ctx, id)
    }
}
