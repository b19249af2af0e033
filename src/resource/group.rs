//! Group resource - security and Microsoft 365 groups with owners and members

use converge::{
    ApplyContext, Change, ChangeSet, Ensure, Resource, ensure_unique, reconcile_relation,
    renamed_to,
};
use graphkit::{EntityKind, Error, Group, Relation, Result};
use serde::Deserialize;
use uuid::Uuid;

use super::{
    create_owned, delete_entity, observed_relation, reconcile_owners, require_non_empty, touches,
    validate_object_ids, validate_one_of,
};

/// The only group type the directory accepts.
pub const UNIFIED: &str = "Unified";

/// Fields written by the group PATCH.
const PATCHED_FIELDS: &[&str] = &["display_name", "description", "mail_enabled", "security_enabled"];

/// A `[[group]]` block
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupResource {
    /// Configuration label
    pub name: String,
    /// Object ID, once created
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub ensure: Ensure,
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub mail_enabled: Option<bool>,
    #[serde(default)]
    pub security_enabled: Option<bool>,
    /// Group types; only `Unified` is supported. Cannot change after creation.
    #[serde(default)]
    pub types: Vec<String>,
    /// Owner object IDs; unset leaves owners unmanaged
    #[serde(default)]
    pub owners: Option<Vec<String>>,
    /// Member object IDs; unset leaves members unmanaged
    #[serde(default)]
    pub members: Option<Vec<String>>,
    #[serde(default)]
    pub prevent_duplicate_names: bool,
}

impl GroupResource {
    fn is_unified(&self) -> bool {
        self.types.iter().any(|t| t == UNIFIED)
    }

    /// Attributes sent on create and update
    fn desired(&self) -> Group {
        Group {
            display_name: Some(self.display_name.clone()),
            description: self.description.clone(),
            mail_enabled: Some(self.mail_enabled.unwrap_or(false)),
            security_enabled: Some(self.security_enabled.unwrap_or(false)),
            ..Group::default()
        }
    }
}

impl Resource for GroupResource {
    fn kind(&self) -> EntityKind {
        EntityKind::Group
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
        format!("Group {}", self.display_name)
    }

    fn validate(&self) -> Result<()> {
        let kind = EntityKind::Group;
        require_non_empty(kind, "display_name", &self.display_name)?;

        if self.mail_enabled.is_none() && self.security_enabled.is_none() {
            return Err(Error::validation(
                kind,
                "mail_enabled",
                "at least one of `mail_enabled` or `security_enabled` must be set",
            ));
        }
        for group_type in &self.types {
            validate_one_of(kind, "types", group_type, &[UNIFIED])?;
        }
        let mail_enabled = self.mail_enabled.unwrap_or(false);
        if mail_enabled && !self.is_unified() {
            return Err(Error::validation(
                kind,
                "types",
                format!("must contain {UNIFIED:?} for mail-enabled groups"),
            ));
        }
        if !mail_enabled && self.is_unified() {
            return Err(Error::validation(
                kind,
                "mail_enabled",
                "must be true for unified groups",
            ));
        }

        validate_object_ids(kind, "owners", self.owners.as_deref().unwrap_or_default())?;
        validate_object_ids(kind, "members", self.members.as_deref().unwrap_or_default())
    }

    fn check(&self, ctx: &ApplyContext, id: Option<&str>, changes: &[Change]) -> Result<()> {
        if id.is_some() && touches(changes, &["types"]) {
            return Err(Error::validation(
                EntityKind::Group,
                "types",
                "cannot change on an existing group; delete and recreate it",
            ));
        }
        if !self.prevent_duplicate_names {
            return Ok(());
        }
        let name = match id {
            None => Some(self.display_name.as_str()),
            Some(_) => renamed_to(changes),
        };
        match name {
            Some(name) => ensure_unique::<Group>(&ctx.client, name, id),
            None => Ok(()),
        }
    }

    fn changes(&self, ctx: &ApplyContext, id: &str) -> Result<Option<Vec<Change>>> {
        let Some(current) = ctx.client.accessor::<Group>().get(id)? else {
            return Ok(None);
        };
        let desired = self.desired();

        let mut changes = ChangeSet::new();
        changes
            .field(
                "display_name",
                current.display_name.as_ref(),
                desired.display_name.as_ref(),
            )
            .field(
                "description",
                current.description.as_ref(),
                desired.description.as_ref(),
            )
            .field(
                "mail_enabled",
                current.mail_enabled.as_ref(),
                desired.mail_enabled.as_ref(),
            )
            .field(
                "security_enabled",
                current.security_enabled.as_ref(),
                desired.security_enabled.as_ref(),
            )
            .set(
                "types",
                current.group_types.as_deref().unwrap_or_default(),
                Some(self.types.as_slice()),
            );

        let owners = observed_relation::<Group>(ctx, id, Relation::Owners, self.owners.as_deref())?;
        changes.ids("owners", &owners, self.owners.as_deref());
        let members =
            observed_relation::<Group>(ctx, id, Relation::Members, self.members.as_deref())?;
        changes.ids("members", &members, self.members.as_deref());

        Ok(Some(changes.into_changes()))
    }

    fn create(&self, ctx: &ApplyContext) -> Result<String> {
        // Re-checked here to catch duplicates created during the same run
        if self.prevent_duplicate_names {
            ensure_unique::<Group>(&ctx.client, &self.display_name, None)?;
        }

        let group = Group {
            mail_nickname: Some(Uuid::new_v4().to_string()),
            group_types: (!self.types.is_empty()).then(|| self.types.clone()),
            ..self.desired()
        };

        create_owned(ctx, &group, self.owners.as_deref(), |journal| {
            if let Some(members) = &self.members {
                reconcile_relation::<Group>(
                    &ctx.client,
                    journal,
                    Relation::Members,
                    members,
                    ctx.caller(),
                )?;
            }
            Ok(())
        })
    }

    fn update(&self, ctx: &ApplyContext, id: &str, changes: &[Change]) -> Result<()> {
        let mut journal = ctx.journal(EntityKind::Group, Some(id));

        if self.prevent_duplicate_names {
            journal.read(|| ensure_unique::<Group>(&ctx.client, &self.display_name, Some(id)))?;
        }

        if touches(changes, PATCHED_FIELDS) {
            let accessor = ctx.client.accessor::<Group>();
            let desired = self.desired();
            journal.step("updating group", || accessor.update(id, &desired))?;
        }

        if let Some(members) = &self.members {
            reconcile_relation::<Group>(
                &ctx.client,
                &mut journal,
                Relation::Members,
                members,
                ctx.caller(),
            )?;
        }
        reconcile_owners::<Group>(ctx, &mut journal, self.owners.as_deref())
    }

    fn delete(&self, ctx: &ApplyContext, id: &str) -> Result<()> {
        delete_entity::<Group>(ctx, id)
    }
}
