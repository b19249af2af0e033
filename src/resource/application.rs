//! Application resource - app registrations with roles, scopes and owners

use converge::{
    AppRoles, ApplyContext, Change, ChangeSet, Ensure, PermissionScopes, Resource, ensure_unique,
    renamed_to, replace_collection,
};
use graphkit::{ApiApplication, AppRole, Application, EntityKind, Error, PermissionScope, Result};
use serde::Deserialize;
use std::collections::HashSet;

use super::{
    create_owned, delete_entity, observed_relation, reconcile_owners, require_non_empty, touches,
    validate_object_ids, validate_one_of,
};

const SIGN_IN_AUDIENCES: &[&str] = &[
    "AzureADMyOrg",
    "AzureADMultipleOrgs",
    "AzureADandPersonalMicrosoftAccount",
    "PersonalMicrosoftAccount",
];

const MEMBER_TYPES: &[&str] = &["User", "Application"];

const CONSENT_TYPES: &[&str] = &["User", "Admin"];

/// Fields written by the application PATCH.
const PATCHED_FIELDS: &[&str] = &["display_name", "sign_in_audience", "identifier_uris"];

/// A `[[application]]` block
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApplicationResource {
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub ensure: Ensure,
    pub display_name: String,
    #[serde(default)]
    pub sign_in_audience: Option<String>,
    #[serde(default)]
    pub identifier_uris: Option<Vec<String>>,
    /// App roles; unset leaves roles unmanaged, empty removes them all
    #[serde(default)]
    pub app_roles: Option<Vec<AppRoleConfig>>,
    /// OAuth2 permission scopes; unset leaves scopes unmanaged
    #[serde(default)]
    pub oauth2_permission_scopes: Option<Vec<PermissionScopeConfig>>,
    #[serde(default)]
    pub owners: Option<Vec<String>>,
    #[serde(default)]
    pub prevent_duplicate_names: bool,
}

/// An `[[application.app_roles]]` block
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppRoleConfig {
    pub id: String,
    pub allowed_member_types: Vec<String>,
    pub description: String,
    pub display_name: String,
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub value: Option<String>,
}

impl AppRoleConfig {
    fn to_role(&self) -> AppRole {
        AppRole {
            id: self.id.clone(),
            allowed_member_types: self.allowed_member_types.clone(),
            description: self.description.clone(),
            display_name: self.display_name.clone(),
            is_enabled: self.enabled,
            value: self.value.clone(),
        }
    }
}

/// An `[[application.oauth2_permission_scopes]]` block
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PermissionScopeConfig {
    pub id: String,
    pub admin_consent_description: String,
    pub admin_consent_display_name: String,
    #[serde(default = "enabled")]
    pub enabled: bool,
    /// Who can consent: `User` or `Admin`
    #[serde(default = "user_consent", rename = "type")]
    pub consent_type: String,
    #[serde(default)]
    pub user_consent_description: String,
    #[serde(default)]
    pub user_consent_display_name: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl PermissionScopeConfig {
    fn to_scope(&self) -> PermissionScope {
        PermissionScope {
            id: self.id.clone(),
            admin_consent_description: self.admin_consent_description.clone(),
            admin_consent_display_name: self.admin_consent_display_name.clone(),
            is_enabled: self.enabled,
            consent_type: self.consent_type.clone(),
            user_consent_description: self.user_consent_description.clone(),
            user_consent_display_name: self.user_consent_display_name.clone(),
            value: self.value.clone(),
        }
    }
}

fn enabled() -> bool {
    true
}

fn user_consent() -> String {
    "User".to_string()
}

impl ApplicationResource {
    fn roles(&self) -> Option<Vec<AppRole>> {
        self.app_roles
            .as_ref()
            .map(|roles| roles.iter().map(AppRoleConfig::to_role).collect())
    }

    fn scopes(&self) -> Option<Vec<PermissionScope>> {
        self.oauth2_permission_scopes
            .as_ref()
            .map(|scopes| scopes.iter().map(PermissionScopeConfig::to_scope).collect())
    }

    /// Scalar attributes sent on update
    fn desired(&self) -> Application {
        Application {
            display_name: Some(self.display_name.clone()),
            sign_in_audience: self.sign_in_audience.clone(),
            identifier_uris: self.identifier_uris.clone(),
            ..Application::default()
        }
    }

    fn validate_collections(&self) -> Result<()> {
        let kind = EntityKind::Application;
        let mut values = HashSet::new();

        let mut role_ids = HashSet::new();
        for role in self.app_roles.iter().flatten() {
            validate_object_ids(kind, "app_roles.id", std::slice::from_ref(&role.id))?;
            if !role_ids.insert(role.id.to_ascii_lowercase()) {
                return Err(Error::validation(
                    kind,
                    "app_roles.id",
                    format!("duplicate app role ID {:?}", role.id),
                ));
            }
            require_non_empty(kind, "app_roles.display_name", &role.display_name)?;
            if role.allowed_member_types.is_empty() {
                return Err(Error::validation(
                    kind,
                    "app_roles.allowed_member_types",
                    "must not be empty",
                ));
            }
            for member_type in &role.allowed_member_types {
                validate_one_of(kind, "app_roles.allowed_member_types", member_type, MEMBER_TYPES)?;
            }
            if let Some(value) = &role.value
                && !values.insert(value.clone())
            {
                return Err(Error::validation(
                    kind,
                    "app_roles.value",
                    format!("value {value:?} is used more than once"),
                ));
            }
        }

        let mut scope_ids = HashSet::new();
        for scope in self.oauth2_permission_scopes.iter().flatten() {
            validate_object_ids(
                kind,
                "oauth2_permission_scopes.id",
                std::slice::from_ref(&scope.id),
            )?;
            if !scope_ids.insert(scope.id.to_ascii_lowercase()) {
                return Err(Error::validation(
                    kind,
                    "oauth2_permission_scopes.id",
                    format!("duplicate permission scope ID {:?}", scope.id),
                ));
            }
            validate_one_of(
                kind,
                "oauth2_permission_scopes.type",
                &scope.consent_type,
                CONSENT_TYPES,
            )?;
            // role and scope values share one namespace
            if let Some(value) = &scope.value
                && !values.insert(value.clone())
            {
                return Err(Error::validation(
                    kind,
                    "oauth2_permission_scopes.value",
                    format!("value {value:?} is used more than once"),
                ));
            }
        }
        Ok(())
    }
}

impl Resource for ApplicationResource {
    fn kind(&self) -> EntityKind {
        EntityKind::Application
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
        format!("Application {}", self.display_name)
    }

    fn validate(&self) -> Result<()> {
        let kind = EntityKind::Application;
        require_non_empty(kind, "display_name", &self.display_name)?;
        if let Some(audience) = &self.sign_in_audience {
            validate_one_of(kind, "sign_in_audience", audience, SIGN_IN_AUDIENCES)?;
        }
        self.validate_collections()?;
        validate_object_ids(kind, "owners", self.owners.as_deref().unwrap_or_default())
    }

    fn check(&self, ctx: &ApplyContext, id: Option<&str>, changes: &[Change]) -> Result<()> {
        if !self.prevent_duplicate_names {
            return Ok(());
        }
        let name = match id {
            None => Some(self.display_name.as_str()),
            Some(_) => renamed_to(changes),
        };
        match name {
            Some(name) => ensure_unique::<Application>(&ctx.client, name, id),
            None => Ok(()),
        }
    }

    fn changes(&self, ctx: &ApplyContext, id: &str) -> Result<Option<Vec<Change>>> {
        let Some(current) = ctx.client.accessor::<Application>().get(id)? else {
            return Ok(None);
        };

        let mut changes = ChangeSet::new();
        changes
            .field(
                "display_name",
                current.display_name.as_ref(),
                Some(&self.display_name),
            )
            .field(
                "sign_in_audience",
                current.sign_in_audience.as_ref(),
                self.sign_in_audience.as_ref(),
            )
            .set(
                "identifier_uris",
                current.identifier_uris.as_deref().unwrap_or_default(),
                self.identifier_uris.as_deref(),
            );

        if let Some(roles) = self.roles() {
            let existing = current.app_roles.clone().unwrap_or_default();
            changes.summary(
                "app_roles",
                existing != roles,
                describe_items(&existing, |role| role.is_enabled),
                describe_items(&roles, |role| role.is_enabled),
            );
        }
        if let Some(scopes) = self.scopes() {
            let existing = current.permission_scopes();
            changes.summary(
                "oauth2_permission_scopes",
                existing != scopes.as_slice(),
                describe_items(existing, |scope| scope.is_enabled),
                describe_items(&scopes, |scope| scope.is_enabled),
            );
        }

        let owners =
            observed_relation::<Application>(ctx, id, graphkit::Relation::Owners, self.owners.as_deref())?;
        changes.ids("owners", &owners, self.owners.as_deref());

        Ok(Some(changes.into_changes()))
    }

    fn create(&self, ctx: &ApplyContext) -> Result<String> {
        if self.prevent_duplicate_names {
            ensure_unique::<Application>(&ctx.client, &self.display_name, None)?;
        }

        // A new application has nothing to disable, so roles and scopes go
        // into the create body.
        let application = Application {
            app_roles: self.roles(),
            api: self.scopes().map(|scopes| ApiApplication {
                oauth2_permission_scopes: Some(scopes),
            }),
            ..self.desired()
        };

        create_owned(ctx, &application, self.owners.as_deref(), |_| Ok(()))
    }

    fn update(&self, ctx: &ApplyContext, id: &str, changes: &[Change]) -> Result<()> {
        let mut journal = ctx.journal(EntityKind::Application, Some(id));

        if self.prevent_duplicate_names {
            journal.read(|| {
                ensure_unique::<Application>(&ctx.client, &self.display_name, Some(id))
            })?;
        }

        if touches(changes, PATCHED_FIELDS) {
            let accessor = ctx.client.accessor::<Application>();
            let desired = self.desired();
            journal.step("updating application", || accessor.update(id, &desired))?;
        }

        if let Some(roles) = self.roles() {
            replace_collection::<AppRoles>(&ctx.client, &mut journal, &roles)?;
        }
        if let Some(scopes) = self.scopes() {
            replace_collection::<PermissionScopes>(&ctx.client, &mut journal, &scopes)?;
        }

        reconcile_owners::<Application>(ctx, &mut journal, self.owners.as_deref())
    }

    fn delete(&self, ctx: &ApplyContext, id: &str) -> Result<()> {
        delete_entity::<Application>(ctx, id)
    }
}

/// Render a collection as "N items (M enabled)"
fn describe_items<T>(items: &[T], is_enabled: impl Fn(&T) -> bool) -> String {
    let enabled = items.iter().filter(|item| is_enabled(*item)).count();
    format!("{} item(s) ({enabled} enabled)", items.len())
}
