//! User resource

use converge::{ApplyContext, Change, ChangeSet, Ensure, Resource};
use graphkit::{EntityKind, Error, PasswordProfile, Result, User};
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::sync::LazyLock;

use super::{create_unowned, delete_entity, require_non_empty, touches};

static USER_PRINCIPAL_NAME: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)+$"));

const PATCHED_FIELDS: &[&str] = &[
    "user_principal_name",
    "display_name",
    "mail_nickname",
    "account_enabled",
];

/// A `[[user]]` block
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserResource {
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub ensure: Ensure,
    pub user_principal_name: String,
    pub display_name: String,
    /// Defaults to the local part of the user principal name
    #[serde(default)]
    pub mail_nickname: Option<String>,
    #[serde(default = "enabled")]
    pub account_enabled: bool,
    /// Initial password; only sent on create and never compared
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub force_password_change: bool,
}

fn enabled() -> bool {
    true
}

impl fmt::Debug for UserResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserResource")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("ensure", &self.ensure)
            .field("user_principal_name", &self.user_principal_name)
            .field("display_name", &self.display_name)
            .field("mail_nickname", &self.mail_nickname)
            .field("account_enabled", &self.account_enabled)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("force_password_change", &self.force_password_change)
            .finish()
    }
}

impl UserResource {
    fn mail_nickname(&self) -> String {
        self.mail_nickname.clone().unwrap_or_else(|| {
            self.user_principal_name
                .split('@')
                .next()
                .unwrap_or_default()
                .to_string()
        })
    }

    fn desired(&self) -> User {
        User {
            user_principal_name: Some(self.user_principal_name.clone()),
            display_name: Some(self.display_name.clone()),
            mail_nickname: Some(self.mail_nickname()),
            account_enabled: Some(self.account_enabled),
            ..User::default()
        }
    }

    fn password_profile(&self) -> Result<PasswordProfile> {
        let password = self.password.clone().ok_or_else(|| {
            Error::validation(
                EntityKind::User,
                "password",
                "is required to create a user",
            )
        })?;
        Ok(PasswordProfile {
            password,
            force_change_password_next_sign_in: self.force_password_change,
        })
    }
}

impl Resource for UserResource {
    fn kind(&self) -> EntityKind {
        EntityKind::User
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
        format!("User {}", self.user_principal_name)
    }

    fn validate(&self) -> Result<()> {
        let kind = EntityKind::User;
        require_non_empty(kind, "display_name", &self.display_name)?;
        let pattern = USER_PRINCIPAL_NAME
            .as_ref()
            .map_err(|e| Error::Config(e.to_string()))?;
        if !pattern.is_match(&self.user_principal_name) {
            return Err(Error::validation(
                kind,
                "user_principal_name",
                format!("{:?} is not of the form alias@domain", self.user_principal_name),
            ));
        }
        if let Some(nickname) = &self.mail_nickname {
            require_non_empty(kind, "mail_nickname", nickname)?;
        }
        Ok(())
    }

    fn check(&self, _ctx: &ApplyContext, id: Option<&str>, _changes: &[Change]) -> Result<()> {
        if id.is_none() {
            self.password_profile()?;
        }
        Ok(())
    }

    fn changes(&self, ctx: &ApplyContext, id: &str) -> Result<Option<Vec<Change>>> {
        let Some(current) = ctx.client.accessor::<User>().get(id)? else {
            return Ok(None);
        };
        let desired = self.desired();

        let mut changes = ChangeSet::new();
        changes
            .field(
                "user_principal_name",
                current.user_principal_name.as_ref(),
                desired.user_principal_name.as_ref(),
            )
            .field(
                "display_name",
                current.display_name.as_ref(),
                desired.display_name.as_ref(),
            )
            .field(
                "mail_nickname",
                current.mail_nickname.as_ref(),
                desired.mail_nickname.as_ref(),
            )
            .field(
                "account_enabled",
                current.account_enabled.as_ref(),
                desired.account_enabled.as_ref(),
            );
        Ok(Some(changes.into_changes()))
    }

    fn create(&self, ctx: &ApplyContext) -> Result<String> {
        let user = User {
            password_profile: Some(self.password_profile()?),
            ..self.desired()
        };
        create_unowned(ctx, &user)
    }

    fn update(&self, ctx: &ApplyContext, id: &str, changes: &[Change]) -> Result<()> {
        if !touches(changes, PATCHED_FIELDS) {
            return Ok(());
        }
        let mut journal = ctx.journal(EntityKind::User, Some(id));
        let accessor = ctx.client.accessor::<User>();
        let desired = self.desired();
        journal.step("updating user", || accessor.update(id, &desired))
    }

    fn delete(&self, ctx: &ApplyContext, id: &str) -> Result<()> {
        delete_entity::<User>(ctx, id)
    }
}
