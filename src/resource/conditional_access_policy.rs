//! Conditional access policy resource

use converge::{ApplyContext, Change, ChangeSet, Ensure, Resource, ensure_unique, renamed_to};
use graphkit::{
    ApplicationEnforcedRestrictions, CloudAppSecurity, ConditionalAccessApplications,
    ConditionalAccessConditions, ConditionalAccessLocations, ConditionalAccessPlatforms,
    ConditionalAccessPolicy, ConditionalAccessUsers, EntityKind, Error, GrantControls, Result,
    SessionControls, SignInFrequency,
};
use serde::{Deserialize, Serialize};

use super::{create_unowned, delete_entity, require_non_empty, touches, validate_one_of};

const STATES: &[&str] = &["enabled", "disabled", "enabledForReportingButNotEnforced"];

const CLIENT_APP_TYPES: &[&str] = &[
    "all",
    "browser",
    "mobileAppsAndDesktopClients",
    "exchangeActiveSync",
    "easSupported",
    "other",
];

const OPERATORS: &[&str] = &["AND", "OR"];

const BUILT_IN_CONTROLS: &[&str] = &[
    "block",
    "mfa",
    "compliantDevice",
    "domainJoinedDevice",
    "approvedApplication",
    "compliantApplication",
    "passwordChange",
];

const PLATFORMS: &[&str] = &[
    "all",
    "android",
    "iOS",
    "windows",
    "windowsPhone",
    "macOS",
    "linux",
];

const RISK_LEVELS: &[&str] = &["low", "medium", "high", "hidden", "none"];

const CLOUD_APP_SECURITY_TYPES: &[&str] = &["mcasConfigured", "monitorOnly", "blockDownloads"];

const SIGN_IN_FREQUENCY_UNITS: &[&str] = &["hours", "days"];

const PATCHED_FIELDS: &[&str] = &[
    "display_name",
    "state",
    "conditions",
    "grant_controls",
    "session_controls",
];

/// A `[[conditional_access_policy]]` block
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionalAccessPolicyResource {
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub ensure: Ensure,
    pub display_name: String,
    pub state: String,
    pub conditions: ConditionsConfig,
    pub grant_controls: GrantControlsConfig,
    #[serde(default)]
    pub session_controls: Option<SessionControlsConfig>,
    #[serde(default)]
    pub prevent_duplicate_names: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionsConfig {
    pub client_app_types: Vec<String>,
    #[serde(default)]
    pub applications: ApplicationsConfig,
    #[serde(default)]
    pub users: UsersConfig,
    #[serde(default)]
    pub locations: Option<LocationsConfig>,
    #[serde(default)]
    pub platforms: Option<PlatformsConfig>,
    #[serde(default)]
    pub sign_in_risk_levels: Vec<String>,
    #[serde(default)]
    pub user_risk_levels: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocationsConfig {
    /// Named location IDs, "All" or "AllTrusted"
    pub included_locations: Vec<String>,
    #[serde(default)]
    pub excluded_locations: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformsConfig {
    pub included_platforms: Vec<String>,
    #[serde(default)]
    pub excluded_platforms: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApplicationsConfig {
    #[serde(default)]
    pub included_applications: Vec<String>,
    #[serde(default)]
    pub excluded_applications: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UsersConfig {
    #[serde(default)]
    pub included_users: Vec<String>,
    #[serde(default)]
    pub excluded_users: Vec<String>,
    #[serde(default)]
    pub included_groups: Vec<String>,
    #[serde(default)]
    pub excluded_groups: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrantControlsConfig {
    pub operator: String,
    pub built_in_controls: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionControlsConfig {
    #[serde(default)]
    pub application_enforced_restrictions: Option<ApplicationEnforcedRestrictionsConfig>,
    #[serde(default)]
    pub cloud_app_security: Option<CloudAppSecurityConfig>,
    #[serde(default)]
    pub sign_in_frequency: Option<SignInFrequencyConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApplicationEnforcedRestrictionsConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CloudAppSecurityConfig {
    pub enabled: bool,
    #[serde(default)]
    pub cloud_app_security_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignInFrequencyConfig {
    pub enabled: bool,
    /// "hours" or "days"
    #[serde(rename = "type")]
    pub unit: String,
    pub value: u32,
}

impl ConditionsConfig {
    fn to_conditions(&self) -> ConditionalAccessConditions {
        ConditionalAccessConditions {
            client_app_types: self.client_app_types.clone(),
            applications: Some(ConditionalAccessApplications {
                include_applications: self.applications.included_applications.clone(),
                exclude_applications: self.applications.excluded_applications.clone(),
            }),
            users: Some(ConditionalAccessUsers {
                include_users: self.users.included_users.clone(),
                exclude_users: self.users.excluded_users.clone(),
                include_groups: self.users.included_groups.clone(),
                exclude_groups: self.users.excluded_groups.clone(),
            }),
            locations: self.locations.as_ref().map(|l| ConditionalAccessLocations {
                include_locations: l.included_locations.clone(),
                exclude_locations: l.excluded_locations.clone(),
            }),
            platforms: self.platforms.as_ref().map(|p| ConditionalAccessPlatforms {
                include_platforms: p.included_platforms.clone(),
                exclude_platforms: p.excluded_platforms.clone(),
            }),
            sign_in_risk_levels: self.sign_in_risk_levels.clone(),
            user_risk_levels: self.user_risk_levels.clone(),
        }
    }

    fn validate(&self, kind: EntityKind) -> Result<()> {
        if self.client_app_types.is_empty() {
            return Err(Error::validation(
                kind,
                "conditions.client_app_types",
                "must name at least one client app type",
            ));
        }
        for app_type in &self.client_app_types {
            validate_one_of(kind, "conditions.client_app_types", app_type, CLIENT_APP_TYPES)?;
        }
        if self.applications.included_applications.is_empty() {
            return Err(Error::validation(
                kind,
                "conditions.applications.included_applications",
                "must name at least one application or \"All\"",
            ));
        }
        if self.users.included_users.is_empty() && self.users.included_groups.is_empty() {
            return Err(Error::validation(
                kind,
                "conditions.users",
                "must include at least one user or group",
            ));
        }
        if let Some(locations) = &self.locations
            && locations.included_locations.is_empty()
        {
            return Err(Error::validation(
                kind,
                "conditions.locations.included_locations",
                "must name at least one location, \"All\" or \"AllTrusted\"",
            ));
        }
        if let Some(platforms) = &self.platforms {
            if platforms.included_platforms.is_empty() {
                return Err(Error::validation(
                    kind,
                    "conditions.platforms.included_platforms",
                    "must name at least one platform or \"all\"",
                ));
            }
            for platform in platforms.included_platforms.iter().chain(&platforms.excluded_platforms) {
                validate_one_of(kind, "conditions.platforms", platform, PLATFORMS)?;
            }
        }
        for level in &self.sign_in_risk_levels {
            validate_one_of(kind, "conditions.sign_in_risk_levels", level, RISK_LEVELS)?;
        }
        for level in &self.user_risk_levels {
            validate_one_of(kind, "conditions.user_risk_levels", level, RISK_LEVELS)?;
        }
        Ok(())
    }
}

impl GrantControlsConfig {
    fn to_grant_controls(&self) -> GrantControls {
        GrantControls {
            operator: self.operator.clone(),
            built_in_controls: self.built_in_controls.clone(),
        }
    }
}

impl SessionControlsConfig {
    fn to_session_controls(&self) -> SessionControls {
        SessionControls {
            application_enforced_restrictions: self.application_enforced_restrictions.as_ref().map(
                |r| ApplicationEnforcedRestrictions {
                    is_enabled: r.enabled,
                },
            ),
            cloud_app_security: self.cloud_app_security.as_ref().map(|c| CloudAppSecurity {
                is_enabled: c.enabled,
                cloud_app_security_type: c.cloud_app_security_type.clone(),
            }),
            sign_in_frequency: self.sign_in_frequency.as_ref().map(|f| SignInFrequency {
                is_enabled: f.enabled,
                unit: Some(f.unit.clone()),
                value: Some(f.value),
            }),
        }
    }

    fn validate(&self, kind: EntityKind) -> Result<()> {
        if self.to_session_controls().is_empty() {
            return Err(Error::validation(
                kind,
                "session_controls",
                "must set at least one control; remove the block to clear them",
            ));
        }
        if let Some(security_type) = self
            .cloud_app_security
            .as_ref()
            .and_then(|c| c.cloud_app_security_type.as_ref())
        {
            validate_one_of(
                kind,
                "session_controls.cloud_app_security.cloud_app_security_type",
                security_type,
                CLOUD_APP_SECURITY_TYPES,
            )?;
        }
        if let Some(frequency) = &self.sign_in_frequency {
            validate_one_of(
                kind,
                "session_controls.sign_in_frequency.type",
                &frequency.unit,
                SIGN_IN_FREQUENCY_UNITS,
            )?;
            if frequency.value == 0 {
                return Err(Error::validation(
                    kind,
                    "session_controls.sign_in_frequency.value",
                    "must be at least 1",
                ));
            }
        }
        Ok(())
    }
}

/// Sorted copy of a list; the service does not preserve order
fn sorted(items: &[String]) -> Vec<String> {
    let mut items = items.to_vec();
    items.sort();
    items.dedup();
    items
}

fn normalize_conditions(conditions: &ConditionalAccessConditions) -> ConditionalAccessConditions {
    let applications = conditions.applications.clone().unwrap_or_default();
    let users = conditions.users.clone().unwrap_or_default();
    ConditionalAccessConditions {
        client_app_types: sorted(&conditions.client_app_types),
        applications: Some(ConditionalAccessApplications {
            include_applications: sorted(&applications.include_applications),
            exclude_applications: sorted(&applications.exclude_applications),
        }),
        users: Some(ConditionalAccessUsers {
            include_users: sorted(&users.include_users),
            exclude_users: sorted(&users.exclude_users),
            include_groups: sorted(&users.include_groups),
            exclude_groups: sorted(&users.exclude_groups),
        }),
        locations: conditions.locations.as_ref().map(|l| ConditionalAccessLocations {
            include_locations: sorted(&l.include_locations),
            exclude_locations: sorted(&l.exclude_locations),
        }),
        platforms: conditions.platforms.as_ref().map(|p| ConditionalAccessPlatforms {
            include_platforms: sorted(&p.include_platforms),
            exclude_platforms: sorted(&p.exclude_platforms),
        }),
        sign_in_risk_levels: sorted(&conditions.sign_in_risk_levels),
        user_risk_levels: sorted(&conditions.user_risk_levels),
    }
}

/// The service reports unset session controls as an object of nulls
fn normalize_session_controls(controls: Option<&SessionControls>) -> Option<SessionControls> {
    controls.filter(|c| !c.is_empty()).cloned()
}

fn normalize_grant_controls(controls: &GrantControls) -> GrantControls {
    GrantControls {
        operator: controls.operator.to_uppercase(),
        built_in_controls: sorted(&controls.built_in_controls),
    }
}

fn render<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "?".to_string())
}

impl ConditionalAccessPolicyResource {
    fn desired(&self) -> ConditionalAccessPolicy {
        ConditionalAccessPolicy {
            display_name: Some(self.display_name.clone()),
            state: Some(self.state.clone()),
            conditions: Some(self.conditions.to_conditions()),
            grant_controls: Some(self.grant_controls.to_grant_controls()),
            session_controls: self
                .session_controls
                .as_ref()
                .map(SessionControlsConfig::to_session_controls),
            ..ConditionalAccessPolicy::default()
        }
    }
}

impl Resource for ConditionalAccessPolicyResource {
    fn kind(&self) -> EntityKind {
        EntityKind::ConditionalAccessPolicy
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
        format!("Conditional access policy {}", self.display_name)
    }

    fn validate(&self) -> Result<()> {
        let kind = EntityKind::ConditionalAccessPolicy;
        require_non_empty(kind, "display_name", &self.display_name)?;
        validate_one_of(kind, "state", &self.state, STATES)?;

        self.conditions.validate(kind)?;

        validate_one_of(
            kind,
            "grant_controls.operator",
            &self.grant_controls.operator,
            OPERATORS,
        )?;
        if self.grant_controls.built_in_controls.is_empty() {
            return Err(Error::validation(
                kind,
                "grant_controls.built_in_controls",
                "must name at least one control",
            ));
        }
        for control in &self.grant_controls.built_in_controls {
            validate_one_of(kind, "grant_controls.built_in_controls", control, BUILT_IN_CONTROLS)?;
        }
        if let Some(session) = &self.session_controls {
            session.validate(kind)?;
        }
        Ok(())
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
            Some(name) => ensure_unique::<ConditionalAccessPolicy>(&ctx.client, name, id),
            None => Ok(()),
        }
    }

    fn changes(&self, ctx: &ApplyContext, id: &str) -> Result<Option<Vec<Change>>> {
        let Some(current) = ctx.client.accessor::<ConditionalAccessPolicy>().get(id)? else {
            return Ok(None);
        };

        let current_conditions = normalize_conditions(&current.conditions.unwrap_or_default());
        let desired_conditions = normalize_conditions(&self.conditions.to_conditions());
        let current_controls = current
            .grant_controls
            .as_ref()
            .map(normalize_grant_controls)
            .unwrap_or_default();
        let desired_controls = normalize_grant_controls(&self.grant_controls.to_grant_controls());
        let current_session = normalize_session_controls(current.session_controls.as_ref());
        let desired_session = self
            .session_controls
            .as_ref()
            .map(SessionControlsConfig::to_session_controls);
        let desired_session = normalize_session_controls(desired_session.as_ref());

        let mut changes = ChangeSet::new();
        changes
            .field(
                "display_name",
                current.display_name.as_ref(),
                Some(&self.display_name),
            )
            .field("state", current.state.as_ref(), Some(&self.state))
            .summary(
                "conditions",
                current_conditions != desired_conditions,
                render(&current_conditions),
                render(&desired_conditions),
            )
            .summary(
                "grant_controls",
                current_controls != desired_controls,
                render(&current_controls),
                render(&desired_controls),
            )
            .summary(
                "session_controls",
                current_session != desired_session,
                render(&current_session),
                render(&desired_session),
            );
        Ok(Some(changes.into_changes()))
    }

    fn create(&self, ctx: &ApplyContext) -> Result<String> {
        if self.prevent_duplicate_names {
            ensure_unique::<ConditionalAccessPolicy>(&ctx.client, &self.display_name, None)?;
        }
        create_unowned(ctx, &self.desired())
    }

    fn update(&self, ctx: &ApplyContext, id: &str, changes: &[Change]) -> Result<()> {
        if !touches(changes, PATCHED_FIELDS) {
            return Ok(());
        }
        let mut journal = ctx.journal(EntityKind::ConditionalAccessPolicy, Some(id));
        if self.prevent_duplicate_names && touches(changes, &["display_name"]) {
            journal.read(|| {
                ensure_unique::<ConditionalAccessPolicy>(&ctx.client, &self.display_name, Some(id))
            })?;
        }
        let accessor = ctx.client.accessor::<ConditionalAccessPolicy>();
        let desired = self.desired();
        journal.step("updating conditional access policy", || {
            accessor.update(id, &desired)
        })
    }

    fn delete(&self, ctx: &ApplyContext, id: &str) -> Result<()> {
        delete_entity::<ConditionalAccessPolicy>(ctx, id)
    }
}
