//! Typed directory entities.
//!
//! Each entity is an explicit serde structure using the API's camelCase
//! field names. Optional fields that are `None` are left out of request
//! bodies, which turns a serialized entity into a partial PATCH. The few
//! conditional access fields that must be clearable are sent as `null`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kinds of directory entities managed by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Application,
    ConditionalAccessPolicy,
    Domain,
    Group,
    ServicePrincipal,
    User,
}

impl EntityKind {
    /// All entity kinds, in configuration order.
    pub const ALL: [EntityKind; 6] = [
        Self::Application,
        Self::ConditionalAccessPolicy,
        Self::Domain,
        Self::Group,
        Self::ServicePrincipal,
        Self::User,
    ];

    /// API collection path, relative to the versioned base URL.
    #[must_use]
    pub fn collection(&self) -> &'static str {
        match self {
            Self::Application => "applications",
            Self::ConditionalAccessPolicy => "identity/conditionalAccess/policies",
            Self::Domain => "domains",
            Self::Group => "groups",
            Self::ServicePrincipal => "servicePrincipals",
            Self::User => "users",
        }
    }

    /// Identifier used in configuration files and resource addresses.
    #[must_use]
    pub fn resource_type(&self) -> &'static str {
        match self {
            Self::Application => "application",
            Self::ConditionalAccessPolicy => "conditional_access_policy",
            Self::Domain => "domain",
            Self::Group => "group",
            Self::ServicePrincipal => "service_principal",
            Self::User => "user",
        }
    }

    /// Whether the entity carries the given relation.
    #[must_use]
    pub fn supports(&self, relation: Relation) -> bool {
        match relation {
            Relation::Owners => matches!(
                self,
                Self::Application | Self::Group | Self::ServicePrincipal
            ),
            Relation::Members => matches!(self, Self::Group),
        }
    }

    /// Whether initial owners can be bound in the create request itself.
    #[must_use]
    pub fn binds_owners_on_create(&self) -> bool {
        matches!(self, Self::Group)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Application => "application",
            Self::ConditionalAccessPolicy => "conditional access policy",
            Self::Domain => "domain",
            Self::Group => "group",
            Self::ServicePrincipal => "service principal",
            Self::User => "user",
        };
        write!(f, "{name}")
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.resource_type() == normalized)
            .ok_or_else(|| format!("unknown resource type: {s}"))
    }
}

/// Set-valued relations between entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Owners,
    Members,
}

impl Relation {
    /// API path segment of the relation.
    #[must_use]
    pub fn path(&self) -> &'static str {
        match self {
            Self::Owners => "owners",
            Self::Members => "members",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path())
    }
}

/// A directory entity with a stable remote identifier.
pub trait Entity: Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync {
    /// Kind of entity this type represents.
    const KIND: EntityKind;

    /// Remote object ID, absent until created.
    fn id(&self) -> Option<&str>;

    /// Display name used by the duplicate-name guard.
    fn display_name(&self) -> Option<&str>;
}

// =============================================================================
// Groups
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_types: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail_nickname: Option<String>,
}

impl Entity for Group {
    const KIND: EntityKind = EntityKind::Group;

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }
}

// =============================================================================
// Applications
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Client ID, assigned by the server.
    #[serde(default, skip_serializing)]
    pub app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign_in_audience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier_uris: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_roles: Option<Vec<AppRole>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<ApiApplication>,
}

impl Application {
    /// OAuth2 permission scopes, empty when the API block is unset.
    #[must_use]
    pub fn permission_scopes(&self) -> &[PermissionScope] {
        self.api
            .as_ref()
            .and_then(|api| api.oauth2_permission_scopes.as_deref())
            .unwrap_or_default()
    }
}

impl Entity for Application {
    const KIND: EntityKind = EntityKind::Application;

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiApplication {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth2_permission_scopes: Option<Vec<PermissionScope>>,
}

/// A role that can be assigned to users, groups or applications.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppRole {
    pub id: String,
    #[serde(default)]
    pub allowed_member_types: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub is_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// A delegated permission exposed by an application's API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionScope {
    pub id: String,
    #[serde(default)]
    pub admin_consent_description: String,
    #[serde(default)]
    pub admin_consent_display_name: String,
    #[serde(default)]
    pub is_enabled: bool,
    /// "User" or "Admin".
    #[serde(default, rename = "type")]
    pub consent_type: String,
    #[serde(default)]
    pub user_consent_description: String,
    #[serde(default)]
    pub user_consent_display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

// =============================================================================
// Service principals
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePrincipal {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    /// Inherited from the application, read only.
    #[serde(default, skip_serializing)]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_role_assignment_required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl Entity for ServicePrincipal {
    const KIND: EntityKind = EntityKind::ServicePrincipal;

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }
}

// =============================================================================
// Users
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_principal_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail_nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_enabled: Option<bool>,
    /// Write only; never returned by the API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_profile: Option<PasswordProfile>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordProfile {
    pub password: String,
    #[serde(default)]
    pub force_change_password_next_sign_in: bool,
}

impl Entity for User {
    const KIND: EntityKind = EntityKind::User;

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }
}

// =============================================================================
// Conditional access policies
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalAccessPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// "enabled", "disabled" or "enabledForReportingButNotEnforced".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<ConditionalAccessConditions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_controls: Option<GrantControls>,
    /// Serialized as `null` when unset so a PATCH clears it.
    #[serde(default)]
    pub session_controls: Option<SessionControls>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalAccessConditions {
    #[serde(default)]
    pub client_app_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applications: Option<ConditionalAccessApplications>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<ConditionalAccessUsers>,
    /// `null` clears the condition.
    #[serde(default)]
    pub locations: Option<ConditionalAccessLocations>,
    /// `null` clears the condition.
    #[serde(default)]
    pub platforms: Option<ConditionalAccessPlatforms>,
    #[serde(default)]
    pub sign_in_risk_levels: Vec<String>,
    #[serde(default)]
    pub user_risk_levels: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalAccessApplications {
    #[serde(default)]
    pub include_applications: Vec<String>,
    #[serde(default)]
    pub exclude_applications: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalAccessUsers {
    #[serde(default)]
    pub include_users: Vec<String>,
    #[serde(default)]
    pub exclude_users: Vec<String>,
    #[serde(default)]
    pub include_groups: Vec<String>,
    #[serde(default)]
    pub exclude_groups: Vec<String>,
}

/// Sign-in locations a policy applies to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalAccessLocations {
    /// Named location IDs, "All" or "AllTrusted".
    #[serde(default)]
    pub include_locations: Vec<String>,
    #[serde(default)]
    pub exclude_locations: Vec<String>,
}

/// Device platforms a policy applies to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalAccessPlatforms {
    #[serde(default)]
    pub include_platforms: Vec<String>,
    #[serde(default)]
    pub exclude_platforms: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantControls {
    /// "AND" or "OR".
    pub operator: String,
    #[serde(default)]
    pub built_in_controls: Vec<String>,
}

/// Session restrictions applied after sign-in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionControls {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_enforced_restrictions: Option<ApplicationEnforcedRestrictions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_app_security: Option<CloudAppSecurity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign_in_frequency: Option<SignInFrequency>,
}

impl SessionControls {
    /// Whether no control is set; the service reports this as an object of nulls.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.application_enforced_restrictions.is_none()
            && self.cloud_app_security.is_none()
            && self.sign_in_frequency.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationEnforcedRestrictions {
    pub is_enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudAppSecurity {
    pub is_enabled: bool,
    /// "mcasConfigured", "monitorOnly" or "blockDownloads".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_app_security_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInFrequency {
    pub is_enabled: bool,
    /// "hours" or "days".
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<u32>,
}

impl Entity for ConditionalAccessPolicy {
    const KIND: EntityKind = EntityKind::ConditionalAccessPolicy;

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }
}

// =============================================================================
// Domains
// =============================================================================

/// A domain; its object ID is the fully qualified domain name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// "Managed" or "Federated".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_default: Option<bool>,
    #[serde(default, skip_serializing)]
    pub is_verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supported_services: Option<Vec<String>>,
}

impl Entity for Domain {
    const KIND: EntityKind = EntityKind::Domain;

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn display_name(&self) -> Option<&str> {
        self.id.as_deref()
    }
}
