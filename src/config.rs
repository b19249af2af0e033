use anyhow::{Context, Result, bail};
use converge::{BoxedResource, ExecutionPlan, Resource};
use graphkit::backend::graph::GraphBackend;
use graphkit::{Client, ConsistencyConfig};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::resource::{
    ApplicationResource, ConditionalAccessPolicyResource, DomainResource, GroupResource,
    ServicePrincipalResource, UserResource,
};

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("dirsync"))
}

/// Resolve the config file: an explicit path (with `~` expanded) or the default
pub fn config_path(explicit: Option<&str>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(PathBuf::from(shellexpand::tilde(path).as_ref())),
        None => Ok(config_dir()?.join("dirsync.toml")),
    }
}

// ============================================================================
// Provider
// ============================================================================

/// Connection settings for the directory service
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderConfig {
    pub endpoint: String,
    pub api_version: String,
    /// Environment variable holding the bearer token
    pub token_env: String,
    /// Object ID of the principal running dirsync
    pub caller_object_id: Option<String>,
    pub timeout_minutes: u64,
    pub consistency_attempts: u32,
    pub consistency_delay_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://graph.microsoft.com".to_string(),
            api_version: "v1.0".to_string(),
            token_env: "DIRSYNC_TOKEN".to_string(),
            caller_object_id: None,
            timeout_minutes: 5,
            consistency_attempts: 8,
            consistency_delay_ms: 500,
        }
    }
}

impl ProviderConfig {
    /// Read the bearer token from the configured environment variable
    pub fn token(&self) -> Result<String> {
        let token = std::env::var(&self.token_env)
            .with_context(|| format!("Set {} to a Graph access token", self.token_env))?;
        if token.trim().is_empty() {
            bail!("{} is empty", self.token_env);
        }
        Ok(token)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_minutes.saturating_mul(60))
    }

    pub fn consistency(&self) -> ConsistencyConfig {
        ConsistencyConfig {
            attempts: self.consistency_attempts.max(1),
            base_delay: Duration::from_millis(self.consistency_delay_ms),
        }
    }

    /// Build a client for the configured endpoint
    pub fn client(&self) -> Result<Client> {
        let backend = GraphBackend::with_endpoint(
            &self.endpoint,
            &self.api_version,
            self.token()?,
            self.timeout(),
        );
        log::debug!("using {}", backend.base_url());
        Ok(Client::with_backend(Arc::new(backend)).with_consistency(self.consistency()))
    }
}

// ============================================================================
// Config file
// ============================================================================

/// The dirsync configuration file
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirsyncConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub group: Vec<GroupResource>,
    #[serde(default)]
    pub application: Vec<ApplicationResource>,
    #[serde(default)]
    pub service_principal: Vec<ServicePrincipalResource>,
    #[serde(default)]
    pub user: Vec<UserResource>,
    #[serde(default)]
    pub conditional_access_policy: Vec<ConditionalAccessPolicyResource>,
    #[serde(default)]
    pub domain: Vec<DomainResource>,
}

impl DirsyncConfig {
    /// Load the config from `explicit` or ~/.config/dirsync/dirsync.toml
    pub fn load(explicit: Option<&str>) -> Result<Self> {
        let path = config_path(explicit)?;
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config: {}", path.display()))
    }

    /// Parse and check labels
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Invalid TOML format")?;
        config.check_labels()?;
        Ok(config)
    }

    fn resources(&self) -> Vec<&dyn Resource> {
        let mut resources: Vec<&dyn Resource> = Vec::new();
        resources.extend(self.group.iter().map(|r| r as &dyn Resource));
        resources.extend(self.application.iter().map(|r| r as &dyn Resource));
        resources.extend(self.service_principal.iter().map(|r| r as &dyn Resource));
        resources.extend(self.user.iter().map(|r| r as &dyn Resource));
        resources.extend(
            self.conditional_access_policy
                .iter()
                .map(|r| r as &dyn Resource),
        );
        resources.extend(self.domain.iter().map(|r| r as &dyn Resource));
        resources
    }

    /// Labels must be non-empty and unique per kind
    fn check_labels(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for resource in self.resources() {
            let name = resource.name();
            if name.trim().is_empty() {
                bail!("A {} block has an empty name", resource.kind());
            }
            if !seen.insert((resource.kind(), name.to_string())) {
                bail!("Duplicate resource {}", resource.address());
            }
        }
        Ok(())
    }

    /// Number of resource blocks
    pub fn resource_count(&self) -> usize {
        self.resources().len()
    }

    /// Turn the resource blocks into a plan, in kind order then file order
    pub fn into_plan(self) -> ExecutionPlan {
        let mut plan = ExecutionPlan::new();
        let boxed = self
            .group
            .into_iter()
            .map(|r| Box::new(r) as BoxedResource)
            .chain(self.application.into_iter().map(|r| Box::new(r) as BoxedResource))
            .chain(
                self.service_principal
                    .into_iter()
                    .map(|r| Box::new(r) as BoxedResource),
            )
            .chain(self.user.into_iter().map(|r| Box::new(r) as BoxedResource))
            .chain(
                self.conditional_access_policy
                    .into_iter()
                    .map(|r| Box::new(r) as BoxedResource),
            )
            .chain(self.domain.into_iter().map(|r| Box::new(r) as BoxedResource));
        for resource in boxed {
            plan.add_resource(resource);
        }
        plan
    }
}
