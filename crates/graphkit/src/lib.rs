//! # graphkit
//!
//! Typed access to directory-service entities over Microsoft Graph.
//!
//! This crate provides:
//! - Entity types for groups, applications, service principals, users,
//!   conditional access policies and domains
//! - A [`Backend`](backend::Backend) trait with a Graph implementation and
//!   an in-memory mock for tests
//! - Typed [`Accessor`]s that report "not found" as `None` instead of an error
//! - An error taxonomy with categories and remediation advice
//!
//! ## Example
//!
//! ```no_run
//! use graphkit::{Client, Group};
//! use std::time::Duration;
//!
//! let client = Client::graph("token", Duration::from_secs(300));
//!
//! let groups = client.accessor::<Group>().list(None).unwrap();
//! for group in groups {
//!     println!("{}", group.display_name.unwrap_or_default());
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod accessor;
pub mod backend;
pub mod error;
pub mod types;

pub use accessor::Accessor;
pub use backend::{Backend, MockBackend};
pub use error::{Error, ErrorCategory, Result};
pub use types::{
    ApiApplication, AppRole, Application, ApplicationEnforcedRestrictions, CloudAppSecurity,
    ConditionalAccessApplications, ConditionalAccessConditions, ConditionalAccessLocations,
    ConditionalAccessPlatforms, ConditionalAccessPolicy, ConditionalAccessUsers, Domain, Entity,
    EntityKind, GrantControls, Group, PasswordProfile, PermissionScope, Relation, ServicePrincipal,
    SessionControls, SignInFrequency, User,
};

use backend::graph::GraphBackend;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound for a single wait between consistency polls.
const MAX_POLL_DELAY: Duration = Duration::from_secs(30);

/// How long to wait for a newly created object to become readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsistencyConfig {
    /// Number of reads before giving up.
    pub attempts: u32,
    /// Delay after the first miss; doubles after each further miss.
    pub base_delay: Duration,
}

impl Default for ConsistencyConfig {
    fn default() -> Self {
        Self {
            attempts: 8,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Shared handle to a directory backend.
///
/// Cloning is cheap; clones share the backend.
#[derive(Clone)]
pub struct Client {
    backend: Arc<dyn Backend>,
    consistency: ConsistencyConfig,
}

impl Client {
    /// Create a client for the public Graph endpoint.
    #[must_use]
    pub fn graph(token: impl Into<String>, timeout: Duration) -> Self {
        Self::with_backend(Arc::new(GraphBackend::new(token, timeout)))
    }

    /// Create a client with a custom backend (useful for testing).
    #[must_use]
    pub fn with_backend(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            consistency: ConsistencyConfig::default(),
        }
    }

    /// Replace the consistency wait settings.
    #[must_use]
    pub fn with_consistency(mut self, consistency: ConsistencyConfig) -> Self {
        self.consistency = consistency;
        self
    }

    /// Consistency wait settings.
    #[must_use]
    pub fn consistency(&self) -> ConsistencyConfig {
        self.consistency
    }

    /// Typed accessor for one entity kind.
    #[must_use]
    pub fn accessor<T: Entity>(&self) -> Accessor<'_, T> {
        Accessor::new(self.backend.as_ref())
    }

    /// The underlying backend.
    #[must_use]
    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// Poll until a freshly created entity can be read back.
    ///
    /// The directory is eventually consistent, so an object may be missing
    /// for a short while after its creation returned. Waits with exponential
    /// backoff and fails with [`Error::NotFound`] when all attempts miss.
    pub fn wait_until_readable<T: Entity>(&self, id: &str) -> Result<T> {
        let accessor = self.accessor::<T>();
        let mut delay = self.consistency.base_delay;
        let attempts = self.consistency.attempts.max(1);

        for attempt in 1..=attempts {
            if let Some(entity) = accessor.get(id)? {
                if attempt > 1 {
                    log::debug!("{} {id} readable after {attempt} attempts", T::KIND);
                }
                return Ok(entity);
            }
            if attempt < attempts {
                log::trace!("{} {id} not readable yet, waiting {delay:?}", T::KIND);
                std::thread::sleep(delay);
                delay = (delay * 2).min(MAX_POLL_DELAY);
            }
        }
        Err(Error::not_found(T::KIND, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> ConsistencyConfig {
        ConsistencyConfig {
            attempts: 4,
            base_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_wait_until_readable_after_lag() {
        let mock = MockBackend::new().with_read_lag(2);
        let client = Client::with_backend(Arc::new(mock.clone())).with_consistency(fast());

        let created = client
            .accessor::<Group>()
            .create(&Group::default(), &[])
            .unwrap();
        let id = created.id.unwrap();

        let group = client.wait_until_readable::<Group>(&id).unwrap();
        assert_eq!(group.id.as_deref(), Some(id.as_str()));
        assert_eq!(
            mock.calls()
                .iter()
                .filter(|c| c.operation() == backend::Operation::Get)
                .count(),
            3
        );
    }

    #[test]
    fn test_wait_until_readable_gives_up() {
        let mock = MockBackend::new();
        let client = Client::with_backend(Arc::new(mock.clone())).with_consistency(fast());

        let err = client.wait_until_readable::<User>("missing").unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: EntityKind::User, .. }));
        assert_eq!(mock.calls().len(), 4);
    }

    #[test]
    fn test_default_consistency() {
        let config = ConsistencyConfig::default();
        assert_eq!(config.attempts, 8);
        assert_eq!(config.base_delay, Duration::from_millis(500));
    }
}
