//! Step journal and cancellation
//!
//! A lifecycle call is a sequence of remote steps. The journal records the
//! ones that completed so a failure can be reported as a partial
//! reconciliation, and checks the cancellation flag before each step.

use graphkit::{EntityKind, Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared cancellation flag.
///
/// Cancelling never interrupts a step in flight; it only prevents the next
/// step from starting.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
}

impl Cancellation {
    /// Create an unset flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Record of the mutating steps of one lifecycle call
#[derive(Debug)]
pub struct Journal {
    kind: EntityKind,
    id: Option<String>,
    completed: Vec<String>,
    cancel: Cancellation,
}

impl Journal {
    /// Start a journal for an entity
    pub fn new(kind: EntityKind, id: Option<&str>, cancel: Cancellation) -> Self {
        Self {
            kind,
            id: id.map(str::to_string),
            completed: Vec::new(),
            cancel,
        }
    }

    /// Entity kind
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Entity id, once known
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Entity id, or an error when the entity has not been created
    pub fn require_id(&self) -> Result<String> {
        self.id.clone().ok_or_else(|| {
            Error::InvalidResponse(format!("{} has no object ID yet", self.kind))
        })
    }

    /// Record the id assigned by a create step
    pub fn set_id(&mut self, id: &str) {
        self.id = Some(id.to_string());
    }

    /// Steps completed so far
    pub fn completed(&self) -> &[String] {
        &self.completed
    }

    /// Run a mutating step.
    ///
    /// Fails with `Cancelled` if cancellation was requested before the step
    /// starts. A step failure after earlier steps completed becomes
    /// `PartialReconciliation`.
    pub fn step<T>(&mut self, description: impl Into<String>, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let description = description.into();
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled {
                kind: self.kind,
                id: self.id.clone(),
                completed: self.completed.clone(),
            });
        }

        log::debug!("{} {}: {description}", self.kind, self.id.as_deref().unwrap_or("(new)"));
        match f() {
            Ok(value) => {
                self.completed.push(description);
                Ok(value)
            }
            Err(err) => Err(self.wrap(err)),
        }
    }

    /// Run a read; only failures are journaled.
    pub fn read<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        f().map_err(|err| self.wrap(err))
    }

    fn wrap(&self, err: Error) -> Error {
        if self.completed.is_empty() || matches!(err, Error::PartialReconciliation { .. }) {
            return err;
        }
        Error::PartialReconciliation {
            kind: self.kind,
            id: self.id.clone(),
            completed: self.completed.clone(),
            source: Box::new(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote() -> Error {
        Error::remote(EntityKind::Group, Some("g1"), "adding members", Some(403), "denied")
    }

    #[test]
    fn test_first_failure_is_not_partial() {
        let mut journal = Journal::new(EntityKind::Group, Some("g1"), Cancellation::new());
        let err = journal.step("adding members", || -> Result<()> { Err(remote()) }).unwrap_err();
        assert!(matches!(err, Error::Remote { .. }));
    }

    #[test]
    fn test_failure_after_steps_is_partial() {
        let mut journal = Journal::new(EntityKind::Group, Some("g1"), Cancellation::new());
        journal.step("removing members", || Ok(())).unwrap();
        let err = journal.step("adding members", || -> Result<()> { Err(remote()) }).unwrap_err();

        match err {
            Error::PartialReconciliation { completed, source, .. } => {
                assert_eq!(completed, vec!["removing members".to_string()]);
                assert_eq!(source.status(), Some(403));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_cancel_stops_next_step() {
        let cancel = Cancellation::new();
        let mut journal = Journal::new(EntityKind::Group, Some("g1"), cancel.clone());
        journal.step("first", || Ok(())).unwrap();
        cancel.cancel();

        let mut ran = false;
        let err = journal
            .step("second", || {
                ran = true;
                Ok(())
            })
            .unwrap_err();
        assert!(!ran);
        assert!(matches!(err, Error::Cancelled { ref completed, .. } if completed.len() == 1));
    }

    #[test]
    fn test_require_id() {
        let mut journal = Journal::new(EntityKind::User, None, Cancellation::new());
        assert!(journal.require_id().is_err());
        journal.set_id("u1");
        assert_eq!(journal.require_id().unwrap(), "u1");
    }
}
