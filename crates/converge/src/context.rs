//! Apply context and callback traits
//!
//! These traits allow the converge crate to be used without depending on a
//! specific terminal UI.

use crate::journal::{Cancellation, Journal};
use crate::lock::LockRegistry;
use crate::types::ApplyResult;
use anyhow::Result;
use graphkit::{Client, EntityKind};

/// Progress callback for execution operations
///
/// Methods take `&self` because resources are applied from worker threads.
pub trait ProgressCallback: Send + Sync {
    /// Called when starting to apply a batch of resources
    fn on_batch_start(&self, count: usize);

    /// Called when starting to apply a single resource
    fn on_resource_start(&self, address: &str, description: &str);

    /// Called when a resource application completes
    fn on_resource_complete(&self, address: &str, result: &ApplyResult);

    /// Called when a batch completes
    fn on_batch_complete(&self);
}

/// Confirmation callback for user interaction
pub trait ConfirmCallback: Send {
    /// Ask the user to confirm an action
    ///
    /// # Returns
    /// `true` if the user confirmed, `false` otherwise
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_batch_start(&self, _count: usize) {}
    fn on_resource_start(&self, _address: &str, _description: &str) {}
    fn on_resource_complete(&self, _address: &str, _result: &ApplyResult) {}
    fn on_batch_complete(&self) {}
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Auto-decline callback (always returns false)
pub struct AutoDecline;

impl ConfirmCallback for AutoDecline {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(false)
    }
}

/// Everything a lifecycle call needs, passed explicitly
pub struct ApplyContext {
    /// Directory client
    pub client: Client,
    /// Object ID of the acting principal
    pub caller_id: Option<String>,
    /// Per-entity advisory locks
    pub locks: LockRegistry,
    /// Cancellation flag checked between steps
    pub cancel: Cancellation,
}

impl ApplyContext {
    /// Create a context around a client
    pub fn new(client: Client) -> Self {
        Self {
            client,
            caller_id: None,
            locks: LockRegistry::new(),
            cancel: Cancellation::new(),
        }
    }

    /// Set the acting principal
    pub fn with_caller(mut self, caller_id: impl Into<String>) -> Self {
        self.caller_id = Some(caller_id.into());
        self
    }

    /// Share a cancellation flag
    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    /// Acting principal, if known
    pub fn caller(&self) -> Option<&str> {
        self.caller_id.as_deref()
    }

    /// Start a step journal for one lifecycle call
    pub fn journal(&self, kind: EntityKind, id: Option<&str>) -> Journal {
        Journal::new(kind, id, self.cancel.clone())
    }
}
