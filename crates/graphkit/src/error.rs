//! Error types for directory operations.
//!
//! Every error carries enough context (entity kind, id, operation) to be
//! shown to the user without further wrapping. Errors are also grouped into
//! categories so callers can print matching remediation advice.

use crate::types::EntityKind;
use std::fmt;

/// Result type alias for directory operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of directory errors for user feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The entity does not exist (anymore).
    NotFound,
    /// Another entity already uses the display name.
    Conflict,
    /// The remote API rejected or failed the request.
    Remote,
    /// A multi-step reconciliation stopped partway.
    Partial,
    /// The configuration is invalid.
    Invalid,
    /// The API answered with something we could not interpret.
    Format,
}

impl ErrorCategory {
    /// Whether re-running the same operation is expected to converge.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Partial | Self::Remote)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::NotFound => "Object not found",
            Self::Conflict => "Duplicate display name",
            Self::Remote => "Directory API request failed",
            Self::Partial => "Changes were only partially applied",
            Self::Invalid => "Invalid configuration",
            Self::Format => "Unexpected API response",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::NotFound => "The object was removed outside of dirsync; drop its id to recreate it",
            Self::Conflict => "Add the existing object's id to the configuration or choose a different name",
            Self::Remote => "Check permissions and throttling, then apply again",
            Self::Partial => "Apply again; every step is safe to repeat",
            Self::Invalid => "Fix the configuration block and plan again",
            Self::Format => "Check the endpoint and API version settings",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while talking to the directory.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The entity was expected to exist but does not.
    #[error("{kind} with object ID {id:?} was not found")]
    NotFound {
        /// Kind of entity.
        kind: EntityKind,
        /// Object ID that was looked up.
        id: String,
    },

    /// The duplicate-name guard found another entity with the same name.
    #[error("existing {kind} with object ID {existing_id:?} already uses the display name {name:?}")]
    DuplicateName {
        /// Kind of entity.
        kind: EntityKind,
        /// Display name that is taken.
        name: String,
        /// Object ID of the conflicting entity.
        existing_id: String,
    },

    /// Any other failure reported by the API or the transport.
    #[error("{operation} for {kind}{}: {message}", describe_id(.id.as_deref()))]
    Remote {
        /// Kind of entity.
        kind: EntityKind,
        /// Object ID, when the entity already has one.
        id: Option<String>,
        /// Operation that was attempted.
        operation: String,
        /// HTTP status code, if a response was received.
        status: Option<u16>,
        /// Server or transport message.
        message: String,
    },

    /// A reconciliation failed after some of its steps had been applied.
    #[error(
        "{kind}{} was partially updated (completed: {}): {source}",
        describe_id(.id.as_deref()),
        .completed.join(", ")
    )]
    PartialReconciliation {
        /// Kind of entity.
        kind: EntityKind,
        /// Object ID, when known.
        id: Option<String>,
        /// Steps that completed before the failure.
        completed: Vec<String>,
        /// The failure that stopped the reconciliation.
        #[source]
        source: Box<Error>,
    },

    /// Cancellation was requested between two steps.
    #[error("{kind}{} update cancelled after {} completed step(s)", describe_id(.id.as_deref()), .completed.len())]
    Cancelled {
        /// Kind of entity.
        kind: EntityKind,
        /// Object ID, when known.
        id: Option<String>,
        /// Steps that completed before cancellation.
        completed: Vec<String>,
    },

    /// A configuration block failed validation.
    #[error("invalid {kind} configuration: {field}: {message}")]
    Validation {
        /// Kind of entity.
        kind: EntityKind,
        /// Offending field.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// Response body could not be interpreted.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// Client could not be constructed.
    #[error("client configuration error: {0}")]
    Config(String),
}

fn describe_id(id: Option<&str>) -> String {
    id.map(|id| format!(" with object ID {id:?}")).unwrap_or_default()
}

impl Error {
    /// Create a not-found error.
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Create a remote failure with full context.
    pub fn remote(
        kind: EntityKind,
        id: Option<&str>,
        operation: impl Into<String>,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        Self::Remote {
            kind,
            id: id.map(str::to_string),
            operation: operation.into(),
            status,
            message: message.into(),
        }
    }

    /// Create a validation error for a configuration field.
    pub fn validation(kind: EntityKind, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            kind,
            field: field.into(),
            message: message.into(),
        }
    }

    /// Get the error category for user feedback.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::DuplicateName { .. } => ErrorCategory::Conflict,
            Error::Remote { status: Some(404), .. } => ErrorCategory::NotFound,
            Error::Remote { .. } => ErrorCategory::Remote,
            Error::PartialReconciliation { .. } | Error::Cancelled { .. } => ErrorCategory::Partial,
            Error::Validation { .. } | Error::Config(_) => ErrorCategory::Invalid,
            Error::InvalidResponse(_) => ErrorCategory::Format,
        }
    }

    /// Whether this error means the entity is gone.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.category() == ErrorCategory::NotFound
    }

    /// HTTP status of the underlying response, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Remote { status, .. } => *status,
            Error::PartialReconciliation { source, .. } => source.status(),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}
