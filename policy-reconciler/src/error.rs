//! Reconciler error types.

use std::time::Duration;

use thiserror::Error;

use crate::clients::ClientError;
use crate::identity::IdentifierError;

/// Errors that can occur while reconciling a policy definition.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Locator does not have the expected shape.
    #[error(transparent)]
    MalformedIdentifier(#[from] IdentifierError),

    /// A required field is unset or empty.
    #[error("field `{field}` is required")]
    MissingField { field: &'static str },

    /// An enumerated field holds a value outside its allowed set.
    #[error("field `{field}` has invalid value {value:?}, expected one of {allowed:?}")]
    InvalidEnumValue {
        field: &'static str,
        value: String,
        allowed: &'static [&'static str],
    },

    /// An opaque JSON field could not be parsed.
    #[error("unable to parse `{field}` as JSON: {source}")]
    InvalidJsonField {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// An opaque JSON field could not be rendered back to text.
    #[error("unable to flatten JSON for `{field}`: {source}")]
    Serialize {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The desired state changes fields that can only be set on create.
    #[error("policy definition {name:?} cannot be updated in place, immutable fields changed: {fields:?}")]
    ImmutableFieldChanged {
        name: String,
        fields: Vec<&'static str>,
    },

    /// The remote API declined the write.
    #[error("creating/updating policy definition {name:?}: {source}")]
    RemoteRejected {
        name: String,
        #[source]
        source: ClientError,
    },

    /// The write was accepted but never became consistently visible.
    #[error("timed out after {timeout:?} waiting for policy definition {name:?} to become available")]
    PropagationTimeout { name: String, timeout: Duration },

    /// The caller cancelled the operation.
    #[error("operation on policy definition {name:?} was cancelled")]
    OperationCancelled { name: String },

    /// Reading the remote record failed.
    #[error("reading policy definition {name:?}: {source}")]
    RemoteReadFailed {
        name: String,
        #[source]
        source: ClientError,
    },

    /// Deleting the remote record failed.
    #[error("deleting policy definition {name:?}: {source}")]
    RemoteDeleteFailed {
        name: String,
        #[source]
        source: ClientError,
    },

    /// The remote API never reported an identifier for the record.
    #[error("remote API returned no id for policy definition {name:?}")]
    MissingRemoteId { name: String },

    /// Import target does not exist.
    #[error("policy definition {locator:?} does not exist")]
    NotFound { locator: String },
}

/// Result type for reconciler operations.
pub type Result<T> = std::result::Result<T, ReconcileError>;

impl ReconcileError {
    /// Whether retrying the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReconcileError::PropagationTimeout { .. } | ReconcileError::OperationCancelled { .. }
        )
    }
}
