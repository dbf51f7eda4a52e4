//! Policy definition adapter contract and wire model.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A policy definition as exchanged with the remote API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<DefinitionProperties>,
}

/// Definition properties. JSON documents are `None` when null or absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_rule: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

/// Errors surfaced by an adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The record does not exist (HTTP 404).
    #[error("not found")]
    NotFound,

    /// The API answered with a non-success status.
    #[error("status {code}: {message}")]
    Status { code: u16, message: String },

    /// The request never got an answer.
    #[error("transport: {0}")]
    Transport(String),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound)
    }

    /// HTTP-like status code, if the API answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ClientError::NotFound => Some(404),
            ClientError::Status { code, .. } => Some(*code),
            ClientError::Transport(_) => None,
        }
    }
}

/// Operations the reconciler needs from the remote API.
///
/// Implementations own transport and serialization. `NotFound` must be
/// reported as [`ClientError::NotFound`], never folded into another variant.
#[async_trait]
pub trait PolicyDefinitionsApi: Send + Sync {
    /// Fetch a definition by name.
    async fn get(&self, name: &str) -> Result<PolicyDefinition, ClientError>;

    /// Create or replace a definition. Returns the record as accepted.
    async fn create_or_update(
        &self,
        name: &str,
        definition: &PolicyDefinition,
    ) -> Result<PolicyDefinition, ClientError>;

    /// Delete a definition by name.
    async fn delete(&self, name: &str) -> Result<(), ClientError>;
}
