//! Opaque JSON document fields.
//!
//! Configuration and state carry these as text; the remote API works with
//! structured documents. Conversion happens only when a payload is built and
//! when a remote record is observed.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{ReconcileError, Result};

/// A JSON document field, either as user/state text or as a parsed document.
///
/// Always serialized as text. Deserializes from JSON text or from an inline
/// document, so configuration files may use either spelling.
#[derive(Debug, Clone, Serialize)]
#[serde(into = "String")]
pub enum JsonField {
    Raw(String),
    Parsed(Value),
}

impl<'de> Deserialize<'de> for JsonField {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Inline(Value),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Text(text) => JsonField::Raw(text),
            Repr::Inline(value) => JsonField::Parsed(value),
        })
    }
}

impl From<JsonField> for String {
    fn from(field: JsonField) -> Self {
        match field {
            JsonField::Raw(text) => text,
            JsonField::Parsed(value) => value.to_string(),
        }
    }
}

impl From<&str> for JsonField {
    fn from(text: &str) -> Self {
        JsonField::Raw(text.to_string())
    }
}

impl From<Value> for JsonField {
    fn from(value: Value) -> Self {
        JsonField::Parsed(value)
    }
}

impl JsonField {
    /// Empty text means "not set": the field is left out of the payload.
    pub fn is_empty(&self) -> bool {
        matches!(self, JsonField::Raw(text) if text.is_empty())
    }

    /// Structured form for submission to the remote API.
    pub fn to_document(&self, field: &'static str) -> Result<Value> {
        match self {
            JsonField::Raw(text) => serde_json::from_str(text)
                .map_err(|source| ReconcileError::InvalidJsonField { field, source }),
            JsonField::Parsed(value) => Ok(value.clone()),
        }
    }

    /// Canonical text (compact, keys sorted) for a document observed remotely.
    pub fn from_remote(field: &'static str, value: &Value) -> Result<Self> {
        serde_json::to_string(value)
            .map(JsonField::Raw)
            .map_err(|source| ReconcileError::Serialize { field, source })
    }

    /// Parsed document, if the field holds valid JSON.
    fn document(&self) -> Option<Value> {
        match self {
            JsonField::Raw(text) => serde_json::from_str(text).ok(),
            JsonField::Parsed(value) => Some(value.clone()),
        }
    }

    /// Structural equality; formatting and key order are ignored.
    pub fn semantically_eq(&self, other: &JsonField) -> bool {
        match (self.document(), other.document()) {
            (Some(a), Some(b)) => a == b,
            _ => String::from(self.clone()) == String::from(other.clone()),
        }
    }
}

/// Compare two optional fields, treating empty text like an unset field.
pub fn fields_equivalent(a: Option<&JsonField>, b: Option<&JsonField>) -> bool {
    let a = a.filter(|f| !f.is_empty());
    let b = b.filter(|f| !f.is_empty());
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.semantically_eq(b),
        _ => false,
    }
}
