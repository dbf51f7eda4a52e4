//! Policy definition resource descriptor.
//!
//! [`FIELDS`] declares every attribute of the record. Validation, payload
//! construction and diffing all walk this table through
//! [`PolicyDefinitionState::field`] instead of touching fields ad hoc.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::clients::{DefinitionProperties, PolicyDefinition};
use crate::error::{ReconcileError, Result};
use crate::json_field::{fields_equivalent, JsonField};

/// Kind of value a field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    /// Closed set of values, compared case-insensitively.
    Enum(&'static [&'static str]),
    Json,
}

/// Schema entry for one field.
#[derive(Debug, Clone, Copy)]
pub struct FieldSchema {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    /// Only settable on create; a change means destroy and recreate.
    pub immutable: bool,
}

impl FieldSchema {
    const fn new(name: &'static str, kind: FieldKind, required: bool, immutable: bool) -> Self {
        Self {
            name,
            kind,
            required,
            immutable,
        }
    }
}

pub const FIELDS: &[FieldSchema] = &[
    FieldSchema::new("name", FieldKind::Text, true, true),
    FieldSchema::new("policy_type", FieldKind::Enum(PolicyType::VALUES), true, true),
    FieldSchema::new("mode", FieldKind::Enum(PolicyMode::VALUES), true, true),
    FieldSchema::new("display_name", FieldKind::Text, true, false),
    FieldSchema::new("description", FieldKind::Text, false, false),
    FieldSchema::new("policy_rule", FieldKind::Json, false, false),
    FieldSchema::new("metadata", FieldKind::Json, false, false),
    FieldSchema::new("parameters", FieldKind::Json, false, false),
];

/// Look up a field's schema entry.
pub fn schema(name: &str) -> Option<&'static FieldSchema> {
    FIELDS.iter().find(|f| f.name == name)
}

/// Parse an enumerated value case-insensitively, yielding the canonical spelling.
fn canonical(values: &'static [&'static str], value: &str) -> Option<&'static str> {
    values.iter().copied().find(|v| v.eq_ignore_ascii_case(value))
}

/// Who maintains a policy definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyType {
    BuiltIn,
    Custom,
    NotSpecified,
}

impl PolicyType {
    pub const VALUES: &'static [&'static str] = &["BuiltIn", "Custom", "NotSpecified"];

    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyType::BuiltIn => "BuiltIn",
            PolicyType::Custom => "Custom",
            PolicyType::NotSpecified => "NotSpecified",
        }
    }
}

impl FromStr for PolicyType {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        match canonical(Self::VALUES, s) {
            Some("BuiltIn") => Ok(PolicyType::BuiltIn),
            Some("Custom") => Ok(PolicyType::Custom),
            Some("NotSpecified") => Ok(PolicyType::NotSpecified),
            _ => Err(()),
        }
    }
}

impl fmt::Display for PolicyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which resource types a policy definition evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyMode {
    All,
    Indexed,
    NotSpecified,
}

impl PolicyMode {
    pub const VALUES: &'static [&'static str] = &["All", "Indexed", "NotSpecified"];

    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyMode::All => "All",
            PolicyMode::Indexed => "Indexed",
            PolicyMode::NotSpecified => "NotSpecified",
        }
    }
}

impl FromStr for PolicyMode {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        match canonical(Self::VALUES, s) {
            Some("All") => Ok(PolicyMode::All),
            Some("Indexed") => Ok(PolicyMode::Indexed),
            Some("NotSpecified") => Ok(PolicyMode::NotSpecified),
            _ => Err(()),
        }
    }
}

impl fmt::Display for PolicyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local record of a policy definition: desired configuration plus the
/// remote-assigned `id` once created. This is what gets persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyDefinitionState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub policy_type: String,
    pub mode: String,
    pub display_name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_rule: Option<JsonField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<JsonField>,
}

/// Borrowed value of a single field.
#[derive(Debug, Clone, Copy)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Json(Option<&'a JsonField>),
}

impl FieldValue<'_> {
    fn is_unset(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.is_empty(),
            FieldValue::Json(f) => f.map_or(true, |f| f.is_empty()),
        }
    }
}

/// A state that passed validation, with enums normalized and JSON parsed.
#[derive(Debug, Clone)]
pub struct ValidatedDefinition {
    pub name: String,
    pub policy_type: PolicyType,
    pub mode: PolicyMode,
    pub payload: PolicyDefinition,
}

impl PolicyDefinitionState {
    /// Accessor table from schema field name to value.
    pub fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        let value = match name {
            "name" => FieldValue::Text(&self.name),
            "policy_type" => FieldValue::Text(&self.policy_type),
            "mode" => FieldValue::Text(&self.mode),
            "display_name" => FieldValue::Text(&self.display_name),
            "description" => FieldValue::Text(&self.description),
            "policy_rule" => FieldValue::Json(self.policy_rule.as_ref()),
            "metadata" => FieldValue::Json(self.metadata.as_ref()),
            "parameters" => FieldValue::Json(self.parameters.as_ref()),
            _ => return None,
        };
        Some(value)
    }

    /// Check every field against the schema and build the API payload.
    ///
    /// Empty JSON text leaves the document out of the payload entirely.
    pub fn validate(&self) -> Result<ValidatedDefinition> {
        for schema in FIELDS {
            let Some(value) = self.field(schema.name) else {
                continue;
            };

            if schema.required && value.is_unset() {
                return Err(ReconcileError::MissingField { field: schema.name });
            }

            match (schema.kind, value) {
                (FieldKind::Enum(allowed), FieldValue::Text(text)) => {
                    if canonical(allowed, text).is_none() {
                        return Err(ReconcileError::InvalidEnumValue {
                            field: schema.name,
                            value: text.to_string(),
                            allowed,
                        });
                    }
                }
                (FieldKind::Json, FieldValue::Json(Some(json))) if !json.is_empty() => {
                    json.to_document(schema.name)?;
                }
                _ => {}
            }
        }

        // The loop above guarantees these parse.
        let policy_type: PolicyType = self
            .policy_type
            .parse()
            .map_err(|_| ReconcileError::InvalidEnumValue {
                field: "policy_type",
                value: self.policy_type.clone(),
                allowed: PolicyType::VALUES,
            })?;
        let mode: PolicyMode = self
            .mode
            .parse()
            .map_err(|_| ReconcileError::InvalidEnumValue {
                field: "mode",
                value: self.mode.clone(),
                allowed: PolicyMode::VALUES,
            })?;

        let properties = DefinitionProperties {
            policy_type: Some(policy_type.to_string()),
            mode: Some(mode.to_string()),
            display_name: Some(self.display_name.clone()),
            description: Some(self.description.clone()),
            policy_rule: document(&self.policy_rule, "policy_rule")?,
            metadata: document(&self.metadata, "metadata")?,
            parameters: document(&self.parameters, "parameters")?,
        };

        Ok(ValidatedDefinition {
            name: self.name.clone(),
            policy_type,
            mode,
            payload: PolicyDefinition {
                id: None,
                name: Some(self.name.clone()),
                resource_type: None,
                properties: Some(properties),
            },
        })
    }

    /// Overlay a remote record onto this state.
    ///
    /// Strings are copied verbatim. A JSON document is copied only when the
    /// remote value is non-null; otherwise the local value is left as it was.
    pub fn apply_observed(&mut self, observed: &PolicyDefinition) -> Result<()> {
        if let Some(name) = &observed.name {
            self.name = name.clone();
        }

        let Some(props) = &observed.properties else {
            return Ok(());
        };

        self.policy_type = props.policy_type.clone().unwrap_or_default();
        self.mode = props.mode.clone().unwrap_or_default();
        self.display_name = props.display_name.clone().unwrap_or_default();
        self.description = props.description.clone().unwrap_or_default();

        if let Some(rule) = &props.policy_rule {
            self.policy_rule = Some(JsonField::from_remote("policy_rule", rule)?);
        }
        if let Some(metadata) = &props.metadata {
            self.metadata = Some(JsonField::from_remote("metadata", metadata)?);
        }
        if let Some(parameters) = &props.parameters {
            self.parameters = Some(JsonField::from_remote("parameters", parameters)?);
        }

        Ok(())
    }
}

fn document(field: &Option<JsonField>, name: &'static str) -> Result<Option<serde_json::Value>> {
    match field {
        Some(json) if !json.is_empty() => json.to_document(name).map(Some),
        _ => Ok(None),
    }
}

/// Fields that differ between two states.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanDiff {
    /// Mutable fields that changed.
    pub update: Vec<&'static str>,
    /// Immutable fields that changed.
    pub replace: Vec<&'static str>,
}

impl PlanDiff {
    pub fn is_empty(&self) -> bool {
        self.update.is_empty() && self.replace.is_empty()
    }

    pub fn requires_replacement(&self) -> bool {
        !self.replace.is_empty()
    }
}

/// Compare a prior state with a proposed one.
///
/// Enumerated fields compare case-insensitively and JSON documents compare
/// structurally, so formatting differences never show up as changes.
pub fn diff(prior: &PolicyDefinitionState, proposed: &PolicyDefinitionState) -> PlanDiff {
    let mut plan = PlanDiff::default();

    for schema in FIELDS {
        let (Some(old), Some(new)) = (prior.field(schema.name), proposed.field(schema.name)) else {
            continue;
        };

        let same = match (schema.kind, old, new) {
            (FieldKind::Enum(_), FieldValue::Text(a), FieldValue::Text(b)) => {
                a.eq_ignore_ascii_case(b)
            }
            (_, FieldValue::Text(a), FieldValue::Text(b)) => a == b,
            (_, FieldValue::Json(a), FieldValue::Json(b)) => fields_equivalent(a, b),
            _ => false,
        };

        if !same {
            if schema.immutable {
                plan.replace.push(schema.name);
            } else {
                plan.update.push(schema.name);
            }
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state() -> PolicyDefinitionState {
        PolicyDefinitionState {
            id: None,
            name: "require-tag".to_string(),
            policy_type: "Custom".to_string(),
            mode: "Indexed".to_string(),
            display_name: "Require a tag".to_string(),
            description: String::new(),
            policy_rule: Some(JsonField::from(
                r#"{"if": {"field": "tags.env", "exists": "false"}, "then": {"effect": "deny"}}"#,
            )),
            metadata: None,
            parameters: None,
        }
    }

    #[test]
    fn test_schema_table_covers_accessors() {
        let s = state();
        for f in FIELDS {
            assert!(s.field(f.name).is_some(), "no accessor for {}", f.name);
        }
        assert!(s.field("unknown").is_none());
        assert!(schema("name").unwrap().immutable);
        assert!(!schema("display_name").unwrap().immutable);
    }

    #[test]
    fn test_validate_builds_payload() {
        let v = state().validate().unwrap();
        assert_eq!(v.policy_type, PolicyType::Custom);
        assert_eq!(v.mode, PolicyMode::Indexed);

        let props = v.payload.properties.unwrap();
        assert_eq!(props.policy_type.as_deref(), Some("Custom"));
        assert_eq!(
            props.policy_rule,
            Some(json!({"if": {"field": "tags.env", "exists": "false"}, "then": {"effect": "deny"}}))
        );
        assert!(props.metadata.is_none());
    }

    #[test]
    fn test_validate_enum_case_insensitive() {
        let mut s = state();
        s.policy_type = "cUsToM".to_string();
        s.mode = "all".to_string();
        let v = s.validate().unwrap();
        assert_eq!(v.policy_type, PolicyType::Custom);
        assert_eq!(v.mode, PolicyMode::All);
        let props = v.payload.properties.unwrap();
        assert_eq!(props.policy_type.as_deref(), Some("Custom"));
        assert_eq!(props.mode.as_deref(), Some("All"));
    }

    #[test]
    fn test_validate_invalid_enum() {
        let mut s = state();
        s.mode = "Microsoft.KeyVault.Data".to_string();
        match s.validate() {
            Err(ReconcileError::InvalidEnumValue { field, .. }) => assert_eq!(field, "mode"),
            other => panic!("expected InvalidEnumValue, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_missing_required() {
        let mut s = state();
        s.display_name = String::new();
        match s.validate() {
            Err(ReconcileError::MissingField { field }) => assert_eq!(field, "display_name"),
            other => panic!("expected MissingField, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_invalid_json_names_field() {
        for field in ["policy_rule", "metadata", "parameters"] {
            let mut s = state();
            let bad = Some(JsonField::from("{not json"));
            match field {
                "policy_rule" => s.policy_rule = bad,
                "metadata" => s.metadata = bad,
                _ => s.parameters = bad,
            }
            match s.validate() {
                Err(ReconcileError::InvalidJsonField { field: f, .. }) => assert_eq!(f, field),
                other => panic!("expected InvalidJsonField for {field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_validate_empty_json_skipped() {
        let mut s = state();
        s.parameters = Some(JsonField::from(""));
        let props = s.validate().unwrap().payload.properties.unwrap();
        assert!(props.parameters.is_none());
    }

    #[test]
    fn test_apply_observed_keeps_local_json_on_null() {
        let mut s = state();
        s.metadata = Some(JsonField::from(r#"{"category": "Tags"}"#));

        let observed = PolicyDefinition {
            id: Some("/subscriptions/s/providers/Microsoft.Authorization/policyDefinitions/require-tag".into()),
            name: Some("require-tag".into()),
            resource_type: None,
            properties: Some(DefinitionProperties {
                policy_type: Some("Custom".into()),
                mode: Some("Indexed".into()),
                display_name: Some("Renamed".into()),
                description: None,
                policy_rule: Some(json!({"then": {"effect": "audit"}, "if": {"field": "type"}})),
                metadata: None,
                parameters: None,
            }),
        };

        s.apply_observed(&observed).unwrap();
        assert_eq!(s.display_name, "Renamed");
        assert_eq!(
            s.policy_rule.clone().map(String::from).as_deref(),
            Some(r#"{"if":{"field":"type"},"then":{"effect":"audit"}}"#)
        );
        assert_eq!(
            s.metadata.clone().map(String::from).as_deref(),
            Some(r#"{"category": "Tags"}"#)
        );
        assert!(s.parameters.is_none());
    }

    #[test]
    fn test_diff_semantic() {
        let prior = state();
        let mut proposed = state();
        proposed.policy_rule = Some(JsonField::Parsed(
            json!({"then": {"effect": "deny"}, "if": {"exists": "false", "field": "tags.env"}}),
        ));
        proposed.policy_type = "CUSTOM".to_string();
        proposed.metadata = Some(JsonField::from(""));
        assert!(diff(&prior, &proposed).is_empty());

        proposed.description = "now documented".to_string();
        let plan = diff(&prior, &proposed);
        assert_eq!(plan.update, vec!["description"]);
        assert!(!plan.requires_replacement());
    }

    #[test]
    fn test_diff_immutable() {
        let prior = state();
        let mut proposed = state();
        proposed.mode = "All".to_string();
        proposed.display_name = "Other".to_string();
        let plan = diff(&prior, &proposed);
        assert_eq!(plan.replace, vec!["mode"]);
        assert_eq!(plan.update, vec!["display_name"]);
        assert!(plan.requires_replacement());
    }
}
