//! Raw field values and the field definition table.
//!
//! Every attribute source ("filetype") delivers one value per bibcode. The
//! value is classified once into a [`FieldValue`] and interpreted according
//! to the filetype's [`FieldDefinition`].

use crate::error::{NonbibError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::info;

/// Built-in field definitions, used when no table file is given
const BUILTIN_FIELD_DEFS: &str = include_str!("../config/field_defs.json");

/// A raw attribute value, classified by shape
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldValue {
    /// No value
    #[default]
    Absent,
    /// Boolean flag
    Flag(bool),
    /// Structured map
    Scalar(Map<String, Value>),
    /// Sequence of values (data link dicts, author names, read counts, ...)
    List(Vec<Value>),
    /// Number or string carried through untouched
    Plain(Value),
}

impl FieldValue {
    /// Classify a JSON value
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => Self::Absent,
            Value::Bool(b) => Self::Flag(b),
            Value::Object(map) => Self::Scalar(map),
            Value::Array(items) => Self::List(items),
            other => Self::Plain(other),
        }
    }

    /// Render back to JSON
    pub fn to_json(&self) -> Value {
        match self {
            Self::Absent => Value::Null,
            Self::Flag(b) => Value::Bool(*b),
            Self::Scalar(map) => Value::Object(map.clone()),
            Self::List(items) => Value::Array(items.clone()),
            Self::Plain(v) => v.clone(),
        }
    }

    /// Short name of the shape, used in data-quality reports
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Absent => json_type_name(&Value::Null),
            Self::Flag(_) => "flag",
            Self::Scalar(_) => "map",
            Self::List(_) => "list",
            Self::Plain(v) => json_type_name(v),
        }
    }

    /// Unwrap a `{filetype: value}` envelope, as flag sources deliver them.
    ///
    /// Values without the envelope are returned unchanged.
    pub fn flatten(self, filetype: &str) -> Self {
        match self {
            Self::Scalar(mut map) if map.contains_key(filetype) => {
                Self::from_json(map.remove(filetype).unwrap_or(Value::Null))
            }
            other => other,
        }
    }

    /// Number of entries for list values, zero otherwise
    pub fn list_len(&self) -> usize {
        match self {
            Self::List(items) => items.len(),
            _ => 0,
        }
    }

    /// True for `Flag(true)`
    pub fn is_true(&self) -> bool {
        matches!(self, Self::Flag(true))
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        Self::from_json(value)
    }
}

impl PartialEq<Value> for FieldValue {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Absent, Value::Null) => true,
            (Self::Flag(a), Value::Bool(b)) => a == b,
            (Self::Scalar(a), Value::Object(b)) => a == b,
            (Self::List(a), Value::Array(b)) => a == b,
            (Self::Plain(a), b) => a == b,
            _ => false,
        }
    }
}

/// Shape name of a JSON value; agrees with [`FieldValue::type_name`]
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "flag",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

/// Data link and property tags attached to a filetype
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtraValues {
    /// Data link type (e.g. "ESOURCE", "DATA")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_type: Option<String>,
    /// Default data link sub type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_sub_type: Option<String>,
    /// Properties added when the field carries a non-default value
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub property: BTreeSet<String>,
}

/// Static definition of one filetype
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Value the source reports when it has nothing for a bibcode
    pub default_value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_values: Option<ExtraValues>,
    /// Copy the value even when it equals the default
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub copy_default: bool,
}

impl FieldDefinition {
    /// Definition with only a default value
    pub fn new(default_value: Value) -> Self {
        Self {
            default_value,
            extra_values: None,
            copy_default: false,
        }
    }

    /// Attach extra values
    pub fn with_extra(mut self, extra: ExtraValues) -> Self {
        self.extra_values = Some(extra);
        self
    }

    /// Whether the default value is a boolean flag
    pub fn is_flag(&self) -> bool {
        self.default_value.is_boolean()
    }

    /// Whether `value` equals the default value
    pub fn is_default(&self, value: &FieldValue) -> bool {
        *value == self.default_value
    }

    /// Data link type, if this filetype produces data link rows
    pub fn link_type(&self) -> Option<&str> {
        self.extra_values.as_ref().and_then(|e| e.link_type.as_deref())
    }
}

/// Mapping from filetype to its definition, immutable once loaded
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldDefinitionTable {
    fields: BTreeMap<String, FieldDefinition>,
}

impl FieldDefinitionTable {
    /// The table shipped with the crate
    pub fn builtin() -> Result<Self> {
        Self::from_json_str(BUILTIN_FIELD_DEFS)
    }

    /// Load and validate a table from a JSON file
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let table = Self::from_json_str(&content)?;
        info!(path = ?path, fields = table.len(), "Loaded field definitions");
        Ok(table)
    }

    /// Parse and validate a table from JSON text
    pub fn from_json_str(content: &str) -> Result<Self> {
        let table: Self = serde_json::from_str(content)?;
        table.validate()?;
        Ok(table)
    }

    /// Check the invariants the converter relies on
    pub fn validate(&self) -> Result<()> {
        if !self.fields.contains_key("canonical") {
            return Err(NonbibError::FieldDefinition(
                "table has no canonical entry".to_string(),
            ));
        }
        for (filetype, def) in &self.fields {
            if let Some(extra) = &def.extra_values {
                if extra.link_type.as_deref() == Some("ESOURCE") && extra.link_sub_type.is_none() {
                    return Err(NonbibError::FieldDefinition(format!(
                        "ESOURCE field {} has no link_sub_type",
                        filetype
                    )));
                }
            }
        }
        Ok(())
    }

    /// Add or replace one definition
    pub fn insert(&mut self, filetype: impl Into<String>, def: FieldDefinition) {
        self.fields.insert(filetype.into(), def);
    }

    pub fn get(&self, filetype: &str) -> Option<&FieldDefinition> {
        self.fields.get(filetype)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
