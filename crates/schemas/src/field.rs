//! Field definitions and per-value validation rules.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use pinkparrot_core::{DomainError, DomainResult};

/// Field identifier, unique within one schema and never reused.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(pub u64);

impl core::fmt::Display for FieldId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Type and validation descriptor of a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    String {
        min_length: Option<usize>,
        max_length: Option<usize>,
    },
    Number {
        min_value: Option<f64>,
        max_value: Option<f64>,
    },
    Boolean,
}

impl FieldKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::String { .. } => "string",
            FieldKind::Number { .. } => "number",
            FieldKind::Boolean => "boolean",
        }
    }

    /// Whether `other` describes the same value type (bounds may differ).
    pub fn same_type(&self, other: &FieldKind) -> bool {
        core::mem::discriminant(self) == core::mem::discriminant(other)
    }

    fn validate(&self) -> Result<(), String> {
        match self {
            FieldKind::String {
                min_length: Some(min),
                max_length: Some(max),
            } if min > max => Err(format!("min_length {min} exceeds max_length {max}")),
            FieldKind::Number { min_value, max_value } => {
                for bound in [min_value, max_value].into_iter().flatten() {
                    if !bound.is_finite() {
                        return Err("number bounds must be finite".to_string());
                    }
                }
                match (min_value, max_value) {
                    (Some(min), Some(max)) if min > max => {
                        Err(format!("min_value {min} exceeds max_value {max}"))
                    }
                    _ => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }

    fn check_value(&self, value: &JsonValue) -> Result<(), String> {
        match (self, value) {
            (FieldKind::String { min_length, max_length }, JsonValue::String(s)) => {
                let len = s.chars().count();
                if let Some(min) = min_length {
                    if len < *min {
                        return Err(format!("must have at least {min} characters"));
                    }
                }
                if let Some(max) = max_length {
                    if len > *max {
                        return Err(format!("must have at most {max} characters"));
                    }
                }
                Ok(())
            }
            (FieldKind::Number { min_value, max_value }, JsonValue::Number(n)) => {
                let n = n.as_f64().ok_or_else(|| "is not a representable number".to_string())?;
                if let Some(min) = min_value {
                    if n < *min {
                        return Err(format!("must be greater than or equal to {min}"));
                    }
                }
                if let Some(max) = max_value {
                    if n > *max {
                        return Err(format!("must be less than or equal to {max}"));
                    }
                }
                Ok(())
            }
            (FieldKind::Boolean, JsonValue::Bool(_)) => Ok(()),
            (kind, _) => Err(format!("must be a {}", kind.type_name())),
        }
    }
}

/// User-supplied properties of a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldProperties {
    pub name: String,
    pub label: Option<String>,
    pub hints: Option<String>,
    pub required: bool,
    pub kind: FieldKind,
}

impl FieldProperties {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            label: None,
            hints: None,
            required: false,
            kind,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Structural validation (independent of the owning schema).
    pub fn validate(&self) -> DomainResult<()> {
        if !is_slug(&self.name) {
            return Err(DomainError::validation(format!(
                "field name '{}' must be a lowercase slug",
                self.name
            )));
        }
        self.kind
            .validate()
            .map_err(|msg| DomainError::validation(format!("field '{}': {msg}", self.name)))
    }
}

/// A field as folded into schema state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub id: FieldId,
    pub properties: FieldProperties,
    pub enabled: bool,
}

impl Field {
    pub fn name(&self) -> &str {
        &self.properties.name
    }

    /// Check one value of a content payload against this field.
    ///
    /// `None` means the key is absent; absent and `null` are treated alike.
    pub fn check(&self, value: Option<&JsonValue>) -> Result<(), String> {
        match value {
            None | Some(JsonValue::Null) if self.properties.required => {
                Err(format!("field '{}' is required", self.name()))
            }
            None | Some(JsonValue::Null) => Ok(()),
            Some(v) => self
                .properties
                .kind
                .check_value(v)
                .map_err(|msg| format!("field '{}' {msg}", self.name())),
        }
    }
}

/// Lowercase slug: `[a-z0-9-]`, 1..=64 chars, no leading/trailing dash.
pub fn is_slug(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= 64
        && !s.starts_with('-')
        && !s.ends_with('-')
        && s.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}
