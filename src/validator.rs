//! Request body validation against a request template.
//!
//! Validation is fail-fast: the first violation found, walking the template
//! in document order, is returned.

use crate::generator::GeneratorRegistry;
use crate::template::{JsonKind, Placeholder, TemplateNode};
use serde_json::Value;

/// First mismatch between a request body and its template.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing key at {}", display_path(.path))]
    MissingKey { path: String },

    #[error("invalid type at {}: expected {expected}, got {actual}", display_path(.path))]
    InvalidType {
        path: String,
        expected: String,
        actual: JsonKind,
    },

    #[error("invalid value at {}: expected {expected}, got {actual}", display_path(.path))]
    InvalidValue {
        path: String,
        expected: Value,
        actual: Value,
    },

    #[error("request body is not valid JSON: {0}")]
    MalformedBody(String),
}

impl ValidationError {
    /// Dotted/bracketed location of the violation, empty for the root.
    pub fn path(&self) -> Option<&str> {
        match self {
            ValidationError::MissingKey { path }
            | ValidationError::InvalidType { path, .. }
            | ValidationError::InvalidValue { path, .. } => Some(path),
            ValidationError::MalformedBody(_) => None,
        }
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "(root)"
    } else {
        path
    }
}

fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

/// Checks request bodies against templates.
pub struct RequestValidator<'a> {
    registry: &'a GeneratorRegistry,
}

impl<'a> RequestValidator<'a> {
    pub fn new(registry: &'a GeneratorRegistry) -> Self {
        Self { registry }
    }

    pub fn validate(&self, template: &TemplateNode, body: &Value) -> Result<(), ValidationError> {
        self.check(template, body, "")
    }

    fn check(&self, template: &TemplateNode, value: &Value, path: &str) -> Result<(), ValidationError> {
        if value.is_null() && !template.is_null() {
            return Err(ValidationError::MissingKey {
                path: path.to_string(),
            });
        }

        match template {
            TemplateNode::Array(items) => {
                let Value::Array(values) = value else {
                    return Err(type_mismatch(path, JsonKind::Array.as_str(), value));
                };
                // Element 0 is the schema for every element; an empty template
                // array leaves the elements unconstrained.
                if let Some(element) = items.first() {
                    for (i, item) in values.iter().enumerate() {
                        self.check(element, item, &format!("{}[{}]", path, i))?;
                    }
                }
                Ok(())
            }
            TemplateNode::Object(entries) => {
                let Value::Object(map) = value else {
                    return Err(type_mismatch(path, JsonKind::Object.as_str(), value));
                };
                for (key, child) in entries {
                    let child_path = child_path(path, key);
                    match map.get(key) {
                        Some(child_value) => self.check(child, child_value, &child_path)?,
                        None => return Err(ValidationError::MissingKey { path: child_path }),
                    }
                }
                Ok(())
            }
            TemplateNode::Placeholder(placeholder) => {
                let kind = self.registry.expected_kind(placeholder.name());
                if kind.accepts(value) {
                    Ok(())
                } else {
                    Err(type_mismatch(path, &expected_label(placeholder, kind), value))
                }
            }
            TemplateNode::Literal(expected) => {
                if literal_matches(expected, value) {
                    Ok(())
                } else {
                    Err(ValidationError::InvalidValue {
                        path: path.to_string(),
                        expected: expected.clone(),
                        actual: value.clone(),
                    })
                }
            }
        }
    }
}

fn type_mismatch(path: &str, expected: &str, value: &Value) -> ValidationError {
    ValidationError::InvalidType {
        path: path.to_string(),
        expected: expected.to_string(),
        actual: JsonKind::of(value),
    }
}

/// `string` for `<<string>>`, `email (string)` for `<<email>>`.
fn expected_label(placeholder: &Placeholder, kind: JsonKind) -> String {
    if placeholder.name() == kind.as_str() {
        kind.as_str().to_string()
    } else {
        format!("{} ({})", placeholder.name(), kind)
    }
}

/// Deep equality where `1` and `1.0` are the same number.
fn literal_matches(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
        _ => expected == actual,
    }
}
