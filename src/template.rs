//! Template trees.
//!
//! A template describes the shape of a JSON document. Leaves are either
//! literal scalars or typed placeholders written as `<<type>>` strings.
//! Request templates are used to validate inbound bodies, response templates
//! are expanded into fresh data on every request.
//!
//! The marker strings are parsed once, when a template is deserialized or
//! compiled, so serving a request never has to re-inspect string contents.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^<<\s*([A-Za-z][A-Za-z0-9_]*)\s*>>$").expect("static regex")
});

/// A `<<type>>` marker. The type name is stored lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Placeholder {
    name: String,
}

impl Placeholder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.trim().to_ascii_lowercase(),
        }
    }

    /// Parse a marker string. Anything that is not exactly a marker is `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        PLACEHOLDER
            .captures(raw)
            .and_then(|caps| caps.get(1))
            .map(|name| Self::new(name.as_str()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<<{}>>", self.name)
    }
}

/// Node of a template tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum TemplateNode {
    /// String, number, boolean or null reproduced verbatim.
    Literal(Value),
    Placeholder(Placeholder),
    /// Keys in document order; every key is required.
    Object(Vec<(String, TemplateNode)>),
    Array(Vec<TemplateNode>),
}

impl Default for TemplateNode {
    fn default() -> Self {
        TemplateNode::Object(Vec::new())
    }
}

impl TemplateNode {
    pub fn parse(value: &Value) -> Self {
        match value {
            Value::String(s) => match Placeholder::parse(s) {
                Some(placeholder) => TemplateNode::Placeholder(placeholder),
                None => TemplateNode::Literal(value.clone()),
            },
            Value::Array(items) => TemplateNode::Array(items.iter().map(Self::parse).collect()),
            Value::Object(map) => TemplateNode::Object(
                map.iter()
                    .map(|(key, child)| (key.clone(), Self::parse(child)))
                    .collect(),
            ),
            scalar => TemplateNode::Literal(scalar.clone()),
        }
    }

    pub fn placeholder(name: &str) -> Self {
        TemplateNode::Placeholder(Placeholder::new(name))
    }

    /// The stored form: placeholders written back as marker strings.
    pub fn to_value(&self) -> Value {
        match self {
            TemplateNode::Literal(value) => value.clone(),
            TemplateNode::Placeholder(placeholder) => Value::String(placeholder.to_string()),
            TemplateNode::Object(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(key, child)| (key.clone(), child.to_value()))
                    .collect::<Map<String, Value>>(),
            ),
            TemplateNode::Array(items) => Value::Array(items.iter().map(Self::to_value).collect()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, TemplateNode::Literal(Value::Null))
    }

    /// Every placeholder in the tree, depth first.
    pub fn placeholders(&self) -> Vec<&Placeholder> {
        let mut found = Vec::new();
        self.collect_placeholders(&mut found);
        found
    }

    fn collect_placeholders<'a>(&'a self, found: &mut Vec<&'a Placeholder>) {
        match self {
            TemplateNode::Literal(_) => {}
            TemplateNode::Placeholder(placeholder) => found.push(placeholder),
            TemplateNode::Object(entries) => {
                for (_, child) in entries {
                    child.collect_placeholders(found);
                }
            }
            TemplateNode::Array(items) => {
                for child in items {
                    child.collect_placeholders(found);
                }
            }
        }
    }
}

impl From<Value> for TemplateNode {
    fn from(value: Value) -> Self {
        TemplateNode::parse(&value)
    }
}

impl From<TemplateNode> for Value {
    fn from(node: TemplateNode) -> Self {
        node.to_value()
    }
}

/// Runtime kind of a JSON value, as seen by validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonKind {
    Null,
    Boolean,
    Number,
    String,
    Array,
    Object,
    /// Accepts any non-null value.
    Any,
}

impl JsonKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => JsonKind::Null,
            Value::Bool(_) => JsonKind::Boolean,
            Value::Number(_) => JsonKind::Number,
            Value::String(_) => JsonKind::String,
            Value::Array(_) => JsonKind::Array,
            Value::Object(_) => JsonKind::Object,
        }
    }

    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            JsonKind::Any => !value.is_null(),
            kind => *kind == JsonKind::of(value),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JsonKind::Null => "null",
            JsonKind::Boolean => "boolean",
            JsonKind::Number => "number",
            JsonKind::String => "string",
            JsonKind::Array => "array",
            JsonKind::Object => "object",
            JsonKind::Any => "any non-null value",
        }
    }
}

impl fmt::Display for JsonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
