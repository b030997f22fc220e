//! Stored entities: collections, endpoint definitions and their templates.

use crate::template::TemplateNode;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// HTTP verbs a definition can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 5] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Delete,
        HttpMethod::Patch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
        }
    }

    /// Whether requests with this verb normally carry a body.
    pub fn carries_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported HTTP method `{0}`")]
pub struct UnsupportedMethod(pub String);

impl FromStr for HttpMethod {
    type Err = UnsupportedMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HttpMethod::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnsupportedMethod(s.to_string()))
    }
}

impl TryFrom<String> for HttpMethod {
    type Error = UnsupportedMethod;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HttpMethod> for String {
    fn from(method: HttpMethod) -> Self {
        method.as_str().to_string()
    }
}

/// Response half of a definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ResponseTemplate {
    /// HTTP status code
    #[serde(default = "default_status")]
    pub status: u16,

    /// Response headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Body template expanded on every request
    #[serde(default)]
    pub body: TemplateNode,

    /// Render `{{...}}` expressions in literal strings against the request
    #[serde(default)]
    pub template: bool,
}

fn default_status() -> u16 {
    200
}

impl Default for ResponseTemplate {
    fn default() -> Self {
        Self {
            status: default_status(),
            headers: BTreeMap::new(),
            body: TemplateNode::default(),
            template: false,
        }
    }
}

impl ResponseTemplate {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(100..=599).contains(&self.status) {
            anyhow::bail!("Invalid status code: {}", self.status);
        }
        Ok(())
    }

    /// Value of the `Content-Type` header, looked up case-insensitively.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .map(|(_, value)| value.as_str())
    }
}

/// A stored mock endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Definition {
    pub id: Uuid,
    pub collection_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub method: HttpMethod,
    pub path_pattern: String,
    /// Expected request body shape; only used for validation.
    #[serde(default)]
    pub request: Option<TemplateNode>,
    pub response: ResponseTemplate,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when creating or replacing a definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewDefinition {
    pub collection_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub method: HttpMethod,
    pub path_pattern: String,
    #[serde(default)]
    pub request: Option<TemplateNode>,
    pub response: ResponseTemplate,
    pub created_by: String,
}

impl NewDefinition {
    pub fn into_definition(self, id: Uuid, created_at: DateTime<Utc>) -> Definition {
        Definition {
            id,
            collection_id: self.collection_id,
            name: self.name,
            description: self.description,
            method: self.method,
            path_pattern: self.path_pattern,
            request: self.request,
            response: self.response,
            created_by: self.created_by,
            created_at,
        }
    }
}

/// Namespace of definitions, addressed by its unique `sub_domain`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Collection {
    pub id: Uuid,
    pub name: String,
    pub sub_domain: String,
    #[serde(default)]
    pub description: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewCollection {
    pub name: String,
    /// Derived from `name` when absent.
    #[serde(default)]
    pub sub_domain: Option<String>,
    #[serde(default)]
    pub description: String,
    pub created_by: String,
}

impl NewCollection {
    /// The routing key this collection will be stored under.
    pub fn resolved_sub_domain(&self) -> String {
        match self.sub_domain.as_deref().map(str::trim) {
            Some(explicit) if !explicit.is_empty() => explicit.to_string(),
            _ => derive_sub_domain(&self.name),
        }
    }
}

static NON_SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9-]").expect("static regex"));
static DASH_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").expect("static regex"));

/// Turn a collection name into a routing key: `"My Pet Store!"` → `"my-pet-store"`.
pub fn derive_sub_domain(name: &str) -> String {
    let lower = name.to_lowercase();
    let replaced = NON_SLUG.replace_all(&lower, "-");
    let collapsed = DASH_RUNS.replace_all(&replaced, "-");
    collapsed.trim_matches('-').to_string()
}
