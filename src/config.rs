//! Configuration for the mock server.
//!
//! Defines listener settings, engine behaviour and the collections seeded
//! into the store at startup.

use crate::compiler::{compile_from_openapi, parse_document};
use crate::generator::GeneratorRegistry;
use crate::matcher::{MatchPolicy, PathPattern};
use crate::model::{HttpMethod, NewCollection, NewDefinition, ResponseTemplate};
use crate::store::{CollectionStore, DefinitionStore};
use crate::template::TemplateNode;
use handlebars::Handlebars;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Main configuration for the mock server.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct MocketConfig {
    /// HTTP listener
    #[serde(default)]
    pub server: ServerSettings,

    /// Engine behaviour
    #[serde(default)]
    pub settings: EngineSettings,

    /// Collections created at startup
    #[serde(default)]
    pub collections: Vec<CollectionSeed>,
}

impl MocketConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.settings.default_content_type.trim().is_empty() {
            anyhow::bail!("settings.default_content_type cannot be empty");
        }

        let mut sub_domains = HashSet::new();
        for (i, collection) in self.collections.iter().enumerate() {
            collection
                .validate()
                .map_err(|e| anyhow::anyhow!("Collection {}: {}", i, e))?;

            let sub_domain = collection.to_new_collection().resolved_sub_domain();
            if !sub_domains.insert(sub_domain.clone()) {
                anyhow::bail!("Collection {}: duplicate sub-domain `{}`", i, sub_domain);
            }
        }
        Ok(())
    }

    /// Create every configured collection and its definitions.
    ///
    /// Relative `openapi` paths are resolved against `base_dir`. Returns the
    /// number of definitions stored.
    pub async fn seed_store(
        &self,
        collections: &dyn CollectionStore,
        definitions: &dyn DefinitionStore,
        base_dir: &Path,
    ) -> anyhow::Result<usize> {
        let mut stored = 0;
        let registry = GeneratorRegistry::default();

        for seed in &self.collections {
            let collection = collections
                .create_collection(seed.to_new_collection())
                .await
                .map_err(|e| anyhow::anyhow!("Collection {}: {}", seed.name, e))?;

            for definition in &seed.definitions {
                for name in definition.unknown_placeholders(&registry) {
                    warn!(
                        collection = %seed.name,
                        method = %definition.method,
                        path = %definition.path,
                        placeholder = name,
                        "Unknown placeholder, values fall back to random words"
                    );
                }
                definitions
                    .create(definition.to_new_definition(collection.id, &seed.created_by))
                    .await
                    .map_err(|e| {
                        anyhow::anyhow!("Collection {}: {} {}: {}", seed.name, definition.method, definition.path, e)
                    })?;
                stored += 1;
            }

            if let Some(openapi) = &seed.openapi {
                let path = base_dir.join(openapi);
                let text = std::fs::read_to_string(&path)
                    .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
                let document = parse_document(&text)?;
                let outcomes =
                    compile_from_openapi(definitions, &document, collection.id, &seed.created_by)
                        .await?;
                stored += outcomes.iter().filter(|o| o.is_ok()).count();
            }

            info!(
                collection = %collection.sub_domain,
                "Seeded collection"
            );
        }

        Ok(stored)
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSettings {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

/// Engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSettings {
    /// Log matched requests
    #[serde(default = "default_true")]
    pub log_matches: bool,

    /// Log unmatched requests
    #[serde(default = "default_true")]
    pub log_unmatched: bool,

    /// Content type added when a definition sets none
    #[serde(default = "default_content_type")]
    pub default_content_type: String,

    /// Validate PATCH bodies like POST and PUT
    #[serde(default = "default_true")]
    pub validate_patch: bool,

    /// Tie-break between several pattern matches
    #[serde(default)]
    pub match_policy: MatchPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            log_matches: true,
            log_unmatched: true,
            default_content_type: default_content_type(),
            validate_patch: true,
            match_policy: MatchPolicy::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_content_type() -> String {
    "application/json".to_string()
}

/// A collection created at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectionSeed {
    pub name: String,

    /// Routing key; derived from `name` when absent
    #[serde(default)]
    pub sub_domain: Option<String>,

    #[serde(default)]
    pub description: String,

    #[serde(default = "default_creator")]
    pub created_by: String,

    /// Inline definitions
    #[serde(default)]
    pub definitions: Vec<DefinitionSeed>,

    /// OpenAPI or Swagger document imported into this collection
    #[serde(default)]
    pub openapi: Option<PathBuf>,
}

fn default_creator() -> String {
    "config".to_string()
}

impl CollectionSeed {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Collection name cannot be empty");
        }
        if self.to_new_collection().resolved_sub_domain().is_empty() {
            anyhow::bail!("Collection `{}` has no usable sub-domain", self.name);
        }
        for (i, definition) in self.definitions.iter().enumerate() {
            definition
                .validate()
                .map_err(|e| anyhow::anyhow!("Definition {}: {}", i, e))?;
        }
        Ok(())
    }

    fn to_new_collection(&self) -> NewCollection {
        NewCollection {
            name: self.name.clone(),
            sub_domain: self.sub_domain.clone(),
            description: self.description.clone(),
            created_by: self.created_by.clone(),
        }
    }
}

/// An inline definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefinitionSeed {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub description: String,

    pub method: HttpMethod,

    /// Path pattern, e.g. `/users/:id`
    pub path: String,

    /// Request body template used for validation
    #[serde(default)]
    pub request: Option<TemplateNode>,

    #[serde(default)]
    pub response: ResponseTemplate,
}

impl DefinitionSeed {
    pub fn validate(&self) -> anyhow::Result<()> {
        PathPattern::parse(&self.path)?;
        self.response.validate()?;

        if let Some(marker) = self.request.as_ref().and_then(malformed_marker) {
            anyhow::bail!("Malformed placeholder in request: {}", marker);
        }
        if let Some(marker) = malformed_marker(&self.response.body) {
            anyhow::bail!("Malformed placeholder in response: {}", marker);
        }
        if self.response.template {
            let mut handlebars = Handlebars::new();
            for source in template_literals(&self.response.body) {
                handlebars
                    .register_template_string("response", source)
                    .map_err(|e| anyhow::anyhow!("Invalid response template `{}`: {}", source, e))?;
            }
        }
        Ok(())
    }

    /// Placeholder names with no registered generator.
    fn unknown_placeholders<'a>(&'a self, registry: &GeneratorRegistry) -> Vec<&'a str> {
        let request = self.request.iter().flat_map(TemplateNode::placeholders);
        request
            .chain(self.response.body.placeholders())
            .map(|placeholder| placeholder.name())
            .filter(|name| !registry.contains(name))
            .collect()
    }

    fn to_new_definition(&self, collection_id: uuid::Uuid, created_by: &str) -> NewDefinition {
        NewDefinition {
            collection_id,
            name: self
                .name
                .clone()
                .unwrap_or_else(|| format!("{} {}", self.method, self.path)),
            description: self.description.clone(),
            method: self.method,
            path_pattern: self.path.clone(),
            request: self.request.clone(),
            response: self.response.clone(),
            created_by: created_by.to_string(),
        }
    }
}

/// String literals rendered through Handlebars when `template: true`.
fn template_literals(node: &TemplateNode) -> Vec<&str> {
    match node {
        TemplateNode::Literal(serde_json::Value::String(s)) if s.contains("{{") => vec![s.as_str()],
        TemplateNode::Literal(_) | TemplateNode::Placeholder(_) => Vec::new(),
        TemplateNode::Object(entries) => entries.iter().flat_map(|(_, child)| template_literals(child)).collect(),
        TemplateNode::Array(items) => items.iter().flat_map(template_literals).collect(),
    }
}

/// A literal that looks like `<<...>>` but is not a valid placeholder.
fn malformed_marker(node: &TemplateNode) -> Option<String> {
    match node {
        TemplateNode::Literal(serde_json::Value::String(s))
            if s.trim_start().starts_with("<<") && s.trim_end().ends_with(">>") =>
        {
            Some(s.clone())
        }
        TemplateNode::Literal(_) | TemplateNode::Placeholder(_) => None,
        TemplateNode::Object(entries) => entries.iter().find_map(|(_, child)| malformed_marker(child)),
        TemplateNode::Array(items) => items.iter().find_map(malformed_marker),
    }
}
