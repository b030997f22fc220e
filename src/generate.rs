//! Prompt-driven endpoint generation.
//!
//! The text-to-endpoint model is an injected capability; this module only
//! defines its contract and stores what it returns.

use crate::compiler::{persist_each, CompileError, CompileOutcome, CompiledOperation};
use crate::matcher::PathPattern;
use crate::model::{HttpMethod, NewDefinition, ResponseTemplate};
use crate::store::DefinitionStore;
use crate::template::TemplateNode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// One endpoint proposed by a generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedEndpoint {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub request: Option<TemplateNode>,
    #[serde(default)]
    pub response: ResponseTemplate,
}

/// Turns a free-text prompt into endpoint proposals.
#[async_trait]
pub trait EndpointGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> anyhow::Result<Vec<GeneratedEndpoint>>;
}

impl GeneratedEndpoint {
    fn into_new_definition(
        self,
        collection_id: Uuid,
        created_by: &str,
    ) -> Result<NewDefinition, CompileError> {
        let method = self
            .method
            .parse::<HttpMethod>()
            .map_err(|e| CompileError::MalformedOperation(e.to_string()))?;
        PathPattern::parse(&self.path).map_err(|e| CompileError::MalformedOperation(e.to_string()))?;
        self.response
            .validate()
            .map_err(|e| CompileError::MalformedOperation(e.to_string()))?;

        let name = if self.name.trim().is_empty() {
            format!("{} {}", method, self.path)
        } else {
            self.name
        };

        Ok(NewDefinition {
            collection_id,
            name,
            description: self.description,
            method,
            path_pattern: self.path,
            request: self.request,
            response: self.response,
            created_by: created_by.to_string(),
        })
    }
}

/// Ask `generator` for endpoints and store each one independently.
///
/// Only a failure of the generator itself is an error; invalid or
/// unstorable proposals are reported in their outcome.
pub async fn import_generated(
    generator: &dyn EndpointGenerator,
    store: &dyn DefinitionStore,
    prompt: &str,
    collection_id: Uuid,
    created_by: &str,
) -> anyhow::Result<Vec<CompileOutcome>> {
    let proposals = generator.generate(prompt).await?;
    info!(count = proposals.len(), "Generator returned endpoints");

    let compiled = proposals
        .into_iter()
        .map(|endpoint| CompiledOperation {
            path: endpoint.path.clone(),
            method: endpoint.method.to_uppercase(),
            result: endpoint.into_new_definition(collection_id, created_by),
        })
        .collect();

    Ok(persist_each(store, compiled).await)
}
