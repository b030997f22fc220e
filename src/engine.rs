//! The mock trigger engine.
//!
//! Resolves an inbound request to a stored definition, validates the body
//! when the verb calls for it, and synthesizes the response.

use crate::compiler::{self, CompileError, CompileOutcome};
use crate::config::EngineSettings;
use crate::error::EngineError;
use crate::generate::{self, EndpointGenerator};
use crate::generator::GeneratorRegistry;
use crate::matcher::{normalize_path, parse_query_string, RouteResolver};
use crate::model::HttpMethod;
use crate::store::{CollectionStore, DefinitionStore};
use crate::synthesizer::{RequestContext, Synthesizer};
use crate::validator::{RequestValidator, ValidationError};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One request as seen by the engine.
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    /// Collection routing key (sub-domain)
    pub collection_key: String,
    pub method: String,
    /// Path below the collection prefix
    pub path: String,
    /// Raw query string, without `?`
    pub query: Option<String>,
    /// Raw request body
    pub body: Option<Vec<u8>>,
}

/// Synthesized response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MockResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
}

impl MockResponse {
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .map(|(_, value)| value.as_str())
    }
}

/// Request counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub requests_total: u64,
    pub requests_matched: u64,
    pub requests_unmatched: u64,
}

/// Mock engine
///
/// Serves definitions from the configured stores. Holds no per-request
/// state; every response is synthesized afresh.
pub struct MockEngine {
    collections: Arc<dyn CollectionStore>,
    definitions: Arc<dyn DefinitionStore>,
    resolver: RouteResolver,
    synthesizer: Synthesizer,
    settings: EngineSettings,
    /// Total requests processed.
    requests_total: AtomicU64,
    /// Total requests matched to definitions.
    requests_matched: AtomicU64,
    /// Total requests unmatched.
    requests_unmatched: AtomicU64,
}

impl MockEngine {
    pub fn new(
        collections: Arc<dyn CollectionStore>,
        definitions: Arc<dyn DefinitionStore>,
        settings: EngineSettings,
    ) -> Self {
        Self::with_registry(
            collections,
            definitions,
            Arc::new(GeneratorRegistry::default()),
            settings,
        )
    }

    pub fn with_registry(
        collections: Arc<dyn CollectionStore>,
        definitions: Arc<dyn DefinitionStore>,
        registry: Arc<GeneratorRegistry>,
        settings: EngineSettings,
    ) -> Self {
        info!(
            match_policy = ?settings.match_policy,
            validate_patch = settings.validate_patch,
            generators = registry.names().len(),
            "Mock engine initialized"
        );

        Self {
            collections,
            definitions,
            resolver: RouteResolver::new(settings.match_policy),
            synthesizer: Synthesizer::new(registry),
            settings,
            requests_total: AtomicU64::new(0),
            requests_matched: AtomicU64::new(0),
            requests_unmatched: AtomicU64::new(0),
        }
    }

    /// Engine over a single store backing both collections and definitions.
    pub fn from_store<S>(store: Arc<S>, settings: EngineSettings) -> Self
    where
        S: CollectionStore + DefinitionStore + 'static,
    {
        Self::new(store.clone(), store, settings)
    }

    pub fn collections(&self) -> &dyn CollectionStore {
        self.collections.as_ref()
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            requests_matched: self.requests_matched.load(Ordering::Relaxed),
            requests_unmatched: self.requests_unmatched.load(Ordering::Relaxed),
        }
    }

    /// Serve one request.
    pub async fn resolve_and_serve(
        &self,
        request: InboundRequest,
    ) -> Result<MockResponse, EngineError> {
        self.requests_total.fetch_add(1, Ordering::Relaxed);

        let route = match self
            .resolver
            .resolve(
                self.collections.as_ref(),
                self.definitions.as_ref(),
                &request.collection_key,
                &request.method,
                &request.path,
            )
            .await
        {
            Ok(route) => route,
            Err(e) => {
                self.requests_unmatched.fetch_add(1, Ordering::Relaxed);
                if self.settings.log_unmatched {
                    warn!(
                        collection = %request.collection_key,
                        method = %request.method,
                        path = %request.path,
                        reason = %e,
                        "No matching definition"
                    );
                }
                return Err(e);
            }
        };

        self.requests_matched.fetch_add(1, Ordering::Relaxed);
        let definition = &route.definition;
        let path = normalize_path(&request.path);

        if self.settings.log_matches {
            info!(
                collection = %route.collection.sub_domain,
                definition_id = %definition.id,
                method = %definition.method,
                path = %path,
                "Request matched definition"
            );
        }

        let body = parse_body(request.body.as_deref());

        if let Some(template) = &definition.request {
            if self.validates(definition.method) {
                let result = body.as_ref().map_err(Clone::clone).and_then(|value| {
                    RequestValidator::new(self.synthesizer.registry()).validate(template, value)
                });
                if let Err(source) = result {
                    debug!(definition_id = %definition.id, error = %source, "Request body rejected");
                    return Err(EngineError::ValidationFailed {
                        method: definition.method.to_string(),
                        path,
                        source,
                    });
                }
            }
        }

        let response = &definition.response;
        let body = if response.template {
            let ctx = RequestContext {
                params: route.params.clone(),
                query: parse_query_string(request.query.as_deref().unwrap_or("")),
                method: definition.method.to_string(),
                path: path.clone(),
                body: body.ok().filter(|value| !value.is_null()),
            };
            self.synthesizer
                .render(&response.body, &ctx)
                .map_err(|e| EngineError::Internal(format!("template rendering failed: {}", e)))?
        } else {
            self.synthesizer.synthesize(&response.body)
        };

        let mut headers = response.headers.clone();
        if response.content_type().is_none() {
            headers.insert(
                "Content-Type".to_string(),
                self.settings.default_content_type.clone(),
            );
        }

        Ok(MockResponse {
            status: response.status,
            headers,
            body,
        })
    }

    /// Import an OpenAPI or Swagger document into a collection.
    pub async fn compile_from_openapi(
        &self,
        document: &Value,
        collection_id: Uuid,
        created_by: &str,
    ) -> Result<Vec<CompileOutcome>, CompileError> {
        compiler::compile_from_openapi(
            self.definitions.as_ref(),
            document,
            collection_id,
            created_by,
        )
        .await
    }

    /// Store the endpoints a generator proposes for `prompt`.
    pub async fn import_generated(
        &self,
        generator: &dyn EndpointGenerator,
        prompt: &str,
        collection_id: Uuid,
        created_by: &str,
    ) -> anyhow::Result<Vec<CompileOutcome>> {
        generate::import_generated(
            generator,
            self.definitions.as_ref(),
            prompt,
            collection_id,
            created_by,
        )
        .await
    }

    fn validates(&self, method: HttpMethod) -> bool {
        method.carries_body() && (method != HttpMethod::Patch || self.settings.validate_patch)
    }
}

/// An absent or empty body is `null`.
fn parse_body(raw: Option<&[u8]>) -> Result<Value, ValidationError> {
    match raw {
        None => Ok(Value::Null),
        Some(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Value::Null),
        Some(bytes) => serde_json::from_slice(bytes)
            .map_err(|e| ValidationError::MalformedBody(e.to_string())),
    }
}
