//! HTTP surface.
//!
//! Every request outside `/_mocket/` is mock traffic: the first path segment
//! selects the collection and the remainder is matched against its
//! definitions.

use crate::compiler::{parse_document, CompileError};
use crate::engine::{EngineStats, InboundRequest, MockEngine, MockResponse};
use crate::error::EngineError;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::warn;

pub fn build_router(engine: Arc<MockEngine>) -> Router {
    Router::new()
        .route("/_mocket/health", get(health))
        .route("/_mocket/import", post(import))
        .fallback(trigger)
        .layer(TraceLayer::new_for_http())
        .with_state(engine)
}

#[derive(Serialize)]
struct Health {
    ok: bool,
    #[serde(flatten)]
    stats: EngineStats,
}

async fn health(State(engine): State<Arc<MockEngine>>) -> Json<Health> {
    Json(Health {
        ok: true,
        stats: engine.stats(),
    })
}

#[derive(Debug, Deserialize)]
struct ImportRequest {
    /// Collection sub-domain
    collection: String,
    #[serde(default = "default_importer")]
    created_by: String,
    /// Parsed document, or its JSON/YAML text
    document: Value,
}

fn default_importer() -> String {
    "api".to_string()
}

enum ImportError {
    Engine(EngineError),
    Document(CompileError),
}

impl IntoResponse for ImportError {
    fn into_response(self) -> Response {
        match self {
            ImportError::Engine(e) => e.into_response(),
            ImportError::Document(e) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "invalid_document", "message": e.to_string() })),
            )
                .into_response(),
        }
    }
}

async fn import(
    State(engine): State<Arc<MockEngine>>,
    Json(req): Json<ImportRequest>,
) -> Result<Json<Value>, ImportError> {
    let collection = engine
        .collections()
        .find_by_sub_domain(&req.collection)
        .await
        .map_err(|e| ImportError::Engine(e.into()))?
        .ok_or_else(|| ImportError::Engine(EngineError::CollectionNotFound(req.collection.clone())))?;

    let document = match req.document {
        Value::String(text) => parse_document(&text).map_err(ImportError::Document)?,
        other => other,
    };

    let outcomes = engine
        .compile_from_openapi(&document, collection.id, &req.created_by)
        .await
        .map_err(ImportError::Document)?;

    let imported = outcomes.iter().filter(|o| o.is_ok()).count();
    Ok(Json(json!({
        "collection": collection.sub_domain,
        "imported": imported,
        "failed": outcomes.len() - imported,
        "results": outcomes,
    })))
}

async fn trigger(
    State(engine): State<Arc<MockEngine>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    let (collection_key, path) = split_collection(uri.path());
    let request = InboundRequest {
        collection_key: collection_key.to_string(),
        method: method.as_str().to_string(),
        path: path.to_string(),
        query: uri.query().map(str::to_string),
        body: (!body.is_empty()).then(|| body.to_vec()),
    };

    match engine.resolve_and_serve(request).await {
        Ok(response) => into_http(response),
        Err(e) => e.into_response(),
    }
}

/// `/shop/users/1` → (`shop`, `/users/1`).
fn split_collection(path: &str) -> (&str, &str) {
    let trimmed = path.trim_start_matches('/');
    match trimmed.find('/') {
        Some(idx) => (&trimmed[..idx], &trimmed[idx..]),
        None => (trimmed, "/"),
    }
}

fn into_http(mock: MockResponse) -> Response {
    let status = StatusCode::from_u16(mock.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    // Strings under a non-JSON content type are written as-is
    let is_json = mock.content_type().map_or(true, |ct| ct.contains("json"));
    let body = match mock.body {
        Value::String(text) if !is_json => text,
        other => other.to_string(),
    };

    let mut response = (status, body).into_response();
    let headers = response.headers_mut();
    for (name, value) in &mock.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!(header = %name, "Skipping invalid response header"),
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineSettings;
    use crate::model::{HttpMethod, NewCollection, NewDefinition};
    use crate::store::{CollectionStore, DefinitionStore, MemoryStore};
    use crate::template::TemplateNode;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn app() -> (Router, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let collection = store
            .create_collection(NewCollection {
                name: "shop".to_string(),
                created_by: "tester".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let definitions = [
            (
                HttpMethod::Get,
                "/users/:id",
                None,
                json!({"body": {"id": "<<number>>", "email": "<<email>>"}}),
            ),
            (
                HttpMethod::Post,
                "/users",
                Some(json!({"name": "<<string>>"})),
                json!({"status": 201, "body": {"created": true}}),
            ),
            (
                HttpMethod::Get,
                "/motd",
                None,
                json!({"headers": {"Content-Type": "text/plain", "X-Mock": "1"}, "body": "hello"}),
            ),
        ];
        for (method, path, request, response) in definitions {
            store
                .create(NewDefinition {
                    collection_id: collection.id,
                    name: path.to_string(),
                    description: String::new(),
                    method,
                    path_pattern: path.to_string(),
                    request: request.map(|r| TemplateNode::parse(&r)),
                    response: serde_json::from_value(response).unwrap(),
                    created_by: "tester".to_string(),
                })
                .await
                .unwrap();
        }

        let engine = Arc::new(MockEngine::from_store(
            Arc::clone(&store),
            EngineSettings::default(),
        ));
        (build_router(engine), store)
    }

    async fn send(router: Router, req: Request<Body>) -> (StatusCode, Response) {
        let response = router.oneshot(req).await.unwrap();
        (response.status(), response)
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_split_collection() {
        assert_eq!(split_collection("/shop/users/1"), ("shop", "/users/1"));
        assert_eq!(split_collection("/shop"), ("shop", "/"));
        assert_eq!(split_collection("/"), ("", "/"));
    }

    #[tokio::test]
    async fn test_trigger_serves_mock() {
        let (router, _) = app().await;
        let req = Request::builder().uri("/shop/users/9").body(Body::empty()).unwrap();
        let (status, response) = send(router, req).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/json"
        );
        let body = json_body(response).await;
        assert!(body["id"].is_number());
        assert!(body["email"].as_str().unwrap().contains('@'));
    }

    #[tokio::test]
    async fn test_trigger_plain_text() {
        let (router, _) = app().await;
        let req = Request::builder().uri("/shop/motd").body(Body::empty()).unwrap();
        let (status, response) = send(router, req).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(response.headers().get("x-mock").unwrap(), "1");
        assert_eq!(response.headers().get("content-type").unwrap(), "text/plain");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"hello");
    }

    #[tokio::test]
    async fn test_trigger_errors() {
        let (router, _) = app().await;

        let req = Request::builder().uri("/unknown/users/1").body(Body::empty()).unwrap();
        let (status, response) = send(router.clone(), req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["error"], "collection_not_found");

        let req = Request::builder().uri("/shop/orders").body(Body::empty()).unwrap();
        let (status, response) = send(router.clone(), req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["error"], "definition_not_found");

        let req = Request::builder()
            .method("POST")
            .uri("/shop/users")
            .body(Body::from(r#"{"name": 5}"#))
            .unwrap();
        let (status, response) = send(router, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"], "validation_failed");
        assert_eq!(body["field"], "name");
        assert_eq!(
            body["message"],
            "request to POST /users failed validation: invalid type at name: expected string, got number"
        );
    }

    #[tokio::test]
    async fn test_trigger_post_created() {
        let (router, _) = app().await;
        let req = Request::builder()
            .method("POST")
            .uri("/shop/users")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"name": "Ada"}"#))
            .unwrap();
        let (status, response) = send(router, req).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json_body(response).await, json!({"created": true}));
    }

    #[tokio::test]
    async fn test_health_reports_counters() {
        let (router, _) = app().await;

        let req = Request::builder().uri("/shop/users/1").body(Body::empty()).unwrap();
        send(router.clone(), req).await;
        let req = Request::builder().uri("/shop/nothing").body(Body::empty()).unwrap();
        send(router.clone(), req).await;

        let req = Request::builder().uri("/_mocket/health").body(Body::empty()).unwrap();
        let (status, response) = send(router, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({"ok": true, "requests_total": 2, "requests_matched": 1, "requests_unmatched": 1})
        );
    }

    #[tokio::test]
    async fn test_import_yaml_document() {
        let (router, store) = app().await;
        let payload = json!({
            "collection": "shop",
            "created_by": "importer",
            "document": "paths:\n  /orders:\n    get:\n      responses:\n        '200':\n          schema:\n            type: object\n            properties:\n              orderId:\n                type: integer\n"
        });
        let req = Request::builder()
            .method("POST")
            .uri("/_mocket/import")
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap();
        let (status, response) = send(router.clone(), req).await;
        assert_eq!(status, StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["imported"], 1);
        assert_eq!(body["failed"], 0);
        assert_eq!(body["results"][0]["method"], "GET");

        let collection = store.find_by_sub_domain("shop").await.unwrap().unwrap();
        assert_eq!(store.list_by_collection(collection.id).await.unwrap().len(), 4);

        let req = Request::builder().uri("/shop/orders").body(Body::empty()).unwrap();
        let (status, response) = send(router, req).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json_body(response).await["orderId"].is_number());
    }

    #[tokio::test]
    async fn test_import_rejects_document_without_paths() {
        let (router, _) = app().await;
        let payload = json!({"collection": "shop", "document": {"swagger": "2.0"}});
        let req = Request::builder()
            .method("POST")
            .uri("/_mocket/import")
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap();
        let (status, response) = send(router, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "invalid_document");
    }
}
