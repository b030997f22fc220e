//! OpenAPI / Swagger import.
//!
//! Compiles every `(path, verb)` operation of a document into a definition
//! whose request and response bodies are placeholder templates. Operations
//! are compiled and persisted independently: one broken operation is
//! reported in the outcome list and never aborts the rest of the batch.

use crate::matcher::PathPattern;
use crate::model::{HttpMethod, NewDefinition, ResponseTemplate};
use crate::store::{DefinitionStore, StoreError};
use crate::template::TemplateNode;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("document has no `paths` object")]
    MissingPaths,

    #[error("document is neither JSON nor YAML: {0}")]
    InvalidDocument(String),

    #[error("unresolved reference `{0}`")]
    UnresolvedRef(String),

    #[error("malformed schema at {location}: {reason}")]
    MalformedSchema { location: String, reason: String },

    #[error("malformed operation: {0}")]
    MalformedOperation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Per-operation result of an import.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompileOutcome {
    pub path: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CompileOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// One operation, compiled but not yet stored.
#[derive(Debug)]
pub struct CompiledOperation {
    pub path: String,
    pub method: String,
    pub result: Result<NewDefinition, CompileError>,
}

/// Parse document text, trying JSON first and YAML second.
pub fn parse_document(text: &str) -> Result<Value, CompileError> {
    let value = match serde_json::from_str::<Value>(text) {
        Ok(value) => value,
        Err(json_err) => serde_yaml::from_str::<Value>(text).map_err(|yaml_err| {
            CompileError::InvalidDocument(format!("json: {}; yaml: {}", json_err, yaml_err))
        })?,
    };

    if !value.is_object() {
        return Err(CompileError::InvalidDocument(
            "document root must be an object".to_string(),
        ));
    }
    Ok(value)
}

/// Compile every supported operation of `document` without touching a store.
pub fn compile_operations(
    document: &Value,
    collection_id: Uuid,
    created_by: &str,
) -> Result<Vec<CompiledOperation>, CompileError> {
    let paths = document
        .get("paths")
        .and_then(Value::as_object)
        .ok_or(CompileError::MissingPaths)?;

    let mut compiled = Vec::new();
    for (path, path_item) in paths {
        let Some(item) = path_item.as_object() else {
            compiled.push(CompiledOperation {
                path: path.clone(),
                method: String::new(),
                result: Err(CompileError::MalformedOperation(format!(
                    "path item `{}` is not an object",
                    path
                ))),
            });
            continue;
        };
        let shared_params = item.get("parameters");

        for (verb, operation) in item {
            let Some(method) = operation_method(verb) else {
                debug!(path = %path, key = %verb, "Skipping non-operation path item key");
                continue;
            };

            let result = OperationCompiler { document }.compile(
                path,
                method,
                operation,
                shared_params,
                collection_id,
                created_by,
            );
            compiled.push(CompiledOperation {
                path: path.clone(),
                method: method.to_string(),
                result,
            });
        }
    }
    Ok(compiled)
}

/// Compile a document and persist every operation that compiled.
pub async fn compile_from_openapi(
    store: &dyn DefinitionStore,
    document: &Value,
    collection_id: Uuid,
    created_by: &str,
) -> Result<Vec<CompileOutcome>, CompileError> {
    let compiled = compile_operations(document, collection_id, created_by)?;
    Ok(persist_each(store, compiled).await)
}

/// Store each compiled operation, collecting one outcome per entry.
pub(crate) async fn persist_each(
    store: &dyn DefinitionStore,
    compiled: Vec<CompiledOperation>,
) -> Vec<CompileOutcome> {
    let mut outcomes = Vec::with_capacity(compiled.len());

    for op in compiled {
        let stored = match op.result {
            Ok(new) => store.create(new).await.map_err(CompileError::from),
            Err(e) => Err(e),
        };

        let outcome = match stored {
            Ok(definition) => {
                info!(
                    method = %op.method,
                    path = %op.path,
                    definition_id = %definition.id,
                    "Imported definition"
                );
                CompileOutcome {
                    path: op.path,
                    method: op.method,
                    definition_id: Some(definition.id),
                    error: None,
                }
            }
            Err(e) => {
                warn!(method = %op.method, path = %op.path, error = %e, "Operation not imported");
                CompileOutcome {
                    path: op.path,
                    method: op.method,
                    definition_id: None,
                    error: Some(e.to_string()),
                }
            }
        };
        outcomes.push(outcome);
    }

    outcomes
}

fn operation_method(key: &str) -> Option<HttpMethod> {
    match key {
        "get" | "post" | "put" | "delete" | "patch" => key.parse().ok(),
        _ => None,
    }
}

struct OperationCompiler<'d> {
    document: &'d Value,
}

impl<'d> OperationCompiler<'d> {
    fn compile(
        &self,
        path: &str,
        method: HttpMethod,
        operation: &'d Value,
        shared_params: Option<&'d Value>,
        collection_id: Uuid,
        created_by: &str,
    ) -> Result<NewDefinition, CompileError> {
        let op = operation.as_object().ok_or_else(|| {
            CompileError::MalformedOperation(format!("{} {} is not an object", method, path))
        })?;

        PathPattern::parse(path)
            .map_err(|e| CompileError::MalformedOperation(e.to_string()))?;

        let name = ["summary", "operationId"]
            .iter()
            .filter_map(|key| op.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .find(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} {}", method, path));
        let description = op
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let location = format!("{} {}", method, path);
        let parameters = self.parameters(shared_params, op.get("parameters"), &location)?;
        let request = self.request_template(op.get("requestBody"), &parameters, &location)?;
        let response = self.response_template(op.get("responses"), &location)?;

        Ok(NewDefinition {
            collection_id,
            name,
            description,
            method,
            path_pattern: path.to_string(),
            request,
            response,
            created_by: created_by.to_string(),
        })
    }

    /// Path-item parameters overridden by operation parameters of the same
    /// `(name, in)`.
    fn parameters(
        &self,
        shared: Option<&'d Value>,
        own: Option<&'d Value>,
        location: &str,
    ) -> Result<Vec<&'d Value>, CompileError> {
        let mut merged: Vec<&'d Value> = Vec::new();
        for list in [shared, own].into_iter().flatten() {
            let items = list.as_array().ok_or_else(|| {
                CompileError::MalformedOperation(format!("{}: parameters must be a list", location))
            })?;
            for raw in items {
                let param = self.deref(raw)?;
                let key = param_key(param);
                merged.retain(|existing| param_key(existing) != key);
                merged.push(param);
            }
        }
        Ok(merged)
    }

    fn request_template(
        &self,
        request_body: Option<&'d Value>,
        parameters: &[&'d Value],
        location: &str,
    ) -> Result<Option<TemplateNode>, CompileError> {
        if let Some(body) = request_body {
            let body = self.deref(body)?;
            return match media_schema(body) {
                Some(schema) => {
                    let location = format!("{} requestBody", location);
                    SchemaWalker::new(self.document)
                        .build(schema, "", &location)
                        .map(Some)
                }
                None => Ok(None),
            };
        }

        if let Some(body_param) = parameters
            .iter()
            .copied()
            .find(|p| param_location(p) == Some("body"))
        {
            if let Some(schema) = body_param.get("schema") {
                let location = format!("{} body parameter", location);
                return SchemaWalker::new(self.document)
                    .build(schema, "", &location)
                    .map(Some);
            }
        }

        let form: Vec<&'d Value> = parameters
            .iter()
            .copied()
            .filter(|p| param_location(p) == Some("formData"))
            .collect();
        if form.is_empty() {
            return Ok(None);
        }

        let mut entries = Vec::with_capacity(form.len());
        for param in form {
            let name = param.get("name").and_then(Value::as_str).ok_or_else(|| {
                CompileError::MalformedOperation(format!("{}: formData parameter without name", location))
            })?;
            let location = format!("{} formData {}", location, name);
            entries.push((
                name.to_string(),
                SchemaWalker::new(self.document).build(param, name, &location)?,
            ));
        }
        Ok(Some(TemplateNode::Object(entries)))
    }

    fn response_template(
        &self,
        responses: Option<&'d Value>,
        location: &str,
    ) -> Result<ResponseTemplate, CompileError> {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());

        let Some(responses) = responses else {
            return Ok(ResponseTemplate {
                headers,
                ..Default::default()
            });
        };
        let responses = responses.as_object().ok_or_else(|| {
            CompileError::MalformedOperation(format!("{}: responses must be an object", location))
        })?;

        let selected = ["200", "201", "default"]
            .iter()
            .find_map(|key| responses.get_key_value(*key))
            .or_else(|| responses.iter().next());

        let Some((status_key, response)) = selected else {
            return Ok(ResponseTemplate {
                headers,
                ..Default::default()
            });
        };

        let status = status_key
            .parse::<u16>()
            .ok()
            .filter(|code| (100..=599).contains(code))
            .unwrap_or(200);

        let response = self.deref(response)?;
        let schema = response.get("schema").or_else(|| media_schema(response));
        let body = match schema {
            Some(schema) => {
                let location = format!("{} response {}", location, status_key);
                SchemaWalker::new(self.document).build(schema, "", &location)?
            }
            None => TemplateNode::default(),
        };

        Ok(ResponseTemplate {
            status,
            headers,
            body,
            template: false,
        })
    }

    /// Follow a `$ref` on a parameter, request body or response object.
    fn deref(&self, value: &'d Value) -> Result<&'d Value, CompileError> {
        match value.get("$ref").and_then(Value::as_str) {
            Some(reference) => resolve_pointer(self.document, reference),
            None => Ok(value),
        }
    }
}

fn param_location(param: &Value) -> Option<&str> {
    param.get("in").and_then(Value::as_str)
}

fn param_key(param: &Value) -> (Option<&str>, Option<&str>) {
    (
        param.get("name").and_then(Value::as_str),
        param.get("in").and_then(Value::as_str),
    )
}

/// `content[media].schema`, preferring JSON media types.
fn media_schema(container: &Value) -> Option<&Value> {
    let content = container.get("content")?.as_object()?;
    content
        .get("application/json")
        .or_else(|| {
            content
                .iter()
                .find(|(media, _)| media.contains("json"))
                .map(|(_, v)| v)
        })
        .or_else(|| content.values().next())
        .and_then(|media| media.get("schema"))
}

fn resolve_pointer<'d>(document: &'d Value, reference: &str) -> Result<&'d Value, CompileError> {
    let pointer = reference
        .strip_prefix('#')
        .ok_or_else(|| CompileError::UnresolvedRef(reference.to_string()))?;
    document
        .pointer(pointer)
        .ok_or_else(|| CompileError::UnresolvedRef(reference.to_string()))
}

/// Recursive schema-to-template conversion with a cycle guard.
struct SchemaWalker<'d> {
    document: &'d Value,
    visiting: Vec<String>,
}

impl<'d> SchemaWalker<'d> {
    fn new(document: &'d Value) -> Self {
        Self {
            document,
            visiting: Vec::new(),
        }
    }

    fn build(&mut self, schema: &'d Value, key: &str, location: &str) -> Result<TemplateNode, CompileError> {
        let Some(obj) = schema.as_object() else {
            return Err(CompileError::MalformedSchema {
                location: location.to_string(),
                reason: "schema is not an object".to_string(),
            });
        };

        if let Some(reference) = obj.get("$ref") {
            let reference = reference.as_str().ok_or_else(|| CompileError::MalformedSchema {
                location: location.to_string(),
                reason: "`$ref` is not a string".to_string(),
            })?;
            if self.visiting.iter().any(|r| r == reference) {
                warn!(reference = %reference, location = %location, "Cyclic reference cut with a string placeholder");
                return Ok(TemplateNode::placeholder("string"));
            }
            let target = resolve_pointer(self.document, reference)?;
            self.visiting.push(reference.to_string());
            let built = self.build(target, key, reference);
            self.visiting.pop();
            return built;
        }

        if let Some(members) = obj.get("allOf") {
            return self.build_all_of(obj, members, key, location);
        }

        match schema_type(obj) {
            Some("object") => self.build_object(obj, location),
            None if obj.contains_key("properties") => self.build_object(obj, location),
            Some("array") => self.build_array(obj, key, location),
            None if obj.contains_key("items") => self.build_array(obj, key, location),
            declared => Ok(TemplateNode::placeholder(placeholder_for(
                declared,
                key,
                obj.get("format").and_then(Value::as_str),
            ))),
        }
    }

    fn build_object(
        &mut self,
        obj: &'d serde_json::Map<String, Value>,
        location: &str,
    ) -> Result<TemplateNode, CompileError> {
        let Some(properties) = obj.get("properties") else {
            return Ok(TemplateNode::Object(Vec::new()));
        };
        let properties = properties.as_object().ok_or_else(|| CompileError::MalformedSchema {
            location: location.to_string(),
            reason: "`properties` is not an object".to_string(),
        })?;

        let mut entries = Vec::with_capacity(properties.len());
        for (name, property) in properties {
            let child_location = format!("{}.{}", location, name);
            entries.push((name.clone(), self.build(property, name, &child_location)?));
        }
        Ok(TemplateNode::Object(entries))
    }

    fn build_array(
        &mut self,
        obj: &'d serde_json::Map<String, Value>,
        key: &str,
        location: &str,
    ) -> Result<TemplateNode, CompileError> {
        let items = obj.get("items").ok_or_else(|| CompileError::MalformedSchema {
            location: location.to_string(),
            reason: "array schema without `items`".to_string(),
        })?;
        let element = self.build(items, key, &format!("{}[]", location))?;
        Ok(TemplateNode::Array(vec![element]))
    }

    fn build_all_of(
        &mut self,
        obj: &'d serde_json::Map<String, Value>,
        members: &'d Value,
        key: &str,
        location: &str,
    ) -> Result<TemplateNode, CompileError> {
        let members = members.as_array().ok_or_else(|| CompileError::MalformedSchema {
            location: location.to_string(),
            reason: "`allOf` is not a list".to_string(),
        })?;

        let mut merged: Vec<(String, TemplateNode)> = Vec::new();
        let mut last_other = None;
        for (i, member) in members.iter().enumerate() {
            match self.build(member, key, &format!("{}.allOf[{}]", location, i))? {
                TemplateNode::Object(entries) => merge_entries(&mut merged, entries),
                other => last_other = Some(other),
            }
        }
        if obj.contains_key("properties") {
            if let TemplateNode::Object(entries) = self.build_object(obj, location)? {
                merge_entries(&mut merged, entries);
            }
        }

        match last_other {
            Some(other) if merged.is_empty() => Ok(other),
            _ => Ok(TemplateNode::Object(merged)),
        }
    }
}

fn merge_entries(into: &mut Vec<(String, TemplateNode)>, entries: Vec<(String, TemplateNode)>) {
    for (name, node) in entries {
        match into.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = node,
            None => into.push((name, node)),
        }
    }
}

/// `type` as a string, or the first non-null entry of a type list.
fn schema_type(obj: &serde_json::Map<String, Value>) -> Option<&str> {
    match obj.get("type")? {
        Value::String(s) => Some(s.as_str()),
        Value::Array(types) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null"),
        _ => None,
    }
}

/// Placeholder name implied by the property name alone.
fn key_hint(key: &str) -> Option<&'static str> {
    if key.is_empty() {
        return None;
    }
    let lower = key.to_ascii_lowercase();

    if lower.ends_with("id") {
        return Some("number");
    }
    if lower.ends_with("email") || lower == "mail" {
        return Some("email");
    }
    if lower.ends_with("date") {
        return Some("date");
    }
    if lower == "status" {
        return Some("string");
    }
    if lower.contains("phone") {
        return Some("phone");
    }
    None
}

fn placeholder_for(declared: Option<&str>, key: &str, format: Option<&str>) -> &'static str {
    if let Some(hint) = key_hint(key) {
        return hint;
    }
    match (declared, format) {
        (Some("integer") | Some("number"), _) => "number",
        (Some("string"), Some("date") | Some("date-time")) => "date",
        (Some("string"), Some("email")) => "email",
        (Some("string"), Some("uuid")) => "uuid",
        (Some("string"), _) => "string",
        (Some("boolean"), _) => "boolean",
        _ => "string",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewCollection;
    use crate::store::{CollectionStore, MemoryStore};
    use serde_json::json;

    fn body_of(document: &Value, path: &str, verb: &str) -> Value {
        compile_operations(document, Uuid::nil(), "tester")
            .unwrap()
            .into_iter()
            .find(|op| op.path == path && op.method == verb)
            .unwrap()
            .result
            .unwrap()
            .response
            .body
            .to_value()
    }

    #[test]
    fn test_ref_compiles_to_placeholders() {
        let doc = json!({
            "swagger": "2.0",
            "paths": {
                "/users/{id}": {
                    "get": {"responses": {"200": {"schema": {"$ref": "#/definitions/User"}}}}
                }
            },
            "definitions": {
                "User": {
                    "type": "object",
                    "properties": {"id": {"type": "integer"}, "email": {"type": "string"}}
                }
            }
        });
        assert_eq!(
            body_of(&doc, "/users/{id}", "GET"),
            json!({"id": "<<number>>", "email": "<<email>>"})
        );
    }

    #[test]
    fn test_nested_objects_and_arrays() {
        let doc = json!({
            "paths": {
                "/pets": {
                    "get": {
                        "responses": {
                            "200": {"schema": {"type": "array", "items": {"$ref": "#/definitions/Pet"}}}
                        }
                    }
                }
            },
            "definitions": {
                "Pet": {
                    "type": "object",
                    "properties": {
                        "petId": {"type": "integer"},
                        "name": {"type": "string"},
                        "born": {"type": "string", "format": "date-time"},
                        "shipDate": {"type": "string"},
                        "status": {"type": "integer"},
                        "ownerPhone": {"type": "string"},
                        "vaccinated": {"type": "boolean"},
                        "weight": {"type": "number"},
                        "tags": {"type": "array", "items": {"type": "string"}},
                        "category": {"$ref": "#/definitions/Category"}
                    }
                },
                "Category": {"type": "object", "properties": {"name": {"type": "string"}}}
            }
        });

        assert_eq!(
            body_of(&doc, "/pets", "GET"),
            json!([{
                "petId": "<<number>>",
                "name": "<<string>>",
                "born": "<<date>>",
                "shipDate": "<<date>>",
                "status": "<<string>>",
                "ownerPhone": "<<phone>>",
                "vaccinated": "<<boolean>>",
                "weight": "<<number>>",
                "tags": ["<<string>>"],
                "category": {"name": "<<string>>"}
            }])
        );
    }

    #[test]
    fn test_cycle_is_cut() {
        let doc = json!({
            "paths": {"/nodes": {"get": {"responses": {"200": {"schema": {"$ref": "#/definitions/Node"}}}}}},
            "definitions": {
                "Node": {
                    "type": "object",
                    "properties": {
                        "value": {"type": "string"},
                        "next": {"$ref": "#/definitions/Node"}
                    }
                }
            }
        });
        assert_eq!(
            body_of(&doc, "/nodes", "GET"),
            json!({"value": "<<string>>", "next": "<<string>>"})
        );
    }

    #[test]
    fn test_response_selection_and_status() {
        let doc = json!({
            "paths": {
                "/a": {"post": {"responses": {
                    "400": {"schema": {"type": "string"}},
                    "201": {"schema": {"type": "boolean"}},
                    "default": {"schema": {"type": "integer"}}
                }}},
                "/b": {"get": {"responses": {"404": {"description": "gone"}}}},
                "/c": {"get": {"responses": {"default": {"schema": {"type": "string"}}}}},
                "/d": {"get": {}}
            }
        });
        let compiled = compile_operations(&doc, Uuid::nil(), "tester").unwrap();
        let responses: Vec<_> = compiled
            .into_iter()
            .map(|op| op.result.unwrap().response)
            .collect();

        assert_eq!(responses[0].status, 201);
        assert_eq!(responses[0].body.to_value(), json!("<<boolean>>"));
        assert_eq!(responses[1].status, 404);
        assert_eq!(responses[1].body.to_value(), json!({}));
        assert_eq!(responses[2].status, 200);
        assert_eq!(responses[3].status, 200);
        assert_eq!(responses[3].content_type(), Some("application/json"));
    }

    #[test]
    fn test_openapi3_components_and_request_body() {
        let doc = json!({
            "openapi": "3.0.0",
            "paths": {
                "/orders": {
                    "summary": "ignored path-level key",
                    "post": {
                        "operationId": "createOrder",
                        "requestBody": {
                            "content": {"application/json": {"schema": {"$ref": "#/components/schemas/NewOrder"}}}
                        },
                        "responses": {
                            "201": {"content": {"application/json": {"schema": {"$ref": "#/components/schemas/Order"}}}}
                        }
                    },
                    "options": {"responses": {}}
                }
            },
            "components": {
                "schemas": {
                    "NewOrder": {
                        "type": "object",
                        "properties": {"sku": {"type": "string"}, "quantity": {"type": "integer"}}
                    },
                    "Order": {
                        "allOf": [
                            {"$ref": "#/components/schemas/NewOrder"},
                            {"type": "object", "properties": {"order_id": {"type": "string"}}}
                        ]
                    }
                }
            }
        });

        let compiled = compile_operations(&doc, Uuid::nil(), "tester").unwrap();
        assert_eq!(compiled.len(), 1);
        let def = compiled.into_iter().next().unwrap().result.unwrap();

        assert_eq!(def.name, "createOrder");
        assert_eq!(def.method, HttpMethod::Post);
        assert_eq!(def.response.status, 201);
        assert_eq!(
            def.request.unwrap().to_value(),
            json!({"sku": "<<string>>", "quantity": "<<number>>"})
        );
        assert_eq!(
            def.response.body.to_value(),
            json!({"sku": "<<string>>", "quantity": "<<number>>", "order_id": "<<number>>"})
        );
    }

    #[test]
    fn test_swagger_body_and_form_parameters() {
        let doc = json!({
            "paths": {
                "/users": {
                    "parameters": [{"name": "tenant", "in": "header", "type": "string"}],
                    "post": {
                        "parameters": [{"name": "user", "in": "body", "schema": {
                            "type": "object", "properties": {"name": {"type": "string"}}
                        }}],
                        "responses": {}
                    },
                    "put": {
                        "parameters": [
                            {"name": "email", "in": "formData", "type": "string"},
                            {"name": "age", "in": "formData", "type": "integer"}
                        ]
                    },
                    "get": {}
                }
            }
        });

        let compiled = compile_operations(&doc, Uuid::nil(), "tester").unwrap();
        let requests: Vec<_> = compiled
            .into_iter()
            .map(|op| op.result.unwrap().request.map(|t| t.to_value()))
            .collect();

        assert_eq!(requests[0], Some(json!({"name": "<<string>>"})));
        assert_eq!(requests[1], Some(json!({"email": "<<email>>", "age": "<<number>>"})));
        assert_eq!(requests[2], None);
    }

    #[test]
    fn test_operation_naming() {
        let doc = json!({
            "paths": {
                "/a": {"get": {"summary": "  ", "operationId": "listA", "description": "All the As"}},
                "/b": {"delete": {}}
            }
        });
        let compiled = compile_operations(&doc, Uuid::nil(), "tester").unwrap();
        let defs: Vec<_> = compiled.into_iter().map(|op| op.result.unwrap()).collect();
        assert_eq!(defs[0].name, "listA");
        assert_eq!(defs[0].description, "All the As");
        assert_eq!(defs[1].name, "DELETE /b");
        assert_eq!(defs[1].description, "");
    }

    #[test]
    fn test_lowercase_list_keys_use_key_hints() {
        let doc = json!({
            "paths": {
                "/store/order": {
                    "get": {
                        "responses": {
                            "200": {
                                "schema": {
                                    "type": "object",
                                    "properties": {
                                        "orderid": {"type": "string"},
                                        "petid": {"type": "string"},
                                        "shipdate": {"type": "string"}
                                    }
                                }
                            }
                        }
                    }
                }
            }
        });
        assert_eq!(
            body_of(&doc, "/store/order", "GET"),
            json!({"orderid": "<<number>>", "petid": "<<number>>", "shipdate": "<<date>>"})
        );
    }

    #[test]
    fn test_path_with_suffixed_parameter() {
        let doc = json!({
            "paths": {
                "/files/{name}.json": {
                    "get": {"responses": {"200": {"schema": {"type": "object", "properties": {"size": {"type": "integer"}}}}}}
                }
            }
        });
        let compiled = compile_operations(&doc, Uuid::nil(), "tester").unwrap();
        let definition = compiled[0].result.as_ref().unwrap();
        assert_eq!(definition.path_pattern, "/files/{name}.json");
        assert_eq!(
            body_of(&doc, "/files/{name}.json", "GET"),
            json!({"size": "<<number>>"})
        );
    }

    #[test]
    fn test_missing_paths_rejected() {
        let err = compile_operations(&json!({"swagger": "2.0"}), Uuid::nil(), "tester").unwrap_err();
        assert_eq!(err, CompileError::MissingPaths);
    }

    #[test]
    fn test_parse_document_accepts_json_and_yaml() {
        let from_json = parse_document(r#"{"paths": {"/a": {"get": {}}}}"#).unwrap();
        let from_yaml = parse_document("paths:\n  /a:\n    get: {}\n").unwrap();
        assert_eq!(from_json, from_yaml);

        assert!(matches!(
            parse_document("- just\n- a list\n"),
            Err(CompileError::InvalidDocument(_))
        ));
    }

    #[test]
    fn test_key_hints() {
        assert_eq!(key_hint("id"), Some("number"));
        assert_eq!(key_hint("userId"), Some("number"));
        assert_eq!(key_hint("order_id"), Some("number"));
        assert_eq!(key_hint("contactEmail"), Some("email"));
        assert_eq!(key_hint("mail"), Some("email"));
        assert_eq!(key_hint("shipDate"), Some("date"));
        assert_eq!(key_hint("mobilePhone"), Some("phone"));
        assert_eq!(key_hint("petid"), Some("number"));
        assert_eq!(key_hint("orderid"), Some("number"));
        assert_eq!(key_hint("USERID"), Some("number"));
        assert_eq!(key_hint("shipdate"), Some("date"));
        assert_eq!(key_hint("SHIPDATE"), Some("date"));
        assert_eq!(key_hint("phoneNumber"), Some("phone"));
        assert_eq!(key_hint("name"), None);
        assert_eq!(key_hint("identity"), None);
        assert_eq!(key_hint("updatedAt"), None);
    }

    #[tokio::test]
    async fn test_broken_operation_does_not_abort_batch() {
        let store = MemoryStore::new();
        let collection = store
            .create_collection(NewCollection {
                name: "import".to_string(),
                created_by: "tester".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let doc = json!({
            "paths": {
                "/one": {"get": {"responses": {"200": {"schema": {"type": "string"}}}}},
                "/two": {"get": {}},
                "/three": {"get": {"responses": {"200": {"schema": {"$ref": "#/definitions/Missing"}}}}},
                "/four": {"post": {}},
                "/five": {"delete": {}}
            }
        });

        let outcomes = compile_from_openapi(&store, &doc, collection.id, "tester")
            .await
            .unwrap();
        assert_eq!(outcomes.len(), 5);

        let ok: Vec<_> = outcomes.iter().filter(|o| o.is_ok()).map(|o| o.path.as_str()).collect();
        assert_eq!(ok, vec!["/one", "/two", "/four", "/five"]);
        assert_eq!(
            outcomes[2].error.as_deref(),
            Some("unresolved reference `#/definitions/Missing`")
        );
        assert!(outcomes[2].definition_id.is_none());

        assert_eq!(store.list_by_collection(collection.id).await.unwrap().len(), 4);
        let stored = store
            .find_by_id(outcomes[0].definition_id.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.path_pattern, "/one");
        assert_eq!(stored.created_by, "tester");
    }

    #[tokio::test]
    async fn test_store_failure_is_reported_per_operation() {
        let store = MemoryStore::new();
        let doc = json!({"paths": {"/a": {"get": {}}}});

        let outcomes = compile_from_openapi(&store, &doc, Uuid::new_v4(), "tester")
            .await
            .unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].error.as_deref(), Some("collection not found"));
    }
}
