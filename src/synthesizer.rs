//! Response synthesis.
//!
//! Expands a response template into a concrete JSON value. Placeholders are
//! regenerated on every call; arrays keep the length of the template array.
//!
//! Responses flagged as templates additionally render literal strings that
//! contain `{{...}}` through Handlebars, with the request in scope.

use crate::generator::GeneratorRegistry;
use crate::template::TemplateNode;
use handlebars::{Context, Handlebars, Helper, HelperResult, Output, RenderContext};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

/// Request data visible to `{{...}}` expressions in template responses.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RequestContext {
    /// Path parameters extracted by the route resolver
    pub params: HashMap<String, String>,
    /// Query parameters
    pub query: HashMap<String, String>,
    /// Request method
    pub method: String,
    /// Request path (without the collection prefix)
    pub path: String,
    /// Parsed request body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

/// Expands response templates.
pub struct Synthesizer {
    registry: Arc<GeneratorRegistry>,
    handlebars: Handlebars<'static>,
}

impl Synthesizer {
    pub fn new(registry: Arc<GeneratorRegistry>) -> Self {
        let mut handlebars = Handlebars::new();

        let fake_registry = Arc::clone(&registry);
        handlebars.register_helper(
            "fake",
            Box::new(
                move |h: &Helper,
                      _: &Handlebars,
                      _: &Context,
                      _: &mut RenderContext,
                      out: &mut dyn Output|
                      -> HelperResult {
                    let name = h.param(0).and_then(|v| v.value().as_str()).unwrap_or("string");
                    match fake_registry.get(name).generate() {
                        Value::String(s) => out.write(&s)?,
                        other => out.write(&other.to_string())?,
                    }
                    Ok(())
                },
            ),
        );
        handlebars.register_helper("default", Box::new(default_helper));

        // Output is JSON, not HTML
        handlebars.register_escape_fn(handlebars::no_escape);

        Self {
            registry,
            handlebars,
        }
    }

    pub fn registry(&self) -> &GeneratorRegistry {
        &self.registry
    }

    /// Expand a template; literals are copied unchanged.
    pub fn synthesize(&self, template: &TemplateNode) -> Value {
        match self.expand(template, &mut |literal: &Value| Ok::<_, Infallible>(literal.clone())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Expand a template, rendering `{{...}}` literals against the request.
    pub fn render(
        &self,
        template: &TemplateNode,
        ctx: &RequestContext,
    ) -> Result<Value, handlebars::RenderError> {
        self.expand(template, &mut |literal: &Value| match literal {
            Value::String(s) if s.contains("{{") => {
                self.handlebars.render_template(s, ctx).map(Value::String)
            }
            _ => Ok(literal.clone()),
        })
    }

    fn expand<E>(
        &self,
        node: &TemplateNode,
        literal: &mut dyn FnMut(&Value) -> Result<Value, E>,
    ) -> Result<Value, E> {
        match node {
            TemplateNode::Literal(value) => literal(value),
            TemplateNode::Placeholder(placeholder) => {
                Ok(self.registry.get(placeholder.name()).generate())
            }
            TemplateNode::Object(entries) => {
                let mut out = Map::with_capacity(entries.len());
                for (key, child) in entries {
                    out.insert(key.clone(), self.expand(child, literal)?);
                }
                Ok(Value::Object(out))
            }
            TemplateNode::Array(items) => items
                .iter()
                .map(|item| self.expand(item, literal))
                .collect::<Result<Vec<_>, E>>()
                .map(Value::Array),
        }
    }
}

/// `{{default params.id "fallback"}}`
fn default_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let value = h.param(0).map(|v| v.value());
    let fallback = h.param(1).and_then(|v| v.value().as_str()).unwrap_or("");

    match value {
        Some(Value::String(s)) if !s.is_empty() => out.write(s)?,
        Some(v) if !v.is_null() && !v.is_string() => out.write(&v.to_string())?,
        _ => out.write(fallback)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::JsonKind;
    use serde_json::json;

    fn synthesizer() -> Synthesizer {
        Synthesizer::new(Arc::new(GeneratorRegistry::default()))
    }

    #[test]
    fn test_arrays_keep_template_length() {
        let template = TemplateNode::parse(&json!({"items": ["<<string>>"]}));
        for _ in 0..10 {
            let out = synthesizer().synthesize(&template);
            let items = out["items"].as_array().unwrap();
            assert_eq!(items.len(), 1);
            assert!(items[0].is_string());
            assert_ne!(items[0], json!("<<string>>"));
        }

        let template = TemplateNode::parse(&json!(["<<number>>", "<<email>>", "fixed"]));
        let out = synthesizer().synthesize(&template);
        let items = out.as_array().unwrap();
        assert_eq!(items.len(), 3);
        assert!(items[0].is_number());
        assert!(items[1].as_str().unwrap().contains('@'));
        assert_eq!(items[2], json!("fixed"));
    }

    #[test]
    fn test_literals_are_copied() {
        let raw = json!({"ok": true, "count": 3, "note": null, "label": "hi {{params.id}}"});
        let out = synthesizer().synthesize(&TemplateNode::parse(&raw));
        assert_eq!(out, raw);
    }

    #[test]
    fn test_unknown_placeholder_uses_fallback_generator() {
        let template = TemplateNode::parse(&json!({"x": "<<spaceship>>"}));
        let out = synthesizer().synthesize(&template);
        assert!(out["x"].is_string());
        assert_ne!(out["x"], json!("<<spaceship>>"));
    }

    #[test]
    fn test_repeated_synthesis_shares_structure_not_values() {
        let template = TemplateNode::parse(&json!({
            "id": "<<uuid>>",
            "profile": {"email": "<<email>>", "tags": ["<<word>>", "<<word>>"]}
        }));
        let s = synthesizer();
        let first = s.synthesize(&template);
        let second = s.synthesize(&template);

        fn shape(value: &Value) -> Value {
            match value {
                Value::Object(map) => Value::Object(
                    map.iter().map(|(k, v)| (k.clone(), shape(v))).collect(),
                ),
                Value::Array(items) => Value::Array(items.iter().map(shape).collect()),
                other => json!(JsonKind::of(other).as_str()),
            }
        }

        assert_eq!(shape(&first), shape(&second));
        // Two v4 UUIDs never collide in practice.
        assert_ne!(first["id"], second["id"]);
    }

    #[test]
    fn test_object_keys_keep_template_order() {
        let template = TemplateNode::parse(&json!({"z": 1, "a": "<<word>>", "m": 2}));
        let out = synthesizer().synthesize(&template);
        let keys: Vec<_> = out.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_render_uses_request_context() {
        let mut ctx = RequestContext {
            method: "GET".to_string(),
            path: "/users/42".to_string(),
            ..Default::default()
        };
        ctx.params.insert("id".to_string(), "42".to_string());
        ctx.query.insert("page".to_string(), "3".to_string());

        let template = TemplateNode::parse(&json!({
            "id": "{{params.id}}",
            "page": "page {{query.page}}",
            "who": "{{default query.user \"anonymous\"}}",
            "email": "{{fake \"email\"}}",
            "static": "no template",
            "n": 1
        }));

        let out = synthesizer().render(&template, &ctx).unwrap();
        assert_eq!(out["id"], "42");
        assert_eq!(out["page"], "page 3");
        assert_eq!(out["who"], "anonymous");
        assert!(out["email"].as_str().unwrap().contains('@'));
        assert_eq!(out["static"], "no template");
        assert_eq!(out["n"], 1);
    }

    #[test]
    fn test_render_reads_request_body() {
        let ctx = RequestContext {
            body: Some(json!({"name": "Ada"})),
            ..Default::default()
        };
        let template = TemplateNode::parse(&json!({"greeting": "Hello {{body.name}}"}));
        let out = synthesizer().render(&template, &ctx).unwrap();
        assert_eq!(out["greeting"], "Hello Ada");
    }
}
