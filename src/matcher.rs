//! Route resolution.
//!
//! Matches an inbound method and path against the definitions stored for a
//! collection and extracts named path parameters.

use crate::error::EngineError;
use crate::model::{Collection, Definition, HttpMethod};
use crate::store::{CollectionStore, DefinitionStore};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::HashMap;
use tracing::{debug, warn};

/// How to choose between several pattern matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Most literal segments, then fewest wildcards, then oldest
    #[default]
    MostSpecific,
    /// First matching definition in creation order
    CreationOrder,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("empty parameter name in `{0}`")]
    EmptyParam(String),

    #[error("unterminated `{{` in `{0}`")]
    Unterminated(String),

    #[error("wildcard must be the last segment in `{0}`")]
    WildcardNotLast(String),

    #[error("parameter `{name}` bound twice in `{pattern}`")]
    DuplicateParam { pattern: String, name: String },
}

#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Param(String),
    /// Fixed text around one or more parameters, e.g. `{name}.json`
    Mixed { regex: Regex, names: Vec<String> },
    Wildcard(String),
}

/// A parsed `path_pattern`: `/users/:id`, `/users/{id}`, `/files/{name}.json`
/// or `/files/*rest`.
#[derive(Debug, Clone)]
pub struct PathPattern {
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let raw: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
        let mut segments = Vec::with_capacity(raw.len());
        let mut names: Vec<String> = Vec::new();

        for (i, part) in raw.iter().enumerate() {
            let segment = if let Some(name) = part.strip_prefix(':') {
                Segment::Param(name.to_string())
            } else if let Some(name) = part.strip_prefix('*') {
                if i + 1 != raw.len() {
                    return Err(PatternError::WildcardNotLast(pattern.to_string()));
                }
                Segment::Wildcard(name.to_string())
            } else if part.contains('{') {
                parse_braced(part, pattern)?
            } else {
                Segment::Literal(part.to_string())
            };

            let bound: Vec<&String> = match &segment {
                Segment::Param(name) => vec![name],
                Segment::Mixed { names, .. } => names.iter().collect(),
                Segment::Wildcard(name) if !name.is_empty() => vec![name],
                _ => Vec::new(),
            };
            for name in bound {
                if name.is_empty() {
                    return Err(PatternError::EmptyParam(pattern.to_string()));
                }
                if names.contains(name) {
                    return Err(PatternError::DuplicateParam {
                        pattern: pattern.to_string(),
                        name: name.clone(),
                    });
                }
                names.push(name.clone());
            }
            segments.push(segment);
        }

        Ok(Self { segments })
    }

    /// Match a normalized path, returning the decoded parameters.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut params = HashMap::new();
        let mut idx = 0;

        for segment in &self.segments {
            match segment {
                Segment::Literal(lit) => {
                    if parts.get(idx) != Some(&lit.as_str()) {
                        return None;
                    }
                    idx += 1;
                }
                Segment::Param(name) => {
                    let value = parts.get(idx)?;
                    params.insert(name.clone(), percent_decode(value, false));
                    idx += 1;
                }
                Segment::Mixed { regex, names } => {
                    let captures = regex.captures(parts.get(idx)?)?;
                    for (name, value) in names.iter().zip(captures.iter().skip(1)) {
                        let value = value?.as_str();
                        params.insert(name.clone(), percent_decode(value, false));
                    }
                    idx += 1;
                }
                Segment::Wildcard(name) => {
                    let rest = parts[idx.min(parts.len())..].join("/");
                    if !name.is_empty() {
                        params.insert(name.clone(), percent_decode(&rest, false));
                    }
                    idx = parts.len();
                }
            }
        }

        // Must consume entire path
        if idx == parts.len() {
            Some(params)
        } else {
            None
        }
    }

    /// Ordering key for `MatchPolicy::MostSpecific`; larger is more specific.
    ///
    /// Segments with fixed text around a parameter count as literal.
    pub fn specificity(&self) -> (usize, Reverse<usize>) {
        let literals = self
            .segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_) | Segment::Mixed { .. }))
            .count();
        let wildcards = self
            .segments
            .iter()
            .filter(|s| matches!(s, Segment::Wildcard(_)))
            .count();
        (literals, Reverse(wildcards))
    }
}

/// A segment holding `{name}` parameters, alone or with fixed text around them.
fn parse_braced(part: &str, pattern: &str) -> Result<Segment, PatternError> {
    let mut names = Vec::new();
    let mut expr = String::from("^");
    let mut rest = part;

    while let Some(open) = rest.find('{') {
        let close = rest[open..]
            .find('}')
            .map(|offset| open + offset)
            .ok_or_else(|| PatternError::Unterminated(pattern.to_string()))?;
        expr.push_str(&regex::escape(&rest[..open]));
        expr.push_str("(.+?)");
        names.push(rest[open + 1..close].to_string());
        rest = &rest[close + 1..];
    }
    expr.push_str(&regex::escape(rest));
    expr.push('$');

    if expr == "^(.+?)$" {
        return Ok(Segment::Param(names.remove(0)));
    }
    let regex = Regex::new(&expr).map_err(|_| PatternError::Unterminated(pattern.to_string()))?;
    Ok(Segment::Mixed { regex, names })
}

/// Leading slash, no empty segments, no trailing slash.
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

/// Parse a query string into key-value pairs.
pub fn parse_query_string(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();

    for part in query.split('&') {
        if part.is_empty() {
            continue;
        }
        if let Some((key, value)) = part.split_once('=') {
            params.insert(percent_decode(key, true), percent_decode(value, true));
        } else {
            params.insert(percent_decode(part, true), String::new());
        }
    }

    params
}

/// Percent-decode at the byte level; malformed escapes are kept verbatim.
fn percent_decode(s: &str, plus_as_space: bool) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push(hi << 4 | lo);
                        i += 3;
                    }
                    _ => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' if plus_as_space => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}

/// Result of resolving a request against stored definitions.
#[derive(Debug, Clone)]
pub struct MatchedRoute {
    pub collection: Collection,
    pub definition: Definition,
    pub params: HashMap<String, String>,
}

/// Finds the definition serving a request.
#[derive(Debug, Clone, Default)]
pub struct RouteResolver {
    policy: MatchPolicy,
}

impl RouteResolver {
    pub fn new(policy: MatchPolicy) -> Self {
        Self { policy }
    }

    pub async fn resolve(
        &self,
        collections: &dyn CollectionStore,
        definitions: &dyn DefinitionStore,
        collection_key: &str,
        method: &str,
        path: &str,
    ) -> Result<MatchedRoute, EngineError> {
        let collection = collections
            .find_by_sub_domain(collection_key)
            .await?
            .ok_or_else(|| EngineError::CollectionNotFound(collection_key.to_string()))?;

        let path = normalize_path(path);
        let not_found = || EngineError::DefinitionNotFound {
            method: method.to_uppercase(),
            path: path.clone(),
        };

        let Ok(verb) = method.parse::<HttpMethod>() else {
            return Err(not_found());
        };

        if let Some(definition) = definitions.find_exact(collection.id, verb, &path).await? {
            debug!(definition_id = %definition.id, "Exact route match");
            return Ok(MatchedRoute {
                collection,
                definition,
                params: HashMap::new(),
            });
        }

        let mut cursor = definitions.stream_by(collection.id, verb).await?;
        let mut best: Option<((usize, Reverse<usize>), Definition, HashMap<String, String>)> = None;

        while let Some(next) = cursor.next().await {
            let definition = next?;
            let pattern = match PathPattern::parse(&definition.path_pattern) {
                Ok(pattern) => pattern,
                Err(e) => {
                    warn!(definition_id = %definition.id, error = %e, "Skipping definition with invalid path pattern");
                    continue;
                }
            };
            let Some(params) = pattern.matches(&path) else {
                continue;
            };

            match self.policy {
                MatchPolicy::CreationOrder => {
                    best = Some((pattern.specificity(), definition, params));
                    break;
                }
                MatchPolicy::MostSpecific => {
                    let specificity = pattern.specificity();
                    let better = best
                        .as_ref()
                        .map_or(true, |(current, _, _)| specificity > *current);
                    if better {
                        best = Some((specificity, definition, params));
                    }
                }
            }
        }
        cursor.close();

        let (_, definition, params) = best.ok_or_else(not_found)?;
        debug!(definition_id = %definition.id, pattern = %definition.path_pattern, "Pattern route match");
        Ok(MatchedRoute {
            collection,
            definition,
            params,
        })
    }
}
