//! Template resolution: `{{path.to.value}}` substitution.
//!
//! Templates are resolved against a [`Scope`]: the recorded node outputs
//! of the current conversation, the global-variable map, and the inbound
//! event payload. Resolution is pure and total: a missing path renders
//! as the empty string, never an error.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::graph::NodeId;
use crate::node::NodeOutput;

/// Resolution context for templates and conditions.
///
/// Path roots are tried in order: a node ID (addressing that node's
/// output), a global variable, then the reserved root `inbound` for the
/// triggering event payload.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    globals: &'a Map<String, Value>,
    outputs: &'a HashMap<NodeId, NodeOutput>,
    inbound: &'a Value,
}

impl<'a> Scope<'a> {
    /// Creates a scope over the given context pieces.
    pub fn new(
        globals: &'a Map<String, Value>,
        outputs: &'a HashMap<NodeId, NodeOutput>,
        inbound: &'a Value,
    ) -> Self {
        Self {
            globals,
            outputs,
            inbound,
        }
    }

    /// Resolves a dotted path to a value.
    ///
    /// Supports nested fields (`node.field.subfield`), array indexing
    /// (`items[0].name` or `items.0.name`), and `.length` on arrays,
    /// objects, and strings.
    pub fn resolve_path(&self, path: &str) -> Option<Value> {
        let segments = split_path(path);
        let (root, rest) = segments.split_first()?;

        let base: Value = if let Some(output) = self.outputs.get(&NodeId::from(root.as_str())) {
            Value::Object(output.as_map().clone())
        } else if let Some(value) = self.globals.get(root.as_str()) {
            value.clone()
        } else if root == "inbound" {
            self.inbound.clone()
        } else {
            return None;
        };

        navigate(base, rest)
    }

    /// Renders a template, substituting every `{{...}}` placeholder.
    ///
    /// Unresolved placeholders render as the empty string so a broken
    /// reference degrades the message instead of aborting the run.
    pub fn render(&self, template: &str) -> String {
        let mut rendered = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("{{") {
            rendered.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find("}}") {
                Some(end) => {
                    let path = after[..end].trim();
                    if let Some(value) = self.resolve_path(path) {
                        rendered.push_str(&value_to_string(&value));
                    }
                    rest = &after[end + 2..];
                }
                None => {
                    // Unterminated placeholder; emit the rest verbatim.
                    rendered.push_str(&rest[start..]);
                    return rendered;
                }
            }
        }

        rendered.push_str(rest);
        rendered
    }

    /// Resolves a template to a typed value.
    ///
    /// A template that is exactly one placeholder yields the referenced
    /// JSON value unchanged (so numbers and objects keep their type);
    /// anything else renders to a string.
    pub fn resolve_value(&self, template: &str) -> Value {
        let trimmed = template.trim();
        if let Some(path) = single_placeholder(trimmed) {
            return self.resolve_path(path).unwrap_or(Value::String(String::new()));
        }
        Value::String(self.render(template))
    }
}

/// Returns the inner path if the template is exactly one placeholder.
fn single_placeholder(template: &str) -> Option<&str> {
    let inner = template.strip_prefix("{{")?.strip_suffix("}}")?;
    if inner.contains("{{") || inner.contains("}}") {
        return None;
    }
    Some(inner.trim())
}

/// Splits a path into segments, treating `[i]` as a segment.
fn split_path(path: &str) -> Vec<String> {
    let mut segments = Vec::new();
    for part in path.split('.') {
        let mut rest = part;
        while let Some(open) = rest.find('[') {
            if !rest[..open].is_empty() {
                segments.push(rest[..open].to_string());
            }
            match rest[open..].find(']') {
                Some(close) => {
                    segments.push(rest[open + 1..open + close].to_string());
                    rest = &rest[open + close + 1..];
                }
                None => {
                    rest = "";
                }
            }
        }
        if !rest.is_empty() {
            segments.push(rest.to_string());
        }
    }
    segments
}

/// Walks the remaining segments down a value.
fn navigate(base: Value, segments: &[String]) -> Option<Value> {
    let mut current = base;
    for segment in segments {
        current = match current {
            Value::Object(mut map) => map.remove(segment.as_str()).or_else(|| {
                (segment == "length").then(|| Value::from(map.len()))
            })?,
            Value::Array(mut items) => {
                if segment == "length" {
                    Value::from(items.len())
                } else {
                    let index: usize = segment.parse().ok()?;
                    if index >= items.len() {
                        return None;
                    }
                    items.swap_remove(index)
                }
            }
            Value::String(s) if segment == "length" => Value::from(s.chars().count()),
            _ => return None,
        };
    }
    Some(current)
}

/// Resolves a dotted path inside an arbitrary JSON value.
///
/// Same path grammar as [`Scope::resolve_path`], without the scope
/// roots. Used to unwrap payloads out of response bodies.
pub fn get_path(value: &Value, path: &str) -> Option<Value> {
    navigate(value.clone(), &split_path(path))
}

/// Renders a JSON value as template output.
pub(crate) fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
