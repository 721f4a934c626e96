//! Tool registry — the bridge's dynamic capability registry.
//!
//! Every validated announcement becomes a [`ToolDefinition`] installed
//! here under its name. Registration is last-writer-wins: a re-announced
//! tool silently replaces the previous definition, and replacement only
//! affects invocations issued afterwards — calls already dispatched keep
//! the envelope they were built with.
//!
//! Writes come only from the registration processor; reads come from the
//! front-end dispatch path. `DashMap` gives that single-writer/many-reader
//! access pattern per-entry locking without a table-wide guard.

use dashmap::DashMap;
use serde_json::{Map, Value};

use crate::error::InvokeError;
use crate::protocol::{Announcement, ParameterSpec};

// ---------------------------------------------------------------------------
// ToolDefinition
// ---------------------------------------------------------------------------

/// An installed tool: a validated announcement plus its derived command
/// topic. This is the single data value the uniform invocation routine is
/// parameterized by — there is no per-tool generated handler.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    /// Tool name; registry key and command-topic suffix.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Declared parameters, in announcement order.
    pub parameters: Vec<ParameterSpec>,
    /// Topic commands for this tool are published to.
    pub command_topic: String,
}

impl ToolDefinition {
    /// Build a definition from a validated announcement.
    ///
    /// The caller has already checked that `announcement.name` is
    /// non-empty; the command topic is derived as `<prefix>/<name>`.
    pub fn from_announcement(announcement: Announcement, command_prefix: &str) -> Self {
        let command_topic = format!("{}/{}", command_prefix, announcement.name);
        Self {
            name: announcement.name,
            description: announcement.description,
            parameters: announcement.parameters,
            command_topic,
        }
    }

    /// Bind caller-supplied arguments against the declared parameters.
    ///
    /// Unknown arguments are dropped, omitted parameters take their
    /// declared default, and an omitted parameter with no default is a
    /// local validation error — nothing gets published in that case.
    pub fn bind_arguments(
        &self,
        args: &Map<String, Value>,
    ) -> Result<Map<String, Value>, InvokeError> {
        let mut bound = Map::new();
        for spec in &self.parameters {
            if let Some(value) = args.get(&spec.name) {
                bound.insert(spec.name.clone(), value.clone());
            } else if let Some(default) = &spec.default {
                bound.insert(spec.name.clone(), default.clone());
            } else {
                return Err(InvokeError::MissingParameter {
                    tool: self.name.clone(),
                    parameter: spec.name.clone(),
                });
            }
        }
        Ok(bound)
    }

    /// JSON schema of the declared parameters, for the discovery listing.
    pub fn params_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|spec| {
                let mut prop = Map::new();
                prop.insert("type".to_string(), Value::String(spec.type_tag.clone()));
                if let Some(desc) = &spec.description {
                    prop.insert("description".to_string(), Value::String(desc.clone()));
                }
                if let Some(default) = &spec.default {
                    prop.insert("default".to_string(), default.clone());
                }
                (spec.name.clone(), Value::Object(prop))
            })
            .collect();

        let required: Vec<Value> = self
            .parameters
            .iter()
            .filter(|spec| spec.default.is_none())
            .map(|spec| Value::String(spec.name.clone()))
            .collect();

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

// ---------------------------------------------------------------------------
// ToolRegistry
// ---------------------------------------------------------------------------

/// Shared map from tool name to its installed definition.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: DashMap<String, ToolDefinition>,
}

impl ToolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a definition, replacing any previous one with the same
    /// name. Returns the replaced definition, if any.
    pub fn register(&self, definition: ToolDefinition) -> Option<ToolDefinition> {
        self.tools.insert(definition.name.clone(), definition)
    }

    /// Look up a definition by name (cloned, so the dispatch path holds
    /// no registry lock across an invocation).
    pub fn get(&self, name: &str) -> Option<ToolDefinition> {
        self.tools.get(name).map(|entry| entry.value().clone())
    }

    /// Names of all registered tools, sorted for stable listings.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// All registered definitions, sorted by name.
    pub fn list(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> =
            self.tools.iter().map(|e| e.value().clone()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
