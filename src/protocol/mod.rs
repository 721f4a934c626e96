//! Wire contract between the bridge and capability providers.
//!
//! Three JSON envelopes travel over MQTT:
//!
//! - [`Announcement`] — provider → bridge, on the announce topic (normally
//!   retained so a late-joining bridge still sees it).
//! - [`CommandEnvelope`] — bridge → provider, on `commands/<tool>`.
//! - [`ResultEnvelope`] — provider → bridge, anywhere under the result
//!   filter. Correlation is payload-embedded: the result topic itself
//!   carries no correlation information.
//!
//! The `result` value is opaque to the bridge; providers report their own
//! errors inside it (an `{"error": ...}` object or a plain string) and the
//! bridge passes them through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Announcement
// ---------------------------------------------------------------------------

/// A capability announcement: the wire form of a tool definition.
///
/// Example payload, as published by the hello provider:
///
/// ```json
/// {
///   "name": "hello",
///   "description": "Responds with a greeting and the current time.",
///   "parameters": [
///     {"name": "name", "type": "str", "default": "World"}
///   ]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Announcement {
    /// Tool name; registry key and command-topic suffix.
    pub name: String,

    /// Human-readable description shown in the discovery listing.
    #[serde(default)]
    pub description: String,

    /// Declared parameters, in order.
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
}

impl Announcement {
    /// Parse an announcement from raw payload bytes.
    pub fn from_bytes(raw: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(raw)
    }
}

/// One declared parameter of an announced tool.
///
/// The `type` tag is carried opaquely for the discovery listing; the
/// bridge validates presence and applies defaults but does not type-check
/// values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Parameter name, unique within the tool.
    pub name: String,

    /// Declared type tag (`"str"`, `"string"`, `"int"`, ...).
    #[serde(rename = "type", default)]
    pub type_tag: String,

    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Whether the parameter must be supplied when no default exists.
    #[serde(default)]
    pub required: bool,

    /// Default value applied when the caller omits the parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

// ---------------------------------------------------------------------------
// Command / Result
// ---------------------------------------------------------------------------

/// Command published to a tool's command topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandEnvelope {
    /// Correlation id linking this command to its eventual result.
    pub correlation_id: String,

    /// Bound arguments: supplied values filtered against the declared
    /// parameters, with defaults filled in.
    pub params: Map<String, Value>,
}

impl CommandEnvelope {
    /// Serialize to the JSON bytes published on the wire.
    pub fn to_bytes(&self) -> Vec<u8> {
        // Serialization of a Map<String, Value> cannot fail.
        serde_json::to_vec(self).unwrap_or_default()
    }
}

/// Result published by a provider after handling a command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultEnvelope {
    /// Echo of the command's correlation id.
    pub correlation_id: String,

    /// Opaque result value; provider-reported errors live inside it.
    #[serde(default)]
    pub result: Value,
}

impl ResultEnvelope {
    /// Parse a result from raw payload bytes.
    pub fn from_bytes(raw: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(raw)
    }

    /// Serialize to the JSON bytes published on the wire.
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }
}
