//! Error types for the MQTT↔MCP bridge.
//!
//! Two audiences exist for errors here: the invoking client, which only
//! ever sees `InvokeError`, and the operator, who sees everything else in
//! the logs. Malformed wire payloads are never surfaced as errors at all;
//! the intakes log and drop them.

use thiserror::Error;

/// Errors reading the bridge configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable held a value that could not be parsed.
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

/// Errors from the pub/sub transport layer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Initial connection to the broker failed. Fatal at startup.
    #[error("transport connection failed: {0}")]
    ConnectionFailed(String),

    /// A subscription could not be established.
    #[error("subscribe to {filter:?} failed: {reason}")]
    SubscribeFailed { filter: String, reason: String },

    /// A publish was rejected or the client is no longer running.
    #[error("publish to {topic:?} failed: {reason}")]
    PublishFailed { topic: String, reason: String },
}

/// Errors visible to the invoking client.
///
/// These are the only error shapes the front-end dispatch path reports;
/// everything else stays operator-visible in the logs.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// No tool with this name is currently registered.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// A declared required parameter was neither supplied nor defaulted.
    #[error("missing required parameter {parameter:?} for tool {tool:?}")]
    MissingParameter { tool: String, parameter: String },

    /// No result arrived within the configured invocation timeout.
    #[error("tool {tool:?} timed out after {timeout_secs}s")]
    Timeout { tool: String, timeout_secs: u64 },

    /// Publishing the command failed before the call could be dispatched.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The bridge shut down while the call was in flight.
    #[error("bridge shut down while call was pending")]
    Shutdown,
}

/// Errors that abort bridge startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
