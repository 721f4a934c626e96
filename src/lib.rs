//! # MQTT↔MCP Bridge
//!
//! Bridges a request/response tool-invocation surface onto an MQTT
//! pub/sub network. Capability providers announce their tools at runtime
//! on a well-known topic; the bridge registers each announcement as a
//! callable tool, turns every invocation into a published command plus a
//! pending completion record, and matches asynchronously arriving results
//! back to the suspended caller by correlation id.
//!
//! The moving parts, transport-in to caller-out:
//!
//! - [`transport`] — the pub/sub seam (`rumqttc` in production, an
//!   in-memory loopback in tests).
//! - [`intake`] — transport-side handlers: announcements go unparsed into
//!   a bounded hand-off queue, results resolve the pending-call table.
//! - [`processor`] — the single worker that validates announcements and
//!   installs tool definitions.
//! - [`registry`] — the dynamic tool registry (last-writer-wins).
//! - [`engine`] — the correlation engine behind every invocation.
//! - [`bridge`] — lifecycle manager tying it all together.
//! - [`server`] — axum front-end: discovery listing and dispatch.

pub mod bridge;
pub mod config;
pub mod engine;
pub mod error;
pub mod intake;
pub mod pending;
pub mod processor;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod transport;

pub use bridge::{Bridge, BridgeState};
pub use config::BridgeConfig;
pub use error::{ConfigError, InvokeError, StartupError, TransportError};
pub use registry::{ToolDefinition, ToolRegistry};

/// Crate version, reported by the health endpoint.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
