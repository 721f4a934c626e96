//! Pub/sub transport seam.
//!
//! The broker itself (connection keep-alive, retry, QoS, retained message
//! semantics) is an external collaborator; the bridge consumes it through
//! the [`PubSubTransport`] trait plus an inbound message channel. Two
//! implementations exist: [`mqtt::MqttTransport`] backed by `rumqttc` for
//! real deployments, and [`memory::InMemoryTransport`] for tests and
//! demos.
//!
//! Inbound delivery is a plain `mpsc` channel rather than a callback: the
//! transport's network task forwards every matching message into it, and
//! the bridge's dispatch task fans messages out to the intakes. That keeps
//! the network task free of bridge logic.

pub mod memory;
pub mod mqtt;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TransportError;

/// A message delivered by the transport on one of its subscriptions.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Concrete topic the message arrived on.
    pub topic: String,
    /// Raw payload bytes.
    pub payload: Bytes,
}

/// Minimal capability surface the bridge needs from a pub/sub transport.
#[async_trait]
pub trait PubSubTransport: Send + Sync {
    /// Publish `payload` to `topic` (non-retained).
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), TransportError>;

    /// Subscribe to a topic filter; matching messages are delivered on
    /// the transport's inbound channel.
    async fn subscribe(&self, filter: &str) -> Result<(), TransportError>;

    /// Tear down the connection. Idempotent.
    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// MQTT-style topic filter matching: `+` matches exactly one level, a
/// trailing `#` matches the remainder of the topic.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_filter_matches_only_itself() {
        assert!(topic_matches("mcp/register", "mcp/register"));
        assert!(!topic_matches("mcp/register", "mcp/register/extra"));
        assert!(!topic_matches("mcp/register", "mcp"));
    }

    #[test]
    fn hash_matches_any_remainder() {
        assert!(topic_matches("mcp/results/#", "mcp/results/hello"));
        assert!(topic_matches("mcp/results/#", "mcp/results/a/b/c"));
        assert!(!topic_matches("mcp/results/#", "mcp/commands/hello"));
    }

    #[test]
    fn plus_matches_exactly_one_level() {
        assert!(topic_matches("mcp/+/hello", "mcp/results/hello"));
        assert!(!topic_matches("mcp/+/hello", "mcp/results/deep/hello"));
        assert!(!topic_matches("mcp/+", "mcp"));
    }
}
