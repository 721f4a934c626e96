//! In-memory transport for tests and demos.
//!
//! Plays both sides of a broker conversation: outbound publishes are
//! handed to a channel the test can drain (the "provider" side), and
//! [`InMemoryTransport::deliver`] injects a message back as if the broker
//! delivered it on a matching subscription.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{topic_matches, InboundMessage, PubSubTransport};
use crate::error::TransportError;

/// A message published through the transport, as observed by the test.
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Bytes,
}

/// Loopback transport with broker-like filter matching on delivery.
pub struct InMemoryTransport {
    inbound_tx: mpsc::UnboundedSender<InboundMessage>,
    published_tx: mpsc::UnboundedSender<PublishedMessage>,
    subscriptions: Mutex<Vec<String>>,
}

impl InMemoryTransport {
    /// Create a transport plus the two channel ends a harness needs: the
    /// inbound receiver (wired into the bridge) and the published
    /// receiver (drained by the fake provider).
    pub fn new() -> (
        Arc<Self>,
        mpsc::UnboundedReceiver<InboundMessage>,
        mpsc::UnboundedReceiver<PublishedMessage>,
    ) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (published_tx, published_rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            inbound_tx,
            published_tx,
            subscriptions: Mutex::new(Vec::new()),
        });
        (transport, inbound_rx, published_rx)
    }

    /// Deliver a message as the broker would: only if some subscription
    /// filter matches the topic.
    pub fn deliver(&self, topic: &str, payload: impl Into<Bytes>) {
        let matched = self
            .subscriptions
            .lock()
            .iter()
            .any(|filter| topic_matches(filter, topic));
        if !matched {
            return;
        }
        let _ = self.inbound_tx.send(InboundMessage {
            topic: topic.to_string(),
            payload: payload.into(),
        });
    }

    /// Currently registered subscription filters.
    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().clone()
    }
}

#[async_trait]
impl PubSubTransport for InMemoryTransport {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), TransportError> {
        self.published_tx
            .send(PublishedMessage {
                topic: topic.to_string(),
                payload,
            })
            .map_err(|_| TransportError::PublishFailed {
                topic: topic.to_string(),
                reason: "publish receiver dropped".to_string(),
            })
    }

    async fn subscribe(&self, filter: &str) -> Result<(), TransportError> {
        self.subscriptions.lock().push(filter.to_string());
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivery_respects_subscription_filters() {
        let (transport, mut inbound_rx, _published_rx) = InMemoryTransport::new();
        transport.subscribe("mcp/results/#").await.unwrap();

        transport.deliver("mcp/results/hello", &b"{}"[..]);
        transport.deliver("unrelated/topic", &b"{}"[..]);

        let msg = inbound_rx.recv().await.unwrap();
        assert_eq!(msg.topic, "mcp/results/hello");
        assert!(inbound_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn publishes_are_observable() {
        let (transport, _inbound_rx, mut published_rx) = InMemoryTransport::new();
        transport
            .publish("mcp/commands/hello", Bytes::from_static(b"payload"))
            .await
            .unwrap();

        let seen = published_rx.recv().await.unwrap();
        assert_eq!(seen.topic, "mcp/commands/hello");
        assert_eq!(seen.payload, Bytes::from_static(b"payload"));
    }
}
