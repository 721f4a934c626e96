//! Transport-side intake handlers.
//!
//! Both handlers run on the inbound dispatch path, i.e. in the transport's
//! concurrency domain, and must stay cheap: the announcement intake only
//! enqueues raw bytes (parsing and registry work happen later in the
//! registration processor), and the result intake does a single atomic
//! lookup-and-remove on the pending-call table.

use std::collections::VecDeque;

use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::pending::PendingCalls;
use crate::protocol::ResultEnvelope;

// ---------------------------------------------------------------------------
// HandoffQueue
// ---------------------------------------------------------------------------

/// Bounded hand-off buffer between the transport domain and the
/// registration processor. Overflow drops the oldest queued announcement
/// and logs it; the transport side is never blocked.
pub struct HandoffQueue {
    inner: Mutex<VecDeque<Bytes>>,
    capacity: usize,
}

impl HandoffQueue {
    /// Create a queue bounded at `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
        }
    }

    /// Enqueue raw announcement bytes, dropping the oldest entry when
    /// full. Never blocks.
    pub fn push(&self, raw: Bytes) {
        let mut queue = self.inner.lock();
        if queue.len() >= self.capacity {
            queue.pop_front();
            tracing::warn!(
                capacity = self.capacity,
                "announcement hand-off queue full; dropped oldest entry"
            );
        }
        queue.push_back(raw);
    }

    /// Take the next queued announcement, if any.
    pub fn pop(&self) -> Option<Bytes> {
        self.inner.lock().pop_front()
    }

    /// Number of queued announcements.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

// ---------------------------------------------------------------------------
// AnnouncementIntake
// ---------------------------------------------------------------------------

/// Receives raw announcement payloads and hands them off, unparsed.
pub struct AnnouncementIntake {
    queue: Arc<HandoffQueue>,
}

impl AnnouncementIntake {
    pub fn new(queue: Arc<HandoffQueue>) -> Self {
        Self { queue }
    }

    /// Handle one announcement message. The only side effect is a
    /// non-blocking enqueue.
    pub fn handle(&self, raw: Bytes) {
        tracing::debug!(bytes = raw.len(), "announcement received");
        self.queue.push(raw);
    }
}

// ---------------------------------------------------------------------------
// ResultIntake
// ---------------------------------------------------------------------------

/// Receives result payloads and resolves the matching pending call.
pub struct ResultIntake {
    pending: Arc<PendingCalls>,
}

impl ResultIntake {
    pub fn new(pending: Arc<PendingCalls>) -> Self {
        Self { pending }
    }

    /// Handle one result message.
    ///
    /// Malformed payloads and unmatched correlation ids are logged and
    /// dropped; both are expected under timeout races and transport
    /// redelivery and never propagate anywhere.
    pub fn handle(&self, topic: &str, raw: &[u8]) {
        let envelope = match ResultEnvelope::from_bytes(raw) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!(topic, error = %err, "discarding malformed result payload");
                return;
            }
        };
        if envelope.correlation_id.is_empty() {
            tracing::warn!(topic, "discarding result with empty correlation id");
            return;
        }

        if !self
            .pending
            .resolve(&envelope.correlation_id, envelope.result)
        {
            tracing::warn!(
                topic,
                correlation_id = %envelope.correlation_id,
                "result did not match any pending call (timed out, duplicate, or unknown)"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn queue_drops_oldest_on_overflow() {
        let queue = HandoffQueue::new(2);
        queue.push(Bytes::from_static(b"a"));
        queue.push(Bytes::from_static(b"b"));
        queue.push(Bytes::from_static(b"c"));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop().unwrap(), Bytes::from_static(b"b"));
        assert_eq!(queue.pop().unwrap(), Bytes::from_static(b"c"));
        assert!(queue.pop().is_none());
    }

    #[test]
    fn announcement_intake_enqueues_without_parsing() {
        let queue = Arc::new(HandoffQueue::new(8));
        let intake = AnnouncementIntake::new(queue.clone());

        // Garbage is fine here; validation belongs to the processor.
        intake.handle(Bytes::from_static(b"not even json"));
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn result_intake_resolves_matching_call() {
        let pending = Arc::new(PendingCalls::new());
        let rx = pending.register("id-1");
        let intake = ResultIntake::new(pending.clone());

        let payload = serde_json::to_vec(&json!({
            "correlation_id": "id-1",
            "result": "Hello World at 10:00:00",
        }))
        .unwrap();
        intake.handle("mcp/results/hello", &payload);

        assert_eq!(rx.await.unwrap(), json!("Hello World at 10:00:00"));
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn result_intake_ignores_unknown_and_malformed() {
        let pending = Arc::new(PendingCalls::new());
        let intake = ResultIntake::new(pending.clone());

        intake.handle("mcp/results/hello", b"garbage");
        intake.handle(
            "mcp/results/hello",
            br#"{"correlation_id": "never-issued", "result": 1}"#,
        );
        intake.handle("mcp/results/hello", br#"{"correlation_id": "", "result": 1}"#);

        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn duplicate_result_delivery_is_a_warning_no_op() {
        let pending = Arc::new(PendingCalls::new());
        let rx = pending.register("id-1");
        let intake = ResultIntake::new(pending.clone());

        let payload = br#"{"correlation_id": "id-1", "result": 7}"#;
        intake.handle("mcp/results/x", payload);
        intake.handle("mcp/results/x", payload);

        assert_eq!(rx.await.unwrap(), json!(7));
    }
}
