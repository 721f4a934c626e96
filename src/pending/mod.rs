//! Pending-call table.
//!
//! One entry per in-flight invocation, keyed by correlation id. The table
//! is the meeting point of the two concurrency domains: the correlation
//! engine (scheduler side) inserts and removes entries, the result intake
//! (transport side) resolves them. Every access goes through one mutex so
//! lookup-and-remove is a single atomic step — a duplicate result finds
//! no entry and resolution happens at most once.
//!
//! Ownership: the `invoke` call that registered an entry is responsible
//! for its removal on every exit path; `resolve` removes as a side effect
//! of completing, which the owner then observes as a no-op.

use std::collections::HashMap;
use std::time::Instant;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;

struct PendingEntry {
    tx: oneshot::Sender<Value>,
    created_at: Instant,
}

/// Shared table of outstanding invocations.
#[derive(Default)]
pub struct PendingCalls {
    entries: Mutex<HashMap<String, PendingEntry>>,
}

impl PendingCalls {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending call and hand back the receiver the caller
    /// suspends on. Correlation ids are freshly generated UUIDs, so a
    /// collision means a bug upstream; the old entry is dropped and its
    /// waiter observes a closed channel.
    pub fn register(&self, correlation_id: &str) -> oneshot::Receiver<Value> {
        let (tx, rx) = oneshot::channel();
        let entry = PendingEntry {
            tx,
            created_at: Instant::now(),
        };
        let previous = self
            .entries
            .lock()
            .insert(correlation_id.to_string(), entry);
        if previous.is_some() {
            tracing::error!(correlation_id, "correlation id collision; replaced entry");
        }
        rx
    }

    /// Atomically look up and remove the entry for `correlation_id` and
    /// complete it with `value`. Returns `false` when no entry exists —
    /// already resolved, already timed out, or never issued — which is an
    /// expected, non-fatal occurrence.
    pub fn resolve(&self, correlation_id: &str, value: Value) -> bool {
        let entry = self.entries.lock().remove(correlation_id);
        match entry {
            Some(entry) => {
                tracing::debug!(
                    correlation_id,
                    elapsed_ms = entry.created_at.elapsed().as_millis() as u64,
                    "resolving pending call"
                );
                // A send error means the invoker already gave up (timed
                // out between our remove and this send); nothing to do.
                let _ = entry.tx.send(value);
                true
            }
            None => false,
        }
    }

    /// Remove an entry without completing it. Used by the owning `invoke`
    /// call on timeout and local-error paths; idempotent.
    pub fn discard(&self, correlation_id: &str) -> bool {
        self.entries.lock().remove(correlation_id).is_some()
    }

    /// Drop every outstanding entry without completing it. Each waiter
    /// observes a closed channel. Used by the lifecycle manager during
    /// `Stopping`; returns how many calls were abandoned.
    pub fn abandon_all(&self) -> usize {
        let mut entries = self.entries.lock();
        let abandoned = entries.len();
        entries.clear();
        abandoned
    }

    /// Whether an entry currently exists for `correlation_id`.
    pub fn contains(&self, correlation_id: &str) -> bool {
        self.entries.lock().contains_key(correlation_id)
    }

    /// Number of outstanding calls (diagnostics).
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no calls are outstanding.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
