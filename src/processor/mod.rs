//! Registration processor — the single writer of the tool registry.
//!
//! A long-lived loop drains the announcement hand-off queue, validates
//! each payload, and installs the resulting definition. Serializing all
//! registry writes through this one loop means concurrent announcements
//! can never race each other; readers see either the old or the new
//! definition, never a mix.
//!
//! Per-announcement failures are isolated: one malformed payload is
//! logged and discarded without touching the loop. The loop only exits
//! when the lifecycle manager flips the shutdown flag, and it notices
//! that within one poll interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::intake::HandoffQueue;
use crate::protocol::Announcement;
use crate::registry::{ToolDefinition, ToolRegistry};

/// Drains announcements into the tool registry.
pub struct RegistrationProcessor {
    queue: Arc<HandoffQueue>,
    registry: Arc<ToolRegistry>,
    command_prefix: String,
    poll_interval: Duration,
}

impl RegistrationProcessor {
    pub fn new(
        queue: Arc<HandoffQueue>,
        registry: Arc<ToolRegistry>,
        command_prefix: impl Into<String>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            queue,
            registry,
            command_prefix: command_prefix.into(),
            poll_interval,
        }
    }

    /// Run until `shutdown` turns true. Queued announcements are
    /// processed back-to-back; an empty queue is re-checked every poll
    /// interval (or immediately on shutdown).
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::debug!("registration processor started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            match self.queue.pop() {
                Some(raw) => self.process_announcement(&raw),
                None => {
                    tokio::select! {
                        _ = tokio::time::sleep(self.poll_interval) => {}
                        _ = shutdown.changed() => {}
                    }
                }
            }
        }
        tracing::debug!("registration processor stopped");
    }

    /// Validate one raw announcement and install it. Never panics; every
    /// failure path is a log line and a discard.
    fn process_announcement(&self, raw: &[u8]) {
        let announcement = match Announcement::from_bytes(raw) {
            Ok(announcement) => announcement,
            Err(err) => {
                tracing::warn!(error = %err, "discarding malformed announcement");
                return;
            }
        };
        if announcement.name.is_empty() {
            tracing::warn!("discarding announcement with empty tool name");
            return;
        }

        let definition = ToolDefinition::from_announcement(announcement, &self.command_prefix);
        let name = definition.name.clone();
        let parameter_count = definition.parameters.len();
        let replaced = self.registry.register(definition).is_some();
        tracing::info!(
            tool = %name,
            parameters = parameter_count,
            replaced,
            "tool registered"
        );
    }
}
