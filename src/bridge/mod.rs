//! Bridge lifecycle manager.
//!
//! Owns the shared state (registry, pending table, hand-off queue), wires
//! the transport's inbound channel to the two intakes, and runs the
//! registration processor. State machine:
//!
//! `Stopped → Starting → Running → Stopping → Stopped`
//!
//! Startup subscribes before anything else so a dead broker surfaces as a
//! startup error rather than a silently idle bridge. Shutdown flips the
//! processor's watch flag, waits for it (bounded by its poll interval),
//! aborts the dispatch task, drops every pending call's completion
//! handle, and disconnects. In-flight `invoke` calls observe the dropped
//! handle as a shutdown error (or their own timeout, whichever comes
//! first) — they are never left hanging.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::BridgeConfig;
use crate::engine::CorrelationEngine;
use crate::error::{InvokeError, StartupError};
use crate::intake::{AnnouncementIntake, HandoffQueue, ResultIntake};
use crate::pending::PendingCalls;
use crate::processor::RegistrationProcessor;
use crate::registry::{ToolDefinition, ToolRegistry};
use crate::transport::{topic_matches, InboundMessage, PubSubTransport};

/// Lifecycle states of the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// The assembled bridge: transport on one side, tool dispatch on the
/// other.
pub struct Bridge {
    config: BridgeConfig,
    registry: Arc<ToolRegistry>,
    pending: Arc<PendingCalls>,
    transport: Arc<dyn PubSubTransport>,
    engine: CorrelationEngine,
    state: Mutex<BridgeState>,
    shutdown_tx: watch::Sender<bool>,
    processor_task: Mutex<Option<JoinHandle<()>>>,
    dispatch_task: Mutex<Option<JoinHandle<()>>>,
}

impl Bridge {
    /// Start the bridge on an already-connected transport.
    ///
    /// Subscribes to the announcement topic and the result filter, starts
    /// the inbound dispatch task and the registration processor, and
    /// transitions to `Running`. Subscription failure aborts startup.
    pub async fn start(
        config: BridgeConfig,
        transport: Arc<dyn PubSubTransport>,
        mut inbound: mpsc::UnboundedReceiver<InboundMessage>,
    ) -> Result<Arc<Self>, StartupError> {
        let registry = Arc::new(ToolRegistry::new());
        let pending = Arc::new(PendingCalls::new());
        let queue = Arc::new(HandoffQueue::new(config.handoff_capacity));
        let engine =
            CorrelationEngine::new(transport.clone(), pending.clone(), config.invoke_timeout);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let bridge = Arc::new(Self {
            config,
            registry,
            pending,
            transport,
            engine,
            state: Mutex::new(BridgeState::Starting),
            shutdown_tx,
            processor_task: Mutex::new(None),
            dispatch_task: Mutex::new(None),
        });
        tracing::info!(
            announce_topic = %bridge.config.announce_topic,
            result_filter = %bridge.config.result_filter,
            "bridge starting"
        );

        bridge.transport.subscribe(&bridge.config.announce_topic).await?;
        bridge.transport.subscribe(&bridge.config.result_filter).await?;

        // Inbound dispatch: route each transport message to its intake.
        let announcement_intake = AnnouncementIntake::new(queue.clone());
        let result_intake = ResultIntake::new(bridge.pending.clone());
        let announce_topic = bridge.config.announce_topic.clone();
        let result_filter = bridge.config.result_filter.clone();
        let dispatch_task = tokio::spawn(async move {
            while let Some(message) = inbound.recv().await {
                if message.topic == announce_topic {
                    announcement_intake.handle(message.payload);
                } else if topic_matches(&result_filter, &message.topic) {
                    result_intake.handle(&message.topic, &message.payload);
                } else {
                    tracing::debug!(topic = %message.topic, "ignoring message on unexpected topic");
                }
            }
            tracing::debug!("inbound dispatch task exited");
        });

        let processor = RegistrationProcessor::new(
            queue,
            bridge.registry.clone(),
            bridge.config.command_prefix.clone(),
            bridge.config.poll_interval,
        );
        let processor_task = tokio::spawn(processor.run(shutdown_rx));

        *bridge.dispatch_task.lock() = Some(dispatch_task);
        *bridge.processor_task.lock() = Some(processor_task);
        *bridge.state.lock() = BridgeState::Running;
        tracing::info!("bridge running");
        Ok(bridge)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> BridgeState {
        *self.state.lock()
    }

    /// The dynamic tool registry (read side: discovery listing).
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Number of invocations currently awaiting a result.
    pub fn pending_calls(&self) -> usize {
        self.pending.len()
    }

    /// The configuration the bridge was started with.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Look up a registered tool.
    pub fn tool(&self, name: &str) -> Option<ToolDefinition> {
        self.registry.get(name)
    }

    /// Invoke a registered tool through the correlation engine.
    pub async fn invoke(
        &self,
        name: &str,
        args: &Map<String, Value>,
    ) -> Result<Value, InvokeError> {
        let definition = self
            .registry
            .get(name)
            .ok_or_else(|| InvokeError::UnknownTool(name.to_string()))?;
        self.engine.invoke(&definition, args).await
    }

    /// Stop the bridge. Idempotent; concurrent calls after the first are
    /// no-ops.
    pub async fn shutdown(&self) {
        {
            let mut state = self.state.lock();
            if *state != BridgeState::Running {
                return;
            }
            *state = BridgeState::Stopping;
        }
        tracing::info!("bridge stopping");

        let _ = self.shutdown_tx.send(true);
        let processor_task = self.processor_task.lock().take();
        if let Some(task) = processor_task {
            // Bounded by the processor's poll interval; the grace window
            // leaves room for an in-flight announcement.
            let grace = self.config.poll_interval * 4;
            if tokio::time::timeout(grace, task).await.is_err() {
                tracing::warn!("registration processor did not stop in time");
            }
        }

        let dispatch_task = self.dispatch_task.lock().take();
        if let Some(task) = dispatch_task {
            task.abort();
        }

        // Dispatch is gone, so no result can resolve these anymore; drop
        // their handles and let the waiting invoke calls return.
        let abandoned = self.pending.abandon_all();
        if abandoned > 0 {
            tracing::warn!(abandoned, "abandoned pending calls at shutdown");
        }

        if let Err(err) = self.transport.disconnect().await {
            tracing::warn!(error = %err, "transport disconnect failed");
        }

        *self.state.lock() = BridgeState::Stopped;
        tracing::info!("bridge stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{CommandEnvelope, ResultEnvelope};
    use crate::transport::memory::{InMemoryTransport, PublishedMessage};
    use serde_json::json;
    use std::time::Duration;

    fn test_config() -> BridgeConfig {
        BridgeConfig {
            invoke_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(10),
            ..Default::default()
        }
    }

    async fn wait_until(mut condition: impl FnMut() -> bool, what: &str) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("timed out waiting for {what}");
    }

    /// Answers every hello command with the canonical greeting.
    fn spawn_hello_provider(
        transport: Arc<InMemoryTransport>,
        mut published_rx: mpsc::UnboundedReceiver<PublishedMessage>,
    ) {
        tokio::spawn(async move {
            while let Some(command) = published_rx.recv().await {
                let envelope: CommandEnvelope =
                    serde_json::from_slice(&command.payload).expect("command should be JSON");
                let name = envelope.params["name"].as_str().unwrap_or("World").to_string();
                let reply = ResultEnvelope {
                    correlation_id: envelope.correlation_id,
                    result: json!(format!("Hello {name} at 10:00:00")),
                };
                transport.deliver("mcp/results/hello", reply.to_bytes());
            }
        });
    }

    #[tokio::test]
    async fn startup_subscribes_announcements_and_results() {
        let (transport, inbound_rx, _published_rx) = InMemoryTransport::new();
        let bridge = Bridge::start(test_config(), transport.clone(), inbound_rx)
            .await
            .unwrap();

        assert_eq!(bridge.state(), BridgeState::Running);
        let subs = transport.subscriptions();
        assert!(subs.contains(&"mcp/register".to_string()));
        assert!(subs.contains(&"mcp/results/#".to_string()));
        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn announcement_becomes_a_callable_tool_round_trip() {
        let (transport, inbound_rx, published_rx) = InMemoryTransport::new();
        let bridge = Bridge::start(test_config(), transport.clone(), inbound_rx)
            .await
            .unwrap();

        transport.deliver(
            "mcp/register",
            &br#"{"name": "hello", "description": "greets",
                 "parameters": [{"name": "name", "type": "str", "default": "World"}]}"#[..],
        );
        wait_until(|| bridge.tool("hello").is_some(), "hello registration").await;

        spawn_hello_provider(transport.clone(), published_rx);

        let mut args = Map::new();
        args.insert("name".to_string(), json!("World"));
        let result = bridge.invoke("hello", &args).await.unwrap();
        assert_eq!(result, json!("Hello World at 10:00:00"));
        assert_eq!(bridge.pending_calls(), 0);

        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn invoking_unknown_tool_fails_locally() {
        let (transport, inbound_rx, mut published_rx) = InMemoryTransport::new();
        let bridge = Bridge::start(test_config(), transport, inbound_rx)
            .await
            .unwrap();

        let err = bridge.invoke("nope", &Map::new()).await.unwrap_err();
        assert!(matches!(err, InvokeError::UnknownTool(_)));
        assert!(published_rx.try_recv().is_err());
        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn reannouncement_replaces_definition_for_new_invocations() {
        let (transport, inbound_rx, _published_rx) = InMemoryTransport::new();
        let bridge = Bridge::start(test_config(), transport.clone(), inbound_rx)
            .await
            .unwrap();

        transport.deliver("mcp/register", &br#"{"name": "hello", "description": "v1"}"#[..]);
        wait_until(|| bridge.tool("hello").is_some(), "first registration").await;

        transport.deliver("mcp/register", &br#"{"name": "hello", "description": "v2"}"#[..]);
        wait_until(
            || bridge.tool("hello").map(|t| t.description) == Some("v2".to_string()),
            "replacement registration",
        )
        .await;

        assert_eq!(bridge.registry().len(), 1);
        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn malformed_announcements_never_reach_the_registry() {
        let (transport, inbound_rx, _published_rx) = InMemoryTransport::new();
        let bridge = Bridge::start(test_config(), transport.clone(), inbound_rx)
            .await
            .unwrap();

        transport.deliver("mcp/register", &b"garbage"[..]);
        transport.deliver("mcp/register", &br#"{"name": ""}"#[..]);
        transport.deliver("mcp/register", &br#"{"name": "valid"}"#[..]);
        wait_until(|| bridge.tool("valid").is_some(), "valid registration").await;

        assert_eq!(bridge.registry().len(), 1);
        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn stray_result_is_ignored_without_state_change() {
        let (transport, inbound_rx, _published_rx) = InMemoryTransport::new();
        let bridge = Bridge::start(test_config(), transport.clone(), inbound_rx)
            .await
            .unwrap();

        transport.deliver(
            "mcp/results/hello",
            &br#"{"correlation_id": "never-issued", "result": 1}"#[..],
        );
        // Unrelated topics are ignored by dispatch entirely.
        transport.deliver("mcp/register", &br#"{"name": "hello"}"#[..]);
        wait_until(|| bridge.tool("hello").is_some(), "registration").await;

        assert_eq!(bridge.pending_calls(), 0);
        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn inflight_invoke_returns_promptly_across_shutdown() {
        let (transport, inbound_rx, _published_rx) = InMemoryTransport::new();
        let config = BridgeConfig {
            // Far longer than the test guard: a hang would mean the call
            // only ever ends via its own timeout.
            invoke_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(10),
            ..Default::default()
        };
        let bridge = Bridge::start(config, transport.clone(), inbound_rx)
            .await
            .unwrap();

        transport.deliver("mcp/register", &br#"{"name": "hello"}"#[..]);
        wait_until(|| bridge.tool("hello").is_some(), "registration").await;

        // No provider answers, so this call stays pending.
        let invocation = tokio::spawn({
            let bridge = bridge.clone();
            async move { bridge.invoke("hello", &Map::new()).await }
        });
        wait_until(|| bridge.pending_calls() == 1, "pending call").await;

        bridge.shutdown().await;

        let result = tokio::time::timeout(Duration::from_secs(2), invocation)
            .await
            .expect("invoke hung past shutdown")
            .unwrap();
        assert!(matches!(result.unwrap_err(), InvokeError::Shutdown));
        assert_eq!(bridge.pending_calls(), 0);
        assert_eq!(bridge.state(), BridgeState::Stopped);
    }

    #[tokio::test]
    async fn shutdown_is_idempotent_and_reaches_stopped() {
        let (transport, inbound_rx, _published_rx) = InMemoryTransport::new();
        let bridge = Bridge::start(test_config(), transport, inbound_rx)
            .await
            .unwrap();

        bridge.shutdown().await;
        assert_eq!(bridge.state(), BridgeState::Stopped);
        bridge.shutdown().await;
        assert_eq!(bridge.state(), BridgeState::Stopped);
    }
}
