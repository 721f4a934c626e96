//! Correlation engine — the invocation path.
//!
//! `invoke` is the one place a caller suspends: it binds arguments,
//! registers a pending entry, publishes the command, and waits for the
//! result intake to complete the entry or for the timeout to expire.
//!
//! The pending entry is inserted strictly before the command is
//! published, so a provider answering faster than the scheduler resumes
//! us still finds its entry. Every exit path removes the entry: success
//! (where the resolver already removed it and `discard` verifies the
//! no-op), timeout, publish failure, and bridge shutdown. A result
//! arriving after timeout therefore matches nothing and is dropped by the
//! intake with a warning.
//!
//! There is no per-tool handler: one uniform routine parameterized by the
//! [`ToolDefinition`] serves every registered tool, and any number of
//! invocations of the same tool may be in flight concurrently, each under
//! its own correlation id.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::InvokeError;
use crate::pending::PendingCalls;
use crate::protocol::CommandEnvelope;
use crate::registry::ToolDefinition;
use crate::transport::PubSubTransport;

/// Turns tool invocations into published commands and awaited results.
pub struct CorrelationEngine {
    transport: Arc<dyn PubSubTransport>,
    pending: Arc<PendingCalls>,
    timeout: Duration,
}

impl CorrelationEngine {
    pub fn new(
        transport: Arc<dyn PubSubTransport>,
        pending: Arc<PendingCalls>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            pending,
            timeout,
        }
    }

    /// Invoke `definition` with the caller's arguments and wait for the
    /// provider's result.
    ///
    /// Argument validation happens before any entry is inserted or
    /// anything is published: a missing required parameter is reported
    /// locally and leaves no trace on the wire or in the table.
    pub async fn invoke(
        &self,
        definition: &ToolDefinition,
        args: &Map<String, Value>,
    ) -> Result<Value, InvokeError> {
        let params = definition.bind_arguments(args)?;

        let correlation_id = Uuid::new_v4().to_string();
        let rx = self.pending.register(&correlation_id);

        let envelope = CommandEnvelope {
            correlation_id: correlation_id.clone(),
            params,
        };
        tracing::debug!(
            tool = %definition.name,
            correlation_id = %correlation_id,
            topic = %definition.command_topic,
            "publishing command"
        );
        if let Err(err) = self
            .transport
            .publish(&definition.command_topic, envelope.to_bytes().into())
            .await
        {
            self.pending.discard(&correlation_id);
            return Err(InvokeError::Transport(err));
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(value)) => {
                // Resolver already removed the entry; this is the
                // idempotent verification step.
                self.pending.discard(&correlation_id);
                Ok(value)
            }
            Ok(Err(_)) => {
                // Sender dropped without a value: the bridge tore the
                // table down while we were waiting.
                self.pending.discard(&correlation_id);
                Err(InvokeError::Shutdown)
            }
            Err(_) => {
                self.pending.discard(&correlation_id);
                tracing::warn!(
                    tool = %definition.name,
                    correlation_id = %correlation_id,
                    timeout_secs = self.timeout.as_secs(),
                    "invocation timed out"
                );
                Err(InvokeError::Timeout {
                    tool: definition.name.clone(),
                    timeout_secs: self.timeout.as_secs(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::ResultIntake;
    use crate::protocol::{Announcement, ResultEnvelope};
    use crate::transport::memory::InMemoryTransport;
    use serde_json::json;

    fn hello_definition() -> ToolDefinition {
        let ann = Announcement::from_bytes(
            br#"{"name": "hello", "parameters": [{"name": "name", "default": "World"}]}"#,
        )
        .unwrap();
        ToolDefinition::from_announcement(ann, "mcp/commands")
    }

    fn engine_parts(
        timeout: Duration,
    ) -> (
        CorrelationEngine,
        Arc<PendingCalls>,
        tokio::sync::mpsc::UnboundedReceiver<crate::transport::memory::PublishedMessage>,
    ) {
        let (transport, _inbound_rx, published_rx) = InMemoryTransport::new();
        let pending = Arc::new(PendingCalls::new());
        let engine = CorrelationEngine::new(transport, pending.clone(), timeout);
        (engine, pending, published_rx)
    }

    #[tokio::test]
    async fn publishes_exactly_one_command_and_returns_the_result() {
        let (engine, pending, mut published_rx) = engine_parts(Duration::from_secs(5));
        let intake = ResultIntake::new(pending.clone());
        let definition = hello_definition();

        let invocation = tokio::spawn({
            let definition = definition.clone();
            async move { engine.invoke(&definition, &Map::new()).await }
        });

        // Act as the provider.
        let command = published_rx.recv().await.unwrap();
        assert_eq!(command.topic, "mcp/commands/hello");
        let envelope: CommandEnvelope = serde_json::from_slice(&command.payload).unwrap();
        assert_eq!(envelope.params["name"], json!("World"));

        let reply = ResultEnvelope {
            correlation_id: envelope.correlation_id,
            result: json!("Hello World at 10:00:00"),
        };
        intake.handle("mcp/results/hello", &reply.to_bytes());

        let result = invocation.await.unwrap().unwrap();
        assert_eq!(result, json!("Hello World at 10:00:00"));
        assert!(pending.is_empty());
        assert!(published_rx.try_recv().is_err(), "exactly one command published");
    }

    #[tokio::test]
    async fn concurrent_invocations_get_distinct_ids_and_resolve_out_of_order() {
        let (engine, pending, mut published_rx) = engine_parts(Duration::from_secs(5));
        let engine = Arc::new(engine);
        let intake = ResultIntake::new(pending.clone());
        let definition = hello_definition();

        let mut args_a = Map::new();
        args_a.insert("name".to_string(), json!("A"));
        let mut args_b = Map::new();
        args_b.insert("name".to_string(), json!("B"));

        let call_a = tokio::spawn({
            let engine = engine.clone();
            let definition = definition.clone();
            async move { engine.invoke(&definition, &args_a).await }
        });
        let call_b = tokio::spawn({
            let engine = engine.clone();
            let definition = definition.clone();
            async move { engine.invoke(&definition, &args_b).await }
        });

        let first: CommandEnvelope =
            serde_json::from_slice(&published_rx.recv().await.unwrap().payload).unwrap();
        let second: CommandEnvelope =
            serde_json::from_slice(&published_rx.recv().await.unwrap().payload).unwrap();
        assert_ne!(first.correlation_id, second.correlation_id);

        // Answer in reverse arrival order.
        for envelope in [&second, &first] {
            let reply = ResultEnvelope {
                correlation_id: envelope.correlation_id.clone(),
                result: json!(format!("for {}", envelope.params["name"])),
            };
            intake.handle("mcp/results/hello", &reply.to_bytes());
        }

        let result_a = call_a.await.unwrap().unwrap();
        let result_b = call_b.await.unwrap().unwrap();
        assert_eq!(result_a, json!("for \"A\""));
        assert_eq!(result_b, json!("for \"B\""));
        assert!(pending.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_returns_error_and_clears_the_entry() {
        let (engine, pending, mut published_rx) = engine_parts(Duration::from_secs(10));
        let definition = hello_definition();

        let err = engine.invoke(&definition, &Map::new()).await.unwrap_err();
        match err {
            InvokeError::Timeout { tool, timeout_secs } => {
                assert_eq!(tool, "hello");
                assert_eq!(timeout_secs, 10);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(pending.is_empty());

        // A late result now matches nothing.
        let command: CommandEnvelope =
            serde_json::from_slice(&published_rx.recv().await.unwrap().payload).unwrap();
        let intake = ResultIntake::new(pending.clone());
        let late = ResultEnvelope {
            correlation_id: command.correlation_id,
            result: json!("too late"),
        };
        intake.handle("mcp/results/hello", &late.to_bytes());
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn missing_parameter_publishes_nothing() {
        let (engine, pending, mut published_rx) = engine_parts(Duration::from_secs(5));
        let ann = Announcement::from_bytes(
            br#"{"name": "add_task", "parameters": [{"name": "content", "required": true}]}"#,
        )
        .unwrap();
        let definition = ToolDefinition::from_announcement(ann, "mcp/commands");

        let err = engine.invoke(&definition, &Map::new()).await.unwrap_err();
        assert!(matches!(err, InvokeError::MissingParameter { .. }));
        assert!(pending.is_empty());
        assert!(published_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_failure_cleans_up_the_entry() {
        let (transport, _inbound_rx, published_rx) = InMemoryTransport::new();
        // Dropping the publish receiver makes every publish fail.
        drop(published_rx);
        let pending = Arc::new(PendingCalls::new());
        let engine = CorrelationEngine::new(transport, pending.clone(), Duration::from_secs(5));

        let err = engine
            .invoke(&hello_definition(), &Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, InvokeError::Transport(_)));
        assert!(pending.is_empty());
    }
}
