//! MQTT transport backed by `rumqttc`.
//!
//! `connect` blocks until the broker acknowledges the session, so a
//! broker that is down or refusing connections surfaces as a startup
//! error instead of an endless silent retry. After the handshake the
//! event loop moves to a background task that forwards every inbound
//! publish to the bridge's dispatch channel; `rumqttc` handles
//! reconnection on subsequent poll errors by itself.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::{InboundMessage, PubSubTransport};
use crate::config::BridgeConfig;
use crate::error::TransportError;

const CHANNEL_CAPACITY: usize = 64;
const RECONNECT_PAUSE: Duration = Duration::from_secs(1);

/// MQTT-backed [`PubSubTransport`].
pub struct MqttTransport {
    client: AsyncClient,
}

impl MqttTransport {
    /// Connect to the broker named in `config`.
    ///
    /// Returns the transport, the inbound message channel, and the handle
    /// of the background network task. The task runs until the inbound
    /// receiver is dropped or the client disconnects.
    pub async fn connect(
        config: &BridgeConfig,
    ) -> Result<
        (
            Arc<Self>,
            mpsc::UnboundedReceiver<InboundMessage>,
            JoinHandle<()>,
        ),
        TransportError,
    > {
        let client_id = format!("mqtt-mcp-bridge-{}", Uuid::new_v4().simple());
        let mut options = MqttOptions::new(client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(Duration::from_secs(30));

        let (client, mut event_loop) = AsyncClient::new(options, CHANNEL_CAPACITY);

        // Drive the event loop until the broker acknowledges the session.
        loop {
            match event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code == ConnectReturnCode::Success {
                        break;
                    }
                    return Err(TransportError::ConnectionFailed(format!(
                        "broker refused connection: {:?}",
                        ack.code
                    )));
                }
                Ok(_) => {}
                Err(err) => {
                    return Err(TransportError::ConnectionFailed(err.to_string()));
                }
            }
        }
        tracing::info!(
            host = %config.broker_host,
            port = config.broker_port,
            "connected to MQTT broker"
        );

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let network_task = tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let delivered = inbound_tx.send(InboundMessage {
                            topic: publish.topic.clone(),
                            payload: publish.payload.clone(),
                        });
                        if delivered.is_err() {
                            // Bridge side went away; stop the loop.
                            break;
                        }
                    }
                    Ok(Event::Incoming(Packet::Disconnect)) => {
                        tracing::info!("broker closed the connection");
                        break;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        if inbound_tx.is_closed() {
                            break;
                        }
                        tracing::warn!(error = %err, "MQTT event loop error; reconnecting");
                        tokio::time::sleep(RECONNECT_PAUSE).await;
                    }
                }
            }
            tracing::debug!("MQTT network task exited");
        });

        Ok((Arc::new(Self { client }), inbound_rx, network_task))
    }
}

#[async_trait]
impl PubSubTransport for MqttTransport {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), TransportError> {
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|err| TransportError::PublishFailed {
                topic: topic.to_string(),
                reason: err.to_string(),
            })
    }

    async fn subscribe(&self, filter: &str) -> Result<(), TransportError> {
        self.client
            .subscribe(filter, QoS::AtLeastOnce)
            .await
            .map_err(|err| TransportError::SubscribeFailed {
                filter: filter.to_string(),
                reason: err.to_string(),
            })
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        // An already-closed client is fine; shutdown is best-effort.
        if let Err(err) = self.client.disconnect().await {
            tracing::debug!(error = %err, "disconnect after client already stopped");
        }
        Ok(())
    }
}
