//! Demo capability provider: the `hello` tool.
//!
//! Announces a single tool with one defaulted parameter, then answers
//! every command on its topic with a greeting and the current time. Runs
//! as an independent process; the bridge learns about it purely from the
//! retained announcement.
//!
//! # Environment Variables
//!
//! - `MQTT_BROKER` / `MQTT_PORT` — broker address (default: localhost:1883)

use std::time::Duration;

use anyhow::Context;
use chrono::Local;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde_json::json;

const REGISTRATION_TOPIC: &str = "mcp/register";
const COMMAND_TOPIC: &str = "mcp/commands/hello";
const RESULT_TOPIC: &str = "mcp/results/hello";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let host = std::env::var("MQTT_BROKER").unwrap_or_else(|_| "localhost".to_string());
    let port: u16 = std::env::var("MQTT_PORT")
        .unwrap_or_else(|_| "1883".to_string())
        .parse()
        .context("invalid MQTT_PORT")?;

    let mut options = MqttOptions::new("hello-provider", &host, port);
    options.set_keep_alive(Duration::from_secs(30));
    let (client, mut event_loop) = AsyncClient::new(options, 16);

    client.subscribe(COMMAND_TOPIC, QoS::AtLeastOnce).await?;

    // Retained, so a bridge that starts later still sees the tool.
    let announcement = json!({
        "name": "hello",
        "description": "Responds with a 'Hello World' message and the current time.",
        "parameters": [
            {"name": "name", "type": "str", "default": "World"}
        ]
    });
    client
        .publish(
            REGISTRATION_TOPIC,
            QoS::AtLeastOnce,
            true,
            serde_json::to_vec(&announcement)?,
        )
        .await?;
    tracing::info!("announced tool 'hello' on {REGISTRATION_TOPIC}");

    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                handle_command(&client, &publish.payload).await;
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(error = %err, "MQTT error; retrying");
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    }
}

async fn handle_command(client: &AsyncClient, payload: &[u8]) {
    let command: serde_json::Value = match serde_json::from_slice(payload) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(error = %err, "ignoring malformed command");
            return;
        }
    };
    let Some(correlation_id) = command["correlation_id"].as_str() else {
        tracing::warn!("ignoring command without a correlation_id");
        return;
    };

    let name = command["params"]["name"].as_str().unwrap_or("World");
    let now = Local::now().format("%H:%M:%S");
    let response = json!({
        "correlation_id": correlation_id,
        "result": format!("Hello {name} at {now}"),
    });

    match serde_json::to_vec(&response) {
        Ok(bytes) => {
            if let Err(err) = client
                .publish(RESULT_TOPIC, QoS::AtLeastOnce, false, bytes)
                .await
            {
                tracing::error!(error = %err, "failed to publish result");
            } else {
                tracing::info!(correlation_id, "answered hello command");
            }
        }
        Err(err) => tracing::error!(error = %err, "failed to encode result"),
    }
}
