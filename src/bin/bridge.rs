//! Bridge daemon binary.
//!
//! Connects to the MQTT broker, starts the bridge, and serves the HTTP
//! front-end until Ctrl-C.
//!
//! # Environment Variables
//!
//! - `MQTT_BROKER` / `MQTT_PORT` — broker address (default: localhost:1883)
//! - `BRIDGE_ANNOUNCE_TOPIC` — announcement topic (default: mcp/register)
//! - `BRIDGE_COMMAND_PREFIX` — command topic prefix (default: mcp/commands)
//! - `BRIDGE_RESULT_FILTER` — result wildcard filter (default: mcp/results/#)
//! - `BRIDGE_INVOKE_TIMEOUT_SECS` — invocation timeout (default: 10)
//! - `PORT` — HTTP port (default: 8000)
//! - `RUST_LOG` — tracing filter (default: "info")

use anyhow::Context;
use mqtt_mcp_bridge::server::{app_router, AppState};
use mqtt_mcp_bridge::transport::mqtt::MqttTransport;
use mqtt_mcp_bridge::{Bridge, BridgeConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,mqtt_mcp_bridge=debug".into()),
        )
        .init();

    let config = BridgeConfig::from_env().context("invalid configuration")?;

    // Broker connect failure is fatal at startup; once running, rumqttc
    // handles reconnection underneath.
    let (transport, inbound_rx, network_task) = MqttTransport::connect(&config)
        .await
        .context("failed to connect to MQTT broker")?;

    let http_port = config.http_port;
    let bridge = Bridge::start(config, transport, inbound_rx)
        .await
        .context("failed to start bridge")?;

    let app = app_router(AppState::new(bridge.clone()));
    let bind_addr = format!("0.0.0.0:{http_port}");
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!("HTTP front-end listening on {bind_addr}");
    tracing::info!("  GET  /health        — liveness probe");
    tracing::info!("  GET  /tools         — discovery listing");
    tracing::info!("  POST /tools/{{name}}  — invoke a tool");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await
        .context("HTTP server failed")?;

    bridge.shutdown().await;
    network_task.abort();
    Ok(())
}
