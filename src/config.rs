//! Bridge configuration.
//!
//! All settings are read once at startup from the environment; nothing is
//! re-read at runtime. Topic names follow the original deployment layout:
//! providers announce on `mcp/register`, commands go out under
//! `mcp/commands/<tool>`, and results come back anywhere under
//! `mcp/results/`.

use std::env;
use std::time::Duration;

use crate::error::ConfigError;

/// Runtime configuration for the bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// MQTT broker hostname.
    pub broker_host: String,
    /// MQTT broker port.
    pub broker_port: u16,
    /// Topic providers publish capability announcements to.
    pub announce_topic: String,
    /// Prefix for per-tool command topics (`<prefix>/<tool>`).
    pub command_prefix: String,
    /// Wildcard filter covering every tool's result topic.
    pub result_filter: String,
    /// How long an invocation waits for its result. Per-deployment,
    /// not per-call.
    pub invoke_timeout: Duration,
    /// Capacity of the announcement hand-off queue (drop-oldest on
    /// overflow).
    pub handoff_capacity: usize,
    /// Poll interval of the registration processor loop; also bounds how
    /// long shutdown waits for it.
    pub poll_interval: Duration,
    /// Port for the HTTP front-end.
    pub http_port: u16,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            announce_topic: "mcp/register".to_string(),
            command_prefix: "mcp/commands".to_string(),
            result_filter: "mcp/results/#".to_string(),
            invoke_timeout: Duration::from_secs(10),
            handoff_capacity: 64,
            poll_interval: Duration::from_millis(100),
            http_port: 8000,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from the environment, falling back to defaults
    /// for unset variables. A set-but-unparsable numeric variable is an
    /// error rather than a silent default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            broker_host: env::var("MQTT_BROKER").unwrap_or(defaults.broker_host),
            broker_port: parse_var("MQTT_PORT", defaults.broker_port)?,
            announce_topic: env::var("BRIDGE_ANNOUNCE_TOPIC").unwrap_or(defaults.announce_topic),
            command_prefix: env::var("BRIDGE_COMMAND_PREFIX").unwrap_or(defaults.command_prefix),
            result_filter: env::var("BRIDGE_RESULT_FILTER").unwrap_or(defaults.result_filter),
            invoke_timeout: Duration::from_secs(parse_var(
                "BRIDGE_INVOKE_TIMEOUT_SECS",
                defaults.invoke_timeout.as_secs(),
            )?),
            handoff_capacity: parse_var("BRIDGE_HANDOFF_CAPACITY", defaults.handoff_capacity)?,
            poll_interval: Duration::from_millis(parse_var(
                "BRIDGE_POLL_INTERVAL_MS",
                defaults.poll_interval.as_millis() as u64,
            )?),
            http_port: parse_var("PORT", defaults.http_port)?,
        })
    }

    /// Command topic for a tool name (`<prefix>/<name>`).
    pub fn command_topic(&self, tool_name: &str) -> String {
        format!("{}/{}", self.command_prefix, tool_name)
    }
}

fn parse_var<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            var,
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}
