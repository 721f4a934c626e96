//! Demo capability provider: a small in-memory task list.
//!
//! Announces two tools — `add_task`, whose `content` parameter is
//! required and has no default, and `list_tasks`, which takes nothing —
//! and serves both from one command loop. Parameter validation for
//! `add_task` happens on the bridge side; a command that still arrives
//! without content gets an error result rather than silence.
//!
//! # Environment Variables
//!
//! - `MQTT_BROKER` / `MQTT_PORT` — broker address (default: localhost:1883)

use std::time::Duration;

use anyhow::Context;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde_json::{json, Value};

const REGISTRATION_TOPIC: &str = "mcp/register";
const ADD_TASK_COMMAND_TOPIC: &str = "mcp/commands/add_task";
const ADD_TASK_RESULT_TOPIC: &str = "mcp/results/add_task";
const LIST_TASKS_COMMAND_TOPIC: &str = "mcp/commands/list_tasks";
const LIST_TASKS_RESULT_TOPIC: &str = "mcp/results/list_tasks";

struct TaskStore {
    next_id: u64,
    tasks: Vec<(u64, String)>,
}

impl TaskStore {
    fn add(&mut self, content: &str) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.tasks.push((id, content.to_string()));
        id
    }

    fn list(&self) -> Value {
        Value::Array(
            self.tasks
                .iter()
                .map(|(id, content)| json!({"id": id, "content": content}))
                .collect(),
        )
    }
}

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

    let mut options = MqttOptions::new("task-provider", &host, port);
    options.set_keep_alive(Duration::from_secs(30));
    let (client, mut event_loop) = AsyncClient::new(options, 16);

    client
        .subscribe(ADD_TASK_COMMAND_TOPIC, QoS::AtLeastOnce)
        .await?;
    client
        .subscribe(LIST_TASKS_COMMAND_TOPIC, QoS::AtLeastOnce)
        .await?;

    for announcement in [
        json!({
            "name": "add_task",
            "description": "Adds a new task to the task list.",
            "parameters": [
                {"name": "content", "type": "str",
                 "description": "The content of the task.", "required": true}
            ]
        }),
        json!({
            "name": "list_tasks",
            "description": "Lists all tasks.",
            "parameters": []
        }),
    ] {
        client
            .publish(
                REGISTRATION_TOPIC,
                QoS::AtLeastOnce,
                true,
                serde_json::to_vec(&announcement)?,
            )
            .await?;
        tracing::info!(tool = %announcement["name"], "announced tool");
    }

    let mut store = TaskStore {
        next_id: 1,
        tasks: Vec::new(),
    };

    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                handle_command(&client, &mut store, &publish.topic, &publish.payload).await;
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(error = %err, "MQTT error; retrying");
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    }
}

async fn handle_command(client: &AsyncClient, store: &mut TaskStore, topic: &str, payload: &[u8]) {
    let command: Value = match serde_json::from_slice(payload) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(topic, error = %err, "ignoring malformed command");
            return;
        }
    };
    let Some(correlation_id) = command["correlation_id"].as_str() else {
        tracing::warn!(topic, "ignoring command without a correlation_id");
        return;
    };

    let (result_topic, result) = match topic {
        ADD_TASK_COMMAND_TOPIC => {
            let result = match command["params"]["content"].as_str() {
                Some(content) if !content.is_empty() => {
                    let task_id = store.add(content);
                    json!({"status": "success", "task_id": task_id, "content": content})
                }
                _ => json!({"error": "content parameter is required"}),
            };
            (ADD_TASK_RESULT_TOPIC, result)
        }
        LIST_TASKS_COMMAND_TOPIC => (LIST_TASKS_RESULT_TOPIC, store.list()),
        other => {
            tracing::warn!(topic = other, "command on unexpected topic");
            return;
        }
    };

    let response = json!({
        "correlation_id": correlation_id,
        "result": result,
    });
    match serde_json::to_vec(&response) {
        Ok(bytes) => {
            if let Err(err) = client
                .publish(result_topic, QoS::AtLeastOnce, false, bytes)
                .await
            {
                tracing::error!(error = %err, "failed to publish result");
            } else {
                tracing::info!(correlation_id, topic = result_topic, "answered command");
            }
        }
        Err(err) => tracing::error!(error = %err, "failed to encode result"),
    }
}
