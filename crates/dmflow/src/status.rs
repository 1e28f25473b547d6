// SPDX-FileCopyrightText: 2026 Dmflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `dmflow status` command implementation.
//!
//! Asks the gateway for its health and the active queue, then prints run
//! progress. Falls back gracefully when the engine is not running.

use std::io::IsTerminal;
use std::time::Duration;

use dmflow_config::model::DmflowConfig;
use dmflow_core::DmflowError;
use dmflow_core::types::TaskQueue;
use dmflow_engine::Command;
use serde::Serialize;

use crate::client::GatewayClient;

/// Progress of the active queue for `--json` mode.
#[derive(Debug, Serialize)]
pub struct QueueSummary {
    pub id: String,
    pub name: String,
    pub status: String,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub remaining: usize,
}

impl From<&TaskQueue> for QueueSummary {
    fn from(queue: &TaskQueue) -> Self {
        let done = queue.completed_tasks + queue.failed_tasks + queue.skipped_tasks;
        Self {
            id: queue.id.clone(),
            name: queue.name.clone(),
            status: queue.status.to_string(),
            total: queue.total_tasks,
            completed: queue.completed_tasks,
            failed: queue.failed_tasks,
            skipped: queue.skipped_tasks,
            remaining: queue.total_tasks.saturating_sub(done),
        }
    }
}

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub running: bool,
    pub status: String,
    pub uptime_secs: Option<u64>,
    pub uptime_human: Option<String>,
    pub gateway_url: String,
    pub queue: Option<QueueSummary>,
}

/// Format seconds into a human-readable duration string.
fn format_uptime(secs: u64) -> String {
    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    let minutes = (secs % 3600) / 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Run the `dmflow status` command.
///
/// If `--json` is passed, outputs structured JSON for scripting.
/// If `--plain` is passed or stdout is not a TTY, disables colors.
pub async fn run_status(config: &DmflowConfig, json: bool, plain: bool) -> Result<(), DmflowError> {
    let client = GatewayClient::from_config(config, Duration::from_secs(3))?;

    let response = match client.health().await {
        Some(health) => {
            let queue = match client.command(&Command::GetQueueStatus).await {
                Ok(reply) if reply.success => reply.queue,
                Ok(reply) => {
                    tracing::debug!(error = ?reply.error, "queue status unavailable");
                    None
                }
                Err(e) => {
                    tracing::debug!(error = %e, "queue status request failed");
                    None
                }
            };
            StatusResponse {
                running: true,
                status: health.status,
                uptime_secs: Some(health.uptime_secs),
                uptime_human: Some(format_uptime(health.uptime_secs)),
                gateway_url: client.base_url().to_string(),
                queue: queue.as_ref().map(QueueSummary::from),
            }
        }
        None => StatusResponse {
            running: false,
            status: "not running".to_string(),
            uptime_secs: None,
            uptime_human: None,
            gateway_url: client.base_url().to_string(),
            queue: None,
        },
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&response).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        if response.running {
            print_status_running(&response, use_color);
        } else {
            print_status_offline(&response.gateway_url, use_color);
        }
    }

    Ok(())
}

/// Print running status with optional colors.
fn print_status_running(response: &StatusResponse, use_color: bool) {
    let uptime = response.uptime_human.as_deref().unwrap_or("-");

    println!();
    println!("  dmflow status");
    println!("  {}", "-".repeat(35));

    if use_color {
        use colored::Colorize;
        println!(
            "    Engine:   {} {} (uptime: {})",
            "✓".green(),
            response.status.green(),
            uptime
        );
    } else {
        println!("    Engine:   [OK] {} (uptime: {uptime})", response.status);
    }

    match &response.queue {
        Some(queue) => {
            let state = if use_color {
                use colored::Colorize;
                match queue.status.as_str() {
                    "running" => queue.status.green().to_string(),
                    "paused" => queue.status.yellow().to_string(),
                    _ => queue.status.clone(),
                }
            } else {
                queue.status.clone()
            };
            println!("    Queue:    {} ({state})", queue.name);
            println!(
                "    Progress: {}/{} sent, {} failed, {} skipped, {} remaining",
                queue.completed, queue.total, queue.failed, queue.skipped, queue.remaining
            );
        }
        None => println!("    Queue:    none"),
    }
    println!();
}

/// Print offline status with optional colors.
fn print_status_offline(gateway_url: &str, use_color: bool) {
    println!();
    println!("  dmflow status");
    println!("  {}", "-".repeat(35));

    if use_color {
        use colored::Colorize;
        println!("    Engine:   {} {}", "✗".red(), "not running".red());
    } else {
        println!("    Engine:   [FAIL] not running");
    }

    println!("    Endpoint: {gateway_url}/health");
    println!();
    println!("  Start with: dmflow serve");
    println!();
}
