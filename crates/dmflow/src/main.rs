// SPDX-FileCopyrightText: 2026 Dmflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dmflow - a rate-limited direct-message outreach engine.
//!
//! This is the binary entry point: `serve` runs the engine, the other
//! subcommands either talk to a running engine through its gateway or read
//! the state database directly.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod client;
mod logs;
mod serve;
mod shutdown;
mod status;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use dmflow_config::model::DmflowConfig;
use dmflow_core::DmflowError;
use dmflow_engine::{Command, CommandResponse};

use crate::client::GatewayClient;

/// Dmflow - a rate-limited direct-message outreach engine.
#[derive(Parser, Debug)]
#[command(name = "dmflow", version, about, long_about = None)]
struct Cli {
    /// Load configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the engine, the gateway and the daily reset trigger.
    Serve,
    /// Show engine health and queue progress.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
    /// Control the outreach queue of a running engine.
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },
    /// Send a single DM outside the queue.
    Send {
        /// Recipient handle, without `@`.
        username: String,
        /// Message text, sent as-is.
        message: String,
    },
    /// Print the activity log.
    Logs {
        /// Number of most recent entries to show.
        #[arg(long, short = 'n', default_value_t = 50)]
        limit: usize,
        /// Clear the activity log instead of printing it.
        #[arg(long)]
        clear: bool,
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
    /// Reset today's sent-message counter.
    ResetDaily,
    /// Render a template against sample contact values.
    Preview {
        /// Template text, e.g. `{Hi|Hey} {Name}!`.
        template: String,
        /// Override a variable, `KEY=VALUE`. Repeatable.
        #[arg(long = "var", value_parser = parse_var)]
        vars: Vec<(String, String)>,
        /// Number of samples to render.
        #[arg(long, default_value_t = 3)]
        samples: usize,
    },
    /// Print the effective configuration.
    Config,
}

#[derive(Subcommand, Debug)]
enum QueueAction {
    /// Build a queue from a contact list and start sending.
    Start {
        /// Contact list id.
        #[arg(long)]
        list: String,
        /// Template id.
        #[arg(long)]
        template: String,
        /// Display name for the run.
        #[arg(long, default_value = "CLI run")]
        name: String,
    },
    Pause,
    Resume,
    Stop,
}

impl From<QueueAction> for Command {
    fn from(action: QueueAction) -> Self {
        match action {
            QueueAction::Start {
                list,
                template,
                name,
            } => Command::StartQueue {
                list_id: list,
                template_id: template,
                name,
            },
            QueueAction::Pause => Command::PauseQueue,
            QueueAction::Resume => Command::ResumeQueue,
            QueueAction::Stop => Command::StopQueue,
        }
    }
}

fn parse_var(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got `{raw}`")),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => dmflow_config::load_and_validate_path(path),
        None => dmflow_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            dmflow_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Status { json, plain }) => status::run_status(&config, json, plain).await,
        Some(Commands::Queue { action }) => send_command(&config, action.into()).await,
        Some(Commands::Send { username, message }) => {
            send_command(&config, Command::SendSingleDm { username, message }).await
        }
        Some(Commands::Logs {
            limit,
            clear,
            plain,
        }) => logs::run_logs(&config, limit, clear, plain).await,
        Some(Commands::ResetDaily) => {
            send_command(&config, Command::ResetDailyCount { force: true }).await
        }
        Some(Commands::Preview {
            template,
            vars,
            samples,
        }) => run_preview(&template, vars.into_iter().collect(), samples),
        Some(Commands::Config) => print_config(&config),
        None => {
            println!("dmflow: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

/// Sends one command to the running engine and prints the outcome.
async fn send_command(config: &DmflowConfig, command: Command) -> Result<(), DmflowError> {
    // Outlive the engine's own reply timeout so its answer wins.
    let timeout = Duration::from_secs(config.engine.command_timeout_secs + 10);
    let client = GatewayClient::from_config(config, timeout)?;
    let kind = command.kind();
    let response = client.command(&command).await?;
    println!("{}", describe_response(kind, &response));
    if response.success {
        Ok(())
    } else {
        std::process::exit(2);
    }
}

fn describe_response(kind: &str, response: &CommandResponse) -> String {
    if !response.success {
        return format!(
            "{kind} failed: {}",
            response.error.as_deref().unwrap_or("unknown error")
        );
    }
    match &response.queue {
        Some(queue) => format!(
            "{kind} ok: queue {} `{}` is {} ({}/{} sent, {} failed, {} skipped)",
            queue.id,
            queue.name,
            queue.status,
            queue.completed_tasks,
            queue.total_tasks,
            queue.failed_tasks,
            queue.skipped_tasks
        ),
        None => format!("{kind} ok"),
    }
}

fn run_preview(
    template: &str,
    vars: BTreeMap<String, String>,
    samples: usize,
) -> Result<(), DmflowError> {
    dmflow_template::validate(template).map_err(|e| DmflowError::Template(e.to_string()))?;
    for _ in 0..samples.max(1) {
        println!("{}", dmflow_template::preview(template, &vars)?);
    }
    Ok(())
}

fn print_config(config: &DmflowConfig) -> Result<(), DmflowError> {
    let rendered = toml::to_string_pretty(config)
        .map_err(|e| DmflowError::Internal(format!("failed to render config: {e}")))?;
    print!("{rendered}");
    Ok(())
}
