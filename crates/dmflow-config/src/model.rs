// SPDX-FileCopyrightText: 2026 Dmflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.
//!
//! Runtime policy (daily limit, delays, retries) is not configured here: it
//! lives in the persisted `Settings` record so it can change mid-run.

use serde::{Deserialize, Serialize};

/// Top-level dmflow configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DmflowConfig {
    /// Orchestrator tuning.
    #[serde(default)]
    pub engine: EngineConfig,

    /// State store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Remote surface agent the relay executor talks to.
    #[serde(default)]
    pub relay: RelayConfig,

    /// HTTP command interface.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Scheduled triggers.
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

impl DmflowConfig {
    /// Longest a command can legitimately take to answer, in seconds.
    ///
    /// A single DM may wait out an in-flight queue send, then opens a
    /// surface, settles, sends and closes the surface. Opening and closing
    /// are relay round-trips bounded by the relay request timeout.
    pub fn longest_command_secs(&self) -> u64 {
        let settle_secs = self.engine.surface_settle_ms.div_ceil(1000);
        self.engine
            .send_timeout_secs
            .saturating_mul(2)
            .saturating_add(settle_secs)
            .saturating_add(self.relay.request_timeout_secs.saturating_mul(2))
    }
}

/// Orchestrator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Upper bound on a single executor send before it counts as a failure.
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,

    /// Grace period after opening a surface before the first task runs.
    #[serde(default = "default_surface_settle_ms")]
    pub surface_settle_ms: u64,

    /// Capacity of the engine command mailbox.
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,

    /// Upper bound a caller waits for a command reply.
    ///
    /// Must exceed [`DmflowConfig::longest_command_secs`]: a stop or a single
    /// DM issued during an in-flight send is answered only after it finishes.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            send_timeout_secs: default_send_timeout_secs(),
            surface_settle_ms: default_surface_settle_ms(),
            mailbox_capacity: default_mailbox_capacity(),
            command_timeout_secs: default_command_timeout_secs(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_send_timeout_secs() -> u64 {
    120
}

fn default_surface_settle_ms() -> u64 {
    3000
}

fn default_mailbox_capacity() -> usize {
    64
}

fn default_command_timeout_secs() -> u64 {
    480
}

/// State store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("dmflow").join("dmflow.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("dmflow.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Relay executor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Base URL of the surface agent (e.g. a browser-side companion).
    #[serde(default = "default_relay_base_url")]
    pub base_url: String,

    /// Bearer token presented to the surface agent. `None` sends no auth header.
    #[serde(default)]
    pub token: Option<String>,

    /// Per-request HTTP timeout.
    #[serde(default = "default_relay_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            base_url: default_relay_base_url(),
            token: None,
            request_timeout_secs: default_relay_timeout_secs(),
        }
    }
}

fn default_relay_base_url() -> String {
    "http://127.0.0.1:4317".to_string()
}

fn default_relay_timeout_secs() -> u64 {
    90
}

/// HTTP command interface configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Serve the command interface over HTTP.
    #[serde(default = "default_gateway_enabled")]
    pub enabled: bool,

    /// Address to bind.
    #[serde(default = "default_gateway_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bearer token required on `/v1/*`. `None` leaves the API open.
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: default_gateway_enabled(),
            host: default_gateway_host(),
            port: default_gateway_port(),
            bearer_token: None,
        }
    }
}

fn default_gateway_enabled() -> bool {
    true
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    3310
}

/// Scheduled trigger configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleConfig {
    /// Reset the daily send counter at every UTC midnight.
    #[serde(default = "default_daily_reset")]
    pub daily_reset: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            daily_reset: default_daily_reset(),
        }
    }
}

fn default_daily_reset() -> bool {
    true
}
