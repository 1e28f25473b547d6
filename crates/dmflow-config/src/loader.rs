// SPDX-FileCopyrightText: 2026 Dmflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./dmflow.toml` > `~/.config/dmflow/dmflow.toml` > `/etc/dmflow/dmflow.toml`
//! with environment variable overrides via `DMFLOW_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::DmflowConfig;

pub(crate) const LOCAL_CONFIG: &str = "dmflow.toml";
pub(crate) const SYSTEM_CONFIG: &str = "/etc/dmflow/dmflow.toml";

/// Path of the per-user config file, if a config directory is known.
pub(crate) fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("dmflow").join(LOCAL_CONFIG))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/dmflow/dmflow.toml` (system-wide)
/// 3. `~/.config/dmflow/dmflow.toml` (user XDG config)
/// 4. `./dmflow.toml` (local directory)
/// 5. `DMFLOW_*` environment variables
pub fn load_config() -> Result<DmflowConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<DmflowConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(DmflowConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<DmflowConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(DmflowConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(DmflowConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG))
        .merge(env_provider())
}

/// Environment provider mapping `DMFLOW_SECTION_KEY` to `section.key`.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `DMFLOW_ENGINE_SEND_TIMEOUT_SECS` must map to
/// `engine.send_timeout_secs`.
fn env_provider() -> Env {
    Env::prefixed("DMFLOW_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("engine_", "engine.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("relay_", "relay.", 1)
            .replacen("gateway_", "gateway.", 1)
            .replacen("schedule_", "schedule.", 1);
        mapped.into()
    })
}
