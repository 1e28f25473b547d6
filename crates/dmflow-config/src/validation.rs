// SPDX-FileCopyrightText: 2026 Dmflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as non-zero timeouts, URL schemes and bind addresses.

use crate::diagnostic::ConfigError;
use crate::model::DmflowConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &DmflowConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !matches!(
        config.engine.log_level.as_str(),
        "trace" | "debug" | "info" | "warn" | "error"
    ) {
        errors.push(ConfigError::Validation {
            message: format!(
                "engine.log_level `{}` must be one of trace, debug, info, warn, error",
                config.engine.log_level
            ),
        });
    }

    if config.engine.send_timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "engine.send_timeout_secs must be greater than zero".to_string(),
        });
    }

    if config.engine.mailbox_capacity == 0 {
        errors.push(ConfigError::Validation {
            message: "engine.mailbox_capacity must be greater than zero".to_string(),
        });
    }

    let longest = config.longest_command_secs();
    if config.engine.command_timeout_secs <= longest {
        errors.push(ConfigError::Validation {
            message: format!(
                "engine.command_timeout_secs ({}) must exceed {longest}s: twice \
                 engine.send_timeout_secs ({}) plus engine.surface_settle_ms ({}) \
                 plus twice relay.request_timeout_secs ({})",
                config.engine.command_timeout_secs,
                config.engine.send_timeout_secs,
                config.engine.surface_settle_ms,
                config.relay.request_timeout_secs
            ),
        });
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    let base_url = config.relay.base_url.trim();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        errors.push(ConfigError::Validation {
            message: format!("relay.base_url `{base_url}` must start with http:// or https://"),
        });
    }

    if config.relay.request_timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "relay.request_timeout_secs must be greater than zero".to_string(),
        });
    }

    if config.gateway.enabled {
        let host = config.gateway.host.trim();
        if host.is_empty() {
            errors.push(ConfigError::Validation {
                message: "gateway.host must not be empty".to_string(),
            });
        } else {
            let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
            let is_valid_hostname = host
                .chars()
                .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
            if !is_valid_ip && !is_valid_hostname {
                errors.push(ConfigError::Validation {
                    message: format!("gateway.host `{host}` is not a valid IP address or hostname"),
                });
            }
        }

        if config.gateway.port == 0 {
            errors.push(ConfigError::Validation {
                message: "gateway.port must not be 0".to_string(),
            });
        }
    }

    if let Some(token) = &config.gateway.bearer_token {
        if token.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: "gateway.bearer_token must not be blank when set".to_string(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&DmflowConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = DmflowConfig::default();
        config.engine.send_timeout_secs = 0;
        config.storage.database_path = "  ".to_string();
        config.relay.base_url = "ftp://nope".to_string();
        let errors = validate_config(&config).unwrap_err();
        // send timeout, database path, base url
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn command_timeout_covers_a_single_dm_behind_a_queue_send() {
        let mut config = DmflowConfig::default();
        config.engine.send_timeout_secs = 60;
        config.engine.surface_settle_ms = 2500;
        config.relay.request_timeout_secs = 30;
        // 2 * 60 + 3 + 2 * 30
        assert_eq!(config.longest_command_secs(), 183);

        config.engine.command_timeout_secs = 183;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("relay.request_timeout_secs"));

        config.engine.command_timeout_secs = 184;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn command_timeout_must_exceed_send_timeout() {
        let mut config = DmflowConfig::default();
        config.engine.send_timeout_secs = 30;
        config.engine.command_timeout_secs = 30;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].to_string().contains("command_timeout_secs"));
    }

    #[test]
    fn disabled_gateway_skips_address_checks() {
        let mut config = DmflowConfig::default();
        config.gateway.enabled = false;
        config.gateway.port = 0;
        config.gateway.host = String::new();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn rejects_unknown_log_level() {
        let mut config = DmflowConfig::default();
        config.engine.log_level = "loud".to_string();
        assert!(validate_config(&config).is_err());
    }
}
