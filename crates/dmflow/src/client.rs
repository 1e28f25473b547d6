// SPDX-FileCopyrightText: 2026 Dmflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway client used by the CLI subcommands that talk to a running engine.

use std::time::Duration;

use serde::Deserialize;

use dmflow_config::model::DmflowConfig;
use dmflow_core::DmflowError;
use dmflow_engine::{Command, CommandResponse};

/// Health endpoint response from the gateway.
#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
}

/// Thin HTTP client for the local gateway.
pub struct GatewayClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl GatewayClient {
    pub fn from_config(config: &DmflowConfig, timeout: Duration) -> Result<Self, DmflowError> {
        let host = &config.gateway.host;
        let port = config.gateway.port;
        Self::new(
            &format!("http://{host}:{port}"),
            config.gateway.bearer_token.clone(),
            timeout,
        )
    }

    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self, DmflowError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DmflowError::Internal(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /health`. `None` when nothing answers.
    pub async fn health(&self) -> Option<HealthResponse> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            return None;
        }
        response.json().await.ok()
    }

    /// `POST /v1/commands`
    pub async fn command(&self, command: &Command) -> Result<CommandResponse, DmflowError> {
        let mut request = self
            .client
            .post(format!("{}/v1/commands", self.base_url))
            .json(command);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            DmflowError::Internal(format!(
                "could not reach dmflow at {}: {e} (is `dmflow serve` running?)",
                self.base_url
            ))
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(DmflowError::Config(
                "gateway rejected the bearer token; check gateway.bearer_token".to_string(),
            ));
        }
        // Transport failures (503, 504) still carry a CommandResponse body.
        response
            .json::<CommandResponse>()
            .await
            .map_err(|e| DmflowError::Internal(format!("unexpected gateway reply ({status}): {e}")))
    }
}
