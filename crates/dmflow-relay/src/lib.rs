// SPDX-FileCopyrightText: 2026 Dmflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relay executor for the dmflow engine.
//!
//! This crate implements [`MessageExecutor`] by forwarding surface and send
//! operations over HTTP to a surface agent that drives the actual browser
//! tabs. The engine never sees the page; it only sees surface ids and
//! success or an error message.

pub mod client;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use dmflow_config::model::RelayConfig;
use dmflow_core::types::{AdapterType, HealthStatus, SurfaceId};
use dmflow_core::{DmRequest, DmflowError, MessageExecutor, PluginAdapter};
use tracing::{debug, info};

use crate::client::RelayClient;
use crate::types::{SendMessageRequest, TypingDelay};

/// [`MessageExecutor`] backed by a remote surface agent.
pub struct RelayExecutor {
    client: RelayClient,
}

impl RelayExecutor {
    pub fn new(config: &RelayConfig) -> Result<Self, DmflowError> {
        let client = RelayClient::new(
            &config.base_url,
            config.token.as_deref(),
            Duration::from_secs(config.request_timeout_secs),
        )?;
        info!(base_url = client.base_url(), "relay executor initialized");
        Ok(Self { client })
    }

    pub fn from_client(client: RelayClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PluginAdapter for RelayExecutor {
    fn name(&self) -> &str {
        "relay"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Executor
    }

    async fn health_check(&self) -> Result<HealthStatus, DmflowError> {
        match self.client.health().await {
            Ok(()) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), DmflowError> {
        Ok(())
    }
}

#[async_trait]
impl MessageExecutor for RelayExecutor {
    async fn open_surface(&self) -> Result<SurfaceId, DmflowError> {
        self.client.open_surface().await.map(SurfaceId)
    }

    async fn send_dm(&self, surface: &SurfaceId, request: &DmRequest) -> Result<(), DmflowError> {
        let (min_ms, max_ms) = request.typing_delay_ms;
        let body = SendMessageRequest {
            username: request.username.clone(),
            message: request.message.clone(),
            typing_delay: TypingDelay { min_ms, max_ms },
        };
        debug!(surface = %surface, username = %request.username, "relaying send");
        self.client.send_message(&surface.0, &body).await
    }

    async fn close_surface(&self, surface: &SurfaceId) -> Result<(), DmflowError> {
        self.client.close_surface(&surface.0).await
    }
}
