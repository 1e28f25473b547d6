// SPDX-FileCopyrightText: 2026 Dmflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.
//!
//! Handles POST /v1/commands, GET /v1/queue and GET /health.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use dmflow_core::DmflowError;
use dmflow_engine::{Command, CommandResponse};

use crate::server::GatewayState;

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok` once the engine accepts commands, `starting` before that.
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// POST /v1/commands
///
/// Forwards the command to the engine. Command failures are a 200 with
/// `success: false`; only transport failures change the status code.
pub async fn post_commands(
    State(state): State<GatewayState>,
    Json(command): Json<Command>,
) -> Response {
    forward(&state, command).await
}

/// GET /v1/queue
///
/// Shorthand for `GET_QUEUE_STATUS`.
pub async fn get_queue(State(state): State<GatewayState>) -> Response {
    forward(&state, Command::GetQueueStatus).await
}

/// GET /health
///
/// Unauthenticated liveness probe.
pub async fn get_public_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    let status = if state.router.is_ready() {
        "ok"
    } else {
        "starting"
    };
    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
    })
}

async fn forward(state: &GatewayState, command: Command) -> Response {
    let kind = command.kind();
    match state.router.request(command).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            tracing::warn!(command = kind, error = %e, "command not delivered");
            (status_for(&e), Json(CommandResponse::failure(&e))).into_response()
        }
    }
}

fn status_for(err: &DmflowError) -> StatusCode {
    match err {
        DmflowError::NotInitialized => StatusCode::SERVICE_UNAVAILABLE,
        DmflowError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
