// SPDX-FileCopyrightText: 2026 Dmflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types for the surface-agent relay protocol.

use serde::{Deserialize, Serialize};

/// Response to `POST /v1/surfaces`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpenSurfaceResponse {
    pub surface_id: String,
}

/// Typing-speed window forwarded to the surface agent, ms per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct TypingDelay {
    pub min_ms: u32,
    pub max_ms: u32,
}

/// Body of `POST /v1/surfaces/{id}/messages`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SendMessageRequest {
    pub username: String,
    pub message: String,
    pub typing_delay: TypingDelay,
}

/// Error body returned by the surface agent on any non-2xx status.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayErrorBody {
    pub error: String,
}
