// SPDX-FileCopyrightText: 2026 Dmflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message-send executor trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DmflowError;
use crate::traits::adapter::PluginAdapter;
use crate::types::SurfaceId;

/// A single direct message to deliver on an open surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DmRequest {
    pub username: String,
    pub message: String,
    /// Simulated typing delay bounds, milliseconds per character.
    pub typing_delay_ms: (u32, u32),
}

/// Drives the externally controlled surface the messages are typed into.
///
/// Implementations may stall; the engine bounds every call with its own
/// timeout and converts timeouts and errors into task failures.
#[async_trait]
pub trait MessageExecutor: PluginAdapter {
    /// Opens a fresh execution surface.
    async fn open_surface(&self) -> Result<SurfaceId, DmflowError>;

    /// Attempts to deliver one message on `surface`.
    ///
    /// Delivery problems are reported as [`DmflowError::Executor`].
    async fn send_dm(&self, surface: &SurfaceId, request: &DmRequest) -> Result<(), DmflowError>;

    /// Closes a surface previously returned by [`open_surface`](Self::open_surface).
    async fn close_surface(&self, surface: &SurfaceId) -> Result<(), DmflowError>;
}
