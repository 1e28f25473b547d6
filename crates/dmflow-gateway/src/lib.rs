// SPDX-FileCopyrightText: 2026 Dmflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the dmflow engine.
//!
//! Exposes the closed command set over a small JSON API so that a browser
//! extension, script or the `dmflow` CLI can drive a running engine.

pub mod auth;
pub mod handlers;
pub mod server;

pub use auth::AuthConfig;
pub use server::{GatewayState, ServerConfig, build_router, start_server};
