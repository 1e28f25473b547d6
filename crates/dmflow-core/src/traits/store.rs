// SPDX-FileCopyrightText: 2026 Dmflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistent key/value store trait.

use async_trait::async_trait;

use crate::error::DmflowError;
use crate::traits::adapter::PluginAdapter;
use crate::types::StateKey;

/// Durable key/value state: every [`StateKey`] is an independently
/// readable and writable JSON record.
///
/// Writes are whole-record replacements; there are no partial updates.
/// Reads of a key that was never written return `None`.
#[async_trait]
pub trait StateStore: PluginAdapter {
    /// Reads the record stored under `key`.
    async fn get(&self, key: StateKey) -> Result<Option<serde_json::Value>, DmflowError>;

    /// Replaces the record stored under `key`.
    async fn set(&self, key: StateKey, value: serde_json::Value) -> Result<(), DmflowError>;

    /// Deletes the record stored under `key`. Deleting a missing key is not an error.
    async fn remove(&self, key: StateKey) -> Result<(), DmflowError>;
}
