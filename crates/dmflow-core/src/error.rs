// SPDX-FileCopyrightText: 2026 Dmflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error taxonomy shared by every dmflow crate.

use std::time::Duration;

use thiserror::Error;

/// The primary error type used across collaborator traits and engine operations.
///
/// `Executor` failures are recovered locally by the retry policy. Every other
/// variant is surfaced to the caller as the `error` field of a command response.
#[derive(Debug, Error)]
pub enum DmflowError {
    /// A referenced record (contact list, template, settings) does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The selected list has no contacts with status `pending` or `failed`.
    #[error("no contacts to send: every contact in the list is already sent or skipped")]
    EmptyQueue,

    /// A queue is already active (running or paused).
    #[error("queue {queue_id} is already {status}; stop it before starting another")]
    AlreadyRunning { queue_id: String, status: String },

    /// The daily send cap has been reached.
    #[error("daily limit reached ({limit})")]
    LimitReached { limit: u32 },

    /// The message-send executor reported a failure (network, selector, block, ...).
    #[error("executor error: {message}")]
    Executor { message: String },

    /// Persistent store errors (connection, query, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An external call exceeded its bounded wait.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// The engine has not finished initializing, or it has shut down.
    #[error("engine not initialized")]
    NotInitialized,

    /// A message template could not be parsed.
    #[error("template error: {0}")]
    Template(String),

    /// Configuration errors.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DmflowError {
    /// Wraps any error as a storage failure.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        DmflowError::Storage {
            source: Box::new(err),
        }
    }

    /// Builds an executor failure from a plain message.
    pub fn executor(message: impl Into<String>) -> Self {
        DmflowError::Executor {
            message: message.into(),
        }
    }

    /// Whether this failure is eligible for the task retry policy.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DmflowError::Executor { .. } | DmflowError::Timeout { .. }
        )
    }
}

impl From<serde_json::Error> for DmflowError {
    fn from(err: serde_json::Error) -> Self {
        DmflowError::storage(err)
    }
}
