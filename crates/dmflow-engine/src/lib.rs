// SPDX-FileCopyrightText: 2026 Dmflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Task queue orchestrator for the dmflow outreach engine.
//!
//! The [`Orchestrator`] is an actor that:
//! - Builds a queue of resolved messages from a contact list and template
//! - Sends them one at a time through a [`MessageExecutor`](dmflow_core::MessageExecutor)
//! - Applies retry, daily-limit and pause-on-error policy between sends
//! - Spaces sends with a cancelable randomized delay
//! - Recovers an interrupted queue on restart
//!
//! Transports reach it through a [`CommandRouter`] with the closed
//! [`Command`] set.

pub mod command;
pub mod orchestrator;
pub mod policy;
pub mod router;
pub mod timer;

pub use command::{Command, CommandResponse};
pub use orchestrator::{EngineOptions, Orchestrator};
pub use router::{CommandRouter, EngineHandle};
pub use timer::DelayTimer;
