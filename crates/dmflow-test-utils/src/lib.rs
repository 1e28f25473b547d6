// SPDX-FileCopyrightText: 2026 Dmflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for dmflow integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic tests without a database or a remote surface agent.
//!
//! # Components
//!
//! - [`MemoryStore`] - In-memory state store with write-failure injection
//! - [`MockExecutor`] - Scripted message executor that records every send
//! - [`TestHarness`] - A running orchestrator wired to both

pub mod harness;
pub mod memory_store;
pub mod mock_executor;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use memory_store::MemoryStore;
pub use mock_executor::{MockExecutor, SendScript};
