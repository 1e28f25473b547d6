// SPDX-FileCopyrightText: 2026 Dmflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence layer for the dmflow outreach engine.
//!
//! Provides a WAL-mode SQLite [`StateStore`](dmflow_core::StateStore) with
//! embedded migrations and a single-writer connection via `tokio-rusqlite`,
//! plus [`StateRecords`], the typed view the engine reads and writes through.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod records;

pub use adapter::SqliteStore;
pub use database::Database;
pub use records::{StateRecords, DEFAULT_TEMPLATE_CONTENT, DEFAULT_TEMPLATE_NAME};
