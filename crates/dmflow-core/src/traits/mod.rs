// SPDX-FileCopyrightText: 2026 Dmflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits the engine is written against.
//!
//! Adapters extend the [`PluginAdapter`] base trait and use `#[async_trait]`
//! for dynamic dispatch compatibility.

pub mod adapter;
pub mod executor;
pub mod resolver;
pub mod store;

pub use adapter::PluginAdapter;
pub use executor::{DmRequest, MessageExecutor};
pub use resolver::TemplateResolver;
pub use store::StateStore;
