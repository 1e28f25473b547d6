// SPDX-FileCopyrightText: 2026 Dmflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the dmflow outreach engine.
//!
//! This crate provides the domain model (contacts, templates, tasks, queues,
//! settings, activity log), the error taxonomy, and the traits through which
//! the engine reaches its external collaborators: the persistent store, the
//! message-send executor, and the template resolver.

pub mod error;
pub mod traits;
pub mod types;

pub use error::DmflowError;
pub use types::{AdapterType, HealthStatus, StateKey, SurfaceId};

pub use traits::{
    DmRequest, MessageExecutor, PluginAdapter, StateStore, TemplateResolver,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_type_round_trips_through_display() {
        use std::str::FromStr;

        for variant in [
            AdapterType::Store,
            AdapterType::Executor,
            AdapterType::Resolver,
            AdapterType::Transport,
        ] {
            let parsed = AdapterType::from_str(&variant.to_string()).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn collaborator_traits_are_object_safe() {
        fn _store(_: &dyn StateStore) {}
        fn _executor(_: &dyn MessageExecutor) {}
        fn _resolver(_: &dyn TemplateResolver) {}
    }
}
