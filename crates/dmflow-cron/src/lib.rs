// SPDX-FileCopyrightText: 2026 Dmflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduled triggers for the dmflow engine.
//!
//! The only schedule today is the daily send-counter reset, fired at each
//! UTC midnight through the [`CommandRouter`] like any other transport.

pub mod daily;

pub use daily::{DailyTrigger, next_midnight, until_next_midnight};
