// SPDX-FileCopyrightText: 2026 Dmflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message template resolution for the dmflow outreach engine.
//!
//! A template mixes two kinds of `{...}` groups:
//!
//! - **Variables**: `{Name}`, `{Category}` or any custom field `{Key}`,
//!   substituted case-insensitively from the contact's values.
//! - **Randomized-choice groups** ("spintax"): `{Hi|Hello|Hey}` resolves to
//!   one alternative picked uniformly at random. Groups nest:
//!   `{Hi {there|friend}|Hello}`.
//!
//! Variables are substituted first, then choice groups are resolved
//! innermost-first, then the result is trimmed.

pub mod spintax;
pub mod validate;

pub use spintax::{
    extract_variables, preview, resolve_choices, resolve_choices_with, resolve_message,
    resolve_message_with, substitute_variables, SpintaxResolver, MAX_PASSES,
};
pub use validate::{validate, TemplateError};
