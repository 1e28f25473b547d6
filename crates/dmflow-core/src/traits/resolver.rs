// SPDX-FileCopyrightText: 2026 Dmflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Template resolution trait.

use std::collections::BTreeMap;

use crate::error::DmflowError;

/// Turns template text plus per-contact variables into a final message.
///
/// Resolution may be randomized; the result is fixed into the task and never
/// re-resolved.
pub trait TemplateResolver: Send + Sync + 'static {
    fn resolve(
        &self,
        template: &str,
        variables: &BTreeMap<String, String>,
    ) -> Result<String, DmflowError>;
}
