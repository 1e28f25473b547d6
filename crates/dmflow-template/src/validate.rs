// SPDX-FileCopyrightText: 2026 Dmflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Structural checks for templates before they are saved.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use dmflow_core::DmflowError;

static EMPTY_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\s*\}").expect("empty group pattern"));
static NO_SEPARATOR_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^|]*\}").expect("separator-less group pattern"));
static CHOICE_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^|]*\|[^}]*\}").expect("choice group pattern"));
static VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[A-Za-z][A-Za-z0-9]*\}").expect("variable pattern"));

/// Why a template was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("closing brace without opening brace")]
    UnexpectedClose,
    #[error("unclosed brace")]
    Unclosed,
    #[error("empty group `{{}}`")]
    EmptyGroup,
    #[error("group has no `|` separator and is not a variable")]
    MissingSeparator,
}

impl From<TemplateError> for DmflowError {
    fn from(err: TemplateError) -> Self {
        DmflowError::Template(err.to_string())
    }
}

/// Check brace balance and group shape.
///
/// A template whose only separator-less groups are variable-shaped
/// (`{Name}`) is valid.
pub fn validate(template: &str) -> Result<(), TemplateError> {
    let mut depth: i64 = 0;
    for ch in template.chars() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth < 0 {
                    return Err(TemplateError::UnexpectedClose);
                }
            }
            _ => {}
        }
    }
    if depth > 0 {
        return Err(TemplateError::Unclosed);
    }

    if EMPTY_GROUP.is_match(template) {
        return Err(TemplateError::EmptyGroup);
    }

    if NO_SEPARATOR_GROUP.is_match(template)
        && !CHOICE_GROUP.is_match(template)
        && !VARIABLE.is_match(template)
    {
        return Err(TemplateError::MissingSeparator);
    }

    Ok(())
}
