// SPDX-FileCopyrightText: 2026 Dmflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Variable substitution and randomized-choice resolution.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use rand::Rng;
use regex::{NoExpand, Regex, RegexBuilder};

use dmflow_core::{DmflowError, TemplateResolver};

/// Upper bound on innermost-group resolution passes.
pub const MAX_PASSES: usize = 100;

/// An innermost group: braces with no braces inside.
static INNERMOST_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^{}]+)\}").expect("innermost group pattern"));

/// A variable-shaped placeholder such as `{Name}` or `{Field2}`.
static VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z][A-Za-z0-9]*)\}").expect("variable pattern"));

/// Replace every `{key}` (any letter case) with its value.
///
/// Placeholders without a value are left for the choice pass, where a
/// single-alternative group resolves to its own text.
pub fn substitute_variables(
    template: &str,
    variables: &BTreeMap<String, String>,
) -> Result<String, DmflowError> {
    let mut result = template.to_string();
    for (key, value) in variables {
        let pattern = RegexBuilder::new(&format!(r"\{{{}\}}", regex::escape(key)))
            .case_insensitive(true)
            .build()
            .map_err(|e| DmflowError::Template(format!("bad variable name `{key}`: {e}")))?;
        result = pattern
            .replace_all(&result, NoExpand(value.as_str()))
            .into_owned();
    }
    Ok(result)
}

/// Resolve every choice group using the thread-local RNG.
pub fn resolve_choices(text: &str) -> String {
    resolve_choices_with(text, &mut rand::thread_rng())
}

/// Resolve every choice group, innermost first, drawing from `rng`.
///
/// Stops when no innermost group remains or after [`MAX_PASSES`] passes.
pub fn resolve_choices_with<R: Rng + ?Sized>(text: &str, rng: &mut R) -> String {
    let mut result = text.to_string();

    for _ in 0..MAX_PASSES {
        if !INNERMOST_GROUP.is_match(&result) {
            break;
        }
        result = INNERMOST_GROUP
            .replace_all(&result, |caps: &regex::Captures<'_>| {
                let alternatives: Vec<&str> = caps[1].split('|').collect();
                let pick = rng.gen_range(0..alternatives.len());
                alternatives[pick].to_string()
            })
            .into_owned();
    }

    result
}

/// Substitute variables, resolve choice groups and trim.
pub fn resolve_message(
    template: &str,
    variables: &BTreeMap<String, String>,
) -> Result<String, DmflowError> {
    resolve_message_with(template, variables, &mut rand::thread_rng())
}

/// [`resolve_message`] with an explicit RNG.
pub fn resolve_message_with<R: Rng + ?Sized>(
    template: &str,
    variables: &BTreeMap<String, String>,
    rng: &mut R,
) -> Result<String, DmflowError> {
    let substituted = substitute_variables(template, variables)?;
    Ok(resolve_choices_with(&substituted, rng).trim().to_string())
}

/// Distinct variable-shaped placeholders, in order of first appearance.
pub fn extract_variables(template: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for caps in VARIABLE.captures_iter(template) {
        let name = caps[1].to_string();
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}

/// Resolve `template` against sample values (`Name=John`, `Category=Fashion`),
/// with `overrides` taking precedence.
pub fn preview(
    template: &str,
    overrides: &BTreeMap<String, String>,
) -> Result<String, DmflowError> {
    let mut variables = BTreeMap::from([
        ("Name".to_string(), "John".to_string()),
        ("Category".to_string(), "Fashion".to_string()),
    ]);
    variables.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    resolve_message(template, &variables)
}

/// [`TemplateResolver`] backed by the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpintaxResolver;

impl SpintaxResolver {
    pub fn new() -> Self {
        Self
    }
}

impl TemplateResolver for SpintaxResolver {
    fn resolve(
        &self,
        template: &str,
        variables: &BTreeMap<String, String>,
    ) -> Result<String, DmflowError> {
        let message = resolve_message(template, variables)?;
        tracing::trace!(len = message.len(), "template resolved");
        Ok(message)
    }
}
