// SPDX-FileCopyrightText: 2026 Dmflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeMap;

use dmflow_template::{resolve_choices, resolve_message, validate};
use proptest::prelude::*;

proptest! {
    /// Text without braces passes through unchanged apart from trimming.
    #[test]
    fn brace_free_text_is_stable(text in "[A-Za-z0-9 ,.!?]{0,64}") {
        let out = resolve_message(&text, &BTreeMap::new()).unwrap();
        prop_assert_eq!(out, text.trim());
    }

    /// A flat group always resolves to one of its alternatives.
    #[test]
    fn flat_group_yields_an_alternative(
        alts in prop::collection::vec("[a-z]{1,8}", 1..6)
    ) {
        let template = format!("{{{}}}", alts.join("|"));
        prop_assert!(validate(&template).is_ok());
        let out = resolve_choices(&template);
        prop_assert!(alts.contains(&out));
    }

    /// No well-formed template leaves braces behind.
    #[test]
    fn balanced_nested_groups_fully_resolve(
        inner in prop::collection::vec("[a-z]{1,5}", 2..4),
        outer in "[a-z]{1,5}",
    ) {
        let template = format!("{{{outer} {{{}}}|{outer}}}", inner.join("|"));
        let out = resolve_choices(&template);
        prop_assert!(!out.contains('{') && !out.contains('}'), "output still contains braces: {}", out);
    }
}
