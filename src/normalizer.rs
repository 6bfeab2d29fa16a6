// ABOUTME: Canonical string normalization and fuzzy-candidate generation (C1)
// ABOUTME: Deterministic, total functions turning free-form ingredient names into lookup keys
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Normalizer (C1).
//!
//! `normalize` is deterministic and total: every input string, however messy,
//! produces a normalized key. `fuzzy_candidates` widens a single normalized key
//! into a small ordered list of progressively looser variants for tiered lookup
//! against the hot-path table (C3) and canonical store (C4).

use std::sync::LazyLock;

/// Plural exceptions that must never have a trailing `s` stripped.
const PLURAL_EXCEPTIONS: &[&str] = &["oats", "hummus", "couscous", "asparagus", "lentils"];

/// Brand/quality prefixes stripped before the core lookup key is built.
const STRIPPED_PREFIXES: &[&str] = &[
    "organic_", "fresh_", "frozen_", "premium_", "extra_", "fine_", "whole_", "natural_",
];

/// Pack/quantity suffixes stripped from the tail of a normalized key.
const STRIPPED_SUFFIXES: &[&str] = &[
    "_pack", "_box", "_bag", "_can", "_jar", "_bottle", "_family_size", "_value_pack",
];

/// Quality adjectives removed outright wherever they appear as a whole token.
const QUALITY_ADJECTIVES: &[&str] = &[
    "large", "small", "medium", "extra", "fine", "premium", "organic", "fresh", "raw",
];

fn synonym_map() -> &'static std::collections::HashMap<&'static str, &'static str> {
    static MAP: LazyLock<std::collections::HashMap<&'static str, &'static str>> = LazyLock::new(|| {
        [
            ("scallion", "green_onion"),
            ("spring_onion", "green_onion"),
            ("garbanzo", "chickpea"),
            ("garbanzo_bean", "chickpea"),
            ("cilantro", "coriander"),
            ("aubergine", "eggplant"),
            ("courgette", "zucchini"),
            ("capsicum", "bell_pepper"),
            ("bicarb_soda", "baking_soda"),
            ("rocket", "arugula"),
            ("double_cream", "heavy_cream"),
            ("minced_meat", "ground_meat"),
            ("mince", "ground_beef"),
            ("beansprouts", "bean_sprouts"),
            ("spud", "potato"),
        ]
        .into_iter()
        .collect()
    });
    &MAP
}

/// Normalize a raw, free-form ingredient name into a canonical lookup key.
///
/// Total and deterministic: lowercases, trims, collapses whitespace, maps
/// `%` to `pct`, converts separators to `_`, strips brand/quality prefixes and
/// pack suffixes, removes quality adjectives, applies the synonym map, handles
/// common plurals, then re-applies the synonym map (a stripped plural may
/// itself have a synonym).
#[must_use]
pub fn normalize(raw: &str) -> String {
    let mut s = raw.trim().to_lowercase();
    s = s.replace('%', "pct");
    s = s
        .chars()
        .map(|c| if c.is_whitespace() || c == '-' || c == '/' { '_' } else { c })
        .collect();
    while s.contains("__") {
        s = s.replace("__", "_");
    }
    s = s.trim_matches('_').to_string();

    for prefix in STRIPPED_PREFIXES {
        if let Some(rest) = s.strip_prefix(prefix) {
            s = rest.to_string();
        }
    }
    for suffix in STRIPPED_SUFFIXES {
        if let Some(rest) = s.strip_suffix(suffix) {
            s = rest.to_string();
        }
    }

    s = s
        .split('_')
        .filter(|tok| !QUALITY_ADJECTIVES.contains(tok))
        .collect::<Vec<_>>()
        .join("_");

    s = apply_synonyms(&s);
    s = apply_plural_rules(&s);
    s = apply_synonyms(&s);

    s.trim_matches('_').to_string()
}

fn apply_synonyms(s: &str) -> String {
    let map = synonym_map();
    if let Some(replacement) = map.get(s) {
        return (*replacement).to_string();
    }
    s.split('_')
        .map(|tok| map.get(tok).copied().unwrap_or(tok))
        .collect::<Vec<_>>()
        .join("_")
}

fn apply_plural_rules(s: &str) -> String {
    s.split('_')
        .map(singularize_owned)
        .collect::<Vec<_>>()
        .join("_")
}

/// Strip common plural suffixes (`ies -> y`, `oes -> o`, trailing `s`),
/// respecting [`PLURAL_EXCEPTIONS`].
fn singularize_owned(tok: &str) -> String {
    if PLURAL_EXCEPTIONS.contains(&tok) {
        return tok.to_string();
    }
    if let Some(stem) = tok.strip_suffix("ies") {
        return format!("{stem}y");
    }
    if let Some(stem) = tok.strip_suffix("oes") {
        return format!("{stem}o");
    }
    if let Some(stem) = tok.strip_suffix('s') {
        if !stem.ends_with('s') && !stem.is_empty() {
            return stem.to_string();
        }
    }
    tok.to_string()
}

/// Returns a small ordered list of lookup candidates for `key`, from the most
/// to the least specific: exact, quality-stripped, first word, last word,
/// numeric-suffix-stripped. Duplicates are removed while preserving order.
#[must_use]
pub fn fuzzy_candidates(key: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut push = |candidate: String| {
        if !candidate.is_empty() && !out.contains(&candidate) {
            out.push(candidate);
        }
    };

    push(key.to_string());

    let quality_stripped: String = key
        .split('_')
        .filter(|tok| !QUALITY_ADJECTIVES.contains(tok))
        .collect::<Vec<_>>()
        .join("_");
    push(quality_stripped);

    if let Some(first) = key.split('_').next() {
        push(first.to_string());
    }
    if let Some(last) = key.split('_').next_back() {
        push(last.to_string());
    }

    let numeric_stripped: String = key
        .split('_')
        .filter(|tok| !tok.chars().all(|c| c.is_ascii_digit()))
        .collect::<Vec<_>>()
        .join("_");
    push(numeric_stripped);

    out
}

/// Levenshtein edit distance between `a` and `b`, capped early if it would
/// exceed `ceiling` (still returns the true distance when it is `<= ceiling`,
/// an upper-bound value otherwise suitable only for a `> ceiling` comparison).
#[must_use]
pub fn levenshtein(a: &str, b: &str, ceiling: usize) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (n, m) = (a.len(), b.len());
    if n.abs_diff(m) > ceiling {
        return ceiling + 1;
    }

    let mut prev: Vec<usize> = (0..=m).collect();
    let mut curr = vec![0usize; m + 1];

    for i in 1..=n {
        curr[0] = i;
        let mut row_min = curr[0];
        for j in 1..=m {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
            row_min = row_min.min(curr[j]);
        }
        if row_min > ceiling {
            return ceiling + 1;
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[m]
}

/// Default Levenshtein distance ceiling for last-resort matching.
pub const DEFAULT_LEVENSHTEIN_CEILING: usize = 3;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_is_idempotent() {
        // R1: normalize(normalize(x)) == normalize(x)
        let cases = ["Organic Chicken Breast!", "  2% Milk  ", "Fresh-Cut Fries/Box", "Berries"];
        for c in cases {
            let once = normalize(c);
            let twice = normalize(&once);
            assert_eq!(once, twice, "not idempotent for {c:?}");
        }
    }

    #[test]
    fn normalize_strips_prefix_and_suffix() {
        assert_eq!(normalize("Organic Chicken Breast"), "chicken_breast");
    }

    #[test]
    fn normalize_handles_percent() {
        assert_eq!(normalize("2% Milk"), "2pct_milk");
    }

    #[test]
    fn normalize_keeps_plural_exceptions() {
        assert_eq!(normalize("Oats"), "oats");
        assert_eq!(normalize("Hummus"), "hummus");
        assert_eq!(normalize("Lentils"), "lentils");
    }

    #[test]
    fn singularize_owned_handles_ies_and_oes() {
        assert_eq!(singularize_owned("berries"), "berry");
        assert_eq!(singularize_owned("tomatoes"), "tomato");
        assert_eq!(singularize_owned("eggs"), "egg");
    }

    #[test]
    fn fuzzy_candidates_orders_tight_to_loose() {
        let candidates = fuzzy_candidates("organic_chicken_breast_2");
        assert_eq!(candidates[0], "organic_chicken_breast_2");
        assert!(candidates.contains(&"chicken_breast_2".to_string()));
        assert!(candidates.contains(&"organic".to_string()));
    }

    #[test]
    fn levenshtein_zero_for_equal_strings() {
        assert_eq!(levenshtein("chicken", "chicken", 3), 0);
    }

    #[test]
    fn levenshtein_respects_ceiling() {
        assert!(levenshtein("chicken", "elephant", 3) > 3);
    }
}
