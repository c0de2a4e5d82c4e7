//! Query/field text canonicalization and cross-language synonym expansion.

use itertools::Itertools;
use lazy_static::lazy_static;
use std::collections::HashMap;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

lazy_static! {
    // Keyed by exact raw query text or its normalized form. Domain terms the
    // dataset is queried with in Chinese, mapped to the stored English names.
    static ref SYNONYMS: HashMap<&'static str, &'static [&'static str]> = {
        let mut m: HashMap<&'static str, &'static [&'static str]> = HashMap::new();
        m.insert("乳酸", &["lactate", "l-lactate", "lactic acid"]);
        m.insert("l-乳酸", &["l-lactate", "lactate"]);
        m.insert("乳酸根", &["lactate"]);
        m.insert("乳酸钠", &["sodium lactate"]);
        m
    };
}

/// Canonical comparable form of arbitrary text.
///
/// Compatibility-decomposes and drops combining marks, lowercases, maps every
/// character that is not a letter, digit, or hyphen to a space, collapses
/// whitespace runs, and trims. Letters and digits of any script survive, so
/// Chinese target names stay matchable. Idempotent.
pub fn normalize_text(s: &str) -> String {
    let stripped: String = s.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    let lowered = stripped.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut pending_space = false;
    for c in lowered.chars() {
        if c.is_alphanumeric() || c == '-' {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        } else {
            pending_space = true;
        }
    }
    out
}

/// Normalized query alternatives, the normalized original first.
///
/// Synonyms are looked up by the exact raw query and by its normalized form;
/// every candidate is normalized, empties are dropped, and duplicates are
/// removed keeping first-seen order.
pub fn expand_synonyms(query: &str) -> Vec<String> {
    let base = normalize_text(query);
    let direct: &[&str] = SYNONYMS
        .get(query)
        .or_else(|| SYNONYMS.get(base.as_str()))
        .copied()
        .unwrap_or(&[]);
    std::iter::once(base)
        .chain(direct.iter().map(|alt| normalize_text(alt)))
        .filter(|candidate| !candidate.is_empty())
        .unique()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_diacritics_and_lowercases() {
        assert_eq!(normalize_text("Café au Lait"), "cafe au lait");
        assert_eq!(normalize_text("Thrombin"), "thrombin");
    }

    #[test]
    fn punctuation_becomes_single_space() {
        assert_eq!(normalize_text("VEGF (165)"), "vegf 165");
        assert_eq!(normalize_text("  ATP,  Mg2+ "), "atp mg2");
        assert_eq!(normalize_text("10.1038/355564a0"), "10 1038 355564a0");
    }

    #[test]
    fn hyphen_survives_normalization() {
        assert_eq!(normalize_text("L-Lactate"), "l-lactate");
    }

    #[test]
    fn cjk_text_passes_through() {
        assert_eq!(normalize_text("乳酸"), "乳酸");
        assert_eq!(normalize_text("L-乳酸"), "l-乳酸");
    }

    #[test]
    fn normalization_is_idempotent() {
        for s in [
            "Café au Lait",
            "  VEGF (165)!! ",
            "乳酸钠",
            "L-Lactate",
            "ﬁﬂ ligatures",
            "",
            "---",
        ] {
            let once = normalize_text(s);
            assert_eq!(normalize_text(&once), once, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn expansion_puts_normalized_query_first() {
        let candidates = expand_synonyms("Thrombin");
        assert_eq!(candidates, vec!["thrombin".to_string()]);
    }

    #[test]
    fn chinese_lactate_expands_to_english_terms() {
        let candidates = expand_synonyms("乳酸");
        assert_eq!(candidates[0], "乳酸");
        assert!(candidates.contains(&"lactate".to_string()));
        assert!(candidates.contains(&"l-lactate".to_string()));
        assert!(candidates.contains(&"lactic acid".to_string()));
    }

    #[test]
    fn expansion_matches_on_normalized_key() {
        // Raw "L-乳酸" is not a table key, but its normalized form is.
        let candidates = expand_synonyms("L-乳酸");
        assert_eq!(candidates[0], "l-乳酸");
        assert!(candidates.contains(&"l-lactate".to_string()));
    }

    #[test]
    fn expansion_dedupes_preserving_order() {
        // "乳酸根" maps to lactate only; no duplicate of the base either.
        let candidates = expand_synonyms("乳酸根");
        assert_eq!(candidates, vec!["乳酸根".to_string(), "lactate".to_string()]);
    }

    #[test]
    fn empty_query_expands_to_nothing() {
        assert!(expand_synonyms("").is_empty());
        assert!(expand_synonyms("!!!").is_empty());
    }
}
