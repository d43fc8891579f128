//! crates/dedupe_match/src/normalize.rs
//! Legal-suffix-aware name canonicalization and alias extraction.
//!
//! Normalization is deterministic and idempotent: running `normalize_name`
//! on `name_base` reproduces the same base/core/suffix split. Parentheses
//! are preserved in the raw display string and only flagged/mined here;
//! they never reach `name_core`.

use dedupe_core::entities::{AliasSource, NameNorm, SuffixClass};

use once_cell::sync::Lazy;
use regex::Regex;

/// Parenthesized segment (no nesting; input is a single display cell).
static PAREN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(([^()]*)\)").unwrap());

/// Numbered-sequence marker: `(1)`, `( 2 )`, …
static NUMBERED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(\s*\d+\s*\)").unwrap());

/// Parenthetical alias blacklist: content that is commentary, not a name.
const PAREN_BLACKLIST: [&str; 4] = ["paystub", "not sure", "unsure", "staffing agency"];

/// Lowercase, map symbols, collapse whitespace. Idempotent.
pub fn base_normalize(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        match ch {
            '&' => out.push_str(" and "),
            '@' => out.push_str(" at "),
            '+' => out.push_str(" plus "),
            '/' | '-' | '_' => out.push(' '),
            c if c.is_alphanumeric() => {
                for lc in c.to_lowercase() {
                    out.push(lc);
                }
            }
            // Everything else (commas, periods, quotes, parens, …) is a
            // token boundary.
            _ => out.push(' '),
        }
    }
    collapse_spaces(&out)
}

fn collapse_spaces(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Signature of the numeric tokens in a base name (`"20 20"`), empty when
/// the name carries none. `20-20`, `20/20` and `20 20` all collapse to the
/// same signature because the symbol map turns `-` and `/` into spaces.
fn num_style_signature(base: &str) -> String {
    base.split(' ')
        .filter(|t| !t.is_empty() && t.bytes().all(|b| b.is_ascii_digit()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split the trailing legal suffix off a base name. Single-token names are
/// never stripped (a bare "co" is a name, not a suffix).
fn split_suffix(base: &str) -> (String, SuffixClass) {
    let tokens: Vec<&str> = base.split(' ').filter(|t| !t.is_empty()).collect();
    if tokens.len() < 2 {
        return (tokens.join(" "), SuffixClass::None);
    }
    let last = tokens[tokens.len() - 1];
    let class = SuffixClass::from_token(last);
    if class == SuffixClass::None {
        (tokens.join(" "), SuffixClass::None)
    } else {
        (tokens[..tokens.len() - 1].join(" "), class)
    }
}

/// True when parenthesized content looks like a company name: it carries a
/// legal suffix token or at least two capitalized words, and is neither
/// numbers-only nor on the parenthetical blacklist.
fn paren_content_is_alias(content: &str) -> bool {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return false;
    }
    // Numbers-only (possibly spaced) is a marker, not a name.
    if trimmed.chars().all(|c| c.is_ascii_digit() || c.is_whitespace()) {
        return false;
    }
    let lower = trimmed.to_lowercase();
    if PAREN_BLACKLIST.iter().any(|term| lower.contains(term)) {
        return false;
    }
    let has_suffix_token = lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|t| !t.is_empty() && SuffixClass::from_token(t) != SuffixClass::None);
    if has_suffix_token {
        return true;
    }
    let capitalized_words = trimmed
        .split_whitespace()
        .filter(|w| w.chars().next().is_some_and(|c| c.is_uppercase()))
        .count();
    capitalized_words >= 2
}

/// Transform one raw account name into its normalized form.
pub fn normalize_name(raw: &str) -> NameNorm {
    let has_parentheses = raw.contains('(');
    let has_semicolon = raw.contains(';');

    let mut alias_candidates: Vec<String> = Vec::new();
    let mut alias_sources: Vec<AliasSource> = Vec::new();

    // Strip parenthetical segments from the matching surface; mine them
    // for aliases below.
    let paren_contents: Vec<String> = PAREN_RE
        .captures_iter(raw)
        .map(|c| c[1].trim().to_string())
        .collect();
    let without_parens = PAREN_RE.replace_all(raw, " ");

    // (a) Semicolon splits: first segment is the main name.
    let mut segments = without_parens.split(';').map(str::trim);
    let mut main = segments.next().unwrap_or("").to_string();
    for seg in segments {
        if !seg.is_empty() {
            alias_candidates.push(seg.to_string());
            alias_sources.push(AliasSource::Semicolon);
        }
    }

    // (b) Numbered-sequence markers split the main segment further. The
    // markers themselves sit inside parentheses, so detection runs on the
    // raw first segment (before paren stripping).
    let raw_first_segment = raw.split(';').next().unwrap_or("");
    let mut has_multiple_names = has_semicolon && !alias_candidates.is_empty();
    if NUMBERED_RE.is_match(raw_first_segment) {
        let mut parts = NUMBERED_RE
            .split(raw_first_segment)
            .map(str::trim)
            .filter(|p| !p.is_empty());
        if let Some(first) = parts.next() {
            // Re-strip any residual parens from the first part.
            main = PAREN_RE.replace_all(first, " ").trim().to_string();
            for rest in parts {
                let cleaned = PAREN_RE.replace_all(rest, " ").trim().to_string();
                if !cleaned.is_empty() {
                    alias_candidates.push(cleaned);
                    alias_sources.push(AliasSource::Numbered);
                    has_multiple_names = true;
                }
            }
        }
    }

    // (c) Parenthesized content, filtered hard: markers, commentary, and
    // numbers never become aliases.
    for content in &paren_contents {
        if paren_content_is_alias(content) {
            alias_candidates.push(content.clone());
            alias_sources.push(AliasSource::Parentheses);
        }
    }

    let name_base = base_normalize(&main);
    let (name_core, suffix_class) = split_suffix(&name_base);
    let num_style = num_style_signature(&name_base);

    NameNorm {
        name_raw: raw.to_string(),
        name_base,
        name_core,
        suffix_class,
        has_parentheses,
        has_semicolon,
        has_multiple_names,
        num_style_signature: num_style,
        alias_candidates,
        alias_sources,
    }
}

// === Tests ===

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn base_symbol_map() {
        assert_eq!(base_normalize("A&B Trucking"), "a and b trucking");
        assert_eq!(base_normalize("Smith/Jones - East"), "smith jones east");
        assert_eq!(base_normalize("Work @ Home+Co"), "work at home plus co");
        assert_eq!(base_normalize("  Tabs\tand   runs  "), "tabs and runs");
        assert_eq!(base_normalize("snake_case_name"), "snake case name");
    }

    #[test]
    fn numeric_style_unifies() {
        for raw in ["20-20 Vision", "20/20 Vision", "20 20 Vision"] {
            let n = normalize_name(raw);
            assert_eq!(n.name_base, "20 20 vision", "{raw}");
            assert_eq!(n.num_style_signature, "20 20", "{raw}");
        }
        assert_eq!(normalize_name("2020 Vision").num_style_signature, "2020");
        assert_eq!(normalize_name("Acme Inc").num_style_signature, "");
    }

    #[test]
    fn suffix_split() {
        let n = normalize_name("Acme Holdings Inc");
        assert_eq!(n.name_core, "acme holdings");
        assert_eq!(n.suffix_class, SuffixClass::Inc);

        let n = normalize_name("Acme Holdings");
        assert_eq!(n.name_core, "acme holdings");
        assert_eq!(n.suffix_class, SuffixClass::None);

        // Single-token names keep their token even when it looks like a suffix.
        let n = normalize_name("Co");
        assert_eq!(n.name_core, "co");
        assert_eq!(n.suffix_class, SuffixClass::None);

        let n = normalize_name("Müller GmbH");
        assert_eq!(n.name_core, "müller");
        assert_eq!(n.suffix_class, SuffixClass::Gmbh);
    }

    #[test]
    fn semicolon_aliases() {
        let n = normalize_name("Acme Inc; Beta LLC ; ");
        assert_eq!(n.name_core, "acme");
        assert!(n.has_semicolon);
        assert!(n.has_multiple_names);
        assert_eq!(n.alias_candidates, vec!["Beta LLC".to_string()]);
        assert_eq!(n.alias_sources, vec![AliasSource::Semicolon]);
    }

    #[test]
    fn numbered_aliases() {
        let n = normalize_name("(1) Acme Inc (2) Beta Holdings LLC");
        assert_eq!(n.name_core, "acme");
        assert!(n.has_multiple_names);
        assert_eq!(n.alias_candidates, vec!["Beta Holdings LLC".to_string()]);
        assert_eq!(n.alias_sources, vec![AliasSource::Numbered]);
    }

    #[test]
    fn parenthetical_alias_accepted() {
        let n = normalize_name("BMW of Ontario (Penske Auto Group Ontario B1)");
        assert_eq!(n.name_core, "bmw of ontario");
        assert!(n.has_parentheses);
        assert_eq!(n.alias_candidates, vec!["Penske Auto Group Ontario B1".to_string()]);
        assert_eq!(n.alias_sources, vec![AliasSource::Parentheses]);
    }

    #[test]
    fn parenthetical_commentary_rejected() {
        for raw in [
            "Acme Inc (not sure)",
            "Acme Inc (paystub)",
            "Acme Inc (Staffing Agency)",
            "Acme Inc (12345)",
            "Acme Inc (formerly)",
        ] {
            let n = normalize_name(raw);
            assert!(n.alias_candidates.is_empty(), "{raw} leaked an alias");
        }
        // Suffix token inside parens is enough even with one capitalized word.
        let n = normalize_name("Acme (Bettaco LLC)");
        assert_eq!(n.alias_candidates, vec!["Bettaco LLC".to_string()]);
    }

    #[test]
    fn idempotent_on_base() {
        for raw in ["A&B Trucking Inc", "20/20 Vision LLC", "BMW of Ontario (Penske Auto Group)"] {
            let once = normalize_name(raw);
            let twice = normalize_name(&once.name_base);
            assert_eq!(once.name_base, twice.name_base);
            assert_eq!(once.name_core, twice.name_core);
            assert_eq!(once.suffix_class, twice.suffix_class);
        }
    }

    proptest! {
        #[test]
        fn base_normalize_is_idempotent(s in "[ -~]{0,80}") {
            let once = base_normalize(&s);
            prop_assert_eq!(base_normalize(&once), once.clone());
        }

        #[test]
        fn base_has_no_double_spaces(s in "[ -~]{0,80}") {
            let b = base_normalize(&s);
            prop_assert!(!b.contains("  "));
            prop_assert_eq!(b.trim(), b.as_str());
        }
    }
}
