//! crates/dedupe_match/src/disposition.rs
//! Disposition classification: boolean masks assembled in one pass over
//! the columns, then a priority select. The blacklist registry is built
//! once at stage entry from (built-in, configured, manual) and passed by
//! immutable reference; nothing here caches globally.

use dedupe_core::config::BlacklistCfg;
use dedupe_core::entities::{AliasSource, Disposition, NameNorm};

use regex::Regex;

/// Built-in single-word terms (word-boundary matched).
const BUILTIN_TOKENS: [&str; 5] = ["test", "dummy", "duplicate", "unknown", "closed"];

/// Built-in phrases (substring matched).
const BUILTIN_PHRASES: [&str; 6] =
    ["not sure", "unsure", "do not use", "paystub", "staffing agency", "no longer in business"];

/// Effective blacklist for one disposition pass.
///
/// Built-ins apply unless the configured list is explicitly empty; manual
/// terms are always included.
#[derive(Debug)]
pub struct BlacklistRegistry {
    token_re: Option<Regex>,
    phrases: Vec<String>,
}

impl BlacklistRegistry {
    /// Assemble from config plus externally loaded manual terms. Manual
    /// terms containing whitespace are phrases; the rest are tokens.
    pub fn build(cfg: &BlacklistCfg, manual_terms: &[String]) -> Result<Self, regex::Error> {
        let mut tokens: Vec<String> = match &cfg.tokens {
            None => BUILTIN_TOKENS.iter().map(|s| s.to_string()).collect(),
            Some(listed) => listed.iter().map(|s| s.trim().to_lowercase()).collect(),
        };
        let mut phrases: Vec<String> = match &cfg.phrases {
            None => BUILTIN_PHRASES.iter().map(|s| s.to_string()).collect(),
            Some(listed) => listed.iter().map(|s| s.trim().to_lowercase()).collect(),
        };
        for term in manual_terms {
            let t = term.trim().to_lowercase();
            if t.is_empty() {
                continue;
            }
            if t.contains(char::is_whitespace) {
                phrases.push(t);
            } else {
                tokens.push(t);
            }
        }
        tokens.retain(|t| !t.is_empty());
        tokens.sort();
        tokens.dedup();
        phrases.retain(|p| !p.is_empty());
        phrases.sort();
        phrases.dedup();

        let token_re = if tokens.is_empty() {
            None
        } else {
            let alternation =
                tokens.iter().map(|t| regex::escape(t)).collect::<Vec<_>>().join("|");
            Some(Regex::new(&format!(r"\b(?:{alternation})\b"))?)
        };
        Ok(BlacklistRegistry { token_re, phrases })
    }

    /// First matching term for a raw name, if any.
    pub fn match_name(&self, raw_name: &str) -> Option<String> {
        let lower = raw_name.to_lowercase();
        if let Some(re) = &self.token_re {
            if let Some(m) = re.find(&lower) {
                return Some(m.as_str().to_string());
            }
        }
        self.phrases.iter().find(|p| lower.contains(p.as_str())).cloned()
    }
}

/// Per-record classification inputs, one row per input record.
#[derive(Clone, Debug)]
pub struct RecordView<'a> {
    pub raw_name: &'a str,
    pub norm: &'a NameNorm,
    pub group_size: u32,
    pub group_has_suffix_mismatch: bool,
    /// Record participates in a suffix-mismatch annotation (possibly
    /// cross-group).
    pub suffix_annotation: bool,
    pub is_primary: bool,
    /// Distinct groups matched by this record's aliases.
    pub alias_groups: u32,
    /// Sources of those alias matches.
    pub alias_sources: Vec<AliasSource>,
}

/// Suspicious-singleton heuristics: names that should be eyeballed even
/// without duplicate evidence.
pub fn suspicious_reason(view: &RecordView<'_>) -> Option<&'static str> {
    if view.norm.name_core.is_empty() {
        return Some("empty_core");
    }
    if !view.norm.name_base.chars().any(|c| c.is_alphabetic()) {
        return Some("no_letters");
    }
    if view.raw_name.contains('@') {
        return Some("email_like");
    }
    if view.norm.name_base.chars().count() == 1 {
        return Some("single_char");
    }
    None
}

fn alias_reason(view: &RecordView<'_>) -> String {
    let mut sources: Vec<&str> = view.alias_sources.iter().map(AliasSource::as_str).collect();
    sources.sort_unstable();
    sources.dedup();
    format!("alias_matches_{}_groups_via_[{}]", view.alias_groups, sources.join(","))
}

/// Classify every record. Masks are assembled first, then resolved in
/// priority order: blacklist ≻ alias ≻ suffix mismatch ≻ group role ≻
/// singleton heuristics. Exactly one disposition per row.
pub fn classify_all(
    views: &[RecordView<'_>],
    blacklist: &BlacklistRegistry,
) -> Vec<(Disposition, String)> {
    // Mask pass (column-at-a-time; the expensive regex runs once per row).
    let blacklist_hit: Vec<Option<String>> =
        views.iter().map(|v| blacklist.match_name(v.raw_name)).collect();
    let alias_hit: Vec<bool> = views.iter().map(|v| v.alias_groups > 0).collect();
    let suffix_hit: Vec<bool> =
        views.iter().map(|v| v.group_has_suffix_mismatch || v.suffix_annotation).collect();

    // Priority select.
    views
        .iter()
        .enumerate()
        .map(|(i, v)| {
            if let Some(term) = &blacklist_hit[i] {
                return (Disposition::Delete, format!("blacklist:{term}"));
            }
            if alias_hit[i] {
                return (Disposition::Verify, alias_reason(v));
            }
            if suffix_hit[i] {
                let reason = if v.group_size > 1 {
                    "suffix_mismatch_in_group".to_string()
                } else {
                    "suffix_mismatch_with_candidate".to_string()
                };
                return (Disposition::Verify, reason);
            }
            if v.group_size > 1 {
                return if v.is_primary {
                    (Disposition::Keep, "group_primary".to_string())
                } else {
                    (Disposition::Update, "duplicate_of_primary".to_string())
                };
            }
            match suspicious_reason(v) {
                Some(which) => (Disposition::Verify, format!("suspicious:{which}")),
                None => (Disposition::Keep, "singleton".to_string()),
            }
        })
        .collect()
}

// === Tests ===
