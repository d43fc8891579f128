//! crates/dedupe_core/src/config.rs
//! Engine configuration domains and validation. The effective config is
//! hashed canonically (see `dedupe_io::hasher`) and participates in run
//! identity, so every field here is normative.
//!
//! Unknown keys are rejected at deserialization; domain validation runs
//! before any stage.

use crate::entities::PairStrategy;
use crate::errors::CoreError;
use crate::score::{points_to_centi, ScoreCenti};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Similarity penalty weights, in points (0..=100).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct PenaltyCfg {
    pub suffix_mismatch: f64,
    pub num_style_mismatch: f64,
    pub punctuation_mismatch: f64,
}

impl Default for PenaltyCfg {
    fn default() -> Self {
        PenaltyCfg { suffix_mismatch: 25.0, num_style_mismatch: 5.0, punctuation_mismatch: 3.0 }
    }
}

/// Similarity thresholds and penalties.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct SimilarityCfg {
    /// High-confidence threshold (auto-accept domain), points.
    pub high: f64,
    /// Medium threshold (grouping floor), points.
    pub medium: f64,
    /// Cheap token-overlap gate applied before the expensive ratios, points.
    pub gate_cutoff: f64,
    pub penalty: PenaltyCfg,
}

impl Default for SimilarityCfg {
    fn default() -> Self {
        SimilarityCfg { high: 92.0, medium: 84.0, gate_cutoff: 72.0, penalty: PenaltyCfg::default() }
    }
}

/// Similarity thresholds resolved to centipoints, computed once at stage
/// entry so the hot path never touches floats.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedSimilarity {
    pub high: ScoreCenti,
    pub medium: ScoreCenti,
    /// Gate cutoff in whole points (the pre-gate works on a 0..=100 scale).
    pub gate_cutoff: u32,
    pub penalty_suffix: ScoreCenti,
    pub penalty_num_style: ScoreCenti,
    pub penalty_punct: ScoreCenti,
}

impl SimilarityCfg {
    pub fn resolve(&self) -> Result<ResolvedSimilarity, CoreError> {
        Ok(ResolvedSimilarity {
            high: points_to_centi(self.high)?,
            medium: points_to_centi(self.medium)?,
            gate_cutoff: points_to_centi(self.gate_cutoff)? / 100,
            penalty_suffix: points_to_centi(self.penalty.suffix_mismatch)?,
            penalty_num_style: points_to_centi(self.penalty.num_style_mismatch)?,
            penalty_punct: points_to_centi(self.penalty.punctuation_mismatch)?,
        })
    }
}

/// Blocking strategies, caps, and token hygiene.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct BlockingCfg {
    pub strategies: Vec<PairStrategy>,
    /// Prefix length for the `prefix_ngram` strategy.
    pub prefix_len: usize,
    pub max_block_size: usize,
    pub max_pairs_per_block: u64,
    pub max_pairs_total: u64,
    pub min_token_len: usize,
    pub stop_tokens: Vec<String>,
    /// Drop the K most frequent first tokens from blocking (0 = off).
    pub drop_top_freq_tokens: usize,
    /// Length-window prefilter: emit a pair only when
    /// `|len_a − len_b| ≤ ratio · max(len_a, len_b)`.
    pub length_window_ratio: f64,
}

impl Default for BlockingCfg {
    fn default() -> Self {
        BlockingCfg {
            strategies: vec![
                PairStrategy::FirstToken,
                PairStrategy::FirstTwoTokens,
                PairStrategy::PrefixNgram,
                PairStrategy::SortedBigrams,
            ],
            prefix_len: 10,
            max_block_size: 2_500,
            max_pairs_per_block: 50_000,
            max_pairs_total: 2_000_000,
            min_token_len: 2,
            stop_tokens: ["inc", "llc", "ltd", "corp", "co", "gmbh", "the", "and", "of"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            drop_top_freq_tokens: 0,
            length_window_ratio: 0.5,
        }
    }
}

/// Canopy and edge-gating toggles.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct GroupingCfg {
    pub max_group_size: u32,
    pub canopy_enabled: bool,
    pub edge_gating_enabled: bool,
}

impl Default for GroupingCfg {
    fn default() -> Self {
        GroupingCfg { max_group_size: 50, canopy_enabled: true, edge_gating_enabled: true }
    }
}

/// Survivorship tie-breaker order and relationship-rank sourcing.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct SurvivorshipCfg {
    /// Ordered tie-breaker keys; validated against the known set.
    pub tie_breakers: Vec<String>,
    /// Optional CSV `relationship,rank` table; built-ins apply when unset.
    pub relationship_rank_path: Option<String>,
    /// Rank assigned to unknown relationship categories.
    pub default_relationship_rank: u32,
}

impl Default for SurvivorshipCfg {
    fn default() -> Self {
        SurvivorshipCfg {
            tie_breakers: vec![
                "relationship_rank".to_string(),
                "created_date".to_string(),
                "account_id".to_string(),
            ],
            relationship_rank_path: None,
            default_relationship_rank: 60,
        }
    }
}

/// Tie-breaker keys accepted in `SurvivorshipCfg::tie_breakers`.
pub const TIE_BREAKER_KEYS: [&str; 3] = ["relationship_rank", "created_date", "account_id"];

/// Configured blacklist. `None` keeps the built-ins; an explicitly empty
/// list disables them. Manual terms (external file) are always included.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct BlacklistCfg {
    pub tokens: Option<Vec<String>>,
    pub phrases: Option<Vec<String>>,
    /// Path to an externally maintained term list (one term per line).
    pub manual_path: Option<String>,
}

/// Disposition rules.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct DispositionCfg {
    pub blacklist: BlacklistCfg,
}

/// Parallel policy for the chunked executor.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct ParallelismCfg {
    /// Worker count; autotuned from available CPUs when unset.
    pub workers: Option<usize>,
    /// `threads` (default) or `serial`.
    pub backend: String,
    /// Items per chunk; autotuned when unset.
    pub chunk_size: Option<usize>,
    /// Inputs below this size skip the pool and run on the caller thread.
    pub small_input_threshold: usize,
}

impl Default for ParallelismCfg {
    fn default() -> Self {
        ParallelismCfg {
            workers: None,
            backend: "threads".to_string(),
            chunk_size: None,
            small_input_threshold: 2_000,
        }
    }
}

/// Run retention policy.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct RunCfg {
    /// Target number of runs kept by cleanup.
    pub keep_runs: usize,
    /// Hard floor cleanup will not cross without an explicit override.
    pub keep_at_least: usize,
    /// Allow the latest pointer to become the empty state after cleanup.
    pub allow_empty_state: bool,
}

impl Default for RunCfg {
    fn default() -> Self {
        RunCfg { keep_runs: 10, keep_at_least: 3, allow_empty_state: true }
    }
}

/// The complete engine configuration.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct EngineConfig {
    pub similarity: SimilarityCfg,
    pub blocking: BlockingCfg,
    pub grouping: GroupingCfg,
    pub survivorship: SurvivorshipCfg,
    pub disposition: DispositionCfg,
    pub parallelism: ParallelismCfg,
    pub run: RunCfg,
}

impl EngineConfig {
    /// Validate every domain before any stage runs. Errors here are fatal
    /// (`ConfigError` category).
    pub fn validate_domains(&self) -> Result<(), CoreError> {
        // Similarity: 0 ≤ medium ≤ high ≤ 100, penalties in-domain.
        let sim = self.similarity.resolve()?;
        if sim.medium > sim.high {
            return Err(CoreError::DomainOutOfRange("similarity.medium > similarity.high"));
        }

        // Blocking.
        if self.blocking.strategies.is_empty() {
            return Err(CoreError::DomainOutOfRange("blocking.strategies empty"));
        }
        if self.blocking.strategies.contains(&PairStrategy::ExactRaw) {
            return Err(CoreError::DomainOutOfRange("blocking.strategies may not name exact_raw"));
        }
        if self.blocking.prefix_len == 0 {
            return Err(CoreError::DomainOutOfRange("blocking.prefix_len"));
        }
        if self.blocking.max_block_size < 2 {
            return Err(CoreError::DomainOutOfRange("blocking.max_block_size"));
        }
        if self.blocking.min_token_len == 0 {
            return Err(CoreError::DomainOutOfRange("blocking.min_token_len"));
        }
        if !(0.0..=1.0).contains(&self.blocking.length_window_ratio) {
            return Err(CoreError::DomainOutOfRange("blocking.length_window_ratio"));
        }
        if self.blocking.max_pairs_per_block == 0 || self.blocking.max_pairs_total == 0 {
            return Err(CoreError::DomainOutOfRange("blocking pair budgets"));
        }

        // Grouping.
        if self.grouping.max_group_size < 2 {
            return Err(CoreError::DomainOutOfRange("grouping.max_group_size"));
        }

        // Survivorship: keys must come from the known set, no duplicates.
        let mut seen: Vec<&str> = Vec::new();
        for key in &self.survivorship.tie_breakers {
            if !TIE_BREAKER_KEYS.contains(&key.as_str()) || seen.contains(&key.as_str()) {
                return Err(CoreError::DomainOutOfRange("survivorship.tie_breakers"));
            }
            seen.push(key.as_str());
        }
        if seen.is_empty() {
            return Err(CoreError::DomainOutOfRange("survivorship.tie_breakers empty"));
        }

        // Parallelism.
        match self.parallelism.backend.as_str() {
            "threads" | "serial" => {}
            _ => return Err(CoreError::DomainOutOfRange("parallelism.backend")),
        }
        if self.parallelism.workers == Some(0) {
            return Err(CoreError::DomainOutOfRange("parallelism.workers"));
        }
        if self.parallelism.chunk_size == Some(0) {
            return Err(CoreError::DomainOutOfRange("parallelism.chunk_size"));
        }

        // Retention.
        if self.run.keep_at_least > self.run.keep_runs {
            return Err(CoreError::DomainOutOfRange("run.keep_at_least > run.keep_runs"));
        }
        Ok(())
    }
}

// === Tests ===

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = EngineConfig::default();
        assert!(cfg.validate_domains().is_ok());
        let sim = cfg.similarity.resolve().unwrap();
        assert_eq!(sim.high, 9_200);
        assert_eq!(sim.medium, 8_400);
        assert_eq!(sim.gate_cutoff, 72);
        assert_eq!(sim.penalty_suffix, 2_500);
    }

    #[test]
    fn inverted_thresholds_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.similarity.high = 80.0;
        cfg.similarity.medium = 90.0;
        assert!(cfg.validate_domains().is_err());
    }

    #[test]
    fn exact_raw_not_a_blocking_strategy() {
        let mut cfg = EngineConfig::default();
        cfg.blocking.strategies.push(PairStrategy::ExactRaw);
        assert!(cfg.validate_domains().is_err());
    }

    #[test]
    fn tie_breaker_keys_checked() {
        let mut cfg = EngineConfig::default();
        cfg.survivorship.tie_breakers = vec!["created_date".into(), "created_date".into()];
        assert!(cfg.validate_domains().is_err());
        cfg.survivorship.tie_breakers = vec!["favorite_color".into()];
        assert!(cfg.validate_domains().is_err());
    }
}
