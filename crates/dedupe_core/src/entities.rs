//! crates/dedupe_core/src/entities.rs
//! Engine entities: records, normalized names, candidate pairs, groups,
//! dispositions, run records, and per-stage pipeline state. These are the
//! fixed schemas carried by on-disk artifacts; column order and dtypes are
//! enforced by `dedupe_io`.

use crate::errors::CoreError;
use crate::ids::{AccountId, GroupId, RunId};
use crate::score::ScoreCenti;

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// ------------------------------- Records -------------------------------

/// One input row after schema resolution and ID canonicalization.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Record {
    /// Canonical 18-char ID; unique and non-null after canonicalization.
    pub account_id: AccountId,
    /// Original ID text, preserved for audit (empty when generated).
    pub account_id_src: String,
    pub account_name: String,
    /// RFC3339 UTC `YYYY-MM-DDTHH:MM:SSZ`; lexicographic order is
    /// chronological, which survivorship relies on.
    pub created_utc: Option<String>,
    pub relationship: Option<String>,
}

// --------------------------- Normalized names ---------------------------

/// Legal-entity suffix classes recognized on the trailing token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum SuffixClass {
    Inc,
    Llc,
    Ltd,
    Corp,
    Llp,
    Lp,
    Pllc,
    Pc,
    Co,
    Gmbh,
    None,
}

impl SuffixClass {
    /// Match a lowercased, dot-stripped token against the suffix table.
    pub fn from_token(token: &str) -> SuffixClass {
        match token {
            "inc" | "incorporated" => SuffixClass::Inc,
            "llc" => SuffixClass::Llc,
            "ltd" | "limited" => SuffixClass::Ltd,
            "corp" | "corporation" => SuffixClass::Corp,
            "llp" => SuffixClass::Llp,
            "lp" => SuffixClass::Lp,
            "pllc" => SuffixClass::Pllc,
            "pc" => SuffixClass::Pc,
            "co" | "company" => SuffixClass::Co,
            "gmbh" => SuffixClass::Gmbh,
            _ => SuffixClass::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SuffixClass::Inc => "INC",
            SuffixClass::Llc => "LLC",
            SuffixClass::Ltd => "LTD",
            SuffixClass::Corp => "CORP",
            SuffixClass::Llp => "LLP",
            SuffixClass::Lp => "LP",
            SuffixClass::Pllc => "PLLC",
            SuffixClass::Pc => "PC",
            SuffixClass::Co => "CO",
            SuffixClass::Gmbh => "GMBH",
            SuffixClass::None => "NONE",
        }
    }
}

impl FromStr for SuffixClass {
    type Err = CoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INC" => Ok(SuffixClass::Inc),
            "LLC" => Ok(SuffixClass::Llc),
            "LTD" => Ok(SuffixClass::Ltd),
            "CORP" => Ok(SuffixClass::Corp),
            "LLP" => Ok(SuffixClass::Llp),
            "LP" => Ok(SuffixClass::Lp),
            "PLLC" => Ok(SuffixClass::Pllc),
            "PC" => Ok(SuffixClass::Pc),
            "CO" => Ok(SuffixClass::Co),
            "GMBH" => Ok(SuffixClass::Gmbh),
            "NONE" => Ok(SuffixClass::None),
            other => Err(CoreError::InvalidId(other.to_string())),
        }
    }
}

impl fmt::Display for SuffixClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an alias candidate was extracted from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AliasSource {
    Semicolon,
    Numbered,
    Parentheses,
}

impl AliasSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AliasSource::Semicolon => "semicolon",
            AliasSource::Numbered => "numbered",
            AliasSource::Parentheses => "parentheses",
        }
    }
}

impl FromStr for AliasSource {
    type Err = CoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "semicolon" => Ok(AliasSource::Semicolon),
            "numbered" => Ok(AliasSource::Numbered),
            "parentheses" => Ok(AliasSource::Parentheses),
            other => Err(CoreError::InvalidId(other.to_string())),
        }
    }
}

/// Normalization output for one record's name.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NameNorm {
    pub name_raw: String,
    /// Lowercased, symbol-mapped, whitespace-collapsed form.
    pub name_base: String,
    /// `name_base` tokens minus the trailing legal suffix, space-joined.
    pub name_core: String,
    pub suffix_class: SuffixClass,
    pub has_parentheses: bool,
    pub has_semicolon: bool,
    pub has_multiple_names: bool,
    /// Canonical signature of numeric-style runs (`20 20`), empty when the
    /// name carries none. Feeds the numeric-style penalty.
    pub num_style_signature: String,
    pub alias_candidates: Vec<String>,
    /// Parallel to `alias_candidates`.
    pub alias_sources: Vec<AliasSource>,
}

impl NameNorm {
    /// Tokens of `name_core` (space-split; never empty strings).
    pub fn core_tokens(&self) -> impl Iterator<Item = &str> {
        self.name_core.split(' ').filter(|t| !t.is_empty())
    }
}

// ---------------------------- Candidate pairs ----------------------------

/// Which generator produced a candidate pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PairStrategy {
    ExactRaw,
    FirstToken,
    FirstTwoTokens,
    PrefixNgram,
    SortedBigrams,
}

impl PairStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PairStrategy::ExactRaw => "exact_raw",
            PairStrategy::FirstToken => "first_token",
            PairStrategy::FirstTwoTokens => "first_two_tokens",
            PairStrategy::PrefixNgram => "prefix_ngram",
            PairStrategy::SortedBigrams => "sorted_bigrams",
        }
    }
}

impl FromStr for PairStrategy {
    type Err = CoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact_raw" => Ok(PairStrategy::ExactRaw),
            "first_token" => Ok(PairStrategy::FirstToken),
            "first_two_tokens" => Ok(PairStrategy::FirstTwoTokens),
            "prefix_ngram" => Ok(PairStrategy::PrefixNgram),
            "sorted_bigrams" => Ok(PairStrategy::SortedBigrams),
            other => Err(CoreError::InvalidId(other.to_string())),
        }
    }
}

/// A scored candidate pair. Invariant: `id_a < id_b` lexicographically;
/// pairs are unique across strategies.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CandidatePair {
    pub id_a: AccountId,
    pub id_b: AccountId,
    /// Composite score in centipoints (0..=10_000).
    pub score: ScoreCenti,
    pub suffix_match: bool,
    /// Token-sort ratio, whole points 0..=100.
    pub ratio_name: u32,
    /// Token-set ratio, whole points 0..=100.
    pub ratio_set: u32,
    /// Jaccard over token sets in basis points (0..=10_000 ⇔ 0.0..=1.0).
    pub jaccard_bp: u32,
    pub block_key: String,
    pub strategy: PairStrategy,
    /// Score ≥ high threshold.
    pub high_conf: bool,
    /// The originating block hit a cap and was downsampled.
    pub pairs_capped: bool,
}

// -------------------------------- Groups --------------------------------

/// Why an edge was admitted during grouping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EdgeReason {
    /// `score ≥ high`
    High,
    /// `score ≥ medium` and the candidate shares a non-stop token with the
    /// component representative.
    MediumSharedToken,
}

impl EdgeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeReason::High => "edge>=high",
            EdgeReason::MediumSharedToken => "edge>=medium+shared_token",
        }
    }
}

// ----------------------------- Dispositions -----------------------------

/// Review outcome for one input row. Every row receives exactly one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Disposition {
    Keep,
    Update,
    Delete,
    Verify,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Keep => "Keep",
            Disposition::Update => "Update",
            Disposition::Delete => "Delete",
            Disposition::Verify => "Verify",
        }
    }
}

impl FromStr for Disposition {
    type Err = CoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Keep" => Ok(Disposition::Keep),
            "Update" => Ok(Disposition::Update),
            "Delete" => Ok(Disposition::Delete),
            "Verify" => Ok(Disposition::Verify),
            other => Err(CoreError::InvalidId(other.to_string())),
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One alias cross-link. Never alters group membership.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AliasMatch {
    pub record_id: AccountId,
    pub alias_text: String,
    pub source: AliasSource,
    pub matched_id: AccountId,
    pub matched_group_id: GroupId,
    pub score: ScoreCenti,
}

// ------------------------------ Run records ------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RunStatus {
    Running,
    Complete,
    Failed,
    Interrupted,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Complete => "complete",
            RunStatus::Failed => "failed",
            RunStatus::Interrupted => "interrupted",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RunType {
    Dev,
    Test,
    Prod,
}

impl FromStr for RunType {
    type Err = CoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dev" => Ok(RunType::Dev),
            "test" => Ok(RunType::Test),
            "prod" => Ok(RunType::Prod),
            other => Err(CoreError::InvalidId(other.to_string())),
        }
    }
}

/// Index entry for one end-to-end run. The run index owns these by value;
/// references between index and filesystem go by `run_id` string only.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RunRecord {
    pub run_id: RunId,
    /// 64-hex normalized content hash of the input file.
    pub input_hash: String,
    /// 64-hex canonical hash of the effective configuration.
    pub config_hash: String,
    pub input_path: String,
    pub config_path: String,
    pub created_utc: String,
    pub status: RunStatus,
    pub run_type: RunType,
}

// ------------------------------ Stage state ------------------------------

/// The fixed stage plan. Order is normative; reordering is rejected at
/// state load.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum StageName {
    Normalization,
    Filtering,
    ExactEquals,
    CandidateGeneration,
    Grouping,
    Survivorship,
    Disposition,
    AliasMatching,
    FinalOutput,
}

impl StageName {
    /// All stages in execution order.
    pub const ALL: [StageName; 9] = [
        StageName::Normalization,
        StageName::Filtering,
        StageName::ExactEquals,
        StageName::CandidateGeneration,
        StageName::Grouping,
        StageName::Survivorship,
        StageName::Disposition,
        StageName::AliasMatching,
        StageName::FinalOutput,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::Normalization => "normalization",
            StageName::Filtering => "filtering",
            StageName::ExactEquals => "exact_equals",
            StageName::CandidateGeneration => "candidate_generation",
            StageName::Grouping => "grouping",
            StageName::Survivorship => "survivorship",
            StageName::Disposition => "disposition",
            StageName::AliasMatching => "alias_matching",
            StageName::FinalOutput => "final_output",
        }
    }

    /// Position in the fixed plan (0-based).
    pub fn ordinal(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).unwrap_or(usize::MAX)
    }

    /// The stage after this one, if any.
    pub fn next(&self) -> Option<StageName> {
        Self::ALL.get(self.ordinal() + 1).copied()
    }
}

impl FromStr for StageName {
    type Err = CoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|n| n.as_str() == s)
            .copied()
            .ok_or_else(|| CoreError::UnknownStage(s.to_string()))
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum StageStatus {
    Pending,
    Running,
    Complete,
    Failed,
    Interrupted,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Pending => "pending",
            StageStatus::Running => "running",
            StageStatus::Complete => "complete",
            StageStatus::Failed => "failed",
            StageStatus::Interrupted => "interrupted",
        }
    }
}

/// Per-stage state row inside `pipeline_state.json`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StageRecord {
    pub name: StageName,
    pub status: StageStatus,
    pub start_utc: Option<String>,
    pub end_utc: Option<String>,
    /// Paths relative to the run directory.
    pub artifacts_written: Vec<String>,
    pub error: Option<String>,
}

impl StageRecord {
    pub fn pending(name: StageName) -> Self {
        StageRecord {
            name,
            status: StageStatus::Pending,
            start_utc: None,
            end_utc: None,
            artifacts_written: Vec::new(),
            error: None,
        }
    }
}

/// Whole-run orchestrator state, persisted atomically after every
/// transition.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PipelineState {
    pub input_hash: String,
    pub dag_version: String,
    pub cmdline: String,
    pub last_update_utc: String,
    pub stages: Vec<StageRecord>,
}

impl PipelineState {
    /// Fresh state: all stages pending, in canonical order.
    pub fn fresh(input_hash: &str, dag_version: &str, cmdline: &str, now_utc: &str) -> Self {
        PipelineState {
            input_hash: input_hash.to_string(),
            dag_version: dag_version.to_string(),
            cmdline: cmdline.to_string(),
            last_update_utc: now_utc.to_string(),
            stages: StageName::ALL.iter().map(|n| StageRecord::pending(*n)).collect(),
        }
    }

    /// Reject unknown stage sets or reordering relative to the fixed plan.
    pub fn validate_plan(&self) -> Result<(), CoreError> {
        if self.stages.len() != StageName::ALL.len() {
            return Err(CoreError::UnknownStage(format!(
                "expected {} stages, found {}",
                StageName::ALL.len(),
                self.stages.len()
            )));
        }
        for (rec, expect) in self.stages.iter().zip(StageName::ALL.iter()) {
            if rec.name != *expect {
                return Err(CoreError::UnknownStage(format!(
                    "stage order mismatch: found {} where {} expected",
                    rec.name, expect
                )));
            }
        }
        Ok(())
    }

    pub fn stage(&self, name: StageName) -> &StageRecord {
        &self.stages[name.ordinal()]
    }

    pub fn stage_mut(&mut self, name: StageName) -> &mut StageRecord {
        &mut self.stages[name.ordinal()]
    }
}

// ----------------------------- Resume reasons -----------------------------

/// Closed enumeration of reason codes for resume decisions. Every decision
/// is logged with exactly one of these.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ResumeReason {
    NoPreviousRun,
    SmartDetect,
    HashMismatch,
    ForceOverride,
    ManualOverride,
    NextStageReady,
    StateCorruptReset,
    ArtifactMissing,
}

impl ResumeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResumeReason::NoPreviousRun => "NO_PREVIOUS_RUN",
            ResumeReason::SmartDetect => "SMART_DETECT",
            ResumeReason::HashMismatch => "HASH_MISMATCH",
            ResumeReason::ForceOverride => "FORCE_OVERRIDE",
            ResumeReason::ManualOverride => "MANUAL_OVERRIDE",
            ResumeReason::NextStageReady => "NEXT_STAGE_READY",
            ResumeReason::StateCorruptReset => "STATE_CORRUPT_RESET",
            ResumeReason::ArtifactMissing => "ARTIFACT_MISSING",
        }
    }
}

impl fmt::Display for ResumeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ------------------------------ Block stats ------------------------------

/// Audit row for one block produced by the candidate generator.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BlockStat {
    pub strategy: PairStrategy,
    pub block_key: String,
    pub block_size: u32,
    pub pairs_emitted: u64,
    pub pairs_possible: u64,
    pub capped: bool,
    pub shards: u32,
}

// === Tests ===

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_plan_order() {
        assert_eq!(StageName::Normalization.ordinal(), 0);
        assert_eq!(StageName::FinalOutput.ordinal(), 8);
        assert_eq!(StageName::Grouping.next(), Some(StageName::Survivorship));
        assert_eq!(StageName::FinalOutput.next(), None);
        assert_eq!("exact_equals".parse::<StageName>().unwrap(), StageName::ExactEquals);
        assert!("exactequals".parse::<StageName>().is_err());
    }

    #[test]
    fn fresh_state_validates() {
        let st = PipelineState::fresh("0".repeat(64).as_str(), "v0", "dedupe run", "2026-07-31T00:00:00Z");
        assert!(st.validate_plan().is_ok());
        assert_eq!(st.stages.len(), 9);
        assert!(st.stages.iter().all(|s| s.status == StageStatus::Pending));
    }

    #[test]
    fn reordered_state_rejected() {
        let mut st = PipelineState::fresh("x", "v0", "", "2026-07-31T00:00:00Z");
        st.stages.swap(0, 1);
        assert!(st.validate_plan().is_err());
    }

    #[test]
    fn suffix_table() {
        assert_eq!(SuffixClass::from_token("llc"), SuffixClass::Llc);
        assert_eq!(SuffixClass::from_token("incorporated"), SuffixClass::Inc);
        assert_eq!(SuffixClass::from_token("acme"), SuffixClass::None);
        assert_eq!("GMBH".parse::<SuffixClass>().unwrap(), SuffixClass::Gmbh);
    }
}
