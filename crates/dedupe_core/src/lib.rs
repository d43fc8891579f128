//! dedupe_core — Core types, domains, ordering helpers, and the seeded sampler.
//!
//! This crate is **I/O-free**. It defines stable types/APIs used across the
//! engine (`dedupe_io`, `dedupe_match`, `dedupe_pipeline`, `dedupe_report`,
//! `dedupe_cli`).
//!
//! - Record identifiers: canonical 18-char Salesforce-style `AccountId`
//! - Output identifiers: `GroupId` (10-hex), `RunId` (hash-prefixed + stamp)
//! - Engine entities: records, normalized names, candidate pairs, groups,
//!   dispositions, run records, stage state
//! - Config domains (`EngineConfig`) with validation before any stage runs
//! - Deterministic ordering helpers and integer-centipoint score domain
//! - Seeded sampler (ChaCha20) for **cap downsampling only**
//!
//! Serialization derives are gated behind the `serde` feature.

pub mod config;
pub mod determinism;
pub mod entities;
pub mod errors;
pub mod ids;
pub mod relationship;
pub mod sampler;
pub mod score;

pub use config::EngineConfig;
pub use entities::{CandidatePair, Disposition, NameNorm, Record, SuffixClass};
pub use errors::CoreError;
pub use ids::{AccountId, GroupId, RunId};
pub use score::ScoreCenti;
