//! dedupe_match — Algorithm layer of the dedupe engine.
//!
//! Pure functions over `dedupe_core` types: name normalization and alias
//! extraction, noise filtering, the exact-equals fast path, candidate
//! blocking, similarity scoring, Union-Find grouping with edge-gating and
//! the canopy bound, survivorship selection, and disposition
//! classification.
//!
//! No I/O, no clock, no logging; everything here is deterministic and unit
//! testable in isolation. Orchestration and artifact handling live in
//! `dedupe_pipeline` / `dedupe_io`.

pub mod alias;
pub mod blocking;
pub mod disposition;
pub mod exact;
pub mod filter;
pub mod grouping;
pub mod normalize;
pub mod similarity;
pub mod survivorship;

pub use blocking::{generate_pairs, PairSeed};
pub use disposition::BlacklistRegistry;
pub use grouping::{group_components, GroupingOutcome};
pub use normalize::normalize_name;
pub use similarity::score_pair;
