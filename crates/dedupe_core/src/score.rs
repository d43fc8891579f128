//! crates/dedupe_core/src/score.rs
//! Integer-first score domain. Similarity scores live in **centipoints**
//! (0..=10_000 ⇔ 0.00..=100.00) so composite arithmetic, penalties, and
//! threshold comparisons stay exact and bit-stable across platforms.

use crate::errors::CoreError;

/// A similarity score in centipoints (1/100 of a point).
pub type ScoreCenti = u32;

/// Upper bound of the score domain (100.00).
pub const SCORE_MAX: ScoreCenti = 10_000;

/// Convert a configured threshold in points (e.g. `92.0`) to centipoints,
/// rounding half away from zero. Out-of-domain values are rejected.
pub fn points_to_centi(points: f64) -> Result<ScoreCenti, CoreError> {
    if !points.is_finite() || !(0.0..=100.0).contains(&points) {
        return Err(CoreError::DomainOutOfRange("score threshold"));
    }
    Ok((points * 100.0).round() as ScoreCenti)
}

/// Clamp a signed centipoint value into the score domain.
#[inline]
pub fn clamp_centi(raw: i64) -> ScoreCenti {
    raw.clamp(0, SCORE_MAX as i64) as ScoreCenti
}

/// Render a centipoint score as a fixed two-decimal string (`"92.00"`).
/// Used by artifact writers; no float formatting involved.
pub fn centi_to_string(score: ScoreCenti) -> String {
    format!("{}.{:02}", score / 100, score % 100)
}

/// Parse a two-decimal score string back into centipoints.
pub fn centi_from_string(s: &str) -> Result<ScoreCenti, CoreError> {
    let err = || CoreError::DomainOutOfRange("score string");
    let (whole, frac) = s.split_once('.').ok_or_else(err)?;
    if frac.len() != 2 || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(err());
    }
    let w: u32 = whole.parse().map_err(|_| err())?;
    let f: u32 = frac.parse().map_err(|_| err())?;
    let v = w * 100 + f;
    if v > SCORE_MAX {
        return Err(err());
    }
    Ok(v)
}
