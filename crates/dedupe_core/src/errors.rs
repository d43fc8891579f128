//! crates/dedupe_core/src/errors.rs
//! Minimal error set for core-domain validation & parsing. No deps, no I/O.

use core::fmt;

/// Errors surfaced by core-domain validation and parsing.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CoreError {
    /// An identifier failed its shape check (length/charset).
    InvalidId(String),
    /// A Salesforce-style ID was neither 15 nor 18 chars of [A-Za-z0-9].
    IdFormat { value: String },
    /// A timestamp string is not strict `YYYY-MM-DDTHH:MM:SSZ`.
    InvalidTimestamp(String),
    /// A configuration value left its allowed domain.
    DomainOutOfRange(&'static str),
    /// A stage name is not part of the fixed plan.
    UnknownStage(String),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::InvalidId(s) => write!(f, "invalid id: {s}"),
            CoreError::IdFormat { value } => {
                write!(f, "account id must be 15 or 18 alphanumeric chars: {value:?}")
            }
            CoreError::InvalidTimestamp(s) => write!(f, "invalid timestamp: {s}"),
            CoreError::DomainOutOfRange(k) => write!(f, "domain out of range: {k}"),
            CoreError::UnknownStage(s) => write!(f, "unknown stage: {s}"),
        }
    }
}

impl std::error::Error for CoreError {}

/// Strict check for `YYYY-MM-DDTHH:MM:SSZ` (length 20, UTC only).
pub fn is_ts_utc_z(s: &str) -> bool {
    let b = s.as_bytes();
    if b.len() != 20 {
        return false;
    }
    b.iter().enumerate().all(|(i, c)| match i {
        4 | 7 => *c == b'-',
        10 => *c == b'T',
        13 | 16 => *c == b':',
        19 => *c == b'Z',
        _ => c.is_ascii_digit(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_shape() {
        assert!(is_ts_utc_z("2026-07-31T12:00:00Z"));
        assert!(!is_ts_utc_z("2026-07-31 12:00:00Z"));
        assert!(!is_ts_utc_z("2026-07-31T12:00:00+00:00"));
        assert!(!is_ts_utc_z(""));
    }
}
