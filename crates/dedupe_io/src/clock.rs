//! crates/dedupe_io/src/clock.rs
//! UTC timestamp formatting. The two shapes used across the engine:
//! RFC3339 seconds (`2026-07-31T12:00:00Z`) for state/index records and
//! the compact `YYYYMMDDHHMMSS` stamp embedded in run IDs.

use chrono::{DateTime, SecondsFormat, Utc};

/// Current UTC time as strict `YYYY-MM-DDTHH:MM:SSZ`.
pub fn now_utc() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Current UTC time as the compact 14-digit run-ID stamp.
pub fn now_stamp14() -> String {
    Utc::now().format("%Y%m%d%H%M%S").to_string()
}

/// Format an arbitrary instant the way `now_utc` does (test seam).
pub fn format_utc(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shapes() {
        let ts = now_utc();
        assert_eq!(ts.len(), 20);
        assert!(ts.ends_with('Z'));
        let stamp = now_stamp14();
        assert_eq!(stamp.len(), 14);
        assert!(stamp.bytes().all(|b| b.is_ascii_digit()));
    }
}
