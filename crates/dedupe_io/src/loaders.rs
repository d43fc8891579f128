//! crates/dedupe_io/src/loaders.rs
//! Small external inputs: the engine config (JSON mapping), the
//! relationship → rank CSV, and the manual blacklist term list.

use crate::IoError;

use std::collections::BTreeMap;
use std::path::Path;

use dedupe_core::config::EngineConfig;
use dedupe_core::relationship::RelationshipRanks;

/// Load and validate the engine config. A missing `path` (None) yields
/// defaults; unknown keys and domain violations are fatal before any
/// stage runs.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig, IoError> {
    let config: EngineConfig = match path {
        None => EngineConfig::default(),
        Some(p) => {
            let bytes = std::fs::read(p).map_err(IoError::Read)?;
            serde_json::from_slice(&bytes)?
        }
    };
    config
        .validate_domains()
        .map_err(|e| IoError::Schema(format!("config: {e}")))?;
    Ok(config)
}

/// Load the `relationship,rank` CSV; falls back to the built-in table when
/// no path is configured.
pub fn load_relationship_ranks(
    path: Option<&Path>,
    default_rank: u32,
) -> Result<RelationshipRanks, IoError> {
    let Some(p) = path else {
        return Ok(RelationshipRanks::builtin(default_rank));
    };
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(p)?;
    let headers = reader.headers()?.clone();
    let rel_idx = headers
        .iter()
        .position(|h| h == "relationship")
        .ok_or_else(|| IoError::Schema("relationship rank csv: missing column relationship".into()))?;
    let rank_idx = headers
        .iter()
        .position(|h| h == "rank")
        .ok_or_else(|| IoError::Schema("relationship rank csv: missing column rank".into()))?;

    let mut map = BTreeMap::new();
    for rec in reader.records() {
        let rec = rec?;
        let key = rec.get(rel_idx).unwrap_or("").trim().to_lowercase();
        if key.is_empty() {
            continue;
        }
        let rank: u32 = rec
            .get(rank_idx)
            .unwrap_or("")
            .trim()
            .parse()
            .map_err(|_| IoError::Schema(format!("relationship rank csv: bad rank for {key:?}")))?;
        map.insert(key, rank);
    }
    Ok(RelationshipRanks::new(map, default_rank))
}

/// Load manual blacklist terms: one per line, `#` comments and blank
/// lines skipped. A missing configured file is a hard error (the operator
/// pointed at it); no configured file means no manual terms.
pub fn load_manual_blacklist(path: Option<&Path>) -> Result<Vec<String>, IoError> {
    let Some(p) = path else {
        return Ok(Vec::new());
    };
    let text = std::fs::read_to_string(p).map_err(IoError::Read)?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}

// === Tests ===

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_when_unset() {
        let cfg = load_config(None).unwrap();
        assert_eq!(cfg, EngineConfig::default());
    }

    #[test]
    fn config_rejects_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("config.json");
        std::fs::write(&p, br#"{"similarity": {"hgih": 90.0}}"#).unwrap();
        assert!(load_config(Some(&p)).is_err());
    }

    #[test]
    fn config_rejects_bad_domains() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("config.json");
        std::fs::write(&p, br#"{"similarity": {"high": 80.0, "medium": 90.0}}"#).unwrap();
        assert!(matches!(load_config(Some(&p)).unwrap_err(), IoError::Schema(_)));
    }

    #[test]
    fn relationship_csv_loads() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("ranks.csv");
        std::fs::write(&p, "relationship,rank\nClient,5\nVendor,35\n").unwrap();
        let ranks = load_relationship_ranks(Some(&p), 60).unwrap();
        assert_eq!(ranks.rank_of(Some("client")), 5);
        assert_eq!(ranks.rank_of(Some("vendor")), 35);
        assert_eq!(ranks.rank_of(Some("other")), 60);
    }

    #[test]
    fn manual_blacklist_lines() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("blacklist.txt");
        std::fs::write(&p, "# comment\nacme test corp\n\n  spam co  \n").unwrap();
        let terms = load_manual_blacklist(Some(&p)).unwrap();
        assert_eq!(terms, vec!["acme test corp".to_string(), "spam co".to_string()]);
    }
}
