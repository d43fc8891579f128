//! crates/dedupe_core/src/relationship.rs
//! Relationship → rank table used by survivorship. Owned by value and
//! passed by immutable reference into selection; the CSV loader lives in
//! `dedupe_io`.

use std::collections::BTreeMap;

/// Rank table. Lower rank wins the first survivorship tie-breaker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelationshipRanks {
    map: BTreeMap<String, u32>,
    default_rank: u32,
}

impl RelationshipRanks {
    pub fn new(map: BTreeMap<String, u32>, default_rank: u32) -> Self {
        RelationshipRanks { map, default_rank }
    }

    /// Built-in table used when no CSV override is configured.
    pub fn builtin(default_rank: u32) -> Self {
        let mut map = BTreeMap::new();
        for (k, v) in [
            ("client", 10),
            ("customer", 10),
            ("active client", 10),
            ("partner", 20),
            ("vendor", 30),
            ("supplier", 30),
            ("prospect", 40),
            ("lead", 50),
            ("former client", 55),
        ] {
            map.insert(k.to_string(), v);
        }
        RelationshipRanks { map, default_rank }
    }

    /// Rank for a raw relationship value. Keys are matched lowercased and
    /// trimmed; missing or empty values take the default rank.
    pub fn rank_of(&self, relationship: Option<&str>) -> u32 {
        match relationship {
            None => self.default_rank,
            Some(raw) => {
                let key = raw.trim().to_lowercase();
                if key.is_empty() {
                    self.default_rank
                } else {
                    *self.map.get(&key).unwrap_or(&self.default_rank)
                }
            }
        }
    }

    pub fn default_rank(&self) -> u32 {
        self.default_rank
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_lookup_and_default() {
        let ranks = RelationshipRanks::builtin(60);
        assert_eq!(ranks.rank_of(Some("Client")), 10);
        assert_eq!(ranks.rank_of(Some("  vendor ")), 30);
        assert_eq!(ranks.rank_of(Some("mystery")), 60);
        assert_eq!(ranks.rank_of(Some("")), 60);
        assert_eq!(ranks.rank_of(None), 60);
    }

    #[test]
    fn custom_default_rank() {
        let ranks = RelationshipRanks::new(BTreeMap::new(), 99);
        assert_eq!(ranks.rank_of(Some("anything")), 99);
    }
}
