//! crates/dedupe_match/src/survivorship.rs
//! Primary selection by ranked tie-breakers, plus the per-group merge
//! preview. Selection is a deterministic lexicographic minimum over the
//! configured key order; `account_id` always terminates a tie even when
//! not listed.

use dedupe_core::entities::Record;
use dedupe_core::relationship::RelationshipRanks;

/// Outcome of primary selection for one group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrimaryChoice {
    /// Record index of the primary.
    pub primary: u32,
    /// Human-readable winning key value, e.g. `relationship_rank=10`.
    pub primary_reason: String,
    /// The key that actually discriminated (`none` for sole members).
    pub tie_breaker_applied: String,
}

/// Sort key for the `created_date` breaker: missing dates lose.
#[inline]
fn created_key(rec: &Record) -> (u8, &str) {
    match rec.created_utc.as_deref() {
        Some(d) if !d.is_empty() => (0, d),
        _ => (1, ""),
    }
}

/// Select the primary of `members` (record indices) by the configured
/// tie-breaker order. Keys come from the validated config set
/// (`relationship_rank`, `created_date`, `account_id`).
pub fn select_primary(
    members: &[u32],
    records: &[Record],
    ranks: &RelationshipRanks,
    tie_breakers: &[String],
) -> PrimaryChoice {
    debug_assert!(!members.is_empty());
    if members.len() == 1 {
        return PrimaryChoice {
            primary: members[0],
            primary_reason: "sole_member".to_string(),
            tie_breaker_applied: "none".to_string(),
        };
    }

    let mut survivors: Vec<u32> = members.to_vec();
    for key in tie_breakers {
        if survivors.len() == 1 {
            break;
        }
        let before = survivors.len();
        match key.as_str() {
            "relationship_rank" => {
                let best = survivors
                    .iter()
                    .map(|&i| ranks.rank_of(records[i as usize].relationship.as_deref()))
                    .min()
                    .unwrap_or(ranks.default_rank());
                survivors.retain(|&i| {
                    ranks.rank_of(records[i as usize].relationship.as_deref()) == best
                });
                if survivors.len() == 1 && before > 1 {
                    return PrimaryChoice {
                        primary: survivors[0],
                        primary_reason: format!("relationship_rank={best}"),
                        tie_breaker_applied: "relationship_rank".to_string(),
                    };
                }
            }
            "created_date" => {
                let best = survivors
                    .iter()
                    .map(|&i| created_key(&records[i as usize]))
                    .min()
                    .unwrap_or((1, ""));
                let best_owned = (best.0, best.1.to_string());
                survivors.retain(|&i| {
                    let k = created_key(&records[i as usize]);
                    (k.0, k.1.to_string()) == best_owned
                });
                if survivors.len() == 1 && before > 1 {
                    let reason = if best_owned.0 == 0 {
                        format!("created_date={}", best_owned.1)
                    } else {
                        "created_date=missing".to_string()
                    };
                    return PrimaryChoice {
                        primary: survivors[0],
                        primary_reason: reason,
                        tie_breaker_applied: "created_date".to_string(),
                    };
                }
            }
            "account_id" => {
                let winner = *survivors
                    .iter()
                    .min_by(|&&x, &&y| {
                        records[x as usize]
                            .account_id
                            .as_str()
                            .cmp(records[y as usize].account_id.as_str())
                    })
                    .unwrap_or(&survivors[0]);
                return PrimaryChoice {
                    primary: winner,
                    primary_reason: format!(
                        "account_id={}",
                        records[winner as usize].account_id
                    ),
                    tie_breaker_applied: "account_id".to_string(),
                };
            }
            _ => {} // validated upstream; unreachable in practice
        }
    }

    // Final fallback: smallest canonical id is always decisive.
    let winner = *survivors
        .iter()
        .min_by(|&&x, &&y| {
            records[x as usize].account_id.as_str().cmp(records[y as usize].account_id.as_str())
        })
        .unwrap_or(&survivors[0]);
    PrimaryChoice {
        primary: winner,
        primary_reason: format!("account_id={}", records[winner as usize].account_id),
        tie_breaker_applied: "account_id".to_string(),
    }
}

/// Field-level diff listing for a conflicted group, or `None` when every
/// compared field agrees. Generated only; never applied.
pub fn merge_preview(members: &[u32], records: &[Record]) -> Option<String> {
    fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
        let mut seen: Vec<&str> = Vec::new();
        for v in values {
            if !seen.contains(&v) {
                seen.push(v);
            }
        }
        seen
    }

    let mut parts: Vec<String> = Vec::new();

    let names = distinct(members.iter().map(|&i| records[i as usize].account_name.as_str()));
    if names.len() > 1 {
        parts.push(format!("account_name: {}", names.join(" | ")));
    }
    let dates = distinct(
        members.iter().map(|&i| records[i as usize].created_utc.as_deref().unwrap_or("")),
    );
    if dates.len() > 1 {
        parts.push(format!("created_date: {}", dates.join(" | ")));
    }
    let rels = distinct(
        members.iter().map(|&i| records[i as usize].relationship.as_deref().unwrap_or("")),
    );
    if rels.len() > 1 {
        parts.push(format!("relationship: {}", rels.join(" | ")));
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}

// === Tests ===

#[cfg(test)]
mod tests {
    use super::*;
    use dedupe_core::ids::AccountId;

    fn rec(id: &str, created: Option<&str>, rel: Option<&str>) -> Record {
        Record {
            account_id: AccountId::canonicalize(id).unwrap(),
            account_id_src: id.to_string(),
            account_name: "Acme".to_string(),
            created_utc: created.map(str::to_string),
            relationship: rel.map(str::to_string),
        }
    }

    fn keys() -> Vec<String> {
        vec!["relationship_rank".into(), "created_date".into(), "account_id".into()]
    }

    #[test]
    fn rank_wins_first() {
        let records = vec![
            rec("001aaaaaaaaaa01", Some("2020-01-01T00:00:00Z"), Some("prospect")),
            rec("001aaaaaaaaaa02", Some("2024-01-01T00:00:00Z"), Some("client")),
        ];
        let ranks = RelationshipRanks::builtin(60);
        let c = select_primary(&[0, 1], &records, &ranks, &keys());
        assert_eq!(c.primary, 1);
        assert_eq!(c.tie_breaker_applied, "relationship_rank");
        assert_eq!(c.primary_reason, "relationship_rank=10");
    }

    #[test]
    fn earliest_created_breaks_rank_tie() {
        let records = vec![
            rec("001aaaaaaaaaa01", Some("2024-01-01T00:00:00Z"), Some("client")),
            rec("001aaaaaaaaaa02", Some("2020-01-01T00:00:00Z"), Some("client")),
            rec("001aaaaaaaaaa03", None, Some("client")),
        ];
        let ranks = RelationshipRanks::builtin(60);
        let c = select_primary(&[0, 1, 2], &records, &ranks, &keys());
        assert_eq!(c.primary, 1);
        assert_eq!(c.tie_breaker_applied, "created_date");
    }

    #[test]
    fn id_breaks_full_tie() {
        let records = vec![
            rec("001aaaaaaaaaa02", Some("2020-01-01T00:00:00Z"), Some("client")),
            rec("001aaaaaaaaaa01", Some("2020-01-01T00:00:00Z"), Some("client")),
        ];
        let ranks = RelationshipRanks::builtin(60);
        let c = select_primary(&[0, 1], &records, &ranks, &keys());
        assert_eq!(c.primary, 1);
        assert_eq!(c.tie_breaker_applied, "account_id");
    }

    #[test]
    fn missing_dates_lose() {
        let records = vec![
            rec("001aaaaaaaaaa01", None, None),
            rec("001aaaaaaaaaa02", Some("2024-06-01T00:00:00Z"), None),
        ];
        let ranks = RelationshipRanks::builtin(60);
        let c = select_primary(&[0, 1], &records, &ranks, &keys());
        assert_eq!(c.primary, 1);
    }

    #[test]
    fn sole_member() {
        let records = vec![rec("001aaaaaaaaaa01", None, None)];
        let ranks = RelationshipRanks::builtin(60);
        let c = select_primary(&[0], &records, &ranks, &keys());
        assert_eq!(c.tie_breaker_applied, "none");
    }

    #[test]
    fn preview_lists_conflicts_only() {
        let mut records = vec![
            rec("001aaaaaaaaaa01", Some("2020-01-01T00:00:00Z"), Some("client")),
            rec("001aaaaaaaaaa02", Some("2021-01-01T00:00:00Z"), Some("client")),
        ];
        let p = merge_preview(&[0, 1], &records).unwrap();
        assert!(p.contains("created_date: 2020-01-01T00:00:00Z | 2021-01-01T00:00:00Z"));
        assert!(!p.contains("relationship:"));

        records[1].created_utc = records[0].created_utc.clone();
        assert_eq!(merge_preview(&[0, 1], &records), None);
    }
}
