//! crates/dedupe_io/src/hasher.rs
//! SHA-256 hashing over normalized content and canonical JSON, the SHA-1
//! group-ID digest, and deterministic account-ID generation.
//!
//! Two hashing domains:
//! 1. Content/config hashes (SHA-256, lowercase 64-hex) feed run identity
//!    and the resume hash guard.
//! 2. The stable group ID (first 10 hex of SHA-1 over the canonical
//!    membership document) depends only on sorted member IDs + the config
//!    hash, never on processing order.

use crate::canonical_json::to_canonical_bytes;
use crate::IoError;

use core::str::FromStr;
use std::io::Read;
use std::path::Path;

use dedupe_core::ids::{AccountId, GroupId};
use digest::Digest;
use serde::Serialize;
use sha1::Sha1;
use sha2::Sha256;

/// Lowercase 64-hex SHA-256 of raw bytes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Streaming SHA-256 for any reader; returns lowercase 64-hex.
pub fn sha256_stream<R: Read>(reader: &mut R) -> Result<String, IoError> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf).map_err(IoError::Read)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Normalize content for hashing: CRLF → LF and trailing newlines at EOF
/// stripped. Any other byte change — a trailing space included — changes
/// the hash and trips the resume guard.
pub fn normalize_content(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\r' && bytes.get(i + 1) == Some(&b'\n') {
            out.push(b'\n');
            i += 2;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    while out.last() == Some(&b'\n') {
        out.pop();
    }
    out
}

/// Input hash: SHA-256 over the normalized file content.
pub fn input_hash<P: AsRef<Path>>(path: P) -> Result<String, IoError> {
    let bytes = std::fs::read(path).map_err(IoError::Read)?;
    Ok(sha256_hex(&normalize_content(&bytes)))
}

/// Config hash: SHA-256 over the canonical serialization of the settings
/// (sorted keys, compact). Stable across platforms.
pub fn config_hash<T: Serialize>(config: &T) -> Result<String, IoError> {
    Ok(sha256_hex(&to_canonical_bytes(config)?))
}

/// Stable group ID: first 10 hex chars of SHA-1 over the canonical JSON of
/// `{config_hash, members: sorted}`.
pub fn group_id(members_sorted: &[AccountId], config_hash: &str) -> Result<GroupId, IoError> {
    debug_assert!(members_sorted.windows(2).all(|w| w[0].as_str() <= w[1].as_str()));
    let doc = serde_json::json!({
        "config_hash": config_hash,
        "members": members_sorted.iter().map(AccountId::as_str).collect::<Vec<_>>(),
    });
    let bytes = to_canonical_bytes(&doc)?;
    let mut hasher = Sha1::new();
    hasher.update(&bytes);
    let full = hex::encode(hasher.finalize());
    GroupId::from_str(&full[..10]).map_err(|e| IoError::Hash(e.to_string()))
}

/// Short prefix of a lowercase hex digest (1..=len).
pub fn short_hex(full_hex: &str, len: usize) -> Result<String, IoError> {
    if len == 0 || len > full_hex.len() {
        return Err(IoError::Hash("short_hex length out of range".into()));
    }
    if !full_hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        return Err(IoError::Hash("short_hex expects lowercase hex".into()));
    }
    Ok(full_hex[..len].to_string())
}

/// Deterministic account ID for rows that arrive without one: a 15-char
/// alphanumeric stem derived from the input hash and the row ordinal,
/// extended to the canonical 18-char form. The `G` prefix keeps generated
/// IDs recognizable in review output.
pub fn generate_account_id(input_hash: &str, ordinal: u64) -> Result<AccountId, IoError> {
    let seed = format!("{input_hash}:{ordinal}");
    let digest = sha256_hex(seed.as_bytes());
    let stem = format!("G{}", &digest[..14]);
    AccountId::from_alnum15(&stem).map_err(|e| IoError::Hash(e.to_string()))
}

// === Tests ===

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crlf_normalizes_trailing_space_does_not() {
        let unix = b"name\nAcme Inc\n";
        let dos = b"name\r\nAcme Inc\r\n";
        assert_eq!(sha256_hex(&normalize_content(unix)), sha256_hex(&normalize_content(dos)));

        let spaced = b"name\nAcme Inc \n";
        assert_ne!(sha256_hex(&normalize_content(unix)), sha256_hex(&normalize_content(spaced)));
    }

    #[test]
    fn group_id_depends_only_on_membership_and_config() {
        let a = AccountId::canonicalize("001aaaaaaaaaa01").unwrap();
        let b = AccountId::canonicalize("001aaaaaaaaaa02").unwrap();
        let g1 = group_id(&[a.clone(), b.clone()], "cfg1").unwrap();
        let g2 = group_id(&[a.clone(), b.clone()], "cfg1").unwrap();
        assert_eq!(g1, g2);
        let g3 = group_id(&[a.clone(), b.clone()], "cfg2").unwrap();
        assert_ne!(g1, g3);
        let c = AccountId::canonicalize("001aaaaaaaaaa03").unwrap();
        let g4 = group_id(&[a, b, c], "cfg1").unwrap();
        assert_ne!(g1, g4);
        assert_eq!(g1.as_str().len(), 10);
    }

    #[test]
    fn config_hash_ignores_key_order() {
        let v1 = serde_json::json!({"similarity": {"high": 92.0}, "run": {"keep_runs": 10}});
        let v2 = serde_json::json!({"run": {"keep_runs": 10}, "similarity": {"high": 92.0}});
        assert_eq!(config_hash(&v1).unwrap(), config_hash(&v2).unwrap());
    }

    #[test]
    fn generated_ids_are_canonical_and_stable() {
        let h = "ab".repeat(32);
        let id1 = generate_account_id(&h, 0).unwrap();
        let id2 = generate_account_id(&h, 0).unwrap();
        let id3 = generate_account_id(&h, 1).unwrap();
        assert_eq!(id1, id2);
        assert_ne!(id1, id3);
        assert_eq!(id1.as_str().len(), 18);
        assert!(id1.as_str().starts_with('G'));
        // Canonicalization is idempotent on the generated form.
        assert_eq!(AccountId::canonicalize(id1.as_str()).unwrap(), id1);
    }

    #[test]
    fn stream_matches_oneshot() {
        let data = b"hello hashing world";
        let mut cur = std::io::Cursor::new(&data[..]);
        assert_eq!(sha256_stream(&mut cur).unwrap(), sha256_hex(data));
    }
}
