//! crates/dedupe_core/src/ids.rs
//! Canonical record/output identifiers. Deterministic, ASCII-only, strict
//! shapes; no I/O.
//!
//! - `AccountId`: canonical 18-char Salesforce-style ID. 15-char inputs are
//!   extended with the three-char Base32 suffix; 18-char inputs validate and
//!   pass through (idempotent).
//! - `GroupId`: first 10 lowercase hex chars of the membership digest.
//! - `RunId`: `{input_hash[:8]}_{config_hash[:8]}_{YYYYMMDDHHMMSS}`.

use core::fmt;
use core::str::FromStr;

use crate::errors::CoreError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Base32 alphabet used by the Salesforce case-safety suffix.
const SUFFIX_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ012345";

#[inline]
fn is_alnum(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric())
}

#[inline]
fn is_lower_hex_len(s: &str, n: usize) -> bool {
    s.len() == n && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Compute the three-char case-safety suffix for a 15-char alphanumeric ID.
///
/// Each 5-char block maps to one suffix char: bit `i` of the block value is
/// set iff the block's `i`-th char is an uppercase ASCII letter (bit 0 =
/// first char of the block).
fn case_suffix(alnum15: &str) -> [u8; 3] {
    debug_assert_eq!(alnum15.len(), 15);
    let b = alnum15.as_bytes();
    let mut out = [0u8; 3];
    for (block, slot) in out.iter_mut().enumerate() {
        let mut flags: u8 = 0;
        for i in 0..5 {
            if b[block * 5 + i].is_ascii_uppercase() {
                flags |= 1 << i;
            }
        }
        *slot = SUFFIX_ALPHABET[flags as usize];
    }
    out
}

/// Canonical 18-char Salesforce-style record identifier.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct AccountId(String);

impl AccountId {
    /// Canonicalize a raw ID: 15-char values gain the checksum suffix,
    /// 18-char values pass through after a charset check. Any other length
    /// (or non-alphanumeric content) is an `IdFormat` error carrying the
    /// offending value.
    pub fn canonicalize(raw: &str) -> Result<Self, CoreError> {
        let t = raw.trim();
        if !is_alnum(t) {
            return Err(CoreError::IdFormat { value: raw.to_string() });
        }
        match t.len() {
            15 => {
                let suffix = case_suffix(t);
                let mut s = String::with_capacity(18);
                s.push_str(t);
                s.push(suffix[0] as char);
                s.push(suffix[1] as char);
                s.push(suffix[2] as char);
                Ok(AccountId(s))
            }
            18 => Ok(AccountId(t.to_string())),
            _ => Err(CoreError::IdFormat { value: raw.to_string() }),
        }
    }

    /// Wrap a 15-char alphanumeric stem (used by deterministic ID
    /// generation) and extend it to the canonical 18-char form.
    pub fn from_alnum15(stem: &str) -> Result<Self, CoreError> {
        if stem.len() != 15 || !is_alnum(stem) {
            return Err(CoreError::IdFormat { value: stem.to_string() });
        }
        Self::canonicalize(stem)
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AccountId {
    type Err = CoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == 18 && is_alnum(s) {
            Ok(AccountId(s.to_string()))
        } else {
            Err(CoreError::IdFormat { value: s.to_string() })
        }
    }
}

/// 10-hex lowercase stable group identifier.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct GroupId(String);

impl GroupId {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for GroupId {
    type Err = CoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if is_lower_hex_len(s, 10) {
            Ok(GroupId(s.to_string()))
        } else {
            Err(CoreError::InvalidId(s.to_string()))
        }
    }
}

/// `{input_hash[:8]}_{config_hash[:8]}_{YYYYMMDDHHMMSS}`
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct RunId(String);

impl RunId {
    /// Assemble a run ID from its three parts. `stamp14` is the compact UTC
    /// timestamp `YYYYMMDDHHMMSS` supplied by the caller (core holds no
    /// clock).
    pub fn new(input_hash8: &str, config_hash8: &str, stamp14: &str) -> Result<Self, CoreError> {
        if !is_lower_hex_len(input_hash8, 8) || !is_lower_hex_len(config_hash8, 8) {
            return Err(CoreError::InvalidId(format!("{input_hash8}_{config_hash8}")));
        }
        if stamp14.len() != 14 || !stamp14.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CoreError::InvalidTimestamp(stamp14.to_string()));
        }
        Ok(RunId(format!("{input_hash8}_{config_hash8}_{stamp14}")))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The 8-hex input-hash prefix embedded in this run ID.
    pub fn input_hash8(&self) -> &str {
        &self.0[..8]
    }

    /// The 8-hex config-hash prefix embedded in this run ID.
    pub fn config_hash8(&self) -> &str {
        &self.0[9..17]
    }
}

impl fmt::Display for RunId {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RunId {
    type Err = CoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('_').collect();
        if parts.len() != 3 {
            return Err(CoreError::InvalidId(s.to_string()));
        }
        RunId::new(parts[0], parts[1], parts[2])
    }
}

// === Tests ===
