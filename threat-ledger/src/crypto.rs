//! Hashing and canonical serialization
//!
//! This module provides:
//! - Canonical JSON (compact, keys sorted at every level)
//! - SHA-256 hex digests for transactions and blocks
//! - The difficulty predicate used by sealing

use crate::types::{Block, Transaction, TRANSACTION_ID_LEN};
use crate::Result;
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Hash arbitrary bytes using SHA-256
pub fn hash_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Lowercase hex SHA-256 of a string
pub fn sha256_hex(data: &str) -> String {
    hex::encode(hash_bytes(data.as_bytes()))
}

/// Canonical JSON text of any serializable value
///
/// Byte-identical for equal content regardless of field insertion order.
pub fn canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let value = sorted(serde_json::to_value(value)?);
    Ok(serde_json::to_string(&value)?)
}

// Rebuild objects in key order; holds whether or not serde_json preserves
// insertion order.
fn sorted(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut out = Map::new();
            for (key, value) in entries {
                out.insert(key, sorted(value));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sorted).collect()),
        other => other,
    }
}

/// Transaction id: truncated hex SHA-256 of the canonical record
///
/// Must be called before the id is attached; an attached id would be part
/// of the hashed content.
pub fn transaction_id(tx: &Transaction) -> Result<String> {
    let mut digest = sha256_hex(&canonical_json(tx)?);
    digest.truncate(TRANSACTION_ID_LEN);
    Ok(digest)
}

/// Digest satisfies the proof-of-work predicate
pub fn meets_difficulty(digest: &str, difficulty: usize) -> bool {
    digest.len() >= difficulty && digest.bytes().take(difficulty).all(|b| b == b'0')
}

/// Canonical block encoding with the nonce left open
///
/// Block fields are hashed as the canonical JSON object
/// `{"index","nonce","previous_digest","timestamp","transactions"}`. Keys sort
/// so the nonce falls between a fixed prefix and a fixed suffix; both are
/// encoded once and the prefix is absorbed into a hasher that every attempt
/// clones.
#[derive(Clone)]
pub struct DigestTemplate {
    prefix_state: Sha256,
    suffix: String,
}

impl std::fmt::Debug for DigestTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigestTemplate")
            .field("suffix_len", &self.suffix.len())
            .finish()
    }
}

impl DigestTemplate {
    /// Template for a block's fixed fields (its nonce and digest are ignored)
    pub fn for_block(block: &Block) -> Result<Self> {
        let prefix = format!("{{\"index\":{},\"nonce\":", block.index);
        let suffix = format!(
            ",\"previous_digest\":{},\"timestamp\":{},\"transactions\":{}}}",
            serde_json::to_string(&block.previous_digest)?,
            canonical_json(&block.timestamp)?,
            canonical_json(&block.transactions)?,
        );

        let mut prefix_state = Sha256::new();
        prefix_state.update(prefix.as_bytes());

        Ok(Self {
            prefix_state,
            suffix,
        })
    }

    /// Hex digest for one nonce
    pub fn digest(&self, nonce: u64) -> String {
        let mut hasher = self.prefix_state.clone();
        hasher.update(nonce.to_string().as_bytes());
        hasher.update(self.suffix.as_bytes());
        hex::encode(hasher.finalize())
    }
}
