//! Core types for the ledger
//!
//! All types are designed for:
//! - Deterministic serialization (canonical JSON, see [`crate::crypto`])
//! - A typed core record with an open extension map for collaborator fields
//! - Verbatim round-trips through the persisted artifact

use crate::crypto;
use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Previous digest stored in the genesis block
pub const GENESIS_PREVIOUS_DIGEST: &str = "0";

/// Length of a transaction id in hex characters
pub const TRANSACTION_ID_LEN: usize = 16;

/// Current time as float seconds since the Unix epoch (microsecond precision)
pub fn now_timestamp() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// A record stored in a block
///
/// Serialized with a `kind` tag (`attack` or `reward`). Stored entries that
/// no longer decode as either kind load as [`Transaction::Unrecognized`] and
/// are hashed verbatim, so an edited `kind` or core field surfaces as a
/// digest mismatch instead of an unreadable artifact.
#[derive(Debug, Clone, PartialEq)]
pub enum Transaction {
    /// Security event reported by a sensor
    Attack(AttackRecord),
    /// Per-block reward emitted by the sealer
    Reward(RewardRecord),
    /// Stored entry that matches neither kind, kept as found
    Unrecognized(Value),
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum TaggedRef<'a> {
    Attack(&'a AttackRecord),
    Reward(&'a RewardRecord),
}

#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Tagged {
    Attack(AttackRecord),
    Reward(RewardRecord),
}

impl Serialize for Transaction {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Transaction::Attack(record) => TaggedRef::Attack(record).serialize(serializer),
            Transaction::Reward(reward) => TaggedRef::Reward(reward).serialize(serializer),
            Transaction::Unrecognized(value) => value.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Transaction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(Transaction::from_stored(Value::deserialize(deserializer)?))
    }
}

impl Transaction {
    /// Normalize a raw sensor record and assign its transaction id
    ///
    /// The id is derived from the canonical serialization of the record
    /// before the id field exists, so it depends only on the content at
    /// insertion.
    pub fn attack(record: Map<String, Value>) -> Result<Self> {
        let record = AttackRecord::from_record(record, now_timestamp())?;
        let mut tx = Transaction::Attack(record);
        let id = crypto::transaction_id(&tx)?;
        if let Transaction::Attack(record) = &mut tx {
            record.transaction_id = id;
        }
        Ok(tx)
    }

    /// Reward transaction stamped with the current time
    pub fn reward(to: impl Into<String>, amount: u64) -> Self {
        Transaction::Reward(RewardRecord::new(to, amount))
    }

    /// Decode a persisted entry, keeping it verbatim when it is not a known kind
    pub fn from_stored(value: Value) -> Self {
        match serde_json::from_value::<Tagged>(value.clone()) {
            Ok(Tagged::Attack(record)) => Transaction::Attack(record),
            Ok(Tagged::Reward(reward)) => Transaction::Reward(reward),
            Err(e) => {
                tracing::warn!(error = %e, "Stored transaction does not decode, keeping it verbatim");
                Transaction::Unrecognized(value)
            }
        }
    }

    /// Kind label as persisted
    pub fn kind(&self) -> TransactionKind {
        match self {
            Transaction::Attack(_) => TransactionKind::Attack,
            Transaction::Reward(_) => TransactionKind::Reward,
            Transaction::Unrecognized(_) => TransactionKind::Unrecognized,
        }
    }

    /// Event record, if this is an event-kind transaction
    pub fn as_attack(&self) -> Option<&AttackRecord> {
        match self {
            Transaction::Attack(record) => Some(record),
            _ => None,
        }
    }

    /// Insertion or emission time
    pub fn timestamp(&self) -> Option<f64> {
        match self {
            Transaction::Attack(record) => Some(record.timestamp),
            Transaction::Reward(reward) => Some(reward.timestamp),
            Transaction::Unrecognized(value) => value.get("timestamp").and_then(Value::as_f64),
        }
    }

    /// External reference handle (event-kind only)
    pub fn transaction_id(&self) -> Option<&str> {
        self.as_attack().map(|record| record.transaction_id.as_str())
    }

    /// JSON object form, as used by criteria search
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Transaction kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    /// Security event
    Attack,
    /// Sealer reward
    Reward,
    /// Undecodable stored entry
    Unrecognized,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::Attack => write!(f, "attack"),
            TransactionKind::Reward => write!(f, "reward"),
            TransactionKind::Unrecognized => write!(f, "unrecognized"),
        }
    }
}

/// Normalized security event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackRecord {
    /// Originating address or sensor-assigned source handle
    pub source_identifier: String,

    /// Targeted port, if the sensor reported one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_port: Option<u16>,

    /// Event category (e.g. `ssh_bruteforce`, `sql_injection`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attack_type: Option<String>,

    /// Severity label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,

    /// Event time (float seconds since epoch)
    pub timestamp: f64,

    /// Truncated digest of the record at insertion; empty until assigned
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub transaction_id: String,

    /// Collaborator-supplied fields (details, geolocation, ...)
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

impl AttackRecord {
    /// Normalize a raw sensor record
    ///
    /// Core fields are lifted out of the mapping and type-checked; every other
    /// key is kept verbatim in `attributes`. `source_ip` is accepted as an
    /// alias of `source_identifier`. Any `transaction_id` supplied by the
    /// caller is discarded: ids are assigned by the ledger only.
    pub fn from_record(mut record: Map<String, Value>, now: f64) -> Result<Self> {
        match record.remove("kind") {
            None => {}
            Some(Value::String(kind)) if kind == "attack" => {}
            Some(other) => {
                return Err(Error::InvalidEvent(format!(
                    "unsupported kind for ingestion: {}",
                    other
                )))
            }
        }
        record.remove("transaction_id");

        let source = match record.remove("source_identifier") {
            Some(value) => Some(value),
            None => record.remove("source_ip"),
        };
        let source_identifier = match source {
            Some(Value::String(s)) if !s.is_empty() => s,
            Some(other) => {
                return Err(Error::InvalidEvent(format!(
                    "source_identifier must be a non-empty string, got {}",
                    other
                )))
            }
            None => {
                return Err(Error::InvalidEvent(
                    "missing source_identifier".to_string(),
                ))
            }
        };

        let target_port = match record.remove("target_port") {
            None | Some(Value::Null) => None,
            Some(value) => {
                let port = value
                    .as_u64()
                    .and_then(|p| u16::try_from(p).ok())
                    .ok_or_else(|| {
                        Error::InvalidEvent(format!("target_port out of range: {}", value))
                    })?;
                Some(port)
            }
        };

        let attack_type = take_label(&mut record, "attack_type")?;
        let severity = take_label(&mut record, "severity")?;

        let timestamp = match record.remove("timestamp") {
            None | Some(Value::Null) => now,
            Some(value) => value.as_f64().ok_or_else(|| {
                Error::InvalidEvent(format!("timestamp must be numeric, got {}", value))
            })?,
        };

        Ok(Self {
            source_identifier,
            target_port,
            attack_type,
            severity,
            timestamp,
            transaction_id: String::new(),
            attributes: record.into_iter().collect(),
        })
    }

    /// Category label used by statistics
    pub fn category(&self) -> &str {
        self.attack_type.as_deref().unwrap_or("unknown")
    }

    /// Severity label used by statistics
    pub fn severity_label(&self) -> &str {
        self.severity.as_deref().unwrap_or("unknown")
    }
}

fn take_label(record: &mut Map<String, Value>, key: &str) -> Result<Option<String>> {
    match record.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(Error::InvalidEvent(format!(
            "{} must be a string, got {}",
            key, other
        ))),
    }
}

/// Reward emitted into every sealed block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardRecord {
    /// Payee
    pub to: String,
    /// Amount
    pub amount: u64,
    /// Emission time
    pub timestamp: f64,
}

impl RewardRecord {
    /// Reward stamped with the current time
    pub fn new(to: impl Into<String>, amount: u64) -> Self {
        Self {
            to: to.into(),
            amount,
            timestamp: now_timestamp(),
        }
    }
}

/// Sealed (or candidate) block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Position in the chain (genesis = 0)
    pub index: u64,

    /// Seal time (float seconds since epoch)
    pub timestamp: f64,

    /// Included transactions, insertion order preserved
    pub transactions: Vec<Transaction>,

    /// Digest of the predecessor; `"0"` for genesis
    pub previous_digest: String,

    /// Proof-of-work nonce
    pub nonce: u64,

    /// Hex SHA-256 over all other fields
    pub digest: String,
}

impl Block {
    /// Unsealed block with `nonce = 0` and no digest
    pub fn candidate(
        index: u64,
        timestamp: f64,
        transactions: Vec<Transaction>,
        previous_digest: impl Into<String>,
    ) -> Self {
        Self {
            index,
            timestamp,
            transactions,
            previous_digest: previous_digest.into(),
            nonce: 0,
            digest: String::new(),
        }
    }

    /// Recompute the digest from the stored fields
    pub fn compute_digest(&self) -> Result<String> {
        Ok(crypto::DigestTemplate::for_block(self)?.digest(self.nonce))
    }

    /// Stored digest matches a recomputation
    pub fn verify_digest(&self) -> bool {
        match self.compute_digest() {
            Ok(computed) => computed == self.digest,
            Err(_) => false,
        }
    }

    /// Event-kind transactions in order
    pub fn attacks(&self) -> impl Iterator<Item = &AttackRecord> {
        self.transactions.iter().filter_map(Transaction::as_attack)
    }
}

/// Full chain plus pending pool, as persisted and exported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Every block from genesis on
    pub chain: Vec<Block>,
    /// Transactions not yet sealed
    pub pending_transactions: Vec<Transaction>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test record must be an object"),
        }
    }

    #[test]
    fn test_from_record_lifts_core_fields() {
        let rec = AttackRecord::from_record(
            record(json!({
                "source_ip": "10.0.0.5",
                "target_port": 22,
                "attack_type": "ssh_bruteforce",
                "severity": "high",
                "details": "5 failed logins",
                "country": "NL"
            })),
            1_700_000_000.0,
        )
        .unwrap();

        assert_eq!(rec.source_identifier, "10.0.0.5");
        assert_eq!(rec.target_port, Some(22));
        assert_eq!(rec.category(), "ssh_bruteforce");
        assert_eq!(rec.severity_label(), "high");
        assert_eq!(rec.timestamp, 1_700_000_000.0);
        assert_eq!(rec.attributes.len(), 2);
        assert_eq!(rec.attributes["country"], json!("NL"));
    }

    #[test]
    fn test_from_record_keeps_supplied_timestamp() {
        let rec = AttackRecord::from_record(
            record(json!({"source_identifier": "a", "timestamp": 12.5})),
            99.0,
        )
        .unwrap();
        assert_eq!(rec.timestamp, 12.5);
        assert_eq!(rec.category(), "unknown");
        assert_eq!(rec.severity_label(), "unknown");
    }

    #[test]
    fn test_from_record_rejects_bad_input() {
        assert!(AttackRecord::from_record(record(json!({"target_port": 80})), 0.0).is_err());
        assert!(AttackRecord::from_record(
            record(json!({"source_identifier": "a", "target_port": 70000})),
            0.0
        )
        .is_err());
        assert!(AttackRecord::from_record(
            record(json!({"source_identifier": "a", "severity": 3})),
            0.0
        )
        .is_err());
        assert!(AttackRecord::from_record(
            record(json!({"source_identifier": "a", "kind": "reward"})),
            0.0
        )
        .is_err());
    }

    #[test]
    fn test_caller_supplied_id_is_replaced() {
        let tx = Transaction::attack(record(json!({
            "source_identifier": "10.0.0.9",
            "transaction_id": "not-ours",
            "timestamp": 1.0
        })))
        .unwrap();
        let id = tx.transaction_id().unwrap();
        assert_ne!(id, "not-ours");
        assert_eq!(id.len(), TRANSACTION_ID_LEN);
    }

    #[test]
    fn test_transaction_json_shape() {
        let tx = Transaction::attack(record(json!({
            "source_identifier": "10.0.0.5",
            "target_port": 443,
            "timestamp": 5.0,
            "details": {"path": "/admin"}
        })))
        .unwrap();

        let value = tx.to_value().unwrap();
        assert_eq!(value["kind"], json!("attack"));
        assert_eq!(value["target_port"], json!(443));
        assert_eq!(value["details"]["path"], json!("/admin"));
        assert!(value.get("attack_type").is_none());

        let back: Transaction = serde_json::from_value(value).unwrap();
        assert_eq!(back, tx);

        let reward = Transaction::reward("sealer", 1);
        let value = reward.to_value().unwrap();
        assert_eq!(value["kind"], json!("reward"));
        assert_eq!(value["to"], json!("sealer"));
        assert_eq!(value["amount"], json!(1));
        assert_eq!(reward.kind(), TransactionKind::Reward);
        assert!(reward.transaction_id().is_none());
    }

    #[test]
    fn test_unknown_kind_loads_verbatim() {
        let tx = Transaction::attack(record(json!({"source_identifier": "10.0.0.5", "timestamp": 2.0})))
            .unwrap();
        let mut stored = tx.to_value().unwrap();
        stored["kind"] = json!("attacx");

        let loaded: Transaction = serde_json::from_value(stored.clone()).unwrap();
        assert_eq!(loaded.kind(), TransactionKind::Unrecognized);
        assert!(loaded.as_attack().is_none());
        assert_eq!(loaded.timestamp(), Some(2.0));
        assert_eq!(loaded.to_value().unwrap(), stored);
        assert_ne!(
            crypto::canonical_json(&loaded).unwrap(),
            crypto::canonical_json(&tx).unwrap()
        );
    }

    #[test]
    fn test_mistyped_core_field_loads_verbatim() {
        let tx = Transaction::attack(record(json!({"source_identifier": "10.0.0.5", "target_port": 22})))
            .unwrap();
        let mut stored = tx.to_value().unwrap();
        stored["target_port"] = json!("22");

        let loaded = Transaction::from_stored(stored.clone());
        assert_eq!(loaded, Transaction::Unrecognized(stored));
    }
}
