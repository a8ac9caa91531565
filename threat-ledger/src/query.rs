//! Read-only queries over the chain and pending pool
//!
//! Everything is recomputed on demand in a single pass over the stored
//! transactions; no secondary index is maintained.

use crate::types::{AttackRecord, Block, Transaction};
use crate::Result;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Transaction matched by [`search`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    /// Index of the containing block
    pub block_index: u64,
    /// Digest of the containing block
    pub block_digest: String,
    /// Matched transaction
    pub transaction: Transaction,
}

/// Event transaction located by its id
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Located {
    /// Containing block; `None` while still pending
    pub block_index: Option<u64>,
    /// The record
    pub record: AttackRecord,
}

/// Aggregates over all sealed event transactions
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statistics {
    /// Sealed event transactions
    pub total_attacks: usize,
    /// Count per `attack_type` (`"unknown"` when absent)
    pub attack_types: BTreeMap<String, usize>,
    /// Count per severity label (`"unknown"` when absent)
    pub severity_levels: BTreeMap<String, usize>,
    /// Distinct source identifiers
    pub unique_sources: usize,
    /// Result of chain validation
    pub chain_valid: bool,
    /// Pending pool size
    pub pending_transactions: usize,
    /// Blocks including genesis
    pub total_blocks: usize,
    /// Configured sealing difficulty
    pub difficulty: usize,
}

impl Statistics {
    /// Aggregate event transactions of `blocks`
    pub fn collect(
        blocks: &[Block],
        pending_transactions: usize,
        chain_valid: bool,
        difficulty: usize,
    ) -> Self {
        let mut attack_types = BTreeMap::new();
        let mut severity_levels = BTreeMap::new();
        let mut sources = BTreeSet::new();
        let mut total_attacks = 0;

        for record in blocks.iter().flat_map(Block::attacks) {
            total_attacks += 1;
            *attack_types.entry(record.category().to_string()).or_insert(0) += 1;
            *severity_levels
                .entry(record.severity_label().to_string())
                .or_insert(0) += 1;
            sources.insert(record.source_identifier.as_str());
        }

        Self {
            total_attacks,
            attack_types,
            severity_levels,
            unique_sources: sources.len(),
            chain_valid,
            pending_transactions,
            total_blocks: blocks.len(),
            difficulty,
        }
    }
}

/// Event transactions from `source`, block order then in-block order
pub fn by_source(blocks: &[Block], source: &str) -> Vec<AttackRecord> {
    blocks
        .iter()
        .flat_map(Block::attacks)
        .filter(|record| record.source_identifier == source)
        .cloned()
        .collect()
}

/// Transactions whose JSON form carries every criterion with an equal value
///
/// A criterion on a field the transaction lacks excludes it; empty criteria
/// match everything.
pub fn search(blocks: &[Block], criteria: &Map<String, Value>) -> Result<Vec<SearchHit>> {
    let mut hits = Vec::new();
    for block in blocks {
        for tx in &block.transactions {
            if matches(&tx.to_value()?, criteria) {
                hits.push(SearchHit {
                    block_index: block.index,
                    block_digest: block.digest.clone(),
                    transaction: tx.clone(),
                });
            }
        }
    }
    Ok(hits)
}

fn matches(value: &Value, criteria: &Map<String, Value>) -> bool {
    criteria
        .iter()
        .all(|(key, required)| value.get(key) == Some(required))
}

/// Find an event transaction by id, sealed blocks first, then the pool
pub fn find_transaction(
    blocks: &[Block],
    pending: &[Transaction],
    transaction_id: &str,
) -> Option<Located> {
    for block in blocks {
        if let Some(record) = block
            .attacks()
            .find(|record| record.transaction_id == transaction_id)
        {
            return Some(Located {
                block_index: Some(block.index),
                record: record.clone(),
            });
        }
    }

    pending
        .iter()
        .filter_map(Transaction::as_attack)
        .find(|record| record.transaction_id == transaction_id)
        .map(|record| Located {
            block_index: None,
            record: record.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GENESIS_PREVIOUS_DIGEST;
    use serde_json::json;

    fn attack(value: Value) -> Transaction {
        match value {
            Value::Object(map) => Transaction::attack(map).unwrap(),
            _ => unreachable!(),
        }
    }

    fn criteria(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn block(index: u64, transactions: Vec<Transaction>) -> Block {
        let mut block = Block::candidate(index, 1.0, transactions, GENESIS_PREVIOUS_DIGEST);
        block.digest = format!("digest-{index}");
        block
    }

    fn fixture() -> Vec<Block> {
        vec![
            block(0, vec![]),
            block(
                1,
                vec![
                    attack(json!({"source_identifier": "10.0.0.5", "attack_type": "ssh", "severity": "high", "target_port": 22})),
                    attack(json!({"source_identifier": "10.0.0.7", "attack_type": "http", "severity": "low"})),
                    Transaction::reward("sealer", 1),
                ],
            ),
            block(
                2,
                vec![
                    attack(json!({"source_identifier": "10.0.0.5", "attack_type": "http"})),
                    attack(json!({"source_identifier": "10.0.0.8", "severity": "high"})),
                    attack(json!({"source_identifier": "10.0.0.5", "attack_type": "ssh", "severity": "high"})),
                    Transaction::reward("sealer", 1),
                ],
            ),
        ]
    }

    #[test]
    fn test_by_source_preserves_order() {
        let blocks = fixture();
        let records = by_source(&blocks, "10.0.0.5");
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].attack_type.as_deref(), Some("ssh"));
        assert_eq!(records[1].attack_type.as_deref(), Some("http"));
        assert_eq!(records[2].severity.as_deref(), Some("high"));
        assert!(by_source(&blocks, "192.168.1.1").is_empty());
    }

    #[test]
    fn test_search_annotates_block() {
        let blocks = fixture();
        let hits = search(&blocks, &criteria(json!({"source_identifier": "10.0.0.5"}))).unwrap();
        let indices: Vec<u64> = hits.iter().map(|h| h.block_index).collect();
        assert_eq!(indices, vec![1, 2, 2]);
        assert_eq!(hits[0].block_digest, "digest-1");
    }

    #[test]
    fn test_search_requires_every_criterion() {
        let blocks = fixture();
        let hits = search(
            &blocks,
            &criteria(json!({"attack_type": "ssh", "severity": "high", "target_port": 22})),
        )
        .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].block_index, 1);

        // rewards have no severity field, so they never match on it
        let hits = search(&blocks, &criteria(json!({"severity": "high"}))).unwrap();
        assert_eq!(hits.len(), 3);

        let hits = search(&blocks, &criteria(json!({"kind": "reward"}))).unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_statistics() {
        let blocks = fixture();
        let stats = Statistics::collect(&blocks, 4, true, 2);
        assert_eq!(stats.total_attacks, 5);
        assert_eq!(stats.attack_types["ssh"], 2);
        assert_eq!(stats.attack_types["http"], 2);
        assert_eq!(stats.attack_types["unknown"], 1);
        assert_eq!(stats.severity_levels["high"], 3);
        assert_eq!(stats.severity_levels["unknown"], 1);
        assert_eq!(stats.unique_sources, 3);
        assert_eq!(stats.pending_transactions, 4);
        assert_eq!(stats.total_blocks, 3);
        assert!(stats.chain_valid);
    }

    #[test]
    fn test_find_transaction_checks_pool() {
        let blocks = fixture();
        let sealed_id = blocks[2].transactions[1].transaction_id().unwrap().to_string();
        let located = find_transaction(&blocks, &[], &sealed_id).unwrap();
        assert_eq!(located.block_index, Some(2));
        assert_eq!(located.record.source_identifier, "10.0.0.8");

        let pending = vec![attack(json!({"source_identifier": "10.9.9.9", "timestamp": 3.0}))];
        let pending_id = pending[0].transaction_id().unwrap().to_string();
        let located = find_transaction(&blocks, &pending, &pending_id).unwrap();
        assert_eq!(located.block_index, None);

        assert!(find_transaction(&blocks, &pending, "ffffffffffffffff").is_none());
    }
}
