//! Main ledger orchestration layer
//!
//! This module ties together the chain, sealing, queries and persistence
//! into the engine consumed by sensors and the API layer.
//!
//! # Example
//!
//! ```no_run
//! use threat_ledger::{Config, Ledger};
//! use serde_json::json;
//!
//! fn main() -> threat_ledger::Result<()> {
//!     let ledger = Ledger::open(Config::default())?;
//!
//!     let id = ledger.ingest(json!({
//!         "source_identifier": "203.0.113.7",
//!         "target_port": 22,
//!         "attack_type": "ssh_bruteforce",
//!         "severity": "high",
//!     }))?;
//!     println!("recorded {id}");
//!
//!     ledger.shutdown()
//! }
//! ```
//!
//! # Concurrency
//!
//! Chain and pool sit behind one `RwLock`. A seal snapshots the pool under
//! the read side, searches for a nonce without holding the state lock, then
//! appends the block and drains exactly the snapshot under the write side.
//! Seals are serialized by a separate mutex; records ingested while a seal
//! is running stay pending for the next one.

use crate::{
    chain::{Chain, ChainViolation},
    config::RecoveryMode,
    metrics::Metrics,
    query::{self, Located, SearchHit, Statistics},
    sealing::{self, SealBudget},
    storage::ArtifactStore,
    types::{now_timestamp, AttackRecord, Block, LedgerSnapshot, Transaction},
    Config, Error, Result,
};
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};

struct LedgerState {
    chain: Chain,
    pending: Vec<Transaction>,
}

/// Main ledger interface
pub struct Ledger {
    /// Chain and pending pool
    state: RwLock<LedgerState>,

    /// Serializes seals (single writer)
    seal_lock: Mutex<()>,

    /// Artifact store (None when persistence is disabled)
    store: Option<ArtifactStore>,

    /// Metrics
    metrics: Metrics,

    /// Configuration
    config: Config,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("Ledger")
            .field("blocks", &state.chain.len())
            .field("pending", &state.pending.len())
            .field("store", &self.store)
            .finish()
    }
}

impl Ledger {
    /// Open ledger with configuration
    ///
    /// Builds genesis first, then loads the artifact if one exists. A
    /// malformed artifact falls back to the genesis-only chain unless
    /// `storage.recovery` is `strict`.
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let metrics =
            Metrics::new().map_err(|e| Error::Config(format!("metrics registry: {}", e)))?;
        let chain = Chain::new(config.sealing.difficulty)?;
        let store = config
            .storage
            .enabled
            .then(|| ArtifactStore::new(config.storage.path.clone()));

        let mut state = LedgerState {
            chain,
            pending: Vec::new(),
        };

        if let Some(store) = &store {
            match Self::restore(store) {
                Ok(Some(restored)) => {
                    tracing::info!(
                        path = %store.path().display(),
                        blocks = restored.chain.len(),
                        pending = restored.pending.len(),
                        "Ledger restored from artifact"
                    );
                    state = restored;
                }
                Ok(None) => {
                    tracing::info!(
                        path = %store.path().display(),
                        "No ledger artifact, starting from genesis"
                    );
                }
                Err(e) => match config.storage.recovery {
                    RecoveryMode::Genesis => {
                        tracing::error!(
                            path = %store.path().display(),
                            error = %e,
                            "Failed to load ledger artifact, starting from genesis"
                        );
                    }
                    RecoveryMode::Strict => return Err(e),
                },
            }
        }

        metrics.pending_transactions.set(state.pending.len() as i64);

        Ok(Self {
            state: RwLock::new(state),
            seal_lock: Mutex::new(()),
            store,
            metrics,
            config,
        })
    }

    fn restore(store: &ArtifactStore) -> Result<Option<LedgerState>> {
        let snapshot = match store.load() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return Ok(None),
            Err(Error::Storage(msg)) => return Err(Error::Corrupted(msg)),
            Err(e) => return Err(e),
        };
        Ok(Some(LedgerState {
            chain: Chain::from_blocks(snapshot.chain)?,
            pending: snapshot.pending_transactions,
        }))
    }

    /// Ingest a raw sensor record
    ///
    /// Returns the assigned transaction id. When the pool reaches
    /// `sealing.seal_trigger` the pool is sealed before returning; a seal
    /// that fails or runs out of budget is logged and the records stay
    /// pending.
    pub fn ingest(&self, record: Value) -> Result<String> {
        let record = match record {
            Value::Object(map) => map,
            other => {
                return Err(Error::InvalidEvent(format!(
                    "record must be a JSON object, got {}",
                    other
                )))
            }
        };
        self.ingest_record(record)
    }

    /// Ingest an already-split attribute mapping
    pub fn ingest_record(&self, record: Map<String, Value>) -> Result<String> {
        let tx = Transaction::attack(record)?;
        let id = tx.transaction_id().unwrap_or_default().to_string();

        let pending = {
            let mut state = self.state.write();
            state.pending.push(tx);
            state.pending.len()
        };
        self.metrics.record_ingest(pending);
        tracing::debug!(transaction_id = %id, pending, "Transaction ingested");

        if pending >= self.config.sealing.seal_trigger {
            if let Err(e) = self.seal_pending() {
                tracing::warn!(error = %e, pending, "Automatic seal failed, records stay pending");
            }
        }

        Ok(id)
    }

    /// Seal the pending pool into a new block
    ///
    /// Uses the configured seal timeout. Returns `Ok(None)` when the pool is
    /// empty.
    pub fn seal_pending(&self) -> Result<Option<Block>> {
        self.seal_pending_with(&SealBudget::from_timeout(self.config.sealing.seal_timeout()))
    }

    /// Seal the pending pool within `budget`
    ///
    /// On [`Error::SealAborted`] neither the chain nor the pool changes.
    pub fn seal_pending_with(&self, budget: &SealBudget) -> Result<Option<Block>> {
        let _writer = self.seal_lock.lock();

        let (mut block, taken) = {
            let state = self.state.read();
            if state.pending.is_empty() {
                tracing::info!("No pending transactions to seal");
                return Ok(None);
            }
            let mut transactions = state.pending.clone();
            let taken = transactions.len();
            transactions.push(Transaction::reward(
                self.config.sealing.reward_payee.clone(),
                self.config.sealing.reward_amount,
            ));
            (state.chain.next_candidate(transactions, now_timestamp()), taken)
        };

        let outcome = match sealing::seal(&mut block, self.config.sealing.difficulty, budget) {
            Ok(outcome) => outcome,
            Err(e) => {
                if matches!(e, Error::SealAborted { .. }) {
                    self.metrics.record_seal_aborted();
                }
                return Err(e);
            }
        };

        let pending = {
            let mut state = self.state.write();
            state.chain.append(block.clone())?;
            state.pending.drain(..taken);
            state.pending.len()
        };

        self.metrics
            .record_seal(outcome.attempts, outcome.elapsed.as_secs_f64(), pending);
        tracing::info!(
            index = block.index,
            transactions = block.transactions.len(),
            nonce = block.nonce,
            digest = %block.digest,
            attempts = outcome.attempts,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "Block sealed"
        );

        self.persist();
        Ok(Some(block))
    }

    // Persistence

    /// Write the artifact; failures are logged and swallowed
    fn persist(&self) {
        if let Err(e) = self.save() {
            self.metrics.record_persist_failure();
            tracing::error!(error = %e, "Failed to persist ledger, in-memory chain stays authoritative");
        }
    }

    /// Write the artifact now (no-op when persistence is disabled)
    pub fn save(&self) -> Result<()> {
        match &self.store {
            Some(store) => store.save(&self.export()),
            None => Ok(()),
        }
    }

    /// Chain plus pending pool, in artifact layout
    pub fn export(&self) -> LedgerSnapshot {
        let state = self.state.read();
        LedgerSnapshot {
            chain: state.chain.blocks().to_vec(),
            pending_transactions: state.pending.clone(),
        }
    }

    /// Wait for any in-flight seal, then flush the artifact
    pub fn shutdown(&self) -> Result<()> {
        let _writer = self.seal_lock.lock();
        self.save()?;
        tracing::info!("Ledger flushed");
        Ok(())
    }

    // Validation

    /// Chain digests and links are intact
    pub fn validate(&self) -> bool {
        self.state.read().chain.validate()
    }

    /// First chain violation, if any
    pub fn validate_detailed(&self) -> std::result::Result<(), ChainViolation> {
        self.state.read().chain.validate_detailed()
    }

    // Queries

    /// Aggregates over sealed event transactions
    pub fn statistics(&self) -> Statistics {
        let state = self.state.read();
        Statistics::collect(
            state.chain.blocks(),
            state.pending.len(),
            state.chain.validate(),
            self.config.sealing.difficulty,
        )
    }

    /// Last `n` blocks in chain order
    pub fn recent_blocks(&self, n: usize) -> Vec<Block> {
        self.state.read().chain.recent(n).to_vec()
    }

    /// Sealed event records from `source`
    pub fn by_source(&self, source: &str) -> Vec<AttackRecord> {
        query::by_source(self.state.read().chain.blocks(), source)
    }

    /// Sealed transactions matching every criterion
    pub fn search(&self, criteria: &Map<String, Value>) -> Result<Vec<SearchHit>> {
        query::search(self.state.read().chain.blocks(), criteria)
    }

    /// Event transaction by id, sealed or pending
    pub fn find_transaction(&self, transaction_id: &str) -> Option<Located> {
        let state = self.state.read();
        query::find_transaction(state.chain.blocks(), &state.pending, transaction_id)
    }

    /// Block at `index`
    pub fn block(&self, index: u64) -> Result<Block> {
        self.state
            .read()
            .chain
            .get(index)
            .cloned()
            .ok_or(Error::BlockNotFound(index))
    }

    /// Most recent block
    pub fn latest_block(&self) -> Block {
        self.state.read().chain.tip().clone()
    }

    /// Number of blocks (genesis included)
    pub fn len(&self) -> usize {
        self.state.read().chain.len()
    }

    /// Always false: genesis is always present
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Pending pool contents
    pub fn pending(&self) -> Vec<Transaction> {
        self.state.read().pending.clone()
    }

    /// Pending pool size
    pub fn pending_len(&self) -> usize {
        self.state.read().pending.len()
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}
