//! Actor-based front end for async callers
//!
//! This module implements the single-writer pattern using Tokio actors:
//! - One actor task owns every write (ingest, seal, shutdown)
//! - CPU-bound sealing runs on the blocking pool, never on a runtime worker
//! - Reads bypass the mailbox through a [`LedgerReader`], which exposes no
//!   write methods
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │        Sensors (listeners, decoy web server)          │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │               LedgerHandle (Clone)                    │
//! │    writes → mailbox        reads → LedgerReader       │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              LedgerActor (Single Task)                │
//! │  ┌────────────────────────────────────────────────┐  │
//! │  │ spawn_blocking: ingest / seal_pending          │  │
//! │  │ Shutdown: finish current seal → refuse rest    │  │
//! │  │           → final save                         │  │
//! │  └────────────────────────────────────────────────┘  │
//! └───────────────────────────────────────────────────────┘
//! ```

use crate::chain::ChainViolation;
use crate::query::{Located, SearchHit, Statistics};
use crate::types::{AttackRecord, Block, LedgerSnapshot, Transaction};
use crate::{Error, Ledger, Result};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Message sent to the ledger actor
#[derive(Debug)]
pub enum LedgerMessage {
    /// Ingest a raw sensor record
    Ingest {
        /// Raw record
        record: Value,
        /// Assigned transaction id
        response: oneshot::Sender<Result<String>>,
    },

    /// Seal the pending pool now
    Seal {
        /// Sealed block, `None` if the pool was empty
        response: oneshot::Sender<Result<Option<Block>>>,
    },

    /// Drain and stop
    Shutdown {
        /// Result of the final flush
        response: oneshot::Sender<Result<()>>,
    },
}

/// Actor that processes ledger writes
#[derive(Debug)]
pub struct LedgerActor {
    /// Shared engine
    ledger: Arc<Ledger>,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<LedgerMessage>,
}

impl LedgerActor {
    /// Create new actor
    pub fn new(ledger: Arc<Ledger>, mailbox: mpsc::Receiver<LedgerMessage>) -> Self {
        Self { ledger, mailbox }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                LedgerMessage::Ingest { record, response } => {
                    let ledger = Arc::clone(&self.ledger);
                    let result = run_blocking(move || ledger.ingest(record)).await;
                    let _ = response.send(result);
                }

                LedgerMessage::Seal { response } => {
                    let ledger = Arc::clone(&self.ledger);
                    let result = run_blocking(move || ledger.seal_pending()).await;
                    let _ = response.send(result);
                }

                LedgerMessage::Shutdown { response } => {
                    let result = self.drain().await;
                    let _ = response.send(result);
                    return;
                }
            }
        }

        // All handles dropped without an explicit shutdown
        if let Err(e) = self.drain().await {
            tracing::error!("Error flushing ledger on mailbox close: {}", e);
        }
    }

    /// Refuse queued writes, then flush
    async fn drain(&mut self) -> Result<()> {
        self.mailbox.close();

        let mut refused = 0usize;
        while let Ok(msg) = self.mailbox.try_recv() {
            refused += 1;
            let err = || Error::Concurrency("Ledger is shutting down".to_string());
            match msg {
                LedgerMessage::Ingest { response, .. } => {
                    let _ = response.send(Err(err()));
                }
                LedgerMessage::Seal { response } => {
                    let _ = response.send(Err(err()));
                }
                LedgerMessage::Shutdown { response } => {
                    let _ = response.send(Ok(()));
                }
            }
        }
        if refused > 0 {
            tracing::warn!(refused, "Refused queued writes during shutdown");
        }

        let ledger = Arc::clone(&self.ledger);
        run_blocking(move || ledger.shutdown()).await
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Concurrency(format!("Ledger worker failed: {}", e)))?
}

/// Read-only access to a ledger owned by an actor
///
/// Writes go through [`LedgerHandle`] so they are serialized by the mailbox
/// and refused once shutdown starts.
#[derive(Debug, Clone)]
pub struct LedgerReader {
    ledger: Arc<Ledger>,
}

impl LedgerReader {
    /// Chain digests and links are intact
    pub fn validate(&self) -> bool {
        self.ledger.validate()
    }

    /// First chain violation, if any
    pub fn validate_detailed(&self) -> std::result::Result<(), ChainViolation> {
        self.ledger.validate_detailed()
    }

    /// Aggregates over sealed event transactions
    pub fn statistics(&self) -> Statistics {
        self.ledger.statistics()
    }

    /// Last `n` blocks in chain order
    pub fn recent_blocks(&self, n: usize) -> Vec<Block> {
        self.ledger.recent_blocks(n)
    }

    /// Sealed event records from `source`
    pub fn by_source(&self, source: &str) -> Vec<AttackRecord> {
        self.ledger.by_source(source)
    }

    /// Sealed transactions matching every criterion
    pub fn search(&self, criteria: &Map<String, Value>) -> Result<Vec<SearchHit>> {
        self.ledger.search(criteria)
    }

    /// Event transaction by id, sealed or pending
    pub fn find_transaction(&self, transaction_id: &str) -> Option<Located> {
        self.ledger.find_transaction(transaction_id)
    }

    /// Block at `index`
    pub fn block(&self, index: u64) -> Result<Block> {
        self.ledger.block(index)
    }

    /// Most recent block
    pub fn latest_block(&self) -> Block {
        self.ledger.latest_block()
    }

    /// Number of blocks (genesis included)
    pub fn len(&self) -> usize {
        self.ledger.len()
    }

    /// Always false: genesis is always present
    pub fn is_empty(&self) -> bool {
        self.ledger.is_empty()
    }

    /// Pending pool contents
    pub fn pending(&self) -> Vec<Transaction> {
        self.ledger.pending()
    }

    /// Pending pool size
    pub fn pending_len(&self) -> usize {
        self.ledger.pending_len()
    }

    /// Chain plus pending pool, in artifact layout
    pub fn export(&self) -> LedgerSnapshot {
        self.ledger.export()
    }
}

/// Handle for sending messages to the actor
#[derive(Debug, Clone)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
    reader: LedgerReader,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>, ledger: Arc<Ledger>) -> Self {
        Self {
            sender,
            reader: LedgerReader { ledger },
        }
    }

    /// Reads (statistics, search, export, ...)
    pub fn reader(&self) -> &LedgerReader {
        &self.reader
    }

    /// Ingest a raw sensor record
    pub async fn ingest(&self, record: Value) -> Result<String> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(LedgerMessage::Ingest {
                record,
                response: tx,
            })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Seal the pending pool now
    pub async fn seal(&self) -> Result<Option<Block>> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(LedgerMessage::Seal { response: tx })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Shutdown actor after the in-flight write and a final flush
    pub async fn shutdown(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(LedgerMessage::Shutdown { response: tx })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }
}

/// Spawn the ledger actor
pub fn spawn_ledger_actor(ledger: Arc<Ledger>, mailbox_capacity: usize) -> LedgerHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity); // Bounded channel for backpressure
    let actor = LedgerActor::new(Arc::clone(&ledger), rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    LedgerHandle::new(tx, ledger)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;
    use serde_json::json;
    use tempfile::TempDir;

    fn test_ledger() -> (Arc<Ledger>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.path = temp_dir.path().join("ledger.json");
        config.sealing.difficulty = 1;
        (Arc::new(Ledger::open(config).unwrap()), temp_dir)
    }

    #[tokio::test]
    async fn test_actor_spawn_and_shutdown() {
        let (ledger, temp) = test_ledger();
        let handle = spawn_ledger_actor(ledger, 16);

        handle.shutdown().await.unwrap();
        assert!(temp.path().join("ledger.json").exists());

        // mailbox is closed after shutdown
        assert!(handle.ingest(json!({"source_identifier": "a"})).await.is_err());
    }

    #[tokio::test]
    async fn test_actor_ingest_and_seal() {
        let (ledger, _temp) = test_ledger();
        let handle = spawn_ledger_actor(ledger, 16);

        let id = handle
            .ingest(json!({"source_identifier": "10.0.0.5", "attack_type": "sqli"}))
            .await
            .unwrap();
        assert_eq!(handle.reader().pending_len(), 1);

        let block = handle.seal().await.unwrap().unwrap();
        assert_eq!(block.index, 1);
        assert_eq!(block.transactions[0].transaction_id(), Some(id.as_str()));
        assert_eq!(handle.reader().pending_len(), 0);
        assert!(handle.seal().await.unwrap().is_none());

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_actor_auto_seal() {
        let (ledger, _temp) = test_ledger();
        let handle = spawn_ledger_actor(ledger, 16);

        for i in 0..5 {
            handle
                .ingest(json!({"source_identifier": format!("10.0.0.{i}")}))
                .await
                .unwrap();
        }

        let stats = handle.reader().statistics();
        assert_eq!(stats.total_blocks, 2);
        assert_eq!(stats.total_attacks, 5);
        assert_eq!(stats.pending_transactions, 0);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_actor_rejects_invalid_record() {
        let (ledger, _temp) = test_ledger();
        let handle = spawn_ledger_actor(ledger, 16);

        let result = handle.ingest(json!("just a string")).await;
        assert!(matches!(result, Err(Error::InvalidEvent(_))));

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_reader_outlives_shutdown() {
        let (ledger, _temp) = test_ledger();
        let handle = spawn_ledger_actor(ledger, 16);

        let id = handle
            .ingest(json!({"source_identifier": "10.0.0.8"}))
            .await
            .unwrap();
        let reader = handle.reader().clone();
        handle.shutdown().await.unwrap();

        assert!(handle.seal().await.is_err());
        assert_eq!(reader.pending_len(), 1);
        assert_eq!(reader.find_transaction(&id).unwrap().block_index, None);
        assert_eq!(reader.export().pending_transactions.len(), 1);
        assert!(reader.validate());
    }
}
