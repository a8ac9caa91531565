//! Threat Ledger
//!
//! Append-only, tamper-evident ledger of security events with proof-of-work
//! sealed blocks.
//!
//! # Architecture
//!
//! - **Pending pool**: sensor records are normalized and buffered
//! - **Sealing**: the pool plus a reward record becomes a block once its
//!   digest has `difficulty` leading hex zeros
//! - **Chain**: every block carries its predecessor's digest
//! - **Single Writer**: one seal at a time; readers never see a half-sealed block
//!
//! # Invariants
//!
//! - Self-consistent digests: recomputing any block's digest reproduces it
//! - Linked: `chain[i].previous_digest == chain[i - 1].digest`
//! - Append-only: blocks are never modified, removed or reordered
//! - Transaction ids are assigned once at ingestion and never change

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod crypto;
pub mod sealing;
pub mod chain;
pub mod query;
pub mod storage;
pub mod ledger;
pub mod error;
pub mod actor;
pub mod config;
pub mod metrics;

// Re-exports
pub use error::{Error, Result};
pub use types::{AttackRecord, Block, LedgerSnapshot, RewardRecord, Transaction, TransactionKind};
pub use chain::{Chain, ChainViolation};
pub use query::{Located, SearchHit, Statistics};
pub use sealing::SealBudget;
pub use ledger::Ledger;
pub use actor::{spawn_ledger_actor, LedgerHandle, LedgerReader};
pub use config::{Config, RecoveryMode};
