//! Block chain and validation
//!
//! # Invariants
//!
//! - Never empty: genesis is created before anything is loaded
//! - Append-only: one block at a time, index == position (checked by validation, not on load)
//! - Linked: `blocks[i].previous_digest == blocks[i - 1].digest`

use crate::sealing::{self, SealBudget};
use crate::types::{now_timestamp, Block, Transaction, GENESIS_PREVIOUS_DIGEST};
use crate::{Error, Result};

/// First broken invariant found by [`Chain::validate_detailed`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainViolation {
    /// Stored digest does not match the block's fields
    #[error("block {index}: stored digest {stored} != recomputed {computed}")]
    DigestMismatch {
        /// Failing block
        index: u64,
        /// Digest found in the block
        stored: String,
        /// Digest recomputed from the block's fields
        computed: String,
    },

    /// `previous_digest` does not match the predecessor
    #[error("block {index}: previous_digest {found} != predecessor digest {expected}")]
    LinkMismatch {
        /// Failing block
        index: u64,
        /// Predecessor's stored digest
        expected: String,
        /// Value stored in the failing block
        found: String,
    },

    /// Stored index differs from the block's position in the chain
    #[error("block at position {position} carries index {index}")]
    PositionMismatch {
        /// Index stored in the block
        index: u64,
        /// Actual position
        position: u64,
    },
}

impl ChainViolation {
    /// Position of the failing block
    pub fn index(&self) -> u64 {
        match self {
            ChainViolation::DigestMismatch { index, .. } => *index,
            ChainViolation::LinkMismatch { index, .. } => *index,
            ChainViolation::PositionMismatch { position, .. } => *position,
        }
    }
}

/// Ordered sequence of sealed blocks
#[derive(Debug, Clone)]
pub struct Chain {
    blocks: Vec<Block>,
}

impl Chain {
    /// Chain holding only a freshly sealed genesis block
    pub fn new(difficulty: usize) -> Result<Self> {
        Ok(Self {
            blocks: vec![Self::create_genesis(difficulty)?],
        })
    }

    /// Block 0: no transactions, previous digest `"0"`, sealed
    pub fn create_genesis(difficulty: usize) -> Result<Block> {
        let mut genesis = Block::candidate(0, now_timestamp(), vec![], GENESIS_PREVIOUS_DIGEST);
        sealing::seal(&mut genesis, difficulty, &SealBudget::unbounded())?;
        tracing::debug!(digest = %genesis.digest, "Genesis block created");
        Ok(genesis)
    }

    /// Rebuild from stored blocks without re-sealing
    ///
    /// Blocks are taken verbatim; only emptiness is rejected. Digests,
    /// links and positions are the job of [`Chain::validate`].
    pub fn from_blocks(blocks: Vec<Block>) -> Result<Self> {
        if blocks.is_empty() {
            return Err(Error::Corrupted("chain has no genesis block".to_string()));
        }
        Ok(Self { blocks })
    }

    /// Unsealed successor of the current tip, at index `len()`
    pub fn next_candidate(&self, transactions: Vec<Transaction>, timestamp: f64) -> Block {
        Block::candidate(
            self.blocks.len() as u64,
            timestamp,
            transactions,
            self.tip().digest.clone(),
        )
    }

    /// Append a sealed block
    ///
    /// Rejects blocks that do not extend the current tip or whose digest
    /// does not match their fields.
    pub fn append(&mut self, block: Block) -> Result<()> {
        let tip = self.tip();
        let expected = self.blocks.len() as u64;
        if block.index != expected {
            return Err(Error::InvalidBlock(format!(
                "expected index {}, got {}",
                expected, block.index
            )));
        }
        if block.previous_digest != tip.digest {
            return Err(Error::InvalidBlock(format!(
                "block {} does not extend tip {}",
                block.index, tip.digest
            )));
        }
        if !block.verify_digest() {
            return Err(Error::InvalidBlock(format!(
                "block {} digest does not match its contents",
                block.index
            )));
        }
        self.blocks.push(block);
        Ok(())
    }

    /// Every block digest is self-consistent and every link matches
    pub fn validate(&self) -> bool {
        match self.validate_detailed() {
            Ok(()) => true,
            Err(violation) => {
                tracing::error!(index = violation.index(), %violation, "Chain validation failed");
                false
            }
        }
    }

    /// Like [`Chain::validate`], reporting the first violation
    ///
    /// Starts at block 1; genesis is trusted as constructed.
    pub fn validate_detailed(&self) -> std::result::Result<(), ChainViolation> {
        for (position, pair) in self.blocks.windows(2).enumerate() {
            let (previous, current) = (&pair[0], &pair[1]);
            let position = position as u64 + 1;

            let computed = current.compute_digest().unwrap_or_default();
            if computed != current.digest {
                return Err(ChainViolation::DigestMismatch {
                    index: position,
                    stored: current.digest.clone(),
                    computed,
                });
            }

            if current.previous_digest != previous.digest {
                return Err(ChainViolation::LinkMismatch {
                    index: position,
                    expected: previous.digest.clone(),
                    found: current.previous_digest.clone(),
                });
            }

            if current.index != position {
                return Err(ChainViolation::PositionMismatch {
                    index: current.index,
                    position,
                });
            }
        }
        Ok(())
    }

    /// Most recent block
    pub fn tip(&self) -> &Block {
        // non-empty by construction
        &self.blocks[self.blocks.len() - 1]
    }

    /// Block at `index`
    pub fn get(&self, index: u64) -> Option<&Block> {
        usize::try_from(index).ok().and_then(|i| self.blocks.get(i))
    }

    /// Last `n` blocks in chain order
    pub fn recent(&self, n: usize) -> &[Block] {
        let start = self.blocks.len().saturating_sub(n);
        &self.blocks[start..]
    }

    /// All blocks
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Number of blocks (genesis included)
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
