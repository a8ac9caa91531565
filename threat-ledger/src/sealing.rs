//! Proof-of-work sealing
//!
//! Linear nonce search from 0 until the block digest starts with
//! `difficulty` hex zeros. The search can be bounded with a [`SealBudget`];
//! an aborted search leaves the candidate unsealed and reports
//! [`Error::SealAborted`].

use crate::crypto::{meets_difficulty, DigestTemplate};
use crate::types::Block;
use crate::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Budget checks happen once per this many nonces
const BUDGET_CHECK_INTERVAL: u64 = 1024;

/// Bounds on a single nonce search
#[derive(Debug, Clone, Default)]
pub struct SealBudget {
    deadline: Option<Instant>,
    cancel: Option<Arc<AtomicBool>>,
}

impl SealBudget {
    /// No deadline, no cancellation
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Stop once `timeout` has elapsed from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            cancel: None,
        }
    }

    /// Budget from an optional timeout
    pub fn from_timeout(timeout: Option<Duration>) -> Self {
        timeout.map(Self::with_timeout).unwrap_or_default()
    }

    /// Also stop when `flag` is set
    pub fn cancelled_by(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn exhausted(&self) -> Option<&'static str> {
        if let Some(flag) = &self.cancel {
            if flag.load(Ordering::Relaxed) {
                return Some("cancelled");
            }
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some("deadline exceeded"),
            _ => None,
        }
    }
}

/// Result of a successful search
#[derive(Debug, Clone, Copy)]
pub struct SealOutcome {
    /// Nonces hashed, including the winning one
    pub attempts: u64,
    /// Wall time of the search
    pub elapsed: Duration,
}

/// Find a nonce for `block` and store it with the matching digest
///
/// The block's nonce restarts at 0. On success `block.nonce` and
/// `block.digest` satisfy the difficulty predicate; on error both are left
/// as they were.
#[tracing::instrument(skip(block, budget), fields(index = block.index, txs = block.transactions.len()))]
pub fn seal(block: &mut Block, difficulty: usize, budget: &SealBudget) -> Result<SealOutcome> {
    let template = DigestTemplate::for_block(block)?;
    let started = Instant::now();
    let mut nonce: u64 = 0;
    let mut attempts: u64 = 0;

    loop {
        if attempts > 0 && attempts % BUDGET_CHECK_INTERVAL == 0 {
            if let Some(reason) = budget.exhausted() {
                tracing::warn!(attempts, reason, "Nonce search aborted");
                return Err(Error::SealAborted {
                    reason: reason.to_string(),
                    attempts,
                });
            }
        }

        let digest = template.digest(nonce);
        attempts += 1;

        if meets_difficulty(&digest, difficulty) {
            block.nonce = nonce;
            block.digest = digest;
            let elapsed = started.elapsed();
            tracing::debug!(nonce, attempts, ?elapsed, "Nonce found");
            return Ok(SealOutcome { attempts, elapsed });
        }

        nonce = nonce.checked_add(1).ok_or_else(|| Error::SealAborted {
            reason: "nonce space exhausted".to_string(),
            attempts,
        })?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Transaction, GENESIS_PREVIOUS_DIGEST};

    fn candidate() -> Block {
        Block::candidate(
            1,
            1_700_000_000.5,
            vec![Transaction::reward("sealer", 1)],
            "00abc",
        )
    }

    #[test]
    fn test_difficulty_zero_takes_first_nonce() {
        let mut block = Block::candidate(0, 1.0, vec![], GENESIS_PREVIOUS_DIGEST);
        let outcome = seal(&mut block, 0, &SealBudget::unbounded()).unwrap();
        assert_eq!(outcome.attempts, 1);
        assert_eq!(block.nonce, 0);
        assert!(block.verify_digest());
    }

    #[test]
    fn test_sealed_digest_meets_difficulty() {
        let mut block = candidate();
        seal(&mut block, 2, &SealBudget::unbounded()).unwrap();
        assert!(block.digest.starts_with("00"));
        assert_eq!(block.compute_digest().unwrap(), block.digest);
    }

    #[test]
    fn test_search_is_deterministic() {
        let mut a = candidate();
        let mut b = candidate();
        seal(&mut a, 2, &SealBudget::unbounded()).unwrap();
        seal(&mut b, 2, &SealBudget::unbounded()).unwrap();
        assert_eq!(a.nonce, b.nonce);
        assert_eq!(a.digest, b.digest);
    }

    #[test]
    fn test_cancelled_search_leaves_block_unsealed() {
        let flag = Arc::new(AtomicBool::new(true));
        let budget = SealBudget::unbounded().cancelled_by(flag);
        let mut block = candidate();

        // 64 zeros is unreachable, so only the budget can stop the search
        let err = seal(&mut block, 64, &budget).unwrap_err();
        match err {
            Error::SealAborted { reason, attempts } => {
                assert_eq!(reason, "cancelled");
                assert_eq!(attempts, BUDGET_CHECK_INTERVAL);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(block.nonce, 0);
        assert!(block.digest.is_empty());
    }

    #[test]
    fn test_deadline_stops_search() {
        let budget = SealBudget::with_timeout(Duration::from_millis(20));
        let mut block = candidate();
        let err = seal(&mut block, 64, &budget).unwrap_err();
        assert!(matches!(err, Error::SealAborted { .. }));
    }
}
