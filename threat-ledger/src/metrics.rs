//! Metrics collection for observability
//!
//! Prometheus metrics registered on a per-ledger registry.
//!
//! # Metrics
//!
//! - `ledger_transactions_ingested_total` - Event records accepted into the pool
//! - `ledger_blocks_sealed_total` - Blocks appended after sealing
//! - `ledger_seal_aborted_total` - Nonce searches stopped by their budget
//! - `ledger_seal_duration_seconds` - Histogram of nonce search wall time
//! - `ledger_seal_attempts` - Histogram of nonces hashed per seal
//! - `ledger_pending_transactions` - Current pool size
//! - `ledger_persist_failures_total` - Artifact writes that failed

use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Records ingested
    pub transactions_ingested: IntCounter,

    /// Blocks sealed
    pub blocks_sealed: IntCounter,

    /// Seals aborted by deadline or cancellation
    pub seals_aborted: IntCounter,

    /// Seal duration histogram
    pub seal_duration: Histogram,

    /// Nonce attempts histogram
    pub seal_attempts: Histogram,

    /// Pending pool size
    pub pending_transactions: IntGauge,

    /// Failed artifact writes
    pub persist_failures: IntCounter,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("transactions_ingested", &self.transactions_ingested.get())
            .field("blocks_sealed", &self.blocks_sealed.get())
            .field("pending_transactions", &self.pending_transactions.get())
            .finish()
    }
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let transactions_ingested = IntCounter::new(
            "ledger_transactions_ingested_total",
            "Event records accepted into the pending pool",
        )?;
        registry.register(Box::new(transactions_ingested.clone()))?;

        let blocks_sealed =
            IntCounter::new("ledger_blocks_sealed_total", "Blocks sealed and appended")?;
        registry.register(Box::new(blocks_sealed.clone()))?;

        let seals_aborted = IntCounter::new(
            "ledger_seal_aborted_total",
            "Nonce searches stopped by deadline or cancellation",
        )?;
        registry.register(Box::new(seals_aborted.clone()))?;

        let seal_duration = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_seal_duration_seconds",
                "Histogram of nonce search wall time",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.010, 0.050, 0.100, 0.500, 1.0, 5.0]),
        )?;
        registry.register(Box::new(seal_duration.clone()))?;

        let seal_attempts = Histogram::with_opts(
            HistogramOpts::new("ledger_seal_attempts", "Nonces hashed per seal")
                .buckets(vec![1.0, 16.0, 256.0, 4096.0, 65536.0, 1048576.0]),
        )?;
        registry.register(Box::new(seal_attempts.clone()))?;

        let pending_transactions =
            IntGauge::new("ledger_pending_transactions", "Current pending pool size")?;
        registry.register(Box::new(pending_transactions.clone()))?;

        let persist_failures = IntCounter::new(
            "ledger_persist_failures_total",
            "Artifact writes that failed",
        )?;
        registry.register(Box::new(persist_failures.clone()))?;

        Ok(Self {
            transactions_ingested,
            blocks_sealed,
            seals_aborted,
            seal_duration,
            seal_attempts,
            pending_transactions,
            persist_failures,
            registry,
        })
    }

    /// Record an accepted record and the resulting pool size
    pub fn record_ingest(&self, pending: usize) {
        self.transactions_ingested.inc();
        self.pending_transactions.set(pending as i64);
    }

    /// Record a completed seal
    pub fn record_seal(&self, attempts: u64, duration_seconds: f64, pending: usize) {
        self.blocks_sealed.inc();
        self.seal_attempts.observe(attempts as f64);
        self.seal_duration.observe(duration_seconds);
        self.pending_transactions.set(pending as i64);
    }

    /// Record an aborted seal
    pub fn record_seal_aborted(&self) {
        self.seals_aborted.inc();
    }

    /// Record a failed artifact write
    pub fn record_persist_failure(&self) {
        self.persist_failures.inc();
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.transactions_ingested.get(), 0);
        assert_eq!(metrics.blocks_sealed.get(), 0);
        assert_eq!(metrics.registry().gather().len(), 7);
    }

    #[test]
    fn test_independent_instances() {
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();
        a.record_ingest(1);
        assert_eq!(a.transactions_ingested.get(), 1);
        assert_eq!(b.transactions_ingested.get(), 0);
    }

    #[test]
    fn test_record_seal() {
        let metrics = Metrics::new().unwrap();
        metrics.record_ingest(5);
        assert_eq!(metrics.pending_transactions.get(), 5);

        metrics.record_seal(300, 0.002, 0);
        assert_eq!(metrics.blocks_sealed.get(), 1);
        assert_eq!(metrics.pending_transactions.get(), 0);
        assert_eq!(metrics.seal_attempts.get_sample_count(), 1);
    }
}
