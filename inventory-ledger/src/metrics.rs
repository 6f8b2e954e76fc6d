//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `ledger_transactions_applied_total` - Movements committed
//! - `ledger_transactions_updated_total` - Compensating edits committed
//! - `ledger_transactions_reversed_total` - Reversals committed
//! - `ledger_rejections_total` - Operations rejected before mutation
//! - `ledger_commit_duration_seconds` - Histogram of commit latencies

use prometheus::{Histogram, HistogramOpts, IntCounter, Opts, Registry};
use std::sync::Arc;

/// Metrics collector with its own registry
#[derive(Clone)]
pub struct Metrics {
    /// Movements committed via create
    pub applied_total: IntCounter,

    /// Compensating edits committed
    pub updated_total: IntCounter,

    /// Reversals committed
    pub reversed_total: IntCounter,

    /// Operations rejected before any mutation
    pub rejections_total: IntCounter,

    /// Commit latency histogram
    pub commit_duration: Histogram,

    /// Prometheus registry holding the above
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let applied_total = IntCounter::with_opts(Opts::new(
            "ledger_transactions_applied_total",
            "Movements committed via create",
        ))?;
        registry.register(Box::new(applied_total.clone()))?;

        let updated_total = IntCounter::with_opts(Opts::new(
            "ledger_transactions_updated_total",
            "Compensating edits committed",
        ))?;
        registry.register(Box::new(updated_total.clone()))?;

        let reversed_total = IntCounter::with_opts(Opts::new(
            "ledger_transactions_reversed_total",
            "Reversals committed",
        ))?;
        registry.register(Box::new(reversed_total.clone()))?;

        let rejections_total = IntCounter::with_opts(Opts::new(
            "ledger_rejections_total",
            "Operations rejected before any mutation",
        ))?;
        registry.register(Box::new(rejections_total.clone()))?;

        let commit_duration = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_commit_duration_seconds",
                "Histogram of commit latencies",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
        )?;
        registry.register(Box::new(commit_duration.clone()))?;

        Ok(Self {
            applied_total,
            updated_total,
            reversed_total,
            rejections_total,
            commit_duration,
            registry,
        })
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("applied_total", &self.applied_total.get())
            .field("updated_total", &self.updated_total.get())
            .field("reversed_total", &self.reversed_total.get())
            .field("rejections_total", &self.rejections_total.get())
            .finish()
    }
}
