//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the ledger.
//!
//! # Metrics
//!
//! - `ledger_commits_total` - Entries appended
//! - `ledger_idempotency_rejections_total` - Commits rejected for a reused idempotency key
//! - `ledger_double_count_rejections_total` - Commits rejected for a reused ADC key
//! - `ledger_chain_length` - Current number of entries
//! - `ledger_commit_duration_seconds` - Histogram of commit latencies
//! - `optimizer_yield_minor_units_total` - Value captured by optimized plans
//!
//! Each collector owns its own [`Registry`], so several ledgers (or tests) can
//! coexist in one process.

use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Entries appended
    pub commits_total: IntCounter,

    /// Idempotency rejections
    pub idempotency_rejections: IntCounter,

    /// Double-count rejections
    pub double_count_rejections: IntCounter,

    /// Chain length
    pub chain_length: IntGauge,

    /// Commit duration histogram
    pub commit_duration: Histogram,

    /// Value captured by optimized plans
    pub optimized_yield: IntCounter,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let commits_total =
            IntCounter::new("ledger_commits_total", "Total number of entries appended")?;
        registry.register(Box::new(commits_total.clone()))?;

        let idempotency_rejections = IntCounter::new(
            "ledger_idempotency_rejections_total",
            "Commits rejected because the idempotency key was reused",
        )?;
        registry.register(Box::new(idempotency_rejections.clone()))?;

        let double_count_rejections = IntCounter::new(
            "ledger_double_count_rejections_total",
            "Commits rejected because the anti-double-count key was reused",
        )?;
        registry.register(Box::new(double_count_rejections.clone()))?;

        let chain_length = IntGauge::new("ledger_chain_length", "Number of entries in the chain")?;
        registry.register(Box::new(chain_length.clone()))?;

        let commit_duration = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_commit_duration_seconds",
                "Histogram of commit latencies",
            )
            .buckets(vec![0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.010]),
        )?;
        registry.register(Box::new(commit_duration.clone()))?;

        let optimized_yield = IntCounter::new(
            "optimizer_yield_minor_units_total",
            "Total value captured by optimized yield plans",
        )?;
        registry.register(Box::new(optimized_yield.clone()))?;

        Ok(Self {
            commits_total,
            idempotency_rejections,
            double_count_rejections,
            chain_length,
            commit_duration,
            optimized_yield,
            registry,
        })
    }

    /// Record a successful commit
    pub fn record_commit(&self, chain_length: usize, duration_seconds: f64) {
        self.commits_total.inc();
        self.chain_length.set(chain_length as i64);
        self.commit_duration.observe(duration_seconds);
    }

    /// Record an idempotency rejection
    pub fn record_idempotency_rejection(&self) {
        self.idempotency_rejections.inc();
    }

    /// Record a double-count rejection
    pub fn record_double_count_rejection(&self) {
        self.double_count_rejections.inc();
    }

    /// Record the yield of an optimized plan
    pub fn record_plan_yield(&self, total_yield: u64) {
        self.optimized_yield.inc_by(total_yield);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
