//! Metrics collection and export module

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::time::Instant;

use crate::tx_builder::LifecycleError;

/// Lifecycle and query metrics, one registry per client
pub struct LifecycleMetrics {
    registry: Registry,

    // Counters
    pub invocations_total: IntCounter,
    pub invocations_success: IntCounter,
    pub invocations_failed: IntCounterVec,
    pub simulations_total: IntCounter,
    pub confirmation_polls: IntCounter,
    pub read_queries_total: IntCounter,
    pub read_queries_failed: IntCounter,
    pub swap_quotes_total: IntCounter,

    // Gauges
    pub pending_confirmations: IntGauge,

    // Histograms
    pub invocation_latency: Histogram,
    pub rpc_latency: Histogram,
    pub confirmation_attempts: Histogram,
}

impl LifecycleMetrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let invocations_total = IntCounter::with_opts(Opts::new(
            "invocations_total",
            "Contract invocations started",
        ))?;

        let invocations_success = IntCounter::with_opts(Opts::new(
            "invocations_success",
            "Contract invocations confirmed successfully",
        ))?;

        let invocations_failed = IntCounterVec::new(
            Opts::new("invocations_failed", "Contract invocations that failed"),
            &["category"],
        )?;

        let simulations_total =
            IntCounter::with_opts(Opts::new("simulations_total", "Dry-run simulations issued"))?;

        let confirmation_polls = IntCounter::with_opts(Opts::new(
            "confirmation_polls",
            "Transaction status polls issued",
        ))?;

        let read_queries_total =
            IntCounter::with_opts(Opts::new("read_queries_total", "Read-only contract queries"))?;

        let read_queries_failed = IntCounter::with_opts(Opts::new(
            "read_queries_failed",
            "Read-only contract queries that failed",
        ))?;

        let swap_quotes_total =
            IntCounter::with_opts(Opts::new("swap_quotes_total", "Swap path lookups"))?;

        let pending_confirmations = IntGauge::with_opts(Opts::new(
            "pending_confirmations",
            "Transactions currently awaiting confirmation",
        ))?;

        let invocation_latency = Histogram::with_opts(
            HistogramOpts::new(
                "invocation_latency_seconds",
                "Build to confirmation latency",
            )
            .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 30.0, 60.0]),
        )?;

        let rpc_latency = Histogram::with_opts(
            HistogramOpts::new("rpc_latency_seconds", "RPC call latency")
                .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        )?;

        let confirmation_attempts = Histogram::with_opts(
            HistogramOpts::new(
                "confirmation_attempts",
                "Status polls needed per confirmed transaction",
            )
            .buckets(vec![1.0, 2.0, 3.0, 5.0, 10.0, 20.0, 30.0]),
        )?;

        // Register all metrics
        registry.register(Box::new(invocations_total.clone()))?;
        registry.register(Box::new(invocations_success.clone()))?;
        registry.register(Box::new(invocations_failed.clone()))?;
        registry.register(Box::new(simulations_total.clone()))?;
        registry.register(Box::new(confirmation_polls.clone()))?;
        registry.register(Box::new(read_queries_total.clone()))?;
        registry.register(Box::new(read_queries_failed.clone()))?;
        registry.register(Box::new(swap_quotes_total.clone()))?;
        registry.register(Box::new(pending_confirmations.clone()))?;
        registry.register(Box::new(invocation_latency.clone()))?;
        registry.register(Box::new(rpc_latency.clone()))?;
        registry.register(Box::new(confirmation_attempts.clone()))?;

        Ok(Self {
            registry,
            invocations_total,
            invocations_success,
            invocations_failed,
            simulations_total,
            confirmation_polls,
            read_queries_total,
            read_queries_failed,
            swap_quotes_total,
            pending_confirmations,
            invocation_latency,
            rpc_latency,
            confirmation_attempts,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_failure(&self, err: &LifecycleError) {
        self.invocations_failed
            .with_label_values(&[err.category()])
            .inc();
    }

    /// Prometheus text exposition of every registered metric
    pub fn gather_text(&self) -> anyhow::Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.start.elapsed().as_secs_f64());
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
