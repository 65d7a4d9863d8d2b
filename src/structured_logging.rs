//! Structured logging for contract invocations

use std::time::Instant;

use crate::observability::InvocationTrace;
use crate::tx_builder::Invocation;

/// Structured logger for lifecycle events
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    context_id: String,
}

impl StructuredLogger {
    pub fn new(context_id: String) -> Self {
        Self { context_id }
    }

    pub fn log_stage(&self, stage: &str, method: &str, contract: &str) {
        tracing::debug!(
            context_id = %self.context_id,
            stage = %stage,
            method = %method,
            contract = %contract,
            "Lifecycle stage reached"
        );
    }

    pub fn log_simulation(&self, method: &str, min_resource_fee: Option<u64>, ok: bool) {
        tracing::debug!(
            context_id = %self.context_id,
            method = %method,
            min_resource_fee = ?min_resource_fee,
            ok = %ok,
            "Simulation finished"
        );
    }

    pub fn log_submitted(&self, method: &str, hash: &str) {
        tracing::info!(
            context_id = %self.context_id,
            method = %method,
            hash = %hash,
            "Transaction submitted"
        );
    }

    pub fn log_poll(&self, hash: &str, attempt: u32, status: &str) {
        tracing::debug!(
            context_id = %self.context_id,
            hash = %hash,
            attempt = %attempt,
            status = %status,
            "Confirmation poll"
        );
    }

    pub fn log_confirmed(&self, hash: &str, attempts: u32, latency_ms: u64) {
        tracing::info!(
            context_id = %self.context_id,
            hash = %hash,
            attempts = %attempts,
            latency_ms = %latency_ms,
            "Transaction confirmed"
        );
    }

    pub fn log_failure(&self, stage: &str, error: &str, latency_ms: u64) {
        tracing::warn!(
            context_id = %self.context_id,
            stage = %stage,
            error = %error,
            latency_ms = %latency_ms,
            "Transaction failed"
        );
    }
}

/// Per-invocation context: trace ids, logger, wall clock
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub trace: InvocationTrace,
    pub logger: StructuredLogger,
    started: Instant,
}

impl OperationContext {
    pub fn new(invocation: &Invocation) -> Self {
        let trace = InvocationTrace::new(invocation);
        let logger = StructuredLogger::new(trace.correlation_id.short());
        Self {
            trace,
            logger,
            started: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}
