//! Confirmation polling
//!
//! Polls the transaction status by hash while it is `NOT_FOUND`, with a fixed
//! interval and a hard cap on the number of polls. The caller may add an
//! overall deadline and cancel the wait at any point.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::envelope::ScVal;
use super::errors::LifecycleError;
use super::lifecycle::Stage;
use crate::metrics::LifecycleMetrics;
use crate::rpc::{ContractRpc, TxStatus};
use crate::structured_logging::OperationContext;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmPolicy {
    /// Sleep between consecutive polls
    pub interval: Duration,
    /// Total number of status polls, including the first
    pub max_attempts: u32,
    /// Hard deadline measured from the first poll. Bounds the sleeps and an
    /// in-flight status request alike.
    pub timeout: Option<Duration>,
}

impl Default for ConfirmPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout: None,
        }
    }
}

impl ConfirmPolicy {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Terminal success of a confirmation wait
#[derive(Debug, Clone, PartialEq)]
pub struct Confirmed {
    pub return_value: Option<ScVal>,
    pub ledger: Option<u32>,
    pub attempts: u32,
}

pub async fn wait_for_confirmation(
    rpc: &dyn ContractRpc,
    hash: &str,
    policy: &ConfirmPolicy,
    cancel: &CancellationToken,
    ctx: &OperationContext,
    metrics: &LifecycleMetrics,
) -> Result<Confirmed, LifecycleError> {
    let started = Instant::now();
    let deadline = policy.timeout.map(|timeout| started + timeout);
    let mut attempts: u32 = 0;
    let trace = ctx.trace.child(Stage::Confirmed).with_hash(hash);
    debug!(
        correlation_id = %trace.correlation_id,
        span_id = %trace.span_id,
        method = %trace.method,
        hash = %hash,
        max_attempts = policy.max_attempts,
        timeout_ms = ?policy.timeout.map(|t| t.as_millis()),
        "Waiting for confirmation"
    );

    loop {
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LifecycleError::Cancelled { attempts }),
            _ = until(deadline) => return Err(timed_out(attempts, started)),
            resp = rpc.get_transaction(hash) => resp?,
        };
        attempts += 1;
        metrics.confirmation_polls.inc();
        ctx.logger.log_poll(hash, attempts, response.status.as_str());

        match response.status {
            TxStatus::Success => {
                return Ok(Confirmed {
                    return_value: response.return_value,
                    ledger: response.ledger,
                    attempts,
                })
            }
            TxStatus::NotFound => {}
            other => {
                return Err(LifecycleError::Confirmation {
                    status: other.to_string(),
                    attempts,
                })
            }
        }

        if attempts >= policy.max_attempts {
            return Err(LifecycleError::Confirmation {
                status: TxStatus::NotFound.to_string(),
                attempts,
            });
        }

        let next_poll = Instant::now() + policy.interval;
        let wake = deadline.map_or(next_poll, |deadline| next_poll.min(deadline));
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LifecycleError::Cancelled { attempts }),
            _ = tokio::time::sleep_until(wake) => {}
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(timed_out(attempts, started));
        }
    }
}

/// Resolves at `deadline`, never when there is none
async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn timed_out(attempts: u32, started: Instant) -> LifecycleError {
    LifecycleError::Timeout {
        attempts,
        elapsed_ms: started.elapsed().as_millis() as u64,
    }
}
