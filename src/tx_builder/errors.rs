//! Error types for the transaction lifecycle client
//!
//! One enum covers every stage of a contract invocation:
//! build, simulate, prepare, sign, submit and confirm. Read-only queries
//! surface the same errors instead of a zero sentinel.

use thiserror::Error;

use crate::rpc::RpcError;
use crate::types::TypeError;

/// Error raised while driving a contract invocation
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// The invocation could not be assembled (bad contract id, bad args)
    #[error("Build error: {0}")]
    Build(String),

    /// An address or amount argument failed to parse
    #[error("Invalid argument: {0}")]
    InvalidArgument(#[from] TypeError),

    /// Network client failure on any stage
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    /// Dry-run execution reported an error or returned no result.
    /// Terminal, never retried.
    #[error("Simulation failed: {0}")]
    Simulation(String),

    /// The wallet refused or failed to sign
    #[error("Signing failed: {0}")]
    Signing(String),

    /// The network answered the submission with a non-pending status
    #[error("Transaction failed: {status}{}", fmt_detail(.detail))]
    Submission {
        status: String,
        detail: Option<String>,
    },

    /// Final status other than success, or the poll budget ran out
    #[error("Transaction failed: {status}")]
    Confirmation { status: String, attempts: u32 },

    /// The caller-supplied confirmation deadline passed
    #[error("Confirmation timed out after {attempts} polls ({elapsed_ms}ms)")]
    Timeout { attempts: u32, elapsed_ms: u64 },

    /// The caller cancelled the confirmation wait
    #[error("Confirmation cancelled after {attempts} polls")]
    Cancelled { attempts: u32 },

    /// Envelope could not be encoded for or decoded from the wallet
    #[error("Envelope codec error: {0}")]
    Codec(String),

    /// The contract returned a value of an unexpected shape
    #[error("Unexpected return value: {0}")]
    ReturnValue(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Stage machine invariant violated
    #[error("Internal error: {0}")]
    Internal(String),
}

fn fmt_detail(detail: &Option<String>) -> String {
    match detail {
        Some(d) if !d.is_empty() => format!(" ({})", d),
        _ => String::new(),
    }
}

impl LifecycleError {
    /// Whether re-triggering the same action might succeed.
    ///
    /// Nothing in the lifecycle retries on its own; this only feeds the
    /// status line and metrics.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Rpc(e) => e.is_retryable(),
            Self::Timeout { .. } => true,
            Self::Cancelled { .. } => true,
            Self::Submission { status, .. } => status == "TRY_AGAIN_LATER",

            Self::Build(_) => false,
            Self::InvalidArgument(_) => false,
            Self::Simulation(_) => false,
            Self::Signing(_) => false,
            Self::Confirmation { .. } => false,
            Self::Codec(_) => false,
            Self::ReturnValue(_) => false,
            Self::Configuration(_) => false,
            Self::Internal(_) => false,
        }
    }

    /// Error category for metrics labels
    pub fn category(&self) -> &'static str {
        match self {
            Self::Build(_) => "build",
            Self::InvalidArgument(_) => "argument",
            Self::Rpc(_) => "rpc",
            Self::Simulation(_) => "simulation",
            Self::Signing(_) => "signing",
            Self::Submission { .. } => "submission",
            Self::Confirmation { .. } => "confirmation",
            Self::Timeout { .. } => "timeout",
            Self::Cancelled { .. } => "cancelled",
            Self::Codec(_) => "codec",
            Self::ReturnValue(_) => "return_value",
            Self::Configuration(_) => "config",
            Self::Internal(_) => "internal",
        }
    }

    /// Simulation message, if this is a simulation failure
    pub fn simulation_message(&self) -> Option<&str> {
        match self {
            Self::Simulation(msg) => Some(msg),
            _ => None,
        }
    }
}

// Convenience constructors
impl LifecycleError {
    pub fn simulation_failed(reason: impl Into<String>) -> Self {
        Self::Simulation(reason.into())
    }

    pub fn signing_failed(reason: impl Into<String>) -> Self {
        Self::Signing(reason.into())
    }

    pub fn unexpected_return(reason: impl Into<String>) -> Self {
        Self::ReturnValue(reason.into())
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal(reason.into())
    }
}
