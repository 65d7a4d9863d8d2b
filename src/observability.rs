//! Trace identity of a contract invocation
//!
//! One correlation id follows an invocation from build to confirmation. Each
//! lifecycle stage opens a child span that keeps the contract and method, and
//! the transaction hash once it is known.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use crate::tx_builder::{Invocation, Stage};

/// Shared by every span of one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First 8 hex digits, used as the log context id
    pub fn short(&self) -> String {
        let mut simple = self.0.simple().to_string();
        simple.truncate(8);
        simple
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InvocationTrace {
    pub correlation_id: CorrelationId,
    pub span_id: Uuid,
    pub parent_span_id: Option<Uuid>,
    pub contract: String,
    pub method: String,
    /// Stage this span covers; `None` for the root span
    pub stage: Option<&'static str>,
    pub tx_hash: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl InvocationTrace {
    pub fn new(invocation: &Invocation) -> Self {
        Self {
            correlation_id: CorrelationId::new(),
            span_id: Uuid::new_v4(),
            parent_span_id: None,
            contract: invocation.contract.to_string(),
            method: invocation.method.clone(),
            stage: None,
            tx_hash: None,
            started_at: Utc::now(),
        }
    }

    pub fn child(&self, stage: Stage) -> Self {
        Self {
            span_id: Uuid::new_v4(),
            parent_span_id: Some(self.span_id),
            stage: Some(stage.as_str()),
            started_at: Utc::now(),
            ..self.clone()
        }
    }

    pub fn with_hash(mut self, hash: &str) -> Self {
        self.tx_hash = Some(hash.to_string());
        self
    }

    /// `tracing` span carrying the invocation identity
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "invocation",
            correlation_id = %self.correlation_id.short(),
            method = %self.method,
            contract = %self.contract,
            stage = self.stage.unwrap_or("root"),
        )
    }
}
