use thiserror::Error;

/// Network client error types
#[derive(Debug, Clone, Error)]
pub enum RpcError {
    /// Transport-level errors (network, connection)
    #[error("Transport error: {message} (endpoint: {endpoint})")]
    Transport { endpoint: String, message: String },

    /// Timeout errors
    #[error("Timeout after {timeout_ms}ms (endpoint: {endpoint})")]
    Timeout { endpoint: String, timeout_ms: u64 },

    /// JSON-RPC error object returned by the server
    #[error("RPC response error: {message} (endpoint: {endpoint}, code: {code:?})")]
    RpcResponse {
        endpoint: String,
        message: String,
        code: Option<i64>,
    },

    /// Non-success HTTP status
    #[error("HTTP {status} (endpoint: {endpoint})")]
    Http { endpoint: String, status: u16 },

    /// Account or resource does not exist (unfunded account on ledger queries)
    #[error("Not found: {resource} (endpoint: {endpoint})")]
    NotFound { resource: String, endpoint: String },

    /// Response body did not match the expected shape
    #[error("Decode error: {message} (endpoint: {endpoint})")]
    Decode { endpoint: String, message: String },
}

impl RpcError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            RpcError::Transport { .. } => true,
            RpcError::Timeout { .. } => true,
            // Retry on server errors (5xx) and rate limiting
            RpcError::Http { status, .. } => *status == 429 || (500..600).contains(status),
            RpcError::RpcResponse { code, .. } => matches!(code, Some(c) if (-32099..=-32000).contains(c)),

            RpcError::NotFound { .. } => false,
            RpcError::Decode { .. } => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RpcError::NotFound { .. })
    }

    /// Classify a reqwest failure for `endpoint`
    pub fn from_reqwest(endpoint: &str, err: reqwest::Error, timeout_ms: u64) -> Self {
        if err.is_timeout() {
            RpcError::Timeout {
                endpoint: endpoint.to_string(),
                timeout_ms,
            }
        } else if err.is_decode() {
            RpcError::Decode {
                endpoint: endpoint.to_string(),
                message: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            RpcError::Http {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            }
        } else {
            RpcError::Transport {
                endpoint: endpoint.to_string(),
                message: err.to_string(),
            }
        }
    }

    pub fn decode(endpoint: &str, message: impl Into<String>) -> Self {
        RpcError::Decode {
            endpoint: endpoint.to_string(),
            message: message.into(),
        }
    }

    /// Error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self {
            RpcError::Transport { .. } => "transport",
            RpcError::Timeout { .. } => "timeout",
            RpcError::RpcResponse { .. } => "rpc_response",
            RpcError::Http { .. } => "http",
            RpcError::NotFound { .. } => "not_found",
            RpcError::Decode { .. } => "decode",
        }
    }
}
