//! JSON-RPC 2.0 contract endpoint client

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{
    ContractRpc, RpcError, SendResponse, SimulationResponse, SourceAccount,
    TransactionStatusResponse,
};
use crate::tx_builder::envelope::{Envelope, EnvelopeCodec, JsonEnvelopeCodec};
use crate::types::Address;

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcReply {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct AccountReply {
    id: String,
    sequence: String,
}

/// Contract RPC over HTTP JSON-RPC
pub struct JsonRpcContractClient {
    http: reqwest::Client,
    endpoint: String,
    codec: Arc<dyn EnvelopeCodec>,
    timeout: Duration,
    next_id: AtomicU64,
}

impl JsonRpcContractClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, RpcError> {
        Self::with_codec(endpoint, timeout, Arc::new(JsonEnvelopeCodec))
    }

    pub fn with_codec(
        endpoint: impl Into<String>,
        timeout: Duration,
        codec: Arc<dyn EnvelopeCodec>,
    ) -> Result<Self, RpcError> {
        let endpoint = endpoint.into();
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Transport {
                endpoint: endpoint.clone(),
                message: e.to_string(),
            })?;

        Ok(Self {
            http,
            endpoint,
            codec,
            timeout,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let timeout_ms = self.timeout.as_millis() as u64;

        debug!(endpoint = %self.endpoint, method = %method, id = id, "JSON-RPC request");

        let resp = self
            .http
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| RpcError::from_reqwest(&self.endpoint, e, timeout_ms))?;

        if !resp.status().is_success() {
            return Err(RpcError::Http {
                endpoint: self.endpoint.clone(),
                status: resp.status().as_u16(),
            });
        }

        let reply: RpcReply = resp
            .json()
            .await
            .map_err(|e| RpcError::from_reqwest(&self.endpoint, e, timeout_ms))?;

        if let Some(err) = reply.error {
            return Err(RpcError::RpcResponse {
                endpoint: self.endpoint.clone(),
                message: err.message,
                code: Some(err.code),
            });
        }

        let result = reply
            .result
            .ok_or_else(|| RpcError::decode(&self.endpoint, format!("{}: missing result", method)))?;
        serde_json::from_value(result)
            .map_err(|e| RpcError::decode(&self.endpoint, format!("{}: {}", method, e)))
    }

    fn encode(&self, envelope: &Envelope) -> Result<String, RpcError> {
        self.codec
            .encode(envelope)
            .map_err(|e| RpcError::decode(&self.endpoint, e.to_string()))
    }
}

#[async_trait]
impl ContractRpc for JsonRpcContractClient {
    async fn get_account(&self, address: &Address) -> Result<SourceAccount, RpcError> {
        let reply: AccountReply = self
            .call("getAccount", json!({ "address": address.as_str() }))
            .await?;
        let id = Address::parse(&reply.id)
            .map_err(|e| RpcError::decode(&self.endpoint, e.to_string()))?;
        let sequence = reply
            .sequence
            .parse()
            .map_err(|_| RpcError::decode(&self.endpoint, "sequence is not an integer"))?;
        Ok(SourceAccount { id, sequence })
    }

    async fn simulate(&self, envelope: &Envelope) -> Result<SimulationResponse, RpcError> {
        let tx = self.encode(envelope)?;
        self.call("simulateTransaction", json!({ "transaction": tx }))
            .await
    }

    async fn send(&self, envelope: &Envelope) -> Result<SendResponse, RpcError> {
        let tx = self.encode(envelope)?;
        self.call("sendTransaction", json!({ "transaction": tx })).await
    }

    async fn get_transaction(&self, hash: &str) -> Result<TransactionStatusResponse, RpcError> {
        self.call("getTransaction", json!({ "hash": hash })).await
    }
}
