//! REST ledger query client (accounts, payments, ledgers)

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{AccountRecord, LedgerQuery, LedgerSummary, PaymentRecord, RpcError};
use crate::types::Address;

#[derive(Debug, Deserialize)]
struct Embedded<T> {
    records: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(rename = "_embedded")]
    embedded: Embedded<T>,
}

pub struct HorizonClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HorizonClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RpcError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Transport {
                endpoint: base_url.clone(),
                message: e.to_string(),
            })?;
        Ok(Self {
            http,
            base_url,
            timeout,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        resource: &str,
    ) -> Result<T, RpcError> {
        let url = format!("{}{}", self.base_url, path);
        let timeout_ms = self.timeout.as_millis() as u64;
        debug!(url = %url, "Ledger query");

        let resp = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| RpcError::from_reqwest(&self.base_url, e, timeout_ms))?;

        match resp.status().as_u16() {
            404 => Err(RpcError::NotFound {
                resource: resource.to_string(),
                endpoint: self.base_url.clone(),
            }),
            s if !(200..300).contains(&s) => Err(RpcError::Http {
                endpoint: self.base_url.clone(),
                status: s,
            }),
            _ => resp
                .json()
                .await
                .map_err(|e| RpcError::from_reqwest(&self.base_url, e, timeout_ms)),
        }
    }
}

#[async_trait]
impl LedgerQuery for HorizonClient {
    async fn load_account(&self, address: &Address) -> Result<AccountRecord, RpcError> {
        self.get_json(
            &format!("/accounts/{}", address),
            &[],
            &format!("account {}", address),
        )
        .await
    }

    async fn payments(&self, address: &Address, limit: u32) -> Result<Vec<PaymentRecord>, RpcError> {
        let page: Page<PaymentRecord> = self
            .get_json(
                &format!("/accounts/{}/payments", address),
                &[("order", "desc".to_string()), ("limit", limit.to_string())],
                &format!("payments of {}", address),
            )
            .await?;
        Ok(page.embedded.records)
    }

    async fn latest_ledger(&self) -> Result<LedgerSummary, RpcError> {
        let page: Page<LedgerSummary> = self
            .get_json(
                "/ledgers",
                &[("order", "desc".to_string()), ("limit", "1".to_string())],
                "latest ledger",
            )
            .await?;
        page.embedded
            .records
            .into_iter()
            .next()
            .ok_or_else(|| RpcError::decode(&self.base_url, "empty ledger page"))
    }
}
