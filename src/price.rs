//! Spot price lookup

use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_ASSET_ID: &str = "stellar";
pub const DEFAULT_VS_CURRENCY: &str = "usd";

#[derive(Error, Debug)]
pub enum PriceError {
    #[error("Price API unreachable: {0}")]
    Transport(String),

    #[error("Price API returned HTTP {0}")]
    Http(u16),

    #[error("Price API response malformed: {0}")]
    Decode(String),

    #[error("No price for '{0}'")]
    MissingAsset(String),
}

impl PriceError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Http(status) => *status == 429 || *status >= 500,
            Self::Decode(_) | Self::MissingAsset(_) => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceQuote {
    pub price: f64,
    /// Percent change over 24h, 0 when not reported
    pub change_24h: f64,
}

pub struct PriceClient {
    http: reqwest::Client,
    api_url: String,
}

impl PriceClient {
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self, PriceError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PriceError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub async fn get_price(&self, asset_id: &str, vs: &str) -> Result<PriceQuote, PriceError> {
        let url = format!("{}/simple/price", self.api_url);
        debug!(url = %url, asset = %asset_id, vs = %vs, "Price request");

        let resp = self
            .http
            .get(&url)
            .query(&[
                ("ids", asset_id),
                ("vs_currencies", vs),
                ("include_24hr_change", "true"),
            ])
            .send()
            .await
            .map_err(|e| PriceError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(PriceError::Http(resp.status().as_u16()));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| PriceError::Decode(e.to_string()))?;

        parse_quote(&body, asset_id, vs)
    }
}

fn parse_quote(body: &Value, asset_id: &str, vs: &str) -> Result<PriceQuote, PriceError> {
    let entry = body
        .get(asset_id)
        .ok_or_else(|| PriceError::MissingAsset(asset_id.to_string()))?;
    let price = entry
        .get(vs)
        .and_then(Value::as_f64)
        .ok_or_else(|| PriceError::MissingAsset(format!("{}/{}", asset_id, vs)))?;
    let change_24h = entry
        .get(format!("{}_24h_change", vs))
        .and_then(Value::as_f64)
        .unwrap_or(0.0);

    Ok(PriceQuote { price, change_24h })
}
