//! Swap path resolver and router client
//!
//! The routing API returns an opaque swap chain plus an estimated output.
//! The chain is handed to the router contract's `swap_chained` together with
//! a minimum output derived from the slippage tolerance.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::tx_builder::{Invocation, LifecycleError, ScVal, TxLifecycle};
use crate::types::{Address, Amount, StellarAsset, TypeError};

pub const DEFAULT_SLIPPAGE_BPS: u32 = 100;
const BPS_DENOMINATOR: u128 = 10_000;

/// Token contracts wrapping classic assets use 7 decimals
pub const SWAP_DECIMALS: u32 = 7;

#[derive(Error, Debug)]
pub enum SwapError {
    #[error("Testnet tokens not registered in Aquarius: {}", .0.join(", "))]
    UnregisteredToken(Vec<String>),

    #[error("No liquidity pools available on testnet. This feature works on mainnet.")]
    NoLiquidity,

    #[error("Aquarius API: {0}")]
    Api(String),

    #[error("Aquarius API unavailable. Please try again later.")]
    Unavailable(String),

    #[error("Unknown token '{0}'")]
    UnknownToken(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] TypeError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

impl SwapError {
    pub fn category(&self) -> &'static str {
        match self {
            Self::UnregisteredToken(_) => "unregistered_token",
            Self::NoLiquidity => "no_liquidity",
            Self::Api(_) => "api",
            Self::Unavailable(_) => "unavailable",
            Self::UnknownToken(_) => "unknown_token",
            Self::InvalidAmount(_) => "argument",
            Self::Lifecycle(e) => e.category(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Unavailable(_) => true,
            Self::Lifecycle(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Which side of the trade the amount fixes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapMode {
    /// Amount is what the user sends
    StrictSend,
    /// Amount is what the user wants to receive
    StrictReceive,
}

impl SwapMode {
    fn path(&self) -> &'static str {
        match self {
            Self::StrictSend => "/find-path/",
            Self::StrictReceive => "/find-path-strict-receive/",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapQuote {
    /// Opaque base64 swap chain for the router
    pub swap_chain_xdr: String,
    pub estimated_amount: u128,
}

/// floor(estimate × (1 − bps / 10000)), exact in integers
pub fn min_amount_out(estimate: u128, slippage_bps: u32) -> u128 {
    let keep = BPS_DENOMINATOR - u128::from(slippage_bps).min(BPS_DENOMINATOR);
    (estimate / BPS_DENOMINATOR) * keep + (estimate % BPS_DENOMINATOR) * keep / BPS_DENOMINATOR
}

#[derive(Debug, Deserialize)]
struct PathReply {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    swap_chain_xdr: Option<String>,
    #[serde(default)]
    amount: Option<Value>,
    #[serde(default)]
    token_in_address: Option<Vec<String>>,
    #[serde(default)]
    token_out_address: Option<Vec<String>>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl PathReply {
    fn into_error(self) -> SwapError {
        if self.token_in_address.is_some() || self.token_out_address.is_some() {
            let tokens = self
                .token_in_address
                .into_iter()
                .chain(self.token_out_address)
                .flatten()
                .collect();
            return SwapError::UnregisteredToken(tokens);
        }

        let message = self
            .error
            .or(self.message)
            .unwrap_or_else(|| "Failed to find swap path".to_string());
        if ["path", "pool", "liquidity"]
            .iter()
            .any(|needle| message.contains(needle))
        {
            SwapError::NoLiquidity
        } else {
            SwapError::Api(message)
        }
    }
}

fn parse_amount(value: &Value) -> Option<u128> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_u64().map(u128::from),
        _ => None,
    }
}

/// Client for the path-finding API
pub struct SwapPathResolver {
    http: reqwest::Client,
    api_url: String,
}

impl SwapPathResolver {
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self, SwapError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SwapError::Unavailable(e.to_string()))?;
        Ok(Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub async fn find_path(
        &self,
        token_in: &Address,
        token_out: &Address,
        amount: u128,
        mode: SwapMode,
    ) -> Result<SwapQuote, SwapError> {
        let url = format!("{}{}", self.api_url, mode.path());
        let body = json!({
            "token_in_address": token_in.as_str(),
            "token_out_address": token_out.as_str(),
            "amount": amount.to_string(),
        });
        debug!(url = %url, body = %body, "Swap path request");

        let resp = match self.http.post(&url).json(&body).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(url = %url, error = %e, "Swap routing API unreachable");
                return Err(SwapError::Unavailable(e.to_string()));
            }
        };

        let ok = resp.status().is_success();
        let reply: PathReply = resp
            .json()
            .await
            .map_err(|e| SwapError::Api(format!("invalid response: {}", e)))?;

        if !ok || !reply.success {
            return Err(reply.into_error());
        }

        let swap_chain_xdr = reply
            .swap_chain_xdr
            .ok_or_else(|| SwapError::Api("response has no swap chain".to_string()))?;
        let estimated_amount = reply
            .amount
            .as_ref()
            .and_then(parse_amount)
            .ok_or_else(|| SwapError::Api("response has no estimated amount".to_string()))?;

        Ok(SwapQuote {
            swap_chain_xdr,
            estimated_amount,
        })
    }
}

/// Swappable token known by symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapToken {
    pub symbol: String,
    pub asset: StellarAsset,
}

impl SwapToken {
    pub fn new(symbol: impl Into<String>, asset: StellarAsset) -> Self {
        Self {
            symbol: symbol.into(),
            asset,
        }
    }
}

/// Result of a confirmed swap
#[derive(Debug, Clone, PartialEq)]
pub struct SwapOutcome {
    pub hash: String,
    pub estimated_out: Amount,
    pub min_out: Amount,
    /// Router return value, when the network reported one
    pub received: Option<Amount>,
}

pub struct SwapClient {
    resolver: SwapPathResolver,
    lifecycle: Arc<TxLifecycle>,
    router: Address,
    tokens: Vec<SwapToken>,
    slippage_bps: u32,
}

impl SwapClient {
    pub fn new(
        resolver: SwapPathResolver,
        lifecycle: Arc<TxLifecycle>,
        router: Address,
        tokens: Vec<SwapToken>,
        slippage_bps: u32,
    ) -> Self {
        Self {
            resolver,
            lifecycle,
            router,
            tokens,
            slippage_bps,
        }
    }

    pub fn tokens(&self) -> &[SwapToken] {
        &self.tokens
    }

    /// Token contract for a symbol (case-insensitive)
    pub fn token_address(&self, symbol: &str) -> Result<Address, SwapError> {
        self.tokens
            .iter()
            .find(|t| t.symbol.eq_ignore_ascii_case(symbol))
            .map(|t| t.asset.contract_address(self.lifecycle.network_passphrase()))
            .ok_or_else(|| SwapError::UnknownToken(symbol.to_string()))
    }

    /// Strict-send swap of `amount` `from` into `to` through the router
    pub async fn swap(
        &self,
        user: &Address,
        from: &str,
        to: &str,
        amount: &str,
        cancel: &CancellationToken,
    ) -> Result<SwapOutcome, SwapError> {
        let token_in = self.token_address(from)?;
        let token_out = self.token_address(to)?;
        let amount_in = Amount::parse(amount, SWAP_DECIMALS)?;
        if amount_in.is_zero() {
            return Err(TypeError::InvalidAmount(amount.to_string()).into());
        }
        let amount_in_raw = amount_in.raw().unsigned_abs();

        self.lifecycle.metrics().swap_quotes_total.inc();
        let quote = self
            .resolver
            .find_path(&token_in, &token_out, amount_in_raw, SwapMode::StrictSend)
            .await?;
        let min_out = min_amount_out(quote.estimated_amount, self.slippage_bps);

        let estimated_out = to_amount(quote.estimated_amount)?;
        info!(
            from = %from,
            to = %to,
            amount = %amount_in,
            estimated_out = %estimated_out,
            "🔀 Swap path found"
        );

        let call = Invocation::new(
            self.router.clone(),
            "swap_chained",
            vec![
                ScVal::Address(user.clone()),
                ScVal::Raw(quote.swap_chain_xdr),
                ScVal::Address(token_in),
                ScVal::U128(amount_in_raw),
                ScVal::U128(min_out),
            ],
        );
        let outcome = self.lifecycle.invoke(user, call, cancel).await?;

        let received = match outcome.return_value.as_ref().and_then(ScVal::as_u128) {
            Some(raw) => Some(to_amount(raw)?),
            None => None,
        };
        if let Some(received) = &received {
            info!(hash = %outcome.hash, received = %received, to = %to, "✅ Swap confirmed");
        }

        Ok(SwapOutcome {
            hash: outcome.hash,
            estimated_out,
            min_out: to_amount(min_out)?,
            received,
        })
    }
}

fn to_amount(raw: u128) -> Result<Amount, SwapError> {
    let raw = i128::try_from(raw).map_err(|_| TypeError::AmountOverflow(raw.to_string()))?;
    Ok(Amount::from_raw(raw, SWAP_DECIMALS))
}
