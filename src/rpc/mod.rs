//! Network client
//!
//! Two seams: [`ContractRpc`] for contract calls (account, simulate, send,
//! status) and [`LedgerQuery`] for account/payment reads. HTTP
//! implementations live in [`jsonrpc`] and [`horizon`]; tests plug in
//! scripted doubles.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::tx_builder::envelope::{Envelope, ScVal};
use crate::types::Address;

pub mod horizon;
pub mod jsonrpc;
pub mod rpc_errors;

pub use horizon::HorizonClient;
pub use jsonrpc::JsonRpcContractClient;
pub use rpc_errors::RpcError;

/// Source account as seen by the contract RPC
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceAccount {
    pub id: Address,
    pub sequence: i64,
}

/// Return value and auth entries of a successful simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    #[serde(default)]
    pub retval: Option<ScVal>,
    #[serde(default)]
    pub auth: Vec<String>,
}

/// Dry-run response; `error` and `result` are mutually exclusive in practice
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub result: Option<SimulationResult>,
    #[serde(default)]
    pub transaction_data: Option<String>,
    #[serde(default)]
    pub min_resource_fee: Option<u64>,
    #[serde(default)]
    pub latest_ledger: Option<u32>,
}

macro_rules! string_status {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($variant,)+
            /// Status string this client does not know about, kept verbatim
            Other(String),
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                match self {
                    $(Self::$variant => $text,)+
                    Self::Other(s) => s,
                }
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                match value.as_str() {
                    $($text => Self::$variant,)+
                    _ => Self::Other(value),
                }
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.as_str().to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_status!(
    /// Immediate status of a submission
    SendStatus {
        Pending => "PENDING",
        Duplicate => "DUPLICATE",
        TryAgainLater => "TRY_AGAIN_LATER",
        Error => "ERROR",
    }
);

string_status!(
    /// Final status of a submitted transaction
    TxStatus {
        NotFound => "NOT_FOUND",
        Success => "SUCCESS",
        Failed => "FAILED",
    }
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    pub hash: String,
    pub status: SendStatus,
    #[serde(default)]
    pub error_result: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStatusResponse {
    pub status: TxStatus,
    #[serde(default)]
    pub return_value: Option<ScVal>,
    #[serde(default)]
    pub ledger: Option<u32>,
}

/// Contract RPC endpoint
#[async_trait]
pub trait ContractRpc: Send + Sync {
    async fn get_account(&self, address: &Address) -> Result<SourceAccount, RpcError>;

    async fn simulate(&self, envelope: &Envelope) -> Result<SimulationResponse, RpcError>;

    async fn send(&self, envelope: &Envelope) -> Result<SendResponse, RpcError>;

    async fn get_transaction(&self, hash: &str) -> Result<TransactionStatusResponse, RpcError>;
}

/// One asset balance line of an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceLine {
    pub asset_type: String,
    #[serde(default)]
    pub asset_code: Option<String>,
    #[serde(default)]
    pub asset_issuer: Option<String>,
    pub balance: String,
}

impl BalanceLine {
    pub fn is_native(&self) -> bool {
        self.asset_type == "native"
    }
}

/// Ledger view of an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub account_id: String,
    pub sequence: String,
    #[serde(default)]
    pub subentry_count: u32,
    #[serde(default)]
    pub num_sponsored: u32,
    #[serde(default)]
    pub num_sponsoring: u32,
    #[serde(default)]
    pub balances: Vec<BalanceLine>,
}

impl AccountRecord {
    pub fn native_balance(&self) -> Option<&str> {
        self.balances
            .iter()
            .find(|b| b.is_native())
            .map(|b| b.balance.as_str())
    }
}

/// Payment-like operation touching an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub asset_type: Option<String>,
    #[serde(default)]
    pub asset_code: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub transaction_hash: Option<String>,
}

/// Latest closed ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub sequence: u64,
    #[serde(default)]
    pub successful_transaction_count: u64,
    #[serde(default)]
    pub operation_count: u64,
    #[serde(default)]
    pub fee_pool: String,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
}

/// Ledger query endpoint
#[async_trait]
pub trait LedgerQuery: Send + Sync {
    /// Load balances, sequence and sponsorship counters.
    /// An unfunded account is `RpcError::NotFound`.
    async fn load_account(&self, address: &Address) -> Result<AccountRecord, RpcError>;

    /// Most recent payments first
    async fn payments(&self, address: &Address, limit: u32) -> Result<Vec<PaymentRecord>, RpcError>;

    async fn latest_ledger(&self) -> Result<LedgerSummary, RpcError>;
}
