//! Combined activity feed: ledger payments plus locally recorded vault
//! operations, newest first.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::rpc::PaymentRecord;
use crate::types::{Address, VaultTransactionRecord, VaultTxKind};

pub const DEFAULT_ACTIVITY_LIMIT: usize = 15;

/// Shown as the amount of a payment that moved no value
pub const NO_AMOUNT: &str = "—";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Received,
    Sent,
    ContractCall,
    VaultDeposit,
    VaultWithdraw,
}

impl ActivityKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Received => "Received",
            Self::Sent => "Sent",
            Self::ContractCall => "Contract Call",
            Self::VaultDeposit => "Vault Deposit",
            Self::VaultWithdraw => "Vault Withdraw",
        }
    }

    /// Value flowing towards the user
    pub fn is_inflow(&self) -> bool {
        matches!(self, Self::Received | Self::VaultDeposit)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityEntry {
    pub id: String,
    pub kind: ActivityKind,
    pub amount: String,
    pub asset: String,
    pub timestamp: DateTime<Utc>,
    pub tx_hash: String,
}

impl ActivityEntry {
    fn from_payment(owner: &Address, payment: &PaymentRecord) -> Self {
        let amount = payment
            .amount
            .as_deref()
            .and_then(|a| a.parse::<f64>().ok())
            .filter(|a| a.is_finite() && *a != 0.0);
        let tx_hash = payment
            .transaction_hash
            .clone()
            .unwrap_or_else(|| payment.id.clone());

        let (kind, amount, asset) = match amount {
            None => (ActivityKind::ContractCall, NO_AMOUNT.to_string(), "SOROBAN".to_string()),
            Some(value) => {
                let kind = if payment.to.as_deref() == Some(owner.as_str()) {
                    ActivityKind::Received
                } else {
                    ActivityKind::Sent
                };
                let asset = if payment.asset_type.as_deref() == Some("native") {
                    "XLM".to_string()
                } else {
                    payment
                        .asset_code
                        .clone()
                        .unwrap_or_else(|| "TOKEN".to_string())
                };
                (kind, format!("{:.2}", value), asset)
            }
        };

        Self {
            id: payment.id.clone(),
            kind,
            amount,
            asset,
            timestamp: payment.created_at,
            tx_hash,
        }
    }

    fn from_record(record: &VaultTransactionRecord) -> Self {
        let kind = match record.kind {
            VaultTxKind::Deposit => ActivityKind::VaultDeposit,
            VaultTxKind::Withdraw => ActivityKind::VaultWithdraw,
        };
        let amount = record
            .amount
            .parse::<f64>()
            .map(|v| format!("{:.2}", v))
            .unwrap_or_else(|_| record.amount.clone());

        Self {
            id: record.id.clone(),
            kind,
            amount,
            asset: record.asset.clone(),
            timestamp: record.timestamp,
            tx_hash: record.tx_hash.clone(),
        }
    }
}

pub fn merge_activity(
    owner: &Address,
    payments: &[PaymentRecord],
    records: &[VaultTransactionRecord],
    limit: usize,
) -> Vec<ActivityEntry> {
    let mut entries: Vec<ActivityEntry> = payments
        .iter()
        .map(|p| ActivityEntry::from_payment(owner, p))
        .chain(records.iter().map(ActivityEntry::from_record))
        .collect();
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    entries.truncate(limit);
    entries
}
