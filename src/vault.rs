//! Vault contract client
//!
//! Every call names its vault explicitly. Switching the selected vault in a
//! `VaultRegistry` never redirects a request that is already running.

use serde::Serialize;
use std::fmt::Display;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::storage::LocalStore;
use crate::tx_builder::{Invocation, LifecycleError, ScVal, TxLifecycle, TxOutcome};
use crate::types::{Address, Amount, TypeError, VaultConfig, VaultTransactionRecord, VaultTxKind};

/// Share-to-asset conversion rate assumed for display.
///
/// Mirrors the contract's fixed `10_500_000 / 10_000_000` b-rate; the
/// contract remains the source of truth.
pub const SHARE_RATE: f64 = 1.05;

/// Trap raised by a vault whose `init` was never called
const UNINITIALIZED_TRAP: &str = "UnreachableCodeReached";

pub const UNINITIALIZED_HINT: &str =
    "Contract not initialized! Run `pegaso init --vault <id>` to initialize the vault first.";

const KNOWN_TOKENS: &[(&str, &str)] = &[(
    "CDLZFC3SYJYDZT7K67VZ75HPJVIEUVNIXF47ZG2FB2RMQQVU2HHGCYSC",
    "XLM",
)];

/// User position in one vault
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VaultPosition {
    pub vault_id: String,
    pub symbol: String,
    pub shares: Amount,
    pub total_shares: Amount,
    /// `shares × SHARE_RATE`, display only
    pub asset_equivalent: f64,
    pub conversion_rate: String,
}

pub struct VaultClient {
    lifecycle: Arc<TxLifecycle>,
    store: LocalStore,
}

impl VaultClient {
    pub fn new(lifecycle: Arc<TxLifecycle>, store: LocalStore) -> Self {
        Self { lifecycle, store }
    }

    pub fn lifecycle(&self) -> &Arc<TxLifecycle> {
        &self.lifecycle
    }

    /// `init(pool, asset)` on the vault contract
    pub async fn init_vault(
        &self,
        user: &Address,
        vault: &VaultConfig,
        cancel: &CancellationToken,
    ) -> Result<TxOutcome, LifecycleError> {
        let args = vec![
            ScVal::Address(vault.pool_contract()?),
            ScVal::Address(vault.token_contract()?),
        ];
        let outcome = self
            .lifecycle
            .invoke(user, Invocation::new(contract_of(vault)?, "init", args), cancel)
            .await?;
        info!(vault = %vault.id, hash = %outcome.hash, "⚙️ Vault initialized");
        Ok(outcome)
    }

    pub async fn deposit(
        &self,
        user: &Address,
        vault: &VaultConfig,
        amount: &str,
        cancel: &CancellationToken,
    ) -> Result<TxOutcome, LifecycleError> {
        self.move_funds(VaultTxKind::Deposit, user, vault, amount, cancel)
            .await
    }

    pub async fn withdraw(
        &self,
        user: &Address,
        vault: &VaultConfig,
        amount: &str,
        cancel: &CancellationToken,
    ) -> Result<TxOutcome, LifecycleError> {
        self.move_funds(VaultTxKind::Withdraw, user, vault, amount, cancel)
            .await
    }

    async fn move_funds(
        &self,
        kind: VaultTxKind,
        user: &Address,
        vault: &VaultConfig,
        amount: &str,
        cancel: &CancellationToken,
    ) -> Result<TxOutcome, LifecycleError> {
        let scaled = Amount::parse(amount, vault.decimals)?;
        if scaled.is_zero() {
            return Err(TypeError::InvalidAmount(amount.to_string()).into());
        }

        let method = match kind {
            VaultTxKind::Deposit => "deposit",
            VaultTxKind::Withdraw => "withdraw",
        };
        let args = vec![ScVal::Address(user.clone()), ScVal::I128(scaled.raw())];
        let outcome = self
            .lifecycle
            .invoke(user, Invocation::new(contract_of(vault)?, method, args), cancel)
            .await?;

        info!(
            vault = %vault.id,
            method = %method,
            amount = %scaled,
            hash = %outcome.hash,
            "✅ Vault operation confirmed"
        );

        // The transaction is already final; a failed cache write only loses
        // the local history entry.
        let record = VaultTransactionRecord::new(kind, amount.trim(), &vault.symbol, &outcome.hash);
        if let Err(e) = self.store.record_transaction(&record) {
            warn!(hash = %outcome.hash, error = %e, "Failed to record vault transaction");
        }
        Ok(outcome)
    }

    /// Shares held by `user`
    pub async fn balance(&self, user: &Address, vault: &VaultConfig) -> Result<Amount, LifecycleError> {
        let call = Invocation::new(contract_of(vault)?, "balance", vec![ScVal::Address(user.clone())]);
        let value = self.lifecycle.read(user, call).await?;
        to_amount(&value, vault.decimals)
    }

    pub async fn total_shares(&self, vault: &VaultConfig) -> Result<Amount, LifecycleError> {
        let call = Invocation::new(contract_of(vault)?, "total_shares", vec![]);
        let value = self.lifecycle.read_with_fallback(call).await?;
        to_amount(&value, vault.decimals)
    }

    /// Underlying asset configured at `init`
    pub async fn asset_address(&self, vault: &VaultConfig) -> Result<Address, LifecycleError> {
        self.read_address(vault, "get_asset").await
    }

    /// Lending pool configured at `init`
    pub async fn pool_address(&self, vault: &VaultConfig) -> Result<Address, LifecycleError> {
        self.read_address(vault, "get_pool").await
    }

    async fn read_address(&self, vault: &VaultConfig, method: &str) -> Result<Address, LifecycleError> {
        let call = Invocation::new(contract_of(vault)?, method, vec![]);
        let value = self.lifecycle.read_with_fallback(call).await?;
        value.as_address().cloned().ok_or_else(|| {
            LifecycleError::unexpected_return(format!(
                "{} returned {}, expected address",
                method,
                value.type_name()
            ))
        })
    }

    /// Balance and total shares, fetched concurrently
    pub async fn position(&self, user: &Address, vault: &VaultConfig) -> Result<VaultPosition, LifecycleError> {
        let (shares, total_shares) =
            tokio::try_join!(self.balance(user, vault), self.total_shares(vault))?;

        Ok(VaultPosition {
            vault_id: vault.id.clone(),
            symbol: vault.symbol.clone(),
            asset_equivalent: shares.to_f64() * SHARE_RATE,
            conversion_rate: format!("{:.2}", SHARE_RATE),
            shares,
            total_shares,
        })
    }
}

fn contract_of(vault: &VaultConfig) -> Result<Address, LifecycleError> {
    if !vault.is_deployed() {
        return Err(LifecycleError::Configuration(format!(
            "vault '{}' is not deployed",
            vault.id
        )));
    }
    Ok(vault.vault_contract()?)
}

fn to_amount(value: &ScVal, decimals: u32) -> Result<Amount, LifecycleError> {
    value
        .as_i128()
        .map(|raw| Amount::from_raw(raw, decimals))
        .ok_or_else(|| {
            LifecycleError::unexpected_return(format!("expected i128, got {}", value.type_name()))
        })
}

/// Yield implied by [`SHARE_RATE`], e.g. `"5.00%"`
pub fn pool_apy() -> String {
    format!("{:.2}%", (SHARE_RATE - 1.0) * 100.0)
}

/// Symbol of a known testnet token contract, `"TOKEN"` otherwise
pub fn token_symbol(token_address: &str) -> &'static str {
    KNOWN_TOKENS
        .iter()
        .find(|(address, _)| *address == token_address)
        .map(|(_, symbol)| *symbol)
        .unwrap_or("TOKEN")
}

/// Whether the error is the trap of a vault that was never initialized
pub fn is_uninitialized_error(err: &LifecycleError) -> bool {
    err.to_string().contains(UNINITIALIZED_TRAP)
}

/// Render a read result for display, substituting `"0"` on failure.
///
/// This is the only place a read error is swallowed; the error is logged.
pub fn display_or_zero<T: Display>(result: &Result<T, LifecycleError>) -> String {
    match result {
        Ok(value) => value.to_string(),
        Err(e) => {
            warn!(error = %e, "Showing 0 for failed read");
            "0".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_apy_from_share_rate() {
        assert_eq!(pool_apy(), "5.00%");
    }

    #[test]
    fn test_token_symbol_lookup() {
        assert_eq!(
            token_symbol("CDLZFC3SYJYDZT7K67VZ75HPJVIEUVNIXF47ZG2FB2RMQQVU2HHGCYSC"),
            "XLM"
        );
        assert_eq!(
            token_symbol("CAQCFVLOBK5GIULPNZRGATJJMIZL5BSP7X5YJVMGCPTUEPFM4AVSRCJU"),
            "TOKEN"
        );
    }

    #[test]
    fn test_uninitialized_detection() {
        let err = LifecycleError::simulation_failed(
            "HostError: Error(WasmVm, InvalidAction) ... UnreachableCodeReached",
        );
        assert!(is_uninitialized_error(&err));
        assert!(!is_uninitialized_error(&LifecycleError::simulation_failed("other")));
    }

    #[test]
    fn test_display_or_zero() {
        let ok: Result<Amount, LifecycleError> = Ok(Amount::from_raw(12_345_678, 7));
        assert_eq!(display_or_zero(&ok), "1.2345678");
        let err: Result<Amount, LifecycleError> = Err(LifecycleError::simulation_failed("x"));
        assert_eq!(display_or_zero(&err), "0");
    }

    #[test]
    fn test_to_amount_rejects_non_integers() {
        assert_eq!(
            to_amount(&ScVal::I128(10_000_000), 7).unwrap(),
            Amount::from_raw(10_000_000, 7)
        );
        assert!(matches!(
            to_amount(&ScVal::Bool(true), 7),
            Err(LifecycleError::ReturnValue(_))
        ));
    }

    #[test]
    fn test_undeployed_vault_is_configuration_error() {
        let mut vault = crate::types::default_vaults().remove(0);
        vault.vault_address = crate::types::UNDEPLOYED_MARKER.to_string();
        assert!(matches!(
            contract_of(&vault),
            Err(LifecycleError::Configuration(_))
        ));
    }
}
