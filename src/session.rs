//! Wallet session manager
//!
//! Tracks whether a wallet is connected, persists the "was connected" flag
//! across runs and loads the account view for the connected address.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::format::format_balance;
use crate::rpc::{AccountRecord, BalanceLine, LedgerQuery, PaymentRecord};
use crate::storage::{LocalStore, StorageError};
use crate::types::Address;
use crate::wallet::{WalletBridge, WalletError};

/// Number of recent payments loaded on refresh
pub const RECENT_PAYMENTS: u32 = 5;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Wallet did not provide an address")]
    NoAddress,

    #[error("No wallet connected")]
    NotConnected,
}

impl SessionError {
    pub fn is_user_decline(&self) -> bool {
        matches!(self, Self::Wallet(e) if e.is_user_decline())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub address: Option<Address>,
    pub connected: bool,
}

impl Session {
    pub fn disconnected() -> Self {
        Self::default()
    }

    fn connected(address: Address) -> Self {
        Self {
            address: Some(address),
            connected: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountData {
    pub sequence: String,
    pub subentry_count: u32,
    pub num_sponsored: u32,
    pub num_sponsoring: u32,
}

/// Ledger view of the connected account. Unfunded or unreachable accounts
/// show up as the empty default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub native_balance: String,
    pub balances: Vec<BalanceLine>,
    pub payments: Vec<PaymentRecord>,
    pub account_data: Option<AccountData>,
}

impl Default for AccountSnapshot {
    fn default() -> Self {
        Self {
            native_balance: "0".to_string(),
            balances: Vec::new(),
            payments: Vec::new(),
            account_data: None,
        }
    }
}

impl AccountSnapshot {
    fn from_record(record: AccountRecord, payments: Vec<PaymentRecord>) -> Self {
        Self {
            native_balance: record.native_balance().unwrap_or("0").to_string(),
            account_data: Some(AccountData {
                sequence: record.sequence.clone(),
                subentry_count: record.subentry_count,
                num_sponsored: record.num_sponsored,
                num_sponsoring: record.num_sponsoring,
            }),
            balances: record.balances,
            payments,
        }
    }

    pub fn formatted_native_balance(&self) -> String {
        format_balance(&self.native_balance)
    }

    pub fn is_funded(&self) -> bool {
        self.account_data.is_some()
    }
}

#[derive(Debug, Default)]
struct SessionState {
    session: Session,
    account: AccountSnapshot,
}

pub struct SessionManager {
    wallet: Arc<dyn WalletBridge>,
    ledger: Arc<dyn LedgerQuery>,
    store: LocalStore,
    state: RwLock<SessionState>,
}

impl SessionManager {
    pub fn new(wallet: Arc<dyn WalletBridge>, ledger: Arc<dyn LedgerQuery>, store: LocalStore) -> Self {
        Self {
            wallet,
            ledger,
            store,
            state: RwLock::new(SessionState::default()),
        }
    }

    pub async fn session(&self) -> Session {
        self.state.read().await.session.clone()
    }

    pub async fn account(&self) -> AccountSnapshot {
        self.state.read().await.account.clone()
    }

    /// Connected address, or `NotConnected`
    pub async fn address(&self) -> Result<Address, SessionError> {
        let state = self.state.read().await;
        match (&state.session.address, state.session.connected) {
            (Some(address), true) => Ok(address.clone()),
            _ => Err(SessionError::NotConnected),
        }
    }

    /// Ask the wallet for access. A user decline clears the persisted flag.
    pub async fn connect(&self) -> Result<Session, SessionError> {
        let granted = match self.wallet.request_access().await {
            Ok(address) => address,
            Err(e) => {
                if e.is_user_decline() {
                    info!("🔌 Wallet access declined by user");
                    self.store.set_connected_flag(false)?;
                }
                return Err(e.into());
            }
        };

        let address = self.wallet.get_address().await?.unwrap_or(granted);
        self.store.set_connected_flag(true)?;
        {
            let mut state = self.state.write().await;
            state.session = Session::connected(address.clone());
        }
        info!(address = %address, "🔌 Wallet connected");

        self.refresh().await?;
        Ok(self.session().await)
    }

    /// Restore the previous session on startup.
    ///
    /// A persisted flag whose wallet no longer reports connected is cleared
    /// and the session stays disconnected.
    pub async fn restore(&self) -> Result<Session, SessionError> {
        if !self.store.connected_flag()? {
            debug!("No persisted wallet session");
            return Ok(Session::disconnected());
        }

        let connected = self.wallet.is_connected().await.unwrap_or_else(|e| {
            warn!(error = %e, "Wallet status check failed");
            false
        });
        let address = if connected {
            self.wallet.get_address().await.unwrap_or_else(|e| {
                warn!(error = %e, "Wallet address lookup failed");
                None
            })
        } else {
            None
        };

        let Some(address) = address else {
            info!("Persisted session is stale, clearing flag");
            self.store.set_connected_flag(false)?;
            self.state.write().await.session = Session::disconnected();
            return Ok(Session::disconnected());
        };

        self.state.write().await.session = Session::connected(address.clone());
        info!(address = %address, "🔌 Wallet session restored");
        self.refresh().await?;
        Ok(self.session().await)
    }

    /// Re-query the wallet address and reload the account view.
    ///
    /// A wallet that no longer reports an address, or fails to answer, ends
    /// the session: state and persisted flag are cleared and the empty
    /// snapshot is returned.
    ///
    /// Ledger failures, including an unfunded (404) account, degrade to the
    /// empty snapshot rather than failing.
    pub async fn refresh(&self) -> Result<AccountSnapshot, SessionError> {
        let current = self.address().await?;
        let address = match self.wallet.get_address().await {
            Ok(Some(address)) => address,
            Ok(None) => {
                info!(previous = %current, "Wallet no longer grants an address, dropping session");
                return self.forget().await;
            }
            Err(e) => {
                warn!(previous = %current, error = %e, "Wallet address refresh failed, dropping session");
                return self.forget().await;
            }
        };

        let (account, payments) = tokio::join!(
            self.ledger.load_account(&address),
            self.ledger.payments(&address, RECENT_PAYMENTS)
        );

        let snapshot = match account {
            Ok(record) => {
                let payments = payments.unwrap_or_else(|e| {
                    warn!(address = %address, error = %e, "Payment history unavailable");
                    Vec::new()
                });
                AccountSnapshot::from_record(record, payments)
            }
            Err(e) if e.is_not_found() => {
                info!(address = %address, "Account not funded yet");
                AccountSnapshot::default()
            }
            Err(e) => {
                warn!(address = %address, error = %e, "Account load failed");
                AccountSnapshot::default()
            }
        };

        let mut state = self.state.write().await;
        state.session = Session::connected(address);
        state.account = snapshot.clone();
        Ok(snapshot)
    }

    /// Reset to the disconnected state after the wallet withdrew its address
    async fn forget(&self) -> Result<AccountSnapshot, SessionError> {
        *self.state.write().await = SessionState::default();
        self.store.set_connected_flag(false)?;
        Ok(AccountSnapshot::default())
    }

    /// Forget the session everywhere: memory, persisted flag and wallet
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        {
            let mut state = self.state.write().await;
            *state = SessionState::default();
        }
        self.store.set_connected_flag(false)?;
        self.wallet.disconnect().await?;
        info!("🔌 Wallet disconnected");
        Ok(())
    }
}
