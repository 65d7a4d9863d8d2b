//! Test Utilities Module
//!
//! Scripted in-memory doubles for the contract RPC, the ledger query endpoint
//! and the wallet bridge, plus small fixtures. Nothing here touches the
//! network.
//!
//! These utilities are only compiled when running tests or when the
//! `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::metrics::LifecycleMetrics;
use crate::rpc::{
    AccountRecord, BalanceLine, ContractRpc, LedgerQuery, LedgerSummary, PaymentRecord, RpcError,
    SendResponse, SendStatus, SimulationResponse, SimulationResult, SourceAccount,
    TransactionStatusResponse, TxStatus,
};
use crate::tx_builder::envelope::{Envelope, ScVal};
use crate::tx_builder::{ConfirmPolicy, TxBuilder, TxLifecycle};
use crate::types::{default_vaults, Address, VaultConfig};
use crate::wallet::{LocalKeyWallet, WalletBridge, WalletError};

pub const TEST_PASSPHRASE: &str = "Test SDF Network ; September 2015";

/// Deterministic account address derived from a seed byte
pub fn test_address(seed: u8) -> Address {
    Address::account_from_public_key(&[seed; 32])
}

/// The first entry of the default vault table (XLM, 7 decimals)
pub fn test_vault() -> VaultConfig {
    vault_by_id("xlm")
}

pub fn vault_by_id(id: &str) -> VaultConfig {
    default_vaults()
        .into_iter()
        .find(|v| v.id == id)
        .unwrap_or_else(|| panic!("no vault '{}' in default table", id))
}

/// Successful simulation returning `retval`
pub fn ok_simulation(retval: ScVal) -> SimulationResponse {
    SimulationResponse {
        error: None,
        result: Some(SimulationResult {
            retval: Some(retval),
            auth: vec![],
        }),
        transaction_data: Some("AAAAAQ==".to_string()),
        min_resource_fee: Some(50_000),
        latest_ledger: Some(1_000),
    }
}

/// Simulation that reports `message` in its error field
pub fn error_simulation(message: &str) -> SimulationResponse {
    SimulationResponse {
        error: Some(message.to_string()),
        ..Default::default()
    }
}

pub fn status(status: TxStatus) -> TransactionStatusResponse {
    TransactionStatusResponse {
        status,
        return_value: None,
        ledger: None,
    }
}

/// Lifecycle over the given doubles, default confirmation policy
pub fn lifecycle_with(rpc: Arc<MockContractRpc>, wallet: Arc<MockWallet>) -> Arc<TxLifecycle> {
    lifecycle_with_policy(rpc, wallet, ConfirmPolicy::default())
}

pub fn lifecycle_with_policy(
    rpc: Arc<MockContractRpc>,
    wallet: Arc<MockWallet>,
    policy: ConfirmPolicy,
) -> Arc<TxLifecycle> {
    let metrics = Arc::new(LifecycleMetrics::new().expect("metrics registry"));
    Arc::new(TxLifecycle::new(
        rpc,
        wallet,
        TxBuilder::new(TEST_PASSPHRASE),
        policy,
        metrics,
    ))
}

/// Mock contract RPC
///
/// Simulations are scripted per method name; confirmation polls pop a queue
/// of statuses and fall back to `final_status` once it is empty.
pub struct MockContractRpc {
    pub sequence: i64,
    missing_accounts: Mutex<HashSet<String>>,
    simulations: Mutex<HashMap<String, SimulationResponse>>,
    default_simulation: Mutex<SimulationResponse>,
    simulate_delay: Mutex<Option<Duration>>,
    poll_delay: Mutex<Option<Duration>>,
    send_status: Mutex<SendStatus>,
    poll_statuses: Mutex<VecDeque<TransactionStatusResponse>>,
    final_status: Mutex<TransactionStatusResponse>,

    pub get_account_calls: AtomicUsize,
    pub simulate_calls: AtomicUsize,
    pub send_calls: AtomicUsize,
    pub get_transaction_calls: AtomicUsize,

    /// Every envelope passed to `simulate`, in call order
    pub simulated: Mutex<Vec<Envelope>>,
    /// Every envelope passed to `send`
    pub sent: Mutex<Vec<Envelope>>,
}

impl Default for MockContractRpc {
    fn default() -> Self {
        Self::new()
    }
}

impl MockContractRpc {
    pub fn new() -> Self {
        Self {
            sequence: 100,
            missing_accounts: Mutex::new(HashSet::new()),
            simulations: Mutex::new(HashMap::new()),
            default_simulation: Mutex::new(ok_simulation(ScVal::Void)),
            simulate_delay: Mutex::new(None),
            poll_delay: Mutex::new(None),
            send_status: Mutex::new(SendStatus::Pending),
            poll_statuses: Mutex::new(VecDeque::new()),
            final_status: Mutex::new(status(TxStatus::Success)),
            get_account_calls: AtomicUsize::new(0),
            simulate_calls: AtomicUsize::new(0),
            send_calls: AtomicUsize::new(0),
            get_transaction_calls: AtomicUsize::new(0),
            simulated: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub async fn set_simulation(&self, method: &str, response: SimulationResponse) {
        self.simulations
            .lock()
            .await
            .insert(method.to_string(), response);
    }

    pub async fn set_default_simulation(&self, response: SimulationResponse) {
        *self.default_simulation.lock().await = response;
    }

    /// Make `get_account` fail with `NotFound` for this address
    pub async fn remove_account(&self, address: &Address) {
        self.missing_accounts
            .lock()
            .await
            .insert(address.to_string());
    }

    pub async fn set_simulate_delay(&self, delay: Duration) {
        *self.simulate_delay.lock().await = Some(delay);
    }

    /// Each status poll takes `delay` before answering
    pub async fn set_poll_delay(&self, delay: Duration) {
        *self.poll_delay.lock().await = Some(delay);
    }

    pub async fn set_send_status(&self, status: SendStatus) {
        *self.send_status.lock().await = status;
    }

    pub async fn push_statuses(&self, statuses: impl IntoIterator<Item = TransactionStatusResponse>) {
        self.poll_statuses.lock().await.extend(statuses);
    }

    pub async fn set_final_status(&self, response: TransactionStatusResponse) {
        *self.final_status.lock().await = response;
    }

    pub fn polls(&self) -> usize {
        self.get_transaction_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContractRpc for MockContractRpc {
    async fn get_account(&self, address: &Address) -> Result<SourceAccount, RpcError> {
        self.get_account_calls.fetch_add(1, Ordering::SeqCst);
        if self.missing_accounts.lock().await.contains(address.as_str()) {
            return Err(RpcError::NotFound {
                resource: format!("account {}", address),
                endpoint: "mock".to_string(),
            });
        }
        Ok(SourceAccount {
            id: address.clone(),
            sequence: self.sequence,
        })
    }

    async fn simulate(&self, envelope: &Envelope) -> Result<SimulationResponse, RpcError> {
        self.simulate_calls.fetch_add(1, Ordering::SeqCst);
        self.simulated.lock().await.push(envelope.clone());

        let delay = *self.simulate_delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self
            .simulations
            .lock()
            .await
            .get(&envelope.invocation.method)
            .cloned();
        match scripted {
            Some(response) => Ok(response),
            None => Ok(self.default_simulation.lock().await.clone()),
        }
    }

    async fn send(&self, envelope: &Envelope) -> Result<SendResponse, RpcError> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().await.push(envelope.clone());
        let hash = envelope
            .hash()
            .map_err(|e| RpcError::decode("mock", e.to_string()))?;
        let status = self.send_status.lock().await.clone();
        let error_result = match status {
            SendStatus::Pending => None,
            _ => Some("txMalformed".to_string()),
        };
        Ok(SendResponse {
            hash,
            status,
            error_result,
        })
    }

    async fn get_transaction(&self, _hash: &str) -> Result<TransactionStatusResponse, RpcError> {
        self.get_transaction_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.poll_delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(next) = self.poll_statuses.lock().await.pop_front() {
            return Ok(next);
        }
        Ok(self.final_status.lock().await.clone())
    }
}

/// Mock wallet bridge
///
/// Signs for real through a [`LocalKeyWallet`]; access and signing can be
/// scripted to be declined.
pub struct MockWallet {
    inner: LocalKeyWallet,
    connected: Mutex<bool>,
    decline_access: Mutex<bool>,
    decline_signing: Mutex<bool>,
    pub sign_calls: AtomicUsize,
    pub disconnect_calls: AtomicUsize,
}

impl MockWallet {
    pub fn new(seed: u8) -> Self {
        let inner = LocalKeyWallet::from_seed(&[seed; 32]).expect("non-zero test seed");
        Self {
            inner,
            connected: Mutex::new(true),
            decline_access: Mutex::new(false),
            decline_signing: Mutex::new(false),
            sign_calls: AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
        }
    }

    pub fn address(&self) -> &Address {
        self.inner.address()
    }

    pub async fn set_connected(&self, connected: bool) {
        *self.connected.lock().await = connected;
    }

    pub async fn set_decline_access(&self, decline: bool) {
        *self.decline_access.lock().await = decline;
    }

    pub async fn set_decline_signing(&self, decline: bool) {
        *self.decline_signing.lock().await = decline;
    }
}

#[async_trait]
impl WalletBridge for MockWallet {
    async fn is_connected(&self) -> Result<bool, WalletError> {
        Ok(*self.connected.lock().await)
    }

    async fn request_access(&self) -> Result<Address, WalletError> {
        if *self.decline_access.lock().await {
            return Err(WalletError::Declined("User declined access".to_string()));
        }
        *self.connected.lock().await = true;
        Ok(self.inner.address().clone())
    }

    async fn get_address(&self) -> Result<Option<Address>, WalletError> {
        if *self.connected.lock().await {
            Ok(Some(self.inner.address().clone()))
        } else {
            Ok(None)
        }
    }

    async fn sign_transaction(
        &self,
        envelope_xdr: &str,
        address: &Address,
        network_passphrase: &str,
    ) -> Result<String, WalletError> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        if *self.decline_signing.lock().await {
            return Err(WalletError::Declined("User declined signing".to_string()));
        }
        self.inner
            .sign_transaction(envelope_xdr, address, network_passphrase)
            .await
    }

    async fn disconnect(&self) -> Result<(), WalletError> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        *self.connected.lock().await = false;
        Ok(())
    }
}

/// Mock ledger query endpoint; unknown accounts are `NotFound`
#[derive(Default)]
pub struct MockLedger {
    accounts: Mutex<HashMap<String, AccountRecord>>,
    payments: Mutex<HashMap<String, Vec<PaymentRecord>>>,
    failure: Mutex<Option<RpcError>>,
    pub payment_limits: Mutex<Vec<u32>>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a funded account holding `native` XLM
    pub async fn add_account(&self, address: &Address, native: &str) {
        let record = AccountRecord {
            account_id: address.to_string(),
            sequence: "4294967296".to_string(),
            subentry_count: 2,
            num_sponsored: 0,
            num_sponsoring: 1,
            balances: vec![BalanceLine {
                asset_type: "native".to_string(),
                asset_code: None,
                asset_issuer: None,
                balance: native.to_string(),
            }],
        };
        self.accounts
            .lock()
            .await
            .insert(address.to_string(), record);
    }

    pub async fn set_payments(&self, address: &Address, payments: Vec<PaymentRecord>) {
        self.payments
            .lock()
            .await
            .insert(address.to_string(), payments);
    }

    /// Fail every query with `error`
    pub async fn fail_with(&self, error: RpcError) {
        *self.failure.lock().await = Some(error);
    }

    async fn check_failure(&self) -> Result<(), RpcError> {
        match self.failure.lock().await.clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl LedgerQuery for MockLedger {
    async fn load_account(&self, address: &Address) -> Result<AccountRecord, RpcError> {
        self.check_failure().await?;
        self.accounts
            .lock()
            .await
            .get(address.as_str())
            .cloned()
            .ok_or_else(|| RpcError::NotFound {
                resource: format!("account {}", address),
                endpoint: "mock".to_string(),
            })
    }

    async fn payments(&self, address: &Address, limit: u32) -> Result<Vec<PaymentRecord>, RpcError> {
        self.check_failure().await?;
        self.payment_limits.lock().await.push(limit);
        let mut list = self
            .payments
            .lock()
            .await
            .get(address.as_str())
            .cloned()
            .unwrap_or_default();
        list.truncate(limit as usize);
        Ok(list)
    }

    async fn latest_ledger(&self) -> Result<LedgerSummary, RpcError> {
        self.check_failure().await?;
        Ok(LedgerSummary {
            sequence: 123_456,
            successful_transaction_count: 10,
            operation_count: 42,
            fee_pool: "1000.0000000".to_string(),
            closed_at: Some(Utc::now()),
        })
    }
}
