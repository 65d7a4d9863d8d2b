//! Pegaso - Vault Client Library
//!
//! Wallet sessions, the contract transaction lifecycle (build, simulate,
//! sign, submit, confirm), vault reads and writes, swap routing and the
//! local activity log.

pub mod activity;
pub mod config;
pub mod format;
pub mod metrics;
pub mod observability;
pub mod price;
pub mod rpc;
pub mod session;
pub mod storage;
pub mod structured_logging;
pub mod swap;
pub mod test_utils;
pub mod tx_builder;
pub mod types;
pub mod vault;
pub mod wallet;

// Re-export commonly used types
pub use config::Config;
pub use tx_builder::{LifecycleError, TxLifecycle};
pub use types::{Address, Amount, VaultConfig, VaultRegistry};
