//! Configuration module for the pegaso vault client
//!
//! Loaded from TOML, with `.env` support and two environment overrides for
//! the active vault. Every section has defaults, so a missing file section
//! falls back to the testnet setup.

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::swap::SwapToken;
use crate::tx_builder::{ConfirmPolicy, TxBuilder};
use crate::types::{default_vaults, Address, StellarAsset, VaultConfig, VaultRegistry, MAX_DECIMALS};

pub const ENV_ACTIVE_VAULT: &str = "PEGASO_ACTIVE_VAULT";
pub const ENV_VAULT_CONTRACT_ID: &str = "PEGASO_VAULT_CONTRACT_ID";
pub const ENV_SECRET_KEY: &str = "PEGASO_SECRET_KEY";

pub const TESTNET_PASSPHRASE: &str = "Test SDF Network ; September 2015";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub confirm: ConfirmConfig,

    #[serde(default)]
    pub swap: SwapConfig,

    #[serde(default)]
    pub price: PriceConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub wallet: WalletConfig,

    /// Static vault table
    #[serde(default = "default_vaults")]
    pub vaults: Vec<VaultConfig>,

    /// Vault selected at startup
    #[serde(default = "default_active_vault")]
    pub active_vault: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_passphrase")]
    pub passphrase: String,

    /// Explorer network segment (`testnet`, `public`)
    #[serde(default = "default_network_name")]
    pub name: String,

    #[serde(default = "default_horizon_url")]
    pub horizon_url: String,

    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Base fee in stroops
    #[serde(default = "default_base_fee")]
    pub base_fee: u64,

    #[serde(default = "default_write_validity")]
    pub write_validity_secs: u64,

    #[serde(default = "default_read_validity")]
    pub read_validity_secs: u64,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Overall confirmation deadline; none means the attempt cap alone
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapConfig {
    #[serde(default = "default_swap_api_url")]
    pub api_url: String,

    #[serde(default = "default_router_contract")]
    pub router_contract: String,

    /// Slippage tolerance in basis points
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u32,

    #[serde(default = "default_swap_tokens")]
    pub tokens: Vec<SwapTokenConfig>,
}

/// Classic asset tradable through the router; no issuer means native
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapTokenConfig {
    pub symbol: String,
    pub code: String,
    #[serde(default)]
    pub issuer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceConfig {
    #[serde(default = "default_price_api_url")]
    pub api_url: String,

    #[serde(default = "default_price_asset")]
    pub asset_id: String,

    #[serde(default = "default_vs_currency")]
    pub vs_currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory of the local state database
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Seed file for the local signer (hex or JSON byte array)
    #[serde(default = "default_key_path")]
    pub key_path: String,
}

// Default value functions
fn default_passphrase() -> String { TESTNET_PASSPHRASE.to_string() }
fn default_network_name() -> String { "testnet".to_string() }
fn default_horizon_url() -> String { "https://horizon-testnet.stellar.org".to_string() }
fn default_rpc_url() -> String { "https://soroban-testnet.stellar.org".to_string() }
fn default_base_fee() -> u64 { crate::tx_builder::BASE_FEE }
fn default_write_validity() -> u64 { 180 }
fn default_read_validity() -> u64 { 30 }
fn default_request_timeout() -> u64 { 30 }
fn default_poll_interval() -> u64 { 1000 }
fn default_max_attempts() -> u32 { 30 }
fn default_swap_api_url() -> String { "https://amm-api-testnet.aqua.network/api/external/v1".to_string() }
fn default_router_contract() -> String { "CBCFTQSPDBAIZ6R6PJQKSQWKNKWH2QIV3I4J72SHWBIK3ADRRAM5A6GD".to_string() }
fn default_slippage_bps() -> u32 { crate::swap::DEFAULT_SLIPPAGE_BPS }
fn default_price_api_url() -> String { "https://api.coingecko.com/api/v3".to_string() }
fn default_price_asset() -> String { crate::price::DEFAULT_ASSET_ID.to_string() }
fn default_vs_currency() -> String { crate::price::DEFAULT_VS_CURRENCY.to_string() }
fn default_data_dir() -> String { ".pegaso".to_string() }
fn default_key_path() -> String { "pegaso-key.hex".to_string() }
fn default_active_vault() -> String { "xlm".to_string() }

fn default_swap_tokens() -> Vec<SwapTokenConfig> {
    let token = |symbol: &str, issuer: Option<&str>| SwapTokenConfig {
        symbol: symbol.to_string(),
        code: symbol.to_string(),
        issuer: issuer.map(str::to_string),
    };
    vec![
        token("XLM", None),
        token("AQUA", Some("GBNZILSTVQZ4R7IKQDGHYGY2QXL5QOFJYQMXPKWRRM5PAV7Y4M67AQUA")),
        token("USDC", Some("GBBD47IF6LWK7P7MDEVSCWR7DPUWV3NY3DTQEVFL4NAT4AQH3ZLLFLA5")),
    ]
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            passphrase: default_passphrase(),
            name: default_network_name(),
            horizon_url: default_horizon_url(),
            rpc_url: default_rpc_url(),
            base_fee: default_base_fee(),
            write_validity_secs: default_write_validity(),
            read_validity_secs: default_read_validity(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for ConfirmConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            max_attempts: default_max_attempts(),
            timeout_secs: None,
        }
    }
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            api_url: default_swap_api_url(),
            router_contract: default_router_contract(),
            slippage_bps: default_slippage_bps(),
            tokens: default_swap_tokens(),
        }
    }
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            api_url: default_price_api_url(),
            asset_id: default_price_asset(),
            vs_currency: default_vs_currency(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            key_path: default_key_path(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            confirm: ConfirmConfig::default(),
            swap: SwapConfig::default(),
            price: PriceConfig::default(),
            storage: StorageConfig::default(),
            wallet: WalletConfig::default(),
            vaults: default_vaults(),
            active_vault: default_active_vault(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        let config: Config =
            toml::from_str(&content).with_context(|| format!("Failed to parse config: {}", path))?;
        Ok(config)
    }

    /// Load configuration with `.env` and environment variable overrides
    pub fn from_file_with_env(path: &str) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_file(path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Defaults plus environment overrides, for runs without a config file
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Apply `PEGASO_ACTIVE_VAULT` and `PEGASO_VAULT_CONTRACT_ID`.
    ///
    /// The contract id replaces the address of the active vault only.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(id) = lookup(ENV_ACTIVE_VAULT).filter(|v| !v.trim().is_empty()) {
            self.active_vault = id.trim().to_string();
        }
        if let Some(contract) = lookup(ENV_VAULT_CONTRACT_ID).filter(|v| !v.trim().is_empty()) {
            let active = self.active_vault.clone();
            if let Some(vault) = self.vaults.iter_mut().find(|v| v.id == active) {
                vault.vault_address = contract.trim().to_string();
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, url) in [
            ("network.horizon_url", &self.network.horizon_url),
            ("network.rpc_url", &self.network.rpc_url),
            ("swap.api_url", &self.swap.api_url),
            ("price.api_url", &self.price.api_url),
        ] {
            if url.trim().is_empty() {
                bail!("{} must not be empty", name);
            }
        }
        if self.network.passphrase.is_empty() {
            bail!("network.passphrase must not be empty");
        }
        if self.confirm.max_attempts == 0 {
            bail!("confirm.max_attempts must be at least 1");
        }
        if self.swap.slippage_bps >= 10_000 {
            bail!("swap.slippage_bps must be below 10000 (100%)");
        }
        Address::parse(&self.swap.router_contract).context("swap.router_contract")?;
        self.swap_tokens()?;

        if self.vaults.is_empty() {
            bail!("at least one vault must be configured");
        }
        let mut seen = HashSet::new();
        for vault in &self.vaults {
            if !seen.insert(vault.id.as_str()) {
                bail!("duplicate vault id '{}'", vault.id);
            }
            if vault.decimals > MAX_DECIMALS {
                bail!("vault '{}' has {} decimals (max {})", vault.id, vault.decimals, MAX_DECIMALS);
            }
            if vault.is_deployed() {
                vault
                    .vault_contract()
                    .with_context(|| format!("vault '{}' address", vault.id))?;
            }
            vault
                .token_contract()
                .with_context(|| format!("vault '{}' token", vault.id))?;
            vault
                .pool_contract()
                .with_context(|| format!("vault '{}' pool", vault.id))?;
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.network.request_timeout_secs)
    }

    pub fn tx_builder(&self) -> TxBuilder {
        TxBuilder::new(self.network.passphrase.clone())
            .with_base_fee(self.network.base_fee)
            .with_validity(
                Duration::from_secs(self.network.write_validity_secs),
                Duration::from_secs(self.network.read_validity_secs),
            )
    }

    pub fn confirm_policy(&self) -> ConfirmPolicy {
        ConfirmPolicy {
            interval: Duration::from_millis(self.confirm.poll_interval_ms),
            max_attempts: self.confirm.max_attempts,
            timeout: self.confirm.timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn vault_registry(&self) -> VaultRegistry {
        VaultRegistry::new(self.vaults.clone(), &self.active_vault)
    }

    pub fn router_address(&self) -> anyhow::Result<Address> {
        Address::parse(&self.swap.router_contract).context("swap.router_contract")
    }

    pub fn swap_tokens(&self) -> anyhow::Result<Vec<SwapToken>> {
        self.swap
            .tokens
            .iter()
            .map(|t| {
                let asset = match &t.issuer {
                    None => StellarAsset::Native,
                    Some(issuer) => StellarAsset::credit(&t.code, issuer)
                        .with_context(|| format!("swap token '{}'", t.symbol))?,
                };
                Ok(SwapToken::new(t.symbol.clone(), asset))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.confirm_policy(), ConfirmPolicy::default());
        assert_eq!(config.vault_registry().active().unwrap().id, "xlm");
        assert_eq!(config.swap_tokens().unwrap().len(), 3);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            active_vault = "usdc"

            [confirm]
            max_attempts = 10
            timeout_secs = 20
            "#,
        )
        .unwrap();

        assert_eq!(config.active_vault, "usdc");
        assert_eq!(config.confirm.max_attempts, 10);
        assert_eq!(config.confirm_policy().timeout, Some(Duration::from_secs(20)));
        assert_eq!(config.network.write_validity_secs, 180);
        assert_eq!(config.vaults.len(), 4);
    }

    #[test]
    fn test_env_overrides_target_active_vault() {
        let env: HashMap<&str, &str> = [
            (ENV_ACTIVE_VAULT, "usdc"),
            (ENV_VAULT_CONTRACT_ID, "CCKY72QMUFY2HR3DVSQJTB7NXQZJAPAEQOLUTYBUYGL2MJ2AP6OFGYUZ"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.active_vault, "usdc");
        let usdc = config.vaults.iter().find(|v| v.id == "usdc").unwrap();
        assert_eq!(usdc.vault_address, "CCKY72QMUFY2HR3DVSQJTB7NXQZJAPAEQOLUTYBUYGL2MJ2AP6OFGYUZ");
        let xlm = config.vaults.iter().find(|v| v.id == "xlm").unwrap();
        assert_eq!(xlm.vault_address, "CB253GUKVRSRD47JFA2G4JBKNEEVTX7TMM6L6WCWBXVDAE2DYSUNCLSZ");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.confirm.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.swap.slippage_bps = 10_000;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        let dup = config.vaults[0].clone();
        config.vaults.push(dup);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.vaults[1].vault_address = "not-an-address".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.network.rpc_url = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pegaso.toml");
        std::fs::write(&path, "[network]\nbase_fee = 200\n").unwrap();

        let config = Config::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.network.base_fee, 200);
        assert_eq!(config.tx_builder().base_fee(), 200);
        assert!(Config::from_file("/nonexistent/pegaso.toml").is_err());
    }
}
