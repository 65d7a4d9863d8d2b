//! Core domain types: strkey addresses, fixed-point amounts, vault table
//! and locally recorded vault transactions.

use chrono::{DateTime, Utc};
use crc::{Crc, CRC_16_XMODEM};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Placeholder used in the vault table for contracts that are not deployed yet
pub const UNDEPLOYED_MARKER: &str = "DEPLOY_ME";

/// Largest decimal count that still fits an i128 scale factor
pub const MAX_DECIMALS: u32 = 38;

const ACCOUNT_VERSION: u8 = 6 << 3;
const CONTRACT_VERSION: u8 = 2 << 3;
const STRKEY_LEN: usize = 56;
const STRKEY_RAW_LEN: usize = 35;
const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";
const STRKEY_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Errors raised while parsing addresses and amounts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Invalid amount '{0}'")]
    InvalidAmount(String),

    #[error("Negative amount '{0}' is not allowed")]
    NegativeAmount(String),

    #[error("Amount '{0}' overflows a 128-bit integer")]
    AmountOverflow(String),

    #[error("Unsupported decimal count {0} (max {MAX_DECIMALS})")]
    UnsupportedDecimals(u32),

    #[error("Invalid asset code '{0}'")]
    InvalidAssetCode(String),
}

impl TypeError {
    fn address(address: &str, reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            address: address.to_string(),
            reason: reason.into(),
        }
    }
}

/// Kind of strkey address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressKind {
    /// `G...` ed25519 account
    Account,
    /// `C...` contract
    Contract,
}

/// A checksummed strkey address (`G...` account or `C...` contract)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address {
    text: String,
    kind: AddressKind,
}

impl Address {
    /// Parse and checksum-verify a strkey
    pub fn parse(text: &str) -> Result<Self, TypeError> {
        let text = text.trim();
        if text.len() != STRKEY_LEN {
            return Err(TypeError::address(
                text,
                format!("expected {} characters, got {}", STRKEY_LEN, text.len()),
            ));
        }

        let raw = base32_decode(text).ok_or_else(|| TypeError::address(text, "not base32"))?;
        let kind = match raw[0] {
            ACCOUNT_VERSION => AddressKind::Account,
            CONTRACT_VERSION => AddressKind::Contract,
            other => {
                return Err(TypeError::address(
                    text,
                    format!("unsupported version byte {}", other),
                ))
            }
        };

        let (body, checksum) = raw.split_at(STRKEY_RAW_LEN - 2);
        let expected = STRKEY_CRC.checksum(body).to_le_bytes();
        if checksum != expected {
            return Err(TypeError::address(text, "checksum mismatch"));
        }

        Ok(Self {
            text: text.to_string(),
            kind,
        })
    }

    /// Encode a 32-byte ed25519 public key as a `G...` account address
    pub fn account_from_public_key(key: &[u8; 32]) -> Self {
        Self::encode(ACCOUNT_VERSION, key, AddressKind::Account)
    }

    /// Encode a 32-byte contract hash as a `C...` contract address
    pub fn contract_from_hash(hash: &[u8; 32]) -> Self {
        Self::encode(CONTRACT_VERSION, hash, AddressKind::Contract)
    }

    /// The all-zero account used as a funding source for read-only simulations
    pub fn zero_account() -> Self {
        Self::account_from_public_key(&[0u8; 32])
    }

    fn encode(version: u8, payload: &[u8; 32], kind: AddressKind) -> Self {
        let mut raw = Vec::with_capacity(STRKEY_RAW_LEN);
        raw.push(version);
        raw.extend_from_slice(payload);
        let checksum = STRKEY_CRC.checksum(&raw).to_le_bytes();
        raw.extend_from_slice(&checksum);
        Self {
            text: base32_encode(&raw),
            kind,
        }
    }

    /// 32-byte payload (public key or contract hash)
    pub fn payload(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        if let Some(raw) = base32_decode(&self.text) {
            out.copy_from_slice(&raw[1..33]);
        }
        out
    }

    pub fn kind(&self) -> AddressKind {
        self.kind
    }

    pub fn is_contract(&self) -> bool {
        self.kind == AddressKind::Contract
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for Address {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.text
    }
}

fn base32_decode(text: &str) -> Option<[u8; STRKEY_RAW_LEN]> {
    let mut out = [0u8; STRKEY_RAW_LEN];
    let mut buffer: u64 = 0;
    let mut bits = 0u32;
    let mut idx = 0usize;

    for c in text.bytes() {
        let value = BASE32_ALPHABET.iter().position(|&a| a == c)? as u64;
        buffer = (buffer << 5) | value;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            if idx >= STRKEY_RAW_LEN {
                return None;
            }
            out[idx] = ((buffer >> bits) & 0xff) as u8;
            idx += 1;
        }
    }

    (idx == STRKEY_RAW_LEN && bits == 0).then_some(out)
}

fn base32_encode(raw: &[u8]) -> String {
    let mut out = String::with_capacity(STRKEY_LEN);
    let mut buffer: u64 = 0;
    let mut bits = 0u32;

    for &byte in raw {
        buffer = (buffer << 8) | byte as u64;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(BASE32_ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(BASE32_ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }
    out
}

/// Fixed-point token amount: `raw / 10^decimals`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Amount {
    raw: i128,
    decimals: u32,
}

impl Amount {
    pub fn from_raw(raw: i128, decimals: u32) -> Self {
        Self { raw, decimals }
    }

    pub fn zero(decimals: u32) -> Self {
        Self { raw: 0, decimals }
    }

    /// Parse a user-entered decimal string, truncating digits beyond `decimals`
    pub fn parse(text: &str, decimals: u32) -> Result<Self, TypeError> {
        Ok(Self {
            raw: scale(text, decimals)?,
            decimals,
        })
    }

    pub fn raw(&self) -> i128 {
        self.raw
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    pub fn is_zero(&self) -> bool {
        self.raw == 0
    }

    pub fn to_f64(&self) -> f64 {
        unscale(self.raw, self.decimals)
    }

    /// Render with a fixed number of fraction digits (display only)
    pub fn to_fixed(&self, digits: usize) -> String {
        format!("{:.*}", digits, self.to_f64())
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.raw < 0 { "-" } else { "" };
        let abs = self.raw.unsigned_abs();
        if self.decimals == 0 {
            return write!(f, "{}{}", sign, abs);
        }

        let factor = 10u128.pow(self.decimals);
        let int_part = abs / factor;
        let frac_part = abs % factor;
        if frac_part == 0 {
            return write!(f, "{}{}", sign, int_part);
        }

        let frac = format!("{:0width$}", frac_part, width = self.decimals as usize);
        write!(f, "{}{}.{}", sign, int_part, frac.trim_end_matches('0'))
    }
}

/// Scale a decimal string by `10^decimals` into an i128, truncating extra
/// fraction digits.
pub fn scale(text: &str, decimals: u32) -> Result<i128, TypeError> {
    if decimals > MAX_DECIMALS {
        return Err(TypeError::UnsupportedDecimals(decimals));
    }

    let trimmed = text.trim();
    if trimmed.starts_with('-') {
        return Err(TypeError::NegativeAmount(trimmed.to_string()));
    }

    let (int_part, frac_part) = match trimmed.split_once('.') {
        Some((i, f)) => (i, f),
        None => (trimmed, ""),
    };
    let digits_only = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty())
        || !digits_only(int_part)
        || !digits_only(frac_part)
    {
        return Err(TypeError::InvalidAmount(trimmed.to_string()));
    }

    let overflow = || TypeError::AmountOverflow(trimmed.to_string());
    let factor = 10i128.checked_pow(decimals).ok_or_else(overflow)?;

    let int_value: i128 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().map_err(|_| overflow())?
    };

    let mut frac_digits: String = frac_part.chars().take(decimals as usize).collect();
    while frac_digits.len() < decimals as usize {
        frac_digits.push('0');
    }
    let frac_value: i128 = if frac_digits.is_empty() {
        0
    } else {
        frac_digits.parse().map_err(|_| overflow())?
    };

    int_value
        .checked_mul(factor)
        .and_then(|v| v.checked_add(frac_value))
        .ok_or_else(overflow)
}

/// Convert a scaled integer back to a floating display value
pub fn unscale(raw: i128, decimals: u32) -> f64 {
    raw as f64 / 10f64.powi(decimals as i32)
}

/// Classic asset wrapped by a built-in token contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StellarAsset {
    Native,
    Credit { code: String, issuer: Address },
}

impl StellarAsset {
    pub fn credit(code: &str, issuer: &str) -> Result<Self, TypeError> {
        if code.is_empty() || code.len() > 12 || !code.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(TypeError::InvalidAssetCode(code.to_string()));
        }
        let issuer = Address::parse(issuer)?;
        if issuer.is_contract() {
            return Err(TypeError::address(issuer.as_str(), "issuer must be an account"));
        }
        Ok(Self::Credit {
            code: code.to_string(),
            issuer,
        })
    }

    pub fn code(&self) -> &str {
        match self {
            Self::Native => "XLM",
            Self::Credit { code, .. } => code,
        }
    }

    /// Deterministic id of the asset's token contract on the given network:
    /// sha256 of the XDR `HashIDPreimage::ContractId` for a from-asset preimage.
    pub fn contract_address(&self, network_passphrase: &str) -> Address {
        const ENVELOPE_TYPE_CONTRACT_ID: i32 = 8;
        const CONTRACT_ID_PREIMAGE_FROM_ASSET: i32 = 1;

        let mut preimage = Vec::with_capacity(96);
        preimage.extend_from_slice(&ENVELOPE_TYPE_CONTRACT_ID.to_be_bytes());
        preimage.extend_from_slice(&Sha256::digest(network_passphrase.as_bytes()));
        preimage.extend_from_slice(&CONTRACT_ID_PREIMAGE_FROM_ASSET.to_be_bytes());
        self.write_xdr(&mut preimage);

        let hash: [u8; 32] = Sha256::digest(&preimage).into();
        Address::contract_from_hash(&hash)
    }

    fn write_xdr(&self, out: &mut Vec<u8>) {
        match self {
            Self::Native => out.extend_from_slice(&0i32.to_be_bytes()),
            Self::Credit { code, issuer } => {
                let (kind, width) = if code.len() <= 4 { (1i32, 4) } else { (2i32, 12) };
                out.extend_from_slice(&kind.to_be_bytes());
                let mut padded = code.as_bytes().to_vec();
                padded.resize(width, 0);
                out.extend_from_slice(&padded);
                // PublicKey union, ed25519 arm
                out.extend_from_slice(&0i32.to_be_bytes());
                out.extend_from_slice(&issuer.payload());
            }
        }
    }
}

/// Static per-asset vault entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultConfig {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub token_address: String,
    pub vault_address: String,
    /// Display-only APY string published by the lending pool
    pub estimated_apy: String,
    pub decimals: u32,
    pub pool_address: String,
    #[serde(default)]
    pub color: String,
}

impl VaultConfig {
    pub fn is_deployed(&self) -> bool {
        self.vault_address != UNDEPLOYED_MARKER
    }

    pub fn vault_contract(&self) -> Result<Address, TypeError> {
        Address::parse(&self.vault_address)
    }

    pub fn token_contract(&self) -> Result<Address, TypeError> {
        Address::parse(&self.token_address)
    }

    pub fn pool_contract(&self) -> Result<Address, TypeError> {
        Address::parse(&self.pool_address)
    }
}

/// Testnet vault table
pub fn default_vaults() -> Vec<VaultConfig> {
    let pool = "CCEBVDYM32YNYCVNRXQKDFFPISJJCV557CDZEIRBEE4NCV4KHPQ44HGF";
    let vault = |id: &str,
                 symbol: &str,
                 name: &str,
                 token: &str,
                 address: &str,
                 apy: &str,
                 decimals: u32,
                 color: &str| VaultConfig {
        id: id.to_string(),
        symbol: symbol.to_string(),
        name: name.to_string(),
        token_address: token.to_string(),
        vault_address: address.to_string(),
        estimated_apy: apy.to_string(),
        decimals,
        pool_address: pool.to_string(),
        color: color.to_string(),
    };

    vec![
        vault(
            "xlm",
            "XLM",
            "Stellar Lumens",
            "CDLZFC3SYJYDZT7K67VZ75HPJVIEUVNIXF47ZG2FB2RMQQVU2HHGCYSC",
            "CB253GUKVRSRD47JFA2G4JBKNEEVTX7TMM6L6WCWBXVDAE2DYSUNCLSZ",
            "37.65%",
            7,
            "#2DD4BF",
        ),
        vault(
            "usdc",
            "USDC",
            "USD Coin",
            "CAQCFVLOBK5GIULPNZRGATJJMIZL5BSP7X5YJVMGCPTUEPFM4AVSRCJU",
            "CCK2S3L7IFNHQ6X4TIBNT6COSJ2D2H7M3XGCWW4N43J4U2KBZ26ZNJTB",
            "31.56%",
            6,
            "#3B82F6",
        ),
        vault(
            "wbtc",
            "wBTC",
            "Wrapped Bitcoin",
            "CAP5AMC2OHNVREO66DFIN6DHJMPOBAJ2KCDDIMFBR7WWJH5RZBFM3UEI",
            "CCKY72QMUFY2HR3DVSQJTB7NXQZJAPAEQOLUTYBUYGL2MJ2AP6OFGYUZ",
            "1,120.72%",
            8,
            "#F59E0B",
        ),
        vault(
            "weth",
            "wETH",
            "Wrapped Ethereum",
            "CAZAQB3D7KSLSNOSQKYD2V4JP5V2Y3B4RDJZRLBFCCIXDCTE3WHSY3UE",
            "CAS4LDAOALXHWD3E5XQSFTKCNAC6OEVPBVDPWIBGDARSW2YCOTRIO5IW",
            "4,450.52%",
            18,
            "#9333EA",
        ),
    ]
}

/// Read-only vault table with a transient UI selection
#[derive(Debug, Clone)]
pub struct VaultRegistry {
    vaults: Vec<VaultConfig>,
    selected: String,
}

impl VaultRegistry {
    /// Build the registry; an unknown or undeployed `active_id` falls back to
    /// the first vault.
    pub fn new(vaults: Vec<VaultConfig>, active_id: &str) -> Self {
        let selected = vaults
            .iter()
            .find(|v| v.id == active_id && v.is_deployed())
            .or_else(|| vaults.first())
            .map(|v| v.id.clone())
            .unwrap_or_default();
        Self { vaults, selected }
    }

    pub fn all(&self) -> &[VaultConfig] {
        &self.vaults
    }

    pub fn get(&self, id: &str) -> Option<&VaultConfig> {
        self.vaults.iter().find(|v| v.id == id)
    }

    pub fn by_symbol(&self, symbol: &str) -> Option<&VaultConfig> {
        self.vaults
            .iter()
            .find(|v| v.symbol.eq_ignore_ascii_case(symbol))
    }

    pub fn available(&self) -> Vec<&VaultConfig> {
        self.vaults.iter().filter(|v| v.is_deployed()).collect()
    }

    pub fn active(&self) -> Option<&VaultConfig> {
        self.get(&self.selected)
    }

    /// Change the selection and return an owned snapshot of the new vault.
    ///
    /// Operations take the snapshot as a parameter, so switching never
    /// affects requests already in flight.
    pub fn select(&mut self, id: &str) -> Option<VaultConfig> {
        let vault = self.get(id)?.clone();
        self.selected = vault.id.clone();
        Some(vault)
    }
}

/// Kind of a locally recorded vault operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultTxKind {
    #[serde(rename = "vault_deposit")]
    Deposit,
    #[serde(rename = "vault_withdraw")]
    Withdraw,
}

impl VaultTxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "vault_deposit",
            Self::Withdraw => "vault_withdraw",
        }
    }
}

/// One entry of the local vault activity log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultTransactionRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: VaultTxKind,
    /// Amount as entered by the user
    pub amount: String,
    pub asset: String,
    pub timestamp: DateTime<Utc>,
    pub tx_hash: String,
}

impl VaultTransactionRecord {
    pub fn new(kind: VaultTxKind, amount: &str, asset: &str, tx_hash: &str) -> Self {
        Self {
            id: tx_hash.to_string(),
            kind,
            amount: amount.to_string(),
            asset: asset.to_string(),
            timestamp: Utc::now(),
            tx_hash: tx_hash.to_string(),
        }
    }
}
