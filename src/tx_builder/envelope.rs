//! Contract invocation envelope and its wire codec
//!
//! An [`Envelope`] carries one contract call from build through signing.
//! The resource footprint is attached by `prepare`, signatures by the
//! wallet. [`EnvelopeCodec`] turns it into the opaque string handed to the
//! wallet bridge and the RPC endpoint.

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::tx_builder::errors::LifecycleError;
use crate::types::Address;

/// Typed contract value, used both for call arguments and return values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ScVal {
    Void,
    Bool(bool),
    Address(Address),
    I128(#[serde(with = "as_string")] i128),
    U128(#[serde(with = "as_string")] u128),
    Symbol(String),
    /// Opaque, already encoded value (base64), passed through untouched
    Raw(String),
}

impl ScVal {
    /// Signed view of an integer value
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Self::I128(v) => Some(*v),
            Self::U128(v) => i128::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Unsigned view of an integer value
    pub fn as_u128(&self) -> Option<u128> {
        match self {
            Self::U128(v) => Some(*v),
            Self::I128(v) => u128::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<&Address> {
        match self {
            Self::Address(a) => Some(a),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Bool(_) => "bool",
            Self::Address(_) => "address",
            Self::I128(_) => "i128",
            Self::U128(_) => "u128",
            Self::Symbol(_) => "symbol",
            Self::Raw(_) => "raw",
        }
    }
}

mod as_string {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::fmt::Display;
    use std::str::FromStr;

    pub fn serialize<T: Display, S: Serializer>(value: &T, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(value)
    }

    pub fn deserialize<'de, T, D>(d: D) -> Result<T, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        let text = String::deserialize(d)?;
        text.parse().map_err(de::Error::custom)
    }
}

/// Target contract, method and typed arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    pub contract: Address,
    pub method: String,
    pub args: Vec<ScVal>,
}

impl Invocation {
    pub fn new(contract: Address, method: impl Into<String>, args: Vec<ScVal>) -> Self {
        Self {
            contract,
            method: method.into(),
            args,
        }
    }
}

/// Validity window in unix seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBounds {
    pub min_time: i64,
    pub max_time: i64,
}

/// Resource footprint merged in from simulation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceFootprint {
    /// Opaque resource declaration returned by the simulation
    pub transaction_data: String,
    pub min_resource_fee: u64,
    /// Authorization entries required by the call
    #[serde(default)]
    pub auth: Vec<String>,
}

/// One signature attached by a wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoratedSignature {
    /// Hex-encoded ed25519 public key
    pub public_key: String,
    /// Hex-encoded signature over [`Envelope::signature_base`]
    pub signature: String,
}

/// Unsigned or signed contract transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub source: Address,
    pub sequence: i64,
    /// Total fee in stroops (base fee, plus resource fee once prepared)
    pub fee: u64,
    pub network_passphrase: String,
    pub time_bounds: TimeBounds,
    pub invocation: Invocation,
    #[serde(default)]
    pub resources: Option<ResourceFootprint>,
    #[serde(default)]
    pub signatures: Vec<DecoratedSignature>,
}

impl Envelope {
    pub fn is_prepared(&self) -> bool {
        self.resources.is_some()
    }

    pub fn is_signed(&self) -> bool {
        !self.signatures.is_empty()
    }

    /// Bytes a signer commits to: sha256(sha256(passphrase) || unsigned body)
    pub fn signature_base(&self) -> Result<[u8; 32], LifecycleError> {
        let mut unsigned = self.clone();
        unsigned.signatures.clear();
        let body =
            serde_json::to_vec(&unsigned).map_err(|e| LifecycleError::Codec(e.to_string()))?;

        let network_id = Sha256::digest(self.network_passphrase.as_bytes());
        let mut hasher = Sha256::new();
        hasher.update(network_id);
        hasher.update(&body);
        Ok(hasher.finalize().into())
    }

    /// Hex transaction hash (the signature base)
    pub fn hash(&self) -> Result<String, LifecycleError> {
        Ok(hex::encode(self.signature_base()?))
    }
}

/// Encodes envelopes into the opaque string exchanged with wallets and RPC
pub trait EnvelopeCodec: Send + Sync {
    fn encode(&self, envelope: &Envelope) -> Result<String, LifecycleError>;
    fn decode(&self, encoded: &str) -> Result<Envelope, LifecycleError>;
}

/// Base64 of the JSON envelope
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEnvelopeCodec;

impl EnvelopeCodec for JsonEnvelopeCodec {
    fn encode(&self, envelope: &Envelope) -> Result<String, LifecycleError> {
        let json =
            serde_json::to_vec(envelope).map_err(|e| LifecycleError::Codec(e.to_string()))?;
        Ok(BASE64_STANDARD.encode(json))
    }

    fn decode(&self, encoded: &str) -> Result<Envelope, LifecycleError> {
        let bytes = BASE64_STANDARD
            .decode(encoded.trim())
            .map_err(|e| LifecycleError::Codec(format!("base64 decode error: {}", e)))?;
        serde_json::from_slice(&bytes).map_err(|e| LifecycleError::Codec(e.to_string()))
    }
}
