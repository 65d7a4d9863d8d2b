//! Wallet bridge and the local ed25519 signer used by the CLI

use anyhow::Context;
use async_trait::async_trait;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::tx_builder::envelope::{DecoratedSignature, Envelope, EnvelopeCodec, JsonEnvelopeCodec};
use crate::types::Address;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// The user refused access or refused to sign
    #[error("User declined: {0}")]
    Declined(String),

    #[error("Wallet not connected")]
    NotConnected,

    #[error("Signer {actual} cannot sign for {expected}")]
    AddressMismatch { expected: String, actual: String },

    #[error("Envelope is for network '{envelope}', wallet asked to sign for '{requested}'")]
    NetworkMismatch { envelope: String, requested: String },

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Key error: {0}")]
    Key(String),
}

impl WalletError {
    pub fn is_user_decline(&self) -> bool {
        matches!(self, Self::Declined(_))
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::Declined(_) => "declined",
            Self::NotConnected => "not_connected",
            Self::AddressMismatch { .. } => "address_mismatch",
            Self::NetworkMismatch { .. } => "network_mismatch",
            Self::Signing(_) => "signing",
            Self::Key(_) => "key",
        }
    }
}

/// Wallet extension bridge
///
/// `sign_transaction` receives the codec-encoded envelope and returns the
/// encoded signed envelope.
#[async_trait]
pub trait WalletBridge: Send + Sync {
    async fn is_connected(&self) -> Result<bool, WalletError>;

    /// Ask the user to allow this client; returns the granted address
    async fn request_access(&self) -> Result<Address, WalletError>;

    /// Current address, `None` when access has not been granted
    async fn get_address(&self) -> Result<Option<Address>, WalletError>;

    async fn sign_transaction(
        &self,
        envelope_xdr: &str,
        address: &Address,
        network_passphrase: &str,
    ) -> Result<String, WalletError>;

    async fn disconnect(&self) -> Result<(), WalletError>;
}

/// Signs with an ed25519 key held in memory
pub struct LocalKeyWallet {
    signing_key: SigningKey,
    address: Address,
    codec: Arc<dyn EnvelopeCodec>,
    connected: AtomicBool,
}

impl LocalKeyWallet {
    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        let address = Address::account_from_public_key(&signing_key.verifying_key().to_bytes());
        Self {
            signing_key,
            address,
            codec: Arc::new(JsonEnvelopeCodec),
            connected: AtomicBool::new(true),
        }
    }

    pub fn with_codec(mut self, codec: Arc<dyn EnvelopeCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Build from a 32-byte seed, rejecting the all-zero key
    pub fn from_seed(seed: &[u8]) -> Result<Self, WalletError> {
        let seed: [u8; 32] = seed
            .try_into()
            .map_err(|_| WalletError::Key(format!("expected 32-byte seed, got {}", seed.len())))?;
        if seed.iter().all(|&b| b == 0) {
            return Err(WalletError::Key("all-zero key rejected".to_string()));
        }
        Ok(Self::from_signing_key(SigningKey::from_bytes(&seed)))
    }

    pub fn from_seed_hex(text: &str) -> Result<Self, WalletError> {
        let bytes = hex::decode(text.trim()).map_err(|e| WalletError::Key(e.to_string()))?;
        Self::from_seed(&bytes)
    }

    /// Load a seed file: either hex text or a JSON array of 32 bytes
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read key file: {}", path.display()))?;
        let trimmed = content.trim();

        let wallet = if trimmed.starts_with('[') {
            let bytes: Vec<u8> =
                serde_json::from_str(trimmed).context("Failed to parse key JSON")?;
            Self::from_seed(&bytes)?
        } else {
            Self::from_seed_hex(trimmed)?
        };
        Ok(wallet)
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    fn ensure_connected(&self) -> Result<(), WalletError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(WalletError::NotConnected)
        }
    }

    /// Sign the envelope in place
    pub fn sign_envelope(&self, envelope: &mut Envelope) -> Result<(), WalletError> {
        if envelope.source != self.address {
            return Err(WalletError::AddressMismatch {
                expected: envelope.source.to_string(),
                actual: self.address.to_string(),
            });
        }
        if !envelope.is_prepared() {
            return Err(WalletError::Signing("envelope is not prepared".to_string()));
        }

        let base = envelope
            .signature_base()
            .map_err(|e| WalletError::Signing(e.to_string()))?;
        let signature = self.signing_key.sign(&base);

        envelope.signatures.push(DecoratedSignature {
            public_key: hex::encode(self.signing_key.verifying_key().to_bytes()),
            signature: hex::encode(signature.to_bytes()),
        });
        Ok(())
    }
}

#[async_trait]
impl WalletBridge for LocalKeyWallet {
    async fn is_connected(&self) -> Result<bool, WalletError> {
        Ok(self.connected.load(Ordering::SeqCst))
    }

    async fn request_access(&self) -> Result<Address, WalletError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(self.address.clone())
    }

    async fn get_address(&self) -> Result<Option<Address>, WalletError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(Some(self.address.clone()))
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
        self.ensure_connected()?;
        if address != &self.address {
            return Err(WalletError::AddressMismatch {
                expected: address.to_string(),
                actual: self.address.to_string(),
            });
        }

        let mut envelope = self
            .codec
            .decode(envelope_xdr)
            .map_err(|e| WalletError::Signing(e.to_string()))?;
        if envelope.network_passphrase != network_passphrase {
            return Err(WalletError::NetworkMismatch {
                envelope: envelope.network_passphrase.clone(),
                requested: network_passphrase.to_string(),
            });
        }

        self.sign_envelope(&mut envelope)?;
        self.codec
            .encode(&envelope)
            .map_err(|e| WalletError::Signing(e.to_string()))
    }

    async fn disconnect(&self) -> Result<(), WalletError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Check every attached signature against the envelope's signature base
pub fn verify_signatures(envelope: &Envelope) -> Result<bool, WalletError> {
    if envelope.signatures.is_empty() {
        return Ok(false);
    }
    let base = envelope
        .signature_base()
        .map_err(|e| WalletError::Signing(e.to_string()))?;

    for sig in &envelope.signatures {
        let key: [u8; 32] = hex::decode(&sig.public_key)
            .map_err(|e| WalletError::Key(e.to_string()))?
            .try_into()
            .map_err(|_| WalletError::Key("public key is not 32 bytes".to_string()))?;
        let key = VerifyingKey::from_bytes(&key).map_err(|e| WalletError::Key(e.to_string()))?;
        let raw: [u8; 64] = hex::decode(&sig.signature)
            .map_err(|e| WalletError::Signing(e.to_string()))?
            .try_into()
            .map_err(|_| WalletError::Signing("signature is not 64 bytes".to_string()))?;

        if key.verify(&base, &Signature::from_bytes(&raw)).is_err() {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx_builder::envelope::{Invocation, ResourceFootprint, ScVal, TimeBounds};

    const PASSPHRASE: &str = "Test SDF Network ; September 2015";

    fn wallet() -> LocalKeyWallet {
        LocalKeyWallet::from_seed(&[7u8; 32]).unwrap()
    }

    fn prepared_envelope(source: Address) -> Envelope {
        Envelope {
            source: source.clone(),
            sequence: 11,
            fee: 100 + 5000,
            network_passphrase: PASSPHRASE.to_string(),
            time_bounds: TimeBounds {
                min_time: 0,
                max_time: 180,
            },
            invocation: Invocation::new(
                Address::parse("CB253GUKVRSRD47JFA2G4JBKNEEVTX7TMM6L6WCWBXVDAE2DYSUNCLSZ").unwrap(),
                "deposit",
                vec![ScVal::Address(source), ScVal::I128(10_000_000)],
            ),
            resources: Some(ResourceFootprint {
                transaction_data: "AAAA".to_string(),
                min_resource_fee: 5000,
                auth: vec![],
            }),
            signatures: vec![],
        }
    }

    #[test]
    fn test_rejects_bad_seeds() {
        assert!(matches!(
            LocalKeyWallet::from_seed(&[0u8; 32]),
            Err(WalletError::Key(_))
        ));
        assert!(matches!(
            LocalKeyWallet::from_seed(&[1u8; 31]),
            Err(WalletError::Key(_))
        ));
        assert!(LocalKeyWallet::from_seed_hex("zz").is_err());
    }

    #[test]
    fn test_address_is_account_strkey() {
        let w = wallet();
        assert!(w.address().as_str().starts_with('G'));
        assert!(!w.address().is_contract());
        assert_eq!(Address::parse(w.address().as_str()).unwrap(), *w.address());
    }

    #[tokio::test]
    async fn test_sign_transaction_attaches_valid_signature() {
        let w = wallet();
        let codec = JsonEnvelopeCodec;
        let env = prepared_envelope(w.address().clone());
        let encoded = codec.encode(&env).unwrap();

        let signed = w
            .sign_transaction(&encoded, w.address(), PASSPHRASE)
            .await
            .unwrap();
        let signed = codec.decode(&signed).unwrap();

        assert_eq!(signed.signatures.len(), 1);
        assert!(verify_signatures(&signed).unwrap());
        assert_eq!(signed.hash().unwrap(), env.hash().unwrap());
    }

    #[tokio::test]
    async fn test_sign_rejects_wrong_network_and_unprepared() {
        let w = wallet();
        let codec = JsonEnvelopeCodec;
        let env = prepared_envelope(w.address().clone());
        let encoded = codec.encode(&env).unwrap();

        let err = w
            .sign_transaction(&encoded, w.address(), "Public Global Stellar Network ; September 2015")
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::NetworkMismatch { .. }));

        let mut unprepared = env.clone();
        unprepared.resources = None;
        assert!(matches!(
            w.sign_envelope(&mut unprepared),
            Err(WalletError::Signing(_))
        ));
    }

    #[tokio::test]
    async fn test_disconnect_blocks_signing() {
        let w = wallet();
        w.disconnect().await.unwrap();
        assert!(!w.is_connected().await.unwrap());
        assert_eq!(w.get_address().await.unwrap(), None);

        let encoded = JsonEnvelopeCodec
            .encode(&prepared_envelope(w.address().clone()))
            .unwrap();
        let err = w
            .sign_transaction(&encoded, w.address(), PASSPHRASE)
            .await
            .unwrap_err();
        assert_eq!(err, WalletError::NotConnected);

        assert_eq!(w.request_access().await.unwrap(), *w.address());
        assert!(w.is_connected().await.unwrap());
    }

    #[test]
    fn test_tampered_signature_fails_verification() {
        let w = wallet();
        let mut env = prepared_envelope(w.address().clone());
        w.sign_envelope(&mut env).unwrap();
        env.fee += 1;
        assert!(!verify_signatures(&env).unwrap());
    }
}
