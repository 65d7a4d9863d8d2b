//! Persisted client-side state
//!
//! Two entries, never sent anywhere: the "wallet was connected" flag and the
//! capped list of locally recorded vault transactions. The history is a
//! display cache; the ledger stays the source of truth.

use std::path::Path;
use thiserror::Error;
use tracing::warn;

use crate::types::VaultTransactionRecord;

pub const CONNECTED_FLAG_KEY: &str = "pegaso_wallet_connected";
pub const HISTORY_KEY: &str = "vault_tx_history";
pub const MAX_HISTORY: usize = 50;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Db(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StorageError {
    pub fn category(&self) -> &'static str {
        match self {
            Self::Db(_) => "db",
            Self::Serialization(_) => "serialization",
        }
    }
}

#[derive(Clone)]
pub struct LocalStore {
    db: sled::Db,
}

impl LocalStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// In-memory store, removed on drop
    pub fn temporary() -> Result<Self, StorageError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    pub fn connected_flag(&self) -> Result<bool, StorageError> {
        Ok(self
            .db
            .get(CONNECTED_FLAG_KEY)?
            .map(|v| v.as_ref() == b"true")
            .unwrap_or(false))
    }

    pub fn set_connected_flag(&self, connected: bool) -> Result<(), StorageError> {
        if connected {
            self.db.insert(CONNECTED_FLAG_KEY, "true".as_bytes())?;
        } else {
            self.db.remove(CONNECTED_FLAG_KEY)?;
        }
        self.db.flush()?;
        Ok(())
    }

    /// Prepend a record and truncate to [`MAX_HISTORY`] in one atomic
    /// read-modify-write. Returns the list as stored.
    pub fn record_transaction(
        &self,
        record: &VaultTransactionRecord,
    ) -> Result<Vec<VaultTransactionRecord>, StorageError> {
        let mut encode_error = None;
        let stored = self.db.update_and_fetch(HISTORY_KEY, |old| {
            // sled reruns this closure when its compare-and-swap loses a race
            encode_error = None;
            let mut list = old.map(decode_history).unwrap_or_default();
            list.insert(0, record.clone());
            list.truncate(MAX_HISTORY);
            match serde_json::to_vec(&list) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    encode_error = Some(e.to_string());
                    old.map(|b| b.to_vec())
                }
            }
        })?;
        if let Some(e) = encode_error {
            return Err(StorageError::Serialization(e));
        }
        self.db.flush()?;

        Ok(stored.map(|b| decode_history(&b)).unwrap_or_default())
    }

    /// Newest first. A corrupt entry reads as an empty history.
    pub fn history(&self) -> Result<Vec<VaultTransactionRecord>, StorageError> {
        Ok(self
            .db
            .get(HISTORY_KEY)?
            .map(|b| decode_history(&b))
            .unwrap_or_default())
    }

    pub fn clear_history(&self) -> Result<(), StorageError> {
        self.db.remove(HISTORY_KEY)?;
        self.db.flush()?;
        Ok(())
    }
}

fn decode_history(bytes: &[u8]) -> Vec<VaultTransactionRecord> {
    serde_json::from_slice(bytes).unwrap_or_else(|e| {
        warn!(error = %e, "Discarding unreadable transaction history");
        Vec::new()
    })
}
