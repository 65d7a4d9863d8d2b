//! Envelope construction

use chrono::Utc;
use std::time::Duration;

use super::envelope::{Envelope, Invocation, TimeBounds};
use crate::rpc::SourceAccount;

/// Base fee per operation in stroops
pub const BASE_FEE: u64 = 100;

pub const WRITE_VALIDITY: Duration = Duration::from_secs(180);
pub const READ_VALIDITY: Duration = Duration::from_secs(30);

/// Which validity window an envelope gets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    /// State-changing call that goes through signing and submission
    Write,
    /// Simulation-only query
    Read,
}

#[derive(Debug, Clone)]
pub struct TxBuilder {
    network_passphrase: String,
    base_fee: u64,
    write_validity: Duration,
    read_validity: Duration,
}

impl TxBuilder {
    pub fn new(network_passphrase: impl Into<String>) -> Self {
        Self {
            network_passphrase: network_passphrase.into(),
            base_fee: BASE_FEE,
            write_validity: WRITE_VALIDITY,
            read_validity: READ_VALIDITY,
        }
    }

    pub fn with_base_fee(mut self, base_fee: u64) -> Self {
        self.base_fee = base_fee;
        self
    }

    pub fn with_validity(mut self, write: Duration, read: Duration) -> Self {
        self.write_validity = write;
        self.read_validity = read;
        self
    }

    pub fn network_passphrase(&self) -> &str {
        &self.network_passphrase
    }

    pub fn base_fee(&self) -> u64 {
        self.base_fee
    }

    /// Build an unsigned envelope consuming the account's next sequence number
    pub fn build(&self, source: &SourceAccount, invocation: Invocation, validity: Validity) -> Envelope {
        let window = match validity {
            Validity::Write => self.write_validity,
            Validity::Read => self.read_validity,
        };
        let now = Utc::now().timestamp();

        Envelope {
            source: source.id.clone(),
            sequence: source.sequence + 1,
            fee: self.base_fee,
            network_passphrase: self.network_passphrase.clone(),
            time_bounds: TimeBounds {
                min_time: 0,
                max_time: now + window.as_secs() as i64,
            },
            invocation,
            resources: None,
            signatures: Vec::new(),
        }
    }
}
