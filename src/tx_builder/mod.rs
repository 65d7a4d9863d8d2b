//! Transaction lifecycle client
//!
//! Builds a contract invocation, simulates it, merges the resource footprint,
//! has the wallet sign it, submits it and polls for the final status.
//!
//! ## Architecture
//!
//! - **errors**: `LifecycleError`, one variant family per stage
//! - **envelope**: invocation envelope, typed contract values, wire codec
//! - **builder**: envelope construction (base fee, sequence, validity window)
//! - **simulate**: simulation checks and resource preparation
//! - **confirm**: bounded, cancellable confirmation polling
//! - **lifecycle**: `TxLifecycle`, the stage machine tying it together
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use pegaso::tx_builder::{TxLifecycle, Invocation, ScVal, LifecycleError};
//! # use pegaso::types::Address;
//! # async fn example(lifecycle: Arc<TxLifecycle>, user: Address, vault: Address) -> Result<(), LifecycleError> {
//! let cancel = tokio_util::sync::CancellationToken::new();
//! let call = Invocation::new(vault, "deposit", vec![ScVal::Address(user.clone()), ScVal::I128(10_000_000)]);
//! let outcome = lifecycle.invoke(&user, call, &cancel).await?;
//! println!("confirmed {} after {} polls", outcome.hash, outcome.attempts);
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub use errors::LifecycleError;

pub mod builder;
pub mod confirm;
pub mod envelope;
pub mod lifecycle;
pub mod simulate;

pub use builder::{TxBuilder, Validity, BASE_FEE};
pub use confirm::{wait_for_confirmation, ConfirmPolicy, Confirmed};
pub use envelope::{Envelope, EnvelopeCodec, Invocation, JsonEnvelopeCodec, ScVal};
pub use lifecycle::{PendingTransaction, Stage, TxLifecycle, TxOutcome};
pub use simulate::{check_simulation, prepare};
