//! Contract invocation lifecycle
//!
//! `invoke` drives one state-changing call through
//! Built → Simulated → Prepared → Signed → Submitted → Confirmed.
//! `read` stops after simulation and returns the simulated value.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn, Instrument};

use super::builder::{TxBuilder, Validity};
use super::confirm::{wait_for_confirmation, ConfirmPolicy};
use super::envelope::{Envelope, EnvelopeCodec, Invocation, JsonEnvelopeCodec, ScVal};
use super::errors::LifecycleError;
use super::simulate::{check_simulation, prepare, simulated_return};
use crate::metrics::{LifecycleMetrics, Timer};
use crate::rpc::{ContractRpc, SendStatus, SimulationResponse, SourceAccount};
use crate::structured_logging::OperationContext;
use crate::types::Address;
use crate::wallet::WalletBridge;

/// Stage reached by an in-flight invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Created,
    Built,
    Simulated,
    Prepared,
    Signed,
    Submitted,
    Confirmed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Built => "built",
            Self::Simulated => "simulated",
            Self::Prepared => "prepared",
            Self::Signed => "signed",
            Self::Submitted => "submitted",
            Self::Confirmed => "confirmed",
        }
    }

    fn next(&self) -> Option<Stage> {
        match self {
            Self::Created => Some(Self::Built),
            Self::Built => Some(Self::Simulated),
            Self::Simulated => Some(Self::Prepared),
            Self::Prepared => Some(Self::Signed),
            Self::Signed => Some(Self::Submitted),
            Self::Submitted => Some(Self::Confirmed),
            Self::Confirmed => None,
        }
    }
}

/// Progress of one invocation. Lives only for the duration of `invoke`.
#[derive(Debug, Clone)]
pub struct PendingTransaction {
    method: String,
    stage: Stage,
    hash: Option<String>,
}

impl PendingTransaction {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            stage: Stage::Created,
            hash: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Move to the next stage; stages never repeat or skip
    pub fn advance(&mut self, to: Stage) -> Result<(), LifecycleError> {
        if self.stage.next() != Some(to) {
            return Err(LifecycleError::internal(format!(
                "illegal stage transition {} -> {}",
                self.stage.as_str(),
                to.as_str()
            )));
        }
        self.stage = to;
        Ok(())
    }

    fn submitted(&mut self, hash: &str) -> Result<(), LifecycleError> {
        self.advance(Stage::Submitted)?;
        self.hash = Some(hash.to_string());
        Ok(())
    }
}

/// Result of a confirmed invocation
#[derive(Debug, Clone, PartialEq)]
pub struct TxOutcome {
    pub hash: String,
    pub return_value: Option<ScVal>,
    pub attempts: u32,
    pub ledger: Option<u32>,
}

pub struct TxLifecycle {
    rpc: Arc<dyn ContractRpc>,
    wallet: Arc<dyn WalletBridge>,
    codec: Arc<dyn EnvelopeCodec>,
    builder: TxBuilder,
    confirm: ConfirmPolicy,
    metrics: Arc<LifecycleMetrics>,
}

impl TxLifecycle {
    pub fn new(
        rpc: Arc<dyn ContractRpc>,
        wallet: Arc<dyn WalletBridge>,
        builder: TxBuilder,
        confirm: ConfirmPolicy,
        metrics: Arc<LifecycleMetrics>,
    ) -> Self {
        Self {
            rpc,
            wallet,
            codec: Arc::new(JsonEnvelopeCodec),
            builder,
            confirm,
            metrics,
        }
    }

    pub fn with_codec(mut self, codec: Arc<dyn EnvelopeCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn network_passphrase(&self) -> &str {
        self.builder.network_passphrase()
    }

    pub fn confirm_policy(&self) -> &ConfirmPolicy {
        &self.confirm
    }

    pub fn metrics(&self) -> &Arc<LifecycleMetrics> {
        &self.metrics
    }

    /// Run a state-changing invocation signed by `user`
    pub async fn invoke(
        &self,
        user: &Address,
        invocation: Invocation,
        cancel: &CancellationToken,
    ) -> Result<TxOutcome, LifecycleError> {
        let ctx = OperationContext::new(&invocation);
        let span = ctx.trace.span();
        let mut pending = PendingTransaction::new(invocation.method.clone());
        self.metrics.invocations_total.inc();

        match self
            .run(user, invocation, cancel, &ctx, &mut pending)
            .instrument(span)
            .await
        {
            Ok(outcome) => {
                self.metrics.invocations_success.inc();
                self.metrics
                    .invocation_latency
                    .observe(ctx.elapsed_secs());
                self.metrics
                    .confirmation_attempts
                    .observe(outcome.attempts as f64);
                ctx.logger
                    .log_confirmed(&outcome.hash, outcome.attempts, ctx.elapsed_ms());
                Ok(outcome)
            }
            Err(err) => {
                self.metrics.record_failure(&err);
                ctx.logger
                    .log_failure(pending.stage().as_str(), &err.to_string(), ctx.elapsed_ms());
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        user: &Address,
        invocation: Invocation,
        cancel: &CancellationToken,
        ctx: &OperationContext,
        pending: &mut PendingTransaction,
    ) -> Result<TxOutcome, LifecycleError> {
        let contract = invocation.contract.to_string();
        let method = invocation.method.clone();

        let account = self.timed_account(user).await?;
        let envelope = self.builder.build(&account, invocation, Validity::Write);
        pending.advance(Stage::Built)?;
        ctx.logger.log_stage(Stage::Built.as_str(), &method, &contract);

        let simulation = self.timed_simulate(&envelope).await?;
        ctx.logger
            .log_simulation(&method, simulation.min_resource_fee, simulation.error.is_none());
        check_simulation(&simulation)?;
        pending.advance(Stage::Simulated)?;

        let envelope = prepare(envelope, &simulation)?;
        pending.advance(Stage::Prepared)?;
        ctx.logger.log_stage(Stage::Prepared.as_str(), &method, &contract);

        let signed = self.sign(&envelope, user).await?;
        pending.advance(Stage::Signed)?;
        ctx.logger.log_stage(Stage::Signed.as_str(), &method, &contract);

        let timer = Timer::new();
        let sent = self.rpc.send(&signed).await?;
        timer.observe_duration(&self.metrics.rpc_latency);
        if sent.status != SendStatus::Pending {
            return Err(LifecycleError::Submission {
                status: sent.status.to_string(),
                detail: sent.error_result,
            });
        }
        pending.submitted(&sent.hash)?;
        ctx.logger.log_submitted(&method, &sent.hash);

        self.metrics.pending_confirmations.inc();
        let confirmed = wait_for_confirmation(
            self.rpc.as_ref(),
            &sent.hash,
            &self.confirm,
            cancel,
            ctx,
            &self.metrics,
        )
        .await;
        self.metrics.pending_confirmations.dec();
        let confirmed = confirmed?;
        pending.advance(Stage::Confirmed)?;

        Ok(TxOutcome {
            hash: sent.hash,
            return_value: confirmed.return_value,
            attempts: confirmed.attempts,
            ledger: confirmed.ledger,
        })
    }

    async fn sign(&self, envelope: &Envelope, user: &Address) -> Result<Envelope, LifecycleError> {
        if !envelope.is_prepared() {
            return Err(LifecycleError::internal("refusing to sign an unprepared envelope"));
        }
        let encoded = self.codec.encode(envelope)?;
        let signed = self
            .wallet
            .sign_transaction(&encoded, user, self.builder.network_passphrase())
            .await
            .map_err(|e| LifecycleError::signing_failed(e.to_string()))?;

        let signed = self.codec.decode(&signed)?;
        if !signed.is_signed() {
            return Err(LifecycleError::signing_failed(
                "wallet returned an unsigned envelope",
            ));
        }
        Ok(signed)
    }

    /// Simulate `invocation` with `source` as the funding account
    pub async fn read(&self, source: &Address, invocation: Invocation) -> Result<ScVal, LifecycleError> {
        let method = invocation.method.clone();
        let result = async {
            let account = self.timed_account(source).await?;
            self.simulate_read(&account, invocation).await
        }
        .await;
        self.finish_read(&method, result)
    }

    /// Read through the zero dummy account; when it cannot be loaded, fall
    /// back to the contract id as a synthetic source at sequence 0.
    pub async fn read_with_fallback(&self, invocation: Invocation) -> Result<ScVal, LifecycleError> {
        let method = invocation.method.clone();
        let account = match self.timed_account(&Address::zero_account()).await {
            Ok(account) => account,
            Err(e) => {
                debug!(method = %method, error = %e, "Dummy account unavailable, using contract as source");
                SourceAccount {
                    id: invocation.contract.clone(),
                    sequence: 0,
                }
            }
        };
        let result = self.simulate_read(&account, invocation).await;
        self.finish_read(&method, result)
    }

    async fn simulate_read(&self, account: &SourceAccount, invocation: Invocation) -> Result<ScVal, LifecycleError> {
        let envelope = self.builder.build(account, invocation, Validity::Read);
        let simulation = self.timed_simulate(&envelope).await?;
        simulated_return(&simulation)
    }

    fn finish_read(&self, method: &str, result: Result<ScVal, LifecycleError>) -> Result<ScVal, LifecycleError> {
        self.metrics.read_queries_total.inc();
        if let Err(e) = &result {
            self.metrics.read_queries_failed.inc();
            warn!(method = %method, error = %e, "Read-only query failed");
        }
        result
    }

    async fn timed_account(&self, address: &Address) -> Result<SourceAccount, LifecycleError> {
        let timer = Timer::new();
        let account = self.rpc.get_account(address).await;
        timer.observe_duration(&self.metrics.rpc_latency);
        Ok(account?)
    }

    async fn timed_simulate(&self, envelope: &Envelope) -> Result<SimulationResponse, LifecycleError> {
        let timer = Timer::new();
        self.metrics.simulations_total.inc();
        let simulation = self.rpc.simulate(envelope).await;
        timer.observe_duration(&self.metrics.rpc_latency);
        Ok(simulation?)
    }
}
