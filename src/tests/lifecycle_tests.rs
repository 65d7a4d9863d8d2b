//! Tests for the contract invocation lifecycle
//!
//! Validates:
//! - Confirmation poll budget (30 polls in total)
//! - Terminal failures at simulation, signing and submission
//! - Cancellation and the optional confirmation deadline
//! - Read-only queries and the dummy-source fallback

#[cfg(test)]
mod lifecycle_tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    use crate::rpc::{SendStatus, TxStatus};
    use crate::test_utils::*;
    use crate::tx_builder::{ConfirmPolicy, Invocation, LifecycleError, ScVal, BASE_FEE};
    use crate::types::Address;
    use crate::wallet::verify_signatures;

    fn deposit_call(user: &Address) -> Invocation {
        let vault = test_vault().vault_contract().unwrap();
        Invocation::new(
            vault,
            "deposit",
            vec![ScVal::Address(user.clone()), ScVal::I128(10_000_000)],
        )
    }

    fn setup() -> (Arc<MockContractRpc>, Arc<MockWallet>) {
        (Arc::new(MockContractRpc::new()), Arc::new(MockWallet::new(7)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirms_on_last_allowed_poll() {
        let (rpc, wallet) = setup();
        rpc.push_statuses((0..29).map(|_| status(TxStatus::NotFound)))
            .await;
        let lifecycle = lifecycle_with(rpc.clone(), wallet.clone());
        let user = wallet.address().clone();

        let outcome = lifecycle
            .invoke(&user, deposit_call(&user), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 30);
        assert_eq!(rpc.polls(), 30);
        let sent = rpc.sent.lock().await;
        assert_eq!(outcome.hash, sent[0].hash().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_thirty_polls() {
        let (rpc, wallet) = setup();
        rpc.set_final_status(status(TxStatus::NotFound)).await;
        let lifecycle = lifecycle_with(rpc.clone(), wallet.clone());
        let user = wallet.address().clone();

        let err = lifecycle
            .invoke(&user, deposit_call(&user), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            LifecycleError::Confirmation { status, attempts } => {
                assert_eq!(status, "NOT_FOUND");
                assert_eq!(attempts, 30);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(rpc.polls(), 30);
        assert_eq!(lifecycle.metrics().pending_confirmations.get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_status_stops_polling() {
        let (rpc, wallet) = setup();
        rpc.push_statuses([status(TxStatus::NotFound), status(TxStatus::Failed)])
            .await;
        let lifecycle = lifecycle_with(rpc.clone(), wallet.clone());
        let user = wallet.address().clone();

        let err = lifecycle
            .invoke(&user, deposit_call(&user), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, LifecycleError::Confirmation { attempts: 2, .. }));
        assert_eq!(err.to_string(), "Transaction failed: FAILED");
        assert_eq!(rpc.polls(), 2);
    }

    #[tokio::test]
    async fn test_simulation_error_is_terminal() {
        let (rpc, wallet) = setup();
        let message = "HostError: Error(Contract, #3)";
        rpc.set_simulation("deposit", error_simulation(message)).await;
        let lifecycle = lifecycle_with(rpc.clone(), wallet.clone());
        let user = wallet.address().clone();

        let err = lifecycle
            .invoke(&user, deposit_call(&user), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.simulation_message(), Some(message));
        assert!(!err.is_retryable());
        assert_eq!(wallet.sign_calls.load(Ordering::SeqCst), 0);
        assert_eq!(rpc.send_calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            lifecycle
                .metrics()
                .invocations_failed
                .with_label_values(&["simulation"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn test_missing_result_reports_unknown_simulation_error() {
        let (rpc, wallet) = setup();
        rpc.set_simulation("deposit", Default::default()).await;
        let lifecycle = lifecycle_with(rpc.clone(), wallet.clone());
        let user = wallet.address().clone();

        let err = lifecycle
            .invoke(&user, deposit_call(&user), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.simulation_message(), Some("Unknown simulation error"));
    }

    #[tokio::test]
    async fn test_declined_signature_never_submits() {
        let (rpc, wallet) = setup();
        wallet.set_decline_signing(true).await;
        let lifecycle = lifecycle_with(rpc.clone(), wallet.clone());
        let user = wallet.address().clone();

        let err = lifecycle
            .invoke(&user, deposit_call(&user), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, LifecycleError::Signing(_)));
        assert_eq!(wallet.sign_calls.load(Ordering::SeqCst), 1);
        assert_eq!(rpc.send_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_non_pending_submission_fails_without_polling() {
        let (rpc, wallet) = setup();
        rpc.set_send_status(SendStatus::Error).await;
        let lifecycle = lifecycle_with(rpc.clone(), wallet.clone());
        let user = wallet.address().clone();

        let err = lifecycle
            .invoke(&user, deposit_call(&user), &CancellationToken::new())
            .await
            .unwrap_err();

        match &err {
            LifecycleError::Submission { status, detail } => {
                assert_eq!(status, "ERROR");
                assert_eq!(detail.as_deref(), Some("txMalformed"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(err.to_string(), "Transaction failed: ERROR (txMalformed)");
        assert_eq!(rpc.polls(), 0);
    }

    #[tokio::test]
    async fn test_submitted_envelope_is_prepared_and_signed() {
        let (rpc, wallet) = setup();
        let lifecycle = lifecycle_with(rpc.clone(), wallet.clone());
        let user = wallet.address().clone();

        lifecycle
            .invoke(&user, deposit_call(&user), &CancellationToken::new())
            .await
            .unwrap();

        let sent = rpc.sent.lock().await;
        let envelope = &sent[0];
        assert_eq!(envelope.source, user);
        assert_eq!(envelope.sequence, rpc.sequence + 1);
        assert_eq!(envelope.fee, BASE_FEE + 50_000);
        assert!(envelope.is_prepared());
        assert!(verify_signatures(envelope).unwrap());
        assert_eq!(envelope.network_passphrase, TEST_PASSPHRASE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_confirmation() {
        let (rpc, wallet) = setup();
        let lifecycle = lifecycle_with(rpc.clone(), wallet.clone());
        let user = wallet.address().clone();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = lifecycle
            .invoke(&user, deposit_call(&user), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, LifecycleError::Cancelled { attempts: 0 }));
        assert_eq!(rpc.send_calls.load(Ordering::SeqCst), 1);
        assert_eq!(rpc.polls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_polling() {
        let (rpc, wallet) = setup();
        rpc.set_final_status(status(TxStatus::NotFound)).await;
        let lifecycle = lifecycle_with(rpc.clone(), wallet.clone());
        let user = wallet.address().clone();
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(4_500)).await;
            trigger.cancel();
        });

        let err = lifecycle
            .invoke(&user, deposit_call(&user), &cancel)
            .await
            .unwrap_err();

        match err {
            LifecycleError::Cancelled { attempts } => assert!(attempts > 0 && attempts < 30),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(rpc.polls() < 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_ends_wait_early() {
        let (rpc, wallet) = setup();
        rpc.set_final_status(status(TxStatus::NotFound)).await;
        let policy = ConfirmPolicy::default().with_timeout(Duration::from_millis(2_500));
        let lifecycle = lifecycle_with_policy(rpc.clone(), wallet.clone(), policy);
        let user = wallet.address().clone();

        let err = lifecycle
            .invoke(&user, deposit_call(&user), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            LifecycleError::Timeout { attempts, elapsed_ms } => {
                assert_eq!(attempts, 3);
                assert_eq!(rpc.polls(), 3);
                assert!(elapsed_ms <= 2_500, "deadline overshot: {} ms", elapsed_ms);
                assert!(elapsed_ms >= 2_000);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cuts_slow_status_request() {
        let (rpc, wallet) = setup();
        rpc.set_poll_delay(Duration::from_secs(3)).await;
        let policy = ConfirmPolicy::default().with_timeout(Duration::from_millis(1_200));
        let lifecycle = lifecycle_with_policy(rpc.clone(), wallet.clone(), policy);
        let user = wallet.address().clone();

        let err = lifecycle
            .invoke(&user, deposit_call(&user), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            LifecycleError::Timeout { attempts, elapsed_ms } => {
                assert_eq!(attempts, 0);
                assert!(elapsed_ms <= 1_200, "deadline overshot: {} ms", elapsed_ms);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(lifecycle.metrics().pending_confirmations.get(), 0);
    }

    #[tokio::test]
    async fn test_read_uses_user_as_source() {
        let (rpc, wallet) = setup();
        rpc.set_simulation("balance", ok_simulation(ScVal::I128(42))).await;
        let lifecycle = lifecycle_with(rpc.clone(), wallet.clone());
        let user = wallet.address().clone();
        let vault = test_vault().vault_contract().unwrap();

        let value = lifecycle
            .read(&user, Invocation::new(vault, "balance", vec![ScVal::Address(user.clone())]))
            .await
            .unwrap();

        assert_eq!(value, ScVal::I128(42));
        let simulated = rpc.simulated.lock().await;
        assert_eq!(simulated[0].source, user);
        assert_eq!(wallet.sign_calls.load(Ordering::SeqCst), 0);
        assert_eq!(rpc.send_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_read_fallback_uses_contract_when_dummy_missing() {
        let (rpc, wallet) = setup();
        rpc.remove_account(&Address::zero_account()).await;
        rpc.set_simulation("total_shares", ok_simulation(ScVal::I128(7))).await;
        let lifecycle = lifecycle_with(rpc.clone(), wallet.clone());
        let vault = test_vault().vault_contract().unwrap();

        let value = lifecycle
            .read_with_fallback(Invocation::new(vault.clone(), "total_shares", vec![]))
            .await
            .unwrap();

        assert_eq!(value, ScVal::I128(7));
        let simulated = rpc.simulated.lock().await;
        assert_eq!(simulated[0].source, vault);
        assert_eq!(simulated[0].sequence, 1);
    }

    #[tokio::test]
    async fn test_read_failure_is_an_error_not_zero() {
        let (rpc, wallet) = setup();
        rpc.set_simulation("total_shares", error_simulation("trap")).await;
        let lifecycle = lifecycle_with(rpc.clone(), wallet.clone());
        let vault = test_vault().vault_contract().unwrap();

        let err = lifecycle
            .read_with_fallback(Invocation::new(vault, "total_shares", vec![]))
            .await
            .unwrap_err();

        assert_eq!(err.simulation_message(), Some("trap"));
        assert_eq!(lifecycle.metrics().read_queries_failed.get(), 1);
    }
}
