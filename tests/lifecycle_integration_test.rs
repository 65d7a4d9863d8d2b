//! End-to-end invocation against a mock JSON-RPC contract endpoint
//!
//! Drives the real RPC client, the local signer and the vault client through
//! build, simulate, prepare, sign, submit and confirm.

#[cfg(test)]
mod lifecycle_integration_tests {
    use mockito::{Matcher, ServerGuard};
    use pegaso::metrics::LifecycleMetrics;
    use pegaso::rpc::{ContractRpc, JsonRpcContractClient, RpcError};
    use pegaso::storage::LocalStore;
    use pegaso::tx_builder::{
        ConfirmPolicy, EnvelopeCodec, JsonEnvelopeCodec, LifecycleError, TxBuilder, TxLifecycle,
    };
    use pegaso::types::{default_vaults, Address};
    use pegaso::vault::VaultClient;
    use pegaso::wallet::{verify_signatures, LocalKeyWallet};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    const TESTNET: &str = "Test SDF Network ; September 2015";

    fn reply(result: Value) -> String {
        json!({"jsonrpc": "2.0", "id": 1, "result": result}).to_string()
    }

    async fn mock_method(server: &mut ServerGuard, method: &str, result: Value) -> mockito::Mock {
        server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({"method": method})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(reply(result))
            .create_async()
            .await
    }

    fn lifecycle(url: String, wallet: Arc<LocalKeyWallet>) -> Arc<TxLifecycle> {
        let rpc = Arc::new(JsonRpcContractClient::new(url, Duration::from_secs(5)).unwrap());
        let metrics = Arc::new(LifecycleMetrics::new().unwrap());
        Arc::new(TxLifecycle::new(
            rpc,
            wallet,
            TxBuilder::new(TESTNET),
            ConfirmPolicy::default(),
            metrics,
        ))
    }

    #[tokio::test]
    async fn test_deposit_round_trip() {
        let mut server = mockito::Server::new_async().await;
        let wallet = Arc::new(LocalKeyWallet::from_seed(&[21u8; 32]).unwrap());
        let user = wallet.address().clone();

        let account = mock_method(
            &mut server,
            "getAccount",
            json!({"id": user.as_str(), "sequence": "777"}),
        )
        .await;
        mock_method(
            &mut server,
            "simulateTransaction",
            json!({
                "result": {"retval": {"type": "void"}, "auth": []},
                "transactionData": "AAAAAAAAAAA=",
                "minResourceFee": 81234,
                "latestLedger": 4242
            }),
        )
        .await;
        let send = mock_method(
            &mut server,
            "sendTransaction",
            json!({"hash": "5f3c0a", "status": "PENDING"}),
        )
        .await;
        let poll = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(
                json!({"method": "getTransaction", "params": {"hash": "5f3c0a"}}),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(reply(json!({
                "status": "SUCCESS",
                "returnValue": {"type": "i128", "value": "10000000"},
                "ledger": 4250
            })))
            .expect(1)
            .create_async()
            .await;

        let store = LocalStore::temporary().unwrap();
        let vaults = VaultClient::new(lifecycle(server.url(), wallet.clone()), store.clone());
        let vault = default_vaults().remove(0);

        let outcome = vaults
            .deposit(&user, &vault, "1", &CancellationToken::new())
            .await
            .unwrap();

        account.assert_async().await;
        send.assert_async().await;
        poll.assert_async().await;
        assert_eq!(outcome.hash, "5f3c0a");
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.ledger, Some(4250));
        assert_eq!(store.history().unwrap()[0].tx_hash, "5f3c0a");
    }

    #[tokio::test]
    async fn test_signed_envelope_verifies() {
        let wallet = LocalKeyWallet::from_seed(&[33u8; 32]).unwrap();
        let user = wallet.address().clone();
        let builder = TxBuilder::new(TESTNET);
        let contract = Address::parse(&default_vaults()[0].vault_address).unwrap();

        let source = pegaso::rpc::SourceAccount {
            id: user.clone(),
            sequence: 5,
        };
        let mut envelope = builder.build(
            &source,
            pegaso::tx_builder::Invocation::new(contract, "total_shares", vec![]),
            pegaso::tx_builder::Validity::Write,
        );
        envelope.resources = Some(pegaso::tx_builder::envelope::ResourceFootprint {
            transaction_data: "AAAA".to_string(),
            min_resource_fee: 10,
            auth: vec![],
        });

        wallet.sign_envelope(&mut envelope).unwrap();
        let wire = JsonEnvelopeCodec.encode(&envelope).unwrap();
        let decoded = JsonEnvelopeCodec.decode(&wire).unwrap();

        assert!(verify_signatures(&decoded).unwrap());
        assert_eq!(decoded.sequence, 6);
    }

    #[tokio::test]
    async fn test_rpc_error_object_surfaces() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({"jsonrpc": "2.0", "id": 1,
                       "error": {"code": -32600, "message": "invalid request"}})
                .to_string(),
            )
            .create_async()
            .await;

        let client = JsonRpcContractClient::new(server.url(), Duration::from_secs(5)).unwrap();
        let err = client.get_transaction("abc").await.unwrap_err();

        match &err {
            RpcError::RpcResponse { message, code, .. } => {
                assert_eq!(message, "invalid request");
                assert_eq!(*code, Some(-32600));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails_at_account_stage() {
        let wallet = Arc::new(LocalKeyWallet::from_seed(&[8u8; 32]).unwrap());
        let user = wallet.address().clone();
        let lifecycle = lifecycle("http://127.0.0.1:9".to_string(), wallet);
        let vault = default_vaults().remove(0);
        let store = LocalStore::temporary().unwrap();
        let vaults = VaultClient::new(lifecycle, store);

        let err = vaults
            .deposit(&user, &vault, "1", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, LifecycleError::Rpc(_)));
        assert!(err.is_retryable());
    }
}
