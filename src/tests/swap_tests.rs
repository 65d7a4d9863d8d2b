//! Tests for the router swap client
//!
//! Validates:
//! - The resolved chain and slippage floor reach `swap_chained`
//! - The router's u128 return value becomes the received amount
//! - Routing failures stop before anything is signed

#[cfg(test)]
mod swap_tests {
    use serde_json::json;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    use crate::rpc::{TransactionStatusResponse, TxStatus};
    use crate::swap::{SwapClient, SwapError, SwapPathResolver, SwapToken, DEFAULT_SLIPPAGE_BPS};
    use crate::test_utils::*;
    use crate::tx_builder::ScVal;
    use crate::types::{Address, Amount, StellarAsset};

    const USDC_ISSUER: &str = "GBBD47IF6LWK7P7MDEVSCWR7DPUWV3NY3DTQEVFL4NAT4AQH3ZLLFLA5";

    fn tokens() -> Vec<SwapToken> {
        vec![
            SwapToken::new("XLM", StellarAsset::Native),
            SwapToken::new("USDC", StellarAsset::credit("USDC", USDC_ISSUER).unwrap()),
        ]
    }

    async fn client_with_path(
        server: &mut mockito::ServerGuard,
        status: usize,
        body: serde_json::Value,
    ) -> (SwapClient, Arc<MockContractRpc>, Arc<MockWallet>) {
        server
            .mock("POST", "/find-path/")
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let rpc = Arc::new(MockContractRpc::new());
        let wallet = Arc::new(MockWallet::new(11));
        let resolver = SwapPathResolver::new(server.url(), Duration::from_secs(5)).unwrap();
        let client = SwapClient::new(
            resolver,
            lifecycle_with(rpc.clone(), wallet.clone()),
            Address::contract_from_hash(&[9u8; 32]),
            tokens(),
            DEFAULT_SLIPPAGE_BPS,
        );
        (client, rpc, wallet)
    }

    #[tokio::test]
    async fn test_swap_invokes_router_with_slippage_floor() {
        let mut server = mockito::Server::new_async().await;
        let (client, rpc, wallet) = client_with_path(
            &mut server,
            200,
            json!({"success": true, "swap_chain_xdr": "AAAAEAAA", "amount": "1000000"}),
        )
        .await;
        rpc.set_final_status(TransactionStatusResponse {
            status: TxStatus::Success,
            return_value: Some(ScVal::U128(995_000)),
            ledger: Some(77),
        })
        .await;
        let user = wallet.address().clone();

        let outcome = client
            .swap(&user, "xlm", "USDC", "2", &CancellationToken::new())
            .await
            .unwrap();

        let sent = rpc.sent.lock().await;
        let call = &sent[0].invocation;
        assert_eq!(call.contract, Address::contract_from_hash(&[9u8; 32]));
        assert_eq!(call.method, "swap_chained");
        assert_eq!(call.args[0], ScVal::Address(user.clone()));
        assert_eq!(call.args[1], ScVal::Raw("AAAAEAAA".to_string()));
        assert_eq!(
            call.args[2],
            ScVal::Address(client.token_address("XLM").unwrap())
        );
        assert_eq!(call.args[3], ScVal::U128(20_000_000));
        assert_eq!(call.args[4], ScVal::U128(990_000));

        assert_eq!(outcome.estimated_out.to_string(), "0.1");
        assert_eq!(outcome.min_out.to_string(), "0.099");
        assert_eq!(outcome.received, Some(Amount::from_raw(995_000, 7)));
        assert_eq!(outcome.hash, sent[0].hash().unwrap());
    }

    #[tokio::test]
    async fn test_unknown_token_is_rejected_locally() {
        let mut server = mockito::Server::new_async().await;
        let (client, rpc, wallet) =
            client_with_path(&mut server, 200, json!({"success": true})).await;

        let err = client
            .swap(wallet.address(), "XLM", "BTC", "1", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, SwapError::UnknownToken(ref t) if t == "BTC"));
        assert_eq!(rpc.get_account_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_path_stops_before_signing() {
        let mut server = mockito::Server::new_async().await;
        let (client, rpc, wallet) = client_with_path(
            &mut server,
            200,
            json!({"success": false, "error": "No path found"}),
        )
        .await;

        let err = client
            .swap(wallet.address(), "XLM", "USDC", "5", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, SwapError::NoLiquidity));
        assert_eq!(wallet.sign_calls.load(Ordering::SeqCst), 0);
        assert_eq!(rpc.send_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_amount_is_invalid() {
        let mut server = mockito::Server::new_async().await;
        let (client, _rpc, wallet) =
            client_with_path(&mut server, 200, json!({"success": true})).await;

        let err = client
            .swap(wallet.address(), "XLM", "USDC", "0", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::InvalidAmount(_)));
    }
}
