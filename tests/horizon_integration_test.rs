//! Integration tests for the ledger query client against a mock REST server

#[cfg(test)]
mod horizon_integration_tests {
    use mockito::Matcher;
    use pegaso::rpc::{HorizonClient, LedgerQuery, RpcError};
    use pegaso::types::Address;
    use serde_json::json;
    use std::time::Duration;

    fn account() -> Address {
        Address::account_from_public_key(&[4u8; 32])
    }

    #[tokio::test]
    async fn test_load_account() {
        let mut server = mockito::Server::new_async().await;
        let address = account();
        let mock = server
            .mock("GET", format!("/accounts/{}", address).as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "account_id": address.as_str(),
                    "sequence": "4294967301",
                    "subentry_count": 3,
                    "num_sponsoring": 1,
                    "balances": [
                        {"asset_type": "credit_alphanum4", "asset_code": "USDC",
                         "asset_issuer": "GBBD47IF6LWK7P7MDEVSCWR7DPUWV3NY3DTQEVFL4NAT4AQH3ZLLFLA5",
                         "balance": "15.0000000"},
                        {"asset_type": "native", "balance": "9999.1234567"}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = HorizonClient::new(server.url(), Duration::from_secs(5)).unwrap();
        let record = client.load_account(&address).await.unwrap();

        mock.assert_async().await;
        assert_eq!(record.sequence, "4294967301");
        assert_eq!(record.subentry_count, 3);
        assert_eq!(record.num_sponsored, 0);
        assert_eq!(record.native_balance(), Some("9999.1234567"));
        assert_eq!(record.balances.len(), 2);
    }

    #[tokio::test]
    async fn test_unfunded_account_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        let address = account();
        server
            .mock("GET", format!("/accounts/{}", address).as_str())
            .with_status(404)
            .with_body(r#"{"status":404,"title":"Resource Missing"}"#)
            .create_async()
            .await;

        let client = HorizonClient::new(server.url(), Duration::from_secs(5)).unwrap();
        let err = client.load_account(&address).await.unwrap_err();

        assert!(err.is_not_found());
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_payments_newest_first_with_limit() {
        let mut server = mockito::Server::new_async().await;
        let address = account();
        let mock = server
            .mock("GET", format!("/accounts/{}/payments", address).as_str())
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("order".into(), "desc".into()),
                Matcher::UrlEncoded("limit".into(), "5".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "_embedded": {"records": [
                        {"id": "2", "type": "payment", "created_at": "2025-03-01T10:00:00Z",
                         "amount": "12.0000000", "asset_type": "native",
                         "to": address.as_str(), "transaction_hash": "aa11"},
                        {"id": "1", "type": "invoke_host_function",
                         "created_at": "2025-02-01T10:00:00Z", "transaction_hash": "bb22"}
                    ]}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = HorizonClient::new(server.url(), Duration::from_secs(5)).unwrap();
        let payments = client.payments(&address, 5).await.unwrap();

        mock.assert_async().await;
        assert_eq!(payments.len(), 2);
        assert_eq!(payments[0].amount.as_deref(), Some("12.0000000"));
        assert_eq!(payments[1].kind, "invoke_host_function");
        assert!(payments[1].amount.is_none());
    }

    #[tokio::test]
    async fn test_latest_ledger() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/ledgers")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({"_embedded": {"records": [
                    {"sequence": 512345, "successful_transaction_count": 12,
                     "operation_count": 40, "fee_pool": "3000.1000000",
                     "closed_at": "2025-03-01T10:00:05Z"}
                ]}})
                .to_string(),
            )
            .create_async()
            .await;

        let client = HorizonClient::new(server.url(), Duration::from_secs(5)).unwrap();
        let ledger = client.latest_ledger().await.unwrap();

        assert_eq!(ledger.sequence, 512345);
        assert_eq!(ledger.operation_count, 40);
        assert!(ledger.closed_at.is_some());
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/ledgers")
            .match_query(Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let client = HorizonClient::new(server.url(), Duration::from_secs(5)).unwrap();
        let err = client.latest_ledger().await.unwrap_err();

        assert!(matches!(err, RpcError::Http { status: 503, .. }));
        assert!(err.is_retryable());
    }
}
