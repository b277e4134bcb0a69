//! # TCP End to End
//!
//! The client with its default `TcpConnector` against the in-process
//! [`TestDisperser`](crate::harness::TestDisperser).

#[cfg(test)]
mod tests {
    use crate::harness::{TestDisperser, BATCH_HEADER_HASH};
    use disperser_client::{
        DisperserApi, DisperserClient, DisperserConfig, DisperserError, LocalBlobRequestSigner,
        LocalPaymentSigner, RpcError, ValidationError,
    };
    use disperser_telemetry::{encode_metrics, init_telemetry, TelemetryConfig};
    use shared_crypto::Secp256k1KeyPair;
    use shared_types::{
        BlobStatus, GetPaymentStateReply, GlobalPaymentParams, PaymentMode, StatusCode,
        MAX_BLOB_BYTES, U256,
    };
    use std::sync::Arc;
    use std::time::Duration;

    fn client(server: &TestDisperser) -> DisperserClient {
        DisperserClient::builder(server.config())
            .blob_request_signer(Arc::new(LocalBlobRequestSigner::new(
                Secp256k1KeyPair::generate(),
            )))
            .payment_signer(Arc::new(
                LocalPaymentSigner::new(Secp256k1KeyPair::generate()).unwrap(),
            ))
            .build()
            .unwrap()
    }

    fn on_demand_state() -> GetPaymentStateReply {
        GetPaymentStateReply {
            payment_global_params: Some(GlobalPaymentParams {
                reservation_window: 10,
                price_per_symbol: 2,
                min_num_symbols: 4,
            }),
            cumulative_payment: U256::from(100u64),
            onchain_cumulative_payment: U256::from(1_000_000u64),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_plain_dispersal_then_status_and_retrieve() {
        let server = TestDisperser::start().await.unwrap();
        let client = client(&server);

        let blob = vec![7u8; 100];
        let receipt = client.disperse_blob(blob.clone(), &[0, 1]).await.unwrap();
        assert_eq!(receipt.status, BlobStatus::Processing);

        let status = client.get_blob_status(&receipt.request_id).await.unwrap();
        assert_eq!(status.blob_status(), Some(BlobStatus::Confirmed));
        let info = status.info.unwrap();
        assert_eq!(info.batch_header_hash, BATCH_HEADER_HASH.to_vec());

        let data = client
            .retrieve_blob(&info.batch_header_hash, info.blob_index)
            .await
            .unwrap();
        assert_eq!(data, blob);
        assert_eq!(server.connections(), 1);
    }

    #[tokio::test]
    async fn test_authenticated_dispersal_verified_by_server() {
        let server = TestDisperser::start().await.unwrap();
        let client = client(&server);

        for _ in 0..3 {
            client
                .disperse_blob_authenticated(vec![1u8; 64], &[0])
                .await
                .unwrap();
        }
        assert_eq!(server.verified_challenges(), 3);
        assert_eq!(server.rejected_challenges(), 0);
    }

    #[tokio::test]
    async fn test_paid_dispersal_after_sync() {
        let server = TestDisperser::start().await.unwrap();
        server.set_payment_state(on_demand_state());
        let client = client(&server);

        client.init_payment_state().await.unwrap();
        client.disperse_paid_blob(vec![0u8; 32], &[0]).await.unwrap();
        client.disperse_paid_blob(vec![0u8; 320], &[0]).await.unwrap();

        let payments: Vec<_> = server
            .paid_requests()
            .into_iter()
            .map(|r| r.payment_header.mode)
            .collect();
        // 1 symbol floored to 4, then 10 symbols, at 2 per symbol
        assert_eq!(
            payments,
            vec![
                PaymentMode::OnDemand {
                    cumulative_payment: U256::from(108u64)
                },
                PaymentMode::OnDemand {
                    cumulative_payment: U256::from(128u64)
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_server_rejects_replayed_payment() {
        let server = TestDisperser::start().await.unwrap();
        server.set_payment_state(on_demand_state());
        let client = client(&server);
        client.init_payment_state().await.unwrap();
        client.disperse_paid_blob(vec![0u8; 32], &[0]).await.unwrap();

        // Re-syncing to the stale baseline makes the next payment repeat 108
        client.init_payment_state().await.unwrap();
        let err = client
            .disperse_paid_blob(vec![0u8; 32], &[0])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DisperserError::Rpc(RpcError::Status {
                code: StatusCode::InvalidArgument,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_calls_share_one_connection() {
        let server = TestDisperser::start().await.unwrap();
        let client = Arc::new(client(&server));

        let calls = (0..16).map(|i| {
            let client = client.clone();
            async move {
                if i % 2 == 0 {
                    client.disperse_blob(vec![i as u8; 32], &[0]).await
                } else {
                    client.disperse_blob_authenticated(vec![i as u8; 32], &[0]).await
                }
            }
        });
        let results = futures::future::join_all(calls).await;

        assert!(results.iter().all(Result::is_ok));
        assert_eq!(server.connections(), 1);
        assert_eq!(server.verified_challenges(), 8);
    }

    #[tokio::test]
    async fn test_close_reconnects() {
        let server = TestDisperser::start().await.unwrap();
        let client = client(&server);

        client.disperse_blob(vec![0u8; 32], &[0]).await.unwrap();
        client.close().await.unwrap();
        assert!(!client.is_connected());
        client.disperse_blob(vec![0u8; 32], &[0]).await.unwrap();
        assert_eq!(server.connections(), 2);
    }

    #[tokio::test]
    async fn test_oversized_blob_leaves_connection_usable() {
        let server = TestDisperser::start().await.unwrap();
        let client = client(&server);
        client.disperse_blob(vec![0u8; 32], &[0]).await.unwrap();

        let err = client
            .disperse_blob(vec![0u8; 65 * 1024 * 1024], &[0])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DisperserError::Validation(ValidationError::TooLarge { max: MAX_BLOB_BYTES, .. })
        ));

        for _ in 0..2 {
            client.disperse_blob(vec![0u8; 32], &[0]).await.unwrap();
        }
        assert!(client.is_connected());
        assert_eq!(server.connections(), 1);
    }

    #[tokio::test]
    async fn test_client_redials_after_server_hang_up() {
        let server = TestDisperser::start().await.unwrap();
        let client = client(&server);
        client.disperse_blob(vec![0u8; 32], &[0]).await.unwrap();

        server.hang_up();
        tokio::time::timeout(Duration::from_secs(2), async {
            while client.is_connected() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        client.disperse_blob(vec![0u8; 32], &[0]).await.unwrap();
        client
            .disperse_blob_authenticated(vec![1u8; 32], &[0])
            .await
            .unwrap();
        assert!(client.is_connected());
        assert_eq!(server.connections(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connection_error() {
        // Bind and release a port so nothing listens on it
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = DisperserClient::builder(DisperserConfig::new("127.0.0.1", port))
            .build()
            .unwrap();
        let err = client.disperse_blob(vec![0u8; 32], &[0]).await.unwrap_err();
        assert!(matches!(err, DisperserError::ConnectionInit(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_dispersal_with_telemetry_installed() {
        let _guard = init_telemetry(TelemetryConfig::for_testing()).unwrap();
        let server = TestDisperser::start().await.unwrap();
        let client = client(&server);
        client
            .disperse_blob_authenticated(vec![3u8; 32], &[0])
            .await
            .unwrap();

        let text = encode_metrics().unwrap();
        assert!(text.contains("disperser_dispersals_total"));
        assert!(text.contains("mode=\"authenticated\""));
        assert!(text.contains("disperser_connection_attempts_total"));
    }
}
