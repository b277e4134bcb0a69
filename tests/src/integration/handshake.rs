//! # Authenticated Handshake Failures
//!
//! A misbehaving stream fails the dispersal with a protocol error and
//! leaves payment state untouched.

#[cfg(test)]
mod tests {
    use disperser_client::{
        DisperserApi, DisperserClient, DisperserConfig, DisperserError, FixedTimeSource,
        InMemoryDisperser, LocalBlobRequestSigner, LocalPaymentSigner, MemoryConnector,
        StreamBehavior,
    };
    use disperser_telemetry::{encode_metrics, register_metrics};
    use shared_crypto::Secp256k1KeyPair;
    use shared_types::{GetPaymentStateReply, GlobalPaymentParams, U256};
    use std::sync::Arc;

    fn setup() -> (InMemoryDisperser, DisperserClient) {
        let disperser = InMemoryDisperser::new();
        disperser.set_payment_state(GetPaymentStateReply {
            payment_global_params: Some(GlobalPaymentParams {
                reservation_window: 10,
                price_per_symbol: 1,
                min_num_symbols: 1,
            }),
            cumulative_payment: U256::from(7u64),
            onchain_cumulative_payment: U256::from(1_000u64),
            ..Default::default()
        });
        let client = DisperserClient::builder(DisperserConfig::for_testing())
            .connector(Arc::new(MemoryConnector::new(disperser.clone())))
            .time_source(Arc::new(FixedTimeSource::new(1_000)))
            .blob_request_signer(Arc::new(LocalBlobRequestSigner::new(
                Secp256k1KeyPair::generate(),
            )))
            .payment_signer(Arc::new(
                LocalPaymentSigner::new(Secp256k1KeyPair::generate()).unwrap(),
            ))
            .build()
            .unwrap();
        (disperser, client)
    }

    #[tokio::test]
    async fn test_protocol_errors_have_no_payment_side_effects() {
        let (disperser, client) = setup();
        client.init_payment_state().await.unwrap();
        let before = client.accountant().snapshot();

        for behavior in [
            StreamBehavior::ReplyInsteadOfChallenge,
            StreamBehavior::ChallengeTwice,
        ] {
            disperser.set_stream_behavior(behavior);
            let err = client
                .disperse_blob_authenticated(vec![0u8; 32], &[0])
                .await
                .unwrap_err();
            assert!(matches!(err, DisperserError::ProtocolSequence { .. }));
            assert!(!err.is_retryable());
        }

        assert_eq!(client.accountant().snapshot(), before);
        assert!(disperser.paid_requests().is_empty());
        assert_eq!(disperser.blob_count(), 0);
    }

    #[tokio::test]
    async fn test_client_recovers_after_protocol_error() {
        let (disperser, client) = setup();
        disperser.set_stream_behavior(StreamBehavior::ReplyInsteadOfChallenge);
        assert!(client
            .disperse_blob_authenticated(vec![0u8; 32], &[0])
            .await
            .is_err());

        disperser.set_stream_behavior(StreamBehavior::Honest);
        client
            .disperse_blob_authenticated(vec![0u8; 32], &[0])
            .await
            .unwrap();
        assert_eq!(disperser.authenticated_dispersals().len(), 1);
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn test_handshake_failures_are_counted() {
        register_metrics().unwrap();
        let (disperser, client) = setup();
        disperser.set_stream_behavior(StreamBehavior::ReplyInsteadOfChallenge);
        let _ = client
            .disperse_blob_authenticated(vec![0u8; 32], &[0])
            .await;

        let text = encode_metrics().unwrap();
        assert!(text.contains("disperser_handshake_failures_total"));
        assert!(text.contains("state=\"SentRequest\""));
    }
}
