//! # Shared Connection
//!
//! Concurrent first calls share one dial; a failed dial is retried by the
//! next call instead of being cached, and so is a channel the server hung
//! up on.

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use disperser_client::{
        Connector, DisperserApi, DisperserClient, DisperserConfig, DisperserError, DisperserRpc,
        InMemoryDisperser, MemoryConnector, ValidationError,
    };
    use shared_types::MAX_BLOB_BYTES;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn client_with(connector: Arc<dyn Connector>) -> Arc<DisperserClient> {
        let client = DisperserClient::builder(DisperserConfig::for_testing())
            .connector(connector)
            .build()
            .unwrap();
        Arc::new(client)
    }

    #[tokio::test]
    async fn test_concurrent_first_calls_dial_once() {
        let disperser = InMemoryDisperser::new();
        let connector =
            Arc::new(MemoryConnector::new(disperser.clone()).with_delay(Duration::from_millis(50)));
        let client = client_with(connector.clone());

        let calls = (0..20).map(|_| {
            let client = client.clone();
            async move { client.disperse_blob(vec![0u8; 32], &[0]).await }
        });
        let results = futures::future::join_all(calls).await;

        assert!(results.iter().all(Result::is_ok));
        assert_eq!(connector.connect_count(), 1);
        assert_eq!(disperser.blob_count(), 20);
    }

    #[tokio::test]
    async fn test_joined_callers_see_the_same_failure_then_retry() {
        let connector = Arc::new(
            MemoryConnector::new(InMemoryDisperser::new()).with_delay(Duration::from_millis(50)),
        );
        connector.fail_next(1);
        let client = client_with(connector.clone());

        let calls = (0..5).map(|_| {
            let client = client.clone();
            async move { client.disperse_blob(vec![0u8; 32], &[0]).await }
        });
        for result in futures::future::join_all(calls).await {
            assert!(matches!(result, Err(DisperserError::ConnectionInit(_))));
        }
        assert_eq!(connector.connect_count(), 1);

        client.disperse_blob(vec![0u8; 32], &[0]).await.unwrap();
        assert_eq!(connector.connect_count(), 2);
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn test_hang_up_is_followed_by_one_redial() {
        let disperser = InMemoryDisperser::new();
        let connector = Arc::new(MemoryConnector::new(disperser.clone()));
        let client = client_with(connector.clone());
        client.disperse_blob(vec![0u8; 32], &[0]).await.unwrap();

        disperser.hang_up();
        assert!(!client.is_connected());

        let calls = (0..8).map(|_| {
            let client = client.clone();
            async move { client.disperse_blob(vec![0u8; 32], &[0]).await }
        });
        let results = futures::future::join_all(calls).await;
        assert!(results.iter().all(Result::is_ok));
        assert_eq!(connector.connect_count(), 2);
        assert_eq!(disperser.blob_count(), 9);
    }

    #[tokio::test]
    async fn test_oversized_payload_never_reaches_the_channel() {
        let connector = Arc::new(MemoryConnector::new(InMemoryDisperser::new()));
        let client = client_with(connector.clone());
        let err = client
            .disperse_blob(vec![0u8; MAX_BLOB_BYTES + 1], &[0])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DisperserError::Validation(ValidationError::TooLarge { .. })
        ));
        assert_eq!(connector.connect_count(), 0);
    }

    // Never finishes dialing.
    struct HangingConnector {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl Connector for HangingConnector {
        async fn connect(
            &self,
            _config: &DisperserConfig,
        ) -> Result<Arc<dyn DisperserRpc>, DisperserError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            futures::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_hanging_dial_is_bounded_by_connect_timeout() {
        let connector = Arc::new(HangingConnector {
            attempts: AtomicUsize::new(0),
        });
        let mut config = DisperserConfig::for_testing();
        config.connect_timeout = Duration::from_millis(30);
        let client = DisperserClient::builder(config)
            .connector(connector.clone())
            .build()
            .unwrap();

        for _ in 0..2 {
            let err = client.disperse_blob(vec![0u8; 32], &[0]).await.unwrap_err();
            assert!(matches!(err, DisperserError::ConnectionInit(_)));
        }
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 2);
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_secure_transport_needs_injected_connector() {
        let mut config = DisperserConfig::for_testing();
        config.use_secure_transport = true;
        let client = DisperserClient::builder(config).build().unwrap();
        let err = client.disperse_blob(vec![0u8; 32], &[0]).await.unwrap_err();
        assert!(matches!(err, DisperserError::ConnectionInit(_)));
    }
}
