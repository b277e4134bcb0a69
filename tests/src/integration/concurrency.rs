//! # Concurrent Paid Dispersal
//!
//! Many tasks dispersing through one client must never share reservation
//! capacity or a cumulative-payment value.

#[cfg(test)]
mod tests {
    use disperser_client::{
        DisperserApi, DisperserClient, DisperserConfig, FixedTimeSource, InMemoryDisperser,
        LocalPaymentSigner, MemoryConnector,
    };
    use shared_crypto::Secp256k1KeyPair;
    use shared_types::{
        ActiveReservation, GetPaymentStateReply, GlobalPaymentParams, PaymentMode, U256,
    };
    use std::collections::HashSet;
    use std::sync::Arc;

    const NOW: u64 = 1_700_000_000;

    fn paid_client(disperser: &InMemoryDisperser) -> Arc<DisperserClient> {
        let client = DisperserClient::builder(DisperserConfig::for_testing())
            .connector(Arc::new(MemoryConnector::new(disperser.clone())))
            .time_source(Arc::new(FixedTimeSource::new(NOW)))
            .payment_signer(Arc::new(
                LocalPaymentSigner::new(Secp256k1KeyPair::generate()).unwrap(),
            ))
            .build()
            .unwrap();
        Arc::new(client)
    }

    fn state(reservation: Option<ActiveReservation>) -> GetPaymentStateReply {
        GetPaymentStateReply {
            payment_global_params: Some(GlobalPaymentParams {
                reservation_window: 10,
                price_per_symbol: 1,
                min_num_symbols: 64,
            }),
            reservation,
            onchain_cumulative_payment: U256::from(u64::MAX),
            ..Default::default()
        }
    }

    async fn disperse_concurrently(client: &Arc<DisperserClient>, tasks: usize, bytes: usize) {
        let handles: Vec<_> = (0..tasks)
            .map(|_| {
                let client = client.clone();
                tokio::spawn(async move { client.disperse_paid_blob(vec![0u8; bytes], &[0]).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_on_demand_payments_are_unique_and_dense() {
        let disperser = InMemoryDisperser::new();
        disperser.set_payment_state(state(None));
        let client = paid_client(&disperser);
        client.init_payment_state().await.unwrap();

        disperse_concurrently(&client, 64, 32).await;

        let mut payments: Vec<U256> = disperser
            .paid_requests()
            .iter()
            .map(|r| r.payment_header.cumulative_payment())
            .collect();
        payments.sort();
        let expected: Vec<U256> = (1..=64u64).map(|i| U256::from(i * 64)).collect();
        assert_eq!(payments, expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_reservation_capacity_is_never_oversold() {
        let disperser = InMemoryDisperser::new();
        disperser.set_payment_state(state(Some(ActiveReservation {
            start_timestamp: 0,
            end_timestamp: u64::MAX,
            symbols_per_second: 100,
            quorum_numbers: vec![0],
        })));
        let client = paid_client(&disperser);
        client.init_payment_state().await.unwrap();

        // 60 symbols each against a 1000-symbol bin: 16 fit, the 17th
        // borrows 20 from the next bin, the rest are billed on demand.
        disperse_concurrently(&client, 32, 60 * 32).await;

        let requests = disperser.paid_requests();
        let reserved = requests
            .iter()
            .filter(|r| {
                r.payment_header.mode == PaymentMode::Reservation { bin_index: NOW / 10 }
            })
            .count();
        let on_demand: HashSet<U256> = requests
            .iter()
            .filter(|r| !r.payment_header.is_reservation())
            .map(|r| r.payment_header.cumulative_payment())
            .collect();

        assert_eq!(reserved, 17);
        assert_eq!(on_demand.len(), 15);
        assert_eq!(on_demand.iter().max(), Some(&U256::from(15u64 * 64)));

        let usage = client.accountant().usage().unwrap();
        assert_eq!((usage.current, usage.next, usage.overflow), (1000, 20, 20));
    }
}
