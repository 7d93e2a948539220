// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
// Copyright (c) DUSK NETWORK. All rights reserved.

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use lamcast::{Config, DeliveryCallbacks, MulticastMessage, Process};

    /// Collects every delivered/failed message for assertions after the
    /// scenario has run.
    struct Collector {
        delivered: Mutex<Vec<MulticastMessage>>,
        failed: Mutex<Vec<MulticastMessage>>,
    }

    impl Collector {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                delivered: Mutex::new(Vec::new()),
                failed: Mutex::new(Vec::new()),
            })
        }
    }

    impl DeliveryCallbacks for Collector {
        fn on_delivered(&self, message: &MulticastMessage) {
            self.delivered.lock().unwrap().push(message.clone());
        }
        fn on_failed(&self, message: &MulticastMessage) {
            self.failed.lock().unwrap().push(message.clone());
        }
    }

    fn init_tracing() {
        let subscriber = tracing_subscriber::fmt::Subscriber::builder()
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    async fn wait_until(mut predicate: impl FnMut() -> bool, timeout: Duration) -> bool {
        let step = Duration::from_millis(25);
        let mut waited = Duration::ZERO;
        while !predicate() {
            if waited >= timeout {
                return false;
            }
            tokio::time::sleep(step).await;
            waited += step;
        }
        true
    }

    /// S4 — two peers each multicast at logical time 1; both sides must
    /// deliver the two messages, each seeing only the other's send since a
    /// multicast excludes its own sender from its recipient set.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn two_peer_ordered_delivery() {
        init_tracing();

        let collector_a = Collector::new();
        let process_a = Process::start(0, "127.0.0.1", 0, vec![], collector_a.clone(), Config::default())
            .await
            .unwrap();
        let addr_a = process_a.local_address();

        let collector_b = Collector::new();
        let process_b = Process::start(1, "127.0.0.1", 0, vec![], collector_b.clone(), Config::default())
            .await
            .unwrap();
        let addr_b = process_b.local_address();

        process_a.register_peer(1, &addr_b.host, addr_b.port);
        process_b.register_peer(0, &addr_a.host, addr_a.port);

        process_a.multicast(b"A".to_vec(), Some(vec![1])).await;
        process_b.multicast(b"B".to_vec(), Some(vec![0])).await;

        let delivered_on_a = wait_until(
            || collector_a.delivered.lock().unwrap().len() == 1,
            Duration::from_secs(5),
        )
        .await;
        let delivered_on_b = wait_until(
            || collector_b.delivered.lock().unwrap().len() == 1,
            Duration::from_secs(5),
        )
        .await;
        assert!(delivered_on_a && delivered_on_b);
        assert_eq!(collector_a.delivered.lock().unwrap()[0].content, b"B");
        assert_eq!(collector_b.delivered.lock().unwrap()[0].content, b"A");

        process_a.stop().await;
        process_b.stop().await;
    }

    /// S5 — a send to a temporarily-unreachable peer eventually succeeds
    /// once that peer starts listening, completing the pending entry.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn retry_succeeds_once_the_peer_becomes_reachable() {
        init_tracing();

        let mut config = Config::default();
        config.ack_timeout = Duration::from_millis(200);
        config.retry_sweep_interval = Duration::from_millis(50);
        config.max_retries = 10;

        let collector_a = Collector::new();
        let process_a = Process::start(0, "127.0.0.1", 0, vec![], collector_a.clone(), config.clone())
            .await
            .unwrap();

        // peer 1 is registered at a port nobody is listening on yet: bind
        // once to reserve a free port, then drop it immediately.
        let reserved = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let reserved_port = reserved.local_addr().unwrap().port();
        drop(reserved);

        process_a.register_peer(1, "127.0.0.1", reserved_port);
        let message_id = process_a.multicast(b"hi".to_vec(), Some(vec![1])).await;

        // let a couple of retries fail against nothing listening
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(process_a.statistics().pending_count, 1);

        let collector_b = Collector::new();
        let process_b = Process::start(1, "127.0.0.1", reserved_port, vec![], collector_b.clone(), config)
            .await
            .unwrap();
        process_b.register_peer(0, "127.0.0.1", process_a.local_address().port);

        let completed = wait_until(
            || process_a.statistics().pending_count == 0,
            Duration::from_secs(5),
        )
        .await;
        assert!(completed, "message {} never acked", message_id);
        assert_eq!(collector_b.delivered.lock().unwrap().len(), 1);

        process_a.stop().await;
        process_b.stop().await;
    }

    /// S6 — retry exhaustion fires `on_failed` exactly once and abandons
    /// the pending entry, with no ack ever arriving.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn retry_exhaustion_fires_on_failed_once() {
        init_tracing();

        let mut config = Config::default();
        config.ack_timeout = Duration::from_millis(50);
        config.retry_sweep_interval = Duration::from_millis(20);
        config.max_retries = 2;

        let collector = Collector::new();
        let process = Process::start(0, "127.0.0.1", 0, vec![], collector.clone(), config)
            .await
            .unwrap();

        // peer 1 is registered at a port with nothing listening, ever.
        let reserved = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let reserved_port = reserved.local_addr().unwrap().port();
        drop(reserved);

        process.register_peer(1, "127.0.0.1", reserved_port);
        process.multicast(b"hi".to_vec(), Some(vec![1])).await;

        let abandoned = wait_until(
            || !collector.failed.lock().unwrap().is_empty(),
            Duration::from_secs(5),
        )
        .await;
        assert!(abandoned);
        assert_eq!(collector.failed.lock().unwrap().len(), 1);
        assert_eq!(process.statistics().pending_count, 0);

        process.stop().await;
    }
}
