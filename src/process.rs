// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
// Copyright (c) DUSK NETWORK. All rights reserved.

//! The process facade (component F): binds the clock, directory, and
//! engine together, owns the background tasks, and is the surface that an
//! external shell (out of scope here) drives.

use std::collections::VecDeque;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::clock::LamportClock;
use crate::config::Config;
use crate::directory::{Address, PeerDirectory};
use crate::discovery;
use crate::engine::{DeliveryCallbacks, Engine, Sender};
use crate::error::Error;
use crate::message::{Message, MessageId, MulticastMessage, PeerId};
use crate::transport::{self, Listener};

/// Point-in-time snapshot of the process's internal counters, surfaced by
/// [`Process::statistics`].
#[derive(Debug, Clone, Copy)]
pub struct Statistics {
    pub lamport: u64,
    pub pending_count: usize,
    pub queue_len: usize,
    pub delivered_count: usize,
    pub known_peers_count: usize,
}

/// One entry of the circular event log.
#[derive(Debug, Clone)]
pub struct Event {
    pub wall_time: SystemTime,
    pub lamport: u64,
    pub description: String,
}

struct EventLog {
    capacity: usize,
    entries: Mutex<VecDeque<Event>>,
}

impl EventLog {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    fn push(&self, lamport: u64, description: String) {
        let mut entries = self.entries.lock().unwrap();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(Event {
            wall_time: SystemTime::now(),
            lamport,
            description,
        });
    }

    fn recent(&self, n: usize) -> Vec<Event> {
        let entries = self.entries.lock().unwrap();
        entries.iter().rev().take(n).rev().cloned().collect()
    }
}

/// Adapts [`Engine`]'s abstract `on_delivered`/`on_failed` to the process's
/// event log, then forwards to whatever callbacks the caller supplied.
struct LoggingCallbacks {
    clock: Arc<LamportClock>,
    events: Arc<EventLog>,
    inner: Arc<dyn DeliveryCallbacks>,
}

impl DeliveryCallbacks for LoggingCallbacks {
    fn on_delivered(&self, message: &MulticastMessage) {
        self.events.push(
            self.clock.read(),
            format!("delivered {} from peer {}", message.message_id, message.sender_id),
        );
        self.inner.on_delivered(message);
    }

    fn on_failed(&self, message: &MulticastMessage) {
        self.events.push(
            self.clock.read(),
            format!("abandoned {} to peers {:?}", message.message_id, message.recipients),
        );
        self.inner.on_failed(message);
    }
}

/// Bridges the engine's [`Sender`] trait to the framed TCP transport,
/// resolving each recipient's address through the shared directory.
struct TransportSender {
    directory: Arc<PeerDirectory>,
    config: Arc<Config>,
}

#[async_trait::async_trait]
impl Sender for TransportSender {
    async fn send_to(&self, message: &Message, peer: PeerId) -> bool {
        let address = self.directory.resolve(peer);
        transport::send(message, &address, &self.config).await
    }
}

/// A running process: owns the listener, the inbound dispatch loop, and
/// the timeout sweep, all cooperatively stopped by [`Process::stop`].
pub struct Process {
    local: PeerId,
    clock: Arc<LamportClock>,
    directory: Arc<PeerDirectory>,
    engine: Arc<Engine>,
    config: Arc<Config>,
    events: Arc<EventLog>,
    shutdown: Arc<AtomicBool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Process {
    /// Binds the listener at `host:port`, registers `known_peers`, and
    /// spawns the accept loop, inbound dispatch loop, and timeout sweep.
    ///
    /// A bind failure (e.g. port already in use) is a `ConfigurationError`
    /// (§7), surfaced here rather than later.
    pub async fn start(
        local: PeerId,
        host: &str,
        port: u16,
        known_peers: Vec<(PeerId, Address)>,
        callbacks: Arc<dyn DeliveryCallbacks>,
        config: Config,
    ) -> Result<Arc<Self>, Error> {
        let config = Arc::new(config);
        let clock = Arc::new(LamportClock::new());

        let (listener, bound_port) = Listener::bind(host, port).await.map_err(|err| match err {
            Error::Transport(io_err) => {
                Error::Configuration(format!("failed to bind {}:{}: {}", host, port, io_err))
            }
            other => other,
        })?;
        info!(local, host, port = bound_port, "listener bound");

        let local_address = Address::new(host.to_string(), bound_port);
        let directory = Arc::new(PeerDirectory::new(local, local_address));
        for (peer_id, address) in known_peers {
            directory.register(peer_id, address);
        }

        let events = Arc::new(EventLog::new(config.event_log_capacity));
        let sender: Arc<dyn Sender> = Arc::new(TransportSender {
            directory: directory.clone(),
            config: config.clone(),
        });
        let logging_callbacks: Arc<dyn DeliveryCallbacks> = Arc::new(LoggingCallbacks {
            clock: clock.clone(),
            events: events.clone(),
            inner: callbacks,
        });
        let engine = Arc::new(Engine::new(
            local,
            clock.clone(),
            directory.clone(),
            sender,
            logging_callbacks,
            config.clone(),
        ));

        let shutdown = Arc::new(AtomicBool::new(false));
        let (inbound_tx, mut inbound_rx) = mpsc::channel::<Message>(config.channel_capacity);

        let mut tasks = Vec::new();
        tasks.push(tokio::spawn(listener.run(
            inbound_tx,
            shutdown.clone(),
            config.clone(),
        )));

        let dispatch_engine = engine.clone();
        tasks.push(tokio::spawn(async move {
            while let Some(message) = inbound_rx.recv().await {
                dispatch_engine.handle_inbound(message).await;
            }
        }));

        let timeout_engine = engine.clone();
        let timeout_shutdown = shutdown.clone();
        let sweep_interval = config.retry_sweep_interval;
        tasks.push(tokio::spawn(async move {
            timeout_engine
                .run_timeout_loop(timeout_shutdown, sweep_interval)
                .await;
        }));

        Ok(Arc::new(Self {
            local,
            clock,
            directory,
            engine,
            config,
            events,
            shutdown,
            tasks: Mutex::new(tasks),
        }))
    }

    /// Sends `content` to `recipients` (or every other known peer) and
    /// returns the new message's ID immediately; delivery and failure are
    /// reported asynchronously through the callbacks given to `start`.
    pub async fn multicast(
        &self,
        content: Vec<u8>,
        recipients: Option<Vec<PeerId>>,
    ) -> MessageId {
        self.engine.multicast(content, recipients).await
    }

    /// Explicitly registers a peer's address (§4.D). A no-op for the local
    /// peer's own ID.
    pub fn register_peer(&self, peer_id: PeerId, host: &str, port: u16) {
        self.directory.register(peer_id, Address::new(host, port));
    }

    /// The address this process actually bound to — useful when `start`
    /// was given port 0 and the OS chose one.
    pub fn local_address(&self) -> Address {
        self.directory.resolve(self.local)
    }

    /// Probes `ids` and folds any newly-reachable peer into the known-peer
    /// set (§4.G), returning the reachable subset.
    pub async fn discover(&self, ids: RangeInclusive<PeerId>) -> Vec<PeerId> {
        let reachable = discovery::probe(
            self.local,
            ids,
            &self.directory,
            self.config.discovery_timeout,
        )
        .await;
        for &peer_id in &reachable {
            self.directory.learn(peer_id);
        }
        reachable
    }

    pub fn statistics(&self) -> Statistics {
        Statistics {
            lamport: self.clock.read(),
            pending_count: self.engine.pending_count(),
            queue_len: self.engine.queue_len(),
            delivered_count: self.engine.delivered_count(),
            known_peers_count: self.directory.known_peer_count(),
        }
    }

    pub fn recent_events(&self, n: usize) -> Vec<Event> {
        self.events.recent(n)
    }

    /// Signals shutdown, waits up to ~2s for background tasks to exit, and
    /// returns. Outstanding pending entries are discarded without invoking
    /// `on_failed` (§5) — they simply stop being swept.
    pub async fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
        let mut tasks = self.tasks.lock().unwrap().split_off(0);
        let bound = tokio::time::timeout(Duration::from_secs(2), async {
            for task in tasks.drain(..) {
                let _ = task.await;
            }
        });
        if bound.await.is_err() {
            debug!("shutdown grace period elapsed with tasks still running");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopCallbacks;
    impl DeliveryCallbacks for NoopCallbacks {
        fn on_delivered(&self, _message: &MulticastMessage) {}
        fn on_failed(&self, _message: &MulticastMessage) {}
    }

    #[tokio::test]
    async fn two_processes_exchange_an_acknowledged_multicast() {
        let callbacks_a: Arc<dyn DeliveryCallbacks> = Arc::new(NoopCallbacks);
        let process_a = Process::start(0, "127.0.0.1", 0, vec![], callbacks_a, Config::default())
            .await
            .unwrap();
        let port_a = process_a.directory.resolve(0).port;

        let callbacks_b: Arc<dyn DeliveryCallbacks> = Arc::new(NoopCallbacks);
        let process_b = Process::start(1, "127.0.0.1", 0, vec![], callbacks_b, Config::default())
            .await
            .unwrap();
        let port_b = process_b.directory.resolve(1).port;

        process_a.register_peer(1, "127.0.0.1", port_b);
        process_b.register_peer(0, "127.0.0.1", port_a);

        let message_id = process_a
            .multicast(b"hello".to_vec(), Some(vec![1]))
            .await;

        let mut acked = false;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            if process_a.statistics().pending_count == 0 {
                acked = true;
                break;
            }
        }
        assert!(acked, "message {} was never acked", message_id);
        assert_eq!(process_b.statistics().delivered_count, 1);

        process_a.stop().await;
        process_b.stop().await;
    }

    #[tokio::test]
    async fn binding_the_same_port_twice_is_a_configuration_error() {
        let callbacks: Arc<dyn DeliveryCallbacks> = Arc::new(NoopCallbacks);
        let first = Process::start(0, "127.0.0.1", 0, vec![], callbacks.clone(), Config::default())
            .await
            .unwrap();
        let taken_port = first.directory.resolve(0).port;

        let second = Process::start(1, "127.0.0.1", taken_port, vec![], callbacks, Config::default())
            .await;
        assert!(matches!(second, Err(Error::Configuration(_))));

        first.stop().await;
    }
}
