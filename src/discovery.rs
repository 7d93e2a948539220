// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
// Copyright (c) DUSK NETWORK. All rights reserved.

//! Peer discovery (component G): probes a candidate ID range and reports
//! which addresses are currently reachable.

use std::ops::RangeInclusive;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

use crate::directory::PeerDirectory;
use crate::message::PeerId;

/// Probes every candidate in `ids` (self included) with a short,
/// non-blocking TCP connect and returns the ones that answered.
///
/// Does not mutate `directory` itself — the caller decides whether to
/// fold newly-reachable peers into the known-peer set (§4.F).
pub async fn probe(
    local: PeerId,
    ids: RangeInclusive<PeerId>,
    directory: &PeerDirectory,
    probe_timeout: std::time::Duration,
) -> Vec<PeerId> {
    let mut reachable = Vec::new();
    for candidate in ids {
        if candidate == local {
            reachable.push(candidate);
            continue;
        }
        let address = directory.resolve(candidate);
        let connected = timeout(
            probe_timeout,
            TcpStream::connect((address.host.as_str(), address.port)),
        )
        .await;
        match connected {
            Ok(Ok(_stream)) => {
                trace!(candidate, "discovery probe reachable");
                reachable.push(candidate);
            }
            Ok(Err(err)) => trace!(candidate, %err, "discovery probe refused"),
            Err(_elapsed) => trace!(candidate, "discovery probe timed out"),
        }
    }
    reachable
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::Address;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn self_is_always_reported_reachable() {
        let directory = PeerDirectory::new(0, Address::new("localhost", 8000));
        let found = probe(0, 0..=0, &directory, std::time::Duration::from_millis(50)).await;
        assert_eq!(found, vec![0]);
    }

    #[tokio::test]
    async fn a_listening_peer_is_reported_reachable() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let directory = PeerDirectory::new(0, Address::new("localhost", 8000));
        directory.register(1, Address::new("127.0.0.1", port));

        let found = probe(0, 1..=1, &directory, std::time::Duration::from_millis(500)).await;
        assert_eq!(found, vec![1]);
    }

    #[tokio::test]
    async fn an_unreachable_peer_is_excluded() {
        let directory = PeerDirectory::new(0, Address::new("localhost", 8000));
        directory.register(1, Address::new("127.0.0.1", 1)); // reserved, refuses connections

        let found = probe(0, 1..=1, &directory, std::time::Duration::from_millis(500)).await;
        assert!(found.is_empty());
    }
}
