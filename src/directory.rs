// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
// Copyright (c) DUSK NETWORK. All rights reserved.

//! The peer directory: a mapping from peer ID to network address, seeded
//! from configuration and extended by discovery or by any received
//! multicast whose sender was previously unknown.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::config::DEFAULT_PORT_BASE;
use crate::message::PeerId;

/// A peer's resolved network address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub host: String,
    pub port: u16,
}

impl Address {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn default_for(peer_id: PeerId) -> Self {
        Self::new("localhost", DEFAULT_PORT_BASE + peer_id as u16)
    }
}

/// Mutually-exclusive peer_id → address table. Reads dominate, so a
/// single `RwLock` covers the whole table rather than per-entry locking.
pub struct PeerDirectory {
    local: PeerId,
    entries: RwLock<HashMap<PeerId, Address>>,
}

impl PeerDirectory {
    pub fn new(local: PeerId, local_address: Address) -> Self {
        let mut entries = HashMap::new();
        entries.insert(local, local_address);
        Self {
            local,
            entries: RwLock::new(entries),
        }
    }

    /// Explicitly registers a peer's address, as at startup configuration.
    /// The local peer's own entry is immutable after construction.
    pub fn register(&self, peer_id: PeerId, address: Address) {
        if peer_id == self.local {
            return;
        }
        self.entries.write().unwrap().insert(peer_id, address);
    }

    /// Learns about a peer only if it is not already known, implicitly
    /// registering the conventional default address. Used when a Multicast
    /// arrives from a previously-unknown sender.
    pub fn learn(&self, peer_id: PeerId) {
        if peer_id == self.local {
            return;
        }
        let mut entries = self.entries.write().unwrap();
        entries
            .entry(peer_id)
            .or_insert_with(|| Address::default_for(peer_id));
    }

    /// Resolves a peer's address, falling back to the port convention
    /// `localhost:8000+peer_id` when unregistered.
    pub fn resolve(&self, peer_id: PeerId) -> Address {
        self.entries
            .read()
            .unwrap()
            .get(&peer_id)
            .cloned()
            .unwrap_or_else(|| Address::default_for(peer_id))
    }

    pub fn contains(&self, peer_id: PeerId) -> bool {
        self.entries.read().unwrap().contains_key(&peer_id)
    }

    pub fn known_peer_count(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// All peer IDs currently known, local peer included.
    pub fn known_peers(&self) -> Vec<PeerId> {
        self.entries.read().unwrap().keys().copied().collect()
    }
}
