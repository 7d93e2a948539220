// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
// Copyright (c) DUSK NETWORK. All rights reserved.

//! Tunables for the engine and transport. Fixed at [`crate::process::Process::start`]
//! and not mutated afterwards.

use std::time::Duration;

use serde_derive::{Deserialize, Serialize};

/// The default port offset applied to a peer ID when no explicit address
/// has been registered: peer K listens on `localhost:8000+K`.
pub const DEFAULT_PORT_BASE: u16 = 8000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// How long a [`crate::engine::PendingEntry`] waits for acks before a
    /// retry attempt.
    #[serde(with = "humantime_serde")]
    pub ack_timeout: Duration,

    /// How many retransmission attempts before a pending send is abandoned.
    pub max_retries: u32,

    /// How often the timeout/retry task wakes to sweep the pending table.
    #[serde(with = "humantime_serde")]
    pub retry_sweep_interval: Duration,

    /// How often the accept loop re-checks the shutdown flag.
    #[serde(with = "humantime_serde")]
    pub accept_poll_interval: Duration,

    /// Bound on establishing an outbound connection.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Bound on a single read or write once connected.
    #[serde(with = "humantime_serde")]
    pub io_timeout: Duration,

    /// Bound on a single discovery probe connect.
    #[serde(with = "humantime_serde")]
    pub discovery_timeout: Duration,

    /// Capacity of the circular event log kept by the process facade.
    pub event_log_capacity: usize,

    /// Capacity of the inbound-message channel between the transport and
    /// the engine.
    pub channel_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_secs(5),
            max_retries: 3,
            retry_sweep_interval: Duration::from_secs(1),
            accept_poll_interval: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(5),
            io_timeout: Duration::from_secs(10),
            discovery_timeout: Duration::from_secs(1),
            event_log_capacity: 1000,
            channel_capacity: 256,
        }
    }
}
