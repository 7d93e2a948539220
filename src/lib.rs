// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
// Copyright (c) DUSK NETWORK. All rights reserved.

//! Reliable multicast with Lamport-clock ordered delivery across a set of
//! long-lived peer processes connected by point-to-point TCP.
//!
//! A sender delivers a payload to every known peer; every peer ultimately
//! delivers every accepted message exactly once, and peers that deliver
//! overlapping messages deliver them in the same total order, derived from
//! Lamport timestamps with sender-ID tie-breaking.
//!
//! [`Process`] is the entry point: it binds the listener, starts the
//! background tasks, and exposes [`Process::multicast`],
//! [`Process::register_peer`], and [`Process::discover`].

pub mod clock;
pub mod config;
pub mod directory;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod message;
pub mod process;
mod transport;

pub use clock::LamportClock;
pub use config::Config;
pub use directory::{Address, PeerDirectory};
pub use engine::{DeliveryCallbacks, Engine};
pub use error::Error;
pub use message::{AckMessage, Message, MessageId, MulticastMessage, PeerId};
pub use process::{Event, Process, Statistics};
