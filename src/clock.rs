// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
// Copyright (c) DUSK NETWORK. All rights reserved.

//! The Lamport logical clock: the only coordination mechanism peers use to
//! derive a total order on delivered messages.

use std::sync::Mutex;

/// A single monotonic logical counter, guarded for concurrent access.
///
/// `tick` and `update` are the only ways the stored value advances; both
/// strictly increase it, so any two successive operations observed on a
/// single peer yield strictly increasing values.
pub struct LamportClock {
    value: Mutex<u64>,
}

impl LamportClock {
    /// Creates a fresh clock at zero, as a peer has at process start.
    pub fn new() -> Self {
        Self {
            value: Mutex::new(0),
        }
    }

    /// Advances the clock for a local event and returns the new value.
    pub fn tick(&self) -> u64 {
        let mut guard = self.value.lock().unwrap();
        *guard += 1;
        *guard
    }

    /// Merges in a timestamp observed on an incoming message:
    /// `clock = max(clock, received) + 1`.
    pub fn update(&self, received: u64) -> u64 {
        let mut guard = self.value.lock().unwrap();
        *guard = (*guard).max(received) + 1;
        *guard
    }

    /// Reads the current value without advancing it.
    pub fn read(&self) -> u64 {
        *self.value.lock().unwrap()
    }
}

impl Default for LamportClock {
    fn default() -> Self {
        Self::new()
    }
}
