// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
// Copyright (c) DUSK NETWORK. All rights reserved.

//! The error taxonomy of §7: everything that can surface to a caller of
//! `start()`/`stop()`, plus the conversions used internally to classify
//! I/O and decode failures before they are absorbed or logged.

use std::io;

/// Errors surfaced by the public API. Per-message failures (a single send,
/// a single decode) never reach here — they are absorbed locally and
/// reflected through callbacks or silent drops, as described in §7.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(#[source] io::Error),

    #[error("failed to decode message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Transport(err)
    }
}
