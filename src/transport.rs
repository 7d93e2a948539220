// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
// Copyright (c) DUSK NETWORK. All rights reserved.

//! Connection-per-send, length-prefixed framed TCP transport (component C).
//!
//! Every frame is a 4-byte big-endian length prefix followed by that many
//! bytes of UTF-8 text (the message's canonical JSON encoding, see
//! [`crate::message`]). One frame per connection: the dialer writes and
//! closes, the listener reads one frame per accepted connection, decodes,
//! dispatches, and closes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::Sender;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::directory::Address;
use crate::error::Error;
use crate::message::Message;

const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

/// Accept loop: binds once, then repeatedly accepts a connection, reads
/// exactly one frame from it, decodes and forwards it, and closes it.
///
/// Uses a periodic wakeup bounded by `config.accept_poll_interval` so that
/// `shutdown` is observed promptly instead of blocking indefinitely on
/// `accept()` — the same polling-timeout shape the source's socket-based
/// accept loop used.
pub(crate) struct Listener {
    inner: TcpListener,
}

impl Listener {
    pub(crate) async fn bind(host: &str, port: u16) -> Result<(Self, u16), Error> {
        let listener = TcpListener::bind((host, port)).await?;
        let bound_port = listener.local_addr()?.port();
        Ok((Self { inner: listener }, bound_port))
    }

    pub(crate) async fn run(
        self,
        inbound: Sender<Message>,
        shutdown: Arc<AtomicBool>,
        config: Arc<Config>,
    ) {
        debug!("accept loop started");
        loop {
            if shutdown.load(Ordering::Acquire) {
                break;
            }
            match timeout(config.accept_poll_interval, self.inner.accept()).await {
                Ok(Ok((socket, peer_addr))) => {
                    trace!(%peer_addr, "accepted connection");
                    let inbound = inbound.clone();
                    let io_timeout = config.io_timeout;
                    tokio::spawn(async move {
                        if let Err(err) = handle_connection(socket, inbound, io_timeout).await {
                            warn!(%err, %peer_addr, "dropping frame");
                        }
                    });
                }
                Ok(Err(err)) => warn!(%err, "accept failed"),
                Err(_elapsed) => continue,
            }
        }
        debug!("accept loop stopped");
    }
}

async fn handle_connection(
    mut socket: TcpStream,
    inbound: Sender<Message>,
    io_timeout: std::time::Duration,
) -> Result<(), Error> {
    let frame = timeout(io_timeout, read_frame(&mut socket))
        .await
        .map_err(|_| {
            Error::Transport(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "timed out reading frame",
            ))
        })??;
    let text = String::from_utf8(frame).map_err(|err| {
        Error::Transport(std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    })?;
    let message = Message::from_json(&text)?;
    trace!(?message, "decoded inbound frame");
    // an inbound channel send only fails once the engine has shut down;
    // there is nothing useful left to do with the frame at that point.
    let _ = inbound.send(message).await;
    Ok(())
}

async fn read_frame(socket: &mut TcpStream) -> Result<Vec<u8>, Error> {
    let mut len_buf = [0u8; 4];
    socket.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_LEN {
        return Err(Error::Transport(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "frame exceeds maximum length",
        )));
    }
    let mut payload = vec![0u8; len as usize];
    socket.read_exact(&mut payload).await?;
    Ok(payload)
}

/// Opens a new connection to `addr`, writes one length-prefixed frame
/// containing `message`'s canonical encoding, and closes it.
///
/// Transport failures here are not retried; retries are the engine's
/// responsibility (§4.E). Returns whether the send succeeded.
pub(crate) async fn send(message: &Message, addr: &Address, config: &Config) -> bool {
    match try_send(message, addr, config).await {
        Ok(()) => true,
        Err(err) => {
            warn!(%err, host = %addr.host, port = addr.port, "send failed");
            false
        }
    }
}

async fn try_send(message: &Message, addr: &Address, config: &Config) -> Result<(), Error> {
    let text = message.to_json()?;
    let payload = text.into_bytes();
    let len = u32::try_from(payload.len())
        .map_err(|_| Error::Configuration("message too large to frame".into()))?;

    let mut socket = timeout(
        config.connect_timeout,
        TcpStream::connect((addr.host.as_str(), addr.port)),
    )
    .await
    .map_err(|_| {
        Error::Transport(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "timed out connecting",
        ))
    })??;

    timeout(config.io_timeout, async {
        socket.write_all(&len.to_be_bytes()).await?;
        socket.write_all(&payload).await?;
        socket.shutdown().await
    })
    .await
    .map_err(|_| {
        Error::Transport(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "timed out writing frame",
        ))
    })??;
    Ok(())
}
