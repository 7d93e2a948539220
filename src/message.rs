// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
// Copyright (c) DUSK NETWORK. All rights reserved.

//! The wire message model: one tagged record type, with a single
//! self-describing UTF-8 encoding shared by every variant.

use serde_derive::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// Opaque 128-bit identifier, unique across all peers and time.
pub type MessageId = Uuid;

/// The peer identifier space. Small integers, as assumed throughout the
/// port-convention in [`crate::directory`].
pub type PeerId = u32;

/// A multicast payload in flight to every entry of `recipients`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MulticastMessage {
    pub message_id: MessageId,
    pub sender_id: PeerId,
    pub timestamp: u64,
    pub content: Vec<u8>,
    pub recipients: Vec<PeerId>,
    pub sequence_number: u64,
    #[serde(default = "default_requires_ack")]
    pub requires_ack: bool,
}

fn default_requires_ack() -> bool {
    true
}

/// An acknowledgment of a single [`MulticastMessage`] by `message_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckMessage {
    pub message_id: MessageId,
    pub sender_id: PeerId,
    pub timestamp: u64,
    pub original_message_id: MessageId,
}

/// The one wire shape every frame carries, discriminated by `message_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "message_type", rename_all = "snake_case")]
pub enum Message {
    #[serde(rename = "multicast")]
    Multicast(MulticastMessage),
    #[serde(rename = "acknowledgment")]
    Ack(AckMessage),
}

impl Message {
    pub fn sender_id(&self) -> PeerId {
        match self {
            Message::Multicast(m) => m.sender_id,
            Message::Ack(a) => a.sender_id,
        }
    }

    pub fn timestamp(&self) -> u64 {
        match self {
            Message::Multicast(m) => m.timestamp,
            Message::Ack(a) => a.timestamp,
        }
    }

    /// Serializes this message to the canonical self-describing text
    /// encoding carried inside every frame (see [`crate::transport`]).
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(Error::from)
    }

    /// Deserializes a message from its canonical text encoding. An unknown
    /// `message_type` discriminator is a decode error.
    pub fn from_json(text: &str) -> Result<Self, Error> {
        serde_json::from_str(text).map_err(Error::from)
    }
}

impl MulticastMessage {
    pub fn new(
        sender_id: PeerId,
        timestamp: u64,
        content: Vec<u8>,
        recipients: Vec<PeerId>,
        sequence_number: u64,
    ) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            sender_id,
            timestamp,
            content,
            recipients,
            sequence_number,
            requires_ack: true,
        }
    }
}

impl AckMessage {
    pub fn new(sender_id: PeerId, timestamp: u64, original_message_id: MessageId) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            sender_id,
            timestamp,
            original_message_id,
        }
    }
}
