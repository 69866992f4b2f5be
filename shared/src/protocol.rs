//! Fixed-layout binary wire protocol.
//!
//! Every message is a one-byte kind followed by packed little-endian fields.
//! There is no length prefix or version field: a datagram is valid only if
//! its length is exactly the size its kind prescribes, and evolving the
//! protocol means adding a kind.
//!
//! ```text
//! 0x00 PLAYER_UPDATE   f32 x, f32 y, f32 vx, f32 vy                   (17 bytes)
//! 0x01 MOB_UPDATE      f32 x, f32 y, f32 vx, f32 vy, i32 type, i32 hp (25 bytes)
//! 0x02 PLAYER_JOIN     reserved, payload ignored
//! 0x03 PLAYER_LEAVE    reserved, payload ignored
//! 0x04 SNAPSHOT_BEGIN  u32 tick                                       (5 bytes)
//! ```
//!
//! Payloads go through bincode's default configuration, whose fixed-width
//! little-endian integers and floats produce exactly the packed layout above.

use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};

pub const PLAYER_UPDATE: u8 = 0x00;
pub const MOB_UPDATE: u8 = 0x01;
pub const PLAYER_JOIN: u8 = 0x02;
pub const PLAYER_LEAVE: u8 = 0x03;
pub const SNAPSHOT_BEGIN: u8 = 0x04;

pub const PLAYER_UPDATE_SIZE: usize = 16;
pub const MOB_UPDATE_SIZE: usize = 24;
pub const SNAPSHOT_BEGIN_SIZE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerUpdate {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MobUpdate {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub mob_type: i32,
    pub health: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Message {
    /// Client → server: locally predicted state. Server → client: another
    /// player's canonical state.
    PlayerUpdate(PlayerUpdate),
    /// Server → client only.
    MobUpdate(MobUpdate),
    PlayerJoin,
    PlayerLeave,
    /// Server → client: opens one tick's snapshot for this connection.
    SnapshotBegin { tick: u32 },
}

impl Message {
    pub fn kind(&self) -> u8 {
        match self {
            Message::PlayerUpdate(_) => PLAYER_UPDATE,
            Message::MobUpdate(_) => MOB_UPDATE,
            Message::PlayerJoin => PLAYER_JOIN,
            Message::PlayerLeave => PLAYER_LEAVE,
            Message::SnapshotBegin { .. } => SNAPSHOT_BEGIN,
        }
    }

    /// Serializes the message into its datagram.
    ///
    /// Cannot fail for any in-memory message; the `Result` only carries
    /// bincode's signature through.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = Vec::with_capacity(1 + MOB_UPDATE_SIZE);
        buf.push(self.kind());

        match self {
            Message::PlayerUpdate(update) => bincode::serialize_into(&mut buf, update)?,
            Message::MobUpdate(update) => bincode::serialize_into(&mut buf, update)?,
            Message::SnapshotBegin { tick } => bincode::serialize_into(&mut buf, tick)?,
            Message::PlayerJoin | Message::PlayerLeave => {}
        }

        Ok(buf)
    }

    /// Parses one datagram. Any length mismatch is a malformed message.
    pub fn decode(bytes: &[u8]) -> Result<Message, ProtocolError> {
        let (&kind, payload) = bytes.split_first().ok_or(ProtocolError::Empty)?;

        match kind {
            PLAYER_UPDATE => {
                expect_payload(kind, payload, PLAYER_UPDATE_SIZE)?;
                Ok(Message::PlayerUpdate(bincode::deserialize(payload)?))
            }
            MOB_UPDATE => {
                expect_payload(kind, payload, MOB_UPDATE_SIZE)?;
                Ok(Message::MobUpdate(bincode::deserialize(payload)?))
            }
            SNAPSHOT_BEGIN => {
                expect_payload(kind, payload, SNAPSHOT_BEGIN_SIZE)?;
                Ok(Message::SnapshotBegin {
                    tick: bincode::deserialize(payload)?,
                })
            }
            PLAYER_JOIN => Ok(Message::PlayerJoin),
            PLAYER_LEAVE => Ok(Message::PlayerLeave),
            _ => Err(ProtocolError::UnknownKind(kind)),
        }
    }
}

fn expect_payload(kind: u8, payload: &[u8], expected: usize) -> Result<(), ProtocolError> {
    if payload.len() == expected {
        Ok(())
    } else {
        Err(ProtocolError::Length {
            kind,
            expected: expected + 1,
            actual: payload.len() + 1,
        })
    }
}
