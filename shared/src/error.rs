//! Error types for the wire codec and the transport layer.

use crate::transport::ConnectionId;
use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// A received message that could not be decoded.
///
/// Every variant is recoverable: the message is dropped and the connection
/// that sent it is left untouched.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message: empty buffer")]
    Empty,

    #[error("malformed message: unknown kind {0:#04x}")]
    UnknownKind(u8),

    #[error("malformed message: kind {kind:#04x} expects {expected} bytes, got {actual}")]
    Length {
        kind: u8,
        expected: usize,
        actual: usize,
    },

    #[error("malformed message: unknown mob type {0}")]
    UnknownMobType(i32),

    #[error("malformed message payload: {0}")]
    Payload(#[from] bincode::Error),
}

#[derive(Debug, Error)]
pub enum TransportError {
    /// The host could not be created. Fatal at startup.
    #[error("failed to initialise transport on {addr}: {source}")]
    Init {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// A datagram could not be handed to the socket. The packet is dropped.
    #[error("failed to send to {addr}: {source}")]
    Send {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionId),

    #[error("connection {0} is not established")]
    NotConnected(ConnectionId),

    #[error("host is at capacity ({0} peers)")]
    AtCapacity(usize),

    #[error("peer {0} is unreachable")]
    PeerUnreachable(SocketAddr),

    #[error("timed out waiting for the connection handshake")]
    HandshakeTimeout,

    #[error("invalid address {0}")]
    InvalidAddress(String),
}
