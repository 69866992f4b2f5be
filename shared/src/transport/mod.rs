//! Packet transport the server and client event loops are written against.
//!
//! A transport hands out opaque [`ConnectionId`]s and reports connection
//! life cycle and datagrams as [`TransportEvent`]s through a non-blocking
//! [`Transport::poll_event`]. Two hosts implement it:
//!
//! - [`udp::UdpHost`], connection-oriented UDP with an optional reliable,
//!   ordered send mode;
//! - [`memory::MemoryHost`], an in-process hub with immediate lossless
//!   delivery, used by tests and local play.

pub mod memory;
pub mod peers;
pub mod udp;

use crate::error::TransportError;
use std::fmt;

/// Handle for one live session, unique within the host that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u32);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendMode {
    /// Retransmitted until acknowledged and delivered in send order.
    Reliable,
    /// Fire and forget.
    Unreliable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// This side asked for the disconnect and the peer acknowledged it.
    Requested,
    /// The peer asked for the disconnect.
    Remote,
    /// The peer went silent, stopped acknowledging, or never answered.
    Timeout,
    /// The remote host turned the connection attempt down.
    Refused,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected(ConnectionId),
    Received(ConnectionId, Vec<u8>),
    Disconnected(ConnectionId, DisconnectReason),
}

impl TransportEvent {
    pub fn connection(&self) -> ConnectionId {
        match self {
            TransportEvent::Connected(id)
            | TransportEvent::Received(id, _)
            | TransportEvent::Disconnected(id, _) => *id,
        }
    }
}

pub trait Transport {
    /// Returns the next pending event without blocking.
    ///
    /// Hosts also do their housekeeping here (retransmits, keepalives,
    /// timeouts), so the owning loop must call it regularly.
    fn poll_event(&mut self) -> Option<TransportEvent>;

    fn send(
        &mut self,
        connection: ConnectionId,
        payload: &[u8],
        mode: SendMode,
    ) -> Result<(), TransportError>;

    /// Established connections in ascending id order.
    fn connections(&self) -> Vec<ConnectionId>;

    /// Starts a graceful disconnect. Completion is reported as a
    /// `Disconnected` event once the peer acknowledges or gives up.
    fn disconnect(&mut self, connection: ConnectionId);

    /// Forgets the connection immediately without notifying anyone.
    fn reset(&mut self, connection: ConnectionId);

    /// Sends `payload` to every established connection.
    ///
    /// Failures are logged per connection and counted; one unreachable peer
    /// never stops the others from being served.
    fn broadcast(&mut self, payload: &[u8], mode: SendMode) -> usize {
        let mut failures = 0;
        for connection in self.connections() {
            if let Err(e) = self.send(connection, payload, mode) {
                log::debug!("Broadcast to {} failed: {}", connection, e);
                failures += 1;
            }
        }
        failures
    }

    /// Drains pending events for one pump phase of an event loop, stopping
    /// after `limit` so a flood of datagrams cannot starve the tick.
    fn drain_events(&mut self, limit: usize) -> Vec<TransportEvent> {
        std::iter::from_fn(|| self.poll_event()).take(limit).collect()
    }
}
