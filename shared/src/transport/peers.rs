//! Per-peer connection state for the UDP host
//!
//! This module tracks every remote endpoint the host talks to:
//! - Connection lifecycle (connecting, connected, disconnecting)
//! - Address lookup for routing incoming datagrams
//! - Reliable channel bookkeeping (unacknowledged frames, reorder buffer)
//! - Liveness for timeout detection and capacity enforcement

use crate::transport::ConnectionId;
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Reliable frames further ahead of the next expected sequence are dropped
/// rather than buffered; the sender will retransmit them.
pub const MAX_REORDER_WINDOW: u32 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    /// We sent CONNECT and are waiting for ACCEPT.
    Connecting,
    Connected,
    /// We sent DISCONNECT and are waiting for the acknowledgement.
    Disconnecting { deadline: Instant },
}

/// A reliable frame waiting for its acknowledgement.
#[derive(Debug, Clone)]
pub struct PendingFrame {
    pub frame: Vec<u8>,
    pub sent_at: Instant,
    pub attempts: u32,
}

/// One remote endpoint and its channel state
#[derive(Debug)]
pub struct Peer {
    pub id: ConnectionId,
    pub addr: SocketAddr,
    pub state: PeerState,
    /// When we last heard anything from this peer
    pub last_seen: Instant,
    /// When we last sent anything to this peer
    pub last_sent: Instant,
    /// When the handshake started, for the connect timeout
    pub created_at: Instant,
    next_send_seq: u32,
    next_recv_seq: u32,
    next_unreliable_seq: u32,
    last_unreliable_seq: Option<u32>,
    unacked: BTreeMap<u32, PendingFrame>,
    reorder: BTreeMap<u32, Vec<u8>>,
}

impl Peer {
    pub fn new(id: ConnectionId, addr: SocketAddr, state: PeerState) -> Self {
        let now = Instant::now();
        Self {
            id,
            addr,
            state,
            last_seen: now,
            last_sent: now,
            created_at: now,
            next_send_seq: 0,
            next_recv_seq: 0,
            next_unreliable_seq: 0,
            last_unreliable_seq: None,
            unacked: BTreeMap::new(),
            reorder: BTreeMap::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == PeerState::Connected
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }

    /// Reserves the next outgoing reliable sequence number.
    pub fn next_reliable_seq(&mut self) -> u32 {
        let seq = self.next_send_seq;
        self.next_send_seq = self.next_send_seq.wrapping_add(1);
        seq
    }

    pub fn track_unacked(&mut self, seq: u32, frame: Vec<u8>) {
        self.unacked.insert(
            seq,
            PendingFrame {
                frame,
                sent_at: Instant::now(),
                attempts: 1,
            },
        );
    }

    /// Returns true if `seq` was still waiting for an acknowledgement.
    pub fn acknowledge(&mut self, seq: u32) -> bool {
        self.unacked.remove(&seq).is_some()
    }

    pub fn unacked_len(&self) -> usize {
        self.unacked.len()
    }

    /// Frames whose last transmission is older than `interval`.
    pub fn due_for_resend(&mut self, interval: Duration) -> impl Iterator<Item = &mut PendingFrame> {
        self.unacked
            .values_mut()
            .filter(move |pending| pending.sent_at.elapsed() >= interval)
    }

    /// Accepts one reliable payload and returns every payload that is now
    /// deliverable in order. Duplicates and frames too far ahead yield nothing.
    ///
    /// Sequence numbers wrap at `u32::MAX`. A frame counts as ahead when its
    /// wrapping distance from the next expected sequence is inside the
    /// reorder window; anything else has already been delivered.
    pub fn accept_reliable(&mut self, seq: u32, payload: Vec<u8>) -> Vec<Vec<u8>> {
        if seq.wrapping_sub(self.next_recv_seq) >= MAX_REORDER_WINDOW {
            return Vec::new();
        }

        self.reorder.entry(seq).or_insert(payload);

        let mut ready = Vec::new();
        while let Some(payload) = self.reorder.remove(&self.next_recv_seq) {
            ready.push(payload);
            self.next_recv_seq = self.next_recv_seq.wrapping_add(1);
        }
        ready
    }

    /// Reserves the next outgoing unreliable sequence number.
    pub fn next_unreliable_seq(&mut self) -> u32 {
        let seq = self.next_unreliable_seq;
        self.next_unreliable_seq = self.next_unreliable_seq.wrapping_add(1);
        seq
    }

    /// Returns whether an unreliable frame is newer than the last one
    /// delivered, recording it if so.
    ///
    /// Unreliable frames are sequenced, not ordered: a late frame is dropped
    /// instead of being held back, so a stale state update can never
    /// overwrite a newer one. Comparison is wrap-aware over half the
    /// sequence space.
    pub fn accept_unreliable(&mut self, seq: u32) -> bool {
        let newer = match self.last_unreliable_seq {
            None => true,
            Some(last) => (seq.wrapping_sub(last) as i32) > 0,
        };
        if newer {
            self.last_unreliable_seq = Some(seq);
        }
        newer
    }
}

/// Every peer known to one host, keyed by the id handed to the event loop
///
/// Ids start at 1 and are never reused within a host's lifetime. The table
/// enforces the host's capacity limit when new peers are added.
pub struct PeerTable {
    peers: HashMap<ConnectionId, Peer>,
    next_id: u32,
    max_peers: usize,
}

impl PeerTable {
    pub fn new(max_peers: usize) -> Self {
        Self {
            peers: HashMap::new(),
            next_id: 1,
            max_peers,
        }
    }

    /// Adds a peer, or returns None when the table is at capacity.
    pub fn add_peer(&mut self, addr: SocketAddr, state: PeerState) -> Option<ConnectionId> {
        if self.peers.len() >= self.max_peers {
            return None;
        }

        let id = ConnectionId(self.next_id);
        self.next_id += 1;

        self.peers.insert(id, Peer::new(id, addr, state));
        Some(id)
    }

    pub fn remove_peer(&mut self, id: ConnectionId) -> Option<Peer> {
        self.peers.remove(&id)
    }

    pub fn find_by_addr(&self, addr: SocketAddr) -> Option<ConnectionId> {
        self.peers
            .values()
            .find(|peer| peer.addr == addr)
            .map(|peer| peer.id)
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Peer> {
        self.peers.get(&id)
    }

    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut Peer> {
        self.peers.get_mut(&id)
    }

    /// Ids of peers in the Connected state, ascending.
    pub fn established(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self
            .peers
            .values()
            .filter(|peer| peer.is_connected())
            .map(|peer| peer.id)
            .collect();
        ids.sort();
        ids
    }

    /// Every peer id regardless of state.
    pub fn ids(&self) -> Vec<ConnectionId> {
        self.peers.keys().copied().collect()
    }

    /// Peers that have been silent for longer than `timeout`.
    pub fn timed_out(&self, timeout: Duration) -> Vec<ConnectionId> {
        self.peers
            .values()
            .filter(|peer| peer.is_timed_out(timeout))
            .map(|peer| peer.id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
