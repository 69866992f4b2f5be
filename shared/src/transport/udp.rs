//! Connection-oriented UDP host
//!
//! Every datagram starts with a one-byte frame kind. `UNRELIABLE`,
//! `RELIABLE` and `ACK` frames carry a little-endian u32 sequence number
//! after the kind; data frames carry the application payload after their
//! header.
//!
//! Reliable frames are acknowledged, retransmitted and delivered in order.
//! Unreliable frames are sequenced only: one that arrives after a newer
//! frame from the same peer is dropped.
//!
//! The socket is non-blocking and all work happens inside
//! [`Transport::poll_event`], so the host can be driven from an async server
//! loop and from a frame-paced render loop alike.

use crate::error::TransportError;
use crate::transport::peers::{PeerState, PeerTable};
use crate::transport::{ConnectionId, DisconnectReason, SendMode, Transport, TransportEvent};
use crate::MAX_CLIENTS;
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::{Duration, Instant};

pub const FRAME_CONNECT: u8 = 0x01;
pub const FRAME_ACCEPT: u8 = 0x02;
pub const FRAME_DISCONNECT: u8 = 0x03;
pub const FRAME_DISCONNECT_ACK: u8 = 0x04;
pub const FRAME_KEEPALIVE: u8 = 0x05;
pub const FRAME_UNRELIABLE: u8 = 0x06;
pub const FRAME_RELIABLE: u8 = 0x07;
pub const FRAME_ACK: u8 = 0x08;

const MAX_DATAGRAM_SIZE: usize = 1500;

/// Timings and limits for one host
#[derive(Debug, Clone)]
pub struct UdpConfig {
    pub max_peers: usize,
    pub peer_timeout: Duration,
    pub resend_interval: Duration,
    pub max_resend_attempts: u32,
    pub keepalive_interval: Duration,
    pub connect_retry_interval: Duration,
    pub connect_timeout: Duration,
    pub disconnect_timeout: Duration,
    /// Upper bound on datagrams read from the socket per service pass.
    pub max_datagrams_per_poll: usize,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            max_peers: MAX_CLIENTS,
            peer_timeout: Duration::from_secs(5),
            resend_interval: Duration::from_millis(100),
            max_resend_attempts: 30,
            keepalive_interval: Duration::from_secs(1),
            connect_retry_interval: Duration::from_millis(250),
            connect_timeout: Duration::from_secs(5),
            disconnect_timeout: Duration::from_secs(1),
            max_datagrams_per_poll: 256,
        }
    }
}

pub struct UdpHost {
    socket: UdpSocket,
    local_addr: SocketAddr,
    config: UdpConfig,
    peers: PeerTable,
    events: VecDeque<TransportEvent>,
    recv_buf: Vec<u8>,
}

impl UdpHost {
    pub fn bind(addr: &str) -> Result<Self, TransportError> {
        Self::bind_with_config(addr, UdpConfig::default())
    }

    pub fn bind_with_config(addr: &str, config: UdpConfig) -> Result<Self, TransportError> {
        let init_error = |source| TransportError::Init {
            addr: addr.to_string(),
            source,
        };

        let socket = UdpSocket::bind(addr).map_err(init_error)?;
        socket.set_nonblocking(true).map_err(init_error)?;
        let local_addr = socket.local_addr().map_err(init_error)?;

        debug!("UDP host bound on {}", local_addr);

        Ok(Self {
            socket,
            local_addr,
            peers: PeerTable::new(config.max_peers),
            config,
            events: VecDeque::new(),
            recv_buf: vec![0u8; MAX_DATAGRAM_SIZE],
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Starts a handshake with `addr`. Completion is reported as a
    /// `Connected` event; failure as `Disconnected` with `Timeout` or `Refused`.
    pub fn connect(&mut self, addr: SocketAddr) -> Result<ConnectionId, TransportError> {
        if let Some(id) = self.peers.find_by_addr(addr) {
            return Ok(id);
        }

        let id = self
            .peers
            .add_peer(addr, PeerState::Connecting)
            .ok_or(TransportError::AtCapacity(self.config.max_peers))?;

        info!("Connecting to {} as {}", addr, id);
        send_raw(&self.socket, addr, &[FRAME_CONNECT])?;
        Ok(id)
    }

    /// Reads pending datagrams and runs retransmits, keepalives and timeouts.
    fn service(&mut self) {
        for _ in 0..self.config.max_datagrams_per_poll {
            match self.socket.recv_from(&mut self.recv_buf) {
                Ok((len, addr)) => {
                    let datagram = self.recv_buf[..len].to_vec();
                    self.handle_datagram(addr, &datagram);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                // ICMP port unreachable surfaces here on some platforms.
                Err(e) if e.kind() == ErrorKind::ConnectionReset => continue,
                Err(e) => {
                    warn!("Error receiving datagram: {}", e);
                    break;
                }
            }
        }

        self.housekeeping();
    }

    fn handle_datagram(&mut self, addr: SocketAddr, datagram: &[u8]) {
        let Some((&kind, body)) = datagram.split_first() else {
            return;
        };

        let Some(id) = self.peers.find_by_addr(addr) else {
            self.handle_stranger(addr, kind);
            return;
        };

        if let Some(peer) = self.peers.get_mut(id) {
            peer.last_seen = Instant::now();
        }

        match kind {
            FRAME_CONNECT => self.handle_connect(id),
            FRAME_ACCEPT | FRAME_KEEPALIVE => {
                self.promote(id);
            }
            FRAME_DISCONNECT => self.handle_disconnect(id),
            FRAME_DISCONNECT_ACK => self.finish_disconnect(id),
            FRAME_UNRELIABLE => match split_seq(body) {
                Some((seq, payload)) => self.handle_unreliable(id, seq, payload),
                None => debug!("Dropping truncated unreliable frame from {}", addr),
            },
            FRAME_RELIABLE => match split_seq(body) {
                Some((seq, payload)) => self.handle_reliable(id, seq, payload),
                None => debug!("Dropping truncated reliable frame from {}", addr),
            },
            FRAME_ACK => {
                if let (Some((seq, _)), Some(peer)) = (split_seq(body), self.peers.get_mut(id)) {
                    peer.acknowledge(seq);
                }
            }
            _ => debug!("Dropping frame of unknown kind {:#04x} from {}", kind, addr),
        }
    }

    /// Datagrams from addresses without a peer entry.
    fn handle_stranger(&mut self, addr: SocketAddr, kind: u8) {
        match kind {
            FRAME_CONNECT => match self.peers.add_peer(addr, PeerState::Connected) {
                Some(id) => {
                    debug!("Accepted {} from {}", id, addr);
                    if let Err(e) = send_raw(&self.socket, addr, &[FRAME_ACCEPT]) {
                        debug!("{}", e);
                    }
                    self.events.push_back(TransportEvent::Connected(id));
                }
                None => {
                    warn!("Refusing connection from {}: host is full", addr);
                    if let Err(e) = send_raw(&self.socket, addr, &[FRAME_DISCONNECT]) {
                        debug!("{}", e);
                    }
                }
            },
            // The peer was already forgotten; let its disconnect complete.
            FRAME_DISCONNECT => {
                if let Err(e) = send_raw(&self.socket, addr, &[FRAME_DISCONNECT_ACK]) {
                    debug!("{}", e);
                }
            }
            _ => debug!("Dropping frame {:#04x} from unknown address {}", kind, addr),
        }
    }

    fn handle_connect(&mut self, id: ConnectionId) {
        let Some(peer) = self.peers.get(id) else {
            return;
        };

        match peer.state {
            // Simultaneous open or a lost ACCEPT; answering again is harmless.
            PeerState::Connecting | PeerState::Connected => {
                let addr = peer.addr;
                if let Err(e) = send_raw(&self.socket, addr, &[FRAME_ACCEPT]) {
                    debug!("{}", e);
                }
                self.promote(id);
            }
            PeerState::Disconnecting { .. } => {}
        }
    }

    /// Moves a connecting peer to Connected. Any data frame from the remote
    /// side counts as acceptance. Returns whether the peer is connected.
    fn promote(&mut self, id: ConnectionId) -> bool {
        let Some(peer) = self.peers.get_mut(id) else {
            return false;
        };

        match peer.state {
            PeerState::Connected => true,
            PeerState::Connecting => {
                peer.state = PeerState::Connected;
                debug!("Connection {} to {} established", id, peer.addr);
                self.events.push_back(TransportEvent::Connected(id));
                true
            }
            PeerState::Disconnecting { .. } => false,
        }
    }

    fn handle_unreliable(&mut self, id: ConnectionId, seq: u32, payload: &[u8]) {
        if !self.promote(id) {
            return;
        }
        let Some(peer) = self.peers.get_mut(id) else {
            return;
        };

        if peer.accept_unreliable(seq) {
            self.events.push_back(TransportEvent::Received(id, payload.to_vec()));
        } else {
            debug!("Dropping stale unreliable frame {} from {}", seq, peer.addr);
        }
    }

    fn handle_reliable(&mut self, id: ConnectionId, seq: u32, payload: &[u8]) {
        if !self.promote(id) {
            return;
        }
        let Some(peer) = self.peers.get_mut(id) else {
            return;
        };

        // Always acknowledge so duplicates stop being retransmitted.
        if let Err(e) = send_raw(&self.socket, peer.addr, &encode_frame(FRAME_ACK, Some(seq), &[])) {
            debug!("{}", e);
        }

        for payload in peer.accept_reliable(seq, payload.to_vec()) {
            self.events.push_back(TransportEvent::Received(id, payload));
        }
    }

    fn handle_disconnect(&mut self, id: ConnectionId) {
        let Some(peer) = self.peers.remove_peer(id) else {
            return;
        };

        if let Err(e) = send_raw(&self.socket, peer.addr, &[FRAME_DISCONNECT_ACK]) {
            debug!("{}", e);
        }

        let reason = match peer.state {
            PeerState::Connecting => DisconnectReason::Refused,
            PeerState::Connected => DisconnectReason::Remote,
            PeerState::Disconnecting { .. } => DisconnectReason::Requested,
        };
        debug!("Connection {} closed by {}: {:?}", id, peer.addr, reason);
        self.events.push_back(TransportEvent::Disconnected(id, reason));
    }

    fn finish_disconnect(&mut self, id: ConnectionId) {
        let disconnecting = matches!(
            self.peers.get(id).map(|peer| peer.state),
            Some(PeerState::Disconnecting { .. })
        );

        if disconnecting {
            self.peers.remove_peer(id);
            self.events
                .push_back(TransportEvent::Disconnected(id, DisconnectReason::Requested));
        }
    }

    fn drop_peer(&mut self, id: ConnectionId, reason: DisconnectReason) {
        if self.peers.remove_peer(id).is_some() {
            self.events.push_back(TransportEvent::Disconnected(id, reason));
        }
    }

    fn housekeeping(&mut self) {
        let now = Instant::now();

        for id in self.peers.ids() {
            let Some(peer) = self.peers.get_mut(id) else {
                continue;
            };

            let state = peer.state;
            match state {
                PeerState::Connecting => {
                    if peer.created_at.elapsed() > self.config.connect_timeout {
                        warn!("Connection attempt to {} timed out", peer.addr);
                        self.drop_peer(id, DisconnectReason::Timeout);
                    } else if peer.last_sent.elapsed() >= self.config.connect_retry_interval {
                        peer.last_sent = now;
                        if let Err(e) = send_raw(&self.socket, peer.addr, &[FRAME_CONNECT]) {
                            debug!("{}", e);
                        }
                    }
                }
                PeerState::Disconnecting { deadline } => {
                    if now >= deadline {
                        debug!("No disconnect acknowledgement from {}", peer.addr);
                        self.drop_peer(id, DisconnectReason::Timeout);
                    } else if peer.last_sent.elapsed() >= self.config.resend_interval {
                        peer.last_sent = now;
                        if let Err(e) = send_raw(&self.socket, peer.addr, &[FRAME_DISCONNECT]) {
                            debug!("{}", e);
                        }
                    }
                }
                PeerState::Connected => {
                    if peer.is_timed_out(self.config.peer_timeout) {
                        info!("Connection {} to {} timed out", id, peer.addr);
                        self.drop_peer(id, DisconnectReason::Timeout);
                        continue;
                    }

                    let addr = peer.addr;
                    let mut exhausted = false;
                    let mut resent = false;
                    for pending in peer.due_for_resend(self.config.resend_interval) {
                        if pending.attempts >= self.config.max_resend_attempts {
                            exhausted = true;
                            break;
                        }
                        pending.attempts += 1;
                        pending.sent_at = now;
                        resent = true;
                        if let Err(e) = send_raw(&self.socket, addr, &pending.frame) {
                            debug!("{}", e);
                        }
                    }

                    if exhausted {
                        warn!("{}", TransportError::PeerUnreachable(addr));
                        self.drop_peer(id, DisconnectReason::Timeout);
                        continue;
                    }

                    if resent {
                        peer.last_sent = now;
                    } else if peer.last_sent.elapsed() >= self.config.keepalive_interval {
                        peer.last_sent = now;
                        if let Err(e) = send_raw(&self.socket, addr, &[FRAME_KEEPALIVE]) {
                            debug!("{}", e);
                        }
                    }
                }
            }
        }
    }
}

impl Transport for UdpHost {
    fn poll_event(&mut self) -> Option<TransportEvent> {
        if self.events.is_empty() {
            self.service();
        }
        self.events.pop_front()
    }

    fn send(
        &mut self,
        connection: ConnectionId,
        payload: &[u8],
        mode: SendMode,
    ) -> Result<(), TransportError> {
        let peer = self
            .peers
            .get_mut(connection)
            .ok_or(TransportError::UnknownConnection(connection))?;

        if !peer.is_connected() {
            return Err(TransportError::NotConnected(connection));
        }

        let frame = match mode {
            SendMode::Unreliable => {
                let seq = peer.next_unreliable_seq();
                encode_frame(FRAME_UNRELIABLE, Some(seq), payload)
            }
            SendMode::Reliable => {
                let seq = peer.next_reliable_seq();
                let frame = encode_frame(FRAME_RELIABLE, Some(seq), payload);
                peer.track_unacked(seq, frame.clone());
                frame
            }
        };

        peer.last_sent = Instant::now();
        send_raw(&self.socket, peer.addr, &frame)
    }

    fn connections(&self) -> Vec<ConnectionId> {
        self.peers.established()
    }

    fn disconnect(&mut self, connection: ConnectionId) {
        let deadline = Instant::now() + self.config.disconnect_timeout;
        let Some(peer) = self.peers.get_mut(connection) else {
            return;
        };

        if let Err(e) = send_raw(&self.socket, peer.addr, &[FRAME_DISCONNECT]) {
            debug!("{}", e);
        }

        let state = peer.state;
        match state {
            PeerState::Connecting => {
                self.drop_peer(connection, DisconnectReason::Requested);
            }
            PeerState::Connected => {
                peer.state = PeerState::Disconnecting { deadline };
                peer.last_sent = Instant::now();
            }
            PeerState::Disconnecting { .. } => {}
        }
    }

    fn reset(&mut self, connection: ConnectionId) {
        if self.peers.remove_peer(connection).is_some() {
            debug!("Connection {} reset", connection);
        }
        self.events.retain(|event| event.connection() != connection);
    }
}

/// Resolves a `host:port` string to the first matching socket address.
pub fn resolve(addr: &str) -> Result<SocketAddr, TransportError> {
    addr.to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| TransportError::InvalidAddress(addr.to_string()))
}

fn send_raw(socket: &UdpSocket, addr: SocketAddr, frame: &[u8]) -> Result<(), TransportError> {
    socket
        .send_to(frame, addr)
        .map_err(|source| TransportError::Send { addr, source })?;
    Ok(())
}

fn encode_frame(kind: u8, seq: Option<u32>, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(5 + payload.len());
    frame.push(kind);
    if let Some(seq) = seq {
        frame.extend_from_slice(&seq.to_le_bytes());
    }
    frame.extend_from_slice(payload);
    frame
}

fn split_seq(body: &[u8]) -> Option<(u32, &[u8])> {
    if body.len() < 4 {
        return None;
    }
    let (head, rest) = body.split_at(4);
    let seq = u32::from_le_bytes(head.try_into().ok()?);
    Some((seq, rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn fast_config() -> UdpConfig {
        UdpConfig {
            connect_retry_interval: Duration::from_millis(20),
            resend_interval: Duration::from_millis(20),
            ..UdpConfig::default()
        }
    }

    fn host(config: UdpConfig) -> UdpHost {
        UdpHost::bind_with_config("127.0.0.1:0", config).unwrap()
    }

    /// Polls both hosts until `done` accepts the collected events or 2 s pass.
    fn pump(
        a: &mut UdpHost,
        b: &mut UdpHost,
        mut done: impl FnMut(&[TransportEvent], &[TransportEvent]) -> bool,
    ) -> (Vec<TransportEvent>, Vec<TransportEvent>) {
        let start = Instant::now();
        let mut a_events = Vec::new();
        let mut b_events = Vec::new();

        while start.elapsed() < Duration::from_secs(2) {
            a_events.extend(a.drain_events(64));
            b_events.extend(b.drain_events(64));
            if done(&a_events, &b_events) {
                break;
            }
            thread::sleep(Duration::from_millis(2));
        }

        (a_events, b_events)
    }

    fn connected_pair() -> (UdpHost, UdpHost, ConnectionId, ConnectionId) {
        let mut server = host(fast_config());
        let mut client = host(fast_config());
        let to_server = client.connect(server.local_addr()).unwrap();

        let (server_events, _) = pump(&mut server, &mut client, |s, c| {
            !s.is_empty() && c.contains(&TransportEvent::Connected(to_server))
        });

        let to_client = match server_events.first() {
            Some(TransportEvent::Connected(id)) => *id,
            other => panic!("Expected a connection, got {:?}", other),
        };

        (server, client, to_client, to_server)
    }

    #[test]
    fn test_frame_encoding() {
        assert_eq!(encode_frame(FRAME_KEEPALIVE, None, &[]), vec![FRAME_KEEPALIVE]);

        let frame = encode_frame(FRAME_RELIABLE, Some(258), &[9, 9]);
        assert_eq!(frame, vec![FRAME_RELIABLE, 2, 1, 0, 0, 9, 9]);
        assert_eq!(split_seq(&frame[1..]), Some((258, &[9u8, 9][..])));
        assert_eq!(split_seq(&[1, 2, 3]), None);
    }

    #[test]
    fn test_resolve() {
        assert!(resolve("127.0.0.1:1234").is_ok());
        assert!(matches!(
            resolve("not an address"),
            Err(TransportError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_handshake() {
        let (server, client, to_client, to_server) = connected_pair();

        assert_eq!(to_client, ConnectionId(1));
        assert_eq!(server.connections(), vec![to_client]);
        assert_eq!(client.connections(), vec![to_server]);
    }

    #[test]
    fn test_send_before_connected_fails() {
        let server = host(fast_config());
        let mut client = host(fast_config());
        let id = client.connect(server.local_addr()).unwrap();

        assert!(matches!(
            client.send(id, &[1], SendMode::Unreliable),
            Err(TransportError::NotConnected(_))
        ));
        assert!(matches!(
            client.send(ConnectionId(99), &[1], SendMode::Unreliable),
            Err(TransportError::UnknownConnection(_))
        ));
    }

    #[test]
    fn test_unreliable_delivery() {
        let (mut server, mut client, to_client, to_server) = connected_pair();

        client.send(to_server, &[1, 2, 3], SendMode::Unreliable).unwrap();

        let (server_events, _) = pump(&mut server, &mut client, |s, _| !s.is_empty());
        assert_eq!(
            server_events,
            vec![TransportEvent::Received(to_client, vec![1, 2, 3])]
        );
    }

    #[test]
    fn test_late_unreliable_frames_are_dropped() {
        let (mut server, mut client, to_client, _) = connected_pair();

        // Written straight to the socket to force the arrival order.
        for seq in [5u32, 3, 6, 5] {
            let frame = encode_frame(FRAME_UNRELIABLE, Some(seq), &[seq as u8]);
            send_raw(&client.socket, server.local_addr(), &frame).unwrap();
        }

        let (mut server_events, _) = pump(&mut server, &mut client, |s, _| s.len() >= 2);
        thread::sleep(Duration::from_millis(20));
        server_events.extend(server.drain_events(16));

        assert_eq!(
            server_events,
            vec![
                TransportEvent::Received(to_client, vec![5]),
                TransportEvent::Received(to_client, vec![6]),
            ]
        );
    }

    #[test]
    fn test_reliable_delivery_is_ordered() {
        let (mut server, mut client, to_client, _) = connected_pair();

        for i in 0..20u8 {
            server.send(to_client, &[i], SendMode::Reliable).unwrap();
        }

        let (_, client_events) = pump(&mut server, &mut client, |_, c| c.len() >= 20);
        let payloads: Vec<u8> = client_events
            .iter()
            .filter_map(|event| match event {
                TransportEvent::Received(_, payload) => payload.first().copied(),
                _ => None,
            })
            .collect();

        assert_eq!(payloads, (0..20u8).collect::<Vec<_>>());
    }

    #[test]
    fn test_capacity_refusal() {
        let mut server = host(UdpConfig {
            max_peers: 1,
            ..fast_config()
        });
        let mut first = host(fast_config());
        let mut second = host(fast_config());

        first.connect(server.local_addr()).unwrap();
        pump(&mut server, &mut first, |s, f| !s.is_empty() && !f.is_empty());

        let refused = second.connect(server.local_addr()).unwrap();
        let (_, second_events) = pump(&mut server, &mut second, |_, s| !s.is_empty());

        assert_eq!(
            second_events,
            vec![TransportEvent::Disconnected(refused, DisconnectReason::Refused)]
        );
        assert_eq!(server.connections().len(), 1);
    }

    #[test]
    fn test_graceful_disconnect() {
        let (mut server, mut client, to_client, to_server) = connected_pair();

        client.disconnect(to_server);
        let (server_events, client_events) =
            pump(&mut server, &mut client, |s, c| !s.is_empty() && !c.is_empty());

        assert_eq!(
            server_events,
            vec![TransportEvent::Disconnected(to_client, DisconnectReason::Remote)]
        );
        assert_eq!(
            client_events,
            vec![TransportEvent::Disconnected(to_server, DisconnectReason::Requested)]
        );
        assert!(server.connections().is_empty());
    }

    #[test]
    fn test_connect_timeout() {
        // Bound but never answers.
        let silent = UdpSocket::bind("127.0.0.1:0").unwrap();
        let mut client = host(UdpConfig {
            connect_timeout: Duration::from_millis(100),
            ..fast_config()
        });

        let id = client.connect(silent.local_addr().unwrap()).unwrap();

        let start = Instant::now();
        let mut events = Vec::new();
        while events.is_empty() && start.elapsed() < Duration::from_secs(2) {
            events.extend(client.drain_events(16));
            thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(
            events,
            vec![TransportEvent::Disconnected(id, DisconnectReason::Timeout)]
        );
    }

    #[test]
    fn test_reset_is_silent() {
        let (mut server, mut client, to_client, _) = connected_pair();

        server.reset(to_client);
        assert!(!server.connections().contains(&to_client));
        assert!(server
            .drain_events(16)
            .iter()
            .all(|event| event.connection() != to_client));

        // The client has not been told anything.
        assert_eq!(client.connections().len(), 1);
    }
}
