//! Client connection handling and per-frame network work

use crate::config::ClientConfig;
use crate::game::ClientGameState;
use log::{debug, info, warn};
use shared::{
    ConnectionId, DisconnectReason, InputState, Message, ProtocolError, SendMode, Transport,
    TransportError, TransportEvent,
};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("server closed the connection during the handshake ({0:?})")]
    Rejected(DisconnectReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
}

/// One player's session: the transport, the server connection and the
/// local game state.
pub struct Client<T: Transport> {
    transport: T,
    server: ConnectionId,
    status: ConnectionStatus,
    disconnect_reason: Option<DisconnectReason>,
    game_state: ClientGameState,
    config: ClientConfig,
}

impl<T: Transport> Client<T> {
    /// `server` is the connection the caller opened on `transport`.
    pub fn new(transport: T, server: ConnectionId, config: ClientConfig) -> Self {
        Self {
            transport,
            server,
            status: ConnectionStatus::Connecting,
            disconnect_reason: None,
            game_state: ClientGameState::new(&config),
            config,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Why the connection ended, once it has.
    pub fn disconnect_reason(&self) -> Option<DisconnectReason> {
        self.disconnect_reason
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    pub fn game_state(&self) -> &ClientGameState {
        &self.game_state
    }

    pub fn game_state_mut(&mut self) -> &mut ClientGameState {
        &mut self.game_state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Blocks until the handshake completes, fails, or `timeout` passes.
    pub fn connect(&mut self, timeout: Duration) -> Result<(), ClientError> {
        let deadline = Instant::now() + timeout;

        loop {
            self.pump_events();

            match self.status {
                ConnectionStatus::Connected => return Ok(()),
                ConnectionStatus::Disconnected => {
                    let reason = self.disconnect_reason.unwrap_or(DisconnectReason::Refused);
                    return Err(ClientError::Rejected(reason));
                }
                ConnectionStatus::Connecting => {}
            }

            if Instant::now() >= deadline {
                self.transport.reset(self.server);
                self.status = ConnectionStatus::Disconnected;
                return Err(TransportError::HandshakeTimeout.into());
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Handles every pending transport event. Returns how many were handled.
    pub fn pump_events(&mut self) -> usize {
        let events = self.transport.drain_events(self.config.max_events_per_frame);
        let count = events.len();

        for event in events {
            self.handle_event(event);
        }
        count
    }

    fn handle_event(&mut self, event: TransportEvent) {
        if event.connection() != self.server {
            debug!("Ignoring event for unknown connection {}", event.connection());
            return;
        }

        match event {
            TransportEvent::Connected(_) => {
                info!("Connected to server");
                self.status = ConnectionStatus::Connected;
            }
            TransportEvent::Received(_, bytes) => match Message::decode(&bytes) {
                Ok(message) => self.game_state.apply_message(message),
                Err(e) => warn!("Dropping message from server: {}", e),
            },
            TransportEvent::Disconnected(_, reason) => {
                info!("Disconnected from server ({:?})", reason);
                self.status = ConnectionStatus::Disconnected;
                self.disconnect_reason = Some(reason);
                self.game_state.clear_mirrors();
            }
        }
    }

    /// One client frame: receive, predict, report, evict.
    pub fn frame(&mut self, input: &InputState, dt: f32) -> Result<(), ClientError> {
        self.pump_events();

        self.game_state.predict(input, dt);

        if self.is_connected() {
            let update = Message::PlayerUpdate(self.game_state.local_state().to_update());
            if let Err(e) = self
                .transport
                .send(self.server, &update.encode()?, SendMode::Unreliable)
            {
                warn!("Failed to send player update: {}", e);
            }
        }

        let evicted = self.game_state.evict_mobs();
        if evicted > 0 {
            debug!("Evicted {} mobs", evicted);
        }
        Ok(())
    }

    /// Best-effort graceful disconnect. Resets the connection if the server
    /// does not acknowledge within `timeout`.
    pub fn shutdown(&mut self, timeout: Duration) {
        if self.status == ConnectionStatus::Disconnected {
            return;
        }

        self.transport.disconnect(self.server);
        let deadline = Instant::now() + timeout;

        while self.status != ConnectionStatus::Disconnected && Instant::now() < deadline {
            self.pump_events();
            if self.status != ConnectionStatus::Disconnected {
                thread::sleep(POLL_INTERVAL);
            }
        }

        if self.status != ConnectionStatus::Disconnected {
            warn!("Server did not acknowledge the disconnect, resetting");
            self.transport.reset(self.server);
            self.status = ConnectionStatus::Disconnected;
        }
        self.game_state.clear_mirrors();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::transport::memory::{MemoryHost, MemoryHub};
    use shared::{MobKind, MobUpdate, PlayerUpdate, PLAYER_SPAWN};

    fn connected_client() -> (Client<MemoryHost>, MemoryHost) {
        let hub = MemoryHub::new();
        let server = hub.host();
        let mut transport = hub.host();
        let to_server = transport.connect(&server);

        let mut client = Client::new(transport, to_server, ClientConfig::default());
        client.connect(Duration::from_millis(100)).unwrap();
        (client, server)
    }

    fn server_send(server: &mut MemoryHost, message: Message) {
        let to_client = server.connections()[0];
        server
            .send(to_client, &message.encode().unwrap(), SendMode::Reliable)
            .unwrap();
    }

    #[test]
    fn test_connect() {
        let (client, server) = connected_client();
        assert!(client.is_connected());
        assert_eq!(server.connections().len(), 1);
    }

    #[test]
    fn test_connect_refused() {
        let hub = MemoryHub::new();
        let server = hub.host_with_capacity(0);
        let mut transport = hub.host();
        let to_server = transport.connect(&server);

        let mut client = Client::new(transport, to_server, ClientConfig::default());
        assert!(matches!(
            client.connect(Duration::from_millis(100)),
            Err(ClientError::Rejected(DisconnectReason::Refused))
        ));
    }

    #[test]
    fn test_connect_timeout() {
        let hub = MemoryHub::new();
        let transport = hub.host();

        // Nothing was ever opened on this id.
        let mut client = Client::new(transport, ConnectionId(1), ClientConfig::default());
        assert!(matches!(
            client.connect(Duration::from_millis(20)),
            Err(ClientError::Transport(TransportError::HandshakeTimeout))
        ));
        assert_eq!(client.status(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn test_frame_sends_prediction() {
        let (mut client, mut server) = connected_client();
        server.drain_events(16);

        let input = InputState {
            left: true,
            ..InputState::default()
        };
        client.frame(&input, 1.0 / 60.0).unwrap();

        let sent: Vec<Message> = server
            .drain_events(16)
            .into_iter()
            .filter_map(|event| match event {
                TransportEvent::Received(_, bytes) => Message::decode(&bytes).ok(),
                _ => None,
            })
            .collect();

        assert_eq!(sent.len(), 1);
        match sent[0] {
            Message::PlayerUpdate(update) => {
                assert!(update.x < PLAYER_SPAWN.x);
                assert!(update.vx < 0.0);
            }
            other => panic!("Unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_frame_applies_snapshot() {
        let (mut client, mut server) = connected_client();

        server_send(&mut server, Message::SnapshotBegin { tick: 9 });
        server_send(
            &mut server,
            Message::PlayerUpdate(PlayerUpdate {
                x: 5.0,
                y: 6.0,
                vx: 0.0,
                vy: 0.0,
            }),
        );
        server_send(
            &mut server,
            Message::MobUpdate(MobUpdate {
                x: PLAYER_SPAWN.x,
                y: PLAYER_SPAWN.y,
                vx: 0.0,
                vy: 0.0,
                mob_type: MobKind::Bubble.wire_id(),
                health: 10,
            }),
        );
        server
            .send(server.connections()[0], &[0x01, 0xff], SendMode::Reliable)
            .unwrap();

        client.frame(&InputState::default(), 1.0 / 60.0).unwrap();

        let state = client.game_state();
        assert_eq!(state.last_tick, Some(9));
        assert_eq!(state.remote.len(), 1);
        assert_eq!(state.mobs.len(), 1);
        assert_eq!(state.mobs.as_slice()[0].kind, MobKind::Bubble);
    }

    #[test]
    fn test_server_disconnect_clears_mirrors() {
        let (mut client, mut server) = connected_client();
        server_send(&mut server, Message::SnapshotBegin { tick: 1 });
        server_send(
            &mut server,
            Message::PlayerUpdate(PlayerUpdate {
                x: 5.0,
                y: 6.0,
                vx: 0.0,
                vy: 0.0,
            }),
        );
        client.frame(&InputState::default(), 1.0 / 60.0).unwrap();
        assert_eq!(client.game_state().remote.len(), 1);

        let to_client = server.connections()[0];
        server.disconnect(to_client);
        client.frame(&InputState::default(), 1.0 / 60.0).unwrap();

        assert_eq!(client.status(), ConnectionStatus::Disconnected);
        assert_eq!(client.disconnect_reason(), Some(DisconnectReason::Remote));
        assert!(client.game_state().remote.is_empty());
    }

    #[test]
    fn test_shutdown() {
        let (mut client, mut server) = connected_client();
        server.drain_events(16);

        client.shutdown(Duration::from_millis(100));

        assert_eq!(client.status(), ConnectionStatus::Disconnected);
        assert!(server.drain_events(16).iter().any(|event| matches!(
            event,
            TransportEvent::Disconnected(_, DisconnectReason::Remote)
        )));
    }
}
