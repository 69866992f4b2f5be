//! Server authority loop: pump transport events, tick, broadcast

use crate::config::ServerConfig;
use crate::game::GameState;
use log::{debug, info, warn};
use shared::{
    ConnectionId, Message, ProtocolError, SendMode, Transport, TransportError, TransportEvent,
};
use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::{interval, MissedTickBehavior};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerPhase {
    Initializing,
    Running,
    Draining,
    Stopped,
}

/// Main server coordinating the transport and the game simulation
pub struct Server<T: Transport> {
    transport: T,
    config: ServerConfig,
    game_state: GameState,
    phase: ServerPhase,
    tick_duration: Duration,
    accumulator: Duration,
}

impl<T: Transport> Server<T> {
    /// Takes an already bound transport, seeds the world and starts running.
    pub fn new(transport: T, config: ServerConfig) -> Result<Self, ServerError> {
        if config.tick_rate == 0 {
            return Err(ServerError::InvalidConfig(
                "tick rate must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&config.spawn_chance) {
            return Err(ServerError::InvalidConfig(format!(
                "spawn chance {} is not a probability",
                config.spawn_chance
            )));
        }

        let mut server = Self {
            transport,
            game_state: GameState::new(&config),
            tick_duration: config.tick_duration(),
            config,
            phase: ServerPhase::Initializing,
            accumulator: Duration::ZERO,
        };

        server.game_state.seed_mobs(server.config.seed_mobs);
        server.set_phase(ServerPhase::Running);
        Ok(server)
    }

    pub fn phase(&self) -> ServerPhase {
        self.phase
    }

    pub fn game_state(&self) -> &GameState {
        &self.game_state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn set_phase(&mut self, phase: ServerPhase) {
        info!("Server phase {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    /// Handles every pending transport event. Returns how many were handled.
    pub fn pump_events(&mut self) -> usize {
        let events = self.transport.drain_events(self.config.max_events_per_step);
        let count = events.len();

        for event in events {
            self.handle_event(event);
        }
        count
    }

    fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected(id) => {
                info!("Client {} connected", id);
                self.game_state.add_player(id);
            }
            TransportEvent::Received(id, bytes) => self.handle_message(id, &bytes),
            TransportEvent::Disconnected(id, reason) => {
                info!("Client {} disconnected ({:?})", id, reason);
                self.game_state.remove_player(id);
            }
        }
    }

    fn handle_message(&mut self, id: ConnectionId, bytes: &[u8]) {
        match Message::decode(bytes) {
            Ok(Message::PlayerUpdate(update)) => {
                self.game_state.apply_player_update(id, update);
            }
            Ok(Message::PlayerJoin) | Ok(Message::PlayerLeave) => {
                debug!("Ignoring reserved message from {}", id);
            }
            Ok(message) => {
                warn!("Client {} sent server-only message {:?}", id, message);
            }
            Err(e) => {
                warn!("Dropping message from {}: {}", id, e);
            }
        }
    }

    /// One loop iteration: pump events, then tick once if enough time has
    /// accumulated. Returns whether a tick ran.
    pub fn step(&mut self, elapsed: Duration) -> Result<bool, ServerError> {
        if self.phase != ServerPhase::Running {
            return Ok(false);
        }

        self.pump_events();

        self.accumulator += elapsed;
        if self.accumulator < self.tick_duration {
            return Ok(false);
        }

        let dt = self.accumulator.as_secs_f32();
        self.accumulator = Duration::ZERO;
        self.tick(dt)?;
        Ok(true)
    }

    fn tick(&mut self, dt: f32) -> Result<(), ServerError> {
        self.game_state.advance(dt);
        let failures = self.broadcast_snapshot()?;

        if failures > 0 {
            warn!("Tick {}: {} sends failed", self.game_state.tick, failures);
        }

        // Periodic performance monitoring
        if self.game_state.tick % 60 == 0 {
            debug!(
                "Tick {}: {} clients, {} mobs, {:.1}Hz",
                self.game_state.tick,
                self.game_state.players.len(),
                self.game_state.mobs.len(),
                1.0 / dt
            );
        }
        Ok(())
    }

    /// Sends every connection its snapshot: `SNAPSHOT_BEGIN`, every other
    /// player in ascending id order, then every mob. Returns the number of
    /// failed sends.
    fn broadcast_snapshot(&mut self) -> Result<usize, ServerError> {
        let begin = Message::SnapshotBegin {
            tick: self.game_state.tick,
        }
        .encode()?;

        let players = self
            .game_state
            .players
            .iter()
            .map(|(id, player)| Ok((*id, Message::PlayerUpdate(player.to_update()).encode()?)))
            .collect::<Result<Vec<_>, ProtocolError>>()?;

        let mobs = self
            .game_state
            .mobs
            .as_slice()
            .iter()
            .map(|mob| Message::MobUpdate(mob.to_update()).encode())
            .collect::<Result<Vec<_>, ProtocolError>>()?;

        // Relies on per-peer ordered delivery to keep begin, players, mobs.
        let mut failures = self.transport.broadcast(&begin, SendMode::Reliable);

        for connection in self.transport.connections() {
            let others = players.iter().filter(|(id, _)| *id != connection);
            for (_, bytes) in others {
                if let Err(e) = self.transport.send(connection, bytes, SendMode::Reliable) {
                    debug!("Send to {} failed: {}", connection, e);
                    failures += 1;
                }
            }
        }

        for bytes in &mobs {
            failures += self.transport.broadcast(bytes, SendMode::Reliable);
        }
        Ok(failures)
    }

    /// Stops ticking, asks every client to disconnect and pumps the
    /// transport until they all acknowledged or `timeout` passed. Stragglers
    /// are reset.
    pub async fn drain(&mut self, timeout: Duration) {
        if matches!(self.phase, ServerPhase::Draining | ServerPhase::Stopped) {
            return;
        }
        self.set_phase(ServerPhase::Draining);

        for connection in self.transport.connections() {
            self.transport.disconnect(connection);
        }

        let deadline = Instant::now() + timeout;
        while !self.game_state.players.is_empty() && Instant::now() < deadline {
            self.pump_events();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let stragglers: Vec<ConnectionId> = self.game_state.players.keys().copied().collect();
        if !stragglers.is_empty() {
            warn!("Resetting {} clients that never acknowledged", stragglers.len());
        }
        for connection in stragglers {
            self.transport.reset(connection);
        }

        self.game_state.clear();
        self.set_phase(ServerPhase::Stopped);
    }

    /// Main server loop. Runs until `shutdown` resolves, then drains.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        // Poll the transport a few times per tick so input is fresh.
        let mut frame = interval(self.tick_duration / 4);
        frame.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_frame = Instant::now();

        tokio::pin!(shutdown);
        info!("Server started successfully");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Server shutting down");
                    break;
                }
                _ = frame.tick() => {
                    let now = Instant::now();
                    let elapsed = now.duration_since(last_frame);
                    last_frame = now;

                    self.step(elapsed)?;
                }
            }
        }

        self.drain(self.config.drain_timeout).await;
        Ok(())
    }
}
