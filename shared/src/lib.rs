//! Types, constants and protocol shared by the server and the client.
//!
//! Everything both sides must agree on lives here: world dimensions, the
//! physics step used for local prediction, the fixed-layout wire codec, mob
//! behavior and the transport abstraction the event loops are written
//! against.

pub mod error;
pub mod mob;
pub mod physics;
pub mod protocol;
pub mod transport;

pub use error::{ProtocolError, TransportError};
pub use mob::{Mob, MobKind};
pub use physics::{integrate, Body, InputState, Vec2};
pub use protocol::{Message, MobUpdate, PlayerUpdate};
pub use transport::{ConnectionId, DisconnectReason, SendMode, Transport, TransportEvent};

pub const WORLD_WIDTH: f32 = 1600.0;
pub const WORLD_HEIGHT: f32 = 1200.0;
pub const PLAYER_SPAWN: Vec2 = Vec2::new(800.0, 600.0);
pub const PLAYER_SPEED: f32 = 500.0;
pub const FRICTION: f32 = 0.98;

pub const TICK_RATE: u32 = 60;
pub const DEFAULT_PORT: u16 = 1234;
pub const MAX_CLIENTS: usize = 32;

pub const MAX_MOBS: usize = 100;
pub const MOB_SOFT_CAP: usize = 50;
pub const MOB_SPAWN_CHANCE: f64 = 0.01;
pub const SEED_MOBS: usize = 10;

/// Distance under which an incoming mob snapshot is bound to an existing mirror entry.
pub const PROXIMITY_THRESHOLD: f32 = 5.0;
/// Mirrored mobs farther than this from the local player are dropped.
pub const MAX_DISTANCE: f32 = 1000.0;

/// Canonical state of one connected player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerState {
    pub position: Vec2,
    pub velocity: Vec2,
}

impl PlayerState {
    pub fn new(position: Vec2) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
        }
    }

    pub fn spawn() -> Self {
        Self::new(PLAYER_SPAWN)
    }

    pub fn to_update(&self) -> PlayerUpdate {
        PlayerUpdate {
            x: self.position.x,
            y: self.position.y,
            vx: self.velocity.x,
            vy: self.velocity.y,
        }
    }
}

impl From<PlayerUpdate> for PlayerState {
    fn from(update: PlayerUpdate) -> Self {
        Self {
            position: Vec2::new(update.x, update.y),
            velocity: Vec2::new(update.vx, update.vy),
        }
    }
}

impl From<&Body> for PlayerState {
    fn from(body: &Body) -> Self {
        Self {
            position: body.position,
            velocity: body.velocity,
        }
    }
}
