//! Canonical world state: connected players, the mob table and the tick counter.

use crate::config::ServerConfig;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::mob::MobTable;
use shared::{ConnectionId, MobKind, PlayerState, PlayerUpdate};
use std::collections::BTreeMap;

/// Canonical world state owned by the server loop.
#[derive(Debug)]
pub struct GameState {
    pub tick: u32,
    /// Ordered by connection id so snapshots list players in a stable order.
    pub players: BTreeMap<ConnectionId, PlayerState>,
    pub mobs: MobTable,
    spawn_chance: f64,
    mob_soft_cap: usize,
    rng: StdRng,
}

impl GameState {
    /// Creates an empty world from `config`.
    ///
    /// With `config.seed` set, the mob RNG is seeded from it so spawn
    /// positions and respawn rolls repeat across runs. Otherwise it is seeded
    /// from system entropy. No mobs are spawned here; see
    /// [`GameState::seed_mobs`].
    pub fn new(config: &ServerConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            tick: 0,
            players: BTreeMap::new(),
            mobs: MobTable::new(config.max_mobs),
            spawn_chance: config.spawn_chance,
            mob_soft_cap: config.mob_soft_cap,
            rng,
        }
    }

    /// Spawns `count` default mobs at random positions.
    ///
    /// The table's hard cap still applies, so seeding more than `max_mobs`
    /// keeps only the newest.
    pub fn seed_mobs(&mut self, count: usize) {
        for _ in 0..count {
            self.mobs.spawn_random(MobKind::DEFAULT, &mut self.rng);
        }
        info!("Seeded {} mobs", self.mobs.len());
    }

    /// Registers a newly connected player at the spawn point, at rest.
    ///
    /// Re-adding an id that is already present resets that player.
    pub fn add_player(&mut self, id: ConnectionId) {
        let player = PlayerState::spawn();
        info!(
            "Added player {} at ({}, {})",
            id, player.position.x, player.position.y
        );
        self.players.insert(id, player);
    }

    pub fn remove_player(&mut self, id: ConnectionId) {
        if self.players.remove(&id).is_some() {
            info!("Removed player {}", id);
        }
    }

    /// Overwrites the canonical state with whatever the client reported.
    ///
    /// No validation or clamping is done; position and velocity are taken
    /// verbatim. Updates for an id without a player are logged and dropped.
    pub fn apply_player_update(&mut self, id: ConnectionId, update: PlayerUpdate) {
        match self.players.get_mut(&id) {
            Some(player) => *player = PlayerState::from(update),
            None => warn!("Update from {} without a player", id),
        }
    }

    /// Advances the simulation by one tick of length `dt`.
    ///
    /// The tick counter wraps on overflow. Mobs move first, then at most one
    /// mob is respawned. Players are not simulated here since their state
    /// comes from their own clients.
    pub fn advance(&mut self, dt: f32) {
        self.tick = self.tick.wrapping_add(1);
        self.mobs.tick(dt);

        if self
            .mobs
            .maybe_respawn(&mut self.rng, self.spawn_chance, self.mob_soft_cap)
        {
            debug!("Tick {}: respawned a mob, {} alive", self.tick, self.mobs.len());
        }
    }

    pub fn clear(&mut self) {
        self.players.clear();
        self.mobs.clear();
    }
}
