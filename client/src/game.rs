//! Client-side world: the predicted local player plus mirrors of the
//! server's players and mobs.

use crate::config::ClientConfig;
use log::{debug, warn};
use shared::mob::MobMirror;
use shared::{integrate, Body, InputState, Message, Mob, PlayerState, Vec2, PLAYER_SPAWN};
use std::collections::BTreeMap;

/// Other players as of the latest snapshot.
///
/// The wire carries no player ids, so entries are keyed by their position in
/// the snapshot. The server lists players in a stable order, which keeps a
/// slot bound to the same player for as long as nobody joins or leaves.
#[derive(Debug, Clone, Default)]
pub struct RemoteMirror {
    players: BTreeMap<usize, PlayerState>,
    next_slot: usize,
}

impl RemoteMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets every slot. Called on each `SnapshotBegin`, so players that
    /// left vanish on the next snapshot.
    pub fn begin_snapshot(&mut self) {
        self.players.clear();
        self.next_slot = 0;
    }

    /// Overwrites the entry for the next slot of the current snapshot.
    pub fn apply(&mut self, player: PlayerState) -> usize {
        let slot = self.next_slot;
        self.players.insert(slot, player);
        self.next_slot += 1;
        slot
    }

    pub fn get(&self, slot: usize) -> Option<&PlayerState> {
        self.players.get(&slot)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &PlayerState)> {
        self.players.iter().map(|(slot, player)| (*slot, player))
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn clear(&mut self) {
        self.begin_snapshot();
    }
}

/// Everything the client knows about the world: its own predicted player and
/// the mirrors of server state.
#[derive(Debug, Clone)]
pub struct ClientGameState {
    pub local: Body,
    pub remote: RemoteMirror,
    pub mobs: MobMirror,
    /// Tick of the latest snapshot, if any arrived yet
    pub last_tick: Option<u32>,
    proximity_threshold: f32,
    max_distance: f32,
    max_mobs: usize,
}

impl ClientGameState {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            local: Body::at(PLAYER_SPAWN),
            remote: RemoteMirror::new(),
            mobs: MobMirror::new(),
            last_tick: None,
            proximity_threshold: config.proximity_threshold,
            max_distance: config.max_distance,
            max_mobs: config.max_mobs,
        }
    }

    /// Folds one server message into the mirrors.
    ///
    /// `SnapshotBegin` resets the player mirror and records the tick.
    /// `PlayerUpdate` fills the next remote slot. `MobUpdate` is reconciled
    /// into the mob mirror by proximity, and one with an unknown mob type is
    /// logged and dropped. The reserved join/leave messages are ignored.
    ///
    /// Mob eviction is not done here; see [`ClientGameState::evict_mobs`].
    pub fn apply_message(&mut self, message: Message) {
        match message {
            Message::SnapshotBegin { tick } => {
                self.remote.begin_snapshot();
                self.last_tick = Some(tick);
            }
            Message::PlayerUpdate(update) => {
                self.remote.apply(PlayerState::from(update));
            }
            Message::MobUpdate(update) => match Mob::try_from(update) {
                Ok(mob) => {
                    self.mobs.reconcile(mob, self.proximity_threshold);
                }
                Err(e) => warn!("Dropping mob update: {}", e),
            },
            Message::PlayerJoin | Message::PlayerLeave => {
                debug!("Ignoring reserved message {:?}", message);
            }
        }
    }

    /// Integrates the local player and keeps it inside the world. The server
    /// never corrects this state.
    pub fn predict(&mut self, input: &InputState, dt: f32) {
        self.local.acceleration = input.acceleration();
        integrate(&mut self.local, dt);
        self.local.position = self.local.position.clamp_to_world();
    }

    /// Drops mirrored mobs that are too far from the local player, then the
    /// oldest ones over the cap. Returns how many were removed.
    pub fn evict_mobs(&mut self) -> usize {
        self.mobs
            .evict(self.local.position, self.max_distance, self.max_mobs)
    }

    /// Empties both mirrors after a disconnect. The local player keeps its
    /// position.
    pub fn clear_mirrors(&mut self) {
        self.remote.clear();
        self.mobs.clear();
        self.last_tick = None;
    }

    pub fn local_state(&self) -> PlayerState {
        PlayerState::from(&self.local)
    }

    pub fn local_position(&self) -> Vec2 {
        self.local.position
    }
}
