//! Mob behavior, the server's mob table and the client's mob mirror.
//!
//! Mobs carry no identity on the wire. The server table and every client
//! mirror cap themselves independently, so their sizes and membership are
//! only eventually similar, never guaranteed equal.
//!
//! Behavior is data: each [`MobKind`] indexes a row of a static table that
//! holds its spawn health, spawn speed and per-tick update function. Adding a
//! kind means adding a variant, a wire id and a table row.

use crate::error::ProtocolError;
use crate::physics::Vec2;
use crate::protocol::MobUpdate;
use crate::{WORLD_HEIGHT, WORLD_WIDTH};
use rand::Rng;

/// Vertical speed of a sinking bubble, in world units per second.
pub const BUBBLE_SINK_SPEED: f32 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MobKind {
    Ladybug,
    Bubble,
}

/// Per-kind behavior, looked up through [`MobKind::behavior`].
#[derive(Debug)]
pub struct MobBehavior {
    pub health: i32,
    /// Spawn velocity is sampled from `[-speed, speed]` on each axis.
    pub speed: f32,
    pub update: fn(&mut Mob, f32),
}

static BEHAVIORS: [MobBehavior; 2] = [
    // Ladybug
    MobBehavior {
        health: 100,
        speed: 50.0,
        update: drift_and_bounce,
    },
    // Bubble
    MobBehavior {
        health: 10,
        speed: 20.0,
        update: sink,
    },
];

impl MobKind {
    pub const DEFAULT: MobKind = MobKind::Ladybug;
    pub const ALL: [MobKind; 2] = [MobKind::Ladybug, MobKind::Bubble];

    /// The `mob_type` value this kind travels as. Also the row of its
    /// behavior in the table.
    pub fn wire_id(self) -> i32 {
        match self {
            MobKind::Ladybug => 0,
            MobKind::Bubble => 1,
        }
    }

    /// Inverse of [`MobKind::wire_id`]. Unknown ids yield `None` so the
    /// caller can drop the update instead of guessing a kind.
    pub fn from_wire(id: i32) -> Option<MobKind> {
        MobKind::ALL.into_iter().find(|kind| kind.wire_id() == id)
    }

    pub fn behavior(self) -> &'static MobBehavior {
        &BEHAVIORS[self.wire_id() as usize]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mob {
    pub position: Vec2,
    pub velocity: Vec2,
    pub kind: MobKind,
    pub health: i32,
}

impl Mob {
    /// Spawns a mob at a uniformly random point inside the world.
    ///
    /// Each velocity component is drawn independently from
    /// `[-speed, speed]` using the kind's behavior row, and health starts at
    /// the kind's spawn health. The caller owns the RNG so a seeded server
    /// produces the same mobs on every run.
    pub fn spawn<R: Rng>(kind: MobKind, rng: &mut R) -> Mob {
        let behavior = kind.behavior();
        let speed = behavior.speed;

        Mob {
            position: Vec2::new(
                rng.gen_range(0.0..WORLD_WIDTH),
                rng.gen_range(0.0..WORLD_HEIGHT),
            ),
            velocity: Vec2::new(
                rng.gen_range(-speed..=speed),
                rng.gen_range(-speed..=speed),
            ),
            kind,
            health: behavior.health,
        }
    }

    /// Runs the kind's update function for one step of `dt` seconds.
    pub fn tick(&mut self, dt: f32) {
        (self.kind.behavior().update)(self, dt);
    }

    pub fn to_update(&self) -> MobUpdate {
        MobUpdate {
            x: self.position.x,
            y: self.position.y,
            vx: self.velocity.x,
            vy: self.velocity.y,
            mob_type: self.kind.wire_id(),
            health: self.health,
        }
    }
}

impl TryFrom<MobUpdate> for Mob {
    type Error = ProtocolError;

    fn try_from(update: MobUpdate) -> Result<Self, Self::Error> {
        let kind = MobKind::from_wire(update.mob_type)
            .ok_or(ProtocolError::UnknownMobType(update.mob_type))?;

        Ok(Mob {
            position: Vec2::new(update.x, update.y),
            velocity: Vec2::new(update.vx, update.vy),
            kind,
            health: update.health,
        })
    }
}

/// Constant-velocity drift with elastic reflection off the world edges.
///
/// The position is not clamped, so a fast mob may sit outside the world for
/// a tick. Only a component still heading outward is flipped, which keeps an
/// overshooting mob from flipping back and forth while it re-enters.
pub fn drift_and_bounce(mob: &mut Mob, dt: f32) {
    mob.position = mob.position.add(mob.velocity.scale(dt));

    let Vec2 { x, y } = mob.position;
    if (x < 0.0 && mob.velocity.x < 0.0) || (x > WORLD_WIDTH && mob.velocity.x > 0.0) {
        mob.velocity.x = -mob.velocity.x;
    }
    if (y < 0.0 && mob.velocity.y < 0.0) || (y > WORLD_HEIGHT && mob.velocity.y > 0.0) {
        mob.velocity.y = -mob.velocity.y;
    }
}

/// Sinks at [`BUBBLE_SINK_SPEED`] while drifting sideways.
///
/// The horizontal component bounces like [`drift_and_bounce`]. Whatever
/// vertical velocity the bubble spawned with is replaced on its first tick.
/// A bubble that reaches the bottom edge rests there with no vertical speed.
pub fn sink(mob: &mut Mob, dt: f32) {
    mob.velocity.y = BUBBLE_SINK_SPEED;
    mob.position = mob.position.add(mob.velocity.scale(dt));

    let x = mob.position.x;
    if (x < 0.0 && mob.velocity.x < 0.0) || (x > WORLD_WIDTH && mob.velocity.x > 0.0) {
        mob.velocity.x = -mob.velocity.x;
    }
    if mob.position.y >= WORLD_HEIGHT {
        mob.position.y = WORLD_HEIGHT;
        mob.velocity.y = 0.0;
    }
}

/// The server's canonical mobs in insertion order, oldest first.
///
/// The table enforces a hard cap on every insertion and after every tick by
/// dropping its oldest entries. Respawning is gated separately by a soft cap
/// so the population normally settles well below the hard one.
#[derive(Debug, Clone)]
pub struct MobTable {
    mobs: Vec<Mob>,
    max_mobs: usize,
}

impl MobTable {
    pub fn new(max_mobs: usize) -> Self {
        Self {
            mobs: Vec::new(),
            max_mobs,
        }
    }

    /// Appends `mob`, evicting the oldest entries if the cap is exceeded.
    pub fn spawn(&mut self, mob: Mob) {
        self.mobs.push(mob);
        self.evict_oldest();
    }

    pub fn spawn_random<R: Rng>(&mut self, kind: MobKind, rng: &mut R) {
        self.spawn(Mob::spawn(kind, rng));
    }

    /// Advances every mob one tick, then re-applies the cap.
    pub fn tick(&mut self, dt: f32) {
        for mob in &mut self.mobs {
            mob.tick(dt);
        }
        self.evict_oldest();
    }

    /// Spawns one mob of a random kind with probability `chance`, but only
    /// while the table holds fewer than `soft_cap` mobs.
    ///
    /// `chance` is clamped to `[0, 1]`. Returns whether a mob was added.
    pub fn maybe_respawn<R: Rng>(
        &mut self,
        rng: &mut R,
        chance: f64,
        soft_cap: usize,
    ) -> bool {
        if self.mobs.len() >= soft_cap || !rng.gen_bool(chance.clamp(0.0, 1.0)) {
            return false;
        }
        let kind = MobKind::ALL[rng.gen_range(0..MobKind::ALL.len())];
        self.spawn_random(kind, rng);
        true
    }

    /// Drops the oldest mobs until the cap holds. Returns how many were removed.
    pub fn evict_oldest(&mut self) -> usize {
        let excess = self.mobs.len().saturating_sub(self.max_mobs);
        self.mobs.drain(..excess);
        excess
    }

    pub fn as_slice(&self) -> &[Mob] {
        &self.mobs
    }

    pub fn len(&self) -> usize {
        self.mobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mobs.is_empty()
    }

    pub fn clear(&mut self) {
        self.mobs.clear();
    }
}

/// What [`MobMirror::reconcile`] did with an incoming snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// Overwrote the entry at this index.
    Updated(usize),
    Appended,
}

/// A client's non-authoritative copy of the server mobs, oldest-received first.
#[derive(Debug, Clone, Default)]
pub struct MobMirror {
    mobs: Vec<Mob>,
}

impl MobMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds an incoming mob snapshot to the first entry within `threshold`
    /// of its position, or appends it.
    ///
    /// A bound entry is overwritten wholesale, kind and health included,
    /// since the server is authoritative for every field.
    ///
    /// First match wins, not the nearest: two mobs passing within the
    /// threshold of each other can swap entries. There is no identifier on
    /// the wire to do better.
    pub fn reconcile(&mut self, incoming: Mob, threshold: f32) -> Reconciled {
        let matched = self
            .mobs
            .iter()
            .position(|mob| mob.position.distance(incoming.position) <= threshold);

        match matched {
            Some(index) => {
                self.mobs[index] = incoming;
                Reconciled::Updated(index)
            }
            None => {
                self.mobs.push(incoming);
                Reconciled::Appended
            }
        }
    }

    /// Drops mobs farther than `max_distance` from `player`, then the oldest
    /// entries until at most `max_mobs` remain. Returns how many were removed.
    pub fn evict(&mut self, player: Vec2, max_distance: f32, max_mobs: usize) -> usize {
        let before = self.mobs.len();
        self.mobs.retain(|mob| mob.position.distance(player) <= max_distance);

        let excess = self.mobs.len().saturating_sub(max_mobs);
        self.mobs.drain(..excess);

        before - self.mobs.len()
    }

    pub fn as_slice(&self) -> &[Mob] {
        &self.mobs
    }

    pub fn len(&self) -> usize {
        self.mobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mobs.is_empty()
    }

    pub fn clear(&mut self) {
        self.mobs.clear();
    }
}
