//! Bomb entities and their per-kind state machines
//!
//! Every bomb runs the same lifecycle:
//! `AtRest -> Aiming -> Launched -> {Stuck | Exploding} -> Terminated`.
//! Kind-specific bookkeeping lives in [`BombBehavior`] so a bomb only carries
//! the fields its kind needs.

use glam::Vec2;
use serde::{Deserialize, Serialize};

slotmap::new_key_type! {
    /// Generational handle to a bomb in the session arena
    pub struct BombKey;
}

/// Bomb types the player can launch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BombKind {
    Blast,
    Piercer,
    Cluster,
    Sticky,
    Shatterer,
    Driller,
    Ricochet,
}

impl BombKind {
    /// Selection order
    pub const ALL: [BombKind; 7] = [
        BombKind::Blast,
        BombKind::Piercer,
        BombKind::Cluster,
        BombKind::Sticky,
        BombKind::Shatterer,
        BombKind::Driller,
        BombKind::Ricochet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BombKind::Blast => "Blast",
            BombKind::Piercer => "Piercer",
            BombKind::Cluster => "Cluster",
            BombKind::Sticky => "Sticky",
            BombKind::Shatterer => "Shatterer",
            BombKind::Driller => "Driller",
            BombKind::Ricochet => "Ricochet",
        }
    }

    /// Kinds with their own contact state machine (exempt from the stall rule)
    pub fn is_special(&self) -> bool {
        matches!(self, BombKind::Sticky | BombKind::Driller | BombKind::Ricochet)
    }
}

/// Per-kind rigid body constants shared by live physics and the aim preview
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicsProfile {
    pub restitution: f32,
    pub friction: f32,
    pub density: f32,
    /// Fraction of velocity lost per second
    pub air_friction: f32,
}

impl PhysicsProfile {
    /// Built-in constants for each kind
    pub fn default_for(kind: BombKind) -> Self {
        let (restitution, friction, density, air_friction) = match kind {
            BombKind::Blast => (0.4, 0.1, 0.001, 0.2),
            BombKind::Piercer => (0.1, 0.05, 0.0012, 0.1),
            BombKind::Cluster => (0.3, 0.1, 0.0011, 0.25),
            BombKind::Sticky => (0.0, 0.9, 0.001, 0.3),
            BombKind::Shatterer => (0.2, 0.1, 0.0015, 0.2),
            BombKind::Driller => (0.1, 0.05, 0.0013, 0.15),
            BombKind::Ricochet => (0.95, 0.0, 0.0008, 0.05),
        };
        Self {
            restitution,
            friction,
            density,
            air_friction,
        }
    }
}

/// Lifecycle state shared by every bomb kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BombState {
    /// Sitting in the slingshot
    AtRest,
    /// Being dragged by the player
    Aiming,
    /// In flight (or drilling / bouncing)
    Launched,
    /// Sticky bomb fixed to the world, waiting for a trigger
    Stuck,
    /// Explosion is being resolved
    Exploding,
    /// Gone; the handle is about to be released
    Terminated,
}

/// Ricochet bounce bookkeeping, initialised on the first block contact
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RicochetState {
    pub armed: bool,
    pub bounces: u32,
    pub last_bounce_tick: Option<u64>,
    pub last_bounce_pos: Option<Vec2>,
}

/// Driller tunnelling state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrillerState {
    /// Velocity cached at first contact; drilling direction and speed derive from it
    pub stored_velocity: Option<Vec2>,
    /// Distance travelled since drilling started
    pub drilled: f32,
    pub blocks_drilled: u32,
}

impl DrillerState {
    pub fn is_drilling(&self) -> bool {
        self.stored_velocity.is_some()
    }
}

/// Kind-specific substate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BombBehavior {
    Blast,
    Piercer,
    Cluster,
    Sticky,
    Shatterer,
    Driller(DrillerState),
    Ricochet(RicochetState),
}

impl BombBehavior {
    pub fn for_kind(kind: BombKind) -> Self {
        match kind {
            BombKind::Blast => BombBehavior::Blast,
            BombKind::Piercer => BombBehavior::Piercer,
            BombKind::Cluster => BombBehavior::Cluster,
            BombKind::Sticky => BombBehavior::Sticky,
            BombKind::Shatterer => BombBehavior::Shatterer,
            BombKind::Driller => BombBehavior::Driller(DrillerState::default()),
            BombKind::Ricochet => BombBehavior::Ricochet(RicochetState::default()),
        }
    }

    pub fn kind(&self) -> BombKind {
        match self {
            BombBehavior::Blast => BombKind::Blast,
            BombBehavior::Piercer => BombKind::Piercer,
            BombBehavior::Cluster => BombKind::Cluster,
            BombBehavior::Sticky => BombKind::Sticky,
            BombBehavior::Shatterer => BombKind::Shatterer,
            BombBehavior::Driller(_) => BombKind::Driller,
            BombBehavior::Ricochet(_) => BombKind::Ricochet,
        }
    }
}

/// Below this speed the cached velocity is not refreshed
const VELOCITY_CACHE_EPSILON: f32 = 1.0;

/// A bomb entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bomb {
    pub pos: Vec2,
    pub vel: Vec2,
    pub radius: f32,
    pub state: BombState,
    pub behavior: BombBehavior,
    pub profile: PhysicsProfile,
    /// Latched on the first block contact
    pub hit_block: bool,
    /// Latched by the first explosion; later explode calls are rejected
    pub exploded: bool,
    /// Tick the bomb was released on
    pub launched_at: Option<u64>,
    /// Consecutive ticks spent below the stall speed
    pub slow_ticks: u32,
    /// Last velocity with meaningful magnitude
    pub last_velocity: Vec2,
}

impl Bomb {
    pub fn new(kind: BombKind, pos: Vec2, radius: f32, profile: PhysicsProfile) -> Self {
        Self {
            pos,
            vel: Vec2::ZERO,
            radius,
            state: BombState::AtRest,
            behavior: BombBehavior::for_kind(kind),
            profile,
            hit_block: false,
            exploded: false,
            launched_at: None,
            slow_ticks: 0,
            last_velocity: Vec2::ZERO,
        }
    }

    pub fn kind(&self) -> BombKind {
        self.behavior.kind()
    }

    /// Launched bombs are the only ones physics moves
    pub fn is_in_flight(&self) -> bool {
        self.state == BombState::Launched
    }

    /// Swap the kind of a bomb still sitting in the slingshot
    pub fn retype(&mut self, kind: BombKind, profile: PhysicsProfile) -> bool {
        if self.state != BombState::AtRest {
            return false;
        }
        self.behavior = BombBehavior::for_kind(kind);
        self.profile = profile;
        true
    }

    pub fn begin_aim(&mut self) -> bool {
        if self.state != BombState::AtRest {
            return false;
        }
        self.state = BombState::Aiming;
        true
    }

    /// Return an aiming bomb to the slingshot
    pub fn cancel_aim(&mut self, anchor: Vec2) {
        if self.state == BombState::Aiming {
            self.state = BombState::AtRest;
            self.pos = anchor;
            self.vel = Vec2::ZERO;
        }
    }

    /// Release with an initial velocity
    pub fn launch(&mut self, velocity: Vec2, tick: u64) -> bool {
        if !matches!(self.state, BombState::AtRest | BombState::Aiming) {
            return false;
        }
        self.state = BombState::Launched;
        self.vel = velocity;
        self.launched_at = Some(tick);
        self.record_velocity();
        true
    }

    /// Cache velocity while it is still meaningful
    pub fn record_velocity(&mut self) {
        if self.vel.length() > VELOCITY_CACHE_EPSILON {
            self.last_velocity = self.vel;
        }
    }

    /// Current velocity, or the last meaningful one if the bomb has slowed down
    pub fn effective_velocity(&self) -> Vec2 {
        if self.vel.length() > VELOCITY_CACHE_EPSILON {
            self.vel
        } else {
            self.last_velocity
        }
    }

    /// Fix a sticky bomb at a contact point
    pub fn stick(&mut self, point: Vec2) -> bool {
        if self.kind() != BombKind::Sticky || self.state != BombState::Launched {
            return false;
        }
        self.state = BombState::Stuck;
        self.pos = point;
        self.vel = Vec2::ZERO;
        true
    }

    /// Latch the explosion; returns false if the bomb already exploded
    pub fn mark_exploded(&mut self) -> bool {
        if self.exploded || self.state == BombState::Terminated {
            return false;
        }
        self.exploded = true;
        self.state = BombState::Exploding;
        true
    }

    pub fn terminate(&mut self) {
        self.state = BombState::Terminated;
        self.vel = Vec2::ZERO;
    }

    /// Ticks since release
    pub fn active_ticks(&self, now: u64) -> u64 {
        self.launched_at.map(|t| now.saturating_sub(t)).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bomb(kind: BombKind) -> Bomb {
        Bomb::new(kind, Vec2::new(10.0, 10.0), 15.0, PhysicsProfile::default_for(kind))
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut b = bomb(BombKind::Blast);
        assert_eq!(b.state, BombState::AtRest);
        assert!(b.begin_aim());
        assert!(!b.begin_aim());
        assert!(b.launch(Vec2::new(100.0, -50.0), 3));
        assert!(b.is_in_flight());
        assert_eq!(b.active_ticks(10), 7);
        assert!(!b.launch(Vec2::ZERO, 4));
        assert!(b.mark_exploded());
        assert!(!b.mark_exploded());
        b.terminate();
        assert!(!b.mark_exploded());
    }

    #[test]
    fn test_cancel_aim_returns_to_anchor() {
        let mut b = bomb(BombKind::Blast);
        b.begin_aim();
        b.pos = Vec2::new(50.0, 50.0);
        b.cancel_aim(Vec2::new(1.0, 2.0));
        assert_eq!(b.state, BombState::AtRest);
        assert_eq!(b.pos, Vec2::new(1.0, 2.0));
    }

    #[test]
    fn test_only_sticky_sticks() {
        let mut blast = bomb(BombKind::Blast);
        blast.launch(Vec2::X, 0);
        assert!(!blast.stick(Vec2::ZERO));

        let mut sticky = bomb(BombKind::Sticky);
        sticky.launch(Vec2::new(300.0, 0.0), 0);
        assert!(sticky.stick(Vec2::new(5.0, 6.0)));
        assert_eq!(sticky.state, BombState::Stuck);
        assert_eq!(sticky.vel, Vec2::ZERO);
    }

    #[test]
    fn test_effective_velocity_uses_cache_when_slow() {
        let mut b = bomb(BombKind::Driller);
        b.launch(Vec2::new(400.0, 0.0), 0);
        b.vel = Vec2::new(0.1, 0.0);
        b.record_velocity();
        assert_eq!(b.effective_velocity(), Vec2::new(400.0, 0.0));
    }

    #[test]
    fn test_retype_only_at_rest() {
        let mut b = bomb(BombKind::Blast);
        assert!(b.retype(BombKind::Ricochet, PhysicsProfile::default_for(BombKind::Ricochet)));
        assert!(matches!(b.behavior, BombBehavior::Ricochet(_)));
        b.launch(Vec2::X * 10.0, 0);
        assert!(!b.retype(BombKind::Blast, PhysicsProfile::default_for(BombKind::Blast)));
    }
}
