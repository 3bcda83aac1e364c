//! Blast Reveal - slingshot bomb puzzle engine
//!
//! Core modules:
//! - `sim`: Fixed-step simulation (block grid, bombs, explosions, launch, collisions)
//! - `config`: Data-driven tuning tables loaded from JSON
//!
//! Rendering, audio and menus live outside this crate and observe the
//! simulation through [`sim::EffectsSink`].

pub mod config;
pub mod sim;

pub use config::{ConfigError, GameConfig};

use glam::Vec2;

/// Game configuration constants (defaults for [`GameConfig`])
pub mod consts {
    /// Fixed simulation timestep (120 Hz)
    pub const SIM_HZ: u32 = 120;
    pub const SIM_DT: f32 = 1.0 / SIM_HZ as f32;

    /// World rectangle (y grows downward)
    pub const WORLD_WIDTH: f32 = 1280.0;
    pub const WORLD_HEIGHT: f32 = 720.0;
    /// Extra margin around the world before a bomb counts as out of bounds
    pub const OUT_OF_BOUNDS_MARGIN: f32 = 200.0;
    /// Downward gravity (units/s²), scaled by density * GRAVITY_DENSITY_SCALE
    pub const GRAVITY: f32 = 980.0;
    pub const GRAVITY_DENSITY_SCALE: f32 = 1000.0;

    /// Block grid
    pub const BLOCK_SIZE: f32 = 40.0;
    pub const GRID_ORIGIN_X: f32 = 560.0;
    pub const GRID_ORIGIN_Y: f32 = 120.0;
    pub const STRONG_HEALTH: u32 = 2;

    /// Slingshot
    pub const BOMB_RADIUS: f32 = 15.0;
    pub const ANCHOR_X: f32 = 200.0;
    pub const ANCHOR_Y: f32 = 520.0;
    pub const SHOT_POWER: f32 = 7.0;
    pub const MIN_DRAG_DISTANCE: f32 = 20.0;
    pub const MAX_DRAG_DISTANCE: f32 = 200.0;
    pub const HIT_RADIUS_DESKTOP: f32 = 80.0;
    pub const HIT_RADIUS_TOUCH: f32 = 120.0;

    /// Explosion radii
    pub const BLAST_RADIUS: f32 = 150.0;
    pub const SHATTER_RADIUS: f32 = 250.0;
    pub const DYNAMITE_RADIUS: f32 = 100.0;
    pub const STICKY_TRIGGER_RADIUS: f32 = 440.0;
    pub const STICKY_RADIUS: f32 = 200.0;
    pub const CLUSTER_PRIMARY_RADIUS: f32 = 120.0;
    pub const CLUSTER_SECONDARY_RADIUS: f32 = 70.0;
    pub const PIERCER_LENGTH: f32 = 300.0;
    pub const PIERCER_STEP: f32 = 40.0;
    pub const PIERCER_RADIUS: f32 = 45.0;
    pub const DRILLER_FINISH_RADIUS: f32 = 100.0;

    /// Ricochet bounce band (units/s)
    pub const RICOCHET_MIN_SPEED: f32 = 1500.0;
    pub const RICOCHET_MAX_SPEED: f32 = 2400.0;
    pub const RICOCHET_SPEED_BOOST: f32 = 1.05;
    pub const RICOCHET_DEDUP_DISTANCE: f32 = 50.0;
    pub const RICOCHET_LIFETIME_SECS: f32 = 5.0;

    /// Gameplay defaults
    pub const TARGET_REVEAL_PERCENT: f32 = 70.0;
    pub const SHOTS_PER_LEVEL: u32 = 10;
    pub const DYNAMITE_PER_LEVEL: usize = 3;
    pub const MAX_CHAIN_DEPTH: u32 = 32;
}

/// Clamp a vector's length to `max`, keeping direction
#[inline]
pub fn clamp_length_max(v: Vec2, max: f32) -> Vec2 {
    let len = v.length();
    if len > max && len > 0.0 {
        v * (max / len)
    } else {
        v
    }
}

/// Convert seconds to whole simulation ticks (at least one)
#[inline]
pub fn secs_to_ticks(secs: f32) -> u64 {
    ((secs * consts::SIM_HZ as f32).round() as u64).max(1)
}

/// Convert milliseconds to whole simulation ticks (at least one)
#[inline]
pub fn millis_to_ticks(ms: u32) -> u64 {
    secs_to_ticks(ms as f32 / 1000.0)
}
