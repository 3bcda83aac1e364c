//! Game configuration and tuning tables
//!
//! Every number the simulation uses lives here so levels can be rebalanced
//! from a JSON file without touching the algorithms. Defaults come from
//! [`crate::consts`].

use std::collections::BTreeMap;
use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::sim::bomb::{BombKind, PhysicsProfile};
use crate::sim::physics::Rect;

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is outside its allowed range
    #[error("Invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// World geometry and gravity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub width: f32,
    pub height: f32,
    /// Margin added on every side before a bomb is out of bounds
    pub out_of_bounds_margin: f32,
    pub gravity: f32,
    pub gravity_density_scale: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: WORLD_WIDTH,
            height: WORLD_HEIGHT,
            out_of_bounds_margin: OUT_OF_BOUNDS_MARGIN,
            gravity: GRAVITY,
            gravity_density_scale: GRAVITY_DENSITY_SCALE,
        }
    }
}

impl WorldConfig {
    /// The solid world rectangle
    pub fn bounds(&self) -> Rect {
        Rect::new(Vec2::ZERO, Vec2::new(self.width, self.height))
    }

    /// World rectangle grown by the out-of-bounds margin
    pub fn expanded_bounds(&self) -> Rect {
        self.bounds().expand(self.out_of_bounds_margin)
    }
}

/// Block-type assignment weights for level population
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeWeights {
    /// Exact number of Dynamite cells reserved before rolling the rest
    pub dynamite_count: usize,
    pub strong_percent: u32,
    pub eternal_percent: u32,
    pub bouncy_percent: u32,
}

impl Default for TypeWeights {
    fn default() -> Self {
        Self {
            dynamite_count: DYNAMITE_PER_LEVEL,
            strong_percent: 10,
            eternal_percent: 5,
            bouncy_percent: 5,
        }
    }
}

/// Block grid geometry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub block_size: f32,
    /// World position of the top-left corner of cell (0, 0)
    pub origin: Vec2,
    pub strong_health: u32,
    pub weights: TypeWeights,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            block_size: BLOCK_SIZE,
            origin: Vec2::new(GRID_ORIGIN_X, GRID_ORIGIN_Y),
            strong_health: STRONG_HEALTH,
            weights: TypeWeights::default(),
        }
    }
}

/// Slingshot tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchConfig {
    /// Slingshot rest position
    pub anchor: Vec2,
    pub bomb_radius: f32,
    pub shot_power: f32,
    /// Releases closer than this to the anchor cancel the shot
    pub min_drag: f32,
    pub max_drag: f32,
    pub hit_radius_desktop: f32,
    pub hit_radius_touch: f32,
    /// Delay before the next bomb appears after the previous one is gone
    pub respawn_delay_secs: f32,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            anchor: Vec2::new(ANCHOR_X, ANCHOR_Y),
            bomb_radius: BOMB_RADIUS,
            shot_power: SHOT_POWER,
            min_drag: MIN_DRAG_DISTANCE,
            max_drag: MAX_DRAG_DISTANCE,
            hit_radius_desktop: HIT_RADIUS_DESKTOP,
            hit_radius_touch: HIT_RADIUS_TOUCH,
            respawn_delay_secs: 0.5,
        }
    }
}

/// Explosion radii, chain delays and multi-explosion patterns
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplosionConfig {
    pub blast_radius: f32,
    pub shatter_radius: f32,
    pub dynamite_radius: f32,
    pub dynamite_delay_min_ms: u32,
    pub dynamite_delay_max_ms: u32,
    /// Stuck stickies within this distance of any explosion are triggered
    pub sticky_trigger_radius: f32,
    pub sticky_radius: f32,
    pub sticky_chain_delay_ms: u32,
    pub cluster_primary_radius: f32,
    pub cluster_secondary_radius: f32,
    pub cluster_min_count: u32,
    pub cluster_max_count: u32,
    pub cluster_min_offset: f32,
    pub cluster_max_offset: f32,
    /// Secondary delay grows with distance from the primary
    pub cluster_delay_ms_per_unit: f32,
    pub piercer_length: f32,
    pub piercer_step: f32,
    pub piercer_radius: f32,
    pub piercer_step_delay_ms: u32,
    pub max_chain_depth: u32,
}

impl Default for ExplosionConfig {
    fn default() -> Self {
        Self {
            blast_radius: BLAST_RADIUS,
            shatter_radius: SHATTER_RADIUS,
            dynamite_radius: DYNAMITE_RADIUS,
            dynamite_delay_min_ms: 100,
            dynamite_delay_max_ms: 300,
            sticky_trigger_radius: STICKY_TRIGGER_RADIUS,
            sticky_radius: STICKY_RADIUS,
            sticky_chain_delay_ms: 50,
            cluster_primary_radius: CLUSTER_PRIMARY_RADIUS,
            cluster_secondary_radius: CLUSTER_SECONDARY_RADIUS,
            cluster_min_count: 3,
            cluster_max_count: 5,
            cluster_min_offset: 60.0,
            cluster_max_offset: 160.0,
            cluster_delay_ms_per_unit: 2.0,
            piercer_length: PIERCER_LENGTH,
            piercer_step: PIERCER_STEP,
            piercer_radius: PIERCER_RADIUS,
            piercer_step_delay_ms: 20,
            max_chain_depth: MAX_CHAIN_DEPTH,
        }
    }
}

/// Ricochet bounce bookkeeping
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RicochetConfig {
    pub min_speed: f32,
    pub max_speed: f32,
    pub speed_boost: f32,
    /// Restitution multiplier is drawn from 1 ± jitter
    pub restitution_jitter: f32,
    pub dedup_distance: f32,
    pub min_bounce_interval_ms: u32,
    pub lifetime_secs: f32,
    pub max_bounces: u32,
    pub explosion_radius: f32,
}

impl Default for RicochetConfig {
    fn default() -> Self {
        Self {
            min_speed: RICOCHET_MIN_SPEED,
            max_speed: RICOCHET_MAX_SPEED,
            speed_boost: RICOCHET_SPEED_BOOST,
            restitution_jitter: 0.1,
            dedup_distance: RICOCHET_DEDUP_DISTANCE,
            min_bounce_interval_ms: 50,
            lifetime_secs: RICOCHET_LIFETIME_SECS,
            max_bounces: 10,
            explosion_radius: BLAST_RADIUS,
        }
    }
}

/// Driller tunnelling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DrillerConfig {
    pub drill_length: f32,
    pub min_speed: f32,
    pub max_speed: f32,
    pub finish_radius: f32,
}

impl Default for DrillerConfig {
    fn default() -> Self {
        Self {
            drill_length: 320.0,
            min_speed: 300.0,
            max_speed: 900.0,
            finish_radius: DRILLER_FINISH_RADIUS,
        }
    }
}

/// Stalled-bomb policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StallConfig {
    pub speed_threshold: f32,
    /// Bomb must have been in flight this long before it can stall
    pub min_active_secs: f32,
    /// Consecutive slow time before the bomb is force-exploded
    pub stall_secs: f32,
}

impl Default for StallConfig {
    fn default() -> Self {
        Self {
            speed_threshold: 20.0,
            min_active_secs: 1.0,
            stall_secs: 0.5,
        }
    }
}

/// Complete game configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Level is won once this share of blocks is destroyed (0-100)
    pub target_reveal_percent: f32,
    pub shots_per_level: u32,
    /// Starting stock per bomb kind; kinds not listed start at zero
    pub bomb_counts: BTreeMap<BombKind, u32>,
    /// Physics overrides; kinds not listed use [`PhysicsProfile::default_for`]
    pub physics: BTreeMap<BombKind, PhysicsProfile>,
    pub world: WorldConfig,
    pub grid: GridConfig,
    pub launch: LaunchConfig,
    pub explosions: ExplosionConfig,
    pub ricochet: RicochetConfig,
    pub driller: DrillerConfig,
    pub stall: StallConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        let bomb_counts = BombKind::ALL
            .iter()
            .map(|&kind| {
                let count = match kind {
                    BombKind::Blast => SHOTS_PER_LEVEL,
                    _ => 2,
                };
                (kind, count)
            })
            .collect();

        Self {
            target_reveal_percent: TARGET_REVEAL_PERCENT,
            shots_per_level: SHOTS_PER_LEVEL,
            bomb_counts,
            physics: BTreeMap::new(),
            world: WorldConfig::default(),
            grid: GridConfig::default(),
            launch: LaunchConfig::default(),
            explosions: ExplosionConfig::default(),
            ricochet: RicochetConfig::default(),
            driller: DrillerConfig::default(),
            stall: StallConfig::default(),
        }
    }
}

impl GameConfig {
    /// Physics profile for a bomb kind (override or built-in default)
    pub fn profile(&self, kind: BombKind) -> PhysicsProfile {
        self.physics
            .get(&kind)
            .copied()
            .unwrap_or_else(|| PhysicsProfile::default_for(kind))
    }

    /// Starting stock for a bomb kind
    pub fn starting_count(&self, kind: BombKind) -> u32 {
        self.bomb_counts.get(&kind).copied().unwrap_or(0)
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&contents)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Pretty JSON representation
    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Save config as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }

    /// Reject values the simulation cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.target_reveal_percent > 0.0 && self.target_reveal_percent <= 100.0) {
            return Err(invalid(
                "target_reveal_percent",
                format!("{} not in (0, 100]", self.target_reveal_percent),
            ));
        }
        if self.shots_per_level == 0 {
            return Err(invalid("shots_per_level", "must be at least 1"));
        }
        if self.world.width <= 0.0 || self.world.height <= 0.0 {
            return Err(invalid("world", "width and height must be positive"));
        }
        if self.grid.block_size <= 0.0 {
            return Err(invalid("grid.block_size", "must be positive"));
        }
        if self.grid.strong_health == 0 {
            return Err(invalid("grid.strong_health", "must be at least 1"));
        }
        let w = &self.grid.weights;
        if w.strong_percent + w.eternal_percent + w.bouncy_percent > 100 {
            return Err(invalid("grid.weights", "percentages sum above 100"));
        }
        let l = &self.launch;
        if l.min_drag < 0.0 || l.max_drag <= l.min_drag {
            return Err(invalid("launch", "need 0 <= min_drag < max_drag"));
        }
        if l.shot_power <= 0.0 || l.bomb_radius <= 0.0 {
            return Err(invalid("launch", "shot_power and bomb_radius must be positive"));
        }
        let e = &self.explosions;
        let radii = [
            e.blast_radius,
            e.shatter_radius,
            e.dynamite_radius,
            e.sticky_radius,
            e.cluster_primary_radius,
            e.cluster_secondary_radius,
            e.piercer_radius,
            self.ricochet.explosion_radius,
            self.driller.finish_radius,
        ];
        if radii.iter().any(|&r| r <= 0.0) {
            return Err(invalid("explosions", "all radii must be positive"));
        }
        if e.piercer_step <= 0.0 {
            return Err(invalid("explosions.piercer_step", "must be positive"));
        }
        if e.dynamite_delay_min_ms > e.dynamite_delay_max_ms {
            return Err(invalid("explosions.dynamite_delay", "min above max"));
        }
        if e.cluster_min_count > e.cluster_max_count {
            return Err(invalid("explosions.cluster_count", "min above max"));
        }
        if e.cluster_min_offset > e.cluster_max_offset {
            return Err(invalid("explosions.cluster_offset", "min above max"));
        }
        let r = &self.ricochet;
        if r.min_speed <= 0.0 || r.max_speed < r.min_speed {
            return Err(invalid("ricochet", "need 0 < min_speed <= max_speed"));
        }
        if !(0.0..1.0).contains(&r.restitution_jitter) {
            return Err(invalid(
                "ricochet.restitution_jitter",
                format!("{} not in [0, 1)", r.restitution_jitter),
            ));
        }
        if r.speed_boost <= 0.0 || r.speed_boost.is_nan() {
            return Err(invalid("ricochet.speed_boost", "must be positive"));
        }
        if r.dedup_distance < 0.0 || r.lifetime_secs <= 0.0 {
            return Err(invalid("ricochet", "need dedup_distance >= 0 and lifetime_secs > 0"));
        }
        let d = &self.driller;
        if d.min_speed <= 0.0 || d.max_speed < d.min_speed {
            return Err(invalid("driller", "need 0 < min_speed <= max_speed"));
        }
        if d.drill_length < 0.0 {
            return Err(invalid("driller.drill_length", "must not be negative"));
        }
        let s = &self.stall;
        if s.speed_threshold < 0.0 || s.min_active_secs < 0.0 || s.stall_secs < 0.0 {
            return Err(invalid("stall", "thresholds must not be negative"));
        }
        if self.world.out_of_bounds_margin < 0.0 || self.launch.respawn_delay_secs < 0.0 {
            return Err(invalid("world", "margin and respawn delay must not be negative"));
        }
        for (kind, profile) in &self.physics {
            if profile.density <= 0.0
                || profile.air_friction < 0.0
                || profile.restitution < 0.0
                || profile.friction < 0.0
            {
                log::warn!("Rejected physics profile for {:?}: {:?}", kind, profile);
                return Err(invalid("physics", format!("bad constants for {kind:?}")));
            }
        }
        Ok(())
    }
}
