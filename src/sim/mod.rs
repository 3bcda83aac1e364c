//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (grid queries in row/col order, queue by tick then insertion)
//! - No rendering or platform dependencies

pub mod bomb;
pub mod collision;
pub mod events;
pub mod explosion;
pub mod grid;
pub mod launch;
pub mod layout;
pub mod physics;
pub mod schedule;
pub mod state;
pub mod tick;
pub mod trajectory;

pub use bomb::{Bomb, BombBehavior, BombKey, BombKind, BombState, PhysicsProfile};
pub use collision::ContactRoute;
pub use events::{EffectsSink, EventLog, GameEvent, SessionStats, SinkError};
pub use explosion::{
    BlockHit, ExplosionEvent, ExplosionOutcome, ExplosionRule, ExplosionShape, ExplosionSource,
};
pub use grid::{Block, BlockGrid, BlockKey, BlockKind, DamageResult, DestroyResult, Health};
pub use launch::{AimRejection, InputMode, LaunchController, ReleaseOutcome};
pub use layout::{GridCell, LayoutGenerator, MaskLayout, RectLayout};
pub use physics::{BodyId, RawContact, Rect, Side};
pub use schedule::{Deferred, EventQueue};
pub use state::{GameSession, LevelPhase};
pub use tick::{PointerEvent, TickInput, settle, tick};
pub use trajectory::{predict, sample_sparse};
