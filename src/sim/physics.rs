//! Built-in physics backend
//!
//! Integrates bombs with the same step the aim preview uses and reports
//! contacts as body pairs. Anything that can produce [`RawContact`]s (a
//! full rigid-body engine, a network peer) can drive the dispatcher instead.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::bomb::{BombKey, PhysicsProfile};
use super::grid::{Block, BlockGrid, BlockKey};
use crate::config::WorldConfig;

/// Axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Grow by `margin` on every side
    pub fn expand(&self, margin: f32) -> Self {
        Self {
            min: self.min - Vec2::splat(margin),
            max: self.max + Vec2::splat(margin),
        }
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

/// Solid sides of the world (the top is open)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
    Floor,
}

/// Anything that can take part in a contact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyId {
    Bomb(BombKey),
    Block(BlockKey),
    Boundary(Side),
}

/// Pairwise contact notification
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawContact {
    pub a: BodyId,
    pub b: BodyId,
    /// Contact point in world space
    pub point: Vec2,
    /// Unit normal pointing from `b` toward `a`
    pub normal: Vec2,
    /// Overlap depth along the normal
    pub penetration: f32,
}

impl RawContact {
    /// Same contact seen from the other body
    pub fn flipped(&self) -> Self {
        Self {
            a: self.b,
            b: self.a,
            normal: -self.normal,
            ..*self
        }
    }
}

/// Contact geometry between a circle and a surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactGeom {
    pub point: Vec2,
    /// Points away from the surface, toward the circle
    pub normal: Vec2,
    pub penetration: f32,
}

/// One integration step: air drag, density-scaled gravity, then position
#[inline]
pub fn integrate_step(
    pos: Vec2,
    vel: Vec2,
    profile: &PhysicsProfile,
    world: &WorldConfig,
    dt: f32,
) -> (Vec2, Vec2) {
    let mut v = vel * (1.0 - profile.air_friction * dt).max(0.0);
    v.y += world.gravity * dt * world.gravity_density_scale * profile.density;
    (pos + v * dt, v)
}

/// Reflect velocity off a surface: v' = v - 2(v·n)n
#[inline]
pub fn reflect_velocity(velocity: Vec2, normal: Vec2) -> Vec2 {
    velocity - 2.0 * velocity.dot(normal) * normal
}

/// Inelastic bounce with tangential friction; separating velocities pass through
pub fn bounce_velocity(velocity: Vec2, normal: Vec2, restitution: f32, friction: f32) -> Vec2 {
    let vn = velocity.dot(normal);
    if vn >= 0.0 {
        return velocity;
    }
    let normal_part = normal * vn;
    let tangent_part = velocity - normal_part;
    tangent_part * (1.0 - friction).clamp(0.0, 1.0) - normal_part * restitution
}

/// Circle vs block box
pub fn circle_block_contact(center: Vec2, radius: f32, block: &Block) -> Option<ContactGeom> {
    let (min, max) = (block.min(), block.max());
    let closest = center.clamp(min, max);
    let delta = center - closest;
    let dist = delta.length();

    if dist > radius {
        return None;
    }

    if dist > 1e-4 {
        return Some(ContactGeom {
            point: closest,
            normal: delta / dist,
            penetration: radius - dist,
        });
    }

    // Center inside the box - push out through the nearest face
    let faces = [
        (center.x - min.x, Vec2::NEG_X),
        (max.x - center.x, Vec2::X),
        (center.y - min.y, Vec2::NEG_Y),
        (max.y - center.y, Vec2::Y),
    ];
    let (depth, normal) = faces
        .into_iter()
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .unwrap_or((0.0, Vec2::NEG_Y));
    Some(ContactGeom {
        point: center - normal * depth,
        normal,
        penetration: radius + depth,
    })
}

/// Deepest active block overlapping a circle
pub fn find_block_contact(
    grid: &BlockGrid,
    center: Vec2,
    radius: f32,
) -> Option<(BlockKey, ContactGeom)> {
    let reach = Vec2::splat(radius);
    grid.keys_in_box(center - reach, center + reach)
        .into_iter()
        .filter_map(|key| {
            let block = grid.get(key)?;
            circle_block_contact(center, radius, block).map(|geom| (key, geom))
        })
        .fold(None, |best: Option<(BlockKey, ContactGeom)>, candidate| match best {
            Some(b) if b.1.penetration >= candidate.1.penetration => Some(b),
            _ => Some(candidate),
        })
}

/// Circle vs the solid world sides
pub fn boundary_contact(center: Vec2, radius: f32, bounds: &Rect) -> Option<(Side, ContactGeom)> {
    if center.y + radius > bounds.max.y {
        return Some((
            Side::Floor,
            ContactGeom {
                point: Vec2::new(center.x, bounds.max.y),
                normal: Vec2::NEG_Y,
                penetration: center.y + radius - bounds.max.y,
            },
        ));
    }
    if center.x - radius < bounds.min.x {
        return Some((
            Side::Left,
            ContactGeom {
                point: Vec2::new(bounds.min.x, center.y),
                normal: Vec2::X,
                penetration: bounds.min.x - (center.x - radius),
            },
        ));
    }
    if center.x + radius > bounds.max.x {
        return Some((
            Side::Right,
            ContactGeom {
                point: Vec2::new(bounds.max.x, center.y),
                normal: Vec2::NEG_X,
                penetration: center.x + radius - bounds.max.x,
            },
        ));
    }
    None
}

/// Contact for a bomb at `center`: blocks first, then world sides
pub fn detect_contact(
    bomb: BombKey,
    center: Vec2,
    radius: f32,
    grid: &BlockGrid,
    bounds: &Rect,
) -> Option<RawContact> {
    if let Some((key, geom)) = find_block_contact(grid, center, radius) {
        return Some(RawContact {
            a: BodyId::Bomb(bomb),
            b: BodyId::Block(key),
            point: geom.point,
            normal: geom.normal,
            penetration: geom.penetration,
        });
    }
    boundary_contact(center, radius, bounds).map(|(side, geom)| RawContact {
        a: BodyId::Bomb(bomb),
        b: BodyId::Boundary(side),
        point: geom.point,
        normal: geom.normal,
        penetration: geom.penetration,
    })
}
