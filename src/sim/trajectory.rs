//! Aim preview
//!
//! Pure prediction of a launch path. It runs [`integrate_step`] with the
//! launching kind's profile, so the dotted line the player sees is the path
//! the bomb actually flies until it touches something.

use glam::Vec2;

use super::bomb::PhysicsProfile;
use super::physics::{Rect, integrate_step};
use crate::config::WorldConfig;

/// Default number of simulated steps for the preview
pub const PREVIEW_STEPS: usize = 240;

/// Predict positions for `steps` fixed steps.
///
/// The first point is `start`. Prediction stops early once a point leaves
/// `viewport`; that point is still included so the line reaches the edge.
pub fn predict(
    start: Vec2,
    velocity: Vec2,
    profile: &PhysicsProfile,
    world: &WorldConfig,
    viewport: &Rect,
    dt: f32,
    steps: usize,
) -> Vec<Vec2> {
    let mut points = Vec::with_capacity(steps + 1);
    let (mut pos, mut vel) = (start, velocity);
    points.push(pos);

    for _ in 0..steps {
        (pos, vel) = integrate_step(pos, vel, profile, world, dt);
        points.push(pos);
        if !viewport.contains(pos) {
            break;
        }
    }
    points
}

/// Every `stride`-th point plus the last one, for sparse dot rendering
pub fn sample_sparse(points: &[Vec2], stride: usize) -> Vec<Vec2> {
    let stride = stride.max(1);
    let mut sampled: Vec<Vec2> = points.iter().step_by(stride).copied().collect();
    if let Some(&last) = points.last() {
        if sampled.last() != Some(&last) {
            sampled.push(last);
        }
    }
    sampled
}
