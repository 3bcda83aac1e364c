//! Slingshot aiming and release
//!
//! The launcher owns the single slingshot slot. A drag starts near the bomb
//! at rest, the force is proportional to how far the bomb is pulled back from
//! the anchor, and releases shorter than the minimum drag put the bomb back.

use glam::Vec2;

use super::bomb::{BombKey, BombState};
use super::events::GameEvent;
use super::state::{GameSession, LevelPhase};
use super::trajectory::{PREVIEW_STEPS, predict};
use crate::clamp_length_max;
use crate::consts::SIM_DT;

/// Pointer device; only the grab radius differs between them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Desktop,
    Touch,
}

/// Why a drag could not start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AimRejection {
    /// Level finished
    LevelOver,
    /// Slingshot empty (waiting for respawn or out of shots)
    NoBombReady,
    /// The slingshot bomb is already flying or being aimed
    BombBusy,
    /// Pointer too far from the bomb
    TooFar,
}

/// What a pointer release did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Launched,
    /// Drag shorter than the minimum; bomb back at the anchor, no shot used
    TooShort,
    /// No drag in progress
    NotAiming,
}

/// Slingshot slot and drag state
#[derive(Debug, Clone)]
pub struct LaunchController {
    /// Rest position
    pub anchor: Vec2,
    /// Bomb owned by the slingshot (at rest, aiming or in flight)
    pub active: Option<BombKey>,
    pub input_mode: InputMode,
    /// Clamped pull-back offset from the anchor while aiming
    drag: Option<Vec2>,
}

impl LaunchController {
    pub fn new(anchor: Vec2) -> Self {
        Self {
            anchor,
            active: None,
            input_mode: InputMode::default(),
            drag: None,
        }
    }

    pub fn reset(&mut self) {
        self.active = None;
        self.drag = None;
    }

    pub fn is_aiming(&self) -> bool {
        self.drag.is_some()
    }

    pub(crate) fn clear_drag(&mut self) {
        self.drag = None;
    }
}

impl GameSession {
    fn hit_radius(&self) -> f32 {
        match self.launcher.input_mode {
            InputMode::Desktop => self.config.launch.hit_radius_desktop,
            InputMode::Touch => self.config.launch.hit_radius_touch,
        }
    }

    /// Pull-back offset for a pointer position, clamped to the max drag
    fn drag_offset(&self, pointer: Vec2) -> Vec2 {
        clamp_length_max(pointer - self.launcher.anchor, self.config.launch.max_drag)
    }

    /// Launch velocity for a pull-back offset
    fn launch_force(&self, drag: Vec2) -> Vec2 {
        -drag * self.config.launch.shot_power
    }

    /// Start dragging the bomb at rest
    pub fn begin_aim(&mut self, pointer: Vec2) -> Result<(), AimRejection> {
        if self.phase != LevelPhase::Playing {
            return Err(AimRejection::LevelOver);
        }
        let hit_radius = self.hit_radius();
        let key = self.launcher.active.ok_or(AimRejection::NoBombReady)?;
        let bomb = self.bombs.get_mut(key).ok_or(AimRejection::NoBombReady)?;
        if bomb.state != BombState::AtRest {
            return Err(AimRejection::BombBusy);
        }
        if pointer.distance(bomb.pos) > hit_radius {
            return Err(AimRejection::TooFar);
        }
        bomb.begin_aim();
        self.launcher.drag = Some(Vec2::ZERO);
        self.update_aim(pointer);
        Ok(())
    }

    /// Follow the pointer; returns the force a release here would apply
    pub fn update_aim(&mut self, pointer: Vec2) -> Option<Vec2> {
        let key = self.launcher.active?;
        self.launcher.drag?;
        let drag = self.drag_offset(pointer);
        let anchor = self.launcher.anchor;
        let bomb = self.bombs.get_mut(key)?;
        if bomb.state != BombState::Aiming {
            return None;
        }
        bomb.pos = anchor + drag;
        self.launcher.drag = Some(drag);
        Some(self.launch_force(drag))
    }

    /// Let go of the drag at `pointer`
    pub fn release(&mut self, pointer: Vec2) -> ReleaseOutcome {
        let Some(key) = self.launcher.active else {
            return ReleaseOutcome::NotAiming;
        };
        if self.launcher.drag.take().is_none() {
            return ReleaseOutcome::NotAiming;
        }
        let drag = self.drag_offset(pointer);
        let anchor = self.launcher.anchor;
        let force = self.launch_force(drag);
        let now = self.time_ticks;

        let Some(bomb) = self.bombs.get_mut(key) else {
            return ReleaseOutcome::NotAiming;
        };
        if drag.length() < self.config.launch.min_drag {
            log::debug!("Release at {:.1} units is below the minimum drag", drag.length());
            bomb.cancel_aim(anchor);
            return ReleaseOutcome::TooShort;
        }

        bomb.pos = anchor + drag;
        if !bomb.launch(force, now) {
            return ReleaseOutcome::NotAiming;
        }
        let kind = bomb.kind();
        self.shots_remaining = self.shots_remaining.saturating_sub(1);
        if let Some(stock) = self.inventory.get_mut(&kind) {
            *stock = stock.saturating_sub(1);
        }

        log::debug!(
            "Launched {} with velocity ({:.0}, {:.0}), {} shots left",
            kind.as_str(),
            force.x,
            force.y,
            self.shots_remaining
        );
        self.notifier.emit(GameEvent::BombLaunched { kind, velocity: force });
        self.notifier.emit(GameEvent::ShotsRemaining {
            shots: self.shots_remaining,
        });
        ReleaseOutcome::Launched
    }

    /// Abort a drag without firing
    pub fn cancel_aim(&mut self) {
        self.launcher.drag = None;
        let anchor = self.launcher.anchor;
        if let Some(bomb) = self.launcher.active.and_then(|key| self.bombs.get_mut(key)) {
            bomb.cancel_aim(anchor);
        }
    }

    /// Predicted path for the current drag (empty when not aiming)
    pub fn aim_preview(&self) -> Vec<Vec2> {
        let (Some(drag), Some((_, bomb))) = (self.launcher.drag, self.active_bomb()) else {
            return Vec::new();
        };
        if drag.length() < self.config.launch.min_drag {
            return Vec::new();
        }
        predict(
            self.launcher.anchor + drag,
            self.launch_force(drag),
            &bomb.profile,
            &self.config.world,
            &self.config.world.expanded_bounds(),
            SIM_DT,
            PREVIEW_STEPS,
        )
    }
}
