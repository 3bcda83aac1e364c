//! Outbound notifications
//!
//! The simulation reports what happened to an optional [`EffectsSink`]
//! (particles, audio, HUD). A sink can fail or even panic; neither reaches
//! the simulation.

use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use glam::Vec2;

use super::bomb::BombKind;
use super::explosion::ExplosionSource;
use super::grid::{BlockKey, BlockKind, Health};

/// Something the presentation layer may want to show or play
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    LevelStarted { level: u32, blocks: usize },
    BombSpawned { kind: BombKind },
    BombLaunched { kind: BombKind, velocity: Vec2 },
    BlockDamaged { block: BlockKey, health: Health, pos: Vec2 },
    BlockDestroyed { block: BlockKey, kind: BlockKind, pos: Vec2 },
    /// Bouncy block popped (bounce visual)
    BouncyBlockPopped { pos: Vec2 },
    Explosion { center: Vec2, radius: f32, source: ExplosionSource, depth: u32 },
    BombStuck { pos: Vec2 },
    StickyTriggered { pos: Vec2 },
    BombBounced { pos: Vec2, bounces: u32 },
    BombFizzled { pos: Vec2 },
    LevelProgress { percent: f32 },
    ShotsRemaining { shots: u32 },
    LevelWon { percent: f32 },
    LevelLost { percent: f32 },
}

/// Error a sink may report; logged and dropped
#[derive(thiserror::Error, Debug)]
#[error("effects sink failed: {0}")]
pub struct SinkError(pub String);

/// Presentation-side collaborator
pub trait EffectsSink {
    fn notify(&mut self, event: &GameEvent) -> Result<(), SinkError>;
}

/// Running totals, kept whether or not a sink is attached
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub blocks_destroyed: u32,
    pub explosions: u32,
    pub chain_explosions: u32,
    pub sticky_triggers: u32,
    pub bounces: u32,
    pub fizzles: u32,
}

/// Forwards events to the optional sink and keeps [`SessionStats`]
#[derive(Default)]
pub struct Notifier {
    sink: Option<Box<dyn EffectsSink>>,
    stats: SessionStats,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("sink", &self.sink.is_some())
            .field("stats", &self.stats)
            .finish()
    }
}

impl Notifier {
    pub fn new(sink: Option<Box<dyn EffectsSink>>) -> Self {
        Self {
            sink,
            stats: SessionStats::default(),
        }
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = SessionStats::default();
    }

    pub fn emit(&mut self, event: GameEvent) {
        match &event {
            GameEvent::BlockDestroyed { .. } => self.stats.blocks_destroyed += 1,
            GameEvent::Explosion { depth, .. } => {
                self.stats.explosions += 1;
                if *depth > 0 {
                    self.stats.chain_explosions += 1;
                }
            }
            GameEvent::StickyTriggered { .. } => self.stats.sticky_triggers += 1,
            GameEvent::BombBounced { .. } => self.stats.bounces += 1,
            GameEvent::BombFizzled { .. } => self.stats.fizzles += 1,
            _ => {}
        }

        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        match panic::catch_unwind(AssertUnwindSafe(|| sink.notify(&event))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => log::warn!("Ignoring {err} for {event:?}"),
            Err(_) => log::warn!("Effects sink panicked on {event:?}; ignored"),
        }
    }
}

/// Sink that records every event; clones share the same log
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<GameEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything recorded so far
    pub fn take(&self) -> Vec<GameEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    pub fn snapshot(&self) -> Vec<GameEvent> {
        self.events.borrow().clone()
    }

    pub fn count(&self, pred: impl Fn(&GameEvent) -> bool) -> usize {
        self.events.borrow().iter().filter(|e| pred(e)).count()
    }
}

impl EffectsSink for EventLog {
    fn notify(&mut self, event: &GameEvent) -> Result<(), SinkError> {
        self.events.borrow_mut().push(event.clone());
        Ok(())
    }
}
