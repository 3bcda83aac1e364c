//! Session state and level lifecycle
//!
//! [`GameSession`] owns everything one level needs: the block grid, the bomb
//! arena, the launcher slot, the deferred-event queue and the RNG. Components
//! receive it by reference; nothing is global.

use std::collections::BTreeMap;

use rand::SeedableRng;
use rand_pcg::Pcg32;
use slotmap::SlotMap;

use super::bomb::{Bomb, BombKey, BombKind, BombState};
use super::events::{EffectsSink, GameEvent, Notifier, SessionStats};
use super::grid::{BlockGrid, BlockKind};
use super::launch::LaunchController;
use super::layout::{GridCell, LayoutGenerator, assign_kinds};
use super::schedule::{Deferred, EventQueue};
use crate::config::GameConfig;
use crate::secs_to_ticks;

/// Current phase of a level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelPhase {
    Playing,
    /// Target reveal reached
    Won,
    /// Out of shots below target
    Lost,
}

/// Where the level's blocks come from
#[derive(Debug, Clone)]
enum LevelSource {
    /// Cells from a layout generator; types rolled on every (re)start
    Generated(Vec<GridCell>),
    /// Hand-placed typed cells
    Fixed(Vec<(GridCell, BlockKind)>),
}

/// Complete state of one play session
#[derive(Debug)]
pub struct GameSession {
    pub config: GameConfig,
    pub grid: BlockGrid,
    pub bombs: SlotMap<BombKey, Bomb>,
    pub launcher: LaunchController,
    /// Stuck sticky bombs waiting for a trigger
    pub stuck: Vec<BombKey>,
    pub queue: EventQueue,
    pub notifier: Notifier,
    pub rng: Pcg32,
    pub seed: u64,
    /// Simulation tick counter
    pub time_ticks: u64,
    pub phase: LevelPhase,
    /// 1-based level number
    pub level: u32,
    pub shots_remaining: u32,
    /// Remaining stock per bomb kind
    pub inventory: BTreeMap<BombKind, u32>,
    /// Kind the player wants next
    pub selected: BombKind,
    source: LevelSource,
    last_reported_percent: f32,
}

impl GameSession {
    /// Start level 1 from a layout generator
    pub fn new(
        config: GameConfig,
        layout: &dyn LayoutGenerator,
        seed: u64,
        sink: Option<Box<dyn EffectsSink>>,
    ) -> Self {
        Self::from_source(config, LevelSource::Generated(layout.cells()), seed, sink)
    }

    /// Start level 1 with hand-placed block types
    pub fn with_blocks(
        config: GameConfig,
        blocks: Vec<(GridCell, BlockKind)>,
        seed: u64,
        sink: Option<Box<dyn EffectsSink>>,
    ) -> Self {
        Self::from_source(config, LevelSource::Fixed(blocks), seed, sink)
    }

    fn from_source(
        config: GameConfig,
        source: LevelSource,
        seed: u64,
        sink: Option<Box<dyn EffectsSink>>,
    ) -> Self {
        let launcher = LaunchController::new(config.launch.anchor);
        let mut session = Self {
            config,
            grid: BlockGrid::default(),
            bombs: SlotMap::with_key(),
            launcher,
            stuck: Vec::new(),
            queue: EventQueue::new(),
            notifier: Notifier::new(sink),
            rng: Pcg32::seed_from_u64(seed),
            seed,
            time_ticks: 0,
            phase: LevelPhase::Playing,
            level: 1,
            shots_remaining: 0,
            inventory: BTreeMap::new(),
            selected: BombKind::Blast,
            source,
            last_reported_percent: 0.0,
        };
        session.start_level();
        session
    }

    /// (Re)build the current level and put the first bomb in the slingshot
    fn start_level(&mut self) {
        self.queue.clear();
        self.bombs.clear();
        self.stuck.clear();
        self.launcher.reset();

        let grid_cfg = &self.config.grid;
        let typed = match &self.source {
            LevelSource::Generated(cells) => assign_kinds(cells, &grid_cfg.weights, &mut self.rng),
            LevelSource::Fixed(blocks) => blocks.clone(),
        };
        self.grid = BlockGrid::new(
            &typed,
            grid_cfg.block_size,
            grid_cfg.origin,
            grid_cfg.strong_health,
        );

        self.shots_remaining = self.config.shots_per_level;
        self.inventory = BombKind::ALL
            .iter()
            .map(|&kind| (kind, self.config.starting_count(kind)))
            .collect();
        self.selected = self.first_stocked(BombKind::Blast).unwrap_or(BombKind::Blast);
        self.phase = LevelPhase::Playing;
        self.last_reported_percent = 0.0;
        self.notifier.reset_stats();

        log::info!(
            "Level {} started: {} blocks ({} dynamite, {} eternal), {} shots",
            self.level,
            self.grid.initial_count(),
            self.grid.count_active_kind(BlockKind::Dynamite),
            self.grid.count_active_kind(BlockKind::Eternal),
            self.shots_remaining
        );
        self.notifier.emit(GameEvent::LevelStarted {
            level: self.level,
            blocks: self.grid.initial_count(),
        });
        self.notifier.emit(GameEvent::ShotsRemaining {
            shots: self.shots_remaining,
        });

        self.spawn_bomb();
    }

    /// Replay the current level; pending timers and stuck bombs are discarded
    pub fn restart_level(&mut self) {
        log::info!("Restarting level {}", self.level);
        self.start_level();
    }

    /// Advance to a new layout
    pub fn load_level(&mut self, layout: &dyn LayoutGenerator) {
        self.level += 1;
        self.source = LevelSource::Generated(layout.cells());
        self.start_level();
    }

    pub fn stats(&self) -> SessionStats {
        self.notifier.stats()
    }

    pub fn reveal_percentage(&self) -> f32 {
        self.grid.reveal_percentage()
    }

    pub fn bomb(&self, key: BombKey) -> Option<&Bomb> {
        self.bombs.get(key)
    }

    /// Bomb currently owned by the slingshot (at rest, aiming or in flight)
    pub fn active_bomb(&self) -> Option<(BombKey, &Bomb)> {
        let key = self.launcher.active?;
        self.bombs.get(key).map(|b| (key, b))
    }

    pub fn stock(&self, kind: BombKind) -> u32 {
        self.inventory.get(&kind).copied().unwrap_or(0)
    }

    fn has_stock(&self) -> bool {
        self.inventory.values().any(|&n| n > 0)
    }

    /// `preferred` if stocked, otherwise the first stocked kind in selection order
    fn first_stocked(&self, preferred: BombKind) -> Option<BombKind> {
        if self.stock(preferred) > 0 {
            return Some(preferred);
        }
        BombKind::ALL.iter().copied().find(|&k| self.stock(k) > 0)
    }

    /// Choose the next bomb kind; swaps the bomb in the slingshot if it is at rest
    pub fn select_bomb(&mut self, kind: BombKind) -> bool {
        if self.stock(kind) == 0 {
            log::debug!("Cannot select {}: out of stock", kind.as_str());
            return false;
        }
        if let Some(key) = self.launcher.active {
            let profile = self.config.profile(kind);
            match self.bombs.get_mut(key) {
                Some(bomb) if bomb.state == BombState::AtRest => {
                    bomb.retype(kind, profile);
                }
                Some(_) => return false,
                None => {}
            }
        }
        self.selected = kind;
        true
    }

    /// Put a fresh bomb in the slingshot if the level allows one
    pub fn spawn_bomb(&mut self) -> Option<BombKey> {
        if self.phase != LevelPhase::Playing
            || self.launcher.active.is_some()
            || self.shots_remaining == 0
        {
            return None;
        }
        let kind = self.first_stocked(self.selected)?;
        self.selected = kind;

        let bomb = Bomb::new(
            kind,
            self.launcher.anchor,
            self.config.launch.bomb_radius,
            self.config.profile(kind),
        );
        let key = self.bombs.insert(bomb);
        self.launcher.active = Some(key);
        log::debug!("Spawned {} bomb", kind.as_str());
        self.notifier.emit(GameEvent::BombSpawned { kind });
        Some(key)
    }

    /// Queue the next bomb after the respawn delay
    pub(crate) fn schedule_respawn(&mut self) {
        if self.phase != LevelPhase::Playing
            || self.shots_remaining == 0
            || self.queue.has_pending_spawn()
        {
            return;
        }
        let delay = secs_to_ticks(self.config.launch.respawn_delay_secs);
        self.queue.schedule_in(self.time_ticks, delay, Deferred::SpawnBomb);
    }

    /// Free the slingshot without removing the bomb (sticky bombs)
    pub(crate) fn detach_active(&mut self, key: BombKey) {
        if self.launcher.active == Some(key) {
            self.launcher.active = None;
            self.launcher.clear_drag();
            self.schedule_respawn();
        }
    }

    /// Remove a finished bomb from the arena and every reference to it
    pub(crate) fn retire_bomb(&mut self, key: BombKey) {
        if let Some(bomb) = self.bombs.get_mut(key) {
            bomb.terminate();
        }
        self.bombs.remove(key);
        self.stuck.retain(|&k| k != key);
        self.queue.cancel_for_bomb(key);
        self.detach_active(key);
    }

    /// Report reveal progress if it moved
    pub(crate) fn report_progress(&mut self) {
        let percent = self.grid.reveal_percentage();
        if percent > self.last_reported_percent {
            self.last_reported_percent = percent;
            self.notifier.emit(GameEvent::LevelProgress { percent });
        }
    }

    /// Settle the level outcome once it is decided
    pub fn update_phase(&mut self) {
        if self.phase != LevelPhase::Playing {
            return;
        }
        let percent = self.grid.reveal_percentage();
        if percent >= self.config.target_reveal_percent {
            self.phase = LevelPhase::Won;
            self.queue.clear();
            log::info!("Level {} won at {:.1}% revealed", self.level, percent);
            self.notifier.emit(GameEvent::LevelWon { percent });
            return;
        }

        let out_of_shots = self.shots_remaining == 0 || !self.has_stock();
        let bomb_in_play = self
            .active_bomb()
            .is_some_and(|(_, b)| b.state != BombState::AtRest);
        if out_of_shots && !bomb_in_play && !self.queue.has_pending_explosions() {
            self.phase = LevelPhase::Lost;
            self.queue.clear();
            log::info!(
                "Level {} lost: {:.1}% revealed, needed {:.1}%",
                self.level,
                percent,
                self.config.target_reveal_percent
            );
            self.notifier.emit(GameEvent::LevelLost { percent });
        }
    }
}
