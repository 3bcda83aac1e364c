//! Explosion resolution
//!
//! An explosion queries the grid once, sorts every block it reaches into a
//! fate (immune, destroy, damage, chain) and only then mutates the grid.
//! Secondary explosions from dynamite, stuck stickies, cluster fragments and
//! piercer steps never recurse in place: they go through the [`EventQueue`]
//! one depth level deeper.
//!
//! [`EventQueue`]: super::schedule::EventQueue

use glam::Vec2;
use rand::Rng;

use super::bomb::{BombKey, BombKind};
use super::events::GameEvent;
use super::grid::{BlockKey, BlockKind, DamageResult, DestroyResult};
use super::schedule::Deferred;
use super::state::GameSession;
use crate::millis_to_ticks;

/// Which block table an explosion uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplosionRule {
    /// Strong blocks lose one health point
    Standard,
    /// Everything but Eternal is destroyed outright
    Shatter,
}

/// What set an explosion off
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplosionSource {
    Bomb(BombKind),
    Dynamite,
    ClusterFragment,
    PiercerStep,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExplosionShape {
    Circle { radius: f32 },
    /// Row of small blasts from the center along `direction`
    Line { direction: Vec2, length: f32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExplosionEvent {
    pub center: Vec2,
    pub shape: ExplosionShape,
    pub rule: ExplosionRule,
    pub source: ExplosionSource,
    /// 0 for a bomb's own blast, +1 per chain link
    pub depth: u32,
}

impl ExplosionEvent {
    pub fn circle(
        center: Vec2,
        radius: f32,
        rule: ExplosionRule,
        source: ExplosionSource,
        depth: u32,
    ) -> Self {
        Self {
            center,
            shape: ExplosionShape::Circle { radius },
            rule,
            source,
            depth,
        }
    }
}

/// Tally of one resolved explosion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExplosionOutcome {
    pub destroyed: usize,
    pub damaged: usize,
    pub immune: usize,
    /// Dynamite blocks that queued a secondary explosion
    pub chained: usize,
    pub stickies_triggered: usize,
}

impl ExplosionOutcome {
    pub fn merge(&mut self, other: ExplosionOutcome) {
        self.destroyed += other.destroyed;
        self.damaged += other.damaged;
        self.immune += other.immune;
        self.chained += other.chained;
        self.stickies_triggered += other.stickies_triggered;
    }

    pub fn is_empty(&self) -> bool {
        *self == ExplosionOutcome::default()
    }
}

/// Result of applying one hit to one block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockHit {
    Immune,
    Damaged,
    Destroyed,
    /// Destroyed dynamite; a secondary explosion is queued
    Chained,
    /// Stale key or block already gone
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockFate {
    Immune,
    Destroy,
    Damage,
    Chain,
}

fn classify(kind: BlockKind, rule: ExplosionRule) -> BlockFate {
    match (kind, rule) {
        (BlockKind::Eternal, _) => BlockFate::Immune,
        (BlockKind::Dynamite, _) => BlockFate::Chain,
        (BlockKind::Strong, ExplosionRule::Standard) => BlockFate::Damage,
        (BlockKind::Strong, ExplosionRule::Shatter)
        | (BlockKind::Standard | BlockKind::Bouncy, _) => BlockFate::Destroy,
    }
}

impl GameSession {
    /// Detonate a bomb at its position using its kind's explosion.
    ///
    /// Returns `None` when the bomb is gone or already exploded, so a second
    /// call for the same bomb changes nothing.
    pub fn explode_bomb(&mut self, key: BombKey) -> Option<ExplosionOutcome> {
        let bomb = self.bombs.get_mut(key)?;
        if !bomb.mark_exploded() {
            log::debug!("Ignoring repeat explosion for {key:?}");
            return None;
        }
        let pos = bomb.pos;
        let kind = bomb.kind();
        let direction = bomb.effective_velocity().try_normalize().unwrap_or(Vec2::X);
        self.retire_bomb(key);
        log::debug!("{} exploded at ({:.0}, {:.0})", kind.as_str(), pos.x, pos.y);

        let e = &self.config.explosions;
        let source = ExplosionSource::Bomb(kind);
        let event = match kind {
            BombKind::Blast => {
                ExplosionEvent::circle(pos, e.blast_radius, ExplosionRule::Standard, source, 0)
            }
            BombKind::Shatterer => {
                ExplosionEvent::circle(pos, e.shatter_radius, ExplosionRule::Shatter, source, 0)
            }
            BombKind::Piercer => ExplosionEvent {
                center: pos,
                shape: ExplosionShape::Line {
                    direction,
                    length: e.piercer_length,
                },
                rule: ExplosionRule::Standard,
                source,
                depth: 0,
            },
            BombKind::Cluster => {
                self.schedule_cluster_fragments(pos);
                let radius = self.config.explosions.cluster_primary_radius;
                ExplosionEvent::circle(pos, radius, ExplosionRule::Standard, source, 0)
            }
            BombKind::Sticky => {
                ExplosionEvent::circle(pos, e.sticky_radius, ExplosionRule::Standard, source, 0)
            }
            BombKind::Driller => ExplosionEvent::circle(
                pos,
                self.config.driller.finish_radius,
                ExplosionRule::Shatter,
                source,
                0,
            ),
            BombKind::Ricochet => ExplosionEvent::circle(
                pos,
                self.config.ricochet.explosion_radius,
                ExplosionRule::Standard,
                source,
                0,
            ),
        };
        Some(self.resolve_explosion(&event))
    }

    /// Apply an explosion to the grid and any stuck stickies in reach
    pub fn resolve_explosion(&mut self, event: &ExplosionEvent) -> ExplosionOutcome {
        if event.depth > self.config.explosions.max_chain_depth {
            log::warn!(
                "Chain depth {} exceeds cap {}; dropping explosion at ({:.0}, {:.0})",
                event.depth,
                self.config.explosions.max_chain_depth,
                event.center.x,
                event.center.y
            );
            return ExplosionOutcome::default();
        }

        let outcome = match event.shape {
            ExplosionShape::Circle { radius } => self.resolve_circle(event, radius),
            ExplosionShape::Line { direction, length } => {
                self.resolve_line(event, direction, length)
            }
        };
        self.report_progress();
        outcome
    }

    /// First step now, the rest staggered through the queue
    fn resolve_line(
        &mut self,
        event: &ExplosionEvent,
        direction: Vec2,
        length: f32,
    ) -> ExplosionOutcome {
        let e = &self.config.explosions;
        let (step, radius) = (e.piercer_step, e.piercer_radius);
        let step_delay = e.piercer_step_delay_ms;
        let direction = direction.try_normalize().unwrap_or(Vec2::X);
        let steps = (length / step).floor() as u32;

        for i in 1..=steps {
            let step_event = ExplosionEvent::circle(
                event.center + direction * (i as f32 * step),
                radius,
                event.rule,
                ExplosionSource::PiercerStep,
                event.depth,
            );
            let delay = millis_to_ticks(step_delay * i);
            self.queue
                .schedule_in(self.time_ticks, delay, Deferred::Explosion(step_event));
        }

        let first =
            ExplosionEvent::circle(event.center, radius, event.rule, event.source, event.depth);
        self.resolve_circle(&first, radius)
    }

    fn resolve_circle(&mut self, event: &ExplosionEvent, radius: f32) -> ExplosionOutcome {
        self.notifier.emit(GameEvent::Explosion {
            center: event.center,
            radius,
            source: event.source,
            depth: event.depth,
        });

        // Snapshot targets and fates before touching the grid
        let targets: Vec<(BlockKey, BlockFate)> = self
            .grid
            .query_in_radius(event.center, radius)
            .into_iter()
            .filter_map(|key| {
                let block = self.grid.get(key)?;
                Some((key, classify(block.kind, event.rule)))
            })
            .collect();

        let mut outcome = ExplosionOutcome::default();
        for fate in [BlockFate::Destroy, BlockFate::Damage, BlockFate::Chain, BlockFate::Immune] {
            for &(key, _) in targets.iter().filter(|(_, f)| *f == fate) {
                match self.apply_fate(key, fate, event.depth) {
                    BlockHit::Immune => outcome.immune += 1,
                    BlockHit::Damaged => outcome.damaged += 1,
                    BlockHit::Destroyed => outcome.destroyed += 1,
                    BlockHit::Chained => {
                        outcome.destroyed += 1;
                        outcome.chained += 1;
                    }
                    BlockHit::Missing => {}
                }
            }
        }

        outcome.stickies_triggered = self.trigger_stickies(event.center, event.depth);
        log::debug!(
            "Explosion at ({:.0}, {:.0}) r={:.0} depth {}: {:?}",
            event.center.x,
            event.center.y,
            radius,
            event.depth,
            outcome
        );
        outcome
    }

    /// Hit a single block under `rule` (driller bites, ricochet chips)
    pub fn hit_block(&mut self, key: BlockKey, rule: ExplosionRule, depth: u32) -> BlockHit {
        let Some(block) = self.grid.get(key).filter(|b| b.active) else {
            return BlockHit::Missing;
        };
        let fate = classify(block.kind, rule);
        let hit = self.apply_fate(key, fate, depth);
        if matches!(hit, BlockHit::Destroyed | BlockHit::Chained) {
            self.report_progress();
        }
        hit
    }

    fn apply_fate(&mut self, key: BlockKey, fate: BlockFate, depth: u32) -> BlockHit {
        let Some(block) = self.grid.get(key) else {
            return BlockHit::Missing;
        };
        let (pos, kind) = (block.pos, block.kind);

        match fate {
            BlockFate::Immune => BlockHit::Immune,
            BlockFate::Damage => match self.grid.damage(key, 1) {
                DamageResult::StillAlive { health } => {
                    self.notifier.emit(GameEvent::BlockDamaged {
                        block: key,
                        health,
                        pos,
                    });
                    BlockHit::Damaged
                }
                DamageResult::Destroyed => {
                    self.block_destroyed(key, kind, pos, depth);
                    BlockHit::Destroyed
                }
                DamageResult::AlreadyDestroyed => BlockHit::Missing,
            },
            BlockFate::Destroy | BlockFate::Chain => match self.grid.destroy(key) {
                DestroyResult::Destroyed => {
                    if self.block_destroyed(key, kind, pos, depth) {
                        BlockHit::Chained
                    } else {
                        BlockHit::Destroyed
                    }
                }
                DestroyResult::Rejected => BlockHit::Immune,
                DestroyResult::AlreadyDestroyed => BlockHit::Missing,
            },
        }
    }

    /// Side effects of a destroyed block; returns whether a chain was queued
    fn block_destroyed(&mut self, key: BlockKey, kind: BlockKind, pos: Vec2, depth: u32) -> bool {
        self.notifier.emit(GameEvent::BlockDestroyed {
            block: key,
            kind,
            pos,
        });
        match kind {
            BlockKind::Bouncy => {
                self.notifier.emit(GameEvent::BouncyBlockPopped { pos });
                false
            }
            BlockKind::Dynamite => {
                let e = &self.config.explosions;
                let radius = e.dynamite_radius;
                let delay_ms = self
                    .rng
                    .random_range(e.dynamite_delay_min_ms..=e.dynamite_delay_max_ms);
                let chain = ExplosionEvent::circle(
                    pos,
                    radius,
                    ExplosionRule::Standard,
                    ExplosionSource::Dynamite,
                    depth + 1,
                );
                log::debug!("Dynamite at ({:.0}, {:.0}) fires in {delay_ms} ms", pos.x, pos.y);
                let delay = millis_to_ticks(delay_ms);
                self.queue
                    .schedule_in(self.time_ticks, delay, Deferred::Explosion(chain));
                true
            }
            _ => false,
        }
    }

    /// Detonate stuck stickies near `center`; each is removed before its blast is queued
    fn trigger_stickies(&mut self, center: Vec2, depth: u32) -> usize {
        let e = &self.config.explosions;
        let (trigger_radius, radius, delay) =
            (e.sticky_trigger_radius, e.sticky_radius, e.sticky_chain_delay_ms);

        let in_reach: Vec<BombKey> = self
            .stuck
            .iter()
            .copied()
            .filter(|&key| {
                self.bombs
                    .get(key)
                    .is_some_and(|b| b.pos.distance(center) <= trigger_radius)
            })
            .collect();

        let mut triggered = 0;
        for key in in_reach {
            let Some(bomb) = self.bombs.get_mut(key) else {
                continue;
            };
            if !bomb.mark_exploded() {
                continue;
            }
            let pos = bomb.pos;
            self.retire_bomb(key);
            self.notifier.emit(GameEvent::StickyTriggered { pos });
            let chain = ExplosionEvent::circle(
                pos,
                radius,
                ExplosionRule::Standard,
                ExplosionSource::Bomb(BombKind::Sticky),
                depth + 1,
            );
            self.queue
                .schedule_in(self.time_ticks, millis_to_ticks(delay), Deferred::Explosion(chain));
            triggered += 1;
        }
        triggered
    }

    /// Queue the secondary blasts of a cluster bomb; farther ones fire later
    fn schedule_cluster_fragments(&mut self, center: Vec2) {
        let e = &self.config.explosions;
        let (min_count, max_count) = (e.cluster_min_count, e.cluster_max_count);
        let (min_offset, max_offset) = (e.cluster_min_offset, e.cluster_max_offset);
        let (radius, ms_per_unit) = (e.cluster_secondary_radius, e.cluster_delay_ms_per_unit);

        let count = self.rng.random_range(min_count..=max_count);
        for _ in 0..count {
            let angle = self.rng.random_range(0.0..std::f32::consts::TAU);
            let distance = self.rng.random_range(min_offset..=max_offset);
            let offset = Vec2::from_angle(angle) * distance;
            let fragment = ExplosionEvent::circle(
                center + offset,
                radius,
                ExplosionRule::Standard,
                ExplosionSource::ClusterFragment,
                1,
            );
            let delay = millis_to_ticks((distance * ms_per_unit).round() as u32);
            self.queue
                .schedule_in(self.time_ticks, delay, Deferred::Explosion(fragment));
        }
        log::debug!("Cluster scheduled {count} fragments");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::sim::bomb::{Bomb, BombState};
    use crate::sim::grid::Health;
    use crate::sim::layout::GridCell;

    fn session_with(blocks: Vec<(GridCell, BlockKind)>) -> GameSession {
        GameSession::with_blocks(GameConfig::default(), blocks, 1, None)
    }

    fn row(kinds: &[BlockKind]) -> Vec<(GridCell, BlockKind)> {
        kinds
            .iter()
            .enumerate()
            .map(|(c, &k)| (GridCell::new(0, c as i32), k))
            .collect()
    }

    fn blast_at(center: Vec2, radius: f32, rule: ExplosionRule) -> ExplosionEvent {
        ExplosionEvent::circle(center, radius, rule, ExplosionSource::Bomb(BombKind::Blast), 0)
    }

    #[test]
    fn test_classify_table() {
        use ExplosionRule::*;
        assert_eq!(classify(BlockKind::Standard, Standard), BlockFate::Destroy);
        assert_eq!(classify(BlockKind::Strong, Standard), BlockFate::Damage);
        assert_eq!(classify(BlockKind::Strong, Shatter), BlockFate::Destroy);
        assert_eq!(classify(BlockKind::Eternal, Shatter), BlockFate::Immune);
        assert_eq!(classify(BlockKind::Bouncy, Standard), BlockFate::Destroy);
        assert_eq!(classify(BlockKind::Dynamite, Shatter), BlockFate::Chain);
    }

    #[test]
    fn test_empty_area_is_zero_outcome() {
        let mut s = session_with(row(&[BlockKind::Standard]));
        let far = blast_at(Vec2::new(-1000.0, -1000.0), 50.0, ExplosionRule::Standard);
        let out = s.resolve_explosion(&far);
        assert!(out.is_empty());
    }

    #[test]
    fn test_strong_damaged_then_destroyed() {
        let mut s = session_with(row(&[BlockKind::Strong]));
        let key = s.grid.iter_active().next().unwrap().0;
        let center = s.grid.get(key).unwrap().pos;

        let out = s.resolve_explosion(&blast_at(center, 10.0, ExplosionRule::Standard));
        assert_eq!(out.damaged, 1);
        assert_eq!(s.grid.get(key).unwrap().health, Health::Finite(1));

        let out = s.resolve_explosion(&blast_at(center, 10.0, ExplosionRule::Standard));
        assert_eq!(out.destroyed, 1);
        assert!(!s.grid.is_active(key));
    }

    #[test]
    fn test_dynamite_chains_one_level_deeper() {
        let mut s = session_with(row(&[BlockKind::Dynamite]));
        let center = s.grid.iter_active().next().unwrap().1.pos;
        let out = s.resolve_explosion(&blast_at(center, 10.0, ExplosionRule::Standard));
        assert_eq!(out.chained, 1);
        assert_eq!(s.grid.active_count(), 0);
        assert!(s.queue.has_pending_explosions());

        let fire_at = s.queue.next_fire_tick().unwrap();
        match s.queue.pop_due(fire_at) {
            Some(Deferred::Explosion(chain)) => {
                assert_eq!(chain.depth, 1);
                assert_eq!(chain.source, ExplosionSource::Dynamite);
                assert_eq!(chain.center, center);
            }
            other => panic!("expected chain explosion, got {other:?}"),
        }
        // 100..=300 ms at 120 Hz
        assert!((12..=36).contains(&fire_at));
    }

    #[test]
    fn test_depth_cap_drops_explosion() {
        let mut s = session_with(row(&[BlockKind::Standard]));
        let center = s.grid.iter_active().next().unwrap().1.pos;
        let mut event = blast_at(center, 50.0, ExplosionRule::Standard);
        event.depth = s.config.explosions.max_chain_depth + 1;
        assert!(s.resolve_explosion(&event).is_empty());
        assert_eq!(s.grid.active_count(), 1);
    }

    #[test]
    fn test_piercer_line_staggers_steps() {
        let mut s = session_with(row(&[BlockKind::Standard; 10]));
        let start = s.grid.cell_center(0, 0);
        let event = ExplosionEvent {
            center: start,
            shape: ExplosionShape::Line {
                direction: Vec2::X,
                length: 300.0,
            },
            rule: ExplosionRule::Standard,
            source: ExplosionSource::Bomb(BombKind::Piercer),
            depth: 0,
        };
        let out = s.resolve_explosion(&event);
        assert_eq!(out.destroyed, 1);
        assert_eq!(s.queue.len(), 7);
    }

    #[test]
    fn test_cluster_schedules_fragments() {
        let mut s = session_with(row(&[BlockKind::Standard]));
        let key = s.launcher.active.unwrap();
        s.bombs[key].retype(BombKind::Cluster, s.config.profile(BombKind::Cluster));
        s.bombs[key].state = BombState::Launched;
        let center = s.bombs[key].pos;
        s.explode_bomb(key).unwrap();
        let fragments = s.queue.len() - usize::from(s.queue.has_pending_spawn());
        assert!((3..=5).contains(&fragments));

        // Drain tick by tick so each fragment is seen on its fire tick
        let mut fired = Vec::new();
        for now in 0..=s.time_ticks + 120 {
            while let Some(payload) = s.queue.pop_due(now) {
                if let Deferred::Explosion(event) = payload {
                    assert_eq!(event.source, ExplosionSource::ClusterFragment);
                    assert_eq!(event.depth, 1);
                    fired.push((event.center.distance(center), now));
                }
            }
        }
        assert_eq!(fired.len(), fragments);
        fired.sort_by(|a, b| a.0.total_cmp(&b.0));
        for pair in fired.windows(2) {
            assert!(pair[0].1 <= pair[1].1, "farther fragment fired first: {fired:?}");
        }
        let (nearest, farthest) = (fired[0], fired[fired.len() - 1]);
        assert!(nearest.0 >= s.config.explosions.cluster_min_offset - 0.01);
        assert!(farthest.0 <= s.config.explosions.cluster_max_offset + 0.01);
    }

    #[test]
    fn test_explode_bomb_only_once() {
        let mut s = session_with(row(&[BlockKind::Standard]));
        let key = s.launcher.active.unwrap();
        s.bombs[key].state = BombState::Launched;
        assert!(s.explode_bomb(key).is_some());
        assert!(s.explode_bomb(key).is_none());
        assert!(s.bomb(key).is_none());
    }

    #[test]
    fn test_sticky_triggered_once_and_removed() {
        let mut s = session_with(row(&[BlockKind::Eternal]));
        let mut bomb = Bomb::new(
            BombKind::Sticky,
            Vec2::new(300.0, 300.0),
            15.0,
            s.config.profile(BombKind::Sticky),
        );
        bomb.state = BombState::Stuck;
        let key = s.bombs.insert(bomb);
        s.stuck.push(key);

        let far_trigger = blast_at(Vec2::new(300.0 + 400.0, 300.0), 10.0, ExplosionRule::Standard);
        let out = s.resolve_explosion(&far_trigger);
        assert_eq!(out.stickies_triggered, 1);
        assert!(s.stuck.is_empty());
        assert!(s.bomb(key).is_none());

        let again = s.resolve_explosion(&far_trigger);
        assert_eq!(again.stickies_triggered, 0);
    }

    #[test]
    fn test_hit_block_missing_for_destroyed() {
        let mut s = session_with(row(&[BlockKind::Standard]));
        let key = s.grid.iter_active().next().unwrap().0;
        assert_eq!(s.hit_block(key, ExplosionRule::Standard, 0), BlockHit::Destroyed);
        assert_eq!(s.hit_block(key, ExplosionRule::Standard, 0), BlockHit::Missing);
    }
}
