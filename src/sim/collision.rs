//! Contact dispatch
//!
//! Turns raw bomb contacts into per-kind reactions: explode, stick, drill,
//! ricochet or bounce off a world side. Only the slingshot's in-flight bomb
//! is tracked; everything else is ignored.

use glam::Vec2;
use rand::Rng;

use super::bomb::{BombBehavior, BombKey, BombKind};
use super::events::GameEvent;
use super::explosion::{BlockHit, ExplosionRule};
use super::grid::BlockKey;
use super::physics::{
    BodyId, RawContact, Side, bounce_velocity, circle_block_contact, reflect_velocity,
};
use super::schedule::Deferred;
use super::state::GameSession;
use crate::{millis_to_ticks, secs_to_ticks};

/// What a contact led to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactRoute {
    /// Not the tracked bomb, bomb not in flight, or already handled
    Ignored,
    Exploded,
    Stuck,
    DrillStarted,
    Bounced,
    /// Ricochet contact too close in time and place to the previous bounce
    Deduplicated,
    WallBounce,
    /// Special bomb reached a terminal contact and exploded
    Finished,
}

impl GameSession {
    /// Route a contact to the matching bomb handler
    pub fn dispatch_contact(&mut self, contact: RawContact) -> ContactRoute {
        let contact = match (contact.a, contact.b) {
            (BodyId::Bomb(_), _) => contact,
            (_, BodyId::Bomb(_)) => contact.flipped(),
            _ => return ContactRoute::Ignored,
        };
        let BodyId::Bomb(key) = contact.a else {
            return ContactRoute::Ignored;
        };
        if self.launcher.active != Some(key) {
            return ContactRoute::Ignored;
        }
        let Some(bomb) = self.bombs.get(key) else {
            return ContactRoute::Ignored;
        };
        if !bomb.is_in_flight() {
            return ContactRoute::Ignored;
        }
        let kind = bomb.kind();

        let route = match contact.b {
            BodyId::Block(block) => {
                if bomb.hit_block && kind != BombKind::Ricochet {
                    return ContactRoute::Ignored;
                }
                match kind {
                    BombKind::Sticky => self.stick_bomb(key, &contact),
                    BombKind::Driller => self.start_drilling(key, block),
                    BombKind::Ricochet => self.ricochet_bounce(key, block, &contact),
                    _ => {
                        if let Some(bomb) = self.bombs.get_mut(key) {
                            bomb.hit_block = true;
                        }
                        self.explode_bomb(key);
                        ContactRoute::Exploded
                    }
                }
            }
            BodyId::Boundary(side) => self.boundary_hit(key, kind, side, &contact),
            BodyId::Bomb(_) => ContactRoute::Ignored,
        };
        log::trace!("{} contact with {:?} -> {:?}", kind.as_str(), contact.b, route);
        route
    }

    fn boundary_hit(
        &mut self,
        key: BombKey,
        kind: BombKind,
        side: Side,
        contact: &RawContact,
    ) -> ContactRoute {
        match kind {
            BombKind::Ricochet | BombKind::Driller => {
                log::debug!("{} reached the {:?} boundary", kind.as_str(), side);
                self.explode_bomb(key);
                ContactRoute::Finished
            }
            BombKind::Sticky => self.stick_bomb(key, contact),
            _ => {
                let Some(bomb) = self.bombs.get_mut(key) else {
                    return ContactRoute::Ignored;
                };
                bomb.pos += contact.normal * contact.penetration;
                bomb.vel = bounce_velocity(
                    bomb.vel,
                    contact.normal,
                    bomb.profile.restitution,
                    bomb.profile.friction,
                );
                ContactRoute::WallBounce
            }
        }
    }

    fn stick_bomb(&mut self, key: BombKey, contact: &RawContact) -> ContactRoute {
        let Some(bomb) = self.bombs.get_mut(key) else {
            return ContactRoute::Ignored;
        };
        let rest = bomb.pos + contact.normal * contact.penetration;
        if !bomb.stick(rest) {
            return ContactRoute::Ignored;
        }
        bomb.hit_block = true;
        self.stuck.push(key);
        self.detach_active(key);
        log::debug!("Sticky stuck at ({:.0}, {:.0}), {} stuck", rest.x, rest.y, self.stuck.len());
        self.notifier.emit(GameEvent::BombStuck { pos: rest });
        ContactRoute::Stuck
    }

    /// Cache the flight velocity and take the first bite
    fn start_drilling(&mut self, key: BombKey, block: BlockKey) -> ContactRoute {
        let Some(bomb) = self.bombs.get_mut(key) else {
            return ContactRoute::Ignored;
        };
        let velocity = bomb.effective_velocity();
        bomb.hit_block = true;
        let BombBehavior::Driller(state) = &mut bomb.behavior else {
            return ContactRoute::Ignored;
        };
        let eternal = self.grid.get(block).is_some_and(|b| b.is_eternal());
        if velocity.try_normalize().is_none() || eternal {
            self.explode_bomb(key);
            return ContactRoute::Finished;
        }
        state.stored_velocity = Some(velocity);
        log::debug!("Driller started drilling at ({:.0}, {:.0})", bomb.pos.x, bomb.pos.y);

        if self.hit_block(block, ExplosionRule::Shatter, 0) == BlockHit::Destroyed {
            self.count_drilled(key, 1);
        }
        ContactRoute::DrillStarted
    }

    fn count_drilled(&mut self, key: BombKey, n: u32) {
        let behavior = self.bombs.get_mut(key).map(|b| &mut b.behavior);
        if let Some(BombBehavior::Driller(state)) = behavior {
            state.blocks_drilled += n;
        }
    }

    /// Advance a drilling driller by one step; returns whether it is still drilling
    pub fn drill_step(&mut self, key: BombKey, dt: f32) -> bool {
        let d = &self.config.driller;
        let (min_speed, max_speed, drill_length) = (d.min_speed, d.max_speed, d.drill_length);
        let bounds = self.config.world.bounds();

        let Some(bomb) = self.bombs.get_mut(key) else {
            return false;
        };
        let BombBehavior::Driller(state) = &mut bomb.behavior else {
            return false;
        };
        let Some(stored) = state.stored_velocity else {
            return false;
        };
        let speed = stored.length().clamp(min_speed, max_speed);
        let direction = stored.normalize_or_zero();
        let advance = speed * dt;
        state.drilled += advance;
        let drilled = state.drilled;
        bomb.vel = direction * speed;
        bomb.pos += direction * advance;
        bomb.record_velocity();
        let (pos, radius) = (bomb.pos, bomb.radius);

        let reach = Vec2::splat(radius);
        let overlapped: Vec<BlockKey> = self
            .grid
            .keys_in_box(pos - reach, pos + reach)
            .into_iter()
            .filter(|&k| {
                self.grid
                    .get(k)
                    .is_some_and(|b| circle_block_contact(pos, radius, b).is_some())
            })
            .collect();

        if overlapped
            .iter()
            .any(|&k| self.grid.get(k).is_some_and(|b| b.is_eternal()))
        {
            log::debug!("Driller hit an eternal block");
            self.explode_bomb(key);
            return false;
        }

        let mut bitten = 0;
        for block in overlapped {
            if matches!(
                self.hit_block(block, ExplosionRule::Shatter, 0),
                BlockHit::Destroyed | BlockHit::Chained
            ) {
                bitten += 1;
            }
        }
        self.count_drilled(key, bitten);

        let at_boundary = pos.x - radius < bounds.min.x
            || pos.x + radius > bounds.max.x
            || pos.y + radius > bounds.max.y;
        if drilled >= drill_length || at_boundary {
            log::debug!("Driller finished after {drilled:.0} units");
            self.explode_bomb(key);
            return false;
        }
        true
    }

    fn ricochet_bounce(
        &mut self,
        key: BombKey,
        block: BlockKey,
        contact: &RawContact,
    ) -> ContactRoute {
        let now = self.time_ticks;
        let r = &self.config.ricochet;
        let min_interval = millis_to_ticks(r.min_bounce_interval_ms);
        let (dedup, boost) = (r.dedup_distance, r.speed_boost);
        let (min_speed, max_speed) = (r.min_speed, r.max_speed);
        let (lifetime, max_bounces) = (secs_to_ticks(r.lifetime_secs), r.max_bounces);
        let spread = r.restitution_jitter.max(0.0).min(0.99);
        let jitter = self.rng.random_range((1.0 - spread)..=(1.0 + spread));

        let Some(bomb) = self.bombs.get_mut(key) else {
            return ContactRoute::Ignored;
        };
        bomb.hit_block = true;
        bomb.pos += contact.normal * contact.penetration;
        let BombBehavior::Ricochet(state) = &mut bomb.behavior else {
            return ContactRoute::Ignored;
        };

        let first_contact = !state.armed;
        state.armed = true;
        if let (Some(tick), Some(pos)) = (state.last_bounce_tick, state.last_bounce_pos) {
            if now.saturating_sub(tick) < min_interval && pos.distance(contact.point) < dedup {
                return ContactRoute::Deduplicated;
            }
        }
        state.bounces += 1;
        state.last_bounce_tick = Some(now);
        state.last_bounce_pos = Some(contact.point);
        let bounces = state.bounces;

        if bomb.vel.dot(contact.normal) < 0.0 {
            let reflected = reflect_velocity(bomb.vel, contact.normal) * jitter * boost;
            let speed = reflected.length().clamp(min_speed, max_speed);
            bomb.vel = reflected.normalize_or_zero() * speed;
            bomb.record_velocity();
        }
        let pos = bomb.pos;

        if first_contact {
            self.queue.schedule_in(now, lifetime, Deferred::RicochetTimeout(key));
        }
        self.notifier.emit(GameEvent::BombBounced { pos, bounces });
        self.hit_block(block, ExplosionRule::Standard, 0);

        if bounces >= max_bounces {
            log::debug!("Ricochet spent after {bounces} bounces");
            self.explode_bomb(key);
            return ContactRoute::Finished;
        }
        ContactRoute::Bounced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::sim::bomb::BombState;
    use crate::sim::grid::BlockKind;
    use crate::sim::layout::GridCell;
    use crate::sim::physics::detect_contact;

    fn session(kinds: &[BlockKind]) -> GameSession {
        let blocks = kinds
            .iter()
            .enumerate()
            .map(|(c, &k)| (GridCell::new(0, c as i32), k))
            .collect();
        GameSession::with_blocks(GameConfig::default(), blocks, 3, None)
    }

    /// Put the slingshot bomb in flight just left of block (0, 0), moving right
    fn fly_into_first_block(s: &mut GameSession, kind: BombKind) -> (BombKey, RawContact) {
        let key = s.launcher.active.unwrap();
        s.select_bomb(kind);
        let target = s.grid.cell_center(0, 0);
        let bomb = &mut s.bombs[key];
        bomb.state = BombState::Launched;
        bomb.launched_at = Some(0);
        bomb.pos = target - Vec2::new(30.0, 0.0);
        bomb.vel = Vec2::new(1800.0, 0.0);
        bomb.record_velocity();
        let bounds = s.config.world.bounds();
        let contact = detect_contact(key, bomb.pos, bomb.radius, &s.grid, &bounds).unwrap();
        (key, contact)
    }

    #[test]
    fn test_blast_explodes_on_block() {
        let mut s = session(&[BlockKind::Standard]);
        let (key, contact) = fly_into_first_block(&mut s, BombKind::Blast);
        assert_eq!(s.dispatch_contact(contact), ContactRoute::Exploded);
        assert!(s.bomb(key).is_none());
        assert_eq!(s.grid.active_count(), 0);
    }

    #[test]
    fn test_flipped_contact_resolves_bomb_side() {
        let mut s = session(&[BlockKind::Standard]);
        let (_, contact) = fly_into_first_block(&mut s, BombKind::Blast);
        assert_eq!(s.dispatch_contact(contact.flipped()), ContactRoute::Exploded);
    }

    #[test]
    fn test_untracked_bomb_ignored() {
        let mut s = session(&[BlockKind::Standard]);
        let (key, contact) = fly_into_first_block(&mut s, BombKind::Blast);
        s.launcher.active = None;
        assert_eq!(s.dispatch_contact(contact), ContactRoute::Ignored);
        assert!(s.bomb(key).is_some());
    }

    #[test]
    fn test_sticky_sticks_and_frees_slingshot() {
        let mut s = session(&[BlockKind::Eternal]);
        let (key, contact) = fly_into_first_block(&mut s, BombKind::Sticky);
        assert_eq!(s.dispatch_contact(contact), ContactRoute::Stuck);
        assert_eq!(s.bombs[key].state, BombState::Stuck);
        assert_eq!(s.bombs[key].vel, Vec2::ZERO);
        assert_eq!(s.stuck, vec![key]);
        assert!(s.launcher.active.is_none());
        assert!(s.queue.has_pending_spawn());
    }

    #[test]
    fn test_driller_caches_velocity_and_bites() {
        let mut s = session(&[BlockKind::Strong, BlockKind::Standard, BlockKind::Standard]);
        let (key, contact) = fly_into_first_block(&mut s, BombKind::Driller);
        assert_eq!(s.dispatch_contact(contact), ContactRoute::DrillStarted);
        assert_eq!(s.grid.active_count(), 2);
        match &s.bombs[key].behavior {
            BombBehavior::Driller(state) => {
                assert_eq!(state.stored_velocity, Some(Vec2::new(1800.0, 0.0)));
                assert_eq!(state.blocks_drilled, 1);
            }
            other => panic!("unexpected behavior {other:?}"),
        }
        assert_eq!(s.dispatch_contact(contact), ContactRoute::Ignored);

        let mut steps = 0;
        while s.drill_step(key, crate::consts::SIM_DT) {
            steps += 1;
            assert!(steps < 1000);
        }
        assert_eq!(s.grid.active_count(), 0);
        assert!(s.bomb(key).is_none());
    }

    #[test]
    fn test_driller_stops_at_eternal() {
        let mut s = session(&[BlockKind::Eternal]);
        let (key, contact) = fly_into_first_block(&mut s, BombKind::Driller);
        assert_eq!(s.dispatch_contact(contact), ContactRoute::Finished);
        assert!(s.bomb(key).is_none());
        assert_eq!(s.grid.active_count(), 1);
    }

    #[test]
    fn test_ricochet_bounce_reflects_and_arms() {
        let mut s = session(&[BlockKind::Eternal]);
        let (key, contact) = fly_into_first_block(&mut s, BombKind::Ricochet);
        assert_eq!(s.dispatch_contact(contact), ContactRoute::Bounced);
        let bomb = &s.bombs[key];
        assert!(bomb.vel.x < 0.0);
        let speed = bomb.vel.length();
        assert!((1500.0..=2400.0).contains(&speed));
        match &bomb.behavior {
            BombBehavior::Ricochet(state) => {
                assert!(state.armed);
                assert_eq!(state.bounces, 1);
            }
            other => panic!("unexpected behavior {other:?}"),
        }
        assert_eq!(s.queue.len(), 1);

        // Same spot, same tick
        assert_eq!(s.dispatch_contact(contact), ContactRoute::Deduplicated);
    }

    #[test]
    fn test_ricochet_survives_unvalidated_negative_jitter() {
        let mut s = session(&[BlockKind::Eternal]);
        s.config.ricochet.restitution_jitter = -0.1;
        let (key, contact) = fly_into_first_block(&mut s, BombKind::Ricochet);
        assert_eq!(s.dispatch_contact(contact), ContactRoute::Bounced);
        let speed = s.bombs[key].vel.length();
        assert!((1500.0..=2400.0).contains(&speed));
    }

    #[test]
    fn test_ricochet_chips_block() {
        let mut s = session(&[BlockKind::Strong]);
        let (_, contact) = fly_into_first_block(&mut s, BombKind::Ricochet);
        s.dispatch_contact(contact);
        assert_eq!(s.grid.active_count(), 1);
        let (_, block) = s.grid.iter_active().next().unwrap();
        assert_eq!(block.health, crate::sim::grid::Health::Finite(1));
    }

    #[test]
    fn test_ricochet_explodes_at_bounce_cap() {
        let mut s = session(&[BlockKind::Eternal]);
        s.config.ricochet.max_bounces = 1;
        let (key, contact) = fly_into_first_block(&mut s, BombKind::Ricochet);
        assert_eq!(s.dispatch_contact(contact), ContactRoute::Finished);
        assert!(s.bomb(key).is_none());
    }

    #[test]
    fn test_wall_bounce_and_ricochet_wall_finish() {
        let mut s = session(&[BlockKind::Standard]);
        let key = s.launcher.active.unwrap();
        let floor = s.config.world.height;
        let bomb = &mut s.bombs[key];
        bomb.state = BombState::Launched;
        bomb.pos = Vec2::new(100.0, floor - 10.0);
        bomb.vel = Vec2::new(100.0, 400.0);
        let bounds = s.config.world.bounds();
        let contact = detect_contact(key, bomb.pos, bomb.radius, &s.grid, &bounds).unwrap();
        assert_eq!(s.dispatch_contact(contact), ContactRoute::WallBounce);
        assert!(s.bombs[key].vel.y < 0.0);

        s.bombs[key].state = BombState::AtRest;
        s.select_bomb(BombKind::Ricochet);
        s.bombs[key].state = BombState::Launched;
        s.bombs[key].vel = Vec2::new(0.0, 400.0);
        assert_eq!(s.dispatch_contact(contact), ContactRoute::Finished);
    }
}
