//! Deferred actions
//!
//! Chain explosions, ricochet fuses and bomb respawns are queued as
//! `{fire_at, payload}` records and drained by the tick loop. Payloads that
//! name a bomb are re-validated against the arena before they run.

use std::collections::BTreeMap;

use super::bomb::BombKey;
use super::explosion::ExplosionEvent;

/// Something that should happen on a later tick
#[derive(Debug, Clone, PartialEq)]
pub enum Deferred {
    /// Chained or staggered explosion
    Explosion(ExplosionEvent),
    /// Ricochet self-destruct fuse
    RicochetTimeout(BombKey),
    /// Put the next bomb in the slingshot
    SpawnBomb,
}

impl Deferred {
    pub fn is_explosion(&self) -> bool {
        matches!(self, Deferred::Explosion(_))
    }
}

/// Tick-ordered queue; equal ticks fire in insertion order
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    pending: BTreeMap<(u64, u64), Deferred>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, fire_at: u64, payload: Deferred) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.insert((fire_at, seq), payload);
    }

    /// Schedule `delay` ticks after `now` (at least one tick later)
    pub fn schedule_in(&mut self, now: u64, delay: u64, payload: Deferred) {
        self.schedule(now + delay.max(1), payload);
    }

    /// Pop the earliest payload due at or before `now`
    pub fn pop_due(&mut self, now: u64) -> Option<Deferred> {
        let (&(fire_at, _), _) = self.pending.first_key_value()?;
        if fire_at > now {
            return None;
        }
        self.pending.pop_first().map(|(_, payload)| payload)
    }

    /// Drop everything (level reset)
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Drop timers that reference a bomb
    pub fn cancel_for_bomb(&mut self, bomb: BombKey) {
        self.pending
            .retain(|_, payload| {
                !matches!(payload, Deferred::RicochetTimeout(key) if *key == bomb)
            });
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn has_pending_explosions(&self) -> bool {
        self.pending.values().any(Deferred::is_explosion)
    }

    pub fn has_pending_spawn(&self) -> bool {
        self.pending.values().any(|p| matches!(p, Deferred::SpawnBomb))
    }

    /// Tick of the earliest pending payload
    pub fn next_fire_tick(&self) -> Option<u64> {
        self.pending.keys().next().map(|&(tick, _)| tick)
    }
}
