//! Destructible block grid
//!
//! Owns every block of the current level. Blocks are never removed from the
//! arena during a level so stale handles keep resolving to an inactive block;
//! destroyed blocks are dropped from the spatial index instead.

use std::collections::HashMap;

use glam::Vec2;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use super::layout::GridCell;

slotmap::new_key_type! {
    /// Generational handle to a block
    pub struct BlockKey;
}

/// Block types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BlockKind {
    #[default]
    Standard,
    Strong,
    Dynamite,
    Eternal, // Cannot be destroyed
    Bouncy,
}

/// Remaining hit points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Health {
    Finite(u32),
    Indestructible,
}

impl Health {
    pub fn initial(kind: BlockKind, strong_health: u32) -> Self {
        match kind {
            BlockKind::Eternal => Health::Indestructible,
            BlockKind::Strong => Health::Finite(strong_health),
            _ => Health::Finite(1),
        }
    }
}

/// A block entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub row: i32,
    pub col: i32,
    /// Center in world space
    pub pos: Vec2,
    /// Edge length
    pub size: f32,
    pub kind: BlockKind,
    pub health: Health,
    pub active: bool,
}

impl Block {
    pub fn half_extent(&self) -> f32 {
        self.size / 2.0
    }

    pub fn min(&self) -> Vec2 {
        self.pos - Vec2::splat(self.half_extent())
    }

    pub fn max(&self) -> Vec2 {
        self.pos + Vec2::splat(self.half_extent())
    }

    pub fn is_eternal(&self) -> bool {
        self.kind == BlockKind::Eternal
    }
}

/// Outcome of [`BlockGrid::damage`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageResult {
    /// Block survived (Eternal blocks always land here)
    StillAlive { health: Health },
    Destroyed,
    AlreadyDestroyed,
}

/// Outcome of [`BlockGrid::destroy`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyResult {
    Destroyed,
    /// Eternal blocks refuse destruction
    Rejected,
    AlreadyDestroyed,
}

/// All blocks of a level plus a cell index of the active ones
#[derive(Debug, Clone, Default)]
pub struct BlockGrid {
    blocks: SlotMap<BlockKey, Block>,
    cells: HashMap<(i32, i32), BlockKey>,
    block_size: f32,
    origin: Vec2,
    initial_count: usize,
    active_count: usize,
}

impl BlockGrid {
    /// Build a grid from typed cells; the initial block count is fixed here
    pub fn new(
        cells: &[(GridCell, BlockKind)],
        block_size: f32,
        origin: Vec2,
        strong_health: u32,
    ) -> Self {
        let mut grid = Self {
            blocks: SlotMap::with_capacity_and_key(cells.len()),
            cells: HashMap::with_capacity(cells.len()),
            block_size,
            origin,
            initial_count: 0,
            active_count: 0,
        };

        for &(cell, kind) in cells {
            if grid.cells.contains_key(&(cell.row, cell.col)) {
                log::warn!("Duplicate grid cell ({}, {}) ignored", cell.row, cell.col);
                continue;
            }
            let block = Block {
                row: cell.row,
                col: cell.col,
                pos: grid.cell_center(cell.row, cell.col),
                size: block_size,
                kind,
                health: Health::initial(kind, strong_health),
                active: true,
            };
            let key = grid.blocks.insert(block);
            grid.cells.insert((cell.row, cell.col), key);
        }

        grid.initial_count = grid.blocks.len();
        grid.active_count = grid.initial_count;
        grid
    }

    /// World-space center of a cell
    pub fn cell_center(&self, row: i32, col: i32) -> Vec2 {
        self.origin + Vec2::new(col as f32 + 0.5, row as f32 + 0.5) * self.block_size
    }

    /// Cell containing a world point
    pub fn cell_at(&self, point: Vec2) -> (i32, i32) {
        let local = (point - self.origin) / self.block_size;
        (local.y.floor() as i32, local.x.floor() as i32)
    }

    pub fn block_size(&self) -> f32 {
        self.block_size
    }

    pub fn get(&self, key: BlockKey) -> Option<&Block> {
        self.blocks.get(key)
    }

    pub fn is_active(&self, key: BlockKey) -> bool {
        self.blocks.get(key).is_some_and(|b| b.active)
    }

    /// Active block occupying a cell
    pub fn block_at(&self, row: i32, col: i32) -> Option<BlockKey> {
        self.cells.get(&(row, col)).copied()
    }

    pub fn iter_active(&self) -> impl Iterator<Item = (BlockKey, &Block)> {
        self.blocks.iter().filter(|(_, b)| b.active)
    }

    pub fn initial_count(&self) -> usize {
        self.initial_count
    }

    pub fn active_count(&self) -> usize {
        self.active_count
    }

    pub fn count_active_kind(&self, kind: BlockKind) -> usize {
        self.iter_active().filter(|(_, b)| b.kind == kind).count()
    }

    /// Active blocks whose cells overlap an axis-aligned box, in row/col order
    pub fn keys_in_box(&self, min: Vec2, max: Vec2) -> Vec<BlockKey> {
        if self.cells.is_empty() {
            return Vec::new();
        }
        let (row_min, col_min) = self.cell_at(min);
        let (row_max, col_max) = self.cell_at(max);

        // Huge boxes: scan the index instead of walking empty cells
        let rows = i64::from(row_max) - i64::from(row_min) + 1;
        let cols = i64::from(col_max) - i64::from(col_min) + 1;
        if rows.saturating_mul(cols) > self.cells.len() as i64 * 4 {
            let mut hits: Vec<_> = self
                .cells
                .iter()
                .filter(|&(&(row, col), _)| {
                    (row_min..=row_max).contains(&row) && (col_min..=col_max).contains(&col)
                })
                .map(|(&cell, &key)| (cell, key))
                .collect();
            hits.sort_unstable_by_key(|&(cell, _)| cell);
            return hits.into_iter().map(|(_, key)| key).collect();
        }

        let mut keys = Vec::new();
        for row in row_min..=row_max {
            for col in col_min..=col_max {
                if let Some(&key) = self.cells.get(&(row, col)) {
                    keys.push(key);
                }
            }
        }
        keys
    }

    /// Active blocks whose centers lie within `radius` of `point`
    pub fn query_in_radius(&self, point: Vec2, radius: f32) -> Vec<BlockKey> {
        if radius < 0.0 {
            return Vec::new();
        }
        let reach = Vec2::splat(radius);
        let radius_sq = radius * radius;
        self.keys_in_box(point - reach, point + reach)
            .into_iter()
            .filter(|&key| {
                self.blocks
                    .get(key)
                    .is_some_and(|b| b.pos.distance_squared(point) <= radius_sq)
            })
            .collect()
    }

    /// Remove `amount` health; Eternal blocks are untouched
    pub fn damage(&mut self, key: BlockKey, amount: u32) -> DamageResult {
        let Some(block) = self.blocks.get_mut(key) else {
            return DamageResult::AlreadyDestroyed;
        };
        if !block.active {
            return DamageResult::AlreadyDestroyed;
        }
        match block.health {
            Health::Indestructible => DamageResult::StillAlive {
                health: Health::Indestructible,
            },
            Health::Finite(hp) => {
                let remaining = hp.saturating_sub(amount);
                block.health = Health::Finite(remaining);
                if remaining == 0 {
                    self.deactivate(key);
                    DamageResult::Destroyed
                } else {
                    DamageResult::StillAlive {
                        health: Health::Finite(remaining),
                    }
                }
            }
        }
    }

    /// Unconditionally destroy a block (Eternal blocks reject this)
    pub fn destroy(&mut self, key: BlockKey) -> DestroyResult {
        match self.blocks.get(key) {
            None => DestroyResult::AlreadyDestroyed,
            Some(b) if !b.active => DestroyResult::AlreadyDestroyed,
            Some(b) if b.is_eternal() => DestroyResult::Rejected,
            Some(_) => {
                self.deactivate(key);
                DestroyResult::Destroyed
            }
        }
    }

    fn deactivate(&mut self, key: BlockKey) {
        if let Some(block) = self.blocks.get_mut(key) {
            block.active = false;
            block.health = Health::Finite(0);
            self.cells.remove(&(block.row, block.col));
            self.active_count -= 1;
        }
    }

    /// Share of the original blocks that have been destroyed (0-100)
    pub fn reveal_percentage(&self) -> f32 {
        if self.initial_count == 0 {
            return 0.0;
        }
        let destroyed = self.initial_count - self.active_count;
        (destroyed as f32 / self.initial_count as f32 * 100.0).clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(cells: &[(i32, i32, BlockKind)]) -> BlockGrid {
        let typed: Vec<_> = cells
            .iter()
            .map(|&(row, col, kind)| (GridCell::new(row, col), kind))
            .collect();
        BlockGrid::new(&typed, 40.0, Vec2::ZERO, 2)
    }

    #[test]
    fn test_cell_geometry() {
        let g = grid(&[(0, 0, BlockKind::Standard)]);
        assert_eq!(g.cell_center(1, 2), Vec2::new(100.0, 60.0));
        assert_eq!(g.cell_at(Vec2::new(100.0, 60.0)), (1, 2));
        assert_eq!(g.cell_at(Vec2::new(-1.0, -1.0)), (-1, -1));
    }

    #[test]
    fn test_query_in_radius_uses_centers() {
        let g = grid(&[
            (0, 0, BlockKind::Standard),
            (0, 1, BlockKind::Standard),
            (0, 5, BlockKind::Standard),
        ]);
        // Centers at x = 20, 60, 220
        let hits = g.query_in_radius(Vec2::new(20.0, 20.0), 40.0);
        assert_eq!(hits.len(), 2);
        let none = g.query_in_radius(Vec2::new(1000.0, 1000.0), 50.0);
        assert!(none.is_empty());
    }

    #[test]
    fn test_huge_query_radius_scans_whole_grid() {
        let g = grid(&[(0, 0, BlockKind::Standard), (3, 7, BlockKind::Eternal)]);
        assert_eq!(g.query_in_radius(Vec2::ZERO, 1.0e12).len(), 2);
        assert_eq!(g.query_in_radius(Vec2::new(-1.0e30, 1.0e30), f32::MAX).len(), 2);
        assert_eq!(g.keys_in_box(Vec2::splat(f32::MIN), Vec2::splat(f32::MAX)).len(), 2);
    }

    #[test]
    fn test_damage_strong_block() {
        let mut g = grid(&[(0, 0, BlockKind::Strong)]);
        let key = g.block_at(0, 0).unwrap();
        assert_eq!(
            g.damage(key, 1),
            DamageResult::StillAlive {
                health: Health::Finite(1)
            }
        );
        assert_eq!(g.damage(key, 1), DamageResult::Destroyed);
        assert_eq!(g.damage(key, 1), DamageResult::AlreadyDestroyed);
        assert!(!g.is_active(key));
        assert!(g.block_at(0, 0).is_none());
    }

    #[test]
    fn test_eternal_is_immune() {
        let mut g = grid(&[(0, 0, BlockKind::Eternal)]);
        let key = g.block_at(0, 0).unwrap();
        assert!(matches!(g.damage(key, 100), DamageResult::StillAlive { .. }));
        assert_eq!(g.destroy(key), DestroyResult::Rejected);
        assert!(g.is_active(key));
        assert_eq!(g.get(key).unwrap().health, Health::Indestructible);
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut g = grid(&[(0, 0, BlockKind::Strong), (0, 1, BlockKind::Standard)]);
        let key = g.block_at(0, 0).unwrap();
        assert_eq!(g.destroy(key), DestroyResult::Destroyed);
        let after_first = (g.active_count(), g.reveal_percentage());
        assert_eq!(g.destroy(key), DestroyResult::AlreadyDestroyed);
        assert_eq!((g.active_count(), g.reveal_percentage()), after_first);
    }

    #[test]
    fn test_reveal_percentage() {
        let mut g = grid(&[
            (0, 0, BlockKind::Standard),
            (0, 1, BlockKind::Standard),
            (0, 2, BlockKind::Standard),
            (0, 3, BlockKind::Eternal),
        ]);
        assert_eq!(g.reveal_percentage(), 0.0);
        let key = g.block_at(0, 0).unwrap();
        g.destroy(key);
        assert!((g.reveal_percentage() - 25.0).abs() < 0.001);
        assert_eq!(g.initial_count(), 4);
    }

    #[test]
    fn test_duplicate_cells_collapse() {
        let g = grid(&[(2, 2, BlockKind::Standard), (2, 2, BlockKind::Strong)]);
        assert_eq!(g.initial_count(), 1);
    }

    #[test]
    fn test_empty_grid() {
        let g = grid(&[]);
        assert_eq!(g.reveal_percentage(), 0.0);
        assert!(g.query_in_radius(Vec2::ZERO, 500.0).is_empty());
    }
}
