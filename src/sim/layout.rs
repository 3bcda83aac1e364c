//! Level layouts
//!
//! A layout generator only says *which* cells hold a block. Block types are
//! assigned here with a seeded RNG: a fixed number of Dynamite cells first,
//! then a percentage roll per remaining cell.

use std::collections::BTreeSet;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::grid::BlockKind;
use crate::config::TypeWeights;

/// A populated grid position
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GridCell {
    pub row: i32,
    pub col: i32,
}

impl GridCell {
    pub fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }
}

/// Source of the cells to populate (image silhouettes, hand-made levels, ...)
pub trait LayoutGenerator {
    fn cells(&self) -> Vec<GridCell>;
}

impl LayoutGenerator for Vec<GridCell> {
    fn cells(&self) -> Vec<GridCell> {
        self.clone()
    }
}

/// Solid rectangle of `rows` x `cols`
#[derive(Debug, Clone, Copy)]
pub struct RectLayout {
    pub rows: i32,
    pub cols: i32,
}

impl LayoutGenerator for RectLayout {
    fn cells(&self) -> Vec<GridCell> {
        (0..self.rows)
            .flat_map(|row| (0..self.cols).map(move |col| GridCell::new(row, col)))
            .collect()
    }
}

/// Silhouette drawn as text: `#` marks a populated cell, anything else is empty
#[derive(Debug, Clone)]
pub struct MaskLayout {
    cells: Vec<GridCell>,
}

impl MaskLayout {
    pub fn parse(mask: &str) -> Self {
        let cells = mask
            .lines()
            .enumerate()
            .flat_map(|(row, line)| {
                line.chars()
                    .enumerate()
                    .filter(|&(_, c)| c == '#')
                    .map(move |(col, _)| GridCell::new(row as i32, col as i32))
            })
            .collect();
        Self { cells }
    }
}

impl LayoutGenerator for MaskLayout {
    fn cells(&self) -> Vec<GridCell> {
        self.cells.clone()
    }
}

/// Assign block types to a cell set.
///
/// Cells are deduplicated and sorted so the same seed always produces the
/// same level. Exactly `weights.dynamite_count` cells become Dynamite (all of
/// them when there are fewer cells).
pub fn assign_kinds<R: Rng + ?Sized>(
    cells: &[GridCell],
    weights: &TypeWeights,
    rng: &mut R,
) -> Vec<(GridCell, BlockKind)> {
    let cells: Vec<GridCell> = cells.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
    let dynamite_count = weights.dynamite_count.min(cells.len());
    let dynamite: BTreeSet<usize> =
        rand::seq::index::sample(rng, cells.len(), dynamite_count).into_iter().collect();

    let strong_below = weights.strong_percent;
    let eternal_below = strong_below + weights.eternal_percent;
    let bouncy_below = eternal_below + weights.bouncy_percent;

    cells
        .into_iter()
        .enumerate()
        .map(|(i, cell)| {
            if dynamite.contains(&i) {
                return (cell, BlockKind::Dynamite);
            }
            let roll = rng.random_range(0..100u32);
            let kind = if roll < strong_below {
                BlockKind::Strong
            } else if roll < eternal_below {
                BlockKind::Eternal
            } else if roll < bouncy_below {
                BlockKind::Bouncy
            } else {
                BlockKind::Standard
            };
            (cell, kind)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn test_rect_layout() {
        let cells = RectLayout { rows: 2, cols: 3 }.cells();
        assert_eq!(cells.len(), 6);
        assert!(cells.contains(&GridCell::new(1, 2)));
    }

    #[test]
    fn test_mask_layout() {
        let mask = MaskLayout::parse(".#.\n###\n");
        let cells = mask.cells();
        assert_eq!(cells.len(), 4);
        assert!(cells.contains(&GridCell::new(0, 1)));
        assert!(!cells.contains(&GridCell::new(0, 0)));
    }

    #[test]
    fn test_exactly_three_dynamite() {
        let mut rng = Pcg32::seed_from_u64(7);
        let cells = RectLayout { rows: 10, cols: 10 }.cells();
        let typed = assign_kinds(&cells, &TypeWeights::default(), &mut rng);
        assert_eq!(typed.len(), 100);
        let dynamite = typed.iter().filter(|(_, k)| *k == BlockKind::Dynamite).count();
        assert_eq!(dynamite, 3);
    }

    #[test]
    fn test_weights_roughly_hold() {
        let mut rng = Pcg32::seed_from_u64(42);
        let cells = RectLayout { rows: 100, cols: 100 }.cells();
        let typed = assign_kinds(&cells, &TypeWeights::default(), &mut rng);
        let share = |kind| {
            typed.iter().filter(|(_, k)| *k == kind).count() as f32 / typed.len() as f32
        };
        assert!((share(BlockKind::Strong) - 0.10).abs() < 0.02);
        assert!((share(BlockKind::Eternal) - 0.05).abs() < 0.02);
        assert!((share(BlockKind::Bouncy) - 0.05).abs() < 0.02);
    }

    #[test]
    fn test_small_layout_all_dynamite() {
        let mut rng = Pcg32::seed_from_u64(1);
        let cells = vec![GridCell::new(0, 0), GridCell::new(0, 1), GridCell::new(0, 1)];
        let typed = assign_kinds(&cells, &TypeWeights::default(), &mut rng);
        assert_eq!(typed.len(), 2);
        assert!(typed.iter().all(|(_, k)| *k == BlockKind::Dynamite));
    }

    #[test]
    fn test_same_seed_same_level() {
        let cells = RectLayout { rows: 6, cols: 6 }.cells();
        let a = assign_kinds(&cells, &TypeWeights::default(), &mut Pcg32::seed_from_u64(9));
        let b = assign_kinds(&cells, &TypeWeights::default(), &mut Pcg32::seed_from_u64(9));
        assert_eq!(a, b);
    }
}
