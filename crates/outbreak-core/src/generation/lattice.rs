//! Square grid that embeds graph nodes.

use serde::{Deserialize, Serialize};

/// Cell coordinates on the embedding grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPos {
    pub x: u32,
    pub y: u32,
}

impl GridPos {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Lattice distance, used for edge construction.
    pub fn manhattan(&self, other: &GridPos) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Diagonal neighbours count as adjacent; used for closeness.
    pub fn chebyshev(&self, other: &GridPos) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }
}

/// Occupied cells of a `side × side` grid, indexed by node id.
#[derive(Debug, Clone)]
pub struct Lattice {
    side: u32,
    positions: Vec<GridPos>,
    occupancy: Vec<Option<u32>>,
}

impl Lattice {
    /// Smallest side whose square holds `n` cells.
    pub fn side_for(n: usize) -> u32 {
        let mut side = (n as f64).sqrt().ceil() as u32;
        while (side as usize) * (side as usize) < n {
            side += 1;
        }
        while side > 0 && ((side - 1) as usize) * ((side - 1) as usize) >= n {
            side -= 1;
        }
        side
    }

    pub fn new(positions: Vec<GridPos>) -> Self {
        let side = positions
            .iter()
            .map(|p| p.x.max(p.y) + 1)
            .max()
            .unwrap_or(0);
        let mut occupancy = vec![None; (side as usize) * (side as usize)];
        for (id, pos) in positions.iter().enumerate() {
            occupancy[(pos.y * side + pos.x) as usize] = Some(id as u32);
        }
        Self {
            side,
            positions,
            occupancy,
        }
    }

    pub fn side(&self) -> u32 {
        self.side
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn position(&self, node: u32) -> GridPos {
        self.positions[node as usize]
    }

    pub fn positions(&self) -> &[GridPos] {
        &self.positions
    }

    pub fn node_at(&self, x: i64, y: i64) -> Option<u32> {
        let side = self.side as i64;
        if x < 0 || y < 0 || x >= side || y >= side {
            return None;
        }
        self.occupancy[(y * side + x) as usize]
    }

    /// Nodes within Chebyshev distance `radius` of `node`, excluding itself.
    pub fn within_chebyshev(&self, node: u32, radius: u32) -> Vec<u32> {
        let centre = self.position(node);
        let r = radius as i64;
        let (cx, cy) = (centre.x as i64, centre.y as i64);
        let mut found = Vec::new();
        for y in (cy - r).max(0)..=(cy + r).min(self.side as i64 - 1) {
            for x in (cx - r).max(0)..=(cx + r).min(self.side as i64 - 1) {
                if let Some(other) = self.node_at(x, y) {
                    if other != node {
                        found.push(other);
                    }
                }
            }
        }
        found.sort_unstable();
        found
    }

    /// Nodes within Manhattan distance `radius` of `node`, excluding itself.
    pub fn within_manhattan(&self, node: u32, radius: u32) -> Vec<u32> {
        let centre = self.position(node);
        let r = radius as i64;
        let (cx, cy) = (centre.x as i64, centre.y as i64);
        let mut found = Vec::new();
        for dy in -r..=r {
            let span = r - dy.abs();
            for dx in -span..=span {
                if let Some(other) = self.node_at(cx + dx, cy + dy) {
                    if other != node {
                        found.push(other);
                    }
                }
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_grid(side: u32) -> Lattice {
        let mut cells = Vec::new();
        for y in 0..side {
            for x in 0..side {
                cells.push(GridPos::new(x, y));
            }
        }
        Lattice::new(cells)
    }

    #[test]
    fn test_side_for() {
        assert_eq!(Lattice::side_for(0), 0);
        assert_eq!(Lattice::side_for(1), 1);
        assert_eq!(Lattice::side_for(4), 2);
        assert_eq!(Lattice::side_for(5), 3);
        assert_eq!(Lattice::side_for(200), 15);
    }

    #[test]
    fn test_distances() {
        let a = GridPos::new(1, 1);
        let b = GridPos::new(3, 2);
        assert_eq!(a.manhattan(&b), 3);
        assert_eq!(a.chebyshev(&b), 2);
    }

    #[test]
    fn test_neighbourhoods_on_full_grid() {
        let grid = full_grid(3);
        // Centre cell is node 4
        assert_eq!(grid.within_chebyshev(4, 1).len(), 8);
        assert_eq!(grid.within_manhattan(4, 1).len(), 4);
        // Corner cell
        assert_eq!(grid.within_chebyshev(0, 1), vec![1, 3, 4]);
        assert_eq!(grid.within_manhattan(0, 1).len(), 2);
        assert_eq!(grid.within_chebyshev(0, 5).len(), 8);
    }

    #[test]
    fn test_missing_cells_are_skipped() {
        let grid = Lattice::new(vec![GridPos::new(0, 0), GridPos::new(1, 1)]);
        assert_eq!(grid.side(), 2);
        assert_eq!(grid.node_at(1, 0), None);
        assert_eq!(grid.within_chebyshev(0, 1), vec![1]);
        assert!(grid.within_manhattan(0, 1).is_empty());
    }
}
