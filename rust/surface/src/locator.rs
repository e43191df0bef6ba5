// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Grid hash for radius queries over node positions.

use nalgebra::Point3;
use rustc_hash::FxHashMap;

type Cell = (i64, i64, i64);

/// Spatial hash of node indices.
///
/// Space is divided into cubic cells of side `cell_size`; a radius query
/// visits every cell the query sphere's bounding cube overlaps.
#[derive(Debug)]
pub struct NodeLocator {
    cell_size: f64,
    grid: FxHashMap<Cell, Vec<usize>>,
}

impl NodeLocator {
    /// Indexes `points`, skipping nodes where `include` is false.
    pub fn new(points: &[Point3<f64>], cell_size: f64, include: impl Fn(usize) -> bool) -> Self {
        let cell_size = if cell_size > 0.0 && cell_size.is_finite() {
            cell_size
        } else {
            1.0
        };
        let mut locator = Self {
            cell_size,
            grid: FxHashMap::default(),
        };
        for (i, p) in points.iter().enumerate() {
            if include(i) {
                let cell = locator.cell_coords(p);
                locator.grid.entry(cell).or_default().push(i);
            }
        }
        locator
    }

    /// Indices of indexed nodes within `radius` of `center`, in no
    /// particular order.
    pub fn points_within_radius(&self, points: &[Point3<f64>], center: &Point3<f64>, radius: f64) -> Vec<usize> {
        let reach = (radius / self.cell_size).ceil().max(0.0) as i64;
        let (cx, cy, cz) = self.cell_coords(center);
        let radius_sq = radius * radius;
        let mut found = Vec::new();

        for dx in -reach..=reach {
            for dy in -reach..=reach {
                for dz in -reach..=reach {
                    let Some(nodes) = self.grid.get(&(cx + dx, cy + dy, cz + dz)) else {
                        continue;
                    };
                    found.extend(
                        nodes
                            .iter()
                            .copied()
                            .filter(|&n| (points[n] - center).norm_squared() <= radius_sq),
                    );
                }
            }
        }
        found
    }

    fn cell_coords(&self, p: &Point3<f64>) -> Cell {
        (
            (p.x / self.cell_size).floor() as i64,
            (p.y / self.cell_size).floor() as i64,
            (p.z / self.cell_size).floor() as i64,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_points_within_radius() {
        let points: Vec<_> = (0..10).map(|i| Point3::new(i as f64, 0.0, 0.0)).collect();
        let locator = NodeLocator::new(&points, 1.5, |_| true);
        let mut near = locator.points_within_radius(&points, &Point3::new(4.2, 0.0, 0.0), 2.0);
        near.sort_unstable();
        assert_eq!(near, vec![3, 4, 5, 6]);
    }

    #[test]
    fn excluded_nodes_are_not_indexed() {
        let points = vec![Point3::origin(), Point3::new(0.1, 0.0, 0.0)];
        let locator = NodeLocator::new(&points, 1.0, |i| i != 0);
        assert_eq!(locator.points_within_radius(&points, &Point3::origin(), 1.0), vec![1]);
    }

    #[test]
    fn degenerate_cell_size_still_works() {
        let points = vec![Point3::new(-3.0, 2.0, 1.0)];
        let locator = NodeLocator::new(&points, 0.0, |_| true);
        assert_eq!(locator.points_within_radius(&points, &Point3::new(-3.0, 2.0, 1.5), 0.6), vec![0]);
    }
}
