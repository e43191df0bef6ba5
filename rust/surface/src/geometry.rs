// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometric queries on surfaces.
//!
//! Normals, tile and node areas, bounds, center of mass and node spacing.
//! Queries that are defined over "connected" nodes skip nodes that no tile
//! uses; such nodes are leftovers of island removal and sit at arbitrary
//! positions.

use nalgebra::{Point3, Vector3};

use crate::helper::HelperFacets;
use crate::surface::Surface;

/// Area of triangle `abc`.
pub fn triangle_area(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    (b - a).cross(&(c - a)).norm() * 0.5
}

/// Unit normal of triangle `abc` following the right-hand rule, or `None`
/// for a degenerate triangle.
pub fn triangle_normal(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> Option<Vector3<f64>> {
    let n = (b - a).cross(&(c - a));
    let len = n.norm();
    if len < 1e-15 {
        return None; // degenerate tile
    }
    Some(n / len)
}

/// Centroid of triangle `abc`.
pub fn triangle_center(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> Point3<f64> {
    Point3::from((a.coords + b.coords + c.coords) / 3.0)
}

/// Signed area of `abc` projected onto the XY plane; positive when
/// counter-clockwise.
pub fn signed_area_2d(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    0.5 * ((b.x - a.x) * (c.y - a.y) - (c.x - a.x) * (b.y - a.y))
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min: Point3::origin(),
            max: Point3::origin(),
        }
    }
}

impl Bounds {
    /// Bounds of a point set; all zero when empty.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3<f64>>) -> Self {
        let mut iter = points.into_iter();
        let Some(first) = iter.next() else {
            return Self::default();
        };
        let mut bounds = Self {
            min: *first,
            max: *first,
        };
        for p in iter {
            bounds.min = bounds.min.inf(p);
            bounds.max = bounds.max.sup(p);
        }
        bounds
    }

    pub fn extent(&self) -> Vector3<f64> {
        self.max - self.min
    }

    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }
}

impl Surface {
    // --- Normals ---

    /// Recomputes node normals as the normalized average of the normals of
    /// the tiles using each node. Nodes without (non-degenerate) tiles get
    /// a zero normal.
    pub fn compute_normals(&mut self) {
        let n = self.number_of_nodes();
        if self.normals.len() != n {
            self.normals = vec![Vector3::z(); n];
        }
        let Some(topology) = self.topology().cloned() else {
            return;
        };

        let mut sums = vec![Vector3::zeros(); n];
        let points = self.coordinates.points();
        topology.with_tiles(|tiles| {
            for &[a, b, c] in tiles {
                if a >= n || b >= n || c >= n {
                    continue;
                }
                if let Some(normal) = triangle_normal(&points[a], &points[b], &points[c]) {
                    sums[a] += normal;
                    sums[b] += normal;
                    sums[c] += normal;
                }
            }
        });

        for (normal, sum) in self.normals.iter_mut().zip(sums) {
            let len = sum.norm();
            *normal = if len > 0.0 { sum / len } else { Vector3::zeros() };
        }
    }

    // --- Areas ---

    /// Unit normal of a tile, `None` for degenerate tiles or a bad index.
    pub fn tile_normal(&self, tile: usize) -> Option<Vector3<f64>> {
        let [a, b, c] = self.topology()?.tile(tile)?;
        let points = self.coordinates.points();
        triangle_normal(points.get(a)?, points.get(b)?, points.get(c)?)
    }

    /// Area of a tile; zero for a bad index.
    pub fn tile_area(&self, tile: usize) -> f64 {
        let Some([a, b, c]) = self.topology().and_then(|t| t.tile(tile)) else {
            return 0.0;
        };
        let points = self.coordinates.points();
        match (points.get(a), points.get(b), points.get(c)) {
            (Some(pa), Some(pb), Some(pc)) => triangle_area(pa, pb, pc),
            _ => 0.0,
        }
    }

    /// Area of every tile, in tile order.
    pub fn area_of_all_tiles(&self) -> Vec<f64> {
        let Some(topology) = self.topology() else {
            return Vec::new();
        };
        let points = self.coordinates.points();
        topology.with_tiles(|tiles| {
            tiles
                .iter()
                .map(|&[a, b, c]| match (points.get(a), points.get(b), points.get(c)) {
                    (Some(pa), Some(pb), Some(pc)) => triangle_area(pa, pb, pc),
                    _ => 0.0,
                })
                .collect()
        })
    }

    /// Area attributed to each node: a third of the area of each tile that
    /// uses it.
    pub fn area_of_all_nodes(&self) -> Vec<f64> {
        let mut node_areas = vec![0.0; self.number_of_nodes()];
        let Some(topology) = self.topology() else {
            return node_areas;
        };
        let tile_areas = self.area_of_all_tiles();
        topology.with_tiles(|tiles| {
            for (tile, area) in tiles.iter().zip(tile_areas) {
                for &n in tile {
                    if let Some(slot) = node_areas.get_mut(n) {
                        *slot += area / 3.0;
                    }
                }
            }
        });
        node_areas
    }

    /// Total area of all tiles.
    pub fn surface_area(&self) -> f64 {
        self.area_of_all_tiles().iter().sum()
    }

    // --- Extents ---

    /// Bounds of the connected nodes; all zero when no node is connected.
    pub fn bounds(&self) -> Bounds {
        let connected = self.connected_mask();
        Bounds::from_points(
            self.coordinates
                .points()
                .iter()
                .zip(connected)
                .filter(|(_, c)| *c)
                .map(|(p, _)| p),
        )
    }

    /// Bounds of every node, connected or not.
    pub fn all_coordinate_bounds(&self) -> Bounds {
        Bounds::from_points(self.coordinates.points())
    }

    /// Mean position of the connected nodes; the origin when there are none.
    pub fn center_of_mass(&self) -> Point3<f64> {
        let connected = self.connected_mask();
        let mut sum = Vector3::zeros();
        let mut count = 0usize;
        for (p, c) in self.coordinates.points().iter().zip(connected) {
            if c {
                sum += p.coords;
                count += 1;
            }
        }
        if count == 0 {
            return Point3::origin();
        }
        Point3::from(sum / count as f64)
    }

    /// Distance from the origin of the first connected node; zero when no
    /// node is connected.
    pub fn spherical_surface_radius(&self) -> f64 {
        let connected = self.connected_mask();
        self.coordinates
            .points()
            .iter()
            .zip(connected)
            .find(|(_, c)| *c)
            .map_or(0.0, |(p, _)| p.coords.norm())
    }

    /// Average over nodes of the mean distance to their neighbors.
    ///
    /// With a mask, only masked nodes and masked neighbors count. Nodes with
    /// fewer than two counted neighbors contribute nothing but still count
    /// in the divisor.
    pub fn mean_distance_between_nodes(&self, mask: Option<&[bool]>) -> f64 {
        let Ok(helper) = self.helper(HelperFacets::NODES) else {
            return 0.0;
        };
        let points = self.coordinates.points();
        let num_nodes = helper.number_of_nodes().min(points.len());
        let selected = |n: usize| mask.map_or(true, |m| m.get(n).copied().unwrap_or(false));

        let mut total = 0.0;
        for i in (0..num_nodes).filter(|&i| selected(i)) {
            let mut dist = 0.0;
            let mut count = 0usize;
            for &n in helper.neighbors(i) {
                if n < points.len() && selected(n) {
                    dist += (points[i] - points[n]).norm();
                    count += 1;
                }
            }
            if count > 1 {
                total += dist / count as f64;
            }
        }
        if num_nodes > 1 {
            total /= num_nodes as f64;
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{flat_grid, icosphere, tetrahedron};
    use approx::assert_relative_eq;

    #[test]
    fn triangle_primitives() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(2.0, 0.0, 0.0);
        let c = Point3::new(0.0, 2.0, 0.0);
        assert_relative_eq!(triangle_area(&a, &b, &c), 2.0);
        assert_relative_eq!(triangle_normal(&a, &b, &c).unwrap(), Vector3::z());
        assert!(triangle_normal(&a, &a, &c).is_none());
        assert_relative_eq!(signed_area_2d(&a, &b, &c), 2.0);
        assert_relative_eq!(signed_area_2d(&a, &c, &b), -2.0);
        assert_relative_eq!(triangle_center(&a, &b, &c), Point3::new(2.0 / 3.0, 2.0 / 3.0, 0.0));
    }

    #[test]
    fn tile_areas_sum_to_surface_area() {
        for surface in [tetrahedron(), icosphere(2, 3.0), flat_grid(4)] {
            let sum: f64 = surface.area_of_all_tiles().iter().sum();
            assert_relative_eq!(sum, surface.surface_area(), epsilon = 1e-9);
            let nodes: f64 = surface.area_of_all_nodes().iter().sum();
            assert_relative_eq!(nodes, surface.surface_area(), epsilon = 1e-9);
        }
        assert_relative_eq!(flat_grid(4).surface_area(), 16.0, epsilon = 1e-12);
    }

    #[test]
    fn normals_point_outward() {
        let sphere = icosphere(1, 2.0);
        for (p, n) in sphere.coordinates().points().iter().zip(sphere.normals()) {
            assert!(p.coords.normalize().dot(n) > 0.9);
        }
        let grid = flat_grid(2);
        assert_relative_eq!(grid.normal(4), Vector3::z(), epsilon = 1e-12);
    }

    #[test]
    fn bounds_skip_disconnected_nodes() {
        let mut grid = flat_grid(2);
        grid.add_node(Point3::new(100.0, -50.0, 7.0));
        let bounds = grid.bounds();
        assert_relative_eq!(bounds.min, Point3::new(0.0, 0.0, 0.0));
        assert_relative_eq!(bounds.max, Point3::new(2.0, 2.0, 0.0));
        assert_relative_eq!(grid.all_coordinate_bounds().max.x, 100.0);
        assert_relative_eq!(grid.center_of_mass(), Point3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn empty_surface_extents_are_zero() {
        let surface = Surface::default();
        assert_eq!(surface.bounds(), Bounds::default());
        assert_eq!(surface.center_of_mass(), Point3::origin());
        assert_eq!(surface.spherical_surface_radius(), 0.0);
        assert_eq!(surface.surface_area(), 0.0);
    }

    #[test]
    fn sphere_radius_and_spacing() {
        let sphere = icosphere(2, 5.0);
        assert_relative_eq!(sphere.spherical_surface_radius(), 5.0, epsilon = 1e-12);
        let spacing = sphere.mean_distance_between_nodes(None);
        assert!(spacing > 0.0 && spacing < 5.0);

        // Unit grid: every neighbor is 1 or sqrt(2) away.
        let grid = flat_grid(3);
        let d = grid.mean_distance_between_nodes(None);
        assert!(d > 0.5 && d < std::f64::consts::SQRT_2);
    }
}
