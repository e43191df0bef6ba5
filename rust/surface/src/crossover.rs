// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Self-intersection ("crossover") detection.
//!
//! A crossover is a place where the surface folds over itself. Flat and
//! spherical surfaces have an expected tile orientation that can be checked
//! tile by tile; other surfaces are checked edge by edge by comparing the
//! two tiles that share each edge.

use nalgebra::Vector3;

use crate::error::Result;
use crate::geometry::{triangle_center, triangle_normal};
use crate::helper::HelperFacets;
use crate::surface::{CrossoverStatus, Surface, SurfaceType};

/// cos(30°): tiles tilted further than this from the expected direction are
/// crossovers.
const COS_30: f64 = 0.866;
/// cos(179°): adjacent tiles folded back onto each other.
const FOLDED: f64 = -0.999_847_7;
/// Edges shorter than this join coincident nodes.
const TOO_SHORT: f64 = 1e-5;

/// Strategy used by [`Surface::crossover_check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossoverMethod {
    /// Tile normals must point up (+Z).
    Flat,
    /// Tile normals must point away from the origin.
    Sphere,
    /// Adjacent tiles must not fold back onto each other.
    General,
}

impl CrossoverMethod {
    pub fn for_surface_type(surface_type: SurfaceType) -> Self {
        match surface_type {
            SurfaceType::Flat | SurfaceType::FlatLobar => CrossoverMethod::Flat,
            SurfaceType::Spherical => CrossoverMethod::Sphere,
            _ => CrossoverMethod::General,
        }
    }
}

/// Result of a crossover check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CrossoverReport {
    /// Tiles facing the wrong way (flat and sphere methods).
    pub tiles: usize,
    /// Edges whose two tiles fold back onto each other (general method).
    pub folded_edges: usize,
    /// Edges shared by more than two tiles, too short, or run the same
    /// direction by both tiles (general method).
    pub degenerate_edges: usize,
    /// Nodes whose status is [`CrossoverStatus::Yes`].
    pub nodes: usize,
}

impl Surface {
    /// Recomputes the per-node crossover status using the method chosen by
    /// `surface_type_hint`.
    pub fn crossover_check(&mut self, surface_type_hint: SurfaceType) -> Result<CrossoverReport> {
        let topology = self.require_topology()?.clone();
        self.reset_crossovers();
        let n = self.number_of_nodes();
        if n == 0 {
            return Ok(CrossoverReport::default());
        }

        let method = CrossoverMethod::for_surface_type(surface_type_hint);
        let points = self.coordinates.points();
        let mut status = vec![CrossoverStatus::No; n];
        let mut tiles = 0;
        let mut folded_edges = 0;
        let mut degenerate_edges = 0;

        match method {
            CrossoverMethod::Flat | CrossoverMethod::Sphere => {
                topology.with_tiles(|all| {
                    for &[a, b, c] in all {
                        let (Some(pa), Some(pb), Some(pc)) = (points.get(a), points.get(b), points.get(c)) else {
                            continue;
                        };
                        let normal = triangle_normal(pa, pb, pc).unwrap_or_else(Vector3::zeros);
                        let alignment = if method == CrossoverMethod::Flat {
                            normal.z
                        } else {
                            let ray = triangle_center(pa, pb, pc).coords;
                            normal.dot(&ray.try_normalize(0.0).unwrap_or_else(Vector3::zeros))
                        };
                        if alignment < COS_30 {
                            for node in [a, b, c] {
                                status[node] = CrossoverStatus::Yes;
                            }
                            tiles += 1;
                        }
                    }
                });
            }
            CrossoverMethod::General => {
                let helper = topology.helper(HelperFacets::EDGES);
                for edge in helper.edges() {
                    let (n1, n2) = edge.nodes;
                    let (Some(p1), Some(p2)) = (points.get(n1), points.get(n2)) else {
                        continue;
                    };
                    let mut found = CrossoverStatus::No;
                    if edge.used_by_more_than_two {
                        found = CrossoverStatus::DegenerateEdge;
                    } else if (p1 - p2).norm() < TOO_SHORT {
                        found = CrossoverStatus::DegenerateEdge;
                    } else if let [Some(t1), Some(t2)] = edge.tiles {
                        let normal = |t: usize| -> Vector3<f64> {
                            topology
                                .tile(t)
                                .and_then(|[a, b, c]| {
                                    triangle_normal(points.get(a)?, points.get(b)?, points.get(c)?)
                                })
                                .unwrap_or_else(Vector3::zeros)
                        };
                        let same_direction =
                            helper.edge_orientation_in_tile(n1, n2, t1) == helper.edge_orientation_in_tile(n1, n2, t2);
                        if same_direction {
                            found = CrossoverStatus::DegenerateEdge;
                        } else if normal(t1).dot(&normal(t2)) < FOLDED {
                            found = CrossoverStatus::Yes;
                        }
                    }
                    match found {
                        CrossoverStatus::No => continue,
                        CrossoverStatus::Yes => folded_edges += 1,
                        CrossoverStatus::DegenerateEdge => degenerate_edges += 1,
                    }
                    status[n1] = found;
                    status[n2] = found;
                }
            }
        }

        let nodes = status.iter().filter(|s| **s == CrossoverStatus::Yes).count();
        self.crossovers = status;
        self.coordinates.clear_display_cache();
        tracing::debug!(?method, tiles, folded_edges, degenerate_edges, nodes, "crossover check");
        Ok(CrossoverReport {
            tiles,
            folded_edges,
            degenerate_edges,
            nodes,
        })
    }

    /// Crossover score for an ellipsoid.
    ///
    /// Each node's expected outward direction is the normalized sign octant
    /// of its offset from the center of mass. Every ring triangle
    /// `(node, n_j, n_j+1)` whose normal points against it flags the node
    /// and adds 2 to the node's count; the count is divided by the node's
    /// neighbor count and the quotients are summed.
    pub fn ellipsoid_crossovers(&mut self) -> Result<f64> {
        let helper = self.helper(HelperFacets::SORTED)?;
        self.reset_crossovers();
        let com = self.center_of_mass();
        let points = self.coordinates.points();
        let sign = |v: f64| if v < 0.0 { -1.0 } else { 1.0 };

        let mut total = 0.0;
        let mut status = vec![CrossoverStatus::No; points.len()];
        for (i, p) in points.iter().enumerate() {
            let ring = helper.neighbors(i);
            if ring.len() < 2 {
                continue;
            }
            let offset = p - com;
            let outward = Vector3::new(sign(offset.x), sign(offset.y), sign(offset.z)).normalize();
            let mut count = 0usize;
            for j in 0..ring.len() {
                let (Some(p1), Some(p2)) = (points.get(ring[j]), points.get(ring[(j + 1) % ring.len()])) else {
                    continue;
                };
                let normal = triangle_normal(p, p1, p2).unwrap_or_else(Vector3::zeros);
                if outward.dot(&normal) < 0.0 {
                    status[i] = CrossoverStatus::Yes;
                    count += 2;
                }
            }
            total += count as f64 / ring.len() as f64;
        }
        self.crossovers = status;
        Ok(total)
    }

    /// Nodes currently flagged [`CrossoverStatus::Yes`].
    pub fn crossover_nodes(&self) -> Vec<usize> {
        self.crossovers()
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == CrossoverStatus::Yes)
            .map(|(i, _)| i)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{flat_grid, icosphere, tetrahedron};
    use crate::topology::{Topology, TopologyType};
    use nalgebra::Point3;
    use std::sync::Arc;

    #[test]
    fn clean_surfaces_have_no_crossovers() {
        let mut grid = flat_grid(3);
        assert_eq!(grid.crossover_check(SurfaceType::Flat).unwrap(), CrossoverReport::default());

        let mut sphere = icosphere(2, 3.0);
        assert_eq!(sphere.crossover_check(SurfaceType::Spherical).unwrap().nodes, 0);
        assert_eq!(sphere.crossover_check(SurfaceType::Fiducial).unwrap().nodes, 0);
        assert_eq!(sphere.ellipsoid_crossovers().unwrap(), 0.0);

        let mut tet = tetrahedron();
        assert_eq!(tet.crossover_check(SurfaceType::Fiducial).unwrap().nodes, 0);
    }

    #[test]
    fn folded_tile_pair_is_flagged() {
        // Two tiles sharing edge 0-1, the second folded flat onto the first.
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, 0.8, 0.0),
        ];
        let topology = Arc::new(Topology::from_tiles(vec![[0, 1, 2], [1, 0, 3]], TopologyType::Open));
        let mut surface = Surface::from_parts(points, topology, SurfaceType::Fiducial).unwrap();
        let report = surface.crossover_check(SurfaceType::Fiducial).unwrap();
        assert_eq!(report.folded_edges, 1);
        assert_eq!(report.degenerate_edges, 0);
        assert_eq!(report.tiles, 0);
        assert_eq!(report.nodes, 2);
        assert_eq!(surface.crossover_nodes(), vec![0, 1]);
    }

    #[test]
    fn inconsistent_orientation_is_degenerate() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, -1.0, 0.0),
        ];
        let topology = Arc::new(Topology::from_tiles(vec![[0, 1, 2], [0, 1, 3]], TopologyType::Open));
        let mut surface = Surface::from_parts(points, topology, SurfaceType::Raw).unwrap();
        let report = surface.crossover_check(SurfaceType::Raw).unwrap();
        assert_eq!(report.nodes, 0);
        assert_eq!(report.degenerate_edges, 1);
        assert_eq!(report.folded_edges, 0);
        assert_eq!(surface.crossovers()[0], CrossoverStatus::DegenerateEdge);
    }

    #[test]
    fn flat_fold_is_flagged() {
        let mut grid = flat_grid(2);
        // Push the center node past its right neighbor so two tiles flip over.
        grid.set_point(4, Point3::new(2.5, 1.0, 0.0));
        let report = grid.crossover_check(SurfaceType::Flat).unwrap();
        assert!(report.tiles > 0);
        assert_eq!(grid.crossovers()[4], CrossoverStatus::Yes);
    }

    #[test]
    fn inverted_sphere_tile_is_flagged() {
        let mut sphere = icosphere(1, 2.0);
        sphere.topology().unwrap().flip_tiles(&[0]);
        let report = sphere.crossover_check(SurfaceType::Spherical).unwrap();
        assert_eq!(report.tiles, 1);
        assert_eq!(report.nodes, 3);
        assert!(sphere.ellipsoid_crossovers().unwrap() > 0.0);
    }
}
