// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Iterative mesh relaxation.
//!
//! Every variant runs the same loop: for iteration `k` in `1..=iterations`
//! each participating node moves to `old * (1 - s) + target * s`, where the
//! target depends on the variant. All new positions are computed from the
//! previous iteration's positions before any is written back.
//!
//! Edge nodes (touching a boundary edge) only move on iterations where
//! `k % edges_every == 0`, and every node is pushed back onto the initial
//! sphere radius when `k % project_every == 0`. A cadence of zero disables
//! the corresponding step.

use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use rustc_hash::FxHashSet;

use crate::connectivity::NodeClass;
use crate::error::{Error, Result};
use crate::geometry::{signed_area_2d, triangle_area, triangle_center};
use crate::helper::HelperFacets;
use crate::locator::NodeLocator;
use crate::surface::{CrossoverStatus, Surface, SurfaceType};

/// Parameters of [`Surface::smooth_out_surface_crossovers`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossoverSmoothing {
    pub strength: f64,
    pub cycles: usize,
    pub iterations_per_cycle: usize,
    pub edges_every: usize,
    pub project_every: usize,
    /// Rings of neighbors around each crossover that are smoothed too.
    pub neighbor_depth: usize,
}

impl Default for CrossoverSmoothing {
    fn default() -> Self {
        Self {
            strength: 1.0,
            cycles: 10,
            iterations_per_cycle: 10,
            edges_every: 10,
            project_every: 0,
            neighbor_depth: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LandmarkRole {
    Normal,
    Landmark,
    /// Not a landmark, with this many landmark neighbors.
    Neighbor(usize),
}

/// Double-buffered positions for one relaxation run.
struct Relaxation {
    current: Vec<Point3<f64>>,
    next: Vec<Point3<f64>>,
    parallel: bool,
}

impl Relaxation {
    fn new(points: &[Point3<f64>], parallel_min_nodes: usize) -> Self {
        Self {
            current: points.to_vec(),
            next: points.to_vec(),
            parallel: points.len() >= parallel_min_nodes,
        }
    }

    /// Computes every node's new position from the current buffer, then
    /// swaps buffers.
    fn step<F>(&mut self, update: F)
    where
        F: Fn(usize, &[Point3<f64>]) -> Point3<f64> + Sync,
    {
        let current = self.current.as_slice();
        if self.parallel {
            self.next
                .par_iter_mut()
                .enumerate()
                .for_each(|(i, out)| *out = update(i, current));
        } else {
            for (i, out) in self.next.iter_mut().enumerate() {
                *out = update(i, current);
            }
        }
        std::mem::swap(&mut self.current, &mut self.next);
    }

    fn project_to_sphere(&mut self, radius: f64) {
        for p in &mut self.current {
            *p = with_length(p, radius);
        }
    }

    fn finish(self) -> Vec<Point3<f64>> {
        self.current
    }
}

fn every(k: usize, cadence: usize) -> bool {
    cadence > 0 && k % cadence == 0
}

fn blend(old: &Point3<f64>, target: &Point3<f64>, strength: f64) -> Point3<f64> {
    if strength == 0.0 {
        return *old;
    }
    Point3::from(old.coords * (1.0 - strength) + target.coords * strength)
}

fn with_length(p: &Point3<f64>, radius: f64) -> Point3<f64> {
    let len = p.coords.norm();
    if len > 0.0 {
        Point3::from(p.coords * (radius / len))
    } else {
        *p
    }
}

fn neighbor_mean(points: &[Point3<f64>], neighbors: &[usize]) -> Option<Point3<f64>> {
    let (sum, count) = neighbors
        .iter()
        .filter_map(|&n| points.get(n))
        .fold((Vector3::zeros(), 0usize), |(acc, count), p| (acc + p.coords, count + 1));
    (count > 0).then(|| Point3::from(sum / count as f64))
}

/// Area-weighted mean of the centers of the triangles `(node, n_j, n_j+1)`
/// around the ring, or `None` when the ring has no area.
fn areal_target(points: &[Point3<f64>], node: usize, ring: &[usize]) -> Option<Point3<f64>> {
    let len = ring.len();
    if len < 2 {
        return None;
    }
    let p = &points[node];
    let mut total = 0.0;
    let mut weighted = Vector3::zeros();
    for j in 0..len {
        let (Some(p1), Some(p2)) = (points.get(ring[j]), points.get(ring[(j + 1) % len])) else {
            continue;
        };
        let area = triangle_area(p, p1, p2);
        if area > 0.0 {
            total += area;
            weighted += triangle_center(p, p1, p2).coords * area;
        }
    }
    (total > 0.0).then(|| Point3::from(weighted / total))
}

/// The mask when it covers every node; otherwise no mask.
fn subset(mask: Option<&[bool]>, nodes: usize) -> Option<&[bool]> {
    mask.filter(|m| m.len() == nodes)
}

impl Surface {
    /// Recomputes node classification and returns `true` for interior nodes.
    fn interior_flags(&mut self) -> Result<Vec<bool>> {
        Ok(self
            .classify_nodes()?
            .iter()
            .map(|c| *c == NodeClass::Interior)
            .collect())
    }

    fn check_landmarks(&self, landmarks: &[bool]) -> Result<()> {
        if landmarks.len() != self.number_of_nodes() {
            return Err(Error::MalformedInput(format!(
                "{} landmark flags for {} nodes",
                landmarks.len(),
                self.number_of_nodes()
            )));
        }
        Ok(())
    }

    fn finish_smoothing(&mut self, points: Vec<Point3<f64>>) {
        self.coordinates.set_points(points);
        self.compute_normals();
    }

    /// Moves nodes toward the mean of their neighbors.
    ///
    /// `mask`, when its length equals the node count, limits smoothing to
    /// the flagged nodes.
    pub fn linear_smoothing(
        &mut self,
        strength: f64,
        iterations: usize,
        edges_every: usize,
        mask: Option<&[bool]>,
        project_every: usize,
    ) -> Result<()> {
        let helper = self.helper(HelperFacets::NODES)?;
        let interior = self.interior_flags()?;
        let n = self.number_of_nodes();
        if n == 0 {
            return Ok(());
        }
        let mask = subset(mask, n);
        let radius = self.spherical_surface_radius();
        let mut relax = Relaxation::new(self.coordinates.points(), self.config().parallel_min_nodes);

        for k in 1..=iterations {
            let edges = every(k, edges_every);
            relax.step(|i, points| {
                let old = points[i];
                let selected = (interior[i] || edges) && mask.map_or(true, |m| m[i]);
                if !selected {
                    return old;
                }
                neighbor_mean(points, helper.neighbors(i)).map_or(old, |mean| blend(&old, &mean, strength))
            });
            if every(k, project_every) {
                relax.project_to_sphere(radius);
            }
        }

        tracing::debug!(strength, iterations, edges_every, project_every, "linear smoothing");
        self.finish_smoothing(relax.finish());
        Ok(())
    }

    /// Moves nodes toward the area-weighted centroid of the triangles
    /// around them. Nodes whose ring is unsorted still use their neighbor
    /// order; nodes with fewer than two neighbors stay put.
    pub fn areal_smoothing(
        &mut self,
        strength: f64,
        iterations: usize,
        edges_every: usize,
        mask: Option<&[bool]>,
        project_every: usize,
    ) -> Result<()> {
        let topology = self.require_topology()?.clone();
        let interior = self.interior_flags()?;
        let n = self.number_of_nodes();
        if n == 0 || topology.number_of_tiles() == 0 {
            return Ok(());
        }
        let helper = topology.helper(HelperFacets::SORTED);
        let mask = subset(mask, n);
        let radius = self.spherical_surface_radius();
        let mut relax = Relaxation::new(self.coordinates.points(), self.config().parallel_min_nodes);

        for k in 1..=iterations {
            let edges = every(k, edges_every);
            relax.step(|i, points| {
                let old = points[i];
                let selected = (interior[i] || edges) && mask.map_or(true, |m| m[i]);
                if !selected {
                    return old;
                }
                areal_target(points, i, helper.neighbors(i)).map_or(old, |target| blend(&old, &target, strength))
            });
            if every(k, project_every) {
                relax.project_to_sphere(radius);
            }
        }

        tracing::debug!(strength, iterations, edges_every, project_every, "areal smoothing");
        self.finish_smoothing(relax.finish());
        Ok(())
    }

    /// Linear smoothing that keeps landmark nodes fixed and holds their
    /// neighbors a short distance outside them.
    ///
    /// For each landmark `L` in a node's ring with ring neighbors `A` and
    /// `B`, the node is pulled toward `L + scale * normalize(2L - A - B)`;
    /// these pulls are averaged with the plain neighbor mean. `scale` is the
    /// length of the first link between two non-landmark nodes over
    /// `sqrt(3)`.
    pub fn landmark_constrained_smoothing(
        &mut self,
        strength: f64,
        iterations: usize,
        landmarks: &[bool],
        project_every: usize,
    ) -> Result<()> {
        self.check_landmarks(landmarks)?;
        let helper = self.helper(HelperFacets::SORTED)?;
        self.classify_nodes()?;
        let points = self.coordinates.points();

        let mut scale = None;
        let roles: Vec<LandmarkRole> = (0..points.len())
            .map(|i| {
                if landmarks[i] {
                    return LandmarkRole::Landmark;
                }
                let mut count = 0;
                for &n in helper.neighbors(i) {
                    if landmarks.get(n).copied().unwrap_or(false) {
                        count += 1;
                    } else if scale.is_none() {
                        scale = points.get(n).map(|p| (points[i] - *p).norm() / 3f64.sqrt());
                    }
                }
                if count > 0 {
                    LandmarkRole::Neighbor(count)
                } else {
                    LandmarkRole::Normal
                }
            })
            .collect();
        let scale = scale.unwrap_or(0.0);
        let radius = self.spherical_surface_radius();
        let mut relax = Relaxation::new(self.coordinates.points(), self.config().parallel_min_nodes);

        for k in 1..=iterations {
            relax.step(|i, points| {
                let old = points[i];
                let ring = helper.neighbors(i);
                if ring.len() < 2 || roles[i] == LandmarkRole::Landmark {
                    return old;
                }
                let Some(mut mean) = neighbor_mean(points, ring) else {
                    return old;
                };
                if let LandmarkRole::Neighbor(count) = roles[i] {
                    let len = ring.len();
                    for (j, &l) in ring.iter().enumerate() {
                        if roles.get(l) != Some(&LandmarkRole::Landmark) {
                            continue;
                        }
                        let (Some(a), Some(b), Some(pl)) = (
                            points.get(ring[(j + len - 1) % len]),
                            points.get(ring[(j + 1) % len]),
                            points.get(l),
                        ) else {
                            continue;
                        };
                        let push = pl.coords * 2.0 - a.coords - b.coords;
                        let push = push.try_normalize(0.0).unwrap_or_else(Vector3::zeros);
                        mean += pl.coords + push * scale;
                    }
                    mean = Point3::from(mean.coords / (count + 1) as f64);
                }
                blend(&old, &mean, strength)
            });
            if every(k, project_every) {
                relax.project_to_sphere(radius);
            }
        }

        tracing::debug!(strength, iterations, scale, "landmark constrained smoothing");
        self.finish_smoothing(relax.finish());
        Ok(())
    }

    /// Linear smoothing that carries landmark detail onto their neighbors.
    ///
    /// Each landmark's offset from the mean of its neighbors is measured
    /// once, and every landmark neighbor is shifted by the average offset
    /// of its landmarks. Landmarks then stay fixed, landmark neighbors are
    /// smoothed every `smooth_neighbors_every` iterations, and all other
    /// nodes every iteration.
    pub fn landmark_neighbor_constrained_smoothing(
        &mut self,
        strength: f64,
        iterations: usize,
        landmarks: &[bool],
        smooth_neighbors_every: usize,
        project_every: usize,
    ) -> Result<()> {
        self.check_landmarks(landmarks)?;
        let helper = self.helper(HelperFacets::SORTED)?;
        self.classify_nodes()?;
        let radius = self.spherical_surface_radius();
        let mut points = self.coordinates.points().to_vec();
        let n = points.len();

        let mut roles = vec![LandmarkRole::Normal; n];
        let mut offsets = vec![Vector3::zeros(); n];
        for i in 0..n {
            let ring = helper.neighbors(i);
            if landmarks[i] {
                roles[i] = LandmarkRole::Landmark;
                if let Some(mean) = neighbor_mean(&points, ring) {
                    offsets[i] = points[i] - mean;
                }
            } else {
                let count = ring.iter().filter(|&&j| landmarks.get(j).copied().unwrap_or(false)).count();
                if count > 0 {
                    roles[i] = LandmarkRole::Neighbor(count);
                }
            }
        }

        for i in 0..n {
            if let LandmarkRole::Neighbor(count) = roles[i] {
                let sum = helper
                    .neighbors(i)
                    .iter()
                    .filter(|&&j| roles.get(j) == Some(&LandmarkRole::Landmark))
                    .fold(Vector3::zeros(), |acc, &j| acc + offsets[j]);
                points[i] += sum / count as f64;
            }
        }

        let mut relax = Relaxation::new(&points, self.config().parallel_min_nodes);
        let mut counter = 1;
        for k in 1..=iterations {
            let neighbors_turn = counter == smooth_neighbors_every;
            relax.step(|i, points| {
                let old = points[i];
                let moves = match roles[i] {
                    LandmarkRole::Normal => true,
                    LandmarkRole::Neighbor(_) => neighbors_turn,
                    LandmarkRole::Landmark => false,
                };
                if !moves {
                    return old;
                }
                neighbor_mean(points, helper.neighbors(i)).map_or(old, |mean| blend(&old, &mean, strength))
            });
            counter = if counter >= smooth_neighbors_every { 1 } else { counter + 1 };
            if every(k, project_every) {
                relax.project_to_sphere(radius);
            }
        }

        tracing::debug!(strength, iterations, smooth_neighbors_every, "landmark neighbor constrained smoothing");
        self.finish_smoothing(relax.finish());
        Ok(())
    }

    // --- Targeted smoothing ---

    /// Grows a node selection by `depth` rings of neighbors.
    pub fn mark_neighbor_nodes_to_depth(&self, flags: &mut [bool], depth: usize) -> Result<()> {
        let helper = self.helper(HelperFacets::NODES)?;
        for _ in 0..depth {
            let mut grown = flags.to_vec();
            for (i, _) in flags.iter().enumerate().filter(|(_, f)| **f) {
                for &n in helper.neighbors(i) {
                    if let Some(slot) = grown.get_mut(n) {
                        *slot = true;
                    }
                }
            }
            flags.copy_from_slice(&grown);
        }
        Ok(())
    }

    /// Repeatedly finds crossovers and applies areal smoothing to them and
    /// their surrounding nodes. Stops early once no crossovers remain.
    /// Returns the number of cycles that smoothed.
    pub fn smooth_out_surface_crossovers(
        &mut self,
        params: &CrossoverSmoothing,
        surface_type_hint: SurfaceType,
    ) -> Result<usize> {
        let mut smoothed = 0;
        for cycle in 0..params.cycles {
            let report = self.crossover_check(surface_type_hint)?;
            if report.nodes == 0 {
                break;
            }
            let mut flags: Vec<bool> = self
                .crossovers()
                .iter()
                .map(|c| *c == CrossoverStatus::Yes)
                .collect();
            self.mark_neighbor_nodes_to_depth(&mut flags, params.neighbor_depth)?;
            tracing::debug!(
                cycle,
                crossovers = report.nodes,
                smoothing = flags.iter().filter(|f| **f).count(),
                "smoothing out crossovers"
            );
            self.areal_smoothing(
                params.strength,
                params.iterations_per_cycle,
                params.edges_every,
                Some(&flags),
                params.project_every,
            )?;
            smoothed += 1;
        }
        self.coordinates.clear_display_cache();
        Ok(smoothed)
    }

    /// Finds edge nodes of a flat surface that lie inside a nearby tile
    /// they do not belong to, marks them and their neighbors as crossovers
    /// and applies linear smoothing to them. Returns whether any smoothing
    /// was done.
    pub fn smooth_out_flat_surface_overlap(
        &mut self,
        strength: f64,
        cycles: usize,
        iterations_per_cycle: usize,
        edges_every: usize,
        neighbor_depth: usize,
    ) -> Result<bool> {
        let topology = self.require_topology()?.clone();
        let n = self.number_of_nodes();
        if n == 0 || topology.number_of_tiles() == 0 {
            return Ok(false);
        }
        let search_radius = self.mean_distance_between_nodes(None) * 3.0;
        let helper = topology.helper(HelperFacets::NODES);
        let interior = self.interior_flags()?;
        let mut smoothed = false;

        for cycle in 0..cycles {
            let points = self.coordinates.points();
            let locator = NodeLocator::new(points, search_radius, |i| helper.node_has_neighbors(i));
            let mut overlap = vec![false; n];

            for i in (0..n).filter(|&i| !interior[i]) {
                let p = &points[i];
                let candidates: FxHashSet<usize> = locator
                    .points_within_radius(points, p, search_radius)
                    .into_iter()
                    .filter(|&near| near != i)
                    .flat_map(|near| helper.tiles_of_node(near).iter().copied())
                    .collect();
                overlap[i] = candidates.into_iter().any(|t| {
                    let Some([v1, v2, v3]) = topology.tile(t) else {
                        return false;
                    };
                    if v1 == i || v2 == i || v3 == i {
                        return false;
                    }
                    let (p1, p2, p3) = (&points[v1], &points[v2], &points[v3]);
                    signed_area_2d(p1, p2, p) > 0.0
                        && signed_area_2d(p2, p3, p) > 0.0
                        && signed_area_2d(p3, p1, p) > 0.0
                });
            }

            self.mark_neighbor_nodes_to_depth(&mut overlap, neighbor_depth)?;
            self.crossovers = overlap
                .iter()
                .map(|&o| if o { CrossoverStatus::Yes } else { CrossoverStatus::No })
                .collect();
            let marked = overlap.iter().filter(|o| **o).count();
            tracing::debug!(cycle, marked, "flat surface overlap");
            if marked == 0 {
                break;
            }
            self.linear_smoothing(strength, iterations_per_cycle, edges_every, Some(&overlap), 0)?;
            smoothed = true;
        }
        self.coordinates.clear_display_cache();
        Ok(smoothed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{flat_grid, icosphere, tetrahedron};
    use approx::assert_relative_eq;

    #[test]
    fn zero_strength_is_bit_exact() {
        let mut sphere = icosphere(2, 10.0);
        let before = sphere.coordinates().points().to_vec();
        sphere.linear_smoothing(0.0, 5, 1, None, 0).unwrap();
        assert_eq!(sphere.coordinates().points(), before.as_slice());
        sphere.areal_smoothing(0.0, 5, 1, None, 0).unwrap();
        assert_eq!(sphere.coordinates().points(), before.as_slice());
    }

    #[test]
    fn full_strength_moves_to_neighbor_mean() {
        let mut surface = tetrahedron();
        let before = surface.coordinates().points().to_vec();
        let helper = surface.helper(HelperFacets::NODES).unwrap();
        surface.linear_smoothing(1.0, 1, 1, None, 0).unwrap();
        for i in 0..4 {
            let mean = neighbor_mean(&before, helper.neighbors(i)).unwrap();
            assert_relative_eq!(surface.point(i), mean, epsilon = 1e-12);
        }
    }

    #[test]
    fn edge_nodes_wait_for_their_cadence() {
        let mut grid = flat_grid(3);
        grid.set_point(5, Point3::new(1.0, 1.0, 1.0));
        let corner = grid.point(0);
        grid.linear_smoothing(1.0, 1, 2, None, 0).unwrap();
        assert_eq!(grid.point(0), corner);
        // Interior node 5 moved back toward the plane.
        assert!(grid.point(5).z < 1.0);
        grid.linear_smoothing(1.0, 2, 2, None, 0).unwrap();
        assert_ne!(grid.point(0), corner);
    }

    #[test]
    fn short_mask_is_ignored_and_full_mask_applies() {
        let mut grid = flat_grid(2);
        grid.set_point(4, Point3::new(1.0, 1.0, 2.0));
        let mut masked = grid.clone();
        masked
            .linear_smoothing(1.0, 1, 0, Some(&[false; 9]), 0)
            .unwrap();
        assert_eq!(masked.point(4).z, 2.0);

        grid.linear_smoothing(1.0, 1, 0, Some(&[false; 3]), 0).unwrap();
        assert_relative_eq!(grid.point(4).z, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn projection_restores_sphere_radius() {
        let mut sphere = icosphere(2, 4.0);
        sphere.linear_smoothing(0.8, 3, 1, None, 1).unwrap();
        for p in sphere.coordinates().points() {
            assert_relative_eq!(p.coords.norm(), 4.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn areal_smoothing_flattens_a_bump() {
        let mut grid = flat_grid(4);
        grid.set_point(12, Point3::new(2.0, 2.0, 3.0));
        grid.areal_smoothing(1.0, 10, 0, None, 0).unwrap();
        assert!(grid.point(12).z < 1.0);
    }

    #[test]
    fn landmarks_stay_fixed() {
        let mut sphere = icosphere(2, 5.0);
        let mut landmarks = vec![false; sphere.number_of_nodes()];
        landmarks[0] = true;
        landmarks[7] = true;
        let fixed = (sphere.point(0), sphere.point(7));

        sphere.landmark_constrained_smoothing(0.5, 5, &landmarks, 0).unwrap();
        assert_eq!((sphere.point(0), sphere.point(7)), fixed);

        sphere
            .landmark_neighbor_constrained_smoothing(0.5, 6, &landmarks, 3, 2)
            .unwrap();
        assert_relative_eq!(sphere.point(0).coords.norm(), 5.0, epsilon = 1e-9);
    }

    #[test]
    fn landmark_flags_must_cover_every_node() {
        let mut sphere = icosphere(1, 1.0);
        let result = sphere.landmark_constrained_smoothing(0.5, 1, &[true], 0);
        assert!(matches!(result, Err(Error::MalformedInput(_))));
    }

    #[test]
    fn neighbor_marking_grows_by_rings() {
        let grid = flat_grid(4);
        let mut flags = vec![false; 25];
        flags[12] = true;
        grid.mark_neighbor_nodes_to_depth(&mut flags, 1).unwrap();
        assert_eq!(flags.iter().filter(|f| **f).count(), 7);
        grid.mark_neighbor_nodes_to_depth(&mut flags, 2).unwrap();
        assert!(flags.iter().filter(|f| **f).count() > 7);
    }

    #[test]
    fn flat_overlap_is_detected_and_smoothed() {
        let mut grid = flat_grid(4);
        assert!(!grid.smooth_out_flat_surface_overlap(0.5, 2, 2, 1, 1).unwrap());

        // Fold the corner node over the neighboring quad.
        grid.set_point(4, Point3::new(2.5, 0.4, 0.0));
        assert!(grid.smooth_out_flat_surface_overlap(0.5, 1, 2, 1, 1).unwrap());
        assert_eq!(grid.crossovers()[4], CrossoverStatus::Yes);
    }

    #[test]
    fn smoothing_without_topology_fails() {
        let mut surface = Surface::new(SurfaceType::Raw);
        surface.add_node(Point3::origin());
        assert!(matches!(
            surface.linear_smoothing(1.0, 1, 1, None, 0),
            Err(Error::InvariantViolation(_))
        ));
    }

    #[test]
    fn parallel_relaxation_matches_serial() {
        let mut serial = icosphere(2, 10.0);
        serial.coordinates_mut().update_all(|i, p| {
            *p = Point3::from(p.coords * (1.0 + 0.1 * (i as f64 * 0.37).sin()));
        });
        let mut parallel = serial.clone().with_config(std::sync::Arc::new(crate::config::Config {
            parallel_min_nodes: 1,
            ..crate::config::Config::default()
        }));
        assert!(serial.number_of_nodes() < serial.config().parallel_min_nodes);

        let mut landmarks = vec![false; serial.number_of_nodes()];
        for i in (0..landmarks.len()).step_by(7) {
            landmarks[i] = true;
        }
        for surface in [&mut serial, &mut parallel] {
            surface.linear_smoothing(0.6, 4, 2, None, 3).unwrap();
            surface.areal_smoothing(0.8, 4, 1, None, 2).unwrap();
            surface.landmark_constrained_smoothing(0.5, 3, &landmarks, 2).unwrap();
            surface.landmark_neighbor_constrained_smoothing(0.5, 3, &landmarks, 2, 0).unwrap();
        }
        assert_eq!(serial.coordinates().points(), parallel.coordinates().points());
    }

    #[test]
    fn shared_topology_grown_past_the_surface_is_tolerated() {
        let mut grid = flat_grid(1);
        let mut grown = grid.clone();
        let extra = grown.add_node(Point3::new(0.5, -1.0, 0.0));
        grown.topology().unwrap().add_tile([0, extra, 1]);
        assert!(grid.topology().unwrap().number_of_nodes() > grid.number_of_nodes());

        let before = grid.coordinates().points().to_vec();
        grid.landmark_constrained_smoothing(0.5, 2, &[true, false, false, false], 0).unwrap();
        grid.landmark_neighbor_constrained_smoothing(0.5, 2, &[true, false, false, false], 1, 0)
            .unwrap();
        grid.linear_smoothing(0.5, 2, 1, None, 0).unwrap();
        grid.areal_smoothing(0.5, 2, 1, None, 0).unwrap();
        assert_eq!(grid.number_of_nodes(), before.len());
        assert!(grid.coordinates().points().iter().all(|p| p.coords.iter().all(|v| v.is_finite())));
    }

    #[test]
    fn neighbor_mean_skips_missing_points() {
        let points = [Point3::new(2.0, 0.0, 0.0), Point3::new(0.0, 4.0, 0.0)];
        assert_eq!(neighbor_mean(&points, &[0, 1, 9]), Some(Point3::new(1.0, 2.0, 0.0)));
        assert_eq!(neighbor_mean(&points, &[7, 9]), None);
        assert_eq!(neighbor_mean(&points, &[]), None);
    }
}
