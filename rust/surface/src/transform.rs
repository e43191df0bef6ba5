// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Affine transformations on surface coordinates.
//!
//! Transforms modify node positions in place. Tiles reference nodes by
//! index, so moving nodes moves everything that references them. Nodes that
//! no tile uses are parked at the origin by every affine transform.

use nalgebra::{Matrix4, Point3, Rotation3, Unit, Vector3};

use crate::surface::{Surface, SurfaceType};
use crate::view::{Axis, ViewState};

/// Temporary clamp of one coordinate onto a plane through the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneProjection {
    /// `x = min(x, 0)`
    MovePositiveXToZero,
    /// `x = max(x, 0)`
    MoveNegativeXToZero,
    MovePositiveYToZero,
    MoveNegativeYToZero,
    MovePositiveZToZero,
    MoveNegativeZToZero,
    /// Pops the snapshot pushed by the last clamp.
    Restore,
}

const AREA_FIT_ITERATIONS: usize = 5;
const AREA_FIT_TOLERANCE: f64 = 0.05;

impl Surface {
    /// Applies a 4x4 affine matrix to the connected nodes, moves the
    /// disconnected ones to the origin and recomputes normals.
    pub fn apply_matrix(&mut self, matrix: &Matrix4<f64>) {
        let connected = self.connected_mask();
        self.coordinates.update_all(|i, p| {
            *p = if connected[i] {
                matrix.transform_point(p)
            } else {
                Point3::origin()
            };
        });
        self.compute_normals();
    }

    pub fn translate(&mut self, offset: &Vector3<f64>) {
        self.apply_matrix(&Matrix4::new_translation(offset));
    }

    /// Scales about the origin.
    pub fn scale(&mut self, sx: f64, sy: f64, sz: f64) {
        self.apply_matrix(&Matrix4::new_nonuniform_scaling(&Vector3::new(sx, sy, sz)));
    }

    /// Rotates about a coordinate axis through the origin.
    pub fn rotate(&mut self, axis: Axis, degrees: f64) {
        let rotation = Rotation3::from_axis_angle(&Unit::new_unchecked(axis.unit()), degrees.to_radians());
        self.apply_matrix(&rotation.to_homogeneous());
    }

    pub fn rotate_x(&mut self, degrees: f64) {
        self.rotate(Axis::X, degrees);
    }

    pub fn rotate_y(&mut self, degrees: f64) {
        self.rotate(Axis::Y, degrees);
    }

    pub fn rotate_z(&mut self, degrees: f64) {
        self.rotate(Axis::Z, degrees);
    }

    /// Applies the model transform of a view state to the coordinates.
    pub fn apply_view(&mut self, view: &ViewState) {
        self.apply_matrix(&view.matrix());
    }

    /// Moves the center of mass of the connected nodes to the origin.
    pub fn translate_to_center_of_mass(&mut self) {
        let com = self.center_of_mass();
        self.translate(&-com.coords);
    }

    pub fn move_disconnected_nodes_to_origin(&mut self) {
        let connected = self.connected_mask();
        self.coordinates.update_all(|i, p| {
            if !connected[i] {
                *p = Point3::origin();
            }
        });
    }

    // --- Snapshot ---

    /// Saves the current positions, replacing any earlier snapshot.
    pub fn push_coordinates(&mut self) {
        self.saved_coordinates = Some(self.coordinates.points().to_vec());
    }

    /// Restores the saved snapshot. A snapshot taken with a different node
    /// count is ignored with a warning.
    pub fn pop_coordinates(&mut self) {
        let n = self.number_of_nodes();
        match &self.saved_coordinates {
            Some(saved) if saved.len() == n => {
                let saved = saved.clone();
                self.coordinates.set_points(saved);
            }
            Some(saved) => {
                tracing::warn!(saved = saved.len(), nodes = n, "snapshot size does not match node count");
            }
            None => tracing::warn!("no coordinate snapshot to restore"),
        }
        self.coordinates.clear_display_cache();
    }

    /// Clamps one coordinate of every node onto a plane after saving a
    /// snapshot, or restores that snapshot. The coordinate modification
    /// counter is left as it was.
    pub fn project_to_plane(&mut self, projection: PlaneProjection) {
        let counter = self.coordinates.modified();
        if projection == PlaneProjection::Restore {
            self.pop_coordinates();
            self.coordinates.set_modified(counter);
            return;
        }
        self.push_coordinates();
        self.coordinates.update_all(|_, p| match projection {
            PlaneProjection::MovePositiveXToZero => p.x = p.x.min(0.0),
            PlaneProjection::MoveNegativeXToZero => p.x = p.x.max(0.0),
            PlaneProjection::MovePositiveYToZero => p.y = p.y.min(0.0),
            PlaneProjection::MoveNegativeYToZero => p.y = p.y.max(0.0),
            PlaneProjection::MovePositiveZToZero => p.z = p.z.min(0.0),
            PlaneProjection::MoveNegativeZToZero => p.z = p.z.max(0.0),
            PlaneProjection::Restore => {}
        });
        self.coordinates.set_modified(counter);
    }

    // --- Scaling to a target ---

    /// Uniformly scales the surface so its area approaches `target`.
    ///
    /// With `flat_ratio` (a flat surface matched to the area of a folded
    /// one) the scale is `sqrt(target / area)` applied once. Otherwise
    /// several corrected ratios are tried from the original positions and
    /// the candidate whose area is closest to `target` is kept.
    pub fn scale_surface_to_area(&mut self, target: f64, flat_ratio: bool) {
        let current = self.surface_area();
        if current <= 0.0 || target <= 0.0 {
            tracing::warn!(current, target, "cannot scale a surface with no area");
            return;
        }
        let mut ratio = target / current;
        if flat_ratio {
            let ratio = ratio.sqrt();
            self.scale(ratio, ratio, ratio);
            return;
        }

        let original = self.coordinates.points().to_vec();
        let mut candidates = vec![(original.clone(), current)];
        for _ in 0..AREA_FIT_ITERATIONS {
            if ratio > 0.0 {
                self.scale(ratio, ratio, ratio);
            }
            let area = self.surface_area();
            candidates.push((self.coordinates.points().to_vec(), area));

            let diff = area - target;
            if diff.abs() / target > AREA_FIT_TOLERANCE {
                let delta = (ratio - 1.0).abs();
                ratio = match (ratio > 1.0, diff > 0.0) {
                    (true, true) => 1.0 + delta * 0.5,
                    (true, false) => 1.0 + delta * 2.0,
                    (false, true) => 1.0 - delta * 2.0,
                    (false, false) => 1.0 - delta * 0.5,
                };
            }
            self.coordinates.set_points(original.clone());
        }

        let best = candidates
            .into_iter()
            .filter(|(_, area)| *area > 0.0)
            .min_by(|a, b| (a.1 - target).abs().total_cmp(&(b.1 - target).abs()));
        if let Some((points, area)) = best {
            tracing::debug!(target, area, "scaled surface to area");
            self.coordinates.set_points(points);
        }
        self.compute_normals();
    }

    /// Moves every node that is not at the origin along its normal.
    pub fn expand_surface(&mut self, amount: f64) {
        let normals = self.normals.clone();
        self.coordinates.update_all(|i, p| {
            if *p != Point3::origin() {
                if let Some(n) = normals.get(i) {
                    *p += n * amount;
                }
            }
        });
        self.compute_normals();
    }

    // --- Orientation ---

    /// Flips every tile when the normal of the highest connected node
    /// points down. Returns whether tiles were flipped.
    ///
    /// Flipping changes the shared topology, so other surfaces using it
    /// must recompute their normals.
    pub fn orient_normals_out(&mut self) -> bool {
        let Some(topology) = self.topology().cloned() else {
            return false;
        };
        let connected = self.connected_mask();
        let top = self
            .coordinates
            .points()
            .iter()
            .enumerate()
            .filter(|(i, _)| connected[*i])
            .max_by(|a, b| a.1.z.total_cmp(&b.1.z))
            .map(|(i, _)| i);

        let flipped = top.is_some_and(|node| self.normal(node).z < 0.0);
        if flipped {
            topology.flip_tile_orientation();
            self.compute_normals();
        }
        self.coordinates.clear_display_cache();
        flipped
    }

    /// Flips individual tiles that face inward: downward on flat surfaces,
    /// toward the origin on spheres. Other surface types are untouched.
    /// Returns the number of tiles flipped.
    pub fn orient_tiles_outward(&mut self, surface_type: SurfaceType) -> usize {
        let flat = surface_type.is_flat();
        let sphere = surface_type == SurfaceType::Spherical;
        if !flat && !sphere {
            return 0;
        }
        let Some(topology) = self.topology().cloned() else {
            return 0;
        };

        let points = self.coordinates.points();
        let inward: Vec<usize> = topology.with_tiles(|tiles| {
            tiles
                .iter()
                .enumerate()
                .filter_map(|(t, &[a, b, c])| {
                    let (pa, pb, pc) = (points.get(a)?, points.get(b)?, points.get(c)?);
                    let normal = (pb - pa).cross(&(pc - pa));
                    let flip = if flat {
                        normal.z < 0.0
                    } else {
                        let center = pa.coords + pb.coords + pc.coords;
                        normal.dot(&center) < 0.0
                    };
                    flip.then_some(t)
                })
                .collect()
        });

        if !inward.is_empty() {
            topology.flip_tiles(&inward);
            self.compute_normals();
        }
        self.coordinates.clear_display_cache();
        inward.len()
    }
}
