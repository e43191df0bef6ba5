// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Surface-type conversions: sphere, ellipsoid, flat and compressed medial
//! wall.
//!
//! Each conversion maps the connected nodes, parks the disconnected ones at
//! the origin, retags the surface and recomputes normals.

use std::f64::consts::{FRAC_PI_2, PI};

use nalgebra::Point3;

use crate::error::Result;
use crate::geometry::Bounds;
use crate::surface::{Surface, SurfaceType};

/// Radius of a sphere with the given surface area.
pub fn sphere_radius_for_area(area: f64) -> f64 {
    (area / (4.0 * PI)).sqrt()
}

/// Half-extents of the ellipsoid spanned by `bounds`, one per axis.
fn half_axes(bounds: &Bounds) -> [f64; 3] {
    [
        (bounds.min.x.abs() + bounds.max.x.abs()) * 0.5,
        (bounds.min.y.abs() + bounds.max.y.abs()) * 0.5,
        (bounds.min.z.abs() + bounds.max.z.abs()) * 0.5,
    ]
}

/// Scales `p` onto the unit ellipsoid with half-axes `axes`.
fn onto_ellipsoid(p: &Point3<f64>, [a, b, c]: [f64; 3]) -> Point3<f64> {
    let f = ((p.x * p.x) / (a * a) + (p.y * p.y) / (b * b) + (p.z * p.z) / (c * c)).sqrt();
    if f != 0.0 && f.is_finite() {
        p / f
    } else {
        *p
    }
}

fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

impl Surface {
    /// Maps each connected node through `f`; disconnected nodes go to the
    /// origin.
    fn map_connected(&mut self, f: impl Fn(&Point3<f64>) -> Point3<f64>) -> Result<()> {
        self.require_topology()?;
        let connected = self.connected_mask();
        self.coordinates.update_all(|i, p| {
            *p = if connected[i] { f(p) } else { Point3::origin() };
        });
        Ok(())
    }

    fn finish_conversion(&mut self, surface_type: SurfaceType) {
        self.set_surface_type(surface_type);
        self.compute_normals();
        tracing::debug!(surface_type = surface_type.name(), "converted surface");
    }

    /// Projects every connected node with a nonzero radius onto a sphere of
    /// `radius` centered at the origin.
    pub fn convert_to_sphere_with_radius(&mut self, radius: f64) -> Result<()> {
        self.map_connected(|p| {
            let len = p.coords.norm();
            if len > 0.0 {
                Point3::from(p.coords * (radius / len))
            } else {
                *p
            }
        })?;
        self.finish_conversion(SurfaceType::Spherical);
        Ok(())
    }

    /// Projects onto a sphere with surface area `area`; a non-positive
    /// `area` keeps the current surface area.
    pub fn convert_to_sphere_with_surface_area(&mut self, area: f64) -> Result<()> {
        let area = if area <= 0.0 { self.surface_area() } else { area };
        self.convert_to_sphere_with_radius(sphere_radius_for_area(area))
    }

    /// Maps an ellipsoid centered at the origin onto a sphere with surface
    /// area `area` (the current area when non-positive), preserving each
    /// node's position relative to the ellipsoid's axes.
    pub fn convert_ellipsoid_to_sphere_with_surface_area(&mut self, area: f64) -> Result<()> {
        self.require_topology()?;
        let area = if area <= 0.0 { self.surface_area() } else { area };
        let radius = sphere_radius_for_area(area);
        let axes = half_axes(&self.all_coordinate_bounds());
        if axes.iter().any(|&a| a <= 0.0) {
            tracing::warn!(?axes, "ellipsoid has a flat axis; projecting to sphere instead");
            return self.convert_to_sphere_with_radius(radius);
        }
        let [a, b, c] = axes;
        self.map_connected(|p| {
            let q = onto_ellipsoid(p, axes);
            Point3::new(radius * q.x / a, radius * q.y / b, radius * q.z / c)
        })?;
        self.finish_conversion(SurfaceType::Spherical);
        Ok(())
    }

    /// Centers the surface and pushes every node onto the ellipsoid spanned
    /// by its bounds, then rescales so the X half-axis keeps its length.
    pub fn convert_to_ellipsoid(&mut self) -> Result<()> {
        self.require_topology()?;
        self.translate_to_center_of_mass();
        let axes = half_axes(&self.all_coordinate_bounds());
        if axes.iter().any(|&a| a <= 0.0) {
            tracing::warn!(?axes, "surface has a flat axis; leaving it in place");
            self.finish_conversion(SurfaceType::Ellipsoidal);
            return Ok(());
        }
        self.map_connected(|p| onto_ellipsoid(p, axes))?;

        let new_a = half_axes(&self.all_coordinate_bounds())[0];
        if new_a > 0.0 {
            let s = axes[0] / new_a;
            self.scale(s, s, s);
        }
        self.finish_conversion(SurfaceType::Ellipsoidal);
        Ok(())
    }

    /// Unwraps a sphere centered at the origin into the XY plane.
    ///
    /// The distance from the origin of the flat node is the arc length from
    /// the +Z pole, stretched by `(1 - z²/r²)^(-1/4)` on the southern half.
    /// Nodes whose flat position is not finite (the south pole) are placed
    /// at the origin.
    pub fn convert_sphere_to_flat(&mut self) -> Result<()> {
        let mut non_finite = 0usize;
        let mut flat = |p: &Point3<f64>| -> Point3<f64> {
            let (x, y, z) = (p.x, p.y, p.z);
            let radius = p.coords.norm();
            if radius <= 0.0 {
                return *p;
            }
            let zmult = if z <= 0.0 {
                (1.0 - (z * z) / (radius * radius)).powf(-0.25)
            } else {
                1.0
            };
            let rad = radius * zmult * (z / radius).clamp(-1.0, 1.0).acos();
            let phi = if y.abs() > 1e-5 { (x / y).atan() } else { FRAC_PI_2 };
            let u = sign(x) * rad * phi.sin().abs();
            let v = sign(y) * rad * phi.cos().abs();
            if u.is_finite() && v.is_finite() {
                Point3::new(u, v, 0.0)
            } else {
                non_finite += 1;
                Point3::origin()
            }
        };

        self.require_topology()?;
        let connected = self.connected_mask();
        self.coordinates.update_all(|i, p| {
            *p = if connected[i] { flat(p) } else { Point3::origin() };
        });
        if non_finite > 0 {
            tracing::warn!(nodes = non_finite, "nodes at the pole have no flat position");
        }
        self.finish_conversion(SurfaceType::Flat);
        Ok(())
    }

    /// Compresses a sphere toward the -Z pole.
    ///
    /// With polar angle `phi` measured from +Z, nodes with
    /// `phi < (π/2)·factor` move to `phi / factor`; the rest move to
    /// `(phi + π(1 - factor)) / (2 - factor)`. The radius is taken from the
    /// first connected node.
    pub fn convert_sphere_to_compressed_medial_wall(&mut self, factor: f64) -> Result<()> {
        let radius = self.spherical_surface_radius();
        self.map_connected(|p| {
            let Some(unit) = p.coords.try_normalize(0.0) else {
                return *p;
            };
            let mut phi = unit.z.clamp(-1.0, 1.0).acos();
            let theta = unit.y.atan2(unit.x);
            if phi < FRAC_PI_2 * factor {
                phi /= factor;
            } else {
                phi = (phi + PI * (1.0 - factor)) / (2.0 - factor);
            }
            Point3::new(
                radius * theta.cos() * phi.sin(),
                radius * theta.sin() * phi.sin(),
                radius * phi.cos(),
            )
        })?;
        self.finish_conversion(SurfaceType::CompressedMedialWall);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{flat_grid, icosphere};
    use approx::assert_relative_eq;

    #[test]
    fn sphere_radius_round_trip() {
        let mut sphere = icosphere(2, 1.0);
        sphere.scale(3.0, 1.5, 0.5);
        sphere.convert_to_sphere_with_radius(7.0).unwrap();
        for p in sphere.coordinates().points() {
            assert_relative_eq!(p.coords.norm(), 7.0, epsilon = 1e-9);
        }
        assert_relative_eq!(sphere.spherical_surface_radius(), 7.0, epsilon = 1e-9);
        assert_eq!(sphere.surface_type(), SurfaceType::Spherical);
    }

    #[test]
    fn sphere_with_area() {
        let mut sphere = icosphere(3, 1.0);
        sphere.convert_to_sphere_with_surface_area(4.0 * PI * 25.0).unwrap();
        assert_relative_eq!(sphere.spherical_surface_radius(), 5.0, epsilon = 1e-9);

        let area = sphere.surface_area();
        sphere.convert_to_sphere_with_surface_area(0.0).unwrap();
        assert_relative_eq!(sphere.spherical_surface_radius(), sphere_radius_for_area(area), epsilon = 1e-9);
    }

    #[test]
    fn disconnected_nodes_go_to_origin() {
        let mut sphere = icosphere(1, 2.0);
        let lonely = sphere.add_node(Point3::new(4.0, 4.0, 4.0));
        sphere.convert_to_sphere_with_radius(1.0).unwrap();
        assert_eq!(sphere.point(lonely), Point3::origin());
    }

    #[test]
    fn ellipsoid_keeps_x_axis_and_maps_back_to_sphere() {
        let mut surface = icosphere(2, 1.0);
        surface.scale(4.0, 2.0, 1.0);
        surface.translate_to_center_of_mass();
        let before = surface.bounds().extent().x;
        surface.convert_to_ellipsoid().unwrap();
        assert_eq!(surface.surface_type(), SurfaceType::Ellipsoidal);
        assert_relative_eq!(surface.bounds().extent().x, before, epsilon = 1e-9);

        surface.convert_ellipsoid_to_sphere_with_surface_area(4.0 * PI).unwrap();
        for p in surface.coordinates().points() {
            assert_relative_eq!(p.coords.norm(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn flat_unwrap_lies_in_plane() {
        let mut sphere = icosphere(2, 10.0);
        sphere.rotate_x(3.0);
        sphere.convert_sphere_to_flat().unwrap();
        assert_eq!(sphere.surface_type(), SurfaceType::Flat);
        for p in sphere.coordinates().points() {
            assert_eq!(p.z, 0.0);
            assert!(p.x.is_finite() && p.y.is_finite());
        }
    }

    #[test]
    fn northern_nodes_keep_arc_length() {
        let mut sphere = icosphere(1, 1.0);
        // Node 5 starts on the YZ plane above the equator.
        let before = sphere.point(5);
        sphere.convert_sphere_to_flat().unwrap();
        let flat = sphere.point(5);
        assert_relative_eq!(flat.coords.norm(), before.z.acos(), epsilon = 1e-9);
        assert!(flat.y > 0.0);
    }

    #[test]
    fn compressed_medial_wall_keeps_radius() {
        let mut sphere = icosphere(2, 3.0);
        sphere.convert_sphere_to_compressed_medial_wall(0.95).unwrap();
        assert_eq!(sphere.surface_type(), SurfaceType::CompressedMedialWall);
        for p in sphere.coordinates().points() {
            assert_relative_eq!(p.coords.norm(), 3.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn conversion_without_topology_fails() {
        let mut grid = flat_grid(1);
        grid.convert_to_sphere_with_radius(1.0).unwrap();
        let mut bare = Surface::new(SurfaceType::Raw);
        assert!(bare.convert_to_ellipsoid().is_err());
    }
}
