// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Seams to external mesh services.
//!
//! Decimation and consistent-normal generation, volume rasterization and
//! curvature estimation live outside this crate. Each is a trait the caller
//! implements; [`AngleDeficitCurvature`] is a built-in curvature estimate
//! used when the caller has none.

use std::f64::consts::{PI, TAU};
use std::sync::Arc;

use nalgebra::{Point3, Vector3};

use crate::connectivity::NodeClass;
use crate::error::{Error, Result};
use crate::geometry::Bounds;
use crate::surface::Surface;
use crate::topology::{Tile, Topology};

/// Triangle mesh handed to and returned from a [`PolygonLibrary`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolygonMesh {
    pub points: Vec<Point3<f64>>,
    pub tiles: Vec<Tile>,
    /// One normal per point; may be empty on input.
    pub normals: Vec<Vector3<f64>>,
}

impl PolygonMesh {
    /// Checks that every tile index is inside `points`.
    pub fn validate(&self) -> Result<()> {
        let nodes = self.points.len();
        for (tile, nodes_of_tile) in self.tiles.iter().enumerate() {
            if let Some(&node) = nodes_of_tile.iter().find(|&&n| n >= nodes) {
                return Err(Error::TileIndexOutOfRange { tile, node, nodes });
            }
        }
        Ok(())
    }
}

/// External polygon processing: consistent orientation plus normals, and
/// decimation.
pub trait PolygonLibrary {
    /// Returns the mesh with consistently oriented tiles and per-point
    /// normals.
    fn process(&self, mesh: &PolygonMesh) -> Result<PolygonMesh>;

    /// Reduces the mesh to about `target_tiles` tiles.
    fn decimate(&self, mesh: &PolygonMesh, target_tiles: usize) -> Result<PolygonMesh>;
}

/// Regular voxel lattice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoxelGrid {
    pub origin: Point3<f64>,
    pub spacing: Vector3<f64>,
    pub dimensions: [usize; 3],
}

impl VoxelGrid {
    /// Smallest grid with cubic voxels of side `spacing` covering `bounds`.
    pub fn enclosing(bounds: &Bounds, spacing: f64) -> Self {
        let spacing = if spacing > 0.0 { spacing } else { 1.0 };
        let extent = bounds.extent();
        let cells = |len: f64| (len / spacing).ceil().max(0.0) as usize + 1;
        Self {
            origin: bounds.min,
            spacing: Vector3::repeat(spacing),
            dimensions: [cells(extent.x), cells(extent.y), cells(extent.z)],
        }
    }

    pub fn voxel_count(&self) -> usize {
        self.dimensions.iter().product()
    }
}

/// External rasterizer that fills the voxels enclosed by a closed surface.
pub trait VolumeRasterizer {
    /// Number of voxels of `grid` inside the surface.
    fn rasterize(&self, points: &[Point3<f64>], tiles: &[Tile], grid: &VoxelGrid) -> Result<usize>;
}

/// Per-node curvature.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Curvature {
    pub mean: Vec<f64>,
    pub gaussian: Vec<f64>,
}

impl Curvature {
    pub fn zeros(nodes: usize) -> Self {
        Self {
            mean: vec![0.0; nodes],
            gaussian: vec![0.0; nodes],
        }
    }
}

/// Supplies per-node mean and Gaussian curvature of a surface.
pub trait CurvatureSource {
    fn curvature(&self, surface: &Surface) -> Result<Curvature>;
}

/// Discrete curvature from the triangle fan around each node.
///
/// Gaussian curvature is the angle deficit (`2π` minus the corner angles,
/// `π` minus them on edge nodes) over the node's area. Mean curvature is
/// half the length of the cotangent Laplacian over the node's area, signed
/// positive when it points along the node normal.
#[derive(Debug, Clone, Copy, Default)]
pub struct AngleDeficitCurvature;

impl CurvatureSource for AngleDeficitCurvature {
    fn curvature(&self, surface: &Surface) -> Result<Curvature> {
        let topology = surface.require_topology()?;
        let n = surface.number_of_nodes();
        let points = surface.coordinates().points();
        let mut angles = vec![0.0; n];
        let mut laplacian = vec![Vector3::zeros(); n];

        topology.with_tiles(|tiles| {
            for &[a, b, c] in tiles {
                if a >= n || b >= n || c >= n {
                    continue;
                }
                for (i, j, k) in [(a, b, c), (b, c, a), (c, a, b)] {
                    let u = points[j] - points[i];
                    let v = points[k] - points[i];
                    let cross = u.cross(&v).norm();
                    let dot = u.dot(&v);
                    angles[i] += cross.atan2(dot);
                    if cross > 0.0 {
                        // Corner i weights the opposite edge j-k.
                        let cot = dot / cross;
                        let edge = points[j] - points[k];
                        laplacian[j] += edge * cot;
                        laplacian[k] -= edge * cot;
                    }
                }
            }
        });

        let classes = topology.classify_nodes();
        let areas = surface.area_of_all_nodes();
        let mut curvature = Curvature::zeros(n);
        for i in 0..n {
            let area = areas[i];
            if area <= 0.0 {
                continue;
            }
            let full_turn = match classes.get(i) {
                Some(NodeClass::Edge) => PI,
                _ => TAU,
            };
            curvature.gaussian[i] = (full_turn - angles[i]) / area;
            let sign = if laplacian[i].dot(&surface.normal(i)) < 0.0 { -1.0 } else { 1.0 };
            curvature.mean[i] = sign * laplacian[i].norm() / (4.0 * area);
        }
        Ok(curvature)
    }
}

impl Surface {
    /// Curvature from `source`; zeros when the source fails or returns the
    /// wrong number of values.
    pub fn curvature_or_zeros(&self, source: &dyn CurvatureSource) -> Curvature {
        let n = self.number_of_nodes();
        match source.curvature(self) {
            Ok(c) if c.mean.len() == n && c.gaussian.len() == n => c,
            Ok(c) => {
                tracing::warn!(
                    nodes = n,
                    mean = c.mean.len(),
                    gaussian = c.gaussian.len(),
                    "curvature source returned the wrong number of values"
                );
                Curvature::zeros(n)
            }
            Err(err) => {
                tracing::warn!(error = %err, "curvature source failed; using zeros");
                Curvature::zeros(n)
            }
        }
    }

    /// Hands the mesh to `library` (optionally decimating first) and
    /// replaces coordinates, normals and topology with the result.
    ///
    /// The surface is left untouched when the library fails or returns a
    /// malformed mesh.
    pub fn apply_polygon_library(&mut self, library: &dyn PolygonLibrary, decimate_to: Option<usize>) -> Result<()> {
        let topology = self.require_topology()?;
        let topology_type = topology.topology_type();
        let input = PolygonMesh {
            points: self.coordinates.points().to_vec(),
            tiles: topology.tiles(),
            normals: self.normals.clone(),
        };

        let run = || -> Result<PolygonMesh> {
            let mesh = match decimate_to {
                Some(target) => library.decimate(&input, target)?,
                None => input.clone(),
            };
            let processed = library.process(&mesh)?;
            processed.validate()?;
            Ok(processed)
        };
        let output = run().map_err(|err| {
            tracing::warn!(error = %err, "polygon library failed; surface unchanged");
            match err {
                Error::Collaborator(_) | Error::TileIndexOutOfRange { .. } => err,
                other => Error::Collaborator(other.to_string()),
            }
        })?;

        let PolygonMesh { points, tiles, normals } = output;
        let tile_count = tiles.len();
        self.coordinates.set_points(points);
        self.set_topology(Arc::new(Topology::from_tiles(tiles, topology_type)))?;
        self.reset_node_attributes();
        if normals.len() == self.number_of_nodes() {
            self.normals = normals;
        } else {
            self.compute_normals();
        }
        tracing::info!(nodes = self.number_of_nodes(), tiles = tile_count, "applied polygon library");
        Ok(())
    }

    /// Counts the voxels of `grid` enclosed by this surface.
    pub fn rasterize(&self, rasterizer: &dyn VolumeRasterizer, grid: &VoxelGrid) -> Result<usize> {
        let topology = self.require_topology()?;
        let euler = topology.euler_count(false);
        if euler.euler != 2 {
            tracing::warn!(euler = euler.euler, "rasterizing a surface that is not closed");
        }
        rasterizer
            .rasterize(self.coordinates.points(), &topology.tiles(), grid)
            .map_err(|err| match err {
                Error::Collaborator(_) => err,
                other => Error::Collaborator(other.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{flat_grid, icosphere, tetrahedron};
    use approx::assert_relative_eq;

    /// Reverses every tile and drops the last one when decimating.
    struct Reverser;

    impl PolygonLibrary for Reverser {
        fn process(&self, mesh: &PolygonMesh) -> Result<PolygonMesh> {
            Ok(PolygonMesh {
                points: mesh.points.clone(),
                tiles: mesh.tiles.iter().map(|&[a, b, c]| [a, c, b]).collect(),
                normals: Vec::new(),
            })
        }

        fn decimate(&self, mesh: &PolygonMesh, target_tiles: usize) -> Result<PolygonMesh> {
            let mut out = mesh.clone();
            out.tiles.truncate(target_tiles);
            Ok(out)
        }
    }

    struct Broken;

    impl PolygonLibrary for Broken {
        fn process(&self, mesh: &PolygonMesh) -> Result<PolygonMesh> {
            let mut out = mesh.clone();
            out.tiles.push([0, 1, 99]);
            Ok(out)
        }

        fn decimate(&self, _: &PolygonMesh, _: usize) -> Result<PolygonMesh> {
            Err(Error::Collaborator("no decimation".into()))
        }
    }

    struct CountInsideBox;

    impl VolumeRasterizer for CountInsideBox {
        fn rasterize(&self, points: &[Point3<f64>], _: &[Tile], grid: &VoxelGrid) -> Result<usize> {
            let bounds = Bounds::from_points(points);
            let inside = |axis: usize| {
                (0..grid.dimensions[axis])
                    .filter(|&i| {
                        let c = grid.origin[axis] + grid.spacing[axis] * i as f64;
                        c > bounds.min[axis] && c < bounds.max[axis]
                    })
                    .count()
            };
            Ok(inside(0) * inside(1) * inside(2))
        }
    }

    #[test]
    fn sphere_curvature() {
        let sphere = icosphere(3, 2.0);
        let curvature = AngleDeficitCurvature.curvature(&sphere).unwrap();
        let areas = sphere.area_of_all_nodes();
        let total: f64 = curvature.gaussian.iter().zip(&areas).map(|(k, a)| k * a).sum();
        assert_relative_eq!(total, 4.0 * PI, epsilon = 1e-9);

        let mean = curvature.mean.iter().sum::<f64>() / curvature.mean.len() as f64;
        assert!(curvature.mean.iter().all(|&h| h > 0.0));
        assert_relative_eq!(mean, 0.5, epsilon = 0.05);
    }

    #[test]
    fn flat_grid_has_no_interior_curvature() {
        let grid = flat_grid(3);
        let curvature = AngleDeficitCurvature.curvature(&grid).unwrap();
        for node in [5, 6, 9, 10] {
            assert_relative_eq!(curvature.gaussian[node], 0.0, epsilon = 1e-9);
            assert_relative_eq!(curvature.mean[node], 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn failing_source_gives_zeros() {
        struct Failing;
        impl CurvatureSource for Failing {
            fn curvature(&self, _: &Surface) -> Result<Curvature> {
                Err(Error::Collaborator("offline".into()))
            }
        }
        let surface = tetrahedron();
        assert_eq!(surface.curvature_or_zeros(&Failing), Curvature::zeros(4));
    }

    #[test]
    fn polygon_library_replaces_topology() {
        let mut surface = tetrahedron();
        let old = Arc::clone(surface.topology().unwrap());
        surface.apply_polygon_library(&Reverser, Some(3)).unwrap();
        let topology = surface.topology().unwrap();
        assert!(!Arc::ptr_eq(&old, topology));
        assert_eq!(topology.number_of_tiles(), 3);
        let [a, b, c] = old.tile(0).unwrap();
        assert_eq!(topology.tile(0), Some([a, c, b]));
        assert_eq!(surface.normals().len(), 4);
    }

    #[test]
    fn failing_polygon_library_leaves_surface_unchanged() {
        let mut surface = tetrahedron();
        let before = surface.coordinates().points().to_vec();
        let topology = Arc::clone(surface.topology().unwrap());
        assert!(matches!(
            surface.apply_polygon_library(&Broken, None),
            Err(Error::TileIndexOutOfRange { node: 99, .. })
        ));
        assert!(matches!(
            surface.apply_polygon_library(&Broken, Some(2)),
            Err(Error::Collaborator(_))
        ));
        assert_eq!(surface.coordinates().points(), before.as_slice());
        assert!(Arc::ptr_eq(&topology, surface.topology().unwrap()));
    }

    #[test]
    fn rasterizer_sees_the_surface() {
        let sphere = icosphere(2, 2.0);
        let grid = VoxelGrid::enclosing(&sphere.bounds(), 1.5);
        assert_eq!(grid.dimensions, [4, 4, 4]);
        assert_eq!(grid.voxel_count(), 64);
        // Voxel centers at -0.5 and 1.0 on each axis fall inside.
        assert_eq!(sphere.rasterize(&CountInsideBox, &grid).unwrap(), 8);
    }
}
