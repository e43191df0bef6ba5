// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # brainmesh surface
//!
//! Geometry and topology engine for triangulated cortical surfaces.
//!
//! A [`Surface`] owns node coordinates and normals and shares a
//! [`Topology`] (the triangle list) with every other surface of the same
//! mesh. The topology lazily builds a [`TopologyHelper`] with per-node
//! neighbor rings and edge records, which the algorithms read:
//!
//! - connectivity analysis: islands, Euler count, non-manifold nodes,
//!   degenerate edges, corner tiles;
//! - affine transforms, standard views and area rescaling;
//! - linear, areal and landmark-constrained smoothing;
//! - crossover (self-intersection) detection;
//! - conversion to sphere, ellipsoid, flat and compressed medial wall;
//! - the inflation pipeline that derives inflated, ellipsoid and spherical
//!   surfaces from a fiducial one.
//!
//! ```
//! use std::sync::Arc;
//! use brainmesh_surface::{Surface, SurfaceType, Topology, TopologyType};
//! use nalgebra::Point3;
//!
//! let points = vec![
//!     Point3::new(1.0, 1.0, 1.0),
//!     Point3::new(1.0, -1.0, -1.0),
//!     Point3::new(-1.0, 1.0, -1.0),
//!     Point3::new(-1.0, -1.0, 1.0),
//! ];
//! let tiles = vec![[0, 1, 2], [0, 3, 1], [0, 2, 3], [1, 3, 2]];
//! let topology = Arc::new(Topology::from_tiles(tiles, TopologyType::Closed));
//! let mut surface = Surface::from_parts(points, topology, SurfaceType::Fiducial).unwrap();
//!
//! assert_eq!(surface.euler_count().unwrap().euler, 2);
//! surface.convert_to_sphere_with_radius(10.0).unwrap();
//! assert!((surface.spherical_surface_radius() - 10.0).abs() < 1e-9);
//! ```

pub mod collaborators;
pub mod config;
pub mod connectivity;
pub mod convert;
pub mod coordinates;
pub mod crossover;
pub mod error;
pub mod exchange;
pub mod geometry;
pub mod helper;
pub mod inflate;
pub mod keys;
pub mod locator;
pub mod set;
pub mod smoothing;
pub mod surface;
pub mod topology;
pub mod transform;
pub mod view;

#[cfg(test)]
mod fixtures;

pub use collaborators::{
    AngleDeficitCurvature, Curvature, CurvatureSource, PolygonLibrary, PolygonMesh, VolumeRasterizer, VoxelGrid,
};
pub use config::Config;
pub use connectivity::{CornerRemoval, EulerCount, Islands, NodeClass};
pub use convert::sphere_radius_for_area;
pub use coordinates::CoordinateStore;
pub use crossover::{CrossoverMethod, CrossoverReport};
pub use error::{Error, Result};
pub use exchange::{MeshDocument, MeshHeader, Metadata};
pub use geometry::Bounds;
pub use helper::{EdgeInfo, HelperFacets, TopologyHelper};
pub use inflate::{DerivedSurfaces, FingerSmoothing, InflationOptions, MetricColumn, NodeMetrics};
pub use keys::{SetKey, SurfaceKey, TopologyKey};
pub use set::SurfaceSet;
pub use smoothing::CrossoverSmoothing;
pub use surface::{CrossoverStatus, Hemisphere, Surface, SurfaceType};
pub use topology::{Tile, Topology, TopologyType};
pub use transform::PlaneProjection;
pub use view::{Axis, StandardView, ViewState};
