// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A surface: node positions and normals over a shared topology.
//!
//! [`Surface`] exclusively owns its [`CoordinateStore`] and normals and
//! holds an `Arc<Topology>`. Cloning a surface deep-copies positions,
//! normals and per-node attributes but keeps pointing at the same topology.
//!
//! The operations are spread over several modules, each adding an
//! `impl Surface` block: geometry queries (`geometry`), transforms
//! (`transform`), smoothing (`smoothing`), crossover detection
//! (`crossover`), surface-type conversion (`convert`) and inflation
//! (`inflate`).

use std::sync::Arc;

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::connectivity::{EulerCount, NodeClass};
use crate::coordinates::CoordinateStore;
use crate::error::{Error, Result};
use crate::helper::{HelperFacets, TopologyHelper};
use crate::topology::Topology;

/// Kind of surface, which selects algorithm variants (crossover method,
/// Euler expectations, flat formulas).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SurfaceType {
    Raw,
    Fiducial,
    Inflated,
    VeryInflated,
    Spherical,
    Ellipsoidal,
    CompressedMedialWall,
    Flat,
    FlatLobar,
    Hull,
    Unknown,
    #[default]
    Unspecified,
}

impl SurfaceType {
    /// Name used in exchange documents.
    pub fn name(&self) -> &'static str {
        match self {
            SurfaceType::Raw => "RAW",
            SurfaceType::Fiducial => "FIDUCIAL",
            SurfaceType::Inflated => "INFLATED",
            SurfaceType::VeryInflated => "VERY_INFLATED",
            SurfaceType::Spherical => "SPHERICAL",
            SurfaceType::Ellipsoidal => "ELLIPSOIDAL",
            SurfaceType::CompressedMedialWall => "CMW",
            SurfaceType::Flat => "FLAT",
            SurfaceType::FlatLobar => "FLAT_LOBAR",
            SurfaceType::Hull => "HULL",
            SurfaceType::Unknown => "UNKNOWN",
            SurfaceType::Unspecified => "UNSPECIFIED",
        }
    }

    /// Parses a surface-type name. Unrecognized names map to `Unknown`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "RAW" => SurfaceType::Raw,
            "FIDUCIAL" => SurfaceType::Fiducial,
            "INFLATED" => SurfaceType::Inflated,
            "VERY_INFLATED" => SurfaceType::VeryInflated,
            "SPHERICAL" => SurfaceType::Spherical,
            "ELLIPSOIDAL" => SurfaceType::Ellipsoidal,
            "CMW" | "COMPRESSED_MEDIAL_WALL" => SurfaceType::CompressedMedialWall,
            "FLAT" => SurfaceType::Flat,
            "FLAT_LOBAR" => SurfaceType::FlatLobar,
            "HULL" => SurfaceType::Hull,
            "" | "UNSPECIFIED" => SurfaceType::Unspecified,
            _ => SurfaceType::Unknown,
        }
    }

    pub fn is_flat(&self) -> bool {
        matches!(self, SurfaceType::Flat | SurfaceType::FlatLobar)
    }
}

/// Hemisphere (structure) tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Hemisphere {
    Left,
    Right,
    #[default]
    Unknown,
}

impl Hemisphere {
    pub fn name(&self) -> &'static str {
        match self {
            Hemisphere::Left => "left",
            Hemisphere::Right => "right",
            Hemisphere::Unknown => "unknown",
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "left" | "cortex_left" | "l" => Hemisphere::Left,
            "right" | "cortex_right" | "r" => Hemisphere::Right,
            _ => Hemisphere::Unknown,
        }
    }
}

/// Per-node crossover status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CrossoverStatus {
    #[default]
    No,
    Yes,
    DegenerateEdge,
}

/// Node positions and normals over a shared topology.
#[derive(Debug, Clone)]
pub struct Surface {
    pub(crate) coordinates: CoordinateStore,
    pub(crate) normals: Vec<Vector3<f64>>,
    topology: Option<Arc<Topology>>,
    surface_type: SurfaceType,
    hemisphere: Hemisphere,
    pub(crate) node_classes: Vec<NodeClass>,
    pub(crate) crossovers: Vec<CrossoverStatus>,
    pub(crate) saved_coordinates: Option<Vec<Point3<f64>>>,
    comment: String,
    config: Arc<Config>,
}

impl Default for Surface {
    fn default() -> Self {
        Self::new(SurfaceType::Unspecified)
    }
}

impl Surface {
    /// Creates an empty surface without topology.
    pub fn new(surface_type: SurfaceType) -> Self {
        Self {
            coordinates: CoordinateStore::new(),
            normals: Vec::new(),
            topology: None,
            surface_type,
            hemisphere: Hemisphere::Unknown,
            node_classes: Vec::new(),
            crossovers: Vec::new(),
            saved_coordinates: None,
            comment: String::new(),
            config: Arc::new(Config::default()),
        }
    }

    /// Creates a surface from positions and a topology, then computes
    /// normals.
    ///
    /// Fails when the topology references more nodes than `points` holds.
    pub fn from_parts(
        points: Vec<Point3<f64>>,
        topology: Arc<Topology>,
        surface_type: SurfaceType,
    ) -> Result<Self> {
        let nodes = points.len();
        let needed = topology.number_of_nodes();
        if needed > nodes {
            return Err(Error::MalformedInput(format!(
                "topology uses {needed} nodes but the surface has {nodes} coordinates"
            )));
        }
        let mut surface = Self::new(surface_type);
        surface.coordinates = CoordinateStore::from_points(points);
        surface.topology = Some(topology);
        surface.reset_node_attributes();
        surface.compute_normals();
        Ok(surface)
    }

    /// Attaches a configuration context.
    pub fn with_config(mut self, config: Arc<Config>) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn config_handle(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Empties the surface: no nodes, no topology, no saved snapshot.
    pub fn reset(&mut self) {
        let config = Arc::clone(&self.config);
        *self = Self::new(self.surface_type).with_config(config);
    }

    pub(crate) fn reset_node_attributes(&mut self) {
        let n = self.number_of_nodes();
        self.normals = vec![Vector3::z(); n];
        self.node_classes = vec![NodeClass::Interior; n];
        self.crossovers = vec![CrossoverStatus::No; n];
    }

    // --- Nodes ---

    pub fn number_of_nodes(&self) -> usize {
        self.coordinates.len()
    }

    pub fn coordinates(&self) -> &CoordinateStore {
        &self.coordinates
    }

    pub fn coordinates_mut(&mut self) -> &mut CoordinateStore {
        &mut self.coordinates
    }

    /// Position of `node`. Panics if out of range.
    pub fn point(&self, node: usize) -> Point3<f64> {
        self.coordinates.point(node)
    }

    pub fn set_point(&mut self, node: usize, point: Point3<f64>) {
        self.coordinates.set_point(node, point);
    }

    /// Appends a node with normal `+Z` and grows the topology's node count.
    pub fn add_node(&mut self, point: Point3<f64>) -> usize {
        self.coordinates.push(point);
        self.normals.push(Vector3::z());
        self.node_classes.push(NodeClass::Interior);
        self.crossovers.push(CrossoverStatus::No);
        let count = self.number_of_nodes();
        if let Some(topology) = &self.topology {
            topology.set_number_of_nodes(count);
        }
        count - 1
    }

    pub fn normals(&self) -> &[Vector3<f64>] {
        &self.normals
    }

    /// Normal of `node`, `+Z` before normals are computed.
    pub fn normal(&self, node: usize) -> Vector3<f64> {
        self.normals.get(node).copied().unwrap_or_else(Vector3::z)
    }

    // --- Topology ---

    pub fn topology(&self) -> Option<&Arc<Topology>> {
        self.topology.as_ref()
    }

    /// The attached topology, or an invariant violation when there is none.
    pub fn require_topology(&self) -> Result<&Arc<Topology>> {
        self.topology
            .as_ref()
            .ok_or_else(|| Error::InvariantViolation("surface has no topology".into()))
    }

    /// Adjacency helper of the attached topology.
    pub fn helper(&self, facets: HelperFacets) -> Result<Arc<TopologyHelper>> {
        Ok(self.require_topology()?.helper(facets))
    }

    /// Attaches a topology. A topology that references more nodes than the
    /// surface has is refused with [`Error::MalformedInput`] and the current
    /// topology stays attached.
    pub fn set_topology(&mut self, topology: Arc<Topology>) -> Result<()> {
        let needed = topology.number_of_nodes();
        let nodes = self.number_of_nodes();
        if needed > nodes {
            tracing::warn!(
                topology_nodes = needed,
                surface_nodes = nodes,
                "topology references more nodes than the surface has"
            );
            return Err(Error::MalformedInput(format!(
                "topology uses {needed} nodes but the surface has {nodes} coordinates"
            )));
        }
        self.topology = Some(topology);
        self.coordinates.clear_display_cache();
        Ok(())
    }

    /// Whether any tile uses `node`.
    pub(crate) fn connected_mask(&self) -> Vec<bool> {
        let n = self.number_of_nodes();
        match &self.topology {
            Some(topology) => {
                let helper = topology.helper(HelperFacets::NODES);
                (0..n).map(|i| helper.node_has_neighbors(i)).collect()
            }
            None => vec![false; n],
        }
    }

    // --- Tags ---

    pub fn surface_type(&self) -> SurfaceType {
        self.surface_type
    }

    pub fn set_surface_type(&mut self, surface_type: SurfaceType) {
        self.surface_type = surface_type;
    }

    pub fn hemisphere(&self) -> Hemisphere {
        self.hemisphere
    }

    pub fn set_hemisphere(&mut self, hemisphere: Hemisphere) {
        self.hemisphere = hemisphere;
    }

    /// Free-form processing history.
    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn append_comment(&mut self, text: &str) {
        self.comment.push_str(text);
        if !text.ends_with('\n') {
            self.comment.push('\n');
        }
    }

    // --- Node attributes ---

    /// Recomputes interior/edge classification from the topology.
    pub fn classify_nodes(&mut self) -> Result<&[NodeClass]> {
        let mut classes = self.require_topology()?.classify_nodes();
        classes.resize(self.number_of_nodes(), NodeClass::Interior);
        self.node_classes = classes;
        Ok(&self.node_classes)
    }

    pub fn node_classes(&self) -> &[NodeClass] {
        &self.node_classes
    }

    pub fn crossovers(&self) -> &[CrossoverStatus] {
        &self.crossovers
    }

    pub(crate) fn reset_crossovers(&mut self) {
        self.crossovers = vec![CrossoverStatus::No; self.number_of_nodes()];
    }

    // --- Topological checks ---

    /// Euler count using the flat formula for flat surface types.
    pub fn euler_count(&self) -> Result<EulerCount> {
        Ok(self
            .require_topology()?
            .euler_count(self.surface_type.is_flat()))
    }

    /// Flat surfaces need Euler 1 (disk); all others Euler 2 (sphere).
    pub fn is_topologically_correct(&self) -> Result<bool> {
        let count = self.euler_count()?;
        let expected = if self.surface_type.is_flat() { 1 } else { 2 };
        Ok(count.euler == expected)
    }

    /// Node nearest to `point`, considering every node.
    pub fn node_closest_to_point(&self, point: &Point3<f64>) -> Option<usize> {
        self.coordinates
            .points()
            .iter()
            .enumerate()
            .map(|(i, p)| (i, (p - point).norm_squared()))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{flat_grid, icosphere, tetrahedron};
    use crate::topology::TopologyType;

    #[test]
    fn clone_shares_topology() {
        let a = tetrahedron();
        let mut b = a.clone();
        b.set_point(0, Point3::new(5.0, 5.0, 5.0));
        assert_eq!(a.point(0), Point3::new(1.0, 1.0, 1.0));
        assert!(Arc::ptr_eq(a.topology().unwrap(), b.topology().unwrap()));
    }

    #[test]
    fn from_parts_rejects_short_coordinates() {
        let topology = Arc::new(Topology::from_tiles(vec![[0, 1, 5]], TopologyType::Open));
        let result = Surface::from_parts(vec![Point3::origin(); 3], topology, SurfaceType::Raw);
        assert!(matches!(result, Err(Error::MalformedInput(_))));
    }

    #[test]
    fn set_topology_refuses_too_many_nodes() {
        let mut surface = Surface::new(SurfaceType::Raw);
        surface.add_node(Point3::origin());
        let topology = Arc::new(Topology::from_tiles(vec![[0, 1, 2]], TopologyType::Open));
        assert!(matches!(surface.set_topology(topology), Err(Error::MalformedInput(_))));
        assert!(surface.topology().is_none());

        let mut grid = flat_grid(1);
        let before = Arc::clone(grid.topology().unwrap());
        let sphere = icosphere(1, 1.0);
        assert!(grid.set_topology(Arc::clone(sphere.topology().unwrap())).is_err());
        assert!(Arc::ptr_eq(grid.topology().unwrap(), &before));
        grid.landmark_constrained_smoothing(0.5, 1, &[false; 4], 0).unwrap();
    }

    #[test]
    fn add_node_grows_topology() {
        let mut surface = tetrahedron();
        let node = surface.add_node(Point3::new(9.0, 9.0, 9.0));
        assert_eq!(node, 4);
        assert_eq!(surface.topology().unwrap().number_of_nodes(), 5);
        assert_eq!(surface.normal(4), Vector3::z());
        assert_eq!(surface.node_closest_to_point(&Point3::new(8.0, 8.0, 8.0)), Some(4));
    }

    #[test]
    fn helper_without_topology_is_an_invariant_violation() {
        let surface = Surface::new(SurfaceType::Raw);
        assert!(matches!(
            surface.helper(HelperFacets::NODES),
            Err(Error::InvariantViolation(_))
        ));
    }

    #[test]
    fn closed_surface_is_topologically_correct() {
        let mut surface = tetrahedron();
        assert!(surface.is_topologically_correct().unwrap());
        surface.set_surface_type(SurfaceType::Flat);
        assert!(!surface.is_topologically_correct().unwrap());
    }

    #[test]
    fn type_names_round_trip() {
        for t in [
            SurfaceType::Raw,
            SurfaceType::Fiducial,
            SurfaceType::VeryInflated,
            SurfaceType::CompressedMedialWall,
            SurfaceType::FlatLobar,
        ] {
            assert_eq!(SurfaceType::from_name(t.name()), t);
        }
        assert_eq!(Hemisphere::from_name("LEFT"), Hemisphere::Left);
    }
}
