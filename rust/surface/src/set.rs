// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Collection of surfaces over deduplicated topologies.
//!
//! A [`SurfaceSet`] owns surfaces and the topologies they reference. Adding
//! a topology whose tile list matches one already in the set returns the
//! existing key; adding a surface re-points it at the set's copy of its
//! topology, so structurally identical surfaces share one `Arc<Topology>`
//! and one adjacency helper.

use std::sync::Arc;

use slotmap::SlotMap;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::keys::{SetKey, SurfaceKey, TopologyKey};
use crate::surface::Surface;
use crate::topology::Topology;

/// Arena of surfaces and shared topologies.
#[derive(Debug, Default)]
pub struct SurfaceSet {
    config: Arc<Config>,
    topologies: SlotMap<TopologyKey, Arc<Topology>>,
    surfaces: SlotMap<SurfaceKey, Surface>,
}

fn not_found(key: impl Into<SetKey>) -> Error {
    Error::NotFound(key.into().to_string())
}

impl SurfaceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whose surfaces all read `config`.
    pub fn with_config(config: Arc<Config>) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // --- Topologies ---

    /// Adds a topology, or returns the key of a stored topology with the
    /// same tile list.
    pub fn add_topology(&mut self, topology: Arc<Topology>) -> TopologyKey {
        if let Some(key) = self.find_topology(&topology) {
            tracing::debug!(key = %SetKey::from(key), "reusing identical topology");
            return key;
        }
        self.topologies.insert(topology)
    }

    fn find_topology(&self, topology: &Topology) -> Option<TopologyKey> {
        self.topologies
            .iter()
            .find(|(_, stored)| stored.same_tiles(topology))
            .map(|(key, _)| key)
    }

    pub fn topology(&self, key: TopologyKey) -> Option<&Arc<Topology>> {
        self.topologies.get(key)
    }

    pub fn number_of_topologies(&self) -> usize {
        self.topologies.len()
    }

    /// Key of the stored topology `surface` points at.
    pub fn topology_of(&self, surface: SurfaceKey) -> Option<TopologyKey> {
        let topology = self.surfaces.get(surface)?.topology()?;
        self.topologies
            .iter()
            .find(|(_, stored)| Arc::ptr_eq(stored, topology))
            .map(|(key, _)| key)
    }

    /// Drops topologies that no surface in the set references. Returns how
    /// many were dropped.
    pub fn release_unused_topologies(&mut self) -> usize {
        let surfaces = &self.surfaces;
        let before = self.topologies.len();
        self.topologies.retain(|_, topology| {
            surfaces
                .values()
                .any(|s| s.topology().is_some_and(|t| Arc::ptr_eq(t, topology)))
        });
        let released = before - self.topologies.len();
        if released > 0 {
            tracing::debug!(released, "released unused topologies");
        }
        released
    }

    // --- Surfaces ---

    /// Takes ownership of `surface`. Its topology is deduplicated against
    /// the set and the surface is switched to the stored instance.
    pub fn add_surface(&mut self, surface: Surface) -> SurfaceKey {
        let mut surface = surface.with_config(Arc::clone(&self.config));
        if let Some(topology) = surface.topology().cloned() {
            let key = self.add_topology(Arc::clone(&topology));
            if let Some(stored) = self.topologies.get(key) {
                if !Arc::ptr_eq(stored, &topology) && surface.set_topology(Arc::clone(stored)).is_err() {
                    // The stored copy has grown past this surface's nodes.
                    self.topologies.insert(topology);
                }
            }
        }
        self.surfaces.insert(surface)
    }

    pub fn surface(&self, key: SurfaceKey) -> Option<&Surface> {
        self.surfaces.get(key)
    }

    pub fn surface_mut(&mut self, key: SurfaceKey) -> Option<&mut Surface> {
        self.surfaces.get_mut(key)
    }

    /// The surface, or [`Error::NotFound`].
    pub fn require_surface(&self, key: SurfaceKey) -> Result<&Surface> {
        self.surfaces.get(key).ok_or_else(|| not_found(key))
    }

    /// Removes and returns a surface. Its topology stays in the set until
    /// [`SurfaceSet::release_unused_topologies`] runs.
    pub fn remove_surface(&mut self, key: SurfaceKey) -> Result<Surface> {
        self.surfaces.remove(key).ok_or_else(|| not_found(key))
    }

    pub fn number_of_surfaces(&self) -> usize {
        self.surfaces.len()
    }

    pub fn surfaces(&self) -> impl Iterator<Item = (SurfaceKey, &Surface)> {
        self.surfaces.iter()
    }

    /// Surfaces that reference the stored topology `key`.
    pub fn surfaces_using(&self, key: TopologyKey) -> Result<Vec<SurfaceKey>> {
        let topology = self.topologies.get(key).ok_or_else(|| not_found(key))?;
        Ok(self
            .surfaces
            .iter()
            .filter(|(_, s)| s.topology().is_some_and(|t| Arc::ptr_eq(t, topology)))
            .map(|(k, _)| k)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{icosphere, tetrahedron};
    use crate::topology::TopologyType;

    #[test]
    fn identical_topologies_are_shared() {
        let mut set = SurfaceSet::new();
        let a = tetrahedron();
        // Same tiles, separate allocation.
        let copy = Arc::new(a.topology().unwrap().deep_copy());
        let mut b = a.clone();
        b.set_topology(Arc::clone(&copy)).unwrap();

        let ka = set.add_surface(a);
        let kb = set.add_surface(b);
        assert_eq!(set.number_of_topologies(), 1);
        assert_eq!(set.topology_of(ka), set.topology_of(kb));
        assert!(!Arc::ptr_eq(set.surface(kb).unwrap().topology().unwrap(), &copy));
        assert_eq!(set.surfaces_using(set.topology_of(ka).unwrap()).unwrap(), vec![ka, kb]);
    }

    #[test]
    fn add_topology_deduplicates_by_tiles() {
        let mut set = SurfaceSet::new();
        let first = set.add_topology(Arc::new(Topology::from_tiles(vec![[0, 1, 2]], TopologyType::Open)));
        let again = set.add_topology(Arc::new(Topology::from_tiles(vec![[0, 1, 2]], TopologyType::Closed)));
        let other = set.add_topology(Arc::new(Topology::from_tiles(vec![[0, 2, 1]], TopologyType::Open)));
        assert_eq!(first, again);
        assert_ne!(first, other);
        assert_eq!(set.number_of_topologies(), 2);
    }

    #[test]
    fn removing_surfaces_releases_topologies() {
        let mut set = SurfaceSet::new();
        let tet = set.add_surface(tetrahedron());
        let sphere = set.add_surface(icosphere(1, 1.0));
        assert_eq!(set.number_of_topologies(), 2);

        let removed = set.remove_surface(tet).unwrap();
        assert_eq!(removed.number_of_nodes(), 4);
        assert!(matches!(set.remove_surface(tet), Err(Error::NotFound(_))));
        assert!(set.require_surface(tet).is_err());
        assert_eq!(set.release_unused_topologies(), 1);
        assert_eq!(set.number_of_topologies(), 1);
        assert!(set.topology_of(sphere).is_some());
        assert_eq!(set.number_of_surfaces(), 1);
    }

    #[test]
    fn surfaces_adopt_the_set_config() {
        let config = Arc::new(Config {
            debug: true,
            ..Config::default()
        });
        let mut set = SurfaceSet::with_config(config);
        let key = set.add_surface(Surface::new(crate::surface::SurfaceType::Raw));
        assert!(set.surface(key).unwrap().config().debug);
        assert!(set.topology_of(key).is_none());
        set.surface_mut(key).unwrap().add_node(nalgebra::Point3::origin());
        assert_eq!(set.surfaces().count(), 1);
    }
}
