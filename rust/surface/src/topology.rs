// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Triangle connectivity shared between surfaces.
//!
//! A [`Topology`] owns the tile list of a mesh and nothing about node
//! positions. Several surfaces (fiducial, inflated, sphere, ...) normally
//! share one topology through an `Arc<Topology>`, so all mutation goes
//! through `&self` and is visible to every holder. There is no per-surface
//! versioning: deleting tiles through one surface changes the mesh seen by
//! all of them.
//!
//! ## Adjacency cache
//!
//! Neighbor lists and edge records live in a [`TopologyHelper`] built on
//! demand by [`Topology::helper`]. Every mutation bumps the modification
//! counter; the cached helper is only handed out while it was built for the
//! current counter and covers the requested [`HelperFacets`]. A rebuild runs
//! under the cache mutex and the finished helper is swapped in whole, so a
//! reader never sees a partially built helper.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::helper::{HelperFacets, TopologyHelper};

/// A triangle: three node indices. Counter-clockwise order (seen from
/// outside) gives an outward normal.
pub type Tile = [usize; 3];

/// Perimeter classification of a topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TopologyType {
    /// Closed surface without boundary.
    Closed,
    /// Open surface (medial wall removed).
    Open,
    /// Cut surface used for flattening.
    Cut,
    /// Lobar cut surface.
    LobarCut,
    Unknown,
    #[default]
    Unspecified,
}

impl TopologyType {
    /// Perimeter ID string carried in exchange documents.
    pub fn perimeter_id(&self) -> &'static str {
        match self {
            TopologyType::Closed => "CLOSED",
            TopologyType::Open => "OPEN",
            TopologyType::Cut => "CUT",
            TopologyType::LobarCut => "LOBAR_CUT",
            TopologyType::Unknown => "UNKNOWN",
            TopologyType::Unspecified => "UNSPECIFIED",
        }
    }

    /// Parses a perimeter ID. Unrecognized strings map to `Unknown` and the
    /// empty string to `Unspecified`.
    pub fn from_perimeter_id(id: &str) -> Self {
        match id.trim().to_ascii_uppercase().as_str() {
            "CLOSED" => TopologyType::Closed,
            "OPEN" => TopologyType::Open,
            "CUT" => TopologyType::Cut,
            "LOBAR_CUT" => TopologyType::LobarCut,
            "" | "UNSPECIFIED" => TopologyType::Unspecified,
            _ => TopologyType::Unknown,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct TopologyData {
    tiles: Vec<Tile>,
    number_of_nodes: usize,
    topology_type: TopologyType,
    metadata: BTreeMap<String, String>,
    modification: u64,
}

impl TopologyData {
    fn touch(&mut self) {
        self.modification = self.modification.wrapping_add(1);
    }

    fn grow_node_count(&mut self, tile: &Tile) {
        for &n in tile {
            self.number_of_nodes = self.number_of_nodes.max(n + 1);
        }
    }
}

#[derive(Default)]
struct HelperCache {
    helper: Option<Arc<TopologyHelper>>,
    valid: HelperFacets,
    built_for: u64,
}

/// Triangle connectivity of a mesh with a lazily rebuilt adjacency cache.
#[derive(Default)]
pub struct Topology {
    data: RwLock<TopologyData>,
    cache: Mutex<HelperCache>,
}

impl fmt::Debug for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.read();
        f.debug_struct("Topology")
            .field("tiles", &data.tiles.len())
            .field("number_of_nodes", &data.number_of_nodes)
            .field("topology_type", &data.topology_type)
            .field("modification", &data.modification)
            .finish()
    }
}

impl Topology {
    /// Creates an empty topology.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a topology from a tile list. The node count becomes the
    /// largest referenced index plus one.
    pub fn from_tiles(tiles: Vec<Tile>, topology_type: TopologyType) -> Self {
        let mut data = TopologyData {
            topology_type,
            ..TopologyData::default()
        };
        for tile in &tiles {
            data.grow_node_count(tile);
        }
        data.tiles = tiles;
        Self {
            data: RwLock::new(data),
            cache: Mutex::new(HelperCache::default()),
        }
    }

    /// Returns an independent copy of this topology (tiles, type, node count
    /// and metadata; the helper cache is not copied).
    pub fn deep_copy(&self) -> Self {
        let data = self.read().clone();
        Self {
            data: RwLock::new(data),
            cache: Mutex::new(HelperCache::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, TopologyData> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TopologyData> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_cache(&self) -> MutexGuard<'_, HelperCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // --- Helper cache ---

    /// Returns an adjacency helper covering `facets`, rebuilding it when the
    /// topology changed since the last build or a facet is missing.
    ///
    /// A rebuild always computes every facet, so a call performs at most one
    /// rebuild. Concurrent callers block on the cache mutex and observe
    /// either the previous or the completed helper.
    pub fn helper(&self, facets: HelperFacets) -> Arc<TopologyHelper> {
        let mut cache = self.lock_cache();
        let data = self.read();

        if let Some(helper) = &cache.helper {
            if cache.built_for == data.modification && cache.valid.contains(facets) {
                return Arc::clone(helper);
            }
        }

        // Clear first: an interrupted rebuild must leave the cache stale.
        cache.helper = None;
        cache.valid = HelperFacets::NONE;

        let helper = Arc::new(TopologyHelper::build(&data.tiles, data.number_of_nodes));
        tracing::debug!(
            tiles = data.tiles.len(),
            nodes = helper.number_of_nodes(),
            edges = helper.number_of_edges(),
            "rebuilt topology helper"
        );

        cache.helper = Some(Arc::clone(&helper));
        cache.valid = HelperFacets::ALL;
        cache.built_for = data.modification;
        helper
    }

    /// Marks every helper facet invalid. The next [`helper`](Self::helper)
    /// call rebuilds.
    pub fn invalidate_helper(&self) {
        let mut cache = self.lock_cache();
        cache.valid = HelperFacets::NONE;
    }

    /// Whether a cached helper currently satisfies `facets` without a rebuild.
    pub fn helper_is_valid(&self, facets: HelperFacets) -> bool {
        let cache = self.lock_cache();
        let data = self.read();
        cache.helper.is_some() && cache.built_for == data.modification && cache.valid.contains(facets)
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut TopologyData) -> R) -> R {
        let result = {
            let mut data = self.write();
            let result = f(&mut data);
            data.touch();
            result
        };
        self.invalidate_helper();
        result
    }

    // --- Queries ---

    /// Number of tiles.
    pub fn number_of_tiles(&self) -> usize {
        self.read().tiles.len()
    }

    /// Node count; never decreases.
    pub fn number_of_nodes(&self) -> usize {
        self.read().number_of_nodes
    }

    /// Returns a tile by index.
    pub fn tile(&self, index: usize) -> Option<Tile> {
        self.read().tiles.get(index).copied()
    }

    /// Returns a copy of the tile list.
    pub fn tiles(&self) -> Vec<Tile> {
        self.read().tiles.clone()
    }

    /// Runs `f` with read access to the tile list.
    pub fn with_tiles<R>(&self, f: impl FnOnce(&[Tile]) -> R) -> R {
        f(&self.read().tiles)
    }

    pub fn topology_type(&self) -> TopologyType {
        self.read().topology_type
    }

    /// Modification counter, bumped by every mutation.
    pub fn modification(&self) -> u64 {
        self.read().modification
    }

    pub fn metadata(&self, key: &str) -> Option<String> {
        self.read().metadata.get(key).cloned()
    }

    pub fn all_metadata(&self) -> BTreeMap<String, String> {
        self.read().metadata.clone()
    }

    /// Same ordered tile list. This is the deduplication criterion used when
    /// a topology is added to a [`SurfaceSet`](crate::SurfaceSet).
    pub fn same_tiles(&self, other: &Topology) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        let a = self.read();
        let b = other.read();
        a.tiles == b.tiles
    }

    /// Same topology type and same ordered tile list.
    pub fn equivalent(&self, other: &Topology) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        let a = self.read();
        let b = other.read();
        a.topology_type == b.topology_type && a.tiles == b.tiles
    }

    // --- Mutation ---

    /// Appends a tile, growing the node count if needed.
    pub fn add_tile(&self, tile: Tile) {
        self.mutate(|data| {
            data.grow_node_count(&tile);
            data.tiles.push(tile);
        });
    }

    /// Replaces a tile.
    pub fn set_tile(&self, index: usize, tile: Tile) -> Result<()> {
        let count = self.number_of_tiles();
        if index >= count {
            return Err(Error::InvariantViolation(format!(
                "tile index {index} out of range ({count} tiles)"
            )));
        }
        self.mutate(|data| {
            data.grow_node_count(&tile);
            data.tiles[index] = tile;
        });
        Ok(())
    }

    /// Replaces the whole tile list. The node count still only grows.
    pub fn set_tiles(&self, tiles: Vec<Tile>) {
        self.mutate(|data| {
            for tile in &tiles {
                data.grow_node_count(tile);
            }
            data.tiles = tiles;
        });
    }

    /// Raises the node count to `count`. Smaller values are ignored.
    pub fn set_number_of_nodes(&self, count: usize) {
        if count > self.number_of_nodes() {
            self.mutate(|data| data.number_of_nodes = data.number_of_nodes.max(count));
        }
    }

    pub fn set_topology_type(&self, topology_type: TopologyType) {
        self.mutate(|data| data.topology_type = topology_type);
    }

    pub fn set_metadata(&self, key: impl Into<String>, value: impl Into<String>) {
        let (key, value) = (key.into(), value.into());
        self.mutate(|data| {
            data.metadata.insert(key, value);
        });
    }

    /// Removes every tile.
    pub fn clear_tiles(&self) {
        self.mutate(|data| data.tiles.clear());
    }

    /// Deletes the tiles at the given indices. Out-of-range and duplicate
    /// indices are ignored. Returns the number of tiles removed.
    pub fn delete_tiles(&self, indices: &[usize]) -> usize {
        if indices.is_empty() {
            return 0;
        }
        self.mutate(|data| {
            let mut doomed = vec![false; data.tiles.len()];
            for &i in indices {
                if let Some(flag) = doomed.get_mut(i) {
                    *flag = true;
                }
            }
            let before = data.tiles.len();
            let mut index = 0;
            data.tiles.retain(|_| {
                let keep = !doomed[index];
                index += 1;
                keep
            });
            before - data.tiles.len()
        })
    }

    /// Deletes every tile with at least one node set in `marked`. Nodes past
    /// the end of `marked` count as unmarked.
    pub fn delete_tiles_with_marked_nodes(&self, marked: &[bool]) -> usize {
        let doomed: Vec<usize> = self.with_tiles(|tiles| {
            tiles
                .iter()
                .enumerate()
                .filter(|(_, tile)| tile.iter().any(|&n| marked.get(n).copied().unwrap_or(false)))
                .map(|(i, _)| i)
                .collect()
        });
        self.delete_tiles(&doomed)
    }

    /// Deletes every tile that uses the edge between `a` and `b` (in either
    /// direction).
    pub fn delete_tiles_with_edge(&self, a: usize, b: usize) -> usize {
        let doomed: Vec<usize> = self.with_tiles(|tiles| {
            tiles
                .iter()
                .enumerate()
                .filter(|(_, tile)| tile.contains(&a) && tile.contains(&b))
                .map(|(i, _)| i)
                .collect()
        });
        self.delete_tiles(&doomed)
    }

    /// Reverses the winding of every tile.
    pub fn flip_tile_orientation(&self) {
        self.mutate(|data| {
            for tile in &mut data.tiles {
                tile.swap(0, 2);
            }
        });
    }

    /// Reverses the winding of the listed tiles only.
    pub fn flip_tiles(&self, indices: &[usize]) {
        if indices.is_empty() {
            return;
        }
        self.mutate(|data| {
            for &i in indices {
                if let Some(tile) = data.tiles.get_mut(i) {
                    tile.swap(0, 2);
                }
            }
        });
    }
}
