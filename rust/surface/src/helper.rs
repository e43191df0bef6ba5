// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Derived adjacency for a tile list.
//!
//! [`TopologyHelper`] answers the neighborhood questions every algorithm in
//! this crate asks: which nodes surround a node (in ring order where the
//! fan is manifold), which tiles use it, and which tiles own each edge. It is
//! immutable once built; [`Topology::helper`](crate::Topology::helper)
//! caches it and swaps in a new one after the tile list changes.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::topology::Tile;

/// Per-node adjacency list. Cortical meshes rarely exceed eight neighbors.
pub type NodeList = SmallVec<[usize; 8]>;

/// The independently trackable parts of a helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HelperFacets {
    pub edges: bool,
    pub node_neighbors: bool,
    pub sorted_neighbors: bool,
}

impl HelperFacets {
    pub const NONE: Self = Self {
        edges: false,
        node_neighbors: false,
        sorted_neighbors: false,
    };
    pub const EDGES: Self = Self {
        edges: true,
        node_neighbors: false,
        sorted_neighbors: false,
    };
    pub const NODES: Self = Self {
        edges: false,
        node_neighbors: true,
        sorted_neighbors: false,
    };
    pub const SORTED: Self = Self {
        edges: false,
        node_neighbors: true,
        sorted_neighbors: true,
    };
    pub const ALL: Self = Self {
        edges: true,
        node_neighbors: true,
        sorted_neighbors: true,
    };

    /// Whether every facet of `other` is set in `self`.
    pub fn contains(self, other: HelperFacets) -> bool {
        (self.edges || !other.edges)
            && (self.node_neighbors || !other.node_neighbors)
            && (self.sorted_neighbors || !other.sorted_neighbors)
    }

    pub fn union(self, other: HelperFacets) -> HelperFacets {
        HelperFacets {
            edges: self.edges || other.edges,
            node_neighbors: self.node_neighbors || other.node_neighbors,
            sorted_neighbors: self.sorted_neighbors || other.sorted_neighbors,
        }
    }
}

/// An edge and the tiles that own it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeInfo {
    /// Endpoints, lower index first.
    pub nodes: (usize, usize),
    /// First and second owning tile.
    pub tiles: [Option<usize>; 2],
    /// Set when more than two tiles use the edge.
    pub used_by_more_than_two: bool,
}

impl EdgeInfo {
    /// Number of owning tiles, saturating at 3 for over-used edges.
    pub fn tile_count(&self) -> usize {
        if self.used_by_more_than_two {
            3
        } else {
            self.tiles.iter().filter(|t| t.is_some()).count()
        }
    }

    /// Edge with a single owning tile.
    pub fn is_boundary(&self) -> bool {
        self.tile_count() == 1
    }

    fn add_tile(&mut self, tile: usize) {
        match self.tiles {
            [None, _] => self.tiles[0] = Some(tile),
            [Some(_), None] => self.tiles[1] = Some(tile),
            _ => self.used_by_more_than_two = true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Link {
    tile: usize,
    a: usize,
    b: usize,
}

impl Link {
    fn contains(&self, n: usize) -> bool {
        self.a == n || self.b == n
    }

    fn other(&self, n: usize) -> usize {
        if self.a == n {
            self.b
        } else {
            self.a
        }
    }
}

/// Adjacency view of a tile list.
#[derive(Debug, Clone)]
pub struct TopologyHelper {
    neighbors: Vec<NodeList>,
    node_tiles: Vec<NodeList>,
    sorted: Vec<bool>,
    boundary_edges: Vec<usize>,
    edges: Vec<EdgeInfo>,
    edge_index: FxHashMap<(usize, usize), usize>,
    tiles: Vec<Tile>,
}

impl TopologyHelper {
    /// Builds every facet from a tile list. `min_nodes` is the owning
    /// topology's node count; nodes that no tile references still get an
    /// (empty) entry.
    pub fn build(tiles: &[Tile], min_nodes: usize) -> Self {
        let max_index = tiles.iter().flatten().map(|&n| n + 1).max().unwrap_or(0);
        let num_nodes = max_index.max(min_nodes);

        let mut links: Vec<Vec<Link>> = vec![Vec::new(); num_nodes];
        let mut edge_index: FxHashMap<(usize, usize), usize> = FxHashMap::default();
        let mut edges: Vec<EdgeInfo> = Vec::new();

        for (t, &[n1, n2, n3]) in tiles.iter().enumerate() {
            links[n1].push(Link { tile: t, a: n2, b: n3 });
            links[n2].push(Link { tile: t, a: n3, b: n1 });
            links[n3].push(Link { tile: t, a: n1, b: n2 });

            for (a, b) in [(n1, n2), (n2, n3), (n3, n1)] {
                let key = (a.min(b), a.max(b));
                let slot = *edge_index.entry(key).or_insert_with(|| {
                    edges.push(EdgeInfo {
                        nodes: key,
                        tiles: [None, None],
                        used_by_more_than_two: false,
                    });
                    edges.len() - 1
                });
                edges[slot].add_tile(t);
            }
        }

        // Edges in node-pair order, like an ordered set keyed on the pair.
        edges.sort_by_key(|e| e.nodes);
        for (i, e) in edges.iter().enumerate() {
            edge_index.insert(e.nodes, i);
        }

        let mut neighbors = Vec::with_capacity(num_nodes);
        let mut node_tiles = Vec::with_capacity(num_nodes);
        let mut sorted = Vec::with_capacity(num_nodes);
        for node_links in &links {
            let (n, t, ok) = order_links(node_links);
            neighbors.push(n);
            node_tiles.push(t);
            sorted.push(ok);
        }

        let mut boundary_edges = vec![0usize; num_nodes];
        for e in edges.iter().filter(|e| e.is_boundary()) {
            boundary_edges[e.nodes.0] += 1;
            boundary_edges[e.nodes.1] += 1;
        }

        Self {
            neighbors,
            node_tiles,
            sorted,
            boundary_edges,
            edges,
            edge_index,
            tiles: tiles.to_vec(),
        }
    }

    // --- Node queries ---

    pub fn number_of_nodes(&self) -> usize {
        self.neighbors.len()
    }

    pub fn node_has_neighbors(&self, node: usize) -> bool {
        self.neighbors.get(node).is_some_and(|n| !n.is_empty())
    }

    pub fn number_of_neighbors(&self, node: usize) -> usize {
        self.neighbors.get(node).map_or(0, |n| n.len())
    }

    /// Neighbors of `node`, in ring order when [`is_sorted`](Self::is_sorted).
    pub fn neighbors(&self, node: usize) -> &[usize] {
        self.neighbors.get(node).map_or(&[], |n| n.as_slice())
    }

    /// Tiles using `node`, in ring order when [`is_sorted`](Self::is_sorted).
    pub fn tiles_of_node(&self, node: usize) -> &[usize] {
        self.node_tiles.get(node).map_or(&[], |t| t.as_slice())
    }

    /// Whether the neighbors of `node` are ordered around it. False for
    /// non-manifold fans, whose neighbors are listed in first-seen order.
    pub fn is_sorted(&self, node: usize) -> bool {
        self.sorted.get(node).copied().unwrap_or(false)
    }

    /// Largest neighbor count of any node.
    pub fn max_neighbors(&self) -> usize {
        self.neighbors.iter().map(|n| n.len()).max().unwrap_or(0)
    }

    /// Number of boundary edges (one owning tile) touching `node`.
    pub fn number_of_boundary_edges(&self, node: usize) -> usize {
        self.boundary_edges.get(node).copied().unwrap_or(0)
    }

    /// Nodes within `depth` rings of `node`, excluding `node`, in
    /// breadth-first order.
    pub fn neighbors_to_depth(&self, node: usize, depth: usize) -> Vec<usize> {
        if node >= self.number_of_nodes() || depth == 0 {
            return Vec::new();
        }
        let mut visited = vec![false; self.number_of_nodes()];
        visited[node] = true;
        let mut result = Vec::new();
        let mut queue = VecDeque::from([(node, 0usize)]);
        while let Some((current, d)) = queue.pop_front() {
            if d == depth {
                continue;
            }
            for &n in self.neighbors(current) {
                if !visited[n] {
                    visited[n] = true;
                    result.push(n);
                    queue.push_back((n, d + 1));
                }
            }
        }
        result
    }

    // --- Edge queries ---

    pub fn number_of_edges(&self) -> usize {
        self.edges.len()
    }

    /// All edges, ordered by endpoint pair.
    pub fn edges(&self) -> &[EdgeInfo] {
        &self.edges
    }

    /// The edge between `a` and `b`, in either order.
    pub fn edge(&self, a: usize, b: usize) -> Option<&EdgeInfo> {
        self.edge_index
            .get(&(a.min(b), a.max(b)))
            .map(|&i| &self.edges[i])
    }

    /// Whether `a → b` appears in the cyclic order of `tile`.
    pub fn edge_orientation_in_tile(&self, a: usize, b: usize, tile: usize) -> bool {
        match self.tiles.get(tile) {
            Some(&[n1, n2, n3]) => {
                (n1 == a && n2 == b) || (n2 == a && n3 == b) || (n3 == a && n1 == b)
            }
            None => false,
        }
    }
}

/// Orders a node's links into a ring. Returns neighbors, tiles, and whether
/// the ring order covers every neighbor.
fn order_links(links: &[Link]) -> (NodeList, NodeList, bool) {
    let mut unsorted = NodeList::new();
    let mut tiles = NodeList::new();
    for link in links {
        for n in [link.a, link.b] {
            if !unsorted.contains(&n) {
                unsorted.push(n);
            }
        }
        tiles.push(link.tile);
    }
    if links.is_empty() {
        return (unsorted, tiles, true);
    }

    // A boundary node has a link whose first node no other link uses; the
    // ring has to start there to reach every neighbor.
    let start = (0..links.len())
        .find(|&k| {
            let first = links[k].a;
            !links
                .iter()
                .enumerate()
                .any(|(m, other)| m != k && other.contains(first))
        })
        .unwrap_or(0);

    let mut ring = NodeList::new();
    let mut ring_tiles = NodeList::new();
    let first = links[start].a;
    let mut current = first;
    let mut next = Some(links[start].b);
    ring.push(current);
    ring_tiles.push(links[start].tile);

    for _ in 1..links.len() {
        let Some(candidate) = next else { break };
        ring.push(candidate);
        match links
            .iter()
            .find(|l| l.contains(candidate) && !l.contains(current))
        {
            Some(link) => {
                ring_tiles.push(link.tile);
                current = candidate;
                next = Some(link.other(candidate));
            }
            None => next = None,
        }
    }
    if let Some(last) = next {
        if last != first {
            ring.push(last);
        }
    }

    let mut seen = ring.clone();
    seen.sort_unstable();
    seen.dedup();
    let complete = seen.len() == ring.len()
        && ring.len() == unsorted.len()
        && ring_tiles.len() == tiles.len();
    if complete {
        (ring, ring_tiles, true)
    } else {
        (unsorted, tiles, false)
    }
}
