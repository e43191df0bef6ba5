// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connectivity analysis over a topology's adjacency.
//!
//! Connected components ("islands"), Euler characteristic and hole count,
//! non-manifold and degenerate edge detection, node classification, and
//! removal of corner tiles. Everything here reads the cached
//! [`TopologyHelper`](crate::TopologyHelper) and never looks at node
//! positions.

use serde::{Deserialize, Serialize};

use crate::helper::HelperFacets;
use crate::topology::Topology;

/// Connected components of a topology.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Islands {
    /// Root (first discovered node) of each island, in discovery order.
    pub roots: Vec<usize>,
    /// Number of nodes in each island.
    pub sizes: Vec<usize>,
    /// Root of the island containing each node; `None` for nodes without
    /// neighbors.
    pub node_root: Vec<Option<usize>>,
}

impl Islands {
    pub fn count(&self) -> usize {
        self.roots.len()
    }

    /// Index of the largest island; the first discovered wins ties.
    pub fn largest(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, &size) in self.sizes.iter().enumerate() {
            if best.map_or(true, |b| size > self.sizes[b]) {
                best = Some(i);
            }
        }
        best
    }
}

/// Euler characteristic of a topology.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EulerCount {
    pub faces: usize,
    pub vertices: usize,
    pub edges: usize,
    pub euler: i64,
    pub holes: i64,
    pub objects: usize,
}

/// Interior/edge classification of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NodeClass {
    #[default]
    Interior,
    /// Touches at least one boundary edge.
    Edge,
}

/// Outcome of [`Topology::remove_corner_tiles`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CornerRemoval {
    pub tiles_removed: usize,
    pub passes: usize,
    /// The pass limit was reached while tiles were still being removed.
    pub hit_pass_limit: bool,
}

impl Topology {
    /// Finds connected components with an iterative flood fill.
    ///
    /// Nodes without neighbors belong to no island. Islands are listed in
    /// order of their lowest node index.
    pub fn find_islands(&self) -> Islands {
        let helper = self.helper(HelperFacets::NODES);
        let num_nodes = helper.number_of_nodes();

        let mut islands = Islands {
            node_root: vec![None; num_nodes],
            ..Islands::default()
        };
        if num_nodes == 0 {
            return islands;
        }

        let mut visited: Vec<bool> = (0..num_nodes).map(|n| !helper.node_has_neighbors(n)).collect();
        let mut stack = Vec::new();

        for seed in 0..num_nodes {
            if visited[seed] {
                continue;
            }
            let mut size = 0usize;
            stack.push(seed);
            while let Some(node) = stack.pop() {
                if visited[node] {
                    continue;
                }
                visited[node] = true;
                islands.node_root[node] = Some(seed);
                size += 1;
                stack.extend(helper.neighbors(node).iter().copied().filter(|&n| !visited[n]));
            }
            islands.roots.push(seed);
            islands.sizes.push(size);
        }

        islands
    }

    /// Keeps only the largest island, deleting every tile that touches a
    /// node of another island. Returns the number of islands removed.
    pub fn disconnect_islands(&self) -> usize {
        let islands = self.find_islands();
        if islands.count() < 2 {
            return 0;
        }
        let Some(largest) = islands.largest() else {
            return 0;
        };
        let keep_root = islands.roots[largest];

        let marked: Vec<bool> = islands
            .node_root
            .iter()
            .map(|root| root.is_some_and(|r| r != keep_root))
            .collect();
        let removed = self.delete_tiles_with_marked_nodes(&marked);
        tracing::info!(
            islands = islands.count(),
            kept_size = islands.sizes[largest],
            tiles_removed = removed,
            "disconnected islands"
        );
        islands.count() - 1
    }

    /// Euler count. `flat` selects the open-disk hole formula.
    pub fn euler_count(&self, flat: bool) -> EulerCount {
        let helper = self.helper(HelperFacets::ALL);
        let vertices = (0..helper.number_of_nodes())
            .filter(|&n| helper.node_has_neighbors(n))
            .count();
        let edges = helper.number_of_edges();
        let faces = self.number_of_tiles();
        let euler = vertices as i64 - edges as i64 + faces as i64;
        let holes = if flat { 1 - euler } else { 1 - euler / 2 };
        EulerCount {
            faces,
            vertices,
            edges,
            euler,
            holes,
            objects: self.find_islands().count(),
        }
    }

    /// Edges used by more than two tiles: their count and the sorted set of
    /// nodes they touch.
    pub fn degenerate_edges(&self) -> (usize, Vec<usize>) {
        let helper = self.helper(HelperFacets::EDGES);
        let mut nodes = Vec::new();
        let mut count = 0;
        for edge in helper.edges().iter().filter(|e| e.used_by_more_than_two) {
            count += 1;
            nodes.push(edge.nodes.0);
            nodes.push(edge.nodes.1);
        }
        nodes.sort_unstable();
        nodes.dedup();
        (count, nodes)
    }

    /// Nodes touched by four or more boundary edges.
    pub fn non_manifold_nodes(&self) -> Vec<usize> {
        let helper = self.helper(HelperFacets::EDGES);
        (0..helper.number_of_nodes())
            .filter(|&n| helper.number_of_boundary_edges(n) >= 4)
            .collect()
    }

    /// Classifies every node as interior or edge (touching a boundary edge).
    pub fn classify_nodes(&self) -> Vec<NodeClass> {
        let helper = self.helper(HelperFacets::ALL);
        (0..helper.number_of_nodes())
            .map(|n| {
                if helper.number_of_boundary_edges(n) > 0 {
                    NodeClass::Edge
                } else {
                    NodeClass::Interior
                }
            })
            .collect()
    }

    /// Tiles with at least `num_corner_nodes` (and at least one) vertices
    /// that have exactly two neighbors.
    pub fn corner_tiles(&self, num_corner_nodes: usize) -> Vec<usize> {
        let helper = self.helper(HelperFacets::NODES);
        let threshold = num_corner_nodes.max(1);
        self.with_tiles(|tiles| {
            tiles
                .iter()
                .enumerate()
                .filter(|(_, tile)| {
                    tile.iter()
                        .filter(|&&n| helper.number_of_neighbors(n) == 2)
                        .count()
                        >= threshold
                })
                .map(|(i, _)| i)
                .collect()
        })
    }

    /// Repeatedly deletes corner tiles until a pass removes nothing or
    /// `max_passes` passes have run.
    pub fn remove_corner_tiles(&self, num_corner_nodes: usize, max_passes: usize) -> CornerRemoval {
        let mut outcome = CornerRemoval::default();
        loop {
            let corners = self.corner_tiles(num_corner_nodes);
            if corners.is_empty() {
                break;
            }
            if outcome.passes >= max_passes {
                outcome.hit_pass_limit = true;
                tracing::warn!(
                    passes = outcome.passes,
                    tiles_removed = outcome.tiles_removed,
                    remaining = corners.len(),
                    "corner tile removal stopped at the pass limit"
                );
                break;
            }
            outcome.passes += 1;
            outcome.tiles_removed += self.delete_tiles(&corners);
        }
        outcome
    }
}
