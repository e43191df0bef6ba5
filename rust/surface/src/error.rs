// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for surface operations.

/// Result type alias for surface operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during surface operations.
///
/// Degenerate geometry (zero-length edges, zero areas, empty neighborhoods)
/// is never reported here; algorithms guard those cases and substitute a
/// safe value.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input data is inconsistent: a tile index past the node count, a
    /// per-node array whose length does not match the surface, bad file
    /// content.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A tile references a node outside the surface.
    #[error("tile {tile} references node {node} but the surface has {nodes} nodes")]
    TileIndexOutOfRange {
        tile: usize,
        node: usize,
        nodes: usize,
    },

    /// A caller broke an API contract (for example asking for adjacency
    /// before any topology is attached).
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// A surface or topology key was not found in a surface set.
    #[error("entity not found: {0}")]
    NotFound(String),

    /// An external collaborator (polygon library, curvature source,
    /// rasterizer) reported a failure.
    #[error("collaborator failure: {0}")]
    Collaborator(String),

    /// A caller-supplied interruption check asked a long-running pipeline
    /// to stop.
    #[error("operation interrupted")]
    Interrupted,

    /// Reading or writing an exchange document failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
