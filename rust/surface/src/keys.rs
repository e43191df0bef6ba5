// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Key types for [`SurfaceSet`](crate::SurfaceSet) storage.
//!
//! Keys are generational `slotmap` indices: a key taken before a removal
//! never resolves to an entry inserted after it.

use std::fmt;

use slotmap::{new_key_type, Key};

new_key_type! {
    /// Key for a surface owned by a set.
    pub struct SurfaceKey;

    /// Key for a deduplicated topology owned by a set.
    pub struct TopologyKey;
}

/// Either kind of set key, used in lookups and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetKey {
    Surface(SurfaceKey),
    Topology(TopologyKey),
}

impl fmt::Display for SetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetKey::Surface(k) => write!(f, "surface {:?}", k.data()),
            SetKey::Topology(k) => write!(f, "topology {:?}", k.data()),
        }
    }
}

impl From<SurfaceKey> for SetKey {
    fn from(k: SurfaceKey) -> Self {
        SetKey::Surface(k)
    }
}

impl From<TopologyKey> for SetKey {
    fn from(k: TopologyKey) -> Self {
        SetKey::Topology(k)
    }
}
