// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Engine configuration loaded from environment variables.
//!
//! A [`Config`] is attached to every [`Surface`](crate::Surface) and read by
//! the algorithms that need tuning knobs or extra diagnostics, instead of a
//! process-wide debug switch.

use serde::{Deserialize, Serialize};

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Emit per-iteration diagnostics (area fits, crossover counts) at
    /// `debug` level and run the extra consistency checks.
    pub debug: bool,
    /// Surfaces with fewer nodes than this are smoothed on the calling
    /// thread instead of the rayon pool.
    pub parallel_min_nodes: usize,
    /// Upper bound on corner-tile removal passes.
    pub corner_removal_max_passes: usize,
    /// Multiplier applied to the iteration counts of the inflation pipeline.
    pub iteration_scale: f64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparsable variables fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::defaults();
        Self {
            debug: std::env::var("BRAINMESH_DEBUG")
                .map(|v| matches!(v.trim(), "1" | "true" | "yes" | "on"))
                .unwrap_or(defaults.debug),
            parallel_min_nodes: std::env::var("BRAINMESH_PARALLEL_MIN_NODES")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.parallel_min_nodes),
            corner_removal_max_passes: std::env::var("BRAINMESH_CORNER_MAX_PASSES")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .filter(|&passes: &usize| passes > 0)
                .unwrap_or(defaults.corner_removal_max_passes),
            iteration_scale: std::env::var("BRAINMESH_ITERATION_SCALE")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .filter(|&scale: &f64| scale.is_finite() && scale > 0.0)
                .unwrap_or(defaults.iteration_scale),
        }
    }

    /// Built-in defaults, ignoring the environment.
    pub fn defaults() -> Self {
        Self {
            debug: false,
            parallel_min_nodes: 4096,
            corner_removal_max_passes: 1000,
            iteration_scale: 1.0,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::defaults()
    }
}
