// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Inflation of a folded surface into smooth, ellipsoidal and spherical
//! forms.
//!
//! The pipeline alternates areal smoothing with an ellipsoidal push that
//! moves nodes near the center outward more than nodes near the bounds.
//! After every push it measures how much each node's neighborhood is
//! compressed or stretched relative to the fiducial surface and smooths the
//! worst ("finger") regions again.

use std::fmt;

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::collaborators::{AngleDeficitCurvature, CurvatureSource};
use crate::error::{Error, Result};
use crate::geometry::triangle_area;
use crate::helper::HelperFacets;
use crate::surface::{Surface, SurfaceType};
use crate::transform::PlaneProjection;
use crate::view::{StandardView, ViewState};

/// Tile distortion used when a tile has collapsed on the smoothed surface.
const COLLAPSED_TILE_DISTORTION: f64 = 10_000.0;
/// Floor on per-tile distortion so logarithms stay finite.
const MIN_TILE_DISTORTION: f64 = 1e-8;
/// Values below this become [`LOG10_FLOOR`] when log-scaling metrics.
const LOG10_MIN_VALUE: f64 = 0.00001;
const LOG10_FLOOR: f64 = -5.0;

/// Tilt applied to the medial view before compressing the medial wall.
const MEDIAL_WALL_TILT_DEGREES: f64 = -27.0;
const MEDIAL_WALL_COMPRESSION: f64 = 0.95;

/// One named per-node value column.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricColumn {
    pub name: String,
    pub values: Vec<f64>,
}

/// Per-node measurements collected during inflation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeMetrics {
    columns: Vec<MetricColumn>,
}

impl NodeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[MetricColumn] {
        &self.columns
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Values of the column called `name`.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    pub fn push(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.columns.push(MetricColumn {
            name: name.into(),
            values,
        });
    }

    /// Appends every column of `other`.
    pub fn append(&mut self, other: NodeMetrics) {
        self.columns.extend(other.columns);
    }
}

/// Replaces each value by its base-10 logarithm; values below `1e-5`
/// (including zero and negatives) become `-5`.
pub fn scale_log10(values: &mut [f64]) {
    for v in values {
        *v = if *v < LOG10_MIN_VALUE { LOG10_FLOOR } else { v.log10() };
    }
}

/// Parameters of [`Surface::inflate_surface_and_smooth_fingers`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FingerSmoothing {
    /// Smooth-and-push cycles. One extra measuring pass follows the last.
    pub cycles: usize,
    pub regular_strength: f64,
    pub regular_iterations: usize,
    /// `1.0` disables the ellipsoidal push.
    pub inflation_factor: f64,
    /// Nodes whose neighborhood-averaged compressed/stretched score exceeds
    /// this get targeted smoothing.
    pub compress_stretch_threshold: f64,
    pub finger_strength: f64,
    pub finger_iterations: usize,
}

impl Default for FingerSmoothing {
    fn default() -> Self {
        Self {
            cycles: 2,
            regular_strength: 1.0,
            regular_iterations: 30,
            inflation_factor: 1.4,
            compress_stretch_threshold: 3.0,
            finger_strength: 1.0,
            finger_iterations: 30,
        }
    }
}

/// Distortion of a surface relative to its fiducial, from the last
/// measuring pass.
#[derive(Debug, Clone, Default)]
struct Distortion {
    /// Compressed/stretched score averaged over each node and its
    /// neighbors.
    average_compressed_stretched: Vec<f64>,
    /// Mean fiducial/current area ratio of the tiles around each node.
    areal_compression: Vec<f64>,
    stretching: Vec<f64>,
    area_ratio: f64,
}

type Interrupt<'a> = Option<&'a dyn Fn() -> bool>;

fn check_interrupt(interrupt: Interrupt<'_>) -> Result<()> {
    match interrupt {
        Some(stop) if stop() => {
            tracing::info!("inflation interrupted");
            Err(Error::Interrupted)
        }
        _ => Ok(()),
    }
}

/// What [`Surface::create_inflated_and_ellipsoid_from_fiducial`] builds
/// and how.
pub struct InflationOptions<'a> {
    pub create_inflated: bool,
    pub create_very_inflated: bool,
    pub create_ellipsoid: bool,
    pub create_sphere: bool,
    pub create_compressed_medial_wall: bool,
    /// Extra smoothing of highly distorted regions in the inflated, high
    /// smooth and ellipsoid stages.
    pub finger_smoothing: bool,
    /// Rescale inflated, very inflated and ellipsoid surfaces to the
    /// fiducial surface area.
    pub scale_to_fiducial_area: bool,
    /// Overrides the configured iteration scale when set and positive.
    pub iteration_scale: Option<f64>,
    /// Collect per-node distortion metrics.
    pub metrics: bool,
    /// Curvature used for the `gaussian_neg` metric; the built-in angle
    /// deficit estimate when unset.
    pub curvature: Option<&'a dyn CurvatureSource>,
    /// Polled between stages and cycles; returning `true` aborts with
    /// [`Error::Interrupted`].
    pub interrupt: Option<&'a dyn Fn() -> bool>,
}

impl Default for InflationOptions<'_> {
    fn default() -> Self {
        Self {
            create_inflated: true,
            create_very_inflated: true,
            create_ellipsoid: true,
            create_sphere: true,
            create_compressed_medial_wall: true,
            finger_smoothing: true,
            scale_to_fiducial_area: true,
            iteration_scale: None,
            metrics: false,
            curvature: None,
            interrupt: None,
        }
    }
}

impl<'a> InflationOptions<'a> {
    /// Options that create nothing; enable stages with the builder methods.
    pub fn none() -> Self {
        Self {
            create_inflated: false,
            create_very_inflated: false,
            create_ellipsoid: false,
            create_sphere: false,
            create_compressed_medial_wall: false,
            ..Self::default()
        }
    }

    pub fn inflated(mut self, on: bool) -> Self {
        self.create_inflated = on;
        self
    }

    pub fn very_inflated(mut self, on: bool) -> Self {
        self.create_very_inflated = on;
        self
    }

    pub fn ellipsoid(mut self, on: bool) -> Self {
        self.create_ellipsoid = on;
        self
    }

    pub fn sphere(mut self, on: bool) -> Self {
        self.create_sphere = on;
        self
    }

    pub fn compressed_medial_wall(mut self, on: bool) -> Self {
        self.create_compressed_medial_wall = on;
        self
    }

    pub fn with_finger_smoothing(mut self, on: bool) -> Self {
        self.finger_smoothing = on;
        self
    }

    pub fn with_area_scaling(mut self, on: bool) -> Self {
        self.scale_to_fiducial_area = on;
        self
    }

    pub fn with_iteration_scale(mut self, scale: f64) -> Self {
        self.iteration_scale = Some(scale);
        self
    }

    pub fn with_metrics(mut self, curvature: Option<&'a dyn CurvatureSource>) -> Self {
        self.metrics = true;
        self.curvature = curvature;
        self
    }

    pub fn with_interrupt(mut self, interrupt: &'a dyn Fn() -> bool) -> Self {
        self.interrupt = Some(interrupt);
        self
    }

    fn creates_anything(&self) -> bool {
        self.create_inflated
            || self.create_very_inflated
            || self.create_ellipsoid
            || self.create_sphere
            || self.create_compressed_medial_wall
    }
}

impl fmt::Debug for InflationOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InflationOptions")
            .field("create_inflated", &self.create_inflated)
            .field("create_very_inflated", &self.create_very_inflated)
            .field("create_ellipsoid", &self.create_ellipsoid)
            .field("create_sphere", &self.create_sphere)
            .field("create_compressed_medial_wall", &self.create_compressed_medial_wall)
            .field("finger_smoothing", &self.finger_smoothing)
            .field("scale_to_fiducial_area", &self.scale_to_fiducial_area)
            .field("iteration_scale", &self.iteration_scale)
            .field("metrics", &self.metrics)
            .field("curvature", &self.curvature.is_some())
            .field("interrupt", &self.interrupt.is_some())
            .finish()
    }
}

/// Surfaces produced by
/// [`Surface::create_inflated_and_ellipsoid_from_fiducial`]; stages that
/// were not requested are `None`.
#[derive(Debug, Clone, Default)]
pub struct DerivedSurfaces {
    pub inflated: Option<Surface>,
    pub very_inflated: Option<Surface>,
    pub ellipsoid: Option<Surface>,
    pub sphere: Option<Surface>,
    pub compressed_medial_wall: Option<Surface>,
    /// `gaussian_neg.LowSmooth`, `compressed.HighSmooth` and
    /// `Ellipsoid_CompressedOrStretched` when metrics were requested.
    pub metrics: Option<NodeMetrics>,
}

impl Surface {
    /// Inflates the surface in `inflation_iterations` rounds of areal
    /// smoothing followed by a radial push of `1 + (factor - 1)(1 - r/R)`,
    /// where `R` is the initial largest distance from the center of mass.
    pub fn inflate(&mut self, smoothing_iterations: usize, inflation_iterations: usize, factor: f64) -> Result<()> {
        self.require_topology()?;
        self.translate_to_center_of_mass();
        let radius = self
            .coordinates
            .points()
            .iter()
            .map(|p| p.coords.norm())
            .fold(0.0, f64::max);
        if radius <= 0.0 || inflation_iterations == 0 {
            return Ok(());
        }
        let smoothing_per_round = smoothing_iterations / inflation_iterations;

        for _ in 0..inflation_iterations {
            self.areal_smoothing(1.0, smoothing_per_round, 0, None, 0)?;
            self.translate_to_center_of_mass();
            self.coordinates.update_all(|_, p| {
                let r = p.coords.norm();
                let k = 1.0 + (factor - 1.0) * (1.0 - r / radius);
                *p = Point3::from(p.coords * k);
            });
        }
        self.compute_normals();
        tracing::debug!(smoothing_iterations, inflation_iterations, factor, "inflated surface");
        Ok(())
    }

    /// Inflates this surface while smoothing regions that are strongly
    /// compressed or stretched relative to `fiducial`.
    ///
    /// Both surfaces are translated to their centers of mass. `fiducial`
    /// must have the same nodes as this surface.
    pub fn inflate_surface_and_smooth_fingers(&mut self, fiducial: &Surface, params: &FingerSmoothing) -> Result<()> {
        self.smooth_fingers(fiducial, params, None)?;
        Ok(())
    }

    /// Like [`Surface::inflate_surface_and_smooth_fingers`], also returning
    /// log10-scaled `average_cosi`, `compressed`, `stretched` and
    /// `gaussian_neg` columns from the final measuring pass.
    pub fn inflate_surface_and_smooth_fingers_with_metrics(
        &mut self,
        fiducial: &Surface,
        params: &FingerSmoothing,
        curvature: &dyn CurvatureSource,
    ) -> Result<NodeMetrics> {
        let distortion = self.smooth_fingers(fiducial, params, None)?;
        Ok(self.distortion_metrics(&distortion, curvature))
    }

    fn smooth_fingers(
        &mut self,
        fiducial: &Surface,
        params: &FingerSmoothing,
        interrupt: Interrupt<'_>,
    ) -> Result<Distortion> {
        let n = self.number_of_nodes();
        if fiducial.number_of_nodes() != n {
            return Err(Error::MalformedInput(format!(
                "fiducial surface has {} nodes, surface has {n}",
                fiducial.number_of_nodes()
            )));
        }
        self.require_topology()?;
        if n == 0 {
            return Ok(Distortion::default());
        }
        self.append_comment(&format!(
            "Inflate Surface and Smooth Fingers: {} {} {} {} {} {} {}",
            params.cycles,
            params.regular_strength,
            params.regular_iterations,
            params.inflation_factor,
            params.compress_stretch_threshold,
            params.finger_strength,
            params.finger_iterations
        ));

        let mut fiducial = fiducial.clone();
        self.translate_to_center_of_mass();
        fiducial.translate_to_center_of_mass();
        let extent = fiducial.bounds().extent();
        let fiducial_area = fiducial.surface_area();
        let inflation = params.inflation_factor - 1.0;
        let along = |v: f64, diff: f64| if diff > 0.0 { v / diff } else { 0.0 };

        let mut distortion = Distortion::default();
        for cycle in 0..=params.cycles {
            let smoothing = cycle < params.cycles;
            if smoothing {
                check_interrupt(interrupt)?;
                self.areal_smoothing(params.regular_strength, params.regular_iterations, 1, None, 0)?;
                self.coordinates.update_all(|_, p| {
                    let x = along(p.x, extent.x);
                    let y = along(p.y, extent.y);
                    let z = along(p.z, extent.z);
                    let r = (x * x + y * y + z * z).sqrt();
                    let k = 1.0 + inflation * (1.0 - r);
                    *p = Point3::from(p.coords * k);
                });
            }

            distortion = self.measure_distortion(&fiducial, fiducial_area)?;
            let threshold = params.compress_stretch_threshold;
            let need_smoothing: Vec<bool> = distortion
                .average_compressed_stretched
                .iter()
                .map(|&v| v > threshold)
                .collect();
            if self.config().debug {
                let (min, max) = distortion
                    .average_compressed_stretched
                    .iter()
                    .fold((f64::MAX, f64::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
                tracing::debug!(
                    cycle,
                    above_threshold = need_smoothing.iter().filter(|&&b| b).count(),
                    threshold,
                    min,
                    max,
                    area_ratio = distortion.area_ratio,
                    "finger distortion"
                );
            }

            if smoothing {
                self.areal_smoothing(params.finger_strength, params.finger_iterations, 1, Some(&need_smoothing), 0)?;
            }
        }

        self.compute_normals();
        Ok(distortion)
    }

    /// Linear and areal distortion of every node relative to `fiducial`,
    /// which has already been translated to its center of mass.
    fn measure_distortion(&self, fiducial: &Surface, fiducial_area: f64) -> Result<Distortion> {
        let helper = self.helper(HelperFacets::SORTED)?;
        let points = self.coordinates.points();
        let reference = fiducial.coordinates.points();
        let n = points.len();
        let area_ratio = if fiducial_area > 0.0 {
            self.surface_area() / fiducial_area
        } else {
            1.0
        };

        let mut compressed_stretched = vec![0.0; n];
        let mut areal_compression = vec![0.0; n];
        let mut stretching = vec![0.0; n];
        for i in 0..n {
            let ring = helper.neighbors(i);
            let mut max_linear = 0.0f64;
            let mut areal = 0.0;
            let Some(r) = reference.get(i) else {
                continue;
            };
            for (j, &nb) in ring.iter().enumerate() {
                let next = ring[(j + 1) % ring.len()];
                let (Some(p_nb), Some(p_next), Some(r_nb), Some(r_next)) =
                    (points.get(nb), points.get(next), reference.get(nb), reference.get(next))
                else {
                    continue;
                };
                let reference_dist = (*r_nb - *r).norm();
                if reference_dist > 0.0 {
                    max_linear = max_linear.max((*p_nb - points[i]).norm() / reference_dist);
                }

                let tile_area = triangle_area(&points[i], p_nb, p_next);
                let reference_area = triangle_area(r, r_nb, r_next);
                let distort = if tile_area > 0.0 {
                    reference_area / tile_area
                } else if reference_area != 0.0 {
                    COLLAPSED_TILE_DISTORTION
                } else {
                    1.0
                };
                areal += distort.max(MIN_TILE_DISTORTION);
            }
            if !ring.is_empty() {
                areal /= ring.len() as f64;
            }
            areal_compression[i] = areal;
            compressed_stretched[i] = max_linear * areal * area_ratio;
            stretching[i] = max_linear * (areal * area_ratio).sqrt();
        }

        let average_compressed_stretched = (0..n)
            .map(|i| {
                let ring = helper.neighbors(i);
                let sum: f64 = ring.iter().filter_map(|&nb| compressed_stretched.get(nb)).sum();
                (compressed_stretched[i] + sum) / (ring.len() + 1) as f64
            })
            .collect();

        Ok(Distortion {
            average_compressed_stretched,
            areal_compression,
            stretching,
            area_ratio,
        })
    }

    fn distortion_metrics(&self, distortion: &Distortion, curvature: &dyn CurvatureSource) -> NodeMetrics {
        let gaussian = self.curvature_or_zeros(curvature).gaussian;
        let gaussian_neg = gaussian
            .iter()
            .zip(&distortion.areal_compression)
            .map(|(&k, &areal)| if k < 0.0 && areal > 0.0 { -k * areal } else { 0.0 })
            .collect();
        let compressed = distortion
            .areal_compression
            .iter()
            .map(|a| a * distortion.area_ratio)
            .collect();

        let mut metrics = NodeMetrics::new();
        for (name, mut values) in [
            ("average_cosi", distortion.average_compressed_stretched.clone()),
            ("compressed", compressed),
            ("stretched", distortion.stretching.clone()),
            ("gaussian_neg", gaussian_neg),
        ] {
            scale_log10(&mut values);
            metrics.push(name, values);
        }
        metrics
    }

    /// One pipeline stage: finger smoothing with optional metrics.
    fn inflation_stage(
        &mut self,
        fiducial: &Surface,
        stage: &str,
        params: &FingerSmoothing,
        options: &InflationOptions<'_>,
    ) -> Result<Option<NodeMetrics>> {
        check_interrupt(options.interrupt)?;
        tracing::info!(stage, cycles = params.cycles, iterations = params.regular_iterations, "inflation stage");
        let distortion = self.smooth_fingers(fiducial, params, options.interrupt)?;
        if !options.metrics {
            return Ok(None);
        }
        let curvature = options.curvature.unwrap_or(&AngleDeficitCurvature);
        Ok(Some(self.distortion_metrics(&distortion, curvature)))
    }

    /// Derives inflated, very inflated, ellipsoid, sphere and compressed
    /// medial wall surfaces from this fiducial surface.
    ///
    /// The stages chain: low smooth, then inflated, then (from the inflated
    /// surface) very inflated and high smooth, then ellipsoid from high
    /// smooth, sphere from the ellipsoid and compressed medial wall from the
    /// sphere. Intermediate stages run whenever a later requested surface
    /// depends on them.
    pub fn create_inflated_and_ellipsoid_from_fiducial(&self, options: &InflationOptions<'_>) -> Result<DerivedSurfaces> {
        let mut derived = DerivedSurfaces::default();
        if !options.creates_anything() {
            return Ok(derived);
        }
        self.require_topology()?;

        let scale = options
            .iteration_scale
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or(self.config().iteration_scale);
        let iterations = |base: f64| (base * scale) as usize;
        let finger = |base: f64| if options.finger_smoothing { iterations(base) } else { 0 };
        let stage = |cycles: usize,
                     regular_strength: f64,
                     regular_iterations: usize,
                     inflation_factor: f64,
                     threshold: f64,
                     finger_iterations: usize| {
            FingerSmoothing {
                cycles,
                regular_strength,
                regular_iterations,
                inflation_factor,
                compress_stretch_threshold: threshold,
                finger_strength: 1.0,
                finger_iterations,
            }
        };
        let fiducial_area = self.surface_area();
        let mut metrics = NodeMetrics::new();
        let mut keep_column = |stage_metrics: Option<NodeMetrics>, column: &str, name: &str| {
            if let Some(values) = stage_metrics.as_ref().and_then(|m| m.column(column)) {
                metrics.push(name, values.to_vec());
            }
        };

        let mut low_smooth = self.clone();
        let m = low_smooth.inflation_stage(self, "low smooth", &stage(1, 0.2, iterations(50.0), 1.0, 3.0, 0), options)?;
        keep_column(m, "gaussian_neg", "gaussian_neg.LowSmooth");

        let mut inflated = low_smooth;
        inflated.set_surface_type(SurfaceType::Inflated);
        inflated.inflation_stage(self, "inflated", &stage(2, 1.0, iterations(30.0), 1.4, 3.0, finger(30.0)), options)?;
        if options.scale_to_fiducial_area {
            inflated.scale_surface_to_area(fiducial_area, false);
        }

        if options.create_very_inflated {
            let mut very_inflated = inflated.clone();
            very_inflated.set_surface_type(SurfaceType::VeryInflated);
            very_inflated.inflation_stage(self, "very inflated", &stage(4, 1.0, iterations(30.0), 1.1, 3.0, 0), options)?;
            if options.scale_to_fiducial_area {
                very_inflated.scale_surface_to_area(fiducial_area, false);
            }
            derived.very_inflated = Some(very_inflated);
        }

        if options.create_ellipsoid || options.create_sphere || options.create_compressed_medial_wall {
            let mut high_smooth = inflated.clone();
            let m = high_smooth.inflation_stage(
                self,
                "high smooth",
                &stage(6, 1.0, iterations(60.0), 1.6, 3.0, finger(60.0)),
                options,
            )?;
            keep_column(m, "compressed", "compressed.HighSmooth");

            let mut ellipsoid = high_smooth;
            ellipsoid.set_surface_type(SurfaceType::Ellipsoidal);
            let m = ellipsoid.inflation_stage(
                self,
                "ellipsoid",
                &stage(6, 1.0, iterations(50.0), 1.4, 4.0, finger(60.0)),
                options,
            )?;
            if options.scale_to_fiducial_area {
                ellipsoid.scale_surface_to_area(fiducial_area, false);
            }
            keep_column(m, "average_cosi", "Ellipsoid_CompressedOrStretched");

            if options.create_sphere || options.create_compressed_medial_wall {
                check_interrupt(options.interrupt)?;
                let mut sphere = ellipsoid.clone();
                sphere.convert_ellipsoid_to_sphere_with_surface_area(fiducial_area)?;

                if options.create_compressed_medial_wall {
                    let mut cmw = sphere.clone();
                    let mut view = ViewState::default();
                    view.set_standard_view(StandardView::Medial, cmw.hemisphere());
                    cmw.apply_view(&view);
                    cmw.rotate_x(MEDIAL_WALL_TILT_DEGREES);
                    cmw.convert_sphere_to_compressed_medial_wall(MEDIAL_WALL_COMPRESSION)?;
                    cmw.project_to_plane(PlaneProjection::MovePositiveZToZero);
                    cmw.compute_normals();
                    derived.compressed_medial_wall = Some(cmw);
                }
                if options.create_sphere {
                    derived.sphere = Some(sphere);
                }
            }
            if options.create_ellipsoid {
                derived.ellipsoid = Some(ellipsoid);
            }
        }

        if options.create_inflated {
            derived.inflated = Some(inflated);
        }
        if options.metrics {
            derived.metrics = Some(metrics);
        }
        tracing::info!(
            inflated = derived.inflated.is_some(),
            very_inflated = derived.very_inflated.is_some(),
            ellipsoid = derived.ellipsoid.is_some(),
            sphere = derived.sphere.is_some(),
            compressed_medial_wall = derived.compressed_medial_wall.is_some(),
            "derived surfaces from fiducial"
        );
        Ok(derived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{icosphere, tetrahedron};
    use approx::assert_relative_eq;
    use std::cell::Cell;

    fn radius_ratio(surface: &Surface) -> f64 {
        let com = surface.center_of_mass();
        let radii: Vec<f64> = surface.coordinates().points().iter().map(|p| (p - com).norm()).collect();
        let min = radii.iter().copied().fold(f64::MAX, f64::min);
        let max = radii.iter().copied().fold(0.0, f64::max);
        min / max
    }

    #[test]
    fn log10_scaling_floors_small_values() {
        let mut values = vec![100.0, 1.0, 0.0, -3.0, 0.000001];
        scale_log10(&mut values);
        assert_eq!(values[2..], [-5.0, -5.0, -5.0]);
        assert_relative_eq!(values[0], 2.0);
        assert_relative_eq!(values[1], 0.0);
    }

    #[test]
    fn inflate_rounds_out_an_elongated_surface() {
        let mut surface = icosphere(2, 1.0);
        surface.scale(2.0, 1.0, 1.0);
        surface.translate(&nalgebra::Vector3::new(5.0, 0.0, 0.0));
        let before = radius_ratio(&surface);
        surface.inflate(0, 3, 1.5).unwrap();
        assert!(radius_ratio(&surface) > before);
        let com = surface.center_of_mass();
        assert_relative_eq!(com.coords.norm(), 0.0, epsilon = 0.5);
    }

    #[test]
    fn undistorted_surface_scores_one() {
        let fiducial = icosphere(2, 10.0);
        let mut surface = fiducial.clone();
        let params = FingerSmoothing {
            cycles: 1,
            regular_strength: 0.0,
            regular_iterations: 1,
            inflation_factor: 1.0,
            compress_stretch_threshold: 3.0,
            finger_strength: 1.0,
            finger_iterations: 0,
        };
        let metrics = surface
            .inflate_surface_and_smooth_fingers_with_metrics(&fiducial, &params, &AngleDeficitCurvature)
            .unwrap();
        let names: Vec<&str> = metrics.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["average_cosi", "compressed", "stretched", "gaussian_neg"]);
        for name in ["average_cosi", "compressed", "stretched"] {
            for &v in metrics.column(name).unwrap() {
                assert_relative_eq!(v, 0.0, epsilon = 1e-9);
            }
        }
        // A convex surface has no negative Gaussian curvature.
        assert!(metrics.column("gaussian_neg").unwrap().iter().all(|&v| v == LOG10_FLOOR));
        assert!(surface.comment().contains("Inflate Surface and Smooth Fingers"));
    }

    #[test]
    fn finger_smoothing_needs_matching_fiducial() {
        let mut surface = icosphere(1, 1.0);
        let err = surface
            .inflate_surface_and_smooth_fingers(&tetrahedron(), &FingerSmoothing::default())
            .unwrap_err();
        assert!(matches!(err, Error::MalformedInput(_)));
    }

    #[test]
    fn pipeline_creates_only_requested_surfaces() {
        let mut fiducial = icosphere(2, 20.0);
        fiducial.scale(1.3, 1.0, 0.8);
        let options = InflationOptions::none().inflated(true).with_iteration_scale(0.1);
        let derived = fiducial.create_inflated_and_ellipsoid_from_fiducial(&options).unwrap();
        assert_eq!(derived.inflated.as_ref().map(|s| s.surface_type()), Some(SurfaceType::Inflated));
        assert!(derived.very_inflated.is_none());
        assert!(derived.ellipsoid.is_none());
        assert!(derived.sphere.is_none());
        assert!(derived.metrics.is_none());

        let nothing = fiducial
            .create_inflated_and_ellipsoid_from_fiducial(&InflationOptions::none())
            .unwrap();
        assert!(nothing.inflated.is_none());
    }

    #[test]
    fn interrupt_stops_the_pipeline() {
        let fiducial = icosphere(1, 5.0);
        let polls = Cell::new(0);
        let stop = || {
            polls.set(polls.get() + 1);
            polls.get() > 2
        };
        let options = InflationOptions::default().with_iteration_scale(0.1).with_interrupt(&stop);
        let result = fiducial.create_inflated_and_ellipsoid_from_fiducial(&options);
        assert!(matches!(result, Err(Error::Interrupted)));
        assert_eq!(polls.get(), 3);
    }
}
