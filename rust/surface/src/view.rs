// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Standard views and the view-state record.
//!
//! A [`ViewState`] is the small piece of display state the transform engine
//! consumes: a rotation, a translation, a uniform scale and a perspective
//! zoom. Standard views set the rotation to a fixed matrix chosen by view
//! and hemisphere. Matrices are written as 16 values in column order: the
//! first four values are the image of the X axis.

use nalgebra::{Matrix4, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

use crate::surface::Hemisphere;

/// Scaling restored by [`StandardView::Reset`].
pub const DEFAULT_SCALING: f64 = 1.0;
/// Perspective zoom restored by [`StandardView::Reset`].
pub const DEFAULT_PERSPECTIVE_ZOOM: f64 = 200.0;

/// Named camera orientations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StandardView {
    Lateral,
    Medial,
    Anterior,
    Posterior,
    /// Looking down the +Z axis; the identity rotation.
    Dorsal,
    Ventral,
    /// Identity rotation plus default scaling, translation and zoom.
    Reset,
    /// Rotate the current view 90 degrees about the screen X axis.
    RotateX90,
    RotateY90,
    RotateZ90,
}

/// Axis for plane projections and rotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn unit(&self) -> Vector3<f64> {
        match self {
            Axis::X => Vector3::x(),
            Axis::Y => Vector3::y(),
            Axis::Z => Vector3::z(),
        }
    }
}

#[rustfmt::skip]
const LATERAL_LEFT: [f64; 16] = [
     0.0, 0.0, -1.0, 0.0,
    -1.0, 0.0,  0.0, 0.0,
     0.0, 1.0,  0.0, 0.0,
     0.0, 0.0,  0.0, 1.0,
];

#[rustfmt::skip]
const LATERAL_RIGHT: [f64; 16] = [
    0.0, 0.0, 1.0, 0.0,
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.0, 1.0,
];

#[rustfmt::skip]
const POSTERIOR: [f64; 16] = [
    1.0, 0.0,  0.0, 0.0,
    0.0, 0.0, -1.0, 0.0,
    0.0, 1.0,  0.0, 0.0,
    0.0, 0.0,  0.0, 1.0,
];

#[rustfmt::skip]
const ANTERIOR: [f64; 16] = [
    -1.0, 0.0, 0.0, 0.0,
     0.0, 0.0, 1.0, 0.0,
     0.0, 1.0, 0.0, 0.0,
     0.0, 0.0, 0.0, 1.0,
];

#[rustfmt::skip]
const VENTRAL: [f64; 16] = [
    -1.0, 0.0,  0.0, 0.0,
     0.0, 1.0,  0.0, 0.0,
     0.0, 0.0, -1.0, 0.0,
     0.0, 0.0,  0.0, 1.0,
];

/// Rotation matrix of a standard view, or `None` for the incremental
/// rotate-by-90 views.
///
/// Lateral and medial mirror between hemispheres (the lateral face of the
/// left hemisphere points to -X). Anterior and posterior look along the Y
/// axis and are the same for both hemispheres. An unknown hemisphere uses
/// the left matrices.
pub fn standard_view_matrix(view: StandardView, hemisphere: Hemisphere) -> Option<Matrix4<f64>> {
    let right = hemisphere == Hemisphere::Right;
    let values = match view {
        StandardView::Lateral if right => &LATERAL_RIGHT,
        StandardView::Lateral => &LATERAL_LEFT,
        StandardView::Medial if right => &LATERAL_LEFT,
        StandardView::Medial => &LATERAL_RIGHT,
        StandardView::Anterior => &ANTERIOR,
        StandardView::Posterior => &POSTERIOR,
        StandardView::Ventral => &VENTRAL,
        StandardView::Dorsal | StandardView::Reset => return Some(Matrix4::identity()),
        StandardView::RotateX90 | StandardView::RotateY90 | StandardView::RotateZ90 => {
            return None
        }
    };
    Some(Matrix4::from_column_slice(values))
}

/// Display state consumed by the transform engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    pub rotation: Matrix4<f64>,
    pub translation: Vector3<f64>,
    pub scaling: f64,
    pub perspective_zoom: f64,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            rotation: Matrix4::identity(),
            translation: Vector3::zeros(),
            scaling: DEFAULT_SCALING,
            perspective_zoom: DEFAULT_PERSPECTIVE_ZOOM,
        }
    }
}

impl ViewState {
    /// Switches to a standard view. `Reset` also restores scaling,
    /// translation and zoom; the rotate-by-90 views compose with the current
    /// rotation.
    pub fn set_standard_view(&mut self, view: StandardView, hemisphere: Hemisphere) {
        match view {
            StandardView::Reset => *self = Self::default(),
            StandardView::RotateX90 => self.rotate_90(Axis::X),
            StandardView::RotateY90 => self.rotate_90(Axis::Y),
            StandardView::RotateZ90 => self.rotate_90(Axis::Z),
            _ => {
                if let Some(m) = standard_view_matrix(view, hemisphere) {
                    self.rotation = m;
                }
            }
        }
    }

    /// Rotates the current view by 90 degrees about a screen axis.
    pub fn rotate_90(&mut self, axis: Axis) {
        let r = Rotation3::from_axis_angle(&nalgebra::Unit::new_unchecked(axis.unit()), 90f64.to_radians());
        self.rotation = r.to_homogeneous() * self.rotation;
    }

    /// Full model transform: translate * rotate * scale.
    pub fn matrix(&self) -> Matrix4<f64> {
        Matrix4::new_translation(&self.translation)
            * self.rotation
            * Matrix4::new_nonuniform_scaling(&Vector3::repeat(self.scaling))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    #[test]
    fn left_lateral_faces_minus_x_toward_viewer() {
        let m = standard_view_matrix(StandardView::Lateral, Hemisphere::Left).unwrap();
        let p = m.transform_point(&Point3::new(-1.0, 0.0, 0.0));
        assert_relative_eq!(p, Point3::new(0.0, 0.0, 1.0));
        // Dorsal stays up.
        let up = m.transform_point(&Point3::new(0.0, 0.0, 1.0));
        assert_relative_eq!(up, Point3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn medial_mirrors_lateral() {
        for h in [Hemisphere::Left, Hemisphere::Right] {
            let other = if h == Hemisphere::Left { Hemisphere::Right } else { Hemisphere::Left };
            assert_eq!(
                standard_view_matrix(StandardView::Medial, h),
                standard_view_matrix(StandardView::Lateral, other)
            );
        }
    }

    #[test]
    fn views_are_rotations() {
        for view in [
            StandardView::Lateral,
            StandardView::Medial,
            StandardView::Anterior,
            StandardView::Posterior,
            StandardView::Ventral,
        ] {
            let m = standard_view_matrix(view, Hemisphere::Right).unwrap();
            let r = m.fixed_view::<3, 3>(0, 0).into_owned();
            assert_relative_eq!(r.determinant(), 1.0);
        }
    }

    #[test]
    fn reset_restores_defaults() {
        let mut view = ViewState {
            scaling: 3.0,
            perspective_zoom: 10.0,
            translation: Vector3::new(1.0, 2.0, 3.0),
            ..ViewState::default()
        };
        view.set_standard_view(StandardView::Ventral, Hemisphere::Left);
        view.set_standard_view(StandardView::Reset, Hemisphere::Left);
        assert_eq!(view, ViewState::default());
    }

    #[test]
    fn four_quarter_turns_are_identity() {
        let mut view = ViewState::default();
        view.set_standard_view(StandardView::Lateral, Hemisphere::Left);
        let start = view.rotation;
        for _ in 0..4 {
            view.set_standard_view(StandardView::RotateZ90, Hemisphere::Left);
        }
        assert_relative_eq!(view.rotation, start, epsilon = 1e-12);
    }
}
