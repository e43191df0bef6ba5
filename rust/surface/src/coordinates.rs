// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Node positions owned by a single surface.

use nalgebra::Point3;

/// Node positions plus change tracking.
///
/// Every write bumps the modification counter and clears the display-cache
/// flag, which a renderer sets again once it has consumed the positions.
#[derive(Debug, Clone, Default)]
pub struct CoordinateStore {
    points: Vec<Point3<f64>>,
    modified: u64,
    display_cache_valid: bool,
}

impl CoordinateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_points(points: Vec<Point3<f64>>) -> Self {
        Self {
            points,
            modified: 0,
            display_cache_valid: false,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Position of a node. Panics if `node` is out of range.
    pub fn point(&self, node: usize) -> Point3<f64> {
        self.points[node]
    }

    pub fn get(&self, node: usize) -> Option<Point3<f64>> {
        self.points.get(node).copied()
    }

    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    pub fn set_point(&mut self, node: usize, point: Point3<f64>) {
        self.points[node] = point;
        self.mark_modified();
    }

    /// Replaces every position at once.
    pub fn set_points(&mut self, points: Vec<Point3<f64>>) {
        self.points = points;
        self.mark_modified();
    }

    /// Applies `f` to every position.
    pub fn update_all(&mut self, mut f: impl FnMut(usize, &mut Point3<f64>)) {
        for (i, p) in self.points.iter_mut().enumerate() {
            f(i, p);
        }
        self.mark_modified();
    }

    pub fn push(&mut self, point: Point3<f64>) {
        self.points.push(point);
        self.mark_modified();
    }

    pub fn clear(&mut self) {
        self.points.clear();
        self.mark_modified();
    }

    // --- Change tracking ---

    pub fn modified(&self) -> u64 {
        self.modified
    }

    /// Restores a previously read counter, for edits that should not count
    /// as modifications (temporary projections).
    pub fn set_modified(&mut self, counter: u64) {
        self.modified = counter;
    }

    pub fn mark_modified(&mut self) {
        self.modified = self.modified.wrapping_add(1);
        self.display_cache_valid = false;
    }

    pub fn display_cache_valid(&self) -> bool {
        self.display_cache_valid
    }

    pub fn mark_display_cache_valid(&mut self) {
        self.display_cache_valid = true;
    }

    pub fn clear_display_cache(&mut self) {
        self.display_cache_valid = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_bump_counter_and_clear_cache() {
        let mut store = CoordinateStore::from_points(vec![Point3::origin(); 2]);
        store.mark_display_cache_valid();
        let before = store.modified();

        store.set_point(1, Point3::new(1.0, 2.0, 3.0));
        assert_eq!(store.modified(), before + 1);
        assert!(!store.display_cache_valid());
        assert_eq!(store.point(1), Point3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn counter_can_be_restored() {
        let mut store = CoordinateStore::from_points(vec![Point3::origin()]);
        let saved = store.modified();
        store.update_all(|_, p| p.x += 1.0);
        store.set_modified(saved);
        assert_eq!(store.modified(), saved);
        assert_eq!(store.get(5), None);
    }
}
