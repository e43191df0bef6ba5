// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Small meshes shared by unit tests.

use std::sync::Arc;

use nalgebra::Point3;
use rustc_hash::FxHashMap;

use crate::surface::{Surface, SurfaceType};
use crate::topology::{Tile, Topology, TopologyType};

/// Regular tetrahedron with outward-facing tiles.
pub fn tetrahedron() -> Surface {
    let points = vec![
        Point3::new(1.0, 1.0, 1.0),
        Point3::new(1.0, -1.0, -1.0),
        Point3::new(-1.0, 1.0, -1.0),
        Point3::new(-1.0, -1.0, 1.0),
    ];
    let topology = Topology::from_tiles(
        vec![[0, 1, 2], [0, 3, 1], [0, 2, 3], [1, 3, 2]],
        TopologyType::Closed,
    );
    Surface::from_parts(points, Arc::new(topology), SurfaceType::Fiducial).unwrap()
}

/// Icosahedron subdivided `levels` times and projected onto a sphere of
/// `radius` centered at the origin. Tiles face outward.
pub fn icosphere(levels: usize, radius: f64) -> Surface {
    let t = (1.0 + 5.0_f64.sqrt()) / 2.0;
    let mut points = vec![
        Point3::new(-1.0, t, 0.0),
        Point3::new(1.0, t, 0.0),
        Point3::new(-1.0, -t, 0.0),
        Point3::new(1.0, -t, 0.0),
        Point3::new(0.0, -1.0, t),
        Point3::new(0.0, 1.0, t),
        Point3::new(0.0, -1.0, -t),
        Point3::new(0.0, 1.0, -t),
        Point3::new(t, 0.0, -1.0),
        Point3::new(t, 0.0, 1.0),
        Point3::new(-t, 0.0, -1.0),
        Point3::new(-t, 0.0, 1.0),
    ];
    let mut tiles: Vec<Tile> = vec![
        [0, 11, 5],
        [0, 5, 1],
        [0, 1, 7],
        [0, 7, 10],
        [0, 10, 11],
        [1, 5, 9],
        [5, 11, 4],
        [11, 10, 2],
        [10, 7, 6],
        [7, 1, 8],
        [3, 9, 4],
        [3, 4, 2],
        [3, 2, 6],
        [3, 6, 8],
        [3, 8, 9],
        [4, 9, 5],
        [2, 4, 11],
        [6, 2, 10],
        [8, 6, 7],
        [9, 8, 1],
    ];

    for _ in 0..levels {
        let mut midpoints: FxHashMap<(usize, usize), usize> = FxHashMap::default();
        let mut midpoint = |a: usize, b: usize, points: &mut Vec<Point3<f64>>| {
            *midpoints.entry((a.min(b), a.max(b))).or_insert_with(|| {
                let mid = Point3::from((points[a].coords + points[b].coords) / 2.0);
                points.push(mid);
                points.len() - 1
            })
        };
        let mut next = Vec::with_capacity(tiles.len() * 4);
        for &[a, b, c] in &tiles {
            let ab = midpoint(a, b, &mut points);
            let bc = midpoint(b, c, &mut points);
            let ca = midpoint(c, a, &mut points);
            next.push([a, ab, ca]);
            next.push([b, bc, ab]);
            next.push([c, ca, bc]);
            next.push([ab, bc, ca]);
        }
        tiles = next;
    }

    for p in &mut points {
        *p = Point3::from(p.coords.normalize() * radius);
    }
    let topology = Topology::from_tiles(tiles, TopologyType::Closed);
    Surface::from_parts(points, Arc::new(topology), SurfaceType::Spherical).unwrap()
}

/// Flat `n` x `n` grid of unit quads in the XY plane, two tiles per quad,
/// normals along +Z.
pub fn flat_grid(n: usize) -> Surface {
    let row = n + 1;
    let mut points = Vec::with_capacity(row * row);
    for j in 0..row {
        for i in 0..row {
            points.push(Point3::new(i as f64, j as f64, 0.0));
        }
    }
    let mut tiles = Vec::with_capacity(2 * n * n);
    for j in 0..n {
        for i in 0..n {
            let a = j * row + i;
            let b = a + 1;
            let c = a + row;
            let d = c + 1;
            tiles.push([a, b, d]);
            tiles.push([a, d, c]);
        }
    }
    let topology = Topology::from_tiles(tiles, TopologyType::Open);
    Surface::from_parts(points, Arc::new(topology), SurfaceType::Flat).unwrap()
}
