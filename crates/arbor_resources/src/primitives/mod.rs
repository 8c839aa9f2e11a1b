//! Procedural geometry builders.

pub mod box_shape;
pub mod plane;
pub mod sphere;

pub use box_shape::create_box;
pub use plane::{PlaneOptions, create_plane};
pub use sphere::{SphereOptions, create_sphere};

use glam::{Vec2, Vec3};

use crate::buffer_geometry::{BufferAttribute, BufferGeometry, attr};

/// One cell of a `(columns + 1) x (rows + 1)` vertex lattice.
///
/// `a`/`b` sit on `row`, `c`/`d` on the row below, left to right.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Cell {
    pub row: u32,
    pub a: u32,
    pub b: u32,
    pub c: u32,
    pub d: u32,
}

pub(crate) fn grid_cells(columns: u32, rows: u32) -> impl Iterator<Item = Cell> {
    let stride = columns + 1;
    (0..rows).flat_map(move |row| {
        (0..columns).map(move |column| {
            let a = row * stride + column;
            let c = a + stride;
            Cell { row, a, b: a + 1, c, d: c + 1 }
        })
    })
}

/// Lattice parameters `(u, v)` in `[0, 1]`, row by row.
pub(crate) fn grid_params(columns: u32, rows: u32) -> impl Iterator<Item = Vec2> {
    (0..=rows).flat_map(move |row| {
        (0..=columns).map(move |column| Vec2::new(column as f32 / columns as f32, row as f32 / rows as f32))
    })
}

/// Assembles an indexed geometry and computes its bounds.
pub(crate) fn indexed_geometry(
    name: &str,
    positions: &[Vec3],
    normals: &[Vec3],
    uvs: &[Vec2],
    indices: Vec<u32>,
) -> BufferGeometry {
    let mut geometry = BufferGeometry::new();
    geometry.name = name.to_string();
    geometry.set_attribute(attr::POSITION, BufferAttribute::from_vec3(positions));
    geometry.set_attribute(attr::NORMAL, BufferAttribute::from_vec3(normals));
    geometry.set_attribute(attr::UV, BufferAttribute::from_vec2(uvs));
    geometry.set_index(Some(indices));

    if let Err(e) = geometry.compute_bounding_volume() {
        log::warn!("{name} primitive: {e}");
    }
    geometry
}
