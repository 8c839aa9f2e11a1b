use std::f32::consts::{PI, TAU};

use glam::{Vec2, Vec3};

use crate::buffer_geometry::BufferGeometry;

use super::{grid_cells, grid_params, indexed_geometry};

#[derive(Debug, Clone, Copy)]
pub struct SphereOptions {
    pub radius: f32,
    pub width_segments: u32,
    pub height_segments: u32,
}

impl Default for SphereOptions {
    fn default() -> Self {
        Self {
            radius: 1.0,
            width_segments: 32,
            height_segments: 16,
        }
    }
}

/// UV sphere centered on the origin, Y up.
///
/// Rows run from the south pole to the north pole. Triangles that would
/// collapse onto a pole are left out of the index.
#[must_use]
pub fn create_sphere(options: SphereOptions) -> BufferGeometry {
    let columns = options.width_segments.max(3);
    let rows = options.height_segments.max(2);

    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut uvs = Vec::new();
    for t in grid_params(columns, rows) {
        let (ring, height) = (t.y * PI).sin_cos();
        let (sin_phi, cos_phi) = (t.x * TAU).sin_cos();
        let unit = Vec3::new(-ring * cos_phi, -height, ring * sin_phi);

        positions.push(unit * options.radius);
        normals.push(unit.normalize_or_zero());
        uvs.push(Vec2::new(t.x, 1.0 - t.y));
    }

    let mut indices = Vec::with_capacity((columns * rows * 6) as usize);
    for cell in grid_cells(columns, rows) {
        if cell.row != 0 {
            indices.extend_from_slice(&[cell.a, cell.b, cell.c]);
        }
        if cell.row != rows - 1 {
            indices.extend_from_slice(&[cell.b, cell.d, cell.c]);
        }
    }

    indexed_geometry("Sphere", &positions, &normals, &uvs, indices)
}
