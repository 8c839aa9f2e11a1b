use glam::{Vec2, Vec3};

use crate::buffer_geometry::BufferGeometry;

use super::{grid_cells, grid_params, indexed_geometry};

#[derive(Debug, Clone, Copy)]
pub struct PlaneOptions {
    pub width: f32,
    pub height: f32,
    pub width_segments: u32,
    pub height_segments: u32,
}

impl Default for PlaneOptions {
    fn default() -> Self {
        Self {
            width: 1.0,
            height: 1.0,
            width_segments: 1,
            height_segments: 1,
        }
    }
}

/// Grid in the XY plane facing +Z, centered on the origin.
///
/// Vertex rows run from the top edge down; each cell is split along its
/// bottom-left to top-right diagonal.
#[must_use]
pub fn create_plane(options: PlaneOptions) -> BufferGeometry {
    let columns = options.width_segments.max(1);
    let rows = options.height_segments.max(1);
    let size = Vec2::new(options.width, options.height);

    let (positions, uvs): (Vec<Vec3>, Vec<Vec2>) = grid_params(columns, rows)
        .map(|t| {
            let offset = (t - 0.5) * size;
            (Vec3::new(offset.x, -offset.y, 0.0), Vec2::new(t.x, 1.0 - t.y))
        })
        .unzip();
    let normals = vec![Vec3::Z; positions.len()];

    let indices = grid_cells(columns, rows)
        .flat_map(|cell| [cell.a, cell.c, cell.b, cell.c, cell.d, cell.b])
        .collect();

    indexed_geometry("Plane", &positions, &normals, &uvs, indices)
}
