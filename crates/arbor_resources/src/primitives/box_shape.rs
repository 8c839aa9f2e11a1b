use glam::{Vec2, Vec3};

use crate::buffer_geometry::{BufferAttribute, BufferGeometry, attr};

/// Corner data of a box with 4 unshared vertices per side.
pub(crate) struct BoxLayout {
    pub positions: [Vec3; 24],
    pub normals: [Vec3; 24],
    pub uvs: [Vec2; 24],
}

/// Sides in order +Z, -Z, +Y, -Y, +X, -X; each side is wound counter-clockwise
/// seen from outside.
pub(crate) fn box_layout(width: f32, height: f32, depth: f32) -> BoxLayout {
    let w = width / 2.0;
    let h = height / 2.0;
    let d = depth / 2.0;

    let positions = [
        // Front face (+Z)
        Vec3::new(-w, -h, d),
        Vec3::new(w, -h, d),
        Vec3::new(w, h, d),
        Vec3::new(-w, h, d),
        // Back face (-Z)
        Vec3::new(-w, -h, -d),
        Vec3::new(-w, h, -d),
        Vec3::new(w, h, -d),
        Vec3::new(w, -h, -d),
        // Top face (+Y)
        Vec3::new(-w, h, -d),
        Vec3::new(-w, h, d),
        Vec3::new(w, h, d),
        Vec3::new(w, h, -d),
        // Bottom face (-Y)
        Vec3::new(-w, -h, -d),
        Vec3::new(w, -h, -d),
        Vec3::new(w, -h, d),
        Vec3::new(-w, -h, d),
        // Right face (+X)
        Vec3::new(w, -h, -d),
        Vec3::new(w, h, -d),
        Vec3::new(w, h, d),
        Vec3::new(w, -h, d),
        // Left face (-X)
        Vec3::new(-w, -h, -d),
        Vec3::new(-w, -h, d),
        Vec3::new(-w, h, d),
        Vec3::new(-w, h, -d),
    ];

    let side_normals = [Vec3::Z, Vec3::NEG_Z, Vec3::Y, Vec3::NEG_Y, Vec3::X, Vec3::NEG_X];
    let normals = std::array::from_fn(|i| side_normals[i / 4]);

    let uvs = [
        // Front
        [0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0],
        // Back
        [1.0, 1.0], [1.0, 0.0], [0.0, 0.0], [0.0, 1.0],
        // Top
        [0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0],
        // Bottom
        [0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0],
        // Right
        [0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0],
        // Left
        [0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0],
    ]
    .map(Vec2::from_array);

    BoxLayout {
        positions,
        normals,
        uvs,
    }
}

/// Indexed box with one group (and material index) per side.
#[must_use]
pub fn create_box(width: f32, height: f32, depth: f32) -> BufferGeometry {
    let layout = box_layout(width, height, depth);

    // 2 triangles per side: 0, 1, 2,  0, 2, 3
    let indices: Vec<u32> = (0..6)
        .flat_map(|side| {
            let base = side * 4;
            [base, base + 1, base + 2, base, base + 2, base + 3]
        })
        .collect();

    let mut geo = BufferGeometry::new();
    geo.name = "Box".to_string();
    geo.set_attribute(attr::POSITION, BufferAttribute::from_vec3(&layout.positions));
    geo.set_attribute(attr::NORMAL, BufferAttribute::from_vec3(&layout.normals));
    geo.set_attribute(attr::UV, BufferAttribute::from_vec2(&layout.uvs));
    geo.set_index(Some(indices));
    for side in 0..6 {
        geo.add_group(side * 6, 6, side);
    }

    if let Err(e) = geo.compute_bounding_volume() {
        log::warn!("create_box({width}, {height}, {depth}): {e}");
    }
    geo
}
