//! Face mesh to flat buffer conversion pivot.
//!
//! [`DirectGeometry`] holds one record per face corner with no index sharing.
//! It is what [`BufferGeometry::from_direct`](crate::BufferGeometry::from_direct)
//! flattens; callers wanting shared vertices index the result afterwards.

use arbor_core::{BoundingBox, BoundingSphere};
use glam::{Vec2, Vec3, Vec4};

use crate::buffer_geometry::GeometryGroup;
use crate::face_geometry::{FaceGeometry, MorphTarget};

#[derive(Debug, Clone, Default)]
pub struct DirectGeometry {
    pub vertices: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub colors: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub uvs2: Vec<Vec2>,

    pub groups: Vec<GeometryGroup>,

    /// Per-corner morph positions, one entry per morph target.
    pub morph_targets: Vec<MorphTarget>,
    /// Per-corner morph normals, one entry per morph normal set.
    pub morph_normals: Vec<MorphTarget>,

    pub skin_indices: Vec<Vec4>,
    pub skin_weights: Vec<Vec4>,

    pub bounding_box: Option<BoundingBox>,
    pub bounding_sphere: Option<BoundingSphere>,
}

impl DirectGeometry {
    /// Emits three records per face.
    ///
    /// Normals and colors prefer the per-corner values and fall back to the
    /// face value replicated three times. A face missing its UVs while the
    /// channel exists gets zero UVs and a single warning per channel.
    #[must_use]
    pub fn from_face_geometry(geometry: &FaceGeometry) -> Self {
        let faces = &geometry.faces;
        let corner_count = faces.len() * 3;

        let [uv_channel, uv2_channel] = &geometry.face_vertex_uvs;
        let has_uv = !uv_channel.is_empty();
        let has_uv2 = !uv2_channel.is_empty();
        let has_skin_indices = geometry.skin_indices.len() == geometry.vertices.len();
        let has_skin_weights = geometry.skin_weights.len() == geometry.vertices.len();

        let mut direct = Self {
            vertices: Vec::with_capacity(corner_count),
            normals: Vec::with_capacity(corner_count),
            colors: Vec::with_capacity(corner_count),
            ..Self::default()
        };

        direct.morph_targets = geometry
            .morph_targets
            .iter()
            .map(|t| MorphTarget::new(t.name.clone(), Vec::with_capacity(corner_count)))
            .collect();
        direct.morph_normals = geometry
            .morph_normals
            .iter()
            .map(|n| MorphTarget::new(n.name.clone(), Vec::with_capacity(corner_count)))
            .collect();

        let mut warned_uv = false;
        let mut warned_uv2 = false;

        for (i, face) in faces.iter().enumerate() {
            let corners = [face.a as usize, face.b as usize, face.c as usize];

            direct.vertices.extend(corners.map(|v| geometry.vertices[v]));
            direct.normals.extend(face.vertex_normals.unwrap_or([face.normal; 3]));
            direct.colors.extend(face.vertex_colors.unwrap_or([face.color; 3]));

            if has_uv {
                push_corner_uvs(&mut direct.uvs, uv_channel.get(i), &mut warned_uv, "uv", i);
            }
            if has_uv2 {
                push_corner_uvs(&mut direct.uvs2, uv2_channel.get(i), &mut warned_uv2, "uv2", i);
            }

            for (out, target) in direct.morph_targets.iter_mut().zip(&geometry.morph_targets) {
                out.vertices.extend(corners.map(|v| target.vertices[v]));
            }
            for (out, normals) in direct.morph_normals.iter_mut().zip(&geometry.morph_normals) {
                let corner_normals = normals
                    .vertex_normals
                    .get(i)
                    .copied()
                    .unwrap_or([normals.face_normals.get(i).copied().unwrap_or(face.normal); 3]);
                out.vertices.extend(corner_normals);
            }

            if has_skin_indices {
                direct.skin_indices.extend(corners.map(|v| geometry.skin_indices[v]));
            }
            if has_skin_weights {
                direct.skin_weights.extend(corners.map(|v| geometry.skin_weights[v]));
            }
        }

        direct.groups = compute_groups(geometry);
        direct.bounding_box = geometry.bounding_box;
        direct.bounding_sphere = geometry.bounding_sphere;
        direct
    }
}

fn push_corner_uvs(out: &mut Vec<Vec2>, uvs: Option<&[Vec2; 3]>, warned: &mut bool, channel: &str, face: usize) {
    if let Some(uvs) = uvs {
        out.extend_from_slice(uvs);
    } else {
        if !*warned {
            log::warn!("DirectGeometry: face {face} has no {channel}, substituting zeros");
            *warned = true;
        }
        out.extend([Vec2::ZERO; 3]);
    }
}

/// One group per run of consecutive faces sharing a material index, in units
/// of the unindexed corner stream.
#[must_use]
pub fn compute_groups(geometry: &FaceGeometry) -> Vec<GeometryGroup> {
    let mut groups: Vec<GeometryGroup> = Vec::new();

    for (i, face) in geometry.faces.iter().enumerate() {
        match groups.last_mut() {
            Some(group) if group.material_index == face.material_index => group.count += 3,
            _ => groups.push(GeometryGroup {
                start: i * 3,
                count: 3,
                material_index: face.material_index,
            }),
        }
    }

    groups
}
