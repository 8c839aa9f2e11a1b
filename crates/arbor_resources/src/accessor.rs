//! Uniform read access over both geometry representations.
//!
//! Normal accumulation, bounds computation and ray casting only ever talk to
//! [`MeshAccess`], so they are written once and work for [`FaceGeometry`],
//! [`BufferGeometry`] and the [`Geometry`] enum alike.
//!
//! # Index stream
//!
//! Every geometry exposes a flat stream of vertex indices:
//! - [`BufferGeometry`]: the index buffer, or `0..vertex_count` when unindexed.
//! - [`FaceGeometry`]: the face corners `a, b, c` of every face in order, or
//!   `0..vertex_count` when the geometry has no faces (point clouds, polylines).
//!
//! Triangles are consecutive triples of that stream; line segments and points
//! are read from it directly.

use std::ops::Range;

use arbor_core::errors::{ArborError, Result};
use arbor_core::triangle;
use arbor_core::{BoundingBox, BoundingSphere};
use glam::{Vec2, Vec3};

use crate::buffer_geometry::BufferGeometry;
use crate::face_geometry::FaceGeometry;

/// Read-only view of a mesh, independent of how it is stored.
pub trait MeshAccess {
    fn vertex_count(&self) -> usize;

    /// Position of vertex `index`. Panics when out of range.
    fn position_at(&self, index: usize) -> Vec3;

    /// Per-vertex normal, when the representation stores one.
    fn normal_at(&self, index: usize) -> Option<Vec3>;

    /// Length of the index stream.
    fn index_count(&self) -> usize;

    fn index_at(&self, i: usize) -> u32;

    #[inline]
    fn triangle_count(&self) -> usize {
        self.index_count() / 3
    }

    /// Vertex indices of triangle `t`.
    #[inline]
    fn triangle_at(&self, t: usize) -> [usize; 3] {
        [
            self.index_at(3 * t) as usize,
            self.index_at(3 * t + 1) as usize,
            self.index_at(3 * t + 2) as usize,
        ]
    }

    /// First-channel UVs of the three corners of triangle `t`.
    fn triangle_uvs(&self, t: usize) -> Option<[Vec2; 3]>;

    /// Material slot used by triangle `t`. None when the geometry is split into
    /// groups and no group covers the triangle.
    fn triangle_material(&self, t: usize) -> Option<usize>;

    /// Portion of the index stream that is drawn, clamped to `0..index_count()`.
    fn draw_range(&self) -> Range<usize>;

    fn morph_target_count(&self) -> usize;

    /// Absolute position of vertex `index` in morph target `target`. None when
    /// the target holds fewer vertices than the base positions.
    fn morph_position_at(&self, target: usize, index: usize) -> Option<Vec3>;
}

/// Axis-aligned box over every position, morph targets included.
///
/// A geometry without vertices yields [`BoundingBox::EMPTY`]. Any non-finite
/// component aborts with [`ArborError::NonFiniteBounds`] instead of producing a
/// NaN-poisoned box.
pub fn compute_bounding_box<M: MeshAccess + ?Sized>(mesh: &M) -> Result<BoundingBox> {
    let mut bbox = BoundingBox::EMPTY;
    visit_positions(mesh, |index, p| {
        if !p.is_finite() {
            return Err(ArborError::NonFiniteBounds(format!("position {index} is {p}")));
        }
        bbox.expand_by_point(p);
        Ok(())
    })?;
    Ok(bbox)
}

/// Sphere centered on the bounding box, radius the farthest position from it.
pub fn compute_bounding_sphere<M: MeshAccess + ?Sized>(mesh: &M) -> Result<BoundingSphere> {
    let bbox = compute_bounding_box(mesh)?;
    let center = bbox.center();

    let mut max_radius_sq = 0.0_f32;
    visit_positions(mesh, |_, p| {
        max_radius_sq = max_radius_sq.max(center.distance_squared(p));
        Ok(())
    })?;

    let radius = max_radius_sq.sqrt();
    if !radius.is_finite() {
        return Err(ArborError::NonFiniteBounds(format!("radius {radius}")));
    }
    Ok(BoundingSphere::new(center, radius))
}

fn visit_positions<M, F>(mesh: &M, mut visit: F) -> Result<()>
where
    M: MeshAccess + ?Sized,
    F: FnMut(usize, Vec3) -> Result<()>,
{
    let count = mesh.vertex_count();
    for i in 0..count {
        visit(i, mesh.position_at(i))?;
    }
    for target in 0..mesh.morph_target_count() {
        for i in 0..count {
            visit(i, morph_position(mesh, target, i)?)?;
        }
    }
    Ok(())
}

/// Vertex `index` of morph target `target`, or
/// [`ArborError::AttributeCountMismatch`] when the target is too short.
pub fn morph_position<M: MeshAccess + ?Sized>(mesh: &M, target: usize, index: usize) -> Result<Vec3> {
    mesh.morph_position_at(target, index)
        .ok_or_else(|| ArborError::AttributeCountMismatch {
            name: format!("morph target {target}"),
            expected: mesh.vertex_count(),
            found: index,
        })
}

/// Per-vertex normals accumulated from every triangle, then normalized.
///
/// With `area_weighted`, each triangle contributes its unnormalized cross
/// product, so larger faces pull harder. Otherwise every face contributes its
/// unit normal. Triangles referencing missing vertices are skipped.
pub fn accumulate_vertex_normals<M: MeshAccess + ?Sized>(mesh: &M, area_weighted: bool) -> Vec<Vec3> {
    let count = mesh.vertex_count();
    let mut normals = vec![Vec3::ZERO; count];

    for t in 0..mesh.triangle_count() {
        let [a, b, c] = mesh.triangle_at(t);
        if a >= count || b >= count || c >= count {
            continue;
        }

        let mut face_normal =
            triangle::unnormalized_normal(mesh.position_at(a), mesh.position_at(b), mesh.position_at(c));
        if !area_weighted {
            face_normal = face_normal.normalize_or_zero();
        }

        normals[a] += face_normal;
        normals[b] += face_normal;
        normals[c] += face_normal;
    }

    for n in &mut normals {
        *n = n.normalize_or_zero();
    }
    normals
}

// ============================================================================
// Geometry
// ============================================================================

/// Either geometry representation, as stored in a scene.
#[derive(Debug, Clone)]
pub enum Geometry {
    Face(FaceGeometry),
    Buffer(BufferGeometry),
}

impl Geometry {
    #[must_use]
    pub fn uuid(&self) -> uuid::Uuid {
        match self {
            Self::Face(g) => g.uuid,
            Self::Buffer(g) => g.uuid,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Face(g) => &g.name,
            Self::Buffer(g) => &g.name,
        }
    }

    #[must_use]
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        match self {
            Self::Face(g) => g.bounding_box,
            Self::Buffer(g) => g.bounding_box,
        }
    }

    #[must_use]
    pub fn bounding_sphere(&self) -> Option<BoundingSphere> {
        match self {
            Self::Face(g) => g.bounding_sphere,
            Self::Buffer(g) => g.bounding_sphere,
        }
    }

    pub fn compute_bounding_box(&mut self) -> Result<BoundingBox> {
        match self {
            Self::Face(g) => g.compute_bounding_box(),
            Self::Buffer(g) => g.compute_bounding_box(),
        }
    }

    pub fn compute_bounding_sphere(&mut self) -> Result<BoundingSphere> {
        match self {
            Self::Face(g) => g.compute_bounding_sphere(),
            Self::Buffer(g) => g.compute_bounding_sphere(),
        }
    }

    /// Recomputes per-vertex normals in whichever form the geometry stores them.
    pub fn compute_vertex_normals(&mut self, area_weighted: bool) {
        match self {
            Self::Face(g) => g.compute_vertex_normals(area_weighted),
            Self::Buffer(g) => g.compute_vertex_normals_weighted(area_weighted),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Face(g) => g.validate(),
            Self::Buffer(g) => g.validate(),
        }
    }

    #[must_use]
    pub fn as_face(&self) -> Option<&FaceGeometry> {
        match self {
            Self::Face(g) => Some(g),
            Self::Buffer(_) => None,
        }
    }

    #[must_use]
    pub fn as_buffer(&self) -> Option<&BufferGeometry> {
        match self {
            Self::Buffer(g) => Some(g),
            Self::Face(_) => None,
        }
    }

    /// Flat buffers for the rendering backend. Face geometry serves its cached
    /// conversion.
    #[must_use]
    pub fn buffers(&self) -> &BufferGeometry {
        match self {
            Self::Face(g) => g.buffer_geometry(),
            Self::Buffer(g) => g,
        }
    }

    /// Morph/skin attribute lookups go through the flat form.
    #[must_use]
    pub fn skin_attribute(&self, name: &str, index: usize) -> Option<glam::Vec4> {
        match self {
            Self::Face(g) => match name {
                crate::buffer_geometry::attr::SKIN_INDEX => g.skin_indices.get(index).copied(),
                crate::buffer_geometry::attr::SKIN_WEIGHT => g.skin_weights.get(index).copied(),
                _ => None,
            },
            Self::Buffer(g) => g
                .attribute(name)
                .filter(|a| index < a.count())
                .map(|a| a.vec4_at(index)),
        }
    }
}

impl From<FaceGeometry> for Geometry {
    fn from(g: FaceGeometry) -> Self {
        Self::Face(g)
    }
}

impl From<BufferGeometry> for Geometry {
    fn from(g: BufferGeometry) -> Self {
        Self::Buffer(g)
    }
}

impl MeshAccess for Geometry {
    fn vertex_count(&self) -> usize {
        match self {
            Self::Face(g) => g.vertex_count(),
            Self::Buffer(g) => g.vertex_count(),
        }
    }

    fn position_at(&self, index: usize) -> Vec3 {
        match self {
            Self::Face(g) => g.position_at(index),
            Self::Buffer(g) => g.position_at(index),
        }
    }

    fn normal_at(&self, index: usize) -> Option<Vec3> {
        match self {
            Self::Face(g) => g.normal_at(index),
            Self::Buffer(g) => g.normal_at(index),
        }
    }

    fn index_count(&self) -> usize {
        match self {
            Self::Face(g) => g.index_count(),
            Self::Buffer(g) => g.index_count(),
        }
    }

    fn index_at(&self, i: usize) -> u32 {
        match self {
            Self::Face(g) => g.index_at(i),
            Self::Buffer(g) => g.index_at(i),
        }
    }

    fn triangle_uvs(&self, t: usize) -> Option<[Vec2; 3]> {
        match self {
            Self::Face(g) => g.triangle_uvs(t),
            Self::Buffer(g) => g.triangle_uvs(t),
        }
    }

    fn triangle_material(&self, t: usize) -> Option<usize> {
        match self {
            Self::Face(g) => g.triangle_material(t),
            Self::Buffer(g) => g.triangle_material(t),
        }
    }

    fn draw_range(&self) -> Range<usize> {
        match self {
            Self::Face(g) => g.draw_range(),
            Self::Buffer(g) => MeshAccess::draw_range(g),
        }
    }

    fn morph_target_count(&self) -> usize {
        match self {
            Self::Face(g) => g.morph_target_count(),
            Self::Buffer(g) => g.morph_target_count(),
        }
    }

    fn morph_position_at(&self, target: usize, index: usize) -> Option<Vec3> {
        match self {
            Self::Face(g) => g.morph_position_at(target, index),
            Self::Buffer(g) => g.morph_position_at(target, index),
        }
    }
}
