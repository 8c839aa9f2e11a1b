//! Shared-vertex face mesh.
//!
//! [`FaceGeometry`] stores a vertex pool and triangular [`Face3`]s indexing it,
//! with optional per-corner normals, colors and UVs. This is the form loaders
//! and procedural builders author; the renderer reads the flat form obtained
//! from [`FaceGeometry::buffer_geometry`], which is built lazily and cached
//! until the next mutating call (or [`FaceGeometry::invalidate_cache`]).

use std::cell::OnceCell;
use std::ops::Range;

use arbor_core::errors::{ArborError, Result};
use arbor_core::math::{InversionPolicy, normal_matrix};
use arbor_core::triangle;
use arbor_core::{BoundingBox, BoundingSphere};
use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};
use rustc_hash::FxHashMap;
use uuid::Uuid;

use crate::accessor::{self, MeshAccess};
use crate::buffer_geometry::{BufferGeometry, attr};
use crate::skinning::normalize_skin_weight;

/// Decimal digits kept when [`FaceGeometry::merge_vertices`] compares positions.
pub const MERGE_PRECISION_POINTS: i32 = 4;

// ============================================================================
// Face3
// ============================================================================

/// Triangle referencing three vertices of a [`FaceGeometry`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Face3 {
    pub a: u32,
    pub b: u32,
    pub c: u32,
    pub normal: Vec3,
    /// Per-corner normals, overriding `normal` when present.
    pub vertex_normals: Option<[Vec3; 3]>,
    pub color: Vec3,
    /// Per-corner colors, overriding `color` when present.
    pub vertex_colors: Option<[Vec3; 3]>,
    pub material_index: usize,
}

impl Face3 {
    #[must_use]
    pub fn new(a: u32, b: u32, c: u32) -> Self {
        Self {
            a,
            b,
            c,
            normal: Vec3::ZERO,
            vertex_normals: None,
            color: Vec3::ONE,
            vertex_colors: None,
            material_index: 0,
        }
    }

    #[must_use]
    pub fn with_normal(mut self, normal: Vec3) -> Self {
        self.normal = normal;
        self
    }

    #[must_use]
    pub fn with_material_index(mut self, material_index: usize) -> Self {
        self.material_index = material_index;
        self
    }

    #[inline]
    #[must_use]
    pub fn corners(&self) -> [u32; 3] {
        [self.a, self.b, self.c]
    }

    #[inline]
    #[must_use]
    pub fn corner_indices(&self) -> [usize; 3] {
        self.corners().map(|i| i as usize)
    }

    /// Two or more corners share a vertex.
    #[inline]
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.a == self.b || self.b == self.c || self.a == self.c
    }
}

/// Named alternate vertex set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MorphTarget {
    pub name: String,
    pub vertices: Vec<Vec3>,
}

impl MorphTarget {
    #[must_use]
    pub fn new(name: impl Into<String>, vertices: Vec<Vec3>) -> Self {
        Self {
            name: name.into(),
            vertices,
        }
    }
}

/// Normals of a morph target: one per face and three per face corner.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MorphNormals {
    pub name: String,
    pub face_normals: Vec<Vec3>,
    pub vertex_normals: Vec<[Vec3; 3]>,
}

// ============================================================================
// FaceGeometry
// ============================================================================

#[derive(Debug, Clone)]
pub struct FaceGeometry {
    pub uuid: Uuid,
    pub name: String,

    pub vertices: Vec<Vec3>,
    /// Per-vertex colors (used by point clouds and polylines).
    pub colors: Vec<Vec3>,
    pub faces: Vec<Face3>,
    /// Two UV channels, each holding one `[Vec2; 3]` per face.
    pub face_vertex_uvs: [Vec<[Vec2; 3]>; 2],

    pub morph_targets: Vec<MorphTarget>,
    pub morph_normals: Vec<MorphNormals>,

    pub skin_indices: Vec<Vec4>,
    pub skin_weights: Vec<Vec4>,

    pub bounding_box: Option<BoundingBox>,
    pub bounding_sphere: Option<BoundingSphere>,

    buffer_cache: OnceCell<BufferGeometry>,
}

impl Default for FaceGeometry {
    fn default() -> Self {
        Self::new()
    }
}

impl FaceGeometry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: String::new(),
            vertices: Vec::new(),
            colors: Vec::new(),
            faces: Vec::new(),
            face_vertex_uvs: [Vec::new(), Vec::new()],
            morph_targets: Vec::new(),
            morph_normals: Vec::new(),
            skin_indices: Vec::new(),
            skin_weights: Vec::new(),
            bounding_box: None,
            bounding_sphere: None,
            buffer_cache: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn from_parts(vertices: Vec<Vec3>, faces: Vec<Face3>) -> Self {
        Self {
            vertices,
            faces,
            ..Self::new()
        }
    }

    // ========================================================================
    // Flat-buffer cache
    // ========================================================================

    /// Flat buffers for this mesh, converted on first use and cached.
    ///
    /// A geometry without faces is treated as a vertex list (points or lines).
    pub fn buffer_geometry(&self) -> &BufferGeometry {
        self.buffer_cache.get_or_init(|| {
            log::trace!("FaceGeometry '{}': building flat buffers", self.name);
            if self.faces.is_empty() {
                BufferGeometry::from_vertex_list(self)
            } else {
                BufferGeometry::from_face_geometry(self)
            }
        })
    }

    #[must_use]
    pub fn has_cached_buffers(&self) -> bool {
        self.buffer_cache.get().is_some()
    }

    /// Drops the cached flat buffers. Call after mutating public fields directly.
    pub fn invalidate_cache(&mut self) {
        self.buffer_cache.take();
    }

    /// Releases every derived value: the flat-buffer cache and bounding volumes.
    pub fn dispose(&mut self) {
        log::debug!("FaceGeometry '{}' ({}) disposed", self.name, self.uuid);
        self.invalidate_cache();
        self.bounding_box = None;
        self.bounding_sphere = None;
    }

    // ========================================================================
    // Normals
    // ========================================================================

    pub fn compute_face_normals(&mut self) {
        for face in &mut self.faces {
            let [a, b, c] = face.corner_indices();
            face.normal = triangle::normal(self.vertices[a], self.vertices[b], self.vertices[c]);
        }
        self.invalidate_cache();
    }

    /// Smooth per-corner normals shared through the vertex pool.
    pub fn compute_vertex_normals(&mut self, area_weighted: bool) {
        let normals = accessor::accumulate_vertex_normals(&*self, area_weighted);
        for face in &mut self.faces {
            let [a, b, c] = face.corner_indices();
            face.vertex_normals = Some([normals[a], normals[b], normals[c]]);
        }
        self.invalidate_cache();
    }

    /// Per-corner normals equal to the face normal (faceted shading).
    pub fn compute_flat_vertex_normals(&mut self) {
        self.compute_face_normals();
        for face in &mut self.faces {
            face.vertex_normals = Some([face.normal; 3]);
        }
    }

    /// Face and corner normals for every morph target, area weighted.
    pub fn compute_morph_normals(&mut self) {
        let mut scratch = Self {
            faces: self.faces.clone(),
            ..Self::new()
        };

        let mut morph_normals = Vec::with_capacity(self.morph_targets.len());
        for target in &self.morph_targets {
            if target.vertices.len() != self.vertices.len() {
                log::warn!(
                    "FaceGeometry '{}': morph target '{}' has {} vertices, expected {}; normals skipped",
                    self.name,
                    target.name,
                    target.vertices.len(),
                    self.vertices.len()
                );
                continue;
            }
            scratch.vertices.clone_from(&target.vertices);
            scratch.compute_face_normals();
            scratch.compute_vertex_normals(true);

            morph_normals.push(MorphNormals {
                name: target.name.clone(),
                face_normals: scratch.faces.iter().map(|f| f.normal).collect(),
                vertex_normals: scratch
                    .faces
                    .iter()
                    .map(|f| f.vertex_normals.unwrap_or([f.normal; 3]))
                    .collect(),
            });
        }

        self.morph_normals = morph_normals;
        self.invalidate_cache();
    }

    // ========================================================================
    // Bounds
    // ========================================================================

    pub fn compute_bounding_box(&mut self) -> Result<BoundingBox> {
        self.bounding_box = None;
        let bbox = accessor::compute_bounding_box(&*self).inspect_err(|e| {
            log::error!("FaceGeometry '{}' ({}): bounding box skipped: {e}", self.name, self.uuid);
        })?;
        self.bounding_box = Some(bbox);
        Ok(bbox)
    }

    pub fn compute_bounding_sphere(&mut self) -> Result<BoundingSphere> {
        self.bounding_sphere = None;
        let sphere = accessor::compute_bounding_sphere(&*self).inspect_err(|e| {
            log::error!("FaceGeometry '{}' ({}): bounding sphere skipped: {e}", self.name, self.uuid);
        })?;
        self.bounding_sphere = Some(sphere);
        Ok(sphere)
    }

    // ========================================================================
    // Topology edits
    // ========================================================================

    /// Collapses vertices equal to [`MERGE_PRECISION_POINTS`] decimals and
    /// remaps every face. Faces left with a repeated corner are removed along
    /// with their UVs and morph normals. Returns the number of vertices removed.
    pub fn merge_vertices(&mut self) -> usize {
        let precision = 10_f32.powi(MERGE_PRECISION_POINTS);
        let vertex_count = self.vertices.len();

        let mut lookup: FxHashMap<[i64; 3], usize> = FxHashMap::default();
        let mut representatives: Vec<usize> = Vec::new();
        let mut changes = vec![0_usize; vertex_count];

        for (i, v) in self.vertices.iter().enumerate() {
            let key = [
                (v.x * precision).round() as i64,
                (v.y * precision).round() as i64,
                (v.z * precision).round() as i64,
            ];
            changes[i] = *lookup.entry(key).or_insert_with(|| {
                representatives.push(i);
                representatives.len() - 1
            });
        }

        let mut keep = Vec::with_capacity(self.faces.len());
        for face in &mut self.faces {
            face.a = changes[face.a as usize] as u32;
            face.b = changes[face.b as usize] as u32;
            face.c = changes[face.c as usize] as u32;
            keep.push(!face.is_degenerate());
        }

        let dropped = keep.iter().filter(|k| !**k).count();
        if dropped > 0 {
            retain_by_mask(&mut self.faces, &keep);
            for channel in &mut self.face_vertex_uvs {
                retain_by_mask(channel, &keep);
            }
            for normals in &mut self.morph_normals {
                retain_by_mask(&mut normals.face_normals, &keep);
                retain_by_mask(&mut normals.vertex_normals, &keep);
            }
        }

        let pick = |values: &mut Vec<_>| {
            if values.len() == vertex_count {
                *values = representatives.iter().map(|&i| values[i]).collect();
            }
        };
        pick(&mut self.vertices);
        for target in &mut self.morph_targets {
            pick(&mut target.vertices);
        }
        pick(&mut self.colors);

        let pick4 = |values: &mut Vec<Vec4>| {
            if values.len() == vertex_count {
                *values = representatives.iter().map(|&i| values[i]).collect();
            }
        };
        pick4(&mut self.skin_indices);
        pick4(&mut self.skin_weights);

        self.invalidate_cache();

        let removed = vertex_count - representatives.len();
        log::debug!(
            "FaceGeometry '{}': merged {removed} vertices, dropped {dropped} degenerate faces",
            self.name
        );
        removed
    }

    /// Appends `other`, optionally transformed by `matrix`. Its faces reference
    /// the appended vertices and their material indices are shifted by
    /// `material_index_offset`.
    pub fn merge(
        &mut self,
        other: &FaceGeometry,
        matrix: Option<&Mat4>,
        material_index_offset: usize,
        policy: InversionPolicy,
    ) -> Result<()> {
        let vertex_offset = self.vertices.len() as u32;
        let old_vertex_count = self.vertices.len();
        let old_face_count = self.faces.len();
        let normal_m = matrix.map(|m| normal_matrix(m, policy)).transpose()?;

        let to_world = |v: Vec3| matrix.map_or(v, |m| m.transform_point3(v));
        let to_world_normal = |n: Vec3| normal_m.map_or(n, |nm| (nm * n).normalize_or_zero());

        self.vertices.extend(other.vertices.iter().map(|&v| to_world(v)));
        self.colors.extend_from_slice(&other.colors);

        self.faces.extend(other.faces.iter().map(|face| Face3 {
            a: face.a + vertex_offset,
            b: face.b + vertex_offset,
            c: face.c + vertex_offset,
            normal: to_world_normal(face.normal),
            vertex_normals: face.vertex_normals.map(|ns| ns.map(to_world_normal)),
            material_index: face.material_index + material_index_offset,
            ..*face
        }));

        for (mine, theirs) in self.face_vertex_uvs.iter_mut().zip(&other.face_vertex_uvs) {
            if mine.is_empty() && theirs.is_empty() {
                continue;
            }
            mine.resize(old_face_count, [Vec2::ZERO; 3]);
            mine.extend(
                theirs
                    .iter()
                    .copied()
                    .chain(std::iter::repeat([Vec2::ZERO; 3]))
                    .take(other.faces.len()),
            );
        }

        let skin_aligned = self.skin_indices.len() == old_vertex_count
            && self.skin_weights.len() == old_vertex_count
            && other.skin_indices.len() == other.vertices.len()
            && other.skin_weights.len() == other.vertices.len();
        if skin_aligned {
            self.skin_indices.extend_from_slice(&other.skin_indices);
            self.skin_weights.extend_from_slice(&other.skin_weights);
        } else if !self.skin_indices.is_empty() || !other.skin_indices.is_empty() {
            log::warn!("FaceGeometry '{}': skin data not merged, arrays are not aligned", self.name);
        }

        self.invalidate_cache();
        Ok(())
    }

    /// Transforms vertices and morph targets by `matrix`, normals by its normal
    /// matrix. Existing bounds are recomputed.
    pub fn apply_matrix4(&mut self, matrix: &Mat4, policy: InversionPolicy) -> Result<()> {
        let normal_m: Mat3 = normal_matrix(matrix, policy)?;
        let transform_normal = |n: Vec3| (normal_m * n).normalize_or_zero();

        for v in &mut self.vertices {
            *v = matrix.transform_point3(*v);
        }
        for face in &mut self.faces {
            face.normal = transform_normal(face.normal);
            if let Some(ns) = &mut face.vertex_normals {
                *ns = ns.map(transform_normal);
            }
        }
        for target in &mut self.morph_targets {
            for v in &mut target.vertices {
                *v = matrix.transform_point3(*v);
            }
        }
        for normals in &mut self.morph_normals {
            for n in &mut normals.face_normals {
                *n = transform_normal(*n);
            }
            for ns in &mut normals.vertex_normals {
                *ns = ns.map(transform_normal);
            }
        }

        self.invalidate_cache();
        if self.bounding_box.is_some() {
            self.compute_bounding_box()?;
        }
        if self.bounding_sphere.is_some() {
            self.compute_bounding_sphere()?;
        }
        Ok(())
    }

    /// Moves the bounding-box center to the origin. Returns the applied offset.
    pub fn center(&mut self) -> Result<Vec3> {
        let offset = -self.compute_bounding_box()?.center();
        self.apply_matrix4(&Mat4::from_translation(offset), InversionPolicy::Error)?;
        Ok(offset)
    }

    /// Centers the geometry on its bounding sphere and scales it to unit radius.
    pub fn normalize(&mut self) -> Result<()> {
        let sphere = self.compute_bounding_sphere()?;
        let s = if sphere.radius == 0.0 { 1.0 } else { 1.0 / sphere.radius };
        let matrix = Mat4::from_scale(Vec3::splat(s)) * Mat4::from_translation(-sphere.center);
        self.apply_matrix4(&matrix, InversionPolicy::Error)
    }

    /// Stable sort of faces (and their per-face data) by material index, so that
    /// conversion yields one group per material.
    pub fn sort_faces_by_material_index(&mut self) {
        let face_count = self.faces.len();
        let mut order: Vec<usize> = (0..face_count).collect();
        order.sort_by_key(|&i| self.faces[i].material_index);

        self.faces = order.iter().map(|&i| self.faces[i]).collect();
        for channel in &mut self.face_vertex_uvs {
            if channel.len() == face_count {
                *channel = order.iter().map(|&i| channel[i]).collect();
            }
        }
        for normals in &mut self.morph_normals {
            if normals.face_normals.len() == face_count {
                normals.face_normals = order.iter().map(|&i| normals.face_normals[i]).collect();
            }
            if normals.vertex_normals.len() == face_count {
                normals.vertex_normals = order.iter().map(|&i| normals.vertex_normals[i]).collect();
            }
        }
        self.invalidate_cache();
    }

    pub fn normalize_skin_weights(&mut self) {
        for w in &mut self.skin_weights {
            *w = normalize_skin_weight(*w);
        }
        self.invalidate_cache();
    }

    /// Checks face indices and the lengths of every per-vertex and per-face array.
    pub fn validate(&self) -> Result<()> {
        let vertex_count = self.vertices.len();
        let face_count = self.faces.len();

        for (i, face) in self.faces.iter().enumerate() {
            if let Some(&bad) = face.corners().iter().find(|&&v| v as usize >= vertex_count) {
                return Err(ArborError::IndexOutOfRange {
                    context: format!("face {i} of '{}'", self.name),
                    index: bad as usize,
                    len: vertex_count,
                });
            }
        }

        let check = |name: &str, expected: usize, found: usize| {
            if found != 0 && found != expected {
                Err(ArborError::AttributeCountMismatch {
                    name: name.to_string(),
                    expected,
                    found,
                })
            } else {
                Ok(())
            }
        };

        check(attr::UV, face_count, self.face_vertex_uvs[0].len())?;
        check(attr::UV2, face_count, self.face_vertex_uvs[1].len())?;
        check(attr::COLOR, vertex_count, self.colors.len())?;
        check(attr::SKIN_INDEX, vertex_count, self.skin_indices.len())?;
        check(attr::SKIN_WEIGHT, vertex_count, self.skin_weights.len())?;
        for target in &self.morph_targets {
            if target.vertices.len() != vertex_count {
                return Err(ArborError::AttributeCountMismatch {
                    name: format!("morph target '{}'", target.name),
                    expected: vertex_count,
                    found: target.vertices.len(),
                });
            }
        }
        Ok(())
    }

    // ========================================================================
    // Conversion
    // ========================================================================

    /// Rebuilds faces from flat buffers: one face per index triple (or per three
    /// sequential vertices), per-corner normals, colors and UVs cloned in, and
    /// material indices taken from the groups. Skin attributes and morph
    /// targets are copied per vertex.
    #[must_use]
    pub fn from_buffer_geometry(geometry: &BufferGeometry) -> Self {
        let mut out = Self::new();
        out.name.clone_from(&geometry.name);

        let vertex_count = geometry.vertex_count();
        out.vertices = (0..vertex_count).map(|i| geometry.position_at(i)).collect();

        let normals = geometry.attribute(attr::NORMAL);
        let colors = geometry.attribute(attr::COLOR);
        let uvs = geometry.attribute(attr::UV);
        let uvs2 = geometry.attribute(attr::UV2);

        if let Some(colors) = colors {
            out.colors = (0..colors.count()).map(|i| colors.vec3_at(i)).collect();
        }

        let mut add_face = |a: u32, b: u32, c: u32, material_index: usize| {
            let corners = [a as usize, b as usize, c as usize];
            let mut face = Face3::new(a, b, c).with_material_index(material_index);
            face.vertex_normals = normals.map(|n| corners.map(|i| n.vec3_at(i)));
            face.vertex_colors = colors.map(|col| corners.map(|i| col.vec3_at(i)));
            out.faces.push(face);
            if let Some(uv) = uvs {
                out.face_vertex_uvs[0].push(corners.map(|i| uv.vec2_at(i)));
            }
            if let Some(uv) = uvs2 {
                out.face_vertex_uvs[1].push(corners.map(|i| uv.vec2_at(i)));
            }
        };

        let stream_len = geometry.index_count();
        let groups = geometry.groups();
        if groups.is_empty() {
            for t in 0..stream_len / 3 {
                let [a, b, c] = [3 * t, 3 * t + 1, 3 * t + 2].map(|i| geometry.index_at(i));
                add_face(a, b, c, 0);
            }
        } else {
            for group in groups {
                let end = group.range().end.min(stream_len);
                let mut j = group.start;
                while j + 2 < end {
                    add_face(
                        geometry.index_at(j),
                        geometry.index_at(j + 1),
                        geometry.index_at(j + 2),
                        group.material_index,
                    );
                    j += 3;
                }
            }
        }

        if let Some(a) = geometry.attribute(attr::SKIN_INDEX) {
            out.skin_indices = (0..a.count()).map(|i| a.vec4_at(i)).collect();
        }
        if let Some(a) = geometry.attribute(attr::SKIN_WEIGHT) {
            out.skin_weights = (0..a.count()).map(|i| a.vec4_at(i)).collect();
        }
        if let Some(targets) = geometry.morph_attributes.get(attr::POSITION) {
            out.morph_targets = targets
                .iter()
                .enumerate()
                .map(|(t, a)| {
                    let name = geometry
                        .morph_target_names
                        .get(t)
                        .cloned()
                        .unwrap_or_else(|| format!("target_{t}"));
                    MorphTarget::new(name, (0..a.count()).map(|i| a.vec3_at(i)).collect())
                })
                .collect();
        }

        out.compute_face_normals();
        out.bounding_box = geometry.bounding_box;
        out.bounding_sphere = geometry.bounding_sphere;
        out
    }

    /// Box of `width x height x depth` with 4 unshared corners per side
    /// (24 vertices, 12 faces). Each side uses its own material index.
    #[must_use]
    pub fn new_box(width: f32, height: f32, depth: f32) -> Self {
        let layout = crate::primitives::box_shape::box_layout(width, height, depth);
        let mut geometry = Self::new();
        geometry.name = "Box".to_string();
        geometry.vertices = layout.positions.to_vec();

        for side in 0..6 {
            let base = (side * 4) as u32;
            let normal = layout.normals[side * 4];
            let uv = |i: u32| layout.uvs[i as usize];
            for [a, b, c] in [[base, base + 1, base + 2], [base, base + 2, base + 3]] {
                geometry.faces.push(
                    Face3::new(a, b, c)
                        .with_normal(normal)
                        .with_material_index(side),
                );
                geometry.face_vertex_uvs[0].push([uv(a), uv(b), uv(c)]);
            }
        }
        geometry
    }
}

fn retain_by_mask<T>(values: &mut Vec<T>, keep: &[bool]) {
    let mut mask = keep.iter();
    values.retain(|_| *mask.next().unwrap_or(&true));
}

impl MeshAccess for FaceGeometry {
    fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    fn position_at(&self, index: usize) -> Vec3 {
        self.vertices[index]
    }

    fn normal_at(&self, _index: usize) -> Option<Vec3> {
        None
    }

    fn index_count(&self) -> usize {
        if self.faces.is_empty() {
            self.vertices.len()
        } else {
            self.faces.len() * 3
        }
    }

    fn index_at(&self, i: usize) -> u32 {
        if self.faces.is_empty() {
            i as u32
        } else {
            self.faces[i / 3].corners()[i % 3]
        }
    }

    fn triangle_count(&self) -> usize {
        self.faces.len()
    }

    fn triangle_uvs(&self, t: usize) -> Option<[Vec2; 3]> {
        self.face_vertex_uvs[0].get(t).copied()
    }

    fn triangle_material(&self, t: usize) -> Option<usize> {
        self.faces.get(t).map(|f| f.material_index)
    }

    fn draw_range(&self) -> Range<usize> {
        0..self.index_count()
    }

    fn morph_target_count(&self) -> usize {
        self.morph_targets.len()
    }

    fn morph_position_at(&self, target: usize, index: usize) -> Option<Vec3> {
        self.morph_targets.get(target)?.vertices.get(index).copied()
    }
}
