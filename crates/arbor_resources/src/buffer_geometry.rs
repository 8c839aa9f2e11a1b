//! Flat attribute-buffer geometry.
//!
//! [`BufferGeometry`] is the form handed to the rendering backend: named
//! `f32` attribute arrays with an optional `u32` triangle-list index and
//! material groups. Raw bytes for upload are available via
//! [`BufferAttribute::as_bytes`].

use std::borrow::Cow;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};

use arbor_core::errors::{ArborError, Result};
use arbor_core::math::{InversionPolicy, normal_matrix};
use arbor_core::{BoundingBox, BoundingSphere};
use glam::{Mat4, Vec2, Vec3, Vec4};
use rustc_hash::FxHashMap;
use uuid::Uuid;

use crate::accessor::{self, MeshAccess};
use crate::convert::DirectGeometry;
use crate::face_geometry::FaceGeometry;
use crate::skinning::normalize_skin_weight;

/// Well-known attribute names.
pub mod attr {
    pub const POSITION: &str = "position";
    pub const NORMAL: &str = "normal";
    pub const COLOR: &str = "color";
    pub const UV: &str = "uv";
    pub const UV2: &str = "uv2";
    pub const SKIN_INDEX: &str = "skin_index";
    pub const SKIN_WEIGHT: &str = "skin_weight";
}

static NEXT_ATTR_VERSION: AtomicU64 = AtomicU64::new(1);

// ============================================================================
// BufferAttribute
// ============================================================================

/// A flat `f32` array read in items of `item_size` components.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferAttribute {
    pub array: Vec<f32>,
    pub item_size: usize,
    pub normalized: bool,
    /// Bumped by [`mark_updated`](Self::mark_updated) so consumers can detect changes.
    pub version: u64,
}

impl BufferAttribute {
    #[must_use]
    pub fn new(array: Vec<f32>, item_size: usize) -> Self {
        Self {
            array,
            item_size,
            normalized: false,
            version: NEXT_ATTR_VERSION.fetch_add(1, Ordering::Relaxed),
        }
    }

    #[must_use]
    pub fn with_normalized(mut self, normalized: bool) -> Self {
        self.normalized = normalized;
        self
    }

    #[must_use]
    pub fn from_vec2(data: &[Vec2]) -> Self {
        Self::new(bytemuck::cast_slice(data).to_vec(), 2)
    }

    #[must_use]
    pub fn from_vec3(data: &[Vec3]) -> Self {
        Self::new(bytemuck::cast_slice(data).to_vec(), 3)
    }

    #[must_use]
    pub fn from_vec4(data: &[Vec4]) -> Self {
        Self::new(bytemuck::cast_slice(data).to_vec(), 4)
    }

    /// Number of items (`array.len() / item_size`).
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        if self.item_size == 0 {
            0
        } else {
            self.array.len() / self.item_size
        }
    }

    /// Components of item `index`. Empty when out of range.
    #[inline]
    #[must_use]
    pub fn item(&self, index: usize) -> &[f32] {
        let start = index * self.item_size;
        self.array.get(start..start + self.item_size).unwrap_or(&[])
    }

    #[inline]
    fn component(&self, index: usize, c: usize) -> f32 {
        if c < self.item_size {
            self.array[index * self.item_size + c]
        } else {
            0.0
        }
    }

    #[must_use]
    pub fn vec2_at(&self, index: usize) -> Vec2 {
        Vec2::new(self.component(index, 0), self.component(index, 1))
    }

    #[must_use]
    pub fn vec3_at(&self, index: usize) -> Vec3 {
        Vec3::new(
            self.component(index, 0),
            self.component(index, 1),
            self.component(index, 2),
        )
    }

    #[must_use]
    pub fn vec4_at(&self, index: usize) -> Vec4 {
        Vec4::new(
            self.component(index, 0),
            self.component(index, 1),
            self.component(index, 2),
            self.component(index, 3),
        )
    }

    /// Writes the first `min(item_size, 3)` components of item `index`.
    pub fn set_vec3(&mut self, index: usize, v: Vec3) {
        let base = index * self.item_size;
        for (c, value) in v.to_array().into_iter().enumerate().take(self.item_size) {
            self.array[base + c] = value;
        }
    }

    pub fn set_vec4(&mut self, index: usize, v: Vec4) {
        let base = index * self.item_size;
        for (c, value) in v.to_array().into_iter().enumerate().take(self.item_size) {
            self.array[base + c] = value;
        }
    }

    /// Raw little-endian bytes for GPU upload.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.array)
    }

    pub fn mark_updated(&mut self) {
        self.version = NEXT_ATTR_VERSION.fetch_add(1, Ordering::Relaxed);
    }

    /// New attribute holding the items selected by `indices`, in that order.
    #[must_use]
    pub fn gather<I: IntoIterator<Item = usize>>(&self, indices: I) -> Self {
        let mut array = Vec::new();
        for i in indices {
            array.extend_from_slice(self.item(i));
        }
        Self::new(array, self.item_size).with_normalized(self.normalized)
    }
}

/// Contiguous range of the index (or vertex) stream drawn with one material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryGroup {
    pub start: usize,
    pub count: usize,
    pub material_index: usize,
}

impl GeometryGroup {
    #[inline]
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.start..self.start.saturating_add(self.count)
    }
}

// ============================================================================
// BufferGeometry
// ============================================================================

#[derive(Debug, Clone)]
pub struct BufferGeometry {
    pub uuid: Uuid,
    pub name: String,

    index: Option<Vec<u32>>,
    attributes: FxHashMap<String, BufferAttribute>,

    /// Absolute morph target data per attribute name, one entry per target.
    pub morph_attributes: FxHashMap<String, Vec<BufferAttribute>>,
    pub morph_target_names: Vec<String>,

    groups: Vec<GeometryGroup>,
    pub draw_range: Range<u32>,

    pub bounding_box: Option<BoundingBox>,
    pub bounding_sphere: Option<BoundingSphere>,
}

impl Default for BufferGeometry {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferGeometry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: String::new(),
            index: None,
            attributes: FxHashMap::default(),
            morph_attributes: FxHashMap::default(),
            morph_target_names: Vec::new(),
            groups: Vec::new(),
            draw_range: 0..u32::MAX,
            bounding_box: None,
            bounding_sphere: None,
        }
    }

    // Index accessors
    #[must_use]
    pub fn index(&self) -> Option<&[u32]> {
        self.index.as_deref()
    }

    pub fn set_index(&mut self, index: Option<Vec<u32>>) {
        self.index = index;
    }

    // Attribute accessors
    #[must_use]
    pub fn attributes(&self) -> &FxHashMap<String, BufferAttribute> {
        &self.attributes
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&BufferAttribute> {
        self.attributes.get(name)
    }

    pub fn attribute_mut(&mut self, name: &str) -> Option<&mut BufferAttribute> {
        self.attributes.get_mut(name)
    }

    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn set_attribute(&mut self, name: &str, attribute: BufferAttribute) {
        self.attributes.insert(name.to_string(), attribute);
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<BufferAttribute> {
        self.attributes.remove(name)
    }

    pub fn add_morph_attribute(&mut self, name: &str, attribute: BufferAttribute) {
        self.morph_attributes.entry(name.to_string()).or_default().push(attribute);
    }

    // Groups
    #[must_use]
    pub fn groups(&self) -> &[GeometryGroup] {
        &self.groups
    }

    pub fn add_group(&mut self, start: usize, count: usize, material_index: usize) {
        self.groups.push(GeometryGroup {
            start,
            count,
            material_index,
        });
    }

    pub fn clear_groups(&mut self) {
        self.groups.clear();
    }

    pub fn set_draw_range(&mut self, start: u32, count: u32) {
        self.draw_range = start..start.saturating_add(count);
    }

    /// Checks the structural invariants of the buffers.
    ///
    /// - every attribute has the same item count as `position`, unless the
    ///   geometry is partitioned by groups;
    /// - every morph attribute matches the base vertex count;
    /// - every index and every group range stays inside its stream.
    pub fn validate(&self) -> Result<()> {
        let expected = self.vertex_count();

        if self.groups.is_empty() {
            for (name, attribute) in &self.attributes {
                if attribute.count() != expected {
                    return Err(ArborError::AttributeCountMismatch {
                        name: name.clone(),
                        expected,
                        found: attribute.count(),
                    });
                }
            }
        }

        for (name, targets) in &self.morph_attributes {
            for target in targets {
                if target.count() != expected {
                    return Err(ArborError::AttributeCountMismatch {
                        name: format!("morph {name}"),
                        expected,
                        found: target.count(),
                    });
                }
            }
        }

        if let Some(index) = &self.index {
            if let Some((pos, &bad)) = index.iter().enumerate().find(|&(_, &i)| i as usize >= expected) {
                log::debug!("index entry {pos} references vertex {bad}");
                return Err(ArborError::IndexOutOfRange {
                    context: format!("index buffer of '{}'", self.name),
                    index: bad as usize,
                    len: expected,
                });
            }
        }

        let stream_len = self.index_count();
        for group in &self.groups {
            if group.range().end > stream_len {
                return Err(ArborError::IndexOutOfRange {
                    context: format!("group of material {}", group.material_index),
                    index: group.range().end,
                    len: stream_len,
                });
            }
        }

        Ok(())
    }

    /// Recomputes [`bounding_box`](Self::bounding_box). On non-finite data the
    /// error is logged and the box is left unset.
    pub fn compute_bounding_box(&mut self) -> Result<BoundingBox> {
        self.bounding_box = None;
        match accessor::compute_bounding_box(&*self) {
            Ok(bbox) => {
                self.bounding_box = Some(bbox);
                Ok(bbox)
            }
            Err(e) => {
                log::error!("BufferGeometry '{}' ({}): bounding box skipped: {e}", self.name, self.uuid);
                Err(e)
            }
        }
    }

    /// Recomputes [`bounding_sphere`](Self::bounding_sphere), same failure handling
    /// as [`compute_bounding_box`](Self::compute_bounding_box).
    pub fn compute_bounding_sphere(&mut self) -> Result<BoundingSphere> {
        self.bounding_sphere = None;
        match accessor::compute_bounding_sphere(&*self) {
            Ok(sphere) => {
                self.bounding_sphere = Some(sphere);
                Ok(sphere)
            }
            Err(e) => {
                log::error!("BufferGeometry '{}' ({}): bounding sphere skipped: {e}", self.name, self.uuid);
                Err(e)
            }
        }
    }

    /// Box then sphere, in one call.
    pub fn compute_bounding_volume(&mut self) -> Result<()> {
        self.compute_bounding_box()?;
        self.compute_bounding_sphere()?;
        Ok(())
    }

    /// Area-weighted vertex normals written to the `normal` attribute.
    pub fn compute_vertex_normals(&mut self) {
        self.compute_vertex_normals_weighted(true);
    }

    pub fn compute_vertex_normals_weighted(&mut self, area_weighted: bool) {
        if !self.has_attribute(attr::POSITION) {
            log::warn!("BufferGeometry '{}': no position attribute, normals not computed", self.name);
            return;
        }
        let normals = accessor::accumulate_vertex_normals(&*self, area_weighted);
        self.set_attribute(attr::NORMAL, BufferAttribute::from_vec3(&normals));
    }

    pub fn normalize_normals(&mut self) {
        if let Some(normals) = self.attributes.get_mut(attr::NORMAL) {
            for i in 0..normals.count() {
                let n = normals.vec3_at(i).normalize_or_zero();
                normals.set_vec3(i, n);
            }
            normals.mark_updated();
        }
    }

    /// Transforms positions by `matrix` and normals by its normal matrix.
    /// Morph targets follow; existing bounds are recomputed.
    pub fn apply_matrix4(&mut self, matrix: &Mat4, policy: InversionPolicy) -> Result<()> {
        let normal_m = normal_matrix(matrix, policy)?;

        let transform_points = |a: &mut BufferAttribute| {
            for i in 0..a.count() {
                let p = matrix.transform_point3(a.vec3_at(i));
                a.set_vec3(i, p);
            }
            a.mark_updated();
        };
        let transform_normals = |a: &mut BufferAttribute| {
            for i in 0..a.count() {
                let n = (normal_m * a.vec3_at(i)).normalize_or_zero();
                a.set_vec3(i, n);
            }
            a.mark_updated();
        };

        if let Some(position) = self.attributes.get_mut(attr::POSITION) {
            transform_points(position);
        }
        if let Some(normal) = self.attributes.get_mut(attr::NORMAL) {
            transform_normals(normal);
        }
        if let Some(targets) = self.morph_attributes.get_mut(attr::POSITION) {
            targets.iter_mut().for_each(transform_points);
        }
        if let Some(targets) = self.morph_attributes.get_mut(attr::NORMAL) {
            targets.iter_mut().for_each(transform_normals);
        }

        if self.bounding_box.is_some() {
            self.compute_bounding_box()?;
        }
        if self.bounding_sphere.is_some() {
            self.compute_bounding_sphere()?;
        }
        Ok(())
    }

    /// Copy where every index entry gets its own vertex. Already unindexed
    /// geometry is returned as a plain copy.
    #[must_use]
    pub fn to_non_indexed(&self) -> BufferGeometry {
        let Some(index) = &self.index else {
            log::warn!("BufferGeometry '{}' is already non-indexed", self.name);
            return self.clone();
        };

        let mut out = self.derived_copy();
        let order = || index.iter().map(|&i| i as usize);

        for (name, attribute) in &self.attributes {
            out.set_attribute(name, attribute.gather(order()));
        }
        for (name, targets) in &self.morph_attributes {
            let expanded = targets.iter().map(|t| t.gather(order())).collect();
            out.morph_attributes.insert(name.clone(), expanded);
        }
        out
    }

    /// Rebuilds a shared index by merging vertices whose attribute tuples
    /// (morph targets included) are bit-identical.
    #[must_use]
    pub fn to_indexed(&self) -> BufferGeometry {
        let source: Cow<'_, BufferGeometry> = if self.index.is_some() {
            Cow::Owned(self.to_non_indexed())
        } else {
            Cow::Borrowed(self)
        };

        let mut names: Vec<&String> = source.attributes.keys().collect();
        names.sort();
        let mut morph_names: Vec<&String> = source.morph_attributes.keys().collect();
        morph_names.sort();

        let vertex_count = source.vertex_count();
        let mut lookup: FxHashMap<Vec<u32>, u32> = FxHashMap::default();
        let mut representatives: Vec<usize> = Vec::new();
        let mut index = Vec::with_capacity(vertex_count);
        let mut key = Vec::new();

        for v in 0..vertex_count {
            key.clear();
            for name in &names {
                key.extend(source.attributes[*name].item(v).iter().map(|f| f.to_bits()));
            }
            for name in &morph_names {
                for target in &source.morph_attributes[*name] {
                    key.extend(target.item(v).iter().map(|f| f.to_bits()));
                }
            }

            let next = representatives.len() as u32;
            let id = *lookup.entry(key.clone()).or_insert_with(|| {
                representatives.push(v);
                next
            });
            index.push(id);
        }

        let mut out = source.derived_copy();
        for (name, attribute) in &source.attributes {
            out.set_attribute(name, attribute.gather(representatives.iter().copied()));
        }
        for (name, targets) in &source.morph_attributes {
            let merged = targets
                .iter()
                .map(|t| t.gather(representatives.iter().copied()))
                .collect();
            out.morph_attributes.insert(name.clone(), merged);
        }
        out.set_index(Some(index));

        log::debug!(
            "BufferGeometry '{}': indexed {} vertices into {}",
            self.name,
            vertex_count,
            representatives.len()
        );
        out
    }

    /// Normalizes every `skin_weight` item to an L1 sum of one.
    pub fn normalize_skin_weights(&mut self) {
        if let Some(weights) = self.attributes.get_mut(attr::SKIN_WEIGHT) {
            for i in 0..weights.count() {
                let w = normalize_skin_weight(weights.vec4_at(i));
                weights.set_vec4(i, w);
            }
            weights.mark_updated();
        } else {
            log::warn!("BufferGeometry '{}': no skin weights to normalize", self.name);
        }
    }

    /// Flattens a [`DirectGeometry`] (unindexed, one record per face corner).
    #[must_use]
    pub fn from_direct(direct: &DirectGeometry) -> Self {
        let mut geometry = Self::new();

        geometry.set_attribute(attr::POSITION, BufferAttribute::from_vec3(&direct.vertices));
        if !direct.normals.is_empty() {
            geometry.set_attribute(attr::NORMAL, BufferAttribute::from_vec3(&direct.normals));
        }
        if !direct.colors.is_empty() {
            geometry.set_attribute(attr::COLOR, BufferAttribute::from_vec3(&direct.colors));
        }
        if !direct.uvs.is_empty() {
            geometry.set_attribute(attr::UV, BufferAttribute::from_vec2(&direct.uvs));
        }
        if !direct.uvs2.is_empty() {
            geometry.set_attribute(attr::UV2, BufferAttribute::from_vec2(&direct.uvs2));
        }
        if !direct.skin_indices.is_empty() {
            geometry.set_attribute(attr::SKIN_INDEX, BufferAttribute::from_vec4(&direct.skin_indices));
        }
        if !direct.skin_weights.is_empty() {
            geometry.set_attribute(attr::SKIN_WEIGHT, BufferAttribute::from_vec4(&direct.skin_weights));
        }

        for target in &direct.morph_targets {
            geometry.add_morph_attribute(attr::POSITION, BufferAttribute::from_vec3(&target.vertices));
            geometry.morph_target_names.push(target.name.clone());
        }
        for normals in &direct.morph_normals {
            geometry.add_morph_attribute(attr::NORMAL, BufferAttribute::from_vec3(&normals.vertices));
        }

        geometry.groups.clone_from(&direct.groups);
        geometry.bounding_box = direct.bounding_box;
        geometry.bounding_sphere = direct.bounding_sphere;
        geometry
    }

    /// Converts a face mesh through its direct (per-corner) form.
    #[must_use]
    pub fn from_face_geometry(face_geometry: &FaceGeometry) -> Self {
        let mut geometry = Self::from_direct(&DirectGeometry::from_face_geometry(face_geometry));
        geometry.name.clone_from(&face_geometry.name);
        geometry
    }

    /// Buffers for point clouds and polylines: vertices and colors are copied
    /// one-to-one, faces are ignored.
    #[must_use]
    pub fn from_vertex_list(face_geometry: &FaceGeometry) -> Self {
        let mut geometry = Self::new();
        geometry.name.clone_from(&face_geometry.name);
        geometry.set_attribute(attr::POSITION, BufferAttribute::from_vec3(&face_geometry.vertices));

        if !face_geometry.colors.is_empty() {
            if face_geometry.colors.len() == face_geometry.vertices.len() {
                geometry.set_attribute(attr::COLOR, BufferAttribute::from_vec3(&face_geometry.colors));
            } else {
                log::warn!(
                    "FaceGeometry '{}': {} colors for {} vertices, colors dropped",
                    face_geometry.name,
                    face_geometry.colors.len(),
                    face_geometry.vertices.len()
                );
            }
        }

        for target in &face_geometry.morph_targets {
            geometry.add_morph_attribute(attr::POSITION, BufferAttribute::from_vec3(&target.vertices));
            geometry.morph_target_names.push(target.name.clone());
        }

        geometry.bounding_box = face_geometry.bounding_box;
        geometry.bounding_sphere = face_geometry.bounding_sphere;
        geometry
    }

    /// Empty geometry sharing name, groups, draw range and morph names.
    fn derived_copy(&self) -> Self {
        let mut out = Self::new();
        out.name.clone_from(&self.name);
        out.groups.clone_from(&self.groups);
        out.draw_range = self.draw_range.clone();
        out.morph_target_names.clone_from(&self.morph_target_names);
        out
    }
}

impl MeshAccess for BufferGeometry {
    fn vertex_count(&self) -> usize {
        self.attributes.get(attr::POSITION).map_or(0, BufferAttribute::count)
    }

    fn position_at(&self, index: usize) -> Vec3 {
        self.attributes[attr::POSITION].vec3_at(index)
    }

    fn normal_at(&self, index: usize) -> Option<Vec3> {
        self.attributes
            .get(attr::NORMAL)
            .filter(|n| index < n.count())
            .map(|n| n.vec3_at(index))
    }

    fn index_count(&self) -> usize {
        match &self.index {
            Some(index) => index.len(),
            None => self.vertex_count(),
        }
    }

    fn index_at(&self, i: usize) -> u32 {
        match &self.index {
            Some(index) => index[i],
            None => i as u32,
        }
    }

    fn triangle_uvs(&self, t: usize) -> Option<[Vec2; 3]> {
        let uv = self.attributes.get(attr::UV)?;
        let [a, b, c] = self.triangle_at(t);
        let count = uv.count();
        if a >= count || b >= count || c >= count {
            return None;
        }
        Some([uv.vec2_at(a), uv.vec2_at(b), uv.vec2_at(c)])
    }

    fn triangle_material(&self, t: usize) -> Option<usize> {
        if self.groups.is_empty() {
            return Some(0);
        }
        let start = 3 * t;
        self.groups
            .iter()
            .find(|g| g.range().contains(&start))
            .map(|g| g.material_index)
    }

    fn draw_range(&self) -> Range<usize> {
        let len = self.index_count();
        let start = (self.draw_range.start as usize).min(len);
        let end = (self.draw_range.end as usize).clamp(start, len);
        start..end
    }

    fn morph_target_count(&self) -> usize {
        self.morph_attributes.get(attr::POSITION).map_or(0, Vec::len)
    }

    fn morph_position_at(&self, target: usize, index: usize) -> Option<Vec3> {
        let morph = self.morph_attributes.get(attr::POSITION)?.get(target)?;
        (index < morph.count()).then(|| morph.vec3_at(index))
    }
}
