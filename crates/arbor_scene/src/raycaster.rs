//! Ray casting against the scene graph.
//!
//! Each candidate node is tested in four stages:
//! 1. reject if the ray misses the world-space bounding sphere (grown by the
//!    pick threshold for lines and points);
//! 2. move the ray into the node's local space through the inverse world matrix;
//! 3. reject if the ray misses the geometry's cached local bounding box, when
//!    one has been computed;
//! 4. test every primitive, converting hits back to world space and keeping
//!    those within `[near, far]`.
//!
//! World matrices are read as they are; update the scene first.

use arbor_core::errors::{ArborError, Result};
use arbor_core::math;
use arbor_core::{BoundingSphere, Ray, triangle};
use arbor_resources::accessor::{compute_bounding_sphere, morph_position};
use arbor_resources::{Geometry, MeshAccess, Side};
use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostics;
use crate::node::{LineMode, Node, NodeKind};
use crate::scene::Scene;
use crate::NodeHandle;

/// Pick tolerances for primitives without area, in world units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaycastParams {
    /// Maximum ray-to-segment distance for lines.
    pub line_threshold: f32,
    /// Maximum ray-to-vertex distance for points.
    pub points_threshold: f32,
}

impl Default for RaycastParams {
    fn default() -> Self {
        Self {
            line_threshold: 1.0,
            points_threshold: 1.0,
        }
    }
}

/// The triangle that was hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceHit {
    pub a: usize,
    pub b: usize,
    pub c: usize,
    /// Geometric normal in local space.
    pub normal: Vec3,
    pub material_index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Intersection {
    /// Distance from the ray origin to `point`, in world units.
    pub distance: f32,
    /// Hit point in world space.
    pub point: Vec3,
    /// Position in the index stream (lines) or vertex index (points).
    pub index: Option<usize>,
    pub face: Option<FaceHit>,
    pub face_index: Option<usize>,
    pub uv: Option<Vec2>,
    /// Ray-to-vertex distance, for points.
    pub distance_to_ray: Option<f32>,
    pub object: NodeHandle,
}

impl Intersection {
    fn new(distance: f32, point: Vec3, object: NodeHandle) -> Self {
        Self {
            distance,
            point,
            index: None,
            face: None,
            face_index: None,
            uv: None,
            distance_to_ray: None,
            object,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Raycaster {
    /// World-space ray; the direction must be unit length.
    pub ray: Ray,
    pub near: f32,
    pub far: f32,
    pub params: RaycastParams,
    /// Skip invisible nodes together with their subtrees, and triangles whose
    /// material is hidden.
    pub visible_only: bool,
}

impl Default for Raycaster {
    fn default() -> Self {
        Self::new(Ray::default())
    }
}

impl Raycaster {
    #[must_use]
    pub fn new(ray: Ray) -> Self {
        Self {
            ray,
            near: 0.0,
            far: f32::INFINITY,
            params: RaycastParams::default(),
            visible_only: false,
        }
    }

    /// Raycaster from an origin and a (not necessarily normalized) direction.
    #[must_use]
    pub fn from_origin_direction(origin: Vec3, direction: Vec3) -> Self {
        Self::new(Ray::new(origin, math::normalize_or(direction, Vec3::NEG_Z)))
    }

    pub fn set(&mut self, origin: Vec3, direction: Vec3) {
        self.ray = Ray::new(origin, math::normalize_or(direction, Vec3::NEG_Z));
    }

    /// Hits on `node` (and its subtree when `recursive`), closest first.
    ///
    /// Nodes that fail are logged and skipped.
    #[must_use]
    pub fn intersect_object(&self, scene: &Scene, node: NodeHandle, recursive: bool) -> Vec<Intersection> {
        let mut diagnostics = Diagnostics::new();
        self.intersect_object_with_diagnostics(scene, node, recursive, &mut diagnostics)
    }

    #[must_use]
    pub fn intersect_objects(&self, scene: &Scene, nodes: &[NodeHandle], recursive: bool) -> Vec<Intersection> {
        let mut diagnostics = Diagnostics::new();
        self.intersect_objects_with_diagnostics(scene, nodes, recursive, &mut diagnostics)
    }

    /// Like [`intersect_object`](Self::intersect_object), recording per-node
    /// failures into `diagnostics`.
    pub fn intersect_object_with_diagnostics(
        &self,
        scene: &Scene,
        node: NodeHandle,
        recursive: bool,
        diagnostics: &mut Diagnostics,
    ) -> Vec<Intersection> {
        self.intersect_objects_with_diagnostics(scene, &[node], recursive, diagnostics)
    }

    pub fn intersect_objects_with_diagnostics(
        &self,
        scene: &Scene,
        nodes: &[NodeHandle],
        recursive: bool,
        diagnostics: &mut Diagnostics,
    ) -> Vec<Intersection> {
        let mut hits = Vec::new();
        for &root in nodes {
            if scene.get_node(root).is_none() {
                diagnostics.record(root, ArborError::NodeNotFound(format!("{root:?}")));
                continue;
            }

            let mut visit = |handle: NodeHandle, node: &Node| {
                if let Err(e) = self.intersect_node(scene, handle, node, &mut hits) {
                    diagnostics.record(handle, e);
                }
            };

            match (recursive, self.visible_only) {
                (true, true) => scene.traverse_visible(root, visit),
                (true, false) => scene.traverse(root, visit),
                (false, _) => {
                    if let Some(node) = scene.get_node(root)
                        && (node.visible || !self.visible_only)
                    {
                        visit(root, node);
                    }
                }
            }
        }

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }

    fn intersect_node(
        &self,
        scene: &Scene,
        handle: NodeHandle,
        node: &Node,
        hits: &mut Vec<Intersection>,
    ) -> Result<()> {
        let threshold = match node.kind {
            NodeKind::Group | NodeKind::Bone => return Ok(()),
            NodeKind::Mesh | NodeKind::SkinnedMesh(_) => 0.0,
            NodeKind::Line(_) => self.params.line_threshold,
            NodeKind::Points => self.params.points_threshold,
        };
        let Some(key) = node.geometry else {
            return Ok(());
        };
        let geometry = scene
            .geometry(key)
            .ok_or_else(|| ArborError::GeometryNotFound(format!("{key:?}")))?;

        // 1. Bounding sphere in world space
        let local_sphere = match geometry.bounding_sphere() {
            Some(sphere) => sphere,
            None => compute_bounding_sphere(geometry)?,
        };
        if local_sphere.is_empty() {
            return Ok(());
        }
        let world = node.transform.world_matrix;
        let mut sphere: BoundingSphere = local_sphere.transform(&world);
        sphere.radius += threshold;
        if !self.ray.intersects_sphere(&sphere) {
            return Ok(());
        }

        // 2. Ray in local space
        let inverse = math::invert(&world, scene.settings.inversion_policy())?;
        let local_ray = self.ray.transform(&inverse);

        // 3. Bounding box in local space (meshes only: lines and points are
        // picked within a threshold outside their box)
        if node.is_mesh()
            && let Some(bbox) = geometry.bounding_box()
            && !local_ray.intersects_box(&bbox)
        {
            return Ok(());
        }

        // 4. Primitives
        let ctx = LocalQuery {
            raycaster: self,
            world: &world,
            local_ray,
            object: handle,
        };
        // A node that fails partway contributes no hits at all.
        let mut found = Vec::new();
        match node.kind {
            NodeKind::Mesh | NodeKind::SkinnedMesh(_) => ctx.triangles(scene, node, geometry, &mut found)?,
            NodeKind::Line(mode) => ctx.segments(geometry, mode, threshold, &mut found)?,
            NodeKind::Points => {
                let mean_scale = node.transform.scale.element_sum() / 3.0;
                let local_threshold = if mean_scale == 0.0 { threshold } else { threshold / mean_scale };
                ctx.points(geometry, local_threshold, &mut found)?;
            }
            NodeKind::Group | NodeKind::Bone => {}
        }
        hits.append(&mut found);
        Ok(())
    }
}

/// Per-node state shared by the primitive tests.
struct LocalQuery<'a> {
    raycaster: &'a Raycaster,
    world: &'a Mat4,
    local_ray: Ray,
    object: NodeHandle,
}

impl LocalQuery<'_> {
    /// World-space hit for a local point, or None outside `[near, far]`.
    fn accept(&self, local_point: Vec3) -> Option<Intersection> {
        let point = self.world.transform_point3(local_point);
        let distance = self.raycaster.ray.origin.distance(point);
        if distance < self.raycaster.near || distance > self.raycaster.far {
            return None;
        }
        Some(Intersection::new(distance, point, self.object))
    }

    fn triangles(
        &self,
        scene: &Scene,
        node: &Node,
        geometry: &Geometry,
        hits: &mut Vec<Intersection>,
    ) -> Result<()> {
        let vertex_count = geometry.vertex_count();
        let morph_count = geometry.morph_target_count().min(node.morph_target_influences.len());
        let position = |i: usize| -> Result<Vec3> {
            let base = geometry.position_at(i);
            let mut morphed = base;
            for (t, &influence) in node.morph_target_influences[..morph_count].iter().enumerate() {
                if influence != 0.0 {
                    morphed += (morph_position(geometry, t, i)? - base) * influence;
                }
            }
            Ok(morphed)
        };

        let range = geometry.draw_range();
        for t in range.start.div_ceil(3)..range.end / 3 {
            let [a, b, c] = geometry.triangle_at(t);
            if let Some(&bad) = [a, b, c].iter().find(|&&i| i >= vertex_count) {
                return Err(ArborError::IndexOutOfRange {
                    context: format!("triangle {t}"),
                    index: bad,
                    len: vertex_count,
                });
            }

            // Triangles outside every group are not drawn, so they cannot be hit.
            let Some(material_index) = geometry.triangle_material(t) else {
                continue;
            };
            let material = match node.material_for(material_index) {
                Some(key) => Some(
                    scene
                        .material(key)
                        .ok_or_else(|| ArborError::MaterialNotFound(format!("{key:?}")))?,
                ),
                None => None,
            };
            if self.raycaster.visible_only && material.is_some_and(|m| !m.visible) {
                continue;
            }
            let side = material.map_or(Side::Front, |m| m.side);

            let (pa, pb, pc) = (position(a)?, position(b)?, position(c)?);
            let hit = match side {
                Side::Back => self.local_ray.intersect_triangle(pc, pb, pa, true),
                Side::Front => self.local_ray.intersect_triangle(pa, pb, pc, true),
                Side::Double => self.local_ray.intersect_triangle(pa, pb, pc, false),
            };
            let Some(local_point) = hit else {
                continue;
            };
            let Some(mut intersection) = self.accept(local_point) else {
                continue;
            };

            intersection.uv = geometry
                .triangle_uvs(t)
                .and_then(|uvs| triangle::interpolate_uv(local_point, pa, pb, pc, uvs));
            intersection.face = Some(FaceHit {
                a,
                b,
                c,
                normal: triangle::normal(pa, pb, pc),
                material_index,
            });
            intersection.face_index = Some(t);
            hits.push(intersection);
        }
        Ok(())
    }

    fn segments(
        &self,
        geometry: &Geometry,
        mode: LineMode,
        threshold: f32,
        hits: &mut Vec<Intersection>,
    ) -> Result<()> {
        let threshold_sq = threshold * threshold;
        let vertex_count = geometry.vertex_count();
        let step = match mode {
            LineMode::Strip => 1,
            LineMode::Segments => 2,
        };

        let range = geometry.draw_range();
        let end = range.end.saturating_sub(1);
        for i in (range.start..end).step_by(step) {
            let a = geometry.index_at(i) as usize;
            let b = geometry.index_at(i + 1) as usize;
            if a >= vertex_count || b >= vertex_count {
                return Err(ArborError::IndexOutOfRange {
                    context: format!("segment {i}"),
                    index: a.max(b),
                    len: vertex_count,
                });
            }

            let closest = self
                .local_ray
                .distance_sq_to_segment(geometry.position_at(a), geometry.position_at(b));
            if closest.distance_sq > threshold_sq {
                continue;
            }

            // Distance is measured to the ray-side point; the reported point lies on the line.
            let on_ray = self.world.transform_point3(closest.point_on_ray);
            let distance = self.raycaster.ray.origin.distance(on_ray);
            if distance < self.raycaster.near || distance > self.raycaster.far {
                continue;
            }
            let mut intersection = Intersection::new(
                distance,
                self.world.transform_point3(closest.point_on_segment),
                self.object,
            );
            intersection.index = Some(i);
            hits.push(intersection);
        }
        Ok(())
    }

    fn points(&self, geometry: &Geometry, local_threshold: f32, hits: &mut Vec<Intersection>) -> Result<()> {
        let threshold_sq = local_threshold * local_threshold;
        let vertex_count = geometry.vertex_count();

        for i in geometry.draw_range() {
            let index = geometry.index_at(i) as usize;
            if index >= vertex_count {
                return Err(ArborError::IndexOutOfRange {
                    context: format!("point {i}"),
                    index,
                    len: vertex_count,
                });
            }

            let vertex = geometry.position_at(index);
            let distance_sq = self.local_ray.distance_sq_to_point(vertex);
            if distance_sq >= threshold_sq {
                continue;
            }

            let Some(mut intersection) = self.accept(self.local_ray.closest_point_to_point(vertex)) else {
                continue;
            };
            intersection.index = Some(index);
            intersection.distance_to_ray = Some(distance_sq.sqrt());
            hits.push(intersection);
        }
        Ok(())
    }
}
