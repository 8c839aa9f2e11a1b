use std::sync::atomic::{AtomicU32, Ordering};

use arbor_core::errors::{ArborError, Result};
use arbor_core::math::{self, normalize_or};
use arbor_core::BoundingBox;
use arbor_resources::accessor::compute_bounding_box;
use arbor_resources::buffer_geometry::attr;
use arbor_resources::{Geometry, Material, MeshAccess};
use glam::{Mat4, Quat, Vec3};
use slotmap::SlotMap;
use uuid::Uuid;

use crate::diagnostics::Diagnostics;
use crate::node::{Node, NodeKind};
use crate::settings::SceneSettings;
use crate::skeleton::{BindMode, Skeleton, SkinBinding};
use crate::transform_system;
use crate::{GeometryKey, MaterialKey, NodeHandle, SkeletonKey};

static NEXT_SCENE_ID: AtomicU32 = AtomicU32::new(1);

fn node_not_found(handle: NodeHandle) -> ArborError {
    ArborError::NodeNotFound(format!("{handle:?}"))
}

/// Scene graph container.
///
/// Owns every node, geometry, material and skeleton in slot-map arenas. Nodes
/// refer to each other and to resources by key only, so removing a node never
/// leaves a dangling reference: stale keys simply stop resolving.
///
/// World matrices are only valid after [`update_matrix_world`](Self::update_matrix_world)
/// (or [`update`](Self::update)) has run since the last mutation; skeleton
/// flattening and ray queries read them as they are.
pub struct Scene {
    pub id: u32,

    pub(crate) nodes: SlotMap<NodeHandle, Node>,
    pub(crate) root_nodes: Vec<NodeHandle>,

    // ==== Resource Pools ====
    pub(crate) geometries: SlotMap<GeometryKey, Geometry>,
    pub(crate) materials: SlotMap<MaterialKey, Material>,
    pub(crate) skeletons: SlotMap<SkeletonKey, Skeleton>,

    pub settings: SceneSettings,
    diagnostics: Diagnostics,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(SceneSettings::default())
    }

    #[must_use]
    pub fn with_settings(settings: SceneSettings) -> Self {
        Self {
            id: NEXT_SCENE_ID.fetch_add(1, Ordering::Relaxed),
            nodes: SlotMap::with_key(),
            root_nodes: Vec::new(),
            geometries: SlotMap::with_key(),
            materials: SlotMap::with_key(),
            skeletons: SlotMap::with_key(),
            settings,
            diagnostics: Diagnostics::new(),
        }
    }

    // ========================================================================
    // Node Management
    // ========================================================================

    /// Starts building a node.
    pub fn build_node(&'_ mut self, name: &str) -> NodeBuilder<'_> {
        NodeBuilder::new(self, name)
    }

    /// Creates an empty group node at the root.
    pub fn create_node(&mut self) -> NodeHandle {
        self.add_node(Node::new())
    }

    pub fn create_node_with_name(&mut self, name: &str) -> NodeHandle {
        self.add_node(Node::new().with_name(name))
    }

    /// Adds a node to the scene as a root.
    pub fn add_node(&mut self, mut node: Node) -> NodeHandle {
        node.parent = None;
        node.children.clear();
        let handle = self.nodes.insert(node);
        self.root_nodes.push(handle);
        handle
    }

    /// Adds a node directly under `parent`.
    pub fn add_to_parent(&mut self, mut child: Node, parent: NodeHandle) -> Result<NodeHandle> {
        if !self.nodes.contains_key(parent) {
            return Err(node_not_found(parent));
        }
        child.parent = Some(parent);
        child.children.clear();
        let handle = self.nodes.insert(child);
        self.nodes[parent].children.push(handle);
        Ok(handle)
    }

    /// Whether `ancestor` lies on the parent chain of `node` (excluding `node` itself).
    #[must_use]
    pub fn is_ancestor(&self, ancestor: NodeHandle, node: NodeHandle) -> bool {
        let mut current = self.nodes.get(node).and_then(|n| n.parent);
        while let Some(h) = current {
            if h == ancestor {
                return true;
            }
            current = self.nodes.get(h).and_then(|n| n.parent);
        }
        false
    }

    /// Removes `child` from its parent's children, or from the roots.
    fn unlink(&mut self, child: NodeHandle) {
        let old_parent = self.nodes.get(child).and_then(|n| n.parent);
        if let Some(p) = old_parent {
            if let Some(n) = self.nodes.get_mut(p)
                && let Some(i) = n.children.iter().position(|&x| x == child)
            {
                n.children.remove(i);
            }
        } else if let Some(i) = self.root_nodes.iter().position(|&x| x == child) {
            self.root_nodes.remove(i);
        }
        if let Some(n) = self.nodes.get_mut(child) {
            n.parent = None;
        }
    }

    /// Re-parents `child` under `parent`, detaching it from its old parent first.
    ///
    /// The child keeps its local transform, so its world transform changes.
    /// Attaching a node to itself or to one of its descendants fails with
    /// [`ArborError::HierarchyCycle`] and leaves the hierarchy untouched.
    pub fn attach(&mut self, child: NodeHandle, parent: NodeHandle) -> Result<()> {
        if !self.nodes.contains_key(child) {
            return Err(node_not_found(child));
        }
        if !self.nodes.contains_key(parent) {
            return Err(node_not_found(parent));
        }
        if child == parent || self.is_ancestor(child, parent) {
            return Err(ArborError::HierarchyCycle {
                child: format!("{child:?}"),
                parent: format!("{parent:?}"),
            });
        }

        // 1. Detach from old
        self.unlink(child);

        // 2. Attach to new
        self.nodes[parent].children.push(child);

        // 3. Update child
        let node = &mut self.nodes[child];
        node.parent = Some(parent);
        node.transform.world_matrix_needs_update = true;
        Ok(())
    }

    /// Re-parents `child` under `parent` while keeping its world transform.
    pub fn attach_keep_world(&mut self, child: NodeHandle, parent: NodeHandle) -> Result<()> {
        if self.nodes.contains_key(child) && (child == parent || self.is_ancestor(child, parent)) {
            return Err(ArborError::HierarchyCycle {
                child: format!("{child:?}"),
                parent: format!("{parent:?}"),
            });
        }
        transform_system::update_world_matrix(&mut self.nodes, parent, true, false)?;
        transform_system::update_world_matrix(&mut self.nodes, child, true, false)?;

        let policy = self.settings.inversion_policy();
        let parent_inverse = math::invert(&self.nodes[parent].transform.world_matrix, policy)?;
        let local = parent_inverse * self.nodes[child].transform.world_matrix;

        self.attach(child, parent)?;
        self.nodes[child].transform.set_local_matrix(local);
        Ok(())
    }

    /// Turns `child` into a root node. A root stays where it is.
    pub fn detach(&mut self, child: NodeHandle) -> Result<()> {
        let node = self.nodes.get(child).ok_or_else(|| node_not_found(child))?;
        if node.parent.is_none() {
            return Ok(());
        }
        self.unlink(child);
        self.root_nodes.push(child);
        self.nodes[child].transform.world_matrix_needs_update = true;
        Ok(())
    }

    /// Removes a node and its whole subtree.
    ///
    /// The node is unlinked from its parent before anything is freed, so no
    /// surviving node refers to a removed one. Geometries and materials are
    /// shared resources and stay in the scene.
    pub fn remove_node(&mut self, handle: NodeHandle) -> Result<()> {
        if !self.nodes.contains_key(handle) {
            return Err(node_not_found(handle));
        }
        self.unlink(handle);

        let mut stack = vec![handle];
        while let Some(h) = stack.pop() {
            if let Some(node) = self.nodes.remove(h) {
                stack.extend(node.children);
            }
        }
        Ok(())
    }

    pub fn get_node(&self, handle: NodeHandle) -> Option<&Node> {
        self.nodes.get(handle)
    }

    pub fn get_node_mut(&mut self, handle: NodeHandle) -> Option<&mut Node> {
        self.nodes.get_mut(handle)
    }

    #[must_use]
    pub fn root_nodes(&self) -> &[NodeHandle] {
        &self.root_nodes
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeHandle, &Node)> {
        self.nodes.iter()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // ========================================================================
    // Lookup & Traversal
    // ========================================================================

    /// First node named `name` in pre-order over the roots.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<NodeHandle> {
        self.find(|n| n.name == name)
    }

    #[must_use]
    pub fn find_by_id(&self, id: u32) -> Option<NodeHandle> {
        self.find(|n| n.id() == id)
    }

    #[must_use]
    pub fn find_by_uuid(&self, uuid: Uuid) -> Option<NodeHandle> {
        self.find(|n| n.uuid() == uuid)
    }

    fn find(&self, predicate: impl Fn(&Node) -> bool) -> Option<NodeHandle> {
        let mut stack: Vec<NodeHandle> = self.root_nodes.iter().rev().copied().collect();
        while let Some(h) = stack.pop() {
            let Some(node) = self.nodes.get(h) else {
                continue;
            };
            if predicate(node) {
                return Some(h);
            }
            stack.extend(node.children.iter().rev());
        }
        None
    }

    /// Visits `root` and all of its descendants in pre-order.
    pub fn traverse(&self, root: NodeHandle, mut visit: impl FnMut(NodeHandle, &Node)) {
        self.walk(root, false, &mut visit);
    }

    /// Like [`traverse`](Self::traverse), but an invisible node hides its whole subtree.
    pub fn traverse_visible(&self, root: NodeHandle, mut visit: impl FnMut(NodeHandle, &Node)) {
        self.walk(root, true, &mut visit);
    }

    fn walk(&self, root: NodeHandle, visible_only: bool, visit: &mut impl FnMut(NodeHandle, &Node)) {
        let mut stack = vec![root];
        while let Some(h) = stack.pop() {
            let Some(node) = self.nodes.get(h) else {
                continue;
            };
            if visible_only && !node.visible {
                continue;
            }
            visit(h, node);
            stack.extend(node.children.iter().rev());
        }
    }

    /// Visits the ancestors of `handle`, parent first, up to the root.
    pub fn traverse_ancestors(&self, handle: NodeHandle, mut visit: impl FnMut(NodeHandle, &Node)) {
        let mut current = self.nodes.get(handle).and_then(|n| n.parent);
        while let Some(h) = current {
            let Some(node) = self.nodes.get(h) else {
                break;
            };
            visit(h, node);
            current = node.parent;
        }
    }

    // ========================================================================
    // Matrix Update Pipeline
    // ========================================================================

    /// Brings every world matrix up to date. Call before reading world-space data.
    pub fn update_matrix_world(&mut self) {
        transform_system::update_hierarchy_iterative(&mut self.nodes, &self.root_nodes);
    }

    /// Updates the subtree below `root` against its parent's current world matrix.
    pub fn update_subtree(&mut self, root: NodeHandle) {
        transform_system::update_subtree(&mut self.nodes, root);
    }

    /// Recomputes one node's world matrix, optionally refreshing its ancestors
    /// first and its descendants afterwards.
    pub fn update_world_matrix(
        &mut self,
        handle: NodeHandle,
        update_parents: bool,
        update_children: bool,
    ) -> Result<()> {
        transform_system::update_world_matrix(&mut self.nodes, handle, update_parents, update_children)
    }

    /// Per-frame update: world matrices, then skin bind matrices, then bone
    /// palettes.
    ///
    /// Failures are isolated per node and collected into
    /// [`diagnostics`](Self::diagnostics), which is reset on every call.
    pub fn update(&mut self) {
        self.diagnostics.clear();
        self.update_matrix_world();
        self.update_skin_bindings();
        self.update_skeletons();
    }

    /// Diagnostics of the last [`update`](Self::update).
    #[must_use]
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    fn update_skin_bindings(&mut self) {
        let policy = self.settings.inversion_policy();
        for (handle, node) in &mut self.nodes {
            let world = node.transform.world_matrix;
            let Some(binding) = node.skin_mut() else {
                continue;
            };
            if !self.skeletons.contains_key(binding.skeleton) {
                self.diagnostics.record(
                    handle,
                    ArborError::SkeletonNotFound(format!("{:?}", binding.skeleton)),
                );
                continue;
            }
            if binding.bind_mode == BindMode::Attached {
                match math::invert(&world, policy) {
                    Ok(inverse) => binding.bind_matrix_inverse = inverse,
                    Err(e) => self.diagnostics.record(handle, e),
                }
            }
        }
    }

    pub fn update_skeletons(&mut self) {
        let layout = self.settings.bone_matrix_layout;
        for skeleton in self.skeletons.values_mut() {
            skeleton.update(&self.nodes, layout);
        }
    }

    // ========================================================================
    // World-Space Queries
    // ========================================================================

    fn fresh_world_matrix(&mut self, handle: NodeHandle) -> Result<Mat4> {
        transform_system::update_world_matrix(&mut self.nodes, handle, true, false)?;
        Ok(self.nodes[handle].transform.world_matrix)
    }

    /// World-space position, refreshing the node and its ancestors first.
    pub fn world_position(&mut self, handle: NodeHandle) -> Result<Vec3> {
        Ok(self.fresh_world_matrix(handle)?.w_axis.truncate())
    }

    pub fn world_quaternion(&mut self, handle: NodeHandle) -> Result<Quat> {
        let (_, rotation, _) = math::decompose(&self.fresh_world_matrix(handle)?);
        Ok(rotation)
    }

    pub fn world_scale(&mut self, handle: NodeHandle) -> Result<Vec3> {
        let (_, _, scale) = math::decompose(&self.fresh_world_matrix(handle)?);
        Ok(scale)
    }

    /// Direction of the node's local +Z axis in world space.
    pub fn world_direction(&mut self, handle: NodeHandle) -> Result<Vec3> {
        let world = self.fresh_world_matrix(handle)?;
        Ok(normalize_or(world.z_axis.truncate(), Vec3::Z))
    }

    pub fn local_to_world(&mut self, handle: NodeHandle, point: Vec3) -> Result<Vec3> {
        Ok(self.fresh_world_matrix(handle)?.transform_point3(point))
    }

    pub fn world_to_local(&mut self, handle: NodeHandle, point: Vec3) -> Result<Vec3> {
        let world = self.fresh_world_matrix(handle)?;
        let inverse = math::invert(&world, self.settings.inversion_policy())?;
        Ok(inverse.transform_point3(point))
    }

    /// Rotates the node so its -Z axis points at the world-space `target`.
    pub fn look_at(&mut self, handle: NodeHandle, target: Vec3, up: Vec3) -> Result<()> {
        let world = self.fresh_world_matrix(handle)?;
        let eye = world.w_axis.truncate();
        let mut rotation = math::quat_from_rotation_matrix(&math::look_at(eye, target, up));

        if let Some(parent) = self.nodes[handle].parent {
            let parent_rotation = math::extract_rotation(&self.nodes[parent].transform.world_matrix);
            rotation = math::quat_from_rotation_matrix(&parent_rotation).inverse() * rotation;
        }
        self.nodes[handle].transform.rotation = rotation.normalize();
        Ok(())
    }

    /// World-space box around the node's geometry, and its descendants' when
    /// `recursive`. Uses the current world matrices.
    #[must_use]
    pub fn world_bounding_box(&self, handle: NodeHandle, recursive: bool) -> Option<BoundingBox> {
        let mut combined: Option<BoundingBox> = None;
        let mut add = |node: &Node| {
            let Some(geometry) = node.geometry.and_then(|k| self.geometries.get(k)) else {
                return;
            };
            let local = match geometry.bounding_box() {
                Some(bbox) => bbox,
                None => match compute_bounding_box(geometry) {
                    Ok(bbox) => bbox,
                    Err(e) => {
                        log::warn!("Skipping bounds of '{}': {e}", node.name);
                        return;
                    }
                },
            };
            if local.is_empty() {
                return;
            }
            let world = local.transform(&node.transform.world_matrix);
            combined = Some(match combined {
                Some(existing) => existing.union(&world),
                None => world,
            });
        };

        if recursive {
            self.traverse(handle, |_, node| add(node));
        } else {
            add(self.nodes.get(handle)?);
        }
        combined
    }

    // ========================================================================
    // Resource API
    // ========================================================================

    pub fn add_geometry(&mut self, geometry: impl Into<Geometry>) -> GeometryKey {
        self.geometries.insert(geometry.into())
    }

    pub fn geometry(&self, key: GeometryKey) -> Option<&Geometry> {
        self.geometries.get(key)
    }

    pub fn geometry_mut(&mut self, key: GeometryKey) -> Option<&mut Geometry> {
        self.geometries.get_mut(key)
    }

    /// Removes a geometry; nodes still pointing at it stop resolving it.
    pub fn remove_geometry(&mut self, key: GeometryKey) -> Option<Geometry> {
        self.geometries.remove(key)
    }

    pub fn add_material(&mut self, material: Material) -> MaterialKey {
        self.materials.insert(material)
    }

    pub fn material(&self, key: MaterialKey) -> Option<&Material> {
        self.materials.get(key)
    }

    pub fn material_mut(&mut self, key: MaterialKey) -> Option<&mut Material> {
        self.materials.get_mut(key)
    }

    /// Creates a mesh node at the root.
    pub fn add_mesh(&mut self, geometry: GeometryKey, material: MaterialKey) -> NodeHandle {
        self.add_node(Node::mesh(geometry, material))
    }

    pub fn add_mesh_to_parent(
        &mut self,
        geometry: GeometryKey,
        material: MaterialKey,
        parent: NodeHandle,
    ) -> Result<NodeHandle> {
        self.add_to_parent(Node::mesh(geometry, material), parent)
    }

    /// Recomputes vertex normals with the scene's weighting setting.
    pub fn compute_vertex_normals(&mut self, key: GeometryKey) -> Result<()> {
        let area_weighted = self.settings.area_weighted_normals;
        let geometry = self
            .geometries
            .get_mut(key)
            .ok_or_else(|| ArborError::GeometryNotFound(format!("{key:?}")))?;
        geometry.compute_vertex_normals(area_weighted);
        Ok(())
    }

    // ========================================================================
    // Skeletons & Skinning
    // ========================================================================

    pub fn add_skeleton(&mut self, skeleton: Skeleton) -> SkeletonKey {
        self.skeletons.insert(skeleton)
    }

    pub fn skeleton(&self, key: SkeletonKey) -> Option<&Skeleton> {
        self.skeletons.get(key)
    }

    pub fn skeleton_mut(&mut self, key: SkeletonKey) -> Option<&mut Skeleton> {
        self.skeletons.get_mut(key)
    }

    /// Bone of `skeleton` whose node is named `name`.
    #[must_use]
    pub fn find_bone(&self, skeleton: SkeletonKey, name: &str) -> Option<NodeHandle> {
        self.skeletons.get(skeleton)?.bone_by_name(&self.nodes, name)
    }

    /// Removes a skeleton; meshes still bound to it are reported by the next
    /// [`update`](Self::update).
    pub fn remove_skeleton(&mut self, key: SkeletonKey) -> Option<Skeleton> {
        self.skeletons.remove(key)
    }

    /// Creates a skeleton over `bones`.
    ///
    /// Without `bone_inverses`, each inverse is taken from the bone's current
    /// world matrix, so the present pose becomes the bind pose.
    pub fn create_skeleton(
        &mut self,
        name: &str,
        bones: Vec<Option<NodeHandle>>,
        bone_inverses: Option<Vec<Mat4>>,
    ) -> Result<SkeletonKey> {
        let derive_inverses = bone_inverses.is_none();
        let mut skeleton = Skeleton::new(name, bones, bone_inverses)?;

        if derive_inverses {
            for &bone in skeleton.bones.iter().flatten() {
                transform_system::update_world_matrix(&mut self.nodes, bone, true, false)?;
            }
            skeleton.calculate_inverses(&self.nodes, self.settings.inversion_policy())?;
        }
        Ok(self.skeletons.insert(skeleton))
    }

    /// Turns a mesh node into a skinned mesh driven by `skeleton`.
    ///
    /// Without `bind_matrix`, the mesh's current world matrix is used.
    pub fn bind_skeleton(
        &mut self,
        mesh: NodeHandle,
        skeleton: SkeletonKey,
        bind_matrix: Option<Mat4>,
    ) -> Result<()> {
        let node = self.nodes.get(mesh).ok_or_else(|| node_not_found(mesh))?;
        if !node.is_mesh() {
            return Err(ArborError::NotASkinnedMesh(format!("{mesh:?}")));
        }
        if !self.skeletons.contains_key(skeleton) {
            return Err(ArborError::SkeletonNotFound(format!("{skeleton:?}")));
        }

        let bind_matrix = match bind_matrix {
            Some(m) => m,
            None => self.fresh_world_matrix(mesh)?,
        };
        let binding = SkinBinding::new(skeleton, bind_matrix, self.settings.inversion_policy())?;
        self.nodes[mesh].kind = NodeKind::SkinnedMesh(binding);
        Ok(())
    }

    pub fn set_bind_mode(&mut self, mesh: NodeHandle, mode: BindMode) -> Result<()> {
        let node = self.nodes.get_mut(mesh).ok_or_else(|| node_not_found(mesh))?;
        let binding = node
            .skin_mut()
            .ok_or_else(|| ArborError::NotASkinnedMesh(format!("{mesh:?}")))?;
        binding.bind_mode = mode;
        Ok(())
    }

    /// Resets the bones of a skinned mesh's skeleton to the bind pose.
    pub fn pose(&mut self, mesh: NodeHandle) -> Result<()> {
        let key = self.skin_of(mesh)?.skeleton;
        let skeleton = self
            .skeletons
            .get(key)
            .ok_or_else(|| ArborError::SkeletonNotFound(format!("{key:?}")))?;
        skeleton.pose(&mut self.nodes, self.settings.inversion_policy())
    }

    fn skin_of(&self, mesh: NodeHandle) -> Result<&SkinBinding> {
        let node = self.nodes.get(mesh).ok_or_else(|| node_not_found(mesh))?;
        node.skin()
            .ok_or_else(|| ArborError::NotASkinnedMesh(format!("{mesh:?}")))
    }

    fn geometry_of(&self, node: NodeHandle) -> Result<GeometryKey> {
        let n = self.nodes.get(node).ok_or_else(|| node_not_found(node))?;
        let key = n
            .geometry
            .ok_or_else(|| ArborError::GeometryNotFound(format!("node {node:?} has no geometry")))?;
        if self.geometries.contains_key(key) {
            Ok(key)
        } else {
            Err(ArborError::GeometryNotFound(format!("{key:?}")))
        }
    }

    /// Normalizes the skin weights of a skinned mesh's geometry so each vertex
    /// sums to one.
    pub fn normalize_skin_weights(&mut self, mesh: NodeHandle) -> Result<()> {
        self.skin_of(mesh)?;
        let key = self.geometry_of(mesh)?;
        match &mut self.geometries[key] {
            Geometry::Face(g) => g.normalize_skin_weights(),
            Geometry::Buffer(g) => g.normalize_skin_weights(),
        }
        Ok(())
    }

    /// Position of vertex `index` of a skinned mesh after skinning, in the
    /// mesh's local space. Reads the current world matrices.
    pub fn skinned_vertex_position(&self, mesh: NodeHandle, index: usize) -> Result<Vec3> {
        let binding = self.skin_of(mesh)?;
        let key = self.geometry_of(mesh)?;
        let geometry = &self.geometries[key];
        let skeleton = self
            .skeletons
            .get(binding.skeleton)
            .ok_or_else(|| ArborError::SkeletonNotFound(format!("{:?}", binding.skeleton)))?;

        let count = geometry.vertex_count();
        if index >= count {
            return Err(ArborError::IndexOutOfRange {
                context: "skinned vertex".to_string(),
                index,
                len: count,
            });
        }
        let skin_index = geometry
            .skin_attribute(attr::SKIN_INDEX, index)
            .ok_or_else(|| ArborError::MissingAttribute(attr::SKIN_INDEX.to_string()))?;
        let skin_weight = geometry
            .skin_attribute(attr::SKIN_WEIGHT, index)
            .ok_or_else(|| ArborError::MissingAttribute(attr::SKIN_WEIGHT.to_string()))?;

        let bound = binding.bind_matrix.transform_point3(geometry.position_at(index));
        let mut skinned = Vec3::ZERO;
        for (bone, weight) in skin_index.to_array().into_iter().zip(skin_weight.to_array()) {
            if weight == 0.0 {
                continue;
            }
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let offset = skeleton.bone_offset(&self.nodes, bone as usize)?;
            skinned += offset.transform_point3(bound) * weight;
        }
        Ok(binding.bind_matrix_inverse.transform_point3(skinned))
    }
}

/// Fluent node construction.
///
/// ```rust,ignore
/// let handle = scene
///     .build_node("Crate")
///     .with_position(0.0, 1.0, 0.0)
///     .with_geometry(geometry)
///     .with_material(material)
///     .build()?;
/// ```
pub struct NodeBuilder<'a> {
    scene: &'a mut Scene,
    node: Node,
    parent: Option<NodeHandle>,
}

impl<'a> NodeBuilder<'a> {
    pub fn new(scene: &'a mut Scene, name: &str) -> Self {
        Self {
            scene,
            node: Node::new().with_name(name),
            parent: None,
        }
    }

    // === Chained Configuration ===

    #[must_use]
    pub fn with_kind(mut self, kind: NodeKind) -> Self {
        self.node.kind = kind;
        self
    }

    #[must_use]
    pub fn with_position(mut self, x: f32, y: f32, z: f32) -> Self {
        self.node.transform.position = Vec3::new(x, y, z);
        self
    }

    #[must_use]
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.node.transform.rotation = rotation;
        self
    }

    #[must_use]
    pub fn with_scale(mut self, s: f32) -> Self {
        self.node.transform.scale = Vec3::splat(s);
        self
    }

    #[must_use]
    pub fn with_parent(mut self, parent: NodeHandle) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Attaches a geometry; a group node becomes a mesh.
    #[must_use]
    pub fn with_geometry(mut self, geometry: GeometryKey) -> Self {
        self.node.geometry = Some(geometry);
        if self.node.kind == NodeKind::Group {
            self.node.kind = NodeKind::Mesh;
        }
        self
    }

    #[must_use]
    pub fn with_material(mut self, material: MaterialKey) -> Self {
        self.node.materials.push(material);
        self
    }

    #[must_use]
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.node.visible = visible;
        self
    }

    // === Finish ===

    /// Inserts the node, under the parent if one was given.
    pub fn build(self) -> Result<NodeHandle> {
        match self.parent {
            Some(parent) => self.scene.add_to_parent(self.node, parent),
            None => Ok(self.scene.add_node(self.node)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_rejects_descendant() {
        let mut scene = Scene::new();
        let a = scene.create_node();
        let b = scene.add_to_parent(Node::new(), a).unwrap();
        let c = scene.add_to_parent(Node::new(), b).unwrap();

        assert!(matches!(scene.attach(a, c), Err(ArborError::HierarchyCycle { .. })));
        assert!(matches!(scene.attach(a, a), Err(ArborError::HierarchyCycle { .. })));
        assert_eq!(scene.get_node(c).unwrap().parent(), Some(b));
        assert_eq!(scene.root_nodes(), &[a]);
    }

    #[test]
    fn reattach_moves_instead_of_cloning() {
        let mut scene = Scene::new();
        let a = scene.create_node();
        let b = scene.create_node();
        let child = scene.add_to_parent(Node::new(), a).unwrap();

        scene.attach(child, b).unwrap();
        assert!(scene.get_node(a).unwrap().children().is_empty());
        assert_eq!(scene.get_node(b).unwrap().children(), &[child]);
        assert_eq!(scene.get_node(child).unwrap().parent(), Some(b));
    }

    #[test]
    fn remove_drops_subtree() {
        let mut scene = Scene::new();
        let a = scene.create_node();
        let b = scene.add_to_parent(Node::new(), a).unwrap();
        let c = scene.add_to_parent(Node::new(), b).unwrap();

        scene.remove_node(b).unwrap();
        assert!(scene.get_node(b).is_none());
        assert!(scene.get_node(c).is_none());
        assert!(scene.get_node(a).unwrap().children().is_empty());
        assert_eq!(scene.node_count(), 1);
    }

    #[test]
    fn keep_world_under_collapsed_parent_warns_and_continues() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut scene = Scene::new();
        let parent = scene.create_node();
        let child = scene.create_node();
        scene.get_node_mut(parent).unwrap().transform.scale = glam::Vec3::ZERO;

        scene.attach_keep_world(child, parent).unwrap();
        assert_eq!(scene.get_node(child).unwrap().parent(), Some(parent));
        assert_eq!(*scene.get_node(child).unwrap().local_matrix(), glam::Mat4::IDENTITY);
    }
}
