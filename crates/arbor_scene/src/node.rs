use std::sync::atomic::{AtomicU32, Ordering};

use glam::Mat4;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use uuid::Uuid;

use crate::skeleton::SkinBinding;
use crate::transform::Transform;
use crate::{GeometryKey, MaterialKey, NodeHandle};

static NEXT_NODE_ID: AtomicU32 = AtomicU32::new(1);

/// How a line node reads its index stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineMode {
    /// Consecutive indices form a connected polyline (stride 1).
    #[default]
    Strip,
    /// Index pairs form independent segments (stride 2).
    Segments,
}

/// What a node represents, and therefore how it is ray cast.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum NodeKind {
    #[default]
    Group,
    Mesh,
    SkinnedMesh(SkinBinding),
    Bone,
    Line(LineMode),
    Points,
}

/// A scene graph node.
///
/// # Hierarchy
///
/// Nodes form a strict tree:
/// - `parent`: non-owning handle to the parent (None for root nodes)
/// - `children`: ordered list of child handles, owned by this node
///
/// Both sides are kept in sync by [`Scene`](crate::Scene); a child is never
/// listed under two parents.
///
/// # Transform
///
/// Each node has a [`Transform`] with its local TRS and the cached local and
/// world matrices, refreshed by the [`transform_system`](crate::transform_system).
#[derive(Debug)]
pub struct Node {
    // === Identity ===
    id: u32,
    uuid: Uuid,
    pub name: String,

    // === Core Hierarchy ===
    pub(crate) parent: Option<NodeHandle>,
    pub(crate) children: Vec<NodeHandle>,

    // === Core Spatial Data ===
    pub transform: Transform,

    // === Core State ===
    pub visible: bool,
    pub kind: NodeKind,

    // === Attachments ===
    pub geometry: Option<GeometryKey>,
    /// One material, or one per geometry group.
    pub materials: SmallVec<[MaterialKey; 1]>,
    pub morph_target_influences: Vec<f32>,
    pub user_data: FxHashMap<String, serde_json::Value>,
}

impl Node {
    /// Creates a group node with an identity transform.
    #[must_use]
    pub fn new() -> Self {
        Self::with_kind(NodeKind::Group)
    }

    #[must_use]
    pub fn with_kind(kind: NodeKind) -> Self {
        Self {
            id: NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed),
            uuid: Uuid::new_v4(),
            name: String::new(),
            parent: None,
            children: Vec::new(),
            transform: Transform::new(),
            visible: true,
            kind,
            geometry: None,
            materials: SmallVec::new(),
            morph_target_influences: Vec::new(),
            user_data: FxHashMap::default(),
        }
    }

    #[must_use]
    pub fn mesh(geometry: GeometryKey, material: MaterialKey) -> Self {
        let mut node = Self::with_kind(NodeKind::Mesh);
        node.geometry = Some(geometry);
        node.materials.push(material);
        node
    }

    #[must_use]
    pub fn line(geometry: GeometryKey, mode: LineMode) -> Self {
        let mut node = Self::with_kind(NodeKind::Line(mode));
        node.geometry = Some(geometry);
        node
    }

    #[must_use]
    pub fn points(geometry: GeometryKey) -> Self {
        let mut node = Self::with_kind(NodeKind::Points);
        node.geometry = Some(geometry);
        node
    }

    #[must_use]
    pub fn bone() -> Self {
        Self::with_kind(NodeKind::Bone)
    }

    #[must_use]
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Process-wide numeric id, stable for the node's lifetime.
    #[inline]
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Returns the parent node handle, if any.
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    /// Returns a read-only slice of child node handles.
    #[inline]
    #[must_use]
    pub fn children(&self) -> &[NodeHandle] {
        &self.children
    }

    /// World matrix as of the last update pass.
    #[inline]
    #[must_use]
    pub fn world_matrix(&self) -> &Mat4 {
        &self.transform.world_matrix
    }

    #[inline]
    #[must_use]
    pub fn local_matrix(&self) -> &Mat4 {
        &self.transform.local_matrix
    }

    #[inline]
    #[must_use]
    pub fn is_bone(&self) -> bool {
        matches!(self.kind, NodeKind::Bone)
    }

    /// Mesh or skinned mesh.
    #[inline]
    #[must_use]
    pub fn is_mesh(&self) -> bool {
        matches!(self.kind, NodeKind::Mesh | NodeKind::SkinnedMesh(_))
    }

    #[must_use]
    pub fn skin(&self) -> Option<&SkinBinding> {
        match &self.kind {
            NodeKind::SkinnedMesh(binding) => Some(binding),
            _ => None,
        }
    }

    pub fn skin_mut(&mut self) -> Option<&mut SkinBinding> {
        match &mut self.kind {
            NodeKind::SkinnedMesh(binding) => Some(binding),
            _ => None,
        }
    }

    /// Material for geometry group `material_index`; single-material nodes
    /// use their only material for every group.
    #[must_use]
    pub fn material_for(&self, material_index: usize) -> Option<MaterialKey> {
        if self.materials.len() > 1 {
            self.materials.get(material_index).copied()
        } else {
            self.materials.first().copied()
        }
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = Node::new();
        let b = Node::new();
        assert_ne!(a.id(), b.id());
        assert_ne!(a.uuid(), b.uuid());
    }
}
