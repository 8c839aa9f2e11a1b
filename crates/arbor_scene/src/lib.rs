//! Arbor Scene
//!
//! The spatial half of the scene core:
//!
//! - [`Node`] / [`Transform`]: hierarchy entries with TRS, local and world matrices
//! - [`transform_system`]: dirty-flag driven world-matrix propagation
//! - [`Scene`]: arenas for nodes, geometries, materials and skeletons
//! - [`Skeleton`] / [`SkinBinding`]: bone palettes and bind matrices
//! - [`Raycaster`]: picking against meshes, lines and point clouds
//! - [`Diagnostics`]: per-node failures collected during update and queries

pub mod diagnostics;
pub mod node;
pub mod raycaster;
pub mod scene;
pub mod settings;
pub mod skeleton;
pub mod transform;
pub mod transform_system;

pub use diagnostics::{Diagnostic, Diagnostics};
pub use node::{LineMode, Node, NodeKind};
pub use raycaster::{FaceHit, Intersection, RaycastParams, Raycaster};
pub use scene::Scene;
pub use settings::SceneSettings;
pub use skeleton::{BindMode, BoneMatrixLayout, Skeleton, SkinBinding};
pub use transform::Transform;

use slotmap::new_key_type;

new_key_type! {
    /// Handle of a node in [`Scene`]. Stale after the node is removed.
    pub struct NodeHandle;
    pub struct GeometryKey;
    pub struct MaterialKey;
    pub struct SkeletonKey;
}
