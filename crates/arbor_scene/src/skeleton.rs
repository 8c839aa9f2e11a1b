use arbor_core::errors::{ArborError, Result};
use arbor_core::math::{self, InversionPolicy};
use glam::Mat4;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use uuid::Uuid;

use crate::node::Node;
use crate::{NodeHandle, SkeletonKey};

/// Element order of each 16-float block in the flattened bone palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BoneMatrixLayout {
    /// Row by row.
    #[default]
    RowMajor,
    /// Column by column (glam's native order).
    ColumnMajor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BindMode {
    /// The bind matrix follows the mesh's live world matrix every frame
    /// (the common case for character skinning).
    #[default]
    Attached,
    /// The bind matrix is frozen at bind time.
    Detached,
}

/// Links a skinned mesh node to a skeleton.
#[derive(Debug, Clone, PartialEq)]
pub struct SkinBinding {
    pub skeleton: SkeletonKey,
    pub bind_mode: BindMode,
    /// World matrix of the mesh at bind time.
    pub bind_matrix: Mat4,
    pub bind_matrix_inverse: Mat4,
}

impl SkinBinding {
    /// Binds with `bind_matrix`, inverting it under `policy`.
    pub fn new(skeleton: SkeletonKey, bind_matrix: Mat4, policy: InversionPolicy) -> Result<Self> {
        Ok(Self {
            skeleton,
            bind_mode: BindMode::Attached,
            bind_matrix,
            bind_matrix_inverse: math::invert(&bind_matrix, policy)?,
        })
    }
}

/// Ordered bones and their inverse bind matrices.
///
/// `bones[i]` pairs with `bone_inverses[i]` and fills the `i`-th 4x4 block of
/// the bone palette. A bone slot may be empty (or point at a removed node), in
/// which case the identity stands in for its world matrix.
#[derive(Debug, Clone)]
pub struct Skeleton {
    pub uuid: Uuid,
    pub name: String,

    // === Core Data ===
    pub(crate) bones: Vec<Option<NodeHandle>>,
    pub(crate) bone_inverses: Vec<Mat4>,

    // === Runtime Data ===
    /// `bone.world * inverse` per bone, refreshed by `update`.
    pub(crate) bone_offsets: Vec<Mat4>,
    /// Flattened `bone_offsets`, ready for upload.
    pub(crate) bone_matrices: Vec<f32>,
}

impl Skeleton {
    /// Creates a skeleton from bones and their inverse bind matrices.
    ///
    /// Without `bone_inverses` every inverse starts as the identity; call
    /// [`calculate_inverses`](Self::calculate_inverses) (or create it through
    /// [`Scene::create_skeleton`](crate::Scene::create_skeleton)) to derive them
    /// from the current pose.
    pub fn new(
        name: &str,
        bones: Vec<Option<NodeHandle>>,
        bone_inverses: Option<Vec<Mat4>>,
    ) -> Result<Self> {
        let count = bones.len();
        let bone_inverses = match bone_inverses {
            Some(inverses) if inverses.len() != count => {
                return Err(ArborError::BoneInverseMismatch {
                    bones: count,
                    inverses: inverses.len(),
                });
            }
            Some(inverses) => inverses,
            None => vec![Mat4::IDENTITY; count],
        };

        Ok(Self {
            uuid: Uuid::new_v4(),
            name: name.to_string(),
            bones,
            bone_inverses,
            bone_offsets: vec![Mat4::IDENTITY; count],
            bone_matrices: vec![0.0; count * 16],
        })
    }

    #[inline]
    #[must_use]
    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    #[inline]
    #[must_use]
    pub fn bones(&self) -> &[Option<NodeHandle>] {
        &self.bones
    }

    #[inline]
    #[must_use]
    pub fn bone_inverses(&self) -> &[Mat4] {
        &self.bone_inverses
    }

    /// Per-bone skinning matrices from the last `update`.
    #[inline]
    #[must_use]
    pub fn bone_offsets(&self) -> &[Mat4] {
        &self.bone_offsets
    }

    /// Flat bone palette, 16 floats per bone.
    #[inline]
    #[must_use]
    pub fn bone_matrices(&self) -> &[f32] {
        &self.bone_matrices
    }

    /// Bone palette as raw bytes for the rendering backend.
    #[inline]
    #[must_use]
    pub fn bone_matrices_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.bone_matrices)
    }

    fn bone_world(&self, nodes: &SlotMap<NodeHandle, Node>, index: usize) -> Mat4 {
        self.bones[index]
            .and_then(|h| nodes.get(h))
            .map_or(Mat4::IDENTITY, |n| n.transform.world_matrix)
    }

    /// Live skinning matrix of bone `index`, read from the current world
    /// matrices rather than the last `update`.
    pub fn bone_offset(&self, nodes: &SlotMap<NodeHandle, Node>, index: usize) -> Result<Mat4> {
        if index >= self.bones.len() {
            return Err(ArborError::IndexOutOfRange {
                context: format!("bone of skeleton '{}'", self.name),
                index,
                len: self.bones.len(),
            });
        }
        Ok(self.bone_world(nodes, index) * self.bone_inverses[index])
    }

    /// Derives every inverse bind matrix from the bones' current world matrices.
    pub fn calculate_inverses(
        &mut self,
        nodes: &SlotMap<NodeHandle, Node>,
        policy: InversionPolicy,
    ) -> Result<()> {
        let inverses = (0..self.bones.len())
            .map(|i| math::invert(&self.bone_world(nodes, i), policy))
            .collect::<Result<Vec<_>>>()?;
        self.bone_inverses = inverses;
        Ok(())
    }

    /// Puts every bone back into its bind pose.
    ///
    /// World matrices are restored from the inverse bind matrices, then each
    /// bone's local TRS is rebuilt from `parent.world⁻¹ * world`, or `world`
    /// when the parent is not a bone.
    pub fn pose(&self, nodes: &mut SlotMap<NodeHandle, Node>, policy: InversionPolicy) -> Result<()> {
        for (bone, inverse) in self.bones.iter().zip(&self.bone_inverses) {
            let Some(node) = bone.and_then(|h| nodes.get_mut(h)) else {
                continue;
            };
            node.transform.world_matrix = math::invert(inverse, policy)?;
        }

        for &bone in self.bones.iter().flatten() {
            let Some(node) = nodes.get(bone) else {
                continue;
            };
            let world = node.transform.world_matrix;
            let parent_bone_world = node
                .parent
                .and_then(|p| nodes.get(p))
                .filter(|p| p.is_bone())
                .map(|p| p.transform.world_matrix);

            let local = match parent_bone_world {
                Some(parent_world) => math::invert(&parent_world, policy)? * world,
                None => world,
            };

            if let Some(node) = nodes.get_mut(bone) {
                node.transform.set_local_matrix(local);
            }
        }
        Ok(())
    }

    /// Refreshes the bone offsets and the flat palette from the current world
    /// matrices.
    pub fn update(&mut self, nodes: &SlotMap<NodeHandle, Node>, layout: BoneMatrixLayout) {
        for i in 0..self.bones.len() {
            self.bone_offsets[i] = self.bone_world(nodes, i) * self.bone_inverses[i];
        }

        match layout {
            BoneMatrixLayout::ColumnMajor => {
                self.bone_matrices
                    .copy_from_slice(bytemuck::cast_slice(&self.bone_offsets));
            }
            BoneMatrixLayout::RowMajor => {
                for (block, offset) in self.bone_matrices.chunks_exact_mut(16).zip(&self.bone_offsets) {
                    block.copy_from_slice(&offset.transpose().to_cols_array());
                }
            }
        }
    }

    /// First bone whose node is named `name`.
    #[must_use]
    pub fn bone_by_name(&self, nodes: &SlotMap<NodeHandle, Node>, name: &str) -> Option<NodeHandle> {
        self.bones
            .iter()
            .flatten()
            .copied()
            .find(|&h| nodes.get(h).is_some_and(|n| n.name == name))
    }
}
