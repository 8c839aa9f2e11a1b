use arbor_core::{InversionPolicy, MathSettings};
use serde::{Deserialize, Serialize};

use crate::skeleton::BoneMatrixLayout;

/// Scene-wide configuration.
///
/// Built with struct-update syntax or loaded from JSON:
///
/// ```rust,ignore
/// let settings = SceneSettings {
///     bone_matrix_layout: BoneMatrixLayout::ColumnMajor,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneSettings {
    pub math: MathSettings,
    /// Element order of each 4x4 block in [`Skeleton::bone_matrices`](crate::Skeleton::bone_matrices).
    pub bone_matrix_layout: BoneMatrixLayout,
    /// Weight face contributions by area when recomputing vertex normals.
    pub area_weighted_normals: bool,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            math: MathSettings::default(),
            bone_matrix_layout: BoneMatrixLayout::default(),
            area_weighted_normals: true,
        }
    }
}

impl SceneSettings {
    #[inline]
    #[must_use]
    pub fn inversion_policy(&self) -> InversionPolicy {
        self.math.inversion_policy
    }
}
