use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which triangle windings are considered visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Side {
    /// Counter-clockwise triangles only.
    #[default]
    Front,
    /// Clockwise triangles only.
    Back,
    Double,
}

/// Material as seen by the scene core.
///
/// Shading parameters live with the renderer; the core only needs the face
/// culling side (for ray casts) and a visibility switch.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub uuid: Uuid,
    pub name: String,
    pub side: Side,
    /// Hidden materials are skipped by ray casts that only want visible geometry.
    pub visible: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self::new()
    }
}

impl Material {
    #[must_use]
    pub fn new() -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: String::new(),
            side: Side::Front,
            visible: true,
        }
    }

    #[must_use]
    pub fn with_side(mut self, side: Side) -> Self {
        self.side = side;
        self
    }

    #[must_use]
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }
}
