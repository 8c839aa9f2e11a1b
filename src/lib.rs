//! # Arbor
//!
//! Transform-and-geometry core of a retained-mode 3D scene graph.
//!
//! - [`core`]: math kernel, bounding volumes, rays, errors
//! - [`resources`]: face and buffer geometry, conversion, materials, primitives
//! - [`scene`]: node hierarchy, world-matrix propagation, skeletons, ray casting
//!
//! ```rust,ignore
//! use arbor::prelude::*;
//!
//! let mut scene = Scene::new();
//! let geometry = scene.add_geometry(create_box(1.0, 1.0, 1.0));
//! let material = scene.add_material(Material::new());
//! let mesh = scene.add_mesh(geometry, material);
//! scene.update();
//!
//! let raycaster = Raycaster::from_origin_direction(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z);
//! let hits = raycaster.intersect_object(&scene, mesh, true);
//! ```

pub use arbor_core as core;
pub use arbor_resources as resources;
pub use arbor_scene as scene;

pub use arbor_core::{
    ArborError, BoundingBox, BoundingSphere, Euler, EulerOrder, InversionPolicy, MathSettings,
    Ray, Result,
};
pub use arbor_resources::primitives::{
    PlaneOptions, SphereOptions, create_box, create_plane, create_sphere,
};
pub use arbor_resources::{
    BufferAttribute, BufferGeometry, DirectGeometry, Face3, FaceGeometry, Geometry, GeometryGroup,
    Material, MeshAccess, Side,
};
pub use arbor_scene::{
    BindMode, BoneMatrixLayout, Diagnostics, GeometryKey, Intersection, LineMode, MaterialKey,
    Node, NodeHandle, NodeKind, RaycastParams, Raycaster, Scene, SceneSettings, Skeleton,
    SkeletonKey, SkinBinding, Transform,
};

pub use glam;

/// Everything needed to build, update and query a scene.
pub mod prelude {
    pub use crate::{
        ArborError, BindMode, BoneMatrixLayout, BoundingBox, BoundingSphere, BufferAttribute,
        BufferGeometry, Euler, EulerOrder, Face3, FaceGeometry, Geometry, InversionPolicy,
        LineMode, Material, MeshAccess, Node, NodeHandle, NodeKind, Ray, Raycaster, Scene,
        SceneSettings, Side, create_box, create_plane, create_sphere,
    };
    pub use arbor_resources::attr;
    pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
}
