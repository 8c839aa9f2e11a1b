//! Arbor Resources
//!
//! The geometry model of the scene core and the few resources it reads:
//!
//! - [`FaceGeometry`]: shared-vertex face mesh authored by loaders and builders
//! - [`BufferGeometry`]: flat attribute buffers consumed by the renderer
//! - [`DirectGeometry`]: per-corner pivot used to convert the former into the latter
//! - [`MeshAccess`] / [`Geometry`]: one read interface over both forms
//! - [`Material`] / [`Side`]: the culling side used by ray casts
//! - [`primitives`]: procedural box, plane and sphere

pub mod accessor;
pub mod buffer_geometry;
pub mod convert;
pub mod face_geometry;
pub mod material;
pub mod primitives;
pub mod skinning;

pub use accessor::{Geometry, MeshAccess};
pub use buffer_geometry::{BufferAttribute, BufferGeometry, GeometryGroup, attr};
pub use convert::DirectGeometry;
pub use face_geometry::{Face3, FaceGeometry, MorphNormals, MorphTarget};
pub use material::{Material, Side};
pub use skinning::normalize_skin_weight;
