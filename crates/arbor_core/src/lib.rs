//! Arbor Core
//!
//! Foundation types shared by every Arbor crate:
//!
//! - [`math`]: matrix/quaternion/Euler kernel on top of `glam`
//! - [`bounds`]: [`BoundingBox`] and [`BoundingSphere`]
//! - [`ray`] and [`triangle`]: intersection primitives
//! - [`errors`]: [`ArborError`] and the crate-wide [`Result`]

pub mod bounds;
pub mod errors;
pub mod math;
pub mod ray;
pub mod triangle;

pub use bounds::{BoundingBox, BoundingSphere};
pub use errors::{ArborError, Result};
pub use math::{Euler, EulerOrder, InversionPolicy, MathSettings};
pub use ray::{Ray, SegmentDistance};

pub use glam;
