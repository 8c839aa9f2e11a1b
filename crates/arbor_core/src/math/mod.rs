//! Linear-algebra kernel.
//!
//! Storage and basic arithmetic come from `glam`; this module adds the
//! operations whose exact behaviour the scene graph depends on:
//! - [`compose`] / [`decompose`] of affine TRS matrices (mirror-aware)
//! - [`Euler`] extraction for all six rotation orders, with gimbal-lock fallbacks
//! - trace-based [`quat_from_rotation_matrix`]
//! - [`look_at`] with a degenerate-up fallback
//! - policy-driven [`invert`] (see [`InversionPolicy`])

pub mod euler;
pub mod matrix;
pub mod policy;

pub use euler::{Euler, EulerOrder};
pub use matrix::{
    compose, decompose, extract_rotation, is_affine, look_at, max_scale_on_axis,
    quat_from_rotation_matrix, quat_from_unit_vectors, rotation_from_euler, rotation_from_quat,
};
pub use policy::{
    InversionPolicy, MathSettings, invert, invert_mat3, normal_matrix, normalize_or, try_normalize,
};
