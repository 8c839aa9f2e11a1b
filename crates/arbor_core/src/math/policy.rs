//! Degenerate-input policy.
//!
//! Every matrix inversion in Arbor goes through [`invert`] with the policy taken
//! from [`MathSettings`], so a host picks one behaviour for the whole core instead
//! of each call site deciding on its own.

use glam::{Mat3, Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::errors::{ArborError, Result};

/// What to do when a matrix cannot be inverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InversionPolicy {
    /// Return [`ArborError::SingularMatrix`] to the caller.
    Error,
    /// Log a warning and substitute the identity matrix.
    #[default]
    WarnIdentity,
}

/// Numeric settings shared by the math kernel.
///
/// ```rust,ignore
/// let settings = MathSettings {
///     inversion_policy: InversionPolicy::Error,
/// };
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MathSettings {
    pub inversion_policy: InversionPolicy,
}

#[inline]
fn is_invertible(det: f32) -> bool {
    det.is_finite() && det.abs() > 0.0
}

/// Inverts `m` according to `policy`.
///
/// A zero or non-finite determinant, or an inverse that overflows to a non-finite
/// value, is treated as singular. The result is never NaN-poisoned.
pub fn invert(m: &Mat4, policy: InversionPolicy) -> Result<Mat4> {
    let determinant = m.determinant();
    if is_invertible(determinant) {
        let inverse = m.inverse();
        if inverse.is_finite() {
            return Ok(inverse);
        }
    }

    match policy {
        InversionPolicy::Error => Err(ArborError::SingularMatrix { determinant }),
        InversionPolicy::WarnIdentity => {
            log::warn!("Matrix4 inversion failed (determinant {determinant}), substituting identity");
            Ok(Mat4::IDENTITY)
        }
    }
}

/// Inverts a 3x3 matrix according to `policy`.
pub fn invert_mat3(m: &Mat3, policy: InversionPolicy) -> Result<Mat3> {
    let determinant = m.determinant();
    if is_invertible(determinant) {
        let inverse = m.inverse();
        if inverse.is_finite() {
            return Ok(inverse);
        }
    }

    match policy {
        InversionPolicy::Error => Err(ArborError::SingularMatrix { determinant }),
        InversionPolicy::WarnIdentity => {
            log::warn!("Matrix3 inversion failed (determinant {determinant}), substituting identity");
            Ok(Mat3::IDENTITY)
        }
    }
}

/// Normal matrix of `m`: the inverse-transpose of its upper 3x3 block.
pub fn normal_matrix(m: &Mat4, policy: InversionPolicy) -> Result<Mat3> {
    Ok(invert_mat3(&Mat3::from_mat4(*m), policy)?.transpose())
}

/// Normalizes `v`, returning `fallback` when `v` has zero or non-finite length.
#[inline]
#[must_use]
pub fn normalize_or(v: Vec3, fallback: Vec3) -> Vec3 {
    let len_sq = v.length_squared();
    if len_sq > 0.0 && len_sq.is_finite() {
        v / len_sq.sqrt()
    } else {
        fallback
    }
}

/// Normalizes `v` under `policy`: an error for zero length, or a warning and `Vec3::ZERO`.
pub fn try_normalize(v: Vec3, context: &'static str, policy: InversionPolicy) -> Result<Vec3> {
    let len_sq = v.length_squared();
    if len_sq > 0.0 && len_sq.is_finite() {
        return Ok(v / len_sq.sqrt());
    }
    match policy {
        InversionPolicy::Error => Err(ArborError::ZeroLengthVector { context }),
        InversionPolicy::WarnIdentity => {
            log::warn!("Zero-length normalization ({context}), substituting zero vector");
            Ok(Vec3::ZERO)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singular_matrix_error_policy() {
        let m = Mat4::from_scale(Vec3::new(1.0, 0.0, 1.0));
        let err = invert(&m, InversionPolicy::Error).unwrap_err();
        assert!(err.is_degenerate_input());
    }

    #[test]
    fn singular_matrix_warn_policy_returns_identity() {
        let _ = env_logger::builder().is_test(true).try_init();
        let m = Mat4::from_scale(Vec3::ZERO);
        let inv = invert(&m, InversionPolicy::WarnIdentity).unwrap();
        assert_eq!(inv, Mat4::IDENTITY);
    }

    #[test]
    fn regular_inverse_round_trips() {
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let inv = invert(&m, InversionPolicy::Error).unwrap();
        assert!((m * inv).abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }

    #[test]
    fn settings_load_from_json() {
        let settings: MathSettings = serde_json::from_str(r#"{"inversion_policy":"Error"}"#).unwrap();
        assert_eq!(settings.inversion_policy, InversionPolicy::Error);

        let settings: MathSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, MathSettings::default());
    }

    #[test]
    fn normalize_zero_falls_back() {
        assert_eq!(normalize_or(Vec3::ZERO, Vec3::Z), Vec3::Z);
        assert!(try_normalize(Vec3::ZERO, "test", InversionPolicy::Error).is_err());
    }
}
