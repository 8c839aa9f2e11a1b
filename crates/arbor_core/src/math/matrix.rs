//! Matrix4 composition, decomposition and orientation helpers.
//!
//! All matrices are glam `Mat4` values in column-major order. Elements are read
//! with the `mRC` (row, column) naming used by most graphics texts, so `m12` is
//! row 1, column 2 and lives at `to_cols_array()[4]`.

use glam::{Mat4, Quat, Vec3, Vec4};

use super::euler::Euler;

const DEGENERATE_SCALE: f32 = 1e-12;

/// Builds an affine matrix from translation, rotation and scale.
///
/// The result applies scale first, then rotation, then translation. The last
/// row is always `[0, 0, 0, 1]`.
#[must_use]
pub fn compose(position: Vec3, quaternion: Quat, scale: Vec3) -> Mat4 {
    let (x, y, z, w) = (quaternion.x, quaternion.y, quaternion.z, quaternion.w);
    let (x2, y2, z2) = (x + x, y + y, z + z);
    let (xx, xy, xz) = (x * x2, x * y2, x * z2);
    let (yy, yz, zz) = (y * y2, y * z2, z * z2);
    let (wx, wy, wz) = (w * x2, w * y2, w * z2);
    let Vec3 { x: sx, y: sy, z: sz } = scale;

    Mat4::from_cols(
        Vec4::new((1.0 - (yy + zz)) * sx, (xy + wz) * sx, (xz - wy) * sx, 0.0),
        Vec4::new((xy - wz) * sy, (1.0 - (xx + zz)) * sy, (yz + wx) * sy, 0.0),
        Vec4::new((xz + wy) * sz, (yz - wx) * sz, (1.0 - (xx + yy)) * sz, 0.0),
        Vec4::new(position.x, position.y, position.z, 1.0),
    )
}

/// Splits an affine matrix into `(translation, rotation, scale)`.
///
/// Scale is the length of each basis column. A mirrored matrix (negative
/// determinant) gets its x scale negated so that the remaining rotation is
/// proper. An axis with zero scale leaves its rotation column at zero; if that
/// makes the rotation unrecoverable the identity quaternion is returned instead
/// of a degenerate one.
#[must_use]
pub fn decompose(m: &Mat4) -> (Vec3, Quat, Vec3) {
    let mut sx = m.x_axis.truncate().length();
    let sy = m.y_axis.truncate().length();
    let sz = m.z_axis.truncate().length();

    if m.determinant() < 0.0 {
        sx = -sx;
    }

    let position = m.w_axis.truncate();

    let inv = |s: f32| if s.abs() > DEGENERATE_SCALE { 1.0 / s } else { 0.0 };
    let rotation_only = Mat4::from_cols(
        (m.x_axis.truncate() * inv(sx)).extend(0.0),
        (m.y_axis.truncate() * inv(sy)).extend(0.0),
        (m.z_axis.truncate() * inv(sz)).extend(0.0),
        Vec4::W,
    );

    let mut quaternion = quat_from_rotation_matrix(&rotation_only);
    let len_sq = quaternion.length_squared();
    if !len_sq.is_finite() || len_sq < DEGENERATE_SCALE {
        log::debug!("decompose: degenerate rotation (scale {sx}, {sy}, {sz}), using identity");
        quaternion = Quat::IDENTITY;
    } else {
        quaternion = quaternion.normalize();
    }

    (position, quaternion, Vec3::new(sx, sy, sz))
}

/// Converts the upper 3x3 of a pure rotation matrix into a quaternion.
///
/// Uses the trace method, branching on whichever diagonal element dominates so
/// that the square root argument stays well away from zero.
#[must_use]
pub fn quat_from_rotation_matrix(m: &Mat4) -> Quat {
    let te = m.to_cols_array();
    let (m11, m12, m13) = (te[0], te[4], te[8]);
    let (m21, m22, m23) = (te[1], te[5], te[9]);
    let (m31, m32, m33) = (te[2], te[6], te[10]);

    let trace = m11 + m22 + m33;

    if trace > 0.0 {
        let s = 0.5 / (trace + 1.0).sqrt();
        Quat::from_xyzw((m32 - m23) * s, (m13 - m31) * s, (m21 - m12) * s, 0.25 / s)
    } else if m11 > m22 && m11 > m33 {
        let s = 2.0 * (1.0 + m11 - m22 - m33).sqrt();
        Quat::from_xyzw(0.25 * s, (m12 + m21) / s, (m13 + m31) / s, (m32 - m23) / s)
    } else if m22 > m33 {
        let s = 2.0 * (1.0 + m22 - m11 - m33).sqrt();
        Quat::from_xyzw((m12 + m21) / s, 0.25 * s, (m23 + m32) / s, (m13 - m31) / s)
    } else {
        let s = 2.0 * (1.0 + m33 - m11 - m22).sqrt();
        Quat::from_xyzw((m13 + m31) / s, (m23 + m32) / s, 0.25 * s, (m21 - m12) / s)
    }
}

/// Rotation matrix of a quaternion.
#[inline]
#[must_use]
pub fn rotation_from_quat(q: Quat) -> Mat4 {
    compose(Vec3::ZERO, q, Vec3::ONE)
}

/// Rotation matrix of an Euler triple.
#[inline]
#[must_use]
pub fn rotation_from_euler(euler: &Euler) -> Mat4 {
    rotation_from_quat(euler.to_quat())
}

/// Orientation matrix whose +Z axis points from `target` toward `eye`.
///
/// Only the rotation block is written; the translation column is zero. When the
/// up vector is parallel to the view direction, the forward axis is nudged by
/// `1e-4` so a valid basis can still be built.
#[must_use]
pub fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
    let mut z = eye - target;
    if z.length_squared() == 0.0 {
        // eye and target coincide
        z.z = 1.0;
    }
    z = z.normalize();

    let mut x = up.cross(z);
    if x.length_squared() == 0.0 {
        if (up.z.abs() - 1.0).abs() < f32::EPSILON {
            z.x += 0.0001;
        } else {
            z.z += 0.0001;
        }
        z = z.normalize();
        x = up.cross(z);
    }
    x = x.normalize();
    let y = z.cross(x);

    Mat4::from_cols(x.extend(0.0), y.extend(0.0), z.extend(0.0), Vec4::W)
}

/// Pure rotation part of an affine matrix (basis columns divided by their length).
#[must_use]
pub fn extract_rotation(m: &Mat4) -> Mat4 {
    let scale_col = |c: Vec4| {
        let len = c.truncate().length();
        if len > DEGENERATE_SCALE {
            (c.truncate() / len).extend(0.0)
        } else {
            Vec4::ZERO
        }
    };
    Mat4::from_cols(
        scale_col(m.x_axis),
        scale_col(m.y_axis),
        scale_col(m.z_axis),
        Vec4::W,
    )
}

/// Largest basis-column length, used to scale bounding-sphere radii.
#[inline]
#[must_use]
pub fn max_scale_on_axis(m: &Mat4) -> f32 {
    let sx = m.x_axis.truncate().length_squared();
    let sy = m.y_axis.truncate().length_squared();
    let sz = m.z_axis.truncate().length_squared();
    sx.max(sy).max(sz).sqrt()
}

/// Returns `true` when the last row is `[0, 0, 0, 1]`.
#[inline]
#[must_use]
pub fn is_affine(m: &Mat4) -> bool {
    m.row(3) == Vec4::W
}

/// Shortest-arc rotation taking unit vector `from` onto unit vector `to`.
#[must_use]
pub fn quat_from_unit_vectors(from: Vec3, to: Vec3) -> Quat {
    let r = from.dot(to) + 1.0;
    let q = if r < f32::EPSILON {
        // opposite vectors: rotate 180 degrees about any orthogonal axis
        if from.x.abs() > from.z.abs() {
            Quat::from_xyzw(-from.y, from.x, 0.0, 0.0)
        } else {
            Quat::from_xyzw(0.0, -from.z, from.y, 0.0)
        }
    } else {
        let axis = from.cross(to);
        Quat::from_xyzw(axis.x, axis.y, axis.z, r)
    };
    q.normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::f32::consts::FRAC_PI_3;

    #[test]
    fn compose_matches_glam() {
        let p = Vec3::new(1.0, -2.0, 3.0);
        let q = Quat::from_rotation_y(FRAC_PI_3);
        let s = Vec3::new(2.0, 3.0, 0.5);
        let ours = compose(p, q, s);
        let theirs = Mat4::from_scale_rotation_translation(s, q, p);
        assert!(ours.abs_diff_eq(theirs, 1e-5));
        assert!(is_affine(&ours));
    }

    #[test]
    fn decompose_zero_scale_never_degenerate() {
        let m = compose(Vec3::ONE, Quat::from_rotation_x(0.4), Vec3::new(0.0, 1.0, 1.0));
        let (_, q, s) = decompose(&m);
        assert!(q.is_finite());
        assert!((q.length() - 1.0).abs() < 1e-4);
        assert!(s.x.abs() < 1e-6);
    }

    #[test]
    fn look_at_degenerate_up_still_orthonormal() {
        let m = look_at(Vec3::ZERO, Vec3::new(0.0, 0.0, -5.0), Vec3::Z);
        let x = m.x_axis.truncate();
        let y = m.y_axis.truncate();
        let z = m.z_axis.truncate();
        assert!((x.length() - 1.0).abs() < 1e-4);
        assert!(x.dot(y).abs() < 1e-4);
        assert!(y.dot(z).abs() < 1e-3);
    }

    #[test]
    fn unit_vectors_opposite() {
        let q = quat_from_unit_vectors(Vec3::X, -Vec3::X);
        assert!((q * Vec3::X).abs_diff_eq(-Vec3::X, 1e-5));
    }

    #[test]
    fn random_affine_inverse_keeps_last_row() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let p = Vec3::new(
                rng.random_range(-10.0..10.0),
                rng.random_range(-10.0..10.0),
                rng.random_range(-10.0..10.0),
            );
            let axis = Vec3::new(rng.random_range(-1.0..1.0), 1.0, rng.random_range(-1.0..1.0)).normalize();
            let q = Quat::from_axis_angle(axis, rng.random_range(-3.0..3.0));
            let s = Vec3::new(
                rng.random_range(0.5..2.0),
                rng.random_range(0.5..2.0),
                rng.random_range(0.5..2.0),
            );
            let m = compose(p, q, s);
            let inverse = m.inverse();
            assert!(inverse.row(3).abs_diff_eq(Vec4::W, 1e-5));
            assert!((m * inverse).abs_diff_eq(Mat4::IDENTITY, 1e-4));
        }
    }
}
