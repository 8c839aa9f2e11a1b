//! Euler angles with an explicit rotation order.
//!
//! Orientation is stored canonically as a quaternion elsewhere in Arbor; an
//! [`Euler`] is a derived view that is converted on demand and never kept in
//! sync through callbacks.

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::matrix::rotation_from_quat;

/// Threshold on `|sin|` beyond which an order is treated as gimbal locked.
const GIMBAL_LOCK_LIMIT: f32 = 0.999_999_9;

/// Order in which the three axis rotations are applied.
///
/// `XYZ` means the rotation matrix is `Rx * Ry * Rz`.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EulerOrder {
    #[default]
    XYZ,
    YXZ,
    ZXY,
    ZYX,
    YZX,
    XZY,
}

impl EulerOrder {
    /// All six orders.
    pub const ALL: [EulerOrder; 6] = [
        EulerOrder::XYZ,
        EulerOrder::YXZ,
        EulerOrder::ZXY,
        EulerOrder::ZYX,
        EulerOrder::YZX,
        EulerOrder::XZY,
    ];
}

/// Rotation expressed as three angles (radians) and an order.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Euler {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub order: EulerOrder,
}

impl Euler {
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32, order: EulerOrder) -> Self {
        Self { x, y, z, order }
    }

    #[inline]
    #[must_use]
    pub fn to_vec3(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    #[inline]
    #[must_use]
    pub fn from_vec3(v: Vec3, order: EulerOrder) -> Self {
        Self::new(v.x, v.y, v.z, order)
    }

    /// Extracts angles from the upper 3x3 of an unscaled rotation matrix.
    ///
    /// The `asin` argument is clamped to `[-1, 1]`. Near gimbal lock one angle
    /// is zeroed and the remaining one is solved from alternate entries.
    #[must_use]
    pub fn from_rotation_matrix(m: &Mat4, order: EulerOrder) -> Self {
        let te = m.to_cols_array();
        let (m11, m12, m13) = (te[0], te[4], te[8]);
        let (m21, m22, m23) = (te[1], te[5], te[9]);
        let (m31, m32, m33) = (te[2], te[6], te[10]);

        let (x, y, z) = match order {
            EulerOrder::XYZ => {
                let y = m13.clamp(-1.0, 1.0).asin();
                if m13.abs() < GIMBAL_LOCK_LIMIT {
                    ((-m23).atan2(m33), y, (-m12).atan2(m11))
                } else {
                    (m32.atan2(m22), y, 0.0)
                }
            }
            EulerOrder::YXZ => {
                let x = (-m23.clamp(-1.0, 1.0)).asin();
                if m23.abs() < GIMBAL_LOCK_LIMIT {
                    (x, m13.atan2(m33), m21.atan2(m22))
                } else {
                    (x, (-m31).atan2(m11), 0.0)
                }
            }
            EulerOrder::ZXY => {
                let x = m32.clamp(-1.0, 1.0).asin();
                if m32.abs() < GIMBAL_LOCK_LIMIT {
                    (x, (-m31).atan2(m33), (-m12).atan2(m22))
                } else {
                    (x, 0.0, m21.atan2(m11))
                }
            }
            EulerOrder::ZYX => {
                let y = (-m31.clamp(-1.0, 1.0)).asin();
                if m31.abs() < GIMBAL_LOCK_LIMIT {
                    (m32.atan2(m33), y, m21.atan2(m11))
                } else {
                    (0.0, y, (-m12).atan2(m22))
                }
            }
            EulerOrder::YZX => {
                let z = m21.clamp(-1.0, 1.0).asin();
                if m21.abs() < GIMBAL_LOCK_LIMIT {
                    ((-m23).atan2(m22), (-m31).atan2(m11), z)
                } else {
                    (0.0, m13.atan2(m33), z)
                }
            }
            EulerOrder::XZY => {
                let z = (-m12.clamp(-1.0, 1.0)).asin();
                if m12.abs() < GIMBAL_LOCK_LIMIT {
                    (m32.atan2(m22), m13.atan2(m11), z)
                } else {
                    ((-m23).atan2(m33), 0.0, z)
                }
            }
        };

        Self::new(x, y, z, order)
    }

    /// Angles of quaternion `q` in the given order.
    #[must_use]
    pub fn from_quat(q: Quat, order: EulerOrder) -> Self {
        Self::from_rotation_matrix(&rotation_from_quat(q), order)
    }

    /// Same orientation expressed in another order.
    ///
    /// Information can be lost near gimbal lock.
    #[must_use]
    pub fn reorder(&self, order: EulerOrder) -> Self {
        Self::from_quat(self.to_quat(), order)
    }

    /// Converts to a unit quaternion.
    #[must_use]
    pub fn to_quat(&self) -> Quat {
        let (s1, c1) = (self.x * 0.5).sin_cos();
        let (s2, c2) = (self.y * 0.5).sin_cos();
        let (s3, c3) = (self.z * 0.5).sin_cos();

        let (x, y, z, w) = match self.order {
            EulerOrder::XYZ => (
                s1 * c2 * c3 + c1 * s2 * s3,
                c1 * s2 * c3 - s1 * c2 * s3,
                c1 * c2 * s3 + s1 * s2 * c3,
                c1 * c2 * c3 - s1 * s2 * s3,
            ),
            EulerOrder::YXZ => (
                s1 * c2 * c3 + c1 * s2 * s3,
                c1 * s2 * c3 - s1 * c2 * s3,
                c1 * c2 * s3 - s1 * s2 * c3,
                c1 * c2 * c3 + s1 * s2 * s3,
            ),
            EulerOrder::ZXY => (
                s1 * c2 * c3 - c1 * s2 * s3,
                c1 * s2 * c3 + s1 * c2 * s3,
                c1 * c2 * s3 + s1 * s2 * c3,
                c1 * c2 * c3 - s1 * s2 * s3,
            ),
            EulerOrder::ZYX => (
                s1 * c2 * c3 - c1 * s2 * s3,
                c1 * s2 * c3 + s1 * c2 * s3,
                c1 * c2 * s3 - s1 * s2 * c3,
                c1 * c2 * c3 + s1 * s2 * s3,
            ),
            EulerOrder::YZX => (
                s1 * c2 * c3 + c1 * s2 * s3,
                c1 * s2 * c3 + s1 * c2 * s3,
                c1 * c2 * s3 - s1 * s2 * c3,
                c1 * c2 * c3 - s1 * s2 * s3,
            ),
            EulerOrder::XZY => (
                s1 * c2 * c3 - c1 * s2 * s3,
                c1 * s2 * c3 - s1 * c2 * s3,
                c1 * c2 * s3 + s1 * s2 * c3,
                c1 * c2 * c3 + s1 * s2 * s3,
            ),
        };

        Quat::from_xyzw(x, y, z, w)
    }
}

impl From<Euler> for Quat {
    fn from(euler: Euler) -> Self {
        euler.to_quat()
    }
}
