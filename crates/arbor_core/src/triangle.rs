//! Triangle helpers: normals, barycentric coordinates and attribute interpolation.

use glam::{Vec2, Vec3};

/// Unit normal of triangle `(a, b, c)` with counter-clockwise (right-hand) winding.
///
/// Zero for a degenerate triangle.
#[must_use]
pub fn normal(a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    unnormalized_normal(a, b, c).normalize_or_zero()
}

/// `(c - b) x (a - b)`. Its length is twice the triangle area.
#[inline]
#[must_use]
pub fn unnormalized_normal(a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    (c - b).cross(a - b)
}

#[inline]
#[must_use]
pub fn area(a: Vec3, b: Vec3, c: Vec3) -> f32 {
    unnormalized_normal(a, b, c).length() * 0.5
}

/// Barycentric coordinates of `point` with respect to `(a, b, c)`.
///
/// `point` is projected onto the triangle's plane. Returns `None` for a
/// collinear or collapsed triangle.
#[must_use]
pub fn barycoord(point: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Option<Vec3> {
    let v0 = c - a;
    let v1 = b - a;
    let v2 = point - a;

    let dot00 = v0.dot(v0);
    let dot01 = v0.dot(v1);
    let dot02 = v0.dot(v2);
    let dot11 = v1.dot(v1);
    let dot12 = v1.dot(v2);

    let denom = dot00 * dot11 - dot01 * dot01;
    if denom == 0.0 {
        return None;
    }

    let inv_denom = 1.0 / denom;
    let u = (dot11 * dot02 - dot01 * dot12) * inv_denom;
    let v = (dot00 * dot12 - dot01 * dot02) * inv_denom;

    // u weights c, v weights b
    Some(Vec3::new(1.0 - u - v, v, u))
}

/// `true` when `point` lies inside the triangle (edges included).
#[must_use]
pub fn contains_point(point: Vec3, a: Vec3, b: Vec3, c: Vec3) -> bool {
    barycoord(point, a, b, c).is_some_and(|bc| bc.x >= 0.0 && bc.y >= 0.0 && bc.x + bc.y <= 1.0)
}

/// UV at `point`, interpolated from the per-corner UVs.
#[must_use]
pub fn interpolate_uv(point: Vec3, a: Vec3, b: Vec3, c: Vec3, uv: [Vec2; 3]) -> Option<Vec2> {
    let bc = barycoord(point, a, b, c)?;
    Some(uv[0] * bc.x + uv[1] * bc.y + uv[2] * bc.z)
}
