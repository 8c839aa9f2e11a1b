//! Ray primitive and its intersection tests.

use glam::{Mat4, Vec3};

use crate::bounds::{BoundingBox, BoundingSphere};

/// Half-line starting at `origin`. `direction` is expected to be unit length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Default for Ray {
    fn default() -> Self {
        Self {
            origin: Vec3::ZERO,
            direction: Vec3::NEG_Z,
        }
    }
}

/// Closest approach between a ray and a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentDistance {
    pub distance_sq: f32,
    pub point_on_ray: Vec3,
    pub point_on_segment: Vec3,
}

impl Ray {
    #[inline]
    #[must_use]
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// Point at parameter `t` along the ray.
    #[inline]
    #[must_use]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Ray expressed in the space mapped by `matrix`; the direction is renormalized.
    #[must_use]
    pub fn transform(&self, matrix: &Mat4) -> Self {
        let origin = matrix.transform_point3(self.origin);
        let direction = (matrix.transform_point3(self.origin + self.direction) - origin).normalize_or_zero();
        Self { origin, direction }
    }

    #[must_use]
    pub fn closest_point_to_point(&self, point: Vec3) -> Vec3 {
        let t = (point - self.origin).dot(self.direction);
        if t < 0.0 { self.origin } else { self.at(t) }
    }

    #[must_use]
    pub fn distance_sq_to_point(&self, point: Vec3) -> f32 {
        self.closest_point_to_point(point).distance_squared(point)
    }

    #[inline]
    #[must_use]
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.distance_sq_to_point(point).sqrt()
    }

    /// Squared distance between the ray and segment `v0..v1`, with the closest points.
    ///
    /// Works in the segment's centered frame: the segment is `center + s1 * dir`
    /// with `|s1| <= extent`, the ray is `origin + s0 * direction` with `s0 >= 0`,
    /// and the region of the `(s0, s1)` plane holding the unconstrained minimum
    /// decides which boundary to clamp against.
    #[must_use]
    pub fn distance_sq_to_segment(&self, v0: Vec3, v1: Vec3) -> SegmentDistance {
        let seg_center = (v0 + v1) * 0.5;
        let seg_dir = (v1 - v0).normalize_or_zero();
        let diff = self.origin - seg_center;

        let seg_extent = v0.distance(v1) * 0.5;
        let a01 = -self.direction.dot(seg_dir);
        let b0 = diff.dot(self.direction);
        let b1 = -diff.dot(seg_dir);
        let c = diff.length_squared();
        let det = (1.0 - a01 * a01).abs();

        let (s0, s1, sqr_dist);

        if det > 0.0 {
            let mut t0 = a01 * b1 - b0;
            let mut t1 = a01 * b0 - b1;
            let ext_det = seg_extent * det;

            if t0 >= 0.0 {
                if t1 >= -ext_det {
                    if t1 <= ext_det {
                        // interior of both
                        let inv_det = 1.0 / det;
                        t0 *= inv_det;
                        t1 *= inv_det;
                        s0 = t0;
                        s1 = t1;
                        sqr_dist = t0 * (t0 + a01 * t1 + 2.0 * b0) + t1 * (a01 * t0 + t1 + 2.0 * b1) + c;
                    } else {
                        s1 = seg_extent;
                        s0 = (-(a01 * s1 + b0)).max(0.0);
                        sqr_dist = -s0 * s0 + s1 * (s1 + 2.0 * b1) + c;
                    }
                } else {
                    s1 = -seg_extent;
                    s0 = (-(a01 * s1 + b0)).max(0.0);
                    sqr_dist = -s0 * s0 + s1 * (s1 + 2.0 * b1) + c;
                }
            } else if t1 <= -ext_det {
                s0 = (-(-a01 * seg_extent + b0)).max(0.0);
                s1 = if s0 > 0.0 { -seg_extent } else { (-b1).clamp(-seg_extent, seg_extent) };
                sqr_dist = -s0 * s0 + s1 * (s1 + 2.0 * b1) + c;
            } else if t1 <= ext_det {
                s0 = 0.0;
                s1 = (-b1).clamp(-seg_extent, seg_extent);
                sqr_dist = s1 * (s1 + 2.0 * b1) + c;
            } else {
                s0 = (-(a01 * seg_extent + b0)).max(0.0);
                s1 = if s0 > 0.0 { seg_extent } else { (-b1).clamp(-seg_extent, seg_extent) };
                sqr_dist = -s0 * s0 + s1 * (s1 + 2.0 * b1) + c;
            }
        } else {
            // parallel
            s1 = if a01 > 0.0 { -seg_extent } else { seg_extent };
            s0 = (-(a01 * s1 + b0)).max(0.0);
            sqr_dist = -s0 * s0 + s1 * (s1 + 2.0 * b1) + c;
        }

        SegmentDistance {
            distance_sq: sqr_dist.max(0.0),
            point_on_ray: self.at(s0),
            point_on_segment: seg_center + seg_dir * s1,
        }
    }

    /// First point where the ray enters `sphere`, or the exit point when the
    /// origin is inside it.
    #[must_use]
    pub fn intersect_sphere(&self, sphere: &BoundingSphere) -> Option<Vec3> {
        let v = sphere.center - self.origin;
        let tca = v.dot(self.direction);
        let d2 = v.length_squared() - tca * tca;
        let radius2 = sphere.radius * sphere.radius;

        if d2 > radius2 {
            return None;
        }

        let thc = (radius2 - d2).sqrt();
        let t0 = tca - thc;
        let t1 = tca + thc;

        if t0 < 0.0 && t1 < 0.0 {
            return None;
        }
        Some(if t0 < 0.0 { self.at(t1) } else { self.at(t0) })
    }

    #[inline]
    #[must_use]
    pub fn intersects_sphere(&self, sphere: &BoundingSphere) -> bool {
        self.distance_sq_to_point(sphere.center) <= sphere.radius * sphere.radius
    }

    /// Slab test against an axis-aligned box.
    #[must_use]
    pub fn intersect_box(&self, bbox: &BoundingBox) -> Option<Vec3> {
        if bbox.is_empty() {
            return None;
        }

        let slab = |origin: f32, dir: f32, min: f32, max: f32| {
            let inv = 1.0 / dir;
            if inv >= 0.0 {
                ((min - origin) * inv, (max - origin) * inv)
            } else {
                ((max - origin) * inv, (min - origin) * inv)
            }
        };

        let (mut tmin, mut tmax) = slab(self.origin.x, self.direction.x, bbox.min.x, bbox.max.x);
        let (tymin, tymax) = slab(self.origin.y, self.direction.y, bbox.min.y, bbox.max.y);

        if tmin > tymax || tymin > tmax {
            return None;
        }
        // NaN-aware: a NaN tmin/tmax (0 * inf) is replaced by the other slab
        if tymin > tmin || tmin.is_nan() {
            tmin = tymin;
        }
        if tymax < tmax || tmax.is_nan() {
            tmax = tymax;
        }

        let (tzmin, tzmax) = slab(self.origin.z, self.direction.z, bbox.min.z, bbox.max.z);

        if tmin > tzmax || tzmin > tmax {
            return None;
        }
        if tzmin > tmin || tmin.is_nan() {
            tmin = tzmin;
        }
        if tzmax < tmax || tmax.is_nan() {
            tmax = tzmax;
        }

        if tmax < 0.0 {
            return None;
        }
        Some(self.at(if tmin >= 0.0 { tmin } else { tmax }))
    }

    #[inline]
    #[must_use]
    pub fn intersects_box(&self, bbox: &BoundingBox) -> bool {
        self.intersect_box(bbox).is_some()
    }

    /// Ray/triangle test. Returns the hit point.
    ///
    /// With `backface_culling`, triangles whose counter-clockwise winding faces
    /// away from the ray origin are rejected.
    #[must_use]
    pub fn intersect_triangle(&self, a: Vec3, b: Vec3, c: Vec3, backface_culling: bool) -> Option<Vec3> {
        let edge1 = b - a;
        let edge2 = c - a;
        let normal = edge1.cross(edge2);

        // Solves origin + t * dir = a + u * edge1 + v * edge2 by Cramer's rule,
        // with signs folded so that every test below compares against zero.
        let mut d_dot_n = self.direction.dot(normal);
        let sign;
        if d_dot_n > 0.0 {
            if backface_culling {
                return None;
            }
            sign = 1.0;
        } else if d_dot_n < 0.0 {
            sign = -1.0;
            d_dot_n = -d_dot_n;
        } else {
            return None;
        }

        let diff = self.origin - a;
        let d_dot_q_x_e2 = sign * self.direction.dot(diff.cross(edge2));
        if d_dot_q_x_e2 < 0.0 {
            return None;
        }

        let d_dot_e1_x_q = sign * self.direction.dot(edge1.cross(diff));
        if d_dot_e1_x_q < 0.0 {
            return None;
        }

        if d_dot_q_x_e2 + d_dot_e1_x_q > d_dot_n {
            return None;
        }

        let q_dot_n = -sign * diff.dot(normal);
        if q_dot_n < 0.0 {
            return None;
        }

        Some(self.at(q_dot_n / d_dot_n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_distance_perpendicular() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z);
        let d = ray.distance_sq_to_segment(Vec3::new(-1.0, 0.5, 0.0), Vec3::new(1.0, 0.5, 0.0));
        assert!((d.distance_sq - 0.25).abs() < 1e-5);
        assert!(d.point_on_segment.abs_diff_eq(Vec3::new(0.0, 0.5, 0.0), 1e-5));
        assert!(d.point_on_ray.abs_diff_eq(Vec3::ZERO, 1e-5));
    }

    #[test]
    fn box_hit_from_outside() {
        let bbox = BoundingBox::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let ray = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z);
        let hit = ray.intersect_box(&bbox).unwrap();
        assert!(hit.abs_diff_eq(Vec3::new(0.0, 0.0, 1.0), 1e-5));

        let miss = Ray::new(Vec3::new(3.0, 0.0, 5.0), Vec3::NEG_Z);
        assert!(miss.intersect_box(&bbox).is_none());
    }

    #[test]
    fn sphere_hit_inside_returns_exit() {
        let sphere = BoundingSphere::new(Vec3::ZERO, 2.0);
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        let hit = ray.intersect_sphere(&sphere).unwrap();
        assert!(hit.abs_diff_eq(Vec3::new(2.0, 0.0, 0.0), 1e-5));
    }
}
