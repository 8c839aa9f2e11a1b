//! Bounding volumes: axis-aligned boxes and spheres.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::math::max_scale_on_axis;

// ============================================================================
// BoundingBox
// ============================================================================

/// Axis-aligned box given by its two extreme corners.
///
/// A box is empty when any component of `max` is smaller than the matching
/// component of `min`. The canonical empty box is [`BoundingBox::EMPTY`]
/// (`+inf` / `-inf`), which is also the [`Default`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl BoundingBox {
    pub const EMPTY: Self = Self {
        min: Vec3::INFINITY,
        max: Vec3::NEG_INFINITY,
    };

    #[inline]
    #[must_use]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Tight box around `points` (O(n) scan). Empty for an empty iterator.
    #[must_use]
    pub fn from_points<I: IntoIterator<Item = Vec3>>(points: I) -> Self {
        let mut bbox = Self::EMPTY;
        for p in points {
            bbox.expand_by_point(p);
        }
        bbox
    }

    pub fn set_from_points<I: IntoIterator<Item = Vec3>>(&mut self, points: I) -> &mut Self {
        *self = Self::from_points(points);
        self
    }

    #[inline]
    pub fn make_empty(&mut self) {
        *self = Self::EMPTY;
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.max.x < self.min.x || self.max.y < self.min.y || self.max.z < self.min.z
    }

    /// `true` when neither corner contains NaN or infinity.
    #[inline]
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }

    #[inline]
    pub fn expand_by_point(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    #[inline]
    pub fn expand_by_scalar(&mut self, amount: f32) {
        self.min -= Vec3::splat(amount);
        self.max += Vec3::splat(amount);
    }

    /// Center point; `Vec3::ZERO` for an empty box.
    #[must_use]
    pub fn center(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            (self.min + self.max) * 0.5
        }
    }

    /// Extent along each axis; `Vec3::ZERO` for an empty box.
    #[must_use]
    pub fn size(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            self.max - self.min
        }
    }

    #[must_use]
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let merged = BoundingBox {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        };
        if merged.is_empty() { Self::EMPTY } else { merged }
    }

    /// Overlap of two boxes. Non-overlapping inputs give [`BoundingBox::EMPTY`],
    /// never a partially inverted box with stale finite corners.
    #[must_use]
    pub fn intersect(&self, other: &BoundingBox) -> BoundingBox {
        let overlap = BoundingBox {
            min: self.min.max(other.min),
            max: self.max.min(other.max),
        };
        if overlap.is_empty() { Self::EMPTY } else { overlap }
    }

    /// Transforms all eight corners and re-derives the axis-aligned extent.
    #[must_use]
    pub fn transform(&self, matrix: &Mat4) -> Self {
        if self.is_empty() {
            return Self::EMPTY;
        }

        let corners = [
            Vec3::new(self.min.x, self.min.y, self.min.z),
            Vec3::new(self.min.x, self.min.y, self.max.z),
            Vec3::new(self.min.x, self.max.y, self.min.z),
            Vec3::new(self.min.x, self.max.y, self.max.z),
            Vec3::new(self.max.x, self.min.y, self.min.z),
            Vec3::new(self.max.x, self.min.y, self.max.z),
            Vec3::new(self.max.x, self.max.y, self.min.z),
            Vec3::new(self.max.x, self.max.y, self.max.z),
        ];

        Self::from_points(corners.into_iter().map(|p| matrix.transform_point3(p)))
    }

    #[must_use]
    pub fn translate(&self, offset: Vec3) -> Self {
        Self {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    #[inline]
    #[must_use]
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    #[inline]
    #[must_use]
    pub fn contains_box(&self, other: &BoundingBox) -> bool {
        self.min.cmple(other.min).all() && other.max.cmple(self.max).all()
    }

    #[inline]
    #[must_use]
    pub fn intersects_box(&self, other: &BoundingBox) -> bool {
        !(other.max.x < self.min.x
            || other.min.x > self.max.x
            || other.max.y < self.min.y
            || other.min.y > self.max.y
            || other.max.z < self.min.z
            || other.min.z > self.max.z)
    }

    #[must_use]
    pub fn intersects_sphere(&self, sphere: &BoundingSphere) -> bool {
        let closest = self.clamp_point(sphere.center);
        closest.distance_squared(sphere.center) <= sphere.radius * sphere.radius
    }

    #[inline]
    #[must_use]
    pub fn clamp_point(&self, point: Vec3) -> Vec3 {
        point.max(self.min).min(self.max)
    }

    #[must_use]
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.clamp_point(point).distance(point)
    }

    /// Sphere centered on the box, touching its corners.
    #[must_use]
    pub fn bounding_sphere(&self) -> BoundingSphere {
        if self.is_empty() {
            return BoundingSphere::EMPTY;
        }
        BoundingSphere {
            center: self.center(),
            radius: self.size().length() * 0.5,
        }
    }
}

// ============================================================================
// BoundingSphere
// ============================================================================

/// Sphere given by center and radius. Degenerate (radius 0 at the origin) by default;
/// a negative radius marks it empty.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl BoundingSphere {
    pub const EMPTY: Self = Self {
        center: Vec3::ZERO,
        radius: -1.0,
    };

    #[inline]
    #[must_use]
    pub const fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Sphere around `points`.
    ///
    /// The center is `center` when given, otherwise the center of the points'
    /// bounding box. The radius is the largest center-to-point distance. This is
    /// a single O(n) pass and is not the minimal enclosing sphere.
    #[must_use]
    pub fn from_points(points: &[Vec3], center: Option<Vec3>) -> Self {
        if points.is_empty() {
            return Self::new(center.unwrap_or(Vec3::ZERO), 0.0);
        }

        let center = center.unwrap_or_else(|| BoundingBox::from_points(points.iter().copied()).center());

        let max_radius_sq = points
            .iter()
            .map(|p| center.distance_squared(*p))
            .fold(0.0_f32, f32::max);

        Self::new(center, max_radius_sq.sqrt())
    }

    pub fn set_from_points(&mut self, points: &[Vec3], center: Option<Vec3>) -> &mut Self {
        *self = Self::from_points(points, center);
        self
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.radius < 0.0
    }

    #[inline]
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.center.is_finite() && self.radius.is_finite()
    }

    #[inline]
    #[must_use]
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.distance_squared(self.center) <= self.radius * self.radius
    }

    #[inline]
    #[must_use]
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        point.distance(self.center) - self.radius
    }

    #[must_use]
    pub fn intersects_sphere(&self, other: &BoundingSphere) -> bool {
        let radius_sum = self.radius + other.radius;
        other.center.distance_squared(self.center) <= radius_sum * radius_sum
    }

    #[must_use]
    pub fn intersects_box(&self, bbox: &BoundingBox) -> bool {
        bbox.intersects_sphere(self)
    }

    /// Moves the center by `matrix` and scales the radius by its largest axis scale.
    #[must_use]
    pub fn transform(&self, matrix: &Mat4) -> Self {
        Self {
            center: matrix.transform_point3(self.center),
            radius: self.radius * max_scale_on_axis(matrix),
        }
    }

    #[must_use]
    pub fn bounding_box(&self) -> BoundingBox {
        if self.is_empty() {
            return BoundingBox::EMPTY;
        }
        BoundingBox::new(
            self.center - Vec3::splat(self.radius),
            self.center + Vec3::splat(self.radius),
        )
    }
}
