use arbor_core::math::{self, Euler, EulerOrder};
use glam::{Mat4, Quat, Vec3};

/// Transform component
///
/// Holds a node's position, rotation and scale (TRS) together with the cached
/// local and world matrices and the dirty-check state that decides when they
/// are rebuilt.
///
/// The quaternion is the only stored rotation. Euler angles are a derived view
/// ([`euler`](Self::euler) / [`set_euler`](Self::set_euler)) interpreted with
/// [`rotation_order`](Self::rotation_order).
#[derive(Debug, Clone)]
pub struct Transform {
    // === Public Properties ===
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub rotation_order: EulerOrder,
    /// Rebuild the local matrix from TRS during every update pass.
    /// Turn off when the local matrix is driven directly.
    pub matrix_auto_update: bool,

    // === Matrix Cache ===
    pub(crate) local_matrix: Mat4,
    pub(crate) world_matrix: Mat4,
    pub(crate) world_matrix_needs_update: bool,

    // === Dirty Check State (Private) ===
    last_position: Vec3,
    last_rotation: Quat,
    last_scale: Vec3,
    force_update: bool,
}

impl Transform {
    #[must_use]
    pub fn new() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            rotation_order: EulerOrder::default(),
            matrix_auto_update: true,

            local_matrix: Mat4::IDENTITY,
            world_matrix: Mat4::IDENTITY,
            world_matrix_needs_update: true,

            last_position: Vec3::ZERO,
            last_rotation: Quat::IDENTITY,
            last_scale: Vec3::ONE,
            force_update: true,
        }
    }

    // ========================================================================
    // Core Logic: Smart Update (Shadow State Check)
    // ========================================================================

    /// Rebuilds the local matrix from TRS if any of them changed since the last
    /// call, and flags the world matrix as stale in that case.
    ///
    /// Returns whether the local matrix changed.
    pub fn update_local_matrix(&mut self) -> bool {
        let changed = self.position != self.last_position
            || self.rotation != self.last_rotation
            || self.scale != self.last_scale
            || self.force_update;

        if changed {
            self.local_matrix = math::compose(self.position, self.rotation, self.scale);

            self.last_position = self.position;
            self.last_rotation = self.rotation;
            self.last_scale = self.scale;
            self.force_update = false;
            self.world_matrix_needs_update = true;
        }

        changed
    }

    // ========================================================================
    // Getters & Helpers
    // ========================================================================

    /// Rotation as Euler angles in [`rotation_order`](Self::rotation_order).
    #[must_use]
    pub fn euler(&self) -> Euler {
        Euler::from_quat(self.rotation, self.rotation_order)
    }

    /// Sets the rotation from Euler angles; the angle order becomes the
    /// transform's rotation order.
    pub fn set_euler(&mut self, euler: Euler) {
        self.rotation = euler.to_quat();
        self.rotation_order = euler.order;
    }

    #[inline]
    #[must_use]
    pub fn local_matrix(&self) -> &Mat4 {
        &self.local_matrix
    }

    /// World matrix as of the last update pass.
    #[inline]
    #[must_use]
    pub fn world_matrix(&self) -> &Mat4 {
        &self.world_matrix
    }

    #[inline]
    #[must_use]
    pub fn world_matrix_needs_update(&self) -> bool {
        self.world_matrix_needs_update
    }

    #[inline]
    pub(crate) fn set_world_matrix(&mut self, mat: Mat4) {
        self.world_matrix = mat;
        self.world_matrix_needs_update = false;
    }

    /// Sets the local matrix directly (loaders, physics sync).
    ///
    /// TRS is decomposed back out of `mat` and the shadow state synced, so the
    /// next update pass keeps `mat` as is. Shear is lost by the decomposition
    /// but kept in the local matrix itself.
    pub fn set_local_matrix(&mut self, mat: Mat4) {
        self.local_matrix = mat;

        let (position, rotation, scale) = math::decompose(&mat);
        self.position = position;
        self.rotation = rotation;
        self.scale = scale;

        self.last_position = position;
        self.last_rotation = rotation;
        self.last_scale = scale;
        self.force_update = false;

        self.world_matrix_needs_update = true;
    }

    /// Premultiplies the local transform by `mat`.
    pub fn apply_matrix(&mut self, mat: &Mat4) {
        if self.matrix_auto_update {
            self.update_local_matrix();
        }
        self.set_local_matrix(*mat * self.local_matrix);
    }

    /// Rotates so that the local -Z axis points at `target`.
    ///
    /// `target` and `up` are expressed in the parent's coordinate space. Use
    /// [`Scene::look_at`](crate::Scene::look_at) for a world-space target.
    pub fn look_at(&mut self, target: Vec3, up: Vec3) {
        let m = math::look_at(self.position, target, up);
        self.rotation = math::quat_from_rotation_matrix(&m);
    }

    /// Rotates around `axis` in object space. `axis` is assumed normalized.
    pub fn rotate_on_axis(&mut self, axis: Vec3, angle: f32) {
        self.rotation = (self.rotation * Quat::from_axis_angle(axis, angle)).normalize();
    }

    /// Rotates around `axis` in the parent's space. `axis` is assumed normalized.
    pub fn rotate_on_world_axis(&mut self, axis: Vec3, angle: f32) {
        self.rotation = (Quat::from_axis_angle(axis, angle) * self.rotation).normalize();
    }

    pub fn rotate_x(&mut self, angle: f32) {
        self.rotate_on_axis(Vec3::X, angle);
    }

    pub fn rotate_y(&mut self, angle: f32) {
        self.rotate_on_axis(Vec3::Y, angle);
    }

    pub fn rotate_z(&mut self, angle: f32) {
        self.rotate_on_axis(Vec3::Z, angle);
    }

    /// Moves along `axis` given in object space. `axis` is assumed normalized.
    pub fn translate_on_axis(&mut self, axis: Vec3, distance: f32) {
        self.position += self.rotation * axis * distance;
    }

    pub fn translate_x(&mut self, distance: f32) {
        self.translate_on_axis(Vec3::X, distance);
    }

    pub fn translate_y(&mut self, distance: f32) {
        self.translate_on_axis(Vec3::Y, distance);
    }

    pub fn translate_z(&mut self, distance: f32) {
        self.translate_on_axis(Vec3::Z, distance);
    }

    /// Forces both matrices to be rebuilt on the next update pass.
    pub fn mark_dirty(&mut self) {
        self.force_update = true;
        self.world_matrix_needs_update = true;
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}
