//! Math kernel tests
//!
//! Tests for:
//! - compose / decompose round trips, including mirrored scale
//! - Euler conversions across rotation orders
//! - Inversion policies on singular matrices
//! - look_at orientation

use arbor::core::math::{self, Euler, EulerOrder, InversionPolicy};
use arbor::ArborError;
use glam::{Mat4, Quat, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ============================================================================
// Helper
// ============================================================================

const EPSILON: f32 = 1e-4;

fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn vec3_approx(a: Vec3, b: Vec3) -> bool {
    approx_eq(a.x, b.x) && approx_eq(a.y, b.y) && approx_eq(a.z, b.z)
}

/// Quaternions `q` and `-q` are the same rotation.
fn same_rotation(a: Quat, b: Quat) -> bool {
    a.dot(b).abs() > 1.0 - EPSILON
}

fn random_unit_quat(rng: &mut StdRng) -> Quat {
    let axis = Vec3::new(
        rng.random_range(-1.0..1.0),
        rng.random_range(-1.0..1.0),
        rng.random_range(-1.0..1.0),
    );
    let axis = axis.try_normalize().unwrap_or(Vec3::Y);
    Quat::from_axis_angle(axis, rng.random_range(-3.0..3.0))
}

// ============================================================================
// Compose / Decompose
// ============================================================================

#[test]
fn compose_decompose_round_trip() {
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for _ in 0..200 {
        let position = Vec3::new(
            rng.random_range(-50.0..50.0),
            rng.random_range(-50.0..50.0),
            rng.random_range(-50.0..50.0),
        );
        let rotation = random_unit_quat(&mut rng);
        let scale = Vec3::new(
            rng.random_range(0.1..5.0),
            rng.random_range(0.1..5.0),
            rng.random_range(0.1..5.0),
        );

        let m = math::compose(position, rotation, scale);
        let (p, q, s) = math::decompose(&m);

        assert!(vec3_approx(p, position), "{p} != {position}");
        assert!(same_rotation(q, rotation), "{q} != {rotation}");
        assert!(vec3_approx(s, scale), "{s} != {scale}");
    }
}

#[test]
fn decompose_mirrored_scale_negates_x() {
    let mut rng = StdRng::seed_from_u64(42);

    for _ in 0..50 {
        let rotation = random_unit_quat(&mut rng);
        let scale = Vec3::new(
            -rng.random_range(0.5..3.0),
            rng.random_range(0.5..3.0),
            rng.random_range(0.5..3.0),
        );
        let m = math::compose(Vec3::ONE, rotation, scale);
        assert!(m.determinant() < 0.0);

        let (_, q, s) = math::decompose(&m);
        assert!(s.x < 0.0);
        assert!(vec3_approx(s, scale));
        assert!(same_rotation(q, rotation));

        // Recomposing must reproduce the same matrix.
        let again = math::compose(Vec3::ONE, q, s);
        assert!(again.abs_diff_eq(m, 1e-3));
    }
}

#[test]
fn compose_matches_scale_rotation_translation() {
    let q = Quat::from_rotation_y(0.7);
    let m = math::compose(Vec3::new(1.0, 2.0, 3.0), q, Vec3::splat(2.0));
    let expected = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0))
        * Mat4::from_quat(q)
        * Mat4::from_scale(Vec3::splat(2.0));
    assert!(m.abs_diff_eq(expected, 1e-5));
}

#[test]
fn extract_rotation_drops_scale_and_translation() {
    let q = Quat::from_rotation_z(0.9) * Quat::from_rotation_x(-0.4);
    let m = math::compose(Vec3::new(4.0, -1.0, 2.0), q, Vec3::new(3.0, 0.5, 2.0));

    let rotation = math::extract_rotation(&m);
    assert!(rotation.abs_diff_eq(Mat4::from_quat(q), 1e-5));
    assert!(math::quat_from_rotation_matrix(&rotation).dot(q).abs() > 1.0 - 1e-5);
}

// ============================================================================
// Euler Angles
// ============================================================================

#[test]
fn euler_round_trip_every_order() {
    let mut rng = StdRng::seed_from_u64(7);

    for order in EulerOrder::ALL {
        for _ in 0..20 {
            // Keep the middle angle away from +-90 degrees to avoid gimbal lock.
            let euler = Euler::new(
                rng.random_range(-1.2..1.2),
                rng.random_range(-1.2..1.2),
                rng.random_range(-1.2..1.2),
                order,
            );
            let q = euler.to_quat();
            let back = Euler::from_quat(q, order);
            assert!(same_rotation(back.to_quat(), q), "order {order:?}");
        }
    }
}

#[test]
fn euler_reorder_keeps_rotation() {
    let euler = Euler::new(0.3, -0.4, 0.9, EulerOrder::XYZ);
    let reordered = euler.reorder(EulerOrder::ZYX);
    assert_eq!(reordered.order, EulerOrder::ZYX);
    assert!(same_rotation(euler.to_quat(), reordered.to_quat()));
}

#[test]
fn euler_from_rotation_matrix_single_axis() {
    let m = Mat4::from_rotation_y(0.5);
    let euler = Euler::from_rotation_matrix(&m, EulerOrder::XYZ);
    assert!(approx_eq(euler.x, 0.0));
    assert!(approx_eq(euler.y, 0.5));
    assert!(approx_eq(euler.z, 0.0));
}

// ============================================================================
// Inversion Policy
// ============================================================================

#[test]
fn singular_inverse_errors_under_error_policy() {
    let singular = Mat4::from_scale(Vec3::new(1.0, 0.0, 1.0));
    let err = math::invert(&singular, InversionPolicy::Error).unwrap_err();
    assert!(matches!(err, ArborError::SingularMatrix { .. }));
    assert!(err.is_degenerate_input());
}

#[test]
fn singular_inverse_is_identity_under_warn_policy() {
    let _ = env_logger::builder().is_test(true).try_init();
    let singular = Mat4::ZERO;
    let inverse = math::invert(&singular, InversionPolicy::WarnIdentity).unwrap();
    assert_eq!(inverse, Mat4::IDENTITY);
}

#[test]
fn regular_inverse_ignores_policy() {
    let m = math::compose(Vec3::new(3.0, 0.0, -1.0), Quat::from_rotation_z(1.0), Vec3::splat(2.0));
    for policy in [InversionPolicy::Error, InversionPolicy::WarnIdentity] {
        let inverse = math::invert(&m, policy).unwrap();
        assert!((m * inverse).abs_diff_eq(Mat4::IDENTITY, 1e-5));
    }
}

#[test]
fn normalize_zero_vector_falls_back() {
    assert_eq!(math::normalize_or(Vec3::ZERO, Vec3::Y), Vec3::Y);
    let err = math::try_normalize(Vec3::ZERO, "test", InversionPolicy::Error).unwrap_err();
    assert!(matches!(err, ArborError::ZeroLengthVector { .. }));
}

// ============================================================================
// look_at
// ============================================================================

#[test]
fn look_at_points_negative_z_at_target() {
    let eye = Vec3::new(0.0, 0.0, 5.0);
    let m = math::look_at(eye, Vec3::ZERO, Vec3::Y);
    let forward = -m.z_axis.truncate();
    assert!(vec3_approx(forward, Vec3::NEG_Z));

    let m = math::look_at(Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0), Vec3::Y);
    let forward = -m.z_axis.truncate();
    assert!(vec3_approx(forward, Vec3::X));
}

#[test]
fn look_at_degenerate_never_nan() {
    // Eye on the target, and up parallel to the view direction.
    let m = math::look_at(Vec3::ONE, Vec3::ONE, Vec3::Y);
    assert!(m.is_finite());
    let m = math::look_at(Vec3::ZERO, Vec3::new(0.0, 10.0, 0.0), Vec3::Y);
    assert!(m.is_finite());
    assert!(approx_eq(m.z_axis.truncate().length(), 1.0));
}
