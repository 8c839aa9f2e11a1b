//! Skeleton and skinning tests
//!
//! Tests for:
//! - Skin weight normalization
//! - Inverse bind matrices derived from the current pose
//! - Bone palette layout (row-major / column-major)
//! - Restoring the bind pose
//! - Attached / detached bind modes
//! - CPU skinning of a single vertex

use arbor::prelude::*;
use arbor::resources::normalize_skin_weight;
use arbor::{ArborError, BoneMatrixLayout, SceneSettings, SkeletonKey};

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

struct Rig {
    root_bone: NodeHandle,
    tip_bone: NodeHandle,
    mesh: NodeHandle,
    skeleton: SkeletonKey,
}

/// Two stacked bones at y = 1 and y = 2, and a one-triangle mesh whose
/// vertices follow bone 0, bone 1 and an even blend of both.
fn rig(scene: &mut Scene) -> Rig {
    let root_bone = scene
        .build_node("hip")
        .with_kind(NodeKind::Bone)
        .with_position(0.0, 1.0, 0.0)
        .build()
        .unwrap();
    let tip_bone = scene
        .build_node("spine")
        .with_kind(NodeKind::Bone)
        .with_position(0.0, 1.0, 0.0)
        .with_parent(root_bone)
        .build()
        .unwrap();
    scene.update_matrix_world();

    let mut geometry = BufferGeometry::new();
    geometry.set_attribute(
        attr::POSITION,
        BufferAttribute::from_vec3(&[
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 2.0, 0.0),
            Vec3::new(1.0, 1.5, 0.0),
        ]),
    );
    geometry.set_attribute(
        attr::SKIN_INDEX,
        BufferAttribute::from_vec4(&[Vec4::ZERO, Vec4::new(1.0, 0.0, 0.0, 0.0), Vec4::new(0.0, 1.0, 0.0, 0.0)]),
    );
    geometry.set_attribute(
        attr::SKIN_WEIGHT,
        BufferAttribute::from_vec4(&[Vec4::X, Vec4::X, Vec4::new(2.0, 2.0, 0.0, 0.0)]),
    );
    let geometry = scene.add_geometry(geometry);
    let material = scene.add_material(Material::new());
    let mesh = scene.add_mesh(geometry, material);

    let skeleton = scene
        .create_skeleton("rig", vec![Some(root_bone), Some(tip_bone)], None)
        .unwrap();
    scene.bind_skeleton(mesh, skeleton, None).unwrap();

    Rig {
        root_bone,
        tip_bone,
        mesh,
        skeleton,
    }
}

// ============================================================================
// Skin Weights
// ============================================================================

#[test]
fn normalize_weights_to_unit_sum() {
    let w = normalize_skin_weight(Vec4::new(2.0, 2.0, 0.0, 0.0));
    assert_eq!(w, Vec4::new(0.5, 0.5, 0.0, 0.0));
}

#[test]
fn zero_weights_bind_to_first_bone() {
    assert_eq!(normalize_skin_weight(Vec4::ZERO), Vec4::new(1.0, 0.0, 0.0, 0.0));
}

#[test]
fn scene_normalizes_mesh_weights() {
    let mut scene = Scene::new();
    let rig = rig(&mut scene);
    scene.normalize_skin_weights(rig.mesh).unwrap();

    let key = scene.get_node(rig.mesh).unwrap().geometry.unwrap();
    let weights = scene.geometry(key).unwrap().skin_attribute(attr::SKIN_WEIGHT, 2).unwrap();
    assert_eq!(weights, Vec4::new(0.5, 0.5, 0.0, 0.0));
}

#[test]
fn normalize_on_plain_mesh_is_rejected() {
    let mut scene = Scene::new();
    let geometry = scene.add_geometry(create_box(1.0, 1.0, 1.0));
    let material = scene.add_material(Material::new());
    let mesh = scene.add_mesh(geometry, material);
    assert!(matches!(
        scene.normalize_skin_weights(mesh),
        Err(ArborError::NotASkinnedMesh(_))
    ));
}

// ============================================================================
// Skeleton
// ============================================================================

#[test]
fn created_skeleton_starts_at_identity_offsets() {
    let mut scene = Scene::new();
    let rig = rig(&mut scene);
    scene.update();

    let skeleton = scene.skeleton(rig.skeleton).unwrap();
    assert_eq!(skeleton.bone_count(), 2);
    for offset in skeleton.bone_offsets() {
        assert!(offset.abs_diff_eq(Mat4::IDENTITY, 1e-5));
    }
    assert!(skeleton.bone_inverses()[1]
        .abs_diff_eq(Mat4::from_translation(Vec3::new(0.0, -2.0, 0.0)), 1e-5));
    assert_eq!(skeleton.bone_matrices().len(), 32);
    assert_eq!(skeleton.bone_matrices_bytes().len(), 32 * 4);
}

#[test]
fn moving_a_bone_moves_its_children() {
    let mut scene = Scene::new();
    let rig = rig(&mut scene);

    scene.get_node_mut(rig.root_bone).unwrap().transform.position.x = 1.0;
    scene.update();

    let skeleton = scene.skeleton(rig.skeleton).unwrap();
    let expected = Mat4::from_translation(Vec3::X);
    for offset in skeleton.bone_offsets() {
        assert!(offset.abs_diff_eq(expected, 1e-5));
    }

    // Row-major by default: translation sits at the end of the first row.
    let m = skeleton.bone_matrices();
    assert!(approx_eq(m[3], 1.0));
    assert!(approx_eq(m[12], 0.0));
}

#[test]
fn column_major_layout_matches_glam() {
    let settings = SceneSettings {
        bone_matrix_layout: BoneMatrixLayout::ColumnMajor,
        ..Default::default()
    };
    let mut scene = Scene::with_settings(settings);
    let rig = rig(&mut scene);

    scene.get_node_mut(rig.root_bone).unwrap().transform.position.z = -2.0;
    scene.update();

    let skeleton = scene.skeleton(rig.skeleton).unwrap();
    let m = skeleton.bone_matrices();
    assert_eq!(&m[..16], &skeleton.bone_offsets()[0].to_cols_array());
    assert!(approx_eq(m[14], -2.0));
}

#[test]
fn explicit_inverse_count_must_match() {
    let mut scene = Scene::new();
    let bone = scene.add_node(Node::bone());
    let err = scene
        .create_skeleton("bad", vec![Some(bone), None], Some(vec![Mat4::IDENTITY]))
        .unwrap_err();
    assert_eq!(err, ArborError::BoneInverseMismatch { bones: 2, inverses: 1 });
}

#[test]
fn skeleton_keeps_bone_order() {
    let mut scene = Scene::new();
    let rig = rig(&mut scene);
    let skeleton = scene.skeleton(rig.skeleton).unwrap();
    assert_eq!(skeleton.bones(), &[Some(rig.root_bone), Some(rig.tip_bone)]);
    assert_eq!(skeleton.name, "rig");
    assert_eq!(scene.find_bone(rig.skeleton, "spine"), Some(rig.tip_bone));
    assert_eq!(scene.find_bone(rig.skeleton, "tail"), None);
}

#[test]
fn removed_bone_falls_back_to_identity() {
    let mut scene = Scene::new();
    let rig = rig(&mut scene);

    scene.remove_node(rig.tip_bone).unwrap();
    scene.update();

    let skeleton = scene.skeleton(rig.skeleton).unwrap();
    let inverse = skeleton.bone_inverses()[1];
    assert!(skeleton.bone_offsets()[1].abs_diff_eq(inverse, 1e-6));
    assert!(scene.diagnostics().is_empty());
}

#[test]
fn pose_restores_bind_pose() {
    let mut scene = Scene::new();
    let rig = rig(&mut scene);

    {
        let t = &mut scene.get_node_mut(rig.root_bone).unwrap().transform;
        t.position = Vec3::new(3.0, 0.0, 0.0);
        t.rotation = Quat::from_rotation_z(0.5);
    }
    scene.get_node_mut(rig.tip_bone).unwrap().transform.scale = Vec3::splat(2.0);
    scene.update();

    scene.pose(rig.mesh).unwrap();
    scene.update();

    let root = scene.get_node(rig.root_bone).unwrap();
    assert!(vec3_approx(root.transform.position, Vec3::new(0.0, 1.0, 0.0)));
    assert!(vec3_approx(root.transform.scale, Vec3::ONE));

    let tip = scene.get_node(rig.tip_bone).unwrap();
    assert!(vec3_approx(tip.transform.position, Vec3::new(0.0, 1.0, 0.0)));
    assert!(vec3_approx(tip.world_matrix().w_axis.truncate(), Vec3::new(0.0, 2.0, 0.0)));

    for offset in scene.skeleton(rig.skeleton).unwrap().bone_offsets() {
        assert!(offset.abs_diff_eq(Mat4::IDENTITY, 1e-4));
    }
}

// ============================================================================
// Skinned Mesh
// ============================================================================

#[test]
fn bind_requires_mesh_node() {
    let mut scene = Scene::new();
    let group = scene.create_node();
    let bone = scene.add_node(Node::bone());
    let skeleton = scene.create_skeleton("rig", vec![Some(bone)], None).unwrap();
    assert!(matches!(
        scene.bind_skeleton(group, skeleton, None),
        Err(ArborError::NotASkinnedMesh(_))
    ));
}

#[test]
fn bound_mesh_becomes_skinned() {
    let mut scene = Scene::new();
    let rig = rig(&mut scene);
    let node = scene.get_node(rig.mesh).unwrap();
    let binding = node.skin().unwrap();
    assert_eq!(binding.skeleton, rig.skeleton);
    assert_eq!(binding.bind_mode, BindMode::Attached);
    assert!(node.is_mesh());
}

#[test]
fn skinned_vertices_follow_their_bones() {
    let mut scene = Scene::new();
    let rig = rig(&mut scene);
    scene.normalize_skin_weights(rig.mesh).unwrap();

    // Rest pose: vertices stay where they are.
    scene.update();
    assert!(vec3_approx(
        scene.skinned_vertex_position(rig.mesh, 1).unwrap(),
        Vec3::new(0.0, 2.0, 0.0)
    ));

    // Lift only the tip bone.
    scene.get_node_mut(rig.tip_bone).unwrap().transform.position.y = 2.0;
    scene.update();

    let v0 = scene.skinned_vertex_position(rig.mesh, 0).unwrap();
    let v1 = scene.skinned_vertex_position(rig.mesh, 1).unwrap();
    let v2 = scene.skinned_vertex_position(rig.mesh, 2).unwrap();
    assert!(vec3_approx(v0, Vec3::new(0.0, 1.0, 0.0)));
    assert!(vec3_approx(v1, Vec3::new(0.0, 3.0, 0.0)));
    // Half the lift for the blended vertex.
    assert!(vec3_approx(v2, Vec3::new(1.0, 2.0, 0.0)));

    assert!(matches!(
        scene.skinned_vertex_position(rig.mesh, 3),
        Err(ArborError::IndexOutOfRange { .. })
    ));
}

#[test]
fn attached_and_detached_bind_modes() {
    let mut scene = Scene::new();
    let rig = rig(&mut scene);

    // Attached: the inverse bind matrix follows the mesh.
    scene.get_node_mut(rig.mesh).unwrap().transform.position = Vec3::new(5.0, 0.0, 0.0);
    scene.update();
    let binding = scene.get_node(rig.mesh).unwrap().skin().unwrap();
    assert!(binding
        .bind_matrix_inverse
        .abs_diff_eq(Mat4::from_translation(Vec3::new(-5.0, 0.0, 0.0)), 1e-5));

    // Detached: frozen from now on.
    scene.set_bind_mode(rig.mesh, BindMode::Detached).unwrap();
    scene.get_node_mut(rig.mesh).unwrap().transform.position = Vec3::new(9.0, 0.0, 0.0);
    scene.update();
    let binding = scene.get_node(rig.mesh).unwrap().skin().unwrap();
    assert!(binding
        .bind_matrix_inverse
        .abs_diff_eq(Mat4::from_translation(Vec3::new(-5.0, 0.0, 0.0)), 1e-5));
}

#[test]
fn explicit_bind_matrix_is_kept() {
    let mut scene = Scene::new();
    let geometry = scene.add_geometry(create_box(1.0, 1.0, 1.0));
    let material = scene.add_material(Material::new());
    let mesh = scene.add_mesh(geometry, material);
    let bone = scene.add_node(Node::bone());
    let skeleton = scene.create_skeleton("rig", vec![Some(bone)], None).unwrap();

    let bind = Mat4::from_scale(Vec3::splat(2.0));
    scene.bind_skeleton(mesh, skeleton, Some(bind)).unwrap();

    let binding = scene.get_node(mesh).unwrap().skin().unwrap();
    assert_eq!(binding.bind_matrix, bind);
    assert!(binding
        .bind_matrix_inverse
        .abs_diff_eq(Mat4::from_scale(Vec3::splat(0.5)), 1e-6));
}
