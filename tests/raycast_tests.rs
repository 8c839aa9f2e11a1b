//! Ray casting tests
//!
//! Tests for:
//! - Triangle hits: distance, point, UV and face data
//! - Side culling (front, back, double)
//! - Result ordering and near / far clipping
//! - Lines (strip and segment pairs) and points with pick thresholds
//! - Morph target influences
//! - Geometry groups limiting which triangles can be hit
//! - Visibility filtering and per-node diagnostics

use arbor::prelude::*;
use arbor::resources::MorphTarget;
use arbor::{ArborError, Diagnostics, LineMode, PlaneOptions, RaycastParams};

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

/// Counter-clockwise triangle facing +Z, with UVs.
fn triangle_geometry() -> BufferGeometry {
    let mut geometry = BufferGeometry::new();
    geometry.set_attribute(
        attr::POSITION,
        BufferAttribute::from_vec3(&[
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ]),
    );
    geometry.set_attribute(
        attr::UV,
        BufferAttribute::from_vec2(&[Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(0.5, 1.0)]),
    );
    geometry
}

/// The same triangle wound clockwise as seen from +Z.
fn flipped_triangle_geometry() -> BufferGeometry {
    let mut geometry = BufferGeometry::new();
    geometry.set_attribute(
        attr::POSITION,
        BufferAttribute::from_vec3(&[
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
        ]),
    );
    geometry
}

fn mesh_with(scene: &mut Scene, geometry: BufferGeometry, side: Side) -> NodeHandle {
    let geometry = scene.add_geometry(geometry);
    let material = scene.add_material(Material::new().with_side(side));
    scene.add_mesh(geometry, material)
}

fn from_front() -> Raycaster {
    Raycaster::from_origin_direction(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z)
}

// ============================================================================
// Meshes
// ============================================================================

#[test]
fn ray_hits_triangle_with_uv() {
    let mut scene = Scene::new();
    let mesh = mesh_with(&mut scene, triangle_geometry(), Side::Front);
    scene.update();

    let hits = from_front().intersect_object(&scene, mesh, false);
    assert_eq!(hits.len(), 1);

    let hit = &hits[0];
    assert!(approx_eq(hit.distance, 5.0));
    assert!(vec3_approx(hit.point, Vec3::ZERO));
    assert_eq!(hit.object, mesh);
    assert_eq!(hit.face_index, Some(0));

    let uv = hit.uv.unwrap();
    assert!(approx_eq(uv.x, 0.5));
    assert!(approx_eq(uv.y, 0.5));

    let face = hit.face.unwrap();
    assert_eq!((face.a, face.b, face.c), (0, 1, 2));
    assert!(vec3_approx(face.normal, Vec3::Z));
    assert_eq!(face.material_index, 0);
}

#[test]
fn ray_beside_triangle_misses() {
    let mut scene = Scene::new();
    let mesh = mesh_with(&mut scene, triangle_geometry(), Side::Double);
    scene.update();

    let raycaster = Raycaster::from_origin_direction(Vec3::new(0.9, 0.9, 5.0), Vec3::NEG_Z);
    assert!(raycaster.intersect_object(&scene, mesh, false).is_empty());

    // Pointing away from the triangle
    let raycaster = Raycaster::from_origin_direction(Vec3::new(0.0, 0.0, 5.0), Vec3::Z);
    assert!(raycaster.intersect_object(&scene, mesh, false).is_empty());
}

#[test]
fn front_side_culls_flipped_winding() {
    let mut scene = Scene::new();
    let mesh = mesh_with(&mut scene, flipped_triangle_geometry(), Side::Front);
    scene.update();
    assert!(from_front().intersect_object(&scene, mesh, false).is_empty());
}

#[test]
fn back_side_hits_only_flipped_winding() {
    let mut scene = Scene::new();
    let flipped = mesh_with(&mut scene, flipped_triangle_geometry(), Side::Back);
    let regular = mesh_with(&mut scene, triangle_geometry(), Side::Back);
    scene.update();

    assert_eq!(from_front().intersect_object(&scene, flipped, false).len(), 1);
    assert!(from_front().intersect_object(&scene, regular, false).is_empty());
}

#[test]
fn double_side_hits_both_windings() {
    let mut scene = Scene::new();
    let a = mesh_with(&mut scene, flipped_triangle_geometry(), Side::Double);
    let b = mesh_with(&mut scene, triangle_geometry(), Side::Double);
    scene.update();

    assert_eq!(from_front().intersect_objects(&scene, &[a, b], false).len(), 2);
}

#[test]
fn missing_material_defaults_to_front() {
    let mut scene = Scene::new();
    let geometry = scene.add_geometry(triangle_geometry());
    let mesh = scene.build_node("bare").with_geometry(geometry).build().unwrap();
    scene.update();
    assert_eq!(from_front().intersect_object(&scene, mesh, false).len(), 1);
}

#[test]
fn hits_are_sorted_by_distance() {
    let mut scene = Scene::new();
    let far = mesh_with(&mut scene, triangle_geometry(), Side::Front);
    let near = mesh_with(&mut scene, triangle_geometry(), Side::Front);
    scene.get_node_mut(far).unwrap().transform.position.z = -2.0;
    scene.get_node_mut(near).unwrap().transform.position.z = 1.0;
    scene.update();

    let hits = from_front().intersect_objects(&scene, &[far, near], false);
    let distances: Vec<f32> = hits.iter().map(|h| h.distance).collect();
    assert_eq!(hits.len(), 2);
    assert!(approx_eq(distances[0], 4.0));
    assert!(approx_eq(distances[1], 7.0));
    assert_eq!(hits[0].object, near);
    assert_eq!(hits[1].object, far);
}

#[test]
fn near_and_far_clip_hits() {
    let mut scene = Scene::new();
    let mesh = mesh_with(&mut scene, triangle_geometry(), Side::Front);
    scene.update();

    let mut raycaster = from_front();
    raycaster.far = 4.0;
    assert!(raycaster.intersect_object(&scene, mesh, false).is_empty());

    raycaster.far = f32::INFINITY;
    raycaster.near = 6.0;
    assert!(raycaster.intersect_object(&scene, mesh, false).is_empty());

    raycaster.near = 0.0;
    assert_eq!(raycaster.intersect_object(&scene, mesh, false).len(), 1);
}

#[test]
fn scaled_and_rotated_mesh_reports_world_distance() {
    let mut scene = Scene::new();
    let mesh = mesh_with(&mut scene, triangle_geometry(), Side::Front);
    {
        let t = &mut scene.get_node_mut(mesh).unwrap().transform;
        t.scale = Vec3::splat(3.0);
        t.position = Vec3::new(0.0, 0.0, -1.0);
    }
    scene.update();

    let hits = from_front().intersect_object(&scene, mesh, false);
    assert_eq!(hits.len(), 1);
    assert!(approx_eq(hits[0].distance, 6.0));
    assert!(vec3_approx(hits[0].point, Vec3::new(0.0, 0.0, -1.0)));
}

#[test]
fn recursive_includes_children() {
    let mut scene = Scene::new();
    let parent = scene.create_node();
    let geometry = scene.add_geometry(triangle_geometry());
    let material = scene.add_material(Material::new());
    let child = scene.add_mesh_to_parent(geometry, material, parent).unwrap();
    scene.update();

    assert!(from_front().intersect_object(&scene, parent, false).is_empty());
    let hits = from_front().intersect_object(&scene, parent, true);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].object, child);
}

#[test]
fn draw_range_limits_triangles() {
    let mut geometry = create_plane(PlaneOptions::default());
    geometry.set_draw_range(0, 3);

    let mut scene = Scene::new();
    let mesh = mesh_with(&mut scene, geometry, Side::Front);
    scene.update();

    // The plane's first triangle covers the top-left half.
    let hit_first = Raycaster::from_origin_direction(Vec3::new(-0.25, 0.25, 5.0), Vec3::NEG_Z);
    let hit_second = Raycaster::from_origin_direction(Vec3::new(0.25, -0.25, 5.0), Vec3::NEG_Z);
    assert_eq!(hit_first.intersect_object(&scene, mesh, false).len(), 1);
    assert!(hit_second.intersect_object(&scene, mesh, false).is_empty());
}

#[test]
fn triangles_outside_every_group_are_not_hit() {
    let mut geometry = create_plane(PlaneOptions::default());
    geometry.add_group(0, 3, 0);

    let mut scene = Scene::new();
    let mesh = mesh_with(&mut scene, geometry, Side::Front);
    scene.update();

    let grouped = Raycaster::from_origin_direction(Vec3::new(-0.25, 0.25, 5.0), Vec3::NEG_Z);
    let ungrouped = Raycaster::from_origin_direction(Vec3::new(0.25, -0.25, 5.0), Vec3::NEG_Z);
    let hits = grouped.intersect_object(&scene, mesh, false);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].face.unwrap().material_index, 0);
    assert!(ungrouped.intersect_object(&scene, mesh, false).is_empty());
}

#[test]
fn morph_influence_moves_hit() {
    let mut geometry = triangle_geometry();
    geometry.add_morph_attribute(
        attr::POSITION,
        BufferAttribute::from_vec3(&[
            Vec3::new(-1.0, -1.0, 1.0),
            Vec3::new(1.0, -1.0, 1.0),
            Vec3::new(0.0, 1.0, 1.0),
        ]),
    );

    let mut scene = Scene::new();
    let mesh = mesh_with(&mut scene, geometry, Side::Front);
    scene.update();

    let hits = from_front().intersect_object(&scene, mesh, false);
    assert!(approx_eq(hits[0].distance, 5.0));

    scene.get_node_mut(mesh).unwrap().morph_target_influences = vec![0.5];
    let hits = from_front().intersect_object(&scene, mesh, false);
    assert!(approx_eq(hits[0].distance, 4.5));

    scene.get_node_mut(mesh).unwrap().morph_target_influences = vec![1.0];
    let hits = from_front().intersect_object(&scene, mesh, false);
    assert!(approx_eq(hits[0].distance, 4.0));
}

// ============================================================================
// Lines & Points
// ============================================================================

/// Four collinear vertices on the x axis: -3, -1, 1, 3.
fn line_geometry() -> BufferGeometry {
    let mut geometry = BufferGeometry::new();
    geometry.set_attribute(
        attr::POSITION,
        BufferAttribute::from_vec3(&[
            Vec3::new(-3.0, 0.0, 0.0),
            Vec3::new(-1.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(3.0, 0.0, 0.0),
        ]),
    );
    geometry
}

#[test]
fn line_strip_connects_every_vertex() {
    let mut scene = Scene::new();
    let geometry = scene.add_geometry(line_geometry());
    let line = scene.add_node(Node::line(geometry, LineMode::Strip));
    scene.update();

    let mut raycaster = from_front();
    raycaster.params.line_threshold = 0.1;
    let hits = raycaster.intersect_object(&scene, line, false);

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].index, Some(1));
    assert!(approx_eq(hits[0].distance, 5.0));
    assert!(vec3_approx(hits[0].point, Vec3::ZERO));
}

#[test]
fn line_segments_leave_gaps() {
    let mut scene = Scene::new();
    let geometry = scene.add_geometry(line_geometry());
    let line = scene.add_node(Node::line(geometry, LineMode::Segments));
    scene.update();

    let mut raycaster = from_front();
    raycaster.params.line_threshold = 0.1;
    assert!(raycaster.intersect_object(&scene, line, false).is_empty());

    // A wide threshold reaches the segment ends on both sides.
    raycaster.params.line_threshold = 1.5;
    let hits = raycaster.intersect_object(&scene, line, false);
    let indices: Vec<_> = hits.iter().filter_map(|h| h.index).collect();
    assert_eq!(hits.len(), 2);
    assert!(indices.contains(&0));
    assert!(indices.contains(&2));
}

#[test]
fn line_threshold_outside_bounding_box() {
    let mut scene = Scene::new();
    let geometry = scene.add_geometry(line_geometry());
    let line = scene.add_node(Node::line(geometry, LineMode::Strip));
    if let Some(g) = scene.geometry_mut(geometry) {
        g.compute_bounding_box().unwrap();
    }
    scene.update();

    // Passes above the flat line's box but within the threshold.
    let raycaster = Raycaster {
        params: RaycastParams {
            line_threshold: 1.0,
            ..Default::default()
        },
        ..Raycaster::from_origin_direction(Vec3::new(0.0, 0.5, 5.0), Vec3::NEG_Z)
    };
    assert_eq!(raycaster.intersect_object(&scene, line, false).len(), 1);
}

#[test]
fn points_threshold_scales_with_node() {
    let mut geometry = BufferGeometry::new();
    geometry.set_attribute(
        attr::POSITION,
        BufferAttribute::from_vec3(&[Vec3::ZERO, Vec3::new(5.0, 0.0, 0.0), Vec3::new(10.0, 0.0, 0.0)]),
    );

    let mut scene = Scene::new();
    let geometry = scene.add_geometry(geometry);
    let points = scene.add_node(Node::points(geometry));
    scene.get_node_mut(points).unwrap().transform.scale = Vec3::splat(2.0);
    scene.update();

    // Local threshold is 1 / 2; the ray passes 0.4 local units from point 1.
    let close = Raycaster::from_origin_direction(Vec3::new(10.0, 0.8, 10.0), Vec3::NEG_Z);
    let hits = close.intersect_object(&scene, points, false);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].index, Some(1));
    assert!(approx_eq(hits[0].distance, 10.0));
    assert!(approx_eq(hits[0].distance_to_ray.unwrap(), 0.4));

    let wide = Raycaster::from_origin_direction(Vec3::new(10.0, 1.2, 10.0), Vec3::NEG_Z);
    assert!(wide.intersect_object(&scene, points, false).is_empty());
}

// ============================================================================
// Visibility & Diagnostics
// ============================================================================

#[test]
fn invisible_nodes_are_tested_unless_filtered() {
    let mut scene = Scene::new();
    let parent = scene.create_node();
    let geometry = scene.add_geometry(triangle_geometry());
    let material = scene.add_material(Material::new());
    scene.add_mesh_to_parent(geometry, material, parent).unwrap();
    scene.get_node_mut(parent).unwrap().visible = false;
    scene.update();

    let mut raycaster = from_front();
    assert_eq!(raycaster.intersect_object(&scene, parent, true).len(), 1);

    raycaster.visible_only = true;
    assert!(raycaster.intersect_object(&scene, parent, true).is_empty());
}

#[test]
fn hidden_material_is_skipped_by_visible_only() {
    let mut scene = Scene::new();
    let geometry = scene.add_geometry(triangle_geometry());
    let material = scene.add_material(Material::new().with_visible(false));
    let mesh = scene.add_mesh(geometry, material);
    scene.update();

    let mut raycaster = from_front();
    assert_eq!(raycaster.intersect_object(&scene, mesh, false).len(), 1);

    raycaster.visible_only = true;
    assert!(raycaster.intersect_object(&scene, mesh, false).is_empty());
}

#[test]
fn broken_nodes_are_reported_and_skipped() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut scene = Scene::new();
    let good = mesh_with(&mut scene, triangle_geometry(), Side::Front);

    let doomed = scene.add_geometry(triangle_geometry());
    let material = scene.add_material(Material::new());
    let broken = scene.add_mesh(doomed, material);
    scene.remove_geometry(doomed);

    let stale = scene.create_node();
    scene.remove_node(stale).unwrap();
    scene.update();

    let mut diagnostics = Diagnostics::new();
    let hits = from_front().intersect_objects_with_diagnostics(
        &scene,
        &[good, broken, stale],
        false,
        &mut diagnostics,
    );

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].object, good);
    assert_eq!(diagnostics.len(), 2);
    assert!(matches!(
        diagnostics.for_node(broken).next(),
        Some(ArborError::GeometryNotFound(_))
    ));
    assert!(matches!(
        diagnostics.for_node(stale).next(),
        Some(ArborError::NodeNotFound(_))
    ));
}

#[test]
fn out_of_range_index_is_reported() {
    let mut geometry = triangle_geometry();
    geometry.set_index(Some(vec![0, 1, 7]));
    geometry.bounding_sphere = Some(BoundingSphere::new(Vec3::ZERO, 2.0));

    let mut scene = Scene::new();
    let mesh = mesh_with(&mut scene, geometry, Side::Front);
    scene.update();

    let mut diagnostics = Diagnostics::new();
    let hits = from_front().intersect_object_with_diagnostics(&scene, mesh, false, &mut diagnostics);
    assert!(hits.is_empty());
    assert!(matches!(
        diagnostics.for_node(mesh).next(),
        Some(ArborError::IndexOutOfRange { index: 7, .. })
    ));
}

#[test]
fn failing_node_keeps_none_of_its_hits() {
    let mut geometry = triangle_geometry();
    // The first triangle is hit before the second one turns out to be broken.
    geometry.set_index(Some(vec![0, 1, 2, 0, 1, 9]));
    geometry.bounding_sphere = Some(BoundingSphere::new(Vec3::ZERO, 2.0));

    let mut scene = Scene::new();
    let mesh = mesh_with(&mut scene, geometry, Side::Front);
    let good = mesh_with(&mut scene, triangle_geometry(), Side::Front);
    scene.update();

    let mut diagnostics = Diagnostics::new();
    let hits = from_front().intersect_objects_with_diagnostics(&scene, &[mesh, good], false, &mut diagnostics);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].object, good);
    assert!(matches!(
        diagnostics.for_node(mesh).next(),
        Some(ArborError::IndexOutOfRange { index: 9, .. })
    ));
}

#[test]
fn short_morph_target_is_reported_instead_of_panicking() {
    let mut geometry = FaceGeometry::from_parts(
        vec![Vec3::new(-1.0, -1.0, 0.0), Vec3::new(1.0, -1.0, 0.0), Vec3::new(0.0, 1.0, 0.0)],
        vec![Face3::new(0, 1, 2)],
    );
    geometry
        .morph_targets
        .push(MorphTarget::new("short", vec![Vec3::new(-1.0, -1.0, 1.0)]));
    assert!(matches!(
        geometry.compute_bounding_box(),
        Err(ArborError::AttributeCountMismatch { expected: 3, found: 1, .. })
    ));
    geometry.bounding_sphere = Some(BoundingSphere::new(Vec3::ZERO, 2.0));

    let mut scene = Scene::new();
    let geometry = scene.add_geometry(geometry);
    let material = scene.add_material(Material::new());
    let mesh = scene.add_mesh(geometry, material);
    scene.get_node_mut(mesh).unwrap().morph_target_influences = vec![1.0];
    scene.update();

    let mut diagnostics = Diagnostics::new();
    let hits = from_front().intersect_object_with_diagnostics(&scene, mesh, false, &mut diagnostics);
    assert!(hits.is_empty());
    assert!(matches!(
        diagnostics.for_node(mesh).next(),
        Some(ArborError::AttributeCountMismatch { found: 1, .. })
    ));

    // Without influence the short target is never read.
    scene.get_node_mut(mesh).unwrap().morph_target_influences = vec![0.0];
    assert_eq!(from_front().intersect_object(&scene, mesh, false).len(), 1);
}
