//! 3D scene management
//!
//! The overlay engine owns the scene graph; this module mirrors every node
//! with a visual onto a flat set of Bevy entities each frame, using the
//! engine's world matrices directly.

use bevy::prelude::*;
use callout_core::glam;
use callout_core::{NodeId, Shape, Visual};
use std::collections::HashMap;
use std::f32::consts::FRAC_PI_2;

use crate::app::{Overlay, OverlaySet};

pub struct ScenePlugin;

impl Plugin for ScenePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CameraSettings>()
            .init_resource::<RenderMap>()
            .add_systems(Startup, setup_scene)
            .add_systems(
                Update,
                (focus_camera_on_model, update_camera, mirror_overlay)
                    .chain()
                    .in_set(OverlaySet::Mirror),
            );
    }
}

/// Orbit camera settings (Y up)
#[derive(Debug, Clone, Resource)]
pub struct CameraSettings {
    pub distance: f32,
    pub target_distance: f32,
    pub azimuth: f32,
    pub elevation: f32,
    pub target: Vec3,
    pub target_focus: Vec3,
    pub sensitivity: f32,
    pub zoom_speed: f32,
    pub smooth_factor: f32,
    /// Set once the camera has been aimed at the loaded model
    pub focused: bool,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            distance: 4.0,
            target_distance: 4.0,
            azimuth: 0.5,
            elevation: 0.35,
            target: Vec3::ZERO,
            target_focus: Vec3::ZERO,
            sensitivity: 0.005,
            zoom_speed: 0.1,
            smooth_factor: 0.15,
            focused: false,
        }
    }
}

/// Marker component for the main camera
#[derive(Component)]
pub struct MainCamera;

/// Render entity standing in for an engine node
#[derive(Component)]
pub struct MirroredNode(pub NodeId);

/// Engine node to render entity
#[derive(Debug, Default, Resource)]
pub struct RenderMap {
    entities: HashMap<NodeId, Entity>,
}

pub fn to_bevy(v: glam::Vec3) -> Vec3 {
    Vec3::from_array(v.to_array())
}

pub fn to_engine(v: Vec3) -> glam::Vec3 {
    glam::Vec3::from_array(v.to_array())
}

fn to_bevy_transform(matrix: &glam::Affine3A) -> Transform {
    let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
    Transform {
        translation: to_bevy(translation),
        rotation: Quat::from_array(rotation.to_array()),
        scale: to_bevy(scale),
    }
}

fn mesh_for(shape: &Shape) -> Mesh {
    match shape {
        Shape::Box { size } => Mesh::from(Cuboid::new(size.x, size.y, size.z)),
        Shape::Sphere { radius } => Mesh::from(Sphere::new(*radius)),
        Shape::Cylinder { radius, height } => Mesh::from(Cylinder::new(*radius, *height)),
        // Bevy cones point up +Y; the engine's tip points along -Z
        Shape::Cone { radius, height } => {
            Mesh::from(Cone::new(*radius, *height)).rotated_by(Quat::from_rotation_x(-FRAC_PI_2))
        }
        Shape::Panel { width, height } => Mesh::from(Cuboid::new(*width, *height, callout_core::graph::PANEL_DEPTH)),
        // Glyphs are drawn by the UI; the node renders as a backing plate
        Shape::Text { .. } => {
            let size = shape.local_bounds().size();
            Mesh::from(Cuboid::new(size.x, size.y, size.z))
        }
    }
}

fn material_for(visual: &Visual) -> StandardMaterial {
    let [r, g, b, a] = visual.color;
    let (base_color, alpha_mode) = match visual.shape {
        Shape::Text { .. } => (Color::linear_rgba(0.05, 0.05, 0.08, 0.6), AlphaMode::Blend),
        _ if a < 1.0 => (Color::linear_rgba(r, g, b, a), AlphaMode::Blend),
        _ => (Color::linear_rgba(r, g, b, a), AlphaMode::Opaque),
    };
    StandardMaterial {
        base_color,
        alpha_mode,
        unlit: visual.unlit,
        perceptual_roughness: 0.6,
        ..default()
    }
}

fn setup_scene(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    commands.spawn((
        Camera3d::default(),
        Projection::Perspective(PerspectiveProjection {
            near: 0.01,
            far: 200.0,
            ..default()
        }),
        Transform::from_xyz(2.0, 2.0, 4.0).looking_at(Vec3::ZERO, Vec3::Y),
        MainCamera,
    ));

    commands.insert_resource(AmbientLight {
        color: Color::srgb(0.9, 0.95, 1.0),
        brightness: 300.0,
        ..default()
    });

    commands.spawn((
        DirectionalLight {
            illuminance: 5000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(2.0, 4.0, 2.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    commands.spawn((
        PointLight {
            intensity: 200000.0,
            shadows_enabled: false,
            color: Color::srgb(1.0, 0.95, 0.9),
            ..default()
        },
        Transform::from_xyz(0.0, 3.0, 0.0),
    ));

    // Floor the model is grounded on
    commands.spawn((
        Mesh3d(meshes.add(Plane3d::default().mesh().size(20.0, 20.0))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgb(0.18, 0.19, 0.22),
            perceptual_roughness: 0.9,
            ..default()
        })),
        Transform::IDENTITY,
    ));
}

/// Aim the orbit camera at the model once it has been loaded
fn focus_camera_on_model(overlay: Res<Overlay>, mut settings: ResMut<CameraSettings>) {
    if settings.focused {
        return;
    }
    let graph = overlay.view.graph();
    let Some(bounds) = overlay.view.root().and_then(|root| graph.world_bounds(root)) else {
        return;
    };

    let center = to_bevy(bounds.center());
    let distance = (bounds.size().length() * 1.6).clamp(0.5, 50.0);
    settings.target = center;
    settings.target_focus = center;
    settings.distance = distance;
    settings.target_distance = distance;
    settings.focused = true;
}

fn update_camera(
    mut camera_query: Query<&mut Transform, With<MainCamera>>,
    mut settings: ResMut<CameraSettings>,
    time: Res<Time>,
) {
    // Smooth interpolation for zoom and target
    let dt = time.delta_secs();
    let lerp_factor = 1.0 - (-settings.smooth_factor * 60.0 * dt).exp();
    settings.distance = settings.distance + (settings.target_distance - settings.distance) * lerp_factor;
    settings.target = settings.target + (settings.target_focus - settings.target) * lerp_factor;

    if let Ok(mut transform) = camera_query.single_mut() {
        // Spherical coordinates with Y up
        let x = settings.distance * settings.elevation.cos() * settings.azimuth.sin();
        let y = settings.distance * settings.elevation.sin();
        let z = settings.distance * settings.elevation.cos() * settings.azimuth.cos();

        transform.translation = settings.target + Vec3::new(x, y, z);
        transform.look_at(settings.target, Vec3::Y);
    }
}

/// Create, move and hide render entities to match the engine's graph
fn mirror_overlay(
    mut commands: Commands,
    overlay: Res<Overlay>,
    mut map: ResMut<RenderMap>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    camera: Query<&Transform, (With<MainCamera>, Without<MirroredNode>)>,
    mut nodes: Query<(&mut Transform, &mut Visibility), With<MirroredNode>>,
) {
    let graph = overlay.view.graph();

    // Nodes destroyed by the engine (deactivation) lose their entities
    map.entities.retain(|id, entity| {
        let alive = graph.contains(*id);
        if !alive {
            commands.entity(*entity).despawn();
        }
        alive
    });

    let camera_rotation = camera.single().ok().map(|t| t.rotation);

    for &scene_root in graph.scene_roots() {
        for id in graph.descendants(scene_root) {
            let Some(node) = graph.get(id) else { continue };
            let Some(visual) = &node.visual else { continue };
            let Some(world) = graph.world_matrix(id) else { continue };

            let mut transform = to_bevy_transform(&world);
            if node.billboard {
                if let Some(rotation) = camera_rotation {
                    transform.rotation = rotation;
                }
            }
            let visibility = if graph.is_visible(id) {
                Visibility::Visible
            } else {
                Visibility::Hidden
            };

            match map.entities.get(&id) {
                Some(&entity) => {
                    if let Ok((mut t, mut v)) = nodes.get_mut(entity) {
                        *t = transform;
                        *v = visibility;
                    }
                }
                None => {
                    let entity = commands
                        .spawn((
                            Mesh3d(meshes.add(mesh_for(&visual.shape))),
                            MeshMaterial3d(materials.add(material_for(visual))),
                            transform,
                            visibility,
                            MirroredNode(id),
                        ))
                        .id();
                    map.entities.insert(id, entity);
                }
            }
        }
    }
}
