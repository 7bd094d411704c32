//! Pointer, touch and keyboard input
//!
//! Left-drag on the model, scroll bursts and two-finger pinches become
//! overlay gestures; everything else steers the orbit camera.

use bevy::input::mouse::{AccumulatedMouseMotion, AccumulatedMouseScroll, MouseScrollUnit};
use bevy::prelude::*;
use callout_core::{GestureEvent, GesturePhase};
use tracing::debug;

use crate::app::{Overlay, OverlaySet};
use crate::scene::{to_engine, CameraSettings, MainCamera};

/// A scroll burst ends after this long without wheel input
const SCROLL_IDLE_SECS: f32 = 0.25;
/// Magnification change per wheel line
const SCROLL_STEP: f32 = 0.1;
/// Pixels per wheel line for touchpads reporting pixel deltas
const PIXELS_PER_LINE: f32 = 40.0;

pub struct GesturePlugin;

impl Plugin for GesturePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PointerCapture>()
            .init_resource::<DragState>()
            .init_resource::<ScrollState>()
            .init_resource::<PinchState>()
            .add_systems(
                Update,
                (drag_model, orbit_camera, scroll_scale, pinch_scale, handle_keys)
                    .chain()
                    .in_set(OverlaySet::Input),
            );
    }
}

/// Set by the UI pass when egui is using the pointer
#[derive(Debug, Default, Resource)]
pub struct PointerCapture(pub bool);

/// Point on the model grabbed at press time
#[derive(Debug, Default, Resource)]
struct DragState {
    grab: Option<Vec3>,
}

#[derive(Debug, Default, Resource)]
struct ScrollState {
    magnification: Option<f32>,
    idle: f32,
}

#[derive(Debug, Default, Resource)]
struct PinchState {
    start_distance: Option<f32>,
    last: f32,
}

/// Where `ray` crosses the horizontal plane at `height`
fn plane_point(ray: Ray3d, height: f32) -> Option<Vec3> {
    ray.intersect_plane(Vec3::new(0.0, height, 0.0), InfinitePlane3d::new(Vec3::Y))
        .map(|distance| ray.get_point(distance))
}

fn scroll_lines(delta: f32, unit: MouseScrollUnit) -> f32 {
    match unit {
        MouseScrollUnit::Line => delta,
        MouseScrollUnit::Pixel => delta / PIXELS_PER_LINE,
    }
}

fn drag_model(
    mouse_button: Res<ButtonInput<MouseButton>>,
    windows: Query<&Window>,
    camera_query: Query<(&Camera, &GlobalTransform), With<MainCamera>>,
    capture: Res<PointerCapture>,
    mut drag: ResMut<DragState>,
    mut overlay: ResMut<Overlay>,
) {
    let Ok(window) = windows.single() else { return };
    let Ok((camera, camera_transform)) = camera_query.single() else { return };
    let ray = window
        .cursor_position()
        .and_then(|pos| camera.viewport_to_world(camera_transform, pos).ok());

    if mouse_button.just_pressed(MouseButton::Left) && !capture.0 {
        let (Some(ray), Some(root)) = (ray, overlay.view.root()) else { return };
        let hit = overlay
            .view
            .graph()
            .hit_test(root, to_engine(ray.origin), to_engine(*ray.direction));
        if let Some((node, distance)) = hit {
            debug!(node = %node, distance, "Drag started on model");
            drag.grab = Some(ray.get_point(distance));
            overlay.view.submit_gesture(GestureEvent::Translate {
                phase: GesturePhase::Began,
                translation: callout_core::glam::Vec3::ZERO,
            });
        }
        return;
    }

    let Some(grab) = drag.grab else { return };
    let moved = ray.and_then(|ray| plane_point(ray, grab.y)).map(|p| to_engine(p - grab));

    if !mouse_button.pressed(MouseButton::Left) {
        drag.grab = None;
        let event = match moved {
            Some(translation) => GestureEvent::Translate {
                phase: GesturePhase::Ended,
                translation,
            },
            // Released off the plane or outside the window
            None => GestureEvent::Translate {
                phase: GesturePhase::Cancelled,
                translation: callout_core::glam::Vec3::ZERO,
            },
        };
        overlay.view.submit_gesture(event);
    } else if let Some(translation) = moved {
        overlay.view.submit_gesture(GestureEvent::Translate {
            phase: GesturePhase::Changed,
            translation,
        });
    }
}

fn orbit_camera(
    mouse_button: Res<ButtonInput<MouseButton>>,
    mouse_motion: Res<AccumulatedMouseMotion>,
    touch_input: Res<Touches>,
    capture: Res<PointerCapture>,
    drag: Res<DragState>,
    mut settings: ResMut<CameraSettings>,
) {
    if capture.0 {
        return;
    }
    let delta = mouse_motion.delta;

    // Left drag orbits unless it grabbed the model; right drag always orbits
    let orbiting = mouse_button.pressed(MouseButton::Right)
        || (mouse_button.pressed(MouseButton::Left) && drag.grab.is_none());
    if orbiting {
        settings.azimuth -= delta.x * settings.sensitivity;
        settings.elevation = (settings.elevation + delta.y * settings.sensitivity).clamp(-1.4, 1.4);
    }

    // Pan in the camera's vertical plane
    if mouse_button.pressed(MouseButton::Middle) {
        let right = Vec3::new(settings.azimuth.cos(), 0.0, -settings.azimuth.sin());
        let pan_speed = settings.distance * 0.002;
        settings.target_focus -= right * delta.x * pan_speed;
        settings.target_focus += Vec3::Y * delta.y * pan_speed;
    }

    if touch_input.iter().count() == 1 {
        for touch in touch_input.iter() {
            let delta = touch.delta();
            if delta != Vec2::ZERO {
                settings.azimuth -= delta.x * settings.sensitivity;
                settings.elevation = (settings.elevation + delta.y * settings.sensitivity).clamp(-1.4, 1.4);
            }
        }
    }
}

/// Wheel bursts scale the model; with Ctrl held they zoom the camera
fn scroll_scale(
    mouse_scroll: Res<AccumulatedMouseScroll>,
    keyboard: Res<ButtonInput<KeyCode>>,
    capture: Res<PointerCapture>,
    time: Res<Time>,
    mut state: ResMut<ScrollState>,
    mut settings: ResMut<CameraSettings>,
    mut overlay: ResMut<Overlay>,
) {
    let lines = scroll_lines(mouse_scroll.delta.y, mouse_scroll.unit);

    if lines != 0.0 && !capture.0 {
        if keyboard.any_pressed([KeyCode::ControlLeft, KeyCode::ControlRight]) {
            let zoom_factor = 1.0 - lines * settings.zoom_speed;
            settings.target_distance = (settings.target_distance * zoom_factor).clamp(0.2, 50.0);
            return;
        }

        let phase = if state.magnification.is_some() {
            GesturePhase::Changed
        } else {
            GesturePhase::Began
        };
        let step = (1.0 + lines * SCROLL_STEP).max(0.1);
        let magnification = (state.magnification.unwrap_or(1.0) * step).clamp(0.01, 100.0);
        state.magnification = Some(magnification);
        state.idle = 0.0;
        overlay.view.submit_gesture(GestureEvent::Scale { phase, magnification });
        return;
    }

    if let Some(magnification) = state.magnification {
        state.idle += time.delta_secs();
        if state.idle >= SCROLL_IDLE_SECS {
            state.magnification = None;
            overlay.view.submit_gesture(GestureEvent::Scale {
                phase: GesturePhase::Ended,
                magnification,
            });
        }
    }
}

/// Two-finger pinch: magnification is the finger spread relative to its start
fn pinch_scale(
    touch_input: Res<Touches>,
    capture: Res<PointerCapture>,
    mut state: ResMut<PinchState>,
    mut overlay: ResMut<Overlay>,
) {
    let touches: Vec<_> = touch_input.iter().collect();
    if let [first, second] = touches.as_slice() {
        let distance = first.position().distance(second.position());
        match state.start_distance {
            Some(start) => {
                state.last = distance / start;
                overlay.view.submit_gesture(GestureEvent::Scale {
                    phase: GesturePhase::Changed,
                    magnification: state.last,
                });
            }
            None if distance > 1.0 && !capture.0 => {
                state.start_distance = Some(distance);
                state.last = 1.0;
                overlay.view.submit_gesture(GestureEvent::Scale {
                    phase: GesturePhase::Began,
                    magnification: 1.0,
                });
            }
            None => {}
        }
    } else if state.start_distance.take().is_some() {
        overlay.view.submit_gesture(GestureEvent::Scale {
            phase: GesturePhase::Ended,
            magnification: state.last,
        });
    }
}

/// H toggles annotations, D the door, F refocuses the camera
fn handle_keys(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut settings: ResMut<CameraSettings>,
    mut overlay: ResMut<Overlay>,
) {
    if keyboard.just_pressed(KeyCode::KeyH) {
        let show = !overlay.view.show_annotations();
        overlay.view.set_show_annotations(show);
    }
    if keyboard.just_pressed(KeyCode::KeyD) && overlay.view.has_door() {
        let open = !overlay.view.door_open();
        overlay.view.set_door_open(open);
    }
    if keyboard.just_pressed(KeyCode::KeyF) {
        settings.focused = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_point_hits_horizontal_plane() {
        let ray = Ray3d::new(Vec3::new(1.0, 5.0, 2.0), Dir3::NEG_Y);
        let point = plane_point(ray, 0.5).unwrap();
        assert!(point.abs_diff_eq(Vec3::new(1.0, 0.5, 2.0), 1e-5));
    }

    #[test]
    fn test_plane_point_misses_parallel_ray() {
        let ray = Ray3d::new(Vec3::new(0.0, 1.0, 0.0), Dir3::X);
        assert!(plane_point(ray, 0.0).is_none());
    }

    #[test]
    fn test_pixel_scroll_is_normalized_to_lines() {
        assert_eq!(scroll_lines(2.0, MouseScrollUnit::Line), 2.0);
        assert_eq!(scroll_lines(80.0, MouseScrollUnit::Pixel), 2.0);
    }
}
