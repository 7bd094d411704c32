//! UI overlays using bevy_egui
//!
//! A control panel on the left, plus the callout bubbles and plain labels
//! drawn over their attachment nodes.

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPrimaryContextPass};
use callout_core::attachment::ROOT_CALLOUT_ID;
use callout_core::{Attachment, AttachmentKind, OverlayView};

use crate::app::{Bubbles, Overlay, BUBBLE_VIEW};
use crate::input::PointerCapture;
use crate::scene::{to_bevy, CameraSettings, MainCamera};

pub struct UiPlugin;

impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        // Runs in EguiPrimaryContextPass for proper input handling (bevy_egui 0.38+)
        app.add_systems(EguiPrimaryContextPass, ui_system);
    }
}

/// Grouped system parameters for the UI system
#[derive(SystemParam)]
pub struct UiParams<'w, 's> {
    pub contexts: EguiContexts<'w, 's>,
    pub overlay: ResMut<'w, Overlay>,
    pub bubbles: Res<'w, Bubbles>,
    pub capture: ResMut<'w, PointerCapture>,
    pub camera_settings: ResMut<'w, CameraSettings>,
    pub camera_query: Query<'w, 's, (&'static Camera, &'static GlobalTransform), With<MainCamera>>,
}

/// Text shown for an attachment: title and optional detail line
fn callout_text(view: &OverlayView, attachment: &Attachment) -> Option<(String, Option<String>)> {
    if attachment.part_id == ROOT_CALLOUT_ID {
        let root = view.config().root_callout.as_ref()?;
        return Some((root.title.clone(), Some(root.detail.clone()).filter(|d| !d.is_empty())));
    }
    let part = view.registry().get(&attachment.part_id)?;
    match attachment.kind {
        AttachmentKind::Rich => Some((part.title.clone(), Some(part.detail.clone()).filter(|d| !d.is_empty()))),
        AttachmentKind::Fallback => Some((part.title.clone(), None)),
    }
}

fn ui_system(mut params: UiParams) {
    let Ok(ctx) = params.contexts.ctx_mut() else { return };

    draw_callouts(ctx, &params.overlay.view, params.bubbles.enabled, &params.camera_query);

    egui::SidePanel::left("overlay_panel")
        .default_width(240.0)
        .resizable(true)
        .show(ctx, |ui| {
            ui.heading("Callouts");
            ui.separator();

            let view = &mut params.overlay.view;
            ui.label(format!("Model: {}", view.config().model.id));
            if let Some(err) = view.load_error() {
                ui.colored_label(egui::Color32::RED, err.to_string());
            } else if view.is_active() {
                ui.colored_label(egui::Color32::GREEN, "● Active");
            } else {
                ui.colored_label(egui::Color32::GRAY, "○ Inactive");
            }

            ui.add_space(6.0);

            let mut show = view.show_annotations();
            if ui.checkbox(&mut show, "Show annotations (H)").changed() {
                view.set_show_annotations(show);
            }

            if view.has_door() {
                let mut open = view.door_open();
                if ui.checkbox(&mut open, "Open door (D)").changed() {
                    view.set_door_open(open);
                }
            }

            if ui.button("Reset view (F)").clicked() {
                params.camera_settings.focused = false;
            }

            ui.separator();

            egui::CollapsingHeader::new(format!("Parts ({})", view.registry().len()))
                .default_open(true)
                .show(ui, |ui| {
                    egui::ScrollArea::vertical().max_height(300.0).show(ui, |ui| {
                        for part in view.registry().iter() {
                            ui.horizontal(|ui| {
                                if view.annotations().is_missing(&part.id) {
                                    ui.colored_label(egui::Color32::YELLOW, "⚠");
                                } else {
                                    ui.colored_label(egui::Color32::GREEN, "●");
                                }
                                ui.label(&part.title).on_hover_text(format!("{} → {}", part.id, part.target));
                            });
                        }
                    });
                });

            ui.separator();

            let report = params.overlay.last_report;
            egui::Grid::new("report_grid").num_columns(2).show(ui, |ui| {
                ui.label("Resolved");
                ui.label(report.parts_resolved.to_string());
                ui.end_row();
                ui.label("Missing");
                ui.label(report.parts_missing.to_string());
                ui.end_row();
                ui.label("Normalized");
                ui.label(report.attachments_normalized.to_string());
                ui.end_row();
                ui.label("Leaders");
                ui.label(report.leaders_updated.to_string());
                ui.end_row();
            });

            ui.add_space(6.0);
            ui.small("Drag the model to move it, scroll to scale");
            ui.small("Right drag to orbit, Ctrl+scroll to zoom");
        });

    params.capture.0 = ctx.wants_pointer_input() || ctx.is_pointer_over_area();
}

/// Title font size as a share of the callout's on-screen width
const TITLE_EM: f32 = 0.085;
/// Inner margin of the bubble frame, in points
const BUBBLE_MARGIN: f32 = 6.0;

/// On-screen width in points of a camera-facing plate `width` wide at `position`
fn projected_width(camera: &Camera, camera_transform: &GlobalTransform, position: Vec3, width: f32) -> Option<f32> {
    let half = *camera_transform.right() * (width * 0.5);
    let left = camera.world_to_viewport(camera_transform, position - half).ok()?;
    let right = camera.world_to_viewport(camera_transform, position + half).ok()?;
    Some(left.distance(right))
}

/// Title and detail font sizes for a callout drawn `pixel_width` points wide
fn text_sizes(pixel_width: f32) -> (f32, f32) {
    let title = (pixel_width * TITLE_EM).clamp(4.0, 48.0);
    (title, title * 0.75)
}

/// Bubble or label text over every visible attachment node, sized to the
/// plate the engine keeps at a fixed world width
fn draw_callouts(
    ctx: &egui::Context,
    view: &OverlayView,
    bubbles: bool,
    camera_query: &Query<(&Camera, &GlobalTransform), With<MainCamera>>,
) {
    let Ok((camera, camera_transform)) = camera_query.single() else { return };
    let graph = view.graph();
    let aspect = BUBBLE_VIEW.height / BUBBLE_VIEW.width;

    for attachment in view.annotations().all_attachments() {
        if !attachment.enabled || !graph.is_visible(attachment.node) {
            continue;
        }
        let Some(position) = graph.world_position(attachment.node).map(to_bevy) else { continue };
        let Ok(screen) = camera.world_to_viewport(camera_transform, position) else {
            continue;
        };
        let Some(pixel_width) = projected_width(camera, camera_transform, position, attachment.target_width) else {
            continue;
        };
        let Some((title, detail)) = callout_text(view, attachment) else { continue };
        let (title_size, detail_size) = text_sizes(pixel_width);

        let bubble = (bubbles && attachment.kind == AttachmentKind::Rich) || attachment.part_id == ROOT_CALLOUT_ID;
        egui::Area::new(egui::Id::new(("callout", attachment.part_id.as_str())))
            .fixed_pos(egui::pos2(screen.x, screen.y))
            .pivot(egui::Align2::CENTER_CENTER)
            .interactable(false)
            .order(egui::Order::Background)
            .show(ctx, |ui| {
                if bubble {
                    egui::Frame::popup(ui.style())
                        .inner_margin(BUBBLE_MARGIN)
                        .show(ui, |ui| {
                            // Cover the panel plate exactly
                            let inner = (pixel_width - 2.0 * BUBBLE_MARGIN).max(1.0);
                            ui.set_width(inner);
                            ui.set_min_height((pixel_width * aspect - 2.0 * BUBBLE_MARGIN).max(1.0));
                            ui.label(egui::RichText::new(&title).size(title_size).strong());
                            if let Some(detail) = &detail {
                                ui.label(egui::RichText::new(detail).size(detail_size));
                            }
                        });
                } else {
                    ui.label(egui::RichText::new(&title).size(title_size).color(egui::Color32::WHITE).strong());
                }
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callout_core::{NodeId, OverlayConfig, SceneGraph, SceneNode};

    fn attachment(part_id: &str, kind: AttachmentKind, node: NodeId) -> Attachment {
        Attachment {
            part_id: part_id.to_string(),
            kind,
            node,
            target_width: 0.16,
            enabled: true,
        }
    }

    #[test]
    fn test_callout_text_by_kind() {
        let view = OverlayView::new(OverlayConfig::sample()).unwrap();
        let part = view.registry().iter().next().unwrap().clone();
        let mut graph = SceneGraph::new();
        let node = graph.spawn(SceneNode::new("label"));

        let (title, detail) = callout_text(&view, &attachment(&part.id, AttachmentKind::Rich, node)).unwrap();
        assert_eq!(title, part.title);
        assert_eq!(detail, Some(part.detail.clone()).filter(|d| !d.is_empty()));

        let (title, detail) = callout_text(&view, &attachment(&part.id, AttachmentKind::Fallback, node)).unwrap();
        assert_eq!(title, part.title);
        assert!(detail.is_none());

        assert!(callout_text(&view, &attachment("no-such-part", AttachmentKind::Rich, node)).is_none());
    }

    #[test]
    fn test_text_scales_with_projected_width() {
        let (near, _) = text_sizes(300.0);
        let (far, detail) = text_sizes(150.0);
        assert!((near - 2.0 * far).abs() < 1e-4);
        assert!(detail < far);
        assert_eq!(text_sizes(1.0).0, 4.0);
        assert_eq!(text_sizes(10_000.0).0, 48.0);
    }

    #[test]
    fn test_root_callout_uses_config_text() {
        let view = OverlayView::new(OverlayConfig::sample()).unwrap();
        let mut graph = SceneGraph::new();
        let node = graph.spawn(SceneNode::new("root"));
        let text = callout_text(&view, &attachment(ROOT_CALLOUT_ID, AttachmentKind::Rich, node));
        match view.config().root_callout.as_ref() {
            Some(root) => assert_eq!(text.map(|(title, _)| title), Some(root.title.clone())),
            None => assert!(text.is_none()),
        }
    }
}
