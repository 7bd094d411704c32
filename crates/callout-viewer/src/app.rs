//! Bevy application setup

use bevy::prelude::*;
use bevy_egui::EguiPlugin;
use bevy_picking::DefaultPickingPlugins;
use callout_core::{CalloutProvider, CalloutView, OverlayView, SyncReport};
use tracing::{debug, info};

use crate::input::GesturePlugin;
use crate::models::ProceduralModels;
use crate::scene::ScenePlugin;
use crate::ui::UiPlugin;

/// World size of a callout bubble backing panel
pub const BUBBLE_VIEW: CalloutView = CalloutView {
    width: 0.3,
    height: 0.12,
};

/// Command-line switches that affect the running app
#[derive(Debug, Clone, Default)]
pub struct ViewerOptions {
    pub plain_labels: bool,
}

/// The overlay engine driving the model shown in the window
#[derive(Resource)]
pub struct Overlay {
    pub view: OverlayView,
    pub last_report: SyncReport,
}

/// Rich callouts are egui bubbles drawn over a panel node
#[derive(Debug, Clone, Resource)]
pub struct Bubbles {
    pub enabled: bool,
}

impl CalloutProvider for Bubbles {
    fn callout(&self, _part_id: &str) -> Option<CalloutView> {
        self.enabled.then_some(BUBBLE_VIEW)
    }
}

/// Per-frame ordering: gestures are queued, the overlay ticks, then the
/// render entities are updated from the engine's graph
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum OverlaySet {
    Input,
    Tick,
    Mirror,
}

/// Run the Bevy application
pub fn run(view: OverlayView, options: ViewerOptions) {
    App::new()
        .insert_resource(ClearColor(Color::srgb(0.1, 0.1, 0.15)))
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Callout Viewer".to_string(),
                ..default()
            }),
            ..default()
        }))
        // Must be added before EguiPlugin so it can detect PickingPlugin
        .add_plugins(DefaultPickingPlugins)
        .add_plugins(EguiPlugin::default())
        .insert_resource(Overlay {
            view,
            last_report: SyncReport::default(),
        })
        .insert_resource(Bubbles {
            enabled: !options.plain_labels,
        })
        .init_resource::<ProceduralModels>()
        .configure_sets(Update, (OverlaySet::Input, OverlaySet::Tick, OverlaySet::Mirror).chain())
        .add_plugins(ScenePlugin)
        .add_plugins(GesturePlugin)
        .add_plugins(UiPlugin)
        .add_systems(Startup, activate_overlay)
        .add_systems(Update, tick_overlay.in_set(OverlaySet::Tick))
        .run();
}

/// Load the configured model and subscribe the overlay to frame ticks
fn activate_overlay(mut overlay: ResMut<Overlay>, mut models: ResMut<ProceduralModels>) {
    // Failures are already logged by the view and shown in the panel
    if let Ok(root) = overlay.view.activate(&mut *models) {
        info!(root = %root, model = %overlay.view.config().model.id, "Overlay active");
    }
}

fn tick_overlay(time: Res<Time>, mut overlay: ResMut<Overlay>, bubbles: Res<Bubbles>) {
    let report = overlay.view.tick(time.delta_secs(), &*bubbles);
    if report != overlay.last_report {
        debug!(
            resolved = report.parts_resolved,
            missing = report.parts_missing,
            normalized = report.attachments_normalized,
            leaders = report.leaders_updated,
            "Overlay pass changed"
        );
    }
    overlay.last_report = report;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_labels_disable_bubbles() {
        assert_eq!(Bubbles { enabled: true }.callout("pump"), Some(BUBBLE_VIEW));
        assert_eq!(Bubbles { enabled: false }.callout("pump"), None);
    }
}
