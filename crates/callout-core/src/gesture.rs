//! Drag and pinch handling for the model root
//!
//! Translate and scale are tracked as independent sessions so both can run
//! during the same two-finger interaction. Event values are totals since the
//! gesture began, applied to the root value captured at the start.

use glam::Vec3;
use tracing::{debug, trace};

use crate::config::GestureConfig;
use crate::graph::{NodeId, SceneGraph};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GesturePhase {
    Began,
    Changed,
    Ended,
    /// Interrupted by the platform; the root returns to its starting value
    Cancelled,
}

/// Continuous gesture update from the host's input layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureEvent {
    /// Total drag since the gesture began, in input units
    Translate { phase: GesturePhase, translation: Vec3 },
    /// Total pinch factor since the gesture began (1.0 = unchanged)
    Scale { phase: GesturePhase, magnification: f32 },
}

impl GestureEvent {
    pub fn phase(&self) -> GesturePhase {
        match self {
            GestureEvent::Translate { phase, .. } | GestureEvent::Scale { phase, .. } => *phase,
        }
    }

    pub fn kind(&self) -> ManipulationKind {
        match self {
            GestureEvent::Translate { .. } => ManipulationKind::Translate,
            GestureEvent::Scale { .. } => ManipulationKind::Scale,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManipulationKind {
    Translate,
    Scale,
}

/// Root value captured when a gesture started
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManipulationSession {
    pub kind: ManipulationKind,
    /// Root translation or scale at gesture start
    pub initial: Vec3,
}

#[derive(Debug, Clone)]
pub struct GestureController {
    config: GestureConfig,
    translate: Option<ManipulationSession>,
    scale: Option<ManipulationSession>,
}

impl GestureController {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            translate: None,
            scale: None,
        }
    }

    pub fn session(&self, kind: ManipulationKind) -> Option<&ManipulationSession> {
        match kind {
            ManipulationKind::Translate => self.translate.as_ref(),
            ManipulationKind::Scale => self.scale.as_ref(),
        }
    }

    /// Drop any in-flight sessions without touching the root
    pub fn reset(&mut self) {
        self.translate = None;
        self.scale = None;
    }

    /// Map an input-space drag to a scene-space offset
    pub fn project(&self, translation: Vec3) -> Vec3 {
        let mut v = translation * self.config.input_to_scene;
        if self.config.grounded {
            v.y = 0.0;
        }
        v
    }

    /// Apply one event to `root`. Returns false when the root is missing or the
    /// event carried an unusable value.
    pub fn apply(&mut self, graph: &mut SceneGraph, root: NodeId, event: &GestureEvent) -> bool {
        let Some(current) = graph.get(root).map(|n| n.transform) else {
            return false;
        };
        let phase = event.phase();
        let kind = event.kind();

        let slot = match kind {
            ManipulationKind::Translate => &mut self.translate,
            ManipulationKind::Scale => &mut self.scale,
        };
        let session = *slot.get_or_insert_with(|| {
            let initial = match kind {
                ManipulationKind::Translate => current.translation,
                ManipulationKind::Scale => current.scale,
            };
            debug!(?kind, ?initial, "Manipulation started");
            ManipulationSession { kind, initial }
        });
        if matches!(phase, GesturePhase::Ended | GesturePhase::Cancelled) {
            *slot = None;
            debug!(?kind, ?phase, "Manipulation finished");
        }

        let value = match (phase, event) {
            (GesturePhase::Cancelled, _) => Some(session.initial),
            (_, GestureEvent::Translate { translation, .. }) => {
                Some(session.initial + self.project(*translation)).filter(|v| v.is_finite())
            }
            (_, GestureEvent::Scale { magnification, .. }) => {
                if magnification.is_finite() && *magnification > 0.0 {
                    let min = Vec3::splat(self.config.min_scale);
                    let max = Vec3::splat(self.config.max_scale);
                    Some((session.initial * *magnification).clamp(min, max))
                } else {
                    None
                }
            }
        };
        let Some(value) = value else {
            trace!(?kind, "Ignoring gesture update with unusable value");
            return false;
        };

        let Some(node) = graph.get_mut(root) else {
            return false;
        };
        match kind {
            ManipulationKind::Translate => node.transform.translation = value,
            ManipulationKind::Scale => node.transform.scale = value,
        }
        true
    }
}
