//! Per-view overlay context
//!
//! `OverlayView` owns everything one annotated view needs: the scene graph,
//! the model root, the part registry, runtime annotation nodes and gesture
//! sessions. The host calls [`OverlayView::activate`] once, then
//! [`OverlayView::tick`] every frame, and [`OverlayView::deactivate`] when the
//! view goes away.

use std::collections::VecDeque;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::animation::TransformAnimation;
use crate::attachment::{set_all_enabled, AnnotationState, CalloutProvider};
use crate::config::{ConfigError, OverlayConfig};
use crate::gesture::{GestureController, GestureEvent};
use crate::graph::{NodeId, SceneGraph};
use crate::parts::PartRegistry;
use crate::root::{initialize_root, LoadError, ModelLoader};
use crate::sync::{run_pass, SyncContext, SyncReport};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OverlayError {
    #[error("Failed to load model {id}: {source}")]
    LoadFailure {
        id: String,
        #[source]
        source: LoadError,
    },
    #[error("Part {part} not found: no node named {target}")]
    PartNotFound { part: String, target: String },
}

/// Tick subscription, bound to the root it was created for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Subscription {
    root: NodeId,
}

pub struct OverlayView {
    graph: SceneGraph,
    root: Option<NodeId>,
    config: OverlayConfig,
    registry: PartRegistry,
    annotations: AnnotationState,
    gestures: GestureController,
    pending: VecDeque<GestureEvent>,
    subscription: Option<Subscription>,
    show_annotations: bool,
    door_open: bool,
    animation: Option<TransformAnimation>,
    load_error: Option<OverlayError>,
}

impl OverlayView {
    /// Build an inactive view. Fails when the part list is invalid.
    pub fn new(config: OverlayConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let registry = PartRegistry::new(config.parts.clone())?;
        Ok(Self {
            graph: SceneGraph::new(),
            root: None,
            gestures: GestureController::new(config.gesture.clone()),
            show_annotations: config.overlay.show_annotations,
            registry,
            config,
            annotations: AnnotationState::new(),
            pending: VecDeque::new(),
            subscription: None,
            door_open: false,
            animation: None,
            load_error: None,
        })
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    pub fn registry(&self) -> &PartRegistry {
        &self.registry
    }

    pub fn annotations(&self) -> &AnnotationState {
        &self.annotations
    }

    pub fn gestures(&self) -> &GestureController {
        &self.gestures
    }

    /// Root loaded and tick subscription live
    pub fn is_active(&self) -> bool {
        self.subscription.is_some() && self.root.is_some_and(|r| self.graph.contains(r))
    }

    pub fn show_annotations(&self) -> bool {
        self.show_annotations
    }

    pub fn door_open(&self) -> bool {
        self.door_open
    }

    pub fn has_door(&self) -> bool {
        self.config.door.is_some()
    }

    /// Last model load failure, if the root could not be created
    pub fn load_error(&self) -> Option<&OverlayError> {
        self.load_error.as_ref()
    }

    /// Load the model and start ticking. A load failure is logged and kept
    /// for [`load_error`](Self::load_error); the view stays inactive.
    pub fn activate(&mut self, loader: &mut dyn ModelLoader) -> Result<NodeId, OverlayError> {
        let root = self.initialize_root(loader)?;
        self.subscribe();
        Ok(root)
    }

    /// Create the model root once; later calls return the same root
    pub fn initialize_root(&mut self, loader: &mut dyn ModelLoader) -> Result<NodeId, OverlayError> {
        let id = self.config.model.id.clone();
        match initialize_root(&mut self.graph, &mut self.root, loader, &id, &self.config.placement) {
            Ok(root) => {
                self.load_error = None;
                Ok(root)
            }
            Err(source) => {
                let err = OverlayError::LoadFailure { id, source };
                if self.load_error.as_ref() != Some(&err) {
                    warn!("{}", err);
                }
                self.load_error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Start receiving ticks for the current root. Returns false without a root.
    pub fn subscribe(&mut self) -> bool {
        let Some(root) = self.root.filter(|r| self.graph.contains(*r)) else {
            return false;
        };
        if self.subscription == Some(Subscription { root }) {
            return true;
        }
        self.subscription = Some(Subscription { root });
        info!(root = %root, parts = self.registry.len(), "Overlay subscribed to ticks");
        true
    }

    /// Queue a gesture; it is applied at the start of the next tick
    pub fn submit_gesture(&mut self, event: GestureEvent) {
        self.pending.push_back(event);
    }

    /// Advance one frame
    pub fn tick(&mut self, dt: f32, provider: &dyn CalloutProvider) -> SyncReport {
        let root = match (self.subscription, self.root) {
            (Some(sub), Some(root)) if sub.root == root && self.graph.contains(root) => root,
            _ => {
                self.pending.clear();
                return SyncReport::default();
            }
        };

        while let Some(event) = self.pending.pop_front() {
            self.gestures.apply(&mut self.graph, root, &event);
        }

        if let Some(animation) = self.animation.as_mut() {
            if animation.advance(&mut self.graph, dt) {
                debug!(node = %animation.node, "Door animation finished");
                self.animation = None;
            }
        }

        let ctx = SyncContext {
            config: &self.config,
            registry: &self.registry,
            provider,
            show_annotations: self.show_annotations,
        };
        run_pass(&mut self.graph, root, &mut self.annotations, &ctx)
    }

    /// Show or hide all callouts, leader lines and probes
    pub fn set_show_annotations(&mut self, show: bool) {
        if self.show_annotations == show {
            return;
        }
        self.show_annotations = show;
        set_all_enabled(&mut self.graph, &mut self.annotations, show);
        debug!(show, "Annotation visibility changed");
    }

    /// Animate the configured door node open or closed.
    ///
    /// Returns false when no door is configured or its node is absent.
    pub fn set_door_open(&mut self, open: bool) -> bool {
        let (Some(door), Some(root)) = (&self.config.door, self.root) else {
            return false;
        };
        let Some(node) = self.graph.find_first(root, &door.node) else {
            warn!(node = %door.node, "Door node not found in model");
            return false;
        };
        let Some(from) = self.graph.get(node).map(|n| n.transform) else {
            return false;
        };

        let pose = if open { &door.open } else { &door.closed };
        let to = pose.to_transform(&from);
        self.animation = Some(TransformAnimation::new(node, from, to, door.duration_secs));
        self.door_open = open;
        info!(open, node = %door.node, "Door animation started");
        true
    }

    /// Stop ticking and destroy the model with every annotation node
    pub fn deactivate(&mut self) {
        self.subscription = None;
        if let Some(root) = self.root.take() {
            let removed = self.graph.despawn(root);
            info!(root = %root, removed, "Overlay deactivated");
        }
        self.annotations.clear();
        self.gestures.reset();
        self.pending.clear();
        self.animation = None;
        self.door_open = false;
        self.show_annotations = self.config.overlay.show_annotations;
    }
}
