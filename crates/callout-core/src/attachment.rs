//! Callout attachments: creation, placement and width normalization
//!
//! Each annotated part gets at most one attachment node under the model root.
//! Attachments are found again by their derived name, so re-running a pass
//! never creates duplicates. Their world width is pulled back to the target
//! width on every pass because the root's scale changes under gestures.

use glam::Vec3;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, trace};

use crate::config::{AnnotationConfig, RootCalloutConfig};
use crate::graph::{NodeId, SceneGraph, SceneNode, Shape, Visual, PANEL_DEPTH};
use crate::leader::LeaderLine;
use crate::parts::PartDescriptor;
use crate::transform::Aabb;

/// Key used for the model-wide callout
pub const ROOT_CALLOUT_ID: &str = "root";

/// Edge length of the placeholder box used for untitled fallback labels
const PLACEHOLDER_SIZE: f32 = 0.05;

const PROBE_RADIUS: f32 = 0.01;

const PANEL_COLOR: [f32; 4] = [0.97, 0.97, 0.98, 0.92];
const LABEL_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
const PROBE_COLOR: [f32; 4] = [1.0, 0.25, 0.2, 1.0];

/// Size of a rich callout view in world units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalloutView {
    pub width: f32,
    pub height: f32,
}

/// Source of rich callout views, keyed by part id
pub trait CalloutProvider {
    fn callout(&self, part_id: &str) -> Option<CalloutView>;
}

/// Provider with no rich views; every part gets a fallback label
pub struct NoCallouts;

impl CalloutProvider for NoCallouts {
    fn callout(&self, _part_id: &str) -> Option<CalloutView> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    /// Host-rendered callout bubble
    Rich,
    /// Text label (or placeholder box) carrying the part title
    Fallback,
}

impl AttachmentKind {
    fn prefix(self) -> &'static str {
        match self {
            AttachmentKind::Rich => "Attachment",
            AttachmentKind::Fallback => "FallbackLabel",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub part_id: String,
    pub kind: AttachmentKind,
    pub node: NodeId,
    pub target_width: f32,
    pub enabled: bool,
}

pub fn attachment_name(kind: AttachmentKind, part_id: &str) -> String {
    format!("{}:{}", kind.prefix(), part_id)
}

pub fn leader_name(part_id: &str) -> String {
    format!("Leader:{}", part_id)
}

pub fn arrow_name(part_id: &str) -> String {
    format!("Arrow:{}", part_id)
}

pub fn probe_name(part_id: &str) -> String {
    format!("Probe:{}", part_id)
}

/// Runtime annotation nodes of one view, keyed by part id
#[derive(Debug, Default)]
pub struct AnnotationState {
    pub attachments: BTreeMap<String, Attachment>,
    pub root_callout: Option<Attachment>,
    pub leaders: BTreeMap<String, LeaderLine>,
    pub probes: BTreeMap<String, NodeId>,
    missing: BTreeSet<String>,
}

impl AnnotationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failed lookup. Returns true only on a found-to-missing transition.
    pub fn mark_missing(&mut self, part_id: &str) -> bool {
        self.missing.insert(part_id.to_string())
    }

    /// Record a successful lookup. Returns true when the part was missing before.
    pub fn mark_found(&mut self, part_id: &str) -> bool {
        self.missing.remove(part_id)
    }

    pub fn is_missing(&self, part_id: &str) -> bool {
        self.missing.contains(part_id)
    }

    /// Every attachment including the root callout
    pub fn all_attachments(&self) -> impl Iterator<Item = &Attachment> {
        self.root_callout.iter().chain(self.attachments.values())
    }

    /// Every node the overlay itself created: callouts, leader parts and probes
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.all_attachments().map(|a| a.node).collect();
        ids.extend(self.leaders.values().flat_map(|l| [l.stick, l.tip]));
        ids.extend(self.probes.values().copied());
        ids
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Callout anchor above a part: top of its bounds plus clearance and offset
pub fn anchor_for(bounds: &Aabb, offset: Vec3, k: f32, c: f32) -> Vec3 {
    bounds.center() + Vec3::new(0.0, bounds.half_extents().y * k + c, 0.0) + offset
}

/// Width of `node` along its own X axis, in world units
pub fn measured_width(graph: &SceneGraph, node: NodeId) -> Option<f32> {
    let content = graph.local_content_bounds(node)?.size().x;
    Some(content * graph.world_scale_x(node)?)
}

/// Rescale `node` uniformly so its world width equals `target_width`.
///
/// The scale is derived from the unscaled content width and the parent's
/// current world scale, not from the node's previous scale. Returns false when
/// the width cannot be measured.
pub fn normalize_width(graph: &mut SceneGraph, node: NodeId, target_width: f32, epsilon: f32) -> bool {
    let Some(content) = graph.local_content_bounds(node).map(|b| b.size().x) else {
        return false;
    };
    let parent_scale = graph
        .parent(node)
        .and_then(|p| graph.world_scale_x(p))
        .unwrap_or(1.0);
    let unscaled = content * parent_scale;
    if !unscaled.is_finite() || unscaled < epsilon {
        return false;
    }

    let scale = target_width / unscaled;
    match graph.get_mut(node) {
        Some(n) => {
            n.transform.scale = Vec3::splat(scale);
            true
        }
        None => false,
    }
}

fn attachment_node(kind: AttachmentKind, id: &str, title: &str, view: Option<CalloutView>, config: &AnnotationConfig) -> SceneNode {
    let visual = match (kind, view) {
        (AttachmentKind::Rich, Some(view)) => Visual::new(
            Shape::Panel {
                width: view.width,
                height: view.height,
            },
            PANEL_COLOR,
        ),
        _ if title.trim().is_empty() => Visual::new(
            Shape::Box {
                size: Vec3::splat(PLACEHOLDER_SIZE),
            },
            LABEL_COLOR,
        ),
        _ => Visual::new(
            Shape::Text {
                content: title.to_string(),
                size: config.label_size,
                depth: PANEL_DEPTH,
            },
            LABEL_COLOR,
        ),
    };

    let mut node = SceneNode::new(attachment_name(kind, id)).with_visual(visual.unlit());
    node.billboard = true;
    node
}

/// Reuse an existing attachment node of either kind under `root`
fn adopt_existing(graph: &SceneGraph, root: NodeId, id: &str) -> Option<(AttachmentKind, NodeId)> {
    [AttachmentKind::Rich, AttachmentKind::Fallback]
        .into_iter()
        .find_map(|kind| graph.find_first(root, &attachment_name(kind, id)).map(|node| (kind, node)))
}

fn obtain(
    graph: &mut SceneGraph,
    root: NodeId,
    id: &str,
    title: &str,
    provider: &dyn CalloutProvider,
    config: &AnnotationConfig,
    enabled: bool,
) -> Attachment {
    if let Some((kind, node)) = adopt_existing(graph, root, id) {
        return Attachment {
            part_id: id.to_string(),
            kind,
            node,
            target_width: config.target_width,
            enabled,
        };
    }

    let view = provider.callout(id);
    let kind = if view.is_some() {
        AttachmentKind::Rich
    } else {
        AttachmentKind::Fallback
    };
    let mut node = attachment_node(kind, id, title, view, config);
    node.enabled = enabled;
    let node = graph.spawn_child(root, node);
    debug!(part = %id, ?kind, node = %node, "Created attachment");

    Attachment {
        part_id: id.to_string(),
        kind,
        node,
        target_width: config.target_width,
        enabled,
    }
}

/// Return the attachment node for `part`, creating it on first use
pub fn ensure_attachment(
    graph: &mut SceneGraph,
    root: NodeId,
    state: &mut AnnotationState,
    part: &PartDescriptor,
    provider: &dyn CalloutProvider,
    config: &AnnotationConfig,
    enabled: bool,
) -> NodeId {
    if let Some(existing) = state.attachments.get(&part.id).filter(|a| graph.contains(a.node)) {
        return existing.node;
    }
    let attachment = obtain(graph, root, &part.id, &part.title, provider, config, enabled);
    let node = attachment.node;
    state.attachments.insert(part.id.clone(), attachment);
    node
}

/// Create the model-wide callout above the root's bounds, once
pub fn ensure_root_callout(
    graph: &mut SceneGraph,
    root: NodeId,
    state: &mut AnnotationState,
    callout: &RootCalloutConfig,
    provider: &dyn CalloutProvider,
    config: &AnnotationConfig,
    enabled: bool,
) -> Option<NodeId> {
    if let Some(existing) = state.root_callout.as_ref().filter(|a| graph.contains(a.node)) {
        return Some(existing.node);
    }

    let adopted = adopt_existing(graph, root, ROOT_CALLOUT_ID).is_some();
    let bounds = graph.world_bounds_excluding(root, &state.node_ids())?;
    let attachment = obtain(graph, root, ROOT_CALLOUT_ID, &callout.title, provider, config, enabled);
    if !adopted {
        let position = bounds.center() + Vec3::new(0.0, bounds.half_extents().y * callout.height_factor, 0.0);
        graph.set_world_position(attachment.node, position);
    }
    let node = attachment.node;
    state.root_callout = Some(attachment);
    Some(node)
}

/// Place (creating on first use) the debug marker at a part's anchor
pub fn update_probe(graph: &mut SceneGraph, root: NodeId, state: &mut AnnotationState, part_id: &str, anchor: Vec3, enabled: bool) {
    let node = match state.probes.get(part_id).copied().filter(|n| graph.contains(*n)) {
        Some(node) => node,
        None => {
            let name = probe_name(part_id);
            let node = graph.find_first(root, &name).unwrap_or_else(|| {
                let probe = SceneNode::new(name).with_visual(
                    Visual::new(
                        Shape::Sphere {
                            radius: PROBE_RADIUS,
                        },
                        PROBE_COLOR,
                    )
                    .unlit(),
                );
                graph.spawn_child(root, probe)
            });
            state.probes.insert(part_id.to_string(), node);
            node
        }
    };
    graph.set_world_position(node, anchor);
    graph.set_enabled(node, enabled);
}

/// Normalize every live attachment. Returns how many were rescaled.
pub fn normalize_all(graph: &mut SceneGraph, state: &mut AnnotationState, epsilon: f32) -> usize {
    let targets: Vec<(NodeId, f32)> = state.all_attachments().map(|a| (a.node, a.target_width)).collect();
    let mut normalized = 0;
    for (node, width) in targets {
        if normalize_width(graph, node, width, epsilon) {
            normalized += 1;
        } else {
            trace!(node = %node, "Attachment width not measurable, skipped");
        }
    }
    normalized
}

/// Show or hide every annotation node without destroying it
pub fn set_all_enabled(graph: &mut SceneGraph, state: &mut AnnotationState, enabled: bool) {
    if let Some(attachment) = state.root_callout.as_mut() {
        attachment.enabled = enabled;
        graph.set_enabled(attachment.node, enabled);
    }
    for attachment in state.attachments.values_mut() {
        attachment.enabled = enabled;
        graph.set_enabled(attachment.node, enabled);
    }
    for leader in state.leaders.values() {
        graph.set_enabled(leader.stick, enabled);
        graph.set_enabled(leader.tip, enabled);
    }
    for probe in state.probes.values() {
        graph.set_enabled(*probe, enabled);
    }
}
