//! Per-frame annotation pass
//!
//! Order within one pass: root callout, part lookup and callout placement,
//! width normalization of every attachment, then leader lines. A part whose
//! node cannot be found is skipped; its existing nodes keep their last pose.

use glam::Vec3;
use tracing::{debug, trace, warn};

use crate::attachment::{
    anchor_for, ensure_attachment, ensure_root_callout, normalize_all, update_probe, AnnotationState, CalloutProvider,
};
use crate::config::OverlayConfig;
use crate::graph::{NodeId, SceneGraph};
use crate::leader::{ensure_leader, update_leader, LeaderGeometry};
use crate::parts::PartRegistry;
use crate::transform::Aabb;
use crate::view::OverlayError;

/// What one pass did, for logging and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub parts_resolved: usize,
    pub parts_missing: usize,
    pub attachments_normalized: usize,
    pub leaders_updated: usize,
}

/// Read-only inputs of a pass
pub struct SyncContext<'a> {
    pub config: &'a OverlayConfig,
    pub registry: &'a PartRegistry,
    pub provider: &'a dyn CalloutProvider,
    pub show_annotations: bool,
}

/// Bounds of a part, or a point at its origin when it has no geometry.
/// Overlay nodes never count, so a part targeting the root stays put.
fn part_bounds(graph: &SceneGraph, host: NodeId, state: &AnnotationState) -> Option<Aabb> {
    graph
        .world_bounds_excluding(host, &state.node_ids())
        .or_else(|| graph.world_position(host).map(|p| Aabb::from_center_half_extents(p, Vec3::ZERO)))
}

/// Run one synchronization pass over the model under `root`
pub fn run_pass(graph: &mut SceneGraph, root: NodeId, state: &mut AnnotationState, ctx: &SyncContext<'_>) -> SyncReport {
    let mut report = SyncReport::default();
    if !graph.contains(root) {
        return report;
    }
    let overlay = &ctx.config.overlay;

    if let Some(callout) = &ctx.config.root_callout {
        ensure_root_callout(graph, root, state, callout, ctx.provider, overlay, ctx.show_annotations);
    }

    let mut resolved: Vec<(&str, NodeId)> = Vec::with_capacity(ctx.registry.len());
    for part in ctx.registry.iter() {
        let Some(host) = graph.find_first(root, &part.target) else {
            report.parts_missing += 1;
            if state.mark_missing(&part.id) {
                let err = OverlayError::PartNotFound {
                    part: part.id.clone(),
                    target: part.target.clone(),
                };
                warn!(part = %part.id, "{}", err);
            }
            continue;
        };
        if state.mark_found(&part.id) {
            debug!(part = %part.id, target = %part.target, "Part found again");
        }
        let Some(bounds) = part_bounds(graph, host, state) else {
            continue;
        };

        let anchor = anchor_for(&bounds, part.offset(), overlay.offset_k, overlay.offset_c);
        let node = ensure_attachment(graph, root, state, part, ctx.provider, overlay, ctx.show_annotations);
        graph.set_world_position(node, anchor);
        if overlay.show_probes {
            update_probe(graph, root, state, &part.id, anchor, ctx.show_annotations);
        }
        trace!(part = %part.id, host = %host, ?anchor, "Placed callout");

        report.parts_resolved += 1;
        resolved.push((part.id.as_str(), host));
    }

    report.attachments_normalized = normalize_all(graph, state, overlay.width_epsilon);

    for (part_id, host) in resolved {
        let Some(start) = part_bounds(graph, host, state).map(|b| b.center()) else {
            continue;
        };
        let Some(end) = state
            .attachments
            .get(part_id)
            .and_then(|a| graph.world_position(a.node))
        else {
            continue;
        };

        let line = ensure_leader(graph, root, state, part_id, overlay, ctx.show_annotations);
        let geometry = LeaderGeometry::between(start, end, overlay.min_length, overlay.tip_backoff);
        if update_leader(graph, &line, &geometry) {
            report.leaders_updated += 1;
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::{measured_width, NoCallouts};
    use crate::graph::{SceneNode, Shape, Visual};
    use crate::parts::PartDescriptor;
    use crate::transform::Transform;

    fn model() -> (SceneGraph, NodeId) {
        let mut graph = SceneGraph::new();
        let root = graph.spawn(SceneNode::new("Model"));
        let frame = graph.spawn_child(root, SceneNode::new("Frame"));
        graph.spawn_child(
            frame,
            SceneNode::new("Pump")
                .with_transform(Transform::from_xyz(-0.5, 0.5, 0.0))
                .with_visual(Visual::new(Shape::Box { size: Vec3::splat(0.2) }, [1.0; 4])),
        );
        graph.spawn_child(
            frame,
            SceneNode::new("Valve")
                .with_transform(Transform::from_xyz(0.5, 0.5, 0.0))
                .with_visual(Visual::new(Shape::Sphere { radius: 0.1 }, [1.0; 4])),
        );
        (graph, root)
    }

    fn registry() -> PartRegistry {
        PartRegistry::new(vec![
            PartDescriptor::new("pump", "Pump", "Pump", "", Vec3::ZERO),
            PartDescriptor::new("valve", "Valve", "Valve", "", Vec3::new(0.0, 0.05, 0.0)),
        ])
        .unwrap()
    }

    fn pass(graph: &mut SceneGraph, root: NodeId, state: &mut AnnotationState, config: &OverlayConfig, registry: &PartRegistry) -> SyncReport {
        let ctx = SyncContext {
            config,
            registry,
            provider: &NoCallouts,
            show_annotations: true,
        };
        run_pass(graph, root, state, &ctx)
    }

    #[test]
    fn test_pass_places_callouts_and_leaders() {
        let (mut graph, root) = model();
        let mut state = AnnotationState::new();
        let config = OverlayConfig::default();
        let registry = registry();

        let report = pass(&mut graph, root, &mut state, &config, &registry);
        assert_eq!(report.parts_resolved, 2);
        assert_eq!(report.parts_missing, 0);
        assert_eq!(report.attachments_normalized, 2);
        assert_eq!(report.leaders_updated, 2);

        // Pump top is at 0.6, plus 0.1 clearance
        let pump = state.attachments["pump"].node;
        assert!(graph.world_position(pump).unwrap().abs_diff_eq(Vec3::new(-0.5, 0.7, 0.0), 1e-5));
        let valve = state.attachments["valve"].node;
        assert!(graph.world_position(valve).unwrap().abs_diff_eq(Vec3::new(0.5, 0.75, 0.0), 1e-5));

        let stick = state.leaders["pump"].stick;
        assert!(graph.world_position(stick).unwrap().abs_diff_eq(Vec3::new(-0.5, 0.6, 0.0), 1e-5));
    }

    #[test]
    fn test_repeated_passes_create_nothing_new() {
        let (mut graph, root) = model();
        let mut state = AnnotationState::new();
        let config = OverlayConfig::default();
        let registry = registry();

        pass(&mut graph, root, &mut state, &config, &registry);
        let count = graph.len();
        for _ in 0..5 {
            pass(&mut graph, root, &mut state, &config, &registry);
        }
        assert_eq!(graph.len(), count);
    }

    #[test]
    fn test_width_holds_while_root_scales() {
        let (mut graph, root) = model();
        let mut state = AnnotationState::new();
        let config = OverlayConfig::default();
        let registry = registry();

        for scale in [1.0, 2.5, 0.4, 9.0] {
            graph.get_mut(root).unwrap().transform.scale = Vec3::splat(scale);
            pass(&mut graph, root, &mut state, &config, &registry);
            for attachment in state.all_attachments() {
                let width = measured_width(&graph, attachment.node).unwrap();
                assert!((width - config.overlay.target_width).abs() < 1e-4, "scale {scale}: {width}");
            }
        }
    }

    #[test]
    fn test_missing_part_keeps_last_leader_pose() {
        let (mut graph, root) = model();
        let mut state = AnnotationState::new();
        let config = OverlayConfig::default();
        let registry = registry();
        pass(&mut graph, root, &mut state, &config, &registry);

        let valve = graph.find_first(root, "Valve").unwrap();
        graph.get_mut(valve).unwrap().name = "Valve_renamed".to_string();
        let stick = state.leaders["valve"].stick;
        let before = graph.get(stick).unwrap().transform;

        graph.get_mut(root).unwrap().transform.translation = Vec3::new(0.0, 0.0, 1.0);
        let report = pass(&mut graph, root, &mut state, &config, &registry);
        assert_eq!(report.parts_resolved, 1);
        assert_eq!(report.parts_missing, 1);
        assert_eq!(report.leaders_updated, 1);
        assert!(state.is_missing("valve"));
        assert_eq!(graph.get(stick).unwrap().transform, before);

        // The other part tracked the move
        let pump = state.attachments["pump"].node;
        assert!(graph.world_position(pump).unwrap().abs_diff_eq(Vec3::new(-0.5, 0.7, 1.0), 1e-5));

        graph.get_mut(valve).unwrap().name = "Valve".to_string();
        let report = pass(&mut graph, root, &mut state, &config, &registry);
        assert_eq!(report.parts_missing, 0);
        assert!(!state.is_missing("valve"));
    }

    #[test]
    fn test_root_callout_and_probes() {
        let (mut graph, root) = model();
        let mut state = AnnotationState::new();
        let mut config = OverlayConfig::sample();
        config.overlay.show_probes = true;
        let registry = registry();

        let report = pass(&mut graph, root, &mut state, &config, &registry);
        assert_eq!(report.attachments_normalized, 3);
        assert!(state.root_callout.is_some());
        assert_eq!(state.probes.len(), 2);
        let probe = graph.find_first(root, "Probe:pump").unwrap();
        let anchor = graph.world_position(state.attachments["pump"].node).unwrap();
        assert!(graph.world_position(probe).unwrap().abs_diff_eq(anchor, 1e-5));
    }

    #[test]
    fn test_part_targeting_root_stays_put() {
        let mut graph = SceneGraph::new();
        let root = graph.spawn(SceneNode::new("Model"));
        graph.spawn_child(
            root,
            SceneNode::new("Body").with_visual(Visual::new(Shape::Box { size: Vec3::ONE }, [1.0; 4])),
        );
        let registry = PartRegistry::new(vec![PartDescriptor::new("whole", "Model", "Whole", "", Vec3::ZERO)]).unwrap();
        let mut state = AnnotationState::new();
        let config = OverlayConfig::default();

        let mut heights = Vec::new();
        for _ in 0..6 {
            pass(&mut graph, root, &mut state, &config, &registry);
            heights.push(graph.world_position(state.attachments["whole"].node).unwrap().y);
        }
        for y in heights {
            assert!((y - 0.6).abs() < 1e-5, "callout drifted to {y}");
        }
    }

    #[test]
    fn test_stale_root_is_noop() {
        let (mut graph, root) = model();
        graph.despawn(root);
        let mut state = AnnotationState::new();
        let report = pass(&mut graph, root, &mut state, &OverlayConfig::default(), &registry());
        assert_eq!(report, SyncReport::default());
    }
}
