//! Timed local-transform animation (door open/close)

use crate::graph::{NodeId, SceneGraph};
use crate::transform::Transform;

/// Moves one node's local transform from `from` to `to` over `duration` seconds
#[derive(Debug, Clone, PartialEq)]
pub struct TransformAnimation {
    pub node: NodeId,
    pub from: Transform,
    pub to: Transform,
    pub duration: f32,
    elapsed: f32,
}

impl TransformAnimation {
    pub fn new(node: NodeId, from: Transform, to: Transform, duration: f32) -> Self {
        Self {
            node,
            from,
            to,
            duration: duration.max(0.0),
            elapsed: 0.0,
        }
    }

    /// Completed fraction in 0.0..=1.0
    pub fn progress(&self) -> f32 {
        if self.duration <= 0.0 {
            1.0
        } else {
            (self.elapsed / self.duration).clamp(0.0, 1.0)
        }
    }

    pub fn is_finished(&self) -> bool {
        self.progress() >= 1.0
    }

    /// Step by `dt` seconds and write the node's transform.
    ///
    /// Returns true once the animation has finished or its node is gone. The
    /// final step writes `to` exactly.
    pub fn advance(&mut self, graph: &mut SceneGraph, dt: f32) -> bool {
        if dt.is_finite() && dt > 0.0 {
            self.elapsed += dt;
        }
        let Some(node) = graph.get_mut(self.node) else {
            return true;
        };

        if self.is_finished() {
            node.transform = self.to;
            return true;
        }
        let t = self.progress();
        let eased = t * t * (3.0 - 2.0 * t);
        node.transform = self.from.lerp(&self.to, eased);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SceneNode;
    use glam::Quat;

    fn door() -> (SceneGraph, NodeId, Transform) {
        let mut graph = SceneGraph::new();
        let node = graph.spawn(SceneNode::new("Door"));
        let open = Transform::from_xyz(-0.4, 0.0, 0.3).with_rotation(Quat::from_rotation_y(-1.7));
        (graph, node, open)
    }

    #[test]
    fn test_reaches_target_exactly() {
        let (mut graph, node, open) = door();
        let mut anim = TransformAnimation::new(node, Transform::IDENTITY, open, 0.5);

        let mut finished = false;
        for _ in 0..4 {
            finished = anim.advance(&mut graph, 0.1);
        }
        assert!(!finished);
        let midway = graph.get(node).unwrap().transform;
        assert_ne!(midway, open);

        assert!(anim.advance(&mut graph, 0.2));
        assert_eq!(graph.get(node).unwrap().transform, open);
    }

    #[test]
    fn test_eased_midpoint() {
        let (mut graph, node, _) = door();
        let to = Transform::from_xyz(1.0, 0.0, 0.0);
        let mut anim = TransformAnimation::new(node, Transform::IDENTITY, to, 1.0);
        anim.advance(&mut graph, 0.5);
        let x = graph.get(node).unwrap().transform.translation.x;
        assert!((x - 0.5).abs() < 1e-6);
        anim.advance(&mut graph, 0.25);
        let x = graph.get(node).unwrap().transform.translation.x;
        // smoothstep(0.75)
        assert!((x - 0.84375).abs() < 1e-5);
    }

    #[test]
    fn test_zero_duration_is_immediate() {
        let (mut graph, node, open) = door();
        let mut anim = TransformAnimation::new(node, Transform::IDENTITY, open, 0.0);
        assert!(anim.advance(&mut graph, 0.0));
        assert_eq!(graph.get(node).unwrap().transform, open);
    }

    #[test]
    fn test_missing_node_finishes() {
        let (mut graph, node, open) = door();
        graph.despawn(node);
        let mut anim = TransformAnimation::new(node, Transform::IDENTITY, open, 1.0);
        assert!(anim.advance(&mut graph, 0.1));
        assert!(graph.get(node).is_none());
    }
}
