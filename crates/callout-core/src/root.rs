//! One-time loading and placement of the annotated model

use glam::Vec3;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::PlacementConfig;
use crate::graph::{CollisionShape, NodeId, SceneGraph};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    #[error("Model not found: {0}")]
    NotFound(String),
    #[error("Model {id} is invalid: {reason}")]
    Invalid { id: String, reason: String },
}

/// Builds a model's node tree into a graph
pub trait ModelLoader {
    /// Spawn the model for `identifier` and return its top node
    fn load(&mut self, graph: &mut SceneGraph, identifier: &str) -> Result<NodeId, LoadError>;
}

/// Load, place and register the model root.
///
/// Does nothing and returns the existing root when `root` already refers to a
/// live node. On failure `root` is left unset.
pub fn initialize_root(
    graph: &mut SceneGraph,
    root: &mut Option<NodeId>,
    loader: &mut dyn ModelLoader,
    identifier: &str,
    placement: &PlacementConfig,
) -> Result<NodeId, LoadError> {
    if let Some(existing) = root.filter(|id| graph.contains(*id)) {
        return Ok(existing);
    }

    let model = loader.load(graph, identifier)?;
    if !graph.contains(model) {
        return Err(LoadError::Invalid {
            id: identifier.to_string(),
            reason: "loader returned a stale node".to_string(),
        });
    }
    graph.detach(model);

    let Some(bounds) = graph.world_bounds(model) else {
        graph.despawn(model);
        return Err(LoadError::Invalid {
            id: identifier.to_string(),
            reason: "model has no visual content".to_string(),
        });
    };

    place(graph, model, bounds.min, bounds.center(), placement);

    let collision = graph
        .local_content_bounds(model)
        .map(|b| CollisionShape::from_bounds(&b));
    if let Some(node) = graph.get_mut(model) {
        node.collision = collision;
        node.input_target = true;
    }
    graph.add_to_scene(model);
    *root = Some(model);

    info!(
        model = %identifier,
        root = %model,
        nodes = graph.descendants(model).count(),
        "Model root initialized"
    );
    for line in graph.dump_names(model) {
        debug!("{}", line);
    }

    Ok(model)
}

/// Center and ground the model using bounds measured before placement
fn place(graph: &mut SceneGraph, model: NodeId, min: Vec3, center: Vec3, placement: &PlacementConfig) {
    let Some(node) = graph.get_mut(model) else {
        return;
    };
    let original = node.transform.translation;
    let factor = placement.scale;

    // Bounds relative to the model origin, after the extra scale
    let rel_min = (min - original) * factor;
    let rel_center = (center - original) * factor;

    let mut translation = original;
    if placement.center_x {
        translation.x = -rel_center.x;
    }
    if placement.ground {
        translation.y = -rel_min.y;
    }
    if placement.center_z {
        translation.z = -rel_center.z;
    }

    node.transform.translation = translation + Vec3::from_array(placement.offset);
    node.transform.scale *= factor;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{SceneNode, Shape, Visual};
    use crate::transform::Transform;

    /// Builds a box named "Model" offset from the origin
    struct BoxLoader {
        calls: usize,
    }

    impl ModelLoader for BoxLoader {
        fn load(&mut self, graph: &mut SceneGraph, identifier: &str) -> Result<NodeId, LoadError> {
            if identifier != "box" {
                return Err(LoadError::NotFound(identifier.to_string()));
            }
            self.calls += 1;
            let root = graph.spawn(SceneNode::new("Model").with_transform(Transform::from_xyz(5.0, 3.0, -2.0)));
            graph.spawn_child(
                root,
                SceneNode::new("Body").with_visual(Visual::new(
                    Shape::Box {
                        size: Vec3::new(2.0, 1.0, 4.0),
                    },
                    [0.5; 4],
                )),
            );
            Ok(root)
        }
    }

    #[test]
    fn test_initialize_centers_and_grounds() {
        let mut graph = SceneGraph::new();
        let mut root = None;
        let mut loader = BoxLoader { calls: 0 };
        let id = initialize_root(&mut graph, &mut root, &mut loader, "box", &PlacementConfig::default()).unwrap();

        let bounds = graph.world_bounds(id).unwrap();
        assert!(bounds.center().x.abs() < 1e-5);
        assert!(bounds.center().z.abs() < 1e-5);
        assert!(bounds.min.y.abs() < 1e-5);

        let node = graph.get(id).unwrap();
        assert!(node.input_target);
        let collision = node.collision.unwrap();
        assert!(collision.half_extents.abs_diff_eq(Vec3::new(1.0, 0.5, 2.0), 1e-5));
        assert_eq!(graph.scene_roots(), &[id]);
    }

    #[test]
    fn test_initialize_applies_scale_and_offset() {
        let mut graph = SceneGraph::new();
        let mut root = None;
        let mut loader = BoxLoader { calls: 0 };
        let placement = PlacementConfig {
            offset: [0.0, 0.0, -3.0],
            scale: 0.5,
            ..PlacementConfig::default()
        };
        let id = initialize_root(&mut graph, &mut root, &mut loader, "box", &placement).unwrap();

        let bounds = graph.world_bounds(id).unwrap();
        assert!(bounds.size().abs_diff_eq(Vec3::new(1.0, 0.5, 2.0), 1e-5));
        assert!(bounds.center().abs_diff_eq(Vec3::new(0.0, 0.25, -3.0), 1e-5));
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let mut graph = SceneGraph::new();
        let mut root = None;
        let mut loader = BoxLoader { calls: 0 };
        let placement = PlacementConfig::default();

        let first = initialize_root(&mut graph, &mut root, &mut loader, "box", &placement).unwrap();
        let children = graph.children(first).len();
        let transform = graph.get(first).unwrap().transform;

        let second = initialize_root(&mut graph, &mut root, &mut loader, "box", &placement).unwrap();
        assert_eq!(first, second);
        assert_eq!(loader.calls, 1);
        assert_eq!(graph.scene_roots().len(), 1);
        assert_eq!(graph.children(first).len(), children);
        assert_eq!(graph.get(first).unwrap().transform, transform);
    }

    #[test]
    fn test_load_failure_leaves_root_unset() {
        let mut graph = SceneGraph::new();
        let mut root = None;
        let mut loader = BoxLoader { calls: 0 };
        let err = initialize_root(&mut graph, &mut root, &mut loader, "missing", &PlacementConfig::default()).unwrap_err();
        assert_eq!(err, LoadError::NotFound("missing".to_string()));
        assert!(root.is_none());
        assert!(graph.is_empty());
    }

    #[test]
    fn test_model_without_visuals_is_rejected() {
        struct EmptyLoader;
        impl ModelLoader for EmptyLoader {
            fn load(&mut self, graph: &mut SceneGraph, _identifier: &str) -> Result<NodeId, LoadError> {
                Ok(graph.spawn(SceneNode::new("Empty")))
            }
        }

        let mut graph = SceneGraph::new();
        let mut root = None;
        let err = initialize_root(&mut graph, &mut root, &mut EmptyLoader, "empty", &PlacementConfig::default()).unwrap_err();
        assert!(matches!(err, LoadError::Invalid { .. }));
        assert!(root.is_none());
        assert!(graph.is_empty());
    }
}
