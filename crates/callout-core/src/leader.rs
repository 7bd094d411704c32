//! Leader lines connecting a part to its callout
//!
//! A leader is a thin box ("stick") stretched between the part center and the
//! callout, plus a cone ("tip") just short of the callout. Geometry is computed
//! in world space, then expressed in the parent's frame axis by axis: the
//! stick's Z axis lands exactly on the world segment even under non-uniform
//! model scale, and its thickness stays close to constant.

use glam::{Affine3A, Vec3};
use tracing::debug;

use crate::attachment::{arrow_name, leader_name, AnnotationState};
use crate::config::AnnotationConfig;
use crate::graph::{NodeId, SceneGraph, SceneNode, Shape, Visual};
use crate::transform::{look_rotation, Transform};

const LEADER_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

/// World-space geometry of one leader line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeaderGeometry {
    pub start: Vec3,
    pub end: Vec3,
    pub midpoint: Vec3,
    /// Unit vector from start to end; +Y when the endpoints coincide
    pub direction: Vec3,
    /// Actual distance between the endpoints
    pub length: f32,
    /// Drawn stick length, never below the minimum
    pub stick_length: f32,
    pub tip_position: Vec3,
}

impl LeaderGeometry {
    pub fn between(start: Vec3, end: Vec3, min_length: f32, tip_backoff: f32) -> Self {
        let delta = end - start;
        let length = delta.length();
        let direction = delta.try_normalize().unwrap_or(Vec3::Y);
        Self {
            start,
            end,
            midpoint: (start + end) * 0.5,
            direction,
            length,
            stick_length: length.max(min_length),
            tip_position: end - direction * tip_backoff,
        }
    }

    /// Stick at the midpoint, -Z towards the end, stretched along Z
    pub fn stick_transform(&self) -> Transform {
        Transform {
            translation: self.midpoint,
            rotation: look_rotation(self.direction, Vec3::Y),
            scale: Vec3::new(1.0, 1.0, self.stick_length),
        }
    }

    /// Arrowhead just before the end, apex towards the end
    pub fn tip_transform(&self) -> Transform {
        Transform {
            translation: self.tip_position,
            rotation: look_rotation(self.direction, Vec3::Y),
            scale: Vec3::ONE,
        }
    }
}

/// Node pair drawing one leader line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaderLine {
    pub stick: NodeId,
    pub tip: NodeId,
}

fn stick_node(part_id: &str, config: &AnnotationConfig) -> SceneNode {
    SceneNode::new(leader_name(part_id)).with_visual(Visual::new(
        Shape::Box {
            size: Vec3::new(config.stick_thickness, config.stick_thickness, 1.0),
        },
        LEADER_COLOR,
    ))
}

fn tip_node(part_id: &str, config: &AnnotationConfig) -> SceneNode {
    SceneNode::new(arrow_name(part_id)).with_visual(Visual::new(
        Shape::Cone {
            radius: config.tip_radius,
            height: config.tip_height,
        },
        LEADER_COLOR,
    ))
}

/// Return the leader line for `part_id`, creating missing nodes under `root`
pub fn ensure_leader(
    graph: &mut SceneGraph,
    root: NodeId,
    state: &mut AnnotationState,
    part_id: &str,
    config: &AnnotationConfig,
    enabled: bool,
) -> LeaderLine {
    if let Some(line) = state
        .leaders
        .get(part_id)
        .filter(|l| graph.contains(l.stick) && graph.contains(l.tip))
    {
        return *line;
    }

    let mut created = false;
    let mut find_or_spawn = |graph: &mut SceneGraph, name: String, build: SceneNode| {
        graph.find_first(root, &name).unwrap_or_else(|| {
            created = true;
            let mut node = build;
            node.enabled = enabled;
            graph.spawn_child(root, node)
        })
    };
    let stick = find_or_spawn(graph, leader_name(part_id), stick_node(part_id, config));
    let tip = find_or_spawn(graph, arrow_name(part_id), tip_node(part_id, config));
    if created {
        debug!(part = %part_id, stick = %stick, tip = %tip, "Created leader line");
    }

    let line = LeaderLine { stick, tip };
    state.leaders.insert(part_id.to_string(), line);
    line
}

/// Local transform under `parent` whose -Z axis maps onto world `direction`
/// with world length `length`; X and Y map to unit world length
fn oriented_local(parent: &Affine3A, position: Vec3, direction: Vec3, length: f32) -> Transform {
    let inverse = parent.inverse();
    let rotation = look_rotation(inverse.transform_vector3(direction), inverse.transform_vector3(Vec3::Y));
    let unit = |axis: Vec3| {
        let world = parent.transform_vector3(rotation * axis).length();
        if world > f32::EPSILON {
            1.0 / world
        } else {
            1.0
        }
    };
    Transform {
        translation: inverse.transform_point3(position),
        rotation,
        scale: Vec3::new(unit(Vec3::X), unit(Vec3::Y), length * unit(Vec3::Z)),
    }
}

fn place(graph: &mut SceneGraph, node: NodeId, position: Vec3, direction: Vec3, length: f32) -> bool {
    let parent = graph
        .parent(node)
        .and_then(|p| graph.world_matrix(p))
        .unwrap_or(Affine3A::IDENTITY);
    let local = oriented_local(&parent, position, direction, length);
    match graph.get_mut(node) {
        Some(n) => {
            n.transform = local;
            true
        }
        None => false,
    }
}

/// Write `geometry` onto the leader's nodes. Returns false if a node is gone.
pub fn update_leader(graph: &mut SceneGraph, line: &LeaderLine, geometry: &LeaderGeometry) -> bool {
    let stick_moved = place(graph, line.stick, geometry.midpoint, geometry.direction, geometry.stick_length);
    let tip_moved = place(graph, line.tip, geometry.tip_position, geometry.direction, 1.0);
    stick_moved && tip_moved
}
