//! Arena-backed scene graph
//!
//! Nodes live in generational slots so a [`NodeId`] of a destroyed node never
//! resolves to a node spawned later. Every query here is a pure function of
//! the current tree state; world transforms and bounds are recomputed on each
//! call rather than cached.

use glam::{Affine3A, Vec3};
use std::fmt;

use crate::transform::{Aabb, Transform};

/// Depth of panel and label placeholder geometry
pub const PANEL_DEPTH: f32 = 0.002;

/// Approximate advance of one glyph relative to the font size
const GLYPH_ASPECT: f32 = 0.6;

/// Handle to a node in a [`SceneGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Primitive geometry attached to a node
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Box { size: Vec3 },
    Sphere { radius: f32 },
    /// Cylinder along the local Y axis
    Cylinder { radius: f32, height: f32 },
    /// Cone whose apex points along local -Z
    Cone { radius: f32, height: f32 },
    /// Flat rectangle in the local XY plane
    Panel { width: f32, height: f32 },
    /// Single line of extruded text, left edge at the origin's left
    Text { content: String, size: f32, depth: f32 },
}

impl Shape {
    /// Bounds of the shape in its node's local frame
    pub fn local_bounds(&self) -> Aabb {
        let half = match self {
            Shape::Box { size } => *size * 0.5,
            Shape::Sphere { radius } => Vec3::splat(*radius),
            Shape::Cylinder { radius, height } => Vec3::new(*radius, height * 0.5, *radius),
            Shape::Cone { radius, height } => Vec3::new(*radius, *radius, height * 0.5),
            Shape::Panel { width, height } => Vec3::new(width * 0.5, height * 0.5, PANEL_DEPTH * 0.5),
            Shape::Text { content, size, depth } => {
                let width = content.chars().count().max(1) as f32 * size * GLYPH_ASPECT;
                Vec3::new(width * 0.5, size * 0.5, depth * 0.5)
            }
        };
        Aabb::from_center_half_extents(Vec3::ZERO, half)
    }
}

/// Render payload: a shape and its surface appearance
#[derive(Debug, Clone, PartialEq)]
pub struct Visual {
    pub shape: Shape,
    /// Linear RGBA in 0.0-1.0
    pub color: [f32; 4],
    pub unlit: bool,
}

impl Visual {
    pub fn new(shape: Shape, color: [f32; 4]) -> Self {
        Self {
            shape,
            color,
            unlit: false,
        }
    }

    pub fn unlit(mut self) -> Self {
        self.unlit = true;
        self
    }
}

/// Coarse box collision volume in the node's local frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionShape {
    pub center: Vec3,
    pub half_extents: Vec3,
}

impl CollisionShape {
    pub fn from_bounds(bounds: &Aabb) -> Self {
        Self {
            center: bounds.center(),
            half_extents: bounds.half_extents(),
        }
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_center_half_extents(self.center, self.half_extents)
    }
}

/// A node in the transform hierarchy
#[derive(Debug, Clone)]
pub struct SceneNode {
    /// Display name, not guaranteed unique
    pub name: String,
    pub transform: Transform,
    pub visual: Option<Visual>,
    pub collision: Option<CollisionShape>,
    /// Hidden (but kept) when false; hides the whole subtree
    pub enabled: bool,
    /// Ask the render environment to keep this node facing the viewer
    pub billboard: bool,
    /// Accepts pointer and gesture targeting
    pub input_target: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::IDENTITY,
            visual: None,
            collision: None,
            enabled: true,
            billboard: false,
            input_target: false,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_visual(mut self, visual: Visual) -> Self {
        self.visual = Some(visual);
        self
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<SceneNode>,
}

/// Owner of all scene nodes
#[derive(Debug, Default)]
pub struct SceneGraph {
    slots: Vec<Slot>,
    free: Vec<u32>,
    /// Top-level nodes inserted into the scene, in insertion order
    scene: Vec<NodeId>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add a detached node
    pub fn spawn(&mut self, mut node: SceneNode) -> NodeId {
        node.parent = None;
        node.children.clear();

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.node = Some(node);
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeId {
                index,
                generation: 0,
            }
        }
    }

    /// Spawn a node and append it to `parent`'s children.
    ///
    /// If `parent` no longer exists the node stays detached.
    pub fn spawn_child(&mut self, parent: NodeId, node: SceneNode) -> NodeId {
        let id = self.spawn(node);
        if !self.add_child(parent, id) {
            tracing::debug!(%parent, child = %id, "Parent missing, node left detached");
        }
        id
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_ref())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_mut())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Append `child` to `parent`, detaching it from any previous parent.
    ///
    /// Returns false when either node is missing or the move would create a cycle.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if !self.contains(parent) || !self.contains(child) || parent == child {
            return false;
        }
        if self.ancestors(parent).any(|a| a == child) {
            return false;
        }

        self.detach(child);
        if let Some(node) = self.get_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.get_mut(parent) {
            node.children.push(child);
        }
        true
    }

    /// Remove `id` from its parent (or from the scene list), keeping its subtree alive
    pub fn detach(&mut self, id: NodeId) {
        self.scene.retain(|s| *s != id);
        let Some(parent) = self.parent(id) else {
            return;
        };
        if let Some(node) = self.get_mut(parent) {
            node.children.retain(|c| *c != id);
        }
        if let Some(node) = self.get_mut(id) {
            node.parent = None;
        }
    }

    /// Destroy `id` and its whole subtree. Returns the number of nodes removed.
    pub fn despawn(&mut self, id: NodeId) -> usize {
        if !self.contains(id) {
            return 0;
        }
        self.detach(id);

        let doomed: Vec<NodeId> = self.descendants(id).collect();
        for node in &doomed {
            let slot = &mut self.slots[node.index as usize];
            slot.node = None;
            self.free.push(node.index);
        }
        doomed.len()
    }

    /// Insert a detached node into the scene as a top-level node
    pub fn add_to_scene(&mut self, id: NodeId) -> bool {
        if !self.contains(id) || self.parent(id).is_some() || self.scene.contains(&id) {
            return false;
        }
        self.scene.push(id);
        true
    }

    /// Top-level nodes inserted into the scene
    pub fn scene_roots(&self) -> &[NodeId] {
        &self.scene
    }

    /// Ancestors of `id`, nearest first (excluding `id`)
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |p| self.parent(*p))
    }

    /// Depth-first pre-order traversal starting at (and including) `root`
    pub fn descendants(&self, root: NodeId) -> Descendants<'_> {
        let stack = if self.contains(root) {
            vec![(root, 0)]
        } else {
            Vec::new()
        };
        Descendants { graph: self, stack }
    }

    /// First node named `name` in pre-order, `root` included
    pub fn find_first(&self, root: NodeId, name: &str) -> Option<NodeId> {
        self.descendants(root)
            .find(|id| self.get(*id).is_some_and(|n| n.name == name))
    }

    /// World transform: local transforms composed from the top-level ancestor down to `id`
    pub fn world_matrix(&self, id: NodeId) -> Option<Affine3A> {
        let node = self.get(id)?;
        let mut matrix = node.transform.compute_affine();
        for ancestor in self.ancestors(id) {
            let parent = self.get(ancestor)?;
            matrix = parent.transform.compute_affine() * matrix;
        }
        Some(matrix)
    }

    pub fn world_position(&self, id: NodeId) -> Option<Vec3> {
        self.world_matrix(id).map(|m| Vec3::from(m.translation))
    }

    /// Uniform scale factor of the world transform, measured along the local X axis
    pub fn world_scale_x(&self, id: NodeId) -> Option<f32> {
        self.world_matrix(id).map(|m| m.matrix3.x_axis.length())
    }

    fn parent_world_matrix(&self, id: NodeId) -> Affine3A {
        self.parent(id)
            .and_then(|p| self.world_matrix(p))
            .unwrap_or(Affine3A::IDENTITY)
    }

    /// Move `id` so its world translation is `position`; world rotation and scale are kept
    pub fn set_world_position(&mut self, id: NodeId, position: Vec3) -> bool {
        if !self.contains(id) {
            return false;
        }
        let local = self.parent_world_matrix(id).inverse().transform_point3(position);
        if let Some(node) = self.get_mut(id) {
            node.transform.translation = local;
        }
        true
    }

    /// World-space bounds of all visual content in the subtree of `id`
    pub fn world_bounds(&self, id: NodeId) -> Option<Aabb> {
        self.world_bounds_excluding(id, &[])
    }

    /// Like [`world_bounds`](Self::world_bounds), but subtrees rooted at any
    /// node in `skip` contribute nothing
    pub fn world_bounds_excluding(&self, id: NodeId, skip: &[NodeId]) -> Option<Aabb> {
        let start = self.world_matrix(id)?;
        self.content_bounds(id, start, skip)
    }

    /// Bounds of the subtree's visual content in `id`'s own frame, ignoring
    /// `id`'s transform (and so its scale)
    pub fn local_content_bounds(&self, id: NodeId) -> Option<Aabb> {
        self.content_bounds(id, Affine3A::IDENTITY, &[])
    }

    fn content_bounds(&self, id: NodeId, start: Affine3A, skip: &[NodeId]) -> Option<Aabb> {
        let mut bounds: Option<Aabb> = None;
        let mut stack = vec![(id, start)];

        while let Some((current, matrix)) = stack.pop() {
            let Some(node) = self.get(current) else {
                continue;
            };
            if let Some(visual) = &node.visual {
                let b = visual.shape.local_bounds().transformed(&matrix);
                bounds = Some(match bounds {
                    Some(acc) => acc.union(&b),
                    None => b,
                });
            }
            for child in node.children.iter().filter(|c| !skip.contains(c)) {
                if let Some(c) = self.get(*child) {
                    stack.push((*child, matrix * c.transform.compute_affine()));
                }
            }
        }
        bounds
    }

    /// Enabled state of `id` and all of its ancestors
    pub fn is_visible(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(|n| n.enabled) && self.ancestors(id).all(|a| self.get(a).is_some_and(|n| n.enabled))
    }

    pub fn set_enabled(&mut self, id: NodeId, enabled: bool) -> bool {
        match self.get_mut(id) {
            Some(node) => {
                node.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Closest input-target node whose collision volume the ray hits
    pub fn hit_test(&self, root: NodeId, origin: Vec3, direction: Vec3) -> Option<(NodeId, f32)> {
        let mut best: Option<(NodeId, f32)> = None;

        for id in self.descendants(root) {
            let Some(node) = self.get(id) else { continue };
            let Some(collision) = node.collision.filter(|_| node.input_target) else {
                continue;
            };
            let Some(world) = self.world_matrix(id) else { continue };

            // Test in the node's frame so the box stays tight under rotation
            let inverse = world.inverse();
            let local_origin = inverse.transform_point3(origin);
            let local_dir = inverse.transform_vector3(direction);
            let Some(t) = collision.bounds().ray_intersection(local_origin, local_dir) else {
                continue;
            };
            let distance = (world.transform_point3(local_origin + local_dir * t) - origin).length();
            let closer = match best {
                Some((_, d)) => distance < d,
                None => true,
            };
            if closer {
                best = Some((id, distance));
            }
        }
        best
    }

    /// Indented list of node names below `root`, one line per node
    pub fn dump_names(&self, root: NodeId) -> Vec<String> {
        self.descendants(root)
            .with_depth()
            .filter_map(|(id, depth)| {
                self.get(id)
                    .map(|n| format!("{}{}", "  ".repeat(depth), n.name))
            })
            .collect()
    }
}

/// Pre-order iterator over a subtree
pub struct Descendants<'a> {
    graph: &'a SceneGraph,
    stack: Vec<(NodeId, usize)>,
}

impl<'a> Descendants<'a> {
    /// Yield the depth below the starting node alongside each id
    pub fn with_depth(self) -> DescendantsWithDepth<'a> {
        DescendantsWithDepth { inner: self }
    }

    fn next_entry(&mut self) -> Option<(NodeId, usize)> {
        let (id, depth) = self.stack.pop()?;
        // Push in reverse so the first child is visited first
        for child in self.graph.children(id).iter().rev() {
            self.stack.push((*child, depth + 1));
        }
        Some((id, depth))
    }
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        self.next_entry().map(|(id, _)| id)
    }
}

pub struct DescendantsWithDepth<'a> {
    inner: Descendants<'a>,
}

impl Iterator for DescendantsWithDepth<'_> {
    type Item = (NodeId, usize);

    fn next(&mut self) -> Option<(NodeId, usize)> {
        self.inner.next_entry()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    fn cube(name: &str, size: f32) -> SceneNode {
        SceneNode::new(name).with_visual(Visual::new(
            Shape::Box {
                size: Vec3::splat(size),
            },
            [1.0; 4],
        ))
    }

    /// root
    ///   a
    ///     dup (first)
    ///   b
    ///     dup (second)
    fn sample() -> (SceneGraph, NodeId, NodeId, NodeId) {
        let mut graph = SceneGraph::new();
        let root = graph.spawn(SceneNode::new("root"));
        let a = graph.spawn_child(root, SceneNode::new("a"));
        let first = graph.spawn_child(a, cube("dup", 1.0));
        let b = graph.spawn_child(root, SceneNode::new("b"));
        graph.spawn_child(b, cube("dup", 1.0));
        (graph, root, first, b)
    }

    #[test]
    fn test_find_first_is_preorder() {
        let (graph, root, first, b) = sample();
        assert_eq!(graph.find_first(root, "dup"), Some(first));
        assert_eq!(graph.find_first(root, "b"), Some(b));
        assert_eq!(graph.find_first(root, "root"), Some(root));
        assert_eq!(graph.find_first(root, "missing"), None);
    }

    #[test]
    fn test_find_first_prefers_depth_over_later_siblings() {
        let mut graph = SceneGraph::new();
        let root = graph.spawn(SceneNode::new("root"));
        let a = graph.spawn_child(root, SceneNode::new("a"));
        let deep = graph.spawn_child(a, SceneNode::new("target"));
        let _shallow = graph.spawn_child(root, SceneNode::new("target"));
        assert_eq!(graph.find_first(root, "target"), Some(deep));
    }

    #[test]
    fn test_world_matrix_composes_ancestors() {
        let mut graph = SceneGraph::new();
        let root = graph.spawn(
            SceneNode::new("root").with_transform(Transform::from_xyz(1.0, 0.0, 0.0).with_scale(Vec3::splat(2.0))),
        );
        let child = graph.spawn_child(root, SceneNode::new("child").with_transform(Transform::from_xyz(0.0, 1.0, 0.0)));
        let pos = graph.world_position(child).unwrap();
        assert!(pos.abs_diff_eq(Vec3::new(1.0, 2.0, 0.0), 1e-6));
        assert!((graph.world_scale_x(child).unwrap() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_set_world_position_keeps_rotation_and_scale() {
        let mut graph = SceneGraph::new();
        let root = graph.spawn(
            SceneNode::new("root").with_transform(
                Transform::from_xyz(0.0, 1.0, 0.0)
                    .with_rotation(Quat::from_rotation_y(0.5))
                    .with_scale(Vec3::splat(3.0)),
            ),
        );
        let child = graph.spawn_child(
            root,
            SceneNode::new("child").with_transform(Transform::IDENTITY.with_scale(Vec3::splat(0.5))),
        );

        let target = Vec3::new(4.0, -2.0, 1.0);
        assert!(graph.set_world_position(child, target));
        assert!(graph.world_position(child).unwrap().abs_diff_eq(target, 1e-5));
        let node = graph.get(child).unwrap();
        assert_eq!(node.transform.scale, Vec3::splat(0.5));
        assert_eq!(node.transform.rotation, Quat::IDENTITY);
    }

    #[test]
    fn test_set_world_position_without_parent() {
        let mut graph = SceneGraph::new();
        let id = graph.spawn(SceneNode::new("lonely"));
        graph.set_world_position(id, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(graph.get(id).unwrap().transform.translation, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_world_bounds_include_descendants() {
        let mut graph = SceneGraph::new();
        let root = graph.spawn(SceneNode::new("root").with_transform(Transform::IDENTITY.with_scale(Vec3::splat(2.0))));
        graph.spawn_child(root, cube("left", 1.0).with_transform(Transform::from_xyz(-1.0, 0.0, 0.0)));
        graph.spawn_child(root, cube("right", 1.0).with_transform(Transform::from_xyz(1.0, 0.0, 0.0)));

        let world = graph.world_bounds(root).unwrap();
        assert!(world.min.abs_diff_eq(Vec3::new(-3.0, -1.0, -1.0), 1e-5));
        assert!(world.max.abs_diff_eq(Vec3::new(3.0, 1.0, 1.0), 1e-5));

        // Own scale ignored
        let local = graph.local_content_bounds(root).unwrap();
        assert!(local.size().abs_diff_eq(Vec3::new(3.0, 1.0, 1.0), 1e-5));
    }

    #[test]
    fn test_world_bounds_excluding_skips_subtrees() {
        let mut graph = SceneGraph::new();
        let root = graph.spawn(cube("root", 1.0));
        let label = graph.spawn_child(root, SceneNode::new("label").with_transform(Transform::from_xyz(0.0, 5.0, 0.0)));
        graph.spawn_child(label, cube("plate", 1.0));

        assert!((graph.world_bounds(root).unwrap().max.y - 5.5).abs() < 1e-5);
        let bounds = graph.world_bounds_excluding(root, &[label]).unwrap();
        assert!(bounds.max.abs_diff_eq(Vec3::splat(0.5), 1e-5));
    }

    #[test]
    fn test_world_bounds_empty_subtree() {
        let mut graph = SceneGraph::new();
        let root = graph.spawn(SceneNode::new("root"));
        graph.spawn_child(root, SceneNode::new("empty"));
        assert!(graph.world_bounds(root).is_none());
    }

    #[test]
    fn test_despawn_removes_subtree_and_invalidates_ids() {
        let (mut graph, root, first, _) = sample();
        let a = graph.parent(first).unwrap();
        assert_eq!(graph.despawn(a), 2);
        assert!(!graph.contains(first));
        assert_eq!(graph.children(root).len(), 1);

        // Slot reuse must not resurrect the stale id
        let fresh = graph.spawn(SceneNode::new("fresh"));
        assert_ne!(fresh, first);
        assert!(!graph.contains(first));
        assert!(graph.get(a).is_none());
    }

    #[test]
    fn test_add_child_rejects_cycles() {
        let (mut graph, root, first, _) = sample();
        assert!(!graph.add_child(first, root));
        assert!(!graph.add_child(root, root));
    }

    #[test]
    fn test_add_to_scene_only_once() {
        let mut graph = SceneGraph::new();
        let root = graph.spawn(SceneNode::new("root"));
        assert!(graph.add_to_scene(root));
        assert!(!graph.add_to_scene(root));
        assert_eq!(graph.scene_roots(), &[root]);
    }

    #[test]
    fn test_visibility_follows_ancestors() {
        let (mut graph, root, first, _) = sample();
        assert!(graph.is_visible(first));
        graph.set_enabled(root, false);
        assert!(!graph.is_visible(first));
        assert!(graph.get(first).unwrap().enabled);
    }

    #[test]
    fn test_hit_test_uses_collision_volume() {
        let mut graph = SceneGraph::new();
        let mut node = SceneNode::new("target").with_transform(Transform::from_xyz(0.0, 0.0, -5.0));
        node.collision = Some(CollisionShape {
            center: Vec3::ZERO,
            half_extents: Vec3::ONE,
        });
        node.input_target = true;
        let root = graph.spawn(node);

        let (hit, distance) = graph.hit_test(root, Vec3::ZERO, Vec3::NEG_Z).unwrap();
        assert_eq!(hit, root);
        assert!((distance - 4.0).abs() < 1e-4);
        assert!(graph.hit_test(root, Vec3::ZERO, Vec3::Z).is_none());

        graph.get_mut(root).unwrap().input_target = false;
        assert!(graph.hit_test(root, Vec3::ZERO, Vec3::NEG_Z).is_none());
    }

    #[test]
    fn test_dump_names_indents_by_depth() {
        let (graph, root, _, _) = sample();
        let lines = graph.dump_names(root);
        assert_eq!(lines, vec!["root", "  a", "    dup", "  b", "    dup"]);
    }
}
