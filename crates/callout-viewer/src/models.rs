//! Procedural demo models
//!
//! Node names match the part targets in the shipped configurations, so the
//! overlay finds the same parts it would in an imported asset.

use bevy::prelude::Resource;
use callout_core::glam::{Quat, Vec3};
use callout_core::{LoadError, ModelLoader, NodeId, SceneGraph, SceneNode, Shape, Transform, Visual};
use std::f32::consts::FRAC_PI_2;
use tracing::debug;

const FRAME_GRAY: [f32; 4] = [0.15, 0.15, 0.16, 1.0];
const INTERIOR_GRAY: [f32; 4] = [0.25, 0.25, 0.26, 1.0];
const MODULE_GRAY: [f32; 4] = [0.32, 0.33, 0.35, 1.0];
const CELL_BLUE: [f32; 4] = [0.2, 0.3, 0.8, 1.0];
const LED_GREEN: [f32; 4] = [0.1, 0.9, 0.2, 1.0];
const LED_YELLOW: [f32; 4] = [0.95, 0.85, 0.1, 1.0];
const SCREEN_CYAN: [f32; 4] = [0.0, 0.8, 1.0, 1.0];
const GLASS: [f32; 4] = [0.6, 0.7, 0.8, 0.3];
const CABLE_COLORS: [[f32; 4]; 5] = [
    [0.95, 0.85, 0.1, 1.0],
    [0.95, 0.85, 0.1, 1.0],
    [0.05, 0.05, 0.05, 1.0],
    [0.85, 0.1, 0.1, 1.0],
    [0.1, 0.2, 0.9, 1.0],
];
const STEEL: [f32; 4] = [0.62, 0.64, 0.68, 1.0];
const TITANIUM: [f32; 4] = [0.48, 0.5, 0.55, 1.0];
const FLAME: [f32; 4] = [0.9, 0.45, 0.15, 1.0];
const PAINT: [f32; 4] = [0.7, 0.08, 0.1, 1.0];
const TIRE: [f32; 4] = [0.06, 0.06, 0.06, 1.0];
const TAIL_RED: [f32; 4] = [1.0, 0.05, 0.05, 1.0];
const LEATHER: [f32; 4] = [0.2, 0.14, 0.1, 1.0];

/// Model loader for the built-in demo models
#[derive(Debug, Default, Resource)]
pub struct ProceduralModels;

impl ProceduralModels {
    pub const IDS: [&'static str; 3] = ["ess-cabinet", "turbofan", "car"];
}

impl ModelLoader for ProceduralModels {
    fn load(&mut self, graph: &mut SceneGraph, identifier: &str) -> Result<NodeId, LoadError> {
        let root = match identifier {
            "ess-cabinet" => ess_cabinet(graph),
            "turbofan" => turbofan(graph),
            "car" => car(graph),
            other => return Err(LoadError::NotFound(other.to_string())),
        };
        debug!(model = %identifier, nodes = graph.descendants(root).count(), "Built procedural model");
        Ok(root)
    }
}

fn solid(name: impl Into<String>, shape: Shape, color: [f32; 4], transform: Transform) -> SceneNode {
    SceneNode::new(name).with_transform(transform).with_visual(Visual::new(shape, color))
}

fn cuboid(x: f32, y: f32, z: f32) -> Shape {
    Shape::Box {
        size: Vec3::new(x, y, z),
    }
}

/// Battery cabinet: frame, ten modules in a 5x2 rack, control panel, vents,
/// cables and a hinged glass door
fn ess_cabinet(graph: &mut SceneGraph) -> NodeId {
    let cabinet = graph.spawn(SceneNode::new("ESSCabinet"));

    graph.spawn_child(cabinet, solid("Frame", cuboid(0.8, 2.0, 0.6), FRAME_GRAY, Transform::IDENTITY));
    graph.spawn_child(
        cabinet,
        solid("Interior", cuboid(0.75, 1.95, 0.55), INTERIOR_GRAY, Transform::from_xyz(0.0, 0.0, -0.02)),
    );

    for i in 0..10 {
        let row = (i / 2) as f32;
        let col = (i % 2) as f32;
        let module = graph.spawn_child(
            cabinet,
            SceneNode::new(format!("Module_{}", i)).with_transform(Transform::from_xyz(-0.15 + col * 0.3, 0.7 - row * 0.35, 0.0)),
        );
        battery_module(graph, module, i);
    }

    let panel = graph.spawn_child(
        cabinet,
        solid("ControlPanel", cuboid(0.6, 0.15, 0.05), [0.3, 0.3, 0.3, 1.0], Transform::from_xyz(0.0, 0.85, 0.25)),
    );
    graph.spawn_child(
        panel,
        solid("Screen", cuboid(0.3, 0.1, 0.01), SCREEN_CYAN, Transform::from_xyz(0.0, 0.0, 0.03)),
    );
    for i in 0..5 {
        let color = if i < 3 { LED_GREEN } else { LED_YELLOW };
        graph.spawn_child(
            panel,
            solid(
                format!("Led_{}", i),
                Shape::Sphere { radius: 0.01 },
                color,
                Transform::from_xyz(-0.2 + i as f32 * 0.05, -0.05, 0.03),
            ),
        );
    }

    for i in 0..3 {
        graph.spawn_child(
            cabinet,
            solid(
                format!("Vent_{}", i),
                cuboid(0.7, 0.02, 0.1),
                [0.35, 0.35, 0.37, 1.0],
                Transform::from_xyz(0.0, -0.85 + i as f32 * 0.05, 0.25),
            ),
        );
    }

    for (i, color) in CABLE_COLORS.iter().enumerate() {
        graph.spawn_child(
            cabinet,
            solid(
                format!("Cable_{}", i),
                Shape::Cylinder {
                    radius: 0.005,
                    height: 0.3,
                },
                *color,
                Transform::from_xyz(-0.3 + i as f32 * 0.02, 0.5, -0.2).with_rotation(Quat::from_rotation_x(FRAC_PI_2)),
            ),
        );
    }

    // Hinge on the left front edge; the panel hangs off to +X
    let door = graph.spawn_child(cabinet, SceneNode::new("Door").with_transform(Transform::from_xyz(-0.39, 0.0, 0.31)));
    graph.spawn_child(
        door,
        solid("DoorPanel", cuboid(0.76, 1.96, 0.02), GLASS, Transform::from_xyz(0.38, 0.0, 0.0)),
    );
    graph.spawn_child(
        door,
        solid("DoorHandle", cuboid(0.02, 0.15, 0.03), STEEL, Transform::from_xyz(0.71, 0.0, 0.025)),
    );

    cabinet
}

fn battery_module(graph: &mut SceneGraph, module: NodeId, index: usize) {
    graph.spawn_child(module, solid("Case", cuboid(0.25, 0.3, 0.4), MODULE_GRAY, Transform::IDENTITY));

    for row in 0..2 {
        for col in 0..4 {
            graph.spawn_child(
                module,
                solid(
                    format!("Cell_{}_{}", row, col),
                    Shape::Cylinder {
                        radius: 0.02,
                        height: 0.25,
                    },
                    CELL_BLUE,
                    Transform::from_xyz(-0.08 + col as f32 * 0.05, -0.05 + row as f32 * 0.1, 0.15)
                        .with_rotation(Quat::from_rotation_x(FRAC_PI_2)),
                ),
            );
        }
    }

    let status = if index < 8 { LED_GREEN } else { LED_YELLOW };
    graph.spawn_child(module, solid("Status", cuboid(0.2, 0.02, 0.01), status, Transform::from_xyz(0.0, 0.1, 0.21)));
    graph.spawn_child(
        module,
        solid("Label", cuboid(0.08, 0.03, 0.001), [1.0; 4], Transform::from_xyz(0.0, -0.1, 0.21)),
    );
}

/// Turbofan engine along the X axis, nested the way imported scene files are
fn turbofan(graph: &mut SceneGraph) -> NodeId {
    let model = graph.spawn(SceneNode::new("Turbofan"));
    let sketch = graph.spawn_child(model, SceneNode::new("Sketchfab_model"));
    let root_node = graph.spawn_child(sketch, SceneNode::new("RootNode"));
    let engine = graph.spawn_child(
        root_node,
        SceneNode::new("Engine").with_transform(Transform::from_xyz(0.0, 0.5, 0.0)),
    );

    // Cylinders are built along Y; lay them along X
    let along_x = Transform::IDENTITY.with_rotation(Quat::from_rotation_z(FRAC_PI_2));

    graph.spawn_child(
        engine,
        solid(
            "Object_2",
            Shape::Cylinder {
                radius: 0.42,
                height: 0.06,
            },
            TITANIUM,
            Transform {
                translation: Vec3::new(-0.75, 0.0, 0.0),
                ..along_x
            },
        ),
    );
    graph.spawn_child(
        engine,
        solid(
            "Object_3",
            Shape::Cylinder {
                radius: 0.04,
                height: 1.8,
            },
            STEEL,
            along_x,
        ),
    );
    let case = graph.spawn_child(
        engine,
        solid(
            "Object_4",
            Shape::Cylinder {
                radius: 0.36,
                height: 0.7,
            },
            [0.55, 0.57, 0.6, 0.45],
            Transform {
                translation: Vec3::new(0.1, 0.0, 0.0),
                ..along_x
            },
        ),
    );
    // Nested inside the case, in the case's frame (its Y is the engine axis)
    graph.spawn_child(
        case,
        solid(
            "Object_13",
            Shape::Cylinder {
                radius: 0.22,
                height: 0.5,
            },
            FLAME,
            Transform::IDENTITY,
        ),
    );
    for i in 0..3 {
        graph.spawn_child(
            engine,
            solid(
                format!("Object_{}", 20 + i),
                Shape::Cylinder {
                    radius: 0.3 - i as f32 * 0.04,
                    height: 0.05,
                },
                TITANIUM,
                Transform {
                    translation: Vec3::new(0.55 + i as f32 * 0.1, 0.0, 0.0),
                    ..along_x
                },
            ),
        );
    }
    graph.spawn_child(
        engine,
        solid(
            "Object_30",
            Shape::Cone {
                radius: 0.18,
                height: 0.3,
            },
            STEEL,
            Transform::from_xyz(0.95, 0.0, 0.0).with_rotation(Quat::from_rotation_y(-FRAC_PI_2)),
        ),
    );

    model
}

/// Hatchback along the X axis, nose at +X, with tail lights, steering
/// wheel and instrument cluster
fn car(graph: &mut SceneGraph) -> NodeId {
    let car = graph.spawn(SceneNode::new("Car"));

    graph.spawn_child(car, solid("Body", cuboid(2.0, 0.5, 0.9), PAINT, Transform::from_xyz(0.0, 0.45, 0.0)));
    graph.spawn_child(car, solid("Cabin", cuboid(1.0, 0.4, 0.85), GLASS, Transform::from_xyz(-0.1, 0.9, 0.0)));

    // Wheel axles run along Z
    for (i, (x, z)) in [(0.65, 0.45), (0.65, -0.45), (-0.65, 0.45), (-0.65, -0.45)].into_iter().enumerate() {
        graph.spawn_child(
            car,
            solid(
                format!("Wheel_{}", i),
                Shape::Cylinder {
                    radius: 0.2,
                    height: 0.15,
                },
                TIRE,
                Transform::from_xyz(x, 0.2, z).with_rotation(Quat::from_rotation_x(FRAC_PI_2)),
            ),
        );
    }

    let lights = graph.spawn_child(car, SceneNode::new("BackLight101").with_transform(Transform::from_xyz(-1.0, 0.55, 0.0)));
    for (name, z) in [("Lamp_L", 0.3), ("Lamp_R", -0.3)] {
        graph.spawn_child(lights, solid(name, cuboid(0.02, 0.08, 0.2), TAIL_RED, Transform::from_xyz(0.0, 0.0, z)));
    }

    let interior = graph.spawn_child(car, SceneNode::new("Interior").with_transform(Transform::from_xyz(0.0, 0.7, 0.0)));
    // Wheel face tilted back towards the driver
    graph.spawn_child(
        interior,
        solid(
            "SteeringWheel374",
            Shape::Cylinder {
                radius: 0.12,
                height: 0.02,
            },
            LEATHER,
            Transform::from_xyz(0.25, 0.1, 0.2).with_rotation(Quat::from_rotation_z(FRAC_PI_2 * 0.7)),
        ),
    );
    graph.spawn_child(
        interior,
        solid("HMICockpit34", cuboid(0.02, 0.12, 0.3), SCREEN_CYAN, Transform::from_xyz(0.38, 0.12, 0.2)),
    );

    car
}
