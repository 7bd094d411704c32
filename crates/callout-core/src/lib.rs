//! Callout Core - Spatial annotation overlay engine
//!
//! This crate keeps floating callouts attached to named parts of a 3D model:
//! - Arena scene graph with pre-order name lookup and world-space helpers
//! - One-time model placement with a collision volume for hit testing
//! - Callout attachments normalized to a fixed world width every frame
//! - Leader lines (stick + arrowhead) between each part and its callout
//! - Drag and pinch gesture sessions acting on the model root
//! - TOML configuration for parts and tuning constants
//!
//! Rendering is left to the host, which mirrors the graph into its own scene.

pub mod animation;
pub mod attachment;
pub mod config;
pub mod gesture;
pub mod graph;
pub mod leader;
pub mod parts;
pub mod root;
pub mod sync;
pub mod transform;
pub mod view;

pub use attachment::{Attachment, AttachmentKind, CalloutProvider, CalloutView, NoCallouts};
pub use config::{load_config, save_default_config, ConfigError, OverlayConfig};
pub use gesture::{GestureController, GestureEvent, GesturePhase, ManipulationKind};
pub use graph::{CollisionShape, NodeId, SceneGraph, SceneNode, Shape, Visual};
pub use leader::{LeaderGeometry, LeaderLine};
pub use parts::{PartDescriptor, PartRegistry};
pub use root::{LoadError, ModelLoader};
pub use sync::SyncReport;
pub use transform::{Aabb, Transform};
pub use view::{OverlayError, OverlayView};

pub use glam;
