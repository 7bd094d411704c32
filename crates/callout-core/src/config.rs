//! Configuration loading and validation
//!
//! A view is configured from a TOML document: which model to load, how to
//! place it, the callout tuning constants, gesture limits and the list of
//! annotated parts.

use anyhow::Result;
use glam::{EulerRot, Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::parts::PartDescriptor;
use crate::transform::Transform;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to serialize configuration: {0}")]
    SerializeError(#[from] toml::ser::Error),
    #[error("Duplicate part id: {0}")]
    DuplicatePart(String),
    #[error("Invalid part {id}: {reason}")]
    InvalidPart { id: String, reason: String },
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverlayConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub overlay: AnnotationConfig,
    #[serde(default)]
    pub placement: PlacementConfig,
    #[serde(default)]
    pub gesture: GestureConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_callout: Option<RootCalloutConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub door: Option<DoorConfig>,
    #[serde(default, rename = "part")]
    pub parts: Vec<PartDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Identifier handed to the model loader
    #[serde(default = "default_model_id")]
    pub id: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            id: default_model_id(),
        }
    }
}

fn default_model_id() -> String {
    "ess-cabinet".to_string()
}

/// Callout and leader-line tuning constants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationConfig {
    /// Desired world-space callout width in meters
    #[serde(default = "default_target_width")]
    pub target_width: f32,
    /// Anchor lift proportional to the part's half height
    #[serde(default = "default_offset_k")]
    pub offset_k: f32,
    /// Flat anchor clearance above the part
    #[serde(default = "default_offset_c")]
    pub offset_c: f32,
    /// Shortest leader stick drawn
    #[serde(default = "default_min_length")]
    pub min_length: f32,
    /// Arrowhead distance back from the callout center
    #[serde(default = "default_tip_backoff")]
    pub tip_backoff: f32,
    /// Widths below this are treated as unmeasurable
    #[serde(default = "default_width_epsilon")]
    pub width_epsilon: f32,
    /// Initial state of the "show annotations" toggle
    #[serde(default = "default_true")]
    pub show_annotations: bool,
    /// Place a marker sphere at every computed anchor
    #[serde(default)]
    pub show_probes: bool,
    #[serde(default = "default_stick_thickness")]
    pub stick_thickness: f32,
    #[serde(default = "default_tip_radius")]
    pub tip_radius: f32,
    #[serde(default = "default_tip_height")]
    pub tip_height: f32,
    /// Glyph height of fallback text labels
    #[serde(default = "default_label_size")]
    pub label_size: f32,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            target_width: default_target_width(),
            offset_k: default_offset_k(),
            offset_c: default_offset_c(),
            min_length: default_min_length(),
            tip_backoff: default_tip_backoff(),
            width_epsilon: default_width_epsilon(),
            show_annotations: true,
            show_probes: false,
            stick_thickness: default_stick_thickness(),
            tip_radius: default_tip_radius(),
            tip_height: default_tip_height(),
            label_size: default_label_size(),
        }
    }
}

fn default_target_width() -> f32 {
    0.16
}

fn default_offset_k() -> f32 {
    1.0
}

fn default_offset_c() -> f32 {
    0.1
}

fn default_min_length() -> f32 {
    0.05
}

fn default_tip_backoff() -> f32 {
    0.015
}

fn default_width_epsilon() -> f32 {
    0.0001
}

fn default_stick_thickness() -> f32 {
    0.002
}

fn default_tip_radius() -> f32 {
    0.008
}

fn default_tip_height() -> f32 {
    0.02
}

fn default_label_size() -> f32 {
    0.06
}

fn default_true() -> bool {
    true
}

/// One-time placement of the loaded model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementConfig {
    /// Shift so the bounds are centered on X
    #[serde(default = "default_true")]
    pub center_x: bool,
    /// Shift so the bounds are centered on Z
    #[serde(default = "default_true")]
    pub center_z: bool,
    /// Shift so the lowest point sits at Y = 0
    #[serde(default = "default_true")]
    pub ground: bool,
    /// Added after centering
    #[serde(default)]
    pub offset: [f32; 3],
    /// Multiplies the model's initial scale
    #[serde(default = "default_scale")]
    pub scale: f32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            center_x: true,
            center_z: true,
            ground: true,
            offset: [0.0; 3],
            scale: default_scale(),
        }
    }
}

fn default_scale() -> f32 {
    1.0
}

/// Gesture mapping and limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GestureConfig {
    /// Drop the vertical component of drag translations
    #[serde(default)]
    pub grounded: bool,
    /// Input units to scene meters
    #[serde(default = "default_input_to_scene")]
    pub input_to_scene: f32,
    #[serde(default = "default_min_scale")]
    pub min_scale: f32,
    #[serde(default = "default_max_scale")]
    pub max_scale: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            grounded: false,
            input_to_scene: default_input_to_scene(),
            min_scale: default_min_scale(),
            max_scale: default_max_scale(),
        }
    }
}

fn default_input_to_scene() -> f32 {
    1.0
}

fn default_min_scale() -> f32 {
    0.05
}

fn default_max_scale() -> f32 {
    20.0
}

/// Model-wide callout floating above the whole model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootCalloutConfig {
    pub title: String,
    #[serde(default)]
    pub detail: String,
    /// Lift above the model center in multiples of its half height
    #[serde(default = "default_height_factor")]
    pub height_factor: f32,
}

fn default_height_factor() -> f32 {
    1.4
}

/// Pose given as translation plus Euler angles in degrees (XYZ order)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseConfig {
    #[serde(default)]
    pub translation: [f32; 3],
    #[serde(default)]
    pub rotation_deg: [f32; 3],
}

impl PoseConfig {
    /// Transform with this pose and the scale of `base`
    pub fn to_transform(&self, base: &Transform) -> Transform {
        let [rx, ry, rz] = self.rotation_deg.map(f32::to_radians);
        Transform {
            translation: Vec3::from_array(self.translation),
            rotation: Quat::from_euler(EulerRot::XYZ, rx, ry, rz),
            scale: base.scale,
        }
    }
}

/// Animated sub-node toggled by the host ("open door")
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoorConfig {
    /// Name of the node to move
    #[serde(default = "default_door_node")]
    pub node: String,
    #[serde(default = "default_door_duration")]
    pub duration_secs: f32,
    pub open: PoseConfig,
    pub closed: PoseConfig,
}

fn default_door_node() -> String {
    "Door".to_string()
}

fn default_door_duration() -> f32 {
    0.5
}

impl OverlayConfig {
    /// Parse and validate a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: OverlayConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check the numeric constants; part validation happens in the registry
    pub fn validate(&self) -> Result<(), ConfigError> {
        let o = &self.overlay;
        positive("overlay.target_width", o.target_width)?;
        positive("overlay.min_length", o.min_length)?;
        positive("overlay.width_epsilon", o.width_epsilon)?;
        positive("overlay.label_size", o.label_size)?;
        non_negative("overlay.tip_backoff", o.tip_backoff)?;
        finite("overlay.offset_k", o.offset_k)?;
        finite("overlay.offset_c", o.offset_c)?;
        positive("placement.scale", self.placement.scale)?;
        positive("gesture.input_to_scene", self.gesture.input_to_scene)?;
        positive("gesture.min_scale", self.gesture.min_scale)?;
        if self.gesture.max_scale < self.gesture.min_scale {
            return Err(ConfigError::InvalidValue {
                field: "gesture.max_scale",
                reason: format!(
                    "{} is below gesture.min_scale {}",
                    self.gesture.max_scale, self.gesture.min_scale
                ),
            });
        }
        if let Some(door) = &self.door {
            non_negative("door.duration_secs", door.duration_secs)?;
        }
        Ok(())
    }

    /// Battery cabinet preset used when writing a starter configuration
    pub fn sample() -> Self {
        Self {
            model: ModelConfig::default(),
            overlay: AnnotationConfig {
                target_width: 0.35,
                offset_c: 0.15,
                ..AnnotationConfig::default()
            },
            placement: PlacementConfig::default(),
            gesture: GestureConfig::default(),
            root_callout: Some(RootCalloutConfig {
                title: "ESS Cabinet".to_string(),
                detail: "10 battery modules, 48 V each".to_string(),
                height_factor: default_height_factor(),
            }),
            door: Some(DoorConfig {
                node: default_door_node(),
                duration_secs: default_door_duration(),
                open: PoseConfig {
                    translation: [-0.39, 0.0, 0.31],
                    rotation_deg: [0.0, -100.0, 0.0],
                },
                closed: PoseConfig {
                    translation: [-0.39, 0.0, 0.31],
                    rotation_deg: [0.0, 0.0, 0.0],
                },
            }),
            parts: vec![
                PartDescriptor::new(
                    "control_panel",
                    "ControlPanel",
                    "Control Panel",
                    "Status display and module LEDs",
                    Vec3::new(0.0, 0.05, 0.1),
                ),
                PartDescriptor::new(
                    "module_0",
                    "Module_0",
                    "Module M1",
                    "Top-left battery module",
                    Vec3::new(-0.6, -0.15, 0.3),
                ),
                PartDescriptor::new(
                    "module_9",
                    "Module_9",
                    "Module M10",
                    "Bottom-right battery module",
                    Vec3::new(0.6, -0.15, 0.3),
                ),
            ],
        }
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field,
            reason: format!("{} must be greater than zero", value),
        })
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field,
            reason: format!("{} must not be negative", value),
        })
    }
}

fn finite(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field,
            reason: "must be finite".to_string(),
        })
    }
}

/// Load configuration from file, falling back to defaults when it does not exist
pub fn load_config(path: &Path) -> Result<OverlayConfig> {
    if path.exists() {
        let config = OverlayConfig::from_file(path)?;
        info!(
            path = %path.display(),
            parts = config.parts.len(),
            "Loaded configuration"
        );
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(OverlayConfig::default())
    }
}

/// Save the sample configuration to file
pub fn save_default_config(path: &Path) -> Result<()> {
    let content = OverlayConfig::sample().to_toml()?;
    std::fs::write(path, content)?;
    Ok(())
}
