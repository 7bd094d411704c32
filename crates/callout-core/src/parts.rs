//! Part registry - which named sub-parts of a model get a callout

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::attachment::ROOT_CALLOUT_ID;
use crate::config::ConfigError;

/// Static description of one annotated part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartDescriptor {
    /// Unique key (e.g., "steering")
    pub id: String,
    /// Node name searched for in the loaded model (e.g., "SteeringWheel374")
    pub target: String,
    /// Callout heading
    pub title: String,
    /// Callout body text
    #[serde(default)]
    pub detail: String,
    /// Extra world-space offset added to the computed anchor
    #[serde(default)]
    pub offset: [f32; 3],
}

impl PartDescriptor {
    pub fn new(
        id: impl Into<String>,
        target: impl Into<String>,
        title: impl Into<String>,
        detail: impl Into<String>,
        offset: Vec3,
    ) -> Self {
        Self {
            id: id.into(),
            target: target.into(),
            title: title.into(),
            detail: detail.into(),
            offset: offset.to_array(),
        }
    }

    pub fn offset(&self) -> Vec3 {
        Vec3::from_array(self.offset)
    }
}

/// Ordered, validated list of part descriptors
#[derive(Debug, Clone, Default)]
pub struct PartRegistry {
    parts: Vec<PartDescriptor>,
}

impl PartRegistry {
    /// Build a registry, rejecting empty, reserved or duplicate ids and empty targets
    pub fn new(parts: Vec<PartDescriptor>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for part in &parts {
            if part.id.trim().is_empty() {
                return Err(ConfigError::InvalidPart {
                    id: part.id.clone(),
                    reason: "id must not be empty".to_string(),
                });
            }
            if part.id == ROOT_CALLOUT_ID {
                return Err(ConfigError::InvalidPart {
                    id: part.id.clone(),
                    reason: format!("\"{}\" is reserved for the model callout", ROOT_CALLOUT_ID),
                });
            }
            if part.target.trim().is_empty() {
                return Err(ConfigError::InvalidPart {
                    id: part.id.clone(),
                    reason: "target node name must not be empty".to_string(),
                });
            }
            if !part.offset.iter().all(|v| v.is_finite()) {
                return Err(ConfigError::InvalidPart {
                    id: part.id.clone(),
                    reason: "offset must be finite".to_string(),
                });
            }
            if !seen.insert(part.id.as_str()) {
                return Err(ConfigError::DuplicatePart(part.id.clone()));
            }
        }
        Ok(Self { parts })
    }

    pub fn get(&self, id: &str) -> Option<&PartDescriptor> {
        self.parts.iter().find(|p| p.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PartDescriptor> {
        self.parts.iter()
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(id: &str, target: &str) -> PartDescriptor {
        PartDescriptor::new(id, target, id, "", Vec3::ZERO)
    }

    #[test]
    fn test_registry_keeps_declaration_order() {
        let registry = PartRegistry::new(vec![part("b", "B"), part("a", "A")]).unwrap();
        let ids: Vec<_> = registry.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(registry.get("a").unwrap().target, "A");
        assert!(registry.get("c").is_none());
    }

    #[test]
    fn test_registry_rejects_reserved_id() {
        let err = PartRegistry::new(vec![part("a", "A"), part(ROOT_CALLOUT_ID, "Model")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPart { id, .. } if id == ROOT_CALLOUT_ID));
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let err = PartRegistry::new(vec![part("a", "A"), part("a", "B")]).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicatePart(id) if id == "a"));
    }

    #[test]
    fn test_registry_rejects_empty_fields() {
        assert!(matches!(
            PartRegistry::new(vec![part(" ", "A")]),
            Err(ConfigError::InvalidPart { .. })
        ));
        assert!(matches!(
            PartRegistry::new(vec![part("a", "")]),
            Err(ConfigError::InvalidPart { .. })
        ));
    }

    #[test]
    fn test_offset_conversion() {
        let p = PartDescriptor::new("id", "node", "Title", "Detail", Vec3::new(0.0, 0.3, 0.0));
        assert_eq!(p.offset(), Vec3::new(0.0, 0.3, 0.0));
    }
}
