//! Entity registry document: the YAML file every other component reads.
//!
//! Layout:
//! ```yaml
//! metadata:
//!   version: "1.0.0"
//!   lastUpdated: 2026-10-01T00:00:00Z
//!   entityCount: 2
//!   checksumAlgorithm: sha256
//! categories:
//!   tasks:
//!     description: Executable task definitions
//! entities:
//!   tasks:
//!     validate-story:
//!       path: tasks/validate-story.md
//!       type: task
//!       ...
//! ```
//!
//! The key under a category is the entity id; ids are unique across the
//! whole document. Unknown entity keys survive a load/save cycle.

use crate::error::{IdsError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

pub const CHECKSUM_ALGORITHM: &str = "sha256";

// ---------------------------------------------------------------------------
// Serde helpers
// ---------------------------------------------------------------------------

/// Treat an explicit YAML `null` the same as a missing key.
fn null_as_default<'de, D, T>(d: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

type CategoryEntities = BTreeMap<String, Entity>;

/// `entities:` may hold categories that map to `null` (declared, still empty).
fn deserialize_entities<'de, D>(
    d: D,
) -> std::result::Result<BTreeMap<String, CategoryEntities>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, Option<CategoryEntities>>> = Option::deserialize(d)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(category, entities)| (category, entities.unwrap_or_default()))
        .collect())
}

// ---------------------------------------------------------------------------
// Metadata / categories
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryMetadata {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub entity_count: usize,
    #[serde(default = "default_algorithm")]
    pub checksum_algorithm: String,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_algorithm() -> String {
    CHECKSUM_ALGORITHM.to_string()
}

impl Default for RegistryMetadata {
    fn default() -> Self {
        Self {
            version: default_version(),
            last_updated: None,
            entity_count: 0,
            checksum_algorithm: default_algorithm(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Category {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// Recorded when an artifact was created despite existing candidates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateJustification {
    #[serde(default)]
    pub evaluated_patterns: Vec<String>,
    #[serde(default)]
    pub rejection_reasons: BTreeMap<String, String>,
    #[serde(default)]
    pub new_capability: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_scheduled: Option<DateTime<Utc>>,
}

/// Declared structural hints consumed by the decision engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Adaptability {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub constraints: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub extension_points: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    #[serde(default)]
    pub id: String,
    pub path: String,
    #[serde(rename = "type", default)]
    pub entity_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub keywords: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub purpose: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub used_by: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub dependencies: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub checksum: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_verified: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_justification: Option<CreateJustification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adaptability: Option<Adaptability>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Entity {
    pub fn new(id: impl Into<String>, path: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            entity_type: entity_type.into(),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub metadata: RegistryMetadata,
    #[serde(default, deserialize_with = "null_as_default")]
    pub categories: BTreeMap<String, Category>,
    #[serde(default, deserialize_with = "deserialize_entities")]
    pub entities: BTreeMap<String, CategoryEntities>,
}

impl Registry {
    /// Parse a registry document. The root must be a mapping; an empty file
    /// or a scalar root is corrupt, not an empty registry.
    pub fn from_yaml(data: &str) -> Result<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(data)
            .map_err(|e| IdsError::RegistryCorrupt(format!("malformed YAML: {e}")))?;
        if !value.is_mapping() {
            return Err(IdsError::RegistryCorrupt(
                "document root is not a mapping".to_string(),
            ));
        }
        let mut registry: Registry = serde_yaml::from_value(value)
            .map_err(|e| IdsError::RegistryCorrupt(format!("schema mismatch: {e}")))?;
        for entities in registry.entities.values_mut() {
            for (key, entity) in entities.iter_mut() {
                if entity.id.is_empty() {
                    entity.id = key.clone();
                }
            }
        }
        Ok(registry)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.values().map(BTreeMap::len).sum()
    }

    /// Every entity with its category, in category then id order.
    pub fn iter_entities(&self) -> impl Iterator<Item = (&str, &Entity)> {
        self.entities
            .iter()
            .flat_map(|(cat, ents)| ents.values().map(move |e| (cat.as_str(), e)))
    }

    pub fn category_of(&self, id: &str) -> Option<&str> {
        self.entities
            .iter()
            .find(|(_, ents)| ents.values().any(|e| e.id == id))
            .map(|(cat, _)| cat.as_str())
    }

    pub fn find(&self, id: &str) -> Option<&Entity> {
        self.entities
            .values()
            .flat_map(|ents| ents.values())
            .find(|e| e.id == id)
    }

    /// Replace the entity with the same id in place. Returns false when the
    /// id is not present anywhere.
    pub fn replace_entity(&mut self, entity: Entity) -> bool {
        for ents in self.entities.values_mut() {
            if let Some(slot) = ents.values_mut().find(|e| e.id == entity.id) {
                *slot = entity;
                return true;
            }
        }
        false
    }

    /// Insert into `category`, or replace wherever the id already lives.
    pub fn upsert_entity(&mut self, category: &str, entity: Entity) {
        if self.find(&entity.id).is_some() {
            self.replace_entity(entity);
            return;
        }
        self.categories.entry(category.to_string()).or_default();
        self.entities
            .entry(category.to_string())
            .or_default()
            .insert(entity.id.clone(), entity);
    }

    /// Stamp `lastUpdated` and recount entities before a write.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.metadata.last_updated = Some(now);
        self.metadata.entity_count = self.entity_count();
        if self.metadata.checksum_algorithm.is_empty() {
            self.metadata.checksum_algorithm = default_algorithm();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
metadata:
  version: "2.1.0"
  entityCount: 2
  checksumAlgorithm: sha256
categories:
  tasks:
    description: Task definitions
entities:
  tasks:
    validate-story:
      path: tasks/validate-story.md
      type: task
      keywords: [validate, story]
      purpose: Validate story drafts
      usedBy: [po-agent]
      dependencies: []
      checksum: "sha256:abc"
      lastVerified: 2026-10-01T00:00:00Z
      owner: qa-team
  agents:
    po-agent:
      path: agents/po.md
      type: agent
      keywords: ~
"#;

    #[test]
    fn parse_fills_ids_from_keys() {
        let reg = Registry::from_yaml(SAMPLE).unwrap();
        assert_eq!(reg.entity_count(), 2);
        let e = reg.find("validate-story").unwrap();
        assert_eq!(e.entity_type, "task");
        assert_eq!(e.used_by, vec!["po-agent"]);
        assert_eq!(reg.category_of("po-agent"), Some("agents"));
        assert!(reg.find("po-agent").unwrap().keywords.is_empty());
    }

    #[test]
    fn unknown_entity_keys_survive_roundtrip() {
        let reg = Registry::from_yaml(SAMPLE).unwrap();
        let yaml = reg.to_yaml().unwrap();
        assert!(yaml.contains("owner: qa-team"));
        assert!(yaml.contains("usedBy:"));
        let again = Registry::from_yaml(&yaml).unwrap();
        assert_eq!(again, reg);
    }

    #[test]
    fn category_only_registry_has_no_entities() {
        let yaml = "metadata:\n  version: '1'\ncategories:\n  tasks: {}\nentities:\n  tasks:\n";
        let reg = Registry::from_yaml(yaml).unwrap();
        assert_eq!(reg.entity_count(), 0);
        assert!(reg.entities.contains_key("tasks"));
    }

    #[test]
    fn empty_document_is_corrupt() {
        for data in ["", "~", "just a string", "- a\n- b\n"] {
            let err = Registry::from_yaml(data).unwrap_err();
            assert_eq!(err.code(), "IDS_REGISTRY_CORRUPT", "input: {data:?}");
        }
    }

    #[test]
    fn malformed_yaml_is_corrupt() {
        let err = Registry::from_yaml("metadata: [unclosed").unwrap_err();
        assert!(matches!(err, IdsError::RegistryCorrupt(_)));
    }

    #[test]
    fn upsert_and_touch() {
        let mut reg = Registry::default();
        reg.upsert_entity("scripts", Entity::new("build", "scripts/build.sh", "script"));
        reg.upsert_entity("scripts", Entity::new("build", "scripts/build2.sh", "script"));
        assert_eq!(reg.entity_count(), 1);
        assert_eq!(reg.find("build").unwrap().path, "scripts/build2.sh");
        reg.touch(Utc::now());
        assert_eq!(reg.metadata.entity_count, 1);
        assert!(reg.metadata.last_updated.is_some());
        assert!(reg.categories.contains_key("scripts"));
    }
}
