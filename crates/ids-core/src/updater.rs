//! Registry-update collaborator: records an artifact produced by a finished
//! task so later analyses can find it.

use crate::checksum;
use crate::error::{IdsError, Result};
use crate::keywords;
use crate::loader::RegistryLoader;
use crate::paths;
use crate::registry::{CreateJustification, Entity, Registry};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

const DEFAULT_TYPE: &str = "artifact";
const REGISTERED_KEYWORD_COUNT: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub used_by: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Present when the artifact was created against a CREATE decision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<CreateJustification>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    /// Relative to the repository root.
    pub file_path: String,
    #[serde(default)]
    pub metadata: RegistrationMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationOutcome {
    pub entity_id: String,
    pub category: String,
    /// False when an existing entity was updated in place.
    pub created: bool,
    pub checksum: String,
}

pub trait RegistryUpdater: Send + Sync {
    fn on_task_complete(&self, req: &RegistrationRequest) -> Result<RegistrationOutcome>;
}

/// Writes straight into the registry file through the loader.
pub struct FileRegistryUpdater {
    loader: Arc<RegistryLoader>,
}

impl FileRegistryUpdater {
    pub fn new(loader: Arc<RegistryLoader>) -> Self {
        Self { loader }
    }
}

/// `Stories/Validate Story.md` → `validate-story`.
fn id_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_lowercase();
    stem.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

fn category_for(entity_type: &str) -> String {
    format!("{entity_type}s")
}

impl RegistryUpdater for FileRegistryUpdater {
    fn on_task_complete(&self, req: &RegistrationRequest) -> Result<RegistrationOutcome> {
        let rel = req.file_path.trim();
        let path = paths::resolve_within(self.loader.root(), rel)
            .ok_or_else(|| IdsError::InvalidFilePath(format!("'{rel}' escapes the repository root")))?;
        if !path.is_file() {
            return Err(IdsError::InvalidFilePath(format!("'{rel}' does not exist")));
        }
        let meta = &req.metadata;
        let id = meta
            .id
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| id_from_path(&path));
        if id.is_empty() {
            return Err(IdsError::InvalidEntityId(format!("cannot derive an id from '{rel}'")));
        }

        let mut registry = match self.loader.read_registry() {
            Ok(r) => r,
            Err(IdsError::RegistryNotFound(_)) => Registry::default(),
            Err(e) => return Err(e),
        };

        let now = Utc::now();
        let digest = checksum::digest_file(&path)?;
        let existing = registry.find(&id).cloned();
        let created = existing.is_none();
        let mut entity = existing.unwrap_or_else(|| {
            let mut e = Entity::new(&id, rel, DEFAULT_TYPE);
            e.created_at = Some(now);
            e
        });

        entity.path = rel.to_string();
        if let Some(t) = meta.entity_type.as_deref().filter(|t| !t.is_empty()) {
            entity.entity_type = t.to_string();
        }
        if let Some(p) = meta.purpose.as_deref() {
            entity.purpose = p.to_string();
        }
        if !meta.keywords.is_empty() {
            entity.keywords = meta.keywords.clone();
        } else if entity.keywords.is_empty() {
            let content = std::fs::read_to_string(&path).unwrap_or_default();
            entity.keywords = keywords::top_by_frequency(&content, REGISTERED_KEYWORD_COUNT);
            if entity.keywords.is_empty() {
                entity.keywords = keywords::extract(&format!("{id} {}", entity.purpose));
            }
        }
        for consumer in &meta.used_by {
            if !entity.used_by.contains(consumer) {
                entity.used_by.push(consumer.clone());
            }
        }
        for dep in &meta.dependencies {
            if !entity.dependencies.contains(dep) {
                entity.dependencies.push(dep.clone());
            }
        }
        if meta.justification.is_some() {
            entity.create_justification = meta.justification.clone();
        }
        entity.checksum = digest.clone();
        entity.last_verified = Some(now);

        let category = registry
            .category_of(&id)
            .map(str::to_string)
            .or_else(|| meta.category.clone())
            .unwrap_or_else(|| category_for(&entity.entity_type));
        registry.upsert_entity(&category, entity);
        self.loader.write(&mut registry)?;

        tracing::info!(entity = %id, category = %category, created, "artifact registered");
        Ok(RegistrationOutcome {
            entity_id: id,
            category,
            created,
            checksum: digest,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FileRegistryUpdater, Arc<RegistryLoader>) {
        let dir = TempDir::new().unwrap();
        let loader = Arc::new(RegistryLoader::new(
            dir.path(),
            dir.path().join(".ids/entity-registry.yaml"),
        ));
        std::fs::create_dir_all(dir.path().join("tasks")).unwrap();
        std::fs::write(
            dir.path().join("tasks/Release Notes.md"),
            "Release notes collect merged changes. Release notes ship weekly.",
        )
        .unwrap();
        (dir, FileRegistryUpdater::new(Arc::clone(&loader)), loader)
    }

    fn request(path: &str) -> RegistrationRequest {
        RegistrationRequest {
            file_path: path.to_string(),
            metadata: RegistrationMetadata::default(),
        }
    }

    #[test]
    fn registers_new_artifact_and_creates_registry() {
        let (_dir, updater, loader) = setup();
        let mut req = request("tasks/Release Notes.md");
        req.metadata.entity_type = Some("task".into());
        req.metadata.purpose = Some("Collect release notes".into());

        let out = updater.on_task_complete(&req).unwrap();
        assert!(out.created);
        assert_eq!(out.entity_id, "release-notes");
        assert_eq!(out.category, "tasks");
        assert!(out.checksum.starts_with("sha256:"));

        let e = loader.find_by_id("release-notes").unwrap().unwrap().entity;
        assert_eq!(e.keywords[..2], ["release".to_string(), "notes".to_string()]);
        assert!(e.created_at.is_some());
        assert!(e.last_verified.is_some());
    }

    #[test]
    fn re_registration_updates_in_place() {
        let (dir, updater, loader) = setup();
        let mut req = request("tasks/Release Notes.md");
        req.metadata.id = Some("notes".into());
        updater.on_task_complete(&req).unwrap();

        std::fs::write(dir.path().join("tasks/Release Notes.md"), "changed").unwrap();
        req.metadata.used_by = vec!["dev".into()];
        let out = updater.on_task_complete(&req).unwrap();
        assert!(!out.created);
        assert_eq!(out.category, "artifacts");
        let e = loader.find_by_id("notes").unwrap().unwrap().entity;
        assert_eq!(e.checksum, checksum::digest_bytes(b"changed"));
        assert_eq!(e.used_by, vec!["dev"]);
        assert_eq!(loader.entity_count().unwrap(), 1);
    }

    #[test]
    fn rejects_missing_and_escaping_paths() {
        let (_dir, updater, _) = setup();
        let err = updater.on_task_complete(&request("tasks/nope.md")).unwrap_err();
        assert_eq!(err.code(), "IDS_INVALID_FILE_PATH");
        let err = updater.on_task_complete(&request("../etc/passwd")).unwrap_err();
        assert_eq!(err.code(), "IDS_INVALID_FILE_PATH");
    }

    #[cfg(unix)]
    #[test]
    fn rejects_symlink_leaving_root() {
        let (dir, updater, _) = setup();
        let outside = TempDir::new().unwrap();
        std::fs::write(outside.path().join("notes.md"), "release notes").unwrap();
        std::os::unix::fs::symlink(outside.path().join("notes.md"), dir.path().join("tasks/notes.md"))
            .unwrap();
        let err = updater.on_task_complete(&request("tasks/notes.md")).unwrap_err();
        assert!(err.to_string().contains("escapes the repository root"));
    }

    #[test]
    fn id_from_path_is_kebab_case() {
        assert_eq!(id_from_path(Path::new("a/Validate Story.md")), "validate-story");
        assert_eq!(id_from_path(Path::new("create_story.yaml")), "create-story");
    }
}
