//! Registry loader: parses the registry file once and serves a flat index.
//!
//! Each loader owns its snapshot; there is no process-wide cache. `reload()`
//! discards the snapshot after a write so readers never see stale entities.

use crate::config::IdsConfig;
use crate::error::{IdsError, Result};
use crate::io;
use crate::registry::{Entity, Registry};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct IndexedEntity {
    pub category: String,
    pub entity: Entity,
}

/// Parsed registry plus a flat id → entity index.
#[derive(Debug)]
pub struct RegistrySnapshot {
    registry: Registry,
    index: BTreeMap<String, IndexedEntity>,
}

impl RegistrySnapshot {
    pub fn build(registry: Registry) -> Result<Self> {
        let mut index: BTreeMap<String, IndexedEntity> = BTreeMap::new();
        for (category, entity) in registry.iter_entities() {
            if let Some(existing) = index.get(&entity.id) {
                return Err(IdsError::DuplicateEntity {
                    id: entity.id.clone(),
                    first: existing.category.clone(),
                    second: category.to_string(),
                });
            }
            index.insert(
                entity.id.clone(),
                IndexedEntity {
                    category: category.to_string(),
                    entity: entity.clone(),
                },
            );
        }
        Ok(Self { registry, index })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn find_by_id(&self, id: &str) -> Option<&IndexedEntity> {
        self.index.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn entity_count(&self) -> usize {
        self.index.len()
    }

    /// Entities in id order.
    pub fn entities(&self) -> impl Iterator<Item = &IndexedEntity> {
        self.index.values()
    }

    pub fn entities_by_category(&self) -> BTreeMap<&str, Vec<&IndexedEntity>> {
        let mut out: BTreeMap<&str, Vec<&IndexedEntity>> = BTreeMap::new();
        for ie in self.index.values() {
            out.entry(ie.category.as_str()).or_default().push(ie);
        }
        out
    }

    pub fn counts_by_category(&self) -> BTreeMap<String, usize> {
        let mut counts: BTreeMap<String, usize> = self
            .registry
            .entities
            .keys()
            .map(|c| (c.clone(), 0))
            .collect();
        for ie in self.index.values() {
            *counts.entry(ie.category.clone()).or_insert(0) += 1;
        }
        counts
    }

    pub fn counts_by_type(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for ie in self.index.values() {
            let t = if ie.entity.entity_type.is_empty() {
                "unknown".to_string()
            } else {
                ie.entity.entity_type.clone()
            };
            *counts.entry(t).or_insert(0) += 1;
        }
        counts
    }
}

// ---------------------------------------------------------------------------
// RegistryLoader
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct RegistryLoader {
    root: PathBuf,
    path: PathBuf,
    snapshot: RwLock<Option<Arc<RegistrySnapshot>>>,
}

impl RegistryLoader {
    /// `path` is the registry file; entity paths resolve against `root`.
    pub fn new(root: impl Into<PathBuf>, path: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            path: path.into(),
            snapshot: RwLock::new(None),
        }
    }

    pub fn from_config(root: &Path, config: &IdsConfig) -> Self {
        Self::new(root, config.registry_path(root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return the cached snapshot, parsing the file on first use.
    pub fn load(&self) -> Result<Arc<RegistrySnapshot>> {
        {
            let guard = self.snapshot.read().unwrap_or_else(|e| e.into_inner());
            if let Some(snap) = guard.as_ref() {
                return Ok(Arc::clone(snap));
            }
        }
        self.reload()
    }

    /// Discard the cached snapshot and parse the file again.
    pub fn reload(&self) -> Result<Arc<RegistrySnapshot>> {
        let registry = self.read_registry()?;
        let snap = Arc::new(RegistrySnapshot::build(registry)?);
        tracing::debug!(
            path = %self.path.display(),
            entities = snap.entity_count(),
            "registry loaded"
        );
        let mut guard = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(Arc::clone(&snap));
        Ok(snap)
    }

    /// Drop the cached snapshot without reading the file.
    pub fn invalidate(&self) {
        let mut guard = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }

    pub fn find_by_id(&self, id: &str) -> Result<Option<IndexedEntity>> {
        Ok(self.load()?.find_by_id(id).cloned())
    }

    pub fn entity_count(&self) -> Result<usize> {
        Ok(self.load()?.entity_count())
    }

    pub fn all_entities(&self) -> Result<Vec<IndexedEntity>> {
        Ok(self.load()?.entities().cloned().collect())
    }

    /// Parse the file into an owned document, bypassing the cache. Used by
    /// writers that mutate and persist.
    pub fn read_registry(&self) -> Result<Registry> {
        let data = self.read_raw()?;
        let text = String::from_utf8(data)
            .map_err(|e| IdsError::RegistryCorrupt(format!("registry is not UTF-8: {e}")))?;
        Registry::from_yaml(&text)
    }

    /// The registry file's exact bytes.
    pub fn read_raw(&self) -> Result<Vec<u8>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(IdsError::RegistryNotFound(self.path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Persist a whole document atomically and refresh the snapshot.
    pub fn write(&self, registry: &mut Registry) -> Result<Arc<RegistrySnapshot>> {
        // Validate ids before touching disk.
        RegistrySnapshot::build(registry.clone())?;
        registry.touch(Utc::now());
        let data = registry.to_yaml()?;
        io::atomic_write(&self.path, data.as_bytes())?;
        self.reload()
    }

    /// Overwrite the registry file with raw bytes (rollback path).
    pub fn write_raw(&self, bytes: &[u8]) -> Result<()> {
        io::atomic_write(&self.path, bytes)?;
        self.invalidate();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn loader_with(dir: &TempDir, yaml: &str) -> RegistryLoader {
        let path = dir.path().join(".ids/entity-registry.yaml");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, yaml).unwrap();
        RegistryLoader::new(dir.path(), path)
    }

    const TWO: &str = r#"
metadata:
  version: "1.0.0"
entities:
  tasks:
    create-story:
      path: tasks/create-story.md
      type: task
  agents:
    dev:
      path: agents/dev.md
      type: agent
"#;

    #[test]
    fn load_builds_flat_index_with_categories() {
        let dir = TempDir::new().unwrap();
        let loader = loader_with(&dir, TWO);
        assert_eq!(loader.entity_count().unwrap(), 2);
        let dev = loader.find_by_id("dev").unwrap().unwrap();
        assert_eq!(dev.category, "agents");
        let by_cat = loader.load().unwrap();
        let by_cat = by_cat.entities_by_category();
        assert_eq!(by_cat["tasks"][0].entity.id, "create-story");
        assert_eq!(loader.all_entities().unwrap().len(), 2);
        assert!(loader.find_by_id("nope").unwrap().is_none());
    }

    #[test]
    fn load_is_cached_until_reload() {
        let dir = TempDir::new().unwrap();
        let loader = loader_with(&dir, TWO);
        let first = loader.load().unwrap();
        std::fs::write(loader.path(), "metadata: {}\nentities: {}\n").unwrap();
        let second = loader.load().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loader.reload().unwrap().entity_count(), 0);
    }

    #[test]
    fn empty_and_category_only_registries_load() {
        let dir = TempDir::new().unwrap();
        let loader = loader_with(&dir, "metadata:\n  version: '1'\nentities:\n");
        assert_eq!(loader.entity_count().unwrap(), 0);

        let loader = loader_with(&dir, "categories:\n  tasks: {}\nentities:\n  tasks:\n");
        let snap = loader.load().unwrap();
        assert_eq!(snap.entity_count(), 0);
        assert_eq!(snap.counts_by_category().get("tasks"), Some(&0));
    }

    #[test]
    fn missing_file_is_load_error() {
        let dir = TempDir::new().unwrap();
        let loader = RegistryLoader::new(dir.path(), dir.path().join("missing.yaml"));
        let err = loader.load().unwrap_err();
        assert_eq!(err.code(), "IDS_REGISTRY_NOT_FOUND");
    }

    #[test]
    fn malformed_yaml_is_load_error() {
        let dir = TempDir::new().unwrap();
        let loader = loader_with(&dir, "entities: [unclosed");
        assert_eq!(loader.load().unwrap_err().code(), "IDS_REGISTRY_CORRUPT");
    }

    #[test]
    fn duplicate_ids_across_categories_rejected() {
        let dir = TempDir::new().unwrap();
        let yaml = r#"
entities:
  tasks:
    shared:
      path: tasks/shared.md
  scripts:
    shared:
      path: scripts/shared.sh
"#;
        let loader = loader_with(&dir, yaml);
        let err = loader.load().unwrap_err();
        assert_eq!(err.code(), "IDS_DUPLICATE_ENTITY");
    }

    #[test]
    fn write_persists_and_refreshes() {
        let dir = TempDir::new().unwrap();
        let loader = loader_with(&dir, TWO);
        let mut reg = loader.read_registry().unwrap();
        reg.upsert_entity("scripts", Entity::new("build", "scripts/build.sh", "script"));
        let snap = loader.write(&mut reg).unwrap();
        assert_eq!(snap.entity_count(), 3);
        assert_eq!(snap.registry().metadata.entity_count, 3);
        assert_eq!(snap.counts_by_type().get("script"), Some(&1));
    }
}
