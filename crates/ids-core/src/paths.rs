use crate::error::{IdsError, Result};
use regex::Regex;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const IDS_DIR: &str = ".ids";
pub const CONFIG_FILE: &str = ".ids/config.yaml";
pub const REGISTRY_FILE: &str = ".ids/entity-registry.yaml";
pub const BACKUPS_DIR: &str = ".ids/registry-backups";
pub const HEALING_LOG_FILE: &str = ".ids/registry-healing.jsonl";

pub const BACKUP_PREFIX: &str = "registry-";
pub const BACKUP_SUFFIX: &str = ".yaml";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn ids_dir(root: &Path) -> PathBuf {
    root.join(IDS_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn backup_file(backup_dir: &Path, batch_id: &str) -> PathBuf {
    backup_dir.join(format!("{BACKUP_PREFIX}{batch_id}{BACKUP_SUFFIX}"))
}

/// Extract the batch id from a backup file name, if it is one.
pub fn batch_id_from_backup(file_name: &str) -> Option<&str> {
    file_name
        .strip_prefix(BACKUP_PREFIX)?
        .strip_suffix(BACKUP_SUFFIX)
        .filter(|id| !id.is_empty())
}

/// Resolve a path relative to `root`, rejecting absolute paths, any `..`
/// that would climb above the root, and existing paths whose symlinks lead
/// outside it. Returns `None` when the path escapes.
pub fn resolve_within(root: &Path, relative: &str) -> Option<PathBuf> {
    let rel = Path::new(relative);
    if relative.trim().is_empty() || rel.is_absolute() {
        return None;
    }
    let mut depth: usize = 0;
    for component in rel.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return None;
                }
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    let joined = root.join(rel);
    match joined.canonicalize() {
        Ok(real) => {
            let base = root.canonicalize().ok()?;
            real.starts_with(&base).then_some(joined)
        }
        // Nothing on disk to follow yet.
        Err(_) => Some(joined),
    }
}

// ---------------------------------------------------------------------------
// Batch id validation
// ---------------------------------------------------------------------------

static BATCH_RE: OnceLock<Regex> = OnceLock::new();

fn batch_re() -> &'static Regex {
    BATCH_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_\-]*$").unwrap())
}

/// Batch ids become file names; keep them to a safe alphabet.
pub fn validate_batch_id(batch_id: &str) -> Result<()> {
    if batch_id.len() > 128 || !batch_re().is_match(batch_id) {
        return Err(IdsError::BackupNotFound(batch_id.to_string()));
    }
    Ok(())
}
