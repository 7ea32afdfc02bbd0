//! Append-only healing audit log, one JSON object per line.

use crate::error::Result;
use crate::io;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealingAction {
    Heal,
    Skip,
    Rollback,
}

impl std::fmt::Display for HealingAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HealingAction::Heal => "heal",
            HealingAction::Skip => "skip",
            HealingAction::Rollback => "rollback",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for HealingAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "heal" => Ok(HealingAction::Heal),
            "skip" => Ok(HealingAction::Skip),
            "rollback" => Ok(HealingAction::Rollback),
            other => Err(format!("unknown healing action '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealingLogEntry {
    pub timestamp: DateTime<Utc>,
    pub batch_id: String,
    pub action: HealingAction,
    pub rule_id: String,
    pub entity_id: String,
    #[serde(default)]
    pub before: Value,
    #[serde(default)]
    pub after: Value,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub batch_id: Option<String>,
    pub entity_id: Option<String>,
    pub action: Option<HealingAction>,
    pub limit: Option<usize>,
}

impl LogFilter {
    fn admits(&self, e: &HealingLogEntry) -> bool {
        self.batch_id.as_deref().map_or(true, |b| e.batch_id == b)
            && self.entity_id.as_deref().map_or(true, |id| e.entity_id == id)
            && self.action.map_or(true, |a| e.action == a)
    }
}

#[derive(Debug, Clone)]
pub struct HealingLog {
    path: PathBuf,
}

impl HealingLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entries: &[HealingLogEntry]) -> Result<()> {
        for entry in entries {
            io::append_line(&self.path, &serde_json::to_string(entry)?)?;
        }
        Ok(())
    }

    /// Matching entries, most recent first. An absent log is empty; malformed
    /// lines are skipped.
    pub fn query(&self, filter: &LogFilter) -> Result<Vec<HealingLogEntry>> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut entries = Vec::new();
        for (lineno, line) in data.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<HealingLogEntry>(line) {
                Ok(entry) if filter.admits(&entry) => entries.push(entry),
                Ok(_) => {}
                Err(e) => tracing::warn!(
                    path = %self.path.display(),
                    line = lineno + 1,
                    error = %e,
                    "skipping malformed healing log line"
                ),
            }
        }
        entries.reverse();
        if let Some(limit) = filter.limit {
            entries.truncate(limit);
        }
        Ok(entries)
    }
}
