use crate::error::Result;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// RegistryPaths
// ---------------------------------------------------------------------------

/// File locations, relative to the repository root unless absolute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryPaths {
    #[serde(default = "default_registry_file")]
    pub registry: String,
    #[serde(default = "default_backup_dir")]
    pub backups: String,
    #[serde(default = "default_healing_log")]
    pub healing_log: String,
}

fn default_registry_file() -> String {
    paths::REGISTRY_FILE.to_string()
}

fn default_backup_dir() -> String {
    paths::BACKUPS_DIR.to_string()
}

fn default_healing_log() -> String {
    paths::HEALING_LOG_FILE.to_string()
}

impl Default for RegistryPaths {
    fn default() -> Self {
        Self {
            registry: default_registry_file(),
            backups: default_backup_dir(),
            healing_log: default_healing_log(),
        }
    }
}

// ---------------------------------------------------------------------------
// HealerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealerConfig {
    #[serde(default = "default_max_backups")]
    pub max_backups: usize,
    #[serde(default = "default_staleness_days")]
    pub staleness_days: i64,
}

fn default_max_backups() -> usize {
    10
}

fn default_staleness_days() -> i64 {
    7
}

impl Default for HealerConfig {
    fn default() -> Self {
        Self {
            max_backups: default_max_backups(),
            staleness_days: default_staleness_days(),
        }
    }
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_min_relevance")]
    pub min_relevance: f64,
    #[serde(default = "default_max_recommendations")]
    pub max_recommendations: usize,
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_min_relevance() -> f64 {
    0.4
}

fn default_max_recommendations() -> usize {
    20
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl(),
            min_relevance: default_min_relevance(),
            max_recommendations: default_max_recommendations(),
        }
    }
}

impl EngineConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

// ---------------------------------------------------------------------------
// GovernorConfig / BreakerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernorConfig {
    #[serde(default = "default_governor_timeout")]
    pub timeout_ms: u64,
}

fn default_governor_timeout() -> u64 {
    2000
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_governor_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
    #[serde(default = "default_reset_timeout")]
    pub reset_timeout_ms: u64,
    #[serde(default = "default_half_open_max_calls")]
    pub half_open_max_calls: u32,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_success_threshold() -> u32 {
    2
}

fn default_reset_timeout() -> u64 {
    60_000
}

fn default_half_open_max_calls() -> u32 {
    1
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            reset_timeout_ms: default_reset_timeout(),
            half_open_max_calls: default_half_open_max_calls(),
        }
    }
}

impl BreakerConfig {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// GateTimeouts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateTimeouts {
    #[serde(default = "default_epic_timeout")]
    pub epic_creation_ms: u64,
    #[serde(default = "default_story_timeout")]
    pub story_creation_ms: u64,
    #[serde(default = "default_validation_timeout")]
    pub story_validation_ms: u64,
    #[serde(default = "default_dev_context_timeout")]
    pub dev_context_ms: u64,
}

fn default_epic_timeout() -> u64 {
    5000
}

fn default_story_timeout() -> u64 {
    5000
}

fn default_validation_timeout() -> u64 {
    10_000
}

fn default_dev_context_timeout() -> u64 {
    2000
}

impl Default for GateTimeouts {
    fn default() -> Self {
        Self {
            epic_creation_ms: default_epic_timeout(),
            story_creation_ms: default_story_timeout(),
            story_validation_ms: default_validation_timeout(),
            dev_context_ms: default_dev_context_timeout(),
        }
    }
}

// ---------------------------------------------------------------------------
// IdsConfig (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IdsConfig {
    #[serde(default)]
    pub paths: RegistryPaths,
    #[serde(default)]
    pub healer: HealerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub governor: GovernorConfig,
    #[serde(default)]
    pub breaker: BreakerConfig,
    #[serde(default)]
    pub gates: GateTimeouts,
}

impl IdsConfig {
    /// Load `.ids/config.yaml`. Returns defaults if the file is absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: IdsConfig = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn registry_path(&self, root: &Path) -> PathBuf {
        root.join(&self.paths.registry)
    }

    pub fn backup_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.paths.backups)
    }

    pub fn healing_log_path(&self, root: &Path) -> PathBuf {
        root.join(&self.paths.healing_log)
    }

    pub fn governor_timeout(&self) -> Duration {
        Duration::from_millis(self.governor.timeout_ms)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if !(0.0..=1.0).contains(&self.engine.min_relevance) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "engine.min_relevance={} is outside 0.0..=1.0",
                    self.engine.min_relevance
                ),
            });
        }

        if self.engine.max_recommendations == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "engine.max_recommendations=0 disables all recommendations".to_string(),
            });
        }

        if self.healer.max_backups == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "healer.max_backups=0 deletes every backup after a batch; rollback will be impossible"
                    .to_string(),
            });
        }

        if self.governor.timeout_ms == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "governor.timeout_ms=0 makes every governed call fall back".to_string(),
            });
        }

        if self.breaker.failure_threshold == 0 || self.breaker.success_threshold == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "breaker thresholds must be at least 1".to_string(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
