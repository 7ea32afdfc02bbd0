//! Registry healer: detects integrity defects and repairs the ones that are
//! safe to repair without a human.
//!
//! A healing batch is one logical unit: back up the registry bytes, apply
//! every fix to an owned copy, write the copy atomically, then append the
//! audit trail. Callers serialize concurrent `heal()` calls.

pub mod backup;
pub mod log;
pub mod rules;

use crate::checksum;
use crate::config::{HealerConfig, IdsConfig};
use crate::error::{IdsError, Result};
use crate::loader::{RegistryLoader, RegistrySnapshot};
use crate::registry::{Entity, Registry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

pub use backup::{BackupInfo, BackupStore};
pub use log::{HealingAction, HealingLog, HealingLogEntry, LogFilter};
pub use rules::{HealthRule, Severity};

pub const MANUAL_REASON: &str = "requires manual intervention";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub rule_id: String,
    pub severity: Severity,
    pub auto_healable: bool,
    pub entity_id: String,
    pub details: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSummary {
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub auto_healable: usize,
    pub auto_healable_rate: f64,
    /// No critical or high issues.
    pub healthy: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub checked_at: DateTime<Utc>,
    pub entities_checked: usize,
    pub issues: Vec<Issue>,
    pub summary: HealthSummary,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealOptions {
    /// Skip issues that are not auto-healable.
    pub auto_only: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealedIssue {
    pub rule_id: String,
    pub entity_id: String,
    pub before: Value,
    pub after: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnhealedIssue {
    pub rule_id: String,
    pub entity_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealResult {
    pub batch_id: String,
    pub dry_run: bool,
    pub healed: Vec<HealedIssue>,
    pub skipped: Vec<UnhealedIssue>,
    pub failed: Vec<UnhealedIssue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualWarning {
    pub entity_id: String,
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackResult {
    pub batch_id: String,
    pub backup_path: PathBuf,
    pub restored_bytes: usize,
}

/// `heal-<utc timestamp>-<8 hex>`; sorts chronologically.
pub fn new_batch_id(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("heal-{}-{}", now.format("%Y%m%dT%H%M%S%3fZ"), &suffix[..8])
}

// ---------------------------------------------------------------------------
// RegistryHealer
// ---------------------------------------------------------------------------

pub struct RegistryHealer {
    loader: Arc<RegistryLoader>,
    rules: Vec<HealthRule>,
    backups: BackupStore,
    log: HealingLog,
    staleness_days: i64,
}

impl RegistryHealer {
    pub fn new(
        loader: Arc<RegistryLoader>,
        backups: BackupStore,
        log: HealingLog,
        cfg: &HealerConfig,
    ) -> Self {
        Self {
            loader,
            rules: rules::default_rules(),
            backups,
            log,
            staleness_days: cfg.staleness_days,
        }
    }

    pub fn from_config(loader: Arc<RegistryLoader>, root: &Path, config: &IdsConfig) -> Self {
        Self::new(
            loader,
            BackupStore::new(config.backup_dir(root), config.healer.max_backups),
            HealingLog::new(config.healing_log_path(root)),
            &config.healer,
        )
    }

    pub fn loader(&self) -> &Arc<RegistryLoader> {
        &self.loader
    }

    fn rule(&self, id: &str) -> Option<&HealthRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    // -----------------------------------------------------------------------
    // Detection
    // -----------------------------------------------------------------------

    pub fn run_health_check(&self) -> Result<HealthReport> {
        let snapshot = self.loader.load()?;
        let now = Utc::now();
        let mut issues = Vec::new();
        for ie in snapshot.entities() {
            let ctx = rules::CheckContext {
                root: self.loader.root(),
                entity: &ie.entity,
                snapshot: &snapshot,
                now,
                staleness_days: self.staleness_days,
            };
            for rule in &self.rules {
                let findings = (rule.check)(&ctx);
                let blocking = rule.severity == Severity::Critical && !findings.is_empty();
                issues.extend(findings.into_iter().map(|f| Issue {
                    rule_id: rule.id.to_string(),
                    severity: rule.severity,
                    auto_healable: rule.auto_healable(),
                    entity_id: ie.entity.id.clone(),
                    details: f.details,
                    category: ie.category.clone(),
                    reference: f.reference,
                }));
                if blocking {
                    break;
                }
            }
        }
        issues.sort_by_key(|i| i.severity);

        let count = |s: Severity| issues.iter().filter(|i| i.severity == s).count();
        let summary = HealthSummary {
            total: issues.len(),
            critical: count(Severity::Critical),
            high: count(Severity::High),
            medium: count(Severity::Medium),
            low: count(Severity::Low),
            auto_healable: issues.iter().filter(|i| i.auto_healable).count(),
            auto_healable_rate: rules::auto_healable_rate(&self.rules),
            healthy: count(Severity::Critical) == 0 && count(Severity::High) == 0,
        };
        Ok(HealthReport {
            checked_at: now,
            entities_checked: snapshot.entity_count(),
            issues,
            summary,
        })
    }

    // -----------------------------------------------------------------------
    // Healing
    // -----------------------------------------------------------------------

    pub fn heal(&self, issues: &[Issue], opts: HealOptions) -> Result<HealResult> {
        let now = Utc::now();
        let batch_id = new_batch_id(now);

        // Backup, fixes, and write all derive from the same bytes.
        let raw = self.loader.read_raw()?;
        let text = String::from_utf8(raw.clone())
            .map_err(|e| IdsError::RegistryCorrupt(format!("registry is not UTF-8: {e}")))?;
        let mut registry = Registry::from_yaml(&text)?;
        let snapshot = RegistrySnapshot::build(registry.clone())?;
        let fix_ctx = rules::FixContext {
            root: self.loader.root(),
            snapshot: &snapshot,
        };

        let mut working: BTreeMap<String, Entity> = BTreeMap::new();
        let mut result = HealResult {
            batch_id: batch_id.clone(),
            dry_run: opts.dry_run,
            healed: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
            backup_path: None,
        };
        let mut log_entries = Vec::new();

        for issue in issues {
            let fix = self.rule(&issue.rule_id).and_then(|r| r.fix.map(|f| (r, f)));
            let eligible = issue.auto_healable || !opts.auto_only;
            let Some((rule, fix)) = fix.filter(|_| eligible) else {
                result.skipped.push(unhealed(issue, MANUAL_REASON));
                log_entries.push(log_entry(
                    &batch_id,
                    now,
                    HealingAction::Skip,
                    issue,
                    Value::Null,
                    Value::Null,
                    false,
                    Some(MANUAL_REASON),
                ));
                continue;
            };

            let current = match working.get(&issue.entity_id) {
                Some(e) => e.clone(),
                None => match snapshot.find_by_id(&issue.entity_id) {
                    Some(ie) => ie.entity.clone(),
                    None => {
                        let reason = IdsError::EntityNotFound(issue.entity_id.clone()).to_string();
                        log_entries.push(log_entry(
                            &batch_id,
                            now,
                            HealingAction::Heal,
                            issue,
                            Value::Null,
                            Value::Null,
                            false,
                            Some(&reason),
                        ));
                        result.failed.push(unhealed(issue, &reason));
                        continue;
                    }
                },
            };

            let before = (rule.field)(&current);
            let mut updated = current;
            match fix(&fix_ctx, &mut updated) {
                Ok(()) => {
                    updated.last_verified = Some(now);
                    let after = (rule.field)(&updated);
                    log_entries.push(log_entry(
                        &batch_id,
                        now,
                        HealingAction::Heal,
                        issue,
                        before.clone(),
                        after.clone(),
                        true,
                        None,
                    ));
                    result.healed.push(HealedIssue {
                        rule_id: issue.rule_id.clone(),
                        entity_id: issue.entity_id.clone(),
                        before,
                        after,
                    });
                    working.insert(issue.entity_id.clone(), updated);
                }
                Err(e) => {
                    tracing::warn!(
                        entity = %issue.entity_id,
                        rule = %issue.rule_id,
                        error = %e,
                        "heal failed"
                    );
                    let reason = e.to_string();
                    log_entries.push(log_entry(
                        &batch_id,
                        now,
                        HealingAction::Heal,
                        issue,
                        before,
                        Value::Null,
                        false,
                        Some(&reason),
                    ));
                    result.failed.push(unhealed(issue, &reason));
                }
            }
        }

        if opts.dry_run {
            return Ok(result);
        }

        if !working.is_empty() {
            result.backup_path = Some(self.backups.create(&batch_id, &raw)?);
            for entity in working.into_values() {
                registry.replace_entity(entity);
            }
            self.loader.write(&mut registry)?;
        }
        self.log.append(&log_entries)?;
        self.backups.prune()?;

        tracing::info!(
            batch = %batch_id,
            healed = result.healed.len(),
            skipped = result.skipped.len(),
            failed = result.failed.len(),
            "healing batch complete"
        );
        Ok(result)
    }

    /// Remediation advice for issues a human has to resolve. Each warning
    /// is also logged.
    pub fn emit_warnings(&self, issues: &[Issue]) -> Vec<ManualWarning> {
        let snapshot = self.loader.load().ok();
        issues
            .iter()
            .filter(|i| !i.auto_healable)
            .map(|issue| {
                let path = snapshot
                    .as_ref()
                    .and_then(|s| s.find_by_id(&issue.entity_id))
                    .map(|ie| ie.entity.path.clone());
                let warning = manual_warning(issue, path.as_deref());
                tracing::warn!(
                    entity = %warning.entity_id,
                    rule = %warning.rule_id,
                    severity = %warning.severity,
                    "{}",
                    warning.message
                );
                warning
            })
            .collect()
    }

    /// Restore the registry file byte-for-byte from a batch backup.
    pub fn rollback(&self, batch_id: &str) -> Result<RollbackResult> {
        let backup_path = self.backups.locate(batch_id)?;
        let bytes = std::fs::read(&backup_path)?;
        let before = self
            .loader
            .read_raw()
            .map(|b| Value::String(checksum::digest_bytes(&b)))
            .unwrap_or(Value::Null);

        self.loader.write_raw(&bytes)?;
        self.loader.reload()?;

        self.log.append(&[HealingLogEntry {
            timestamp: Utc::now(),
            batch_id: batch_id.to_string(),
            action: HealingAction::Rollback,
            rule_id: "rollback".to_string(),
            entity_id: "*".to_string(),
            before,
            after: Value::String(checksum::digest_bytes(&bytes)),
            success: true,
            reason: None,
        }])?;
        tracing::info!(batch = %batch_id, "registry rolled back");

        Ok(RollbackResult {
            batch_id: batch_id.to_string(),
            backup_path,
            restored_bytes: bytes.len(),
        })
    }

    pub fn query_healing_log(&self, filter: &LogFilter) -> Result<Vec<HealingLogEntry>> {
        self.log.query(filter)
    }

    pub fn list_backups(&self) -> Result<Vec<BackupInfo>> {
        self.backups.list()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn unhealed(issue: &Issue, reason: &str) -> UnhealedIssue {
    UnhealedIssue {
        rule_id: issue.rule_id.clone(),
        entity_id: issue.entity_id.clone(),
        reason: reason.to_string(),
    }
}

#[allow(clippy::too_many_arguments)]
fn log_entry(
    batch_id: &str,
    now: DateTime<Utc>,
    action: HealingAction,
    issue: &Issue,
    before: Value,
    after: Value,
    success: bool,
    reason: Option<&str>,
) -> HealingLogEntry {
    HealingLogEntry {
        timestamp: now,
        batch_id: batch_id.to_string(),
        action,
        rule_id: issue.rule_id.clone(),
        entity_id: issue.entity_id.clone(),
        before,
        after,
        success,
        reason: reason.map(str::to_string),
    }
}

fn manual_warning(issue: &Issue, path: Option<&str>) -> ManualWarning {
    let id = &issue.entity_id;
    let (message, suggestions) = match issue.rule_id.as_str() {
        rules::MISSING_FILE => {
            let path = path.unwrap_or("<path>");
            (
                format!("'{id}' points at a file that does not exist: {}", issue.details),
                vec![
                    format!("Recover it from history: git log --all --full-history -- {path}"),
                    format!("If the file moved, update the path of '{id}' in the registry"),
                    format!("If it was removed on purpose, delete '{id}' from the registry"),
                ],
            )
        }
        _ => (
            format!("'{id}' needs attention ({}): {}", issue.rule_id, issue.details),
            vec![format!("Inspect '{id}' and run 'ids heal --all' once resolved")],
        ),
    };
    ManualWarning {
        entity_id: id.clone(),
        rule_id: issue.rule_id.clone(),
        severity: issue.severity,
        message,
        suggestions,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        healer: RegistryHealer,
    }

    impl Fixture {
        fn root(&self) -> &Path {
            self.dir.path()
        }

        fn registry_bytes(&self) -> Vec<u8> {
            std::fs::read(self.healer.loader().path()).unwrap()
        }
    }

    /// Two tasks with files on disk, fresh and checksummed, plus whatever
    /// `tweak` changes.
    fn fixture(tweak: impl FnOnce(&Path, &mut Registry)) -> Fixture {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("tasks")).unwrap();
        let mut reg = Registry::default();
        for id in ["create-story", "validate-story"] {
            let rel = format!("tasks/{id}.md");
            std::fs::write(root.join(&rel), format!("# {id}\nStory workflow step.\n")).unwrap();
            let mut e = Entity::new(id, &rel, "task");
            e.keywords = vec!["story".into()];
            e.checksum = checksum::digest_file(&root.join(&rel)).unwrap();
            e.last_verified = Some(Utc::now());
            reg.upsert_entity("tasks", e);
        }
        tweak(root, &mut reg);

        let config = IdsConfig::default();
        let loader = Arc::new(RegistryLoader::from_config(root, &config));
        let text = reg.to_yaml().unwrap();
        crate::io::atomic_write(loader.path(), text.as_bytes()).unwrap();
        let healer = RegistryHealer::from_config(loader, root, &config);
        Fixture { dir, healer }
    }

    fn entity_mut<'a>(reg: &'a mut Registry, id: &str) -> &'a mut Entity {
        reg.entities
            .values_mut()
            .flat_map(|m| m.values_mut())
            .find(|e| e.id == id)
            .unwrap()
    }

    #[test]
    fn clean_registry_is_healthy() {
        let fx = fixture(|_, _| {});
        let report = fx.healer.run_health_check().unwrap();
        assert!(report.issues.is_empty(), "{:?}", report.issues);
        assert!(report.summary.healthy);
        assert_eq!(report.entities_checked, 2);
        assert!(report.summary.auto_healable_rate >= 0.8);
    }

    #[test]
    fn deleted_file_reports_only_missing_file() {
        let fx = fixture(|root, reg| {
            std::fs::remove_file(root.join("tasks/create-story.md")).unwrap();
            let e = entity_mut(reg, "create-story");
            e.keywords.clear();
            e.used_by = vec!["ghost".into()];
        });
        let report = fx.healer.run_health_check().unwrap();
        let for_entity: Vec<_> = report
            .issues
            .iter()
            .filter(|i| i.entity_id == "create-story")
            .collect();
        assert_eq!(for_entity.len(), 1);
        assert_eq!(for_entity[0].rule_id, rules::MISSING_FILE);
        assert_eq!(for_entity[0].severity, Severity::Critical);
        assert!(!for_entity[0].auto_healable);
        assert!(!report.summary.healthy);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_out_of_root_is_a_missing_file() {
        let outside = TempDir::new().unwrap();
        let secret = outside.path().join("secret.txt");
        std::fs::write(&secret, "not part of this repository").unwrap();
        let fx = fixture(|root, reg| {
            std::os::unix::fs::symlink(&secret, root.join("tasks/link.md")).unwrap();
            entity_mut(reg, "create-story").path = "tasks/link.md".into();
        });
        let report = fx.healer.run_health_check().unwrap();
        let found: Vec<_> = report
            .issues
            .iter()
            .filter(|i| i.entity_id == "create-story")
            .map(|i| i.rule_id.as_str())
            .collect();
        assert_eq!(found, vec![rules::MISSING_FILE]);
    }

    #[test]
    fn issues_sorted_by_severity() {
        let fx = fixture(|_, reg| {
            let e = entity_mut(reg, "validate-story");
            e.keywords.clear();
            e.used_by = vec!["ghost".into()];
            e.checksum = "sha256:00".into();
        });
        let report = fx.healer.run_health_check().unwrap();
        let severities: Vec<_> = report.issues.iter().map(|i| i.severity).collect();
        assert_eq!(severities, vec![Severity::High, Severity::Medium, Severity::Low]);
        assert_eq!(report.issues[1].reference.as_deref(), Some("ghost"));
    }

    #[test]
    fn checksum_heal_end_to_end() {
        let fx = fixture(|_, reg| {
            entity_mut(reg, "validate-story").checksum = "sha256:stale".into();
        });
        let report = fx.healer.run_health_check().unwrap();
        let result = fx
            .healer
            .heal(&report.issues, HealOptions { auto_only: true, dry_run: false })
            .unwrap();
        assert_eq!(result.healed.len(), 1);
        assert!(result.backup_path.as_ref().unwrap().is_file());

        let after = fx.healer.run_health_check().unwrap();
        assert!(after.issues.is_empty(), "{:?}", after.issues);

        let entries = fx
            .healer
            .query_healing_log(&LogFilter {
                batch_id: Some(result.batch_id.clone()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].success);
        assert_eq!(entries[0].rule_id, rules::CHECKSUM_MISMATCH);
        assert_eq!(entries[0].before, Value::String("sha256:stale".into()));
    }

    #[test]
    fn heal_preserves_unknown_keys_and_updates_metadata() {
        let fx = fixture(|_, reg| {
            let e = entity_mut(reg, "validate-story");
            e.used_by = vec!["ghost".into(), "create-story".into()];
            e.extra
                .insert("owner".into(), serde_yaml::Value::String("qa".into()));
        });
        let report = fx.healer.run_health_check().unwrap();
        fx.healer.heal(&report.issues, HealOptions::default()).unwrap();

        let reg = fx.healer.loader().read_registry().unwrap();
        let e = reg.find("validate-story").unwrap();
        assert_eq!(e.used_by, vec!["create-story"]);
        assert_eq!(e.extra["owner"], serde_yaml::Value::String("qa".into()));
        assert_eq!(reg.metadata.entity_count, 2);
        assert!(reg.metadata.last_updated.is_some());
    }

    #[test]
    fn dry_run_writes_nothing() {
        let fx = fixture(|_, reg| {
            entity_mut(reg, "validate-story").checksum = "sha256:stale".into();
        });
        let before = fx.registry_bytes();
        let report = fx.healer.run_health_check().unwrap();
        let result = fx
            .healer
            .heal(&report.issues, HealOptions { auto_only: true, dry_run: true })
            .unwrap();
        assert!(result.dry_run);
        assert_eq!(result.healed.len(), 1);
        assert!(result.backup_path.is_none());
        assert_eq!(fx.registry_bytes(), before);
        assert!(fx.healer.list_backups().unwrap().is_empty());
        assert!(fx.healer.query_healing_log(&LogFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn manual_issues_skipped_and_logged() {
        let fx = fixture(|root, _| {
            std::fs::remove_file(root.join("tasks/create-story.md")).unwrap();
        });
        let report = fx.healer.run_health_check().unwrap();
        let result = fx
            .healer
            .heal(&report.issues, HealOptions { auto_only: true, dry_run: false })
            .unwrap();
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].reason, MANUAL_REASON);
        assert!(result.backup_path.is_none());
        let skips = fx
            .healer
            .query_healing_log(&LogFilter {
                action: Some(HealingAction::Skip),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(skips.len(), 1);
    }

    #[test]
    fn per_issue_failure_does_not_abort_batch() {
        let fx = fixture(|_, reg| {
            entity_mut(reg, "validate-story").checksum = "sha256:stale".into();
            entity_mut(reg, "create-story").checksum = "sha256:stale".into();
        });
        let report = fx.healer.run_health_check().unwrap();
        // File disappears between detection and healing.
        std::fs::remove_file(fx.root().join("tasks/create-story.md")).unwrap();
        let result = fx.healer.heal(&report.issues, HealOptions::default()).unwrap();
        assert_eq!(result.healed.len(), 1);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].entity_id, "create-story");
    }

    #[test]
    fn emit_warnings_suggests_git_recovery() {
        let fx = fixture(|root, _| {
            std::fs::remove_file(root.join("tasks/create-story.md")).unwrap();
        });
        let report = fx.healer.run_health_check().unwrap();
        let warnings = fx.healer.emit_warnings(&report.issues);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0]
            .suggestions
            .iter()
            .any(|s| s.contains("git log --all --full-history -- tasks/create-story.md")));
    }

    #[test]
    fn rollback_restores_exact_bytes() {
        let fx = fixture(|_, reg| {
            entity_mut(reg, "validate-story").checksum = "sha256:stale".into();
        });
        let original = fx.registry_bytes();
        let report = fx.healer.run_health_check().unwrap();
        let result = fx.healer.heal(&report.issues, HealOptions::default()).unwrap();
        assert_ne!(fx.registry_bytes(), original);

        fx.healer.rollback(&result.batch_id).unwrap();
        assert_eq!(fx.registry_bytes(), original);
        let snap = fx.healer.loader().load().unwrap();
        assert_eq!(
            snap.find_by_id("validate-story").unwrap().entity.checksum,
            "sha256:stale"
        );
        let rollbacks = fx
            .healer
            .query_healing_log(&LogFilter {
                action: Some(HealingAction::Rollback),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(rollbacks.len(), 1);
    }

    #[test]
    fn rollback_unknown_batch_fails() {
        let fx = fixture(|_, _| {});
        let err = fx.healer.rollback("heal-does-not-exist").unwrap_err();
        assert_eq!(err.code(), "IDS_BACKUP_NOT_FOUND");
    }

    #[test]
    fn batch_ids_are_file_safe() {
        let id = new_batch_id(Utc::now());
        assert!(id.starts_with("heal-"));
        crate::paths::validate_batch_id(&id).unwrap();
    }
}
