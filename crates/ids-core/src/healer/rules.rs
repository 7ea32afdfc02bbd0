use crate::checksum;
use crate::error::{IdsError, Result};
use crate::keywords;
use crate::loader::RegistrySnapshot;
use crate::paths;
use crate::registry::Entity;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

pub const MISSING_FILE: &str = "missing-file";
pub const CHECKSUM_MISMATCH: &str = "checksum-mismatch";
pub const ORPHANED_USED_BY: &str = "orphaned-usedBy";
pub const ORPHANED_DEPENDENCY: &str = "orphaned-dependency";
pub const MISSING_KEYWORDS: &str = "missing-keywords";
pub const STALE_VERIFICATION: &str = "stale-verification";

/// Keywords repopulated from file content.
const HEALED_KEYWORD_COUNT: usize = 10;

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Declaration order is sort order: critical issues come first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Contexts
// ---------------------------------------------------------------------------

pub struct CheckContext<'a> {
    pub root: &'a Path,
    pub entity: &'a Entity,
    pub snapshot: &'a RegistrySnapshot,
    pub now: DateTime<Utc>,
    pub staleness_days: i64,
}

impl CheckContext<'_> {
    fn file(&self) -> Option<PathBuf> {
        paths::resolve_within(self.root, &self.entity.path)
    }
}

pub struct FixContext<'a> {
    pub root: &'a Path,
    pub snapshot: &'a RegistrySnapshot,
}

/// One defect a rule found. `reference` names the dangling id for orphan
/// rules.
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub details: String,
    pub reference: Option<String>,
}

impl Finding {
    fn new(details: impl Into<String>) -> Self {
        Self {
            details: details.into(),
            reference: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

pub type CheckFn = fn(&CheckContext) -> Vec<Finding>;
pub type FixFn = fn(&FixContext, &mut Entity) -> Result<()>;

/// A fn-pointer health rule. Rules with a fix are auto-healable; `field`
/// captures the value the fix touches for the audit log.
pub struct HealthRule {
    pub id: &'static str,
    pub severity: Severity,
    pub check: CheckFn,
    pub fix: Option<FixFn>,
    pub field: fn(&Entity) -> Value,
}

impl HealthRule {
    pub fn auto_healable(&self) -> bool {
        self.fix.is_some()
    }
}

macro_rules! rule {
    (
        id: $id:expr,
        severity: $sev:expr,
        check: $check:expr,
        field: $field:expr
        $(, fix: $fix:expr)?
    ) => {
        HealthRule {
            id: $id,
            severity: $sev,
            check: $check,
            field: $field,
            fix: {
                #[allow(unused_assignments, unused_mut)]
                let mut v: Option<FixFn> = None;
                $(v = Some($fix);)?
                v
            },
        }
    };
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

fn check_missing_file(ctx: &CheckContext) -> Vec<Finding> {
    match ctx.file() {
        None => vec![Finding::new(format!(
            "path '{}' is absolute or escapes the repository root",
            ctx.entity.path
        ))],
        Some(p) if !p.is_file() => vec![Finding::new(format!(
            "file not found: {}",
            ctx.entity.path
        ))],
        Some(_) => Vec::new(),
    }
}

fn check_checksum(ctx: &CheckContext) -> Vec<Finding> {
    let Some(path) = ctx.file() else {
        return Vec::new();
    };
    match checksum::digest_file(&path) {
        Ok(computed) if checksum::matches(&ctx.entity.checksum, &computed) => Vec::new(),
        Ok(computed) => {
            let stored = if ctx.entity.checksum.is_empty() {
                "<none>"
            } else {
                ctx.entity.checksum.as_str()
            };
            vec![Finding::new(format!("stored {stored}, computed {computed}"))]
        }
        Err(e) => vec![Finding::new(e.to_string())],
    }
}

fn orphans(ids: &[String], ctx: &CheckContext, what: &str) -> Vec<Finding> {
    ids.iter()
        .filter(|id| !ctx.snapshot.contains(id))
        .map(|id| Finding {
            details: format!("{what} references unknown entity '{id}'"),
            reference: Some(id.clone()),
        })
        .collect()
}

fn check_orphaned_used_by(ctx: &CheckContext) -> Vec<Finding> {
    orphans(&ctx.entity.used_by, ctx, "usedBy")
}

fn check_orphaned_dependency(ctx: &CheckContext) -> Vec<Finding> {
    orphans(&ctx.entity.dependencies, ctx, "dependencies")
}

fn check_missing_keywords(ctx: &CheckContext) -> Vec<Finding> {
    if ctx.entity.keywords.iter().all(|k| k.trim().is_empty()) {
        vec![Finding::new("entity has no keywords")]
    } else {
        Vec::new()
    }
}

fn check_stale(ctx: &CheckContext) -> Vec<Finding> {
    match ctx.entity.last_verified {
        None => vec![Finding::new("never verified")],
        Some(at) if ctx.now - at > Duration::days(ctx.staleness_days) => vec![Finding::new(format!(
            "last verified {} days ago (limit {})",
            (ctx.now - at).num_days(),
            ctx.staleness_days
        ))],
        Some(_) => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Fixes
// ---------------------------------------------------------------------------

fn entity_file(ctx: &FixContext, entity: &Entity) -> Result<PathBuf> {
    paths::resolve_within(ctx.root, &entity.path)
        .ok_or_else(|| IdsError::InvalidFilePath(entity.path.clone()))
}

fn fix_checksum(ctx: &FixContext, entity: &mut Entity) -> Result<()> {
    let path = entity_file(ctx, entity)?;
    entity.checksum = checksum::digest_file(&path)?;
    Ok(())
}

fn fix_used_by(ctx: &FixContext, entity: &mut Entity) -> Result<()> {
    entity.used_by.retain(|id| ctx.snapshot.contains(id));
    Ok(())
}

fn fix_dependencies(ctx: &FixContext, entity: &mut Entity) -> Result<()> {
    entity.dependencies.retain(|id| ctx.snapshot.contains(id));
    Ok(())
}

/// Most frequent words of the file; id and purpose when the file has none.
fn fix_keywords(ctx: &FixContext, entity: &mut Entity) -> Result<()> {
    let path = entity_file(ctx, entity)?;
    let content = std::fs::read_to_string(&path)?;
    let mut kw = keywords::top_by_frequency(&content, HEALED_KEYWORD_COUNT);
    if kw.is_empty() {
        kw = keywords::extract(&format!("{} {}", entity.id, entity.purpose));
    }
    entity.keywords = kw;
    Ok(())
}

/// `lastVerified` is refreshed for every healed entity by the caller.
fn fix_nothing(_ctx: &FixContext, _entity: &mut Entity) -> Result<()> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Field snapshots
// ---------------------------------------------------------------------------

fn path_field(e: &Entity) -> Value {
    json!(e.path)
}

fn checksum_field(e: &Entity) -> Value {
    json!(e.checksum)
}

fn used_by_field(e: &Entity) -> Value {
    json!(e.used_by)
}

fn dependencies_field(e: &Entity) -> Value {
    json!(e.dependencies)
}

fn keywords_field(e: &Entity) -> Value {
    json!(e.keywords)
}

fn last_verified_field(e: &Entity) -> Value {
    json!(e.last_verified)
}

// ---------------------------------------------------------------------------
// Default rules (evaluation order)
// ---------------------------------------------------------------------------

pub fn default_rules() -> Vec<HealthRule> {
    vec![
        // Everything else needs the file; a missing one short-circuits.
        rule! {
            id: MISSING_FILE,
            severity: Severity::Critical,
            check: check_missing_file,
            field: path_field
        },
        rule! {
            id: CHECKSUM_MISMATCH,
            severity: Severity::High,
            check: check_checksum,
            field: checksum_field,
            fix: fix_checksum
        },
        rule! {
            id: ORPHANED_USED_BY,
            severity: Severity::Medium,
            check: check_orphaned_used_by,
            field: used_by_field,
            fix: fix_used_by
        },
        rule! {
            id: ORPHANED_DEPENDENCY,
            severity: Severity::Medium,
            check: check_orphaned_dependency,
            field: dependencies_field,
            fix: fix_dependencies
        },
        rule! {
            id: MISSING_KEYWORDS,
            severity: Severity::Low,
            check: check_missing_keywords,
            field: keywords_field,
            fix: fix_keywords
        },
        rule! {
            id: STALE_VERIFICATION,
            severity: Severity::Low,
            check: check_stale,
            field: last_verified_field,
            fix: fix_nothing
        },
    ]
}

/// Fraction of rules that can heal themselves.
pub fn auto_healable_rate(rules: &[HealthRule]) -> f64 {
    if rules.is_empty() {
        return 0.0;
    }
    let auto = rules.iter().filter(|r| r.auto_healable()).count();
    crate::engine::scoring::round2(auto as f64 / rules.len() as f64)
}
