use crate::cmd::{block_on, services};
use crate::output::{print_json, print_table};
use anyhow::Context;
use ids_core::governor::format::format_health;
use ids_core::healer::log::{HealingAction, LogFilter};
use ids_core::healer::HealOptions;
use std::path::Path;

// ---------------------------------------------------------------------------
// health
// ---------------------------------------------------------------------------

pub fn health(root: &Path, json: bool) -> anyhow::Result<()> {
    let svc = services(root)?;
    let advisory = block_on(svc.governor.health_check())?;
    if json {
        print_json(&advisory)?;
    } else {
        print!("{}", format_health(&advisory));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// heal
// ---------------------------------------------------------------------------

pub fn heal(root: &Path, all: bool, dry_run: bool, json: bool) -> anyhow::Result<()> {
    let svc = services(root)?;
    let report = svc
        .healer
        .run_health_check()
        .context("health check failed")?;
    let opts = HealOptions {
        auto_only: !all,
        dry_run,
    };
    let result = svc
        .healer
        .heal(&report.issues, opts)
        .context("healing batch failed")?;

    if json {
        return print_json(&result);
    }

    let verb = if dry_run { "Would heal" } else { "Healed" };
    println!(
        "{verb} {} issue(s) in batch {} ({} skipped, {} failed)",
        result.healed.len(),
        result.batch_id,
        result.skipped.len(),
        result.failed.len()
    );
    if !result.healed.is_empty() {
        let rows = result
            .healed
            .iter()
            .map(|h| vec![h.entity_id.clone(), h.rule_id.clone()])
            .collect();
        print_table(&["ENTITY", "RULE"], rows);
    }
    for f in &result.failed {
        println!("failed: {} {} ({})", f.entity_id, f.rule_id, f.reason);
    }
    if let Some(path) = &result.backup_path {
        println!("Backup: {}", path.display());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// rollback
// ---------------------------------------------------------------------------

pub fn rollback(root: &Path, batch_id: &str, json: bool) -> anyhow::Result<()> {
    let svc = services(root)?;
    let result = svc
        .healer
        .rollback(batch_id)
        .with_context(|| format!("rollback of batch '{batch_id}' failed"))?;
    if json {
        print_json(&result)?;
    } else {
        println!(
            "Restored registry from {} ({} bytes)",
            result.backup_path.display(),
            result.restored_bytes
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// log
// ---------------------------------------------------------------------------

pub fn log(
    root: &Path,
    batch: Option<String>,
    entity: Option<String>,
    action: Option<String>,
    limit: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    let action = action
        .map(|a| a.parse::<HealingAction>())
        .transpose()
        .map_err(anyhow::Error::msg)?;
    let filter = LogFilter {
        batch_id: batch,
        entity_id: entity,
        action,
        limit,
    };
    let svc = services(root)?;
    let entries = svc.healer.query_healing_log(&filter)?;
    if json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        println!("No healing log entries.");
        return Ok(());
    }
    let rows = entries
        .iter()
        .map(|e| {
            vec![
                e.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                e.batch_id.clone(),
                e.action.to_string(),
                e.rule_id.clone(),
                e.entity_id.clone(),
                if e.success { "ok" } else { "failed" }.to_string(),
            ]
        })
        .collect();
    print_table(&["TIME", "BATCH", "ACTION", "RULE", "ENTITY", "RESULT"], rows);
    Ok(())
}

// ---------------------------------------------------------------------------
// backups
// ---------------------------------------------------------------------------

pub fn backups(root: &Path, json: bool) -> anyhow::Result<()> {
    let svc = services(root)?;
    let backups = svc.healer.list_backups()?;
    if json {
        return print_json(&backups);
    }
    if backups.is_empty() {
        println!("No backups.");
        return Ok(());
    }
    let rows = backups
        .iter()
        .map(|b| vec![b.batch_id.clone(), b.size_bytes.to_string(), b.path.display().to_string()])
        .collect();
    print_table(&["BATCH", "BYTES", "PATH"], rows);
    Ok(())
}
