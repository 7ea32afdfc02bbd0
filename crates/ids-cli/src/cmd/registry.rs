use crate::cmd::{block_on, services};
use crate::output::{print_json, print_table};
use anyhow::Context;
use ids_core::governor::format::format_stats;
use std::path::Path;

// ---------------------------------------------------------------------------
// stats
// ---------------------------------------------------------------------------

pub fn stats(root: &Path, json: bool) -> anyhow::Result<()> {
    let svc = services(root)?;
    let advisory = block_on(svc.governor.stats())?;
    if json {
        print_json(&advisory)?;
    } else {
        print!("{}", format_stats(&advisory));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// review
// ---------------------------------------------------------------------------

/// Lifecycle review of CREATE decisions, or the promotion status of one
/// entity.
pub fn review(root: &Path, entity: Option<&str>, json: bool) -> anyhow::Result<()> {
    let svc = services(root)?;
    let engine = svc.governor.engine();

    if let Some(id) = entity {
        let review = engine
            .get_promotion_status(id)
            .with_context(|| format!("failed to review '{id}'"))?;
        if json {
            return print_json(&review);
        }
        println!("{}: {} ({})", review.entity_id, review.status, review.reason);
        return Ok(());
    }

    let review = engine
        .review_create_decisions()
        .context("failed to review CREATE decisions")?;
    if json {
        return print_json(&review);
    }
    println!(
        "Reviewed {} CREATE decision(s): {} promotion candidate(s), {} monitoring, {} for deprecation review",
        review.reviewed, review.promotion_candidates, review.monitoring, review.deprecation_review
    );
    if !review.entries.is_empty() {
        let rows = review
            .entries
            .iter()
            .map(|r| {
                vec![
                    r.entity_id.clone(),
                    r.status.to_string(),
                    r.consumers.to_string(),
                    r.days_since_reference
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                ]
            })
            .collect();
        print_table(&["ENTITY", "STATUS", "CONSUMERS", "DAYS"], rows);
    }
    Ok(())
}
