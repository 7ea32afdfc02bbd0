//! Human-readable renderings of governor reports for terminals and agent
//! transcripts.

use super::{
    Advisory, GovernorStats, HealthCheckReport, ImpactReport, PreCheckReport, RegistrationReport,
};
use std::fmt::Write;

fn degraded_line(out: &mut String, degraded: &Option<String>) {
    if let Some(reason) = degraded {
        let _ = writeln!(out, "! degraded: {reason}");
    }
}

pub fn format_pre_check(a: &Advisory<PreCheckReport>) -> String {
    let r = &a.value;
    let mut out = String::new();
    let _ = writeln!(out, "Intent: {}", r.intent);
    let _ = writeln!(
        out,
        "Decision: {} (confidence {}) | {} match(es) across {} entities",
        r.top_decision, r.confidence, r.matches_found, r.total_entities
    );
    let _ = writeln!(out, "{}", r.rationale);
    if !r.recommendations.is_empty() {
        let _ = writeln!(out, "\nCandidates:");
        for rec in r.recommendations.iter().take(5) {
            let _ = writeln!(
                out,
                "  {:<7} {:.2}  {} ({})",
                rec.decision.as_str(),
                rec.relevance_score,
                rec.entity_id,
                rec.entity_path
            );
        }
    }
    if let Some(j) = &r.justification {
        if let Some(review) = j.review_scheduled {
            let _ = writeln!(out, "\nReview scheduled: {}", review.format("%Y-%m-%d"));
        }
    }
    for w in &r.warnings {
        let _ = writeln!(out, "warning: {w}");
    }
    degraded_line(&mut out, &a.degraded);
    out
}

pub fn format_impact(a: &Advisory<ImpactReport>) -> String {
    let r = &a.value;
    let mut out = String::new();
    if !r.found {
        let _ = writeln!(out, "Entity '{}' is not registered.", r.entity_id);
        degraded_line(&mut out, &a.degraded);
        return out;
    }
    let _ = writeln!(out, "Impact of changing '{}': risk {}", r.entity_id, r.risk);
    if let Some(i) = &r.impact {
        let _ = writeln!(
            out,
            "  {} affected ({:.0}% of registry)",
            i.total_affected,
            i.percentage * 100.0
        );
        if !i.direct_consumers.is_empty() {
            let _ = writeln!(out, "  direct:   {}", i.direct_consumers.join(", "));
        }
        if !i.indirect_consumers.is_empty() {
            let _ = writeln!(out, "  indirect: {}", i.indirect_consumers.join(", "));
        }
    }
    if let Some(c) = &r.can_adapt {
        let _ = writeln!(out, "  adaptability: {:.2}", c.score);
    }
    for w in &r.warnings {
        let _ = writeln!(out, "warning: {w}");
    }
    degraded_line(&mut out, &a.degraded);
    out
}

pub fn format_registration(a: &Advisory<RegistrationReport>) -> String {
    let r = &a.value;
    let mut out = String::new();
    match (&r.outcome, &r.error) {
        (Some(o), _) => {
            let verb = if o.created { "Registered" } else { "Updated" };
            let _ = writeln!(out, "{verb} '{}' in {} ({})", o.entity_id, o.category, r.file_path);
        }
        (None, Some(e)) => {
            let _ = writeln!(out, "Not registered: {} ({e})", r.file_path);
        }
        (None, None) => {
            let _ = writeln!(out, "Not registered: {}", r.file_path);
        }
    }
    if r.error.is_none() {
        degraded_line(&mut out, &a.degraded);
    }
    out
}

pub fn format_health(a: &Advisory<HealthCheckReport>) -> String {
    let r = &a.value;
    let mut out = String::new();
    if !r.configured {
        let _ = writeln!(out, "Registry healer is not configured.");
        return out;
    }
    match &r.report {
        Some(report) => {
            let s = &report.summary;
            let status = if s.healthy { "healthy" } else { "unhealthy" };
            let _ = writeln!(
                out,
                "Registry {status}: {} issue(s) across {} entities ({} critical, {} high, {} medium, {} low; {} auto-healable)",
                s.total, report.entities_checked, s.critical, s.high, s.medium, s.low, s.auto_healable
            );
            for issue in &report.issues {
                let heal = if issue.auto_healable { "auto" } else { "manual" };
                let _ = writeln!(
                    out,
                    "  [{}] {:<20} {:<22} {} ({heal})",
                    issue.severity, issue.entity_id, issue.rule_id, issue.details
                );
            }
        }
        None => {
            let _ = writeln!(out, "Health check did not complete.");
        }
    }
    for w in &r.warnings {
        let _ = writeln!(out, "\n{}", w.message);
        for s in &w.suggestions {
            let _ = writeln!(out, "  - {s}");
        }
    }
    degraded_line(&mut out, &a.degraded);
    out
}

pub fn format_stats(a: &Advisory<GovernorStats>) -> String {
    let r = &a.value;
    let mut out = String::new();
    let _ = writeln!(out, "Entities: {}", r.total_entities);
    if !r.by_category.is_empty() {
        let _ = writeln!(out, "By category:");
        for (cat, n) in &r.by_category {
            let _ = writeln!(out, "  {cat:<16} {n}");
        }
    }
    if !r.by_type.is_empty() {
        let _ = writeln!(out, "By type:");
        for (ty, n) in &r.by_type {
            let _ = writeln!(out, "  {ty:<16} {n}");
        }
    }
    if let Some(h) = &r.health {
        let _ = writeln!(
            out,
            "Health: {} issue(s), auto-healable rate {:.2}",
            h.total, h.auto_healable_rate
        );
    }
    for b in &r.breakers {
        let _ = writeln!(
            out,
            "Breaker {}: {} (ok {}, failed {}, rejected {})",
            b.name, b.state, b.total_successes, b.total_failures, b.total_rejections
        );
    }
    degraded_line(&mut out, &a.degraded);
    out
}
