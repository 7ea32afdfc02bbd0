//! Verification gates: checkpoints the agent workflow passes through before
//! creating epics and stories, validating a story, and starting development.
//!
//! Gates only advise. A gate that runs out of time passes with a warning.

use crate::config::GateTimeouts;
use crate::engine::Decision;
use crate::error::{IdsError, Result};
use crate::governor::{FrameworkGovernor, RiskLevel};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

pub const EPIC_CREATION: &str = "epic-creation";
pub const STORY_CREATION: &str = "story-creation";
pub const STORY_VALIDATION: &str = "story-validation";
pub const DEV_CONTEXT: &str = "dev-context";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    Pass,
    Fail,
    NeedsReview,
}

impl std::fmt::Display for GateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GateStatus::Pass => "pass",
            GateStatus::Fail => "fail",
            GateStatus::NeedsReview => "needs_review",
        };
        f.write_str(s)
    }
}

/// What the workflow is about to do.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateContext {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub referenced_entities: Vec<String>,
    /// Accepts a failing or flagged validation, with the reason recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_reason: Option<String>,
}

impl GateContext {
    pub fn intent(&self) -> String {
        let description = self.description.trim();
        if description.is_empty() {
            self.title.trim().to_string()
        } else {
            format!("{} {description}", self.title.trim())
        }
    }
}

/// A gate's verdict before timing and bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct GateOutcome {
    pub status: GateStatus,
    pub messages: Vec<String>,
    pub candidates: Vec<String>,
    pub degraded: Option<String>,
}

impl GateOutcome {
    fn pass(message: impl Into<String>) -> Self {
        Self {
            status: GateStatus::Pass,
            messages: vec![message.into()],
            candidates: Vec::new(),
            degraded: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateResult {
    pub gate: String,
    pub status: GateStatus,
    pub passed: bool,
    pub messages: Vec<String>,
    pub candidates: Vec<String>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded: Option<String>,
}

pub type GateFuture<'a> = Pin<Box<dyn Future<Output = Result<GateOutcome>> + 'a>>;

pub trait VerificationGate {
    fn name(&self) -> &'static str;

    fn timeout(&self, timeouts: &GateTimeouts) -> Duration;

    fn evaluate<'a>(&'a self, gov: &'a FrameworkGovernor, ctx: &'a GateContext) -> GateFuture<'a>;
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Evaluate `gate` under its timeout. Only invalid input is an error; a
/// gate that errors otherwise or runs out of time passes with a warning.
pub async fn run_gate(
    gate: &dyn VerificationGate,
    gov: &FrameworkGovernor,
    ctx: &GateContext,
    timeouts: &GateTimeouts,
) -> Result<GateResult> {
    if ctx.title.trim().is_empty() {
        return Err(IdsError::InvalidIntent("gate title must not be empty".to_string()));
    }
    let limit = gate.timeout(timeouts);
    let started = Instant::now();
    let outcome = match tokio::time::timeout(limit, gate.evaluate(gov, ctx)).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) if e.is_validation() => return Err(e),
        Ok(Err(e)) => {
            tracing::warn!(
                gate = gate.name(),
                code = e.code(),
                error = %e,
                "gate errored; passing with warning"
            );
            let reason = format!("{} failed: {e}", gate.name());
            GateOutcome {
                status: GateStatus::Pass,
                messages: vec![format!("{reason}; proceed with warning")],
                candidates: Vec::new(),
                degraded: Some(reason),
            }
        }
        Err(_) => {
            let reason = IdsError::Timeout {
                operation: gate.name().to_string(),
                millis: limit.as_millis() as u64,
            }
            .to_string();
            tracing::warn!(gate = gate.name(), "gate timed out; passing with warning");
            GateOutcome {
                status: GateStatus::Pass,
                messages: vec![format!("{reason}; proceed with warning")],
                candidates: Vec::new(),
                degraded: Some(reason),
            }
        }
    };
    let duration_ms = started.elapsed().as_millis() as u64;
    tracing::debug!(gate = gate.name(), status = %outcome.status, duration_ms, "gate evaluated");
    Ok(GateResult {
        gate: gate.name().to_string(),
        status: outcome.status,
        passed: outcome.status == GateStatus::Pass,
        messages: outcome.messages,
        candidates: outcome.candidates,
        duration_ms,
        degraded: outcome.degraded,
    })
}

/// Gate by its registered name.
pub fn gate_by_name(name: &str) -> Option<Box<dyn VerificationGate>> {
    match name {
        EPIC_CREATION => Some(Box::new(EpicCreationGate)),
        STORY_CREATION => Some(Box::new(StoryCreationGate)),
        STORY_VALIDATION => Some(Box::new(StoryValidationGate)),
        DEV_CONTEXT => Some(Box::new(DevContextGate)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Epic creation
// ---------------------------------------------------------------------------

/// Flags an epic that an existing artifact already covers.
pub struct EpicCreationGate;

impl VerificationGate for EpicCreationGate {
    fn name(&self) -> &'static str {
        EPIC_CREATION
    }

    fn timeout(&self, t: &GateTimeouts) -> Duration {
        Duration::from_millis(t.epic_creation_ms)
    }

    fn evaluate<'a>(&'a self, gov: &'a FrameworkGovernor, ctx: &'a GateContext) -> GateFuture<'a> {
        Box::pin(async move {
            let advisory = gov.pre_check(&ctx.intent(), ctx.entity_type.as_deref()).await?;
            let report = advisory.value;
            let reuse: Vec<String> = report
                .recommendations
                .iter()
                .filter(|r| r.decision == Decision::Reuse)
                .map(|r| r.entity_id.clone())
                .collect();
            let mut outcome = if reuse.is_empty() {
                GateOutcome::pass(format!(
                    "no existing artifact covers '{}'; {}",
                    ctx.title.trim(),
                    report.rationale
                ))
            } else {
                GateOutcome {
                    status: GateStatus::NeedsReview,
                    messages: vec![format!(
                        "'{}' already covers this epic; review it before creating a new one",
                        reuse[0]
                    )],
                    candidates: reuse,
                    degraded: None,
                }
            };
            outcome.degraded = advisory.degraded;
            Ok(outcome)
        })
    }
}

// ---------------------------------------------------------------------------
// Story creation
// ---------------------------------------------------------------------------

/// Flags a story whose work could reuse or adapt an existing task.
pub struct StoryCreationGate;

impl VerificationGate for StoryCreationGate {
    fn name(&self) -> &'static str {
        STORY_CREATION
    }

    fn timeout(&self, t: &GateTimeouts) -> Duration {
        Duration::from_millis(t.story_creation_ms)
    }

    fn evaluate<'a>(&'a self, gov: &'a FrameworkGovernor, ctx: &'a GateContext) -> GateFuture<'a> {
        Box::pin(async move {
            let entity_type = ctx.entity_type.as_deref().unwrap_or("task");
            let advisory = gov.pre_check(&ctx.intent(), Some(entity_type)).await?;
            let report = advisory.value;
            let close: Vec<_> = report
                .recommendations
                .iter()
                .filter(|r| matches!(r.decision, Decision::Reuse | Decision::Adapt))
                .collect();
            let mut outcome = if close.is_empty() {
                GateOutcome::pass(format!("no reusable {entity_type} found; create the story"))
            } else {
                GateOutcome {
                    status: GateStatus::NeedsReview,
                    messages: close
                        .iter()
                        .map(|r| {
                            format!(
                                "{} '{}' (relevance {:.2}): {}",
                                r.decision, r.entity_id, r.relevance_score, r.rationale
                            )
                        })
                        .collect(),
                    candidates: close.iter().map(|r| r.entity_id.clone()).collect(),
                    degraded: None,
                }
            };
            outcome.degraded = advisory.degraded;
            Ok(outcome)
        })
    }
}

// ---------------------------------------------------------------------------
// Story validation
// ---------------------------------------------------------------------------

/// Referenced entities must exist; changes with wide impact need review.
pub struct StoryValidationGate;

impl VerificationGate for StoryValidationGate {
    fn name(&self) -> &'static str {
        STORY_VALIDATION
    }

    fn timeout(&self, t: &GateTimeouts) -> Duration {
        Duration::from_millis(t.story_validation_ms)
    }

    fn evaluate<'a>(&'a self, gov: &'a FrameworkGovernor, ctx: &'a GateContext) -> GateFuture<'a> {
        Box::pin(async move {
            let mut status = GateStatus::Pass;
            let mut messages = Vec::new();
            let mut candidates = Vec::new();
            let mut degraded = None;

            for id in ctx.referenced_entities.iter().filter(|id| !id.trim().is_empty()) {
                let advisory = gov.impact_analysis(id).await?;
                if let Some(reason) = advisory.degraded {
                    messages.push(format!("could not verify '{id}': {reason}"));
                    degraded = Some(reason);
                    continue;
                }
                let report = advisory.value;
                if !report.found {
                    status = GateStatus::Fail;
                    messages.push(format!("referenced entity '{id}' is not registered"));
                    continue;
                }
                candidates.push(id.clone());
                if report.risk >= RiskLevel::High {
                    if status == GateStatus::Pass {
                        status = GateStatus::NeedsReview;
                    }
                    let pct = report.impact.as_ref().map_or(0.0, |i| i.percentage * 100.0);
                    messages.push(format!(
                        "changing '{id}' affects {pct:.0}% of the registry (risk {})",
                        report.risk
                    ));
                }
                messages.extend(report.warnings);
            }

            if let Some(reason) = ctx.override_reason.as_deref().filter(|r| !r.trim().is_empty()) {
                if status != GateStatus::Pass {
                    messages.push(format!("override accepted (was {status}): {reason}"));
                    status = GateStatus::Pass;
                }
            }
            if messages.is_empty() {
                messages.push(format!(
                    "{} referenced entity(ies) verified",
                    candidates.len()
                ));
            }
            Ok(GateOutcome {
                status,
                messages,
                candidates,
                degraded,
            })
        })
    }
}

// ---------------------------------------------------------------------------
// Dev context
// ---------------------------------------------------------------------------

/// Informational: what exists and what a change would touch.
pub struct DevContextGate;

impl VerificationGate for DevContextGate {
    fn name(&self) -> &'static str {
        DEV_CONTEXT
    }

    fn timeout(&self, t: &GateTimeouts) -> Duration {
        Duration::from_millis(t.dev_context_ms)
    }

    fn evaluate<'a>(&'a self, gov: &'a FrameworkGovernor, ctx: &'a GateContext) -> GateFuture<'a> {
        Box::pin(async move {
            let advisory = gov.pre_check(&ctx.intent(), ctx.entity_type.as_deref()).await?;
            let mut degraded = advisory.degraded;
            let report = advisory.value;
            let mut messages = vec![format!(
                "pre-check: {} ({} match(es))",
                report.top_decision, report.matches_found
            )];
            let candidates: Vec<String> = report
                .recommendations
                .iter()
                .take(5)
                .map(|r| r.entity_id.clone())
                .collect();

            for id in ctx.referenced_entities.iter().filter(|id| !id.trim().is_empty()) {
                let impact = gov.impact_analysis(id).await?;
                if impact.degraded.is_some() {
                    degraded = impact.degraded;
                    continue;
                }
                let r = impact.value;
                match (r.found, r.impact) {
                    (true, Some(i)) => messages.push(format!(
                        "'{id}': risk {}, {} consumer(s) affected",
                        r.risk, i.total_affected
                    )),
                    _ => messages.push(format!("'{id}': not registered")),
                }
            }
            Ok(GateOutcome {
                status: GateStatus::Pass,
                messages,
                candidates,
                degraded,
            })
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
