//! Framework governor: the advisory facade the agent workflow talks to.
//!
//! Every call into the loader, engine, healer, or updater runs on the
//! blocking pool, raced against a fixed timeout and guarded by a circuit
//! breaker. On timeout, error, or an open circuit the caller gets a
//! fallback value marked `degraded`, never an error: governance must not
//! block the primary workflow. Only bad input fails fast.

pub mod format;

use crate::breaker::{BreakerStats, CircuitBreaker};
use crate::config::{BreakerConfig, IdsConfig};
use crate::engine::{
    AdaptabilityAssessment, AnalyzeContext, Confidence, Decision, DecisionEngine, ImpactAnalysis,
    Recommendation,
};
use crate::error::{IdsError, Result};
use crate::healer::{HealthReport, HealthSummary, ManualWarning, RegistryHealer};
use crate::loader::RegistryLoader;
use crate::registry::CreateJustification;
use crate::updater::{RegistrationMetadata, RegistrationOutcome, RegistrationRequest, RegistryUpdater};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Adaptability below this gets a warning in impact reports.
const LOW_ADAPTABILITY: f64 = 0.6;

// ---------------------------------------------------------------------------
// Advisory
// ---------------------------------------------------------------------------

/// A value plus, when the governed call did not complete, why the value is
/// a fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Advisory<T> {
    pub value: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded: Option<String>,
}

impl<T> Advisory<T> {
    pub fn ok(value: T) -> Self {
        Self {
            value,
            degraded: None,
        }
    }

    pub fn degraded(value: T, reason: impl Into<String>) -> Self {
        Self {
            value,
            degraded: Some(reason.into()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

/// Race `fut` against `limit`. Errors and timeouts yield `fallback()`
/// annotated with the reason; the losing computation is dropped.
pub async fn with_timeout<T, F>(
    operation: &str,
    limit: Duration,
    fut: F,
    fallback: impl FnOnce() -> T,
) -> Advisory<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Advisory::ok(value),
        Ok(Err(e)) => {
            tracing::warn!(
                operation,
                code = e.code(),
                error = %e,
                "governed call failed; using fallback"
            );
            Advisory::degraded(fallback(), format!("{operation} failed: {e}"))
        }
        Err(_) => {
            let e = IdsError::Timeout {
                operation: operation.to_string(),
                millis: limit.as_millis() as u64,
            };
            tracing::warn!(
                operation,
                millis = limit.as_millis() as u64,
                "governed call timed out; using fallback"
            );
            Advisory::degraded(fallback(), format!("{e}; proceed with warning"))
        }
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreCheckReport {
    pub intent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    pub top_decision: Decision,
    pub confidence: Confidence,
    /// Always true: recommendations are advisory.
    pub should_proceed: bool,
    pub total_entities: usize,
    pub matches_found: usize,
    pub recommendations: Vec<Recommendation>,
    pub rationale: String,
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<CreateJustification>,
}

impl PreCheckReport {
    fn fallback(intent: &str, entity_type: Option<&str>) -> Self {
        Self {
            intent: intent.to_string(),
            entity_type: entity_type.map(str::to_string),
            top_decision: Decision::Create,
            confidence: Confidence::Low,
            should_proceed: true,
            total_entities: 0,
            matches_found: 0,
            recommendations: Vec::new(),
            rationale: "Governance unavailable; proceed with creating a new artifact.".to_string(),
            warnings: Vec::new(),
            justification: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_impact(impact: &ImpactAnalysis) -> Self {
        let pct = impact.percentage;
        if impact.total_affected == 0 {
            RiskLevel::None
        } else if pct >= 0.5 {
            RiskLevel::Critical
        } else if pct >= 0.3 {
            RiskLevel::High
        } else if pct >= 0.1 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RiskLevel::None => "NONE",
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactReport {
    pub entity_id: String,
    pub found: bool,
    pub risk: RiskLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<ImpactAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_adapt: Option<AdaptabilityAssessment>,
    pub warnings: Vec<String>,
}

impl ImpactReport {
    fn not_found(entity_id: &str) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            found: false,
            risk: RiskLevel::None,
            impact: None,
            can_adapt: None,
            warnings: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationReport {
    pub file_path: String,
    pub registered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<RegistrationOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckReport {
    /// False when no healer was wired in.
    pub configured: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<HealthReport>,
    pub warnings: Vec<ManualWarning>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernorStats {
    pub total_entities: usize,
    pub by_category: BTreeMap<String, usize>,
    pub by_type: BTreeMap<String, usize>,
    pub breakers: Vec<BreakerStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthSummary>,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct GovernorBuilder {
    loader: Option<Arc<RegistryLoader>>,
    engine: Option<Arc<DecisionEngine>>,
    updater: Option<Arc<dyn RegistryUpdater>>,
    healer: Option<Arc<RegistryHealer>>,
    timeout: Option<Duration>,
    breaker: Option<BreakerConfig>,
}

impl GovernorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loader(mut self, loader: Arc<RegistryLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn engine(mut self, engine: Arc<DecisionEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn registry_updater(mut self, updater: Arc<dyn RegistryUpdater>) -> Self {
        self.updater = Some(updater);
        self
    }

    pub fn healer(mut self, healer: Arc<RegistryHealer>) -> Self {
        self.healer = Some(healer);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn breaker_config(mut self, cfg: BreakerConfig) -> Self {
        self.breaker = Some(cfg);
        self
    }

    /// Timeout and breaker settings from a loaded config.
    pub fn config(self, config: &IdsConfig) -> Self {
        self.timeout(config.governor_timeout())
            .breaker_config(config.breaker.clone())
    }

    pub fn build(self) -> Result<FrameworkGovernor> {
        let loader = self.loader.ok_or(IdsError::MissingDependency("registry loader"))?;
        let engine = self.engine.ok_or(IdsError::MissingDependency("decision engine"))?;
        let updater = self
            .updater
            .ok_or(IdsError::MissingDependency("registry updater"))?;
        let breaker = self.breaker.unwrap_or_default();
        Ok(FrameworkGovernor {
            loader,
            engine,
            updater,
            healer: self.healer,
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            engine_breaker: Arc::new(CircuitBreaker::new("decision-engine", breaker.clone())),
            healer_breaker: Arc::new(CircuitBreaker::new("registry-healer", breaker.clone())),
            updater_breaker: Arc::new(CircuitBreaker::new("registry-updater", breaker)),
        })
    }
}

// ---------------------------------------------------------------------------
// FrameworkGovernor
// ---------------------------------------------------------------------------

pub struct FrameworkGovernor {
    loader: Arc<RegistryLoader>,
    engine: Arc<DecisionEngine>,
    updater: Arc<dyn RegistryUpdater>,
    healer: Option<Arc<RegistryHealer>>,
    timeout: Duration,
    engine_breaker: Arc<CircuitBreaker>,
    healer_breaker: Arc<CircuitBreaker>,
    updater_breaker: Arc<CircuitBreaker>,
}

impl FrameworkGovernor {
    pub fn builder() -> GovernorBuilder {
        GovernorBuilder::new()
    }

    pub fn loader(&self) -> &Arc<RegistryLoader> {
        &self.loader
    }

    pub fn engine(&self) -> &Arc<DecisionEngine> {
        &self.engine
    }

    pub fn healer(&self) -> Option<&Arc<RegistryHealer>> {
        self.healer.as_ref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn breaker_stats(&self) -> Vec<BreakerStats> {
        vec![
            self.engine_breaker.stats(),
            self.healer_breaker.stats(),
            self.updater_breaker.stats(),
        ]
    }

    pub fn reset_breakers(&self) {
        self.engine_breaker.reset();
        self.healer_breaker.reset();
        self.updater_breaker.reset();
    }

    /// Run blocking `work` through `breaker` under the governor timeout.
    /// Rejected input degrades the call without counting against the
    /// breaker; a caller dropping this future releases its permit.
    async fn guarded<T, W>(
        &self,
        breaker: &CircuitBreaker,
        operation: &'static str,
        work: W,
        fallback: impl FnOnce() -> T,
    ) -> Advisory<T>
    where
        T: Send + 'static,
        W: FnOnce() -> Result<T> + Send + 'static,
    {
        let Some(permit) = breaker.permit() else {
            let e = IdsError::CircuitOpen(breaker.name().to_string());
            tracing::warn!(operation, code = e.code(), "governed call short-circuited");
            return Advisory::degraded(fallback(), e.to_string());
        };
        let mut rejected_input = false;
        let fut = async {
            let result = match tokio::task::spawn_blocking(work).await {
                Ok(result) => result,
                Err(e) => Err(IdsError::Internal(format!("{operation} task join error: {e}"))),
            };
            rejected_input = matches!(&result, Err(e) if e.is_validation());
            result
        };
        let advisory = with_timeout(operation, self.timeout, fut, fallback).await;
        match (advisory.is_degraded(), rejected_input) {
            (false, _) => permit.success(),
            (true, false) => permit.failure(),
            (true, true) => drop(permit),
        }
        advisory
    }

    /// Should this intent reuse, adapt, or create? Blank intent is the only
    /// error.
    pub async fn pre_check(
        &self,
        intent: &str,
        entity_type: Option<&str>,
    ) -> Result<Advisory<PreCheckReport>> {
        if intent.trim().is_empty() {
            return Err(IdsError::InvalidIntent("intent must not be empty".to_string()));
        }
        let engine = Arc::clone(&self.engine);
        let owned_intent = intent.to_string();
        let ctx = AnalyzeContext {
            entity_type: entity_type.map(str::to_string),
            category: None,
        };
        let owned_type = ctx.entity_type.clone();
        let work = move || {
            let analysis = engine.try_analyze(&owned_intent, &ctx)?;
            Ok(PreCheckReport {
                intent: analysis.intent,
                entity_type: owned_type,
                top_decision: analysis.summary.decision,
                confidence: analysis.summary.confidence,
                should_proceed: true,
                total_entities: analysis.summary.total_entities,
                matches_found: analysis.summary.matches_found,
                recommendations: analysis.recommendations,
                rationale: analysis.rationale,
                warnings: analysis.warnings,
                justification: analysis.justification,
            })
        };
        Ok(self
            .guarded(&self.engine_breaker, "pre-check", work, || {
                PreCheckReport::fallback(intent, entity_type)
            })
            .await)
    }

    pub async fn impact_analysis(&self, entity_id: &str) -> Result<Advisory<ImpactReport>> {
        let id = entity_id.trim();
        if id.is_empty() {
            return Err(IdsError::InvalidEntityId("entity id must not be empty".to_string()));
        }
        let engine = Arc::clone(&self.engine);
        let owned_id = id.to_string();
        let work = move || {
            let Some(impact) = engine.calculate_impact(&owned_id)? else {
                return Ok(ImpactReport::not_found(&owned_id));
            };
            let can_adapt = engine.assess_adaptability(&owned_id)?;
            let mut warnings = Vec::new();
            if let Some(a) = can_adapt.as_ref().filter(|a| a.score < LOW_ADAPTABILITY) {
                warnings.push(format!(
                    "adaptability {:.2} is below {LOW_ADAPTABILITY:.2}; changing '{owned_id}' is risky, consider a new artifact",
                    a.score
                ));
            }
            Ok(ImpactReport {
                entity_id: owned_id,
                found: true,
                risk: RiskLevel::from_impact(&impact),
                impact: Some(impact),
                can_adapt,
                warnings,
            })
        };
        Ok(self
            .guarded(&self.engine_breaker, "impact-analysis", work, || {
                ImpactReport::not_found(id)
            })
            .await)
    }

    /// Hand a produced artifact to the registry updater.
    pub async fn post_register(
        &self,
        file_path: &str,
        metadata: RegistrationMetadata,
    ) -> Result<Advisory<RegistrationReport>> {
        let path = file_path.trim();
        if path.is_empty() {
            return Err(IdsError::InvalidFilePath("file path must not be empty".to_string()));
        }
        let updater = Arc::clone(&self.updater);
        let req = RegistrationRequest {
            file_path: path.to_string(),
            metadata,
        };
        let work = move || {
            let outcome = updater.on_task_complete(&req)?;
            Ok(RegistrationReport {
                file_path: req.file_path,
                registered: true,
                outcome: Some(outcome),
                error: None,
            })
        };
        let mut advisory = self
            .guarded(&self.updater_breaker, "post-register", work, || RegistrationReport {
                file_path: path.to_string(),
                registered: false,
                outcome: None,
                error: None,
            })
            .await;
        if let Some(reason) = &advisory.degraded {
            advisory.value.error = Some(reason.clone());
        } else {
            self.engine.clear_cache();
        }
        Ok(advisory)
    }

    pub async fn health_check(&self) -> Advisory<HealthCheckReport> {
        let Some(healer) = self.healer.clone() else {
            return Advisory::ok(HealthCheckReport {
                configured: false,
                report: None,
                warnings: Vec::new(),
            });
        };
        let work = move || {
            let report = healer.run_health_check()?;
            let warnings = healer.emit_warnings(&report.issues);
            Ok(HealthCheckReport {
                configured: true,
                report: Some(report),
                warnings,
            })
        };
        self.guarded(&self.healer_breaker, "health-check", work, || HealthCheckReport {
            configured: true,
            report: None,
            warnings: Vec::new(),
        })
        .await
    }

    pub async fn stats(&self) -> Advisory<GovernorStats> {
        let loader = Arc::clone(&self.loader);
        let healer = self.healer.clone();
        let work = move || {
            let snapshot = loader.load()?;
            let health = match healer {
                Some(h) => Some(h.run_health_check()?.summary),
                None => None,
            };
            Ok(GovernorStats {
                total_entities: snapshot.entity_count(),
                by_category: snapshot.counts_by_category(),
                by_type: snapshot.counts_by_type(),
                breakers: Vec::new(),
                health,
            })
        };
        let mut advisory = self
            .guarded(&self.engine_breaker, "stats", work, GovernorStats::default)
            .await;
        advisory.value.breakers = self.breaker_stats();
        advisory
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
