//! Incremental decision engine: answers "reuse, adapt, or create?" for an
//! intent by scoring every registered entity against it.
//!
//! `analyze` never fails. A blank intent, an empty registry, or an
//! unreadable registry all produce a CREATE recommendation with a warning;
//! `try_analyze` surfaces load errors for callers that want to degrade
//! explicitly (the governor does).

pub mod impact;
pub mod lifecycle;
pub mod scoring;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::keywords;
use crate::loader::{IndexedEntity, RegistryLoader, RegistrySnapshot};
use crate::registry::CreateJustification;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, Weak};
use std::time::Instant;

pub use impact::{calculate_impact, ConsumerGraph, ImpactAnalysis};
pub use lifecycle::{CreateDecisionReview, PromotionReview, PromotionStatus};
pub use scoring::{AdaptabilityAssessment, Confidence, Decision};

/// Below this many entities recommendations are flagged as unreliable.
pub const SPARSE_REGISTRY_THRESHOLD: usize = 10;

/// Upper bound on cached analyses; the oldest entry goes first.
pub const MAX_CACHE_ENTRIES: usize = 256;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Optional narrowing of the candidate set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeContext {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl AnalyzeContext {
    pub fn of_type(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: Some(entity_type.into()),
            category: None,
        }
    }

    fn admits(&self, ie: &IndexedEntity) -> bool {
        let type_ok = self
            .entity_type
            .as_deref()
            .map_or(true, |t| ie.entity.entity_type.eq_ignore_ascii_case(t));
        let category_ok = self
            .category
            .as_deref()
            .map_or(true, |c| ie.category == c);
        type_ok && category_ok
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptationImpact {
    pub percentage: f64,
    pub direct_consumers: Vec<String>,
    pub indirect_consumers: Vec<String>,
    pub total_affected: usize,
}

impl From<ImpactAnalysis> for AdaptationImpact {
    fn from(a: ImpactAnalysis) -> Self {
        Self {
            percentage: a.percentage,
            direct_consumers: a.direct_consumers,
            indirect_consumers: a.indirect_consumers,
            total_affected: a.total_affected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub entity_id: String,
    pub entity_path: String,
    pub entity_type: String,
    pub category: String,
    pub keyword_score: f64,
    pub purpose_score: f64,
    pub relevance_score: f64,
    pub decision: Decision,
    pub confidence: Confidence,
    pub rationale: String,
    pub can_adapt: AdaptabilityAssessment,
    pub adaptation_impact: AdaptationImpact,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    pub total_entities: usize,
    pub matches_found: usize,
    pub decision: Decision,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub intent: String,
    pub recommendations: Vec<Recommendation>,
    pub summary: AnalysisSummary,
    pub rationale: String,
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<CreateJustification>,
}

impl Analysis {
    /// CREATE with nothing to recommend.
    fn create_only(intent: &str, total_entities: usize, rationale: &str, warnings: Vec<String>) -> Self {
        Self {
            intent: intent.to_string(),
            recommendations: Vec::new(),
            summary: AnalysisSummary {
                total_entities,
                matches_found: 0,
                decision: Decision::Create,
                confidence: Confidence::Low,
            },
            rationale: rationale.to_string(),
            warnings,
            justification: Some(justification(intent, &[])),
        }
    }

    pub fn top(&self) -> Option<&Recommendation> {
        self.recommendations.first()
    }
}

fn justification(intent: &str, evaluated: &[Recommendation]) -> CreateJustification {
    CreateJustification {
        evaluated_patterns: evaluated.iter().map(|r| r.entity_id.clone()).collect(),
        rejection_reasons: evaluated
            .iter()
            .map(|r| {
                let reason = scoring::rejection_reason(
                    r.relevance_score,
                    r.can_adapt.score,
                    r.adaptation_impact.percentage,
                );
                (r.entity_id.clone(), reason)
            })
            .collect::<BTreeMap<_, _>>(),
        new_capability: intent.trim().to_string(),
        review_scheduled: Some(lifecycle::review_date(Utc::now())),
    }
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

type CacheKey = (String, AnalyzeContext);

struct CacheEntry {
    at: Instant,
    snapshot: Weak<RegistrySnapshot>,
    analysis: Analysis,
}

// ---------------------------------------------------------------------------
// DecisionEngine
// ---------------------------------------------------------------------------

pub struct DecisionEngine {
    loader: Arc<RegistryLoader>,
    cfg: EngineConfig,
    cache: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl DecisionEngine {
    pub fn new(loader: Arc<RegistryLoader>, cfg: EngineConfig) -> Self {
        Self {
            loader,
            cfg,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn loader(&self) -> &Arc<RegistryLoader> {
        &self.loader
    }

    /// Recommendation for `intent`. Load failures become a CREATE result
    /// carrying the error as a warning.
    pub fn analyze(&self, intent: &str, ctx: &AnalyzeContext) -> Analysis {
        match self.try_analyze(intent, ctx) {
            Ok(analysis) => analysis,
            Err(e) => {
                tracing::warn!(code = e.code(), error = %e, "analysis degraded: registry unavailable");
                Analysis::create_only(
                    intent,
                    0,
                    "The registry could not be read; proceed with creating a new artifact.",
                    vec![format!("registry unavailable: {e}")],
                )
            }
        }
    }

    pub fn try_analyze(&self, intent: &str, ctx: &AnalyzeContext) -> Result<Analysis> {
        let intent_keywords = keywords::extract(intent);
        if intent_keywords.is_empty() {
            let total = self.loader.load().map(|s| s.entity_count()).unwrap_or(0);
            return Ok(Analysis::create_only(
                intent,
                total,
                "No intent to match against; nothing can be reused.",
                vec!["intent is empty or has no meaningful keywords".to_string()],
            ));
        }

        let snapshot = self.loader.load()?;
        let key: CacheKey = (intent.to_string(), ctx.clone());
        if let Some(hit) = self.cached(&key, &snapshot) {
            tracing::debug!(intent, "analysis cache hit");
            return Ok(hit);
        }

        let analysis = self.compute(intent, &intent_keywords, ctx, &snapshot);
        tracing::debug!(
            intent,
            decision = %analysis.summary.decision,
            matches = analysis.summary.matches_found,
            "analysis complete"
        );
        self.store(key, &snapshot, analysis.clone());
        Ok(analysis)
    }

    /// Fresh entry computed against the current snapshot, if any.
    fn cached(&self, key: &CacheKey, snapshot: &Arc<RegistrySnapshot>) -> Option<Analysis> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        let entry = cache.get(key)?;
        let fresh = entry.at.elapsed() < self.cfg.cache_ttl()
            && Weak::ptr_eq(&entry.snapshot, &Arc::downgrade(snapshot));
        if fresh {
            Some(entry.analysis.clone())
        } else {
            cache.remove(key);
            None
        }
    }

    /// Insert after evicting expired entries and entries computed against
    /// an older snapshot.
    fn store(&self, key: CacheKey, snapshot: &Arc<RegistrySnapshot>, analysis: Analysis) {
        let ttl = self.cfg.cache_ttl();
        let current = Arc::downgrade(snapshot);
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.retain(|_, e| e.at.elapsed() < ttl && Weak::ptr_eq(&e.snapshot, &current));
        while cache.len() >= MAX_CACHE_ENTRIES {
            let oldest = cache
                .iter()
                .min_by_key(|(_, e)| e.at)
                .map(|(k, _)| k.clone());
            let Some(k) = oldest else { break };
            cache.remove(&k);
        }
        cache.insert(
            key,
            CacheEntry {
                at: Instant::now(),
                snapshot: current,
                analysis,
            },
        );
    }

    pub fn clear_cache(&self) {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn compute(
        &self,
        intent: &str,
        intent_keywords: &[String],
        ctx: &AnalyzeContext,
        snapshot: &RegistrySnapshot,
    ) -> Analysis {
        let total = snapshot.entity_count();
        let mut warnings = Vec::new();
        if total == 0 {
            return Analysis::create_only(
                intent,
                0,
                "The registry is empty; nothing exists to reuse.",
                vec!["registry is empty".to_string()],
            );
        }
        if total < SPARSE_REGISTRY_THRESHOLD {
            warnings.push(format!(
                "sparse registry: only {total} entities registered; recommendations may be incomplete"
            ));
        }

        let graph = ConsumerGraph::build(snapshot);
        let mut recommendations: Vec<Recommendation> = snapshot
            .entities()
            .filter(|ie| ctx.admits(ie))
            .filter_map(|ie| self.score(intent_keywords, ie, &graph))
            .collect();
        recommendations.sort_by(|a, b| {
            b.relevance_score
                .total_cmp(&a.relevance_score)
                .then_with(|| a.entity_id.cmp(&b.entity_id))
        });
        let matches_found = recommendations.len();
        recommendations.truncate(self.cfg.max_recommendations);

        let (decision, confidence) = recommendations
            .first()
            .map(|r| (r.decision, r.confidence))
            .unwrap_or((Decision::Create, Confidence::Low));

        let rationale = match recommendations.first() {
            Some(top) if decision != Decision::Create => top.rationale.clone(),
            Some(top) => format!(
                "Closest match '{}' scored {:.2}; no existing artifact qualifies, create a new one.",
                top.entity_id, top.relevance_score
            ),
            None => "No registered artifact matches this intent; create a new one.".to_string(),
        };
        let justification = (decision == Decision::Create).then(|| justification(intent, &recommendations));

        Analysis {
            intent: intent.to_string(),
            recommendations,
            summary: AnalysisSummary {
                total_entities: total,
                matches_found,
                decision,
                confidence,
            },
            rationale,
            warnings,
            justification,
        }
    }

    fn score(
        &self,
        intent_keywords: &[String],
        ie: &IndexedEntity,
        graph: &ConsumerGraph<'_>,
    ) -> Option<Recommendation> {
        let entity = &ie.entity;
        let keyword_score = scoring::keyword_score(intent_keywords, entity);
        let purpose_score = scoring::purpose_score(intent_keywords, &entity.purpose);
        let relevance = scoring::relevance_score(keyword_score, purpose_score);
        if relevance < self.cfg.min_relevance {
            return None;
        }

        let can_adapt = scoring::assess_adaptability(entity);
        let impact = graph.impact(&entity.id);
        let (decision, confidence) =
            scoring::apply_decision_matrix(relevance, can_adapt.score, impact.percentage);
        let rationale = match decision {
            Decision::Reuse => format!(
                "'{}' already covers this intent (relevance {relevance:.2}); reuse it as is.",
                entity.id
            ),
            Decision::Adapt => format!(
                "'{}' is a close match (relevance {relevance:.2}, adaptability {:.2}); adapting it affects {} consumer(s).",
                entity.id, can_adapt.score, impact.total_affected
            ),
            Decision::Create => scoring::rejection_reason(relevance, can_adapt.score, impact.percentage),
        };

        Some(Recommendation {
            entity_id: entity.id.clone(),
            entity_path: entity.path.clone(),
            entity_type: entity.entity_type.clone(),
            category: ie.category.clone(),
            keyword_score,
            purpose_score,
            relevance_score: relevance,
            decision,
            confidence,
            rationale,
            can_adapt,
            adaptation_impact: impact.into(),
        })
    }

    pub fn calculate_impact(&self, entity_id: &str) -> Result<Option<ImpactAnalysis>> {
        let snapshot = self.loader.load()?;
        Ok(calculate_impact(&snapshot, entity_id))
    }

    pub fn assess_adaptability(&self, entity_id: &str) -> Result<Option<AdaptabilityAssessment>> {
        let snapshot = self.loader.load()?;
        Ok(snapshot
            .find_by_id(entity_id)
            .map(|ie| scoring::assess_adaptability(&ie.entity)))
    }

    pub fn get_promotion_status(&self, entity_id: &str) -> Result<PromotionReview> {
        let snapshot = self.loader.load()?;
        Ok(lifecycle::promotion_status(&snapshot, entity_id, Utc::now()))
    }

    pub fn review_create_decisions(&self) -> Result<CreateDecisionReview> {
        let snapshot = self.loader.load()?;
        Ok(lifecycle::review_create_decisions(&snapshot, Utc::now()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
