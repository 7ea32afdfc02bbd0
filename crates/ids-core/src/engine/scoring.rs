use crate::keywords;
use crate::registry::Entity;
use serde::{Deserialize, Serialize};

pub const KEYWORD_WEIGHT: f64 = 0.6;
pub const PURPOSE_WEIGHT: f64 = 0.4;

pub const REUSE_THRESHOLD: f64 = 0.9;
pub const ADAPT_THRESHOLD: f64 = 0.6;
pub const ADAPT_HIGH_CONFIDENCE: f64 = 0.8;
pub const MIN_ADAPTABILITY: f64 = 0.6;
pub const MAX_ADAPT_IMPACT: f64 = 0.30;

const BASE_ADAPTABILITY: f64 = 0.7;
const EXTENSION_POINT_BONUS: f64 = 0.05;
const MAX_EXTENSION_BONUS: f64 = 0.2;
const CONSTRAINT_PENALTY: f64 = 0.1;
const MAX_CONSTRAINT_PENALTY: f64 = 0.4;
const WIDELY_USED_CONSUMERS: usize = 5;
const WIDELY_USED_PENALTY: f64 = 0.1;

// ---------------------------------------------------------------------------
// Decision / Confidence
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Reuse,
    Adapt,
    Create,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Reuse => "REUSE",
            Decision::Adapt => "ADAPT",
            Decision::Create => "CREATE",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Scores
// ---------------------------------------------------------------------------

pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Keyword vocabulary of an entity: declared keywords, id tokens, and
/// purpose tokens.
pub fn entity_vocabulary(entity: &Entity) -> Vec<String> {
    let mut vocab: Vec<String> = entity
        .keywords
        .iter()
        .flat_map(|k| keywords::extract(k))
        .collect();
    vocab.extend(keywords::extract(&entity.id));
    vocab.extend(keywords::extract(&entity.purpose));
    vocab
}

/// Fraction of intent keywords present in the entity's vocabulary.
pub fn keyword_score(intent_keywords: &[String], entity: &Entity) -> f64 {
    if intent_keywords.is_empty() {
        return 0.0;
    }
    let vocab = entity_vocabulary(entity);
    let matched = keywords::count_matches(intent_keywords, &vocab);
    round2(matched as f64 / intent_keywords.len() as f64)
}

/// Dice similarity between intent keywords and purpose keywords.
pub fn purpose_score(intent_keywords: &[String], purpose: &str) -> f64 {
    let purpose_keywords = keywords::extract(purpose);
    if intent_keywords.is_empty() || purpose_keywords.is_empty() {
        return 0.0;
    }
    let forward = keywords::count_matches(intent_keywords, &purpose_keywords);
    let backward = keywords::count_matches(&purpose_keywords, intent_keywords);
    round2((forward + backward) as f64 / (intent_keywords.len() + purpose_keywords.len()) as f64)
}

pub fn relevance_score(keyword: f64, purpose: f64) -> f64 {
    round2(KEYWORD_WEIGHT * keyword + PURPOSE_WEIGHT * purpose)
}

// ---------------------------------------------------------------------------
// Adaptability
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptabilityAssessment {
    pub score: f64,
    pub constraints: Vec<String>,
    pub extension_points: Vec<String>,
}

/// Declared score wins; otherwise derive one from extension points,
/// constraints, and how widely the entity is consumed.
pub fn assess_adaptability(entity: &Entity) -> AdaptabilityAssessment {
    let declared = entity.adaptability.clone().unwrap_or_default();
    let score = match declared.score {
        Some(s) => s.clamp(0.0, 1.0),
        None => {
            let bonus = (EXTENSION_POINT_BONUS * declared.extension_points.len() as f64)
                .min(MAX_EXTENSION_BONUS);
            let penalty =
                (CONSTRAINT_PENALTY * declared.constraints.len() as f64).min(MAX_CONSTRAINT_PENALTY);
            let reach = if entity.used_by.len() >= WIDELY_USED_CONSUMERS {
                WIDELY_USED_PENALTY
            } else {
                0.0
            };
            (BASE_ADAPTABILITY + bonus - penalty - reach).clamp(0.0, 1.0)
        }
    };
    AdaptabilityAssessment {
        score: round2(score),
        constraints: declared.constraints,
        extension_points: declared.extension_points,
    }
}

// ---------------------------------------------------------------------------
// Decision matrix
// ---------------------------------------------------------------------------

/// Lower bounds are inclusive: 0.9 is REUSE, 0.6 with qualifying
/// adaptability and impact is ADAPT.
pub fn apply_decision_matrix(relevance: f64, adaptability: f64, impact: f64) -> (Decision, Confidence) {
    if relevance >= REUSE_THRESHOLD {
        return (Decision::Reuse, Confidence::High);
    }
    if relevance >= ADAPT_THRESHOLD && adaptability >= MIN_ADAPTABILITY && impact < MAX_ADAPT_IMPACT {
        let confidence = if relevance >= ADAPT_HIGH_CONFIDENCE {
            Confidence::High
        } else {
            Confidence::Medium
        };
        return (Decision::Adapt, confidence);
    }
    let confidence = if relevance >= ADAPT_THRESHOLD {
        Confidence::Medium
    } else {
        Confidence::Low
    };
    (Decision::Create, confidence)
}

/// Why a candidate did not qualify for reuse or adaptation.
pub fn rejection_reason(relevance: f64, adaptability: f64, impact: f64) -> String {
    if relevance < ADAPT_THRESHOLD {
        format!("relevance {relevance:.2} is below the adaptation threshold {ADAPT_THRESHOLD:.2}")
    } else if adaptability < MIN_ADAPTABILITY {
        format!("adaptability {adaptability:.2} is below {MIN_ADAPTABILITY:.2}")
    } else if impact >= MAX_ADAPT_IMPACT {
        format!(
            "adapting would affect {:.0}% of the registry (limit {:.0}%)",
            impact * 100.0,
            MAX_ADAPT_IMPACT * 100.0
        )
    } else {
        "did not qualify for reuse or adaptation".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Adaptability;

    fn kw(words: &[&str]) -> Vec<String> {
        words.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn matrix_boundaries() {
        // (relevance, expected decision, expected confidence) with qualifying adaptability/impact
        let cases = [
            (0.59, Decision::Create, Confidence::Low),
            (0.60, Decision::Adapt, Confidence::Medium),
            (0.79, Decision::Adapt, Confidence::Medium),
            (0.80, Decision::Adapt, Confidence::High),
            (0.89, Decision::Adapt, Confidence::High),
            (0.90, Decision::Reuse, Confidence::High),
            (1.0, Decision::Reuse, Confidence::High),
        ];
        for (r, d, c) in cases {
            assert_eq!(apply_decision_matrix(r, 0.6, 0.29), (d, c), "relevance {r}");
        }
    }

    #[test]
    fn matrix_requires_adaptability_and_low_impact() {
        assert_eq!(
            apply_decision_matrix(0.75, 0.59, 0.0),
            (Decision::Create, Confidence::Medium)
        );
        assert_eq!(
            apply_decision_matrix(0.75, 0.9, 0.30),
            (Decision::Create, Confidence::Medium)
        );
        // REUSE ignores adaptability and impact entirely
        assert_eq!(
            apply_decision_matrix(0.9, 0.0, 1.0),
            (Decision::Reuse, Confidence::High)
        );
    }

    #[test]
    fn scores_for_close_purpose() {
        let mut e = Entity::new("validate-story", "tasks/validate-story.md", "task");
        e.keywords = kw(&["validate", "story", "draft"]);
        e.purpose = "Validate story drafts before development starts".to_string();
        let intent = kw(&["validate", "story", "drafts"]);
        assert_eq!(keyword_score(&intent, &e), 1.0);
        assert_eq!(purpose_score(&intent, &e.purpose), 0.75);
        assert_eq!(relevance_score(1.0, 0.75), 0.9);
    }

    #[test]
    fn scores_zero_for_unrelated_intent() {
        let mut e = Entity::new("validate-story", "tasks/validate-story.md", "task");
        e.purpose = "Validate story drafts".to_string();
        let intent = kw(&["quantum", "flux", "capacitor", "integration"]);
        assert_eq!(keyword_score(&intent, &e), 0.0);
        assert_eq!(purpose_score(&intent, &e.purpose), 0.0);
    }

    #[test]
    fn adaptability_declared_score_wins() {
        let mut e = Entity::new("a", "a.md", "task");
        e.adaptability = Some(Adaptability {
            score: Some(0.35),
            constraints: vec!["fixed output format".into()],
            extension_points: vec![],
        });
        let a = assess_adaptability(&e);
        assert_eq!(a.score, 0.35);
        assert_eq!(a.constraints.len(), 1);
    }

    #[test]
    fn adaptability_heuristic() {
        let e = Entity::new("a", "a.md", "task");
        assert_eq!(assess_adaptability(&e).score, 0.7);

        let mut e = Entity::new("b", "b.md", "task");
        e.adaptability = Some(Adaptability {
            score: None,
            constraints: vec!["c1".into(), "c2".into()],
            extension_points: vec!["hook".into()],
        });
        e.used_by = (0..5).map(|i| format!("consumer-{i}")).collect();
        // 0.7 + 0.05 - 0.2 - 0.1
        assert_eq!(assess_adaptability(&e).score, 0.45);
    }

    #[test]
    fn rejection_reason_names_the_failing_criterion() {
        assert!(rejection_reason(0.5, 0.9, 0.0).contains("relevance"));
        assert!(rejection_reason(0.7, 0.4, 0.0).contains("adaptability"));
        assert!(rejection_reason(0.7, 0.9, 0.5).contains("50%"));
    }
}
