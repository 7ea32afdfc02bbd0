//! Follow-up review of artifacts created despite existing candidates.
//!
//! An artifact that picked up consumers is a promotion candidate; one that
//! nobody adopted within the review window is flagged for deprecation.

use crate::loader::RegistrySnapshot;
use crate::registry::Entity;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const PROMOTION_MIN_CONSUMERS: usize = 3;
pub const DEPRECATION_AFTER_DAYS: i64 = 60;
pub const REVIEW_AFTER_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PromotionStatus {
    PromotionCandidate,
    Monitoring,
    DeprecationReview,
    Unknown,
}

impl std::fmt::Display for PromotionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PromotionStatus::PromotionCandidate => "promotion-candidate",
            PromotionStatus::Monitoring => "monitoring",
            PromotionStatus::DeprecationReview => "deprecation-review",
            PromotionStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionReview {
    pub entity_id: String,
    pub status: PromotionStatus,
    pub consumers: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_since_reference: Option<i64>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDecisionReview {
    pub reviewed: usize,
    pub promotion_candidates: usize,
    pub monitoring: usize,
    pub deprecation_review: usize,
    pub entries: Vec<PromotionReview>,
}

pub fn review_date(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::days(REVIEW_AFTER_DAYS)
}

/// Registered consumers only; dangling `usedBy` ids are not adoption.
fn distinct_consumers(entity: &Entity, snapshot: &RegistrySnapshot) -> usize {
    entity
        .used_by
        .iter()
        .filter(|c| **c != entity.id && snapshot.contains(c))
        .collect::<BTreeSet<_>>()
        .len()
}

/// Creation date, falling back to the scheduled review date.
fn reference_date(entity: &Entity) -> Option<DateTime<Utc>> {
    entity.created_at.or_else(|| {
        entity
            .create_justification
            .as_ref()
            .and_then(|j| j.review_scheduled)
    })
}

pub fn promotion_status(
    snapshot: &RegistrySnapshot,
    entity_id: &str,
    now: DateTime<Utc>,
) -> PromotionReview {
    let Some(ie) = snapshot.find_by_id(entity_id) else {
        return PromotionReview {
            entity_id: entity_id.to_string(),
            status: PromotionStatus::Unknown,
            consumers: 0,
            days_since_reference: None,
            reason: "entity is not registered".to_string(),
        };
    };
    let consumers = distinct_consumers(&ie.entity, snapshot);
    let days = reference_date(&ie.entity).map(|d| (now - d).num_days());

    let (status, reason) = if consumers >= PROMOTION_MIN_CONSUMERS {
        (
            PromotionStatus::PromotionCandidate,
            format!("{consumers} consumers adopted it; consider promoting to a shared pattern"),
        )
    } else if consumers > 0 {
        (
            PromotionStatus::Monitoring,
            format!("{consumers} consumer(s) so far; keep monitoring adoption"),
        )
    } else {
        match days {
            Some(d) if d > DEPRECATION_AFTER_DAYS => (
                PromotionStatus::DeprecationReview,
                format!("no consumers after {d} days; review for deprecation"),
            ),
            _ => (
                PromotionStatus::Monitoring,
                "no consumers yet; still inside the review window".to_string(),
            ),
        }
    };

    PromotionReview {
        entity_id: ie.entity.id.clone(),
        status,
        consumers,
        days_since_reference: days,
        reason,
    }
}

/// Review every entity that carries a create justification.
pub fn review_create_decisions(snapshot: &RegistrySnapshot, now: DateTime<Utc>) -> CreateDecisionReview {
    let mut review = CreateDecisionReview::default();
    for ie in snapshot
        .entities()
        .filter(|ie| ie.entity.create_justification.is_some())
    {
        let entry = promotion_status(snapshot, &ie.entity.id, now);
        match entry.status {
            PromotionStatus::PromotionCandidate => review.promotion_candidates += 1,
            PromotionStatus::DeprecationReview => review.deprecation_review += 1,
            PromotionStatus::Monitoring | PromotionStatus::Unknown => review.monitoring += 1,
        }
        review.entries.push(entry);
    }
    review.reviewed = review.entries.len();
    review
}
