use chrono::{DateTime, Utc};

use crate::collections::Category;

const SIMILARITY_WEIGHT: f32 = 0.45;
const TIER_WEIGHT: f32 = 0.20;
const FRESHNESS_WEIGHT: f32 = 0.15;
const CONFLICT_WEIGHT: f32 = 0.10;
const CATEGORY_WEIGHT: f32 = 0.10;

const FRESHNESS_HALF_LIFE_DAYS: f32 = 30.0;

pub fn category_boost(category: Category) -> f32 {
    match category {
        Category::Decision => 1.0,
        Category::Thread => 0.8,
        Category::Priming => 0.6,
        Category::Pattern => 0.4,
        Category::Conversation => 0.2,
        Category::Message => 0.0,
    }
}

/// `freshness(ts) = exp(-ln2 * age_days / 30)`, clamped to [0,1]. A missing
/// timestamp scores neutral (0.5); a future timestamp scores maximally
/// fresh (1.0).
pub fn freshness(updated_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f32 {
    let Some(updated_at) = updated_at else { return 0.5 };
    let age_days = (now - updated_at).num_seconds() as f32 / 86_400.0;
    if age_days <= 0.0 {
        return 1.0;
    }
    (-std::f32::consts::LN_2 * age_days / FRESHNESS_HALF_LIFE_DAYS).exp().clamp(0.0, 1.0)
}

pub struct AttentionInputs {
    pub similarity: f32,
    pub epistemic_tier: Option<f32>,
    pub updated_at: Option<DateTime<Utc>>,
    pub has_conflicts: bool,
    pub category: Category,
}

/// The recall heart's scoring formula (spec §4.13).
pub fn attention(inputs: &AttentionInputs, now: DateTime<Utc>) -> f32 {
    let tier = inputs.epistemic_tier.unwrap_or(0.5);
    let conflict_term = if inputs.has_conflicts { 1.0 } else { 0.0 };

    let score = SIMILARITY_WEIGHT * inputs.similarity
        + TIER_WEIGHT * tier
        + FRESHNESS_WEIGHT * freshness(inputs.updated_at, now)
        + CONFLICT_WEIGHT * conflict_term
        + CATEGORY_WEIGHT * category_boost(inputs.category);

    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_signals_maxed_yields_one() {
        let now = Utc::now();
        let inputs = AttentionInputs {
            similarity: 1.0,
            epistemic_tier: Some(1.0),
            updated_at: Some(now),
            has_conflicts: true,
            category: Category::Decision,
        };
        assert!((attention(&inputs, now) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn all_signals_zeroed_yields_zero() {
        let now = Utc::now();
        let inputs = AttentionInputs {
            similarity: 0.0,
            epistemic_tier: Some(0.0),
            updated_at: Some(now - chrono::Duration::days(3650)),
            has_conflicts: false,
            category: Category::Message,
        };
        assert!(attention(&inputs, now) < 1e-3);
    }

    #[test]
    fn missing_timestamp_is_neutral_freshness() {
        assert!((freshness(None, Utc::now()) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn future_timestamp_is_maximally_fresh() {
        let now = Utc::now();
        assert_eq!(freshness(Some(now + chrono::Duration::days(1)), now), 1.0);
    }
}
