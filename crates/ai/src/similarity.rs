//! Similarity scoring between coin profiles.
//!
//! Scoring is a pluggable [`SimilarityStrategy`]. Callers rely on three
//! properties only: scores lie in `[0, 1]`, the same inputs always give the
//! same ranking, and a ranking never lists a symbol twice.

use std::collections::HashSet;

use cryptoinsight_market_data::MarketSnapshot;
use serde::Serialize;

use crate::catalog::{CoinProfile, MAX_TIER, MIN_TIER};

pub trait SimilarityStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Raw score in `[0, 1]`, 1 for identical profiles.
    fn score(&self, a: &CoinProfile, b: &CoinProfile) -> f64;
}

/// Weighted overlap of categorical features.
///
/// Same category, nearby market-cap tier, shared technology tags and
/// related ecosystems each contribute their weight. An unlisted profile never
/// matches on category.
#[derive(Clone, Debug)]
pub struct WeightedFeatureSimilarity {
    pub category: f64,
    pub tier: f64,
    pub tags: f64,
    pub related: f64,
}

impl Default for WeightedFeatureSimilarity {
    fn default() -> Self {
        Self {
            category: 0.4,
            tier: 0.3,
            tags: 0.2,
            related: 0.1,
        }
    }
}

impl SimilarityStrategy for WeightedFeatureSimilarity {
    fn name(&self) -> &'static str {
        "weighted-features"
    }

    fn score(&self, a: &CoinProfile, b: &CoinProfile) -> f64 {
        let same_category = a.is_listed() && a.category == b.category;
        let related = same_category || a.category.is_related(&b.category);

        let tier_span = f64::from(MAX_TIER - MIN_TIER);
        let tier_gap = f64::from(a.market_cap_tier.abs_diff(b.market_cap_tier));
        let tier_closeness = 1.0 - (tier_gap / tier_span).min(1.0);

        let mut score = self.tier * tier_closeness + self.tags * jaccard(a.tags, b.tags);
        if same_category {
            score += self.category;
        }
        if related {
            score += self.related;
        }
        score.clamp(0.0, 1.0)
    }
}

fn jaccard(a: &[&str], b: &[&str]) -> f64 {
    let a: HashSet<&str> = a.iter().copied().collect();
    let b: HashSet<&str> = b.iter().copied().collect();
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

/// Reported score, rounded to two decimals.
pub fn rounded_score(strategy: &dyn SimilarityStrategy, a: &CoinProfile, b: &CoinProfile) -> f64 {
    (strategy.score(a, b) * 100.0).round() / 100.0
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Relationship {
    #[serde(rename = "Same Category")]
    SameCategory,
    #[serde(rename = "Related Category")]
    RelatedCategory,
    #[serde(rename = "Different Categories")]
    DifferentCategories,
}

impl Relationship {
    pub fn between(a: &CoinProfile, b: &CoinProfile) -> Relationship {
        if a.category == b.category {
            Relationship::SameCategory
        } else if a.category.is_related(&b.category) {
            Relationship::RelatedCategory
        } else {
            Relationship::DifferentCategories
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SimilarCoin {
    pub symbol: String,
    pub name: String,
    pub similarity_score: f64,
    pub category: &'static str,
    pub relationship: Relationship,
    pub risk_level: &'static str,
    pub investment_type: &'static str,
    pub match_reasons: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_data: Option<MarketSnapshot>,
}

/// Top `limit` candidates most similar to `target`.
///
/// Ordered by decreasing score, ties broken by symbol. The target itself
/// and repeated candidates are skipped.
pub fn rank(
    strategy: &dyn SimilarityStrategy,
    target: &CoinProfile,
    candidates: impl IntoIterator<Item = CoinProfile>,
    limit: usize,
) -> Vec<SimilarCoin> {
    let mut seen = HashSet::new();
    let mut scored: Vec<(f64, CoinProfile)> = candidates
        .into_iter()
        .filter(|c| c.symbol != target.symbol && seen.insert(c.symbol.clone()))
        .map(|c| (rounded_score(strategy, target, &c), c))
        .collect();

    scored.sort_by(|(sa, a), (sb, b)| sb.total_cmp(sa).then_with(|| a.symbol.cmp(&b.symbol)));

    scored
        .into_iter()
        .take(limit)
        .map(|(score, candidate)| SimilarCoin {
            match_reasons: match_reasons(target, &candidate),
            relationship: Relationship::between(target, &candidate),
            symbol: candidate.symbol,
            name: candidate.name,
            similarity_score: score,
            category: candidate.category.label(),
            risk_level: candidate.risk_level,
            investment_type: candidate.investment_type,
            market_data: None,
        })
        .collect()
}

fn match_reasons(target: &CoinProfile, candidate: &CoinProfile) -> Vec<String> {
    let mut reasons = Vec::new();
    if target.category == candidate.category {
        reasons.push(format!("Same category: {}", target.category.label()));
    } else if target.category.is_related(&candidate.category) {
        reasons.push(format!(
            "Related ecosystem: {} and {}",
            target.category.label(),
            candidate.category.label()
        ));
    }

    let shared: Vec<&str> = target
        .tags
        .iter()
        .filter(|t| candidate.tags.contains(t))
        .copied()
        .collect();
    if !shared.is_empty() {
        reasons.push(format!("Shared technology: {}", shared.join(", ")));
    }

    if target.market_cap_tier == candidate.market_cap_tier {
        reasons.push("Similar market capitalization".to_string());
    }
    if target.risk_level == candidate.risk_level {
        reasons.push(format!("Comparable risk profile ({})", candidate.risk_level));
    }
    reasons
}
