//! Scoring algorithms behind pattern confidence and quantity prediction.
//!
//! Everything here is pure: no I/O, no clocks. Callers pass `now` explicitly
//! so recency scoring stays deterministic under test.

use chrono::{DateTime, Utc};

use super::types::{ConfidenceScore, ContextQuery, QuantityPrediction};
use crate::domain::pattern::Pattern;
use crate::keys;

/// Weights for the three confidence components, out of 100 combined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    /// Frequency component (default 40).
    pub frequency: f64,
    /// Recency component (default 30).
    pub recency: f64,
    /// Context-match component (default 30).
    pub context: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        super::DEFAULT_WEIGHTS
    }
}

/// Exact-match weight of the product part within a stored context.
const CONTEXT_PRODUCT_WEIGHT: f64 = 0.4;
/// Exact-match weight of the size part within a stored context.
const CONTEXT_SIZE_WEIGHT: f64 = 0.3;
/// Partial credit granted when a color/version is supplied. Presence-only;
/// these fields are not matched against stored contexts.
const CONTEXT_EXTRA_WEIGHT: f64 = 0.15 * 0.5;

/// Uncertainty applied to predictions at confidence 0.
const MAX_UNCERTAINTY: f64 = 0.20;
/// Uncertainty applied to predictions at confidence 100.
const MIN_UNCERTAINTY: f64 = 0.05;

/// Score calculator for learned cutting patterns.
#[derive(Debug, Clone)]
pub struct ScoreCalculator {
    weights: ScoringWeights,
    half_life_days: f64,
}

impl ScoreCalculator {
    pub fn new() -> Self {
        Self { weights: ScoringWeights::default(), half_life_days: super::RECENCY_HALF_LIFE_DAYS }
    }

    pub fn with_weights(weights: ScoringWeights, half_life_days: f64) -> Self {
        Self { weights, half_life_days }
    }

    /// `weight * freq / max_freq`, zero when either count is non-positive.
    pub fn frequency_score(&self, frequency: u32, max_frequency: u32) -> f64 {
        if frequency == 0 || max_frequency == 0 {
            return 0.0;
        }
        round2(self.weights.frequency * f64::from(frequency) / f64::from(max_frequency))
    }

    /// Half-life decay: full weight today, half after `half_life_days`.
    pub fn recency_score(&self, last_used: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let days_since = (now - last_used).num_seconds().max(0) as f64 / 86_400.0;
        round2(self.weights.recency * 0.5_f64.powf(days_since / self.half_life_days))
    }

    /// Best partial match between the query context and any stored context.
    ///
    /// Stored contexts are `product|size[|...]` strings written by the
    /// normalizer, so comparison normalizes the query side only.
    pub fn context_score(&self, pattern: &Pattern, query: &ContextQuery) -> f64 {
        let product = keys::normalize(&query.product);
        let size = keys::normalize(&query.size);

        let mut best = 0.0_f64;
        for stored in &pattern.contexts {
            let mut parts = stored.split('|');
            let stored_product = parts.next().unwrap_or_default();
            let stored_size = parts.next().unwrap_or_default();

            let mut fraction = 0.0;
            if !product.is_empty() && stored_product == product {
                fraction += CONTEXT_PRODUCT_WEIGHT;
            }
            if !size.is_empty() && stored_size == size {
                fraction += CONTEXT_SIZE_WEIGHT;
            }
            if query.color.is_some() {
                fraction += CONTEXT_EXTRA_WEIGHT;
            }
            if query.version.is_some() {
                fraction += CONTEXT_EXTRA_WEIGHT;
            }
            best = best.max(fraction);
        }

        round2(self.weights.context * best)
    }

    /// Aggregate 0-100 confidence with a per-component breakdown.
    pub fn confidence(
        &self,
        pattern: &Pattern,
        max_frequency: u32,
        query: &ContextQuery,
        now: DateTime<Utc>,
    ) -> ConfidenceScore {
        let frequency = self.frequency_score(pattern.frequency, max_frequency);
        let recency = self.recency_score(pattern.last_used, now);
        let context = self.context_score(pattern, query);
        let total = round2((frequency + recency + context).min(100.0));

        let breakdown = format!(
            "frequency {frequency:.2}/{:.0} + recency {recency:.2}/{:.0} + context {context:.2}/{:.0}",
            self.weights.frequency, self.weights.recency, self.weights.context,
        );

        ConfidenceScore { total, frequency, recency, context, breakdown }
    }

    /// Predict the cut quantity for an order, with confidence-scaled bounds.
    pub fn predict_quantity(
        &self,
        order_quantity: f64,
        ratio: f64,
        confidence: f64,
    ) -> QuantityPrediction {
        let predicted = (order_quantity * ratio).round() as i64;
        let uncertainty =
            MAX_UNCERTAINTY - (MAX_UNCERTAINTY - MIN_UNCERTAINTY) * (confidence.clamp(0.0, 100.0) / 100.0);
        let min = ((predicted as f64 * (1.0 - uncertainty)).floor() as i64).max(1);
        let max = (predicted as f64 * (1.0 + uncertainty)).ceil() as i64;
        QuantityPrediction { predicted, min, max, uncertainty }
    }

    /// Normalized Levenshtein similarity over uppercased, trimmed inputs.
    pub fn similarity(&self, a: &str, b: &str) -> f64 {
        strsim::normalized_levenshtein(
            a.trim().to_uppercase().as_str(),
            b.trim().to_uppercase().as_str(),
        )
    }

    /// Profile-match heuristic for smart-apply representative selection:
    /// exact normalized match 100, substring either direction 50, else 0.
    pub fn profile_match_score(&self, candidate: &str, requested: &str) -> u32 {
        let candidate = keys::normalize_profile(candidate);
        let requested = keys::normalize_profile(requested);
        if candidate.is_empty() || requested.is_empty() {
            0
        } else if candidate == requested {
            100
        } else if candidate.contains(&requested) || requested.contains(&candidate) {
            50
        } else {
            0
        }
    }

    /// Usability filter for stored average ratios in the smart-apply
    /// fallback chain. Exactly 1.0 is excluded: legacy rows wrote 1.0 as a
    /// placeholder, so a stored 1.0 cannot be told apart from a learned 1:1
    /// ratio and is resolved through the later steps instead.
    pub fn is_usable_average_ratio(&self, ratio: f64) -> bool {
        ratio.is_finite() && ratio > 0.0 && ratio != 1.0
    }
}

impl Default for ScoreCalculator {
    fn default() -> Self {
        Self::new()
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
