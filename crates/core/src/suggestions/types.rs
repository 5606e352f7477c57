//! Result types for the suggestion engine.

use serde::{Deserialize, Serialize};

/// How a smart-apply group's combined ratio was resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatioSource {
    /// Mean of the group's concatenated ratio histories.
    RatioHistory,
    /// Mean of usable stored average ratios.
    AverageRatio,
    /// Mean of ratios recovered from raw historical order records.
    OrderHistory,
    /// Raw first-observation quantity / order quantity fields.
    FirstObservation,
    /// No usable data anywhere; assumed one piece per ordered unit.
    OneToOneFallback,
}

impl RatioSource {
    pub fn description(&self) -> &'static str {
        match self {
            Self::RatioHistory => "learned ratio history",
            Self::AverageRatio => "stored average ratios",
            Self::OrderHistory => "historical order records",
            Self::FirstObservation => "first-observation quantities",
            Self::OneToOneFallback => "1:1 fallback (no learned data)",
        }
    }
}

/// Component breakdown behind a confidence total.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceScore {
    /// 0-100 aggregate, capped at 100.
    pub total: f64,
    pub frequency: f64,
    pub recency: f64,
    pub context: f64,
    /// Human-readable breakdown for UI tooltips.
    pub breakdown: String,
}

impl ConfidenceScore {
    pub fn zero() -> Self {
        Self {
            total: 0.0,
            frequency: 0.0,
            recency: 0.0,
            context: 0.0,
            breakdown: "no data".to_string(),
        }
    }
}

/// Predicted cut quantity with uncertainty bounds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuantityPrediction {
    pub predicted: i64,
    pub min: i64,
    pub max: i64,
    /// Relative uncertainty applied to the bounds (0.05 - 0.20).
    pub uncertainty: f64,
}

/// Aggregated product-level suggestion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductSuggestion {
    pub product_name: String,
    /// Mean stored confidence across the product's patterns.
    pub confidence: f64,
    /// Summed observation count across the product's patterns.
    pub frequency: u64,
    pub pattern_count: usize,
}

/// Size recorded for a product, scored like a product suggestion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SizeSuggestion {
    pub size: String,
    pub confidence: f64,
    pub frequency: u64,
}

/// A similar profile surfaced next to a suggestion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProfileAlternative {
    pub profile: String,
    pub measurement: String,
    pub similarity: f64,
}

/// Per-pattern profile suggestion for a `(product, size)` context.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProfileSuggestion {
    pub profile: String,
    pub measurement: String,
    pub ratio: f64,
    pub frequency: u32,
    pub confidence: ConfidenceScore,
    /// Present when the caller supplied a target order quantity.
    pub prediction: Option<QuantityPrediction>,
    pub alternatives: Vec<ProfileAlternative>,
}

/// One profile of a recommended combination.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CombinationProfile {
    pub profile: String,
    pub measurement: String,
    pub ratio: f64,
    pub confidence: f64,
}

/// A recommended set of profiles for a context.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CombinationSuggestion {
    pub profiles: Vec<CombinationProfile>,
    pub confidence: f64,
}

/// One profile/measurement group resolved by smart apply.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SmartApplyProfile {
    pub profile: String,
    pub measurement: String,
    pub predicted_quantity: i64,
    pub combined_ratio: f64,
    pub confidence: f64,
    pub source: RatioSource,
    /// Stored pattern rows that backed this group.
    pub pattern_count: usize,
}

/// Result of the one-click quantity resolution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SmartApplyResult {
    /// Groups in original creation order; never re-sorted.
    pub profiles: Vec<SmartApplyProfile>,
    pub confidence: f64,
    pub reasoning: String,
}

impl SmartApplyResult {
    pub fn empty(reasoning: impl Into<String>) -> Self {
        Self { profiles: Vec::new(), confidence: 0.0, reasoning: reasoning.into() }
    }
}

/// Outcome of a learning call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum LearnOutcome {
    /// Observation was folded into the store.
    Learned { pattern_key: String, created: bool },
    /// Observation was malformed and silently dropped.
    Rejected { reason: String },
}

/// Query-side context used for context-match scoring.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContextQuery {
    pub product: String,
    pub size: String,
    pub color: Option<String>,
    pub version: Option<String>,
}

impl ContextQuery {
    pub fn new(product: impl Into<String>, size: impl Into<String>) -> Self {
        Self { product: product.into(), size: size.into(), color: None, version: None }
    }
}
