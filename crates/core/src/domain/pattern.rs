//! Learned cutting-pattern records.
//!
//! A [`Pattern`] associates one normalized (product, size, profile,
//! measurement) tuple with the ratio of cut pieces to order quantity observed
//! in real user decisions. The first observation is frozen into
//! `quantity`/`order_quantity`/`ratio` for provenance; everything learned
//! afterwards flows into `ratio_history` and the running averages.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::keys;

/// Confidence seeded into a freshly created pattern.
pub const SEED_CONFIDENCE: f64 = 50.0;

/// One observed (order quantity, cut pieces) sample.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RatioSample {
    pub order_qty: f64,
    pub profile_qty: f64,
    pub ratio: f64,
}

impl RatioSample {
    pub fn new(order_qty: f64, profile_qty: f64) -> Self {
        Self { order_qty, profile_qty, ratio: profile_qty / order_qty }
    }
}

/// Typed metadata bag attached to a pattern.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternMetadata {
    /// Position this profile held within its parent item when first seen,
    /// used to keep display ordering stable later.
    pub original_index: Option<u32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A learned association, uniquely identified by `pattern_key`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    /// Normalized `product|size`.
    pub context_key: String,
    /// Normalized `product|size|profile|measurement`; globally unique.
    pub pattern_key: String,
    pub product_name: String,
    pub size: String,
    pub profile: String,
    pub measurement: String,
    /// Cut pieces of the first observation. Immutable after creation.
    pub quantity: f64,
    /// Order size of the first observation. Immutable after creation.
    pub order_quantity: f64,
    /// `quantity / order_quantity` at creation time.
    pub ratio: f64,
    /// Number of observations; only ever increases.
    pub frequency: u32,
    /// 0-100 slowly-evolving score, seeded at [`SEED_CONFIDENCE`].
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    pub average_quantity: f64,
    pub average_ratio: f64,
    /// Context keys this pattern has appeared under.
    pub contexts: BTreeSet<String>,
    /// Measurement spellings seen for this profile.
    pub variations: BTreeSet<String>,
    /// Append-only observation log; authoritative for `average_ratio`.
    pub ratio_history: Vec<RatioSample>,
    pub metadata: PatternMetadata,
}

impl Pattern {
    /// Build the pattern for a never-seen key from its first observation.
    ///
    /// Callers must have validated `quantity > 0` and `order_quantity > 0`.
    pub fn first_observation(input: &LearnInput, now: DateTime<Utc>) -> Self {
        let product_name = keys::normalize(&input.product);
        let size = keys::normalize(&input.size);
        let profile = keys::normalize_profile(&input.profile);
        let measurement = keys::normalize_measurement(&input.measurement);
        let context_key = keys::context_key(&input.product, &input.size);
        let pattern_key =
            keys::pattern_key(&input.product, &input.size, &input.profile, &input.measurement);
        let sample = RatioSample::new(input.order_quantity, input.quantity);

        Self {
            context_key: context_key.clone(),
            pattern_key,
            product_name,
            size,
            profile,
            measurement,
            quantity: input.quantity,
            order_quantity: input.order_quantity,
            ratio: sample.ratio,
            frequency: 1,
            confidence: SEED_CONFIDENCE,
            created_at: now,
            last_used: now,
            average_quantity: input.quantity,
            average_ratio: sample.ratio,
            contexts: BTreeSet::from([context_key]),
            variations: BTreeSet::from([keys::normalize(&input.measurement)]),
            ratio_history: vec![sample],
            metadata: PatternMetadata { original_index: input.original_index, extra: BTreeMap::new() },
        }
    }

    /// Fold a repeat observation into a partial update.
    ///
    /// Leaves the first-observation fields alone; only frequency, the ratio
    /// history, the running averages, `last_used`, and the context/variation
    /// sets move.
    pub fn observe(&self, input: &LearnInput, now: DateTime<Utc>) -> PatternUpdate {
        let sample = RatioSample::new(input.order_quantity, input.quantity);

        let mut history = self.ratio_history.clone();
        history.push(sample);
        let average_ratio = mean(history.iter().map(|s| s.ratio));
        let average_quantity = mean(history.iter().map(|s| s.profile_qty));

        let mut contexts = self.contexts.clone();
        contexts.insert(keys::context_key(&input.product, &input.size));
        let mut variations = self.variations.clone();
        variations.insert(keys::normalize(&input.measurement));

        PatternUpdate {
            frequency: Some(self.frequency + 1),
            last_used: Some(now),
            average_quantity: Some(average_quantity),
            average_ratio: Some(average_ratio),
            ratio_history: Some(history),
            contexts: Some(contexts),
            variations: Some(variations),
            ..PatternUpdate::default()
        }
    }
}

/// One user decision to learn from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LearnInput {
    pub product: String,
    pub size: String,
    pub profile: String,
    pub measurement: String,
    /// Pieces the user chose to cut.
    pub quantity: f64,
    /// Size of the order the cut belonged to.
    pub order_quantity: f64,
    /// Position of this profile within its parent item, if known.
    pub original_index: Option<u32>,
}

/// Partial update consumed by `PatternStore::update`.
///
/// First-observation fields are deliberately absent; nothing after creation
/// may rewrite them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternUpdate {
    pub frequency: Option<u32>,
    pub confidence: Option<f64>,
    pub last_used: Option<DateTime<Utc>>,
    pub average_quantity: Option<f64>,
    pub average_ratio: Option<f64>,
    pub ratio_history: Option<Vec<RatioSample>>,
    pub contexts: Option<BTreeSet<String>>,
    pub variations: Option<BTreeSet<String>>,
}

impl PatternUpdate {
    pub fn apply_to(&self, pattern: &mut Pattern) {
        if let Some(frequency) = self.frequency {
            pattern.frequency = frequency;
        }
        if let Some(confidence) = self.confidence {
            pattern.confidence = confidence;
        }
        if let Some(last_used) = self.last_used {
            pattern.last_used = last_used;
        }
        if let Some(average_quantity) = self.average_quantity {
            pattern.average_quantity = average_quantity;
        }
        if let Some(average_ratio) = self.average_ratio {
            pattern.average_ratio = average_ratio;
        }
        if let Some(history) = &self.ratio_history {
            pattern.ratio_history = history.clone();
        }
        if let Some(contexts) = &self.contexts {
            pattern.contexts = contexts.clone();
        }
        if let Some(variations) = &self.variations {
            pattern.variations = variations.clone();
        }
    }
}

/// Confidence band used in store statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 70.0 {
            Self::High
        } else if confidence >= 40.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// Aggregate counts reported by `PatternStore::statistics`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternStatistics {
    pub total: u64,
    pub high_confidence: u64,
    pub medium_confidence: u64,
    pub low_confidence: u64,
    pub average_confidence: f64,
}

pub(crate) fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for value in values {
        sum += value;
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> LearnInput {
        LearnInput {
            product: "Door".to_string(),
            size: "100x200".to_string(),
            profile: "Frame".to_string(),
            measurement: "990mm".to_string(),
            quantity: 4.0,
            order_quantity: 2.0,
            original_index: Some(0),
        }
    }

    #[test]
    fn first_observation_seeds_all_running_fields() {
        let now = Utc::now();
        let pattern = Pattern::first_observation(&input(), now);

        assert_eq!(pattern.pattern_key, "DOOR|100X200|FRAME|990");
        assert_eq!(pattern.context_key, "DOOR|100X200");
        assert_eq!(pattern.frequency, 1);
        assert_eq!(pattern.confidence, SEED_CONFIDENCE);
        assert_eq!(pattern.ratio, 2.0);
        assert_eq!(pattern.average_ratio, 2.0);
        assert_eq!(pattern.average_quantity, 4.0);
        assert_eq!(pattern.ratio_history.len(), 1);
        assert_eq!(pattern.metadata.original_index, Some(0));
        assert!(pattern.contexts.contains("DOOR|100X200"));
        assert!(pattern.variations.contains("990MM"));
    }

    #[test]
    fn observe_recomputes_averages_without_touching_first_observation() {
        let now = Utc::now();
        let pattern = Pattern::first_observation(&input(), now);

        let mut second = input();
        second.quantity = 6.0;
        second.order_quantity = 2.0;

        let update = pattern.observe(&second, now);
        assert_eq!(update.frequency, Some(2));
        let history = update.ratio_history.as_ref().unwrap();
        assert_eq!(history.len(), 2);
        // mean of 2.0 and 3.0
        assert!((update.average_ratio.unwrap() - 2.5).abs() < 1e-9);
        assert!((update.average_quantity.unwrap() - 5.0).abs() < 1e-9);
        assert!(update.confidence.is_none());

        let mut updated = pattern.clone();
        update.apply_to(&mut updated);
        assert_eq!(updated.quantity, 4.0);
        assert_eq!(updated.order_quantity, 2.0);
        assert_eq!(updated.ratio, 2.0);
        assert_eq!(updated.frequency, 2);
    }

    #[test]
    fn confidence_bands_split_at_40_and_70() {
        assert_eq!(ConfidenceBand::from_confidence(85.0), ConfidenceBand::High);
        assert_eq!(ConfidenceBand::from_confidence(70.0), ConfidenceBand::High);
        assert_eq!(ConfidenceBand::from_confidence(55.0), ConfidenceBand::Medium);
        assert_eq!(ConfidenceBand::from_confidence(12.0), ConfidenceBand::Low);
    }
}
