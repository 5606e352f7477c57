//! Suggestion orchestrator: query, learn, and smart-apply operations.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;

use super::scoring::ScoreCalculator;
use super::types::*;
use super::{SuggestionResult, SUGGESTION_CACHE_TAG};
use crate::config::EngineConfig;
use crate::domain::pattern::{mean, LearnInput, Pattern, PatternStatistics, PatternUpdate, RatioSample};
use crate::keys;
use crate::store::{OrderHistory, PatternStore, SuggestionCache};

/// The suggestion engine.
///
/// Owns no persistence: the pattern store, order-history collaborator, and
/// result cache are injected by the caller, one instance per process or per
/// test. Query operations degrade to empty results on store failure so a
/// broken suggestion path can never block order entry; only learning and
/// maintenance propagate store errors.
pub struct SuggestionEngine {
    store: Arc<dyn PatternStore>,
    history: Arc<dyn OrderHistory>,
    cache: Arc<dyn SuggestionCache>,
    calculator: ScoreCalculator,
    config: EngineConfig,
}

impl SuggestionEngine {
    pub fn new(
        store: Arc<dyn PatternStore>,
        history: Arc<dyn OrderHistory>,
        cache: Arc<dyn SuggestionCache>,
    ) -> Self {
        Self::with_config(store, history, cache, EngineConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn PatternStore>,
        history: Arc<dyn OrderHistory>,
        cache: Arc<dyn SuggestionCache>,
        config: EngineConfig,
    ) -> Self {
        let weights = super::ScoringWeights {
            frequency: config.frequency_weight,
            recency: config.recency_weight,
            context: config.context_weight,
        };
        let calculator = ScoreCalculator::with_weights(weights, config.recency_half_life_days);
        Self { store, history, cache, calculator, config }
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Products whose patterns match a substring query, ranked by mean stored
    /// confidence and summed frequency.
    pub async fn product_suggestions(&self, query: &str, limit: usize) -> Vec<ProductSuggestion> {
        let patterns = match self.store.search_by_product(query).await {
            Ok(patterns) => patterns,
            Err(error) => {
                tracing::warn!(%error, query, "product suggestion lookup failed");
                return Vec::new();
            }
        };

        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<Pattern>> = HashMap::new();
        for pattern in patterns {
            if !groups.contains_key(&pattern.product_name) {
                order.push(pattern.product_name.clone());
            }
            groups.entry(pattern.product_name.clone()).or_default().push(pattern);
        }

        let mut suggestions: Vec<ProductSuggestion> = order
            .into_iter()
            .map(|product_name| {
                let group = &groups[&product_name];
                ProductSuggestion {
                    product_name,
                    confidence: round2(mean(group.iter().map(|p| p.confidence))),
                    frequency: group.iter().map(|p| u64::from(p.frequency)).sum(),
                    pattern_count: group.len(),
                }
            })
            .collect();

        sort_by_confidence_then_frequency(&mut suggestions, |s| (s.confidence, s.frequency));
        suggestions.truncate(limit);
        suggestions
    }

    /// Distinct sizes recorded for a product, optionally filtered, scored
    /// like product suggestions.
    pub async fn size_suggestions(
        &self,
        product: &str,
        query: Option<&str>,
        limit: usize,
    ) -> Vec<SizeSuggestion> {
        let sizes = match self.store.unique_sizes_for_product(product).await {
            Ok(sizes) => sizes,
            Err(error) => {
                tracing::warn!(%error, product, "size suggestion lookup failed");
                return Vec::new();
            }
        };
        let filter = query.map(keys::normalize);

        let mut suggestions = Vec::new();
        for size in sizes {
            if let Some(filter) = &filter {
                if !keys::normalize(&size).contains(filter.as_str()) {
                    continue;
                }
            }
            let patterns = match self.store.find_by_context_key(&keys::context_key(product, &size)).await
            {
                Ok(patterns) => patterns,
                Err(error) => {
                    tracing::warn!(%error, product, %size, "size pattern lookup failed");
                    return Vec::new();
                }
            };
            if patterns.is_empty() {
                continue;
            }
            suggestions.push(SizeSuggestion {
                size,
                confidence: round2(mean(patterns.iter().map(|p| p.confidence))),
                frequency: patterns.iter().map(|p| u64::from(p.frequency)).sum(),
            });
        }

        sort_by_confidence_then_frequency(&mut suggestions, |s| (s.confidence, s.frequency));
        suggestions.truncate(limit);
        suggestions
    }

    /// Per-pattern profile suggestions for a `(product, size)` context, with
    /// scoring-engine confidence, optional quantity prediction, and up to
    /// three similarity-based alternatives each.
    pub async fn profile_suggestions(
        &self,
        product: &str,
        size: &str,
        query: Option<&str>,
        order_quantity: Option<f64>,
        limit: usize,
    ) -> Vec<ProfileSuggestion> {
        let context_key = keys::context_key(product, size);
        let mut patterns = match self.store.find_by_context_key(&context_key).await {
            Ok(patterns) => patterns,
            Err(error) => {
                tracing::warn!(%error, %context_key, "profile suggestion lookup failed");
                return Vec::new();
            }
        };

        if let Some(query) = query {
            let filter = keys::normalize_profile(query);
            patterns.retain(|p| p.profile.contains(filter.as_str()));
        }

        // Same guard as smart apply: a non-positive quantity has nothing to scale.
        let order_quantity =
            order_quantity.filter(|qty| *qty > 0.0 && qty.is_finite());

        let max_frequency = patterns.iter().map(|p| p.frequency).max().unwrap_or(0);
        let context = ContextQuery::new(product, size);
        let now = Utc::now();

        let mut suggestions: Vec<ProfileSuggestion> = patterns
            .iter()
            .map(|pattern| {
                let confidence = self.calculator.confidence(pattern, max_frequency, &context, now);
                let ratio = effective_ratio(pattern);
                let prediction = order_quantity
                    .map(|qty| self.calculator.predict_quantity(qty, ratio, confidence.total));
                let alternatives = self.alternatives_for(pattern, &patterns);

                ProfileSuggestion {
                    profile: pattern.profile.clone(),
                    measurement: pattern.measurement.clone(),
                    ratio,
                    frequency: pattern.frequency,
                    confidence,
                    prediction,
                    alternatives,
                }
            })
            .collect();

        sort_by_confidence_then_frequency(&mut suggestions, |s| {
            (s.confidence.total, u64::from(s.frequency))
        });
        suggestions.truncate(limit);
        suggestions
    }

    /// One recommended set of profiles for a context: groups ranked by mean
    /// confidence, one representative measurement/ratio per profile.
    pub async fn combination_suggestions(
        &self,
        product: &str,
        size: &str,
        limit: usize,
    ) -> CombinationSuggestion {
        let context_key = keys::context_key(product, size);
        let patterns = match self.store.find_by_context_key(&context_key).await {
            Ok(patterns) => patterns,
            Err(error) => {
                tracing::warn!(%error, %context_key, "combination suggestion lookup failed");
                return CombinationSuggestion { profiles: Vec::new(), confidence: 0.0 };
            }
        };

        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<&Pattern>> = HashMap::new();
        for pattern in &patterns {
            if !groups.contains_key(&pattern.profile) {
                order.push(pattern.profile.clone());
            }
            groups.entry(pattern.profile.clone()).or_default().push(pattern);
        }

        let mut ranked: Vec<(String, f64)> = order
            .into_iter()
            .map(|profile| {
                let confidence = mean(groups[&profile].iter().map(|p| p.confidence));
                (profile, confidence)
            })
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(limit);

        let profiles: Vec<CombinationProfile> = ranked
            .iter()
            .map(|(profile, confidence)| {
                let group = &groups[profile];
                let representative = group
                    .iter()
                    .copied()
                    .max_by(|a, b| {
                        a.frequency.cmp(&b.frequency).then_with(|| {
                            a.confidence
                                .partial_cmp(&b.confidence)
                                .unwrap_or(std::cmp::Ordering::Equal)
                        })
                    })
                    .unwrap_or(group[0]);
                CombinationProfile {
                    profile: profile.clone(),
                    measurement: representative.measurement.clone(),
                    ratio: effective_ratio(representative),
                    confidence: round2(*confidence),
                }
            })
            .collect();

        let confidence = round2(mean(profiles.iter().map(|p| p.confidence)));
        CombinationSuggestion { profiles, confidence }
    }

    /// Pass-through of store statistics.
    pub async fn statistics(&self) -> SuggestionResult<PatternStatistics> {
        Ok(self.store.statistics().await?)
    }

    // -------------------------------------------------------------------------
    // Learning
    // -------------------------------------------------------------------------

    /// Fold one user decision into the store.
    ///
    /// Malformed input (blank fields, non-positive quantities) is logged and
    /// dropped so one bad observation cannot abort a batch. Store failures
    /// propagate: the caller must know persistence did not happen.
    pub async fn learn_from_pattern(&self, input: &LearnInput) -> SuggestionResult<LearnOutcome> {
        if let Some(reason) = validation_failure(input) {
            tracing::warn!(reason, product = %input.product, profile = %input.profile, "learning input rejected");
            return Ok(LearnOutcome::Rejected { reason: reason.to_string() });
        }

        let pattern_key =
            keys::pattern_key(&input.product, &input.size, &input.profile, &input.measurement);
        let now = Utc::now();

        let created = match self.store.find_by_pattern_key(&pattern_key).await? {
            Some(existing) => {
                let update = existing.observe(input, now);
                self.store.update(&pattern_key, update).await?;
                false
            }
            None => {
                self.store.create(Pattern::first_observation(input, now)).await?;
                true
            }
        };

        if let Err(error) = self.cache.invalidate_tag(SUGGESTION_CACHE_TAG).await {
            tracing::warn!(%error, tag = SUGGESTION_CACHE_TAG, "suggestion cache invalidation failed");
        }

        tracing::debug!(%pattern_key, created, "cutting pattern learned");
        Ok(LearnOutcome::Learned { pattern_key, created })
    }

    /// Maintenance sweep removing patterns unused beyond the retention
    /// window and below the frequency floor.
    pub async fn cleanup_stale_patterns(&self) -> SuggestionResult<u64> {
        let removed = self
            .store
            .delete_stale(self.config.retention_days, self.config.frequency_floor)
            .await?;
        tracing::info!(
            removed,
            retention_days = self.config.retention_days,
            frequency_floor = self.config.frequency_floor,
            "stale pattern cleanup finished"
        );
        Ok(removed)
    }

    // -------------------------------------------------------------------------
    // Smart apply
    // -------------------------------------------------------------------------

    /// One-click quantity resolution for a new order.
    ///
    /// Never fails: unexpected errors are logged and reported as an empty
    /// result with zero confidence so the order-entry workflow keeps moving.
    pub async fn apply_smart_suggestion(
        &self,
        product: &str,
        size: &str,
        order_quantity: f64,
        requested_profile: Option<&str>,
    ) -> SmartApplyResult {
        match self.try_smart_apply(product, size, order_quantity, requested_profile).await {
            Ok(result) => result,
            Err(error) => {
                tracing::warn!(%error, product, size, "smart apply failed");
                SmartApplyResult::empty(format!(
                    "suggestion lookup failed ({error}); no quantities applied"
                ))
            }
        }
    }

    async fn try_smart_apply(
        &self,
        product: &str,
        size: &str,
        order_quantity: f64,
        requested_profile: Option<&str>,
    ) -> SuggestionResult<SmartApplyResult> {
        if !(order_quantity > 0.0 && order_quantity.is_finite()) {
            return Ok(SmartApplyResult::empty("order quantity must be positive"));
        }

        let context_key = keys::context_key(product, size);
        let patterns = self.store.find_by_context_key(&context_key).await?;
        if patterns.is_empty() {
            return Ok(SmartApplyResult::empty(format!(
                "no learned patterns for {context_key}"
            )));
        }

        // Group by normalized (profile, measurement): rows created before
        // normalization rules changed can legitimately share the pair.
        // First-seen order is kept so output matches the order profiles were
        // originally observed.
        let mut order: Vec<(String, String)> = Vec::new();
        let mut groups: HashMap<(String, String), Vec<Pattern>> = HashMap::new();
        for pattern in patterns {
            let key = (
                keys::normalize_profile(&pattern.profile),
                keys::normalize_measurement(&pattern.measurement),
            );
            if !groups.contains_key(&key) {
                order.push(key.clone());
            }
            groups.entry(key).or_default().push(pattern);
        }

        let mut profiles = Vec::new();
        let mut total_patterns = 0usize;
        for key in &order {
            let group = &groups[key];
            total_patterns += group.len();

            let representative = self.pick_representative(group, requested_profile);
            let (combined_ratio, source) =
                self.resolve_combined_ratio(group, product, size, representative).await;

            profiles.push(SmartApplyProfile {
                profile: representative.profile.clone(),
                measurement: representative.measurement.clone(),
                predicted_quantity: (order_quantity * combined_ratio).round() as i64,
                combined_ratio,
                confidence: round2(mean(group.iter().map(|p| p.confidence))),
                source,
                pattern_count: group.len(),
            });
        }

        let confidence = round2(mean(profiles.iter().map(|p| p.confidence)));
        let reasoning = smart_apply_reasoning(&profiles, total_patterns);
        Ok(SmartApplyResult { profiles, confidence, reasoning })
    }

    /// Three-level tie-break: requested-profile match, stored confidence,
    /// frequency. Earlier rows win remaining ties.
    fn pick_representative<'a>(
        &self,
        group: &'a [Pattern],
        requested_profile: Option<&str>,
    ) -> &'a Pattern {
        let mut best = &group[0];
        for candidate in &group[1..] {
            if self.outranks(candidate, best, requested_profile) {
                best = candidate;
            }
        }
        best
    }

    fn outranks(&self, candidate: &Pattern, incumbent: &Pattern, requested: Option<&str>) -> bool {
        if let Some(requested) = requested {
            let candidate_match = self.calculator.profile_match_score(&candidate.profile, requested);
            let incumbent_match = self.calculator.profile_match_score(&incumbent.profile, requested);
            if candidate_match != incumbent_match {
                return candidate_match > incumbent_match;
            }
        }
        if candidate.confidence != incumbent.confidence {
            return candidate.confidence > incumbent.confidence;
        }
        candidate.frequency > incumbent.frequency
    }

    /// Multi-step ratio resolution, stopping at the first step with usable
    /// data. A failing order-history collaborator downgrades to the next
    /// step instead of failing the whole operation.
    async fn resolve_combined_ratio(
        &self,
        group: &[Pattern],
        product: &str,
        size: &str,
        representative: &Pattern,
    ) -> (f64, RatioSource) {
        let history_ratios: Vec<f64> =
            group.iter().flat_map(|p| p.ratio_history.iter().map(|s| s.ratio)).collect();
        if !history_ratios.is_empty() {
            return (mean(history_ratios.into_iter()), RatioSource::RatioHistory);
        }

        let averages: Vec<f64> = group
            .iter()
            .map(|p| p.average_ratio)
            .filter(|r| self.calculator.is_usable_average_ratio(*r))
            .collect();
        if !averages.is_empty() {
            return (mean(averages.into_iter()), RatioSource::AverageRatio);
        }

        match self
            .history
            .cut_ratios(product, size, &representative.profile, &representative.measurement)
            .await
        {
            Ok(cuts) => {
                let mut seen = HashSet::new();
                let mut samples: Vec<RatioSample> = Vec::new();
                for cut in cuts {
                    if cut.order_quantity > 0.0
                        && cut.profile_quantity > 0.0
                        && seen.insert(cut.work_order_id.clone())
                    {
                        samples.push(RatioSample::new(cut.order_quantity, cut.profile_quantity));
                    }
                }
                if !samples.is_empty() {
                    let combined = mean(samples.iter().map(|s| s.ratio));
                    // Backfill the recovered history onto the group's first
                    // pattern so the next call resolves at step one.
                    let update = PatternUpdate {
                        ratio_history: Some(samples),
                        average_ratio: Some(combined),
                        ..PatternUpdate::default()
                    };
                    if let Err(error) = self.store.update(&group[0].pattern_key, update).await {
                        tracing::warn!(
                            %error,
                            pattern_key = %group[0].pattern_key,
                            "opportunistic ratio backfill failed"
                        );
                    }
                    return (combined, RatioSource::OrderHistory);
                }
            }
            Err(error) => {
                tracing::warn!(%error, product, size, "order history lookup failed");
            }
        }

        let raw: Vec<f64> = group
            .iter()
            .filter(|p| p.order_quantity > 0.0 && p.quantity > 0.0)
            .map(|p| p.quantity / p.order_quantity)
            .filter(|r| r.is_finite() && *r > 0.0)
            .collect();
        if !raw.is_empty() {
            return (mean(raw.into_iter()), RatioSource::FirstObservation);
        }

        (1.0, RatioSource::OneToOneFallback)
    }

    fn alternatives_for(&self, pattern: &Pattern, all: &[Pattern]) -> Vec<ProfileAlternative> {
        let threshold = self.config.similarity_threshold;
        let mut alternatives: Vec<ProfileAlternative> = all
            .iter()
            .filter(|other| other.profile != pattern.profile)
            .filter_map(|other| {
                let similarity = self.calculator.similarity(&pattern.profile, &other.profile);
                (similarity > threshold).then(|| ProfileAlternative {
                    profile: other.profile.clone(),
                    measurement: other.measurement.clone(),
                    similarity: round2(similarity),
                })
            })
            .collect();
        alternatives
            .sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
        alternatives.dedup_by(|a, b| a.profile == b.profile);
        alternatives.truncate(self.config.max_alternatives);
        alternatives
    }
}

fn validation_failure(input: &LearnInput) -> Option<&'static str> {
    if input.product.trim().is_empty() {
        return Some("product is blank");
    }
    if input.size.trim().is_empty() {
        return Some("size is blank");
    }
    if input.profile.trim().is_empty() {
        return Some("profile is blank");
    }
    if input.measurement.trim().is_empty() {
        return Some("measurement is blank");
    }
    if !(input.quantity > 0.0 && input.quantity.is_finite()) {
        return Some("quantity must be positive");
    }
    if !(input.order_quantity > 0.0 && input.order_quantity.is_finite()) {
        return Some("order quantity must be positive");
    }
    None
}

fn effective_ratio(pattern: &Pattern) -> f64 {
    if pattern.average_ratio.is_finite() && pattern.average_ratio > 0.0 {
        pattern.average_ratio
    } else {
        pattern.ratio
    }
}

fn smart_apply_reasoning(profiles: &[SmartApplyProfile], total_patterns: usize) -> String {
    let mut paths: Vec<&'static str> = Vec::new();
    for profile in profiles {
        let description = profile.source.description();
        if !paths.contains(&description) {
            paths.push(description);
        }
    }
    format!(
        "{} profile group(s) from {} learned pattern(s); ratios resolved via {}",
        profiles.len(),
        total_patterns,
        paths.join(", ")
    )
}

fn sort_by_confidence_then_frequency<T>(items: &mut [T], key: impl Fn(&T) -> (f64, u64)) {
    items.sort_by(|a, b| {
        let (a_confidence, a_frequency) = key(a);
        let (b_confidence, b_frequency) = key(b);
        b_confidence
            .partial_cmp(&a_confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b_frequency.cmp(&a_frequency))
    });
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
