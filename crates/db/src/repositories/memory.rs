use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::RwLock;

use cutwise_core::keys;
use cutwise_core::{
    CacheError, HistoricalCut, OrderHistory, Pattern, PatternStatistics, PatternStore,
    PatternUpdate, StoreError, SuggestionCache,
};

/// In-memory pattern store for tests and ephemeral runs.
///
/// Patterns are kept in insertion order, which doubles as creation order
/// for the queries that promise it.
#[derive(Default)]
pub struct InMemoryPatternStore {
    patterns: RwLock<Vec<Pattern>>,
}

impl InMemoryPatternStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.patterns.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.patterns.read().await.is_empty()
    }

    pub async fn snapshot(&self) -> Vec<Pattern> {
        self.patterns.read().await.clone()
    }
}

#[async_trait]
impl PatternStore for InMemoryPatternStore {
    async fn create(&self, pattern: Pattern) -> Result<(), StoreError> {
        let mut patterns = self.patterns.write().await;
        if patterns.iter().any(|p| p.pattern_key == pattern.pattern_key) {
            return Err(StoreError::Conflict(pattern.pattern_key));
        }
        patterns.push(pattern);
        Ok(())
    }

    async fn find_by_pattern_key(&self, pattern_key: &str) -> Result<Option<Pattern>, StoreError> {
        let patterns = self.patterns.read().await;
        Ok(patterns.iter().find(|p| p.pattern_key == pattern_key).cloned())
    }

    async fn find_by_context_key(&self, context_key: &str) -> Result<Vec<Pattern>, StoreError> {
        let patterns = self.patterns.read().await;
        Ok(patterns.iter().filter(|p| p.context_key == context_key).cloned().collect())
    }

    async fn update(&self, pattern_key: &str, update: PatternUpdate) -> Result<(), StoreError> {
        let mut patterns = self.patterns.write().await;
        let pattern = patterns
            .iter_mut()
            .find(|p| p.pattern_key == pattern_key)
            .ok_or_else(|| StoreError::NotFound(pattern_key.to_string()))?;
        update.apply_to(pattern);
        Ok(())
    }

    async fn search_by_product(&self, query: &str) -> Result<Vec<Pattern>, StoreError> {
        let needle = keys::normalize(query);
        let patterns = self.patterns.read().await;
        Ok(patterns.iter().filter(|p| p.product_name.contains(&needle)).cloned().collect())
    }

    async fn unique_sizes_for_product(&self, product: &str) -> Result<Vec<String>, StoreError> {
        let product_name = keys::normalize(product);
        let patterns = self.patterns.read().await;
        let mut sizes: Vec<String> = Vec::new();
        for pattern in patterns.iter().filter(|p| p.product_name == product_name) {
            if !sizes.contains(&pattern.size) {
                sizes.push(pattern.size.clone());
            }
        }
        Ok(sizes)
    }

    async fn most_frequent(&self, limit: usize) -> Result<Vec<Pattern>, StoreError> {
        let patterns = self.patterns.read().await;
        let mut sorted: Vec<Pattern> = patterns.clone();
        sorted.sort_by(|a, b| {
            b.frequency.cmp(&a.frequency).then(b.last_used.cmp(&a.last_used))
        });
        sorted.truncate(limit);
        Ok(sorted)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Pattern>, StoreError> {
        let patterns = self.patterns.read().await;
        let mut sorted: Vec<Pattern> = patterns.clone();
        sorted.sort_by(|a, b| b.last_used.cmp(&a.last_used));
        sorted.truncate(limit);
        Ok(sorted)
    }

    async fn delete_stale(
        &self,
        retention_days: i64,
        frequency_floor: u32,
    ) -> Result<u64, StoreError> {
        let cutoff = Utc::now() - Duration::days(retention_days);
        let mut patterns = self.patterns.write().await;
        let before = patterns.len();
        patterns.retain(|p| p.last_used >= cutoff || p.frequency >= frequency_floor);
        Ok((before - patterns.len()) as u64)
    }

    async fn statistics(&self) -> Result<PatternStatistics, StoreError> {
        let patterns = self.patterns.read().await;
        let total = patterns.len() as u64;
        let high = patterns.iter().filter(|p| p.confidence >= 70.0).count() as u64;
        let medium =
            patterns.iter().filter(|p| p.confidence >= 40.0 && p.confidence < 70.0).count() as u64;
        let low = patterns.iter().filter(|p| p.confidence < 40.0).count() as u64;
        let average_confidence = if patterns.is_empty() {
            0.0
        } else {
            patterns.iter().map(|p| p.confidence).sum::<f64>() / patterns.len() as f64
        };
        Ok(PatternStatistics {
            total,
            high_confidence: high,
            medium_confidence: medium,
            low_confidence: low,
            average_confidence,
        })
    }
}

/// In-memory order history seeded by tests.
#[derive(Default)]
pub struct InMemoryOrderHistory {
    items: RwLock<Vec<StoredOrderItem>>,
}

#[derive(Clone, Debug)]
pub struct StoredOrderItem {
    pub work_order_id: String,
    pub product: String,
    pub size: String,
    pub profile: String,
    pub measurement: String,
    pub order_quantity: f64,
    pub profile_quantity: f64,
}

impl InMemoryOrderHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, item: StoredOrderItem) {
        self.items.write().await.push(item);
    }
}

#[async_trait]
impl OrderHistory for InMemoryOrderHistory {
    async fn cut_ratios(
        &self,
        product: &str,
        size: &str,
        profile: &str,
        measurement: &str,
    ) -> Result<Vec<HistoricalCut>, StoreError> {
        let want_product = keys::normalize(product);
        let want_size = keys::normalize(size);
        let want_profile = keys::normalize_profile(profile);
        let want_measurement = keys::normalize_measurement(measurement);

        let items = self.items.read().await;
        let mut seen: Vec<String> = Vec::new();
        let mut cuts = Vec::new();
        for item in items.iter() {
            if keys::normalize(&item.product) != want_product
                || keys::normalize(&item.size) != want_size
                || keys::normalize_profile(&item.profile) != want_profile
                || keys::normalize_measurement(&item.measurement) != want_measurement
            {
                continue;
            }
            if seen.contains(&item.work_order_id) {
                continue;
            }
            seen.push(item.work_order_id.clone());
            cuts.push(HistoricalCut {
                work_order_id: item.work_order_id.clone(),
                order_quantity: item.order_quantity,
                profile_quantity: item.profile_quantity,
            });
        }
        Ok(cuts)
    }
}

/// Cache double that counts invalidations.
#[derive(Default)]
pub struct RecordingCache {
    invalidations: AtomicUsize,
}

impl RecordingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SuggestionCache for RecordingCache {
    async fn invalidate_tag(&self, _tag: &str) -> Result<(), CacheError> {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use cutwise_core::{LearnInput, Pattern, PatternStore, PatternUpdate};

    use super::{InMemoryOrderHistory, InMemoryPatternStore, StoredOrderItem};
    use cutwise_core::OrderHistory;

    fn learn_input(profile: &str, measurement: &str) -> LearnInput {
        LearnInput {
            product: "Door".to_string(),
            size: "100x200".to_string(),
            profile: profile.to_string(),
            measurement: measurement.to_string(),
            quantity: 4.0,
            order_quantity: 2.0,
            original_index: None,
        }
    }

    #[tokio::test]
    async fn create_update_and_lookup() {
        let store = InMemoryPatternStore::new();
        let pattern = Pattern::first_observation(&learn_input("Frame", "990mm"), Utc::now());
        let key = pattern.pattern_key.clone();
        store.create(pattern).await.unwrap();

        store
            .update(&key, PatternUpdate { frequency: Some(3), ..Default::default() })
            .await
            .unwrap();
        let found = store.find_by_pattern_key(&key).await.unwrap().unwrap();
        assert_eq!(found.frequency, 3);

        let duplicate = Pattern::first_observation(&learn_input("Frame", "990mm"), Utc::now());
        assert!(store.create(duplicate).await.is_err());
    }

    #[tokio::test]
    async fn context_lookup_keeps_insertion_order() {
        let store = InMemoryPatternStore::new();
        for (profile, measurement) in [("Frame", "990mm"), ("Hinge", "120mm"), ("Seal", "2000mm")] {
            let pattern =
                Pattern::first_observation(&learn_input(profile, measurement), Utc::now());
            store.create(pattern).await.unwrap();
        }

        let patterns = store.find_by_context_key("DOOR|100X200").await.unwrap();
        let profiles: Vec<&str> = patterns.iter().map(|p| p.profile.as_str()).collect();
        assert_eq!(profiles, vec!["FRAME", "HINGE", "SEAL"]);
    }

    #[tokio::test]
    async fn order_history_dedupes_by_work_order() {
        let history = InMemoryOrderHistory::new();
        for work_order_id in ["WO-1", "WO-1", "WO-2"] {
            history
                .push(StoredOrderItem {
                    work_order_id: work_order_id.to_string(),
                    product: "Door".to_string(),
                    size: "100x200".to_string(),
                    profile: "Frame".to_string(),
                    measurement: "990mm".to_string(),
                    order_quantity: 2.0,
                    profile_quantity: 4.0,
                })
                .await;
        }

        let cuts = history.cut_ratios("door", "100X200", "FRAME", "990").await.unwrap();
        assert_eq!(cuts.len(), 2);
    }
}
