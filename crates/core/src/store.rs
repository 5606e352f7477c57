//! Contracts the suggestion engine consumes.
//!
//! The engine never owns persistence. Callers construct one store instance
//! and inject it, which keeps tests isolated and lets deployments choose the
//! backing store. Concurrent learning for a hot key relies on the store
//! providing at-least atomic increment/append semantics; the engine itself
//! takes no locks.

use async_trait::async_trait;

use crate::domain::pattern::{Pattern, PatternStatistics, PatternUpdate};
use crate::errors::{CacheError, StoreError};

/// Keyed persistence for learned patterns.
#[async_trait]
pub trait PatternStore: Send + Sync {
    /// Persist a brand-new pattern. Fails with [`StoreError::Conflict`] if
    /// the key already exists.
    async fn create(&self, pattern: Pattern) -> Result<(), StoreError>;

    async fn find_by_pattern_key(&self, pattern_key: &str) -> Result<Option<Pattern>, StoreError>;

    /// All patterns for a `product|size` context, in creation order.
    async fn find_by_context_key(&self, context_key: &str) -> Result<Vec<Pattern>, StoreError>;

    /// Apply a partial update to an existing pattern.
    async fn update(&self, pattern_key: &str, update: PatternUpdate) -> Result<(), StoreError>;

    /// Patterns whose normalized product name contains the normalized query.
    async fn search_by_product(&self, query: &str) -> Result<Vec<Pattern>, StoreError>;

    /// Distinct sizes recorded for a product, in creation order.
    async fn unique_sizes_for_product(&self, product: &str) -> Result<Vec<String>, StoreError>;

    async fn most_frequent(&self, limit: usize) -> Result<Vec<Pattern>, StoreError>;

    async fn recent(&self, limit: usize) -> Result<Vec<Pattern>, StoreError>;

    /// Maintenance sweep: delete patterns unused for longer than
    /// `retention_days` whose frequency is below `frequency_floor`.
    /// Frequent patterns are retained regardless of age. Returns the number
    /// of patterns removed.
    async fn delete_stale(
        &self,
        retention_days: i64,
        frequency_floor: u32,
    ) -> Result<u64, StoreError>;

    async fn statistics(&self) -> Result<PatternStatistics, StoreError>;
}

/// One historical order's contribution to a ratio lookup.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoricalCut {
    pub work_order_id: String,
    pub order_quantity: f64,
    pub profile_quantity: f64,
}

/// Read-only scan over raw historical order records.
///
/// Implementations normalize the stored size/profile/measurement before
/// matching and deduplicate by `(work_order_id, profile, measurement)` so
/// each order contributes exactly one sample per profile/measurement.
#[async_trait]
pub trait OrderHistory: Send + Sync {
    async fn cut_ratios(
        &self,
        product: &str,
        size: &str,
        profile: &str,
        measurement: &str,
    ) -> Result<Vec<HistoricalCut>, StoreError>;
}

/// Tag-based invalidation of cached suggestion results. Best-effort.
#[async_trait]
pub trait SuggestionCache: Send + Sync {
    async fn invalidate_tag(&self, tag: &str) -> Result<(), CacheError>;
}

/// Cache implementation for deployments without a result cache.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopCache;

#[async_trait]
impl SuggestionCache for NoopCache {
    async fn invalidate_tag(&self, _tag: &str) -> Result<(), CacheError> {
        Ok(())
    }
}
