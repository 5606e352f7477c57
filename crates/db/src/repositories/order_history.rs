use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::Row;

use cutwise_core::keys;
use cutwise_core::{HistoricalCut, OrderHistory, StoreError};

use super::RepositoryError;
use crate::DbPool;

/// Raw work-order scan backing the ratio fallback chain.
///
/// Rows were written by upstream systems with whatever spelling the operator
/// used, so matching normalizes in Rust rather than trusting the stored text.
pub struct SqlOrderHistory {
    pool: DbPool,
}

impl SqlOrderHistory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderHistory for SqlOrderHistory {
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

        let rows = sqlx::query(
            "SELECT work_order_id, product_name, size, profile, measurement,
                    order_quantity, profile_quantity
             FROM work_order_items ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)
        .map_err(StoreError::from)?;

        let decode = |e: sqlx::Error| StoreError::Decode(e.to_string());
        let mut seen: HashSet<(String, String, String)> = HashSet::new();
        let mut cuts = Vec::new();
        for row in &rows {
            let row_product: String = row.try_get("product_name").map_err(decode)?;
            let row_size: String = row.try_get("size").map_err(decode)?;
            let row_profile: String = row.try_get("profile").map_err(decode)?;
            let row_measurement: String = row.try_get("measurement").map_err(decode)?;

            if keys::normalize(&row_product) != want_product
                || keys::normalize(&row_size) != want_size
            {
                continue;
            }
            let norm_profile = keys::normalize_profile(&row_profile);
            let norm_measurement = keys::normalize_measurement(&row_measurement);
            if norm_profile != want_profile || norm_measurement != want_measurement {
                continue;
            }

            let work_order_id: String = row.try_get("work_order_id").map_err(decode)?;
            if !seen.insert((work_order_id.clone(), norm_profile, norm_measurement)) {
                continue;
            }

            cuts.push(HistoricalCut {
                work_order_id,
                order_quantity: row.try_get("order_quantity").map_err(decode)?,
                profile_quantity: row.try_get("profile_quantity").map_err(decode)?,
            });
        }
        Ok(cuts)
    }
}

#[cfg(test)]
mod tests {
    use cutwise_core::OrderHistory;

    use super::SqlOrderHistory;
    use crate::{connect_with_settings, migrations, DbPool};

    async fn pool_with_schema() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.unwrap();
        migrations::run_pending(&pool).await.unwrap();
        pool
    }

    async fn insert_item(
        pool: &DbPool,
        work_order_id: &str,
        product: &str,
        size: &str,
        profile: &str,
        measurement: &str,
        order_quantity: f64,
        profile_quantity: f64,
    ) {
        sqlx::query(
            "INSERT INTO work_order_items
                (work_order_id, product_name, size, profile, measurement,
                 order_quantity, profile_quantity, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, datetime('now'))",
        )
        .bind(work_order_id)
        .bind(product)
        .bind(size)
        .bind(profile)
        .bind(measurement)
        .bind(order_quantity)
        .bind(profile_quantity)
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn matches_on_normalized_fields() {
        let pool = pool_with_schema().await;
        insert_item(&pool, "WO-1", "  door ", "100x200", "frame", "990,0 mm", 2.0, 4.0).await;
        insert_item(&pool, "WO-2", "Window", "100x200", "Frame", "990mm", 2.0, 4.0).await;

        let history = SqlOrderHistory::new(pool);
        let cuts = history.cut_ratios("Door", "100X200", "FRAME", "990").await.unwrap();
        assert_eq!(cuts.len(), 1);
        assert_eq!(cuts[0].work_order_id, "WO-1");
        assert_eq!(cuts[0].order_quantity, 2.0);
        assert_eq!(cuts[0].profile_quantity, 4.0);
    }

    #[tokio::test]
    async fn one_sample_per_order_per_profile() {
        let pool = pool_with_schema().await;
        insert_item(&pool, "WO-1", "Door", "100x200", "Frame", "990mm", 2.0, 4.0).await;
        insert_item(&pool, "WO-1", "Door", "100x200", "FRAME", "990 mm", 2.0, 4.0).await;
        insert_item(&pool, "WO-2", "Door", "100x200", "Frame", "990", 3.0, 6.0).await;

        let history = SqlOrderHistory::new(pool);
        let cuts = history.cut_ratios("Door", "100x200", "Frame", "990mm").await.unwrap();
        let orders: Vec<&str> = cuts.iter().map(|c| c.work_order_id.as_str()).collect();
        assert_eq!(orders, vec!["WO-1", "WO-2"]);
    }

    #[tokio::test]
    async fn internal_whitespace_in_size_is_significant() {
        let pool = pool_with_schema().await;
        insert_item(&pool, "WO-1", "Door", "100 x 200", "Frame", "990mm", 2.0, 4.0).await;

        let history = SqlOrderHistory::new(pool);
        // Whitespace is collapsed, not removed, so these are different sizes.
        let cuts = history.cut_ratios("Door", "100x200", "Frame", "990").await.unwrap();
        assert!(cuts.is_empty());
        let cuts = history.cut_ratios("Door", "100  X  200", "Frame", "990").await.unwrap();
        assert_eq!(cuts.len(), 1);
    }

    #[tokio::test]
    async fn no_matches_is_an_empty_vec() {
        let pool = pool_with_schema().await;
        let history = SqlOrderHistory::new(pool);
        let cuts = history.cut_ratios("Door", "100x200", "Frame", "990mm").await.unwrap();
        assert!(cuts.is_empty());
    }
}
