use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::Row;

use cutwise_core::{
    Pattern, PatternMetadata, PatternStatistics, PatternStore, PatternUpdate, RatioSample,
    StoreError,
};

use super::RepositoryError;
use crate::DbPool;

const PATTERN_COLUMNS: &str = "pattern_key, context_key, product_name, size, profile, measurement, \
     quantity, order_quantity, ratio, frequency, confidence, created_at, last_used, \
     average_quantity, average_ratio, contexts, variations, ratio_history, metadata";

/// SQLite-backed pattern store.
///
/// Sets, the ratio history, and metadata live in JSON TEXT columns;
/// timestamps are RFC 3339 strings. Learn-path updates run as one UPDATE
/// statement per observation so concurrent learns for a hot key contend on
/// the row, not on the process.
pub struct SqlPatternStore {
    pool: DbPool,
}

impl SqlPatternStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode_json<T: serde::de::DeserializeOwned>(
    column: &str,
    raw: &str,
) -> Result<T, RepositoryError> {
    serde_json::from_str(raw).map_err(|e| RepositoryError::Decode(format!("{column}: {e}")))
}

fn encode_json<T: serde::Serialize>(column: &str, value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Decode(format!("{column}: {e}")))
}

fn decode_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("{column}: {e}")))
}

fn row_to_pattern(row: &sqlx::sqlite::SqliteRow) -> Result<Pattern, RepositoryError> {
    let get_text = |column: &str| -> Result<String, RepositoryError> {
        row.try_get(column).map_err(|e| RepositoryError::Decode(e.to_string()))
    };
    let get_real = |column: &str| -> Result<f64, RepositoryError> {
        row.try_get(column).map_err(|e| RepositoryError::Decode(e.to_string()))
    };

    let frequency: i64 =
        row.try_get("frequency").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let contexts: BTreeSet<String> = decode_json("contexts", &get_text("contexts")?)?;
    let variations: BTreeSet<String> = decode_json("variations", &get_text("variations")?)?;
    let ratio_history: Vec<RatioSample> = decode_json("ratio_history", &get_text("ratio_history")?)?;
    let metadata: PatternMetadata = decode_json("metadata", &get_text("metadata")?)?;

    Ok(Pattern {
        pattern_key: get_text("pattern_key")?,
        context_key: get_text("context_key")?,
        product_name: get_text("product_name")?,
        size: get_text("size")?,
        profile: get_text("profile")?,
        measurement: get_text("measurement")?,
        quantity: get_real("quantity")?,
        order_quantity: get_real("order_quantity")?,
        ratio: get_real("ratio")?,
        frequency: frequency.max(0) as u32,
        confidence: get_real("confidence")?,
        created_at: decode_timestamp("created_at", &get_text("created_at")?)?,
        last_used: decode_timestamp("last_used", &get_text("last_used")?)?,
        average_quantity: get_real("average_quantity")?,
        average_ratio: get_real("average_ratio")?,
        contexts,
        variations,
        ratio_history,
        metadata,
    })
}

#[async_trait]
impl PatternStore for SqlPatternStore {
    async fn create(&self, pattern: Pattern) -> Result<(), StoreError> {
        let contexts = encode_json("contexts", &pattern.contexts)?;
        let variations = encode_json("variations", &pattern.variations)?;
        let ratio_history = encode_json("ratio_history", &pattern.ratio_history)?;
        let metadata = encode_json("metadata", &pattern.metadata)?;

        sqlx::query(
            "INSERT INTO cutting_patterns
                (pattern_key, context_key, product_name, size, profile, measurement,
                 quantity, order_quantity, ratio, frequency, confidence,
                 created_at, last_used, average_quantity, average_ratio,
                 contexts, variations, ratio_history, metadata)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&pattern.pattern_key)
        .bind(&pattern.context_key)
        .bind(&pattern.product_name)
        .bind(&pattern.size)
        .bind(&pattern.profile)
        .bind(&pattern.measurement)
        .bind(pattern.quantity)
        .bind(pattern.order_quantity)
        .bind(pattern.ratio)
        .bind(i64::from(pattern.frequency))
        .bind(pattern.confidence)
        .bind(pattern.created_at.to_rfc3339())
        .bind(pattern.last_used.to_rfc3339())
        .bind(pattern.average_quantity)
        .bind(pattern.average_ratio)
        .bind(&contexts)
        .bind(&variations)
        .bind(&ratio_history)
        .bind(&metadata)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)
        .map_err(StoreError::from)?;
        Ok(())
    }

    async fn find_by_pattern_key(&self, pattern_key: &str) -> Result<Option<Pattern>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {PATTERN_COLUMNS} FROM cutting_patterns WHERE pattern_key = ?"
        ))
        .bind(pattern_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)
        .map_err(StoreError::from)?;

        row.as_ref().map(row_to_pattern).transpose().map_err(StoreError::from)
    }

    async fn find_by_context_key(&self, context_key: &str) -> Result<Vec<Pattern>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {PATTERN_COLUMNS} FROM cutting_patterns
             WHERE context_key = ? ORDER BY created_at, rowid"
        ))
        .bind(context_key)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)
        .map_err(StoreError::from)?;

        rows.iter().map(row_to_pattern).collect::<Result<_, _>>().map_err(StoreError::from)
    }

    async fn update(&self, pattern_key: &str, update: PatternUpdate) -> Result<(), StoreError> {
        let mut builder = sqlx::QueryBuilder::new("UPDATE cutting_patterns SET ");
        let mut assignments = builder.separated(", ");
        let mut any = false;

        if let Some(frequency) = update.frequency {
            assignments.push("frequency = ").push_bind_unseparated(i64::from(frequency));
            any = true;
        }
        if let Some(confidence) = update.confidence {
            assignments.push("confidence = ").push_bind_unseparated(confidence);
            any = true;
        }
        if let Some(last_used) = update.last_used {
            assignments.push("last_used = ").push_bind_unseparated(last_used.to_rfc3339());
            any = true;
        }
        if let Some(average_quantity) = update.average_quantity {
            assignments.push("average_quantity = ").push_bind_unseparated(average_quantity);
            any = true;
        }
        if let Some(average_ratio) = update.average_ratio {
            assignments.push("average_ratio = ").push_bind_unseparated(average_ratio);
            any = true;
        }
        if let Some(history) = &update.ratio_history {
            assignments
                .push("ratio_history = ")
                .push_bind_unseparated(encode_json("ratio_history", history)?);
            any = true;
        }
        if let Some(contexts) = &update.contexts {
            assignments.push("contexts = ").push_bind_unseparated(encode_json("contexts", contexts)?);
            any = true;
        }
        if let Some(variations) = &update.variations {
            assignments
                .push("variations = ")
                .push_bind_unseparated(encode_json("variations", variations)?);
            any = true;
        }

        if !any {
            return Ok(());
        }

        builder.push(" WHERE pattern_key = ");
        builder.push_bind(pattern_key);

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)
            .map_err(StoreError::from)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(pattern_key.to_string()));
        }
        Ok(())
    }

    async fn search_by_product(&self, query: &str) -> Result<Vec<Pattern>, StoreError> {
        let needle = cutwise_core::keys::normalize(query);
        let rows = sqlx::query(&format!(
            "SELECT {PATTERN_COLUMNS} FROM cutting_patterns
             WHERE product_name LIKE '%' || ? || '%' ORDER BY created_at, rowid"
        ))
        .bind(&needle)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)
        .map_err(StoreError::from)?;

        rows.iter().map(row_to_pattern).collect::<Result<_, _>>().map_err(StoreError::from)
    }

    async fn unique_sizes_for_product(&self, product: &str) -> Result<Vec<String>, StoreError> {
        let product_name = cutwise_core::keys::normalize(product);
        let rows = sqlx::query(
            "SELECT size FROM cutting_patterns WHERE product_name = ?
             GROUP BY size ORDER BY MIN(rowid)",
        )
        .bind(&product_name)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)
        .map_err(StoreError::from)?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("size")
                    .map_err(|e| StoreError::Decode(e.to_string()))
            })
            .collect()
    }

    async fn most_frequent(&self, limit: usize) -> Result<Vec<Pattern>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {PATTERN_COLUMNS} FROM cutting_patterns
             ORDER BY frequency DESC, last_used DESC LIMIT ?"
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)
        .map_err(StoreError::from)?;

        rows.iter().map(row_to_pattern).collect::<Result<_, _>>().map_err(StoreError::from)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Pattern>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {PATTERN_COLUMNS} FROM cutting_patterns ORDER BY last_used DESC LIMIT ?"
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)
        .map_err(StoreError::from)?;

        rows.iter().map(row_to_pattern).collect::<Result<_, _>>().map_err(StoreError::from)
    }

    async fn delete_stale(
        &self,
        retention_days: i64,
        frequency_floor: u32,
    ) -> Result<u64, StoreError> {
        let cutoff = (Utc::now() - Duration::days(retention_days)).to_rfc3339();
        let result = sqlx::query(
            "DELETE FROM cutting_patterns WHERE last_used < ? AND frequency < ?",
        )
        .bind(&cutoff)
        .bind(i64::from(frequency_floor))
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)
        .map_err(StoreError::from)?;
        Ok(result.rows_affected())
    }

    async fn statistics(&self) -> Result<PatternStatistics, StoreError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total,
                    COALESCE(SUM(CASE WHEN confidence >= ? THEN 1 ELSE 0 END), 0) AS high,
                    COALESCE(SUM(CASE WHEN confidence >= ? AND confidence < ? THEN 1 ELSE 0 END), 0) AS medium,
                    COALESCE(SUM(CASE WHEN confidence < ? THEN 1 ELSE 0 END), 0) AS low,
                    COALESCE(AVG(confidence), 0.0) AS average_confidence
             FROM cutting_patterns",
        )
        .bind(HIGH_CONFIDENCE_FLOOR)
        .bind(MEDIUM_CONFIDENCE_FLOOR)
        .bind(HIGH_CONFIDENCE_FLOOR)
        .bind(MEDIUM_CONFIDENCE_FLOOR)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)
        .map_err(StoreError::from)?;

        let decode = |e: sqlx::Error| StoreError::Decode(e.to_string());
        Ok(PatternStatistics {
            total: row.try_get::<i64, _>("total").map_err(decode)?.max(0) as u64,
            high_confidence: row.try_get::<i64, _>("high").map_err(decode)?.max(0) as u64,
            medium_confidence: row.try_get::<i64, _>("medium").map_err(decode)?.max(0) as u64,
            low_confidence: row.try_get::<i64, _>("low").map_err(decode)?.max(0) as u64,
            average_confidence: row.try_get("average_confidence").map_err(decode)?,
        })
    }
}

/// Band thresholds matching [`ConfidenceBand::from_confidence`].
///
/// [`ConfidenceBand::from_confidence`]: cutwise_core::ConfidenceBand::from_confidence
const HIGH_CONFIDENCE_FLOOR: f64 = 70.0;
const MEDIUM_CONFIDENCE_FLOOR: f64 = 40.0;
