//! End-to-end engine runs over the SQLite-backed stores.

use std::sync::Arc;

use cutwise_core::{LearnInput, LearnOutcome, RatioSource, SuggestionEngine};
use cutwise_db::{
    connect_with_settings, run_pending, DbPool, RecordingCache, SqlOrderHistory, SqlPatternStore,
};

async fn sqlite_pool() -> DbPool {
    let pool = connect_with_settings("sqlite::memory:", 1, 5).await.unwrap();
    run_pending(&pool).await.unwrap();
    pool
}

fn engine_over(pool: &DbPool, cache: Arc<RecordingCache>) -> SuggestionEngine {
    SuggestionEngine::new(
        Arc::new(SqlPatternStore::new(pool.clone())),
        Arc::new(SqlOrderHistory::new(pool.clone())),
        cache,
    )
}

fn cut(profile: &str, measurement: &str, quantity: f64, order_quantity: f64) -> LearnInput {
    LearnInput {
        product: "Door".to_string(),
        size: "100x200".to_string(),
        profile: profile.to_string(),
        measurement: measurement.to_string(),
        quantity,
        order_quantity,
        original_index: None,
    }
}

#[tokio::test]
async fn learning_twice_updates_the_stored_row() {
    let pool = sqlite_pool().await;
    let cache = Arc::new(RecordingCache::new());
    let engine = engine_over(&pool, cache.clone());

    let first = engine.learn_from_pattern(&cut("Frame", "990mm", 4.0, 2.0)).await.unwrap();
    assert_eq!(
        first,
        LearnOutcome::Learned { pattern_key: "DOOR|100X200|FRAME|990".to_string(), created: true }
    );

    let second = engine.learn_from_pattern(&cut("FRAME", "990 mm", 6.0, 2.0)).await.unwrap();
    assert_eq!(
        second,
        LearnOutcome::Learned { pattern_key: "DOOR|100X200|FRAME|990".to_string(), created: false }
    );

    let store = SqlPatternStore::new(pool.clone());
    let pattern = cutwise_core::PatternStore::find_by_pattern_key(&store, "DOOR|100X200|FRAME|990")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pattern.frequency, 2);
    assert_eq!(pattern.ratio_history.len(), 2);
    assert!((pattern.average_ratio - 2.5).abs() < 1e-9);
    // First-observation fields survive the second learn.
    assert_eq!(pattern.quantity, 4.0);

    assert_eq!(cache.invalidations(), 2);
}

#[tokio::test]
async fn smart_apply_scales_learned_ratios_and_keeps_order() {
    let pool = sqlite_pool().await;
    let engine = engine_over(&pool, Arc::new(RecordingCache::new()));

    engine.learn_from_pattern(&cut("Frame", "990mm", 4.0, 2.0)).await.unwrap();
    engine.learn_from_pattern(&cut("Hinge", "120mm", 6.0, 2.0)).await.unwrap();

    let result = engine.apply_smart_suggestion("Door", "100x200", 10.0, None).await;
    let profiles: Vec<&str> = result.profiles.iter().map(|p| p.profile.as_str()).collect();
    assert_eq!(profiles, vec!["FRAME", "HINGE"]);

    let frame = &result.profiles[0];
    assert_eq!(frame.predicted_quantity, 20);
    assert_eq!(frame.source, RatioSource::RatioHistory);
    let hinge = &result.profiles[1];
    assert_eq!(hinge.predicted_quantity, 30);
}

#[tokio::test]
async fn smart_apply_backfills_ratio_history_from_raw_orders() {
    let pool = sqlite_pool().await;

    // A legacy row with no usable ratio data.
    sqlx::query(
        "INSERT INTO cutting_patterns
            (pattern_key, context_key, product_name, size, profile, measurement,
             quantity, order_quantity, ratio, frequency, confidence,
             created_at, last_used, average_quantity, average_ratio,
             contexts, variations, ratio_history, metadata)
         VALUES ('DOOR|100X200|FRAME|990', 'DOOR|100X200', 'DOOR', '100X200',
                 'FRAME', '990', 0.0, 0.0, 0.0, 1, 50.0,
                 '2026-01-05T00:00:00+00:00', '2026-01-05T00:00:00+00:00',
                 0.0, 1.0, '[\"DOOR|100X200\"]', '[]', '[]', '{}')",
    )
    .execute(&pool)
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO work_order_items
            (work_order_id, product_name, size, profile, measurement,
             order_quantity, profile_quantity, created_at)
         VALUES ('WO-1', 'Door', '100x200', 'Frame', '990mm', 2.0, 6.0, datetime('now'))",
    )
    .execute(&pool)
    .await
    .unwrap();

    let engine = engine_over(&pool, Arc::new(RecordingCache::new()));
    let result = engine.apply_smart_suggestion("Door", "100x200", 4.0, None).await;
    assert_eq!(result.profiles.len(), 1);
    assert_eq!(result.profiles[0].source, RatioSource::OrderHistory);
    assert_eq!(result.profiles[0].predicted_quantity, 12);

    // The resolved ratio was written back to the pattern row.
    let store = SqlPatternStore::new(pool.clone());
    let pattern = cutwise_core::PatternStore::find_by_pattern_key(&store, "DOOR|100X200|FRAME|990")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pattern.ratio_history.len(), 1);
    assert!((pattern.average_ratio - 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn query_surfaces_work_over_sql_rows() {
    let pool = sqlite_pool().await;
    let engine = engine_over(&pool, Arc::new(RecordingCache::new()));

    engine.learn_from_pattern(&cut("Frame", "990mm", 4.0, 2.0)).await.unwrap();
    engine
        .learn_from_pattern(&LearnInput {
            product: "Window".to_string(),
            size: "50x50".to_string(),
            profile: "Sash".to_string(),
            measurement: "480mm".to_string(),
            quantity: 2.0,
            order_quantity: 1.0,
            original_index: None,
        })
        .await
        .unwrap();

    let products = engine.product_suggestions("doo", 10).await;
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].product_name, "DOOR");

    let sizes = engine.size_suggestions("Door", None, 10).await;
    assert_eq!(sizes.len(), 1);
    assert_eq!(sizes[0].size, "100X200");

    let profiles = engine.profile_suggestions("Door", "100x200", None, Some(4.0), 10).await;
    assert_eq!(profiles.len(), 1);
    assert_eq!(profiles[0].profile, "FRAME");
    let prediction = profiles[0].prediction.as_ref().unwrap();
    assert_eq!(prediction.predicted, 8);

    let combination = engine.combination_suggestions("Door", "100x200", 10).await;
    assert_eq!(combination.profiles.len(), 1);

    let stats = engine.statistics().await.unwrap();
    assert_eq!(stats.total, 2);
}

#[tokio::test]
async fn rejected_inputs_do_not_touch_the_database() {
    let pool = sqlite_pool().await;
    let cache = Arc::new(RecordingCache::new());
    let engine = engine_over(&pool, cache.clone());

    let outcome = engine.learn_from_pattern(&cut("Frame", "990mm", 0.0, 2.0)).await.unwrap();
    assert!(matches!(outcome, LearnOutcome::Rejected { .. }));

    let stats = engine.statistics().await.unwrap();
    assert_eq!(stats.total, 0);
    assert_eq!(cache.invalidations(), 0);
}
