use std::path::PathBuf;

use serde::Serialize;

use cutwise_core::{
    CombinationSuggestion, ProductSuggestion, ProfileSuggestion, SizeSuggestion,
};

use crate::commands::{with_engine, CommandResult};

#[derive(Debug, Serialize)]
struct ProductReport {
    command: &'static str,
    query: String,
    suggestions: Vec<ProductSuggestion>,
}

#[derive(Debug, Serialize)]
struct SizeReport {
    command: &'static str,
    product: String,
    suggestions: Vec<SizeSuggestion>,
}

#[derive(Debug, Serialize)]
struct ProfileReport {
    command: &'static str,
    product: String,
    size: String,
    suggestions: Vec<ProfileSuggestion>,
}

#[derive(Debug, Serialize)]
struct CombinationReport {
    command: &'static str,
    product: String,
    size: String,
    combination: CombinationSuggestion,
}

pub fn products(config_path: Option<PathBuf>, query: String, limit: Option<usize>) -> CommandResult {
    with_engine("suggest-products", config_path, |context| async move {
        let limit = limit.unwrap_or(context.config.engine.default_limit);
        let suggestions = context.engine.product_suggestions(&query, limit).await;
        CommandResult::data(ProductReport { command: "suggest-products", query, suggestions })
    })
}

pub fn sizes(
    config_path: Option<PathBuf>,
    product: String,
    query: Option<String>,
    limit: Option<usize>,
) -> CommandResult {
    with_engine("suggest-sizes", config_path, |context| async move {
        let limit = limit.unwrap_or(context.config.engine.default_limit);
        let suggestions =
            context.engine.size_suggestions(&product, query.as_deref(), limit).await;
        CommandResult::data(SizeReport { command: "suggest-sizes", product, suggestions })
    })
}

pub fn profiles(
    config_path: Option<PathBuf>,
    product: String,
    size: String,
    query: Option<String>,
    order_quantity: Option<f64>,
    limit: Option<usize>,
) -> CommandResult {
    with_engine("suggest-profiles", config_path, |context| async move {
        let limit = limit.unwrap_or(context.config.engine.default_limit);
        let suggestions = context
            .engine
            .profile_suggestions(&product, &size, query.as_deref(), order_quantity, limit)
            .await;
        CommandResult::data(ProfileReport { command: "suggest-profiles", product, size, suggestions })
    })
}

pub fn combination(
    config_path: Option<PathBuf>,
    product: String,
    size: String,
    limit: Option<usize>,
) -> CommandResult {
    with_engine("suggest-combination", config_path, |context| async move {
        let limit = limit.unwrap_or(context.config.engine.default_limit);
        let combination = context.engine.combination_suggestions(&product, &size, limit).await;
        CommandResult::data(CombinationReport {
            command: "suggest-combination",
            product,
            size,
            combination,
        })
    })
}
