use std::path::PathBuf;

use serde::Serialize;

use cutwise_core::SmartApplyResult;

use crate::commands::{with_engine, CommandResult};

#[derive(Debug, Serialize)]
struct ApplyReport {
    command: &'static str,
    product: String,
    size: String,
    order_quantity: f64,
    result: SmartApplyResult,
}

pub fn run(
    config_path: Option<PathBuf>,
    product: String,
    size: String,
    order_quantity: f64,
    profile: Option<String>,
) -> CommandResult {
    with_engine("apply", config_path, |context| async move {
        let result = context
            .engine
            .apply_smart_suggestion(&product, &size, order_quantity, profile.as_deref())
            .await;
        CommandResult::data(ApplyReport {
            command: "apply",
            product,
            size,
            order_quantity,
            result,
        })
    })
}
