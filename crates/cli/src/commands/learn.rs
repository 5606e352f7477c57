use std::path::PathBuf;

use serde::Serialize;

use cutwise_core::{LearnInput, LearnOutcome};

use crate::commands::{with_engine, CommandResult};

#[derive(Debug, Serialize)]
struct LearnReport {
    command: &'static str,
    #[serde(flatten)]
    outcome: LearnOutcome,
}

#[allow(clippy::too_many_arguments)]
pub fn run(
    config_path: Option<PathBuf>,
    product: String,
    size: String,
    profile: String,
    measurement: String,
    quantity: f64,
    order_quantity: f64,
    original_index: Option<u32>,
) -> CommandResult {
    with_engine("learn", config_path, |context| async move {
        let input = LearnInput {
            product,
            size,
            profile,
            measurement,
            quantity,
            order_quantity,
            original_index,
        };
        match context.engine.learn_from_pattern(&input).await {
            Ok(outcome) => CommandResult::data(LearnReport { command: "learn", outcome }),
            Err(error) => CommandResult::failure("learn", "store", error.to_string(), 4),
        }
    })
}
