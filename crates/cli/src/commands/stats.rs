use std::path::PathBuf;

use serde::Serialize;

use cutwise_core::PatternStatistics;

use crate::commands::{with_engine, CommandResult};

#[derive(Debug, Serialize)]
struct StatsReport {
    command: &'static str,
    statistics: PatternStatistics,
}

pub fn run(config_path: Option<PathBuf>) -> CommandResult {
    with_engine("stats", config_path, |context| async move {
        match context.engine.statistics().await {
            Ok(statistics) => CommandResult::data(StatsReport { command: "stats", statistics }),
            Err(error) => CommandResult::failure("stats", "store", error.to_string(), 4),
        }
    })
}
