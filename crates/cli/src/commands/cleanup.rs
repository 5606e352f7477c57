use std::path::PathBuf;

use crate::commands::{with_engine, CommandResult};

pub fn run(config_path: Option<PathBuf>) -> CommandResult {
    with_engine("cleanup", config_path, |context| async move {
        match context.engine.cleanup_stale_patterns().await {
            Ok(removed) => {
                CommandResult::success("cleanup", format!("removed {removed} stale patterns"))
            }
            Err(error) => CommandResult::failure("cleanup", "store", error.to_string(), 4),
        }
    })
}
