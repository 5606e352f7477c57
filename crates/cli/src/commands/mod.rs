pub mod apply;
pub mod cleanup;
pub mod learn;
pub mod migrate;
pub mod stats;
pub mod suggest;

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use cutwise_core::config::{AppConfig, LoadOptions, LogFormat};
use cutwise_core::{NoopCache, SuggestionEngine};
use cutwise_db::{connect_with_settings, DbPool, SqlOrderHistory, SqlPatternStore};

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn data(payload: impl Serialize) -> Self {
        match serde_json::to_string_pretty(&payload) {
            Ok(output) => Self { exit_code: 0, output },
            Err(error) => Self::failure("output", "serialization", error.to_string(), 1),
        }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);
    // CLI output is JSON on stdout; logs must not interleave with it.
    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

/// Everything a command run needs: validated config, a live pool, and the
/// engine wired over the SQL stores.
pub struct EngineContext {
    pub config: AppConfig,
    pub pool: DbPool,
    pub engine: SuggestionEngine,
}

/// Load config, build a runtime, connect, and hand the command an engine.
///
/// Exit codes mirror the failure stage: 2 config, 3 runtime, 4 connectivity.
pub fn with_engine<F, Fut>(command: &str, config_path: Option<PathBuf>, body: F) -> CommandResult
where
    F: FnOnce(EngineContext) -> Fut,
    Fut: std::future::Future<Output = CommandResult>,
{
    // An explicitly requested config file must exist.
    let options =
        LoadOptions { require_file: config_path.is_some(), config_path, ..LoadOptions::default() };
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                command,
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };
    init_logging(&config);

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    runtime.block_on(async {
        let pool = match connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        {
            Ok(pool) => pool,
            Err(error) => {
                return CommandResult::failure(
                    command,
                    "db_connectivity",
                    error.to_string(),
                    4,
                );
            }
        };

        let engine = SuggestionEngine::with_config(
            Arc::new(SqlPatternStore::new(pool.clone())),
            Arc::new(SqlOrderHistory::new(pool.clone())),
            Arc::new(NoopCache),
            config.engine.clone(),
        );

        let context = EngineContext { config: config.clone(), pool: pool.clone(), engine };
        let result = body(context).await;
        pool.close().await;
        result
    })
}
