pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "cutwise",
    about = "Cutwise cutting-pattern suggestion CLI",
    long_about = "Query learned cutting patterns, teach the engine new ones, and run \
                  database maintenance for the cutwise suggestion store.",
    after_help = "Examples:\n  cutwise migrate\n  cutwise suggest profiles --product Door --size 100x200 --order-quantity 10\n  cutwise apply --product Door --size 100x200 --order-quantity 10\n  cutwise stats"
)]
pub struct Cli {
    /// Path to a cutwise.toml config file.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations")]
    Migrate,
    #[command(about = "Query learned patterns", subcommand)]
    Suggest(SuggestCommand),
    #[command(about = "Record one confirmed cut so future suggestions improve")]
    Learn {
        #[arg(long)]
        product: String,
        #[arg(long)]
        size: String,
        #[arg(long)]
        profile: String,
        #[arg(long)]
        measurement: String,
        #[arg(long, help = "Pieces cut for this profile")]
        quantity: f64,
        #[arg(long, help = "Order size the cut belonged to")]
        order_quantity: f64,
        #[arg(long, help = "Position of the profile within its parent item")]
        original_index: Option<u32>,
    },
    #[command(about = "Resolve quantities for a whole order in one step")]
    Apply {
        #[arg(long)]
        product: String,
        #[arg(long)]
        size: String,
        #[arg(long)]
        order_quantity: f64,
        #[arg(long, help = "Prefer this profile when picking group representatives")]
        profile: Option<String>,
    },
    #[command(about = "Report pattern counts and confidence distribution")]
    Stats,
    #[command(about = "Delete patterns unused beyond the retention window")]
    Cleanup,
}

#[derive(Debug, Subcommand)]
enum SuggestCommand {
    #[command(about = "Products matching a substring query")]
    Products {
        query: String,
        #[arg(long)]
        limit: Option<usize>,
    },
    #[command(about = "Sizes recorded for a product")]
    Sizes {
        #[arg(long)]
        product: String,
        #[arg(long, help = "Filter sizes by substring")]
        query: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    #[command(about = "Profiles for a product/size context, with predictions")]
    Profiles {
        #[arg(long)]
        product: String,
        #[arg(long)]
        size: String,
        #[arg(long, help = "Filter profiles by similarity to this text")]
        query: Option<String>,
        #[arg(long, help = "Order quantity to predict cut quantities for")]
        order_quantity: Option<f64>,
        #[arg(long)]
        limit: Option<usize>,
    },
    #[command(about = "The complete profile combination for a product/size context")]
    Combination {
        #[arg(long)]
        product: String,
        #[arg(long)]
        size: String,
        #[arg(long)]
        limit: Option<usize>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let config = cli.config;

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(config),
        Command::Suggest(SuggestCommand::Products { query, limit }) => {
            commands::suggest::products(config, query, limit)
        }
        Command::Suggest(SuggestCommand::Sizes { product, query, limit }) => {
            commands::suggest::sizes(config, product, query, limit)
        }
        Command::Suggest(SuggestCommand::Profiles {
            product,
            size,
            query,
            order_quantity,
            limit,
        }) => commands::suggest::profiles(config, product, size, query, order_quantity, limit),
        Command::Suggest(SuggestCommand::Combination { product, size, limit }) => {
            commands::suggest::combination(config, product, size, limit)
        }
        Command::Learn {
            product,
            size,
            profile,
            measurement,
            quantity,
            order_quantity,
            original_index,
        } => commands::learn::run(
            config,
            product,
            size,
            profile,
            measurement,
            quantity,
            order_quantity,
            original_index,
        ),
        Command::Apply { product, size, order_quantity, profile } => {
            commands::apply::run(config, product, size, order_quantity, profile)
        }
        Command::Stats => commands::stats::run(config),
        Command::Cleanup => commands::cleanup::run(config),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
