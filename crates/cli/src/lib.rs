pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use affinity_core::config::{AppConfig, LoadOptions, LogFormat};
use affinity_core::domain::ItemId;

#[derive(Debug, Parser)]
#[command(
    name = "affinity",
    about = "Cross-sell rule mining CLI",
    long_about = "Mine association rules from confirmed orders, persist them, and rank cross-sell suggestions for a cart.",
    after_help = "Examples:\n  affinity migrate\n  affinity train --transactions orders.json\n  affinity suggest --cart 12,40 --k 3"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Mine frequent itemsets and replace the stored recommendation rules")]
    Train {
        #[arg(long, help = "JSON file of orders (array of arrays of product ids); defaults to confirmed orders in the database")]
        transactions: Option<PathBuf>,
        #[arg(long, help = "Minimum itemset support in (0, 1]")]
        min_support: Option<f64>,
        #[arg(long, help = "Minimum rule confidence in (0, 1]")]
        min_confidence: Option<f64>,
        #[arg(long, help = "Largest itemset size to mine")]
        max_itemset_len: Option<usize>,
    },
    #[command(about = "Rank cross-sell suggestions for the products in a cart")]
    Suggest {
        #[arg(long, value_delimiter = ',', required = true, help = "Comma-separated product ids")]
        cart: Vec<ItemId>,
        #[arg(long, help = "Maximum number of suggestions")]
        k: Option<usize>,
    },
    #[command(about = "List stored recommendation rules by confidence")]
    Rules {
        #[arg(long, help = "Show at most this many rules")]
        limit: Option<usize>,
    },
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    if let Ok(config) = AppConfig::load(LoadOptions::default()) {
        init_logging(&config);
    }

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Train { transactions, min_support, min_confidence, max_itemset_len } => {
            commands::train::run(commands::train::TrainArgs {
                transactions,
                min_support,
                min_confidence,
                max_itemset_len,
            })
        }
        Command::Suggest { cart, k } => commands::suggest::run(cart, k),
        Command::Rules { limit } => commands::rules::run(limit),
        Command::Config => commands::config::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr so stdout carries only the JSON payload.
fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let installed = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if let Err(error) = installed {
        eprintln!("logging already initialized: {error}");
    }
}
