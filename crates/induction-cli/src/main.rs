//! Induction CLI - browse any registered backend from the terminal
//!
//! Builds the adapter registry (SQLite plus the in-memory demo catalog),
//! then walks, explores, queries or aggregates whatever a URL points at.

mod commands;
mod context;
mod output;

use clap::{Parser, Subcommand};
use commands::{AdaptersCommand, AggregateCommand, ExploreCommand, QueryCommand, TreeCommand};
use context::Context;
use output::OutputFormat;
use tracing_subscriber::{layer::SubscriberExt, Layer};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", env = "INDUCTION_LOG_LEVEL", global = true)]
    log_level: String,

    /// Log format: compact, full
    #[arg(
        long,
        default_value = "compact",
        env = "INDUCTION_LOG_FORMAT",
        global = true
    )]
    log_format: String,

    /// Seconds to wait for a connection handshake
    #[arg(
        long,
        default_value_t = 10,
        env = "INDUCTION_CONNECT_TIMEOUT_SECS",
        global = true
    )]
    connect_timeout_secs: u64,

    /// Output format: text, json
    #[arg(long, value_enum, default_value = "text", env = "INDUCTION_FORMAT", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered adapters
    Adapters(AdaptersCommand),
    /// Show the groups and data sources of a database
    Tree(TreeCommand),
    /// Fetch records of a data source by index
    Explore(ExploreCommand),
    /// Run backend-native query text against a data source
    Query(QueryCommand),
    /// Group a data source by a dimension and compute measures
    Aggregate(AggregateCommand),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = cli.log_level.clone();

    // RUST_LOG gives full control; otherwise only our crates log at the chosen level
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .map_err(|e| anyhow::anyhow!("Invalid RUST_LOG environment variable: {}", e))?
    } else {
        tracing_subscriber::EnvFilter::new(format!(
            "induction={level},\
             induction_adapter={level},\
             induction_memory={level},\
             induction_sqlite={level},\
             rusqlite=warn",
            level = log_level
        ))
    };

    let fmt_layer = match cli.log_format.as_str() {
        "full" => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
        _ => tracing_subscriber::fmt::layer() // "compact" or any other value
            .with_writer(std::io::stderr)
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set global default subscriber: {}", e))?;

    let context = Context::new(cli.connect_timeout_secs, cli.format)?;

    match cli.command {
        Commands::Adapters(cmd) => cmd.execute(&context),
        Commands::Tree(cmd) => cmd.execute(&context),
        Commands::Explore(cmd) => cmd.execute(&context),
        Commands::Query(cmd) => cmd.execute(&context),
        Commands::Aggregate(cmd) => cmd.execute(&context),
    }
}
