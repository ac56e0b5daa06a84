//! sealgrid — run and inspect private map-reduce searches.
//!
//! # Usage
//!
//! ```text
//! sealgrid init --nodes 4
//! sealgrid run --config search.toml
//! sealgrid plan --items 7 --nodes 4 --mode serial
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use sealgrid_core::RoleMap;
use sealgrid_planner::Consumption;

mod commands;
mod config;

#[derive(Parser)]
#[command(
    name = "sealgrid",
    about = "sealgrid — private map-reduce over secure nodes",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a configured search on a simulated cluster.
    Run {
        /// Search config file.
        #[arg(short, long, default_value = "search.toml")]
        config: String,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Print the planner's action batches for a pool, without running them.
    Plan {
        /// Number of dataset items.
        #[arg(long)]
        items: usize,
        /// Number of nodes in the pool.
        #[arg(long)]
        nodes: usize,
        /// Root node for every role.
        #[arg(long, default_value = "0")]
        root: usize,
        /// Override the mapper root.
        #[arg(long)]
        mapper_root: Option<usize>,
        /// Override the reducer root.
        #[arg(long)]
        reducer_root: Option<usize>,
        /// Override the finalizer root.
        #[arg(long)]
        finalizer_root: Option<usize>,
        /// How completions are fed back between batches.
        #[arg(long, value_enum, default_value = "parallel")]
        mode: Mode,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Write a search config scaffold.
    Init {
        #[arg(short, long, default_value = "search.toml")]
        path: String,
        #[arg(long, default_value = "4")]
        nodes: usize,
        /// Dataset path recorded in the config.
        #[arg(long, default_value = "fares.json")]
        dataset: String,
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    /// Complete every action of a batch before planning the next.
    Parallel,
    /// Complete one action, oldest first, between batches.
    Serial,
}

impl From<Mode> for Consumption {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Parallel => Consumption::Parallel,
            Mode::Serial => Consumption::Serial,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so JSON output stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new("info,sealgrid=debug"))?,
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run { config, format } => commands::run::run(&config, &format).await,
        Command::Plan {
            items,
            nodes,
            root,
            mapper_root,
            reducer_root,
            finalizer_root,
            mode,
            format,
        } => {
            let roots = RoleMap::new(
                mapper_root.unwrap_or(root),
                reducer_root.unwrap_or(root),
                finalizer_root.unwrap_or(root),
            );
            commands::plan::plan(items, nodes, roots, mode.into(), &format)
        }
        Command::Init {
            path,
            nodes,
            dataset,
            force,
        } => commands::init::init(&path, nodes, &dataset, force),
    }
}
