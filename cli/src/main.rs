use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;
mod context;
mod output;

use commands::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Init(args) => commands::init::run(args, config).await,
        Commands::Sync(args) => commands::sync::run(args, config).await,
        Commands::List(args) => commands::list::run(args, config).await,
        Commands::Gc(args) => commands::gc::run(args, config).await,
        Commands::Person(cmd) => commands::person::run(cmd, config).await,
        Commands::Completion(args) => commands::completion::run(args),
    }
}
