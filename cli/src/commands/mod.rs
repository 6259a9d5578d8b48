pub mod completion;
pub mod gc;
pub mod init;
pub mod list;
pub mod person;
pub mod sync;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "almanac",
    author,
    version,
    about = "Almanac - a personal organizer synced with a hosted workspace",
    long_about = "Keeps the local organizer database and the remote workspace in step.\n\n\
                  Configuration lives in a TOML file (see `--config`); every key can also\n\
                  be supplied through ALMANAC_* environment variables."
)]
pub struct Cli {
    /// Path to the config file (defaults to the per-user location)
    #[arg(long, global = true, value_name = "PATH", env = "ALMANAC_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Create the local workspace and the remote container structure")]
    Init(init::InitArgs),

    #[command(about = "Reconcile local entities with the remote workspace")]
    Sync(sync::SyncArgs),

    #[command(about = "Show the items of a smart list")]
    List(list::ListArgs),

    #[command(about = "Remove duplicate-name entities from both stores")]
    Gc(gc::GcArgs),

    #[command(subcommand, about = "Manage persons")]
    Person(person::PersonCommand),

    #[command(about = "Generate shell completions")]
    Completion(completion::CompletionArgs),
}
