// SPDX-FileCopyrightText: 2026 Tempo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! tempo-db - maintenance tool for the Tempo client database.
//!
//! Opens the database the same way the client does and runs one
//! maintenance command against it.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod backup;
mod maintenance;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tempo_core::TempoError;
use tempo_storage::ContextFactory;

/// tempo-db - maintenance tool for the Tempo client database.
#[derive(Parser, Debug)]
#[command(name = "tempo-db", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Show database location, schema version, health and record counts.
    Status {
        /// Output structured JSON instead of text.
        #[arg(long)]
        json: bool,
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
    /// Bring the database schema up to date.
    Migrate,
    /// Delete the database. Everything stored in it is lost.
    Reset {
        /// Confirm the reset.
        #[arg(long)]
        yes: bool,
    },
    /// Purge deleted records and collect unreferenced file blobs.
    Cleanup,
    /// Copy the database to `path` while all operations are blocked.
    Backup {
        /// Destination file.
        path: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match tempo_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            tempo_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.logging.level);
    tempo_storage::register_metrics();

    if let Err(e) = run(cli.command, config.storage) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(command: Commands, storage: tempo_config::StorageConfig) -> Result<(), TempoError> {
    match command {
        Commands::Migrate => maintenance::run_migrate(&storage.database_path()),
        Commands::Reset { yes: false } => {
            eprintln!("tempo-db reset deletes {}", storage.database_path().display());
            eprintln!("Re-run with --yes to confirm.");
            std::process::exit(2);
        }
        Commands::Reset { yes: true } => with_factory(storage, maintenance::run_reset),
        Commands::Status { json, plain } => {
            with_factory(storage, |factory| status::run_status(factory, json, plain))
        }
        Commands::Cleanup => {
            with_factory(storage, |factory| maintenance::run_cleanup(factory).map(|_| ()))
        }
        Commands::Backup { path } => {
            with_factory(storage, |factory| backup::run_backup(factory, &path).map(|_| ()))
        }
    }
}

/// Open the database, run `f`, then drain and close it again.
fn with_factory(
    storage: tempo_config::StorageConfig,
    f: impl FnOnce(&ContextFactory) -> Result<(), TempoError>,
) -> Result<(), TempoError> {
    let factory = ContextFactory::open(storage)?;
    let result = f(&factory);
    factory.close()?;
    result
}

/// Initialize the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tempo={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}
