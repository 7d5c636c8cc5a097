use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use crabql::errors::Error;
use crabql::storage::Table;
use crabql::repl;

/// A small single-table, single-file embedded database with an
/// interactive prompt.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Path to the database file. Created if it doesn't exist.
    db_path: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match run(&cli.db_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(%e, "exiting");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(db_path: &std::path::Path) -> Result<(), Error> {
    let mut table = Table::open(db_path)?;
    repl::run(&mut table)
}
