//! uevm executes EVM state transitions from JSON fixtures.

mod fixture;
mod runner;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::filter::LevelFilter;

use crate::runner::RunOptions;

#[derive(Parser)]
#[command(name = "uevm", version, about = "the uevm command line interface")]
struct Cli {
    /// Output full trace logs
    #[arg(long, global = true)]
    debug: bool,
    /// Output trace logs in machine readable format (json)
    #[arg(long, global = true)]
    json: bool,
    /// Disable memory output
    #[arg(long = "nomemory", global = true)]
    nomemory: bool,
    /// Disable stack output
    #[arg(long = "nostack", global = true)]
    nostack: bool,
    /// Dump the state after the run
    #[arg(long, global = true)]
    dump: bool,
    /// Sets the verbosity level
    #[arg(long, value_name = "N", default_value_t = 3, global = true)]
    verbosity: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Executes the given state transition
    Apply {
        /// JSON file with prestate and transactions
        file: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbosity);

    let options = RunOptions {
        debug: cli.debug,
        json: cli.json,
        disable_memory: cli.nomemory,
        disable_stack: cli.nostack,
        dump: cli.dump,
    };
    match &cli.command {
        Command::Apply { file } => match runner::apply(file, &options) {
            Ok(()) => ExitCode::SUCCESS,
            Err(error) => {
                eprintln!("{error}");
                ExitCode::FAILURE
            }
        },
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::OFF,
        1 => LevelFilter::ERROR,
        2 => LevelFilter::WARN,
        3 => LevelFilter::INFO,
        4 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}
