//! Racelog CLI: the `racelog` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Status { race, json } => commands::status::run(race, json),
        Commands::Flags { race, json } => commands::flags::run(race, json),
        Commands::Schedule { race, json } => commands::schedule::run(race, json),
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("racelog=debug")
    } else {
        EnvFilter::new("racelog=info")
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}
