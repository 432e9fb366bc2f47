//! depscan -- command-line front end for the dependency scanner.

mod cli;
mod commands;
mod error;
mod logging;
mod output;

use clap::Parser;

use depscan_core::config::DepscanConfig;

use crate::cli::{Cli, Commands};
use crate::error::CliError;
use crate::output::OutputWriter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut general = DepscanConfig::load_or_default(&cli.config)
        .await
        .map(|c| c.general)
        .unwrap_or_default();
    if let Some(level) = cli.log_level {
        general.log_level = level;
    }
    logging::init_tracing(&general).map_err(|e| CliError::Config(e.to_string()))?;

    depscan_core::metrics::describe_all();
    tracing::debug!(config = %cli.config.display(), "depscan starting");

    let writer = OutputWriter::new(cli.output);
    match cli.command {
        Commands::Scan(args) => commands::scan::execute(args, &cli.config, &writer).await,
        Commands::Analyzers(args) => commands::analyzers::execute(args, &writer),
        Commands::Config(args) => commands::config::execute(args, &cli.config, &writer).await,
    }
}
