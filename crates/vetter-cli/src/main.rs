use anyhow::Result;
use clap::Parser;
use std::io;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use vetter::Cli;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbosity flags
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level().to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(cli.debug) // Show target module in debug mode
        .init();

    let passed = vetter::run(&cli, &mut io::stdout().lock(), &mut io::stderr())?;
    Ok(if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
