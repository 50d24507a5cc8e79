//! Library interface for the vetter CLI

pub mod cli;
pub mod load;
pub mod normalize;
pub mod validate;

use anyhow::Result;
use std::io::Write;

pub use cli::{Cli, Commands, NormalizeArgs, SchemaArgs, ValidateArgs};
pub use validate::DocumentReport;

/// Run a parsed command. `Ok(false)` means a document failed.
pub fn run(cli: &Cli, out: &mut impl Write, err: &mut impl Write) -> Result<bool> {
    match &cli.command {
        Commands::Validate(args) => validate::run_validate(args, out),
        Commands::Normalize(args) => normalize::run_normalize(args, out, err),
    }
}
