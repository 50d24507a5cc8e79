//! Command line arguments

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "vetter")]
#[command(about = "Validate and normalize YAML or JSON documents against a schema", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Validate documents and print a report for each
    Validate(ValidateArgs),

    /// Print the normalized form of a document
    Normalize(NormalizeArgs),
}

/// Options shared by every command that builds a validator.
#[derive(Debug, Args)]
pub struct SchemaArgs {
    /// Schema file (YAML or JSON)
    #[arg(short, long)]
    pub schema: PathBuf,

    /// Validator settings file
    #[arg(short, long, env = "VETTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// File with named schemas and rules sets
    #[arg(short, long)]
    pub registry: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub schema: SchemaArgs,

    /// Skip required-field checks
    #[arg(long)]
    pub update: bool,

    /// Validate documents as given, without normalizing them first
    #[arg(long)]
    pub no_normalize: bool,

    /// Documents to validate
    #[arg(required = true)]
    pub documents: Vec<PathBuf>,
}

#[derive(Debug, Args)]
pub struct NormalizeArgs {
    #[command(flatten)]
    pub schema: SchemaArgs,

    /// Document to normalize
    pub document: PathBuf,
}

impl Cli {
    /// Log level picked by the verbosity flags when `RUST_LOG` is unset.
    pub fn log_level(&self) -> tracing::Level {
        if self.debug {
            tracing::Level::TRACE
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        }
    }
}
