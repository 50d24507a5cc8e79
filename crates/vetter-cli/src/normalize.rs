//! The `normalize` command

use anyhow::{Context, Result};
use std::io::Write;
use tracing::warn;
use vetter_engine::{BasicErrorHandler, ErrorHandler};

use crate::cli::NormalizeArgs;
use crate::load::{build_validator, load_value};

/// Print the normalized document to `out` and any normalization errors to
/// `err`. Returns whether normalization went through without errors.
pub fn run_normalize(
    args: &NormalizeArgs,
    out: &mut impl Write,
    err: &mut impl Write,
) -> Result<bool> {
    let validator = build_validator(&args.schema, None)?;
    let document = load_value(&args.document)?;
    let normalization = validator
        .normalized(&document)
        .with_context(|| format!("Failed to normalize {:?}", args.document))?;

    writeln!(out, "{}", serde_json::to_string_pretty(&normalization.document)?)?;

    if normalization.is_clean() {
        return Ok(true);
    }
    warn!(
        "{} normalization errors in {:?}",
        normalization.errors.len(),
        args.document
    );
    let messages = BasicErrorHandler.render(&normalization.errors);
    writeln!(err, "{}", serde_json::to_string_pretty(&messages)?)?;
    Ok(false)
}
