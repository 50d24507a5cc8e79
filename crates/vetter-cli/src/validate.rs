//! The `validate` command

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};
use vetter_engine::{Validator, VetterError};

use crate::cli::ValidateArgs;
use crate::load::{build_validator, load_value};

/// Outcome for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentReport {
    pub document: String,
    pub valid: bool,
    pub errors: Value,
}

/// Validate every document named in `args`.
pub fn validate_documents(args: &ValidateArgs) -> Result<Vec<DocumentReport>> {
    let normalize = if args.no_normalize { Some(false) } else { None };
    let validator = build_validator(&args.schema, normalize)?;

    args.documents
        .iter()
        .map(|path| validate_document(&validator, path, args.update))
        .collect()
}

fn validate_document(validator: &Validator, path: &Path, update: bool) -> Result<DocumentReport> {
    let document = load_value(path)?;
    let outcome = if update {
        validator.validate_update(&document)
    } else {
        validator.validate(&document)
    };

    let report = match outcome {
        Ok(validation) => DocumentReport {
            document: path.display().to_string(),
            valid: validation.is_valid(),
            errors: validation.messages(),
        },
        // Not a mapping: the file is reported, the run goes on.
        Err(VetterError::Document(err)) => DocumentReport {
            document: path.display().to_string(),
            valid: false,
            errors: Value::String(err.to_string()),
        },
        Err(err) => {
            return Err(err).with_context(|| format!("Failed to validate {:?}", path));
        }
    };
    debug!("{}: valid = {}", report.document, report.valid);
    Ok(report)
}

/// Print one JSON line per document. Returns whether all of them passed.
pub fn run_validate(args: &ValidateArgs, out: &mut impl Write) -> Result<bool> {
    let reports = validate_documents(args)?;
    for report in &reports {
        writeln!(out, "{}", serde_json::to_string(report)?)?;
    }

    let failed = reports.iter().filter(|report| !report.valid).count();
    info!("Validated {} documents, {} failed", reports.len(), failed);
    Ok(failed == 0)
}
