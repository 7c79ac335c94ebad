//! # Upload CLI: Template and offline checks for bulk upload files.
//!
//! ## Usage
//!
//! ```bash
//! # Print the template to stdout, or write it to a file:
//! parcel template
//! parcel template --output shipments_template.csv
//!
//! # Check a file; exits 2 when any row would be rejected:
//! parcel check shipments.csv
//! parcel check shipments.csv --json
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use parcel_ingest::{check, template_csv, CheckReport};

/// Exit code when the file is readable but some rows are invalid.
pub const EXIT_INVALID_ROWS: u8 = 2;

/// `parcel template` arguments.
#[derive(Args, Debug)]
pub struct TemplateArgs {
    /// Write the template here instead of stdout.
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

/// `parcel check` arguments.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// CSV file to check.
    pub file: PathBuf,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Execute `parcel template`.
pub fn run_template(args: &TemplateArgs) -> Result<u8> {
    let template = template_csv();
    match &args.output {
        Some(path) => {
            std::fs::write(path, template)
                .with_context(|| format!("failed to write template to {}", path.display()))?;
            tracing::info!(path = %path.display(), "template written");
        }
        None => print!("{template}"),
    }
    Ok(0)
}

/// Execute `parcel check`.
pub fn run_check(args: &CheckArgs) -> Result<u8> {
    let report = check_file(&args.file)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render(&report));
    }
    Ok(if report.errors.is_empty() {
        0
    } else {
        EXIT_INVALID_ROWS
    })
}

/// Read and check one file.
pub fn check_file(path: &Path) -> Result<CheckReport> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let report =
        check(&bytes).with_context(|| format!("{} is not a usable upload", path.display()))?;
    tracing::debug!(
        total = report.total,
        valid = report.valid,
        "upload file checked"
    );
    Ok(report)
}

fn render(report: &CheckReport) -> String {
    let mut out = String::new();
    for error in &report.errors {
        out.push_str(&format!("  row {:<5} {:<20} {}\n", error.row, error.code, error.error));
    }
    if !report.ignored_columns.is_empty() {
        out.push_str(&format!(
            "Ignored columns: {}\n",
            report.ignored_columns.join(", ")
        ));
    }
    out.push_str(&format!(
        "{} of {} rows valid\n",
        report.valid, report.total
    ));
    out
}
