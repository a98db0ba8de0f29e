//! JSON:API document CLI
//!
//! Command-line interface for linting and classifying JSON:API request
//! documents.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;

use jsonapi_adapter::{
    classify_operation, lint, load_document, AtomicOperationObject, Data, FileStatus,
    OperationCode, Severity,
};

#[derive(Parser)]
#[command(name = "jsonapi-adapter")]
#[command(about = "Lint and classify JSON:API request documents")]
#[command(version)]
struct Cli {
    /// Enable debug logging on stderr
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lint request document files for structural errors
    Lint {
        /// File or directory to lint
        path: PathBuf,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,

        /// Suppress progress output, only show problems
        #[arg(long, short)]
        quiet: bool,
    },

    /// Classify the entries of an operations document
    Classify {
        /// Operations document file
        file: PathBuf,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Lint {
            path,
            format,
            strict,
            quiet,
        } => run_lint(&path, &format, strict, quiet),

        Commands::Classify { file, format } => run_classify(&file, &format),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "jsonapi_adapter=debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_lint(path: &Path, format: &str, strict: bool, quiet: bool) -> Result<(), u8> {
    if !path.exists() {
        eprintln!("Error: path not found: {}", path.display());
        return Err(2);
    }

    let result = lint(path, strict);

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&result).unwrap());
    } else {
        if !quiet {
            println!("Linting {} ...\n", path.display());
        }

        for file_result in &result.results {
            let status_icon = match file_result.status {
                FileStatus::Ok => "\x1b[32m✓\x1b[0m",
                FileStatus::Warning => "\x1b[33m⚠\x1b[0m",
                FileStatus::Error => "\x1b[31m✗\x1b[0m",
            };

            if !quiet || file_result.status != FileStatus::Ok {
                println!("  {} {}", status_icon, file_result.file.display());
            }

            for diagnostic in &file_result.diagnostics {
                let (label, color) = match diagnostic.severity {
                    Severity::Error => ("error", "\x1b[31m"),
                    Severity::Warning => ("warning", "\x1b[33m"),
                };
                if !quiet || diagnostic.severity == Severity::Error {
                    println!(
                        "    {}{}[{}]\x1b[0m {}: {}",
                        color, label, diagnostic.code, diagnostic.path, diagnostic.message
                    );
                }
            }
        }

        println!();
        if result.failed == 0 {
            println!(
                "\x1b[32m✓ {} files checked, all passed\x1b[0m",
                result.files_checked
            );
        } else {
            println!(
                "\x1b[31m✗ {} files checked: {} passed, {} failed ({} errors, {} warnings)\x1b[0m",
                result.files_checked, result.passed, result.failed, result.errors, result.warnings
            );
        }
    }

    if result.failed == 0 {
        Ok(())
    } else {
        Err(1)
    }
}

/// One row of `classify` output.
#[derive(Serialize)]
struct EntrySummary<'a> {
    index: usize,
    op: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    type_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lid: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    relationship: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'static str>,
}

fn entry_summary(index: usize, operation: &AtomicOperationObject) -> EntrySummary<'_> {
    let kind = classify_operation(operation);
    let identity = match &operation.reference {
        Some(reference) => Some(reference.identity()),
        None => match &operation.data {
            Data::One(resource) => Some(resource.identity()),
            _ => None,
        },
    };
    let error = match kind {
        Some(_) => None,
        None if operation.op == OperationCode::Remove => Some("'remove' requires a 'ref' element"),
        None => Some("'add' with a 'ref' requires a 'relationship'"),
    };

    EntrySummary {
        index,
        op: operation.op.as_str(),
        kind: kind.map(|kind| kind.as_str()),
        type_name: identity.and_then(|identity| identity.type_name),
        id: identity.and_then(|identity| identity.id),
        lid: identity.and_then(|identity| identity.lid),
        relationship: operation
            .reference
            .as_ref()
            .and_then(|reference| reference.relationship.as_deref()),
        error,
    }
}

fn describe_target(summary: &EntrySummary<'_>) -> String {
    let mut parts = Vec::new();
    if let Some(type_name) = summary.type_name {
        parts.push(format!("type={type_name}"));
    }
    if let Some(id) = summary.id {
        parts.push(format!("id={id}"));
    }
    if let Some(lid) = summary.lid {
        parts.push(format!("lid={lid}"));
    }
    if let Some(relationship) = summary.relationship {
        parts.push(format!("relationship={relationship}"));
    }
    parts.join(" ")
}

fn run_classify(file: &Path, format: &str) -> Result<(), u8> {
    let document = load_document(file).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let Some(operations) = document.operations.as_deref() else {
        eprintln!("Error: {} is not an operations document", file.display());
        return Err(2);
    };

    let summaries: Vec<EntrySummary<'_>> = operations
        .iter()
        .enumerate()
        .map(|(index, operation)| entry_summary(index, operation))
        .collect();
    let unclassified = summaries.iter().filter(|s| s.kind.is_none()).count();

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&summaries).unwrap());
    } else {
        for summary in &summaries {
            match (summary.kind, summary.error) {
                (Some(kind), _) => {
                    let target = describe_target(summary);
                    if target.is_empty() {
                        println!("[{}] {} -> {}", summary.index, summary.op, kind);
                    } else {
                        println!("[{}] {} -> {}  {}", summary.index, summary.op, kind, target);
                    }
                }
                (None, error) => println!(
                    "[{}] {} -> cannot classify: {}",
                    summary.index,
                    summary.op,
                    error.unwrap_or("invalid shape")
                ),
            }
        }
    }

    if unclassified == 0 {
        Ok(())
    } else {
        Err(1)
    }
}
