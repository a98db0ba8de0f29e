//! Static analysis of request document files.
//!
//! Catches the problems that are decidable without a resource graph:
//! - JSON syntax errors and non-document shapes
//! - resource identity issues (missing `type`, conflicting `id`/`lid`)
//! - operation entries that break the op/ref rules
//! - relationship objects without a `data` member
//!
//! Everything the linter flags as an error would also be rejected during
//! conversion; linting catches it without a server round-trip.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::document::{
    AtomicOperationObject, Data, Document, OperationCode, ResourceIdentity, ResourceObject,
};
use crate::loader::{document_from_value, load_value};

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic message from linting.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub file: PathBuf,
    /// Pointer to the issue (e.g. `/atomic:operations[0]/ref`), `/` for
    /// document-level problems.
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn new(
        severity: Severity,
        code: &str,
        file: &Path,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Diagnostic {
        Diagnostic {
            severity,
            code: code.to_owned(),
            file: file.to_path_buf(),
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Status of a linted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Ok,
    Error,
    Warning,
}

/// Result of linting a single file.
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub file: PathBuf,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Result of linting a file or directory tree.
#[derive(Debug, Clone, Serialize)]
pub struct LintResult {
    pub path: PathBuf,
    pub files_checked: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
    pub results: Vec<FileResult>,
}

impl LintResult {
    /// Returns true if no file produced an error.
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }
}

/// Lint a file or directory.
///
/// Directories are walked recursively for `.json` files. If `strict` is
/// true, files with warnings count as failed.
pub fn lint(path: &Path, strict: bool) -> LintResult {
    let files = collect_document_files(path);
    let results: Vec<FileResult> = files.iter().map(|file| lint_file(file, path)).collect();

    let errors = count_severity(&results, Severity::Error);
    let warnings = count_severity(&results, Severity::Warning);
    let failed = results
        .iter()
        .filter(|result| {
            if strict {
                result.status != FileStatus::Ok
            } else {
                result.status == FileStatus::Error
            }
        })
        .count();

    LintResult {
        path: path.to_path_buf(),
        files_checked: results.len(),
        passed: results.len() - failed,
        failed,
        errors,
        warnings,
        results,
    }
}

/// Lint a single request document file.
pub fn lint_file(file: &Path, base_path: &Path) -> FileResult {
    let mut diagnostics = Vec::new();

    let value = match load_value(file) {
        Ok(value) => value,
        Err(error) => {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "E001",
                file,
                "/",
                error.to_string(),
            ));
            return finish(file, base_path, diagnostics);
        }
    };

    match document_from_value(value) {
        Ok(document) => check_document(&document, file, &mut diagnostics),
        Err(error) => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "E002",
            file,
            "/",
            error.to_string(),
        )),
    }

    finish(file, base_path, diagnostics)
}

fn finish(file: &Path, base_path: &Path, diagnostics: Vec<Diagnostic>) -> FileResult {
    let has_errors = diagnostics
        .iter()
        .any(|diagnostic| diagnostic.severity == Severity::Error);
    let has_warnings = diagnostics
        .iter()
        .any(|diagnostic| diagnostic.severity == Severity::Warning);

    let status = if has_errors {
        FileStatus::Error
    } else if has_warnings {
        FileStatus::Warning
    } else {
        FileStatus::Ok
    };

    FileResult {
        file: file.strip_prefix(base_path).unwrap_or(file).to_path_buf(),
        status,
        diagnostics,
    }
}

fn count_severity(results: &[FileResult], severity: Severity) -> usize {
    results
        .iter()
        .flat_map(|result| &result.diagnostics)
        .filter(|diagnostic| diagnostic.severity == severity)
        .count()
}

fn check_document(document: &Document, file: &Path, diagnostics: &mut Vec<Diagnostic>) {
    let has_operations = document.operations.is_some();
    if document.data.is_absent() && !has_operations {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "W001",
            file,
            "/",
            "document has neither 'data' nor 'atomic:operations'",
        ));
    }
    if !document.data.is_absent() && has_operations {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "W002",
            file,
            "/",
            "'data' is ignored when 'atomic:operations' is present",
        ));
    }

    check_data(&document.data, file, "/data", diagnostics);

    if let Some(operations) = &document.operations {
        if operations.is_empty() {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "E007",
                file,
                "/atomic:operations",
                "'atomic:operations' is empty",
            ));
        }
        for (index, operation) in operations.iter().enumerate() {
            let entry_path = format!("/atomic:operations[{index}]");
            check_operation(operation, file, &entry_path, diagnostics);
        }
    }
}

fn check_data(data: &Data, file: &Path, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    match data {
        Data::One(resource) => check_resource_object(resource, file, path, diagnostics),
        Data::Many(resources) => {
            for (index, resource) in resources.iter().enumerate() {
                check_resource_object(resource, file, &format!("{path}[{index}]"), diagnostics);
            }
        }
        Data::Absent | Data::Null => {}
    }
}

fn check_resource_object(
    resource: &ResourceObject,
    file: &Path,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    check_identity(resource.identity(), file, path, diagnostics);

    for (name, relationship) in resource.relationships.iter() {
        let relationship_path = format!("{path}/relationships/{name}");
        if relationship.data.is_absent() {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "E008",
                file,
                relationship_path,
                "relationship object has no 'data' member",
            ));
        } else {
            check_data(
                &relationship.data,
                file,
                &format!("{relationship_path}/data"),
                diagnostics,
            );
        }
    }
}

fn check_identity(
    identity: ResourceIdentity<'_>,
    file: &Path,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if identity.type_name.is_none() {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "E003",
            file,
            path,
            "missing 'type' member",
        ));
    }
    if identity.id.is_some() && identity.lid.is_some() {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "E004",
            file,
            path,
            "'id' and 'lid' are mutually exclusive",
        ));
    }
}

fn check_operation(
    operation: &AtomicOperationObject,
    file: &Path,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if operation.href.is_some() {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "E005",
            file,
            format!("{path}/href"),
            "'href' is not supported",
        ));
    }

    match &operation.reference {
        Some(reference) => {
            let ref_path = format!("{path}/ref");
            check_identity(reference.identity(), file, &ref_path, diagnostics);

            if reference.id.is_none() && reference.lid.is_none() {
                diagnostics.push(Diagnostic::new(
                    Severity::Error,
                    "E006",
                    file,
                    ref_path.clone(),
                    "'ref' requires an 'id' or 'lid'",
                ));
            }
            if operation.op == OperationCode::Add && reference.relationship.is_none() {
                diagnostics.push(Diagnostic::new(
                    Severity::Error,
                    "E006",
                    file,
                    ref_path,
                    "'add' with a 'ref' requires a 'relationship'",
                ));
            }
        }
        None => {
            if operation.op == OperationCode::Remove {
                diagnostics.push(Diagnostic::new(
                    Severity::Error,
                    "E006",
                    file,
                    path,
                    "'remove' requires a 'ref' element",
                ));
            }
        }
    }

    check_data(&operation.data, file, &format!("{path}/data"), diagnostics);
}

/// Collect all `.json` files in a path (file or directory).
fn collect_document_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }

    let mut files = Vec::new();
    collect_files_recursive(path, &mut files);
    files.sort();
    files
}

fn collect_files_recursive(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files_recursive(&path, files);
        } else if path.extension().is_some_and(|extension| extension == "json") {
            files.push(path);
        }
    }
}
