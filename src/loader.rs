//! Document loading from files and strings.
//!
//! Loading happens in two steps: the raw JSON parse and the typed parse into
//! [`Document`]. Keeping them separate lets callers tell a file that is not
//! JSON apart from one that is JSON but not a request document.

use std::path::Path;

use serde_json::Value;

use crate::document::Document;
use crate::error::LoadError;

/// Load a file as a raw JSON value.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// `LoadError::ReadFailed` if it cannot be read, or
/// `LoadError::InvalidJson` if the contents aren't valid JSON.
pub fn load_value(path: &Path) -> Result<Value, LoadError> {
    let content = read_file(path)?;
    serde_json::from_str(&content).map_err(|source| LoadError::InvalidJson { source })
}

/// Parse a string as a raw JSON value.
///
/// # Errors
///
/// Returns `LoadError::InvalidJson` if the string isn't valid JSON.
pub fn load_value_str(content: &str) -> Result<Value, LoadError> {
    serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source })
}

/// Load a file as a typed request document.
///
/// # Errors
///
/// Returns the `load_value` errors, or `LoadError::InvalidDocument` if the
/// JSON does not have the shape of a JSON:API request document.
pub fn load_document(path: &Path) -> Result<Document, LoadError> {
    let value = load_value(path)?;
    document_from_value(value)
}

/// Parse a string as a typed request document.
///
/// # Errors
///
/// Returns `LoadError::InvalidJson` or `LoadError::InvalidDocument`.
pub fn load_document_str(content: &str) -> Result<Document, LoadError> {
    let value = load_value_str(content)?;
    document_from_value(value)
}

/// Convert an already-parsed JSON value into a typed request document.
pub fn document_from_value(value: Value) -> Result<Document, LoadError> {
    serde_json::from_value(value).map_err(|source| LoadError::InvalidDocument { source })
}

fn read_file(path: &Path) -> Result<String, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    std::fs::read_to_string(path).map_err(|source| LoadError::ReadFailed {
        path: path.to_path_buf(),
        source,
    })
}
