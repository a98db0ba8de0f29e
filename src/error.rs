//! Error types for document conversion, graph construction and file loading.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::position::PositionTracker;

/// Boxed error used to chain underlying failures (id parsing, attribute
/// decoding) into a [`ConversionError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A single conversion failure with the position it was raised at.
///
/// Carries the JSON pointer of the offending element, a stable title, an
/// optional detail and an HTTP status (422 unless a rule overrides it).
/// The title and detail strings are part of the public contract; callers
/// render them verbatim into JSON:API error documents.
#[derive(Debug)]
pub struct ConversionError {
    pointer: Option<String>,
    title: String,
    detail: Option<String>,
    status: u16,
    source: Option<BoxError>,
}

impl ConversionError {
    /// Creates a 422 error at the tracker's current position.
    pub fn new(
        position: &PositionTracker,
        title: impl Into<String>,
        detail: Option<String>,
    ) -> ConversionError {
        ConversionError {
            pointer: position.to_pointer(),
            title: title.into(),
            detail,
            status: 422,
            source: None,
        }
    }

    /// Overrides the HTTP status, for the 403/409 rules.
    pub fn with_status(mut self, status: u16) -> ConversionError {
        self.status = status;
        self
    }

    /// Chains the underlying failure that caused this error.
    pub fn with_source(mut self, source: BoxError) -> ConversionError {
        self.source = Some(source);
        self
    }

    /// JSON pointer usable as `error.source.pointer`, if any element was
    /// entered before the failure.
    pub fn pointer(&self) -> Option<&str> {
        self.pointer.as_deref()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Renders this error as a serializable JSON:API error object.
    pub fn to_error_object(&self) -> ErrorObject {
        ErrorObject {
            status: self.status.to_string(),
            title: self.title.clone(),
            detail: self.detail.clone(),
            source: self.pointer.as_ref().map(|pointer| ErrorSource {
                pointer: pointer.clone(),
            }),
        }
    }
}

impl std::fmt::Display for ConversionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.pointer {
            Some(pointer) => write!(f, "{}: {}", pointer, self.title)?,
            None => write!(f, "{}", self.title)?,
        }
        if let Some(detail) = &self.detail {
            write!(f, " {detail}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ConversionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn std::error::Error + 'static))
    }
}

/// Serializable member of a JSON:API error document.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorObject {
    pub status: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ErrorSource>,
}

/// The `source` member of a JSON:API error object.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorSource {
    pub pointer: String,
}

/// Errors raised while building a resource graph.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("resource type '{name}' is registered twice")]
    DuplicateResourceType { name: String },

    #[error("field '{name}' is registered twice on resource type '{resource_type}'")]
    DuplicateField { resource_type: String, name: String },

    #[error(
        "relationship '{relationship}' on resource type '{resource_type}' references unknown resource type '{right_type}'"
    )]
    UnknownRightType {
        resource_type: String,
        relationship: String,
        right_type: String,
    },

    #[error("resource type '{resource_type}' extends unknown resource type '{base}'")]
    UnknownBaseType { resource_type: String, base: String },

    #[error(
        "compound attribute '{attribute}' on '{resource_type}' uses an unregistered compound type"
    )]
    UnknownCompoundType {
        resource_type: String,
        attribute: String,
    },
}

/// Errors while loading a document from disk.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("not a JSON:API document: {source}")]
    InvalidDocument {
        #[source]
        source: serde_json::Error,
    },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadFailed { .. } => 3,
            LoadError::InvalidJson { .. } | LoadError::InvalidDocument { .. } => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn display_without_pointer() {
        let position = PositionTracker::new();
        let error = ConversionError::new(&position, "No operations found.", None);

        assert_eq!(error.to_string(), "No operations found.");
        assert_eq!(error.status(), 422);
        assert!(error.pointer().is_none());
    }

    #[test]
    fn display_with_pointer_and_detail() {
        let position = PositionTracker::new();
        let _data = position.push_element("data");
        let _id = position.push_element("id");

        let error = ConversionError::new(
            &position,
            "Conflicting 'id' values found.",
            Some("Expected '1' instead of '2'.".to_owned()),
        )
        .with_status(409);

        assert_eq!(
            error.to_string(),
            "/data/id: Conflicting 'id' values found. Expected '1' instead of '2'."
        );
        assert_eq!(error.status(), 409);
        assert_eq!(error.pointer(), Some("/data/id"));
    }

    #[test]
    fn error_object_serialization() {
        let position = PositionTracker::new();
        let _data = position.push_element("data");

        let error = ConversionError::new(&position, "The 'type' element is required.", None);
        let value = serde_json::to_value(error.to_error_object()).unwrap();

        assert_eq!(
            value,
            json!({
                "status": "422",
                "title": "The 'type' element is required.",
                "source": { "pointer": "/data" }
            })
        );
    }

    #[test]
    fn source_is_chained() {
        let parse_failure: BoxError = "invalid digit found in string".into();
        let position = PositionTracker::new();
        let error = ConversionError::new(&position, "Incompatible 'id' value found.", None)
            .with_source(parse_failure);

        let chained = std::error::Error::source(&error).unwrap();
        assert_eq!(chained.to_string(), "invalid digit found in string");
    }

    #[test]
    fn load_error_exit_codes() {
        let err = LoadError::FileNotFound {
            path: PathBuf::from("missing.json"),
        };
        assert_eq!(err.exit_code(), 3);

        let err = LoadError::InvalidJson {
            source: serde_json::from_str::<serde_json::Value>("{").unwrap_err(),
        };
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn graph_error_names_the_offender() {
        let err = GraphError::UnknownRightType {
            resource_type: "workItems".into(),
            relationship: "assignee".into(),
            right_type: "people".into(),
        };
        assert_eq!(
            err.to_string(),
            "relationship 'assignee' on resource type 'workItems' references unknown resource type 'people'"
        );
    }
}
