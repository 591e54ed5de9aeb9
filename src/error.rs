//! Error types for schema fetching, composition and request framing.

use std::path::PathBuf;
use thiserror::Error;

use crate::types::Shape;

/// Errors while fetching and dereferencing schema documents.
#[derive(Debug, Error)]
pub enum FetchError {
    // Lookup errors (exit code 3)
    #[error("no schema documents found for '{identifier}'")]
    NotFound { identifier: String },

    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Data errors (exit code 2)
    #[error("identifier '{identifier}' matches more than one record: {}", records.join(", "))]
    Ambiguous {
        identifier: String,
        records: Vec<String>,
    },

    #[error("malformed schema document {document}: {message}")]
    Malformed { document: String, message: String },
}

impl FetchError {
    pub(crate) fn malformed(document: impl Into<String>, message: impl Into<String>) -> Self {
        FetchError::Malformed {
            document: document.into(),
            message: message.into(),
        }
    }

    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            FetchError::NotFound { .. } | FetchError::Read { .. } => 3,
            FetchError::Ambiguous { .. } | FetchError::Malformed { .. } => 2,
        }
    }
}

/// Errors while folding an ordered corpus into one composite document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComposeError {
    /// Two documents disagree on the shape of the same field.
    ///
    /// `shapes` is kept in canonical order so the error does not depend on
    /// which document was merged first.
    #[error("Type conflict for property '{field}': {} vs {}", shapes.0, shapes.1)]
    Conflict {
        field: String,
        /// JSON Pointer (RFC 6901) of the field inside the composite.
        path: String,
        shapes: (Shape, Shape),
    },

    #[error("composite is not a valid JSON Schema: {message}")]
    InvalidComposite { message: String },
}

impl ComposeError {
    pub(crate) fn conflict(field: &str, path: &str, stored: Shape, incoming: Shape) -> Self {
        let shapes = if stored <= incoming {
            (stored, incoming)
        } else {
            (incoming, stored)
        };
        ComposeError::Conflict {
            field: field.to_string(),
            path: path.to_string(),
            shapes,
        }
    }

    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

/// Errors in the caller-supplied identifier list.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("identifier list is not a single JSON array of strings: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported content type \"{value}\": expected application/json or text/plain")]
    UnsupportedContentType { value: String },

    #[error("no identifiers supplied")]
    Empty,
}

impl InputError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_exit_codes() {
        let err = FetchError::NotFound {
            identifier: "r1".into(),
        };
        assert_eq!(err.exit_code(), 3);

        let err = FetchError::Ambiguous {
            identifier: "r1".into(),
            records: vec!["R1".into(), "r1.json".into()],
        };
        assert_eq!(err.exit_code(), 2);

        let err = FetchError::malformed("one.json", "fragment not found: #/x");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn ambiguous_lists_records() {
        let err = FetchError::Ambiguous {
            identifier: "forms".into(),
            records: vec!["Forms".into(), "forms".into()],
        };
        assert_eq!(
            err.to_string(),
            "identifier 'forms' matches more than one record: Forms, forms"
        );
    }

    #[test]
    fn conflict_display() {
        let err = ComposeError::conflict("key", "/key", Shape::Array, Shape::Scalar);
        assert_eq!(
            err.to_string(),
            "Type conflict for property 'key': ARRAY vs STRING/NUMBER"
        );
    }

    #[test]
    fn conflict_shapes_are_canonical() {
        let a = ComposeError::conflict("key", "/key", Shape::Scalar, Shape::Array);
        let b = ComposeError::conflict("key", "/key", Shape::Array, Shape::Scalar);
        assert_eq!(a, b);
    }
}
