//! Core types for schema fetching and composition.

use std::fmt;

use serde_json::Value;

use crate::error::FetchError;

/// Top-level keys excluded from merging and conflict checks.
pub const IGNORABLE_PREAMBLE: &[&str] = &["title", "description", "$id", "$schema", "$comment"];

/// Reserved key marking a reference.
pub const REF_KEY: &str = "$ref";

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// One form-schema document, identified by its top-level `$id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) directory: String,
    pub(crate) value: Value,
}

impl Document {
    /// Wrap a raw JSON value.
    ///
    /// The name is the final `/`-separated segment of `$id` and the directory
    /// is everything before it.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Malformed` if the value is not an object or has no
    /// non-empty string `$id`.
    pub fn from_value(value: Value) -> Result<Self, FetchError> {
        let id = match &value {
            Value::Object(map) => match map.get("$id") {
                Some(Value::String(id)) if !id.is_empty() => id.clone(),
                Some(other) if !other.is_string() => {
                    return Err(FetchError::malformed(
                        "<unknown>",
                        format!("$id must be a string, got {}", json_type_name(other)),
                    ))
                }
                _ => return Err(FetchError::malformed("<unknown>", "missing $id")),
            },
            other => {
                return Err(FetchError::malformed(
                    "<unknown>",
                    format!("expected object, got {}", json_type_name(other)),
                ))
            }
        };

        let (directory, name) = match id.rfind('/') {
            Some(idx) => (id[..idx].to_string(), id[idx + 1..].to_string()),
            None => (String::new(), id.clone()),
        };

        Ok(Self {
            id,
            name,
            directory,
            value,
        })
    }

    /// Override the directory used to resolve relative references.
    ///
    /// Sources that know where a document is stored set this to the storage
    /// location's parent so sibling files resolve next to it.
    pub fn with_directory(mut self, directory: impl Into<String>) -> Self {
        self.directory = directory.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn directory(&self) -> &str {
        &self.directory
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Number of keys under `definitions.form.properties`.
    pub fn form_property_count(&self) -> usize {
        self.value
            .pointer("/definitions/form/properties")
            .and_then(Value::as_object)
            .map_or(0, |props| props.len())
    }
}

/// A parsed `$ref` value.
///
/// `one.json#/definitions/x` has document `one.json` and pointer
/// `/definitions/x`; `#/definitions/x` has no document part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference<'a> {
    pub document: Option<&'a str>,
    pub pointer: &'a str,
}

impl<'a> Reference<'a> {
    pub fn parse(raw: &'a str) -> Self {
        let (document, pointer) = match raw.find('#') {
            Some(idx) => (&raw[..idx], &raw[idx + 1..]),
            None => (raw, ""),
        };
        Reference {
            document: (!document.is_empty()).then_some(document),
            pointer,
        }
    }

    /// Final path segment of the document part.
    pub fn document_name(&self) -> Option<&'a str> {
        self.document
            .map(|doc| doc.rsplit('/').next().unwrap_or(doc))
    }

    /// True if the document part names the document called `name`.
    pub fn targets(&self, name: &str) -> bool {
        self.document_name() == Some(name)
    }
}

/// Structural shape of a JSON value, as reported in merge conflicts.
///
/// Ordering is the canonical order used when naming both sides of a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Shape {
    Array,
    Object,
    /// Strings, numbers and booleans.
    Scalar,
    Null,
}

impl Shape {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Array(_) => Shape::Array,
            Value::Object(_) => Shape::Object,
            Value::Null => Shape::Null,
            Value::Bool(_) | Value::Number(_) | Value::String(_) => Shape::Scalar,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Shape::Array => "ARRAY",
            Shape::Object => "OBJECT",
            Shape::Scalar => "STRING/NUMBER",
            Shape::Null => "NULL",
        })
    }
}

/// How the unmerged corpus is rendered when composition hits a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackFormat {
    /// A well-formed JSON array of documents.
    #[default]
    JsonArray,
    /// Object literals joined with commas and no enclosing brackets.
    Concatenated,
}

impl FallbackFormat {
    /// Parse a fallback format name.
    ///
    /// Returns `None` for unknown values (caller should error).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "array" => Some(FallbackFormat::JsonArray),
            "concat" => Some(FallbackFormat::Concatenated),
            _ => None,
        }
    }
}

/// Framing of a caller-supplied identifier list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFraming {
    /// One JSON array of strings.
    Json,
    /// One identifier per line.
    Lines,
}

impl InputFraming {
    /// Pick the framing from a declared content type.
    ///
    /// Parameters such as `; charset=utf-8` are ignored. Returns `None` for
    /// unsupported media types.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let media = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        match media.as_str() {
            "application/json" => Some(InputFraming::Json),
            "text/plain" => Some(InputFraming::Lines),
            _ => None,
        }
    }
}
