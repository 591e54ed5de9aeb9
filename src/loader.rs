//! Schema loading from files, and JSON Pointer navigation.

use std::path::Path;

use serde_json::Value;

use crate::error::FetchError;

/// Load a JSON value from a file path.
///
/// # Errors
///
/// Returns `FetchError::NotFound` if the file doesn't exist,
/// `FetchError::Read` if it can't be read, or `FetchError::Malformed`
/// if the file isn't valid JSON.
pub fn load_schema(path: &Path) -> Result<Value, FetchError> {
    if !path.exists() {
        return Err(FetchError::NotFound {
            identifier: path.display().to_string(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| FetchError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content)
        .map_err(|e| FetchError::malformed(path.display().to_string(), e.to_string()))
}

/// Navigate a JSON Pointer fragment (e.g. "#/definitions/form" or "/definitions/form").
///
/// An empty fragment addresses the whole document. `document` only labels
/// the error when the pointer doesn't resolve.
pub fn navigate_fragment<'v>(
    schema: &'v Value,
    fragment: &str,
    document: &str,
) -> Result<&'v Value, FetchError> {
    let pointer = fragment.trim_start_matches('#');
    if pointer.is_empty() {
        return Ok(schema);
    }
    if !pointer.starts_with('/') {
        return Err(FetchError::malformed(
            document,
            format!("unsupported fragment: #{}", pointer),
        ));
    }

    // Value::pointer handles ~0/~1 unescaping and array indices
    schema
        .pointer(pointer)
        .ok_or_else(|| FetchError::malformed(document, format!("fragment not found: #{}", pointer)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn load_schema_valid_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"$id": "one.json", "type": "object"}}"#).unwrap();

        let schema = load_schema(file.path()).unwrap();
        assert_eq!(schema["type"], "object");
    }

    #[test]
    fn load_schema_file_not_found() {
        let result = load_schema(Path::new("/nonexistent/path.json"));
        assert!(matches!(result, Err(FetchError::NotFound { .. })));
    }

    #[test]
    fn load_schema_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not valid json").unwrap();

        let result = load_schema(file.path());
        assert!(matches!(result, Err(FetchError::Malformed { .. })));
    }

    #[test]
    fn navigate_nested_fragment() {
        let schema = json!({
            "definitions": { "form": { "properties": { "foo": { "type": "string" } } } }
        });
        let found = navigate_fragment(&schema, "#/definitions/form/properties/foo", "one.json")
            .unwrap();
        assert_eq!(found, &json!({ "type": "string" }));
    }

    #[test]
    fn navigate_empty_fragment_is_root() {
        let schema = json!({ "a": 1 });
        assert_eq!(navigate_fragment(&schema, "#", "x").unwrap(), &schema);
        assert_eq!(navigate_fragment(&schema, "", "x").unwrap(), &schema);
    }

    #[test]
    fn navigate_slash_addresses_empty_key() {
        let schema = json!({ "": { "type": "string" }, "a": 1 });
        let found = navigate_fragment(&schema, "#/", "x").unwrap();
        assert_eq!(found, &json!({ "type": "string" }));

        let other = json!({ "a": 1 });
        let result = navigate_fragment(&other, "#/", "x");
        assert!(matches!(result, Err(FetchError::Malformed { .. })));
    }

    #[test]
    fn navigate_escaped_and_indexed() {
        let schema = json!({ "a/b": { "c~d": ["x", "y"] } });
        let found = navigate_fragment(&schema, "/a~1b/c~0d/1", "x").unwrap();
        assert_eq!(found, "y");
    }

    #[test]
    fn navigate_missing_fragment() {
        let schema = json!({ "definitions": {} });
        let result = navigate_fragment(&schema, "#/definitions/missing", "one.json");
        match result {
            Err(FetchError::Malformed { document, message }) => {
                assert_eq!(document, "one.json");
                assert!(message.contains("/definitions/missing"));
            }
            other => panic!("expected Malformed, got {:?}", other),
        }
    }

    #[test]
    fn navigate_anchor_fragment_unsupported() {
        let schema = json!({});
        let result = navigate_fragment(&schema, "#anchor", "one.json");
        assert!(matches!(result, Err(FetchError::Malformed { .. })));
    }
}
