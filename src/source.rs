//! Schema sources: where raw documents for an identifier come from.
//!
//! The engine only sees the [`SchemaSource`] trait. Two local
//! implementations ship with the crate:
//!
//! - [`DirectorySource`] reads records from a directory tree.
//! - [`MemorySource`] serves documents registered up front.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::error::FetchError;
use crate::loader::load_schema;
use crate::types::Document;

/// Maps identifiers to raw schema documents.
pub trait SchemaSource {
    /// Resolve an identifier to the documents of its backing record.
    ///
    /// # Errors
    ///
    /// `FetchError::NotFound` if nothing matches or the record holds no
    /// documents, `FetchError::Ambiguous` if more than one record matches.
    fn resolve(&self, identifier: &str) -> Result<Vec<Document>, FetchError>;

    /// Resolve a document named relative to another document's directory.
    ///
    /// Used while dereferencing inter-document `$ref`s.
    ///
    /// # Errors
    ///
    /// `FetchError::NotFound` if the document can't be located,
    /// `FetchError::Malformed` if it isn't a valid document.
    fn resolve_relative(
        &self,
        base_directory: &str,
        relative_name: &str,
    ) -> Result<Document, FetchError>;
}

impl<S: SchemaSource + ?Sized> SchemaSource for &S {
    fn resolve(&self, identifier: &str) -> Result<Vec<Document>, FetchError> {
        (**self).resolve(identifier)
    }

    fn resolve_relative(
        &self,
        base_directory: &str,
        relative_name: &str,
    ) -> Result<Document, FetchError> {
        (**self).resolve_relative(base_directory, relative_name)
    }
}

/// Reads records from a directory.
///
/// A record is a sub-directory or a `<name>.json` file directly under the
/// root. Identifiers match record names case-insensitively; a directory
/// record yields every `*.json` file it directly contains, in file-name order.
///
/// ```text
/// root/
///   r1/one.json
///   r2/two.json
///   r2/three.json
///   standalone.json
/// ```
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn matching_records(&self, identifier: &str) -> Result<Vec<PathBuf>, FetchError> {
        let entries = std::fs::read_dir(&self.root).map_err(|source| FetchError::Read {
            path: self.root.clone(),
            source,
        })?;

        let mut records = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|source| FetchError::Read {
                    path: self.root.clone(),
                    source,
                })?
                .path();

            let key = if path.is_dir() {
                path.file_name()
            } else if is_json_file(&path) {
                path.file_stem()
            } else {
                None
            };

            if key
                .and_then(|k| k.to_str())
                .is_some_and(|k| k.eq_ignore_ascii_case(identifier))
            {
                records.push(path);
            }
        }
        records.sort();
        Ok(records)
    }

    fn load_record(&self, record: &Path) -> Result<Vec<Document>, FetchError> {
        if !record.is_dir() {
            return Ok(vec![load_document(record)?]);
        }

        let entries = std::fs::read_dir(record).map_err(|source| FetchError::Read {
            path: record.to_path_buf(),
            source,
        })?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|source| FetchError::Read {
                    path: record.to_path_buf(),
                    source,
                })?
                .path();
            if path.is_file() && is_json_file(&path) {
                files.push(path);
            }
        }
        files.sort();

        files.iter().map(|f| load_document(f)).collect()
    }
}

impl SchemaSource for DirectorySource {
    fn resolve(&self, identifier: &str) -> Result<Vec<Document>, FetchError> {
        let records = self.matching_records(identifier)?;

        let record = match records.as_slice() {
            [] => {
                return Err(FetchError::NotFound {
                    identifier: identifier.to_string(),
                })
            }
            [record] => record,
            _ => {
                return Err(FetchError::Ambiguous {
                    identifier: identifier.to_string(),
                    records: records
                        .iter()
                        .map(|r| {
                            r.strip_prefix(&self.root)
                                .unwrap_or(r)
                                .display()
                                .to_string()
                        })
                        .collect(),
                })
            }
        };

        let documents = self.load_record(record)?;
        if documents.is_empty() {
            return Err(FetchError::NotFound {
                identifier: identifier.to_string(),
            });
        }
        debug!(
            identifier,
            record = %record.display(),
            documents = documents.len(),
            "resolved record"
        );
        Ok(documents)
    }

    fn resolve_relative(
        &self,
        base_directory: &str,
        relative_name: &str,
    ) -> Result<Document, FetchError> {
        load_document(&Path::new(base_directory).join(relative_name))
    }
}

fn is_json_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}

/// Load a file as a document whose directory is the file's parent.
fn load_document(path: &Path) -> Result<Document, FetchError> {
    let value = load_schema(path)?;
    let document = Document::from_value(value).map_err(|e| match e {
        FetchError::Malformed { message, .. } => {
            FetchError::malformed(path.display().to_string(), message)
        }
        other => other,
    })?;
    let directory = path
        .parent()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    Ok(document.with_directory(directory))
}

/// Serves documents registered in memory.
///
/// Record keys match identifiers case-insensitively. Relative references
/// resolve by joining the referring document's directory with the relative
/// name and looking the result up by `$id`.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    records: Vec<(String, Vec<Document>)>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a record holding the given raw documents.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Malformed` if a value isn't a valid document.
    pub fn with_record(
        mut self,
        key: impl Into<String>,
        documents: impl IntoIterator<Item = Value>,
    ) -> Result<Self, FetchError> {
        let documents = documents
            .into_iter()
            .map(Document::from_value)
            .collect::<Result<Vec<_>, _>>()?;
        self.records.push((key.into(), documents));
        Ok(self)
    }
}

impl SchemaSource for MemorySource {
    fn resolve(&self, identifier: &str) -> Result<Vec<Document>, FetchError> {
        let matches: Vec<&(String, Vec<Document>)> = self
            .records
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(identifier))
            .collect();

        match matches.as_slice() {
            [(_, documents)] if !documents.is_empty() => Ok(documents.clone()),
            [] | [_] => Err(FetchError::NotFound {
                identifier: identifier.to_string(),
            }),
            _ => Err(FetchError::Ambiguous {
                identifier: identifier.to_string(),
                records: matches.iter().map(|(key, _)| key.clone()).collect(),
            }),
        }
    }

    fn resolve_relative(
        &self,
        base_directory: &str,
        relative_name: &str,
    ) -> Result<Document, FetchError> {
        let target = join_relative(base_directory, relative_name);
        self.records
            .iter()
            .flat_map(|(_, documents)| documents)
            .find(|doc| doc.id() == target)
            .cloned()
            .ok_or(FetchError::NotFound { identifier: target })
    }
}

/// Join a relative document name onto a `/`-separated base directory.
///
/// `.` segments are dropped and `..` removes the preceding segment.
/// Absolute URLs are returned unchanged.
pub(crate) fn join_relative(base: &str, relative: &str) -> String {
    if relative.contains("://") {
        return relative.to_string();
    }

    let mut segments: Vec<&str> = if base.is_empty() || relative.starts_with('/') {
        Vec::new()
    } else {
        base.trim_end_matches('/').split('/').collect()
    };
    let leading_slash = relative.starts_with('/');

    for part in relative.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                // Never pop past a "scheme://host" prefix
                if segments.len() > 3 || !segments.first().is_some_and(|s| s.ends_with(':')) {
                    segments.pop();
                }
            }
            _ => segments.push(part),
        }
    }

    let joined = segments.join("/");
    if leading_slash {
        format!("/{}", joined)
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn join_relative_cases() {
        assert_eq!(join_relative("forms", "one.json"), "forms/one.json");
        assert_eq!(join_relative("", "one.json"), "one.json");
        assert_eq!(
            join_relative("https://forms.example.com/kyc", "../shared/one.json"),
            "https://forms.example.com/shared/one.json"
        );
        assert_eq!(
            join_relative("https://forms.example.com", "../one.json"),
            "https://forms.example.com/one.json"
        );
        assert_eq!(join_relative("a/b", "./c.json"), "a/b/c.json");
        assert_eq!(
            join_relative("a", "https://other.example.com/x.json"),
            "https://other.example.com/x.json"
        );
    }

    #[test]
    fn directory_source_resolves_directory_record() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "r2/two.json", r#"{"$id": "two.json"}"#);
        write(dir.path(), "r2/three.json", r#"{"$id": "three.json"}"#);
        write(dir.path(), "r2/notes.txt", "ignored");

        let source = DirectorySource::new(dir.path());
        let docs = source.resolve("r2").unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id()).collect();
        assert_eq!(ids, vec!["three.json", "two.json"]);
        assert_eq!(docs[0].directory(), dir.path().join("r2").display().to_string());
    }

    #[test]
    fn directory_source_resolves_file_record_case_insensitively() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "Contact.json", r#"{"$id": "contact.json"}"#);

        let source = DirectorySource::new(dir.path());
        let docs = source.resolve("contact").unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id(), "contact.json");
    }

    #[test]
    fn directory_source_not_found() {
        let dir = TempDir::new().unwrap();
        let source = DirectorySource::new(dir.path());
        let result = source.resolve("missing");
        assert!(matches!(
            result,
            Err(FetchError::NotFound { identifier }) if identifier == "missing"
        ));
    }

    #[test]
    fn directory_source_empty_record_is_not_found() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("empty")).unwrap();
        let source = DirectorySource::new(dir.path());
        assert!(matches!(
            source.resolve("empty"),
            Err(FetchError::NotFound { .. })
        ));
    }

    #[test]
    fn directory_source_ambiguous() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "forms/a.json", r#"{"$id": "a.json"}"#);
        write(dir.path(), "forms.json", r#"{"$id": "b.json"}"#);

        let source = DirectorySource::new(dir.path());
        match source.resolve("forms") {
            Err(FetchError::Ambiguous { records, .. }) => assert_eq!(records.len(), 2),
            other => panic!("expected Ambiguous, got {:?}", other),
        }
    }

    #[test]
    fn directory_source_missing_id_names_file() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "r1/bad.json", r#"{"type": "object"}"#);

        let source = DirectorySource::new(dir.path());
        match source.resolve("r1") {
            Err(FetchError::Malformed { document, .. }) => assert!(document.ends_with("bad.json")),
            other => panic!("expected Malformed, got {:?}", other),
        }
    }

    #[test]
    fn directory_source_resolve_relative() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "shared/one.json", r#"{"$id": "one.json"}"#);
        write(dir.path(), "r2/two.json", r#"{"$id": "two.json"}"#);
        let source = DirectorySource::new(dir.path());

        let base = dir.path().join("r2").display().to_string();
        let doc = source.resolve_relative(&base, "../shared/one.json").unwrap();
        assert_eq!(doc.id(), "one.json");

        let result = source.resolve_relative(&base, "nope.json");
        assert!(matches!(result, Err(FetchError::NotFound { .. })));
    }

    #[test]
    fn directory_source_resolve_relative_malformed() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "broken.json", "{ not json");
        let source = DirectorySource::new(dir.path());

        let base = dir.path().display().to_string();
        let result = source.resolve_relative(&base, "broken.json");
        assert!(matches!(result, Err(FetchError::Malformed { .. })));
    }

    #[test]
    fn memory_source_resolve() {
        let source = MemorySource::new()
            .with_record("r1", vec![json!({"$id": "forms/one.json"})])
            .unwrap();
        let docs = source.resolve("R1").unwrap();
        assert_eq!(docs[0].name(), "one.json");

        assert!(matches!(
            source.resolve("r2"),
            Err(FetchError::NotFound { .. })
        ));
    }

    #[test]
    fn memory_source_ambiguous() {
        let source = MemorySource::new()
            .with_record("r1", vec![json!({"$id": "a.json"})])
            .unwrap()
            .with_record("R1", vec![json!({"$id": "b.json"})])
            .unwrap();
        assert!(matches!(
            source.resolve("r1"),
            Err(FetchError::Ambiguous { .. })
        ));
    }

    #[test]
    fn memory_source_resolve_relative() {
        let source = MemorySource::new()
            .with_record(
                "shared",
                vec![json!({"$id": "https://forms.example.com/shared/one.json"})],
            )
            .unwrap();
        let doc = source
            .resolve_relative("https://forms.example.com/kyc", "../shared/one.json")
            .unwrap();
        assert_eq!(doc.name(), "one.json");

        let result = source.resolve_relative("https://forms.example.com/kyc", "one.json");
        assert!(matches!(result, Err(FetchError::NotFound { .. })));
    }

    #[test]
    fn memory_source_rejects_document_without_id() {
        let result = MemorySource::new().with_record("r1", vec![json!({"type": "object"})]);
        assert!(matches!(result, Err(FetchError::Malformed { .. })));
    }
}
