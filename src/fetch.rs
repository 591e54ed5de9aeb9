//! Fetch pipeline: identifiers in, ordered dereferenced documents out.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::error::FetchError;
use crate::node::{sort_batch, DependencyRegistry, SchemaNode};
use crate::source::SchemaSource;
use crate::types::Document;

/// Dereferenced documents in merge order, unique by `$id`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderedCorpus {
    documents: Vec<Document>,
}

impl OrderedCorpus {
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn into_documents(self) -> Vec<Document> {
        self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// `$id` of each document, in order.
    pub fn ids(&self) -> Vec<&str> {
        self.documents.iter().map(Document::id).collect()
    }
}

impl<'a> IntoIterator for &'a OrderedCorpus {
    type Item = &'a Document;
    type IntoIter = std::slice::Iter<'a, Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.iter()
    }
}

/// Turns identifiers into an [`OrderedCorpus`] using one [`SchemaSource`].
///
/// Holds no state between calls; every `fetch` builds its own dependency
/// registry.
pub struct SchemaFetcher<'s> {
    source: &'s dyn SchemaSource,
}

impl<'s> SchemaFetcher<'s> {
    pub fn new(source: &'s dyn SchemaSource) -> Self {
        Self { source }
    }

    /// Fetch, deduplicate, dereference and order the documents for `identifiers`.
    ///
    /// Documents are deduplicated by `$id`; the first occurrence wins.
    ///
    /// # Errors
    ///
    /// Propagates the first `FetchError` from the source or from dereferencing.
    pub fn fetch<I, S>(&self, identifiers: I) -> Result<OrderedCorpus, FetchError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut documents = Vec::new();

        for identifier in identifiers {
            let identifier = identifier.as_ref();
            for document in self.source.resolve(identifier)? {
                if seen.insert(document.id().to_string()) {
                    documents.push(document);
                } else {
                    debug!(identifier, document = document.id(), "dropping duplicate document");
                }
            }
        }

        let mut registry = DependencyRegistry::new();
        let mut nodes: Vec<SchemaNode> = documents
            .into_iter()
            .map(|document| SchemaNode::new(document, &mut registry))
            .collect();

        for node in &mut nodes {
            node.dereference(self.source)?;
        }

        sort_batch(&mut nodes, &mut registry);

        let corpus = OrderedCorpus {
            documents: nodes.into_iter().map(SchemaNode::into_document).collect(),
        };
        info!(documents = corpus.len(), order = ?corpus.ids(), "fetched schema corpus");
        Ok(corpus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use serde_json::json;

    #[test]
    fn duplicates_keep_first_occurrence() {
        let source = MemorySource::new()
            .with_record(
                "r1",
                vec![json!({ "$id": "shared.json", "from": "r1" })],
            )
            .unwrap()
            .with_record(
                "r2",
                vec![
                    json!({ "$id": "shared.json", "from": "r2" }),
                    json!({ "$id": "other.json" }),
                ],
            )
            .unwrap();

        let corpus = SchemaFetcher::new(&source).fetch(["r1", "r2"]).unwrap();
        assert_eq!(corpus.len(), 2);
        let shared = corpus
            .documents()
            .iter()
            .find(|d| d.id() == "shared.json")
            .unwrap();
        assert_eq!(shared.value()["from"], "r1");
    }

    #[test]
    fn same_identifier_twice_is_deduplicated() {
        let source = MemorySource::new()
            .with_record("r1", vec![json!({ "$id": "one.json" })])
            .unwrap();
        let corpus = SchemaFetcher::new(&source).fetch(["r1", "R1"]).unwrap();
        assert_eq!(corpus.ids(), vec!["one.json"]);
    }

    #[test]
    fn empty_identifier_list_gives_empty_corpus() {
        let source = MemorySource::new();
        let corpus = SchemaFetcher::new(&source)
            .fetch(Vec::<String>::new())
            .unwrap();
        assert!(corpus.is_empty());
    }

    #[test]
    fn unknown_identifier_is_not_found() {
        let source = MemorySource::new()
            .with_record("r1", vec![json!({ "$id": "one.json" })])
            .unwrap();
        let result = SchemaFetcher::new(&source).fetch(["r1", "nope"]);
        assert!(matches!(result, Err(FetchError::NotFound { identifier }) if identifier == "nope"));
    }

    #[test]
    fn ambiguous_identifier_is_surfaced() {
        let source = MemorySource::new()
            .with_record("forms", vec![json!({ "$id": "a.json" })])
            .unwrap()
            .with_record("FORMS", vec![json!({ "$id": "b.json" })])
            .unwrap();
        let result = SchemaFetcher::new(&source).fetch(["forms"]);
        assert!(matches!(result, Err(FetchError::Ambiguous { .. })));
    }

    #[test]
    fn corpus_is_dereferenced_and_ordered() {
        let source = MemorySource::new()
            .with_record(
                "b",
                vec![json!({
                    "$id": "b.json",
                    "properties": { "x": { "$ref": "a.json#/definitions/x" } }
                })],
            )
            .unwrap()
            .with_record(
                "a",
                vec![json!({ "$id": "a.json", "definitions": { "x": { "type": "integer" } } })],
            )
            .unwrap();

        let corpus = SchemaFetcher::new(&source).fetch(["b", "a"]).unwrap();
        assert_eq!(corpus.ids(), vec!["a.json", "b.json"]);
        assert_eq!(
            corpus.documents()[1].value()["properties"]["x"],
            json!({ "type": "integer" })
        );
    }
}
