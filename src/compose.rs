//! Folding an ordered corpus into one composite schema.
//!
//! Documents are merged top-level field by field, in corpus order:
//!
//! | Stored | Incoming | Result |
//! |--------|----------|--------|
//! | (absent) | any | deep copy of incoming |
//! | object | object | merged key by key, recursively |
//! | array | array | incoming elements appended unless already present |
//! | scalar | scalar | stored value kept |
//! | any | different shape | `ComposeError::Conflict` |
//!
//! The preamble keys (`title`, `description`, `$id`, `$schema`, `$comment`)
//! are skipped at the top level, so documents may disagree on them freely.

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::{ComposeError, FetchError};
use crate::fetch::{OrderedCorpus, SchemaFetcher};
use crate::source::SchemaSource;
use crate::types::{Document, Shape, IGNORABLE_PREAMBLE};

/// Result of composing with fallback: either the merged schema or the
/// unmerged corpus together with the conflict that stopped the merge.
#[derive(Debug, Clone, PartialEq)]
pub enum ComposeOutcome {
    Composite(Value),
    Unmerged {
        corpus: OrderedCorpus,
        conflict: ComposeError,
    },
}

impl ComposeOutcome {
    pub fn is_composite(&self) -> bool {
        matches!(self, ComposeOutcome::Composite(_))
    }

    pub fn conflict(&self) -> Option<&ComposeError> {
        match self {
            ComposeOutcome::Composite(_) => None,
            ComposeOutcome::Unmerged { conflict, .. } => Some(conflict),
        }
    }
}

/// Merge documents, in order, into one composite object.
///
/// Inputs are only read; every value placed in the composite is a copy.
///
/// # Errors
///
/// Returns `ComposeError::Conflict` for the first field whose shape differs
/// between the composite so far and an incoming document. Nothing of the
/// partial composite is returned in that case.
pub fn compose<'a>(
    documents: impl IntoIterator<Item = &'a Document>,
) -> Result<Value, ComposeError> {
    let mut composite = Map::new();
    let mut merged = 0usize;

    for document in documents {
        let Value::Object(fields) = document.value() else {
            continue;
        };
        for (name, value) in fields {
            if IGNORABLE_PREAMBLE.contains(&name.as_str()) {
                continue;
            }
            merge_field(name, value, &mut composite)?;
        }
        debug!(document = document.id(), "merged schema document");
        merged += 1;
    }

    info!(documents = merged, fields = composite.len(), "composed schema");
    Ok(Value::Object(composite))
}

/// Merge one named field into `accumulator`.
///
/// # Errors
///
/// Returns `ComposeError::Conflict` if the stored and incoming values have
/// different shapes, at this level or any nested one.
pub fn merge_field(
    name: &str,
    incoming: &Value,
    accumulator: &mut Map<String, Value>,
) -> Result<(), ComposeError> {
    merge_field_at(name, incoming, accumulator, "")
}

fn merge_field_at(
    name: &str,
    incoming: &Value,
    accumulator: &mut Map<String, Value>,
    parent_path: &str,
) -> Result<(), ComposeError> {
    let path = format!("{}/{}", parent_path, name.replace('~', "~0").replace('/', "~1"));

    let Some(stored) = accumulator.get_mut(name) else {
        accumulator.insert(name.to_string(), incoming.clone());
        return Ok(());
    };

    match (stored, incoming) {
        (Value::Object(stored_map), Value::Object(incoming_map)) => {
            for (key, value) in incoming_map {
                merge_field_at(key, value, stored_map, &path)?;
            }
            Ok(())
        }
        (Value::Array(stored_items), Value::Array(incoming_items)) => {
            for item in incoming_items {
                if !stored_items.contains(item) {
                    stored_items.push(item.clone());
                }
            }
            Ok(())
        }
        (stored, incoming) => {
            let (stored_shape, incoming_shape) = (Shape::of(stored), Shape::of(incoming));
            if stored_shape == incoming_shape {
                // Same scalar shape: first-seen value stays
                Ok(())
            } else {
                Err(ComposeError::conflict(
                    name,
                    &path,
                    stored_shape,
                    incoming_shape,
                ))
            }
        }
    }
}

/// Compose a corpus, falling back to the unmerged corpus on conflict.
pub fn compose_or_fallback(corpus: OrderedCorpus) -> ComposeOutcome {
    match compose(&corpus) {
        Ok(composite) => ComposeOutcome::Composite(composite),
        Err(conflict) => {
            warn!(%conflict, documents = corpus.len(), "returning unmerged corpus");
            ComposeOutcome::Unmerged { corpus, conflict }
        }
    }
}

/// Convenience: fetch the corpus for `identifiers` and compose it with fallback.
pub fn compose_identifiers<I, S>(
    identifiers: I,
    source: &dyn SchemaSource,
) -> Result<ComposeOutcome, FetchError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let corpus = SchemaFetcher::new(source).fetch(identifiers)?;
    Ok(compose_or_fallback(corpus))
}
