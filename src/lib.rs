//! Form Schema Composition
//!
//! Fetches the form-schema documents named by a list of identifiers,
//! dereferences every `$ref`, orders the documents, and merges them into one
//! composite JSON Schema describing every field a combined form must capture.
//!
//! # Example
//!
//! ```
//! use form_schema::{compose_identifiers, ComposeOutcome, MemorySource};
//! use serde_json::json;
//!
//! let source = MemorySource::new()
//!     .with_record("r1", vec![json!({
//!         "$id": "forms/one.json",
//!         "definitions": { "form": { "properties": { "foo": { "type": "string" } } } }
//!     })])
//!     .unwrap()
//!     .with_record("r2", vec![json!({
//!         "$id": "forms/two.json",
//!         "definitions": { "form": { "properties": {
//!             "foo": { "$ref": "one.json#/definitions/form/properties/foo" },
//!             "bar": { "type": "integer" }
//!         } } }
//!     })])
//!     .unwrap();
//!
//! let outcome = compose_identifiers(["r2", "r1"], &source).unwrap();
//! let ComposeOutcome::Composite(composite) = outcome else { panic!("conflict") };
//!
//! let props = &composite["definitions"]["form"]["properties"];
//! assert_eq!(props["foo"], json!({ "type": "string" }));
//! assert_eq!(props["bar"], json!({ "type": "integer" }));
//! ```
//!
//! # Merge Order
//!
//! | Rule | Effect |
//! |------|--------|
//! | A references B | B sorts before A |
//! | No reference either way | More `definitions.form.properties` sorts first |
//! | Otherwise | Input order kept |
//!
//! # Conflicts
//!
//! When two documents give the same field different shapes (array, object,
//! scalar) the merge stops with [`ComposeError::Conflict`].
//! [`compose_or_fallback`] turns that into [`ComposeOutcome::Unmerged`], which
//! carries the ordered corpus so callers can return it instead.

mod check;
mod compose;
mod error;
mod exchange;
mod fetch;
mod loader;
mod node;
mod source;
mod types;

pub use check::check_composite;
pub use compose::{compose, compose_identifiers, compose_or_fallback, merge_field, ComposeOutcome};
pub use error::{ComposeError, FetchError, InputError};
pub use exchange::{parse_identifiers, render_corpus, render_outcome};
pub use fetch::{OrderedCorpus, SchemaFetcher};
pub use loader::{load_schema, navigate_fragment};
pub use node::{sort_batch, DependencyRegistry, ReferenceMap, SchemaNode};
pub use source::{DirectorySource, MemorySource, SchemaSource};
pub use types::{
    json_type_name, Document, FallbackFormat, InputFraming, Reference, Shape, IGNORABLE_PREAMBLE,
};
