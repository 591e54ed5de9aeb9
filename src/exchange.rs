//! Request and response framing around the engine.
//!
//! Callers send an identifier list either as one JSON array of strings or as
//! newline-delimited text, picked by content type. The response is the
//! composite schema, or the unmerged corpus when composition hit a conflict.

use serde_json::Value;

use crate::compose::ComposeOutcome;
use crate::error::InputError;
use crate::fetch::OrderedCorpus;
use crate::types::{FallbackFormat, InputFraming};

/// Parse a caller-supplied identifier list.
///
/// # Errors
///
/// `InputError::InvalidJson` if JSON framing doesn't hold exactly one array
/// of strings (several arrays on separate lines included), and
/// `InputError::Empty` if no identifiers remain.
pub fn parse_identifiers(body: &str, framing: InputFraming) -> Result<Vec<String>, InputError> {
    let identifiers: Vec<String> = match framing {
        InputFraming::Json => {
            serde_json::from_str(body).map_err(|source| InputError::InvalidJson { source })?
        }
        InputFraming::Lines => body
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
    };

    if identifiers.is_empty() {
        return Err(InputError::Empty);
    }
    Ok(identifiers)
}

/// Serialize a compose outcome as a response body.
pub fn render_outcome(
    outcome: &ComposeOutcome,
    fallback: FallbackFormat,
    pretty: bool,
) -> Result<String, serde_json::Error> {
    match outcome {
        ComposeOutcome::Composite(composite) => to_json(composite, pretty),
        ComposeOutcome::Unmerged { corpus, .. } => render_corpus(corpus, fallback, pretty),
    }
}

/// Serialize the documents of a corpus in order.
///
/// `FallbackFormat::JsonArray` gives a JSON array. `Concatenated` joins the
/// object literals with commas and no brackets, which is not valid JSON on
/// its own; it exists for consumers that expect that shape.
pub fn render_corpus(
    corpus: &OrderedCorpus,
    format: FallbackFormat,
    pretty: bool,
) -> Result<String, serde_json::Error> {
    match format {
        FallbackFormat::JsonArray => {
            let documents: Vec<&Value> = corpus.documents().iter().map(|d| d.value()).collect();
            to_json(&documents, pretty)
        }
        FallbackFormat::Concatenated => {
            let parts = corpus
                .documents()
                .iter()
                .map(|d| to_json(d.value(), pretty))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(parts.join(if pretty { ",\n" } else { "," }))
        }
    }
}

fn to_json<T: serde::Serialize + ?Sized>(
    value: &T,
    pretty: bool,
) -> Result<String, serde_json::Error> {
    if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
}
