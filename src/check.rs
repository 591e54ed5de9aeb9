//! Structural check of a composite schema.
//!
//! Merging can produce keyword values no JSON Schema draft accepts (for
//! instance a `required` list that picked up a non-string). This compiles
//! the composite with `jsonschema` so such output is caught before it is
//! handed out. Payloads are never validated here.

use serde_json::Value;

use crate::error::ComposeError;

/// Check that `composite` compiles as a JSON Schema.
///
/// # Errors
///
/// Returns `ComposeError::InvalidComposite` with the compiler's message.
pub fn check_composite(composite: &Value) -> Result<(), ComposeError> {
    jsonschema::validator_for(composite)
        .map(|_| ())
        .map_err(|e| ComposeError::InvalidComposite {
            message: e.to_string(),
        })
}
