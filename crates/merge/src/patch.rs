//! Parsing of client-supplied patch documents

use crate::types::MergeError;
use ned_core::record::json_kind;
use ned_core::NerdRecord;
use serde_json::Value;

/// Parse a raw request body into a patch document
///
/// The body must be a well-formed JSON object.
pub fn parse_patch(input: impl AsRef<[u8]>) -> Result<NerdRecord, MergeError> {
    let value: Value =
        serde_json::from_slice(input.as_ref()).map_err(|e| MergeError::Malformed(e.to_string()))?;

    match value {
        Value::Object(fields) => Ok(NerdRecord::from_map(fields)),
        other => Err(MergeError::NotAnObject(json_kind(&other))),
    }
}
