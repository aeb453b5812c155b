//! JSON helpers for assertions in tests.

use crate::store::Document;

/// Re-serializes `json` in compact form, keeping field order.
///
/// Two documents written with different whitespace normalize to the same
/// string, so expected and actual documents can be compared as text.
pub fn norm_json(json: &str) -> Result<String, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    serde_json::to_string(&value)
}

/// Serializes `document` in the same form as [`norm_json`].
pub fn norm_document(document: &Document) -> String {
    serde_json::Value::Object(document.clone()).to_string()
}

/// Parses `json` as a single document.
pub fn document(json: &str) -> Result<Document, serde_json::Error> {
    serde_json::from_str(json)
}
