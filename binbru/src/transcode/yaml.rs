//! YAML output.
//!
//! Field order follows the document structure. Multi-line payloads
//! (bodies, scripts, docs) come out as YAML block literals.

use libbru::Document;

/// Encode a document as YAML text.
pub fn encode(document: &Document) -> Result<String, String> {
    serde_yaml::to_string(document).map_err(|e| format!("YAML encode error: {}", e))
}
