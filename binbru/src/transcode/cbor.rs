//! CBOR output.
//!
//! Mapping from the document's JSON shape to CBOR:
//!   - null            -> CBOR null (simple value 22)
//!   - bool            -> CBOR bool (simple values 20/21)
//!   - integer         -> CBOR integer (smallest encoding that fits)
//!   - other number    -> CBOR float
//!   - string          -> CBOR text string
//!   - array           -> CBOR array (determinate length)
//!   - object          -> CBOR map (text string keys, document order)

use ciborium::value::{Integer, Value as CborValue};
use libbru::Document;
use serde_json::Value;

/// Encode a document as CBOR bytes.
pub fn encode(document: &Document) -> Result<Vec<u8>, String> {
    let value = serde_json::to_value(document).map_err(|e| format!("CBOR encode error: {}", e))?;
    let mut buf = Vec::new();
    ciborium::ser::into_writer(&value_to_cbor(&value)?, &mut buf)
        .map_err(|e| format!("CBOR encode error: {}", e))?;
    Ok(buf)
}

fn value_to_cbor(value: &Value) -> Result<CborValue, String> {
    match value {
        Value::Null => Ok(CborValue::Null),
        Value::Bool(b) => Ok(CborValue::Bool(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(CborValue::Integer(Integer::from(i)))
            } else if let Some(u) = n.as_u64() {
                Ok(CborValue::Integer(Integer::from(u)))
            } else if let Some(f) = n.as_f64() {
                Ok(CborValue::Float(f))
            } else {
                Err(format!("Unsupported number: {}", n))
            }
        }
        Value::String(s) => Ok(CborValue::Text(s.clone())),
        Value::Array(arr) => {
            let items: Result<Vec<CborValue>, String> = arr.iter().map(value_to_cbor).collect();
            Ok(CborValue::Array(items?))
        }
        Value::Object(obj) => {
            let mut pairs = Vec::with_capacity(obj.len());
            for (k, v) in obj {
                pairs.push((CborValue::Text(k.clone()), value_to_cbor(v)?));
            }
            Ok(CborValue::Map(pairs))
        }
    }
}
