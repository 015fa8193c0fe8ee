//! JSON-in-text column codec
//!
//! Free-form webhook sections (tool parameters, evaluation results, dynamic
//! variables, ...) are stored as serialized text. Encoding happens once on the
//! write path and decoding once on the read path; nothing above the
//! persistence boundary sees the raw strings.

use serde_json::Value;

use crate::error::HelplineError;

/// Serialize an optional JSON value for storage. `None` and JSON `null` both store SQL NULL.
pub fn encode(value: Option<&Value>) -> Result<Option<String>, HelplineError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => serde_json::to_string(v)
            .map(Some)
            .map_err(HelplineError::Encode),
    }
}

/// Decode a stored column. A NULL column yields `Value::Null` without a parse attempt.
pub fn decode(field: &'static str, raw: Option<&str>) -> Result<Value, HelplineError> {
    match raw {
        None => Ok(Value::Null),
        Some(text) => {
            serde_json::from_str(text).map_err(|source| HelplineError::Decode { field, source })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_none_and_null_store_nothing() {
        assert_eq!(encode(None).unwrap(), None);
        assert_eq!(encode(Some(&Value::Null)).unwrap(), None);
    }

    #[test]
    fn test_nested_parameters_survive_storage() {
        let params = json!({
            "orderId": "12345",
            "filters": { "status": ["shipped", "pending"], "limit": 3 },
            "express": true
        });
        let stored = encode(Some(&params)).unwrap().expect("should store text");
        let decoded = decode("parameters", Some(&stored)).unwrap();
        assert_eq!(decoded, params);
    }

    #[test]
    fn test_decode_null_column_skips_parsing() {
        assert_eq!(decode("result", None).unwrap(), Value::Null);
    }

    #[test]
    fn test_decode_failure_names_the_field() {
        let err = decode("dynamic_variables", Some("{not json")).unwrap_err();
        match err {
            HelplineError::Decode { field, .. } => assert_eq!(field, "dynamic_variables"),
            other => panic!("expected Decode error, got {other:?}"),
        }
    }

    #[test]
    fn test_plain_string_feedback_is_quoted_json() {
        let feedback = json!("thumbs up");
        let stored = encode(Some(&feedback)).unwrap().unwrap();
        assert_eq!(stored, "\"thumbs up\"");
        assert_eq!(decode("feedback", Some(&stored)).unwrap(), feedback);
    }
}
