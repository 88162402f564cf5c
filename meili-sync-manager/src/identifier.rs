//! Identifier normalization.
//!
//! Entities expose their primary key as a map of field name to value. The
//! search index needs a single key per document: single-field keys are used
//! as-is, composite keys are encoded into one reversible string.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde_json::Value;

use crate::errors::SyncError;
use meili_sync_shared::{Identifier, IdentifierFields};

/// Turn identifier field values into a document primary key.
///
/// Composite keys are encoded as URL-safe base64 of the JSON object of
/// fields. `IdentifierFields` is ordered, so the encoding doesn't depend on
/// the order the fields were collected in.
pub fn normalize_identifiers(fields: &IdentifierFields) -> Result<Identifier, SyncError> {
    match fields.len() {
        0 => Err(SyncError::invalid_argument("Identifier has no fields")),
        1 => {
            let (name, value) = fields
                .iter()
                .next()
                .ok_or_else(|| SyncError::invalid_argument("Identifier has no fields"))?;
            scalar_identifier(name, value)
        }
        _ => {
            let encoded = serde_json::to_vec(fields)?;
            Ok(Identifier::Str(URL_SAFE_NO_PAD.encode(encoded)))
        }
    }
}

/// Decode a composite key produced by [`normalize_identifiers`].
///
/// Single-field keys can't be decoded this way; the caller has to know the
/// entity's key arity.
pub fn denormalize_identifier(identifier: &str) -> Result<IdentifierFields, SyncError> {
    let bytes = URL_SAFE_NO_PAD.decode(identifier).map_err(|e| {
        SyncError::invalid_argument(format!("Malformed composite identifier {}: {}", identifier, e))
    })?;

    serde_json::from_slice(&bytes).map_err(|e| {
        SyncError::invalid_argument(format!("Malformed composite identifier {}: {}", identifier, e))
    })
}

fn scalar_identifier(name: &str, value: &Value) -> Result<Identifier, SyncError> {
    match value {
        Value::String(s) => Ok(Identifier::Str(s.clone())),
        Value::Number(n) => Ok(n
            .as_i64()
            .map(Identifier::Int)
            .unwrap_or_else(|| Identifier::Str(n.to_string()))),
        Value::Bool(b) => Ok(Identifier::Str(b.to_string())),
        Value::Null => Err(SyncError::invalid_argument(format!(
            "Identifier field {} is null",
            name
        ))),
        Value::Array(_) | Value::Object(_) => Err(SyncError::invalid_argument(format!(
            "Identifier field {} must be a scalar or convertible to string",
            name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(pairs: &[(&str, Value)]) -> IdentifierFields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_single_field_passes_through() {
        assert_eq!(
            normalize_identifiers(&fields(&[("id", json!(12))])).unwrap(),
            Identifier::Int(12)
        );
        assert_eq!(
            normalize_identifiers(&fields(&[("slug", json!("hello-world"))])).unwrap(),
            Identifier::from("hello-world")
        );
    }

    #[test]
    fn test_single_field_rejects_objects() {
        let err = normalize_identifiers(&fields(&[("id", json!({"nested": 1}))])).unwrap_err();
        assert!(matches!(err, SyncError::InvalidArgument(_)));

        let err = normalize_identifiers(&fields(&[("id", json!(null))])).unwrap_err();
        assert!(matches!(err, SyncError::InvalidArgument(_)));
    }

    #[test]
    fn test_empty_fields_rejected() {
        assert!(matches!(
            normalize_identifiers(&IdentifierFields::new()),
            Err(SyncError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_composite_round_trip() {
        let original = fields(&[
            ("author", json!("ada")),
            ("year", json!(1843)),
            ("lang", json!("en")),
        ]);

        let normalized = normalize_identifiers(&original).unwrap();
        let Identifier::Str(encoded) = normalized else {
            panic!("composite identifier must be a string");
        };

        assert!(!encoded.contains('+') && !encoded.contains('/') && !encoded.contains('='));
        assert_eq!(denormalize_identifier(&encoded).unwrap(), original);
    }

    #[test]
    fn test_composite_independent_of_insertion_order() {
        let mut a = IdentifierFields::new();
        a.insert("b".to_string(), json!(2));
        a.insert("a".to_string(), json!(1));

        let mut b = IdentifierFields::new();
        b.insert("a".to_string(), json!(1));
        b.insert("b".to_string(), json!(2));

        assert_eq!(
            normalize_identifiers(&a).unwrap(),
            normalize_identifiers(&b).unwrap()
        );
    }

    #[test]
    fn test_denormalize_malformed() {
        assert!(matches!(
            denormalize_identifier("not base64!"),
            Err(SyncError::InvalidArgument(_))
        ));
        // Valid base64, but not a JSON object.
        let encoded = URL_SAFE_NO_PAD.encode("[1,2]");
        assert!(matches!(
            denormalize_identifier(&encoded),
            Err(SyncError::InvalidArgument(_))
        ));
    }
}
