//! Document identifiers.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Primary-key field name → value, as read from an entity.
///
/// A `BTreeMap` keeps keys sorted so composite identifiers encode the same way
/// regardless of the order in which fields were collected.
pub type IdentifierFields = BTreeMap<String, Value>;

/// The primary key of a document in the search index.
///
/// Single-field keys keep their scalar value; composite keys are carried as
/// an encoded string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Identifier {
    /// Integer key.
    Int(i64),
    /// String key, or an encoded composite key.
    Str(String),
}

impl Identifier {
    /// Read an identifier out of a JSON value, as found in a search hit.
    ///
    /// Returns `None` for values that can't be a primary key (null, floats,
    /// arrays, objects).
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::Str(s.clone())),
            Value::Number(n) => n.as_i64().map(Self::Int),
            _ => None,
        }
    }

    /// Convert the identifier into its JSON form.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Int(i) => Value::from(*i),
            Self::Str(s) => Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{}", i),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Identifier {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value() {
        assert_eq!(Identifier::from_value(&json!(12)), Some(Identifier::Int(12)));
        assert_eq!(
            Identifier::from_value(&json!("abc")),
            Some(Identifier::Str("abc".to_string()))
        );
        assert_eq!(Identifier::from_value(&json!(1.5)), None);
        assert_eq!(Identifier::from_value(&json!(null)), None);
    }

    #[test]
    fn test_untagged_serde() {
        let ids: Vec<Identifier> = serde_json::from_str(r#"[1, "two"]"#).unwrap();
        assert_eq!(ids, vec![Identifier::Int(1), Identifier::from("two")]);
        assert_eq!(serde_json::to_string(&ids).unwrap(), r#"[1,"two"]"#);
    }

    #[test]
    fn test_display() {
        assert_eq!(Identifier::Int(7).to_string(), "7");
        assert_eq!(Identifier::from("post-1").to_string(), "post-1");
    }
}
