//! Runtime value types for REBILL facts
//!
//! The `Value` enum represents all possible fact values in REBILL,
//! similar to JSON values but with additional type safety.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Runtime value type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Number value (f64 for simplicity, handles both int and float)
    Number(f64),
    /// String value
    String(String),
    /// Array of values
    Array(Vec<Value>),
    /// Object (key-value map)
    Object(HashMap<String, Value>),
}

impl Value {
    /// Returns true if this is `Value::Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get the numeric value, if this is a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get the numeric value rounded to an integer, if this is a number
    pub fn as_i64(&self) -> Option<i64> {
        self.as_f64().map(|n| n.round() as i64)
    }

    /// Get the string value, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the boolean value, if this is a bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the array items, if this is an array
    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Get the object map, if this is an object
    pub fn as_object(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Truthiness used for metadata flags: `true`, non-zero numbers and
    /// non-empty strings count as truthy
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Object(map) => !map.is_empty(),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<HashMap<String, Value>> for Value {
    fn from(map: HashMap<String, Value>) -> Self {
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::Number(42.0).as_f64(), Some(42.0));
        assert_eq!(Value::Number(42.4).as_i64(), Some(42));
        assert_eq!(Value::String("hi".to_string()).as_str(), Some("hi"));
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert!(Value::Null.is_null());
        assert_eq!(Value::String("hi".to_string()).as_f64(), None);
    }

    #[test]
    fn test_value_truthiness() {
        assert!(Value::Bool(true).is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(Value::Number(1.0).is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::String(String::new()).is_truthy());
    }

    #[test]
    fn test_value_from_impls() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(5i64), Value::Number(5.0));
        assert_eq!(Value::from("x"), Value::String("x".to_string()));
    }

    #[test]
    fn test_value_nested() {
        let user = Value::Object({
            let mut map = HashMap::new();
            map.insert("name".to_string(), Value::String("Bob".to_string()));
            map.insert("age".to_string(), Value::Number(30.0));
            map
        });

        let map = user.as_object().unwrap();
        assert_eq!(map.get("name"), Some(&Value::String("Bob".to_string())));
        assert_eq!(map.get("age"), Some(&Value::Number(30.0)));
    }

    #[test]
    fn test_value_serde_json() {
        let val = Value::Object({
            let mut map = HashMap::new();
            map.insert("count".to_string(), Value::Number(42.0));
            map.insert("active".to_string(), Value::Bool(true));
            map
        });

        let json = serde_json::to_string(&val).unwrap();
        assert!(json.contains("count"));

        let deserialized: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(val, deserialized);
    }
}
