//! Field lookup utilities
//!
//! Helper functions for navigating nested fact data using dot-notation
//! paths. A missing hop resolves to `Value::Null` rather than an error so
//! rules can match gracefully against partial fact trees.

use rebill_core::Value;
use std::collections::HashMap;

/// Get a nested value from a fact map following a path.
///
/// Returns `Value::Null` if any part of the path is not found.
pub(crate) fn get_nested_value(data: &HashMap<String, Value>, path: &[&str]) -> Value {
    let Some((key, rest)) = path.split_first() else {
        return Value::Null;
    };

    let Some(value) = data.get(*key) else {
        tracing::debug!("Field not found: {}, returning Null", key);
        return Value::Null;
    };

    if rest.is_empty() {
        return value.clone();
    }

    match value {
        Value::Object(map) => get_nested_value(map, rest),
        _ => {
            tracing::debug!(
                "Cannot access field '{}' on non-object, returning Null",
                rest[0]
            );
            Value::Null
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_data() -> HashMap<String, Value> {
        let mut data = HashMap::new();
        data.insert("name".to_string(), Value::String("Alice".to_string()));

        let mut profile = HashMap::new();
        profile.insert("age".to_string(), Value::Number(30.0));

        let mut customer = HashMap::new();
        customer.insert("id".to_string(), Value::Number(123.0));
        customer.insert("profile".to_string(), Value::Object(profile));
        data.insert("customer".to_string(), Value::Object(customer));

        data
    }

    #[test]
    fn test_get_nested_value_simple() {
        let data = create_test_data();
        assert_eq!(
            get_nested_value(&data, &["name"]),
            Value::String("Alice".to_string())
        );
    }

    #[test]
    fn test_get_nested_value_deep() {
        let data = create_test_data();
        assert_eq!(
            get_nested_value(&data, &["customer", "profile", "age"]),
            Value::Number(30.0)
        );
    }

    #[test]
    fn test_get_nested_value_missing_hop() {
        let data = create_test_data();
        assert_eq!(get_nested_value(&data, &["nonexistent"]), Value::Null);
        assert_eq!(
            get_nested_value(&data, &["customer", "nonexistent"]),
            Value::Null
        );
    }

    #[test]
    fn test_get_nested_value_through_scalar() {
        let data = create_test_data();
        assert_eq!(get_nested_value(&data, &["name", "inner"]), Value::Null);
    }

    #[test]
    fn test_get_nested_value_empty_path() {
        let data = create_test_data();
        assert_eq!(get_nested_value(&data, &[]), Value::Null);
    }
}
