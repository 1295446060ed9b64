//! Input validation shared by all backends.

use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, StorageError};
use crate::record::{DataMap, NO_STATE};

pub fn validate_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(StorageError::validation("Key cannot be empty"));
    }
    Ok(())
}

pub fn validate_state(state: &str) -> Result<()> {
    if state.trim().is_empty() {
        return Err(StorageError::validation("State must be a non-empty string"));
    }
    if state == NO_STATE {
        return Err(StorageError::validation(format!(
            "State '{}' is reserved for \"no state\"; finish the conversation instead",
            NO_STATE
        )));
    }
    Ok(())
}

/// Checks the serialized size of `data` against `max_size`; returns the size in bytes.
pub fn validate_data(data: &DataMap, max_size: usize) -> Result<usize> {
    let size = serde_json::to_vec(data)?.len();
    if size > max_size {
        return Err(StorageError::validation(format!(
            "Data size {} exceeds maximum allowed {}",
            size, max_size
        )));
    }
    Ok(size)
}

/// Converts any serializable value into a [`DataMap`]; anything but a JSON object is rejected.
pub fn into_data_map<T: Serialize>(value: T) -> Result<DataMap> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StorageError::validation(format!(
            "Data must be a mapping, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_validate_key_and_state() {
        assert!(validate_key("1-2-3").is_ok());
        assert!(validate_key("").unwrap_err().is_validation());
        assert!(validate_state("waiting").is_ok());
        assert!(validate_state("").unwrap_err().is_validation());
        assert!(validate_state("   ").unwrap_err().is_validation());
        assert!(validate_state(NO_STATE).unwrap_err().is_validation());
        assert!(validate_state("**").is_ok());
    }

    #[test]
    fn test_validate_data_size_cap() {
        let mut data = DataMap::new();
        data.insert("blob".to_string(), json!("x".repeat(100)));
        assert!(validate_data(&data, 1024).is_ok());
        let err = validate_data(&data, 50).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("exceeds maximum allowed 50"));
    }

    #[test]
    fn test_into_data_map_accepts_objects_and_structs() {
        let map = into_data_map(json!({"weight": "70"})).unwrap();
        assert_eq!(map.get("weight"), Some(&json!("70")));

        let mut hm = HashMap::new();
        hm.insert("age", 30);
        let map = into_data_map(hm).unwrap();
        assert_eq!(map.get("age"), Some(&json!(30)));
    }

    #[test]
    fn test_into_data_map_rejects_non_mappings() {
        for value in [json!([1, 2]), json!("text"), json!(5), json!(null)] {
            assert!(into_data_map(value).unwrap_err().is_validation());
        }
    }
}
