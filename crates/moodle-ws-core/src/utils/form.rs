//! PHP-style form encoding.
//!
//! Nested values use bracket notation (`ids[0]=1&options[name]=x`), which is
//! what PHP's `$_POST` parser expects. Null values are skipped.

use serde_json::{Map, Value};
use url::form_urlencoded::byte_serialize;

/// Serialize an object to a form body.
pub fn serialize(value: &Value) -> String {
    match value {
        Value::Object(map) => serialize_map(map),
        _ => String::new(),
    }
}

pub fn serialize_map(map: &Map<String, Value>) -> String {
    let mut pairs = Vec::new();
    for (name, value) in map {
        collect_pairs(name, value, &mut pairs);
    }
    pairs.join("&")
}

fn collect_pairs(name: &str, value: &Value, pairs: &mut Vec<String>) {
    match value {
        Value::Null => {},
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                collect_pairs(&format!("{name}[{index}]"), item, pairs);
            }
        },
        Value::Object(map) => {
            for (key, item) in map {
                collect_pairs(&format!("{name}[{key}]"), item, pairs);
            }
        },
        Value::String(s) => pairs.push(encode_pair(name, s)),
        Value::Bool(b) => pairs.push(encode_pair(name, if *b { "true" } else { "false" })),
        Value::Number(n) => pairs.push(encode_pair(name, &n.to_string())),
    }
}

fn encode_pair(name: &str, value: &str) -> String {
    let name: String = byte_serialize(name.as_bytes()).collect();
    let value: String = byte_serialize(value.as_bytes()).collect();
    format!("{name}={value}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_values_use_brackets() {
        let body = serialize(&json!({
            "courseid": 3,
            "ids": [4, 5],
            "options": {"name": "a b", "empty": null},
        }));
        assert_eq!(
            body,
            "courseid=3&ids%5B0%5D=4&ids%5B1%5D=5&options%5Bname%5D=a+b"
        );
    }

    #[test]
    fn test_null_and_non_objects() {
        assert_eq!(serialize(&json!({"a": null})), "");
        assert_eq!(serialize(&json!([1, 2])), "");
        assert_eq!(serialize(&json!({"flag": true})), "flag=true");
    }
}
