//! Value-to-string conversion of call arguments.

use serde_json::{Map, Value};

/// Legacy flags serialized as `"true"`/`"false"` so cache keys stay stable.
const LITERAL_BOOLEAN_KEYS: &[&str] = &["moodlewssettingfilter", "moodlewssettingfileurl"];

/// Convert every scalar of `data` to a string, dropping nulls.
///
/// Booleans become `"1"`/`"0"`. With `strip_unicode`, characters outside the
/// Basic Multilingual Plane's non-surrogate range are removed; a string that
/// ends up blank after stripping aborts the whole conversion (`None`).
pub fn convert_values_to_string(data: &Value, strip_unicode: bool) -> Option<Value> {
    convert_value(None, data, strip_unicode)
}

fn convert_value(key: Option<&str>, value: &Value, strip_unicode: bool) -> Option<Value> {
    let converted = match value {
        // Callers filter nulls before recursing; a bare null stays null.
        Value::Null => Value::Null,
        Value::Array(items) => {
            let mut result = Vec::with_capacity(items.len());
            for item in items.iter().filter(|item| !item.is_null()) {
                result.push(convert_value(None, item, strip_unicode)?);
            }
            Value::Array(result)
        },
        Value::Object(map) => {
            let mut result = Map::with_capacity(map.len());
            for (name, item) in map.iter().filter(|(_, item)| !item.is_null()) {
                result.insert(name.clone(), convert_value(Some(name), item, strip_unicode)?);
            }
            Value::Object(result)
        },
        Value::Bool(flag) => {
            let literal = key.is_some_and(|key| LITERAL_BOOLEAN_KEYS.contains(&key));
            let text = match (literal, *flag) {
                (true, true) => "true",
                (true, false) => "false",
                (false, true) => "1",
                (false, false) => "0",
            };
            Value::String(text.to_string())
        },
        Value::Number(number) => Value::String(number.to_string()),
        Value::String(text) if strip_unicode => {
            let stripped = strip_unicode_chars(text);
            if stripped != *text && stripped.trim().is_empty() {
                return None;
            }
            Value::String(stripped)
        },
        Value::String(text) => Value::String(text.clone()),
    };
    Some(converted)
}

/// Remove characters the server's database charset may not store.
fn strip_unicode_chars(text: &str) -> String {
    text.chars().filter(|c| u32::from(*c) <= 0xD7FF).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalars_become_strings_and_nulls_drop() {
        let converted =
            convert_values_to_string(&json!({"a": 1, "b": true, "c": null, "d": [1, null, 2]}), false);
        assert_eq!(converted, Some(json!({"a": "1", "b": "1", "d": ["1", "2"]})));
    }

    #[test]
    fn test_legacy_flags_keep_literal_booleans() {
        let converted = convert_values_to_string(
            &json!({"moodlewssettingfilter": true, "moodlewssettingfileurl": false, "other": false}),
            false,
        );
        assert_eq!(
            converted,
            Some(json!({"moodlewssettingfilter": "true", "moodlewssettingfileurl": "false", "other": "0"}))
        );
    }

    #[test]
    fn test_nested_objects_are_converted() {
        let converted =
            convert_values_to_string(&json!({"options": [{"name": "x", "value": 2.5}]}), false);
        assert_eq!(converted, Some(json!({"options": [{"name": "x", "value": "2.5"}]})));
    }

    #[test]
    fn test_strip_unicode() {
        assert_eq!(
            convert_values_to_string(&json!({"text": "Hi 😀 there"}), true),
            Some(json!({"text": "Hi  there"}))
        );
        assert_eq!(convert_values_to_string(&json!({"text": "😀😀"}), true), None);
        assert_eq!(convert_values_to_string(&json!({"list": ["ok", "😀"]}), true), None);
        // Blank strings are only rejected when stripping emptied them.
        assert_eq!(convert_values_to_string(&json!({"text": " "}), true), Some(json!({"text": " "})));
    }
}
