//! Request splitting for oversized array arguments.

use moodle_ws_types::SplitRequest;
use serde_json::{Map, Value};

/// Copies of `data` with `split.param` replaced by consecutive chunks of at
/// most `split.max_length` entries. `None` when there is nothing to split.
pub fn split_data(data: &Map<String, Value>, split: &SplitRequest) -> Option<Vec<Map<String, Value>>> {
    let items = data.get(&split.param)?.as_array()?;
    if items.is_empty() || split.max_length == 0 {
        return None;
    }
    let chunks = items
        .chunks(split.max_length)
        .map(|chunk| {
            let mut part = data.clone();
            part.insert(split.param.clone(), Value::Array(chunk.to_vec()));
            part
        })
        .collect();
    Some(chunks)
}

/// Merge chunk results in order, seeded with the first one.
///
/// A custom combination gets the zero-based index of `next` among the
/// results that follow the seed.
pub fn combine_results(results: Vec<Value>, split: &SplitRequest) -> Value {
    let mut results = results.into_iter();
    let Some(first) = results.next() else {
        return Value::Null;
    };
    results.enumerate().fold(first, |combined, (index, next)| match &split.combine {
        Some(combine) => combine(combined, next, index),
        None => combine_objects_arrays(combined, next),
    })
}

/// Concatenate every array field of `next` onto the same field of `combined`.
fn combine_objects_arrays(mut combined: Value, next: Value) -> Value {
    let (Some(target), Value::Object(source)) = (combined.as_object_mut(), next) else {
        return combined;
    };
    for (name, value) in source {
        let Value::Array(items) = value else {
            continue;
        };
        match target.get_mut(&name) {
            Some(Value::Array(existing)) => existing.extend(items),
            _ => {
                target.insert(name, Value::Array(items));
            },
        }
    }
    combined
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_split_into_chunks() {
        let data = object(json!({"ids": [1, 2, 3, 4, 5], "courseid": 2}));
        let parts = split_data(&data, &SplitRequest::new("ids", 2)).unwrap();
        let ids: Vec<_> = parts.iter().map(|part| part["ids"].clone()).collect();
        assert_eq!(ids, vec![json!([1, 2]), json!([3, 4]), json!([5])]);
        assert!(parts.iter().all(|part| part["courseid"] == json!(2)));
    }

    #[test]
    fn test_nothing_to_split() {
        let split = SplitRequest::new("ids", 2);
        assert!(split_data(&object(json!({"ids": []})), &split).is_none());
        assert!(split_data(&object(json!({"ids": "1,2"})), &split).is_none());
        assert!(split_data(&object(json!({})), &split).is_none());
    }

    #[test]
    fn test_default_combination_concatenates_arrays() {
        let combined = combine_results(
            vec![
                json!({"items": [1, 2], "warnings": []}),
                json!({"items": [3, 4], "warnings": [{"item": "x"}]}),
                json!({"items": [5], "total": 9}),
            ],
            &SplitRequest::new("ids", 2),
        );
        assert_eq!(combined["items"], json!([1, 2, 3, 4, 5]));
        assert_eq!(combined["warnings"], json!([{"item": "x"}]));
        assert!(combined.get("total").is_none());
    }

    #[test]
    fn test_custom_combination() {
        let split = SplitRequest::new("ids", 1).with_combine(Arc::new(|acc, next, index| {
            json!(acc.as_i64().unwrap_or(0) + next.as_i64().unwrap_or(0) * index as i64)
        }));
        // 1 + 10 * 0 + 100 * 1
        assert_eq!(combine_results(vec![json!(1), json!(10), json!(100)], &split), json!(101));
    }
}
