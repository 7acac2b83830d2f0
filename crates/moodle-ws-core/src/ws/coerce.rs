//! Runtime type validation of RPC responses.

use moodle_ws_types::TypeExpected;
use serde_json::{Number, Value};

/// The body does not have (and cannot be coerced to) the expected type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeMismatch;

/// JavaScript-style runtime type name of a JSON value.
fn runtime_type(value: &Value) -> TypeExpected {
    match value {
        Value::Bool(_) => TypeExpected::Boolean,
        Value::Number(_) => TypeExpected::Number,
        Value::String(_) => TypeExpected::String,
        Value::Null | Value::Array(_) | Value::Object(_) => TypeExpected::Object,
    }
}

/// Check `value` against `expected`, coercing string bodies to numbers and booleans.
pub fn coerce(value: Value, expected: TypeExpected) -> Result<Value, TypeMismatch> {
    let expected = expected.effective();
    if runtime_type(&value) == expected {
        return Ok(value);
    }
    match (value, expected) {
        (Value::String(text), TypeExpected::Number) => parse_number(&text),
        (Value::String(text), TypeExpected::Boolean) => match text.as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(TypeMismatch),
        },
        _ => Err(TypeMismatch),
    }
}

fn parse_number(text: &str) -> Result<Value, TypeMismatch> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Value::from(0));
    }
    if let Ok(integer) = trimmed.parse::<i64>() {
        return Ok(Value::from(integer));
    }
    let float = trimmed.parse::<f64>().map_err(|_| TypeMismatch)?;
    if !float.is_finite() {
        return Err(TypeMismatch);
    }
    Number::from_f64(float).map(Value::Number).ok_or(TypeMismatch)
}

/// Whether a value counts as "no answer".
pub fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n == 0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}
