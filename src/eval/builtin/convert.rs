use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value as JsonValue;
use smol_str::SmolStr;

use crate::Token;
use crate::eval::error::EvalError;
use crate::eval::value::Value;

/// Maps to JSON objects preserve their insertion order; values with no JSON
/// counterpart (functions) serialize as their display text. Collections have
/// reference semantics and may contain themselves, so the path of visited
/// containers is tracked by pointer identity and a cycle renders as `null`.
pub(crate) fn to_json(value: &Value) -> JsonValue {
    to_json_guarded(value, &mut Vec::new())
}

fn to_json_guarded(value: &Value, path: &mut Vec<*const ()>) -> JsonValue {
    match value {
        Value::None => JsonValue::Null,
        Value::Int(n) => JsonValue::Number((*n).into()),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Value::String(s) => JsonValue::String(s.clone()),
        Value::List(items) => {
            let ptr = Rc::as_ptr(items).cast::<()>();
            if path.contains(&ptr) {
                return JsonValue::Null;
            }
            path.push(ptr);
            let json = JsonValue::Array(
                items
                    .borrow()
                    .iter()
                    .map(|value| to_json_guarded(value, path))
                    .collect(),
            );
            path.pop();
            json
        }
        Value::Map(entries) => {
            let ptr = Rc::as_ptr(entries).cast::<()>();
            if path.contains(&ptr) {
                return JsonValue::Null;
            }
            path.push(ptr);
            let json = JsonValue::Object(
                entries
                    .borrow()
                    .iter()
                    .map(|(key, value)| (key.to_string(), to_json_guarded(value, path)))
                    .collect(),
            );
            path.pop();
            json
        }
        other => JsonValue::String(other.to_string()),
    }
}

/// JSON booleans come back as the truthy/falsy values of the language,
/// since there is no boolean type.
pub(crate) fn from_json(json: JsonValue) -> Value {
    match json {
        JsonValue::Null => Value::None,
        JsonValue::Bool(b) => Value::bool_value(b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => n.as_f64().map(Value::Float).unwrap_or_default(),
        },
        JsonValue::String(s) => Value::String(s),
        JsonValue::Array(items) => Value::List(Rc::new(RefCell::new(
            items.into_iter().map(from_json).collect(),
        ))),
        JsonValue::Object(entries) => Value::Map(Rc::new(RefCell::new(
            entries
                .into_iter()
                .map(|(key, value)| (SmolStr::new(key), from_json(value)))
                .collect(),
        ))),
    }
}

pub(crate) fn to_json_string(value: &Value, token: &Rc<Token>) -> Result<String, EvalError> {
    serde_json::to_string(&to_json(value))
        .map_err(|e| EvalError::InvalidJson((**token).clone(), e.to_string()))
}

pub(crate) fn parse_number(s: &str) -> Option<Value> {
    let text = s.trim();
    if let Ok(n) = text.parse::<i64>() {
        return Some(Value::Int(n));
    }
    text.parse::<f64>().ok().map(Value::Float)
}
