//! Runtime values for the server-side expression evaluator.
//!
//! `serde_json::Value` cannot represent `undefined`, NaN, or infinities,
//! all of which the expression language's arithmetic can produce, so the
//! evaluator runs on its own value type. Conversion back to JSON collapses
//! `undefined` to null and non-finite numbers to null, matching JSON
//! serialization of those values everywhere else.

use indexmap::IndexMap;
use serde_json::Value as Json;

/// 2^53: the largest magnitude at which every integer is exact in f64 and
/// an i64 cast is lossless.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
}

impl Value {
    pub fn from_json(json: &Json) -> Value {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
            Json::String(s) => Value::String(s.clone()),
            Json::Array(items) => Value::Array(items.iter().map(Value::from_json).collect()),
            Json::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    pub fn to_json(&self) -> Json {
        match self {
            Value::Undefined | Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => {
                // Integers survive the f64 detour: emit a JSON integer for
                // exact integral values so 1 does not come back as 1.0.
                if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
                    Json::from(*n as i64)
                } else {
                    serde_json::Number::from_f64(*n)
                        .map(Json::Number)
                        .unwrap_or(Json::Null)
                }
            }
            Value::String(s) => Json::String(s.clone()),
            Value::Array(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Object(map) => Json::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// JS truthiness: empty string, 0, NaN, null, undefined, false are
    /// falsy; everything else (including empty arrays and objects) is truthy.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }

    /// String coercion matching JS `String(v)`.
    pub fn js_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => fmt_number(*n),
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(|v| match v {
                    // Array join renders null/undefined as empty, unlike
                    // top-level coercion.
                    Value::Undefined | Value::Null => String::new(),
                    other => other.js_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => "[object Object]".to_string(),
        }
    }

    /// String form used when a value lands in rendered output: null and
    /// undefined become nothing, not the words "null"/"undefined".
    pub fn render_string(&self) -> String {
        match self {
            Value::Undefined | Value::Null => String::new(),
            other => other.js_string(),
        }
    }

    /// Numeric coercion for arithmetic fallbacks. Strings are NOT parsed:
    /// only actual numbers and booleans carry a numeric value, everything
    /// else is 0.
    pub fn as_number(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Bool(true) => 1.0,
            _ => 0.0,
        }
    }

    /// Loose equality for `==`/`!=`: null and undefined are mutually equal,
    /// otherwise same-type comparison with no cross-type coercion.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
            (a, b) => a == b,
        }
    }
}

/// JS-style number formatting: integral values print without a decimal
/// point, NaN and infinities by name.
pub fn fmt_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == n.trunc() && n.abs() <= MAX_SAFE_INTEGER {
        // The i64 cast also normalizes -0 to "0". Integral values above
        // 2^53 would saturate the cast; the float formatter below prints
        // them digit-exact without a decimal point.
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
