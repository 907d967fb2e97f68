//! Coercion of raw backend values into normalized shapes.
//!
//! Every function here is total: malformed input maps to `false` / `None` /
//! the original string, never to an error.

use serde_json::{Number, Value};

/// Largest integer an `f64` represents exactly (2^53).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Boolean view of a raw value.
///
/// Strings are `true` for case-insensitive `"true"` or the literal `"1"`,
/// numbers only for `1`. Everything else (absent, null, objects) is `false`.
pub fn to_bool(raw: Option<&Value>) -> bool {
    match raw {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true") || s == "1",
        Some(Value::Number(n)) => n.as_f64() == Some(1.0),
        _ => false,
    }
}

/// Textual view of a raw value. Objects and arrays serialize to JSON text.
pub fn to_str(raw: Option<&Value>) -> Option<String> {
    match raw? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(number_to_string(n)),
        structured @ (Value::Object(_) | Value::Array(_)) => Some(structured.to_string()),
    }
}

/// Structured view of a raw value.
///
/// Objects and arrays pass through; strings go through [`safe_parse`].
pub fn to_object(raw: Option<&Value>) -> Option<Value> {
    match raw? {
        structured @ (Value::Object(_) | Value::Array(_)) => Some(structured.clone()),
        Value::String(s) => safe_parse(s),
        _ => None,
    }
}

/// Numeric view of a raw value. Booleans map to `1` / `0`.
pub fn to_number(raw: Option<&Value>) -> Option<Number> {
    match raw? {
        Value::Number(n) => Some(n.clone()),
        Value::Bool(b) => Some(Number::from(u8::from(*b))),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

/// Auto-detects the most specific representation of a raw value.
///
/// Absent and null pass through. Strings resolve as number, then boolean,
/// then structured JSON, falling back to the string itself. `"1"` and `"0"`
/// therefore become numbers here even though [`to_bool`] reads `"1"` as true.
pub fn to_value(raw: Option<&Value>) -> Option<Value> {
    let value = raw?;
    Some(match value {
        Value::String(s) => infer_from_str(s),
        other => other.clone(),
    })
}

fn infer_from_str(s: &str) -> Value {
    if let Some(n) = parse_number(s) {
        return Value::Number(n);
    }
    if s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("false") {
        return Value::Bool(s.eq_ignore_ascii_case("true"));
    }
    safe_parse(s).unwrap_or_else(|| Value::String(s.to_owned()))
}

/// Parses JSON text from an untrusted source.
///
/// `__proto__` keys, and `constructor` keys holding a `prototype`, are
/// removed at every depth. Invalid text and a bare `null` yield `None`.
pub fn safe_parse(text: &str) -> Option<Value> {
    let mut value: Value = serde_json::from_str(text).ok()?;
    if value.is_null() {
        return None;
    }
    strip_prototype_keys(&mut value);
    Some(value)
}

fn strip_prototype_keys(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.remove("__proto__");
            if map
                .get("constructor")
                .is_some_and(|ctor| ctor.get("prototype").is_some())
            {
                map.remove("constructor");
            }
            map.values_mut().for_each(strip_prototype_keys);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_prototype_keys),
        _ => {}
    }
}

/// Parses numeric text: decimal (with fraction/exponent) or `0x`/`0o`/`0b`
/// integers, surrounding whitespace ignored. Blank text and non-finite
/// results are not numbers.
pub fn parse_number(text: &str) -> Option<Number> {
    let t = text.trim();
    if t.is_empty() {
        return None;
    }
    if let Some(n) = parse_radix_literal(t) {
        return Some(n);
    }
    // keeps "inf"/"NaN" spellings out of the f64 parser
    if !t
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'))
    {
        return None;
    }
    if let Ok(i) = t.parse::<i64>() {
        return Some(Number::from(i));
    }
    number_from_f64(t.parse::<f64>().ok()?)
}

fn parse_radix_literal(t: &str) -> Option<Number> {
    let (digits, radix) = match t.get(..2)? {
        "0x" | "0X" => (&t[2..], 16),
        "0o" | "0O" => (&t[2..], 8),
        "0b" | "0B" => (&t[2..], 2),
        _ => return None,
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    match u64::from_str_radix(digits, radix) {
        Ok(n) => Some(Number::from(n)),
        Err(_) => number_from_f64(
            digits
                .chars()
                .filter_map(|c| c.to_digit(radix))
                .fold(0.0, |acc, d| acc * f64::from(radix) + f64::from(d)),
        ),
    }
}

/// Integral values are stored as integers so `"42.0"` and `"42"` agree.
fn number_from_f64(f: f64) -> Option<Number> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < MAX_SAFE_INTEGER {
        return Some(Number::from(f as i64));
    }
    Number::from_f64(f)
}

/// Plain decimal text, never exponent notation: `1e21` prints as
/// `1000000000000000000000`.
fn number_to_string(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() => f.to_string(),
        _ => n.to_string(),
    }
}
