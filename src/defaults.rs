//! Default-value policy.
//!
//! A value is *empty* when it is absent, `null` or `""`. `0`, `false` and
//! empty containers are real values.

use serde_json::{Number, Value};

/// Emptiness test shared by raw and coerced values.
pub trait MaybeEmpty {
    fn is_empty_value(&self) -> bool;
}

impl MaybeEmpty for Value {
    fn is_empty_value(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            _ => false,
        }
    }
}

impl MaybeEmpty for String {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl MaybeEmpty for Number {
    fn is_empty_value(&self) -> bool {
        false
    }
}

impl MaybeEmpty for bool {
    fn is_empty_value(&self) -> bool {
        false
    }
}

impl<T: MaybeEmpty> MaybeEmpty for Option<T> {
    fn is_empty_value(&self) -> bool {
        self.as_ref().map_or(true, T::is_empty_value)
    }
}

/// Returns `true` when `value` is absent, null or the empty string.
pub fn is_empty<T: MaybeEmpty>(value: &Option<T>) -> bool {
    value.is_empty_value()
}

/// Applies the caller's default to an empty resolved value.
///
/// `default` is `None` when the caller supplied none; `Some(Value::Null)` and
/// `Some("")` are explicit defaults and are returned as-is. Without a default
/// an empty value comes back untouched, so absent, null and `""` stay
/// distinguishable. Applying this twice with the same default gives the same
/// result as applying it once.
pub fn derive_value<T: MaybeEmpty>(resolved: Option<T>, default: Option<T>) -> Option<T> {
    match default {
        Some(default) if resolved.is_empty_value() => Some(default),
        _ => resolved,
    }
}
