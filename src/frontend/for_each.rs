use crate::frontend::core::EvalError;
use crate::value::{Number, Value};

/// Coerce an evaluated `count` to an instance count.
///
/// Integers pass through, floats truncate and integer-looking strings parse.
/// Anything else (including placeholders) is unknown and returns `None`,
/// which callers treat the same as zero.
pub fn count_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(Number::Int(i)) => Some(*i),
        Value::Number(Number::Float(f)) if f.is_finite() => Some(f.trunc() as i64),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Number of instances produced by a `for_each` value.
///
/// Maps and lists count their entries. Any other shape, such as an
/// unevaluated `toset(...)` call, counts as a single instance; this is a
/// deliberate approximation.
pub fn for_each_count(value: &Value) -> i64 {
    match value {
        Value::Map(m) => m.len() as i64,
        Value::List(l) => l.len() as i64,
        _ => 1,
    }
}

/// Resolve the final instance count for a resource from its (optional)
/// `count` and `for_each` evaluations. `for_each` wins when both are set.
/// A hard evaluation failure of either meta-argument (for example a `for`
/// expression) yields `None`, so the resource is left out instead of being
/// counted once.
pub fn instance_count(
    count: Option<&Result<Value, EvalError>>,
    for_each: Option<&Result<Value, EvalError>>,
) -> Option<i64> {
    match (for_each, count) {
        (Some(Ok(fe)), _) => Some(for_each_count(fe)),
        (Some(Err(_)), _) => None,
        (None, Some(Ok(c))) => count_from_value(c),
        (None, Some(Err(_))) => None,
        (None, None) => Some(1),
    }
}
