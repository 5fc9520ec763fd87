//! Request field parsing shared by the device and user routes.
//!
//! Devices send identifiers and volumes either as JSON numbers or as numeric
//! strings (query parameters are always strings), so every parser accepts
//! both.

use serde_json::Value;

use crate::constants::ID_SPACE;

fn out_of_bounds(name: &str) -> String {
    format!("Invalid request: {name} is out of bounds")
}

/// Integral value of a JSON number or numeric string. `42.0` counts as 42.
pub fn integer_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().and_then(integral_f64)),
        Value::String(s) => integer_from_str(s),
        _ => None,
    }
}

pub fn integer_from_str(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    trimmed
        .parse::<i64>()
        .ok()
        .or_else(|| trimmed.parse::<f64>().ok().and_then(integral_f64))
}

fn integral_f64(v: f64) -> Option<i64> {
    // i64::MAX is not representable; 2^63 as f64 is the exclusive bound.
    if v.is_finite() && v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}

fn in_id_space(v: i64) -> Option<u32> {
    u64::try_from(v)
        .ok()
        .filter(|v| *v < ID_SPACE)
        .and_then(|v| u32::try_from(v).ok())
}

/// `chip_id` for signup: an integer in (0, 2^32).
pub fn signup_chip_id(value: Option<&Value>) -> Result<u32, String> {
    value
        .and_then(integer_from_value)
        .and_then(in_id_space)
        .filter(|id| *id != 0)
        .ok_or_else(|| out_of_bounds("chip_id"))
}

/// Identifier on the read paths: an integer in [0, 2^32).
pub fn query_id(raw: Option<&str>, name: &str) -> Result<u32, String> {
    raw.and_then(integer_from_str)
        .and_then(in_id_space)
        .ok_or_else(|| out_of_bounds(name))
}

/// `user_id` from a JSON body on the read path: an integer in [0, 2^32).
pub fn body_id(value: Option<&Value>, name: &str) -> Result<u32, String> {
    value
        .and_then(integer_from_value)
        .and_then(in_id_space)
        .ok_or_else(|| out_of_bounds(name))
}

/// Identifier on the write path: any integer, no range check.
pub fn reading_id(value: Option<&Value>, name: &str) -> Result<i64, String> {
    value
        .and_then(integer_from_value)
        .ok_or_else(|| format!("Invalid request: {name} must be an integer"))
}

/// `flow_volume`: a finite number, given as a JSON number or numeric string.
pub fn flow_volume(value: Option<&Value>) -> Result<f64, String> {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| "Invalid request: flow_volume must be a number".to_string())
}
