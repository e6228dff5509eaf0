//! Decoding of textual wire values into [`Value`].

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::core::value::{parse_timestamp, Value, ValueKind};
use crate::mapper::sanitize::sanitize_owned;

/// Decode raw text bytes according to the column's native kind.
///
/// Values that do not parse as their declared kind (zero dates, out-of-range
/// integers) fall back to sanitized text rather than failing the row.
pub fn decode_text(kind: ValueKind, bytes: Vec<u8>) -> Value {
    match kind {
        ValueKind::Bytes | ValueKind::Other => return Value::Bytes(bytes),
        ValueKind::Text => return Value::Text(sanitize_owned(bytes)),
        _ => {}
    }

    let text = sanitize_owned(bytes);
    let trimmed = text.trim();
    let parsed = match kind {
        ValueKind::Integer => trimmed
            .parse::<i64>()
            .ok()
            .map(Value::Int)
            .or_else(|| Decimal::from_str(trimmed).ok().map(Value::Decimal)),
        ValueKind::Float => trimmed.parse::<f64>().ok().map(Value::Float),
        ValueKind::Decimal => Decimal::from_str(trimmed).ok().map(Value::Decimal),
        ValueKind::Bool => Value::Text(trimmed.to_string()).to_bool().map(Value::Bool),
        ValueKind::Timestamp => parse_timestamp(trimmed).map(Value::Timestamp),
        _ => None,
    };

    parsed.unwrap_or(Value::Text(text))
}
