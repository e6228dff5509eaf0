//! Dynamically typed SQL values, rows and the batch accumulator.
//!
//! Every driver decodes into [`Value`] and binds from it, so rows can move
//! between engines without per-engine record types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::mapper::sanitize;

/// Kind of a value, also used as the type hint carried by NULLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    Integer,
    Float,
    Decimal,
    Text,
    Bytes,
    Timestamp,
    /// Kind the decoder has no semantic mapping for.
    Other,
}

impl ValueKind {
    /// Whether values of this kind are numeric.
    pub fn is_numeric(self) -> bool {
        matches!(self, ValueKind::Integer | ValueKind::Float | ValueKind::Decimal)
    }
}

/// A single SQL value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// NULL with type hint.
    Null(ValueKind),
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Arbitrary-precision decimal.
    Decimal(Decimal),
    /// Valid UTF-8 text. Drivers sanitize before constructing this.
    Text(String),
    Bytes(Vec<u8>),
    /// Timestamp; naive source values are stored at UTC.
    Timestamp(DateTime<FixedOffset>),
}

impl Value {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null(_))
    }

    /// Kind of this value (the hint for NULLs).
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null(k) => *k,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Integer,
            Value::Float(_) => ValueKind::Float,
            Value::Decimal(_) => ValueKind::Decimal,
            Value::Text(_) => ValueKind::Text,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::Timestamp(_) => ValueKind::Timestamp,
        }
    }

    /// String form of a non-null value; `None` for NULL.
    ///
    /// Bytes are decoded as UTF-8 with invalid bytes replaced.
    #[must_use]
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null(_) => None,
            Value::Text(s) => Some(s.clone()),
            Value::Bytes(b) => Some(sanitize::sanitize(b)),
            other => Some(other.to_string()),
        }
    }

    /// Numeric value as a decimal, if it has one.
    ///
    /// Floats go through their shortest string form so `0.1` stays `0.1`.
    #[must_use]
    pub fn to_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Int(i) => Some(Decimal::from(*i)),
            Value::Float(f) => float_to_decimal(*f),
            Value::Decimal(d) => Some(*d),
            Value::Bool(b) => Some(Decimal::from(u8::from(*b))),
            _ => None,
        }
    }

    /// Integer value, if it has one without loss.
    #[must_use]
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Value::Decimal(d) if d.fract().is_zero() => d.to_i64(),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Float value, if it has one.
    #[must_use]
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Decimal(d) => d.to_f64(),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Boolean value, accepting integers and the usual textual spellings.
    #[must_use]
    pub fn to_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(i) => Some(*i != 0),
            Value::Text(s) => parse_bool(s),
            Value::Bytes(b) => std::str::from_utf8(b).ok().and_then(parse_bool),
            _ => None,
        }
    }

    /// Timestamp value, parsing text when needed.
    #[must_use]
    pub fn to_timestamp(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            Value::Text(s) => parse_timestamp(s),
            Value::Bytes(b) => std::str::from_utf8(b).ok().and_then(parse_timestamp),
            _ => None,
        }
    }
}

/// Stringification used for uniform query output: NULL renders empty.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null(_) => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Text(s) => f.write_str(s),
            Value::Bytes(b) => f.write_str(&sanitize::sanitize(b)),
            Value::Timestamp(ts) => f.write_str(&ts.to_rfc3339()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(v: DateTime<FixedOffset>) -> Self {
        Value::Timestamp(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v.fixed_offset())
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v.and_utc().fixed_offset())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null(ValueKind::Other),
        }
    }
}

/// A decoded row: values aligned to the stream's column list.
pub type Row = Vec<Value>;

/// Bounded accumulator of rows for one batched statement.
///
/// Owned by a single transfer call; never shared.
#[derive(Debug)]
pub struct Batch {
    capacity: usize,
    rows: Vec<Row>,
}

impl Batch {
    /// Create a batch holding up to `capacity` rows (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            rows: Vec::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Full at exactly capacity.
    pub fn is_full(&self) -> bool {
        self.rows.len() >= self.capacity
    }

    pub fn push(&mut self, row: Row) {
        self.rows.push(row);
    }

    /// Take the rows flattened row-major, leaving the batch empty.
    pub fn drain_flat(&mut self) -> Vec<Value> {
        let width = self.rows.first().map_or(0, Vec::len);
        let mut flat = Vec::with_capacity(width * self.rows.len());
        for row in self.rows.drain(..) {
            flat.extend(row);
        }
        flat
    }
}

/// Parse a timestamp in the layouts databases commonly hand back as text.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.f][±zz[:zz]]`, the `T`-separated
/// naive form and a bare date. Naive values are taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts);
    }
    for layout in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%#z"] {
        if let Ok(ts) = DateTime::parse_from_str(s, layout) {
            return Some(ts);
        }
    }
    for layout in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, layout) {
            return Some(naive.and_utc().fixed_offset());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Some(true),
        "false" | "f" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}

fn float_to_decimal(f: f64) -> Option<Decimal> {
    if !f.is_finite() {
        return None;
    }
    Decimal::from_str(&f.to_string())
        .ok()
        .or_else(|| Decimal::from_f64_retain(f))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_null_is_empty() {
        assert_eq!(Value::Null(ValueKind::Text).to_string(), "");
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::from("abc").to_string(), "abc");
    }

    #[test]
    fn test_display_bytes_replaces_invalid() {
        let v = Value::Bytes(vec![b'a', 0xff, b'b']);
        assert_eq!(v.to_string(), "a\u{FFFD}b");
    }

    #[test]
    fn test_float_to_decimal_keeps_short_form() {
        let d = Value::Float(0.1).to_decimal().unwrap();
        assert_eq!(d.to_string(), "0.1");
        assert!(Value::Float(f64::NAN).to_decimal().is_none());
    }

    #[test]
    fn test_to_i64() {
        assert_eq!(Value::Decimal(Decimal::new(500, 2)).to_i64(), Some(5));
        assert_eq!(Value::Decimal(Decimal::new(501, 2)).to_i64(), None);
        assert_eq!(Value::from(" 12 ").to_i64(), Some(12));
    }

    #[test]
    fn test_to_bool() {
        assert_eq!(Value::from("TRUE").to_bool(), Some(true));
        assert_eq!(Value::from("f").to_bool(), Some(false));
        assert_eq!(Value::Int(0).to_bool(), Some(false));
        assert_eq!(Value::from("maybe").to_bool(), None);
    }

    #[test]
    fn test_parse_timestamp_layouts() {
        let rfc = parse_timestamp("2024-03-01T10:20:30+02:00").unwrap();
        assert_eq!(rfc.offset().local_minus_utc(), 7200);

        let spaced = parse_timestamp("2024-03-01 10:20:30.250").unwrap();
        assert_eq!(spaced.to_rfc3339(), "2024-03-01T10:20:30.250+00:00");

        let with_offset = parse_timestamp("2024-03-01 10:20:30+05:30").unwrap();
        assert_eq!(with_offset.offset().local_minus_utc(), 19800);

        let t_naive = parse_timestamp("2024-03-01T10:20:30").unwrap();
        assert_eq!(t_naive.to_rfc3339(), "2024-03-01T10:20:30+00:00");

        let date = parse_timestamp("2024-03-01").unwrap();
        assert_eq!(date.to_rfc3339(), "2024-03-01T00:00:00+00:00");

        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_option_into_value() {
        let v: Value = Option::<i64>::None.into();
        assert!(v.is_null());
        let v: Value = Some(3i64).into();
        assert_eq!(v, Value::Int(3));
    }

    #[test]
    fn test_batch_minimum_capacity() {
        let batch = Batch::new(0);
        assert_eq!(batch.capacity(), 1);
    }

    #[test]
    fn test_batch_full_and_drain() {
        let mut batch = Batch::new(2);
        batch.push(vec![Value::Int(1), Value::from("a")]);
        assert!(!batch.is_full());
        batch.push(vec![Value::Int(2), Value::from("b")]);
        assert!(batch.is_full());

        let flat = batch.drain_flat();
        assert_eq!(
            flat,
            vec![
                Value::Int(1),
                Value::from("a"),
                Value::Int(2),
                Value::from("b")
            ]
        );
        assert!(batch.is_empty());
    }
}
