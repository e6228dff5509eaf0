//! Column decode-target resolution and coercion.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::core::schema::ColumnDescriptor;
use crate::core::value::{parse_timestamp, Value, ValueKind};

use super::{SemanticType, TypeMap};

/// How one column's values are decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeTarget {
    /// Coerce into a semantic type.
    Typed { kind: SemanticType, nullable: bool },
    /// Keep whatever the driver decoded.
    Untyped,
}

/// Decode targets for every column of one statement, in column order.
///
/// Built once per stream and reused for every row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodePlan {
    targets: Vec<(String, DecodeTarget)>,
}

impl DecodePlan {
    /// Plan that keeps every column's native decoding.
    fn dynamic(columns: &[ColumnDescriptor]) -> Self {
        Self {
            targets: columns
                .iter()
                .map(|c| (c.name.clone(), DecodeTarget::Untyped))
                .collect(),
        }
    }

    pub fn targets(&self) -> &[(String, DecodeTarget)] {
        &self.targets
    }

    /// Coerce a natively decoded row in place.
    pub fn apply(&self, row: &mut [Value]) -> Result<(), DecodeError> {
        for ((name, target), value) in self.targets.iter().zip(row.iter_mut()) {
            if let DecodeTarget::Typed { .. } = target {
                let taken = std::mem::replace(value, Value::Null(ValueKind::Other));
                *value = target.coerce(name, taken)?;
            }
        }
        Ok(())
    }
}

/// Resolve decode targets for a result set.
///
/// A declared column override wins. Otherwise numeric kinds become
/// (nullable) decimals, text becomes string and booleans stay bool, each
/// with the column's reported nullability. Other kinds decode untyped. A
/// disabled map yields an all-untyped plan.
pub fn resolve(columns: &[ColumnDescriptor], type_map: &TypeMap) -> DecodePlan {
    if !type_map.enabled {
        return DecodePlan::dynamic(columns);
    }

    let targets = columns
        .iter()
        .map(|col| {
            let target = match type_map.column_override(&col.name) {
                Some(o) => DecodeTarget::Typed {
                    kind: o.kind,
                    nullable: o.nullable,
                },
                None => match col.kind {
                    k if k.is_numeric() => DecodeTarget::Typed {
                        kind: SemanticType::Number,
                        nullable: col.nullable,
                    },
                    ValueKind::Text => DecodeTarget::Typed {
                        kind: SemanticType::String,
                        nullable: col.nullable,
                    },
                    ValueKind::Bool => DecodeTarget::Typed {
                        kind: SemanticType::Bool,
                        nullable: col.nullable,
                    },
                    _ => DecodeTarget::Untyped,
                },
            };
            (col.name.clone(), target)
        })
        .collect();

    DecodePlan { targets }
}

impl DecodeTarget {
    /// Convert a natively decoded value into this target.
    ///
    /// NULL into a non-nullable target is an error.
    pub fn coerce(&self, column: &str, value: Value) -> Result<Value, DecodeError> {
        let (kind, nullable) = match *self {
            DecodeTarget::Untyped => return Ok(value),
            DecodeTarget::Typed { kind, nullable } => (kind, nullable),
        };

        if value.is_null() {
            return if nullable {
                Ok(Value::Null(null_kind(kind)))
            } else {
                Err(DecodeError::new(
                    column,
                    format!("NULL cannot be decoded into non-nullable {}", kind),
                ))
            };
        }

        let converted = match kind {
            SemanticType::String => value.to_text().map(Value::Text),
            SemanticType::Number => match &value {
                Value::Text(s) => Decimal::from_str(s.trim()).ok().map(Value::Decimal),
                Value::Bool(_) => None,
                other => other.to_decimal().map(Value::Decimal),
            },
            SemanticType::Date => value.to_timestamp().map(Value::Timestamp),
            SemanticType::Bool => value.to_bool().map(Value::Bool),
        };

        converted.ok_or_else(|| {
            DecodeError::new(
                column,
                format!("cannot decode {:?} as {}", value.kind(), kind),
            )
        })
    }
}

fn null_kind(kind: SemanticType) -> ValueKind {
    match kind {
        SemanticType::String => ValueKind::Text,
        SemanticType::Number => ValueKind::Decimal,
        SemanticType::Date => ValueKind::Timestamp,
        SemanticType::Bool => ValueKind::Bool,
    }
}

/// A value could not be decoded into its column's target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    pub column: String,
    pub message: String,
}

impl DecodeError {
    pub fn new(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "column '{}': {}", self.column, self.message)
    }
}

impl std::error::Error for DecodeError {}
