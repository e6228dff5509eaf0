//! Destination-side row coercion.
//!
//! After the source stream decodes a row, the [`RowMapper`] applies the
//! type map's destination rules: optional byte-encoding conversion, optional
//! template rendering, then conversion to string, decimal or timestamp.
//! Text sanitization happens earlier, inside each driver's decoder, via
//! [`sanitize::sanitize`].

pub mod encoding;
pub mod render;
pub mod sanitize;

pub use encoding::Encoding;
pub use render::{DotRenderer, Render};

use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;

use crate::core::value::{parse_timestamp, Row, Value, ValueKind};
use crate::error::{FerryError, Result};
use crate::typemap::{SemanticType, TypeMap};

/// Destination conversions. `bool` is a source-side override only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Coercion {
    String,
    Number,
    Date,
}

/// One destination rule bound to a column position.
#[derive(Debug, Clone)]
struct FieldRule {
    index: usize,
    field: String,
    kind: Coercion,
    nullable: bool,
    template: Option<String>,
    encoding: Option<Encoding>,
}

/// Applies destination rules to rows of one stream.
///
/// Built once from the stream's column names; rules naming fields the stream
/// does not produce are skipped.
pub struct RowMapper {
    rules: Vec<FieldRule>,
    renderer: Arc<dyn Render>,
}

impl RowMapper {
    /// Bind the type map's destination rules to `columns`.
    ///
    /// # Errors
    ///
    /// `EncodingFailed` for an unknown encoding name, `BadRequest` for a
    /// `bool` destination rule.
    pub fn new(columns: &[String], type_map: &TypeMap, renderer: Arc<dyn Render>) -> Result<Self> {
        let mut rules = Vec::new();

        if type_map.enabled {
            for (field, rule) in &type_map.destination {
                let Some(index) = columns.iter().position(|c| c == field) else {
                    continue;
                };

                let kind = match rule.kind {
                    SemanticType::String => Coercion::String,
                    SemanticType::Number => Coercion::Number,
                    SemanticType::Date => Coercion::Date,
                    SemanticType::Bool => {
                        return Err(FerryError::BadRequest(format!(
                            "type_map.destination.{}: type must be string, number or date",
                            field
                        )))
                    }
                };

                let encoding = match rule.encoding.as_deref() {
                    None | Some("") => None,
                    Some(name) => Some(Encoding::from_name(name).ok_or_else(|| {
                        FerryError::EncodingFailed {
                            field: field.clone(),
                            message: format!("unknown encoding '{}'", name),
                        }
                    })?),
                };

                rules.push(FieldRule {
                    index,
                    field: field.clone(),
                    kind,
                    nullable: rule.nullable,
                    template: rule.template.clone().filter(|t| !t.is_empty()),
                    encoding,
                });
            }
        }

        rules.sort_by_key(|r| r.index);
        Ok(Self { rules, renderer })
    }

    /// Whether no destination rule applies.
    pub fn is_noop(&self) -> bool {
        self.rules.is_empty()
    }

    /// Coerce the mapped fields of `row` in place.
    pub fn map_row(&self, row: &mut Row) -> Result<()> {
        for rule in &self.rules {
            let Some(slot) = row.get_mut(rule.index) else {
                continue;
            };
            let value = std::mem::replace(slot, Value::Null(ValueKind::Other));
            *slot = match rule.kind {
                Coercion::String => self.to_string_value(rule, value)?,
                Coercion::Number => self.to_number_value(rule, value)?,
                Coercion::Date => self.to_date_value(rule, value)?,
            };
        }
        Ok(())
    }

    fn to_string_value(&self, rule: &FieldRule, value: Value) -> Result<Value> {
        let text = match value {
            Value::Null(_) if rule.nullable => return Ok(Value::Null(ValueKind::Text)),
            Value::Null(_) => String::new(),
            Value::Bytes(b) => encoding::decode_bytes(rule.encoding, &b),
            Value::Text(s) => s,
            other => other.to_string(),
        };
        Ok(Value::Text(self.render(rule, text)?))
    }

    fn to_number_value(&self, rule: &FieldRule, value: Value) -> Result<Value> {
        let text = match value {
            Value::Null(_) if rule.nullable => return Ok(Value::Null(ValueKind::Decimal)),
            Value::Null(_) => String::new(),
            Value::Decimal(d) if rule.template.is_none() => return Ok(Value::Decimal(d)),
            Value::Int(i) if rule.template.is_none() => return Ok(Value::Decimal(Decimal::from(i))),
            Value::Bytes(b) => encoding::decode_bytes(rule.encoding, &b),
            Value::Text(s) => s,
            other => other.to_string(),
        };
        let text = self.render(rule, text)?;

        Decimal::from_str(text.trim())
            .or_else(|_| Decimal::from_scientific(text.trim()))
            .map(Value::Decimal)
            .map_err(|e| FerryError::ParseFailed {
                field: rule.field.clone(),
                value: text,
                expected: "number",
                message: e.to_string(),
            })
    }

    fn to_date_value(&self, rule: &FieldRule, value: Value) -> Result<Value> {
        let text = match value {
            Value::Null(_) if rule.nullable => return Ok(Value::Null(ValueKind::Timestamp)),
            Value::Null(_) => String::new(),
            Value::Timestamp(ts) if rule.template.is_none() => return Ok(Value::Timestamp(ts)),
            Value::Timestamp(ts) => ts.to_rfc3339(),
            Value::Bytes(b) => encoding::decode_bytes(rule.encoding, &b),
            Value::Text(s) => s,
            other => other.to_string(),
        };
        let text = self.render(rule, text)?;

        match parse_timestamp(&text) {
            Some(ts) => Ok(Value::Timestamp(ts)),
            None => Err(FerryError::ParseFailed {
                field: rule.field.clone(),
                value: text,
                expected: "date",
                message: "unrecognized timestamp layout".to_string(),
            }),
        }
    }

    fn render(&self, rule: &FieldRule, input: String) -> Result<String> {
        let Some(template) = rule.template.as_deref() else {
            return Ok(input);
        };
        let bytes = self
            .renderer
            .render(template, &input)
            .map_err(|e| FerryError::RenderFailed {
                field: rule.field.clone(),
                message: e.to_string(),
            })?;
        Ok(sanitize::sanitize_owned(bytes))
    }
}

impl std::fmt::Debug for RowMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowMapper").field("rules", &self.rules).finish()
    }
}
