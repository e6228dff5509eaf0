//! Conversions between [`Value`] and the PostgreSQL binary protocol.
//!
//! Statement parameters take the type PostgreSQL infers from the destination
//! column, so encoding dispatches on that type rather than on the value.

use std::error::Error;
use std::str::FromStr;

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use tokio_postgres::types::{to_sql_checked, FromSql, IsNull, ToSql, Type};
use tokio_postgres::Row as PgRow;
use uuid::Uuid;

use crate::core::value::{Value, ValueKind};
use crate::mapper::sanitize::sanitize_owned;

type BoxError = Box<dyn Error + Sync + Send>;

/// Native scan kind for a PostgreSQL type.
pub fn kind_of(ty: &Type) -> ValueKind {
    match *ty {
        Type::BOOL => ValueKind::Bool,
        Type::INT2 | Type::INT4 | Type::INT8 | Type::OID => ValueKind::Integer,
        Type::FLOAT4 | Type::FLOAT8 => ValueKind::Float,
        Type::NUMERIC => ValueKind::Decimal,
        Type::TEXT
        | Type::VARCHAR
        | Type::BPCHAR
        | Type::NAME
        | Type::UNKNOWN
        | Type::JSON
        | Type::JSONB
        | Type::UUID => ValueKind::Text,
        Type::BYTEA => ValueKind::Bytes,
        Type::TIMESTAMP | Type::TIMESTAMPTZ | Type::DATE => ValueKind::Timestamp,
        _ => ValueKind::Other,
    }
}

/// Text column read as raw bytes so invalid UTF-8 can be sanitized instead
/// of failing the row.
struct RawText(Vec<u8>);

impl<'a> FromSql<'a> for RawText {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        Ok(RawText(raw.to_vec()))
    }

    fn accepts(ty: &Type) -> bool {
        matches!(
            *ty,
            Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN
        ) || ty.name() == "citext"
    }
}

/// Decode column `idx` of `row`.
pub fn decode_column(row: &PgRow, idx: usize) -> Result<Value, BoxError> {
    let ty = row.columns()[idx].type_().clone();
    let kind = kind_of(&ty);

    let value = match ty {
        Type::BOOL => row.try_get::<_, Option<bool>>(idx)?.map(Value::Bool),
        Type::INT2 => row.try_get::<_, Option<i16>>(idx)?.map(|v| Value::Int(v.into())),
        Type::INT4 => row.try_get::<_, Option<i32>>(idx)?.map(|v| Value::Int(v.into())),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx)?.map(Value::Int),
        Type::OID => row.try_get::<_, Option<u32>>(idx)?.map(|v| Value::Int(v.into())),
        Type::FLOAT4 => row.try_get::<_, Option<f32>>(idx)?.map(|v| Value::Float(v.into())),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx)?.map(Value::Float),
        Type::NUMERIC => row.try_get::<_, Option<Decimal>>(idx)?.map(Value::Decimal),
        Type::BYTEA => row.try_get::<_, Option<Vec<u8>>>(idx)?.map(Value::Bytes),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(Value::from),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(Value::from),
        Type::DATE => row
            .try_get::<_, Option<NaiveDate>>(idx)?
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(Value::from),
        Type::JSON | Type::JSONB => row
            .try_get::<_, Option<serde_json::Value>>(idx)?
            .map(|v| Value::Text(v.to_string())),
        Type::UUID => row
            .try_get::<_, Option<Uuid>>(idx)?
            .map(|v| Value::Text(v.to_string())),
        ref other if RawText::accepts(other) => row
            .try_get::<_, Option<RawText>>(idx)?
            .map(|raw| Value::Text(sanitize_owned(raw.0))),
        other => {
            return Err(format!(
                "column '{}' has unsupported type {}; cast it to text in the statement",
                row.columns()[idx].name(),
                other
            )
            .into())
        }
    };

    Ok(value.unwrap_or(Value::Null(kind)))
}

fn is_text_type(ty: &Type) -> bool {
    RawText::accepts(ty)
}

fn mismatch(value: &Value, ty: &Type) -> BoxError {
    format!("cannot encode {:?} value as {}", value.kind(), ty).into()
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        if self.is_null() {
            return Ok(IsNull::Yes);
        }

        match *ty {
            Type::BOOL => self
                .to_bool()
                .ok_or_else(|| mismatch(self, ty))?
                .to_sql(ty, out),
            Type::INT2 => {
                let v = self.to_i64().ok_or_else(|| mismatch(self, ty))?;
                i16::try_from(v)?.to_sql(ty, out)
            }
            Type::INT4 => {
                let v = self.to_i64().ok_or_else(|| mismatch(self, ty))?;
                i32::try_from(v)?.to_sql(ty, out)
            }
            Type::INT8 => self
                .to_i64()
                .ok_or_else(|| mismatch(self, ty))?
                .to_sql(ty, out),
            Type::FLOAT4 => (self.to_f64().ok_or_else(|| mismatch(self, ty))? as f32).to_sql(ty, out),
            Type::FLOAT8 => self
                .to_f64()
                .ok_or_else(|| mismatch(self, ty))?
                .to_sql(ty, out),
            Type::NUMERIC => {
                let d = match self {
                    Value::Text(s) => Decimal::from_str(s.trim())?,
                    other => other.to_decimal().ok_or_else(|| mismatch(self, ty))?,
                };
                d.to_sql(ty, out)
            }
            Type::BYTEA => match self {
                Value::Bytes(b) => b.as_slice().to_sql(ty, out),
                Value::Text(s) => s.as_bytes().to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            Type::TIMESTAMP => self
                .to_timestamp()
                .ok_or_else(|| mismatch(self, ty))?
                .naive_local()
                .to_sql(ty, out),
            Type::TIMESTAMPTZ => self
                .to_timestamp()
                .ok_or_else(|| mismatch(self, ty))?
                .with_timezone(&Utc)
                .to_sql(ty, out),
            Type::DATE => self
                .to_timestamp()
                .ok_or_else(|| mismatch(self, ty))?
                .date_naive()
                .to_sql(ty, out),
            Type::UUID => {
                let text = self.to_text().ok_or_else(|| mismatch(self, ty))?;
                Uuid::parse_str(text.trim())?.to_sql(ty, out)
            }
            Type::JSON | Type::JSONB => {
                let json: serde_json::Value = match self {
                    Value::Text(s) => serde_json::from_str(s)?,
                    Value::Int(i) => (*i).into(),
                    Value::Bool(b) => (*b).into(),
                    other => serde_json::Value::String(other.to_string()),
                };
                json.to_sql(ty, out)
            }
            ref other if is_text_type(other) => {
                let text = self.to_text().ok_or_else(|| mismatch(self, ty))?;
                text.as_str().to_sql(ty, out)
            }
            _ => Err(mismatch(self, ty)),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}
