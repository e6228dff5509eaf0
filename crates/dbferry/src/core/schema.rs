//! Result-set column metadata.

use serde::Serialize;

use super::value::ValueKind;

/// Column metadata reported by a driver for a statement's result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDescriptor {
    /// Column name.
    pub name: String,

    /// Driver-reported type name (e.g., "int4", "VARCHAR", "DATETIME").
    pub type_name: String,

    /// Native scan kind.
    #[serde(skip)]
    pub kind: ValueKind,

    /// Whether the column allows NULL. Drivers that cannot tell report `true`.
    pub nullable: bool,
}

impl ColumnDescriptor {
    pub fn new(
        name: impl Into<String>,
        type_name: impl Into<String>,
        kind: ValueKind,
        nullable: bool,
    ) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            kind,
            nullable,
        }
    }
}

/// Classify a declared SQL type name into a scan kind.
///
/// Used by drivers whose metadata is only a type name (SQLite declared
/// types, expression columns). Matching is case-insensitive and ignores any
/// length/precision suffix.
pub fn classify_type_name(type_name: &str) -> ValueKind {
    let lower = type_name.to_ascii_lowercase();
    let base = lower.split('(').next().unwrap_or("").trim();

    match base {
        "bool" | "boolean" | "bit" => ValueKind::Bool,
        "int" | "integer" | "int2" | "int4" | "int8" | "smallint" | "bigint" | "tinyint"
        | "mediumint" | "serial" | "bigserial" | "year" => ValueKind::Integer,
        "real" | "float" | "float4" | "float8" | "double" | "double precision" => ValueKind::Float,
        "numeric" | "decimal" | "money" => ValueKind::Decimal,
        "date" | "datetime" | "datetime2" | "timestamp" | "timestamptz"
        | "timestamp without time zone" | "timestamp with time zone" => ValueKind::Timestamp,
        "blob" | "bytea" | "binary" | "varbinary" | "longblob" | "mediumblob" | "tinyblob" => {
            ValueKind::Bytes
        }
        _ if base.contains("char") || base.contains("text") || base == "clob" => ValueKind::Text,
        _ => ValueKind::Other,
    }
}
