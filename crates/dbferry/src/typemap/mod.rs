//! Per-transfer type mapping.
//!
//! A [`TypeMap`] carries two independent sets of overrides:
//!
//! - `column`: how the source stream decodes a column, used instead of the
//!   driver's native inference (see [`resolve`]).
//! - `destination`: coercion applied to decoded rows before they are written,
//!   with optional template rendering and text encoding (see
//!   [`RowMapper`](crate::mapper::RowMapper)).
//!
//! ```yaml
//! type_map:
//!   enabled: true
//!   column:
//!     amount: { type: number, nullable: true }
//!   destination:
//!     created_at: { type: date, template: "{{.}}T00:00:00Z" }
//!     legacy_name: { type: string, encoding: "ISO 8859-1" }
//! ```

mod resolve;

pub use resolve::{resolve, DecodeError, DecodePlan, DecodeTarget};

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Semantic type a value is decoded or coerced into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    String,
    /// Arbitrary-precision decimal.
    Number,
    Date,
    Bool,
}

impl SemanticType {
    pub fn as_str(self) -> &'static str {
        match self {
            SemanticType::String => "string",
            SemanticType::Number => "number",
            SemanticType::Date => "date",
            SemanticType::Bool => "bool",
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared decode type for one source column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnOverride {
    #[serde(rename = "type")]
    pub kind: SemanticType,

    #[serde(default)]
    pub nullable: bool,
}

/// Coercion rule for one destination field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationRule {
    #[serde(rename = "type")]
    pub kind: SemanticType,

    #[serde(default)]
    pub nullable: bool,

    /// Template rendered with the current value as input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    /// Encoding of binary source data (e.g., "ISO 8859-1").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

/// Type overrides for one transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeMap {
    #[serde(default)]
    pub enabled: bool,

    /// Source column name -> decode override.
    #[serde(default)]
    pub column: HashMap<String, ColumnOverride>,

    /// Destination field name -> coercion rule.
    #[serde(default)]
    pub destination: HashMap<String, DestinationRule>,
}

impl TypeMap {
    /// Column override for `name`, if the map is enabled and declares one.
    pub fn column_override(&self, name: &str) -> Option<&ColumnOverride> {
        if self.enabled {
            self.column.get(name)
        } else {
            None
        }
    }
}
