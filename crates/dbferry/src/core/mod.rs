//! Core abstractions shared by the engine and the drivers.
//!
//! - [`value`]: dynamically typed values, rows and the batch accumulator
//! - [`schema`]: result-set column metadata
//! - [`stream`]: forward-only row stream fed by a driver task
//! - [`traits`]: [`Connection`] and [`Transaction`], implemented per driver
//! - [`identifier`]: destination table validation

pub mod identifier;
pub mod schema;
pub mod stream;
pub mod traits;
pub mod value;

pub use identifier::validate_table;
pub use schema::{classify_type_name, ColumnDescriptor};
pub use stream::{RowSink, RowStream};
pub use traits::{Connection, Transaction};
pub use value::{parse_timestamp, Batch, Row, Value, ValueKind};
