//! # dbferry
//!
//! Streaming cross-database transfer library.
//!
//! Moves the result of a query on one registered connection into a table on
//! another, with:
//!
//! - **Batched multi-row INSERTs** sized per destination placeholder dialect
//! - **All-or-nothing loads** in a single destination transaction
//! - **Skip policy** discarding batches whose error matches a message, via
//!   per-write savepoints
//! - **Type maps** overriding source decoding and coercing destination fields
//!   (templates, ISO-8859-1 decoding, decimal and timestamp parsing)
//! - **Drivers** for PostgreSQL, MySQL and SQLite
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use dbferry::{Config, Executor, Registry, TransferEngine, TransferRequest};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> dbferry::Result<()> {
//!     let config = Config::load("dbferry.yaml")?;
//!     let registry = Arc::new(Registry::connect(&config)?);
//!     let engine = TransferEngine::new(Executor::new(registry.clone()));
//!
//!     let request = TransferRequest::load("job.yaml")?;
//!     let result = engine.transfer(&CancellationToken::new(), &request).await?;
//!     println!("Transferred {} rows", result.rows_affected());
//!
//!     registry.close().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod dialect;
pub mod drivers;
pub mod error;
pub mod executor;
pub mod mapper;
pub mod registry;
pub mod result;
pub mod transfer;
pub mod typemap;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenient access
pub use config::{Config, ConnectionConfig};
pub use crate::core::{Connection, Row, RowStream, Transaction, Value, ValueKind};
pub use dialect::{InsertBuilder, Placeholder};
pub use error::{DriverError, FerryError, FerryError as Error, Result};
pub use executor::{Executor, Rows};
pub use mapper::{DotRenderer, Render, RowMapper};
pub use registry::Registry;
pub use result::ResultSet;
pub use transfer::{DestinationSpec, SkipPolicy, SourceSpec, TransferEngine, TransferRequest};
pub use typemap::{SemanticType, TypeMap};
