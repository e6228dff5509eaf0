//! Core traits implemented by every database driver.
//!
//! - [`Connection`]: a pooled handle to one registered database
//! - [`Transaction`]: one open destination transaction
//!
//! Driver methods return [`DriverError`] so the engine can wrap failures with
//! stage and connection context and match skip-policy text against the raw
//! driver message.

use async_trait::async_trait;

use crate::dialect::Placeholder;
use crate::error::DriverError;
use crate::typemap::TypeMap;

use super::schema::ColumnDescriptor;
use super::stream::RowStream;
use super::value::{Row, Value};

/// A pooled connection to one database.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Driver identifier (e.g., "postgres", "mysql", "sqlite").
    fn db_type(&self) -> &str;

    /// Placeholder dialect for parametrized statements.
    fn placeholder(&self) -> Placeholder;

    /// Statement that empties `table` inside a transaction.
    fn truncate_statement(&self, table: &str) -> String {
        format!("TRUNCATE TABLE {}", table)
    }

    /// Execute a statement outside any transaction, returning rows affected.
    async fn execute(&self, sql: &str) -> Result<u64, DriverError>;

    /// Open a forward-only stream over the statement's result set.
    ///
    /// With an enabled type map, per-column decode targets are resolved once
    /// from the result-set metadata and applied to every row. Otherwise each
    /// value is decoded from its native type.
    async fn open_stream(&self, sql: &str, type_map: &TypeMap) -> Result<RowStream, DriverError>;

    /// Materialize up to `limit` rows of a result set.
    ///
    /// The default drains [`open_stream`](Connection::open_stream) and drops
    /// the stream early once the limit is reached.
    async fn query(
        &self,
        sql: &str,
        limit: usize,
    ) -> Result<(Vec<ColumnDescriptor>, Vec<Row>), DriverError> {
        let mut stream = self.open_stream(sql, &TypeMap::default()).await?;
        let columns = stream.columns().to_vec();
        let mut rows = Vec::new();
        while rows.len() < limit {
            match stream.next().await {
                Some(row) => rows.push(row?),
                None => break,
            }
        }
        stream.close();
        Ok((columns, rows))
    }

    /// Begin a transaction on a dedicated connection.
    async fn begin(&self) -> Result<Box<dyn Transaction>, DriverError>;

    /// Round-trip a trivial statement to verify connectivity.
    async fn ping(&self) -> Result<(), DriverError>;

    /// Close the underlying pool.
    async fn close(&self);
}

/// An open transaction.
///
/// Dropping a transaction without calling [`commit`](Transaction::commit) or
/// [`rollback`](Transaction::rollback) rolls it back.
#[async_trait]
pub trait Transaction: Send {
    /// Execute a parametrized statement, returning rows affected.
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, DriverError>;

    /// Execute a parameterless control statement (savepoints, truncate).
    async fn batch_execute(&mut self, sql: &str) -> Result<(), DriverError>;

    /// Prepare `sql` once so later [`execute`](Transaction::execute) calls
    /// with the same text reuse it.
    async fn prepare(&mut self, sql: &str) -> Result<(), DriverError>;

    async fn commit(self: Box<Self>) -> Result<(), DriverError>;

    async fn rollback(self: Box<Self>) -> Result<(), DriverError>;
}
