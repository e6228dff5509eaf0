//! Query executor: one-shot statements, materialized queries and row streams
//! against named connections.
//!
//! Every call resolves its connection from the [`Registry`], observes the
//! caller's [`CancellationToken`] while waiting on the driver, and reports
//! driver failures with the connection name attached.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::core::schema::ColumnDescriptor;
use crate::core::stream::RowStream;
use crate::core::value::Row;
use crate::error::{FerryError, Result};
use crate::mapper::{DotRenderer, Render, RowMapper};
use crate::registry::Registry;
use crate::result::ResultSet;
use crate::typemap::TypeMap;

/// Run `fut` unless `cancel` fires first.
pub(crate) async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = T>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(FerryError::Cancelled),
        out = fut => Ok(out),
    }
}

/// Executes statements against registered connections.
#[derive(Clone)]
pub struct Executor {
    registry: Arc<Registry>,
    renderer: Arc<dyn Render>,
}

impl Executor {
    /// Executor rendering destination templates with [`DotRenderer`].
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            renderer: Arc::new(DotRenderer),
        }
    }

    /// Replace the template renderer.
    pub fn with_renderer(mut self, renderer: Arc<dyn Render>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Execute a statement that returns no rows.
    ///
    /// The result has a single `status` column with one `success` row.
    pub async fn exec(
        &self,
        cancel: &CancellationToken,
        conn: &str,
        statement: &str,
    ) -> Result<ResultSet> {
        require_statement(statement)?;
        let start = Instant::now();
        let db = self.registry.resolve(conn)?;

        debug!("{}: executing statement", conn);
        let affected = cancellable(cancel, db.execute(statement))
            .await?
            .map_err(|e| FerryError::write(conn, e))?;

        let duration = start.elapsed();
        info!("{}: statement affected {} rows in {:?}", conn, affected, duration);
        Ok(ResultSet::status(affected, duration))
    }

    /// Run a query and materialize up to `limit` rows as strings.
    ///
    /// NULL renders as the empty string. A limit of 0 returns the columns
    /// with no rows.
    pub async fn query(
        &self,
        cancel: &CancellationToken,
        conn: &str,
        statement: &str,
        limit: usize,
    ) -> Result<ResultSet> {
        require_statement(statement)?;
        let start = Instant::now();
        let db = self.registry.resolve(conn)?;

        debug!("{}: running query (limit {})", conn, limit);
        let (columns, rows) = cancellable(cancel, db.query(statement, limit))
            .await?
            .map_err(|e| FerryError::stream(conn, e))?;

        let columns: Vec<String> = columns.into_iter().map(|c| c.name).collect();
        let rows: Vec<Vec<String>> = rows
            .into_iter()
            .map(|row| row.iter().map(ToString::to_string).collect())
            .collect();

        let duration = start.elapsed();
        info!("{}: query returned {} rows in {:?}", conn, rows.len(), duration);
        Ok(ResultSet::new(columns, rows, 0, duration))
    }

    /// Open a forward-only stream whose rows pass through the type map's
    /// decode plan and destination rules.
    pub async fn open_stream(
        &self,
        cancel: &CancellationToken,
        conn: &str,
        statement: &str,
        type_map: &TypeMap,
    ) -> Result<Rows> {
        require_statement(statement)?;
        let db = self.registry.resolve(conn)?;

        let stream = cancellable(cancel, db.open_stream(statement, type_map))
            .await?
            .map_err(|e| FerryError::stream(conn, e))?;

        let names: Vec<String> = stream.columns().iter().map(|c| c.name.clone()).collect();
        let mapper = RowMapper::new(&names, type_map, self.renderer.clone())?;
        debug!(
            "{}: stream open with {} columns (destination rules: {})",
            conn,
            names.len(),
            !mapper.is_noop()
        );

        Ok(Rows {
            conn: conn.to_string(),
            stream,
            mapper,
        })
    }
}

fn require_statement(statement: &str) -> Result<()> {
    if statement.trim().is_empty() {
        return Err(FerryError::BadRequest("statement is required".into()));
    }
    Ok(())
}

/// Mapped rows of an open stream.
///
/// Single pass; dropping it releases the cursor.
pub struct Rows {
    conn: String,
    stream: RowStream,
    mapper: RowMapper,
}

impl Rows {
    pub fn columns(&self) -> &[ColumnDescriptor] {
        self.stream.columns()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.stream.columns().iter().map(|c| c.name.clone()).collect()
    }

    /// Next mapped row, or `None` at end of data.
    pub async fn next(&mut self, cancel: &CancellationToken) -> Result<Option<Row>> {
        match cancellable(cancel, self.stream.next()).await? {
            None => Ok(None),
            Some(Err(e)) => Err(FerryError::stream(&self.conn, e)),
            Some(Ok(mut row)) => {
                self.mapper.map_row(&mut row)?;
                Ok(Some(row))
            }
        }
    }

    /// Release the cursor before the end of data.
    pub fn close(self) {
        self.stream.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::{Value, ValueKind};
    use crate::testing::{Event, MockConnection};
    use crate::typemap::{DestinationRule, SemanticType};
    use rust_decimal::Decimal;

    fn users() -> MockConnection {
        MockConnection::new().with_rows(
            vec![
                ColumnDescriptor::new("id", "int4", ValueKind::Integer, false),
                ColumnDescriptor::new("name", "text", ValueKind::Text, true),
            ],
            vec![
                vec![Value::Int(1), Value::from("ann")],
                vec![Value::Int(2), Value::Null(ValueKind::Text)],
                vec![Value::Int(3), Value::from("cy")],
            ],
        )
    }

    fn executor(conn: MockConnection) -> Executor {
        let mut registry = Registry::new();
        registry.insert("db", Arc::new(conn));
        Executor::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn test_exec_returns_status() {
        let conn = MockConnection::new();
        let exec = executor(conn.clone());
        let rs = exec
            .exec(&CancellationToken::new(), "db", "DELETE FROM t")
            .await
            .unwrap();
        assert_eq!(rs.columns(), &["status".to_string()]);
        assert_eq!(rs.rows(), &[vec!["success".to_string()]]);
        assert_eq!(rs.rows_affected(), 1);
        assert_eq!(conn.events(), vec![Event::Exec("DELETE FROM t".into())]);
    }

    #[tokio::test]
    async fn test_exec_unknown_connection() {
        let exec = executor(MockConnection::new());
        let err = exec
            .exec(&CancellationToken::new(), "nope", "SELECT 1")
            .await
            .unwrap_err();
        assert!(matches!(err, FerryError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_query_unknown_connection() {
        let conn = MockConnection::new();
        let exec = executor(conn.clone());
        let err = exec
            .query(&CancellationToken::new(), "nope", "SELECT 1", 10)
            .await
            .unwrap_err();
        assert!(matches!(err, FerryError::NotFound(ref n) if n == "nope"));
        assert!(conn.events().is_empty());
    }

    #[tokio::test]
    async fn test_query_stringifies_and_limits() {
        let exec = executor(users());
        let cancel = CancellationToken::new();

        let rs = exec.query(&cancel, "db", "SELECT * FROM users", 2).await.unwrap();
        assert_eq!(rs.columns(), &["id".to_string(), "name".to_string()]);
        assert_eq!(
            rs.rows(),
            &[
                vec!["1".to_string(), "ann".to_string()],
                vec!["2".to_string(), "".to_string()],
            ]
        );

        let empty = exec.query(&cancel, "db", "SELECT * FROM users", 0).await.unwrap();
        assert_eq!(empty.columns().len(), 2);
        assert!(empty.rows().is_empty());
    }

    #[tokio::test]
    async fn test_query_rejects_blank_statement() {
        let exec = executor(users());
        let err = exec
            .query(&CancellationToken::new(), "db", "  ", 10)
            .await
            .unwrap_err();
        assert!(matches!(err, FerryError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_stream_applies_type_map() {
        let exec = executor(users());
        let cancel = CancellationToken::new();
        let mut type_map = TypeMap {
            enabled: true,
            ..TypeMap::default()
        };
        type_map.destination.insert(
            "name".into(),
            DestinationRule {
                kind: SemanticType::String,
                nullable: true,
                template: Some("<{{.}}>".into()),
                encoding: None,
            },
        );

        let mut rows = exec
            .open_stream(&cancel, "db", "SELECT * FROM users", &type_map)
            .await
            .unwrap();
        assert_eq!(rows.column_names(), vec!["id".to_string(), "name".to_string()]);

        let first = rows.next(&cancel).await.unwrap().unwrap();
        assert_eq!(first[0], Value::Decimal(Decimal::from(1)));
        assert_eq!(first[1], Value::from("<ann>"));

        let second = rows.next(&cancel).await.unwrap().unwrap();
        assert_eq!(second[1], Value::Null(ValueKind::Text));

        assert!(rows.next(&cancel).await.unwrap().is_some());
        assert!(rows.next(&cancel).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stream_error_is_wrapped() {
        let exec = executor(users().fail_stream_after(1, "connection reset"));
        let cancel = CancellationToken::new();
        let mut rows = exec
            .open_stream(&cancel, "db", "SELECT * FROM users", &TypeMap::default())
            .await
            .unwrap();
        assert!(rows.next(&cancel).await.unwrap().is_some());
        let err = rows.next(&cancel).await.unwrap_err();
        assert!(matches!(err, FerryError::StreamFailed { ref conn, .. } if conn == "db"));
        assert!(err.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_cancelled_stream() {
        let exec = executor(users());
        let cancel = CancellationToken::new();
        let mut rows = exec
            .open_stream(&cancel, "db", "SELECT * FROM users", &TypeMap::default())
            .await
            .unwrap();
        cancel.cancel();
        assert!(matches!(rows.next(&cancel).await, Err(FerryError::Cancelled)));
    }
}
