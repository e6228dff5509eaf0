//! SQLite driver.
//!
//! Uses sqlx for pooling. SQLite reports only declared column types and
//! per-value storage classes, so values are decoded from their storage class
//! and refined by the declared type (booleans, timestamps, decimals).

use std::str::FromStr;

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::query::Query;
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Column as _, Executor as _, Row as _, Sqlite, Statement as _, TypeInfo as _, ValueRef as _};
use tracing::debug;

use crate::config::ConnectionConfig;
use crate::core::schema::{classify_type_name, ColumnDescriptor};
use crate::core::stream::{RowSink, RowStream};
use crate::core::traits::{Connection, Transaction};
use crate::core::value::{Value, ValueKind};
use crate::dialect::Placeholder;
use crate::drivers::common::decode_text;
use crate::error::{DriverError, FerryError, Result};
use crate::typemap::{resolve, TypeMap};

/// Pooled SQLite connection.
///
/// Each pooled connection to `sqlite::memory:` is a separate database; use a
/// file datasource when more than one connection is configured.
pub struct SqliteConnection {
    pool: SqlitePool,
}

impl SqliteConnection {
    /// Build the pool for a registered connection. The database file is
    /// created if missing.
    pub fn connect(name: &str, config: &ConnectionConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.datasource)
            .map_err(|e| FerryError::Config(format!("connections.{}.datasource: {}", name, e)))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.pool_size() as u32)
            .connect_lazy_with(options);

        debug!("SQLite pool '{}' configured", name);
        Ok(Self { pool })
    }
}

#[async_trait]
impl Connection for SqliteConnection {
    fn db_type(&self) -> &str {
        "sqlite"
    }

    fn placeholder(&self) -> Placeholder {
        Placeholder::Question
    }

    fn truncate_statement(&self, table: &str) -> String {
        format!("DELETE FROM {}", table)
    }

    async fn execute(&self, sql: &str) -> std::result::Result<u64, DriverError> {
        let result = self.pool.execute(sql).await?;
        Ok(result.rows_affected())
    }

    async fn open_stream(
        &self,
        sql: &str,
        type_map: &TypeMap,
    ) -> std::result::Result<RowStream, DriverError> {
        let pool = self.pool.clone();
        let sql = sql.to_string();
        let type_map = type_map.clone();

        RowStream::spawn(move |mut sink| async move {
            if let Err(e) = stream_rows(&pool, &sql, &type_map, &mut sink).await {
                sink.fail(e).await;
            }
        })
        .await
    }

    async fn begin(&self) -> std::result::Result<Box<dyn Transaction>, DriverError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteTransaction { tx }))
    }

    async fn ping(&self) -> std::result::Result<(), DriverError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

async fn stream_rows(
    pool: &SqlitePool,
    sql: &str,
    type_map: &TypeMap,
    sink: &mut RowSink,
) -> std::result::Result<(), DriverError> {
    let mut conn = pool.acquire().await?;

    // Declared types only; nullability is never reported.
    let columns: Vec<ColumnDescriptor> = {
        let stmt = (&mut *conn).prepare(sql).await?;
        stmt.columns()
            .iter()
            .map(|c| {
                let declared = c.type_info().name();
                ColumnDescriptor::new(c.name(), declared, classify_type_name(declared), true)
            })
            .collect()
    };
    let kinds: Vec<ValueKind> = columns.iter().map(|c| c.kind).collect();
    let plan = resolve(&columns, type_map);
    sink.columns(columns);

    let mut rows = sqlx::query(sql).fetch(&mut *conn);
    while let Some(row) = rows.try_next().await? {
        let mut values = kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| decode_column(&row, i, *kind))
            .collect::<std::result::Result<Vec<Value>, sqlx::Error>>()?;
        plan.apply(&mut values)?;
        if !sink.send(values).await {
            break;
        }
    }

    Ok(())
}

/// Decode one column from its storage class, refined by the declared kind.
fn decode_column(
    row: &SqliteRow,
    idx: usize,
    declared: ValueKind,
) -> std::result::Result<Value, sqlx::Error> {
    let storage = {
        let raw = row.try_get_raw(idx)?;
        if raw.is_null() {
            return Ok(Value::Null(declared));
        }
        raw.type_info().name().to_string()
    };

    let value = match storage.as_str() {
        "INTEGER" => {
            let i: i64 = row.try_get_unchecked(idx)?;
            if declared == ValueKind::Bool {
                Value::Bool(i != 0)
            } else {
                Value::Int(i)
            }
        }
        "REAL" => Value::Float(row.try_get_unchecked(idx)?),
        "TEXT" => {
            let bytes: Vec<u8> = row.try_get_unchecked(idx)?;
            let kind = match declared {
                ValueKind::Bytes | ValueKind::Other => ValueKind::Text,
                other => other,
            };
            decode_text(kind, bytes)
        }
        _ => Value::Bytes(row.try_get_unchecked(idx)?),
    };

    Ok(value)
}

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

fn bind_value<'q>(query: SqliteQuery<'q>, value: &Value) -> SqliteQuery<'q> {
    match value {
        Value::Null(_) => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::Decimal(d) => query.bind(d.to_string()),
        Value::Text(s) => query.bind(s.clone()),
        Value::Bytes(b) => query.bind(b.clone()),
        Value::Timestamp(ts) => query.bind(ts.format("%Y-%m-%d %H:%M:%S%.f%:z").to_string()),
    }
}

/// Transaction on a dedicated pooled connection; sqlx rolls back on drop.
struct SqliteTransaction {
    tx: sqlx::Transaction<'static, Sqlite>,
}

#[async_trait]
impl Transaction for SqliteTransaction {
    async fn execute(
        &mut self,
        sql: &str,
        params: &[Value],
    ) -> std::result::Result<u64, DriverError> {
        let query = params
            .iter()
            .fold(sqlx::query(sql), |query, value| bind_value(query, value));
        let result = query.execute(&mut *self.tx).await?;
        Ok(result.rows_affected())
    }

    async fn batch_execute(&mut self, sql: &str) -> std::result::Result<(), DriverError> {
        // Savepoint names are unique per write; keep them out of the cache.
        sqlx::query(sql)
            .persistent(false)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn prepare(&mut self, sql: &str) -> std::result::Result<(), DriverError> {
        (&mut *self.tx).prepare(sql).await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> std::result::Result<(), DriverError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> std::result::Result<(), DriverError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory() -> SqliteConnection {
        let config = ConnectionConfig {
            db_type: "sqlite".into(),
            datasource: "sqlite::memory:".into(),
            ssl_mode: None,
            max_connections: Some(1),
        };
        SqliteConnection::connect("mem", &config).unwrap()
    }

    #[tokio::test]
    async fn test_stream_decodes_by_declared_type() {
        let conn = memory().await;
        conn.execute(
            "CREATE TABLE t (id INTEGER NOT NULL, name TEXT, active BOOLEAN, \
             price NUMERIC, seen DATETIME, raw BLOB)",
        )
        .await
        .unwrap();
        conn.execute(
            "INSERT INTO t VALUES (1, 'ann', 1, '10.50', '2024-01-02 03:04:05', x'ff00'), \
             (2, NULL, 0, NULL, NULL, NULL)",
        )
        .await
        .unwrap();

        let mut stream = conn
            .open_stream("SELECT * FROM t ORDER BY id", &TypeMap::default())
            .await
            .unwrap();
        assert_eq!(stream.columns().len(), 6);
        assert_eq!(stream.columns()[2].kind, ValueKind::Bool);

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first[0], Value::Int(1));
        assert_eq!(first[1], Value::from("ann"));
        assert_eq!(first[2], Value::Bool(true));
        assert!(matches!(first[4], Value::Timestamp(_)));
        assert_eq!(first[5], Value::Bytes(vec![0xff, 0x00]));

        let second = stream.next().await.unwrap().unwrap();
        assert!(second[1].is_null());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_invalid_utf8_text_is_sanitized() {
        let conn = memory().await;
        let (_, rows) = conn
            .query("SELECT CAST(x'61ff62' AS TEXT) AS s", 10)
            .await
            .unwrap();
        assert_eq!(rows[0][0], Value::from("a\u{FFFD}b"));
    }

    #[tokio::test]
    async fn test_query_limit() {
        let conn = memory().await;
        let (columns, rows) = conn
            .query("SELECT 1 AS a UNION ALL SELECT 2 UNION ALL SELECT 3", 2)
            .await
            .unwrap();
        assert_eq!(columns[0].name, "a");
        assert_eq!(rows.len(), 2);

        let (_, none) = conn.query("SELECT 1 AS a", 0).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_transaction_binds_and_rolls_back() {
        let conn = memory().await;
        conn.execute("CREATE TABLE t (id INTEGER, label TEXT)").await.unwrap();

        let mut tx = conn.begin().await.unwrap();
        let n = tx
            .execute(
                "INSERT INTO t (id,label) VALUES (?,?), (?,?)",
                &[Value::Int(1), Value::from("a"), Value::Int(2), Value::Null(ValueKind::Text)],
            )
            .await
            .unwrap();
        assert_eq!(n, 2);
        tx.rollback().await.unwrap();

        let (_, rows) = conn.query("SELECT COUNT(*) FROM t", 1).await.unwrap();
        assert_eq!(rows[0][0], Value::Int(0));
    }
}
