//! MySQL/MariaDB driver.
//!
//! Uses mysql_async for pooling. Result sets are read over the text protocol
//! and decoded per column type; statements inside a transaction go through
//! the connection's prepared-statement cache.
//!
//! # Supported Versions
//!
//! - MySQL 5.7+, 8.0+
//! - MariaDB 10.2+

use async_trait::async_trait;
use chrono::{Datelike, Timelike};
use mysql_async::consts::{ColumnFlags, ColumnType};
use mysql_async::prelude::*;
use mysql_async::{Column, Opts, OptsBuilder, Params, Pool, PoolConstraints, PoolOpts, TxOpts};
use tracing::debug;

use crate::config::ConnectionConfig;
use crate::core::schema::ColumnDescriptor;
use crate::core::stream::{RowSink, RowStream};
use crate::core::traits::{Connection, Transaction};
use crate::core::value::{Value, ValueKind};
use crate::dialect::Placeholder;
use crate::drivers::common::decode_text;
use crate::error::{DriverError, FerryError, Result};
use crate::typemap::{resolve, TypeMap};

/// Character set id MySQL reports for binary columns.
const BINARY_CHARSET: u16 = 63;

/// Pooled MySQL connection.
pub struct MysqlConnection {
    pool: Pool,
}

impl MysqlConnection {
    /// Build the pool for a registered connection from a `mysql://` URL.
    pub fn connect(name: &str, config: &ConnectionConfig) -> Result<Self> {
        let opts = Opts::from_url(&config.datasource).map_err(|e| {
            FerryError::Config(format!("connections.{}.datasource: {}", name, e))
        })?;

        let constraints = PoolConstraints::new(1, config.pool_size()).ok_or_else(|| {
            FerryError::Config(format!(
                "connections.{}.max_connections must be at least 1",
                name
            ))
        })?;

        let opts = OptsBuilder::from_opts(opts)
            .init(vec!["SET NAMES utf8mb4"])
            .pool_opts(PoolOpts::default().with_constraints(constraints));

        debug!("MySQL pool '{}' configured", name);
        Ok(Self {
            pool: Pool::new(opts),
        })
    }
}

#[async_trait]
impl Connection for MysqlConnection {
    fn db_type(&self) -> &str {
        "mysql"
    }

    fn placeholder(&self) -> Placeholder {
        Placeholder::Question
    }

    async fn execute(&self, sql: &str) -> std::result::Result<u64, DriverError> {
        let mut conn = self.pool.get_conn().await?;
        conn.query_drop(sql).await?;
        Ok(conn.affected_rows())
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
        let tx = self.pool.start_transaction(TxOpts::default()).await?;
        Ok(Box::new(MysqlTransaction { tx }))
    }

    async fn ping(&self) -> std::result::Result<(), DriverError> {
        let mut conn = self.pool.get_conn().await?;
        conn.query_drop("SELECT 1").await?;
        Ok(())
    }

    async fn close(&self) {
        if let Err(e) = self.pool.clone().disconnect().await {
            debug!("MySQL pool disconnect: {}", e);
        }
    }
}

async fn stream_rows(
    pool: &Pool,
    sql: &str,
    type_map: &TypeMap,
    sink: &mut RowSink,
) -> std::result::Result<(), DriverError> {
    let mut conn = pool.get_conn().await?;
    let mut result = conn.query_iter(sql).await?;

    let columns: Vec<ColumnDescriptor> = result
        .columns()
        .map(|cols| cols.iter().map(describe).collect())
        .unwrap_or_default();
    let kinds: Vec<ValueKind> = columns.iter().map(|c| c.kind).collect();
    let plan = resolve(&columns, type_map);
    sink.columns(columns);

    while let Some(mut row) = result.next().await? {
        let mut values: Vec<Value> = kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| {
                let raw = row.take::<mysql_async::Value, _>(i).unwrap_or(mysql_async::Value::NULL);
                from_mysql(*kind, raw)
            })
            .collect();
        plan.apply(&mut values)?;
        if !sink.send(values).await {
            return Ok(());
        }
    }

    Ok(())
}

fn describe(col: &Column) -> ColumnDescriptor {
    let binary = col.character_set() == BINARY_CHARSET;
    let kind = kind_of(col.column_type(), binary);
    let type_name = format!("{:?}", col.column_type());
    ColumnDescriptor::new(
        col.name_str(),
        type_name.trim_start_matches("MYSQL_TYPE_"),
        kind,
        !col.flags().contains(ColumnFlags::NOT_NULL_FLAG),
    )
}

/// Native scan kind for a MySQL column type.
fn kind_of(column_type: ColumnType, binary: bool) -> ValueKind {
    use ColumnType::*;

    match column_type {
        MYSQL_TYPE_TINY | MYSQL_TYPE_SHORT | MYSQL_TYPE_LONG | MYSQL_TYPE_LONGLONG
        | MYSQL_TYPE_INT24 | MYSQL_TYPE_YEAR => ValueKind::Integer,
        MYSQL_TYPE_FLOAT | MYSQL_TYPE_DOUBLE => ValueKind::Float,
        MYSQL_TYPE_DECIMAL | MYSQL_TYPE_NEWDECIMAL => ValueKind::Decimal,
        MYSQL_TYPE_DATE | MYSQL_TYPE_NEWDATE | MYSQL_TYPE_DATETIME | MYSQL_TYPE_DATETIME2
        | MYSQL_TYPE_TIMESTAMP | MYSQL_TYPE_TIMESTAMP2 => ValueKind::Timestamp,
        MYSQL_TYPE_VARCHAR | MYSQL_TYPE_VAR_STRING | MYSQL_TYPE_STRING | MYSQL_TYPE_TINY_BLOB
        | MYSQL_TYPE_MEDIUM_BLOB | MYSQL_TYPE_LONG_BLOB | MYSQL_TYPE_BLOB => {
            if binary {
                ValueKind::Bytes
            } else {
                ValueKind::Text
            }
        }
        MYSQL_TYPE_ENUM | MYSQL_TYPE_SET | MYSQL_TYPE_JSON | MYSQL_TYPE_TIME => ValueKind::Text,
        _ => ValueKind::Other,
    }
}

fn from_mysql(kind: ValueKind, raw: mysql_async::Value) -> Value {
    match raw {
        mysql_async::Value::NULL => Value::Null(kind),
        mysql_async::Value::Bytes(b) => decode_text(kind, b),
        mysql_async::Value::Int(i) => Value::Int(i),
        mysql_async::Value::UInt(u) => match i64::try_from(u) {
            Ok(i) => Value::Int(i),
            Err(_) => Value::Decimal(u.into()),
        },
        mysql_async::Value::Float(f) => Value::Float(f.into()),
        mysql_async::Value::Double(f) => Value::Float(f),
        other => Value::Text(other.as_sql(true).trim_matches('\'').to_string()),
    }
}

/// Convert a value to a MySQL statement parameter.
fn to_mysql(value: &Value) -> mysql_async::Value {
    match value {
        Value::Null(_) => mysql_async::Value::NULL,
        Value::Bool(b) => mysql_async::Value::Int(i64::from(*b)),
        Value::Int(i) => mysql_async::Value::Int(*i),
        Value::Float(f) => mysql_async::Value::Double(*f),
        Value::Decimal(d) => mysql_async::Value::Bytes(d.to_string().into_bytes()),
        Value::Text(s) => mysql_async::Value::Bytes(s.as_bytes().to_vec()),
        Value::Bytes(b) => mysql_async::Value::Bytes(b.clone()),
        Value::Timestamp(ts) => {
            let dt = ts.naive_utc();
            mysql_async::Value::Date(
                dt.year().clamp(0, 9999) as u16,
                dt.month() as u8,
                dt.day() as u8,
                dt.hour() as u8,
                dt.minute() as u8,
                dt.second() as u8,
                dt.nanosecond() / 1_000,
            )
        }
    }
}

/// Transaction on a dedicated pooled connection.
///
/// mysql_async rolls back a dropped, unfinished transaction when its
/// connection returns to the pool.
struct MysqlTransaction {
    tx: mysql_async::Transaction<'static>,
}

#[async_trait]
impl Transaction for MysqlTransaction {
    async fn execute(
        &mut self,
        sql: &str,
        params: &[Value],
    ) -> std::result::Result<u64, DriverError> {
        let params = if params.is_empty() {
            Params::Empty
        } else {
            Params::Positional(params.iter().map(to_mysql).collect())
        };
        self.tx.exec_drop(sql, params).await?;
        Ok(self.tx.affected_rows())
    }

    async fn batch_execute(&mut self, sql: &str) -> std::result::Result<(), DriverError> {
        self.tx.query_drop(sql).await?;
        Ok(())
    }

    async fn prepare(&mut self, sql: &str) -> std::result::Result<(), DriverError> {
        self.tx.prep(sql).await?;
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
