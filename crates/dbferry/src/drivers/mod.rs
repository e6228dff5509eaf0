//! Database driver implementations.
//!
//! Each driver implements [`Connection`] and [`Transaction`] for one engine:
//!
//! - [`postgres`]: PostgreSQL via deadpool-postgres (`postgres`, `pgx`)
//! - [`mysql`]: MySQL/MariaDB via mysql_async (`mysql`)
//! - [`sqlite`]: SQLite via sqlx (`sqlite`)
//! - [`common`]: shared TLS setup and text decoding
//!
//! # Adding New Databases
//!
//! 1. Create a module under `drivers/` implementing both traits
//! 2. Add its `db_type` names to [`connect`] and to
//!    [`SUPPORTED_DB_TYPES`](crate::config::SUPPORTED_DB_TYPES)
//! 3. Map its placeholder style in [`Placeholder::from_db_type`](crate::dialect::Placeholder::from_db_type)

pub mod common;
pub mod mysql;
pub mod postgres;
pub mod sqlite;

use std::sync::Arc;

pub use common::{SslMode, TlsBuilder};
pub use mysql::MysqlConnection;
pub use postgres::PostgresConnection;
pub use sqlite::SqliteConnection;

use crate::config::ConnectionConfig;
use crate::core::traits::Connection;
use crate::error::{FerryError, Result};

/// Build the connection for a registry entry.
///
/// Pools are created lazily; nothing is dialed until first use.
pub fn connect(name: &str, config: &ConnectionConfig) -> Result<Arc<dyn Connection>> {
    match config.db_type.to_lowercase().as_str() {
        "postgres" | "postgresql" | "pgx" => Ok(Arc::new(PostgresConnection::connect(name, config)?)),
        "mysql" => Ok(Arc::new(MysqlConnection::connect(name, config)?)),
        "sqlite" => Ok(Arc::new(SqliteConnection::connect(name, config)?)),
        "oracle" | "godror" => Err(FerryError::Config(format!(
            "connections.{}: no driver is available for db_type '{}'",
            name, config.db_type
        ))),
        other => Err(FerryError::Config(format!(
            "connections.{}: unknown db_type '{}'. Supported types: postgres, pgx, mysql, sqlite",
            name, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Placeholder;

    fn entry(db_type: &str, datasource: &str) -> ConnectionConfig {
        ConnectionConfig {
            db_type: db_type.into(),
            datasource: datasource.into(),
            ssl_mode: None,
            max_connections: None,
        }
    }

    #[tokio::test]
    async fn test_connect_dispatches_on_db_type() {
        let pg = connect("pg", &entry("pgx", "host=localhost user=app dbname=app")).unwrap();
        assert_eq!(pg.db_type(), "postgres");
        assert_eq!(pg.placeholder(), Placeholder::Dollar);

        let my = connect("my", &entry("mysql", "mysql://app@localhost/app")).unwrap();
        assert_eq!(my.placeholder(), Placeholder::Question);

        let lite = connect("lite", &entry("sqlite", "sqlite::memory:")).unwrap();
        assert_eq!(lite.truncate_statement("t"), "DELETE FROM t");
    }

    #[test]
    fn test_connect_rejects_unavailable_drivers() {
        let err = connect("ora", &entry("godror", "user/pass@db")).err().unwrap();
        assert!(err.to_string().contains("no driver"));

        let err = connect("x", &entry("mssql", "server=x")).err().unwrap();
        assert!(err.to_string().contains("unknown db_type"));
    }

    #[test]
    fn test_connect_rejects_bad_datasource() {
        assert!(connect("my", &entry("mysql", "not a url")).is_err());
    }
}
