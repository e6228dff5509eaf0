//! Uniform operation result.

use std::time::Duration;

use serde::Serialize;

use crate::error::Result;

/// Columns, stringified rows, rows affected and elapsed time of one
/// operation. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultSet {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
    rows_affected: u64,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    duration: Duration,
}

impl ResultSet {
    pub fn new(
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
        rows_affected: u64,
        duration: Duration,
    ) -> Self {
        Self {
            columns,
            rows,
            rows_affected,
            duration,
        }
    }

    /// Result of a statement that returns no rows: a single `status` column
    /// with one `success` row.
    pub fn status(rows_affected: u64, duration: Duration) -> Self {
        Self::new(
            vec!["status".to_string()],
            vec![vec!["success".to_string()]],
            rows_affected,
            duration,
        )
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}
