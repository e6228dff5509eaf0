//! Multi-row INSERT builder.

use crate::core::identifier::validate_table;
use crate::error::Result;

use super::Placeholder;

/// Builds `INSERT INTO t (c1,c2) VALUES (...), (...)` for a fixed table,
/// column list and dialect.
///
/// Constructed once per transfer and invoked per flush, including with a
/// smaller row count for the trailing partial batch.
#[derive(Debug, Clone)]
pub struct InsertBuilder {
    prefix: String,
    width: usize,
    placeholder: Placeholder,
}

impl InsertBuilder {
    /// Create a builder for `table`.
    ///
    /// # Errors
    ///
    /// Returns `FerryError::InvalidTable` if the table name is empty or
    /// contains whitespace or NUL. Column names are trusted as given.
    pub fn new(table: &str, columns: &[String], placeholder: Placeholder) -> Result<Self> {
        validate_table(table)?;
        Ok(Self {
            prefix: format!("INSERT INTO {} ({}) VALUES ", table, columns.join(",")),
            width: columns.len(),
            placeholder,
        })
    }

    /// Statement text for `rows` rows.
    ///
    /// Indexed dialects number parameter `c` of row `g` as
    /// `g * width + c + 1`.
    pub fn build(&self, rows: usize) -> String {
        let mut sql = String::with_capacity(self.prefix.len() + rows * (self.width * 4 + 4));
        sql.push_str(&self.prefix);

        for g in 0..rows {
            if g > 0 {
                sql.push_str(", ");
            }
            sql.push('(');
            for c in 0..self.width {
                if c > 0 {
                    sql.push(',');
                }
                sql.push_str(&self.placeholder.param(g * self.width + c + 1));
            }
            sql.push(')');
        }

        sql
    }
}
