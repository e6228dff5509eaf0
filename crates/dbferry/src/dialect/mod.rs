//! Placeholder dialects and batched INSERT statement construction.
//!
//! Engines disagree on parameter syntax: PostgreSQL numbers `$1, $2, ...`,
//! Oracle numbers `:1, :2, ...`, and most others repeat a bare `?`. The
//! dialect is fixed per connection when it is registered.

mod insert;

pub use insert::InsertBuilder;

use serde::Serialize;

/// Parameter placeholder syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Placeholder {
    /// `$1, $2, ...` (PostgreSQL).
    Dollar,
    /// `:1, :2, ...` (Oracle).
    Colon,
    /// `?` repeated (MySQL, SQLite and the default).
    Question,
}

impl Placeholder {
    /// Dialect for a driver type name.
    ///
    /// `pgx`/`postgres` select `$`, `godror`/`oracle` select `:`, anything
    /// else falls back to `?`.
    pub fn from_db_type(db_type: &str) -> Self {
        match db_type.to_ascii_lowercase().as_str() {
            "pgx" | "postgres" | "postgresql" => Placeholder::Dollar,
            "godror" | "oracle" => Placeholder::Colon,
            _ => Placeholder::Question,
        }
    }

    /// The prefix character for this dialect.
    pub fn symbol(self) -> char {
        match self {
            Placeholder::Dollar => '$',
            Placeholder::Colon => ':',
            Placeholder::Question => '?',
        }
    }

    /// Whether placeholders carry a 1-based index.
    pub fn is_indexed(self) -> bool {
        !matches!(self, Placeholder::Question)
    }

    /// Placeholder text for the 1-based parameter `index`.
    pub fn param(self, index: usize) -> String {
        if self.is_indexed() {
            format!("{}{}", self.symbol(), index)
        } else {
            "?".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_db_type() {
        assert_eq!(Placeholder::from_db_type("pgx"), Placeholder::Dollar);
        assert_eq!(Placeholder::from_db_type("postgres"), Placeholder::Dollar);
        assert_eq!(Placeholder::from_db_type("godror"), Placeholder::Colon);
        assert_eq!(Placeholder::from_db_type("oracle"), Placeholder::Colon);
        assert_eq!(Placeholder::from_db_type("mysql"), Placeholder::Question);
        assert_eq!(Placeholder::from_db_type("sqlite"), Placeholder::Question);
        assert_eq!(Placeholder::from_db_type("anything"), Placeholder::Question);
    }

    #[test]
    fn test_param_placeholder() {
        assert_eq!(Placeholder::Dollar.param(1), "$1");
        assert_eq!(Placeholder::Colon.param(10), ":10");
        assert_eq!(Placeholder::Question.param(7), "?");
    }
}
