//! SQL dialect capabilities.
//!
//! A [`SqlDialect`] is injected into the query builder and the drivers so a
//! single builder implementation can target PostgreSQL, MySQL and SQLite.

use crate::ident::quote_identifier;
use std::fmt;

/// Per-dialect SQL rendering rules.
pub trait SqlDialect: fmt::Debug + Send + Sync {
    /// Dialect name, for logs and errors.
    fn name(&self) -> &'static str;

    /// Identifier quote character.
    fn quote_char(&self) -> char;

    /// Quote an identifier (see [`quote_identifier`]).
    fn quote(&self, identifier: &str) -> String {
        quote_identifier(identifier, self.quote_char())
    }

    /// Placeholder for the 1-based parameter `index`.
    fn placeholder(&self, index: usize) -> String;

    /// LIMIT value to emit when only OFFSET was requested, for dialects
    /// that do not accept a bare OFFSET.
    fn unbounded_limit(&self) -> Option<&'static str> {
        None
    }

    /// Whether INSERT ... RETURNING is used to read generated ids.
    fn returns_inserted_id(&self) -> bool {
        false
    }
}

/// PostgreSQL: `"ident"`, `$1, $2, ...`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostgresDialect;

impl SqlDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_char(&self) -> char {
        '"'
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${index}")
    }

    fn returns_inserted_id(&self) -> bool {
        true
    }
}

/// MySQL: `` `ident` ``, `?`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MySqlDialect;

impl SqlDialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_char(&self) -> char {
        '`'
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn unbounded_limit(&self) -> Option<&'static str> {
        Some("18446744073709551615")
    }
}

/// SQLite: `"ident"`, `?`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SqliteDialect;

impl SqlDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_char(&self) -> char {
        '"'
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn unbounded_limit(&self) -> Option<&'static str> {
        Some("-1")
    }
}

/// Shared PostgreSQL dialect instance.
pub static POSTGRES: PostgresDialect = PostgresDialect;
/// Shared MySQL dialect instance.
pub static MYSQL: MySqlDialect = MySqlDialect;
/// Shared SQLite dialect instance.
pub static SQLITE: SqliteDialect = SqliteDialect;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders() {
        assert_eq!(POSTGRES.placeholder(3), "$3");
        assert_eq!(MYSQL.placeholder(3), "?");
        assert_eq!(SQLITE.placeholder(1), "?");
    }

    #[test]
    fn quoting_per_dialect() {
        assert_eq!(POSTGRES.quote("users"), r#""users""#);
        assert_eq!(MYSQL.quote("users"), "`users`");
        assert_eq!(SQLITE.quote("main.users"), r#""main"."users""#);
    }
}
