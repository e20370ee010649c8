//! SQL identifier quoting and the raw-expression marker.
//!
//! Identifiers (tables, columns) are always quoted with the dialect's quote
//! character. The only way to emit unquoted SQL in a column position is an
//! explicit [`Column::Raw`]:
//!
//! ```ignore
//! use dbkit::{Column, raw};
//!
//! qb.select(["id", "name as display_name"]);        // quoted identifiers
//! qb.select([raw("COUNT(*) as total")]);            // emitted verbatim
//! ```
//!
//! A string such as `"COUNT(*)"` passed without `raw()` is quoted like any
//! other identifier and therefore never runs as an expression.

use crate::dialect::SqlDialect;

/// A column or projection entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Column {
    /// Identifier, quoted per dialect (supports `a.b` and `expr as alias`).
    Identifier(String),
    /// Raw SQL, emitted verbatim.
    ///
    /// Never build a raw expression from untrusted input.
    Raw(String),
}

impl Column {
    /// Create a quoted identifier column.
    pub fn ident(name: impl Into<String>) -> Self {
        Column::Identifier(name.into())
    }

    /// Create a raw (unquoted) expression.
    pub fn raw(expr: impl Into<String>) -> Self {
        Column::Raw(expr.into())
    }

    /// Whether this column bypasses quoting.
    pub fn is_raw(&self) -> bool {
        matches!(self, Column::Raw(_))
    }

    /// Render the column for a dialect.
    pub fn to_sql(&self, dialect: &dyn SqlDialect) -> String {
        match self {
            Column::Identifier(name) => dialect.quote(name),
            Column::Raw(expr) => expr.clone(),
        }
    }
}

/// Shorthand for [`Column::raw`].
pub fn raw(expr: impl Into<String>) -> Column {
    Column::Raw(expr.into())
}

impl From<&str> for Column {
    fn from(name: &str) -> Self {
        Column::Identifier(name.to_string())
    }
}

impl From<String> for Column {
    fn from(name: String) -> Self {
        Column::Identifier(name)
    }
}

impl From<&String> for Column {
    fn from(name: &String) -> Self {
        Column::Identifier(name.clone())
    }
}

/// Quote an identifier with the given quote character.
///
/// - `expr as alias` (case-insensitive `as`): `expr` is quoted recursively,
///   the alias is appended unquoted.
/// - Dotted names quote each segment: `schema.table` → `"schema"."table"`.
/// - `*` (alone or as a segment) passes through.
/// - Embedded quote characters are doubled.
pub fn quote_identifier(identifier: &str, quote: char) -> String {
    if let Some((expr, alias)) = split_alias(identifier) {
        return format!("{} as {}", quote_identifier(expr, quote), alias);
    }

    let mut out = String::with_capacity(identifier.len() + 2);
    for (i, segment) in identifier.split('.').enumerate() {
        if i > 0 {
            out.push('.');
        }
        write_segment(&mut out, segment, quote);
    }
    out
}

fn write_segment(out: &mut String, segment: &str, quote: char) {
    if segment == "*" {
        out.push('*');
        return;
    }
    out.push(quote);
    for ch in segment.chars() {
        if ch == quote {
            out.push(quote);
        }
        out.push(ch);
    }
    out.push(quote);
}

/// Split `expr as alias` on the last whitespace-delimited `as` keyword.
fn split_alias(identifier: &str) -> Option<(&str, &str)> {
    let bytes = identifier.as_bytes();
    let mut found = None;
    for i in 1..bytes.len().saturating_sub(2) {
        if bytes[i].eq_ignore_ascii_case(&b'a')
            && bytes[i + 1].eq_ignore_ascii_case(&b's')
            && bytes[i - 1].is_ascii_whitespace()
            && bytes[i + 2].is_ascii_whitespace()
        {
            found = Some(i);
        }
    }

    let pos = found?;
    let expr = identifier[..pos].trim_end();
    let alias = identifier[pos + 2..].trim_start();
    if expr.is_empty() || alias.is_empty() {
        return None;
    }
    Some((expr, alias))
}
