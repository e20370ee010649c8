//! Dialect-aware SQL text writer.
//!
//! `SqlWriter` keeps SQL text and bound values together so that placeholders
//! are numbered in exactly the order their values are pushed. Callers emit
//! clauses in textual order and the parameter list follows automatically.

use crate::dialect::SqlDialect;
use crate::ident::Column;
use crate::value::Value;

/// Accumulates SQL text and positional parameters.
#[derive(Debug)]
pub struct SqlWriter {
    dialect: &'static dyn SqlDialect,
    sql: String,
    params: Vec<Value>,
}

impl SqlWriter {
    /// Start an empty statement for `dialect`.
    pub fn new(dialect: &'static dyn SqlDialect) -> Self {
        Self {
            dialect,
            sql: String::with_capacity(128),
            params: Vec::new(),
        }
    }

    /// The dialect this writer renders for.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        self.dialect
    }

    /// Append raw SQL text.
    pub fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    /// Append a quoted identifier.
    pub fn push_ident(&mut self, identifier: &str) -> &mut Self {
        let quoted = self.dialect.quote(identifier);
        self.sql.push_str(&quoted);
        self
    }

    /// Append a column (quoted identifier or raw expression).
    pub fn push_column(&mut self, column: &Column) -> &mut Self {
        match column {
            Column::Identifier(name) => self.push_ident(name),
            Column::Raw(expr) => self.push(expr),
        }
    }

    /// Append a placeholder and bind its value.
    pub fn push_bind(&mut self, value: Value) -> &mut Self {
        self.params.push(value);
        let placeholder = self.dialect.placeholder(self.params.len());
        self.sql.push_str(&placeholder);
        self
    }

    /// Append `a, b, c` placeholders for a list of values.
    pub fn push_bind_list<I>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator<Item = Value>,
    {
        for (i, value) in values.into_iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.push_bind(value);
        }
        self
    }

    /// Number of parameters bound so far.
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// SQL text written so far.
    pub fn as_str(&self) -> &str {
        &self.sql
    }

    /// Finish, returning SQL text and parameters.
    pub fn finish(self) -> (String, Vec<Value>) {
        (self.sql, self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MYSQL, POSTGRES};
    use crate::ident::raw;

    #[test]
    fn numbers_placeholders_in_push_order() {
        let mut w = SqlWriter::new(&POSTGRES);
        w.push("SELECT * FROM t WHERE a = ")
            .push_bind(Value::Int(1))
            .push(" AND b IN (")
            .push_bind_list(vec![Value::Int(2), Value::Int(3)])
            .push(")");
        let (sql, params) = w.finish();
        assert_eq!(sql, "SELECT * FROM t WHERE a = $1 AND b IN ($2, $3)");
        assert_eq!(params, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    }

    #[test]
    fn question_mark_dialect() {
        let mut w = SqlWriter::new(&MYSQL);
        w.push_ident("t.a").push(" = ").push_bind(Value::from("x"));
        assert_eq!(w.as_str(), "`t`.`a` = ?");
        assert_eq!(w.param_count(), 1);
    }

    #[test]
    fn raw_columns_are_not_quoted() {
        let mut w = SqlWriter::new(&POSTGRES);
        w.push_column(&raw("SUM(x)")).push(", ").push_column(&"y".into());
        assert_eq!(w.as_str(), r#"SUM(x), "y""#);
    }
}
