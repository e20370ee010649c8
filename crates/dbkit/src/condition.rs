//! Operator whitelist and WHERE/HAVING clause descriptors.
//!
//! Operators cannot be bound as parameters, so every operator embedded in SQL
//! text first goes through [`validate_operator`]. A [`Clause`] is the
//! unrendered form of one condition; values are only turned into
//! placeholders when the whole statement is assembled.

use crate::error::{DbError, DbResult};
use crate::ident::Column;
use crate::sql::SqlWriter;
use crate::value::Value;

/// Operators accepted in WHERE, JOIN and HAVING clauses.
pub const ALLOWED_OPERATORS: [&str; 11] = [
    "=", "!=", "<>", "<", ">", "<=", ">=", "LIKE", "NOT LIKE", "IS", "IS NOT",
];

/// Normalize an operator (trim, uppercase, collapse whitespace) and check it
/// against [`ALLOWED_OPERATORS`].
///
/// # Example
/// ```ignore
/// assert_eq!(validate_operator(" not   like ")?, "NOT LIKE");
/// assert!(validate_operator("; DROP TABLE users").is_err());
/// ```
pub fn validate_operator(operator: &str) -> DbResult<&'static str> {
    let normalized = operator
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase();

    ALLOWED_OPERATORS
        .iter()
        .copied()
        .find(|allowed| *allowed == normalized)
        .ok_or_else(|| {
            DbError::query(format!("Invalid operator '{operator}'"))
                .with_debug(format!("allowed operators: {}", ALLOWED_OPERATORS.join(", ")))
        })
}

/// One WHERE or HAVING condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// `column <op> value`
    Basic {
        column: Column,
        operator: &'static str,
        value: Value,
    },
    /// `column [NOT] IN (values...)`; never empty.
    In {
        column: Column,
        values: Vec<Value>,
        negated: bool,
    },
    /// `column [NOT] BETWEEN low AND high`
    Between {
        column: Column,
        low: Value,
        high: Value,
        negated: bool,
    },
    /// `column IS [NOT] NULL`
    Null { column: Column, negated: bool },
}

impl Clause {
    /// Create a comparison clause; the operator is validated.
    ///
    /// `IS` / `IS NOT` only take `NULL` or a boolean, rendered as a keyword.
    pub fn basic(column: impl Into<Column>, operator: &str, value: impl Into<Value>) -> DbResult<Self> {
        let column = column.into();
        let operator = validate_operator(operator)?;
        let value = value.into();
        if is_keyword_operator(operator) && !matches!(value, Value::Null | Value::Bool(_)) {
            return Err(DbError::query(format!(
                "{operator} requires NULL or a boolean, got {}",
                value.type_name()
            ))
            .with_debug(format!("column: {column:?}, value: {value:?}")));
        }
        Ok(Clause::Basic {
            column,
            operator,
            value,
        })
    }

    /// Create an `IN` / `NOT IN` clause; an empty list is rejected.
    pub fn in_list<V>(column: impl Into<Column>, values: Vec<V>, negated: bool) -> DbResult<Self>
    where
        V: Into<Value>,
    {
        let column = column.into();
        if values.is_empty() {
            let op = if negated { "NOT IN" } else { "IN" };
            return Err(DbError::query(format!("{op} requires at least one value"))
                .with_debug(format!("column: {column:?}")));
        }
        Ok(Clause::In {
            column,
            values: values.into_iter().map(Into::into).collect(),
            negated,
        })
    }

    /// Create a `BETWEEN` / `NOT BETWEEN` clause.
    pub fn between(
        column: impl Into<Column>,
        low: impl Into<Value>,
        high: impl Into<Value>,
        negated: bool,
    ) -> Self {
        Clause::Between {
            column: column.into(),
            low: low.into(),
            high: high.into(),
            negated,
        }
    }

    /// Create an `IS NULL` / `IS NOT NULL` clause.
    pub fn null(column: impl Into<Column>, negated: bool) -> Self {
        Clause::Null {
            column: column.into(),
            negated,
        }
    }

    /// Number of parameters this clause binds.
    pub fn param_count(&self) -> usize {
        match self {
            Clause::Basic { operator, .. } => usize::from(!is_keyword_operator(operator)),
            Clause::In { values, .. } => values.len(),
            Clause::Between { .. } => 2,
            Clause::Null { .. } => 0,
        }
    }

    /// Render into `w`, binding values in textual order.
    pub fn write_to(&self, w: &mut SqlWriter) {
        match self {
            Clause::Basic {
                column,
                operator,
                value,
            } => {
                w.push_column(column).push(" ").push(operator);
                // `IS $1` is not valid everywhere; the operand is a keyword.
                match (is_keyword_operator(operator), value) {
                    (true, Value::Bool(true)) => w.push(" TRUE"),
                    (true, Value::Bool(false)) => w.push(" FALSE"),
                    (true, _) => w.push(" NULL"),
                    (false, _) => w.push(" ").push_bind(value.clone()),
                };
            }
            Clause::In {
                column,
                values,
                negated,
            } => {
                w.push_column(column)
                    .push(if *negated { " NOT IN (" } else { " IN (" })
                    .push_bind_list(values.iter().cloned())
                    .push(")");
            }
            Clause::Between {
                column,
                low,
                high,
                negated,
            } => {
                w.push_column(column)
                    .push(if *negated { " NOT BETWEEN " } else { " BETWEEN " })
                    .push_bind(low.clone())
                    .push(" AND ")
                    .push_bind(high.clone());
            }
            Clause::Null { column, negated } => {
                w.push_column(column)
                    .push(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
        }
    }
}

fn is_keyword_operator(operator: &str) -> bool {
    matches!(operator, "IS" | "IS NOT")
}

/// Render `clauses` joined with `AND`.
pub(crate) fn write_conjunction(w: &mut SqlWriter, clauses: &[Clause]) {
    for (i, clause) in clauses.iter().enumerate() {
        if i > 0 {
            w.push(" AND ");
        }
        clause.write_to(w);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MYSQL, POSTGRES};
    use crate::ident::raw;

    fn render(clause: &Clause) -> (String, Vec<Value>) {
        let mut w = SqlWriter::new(&POSTGRES);
        clause.write_to(&mut w);
        w.finish()
    }

    #[test]
    fn operators_are_normalized() {
        assert_eq!(validate_operator("=").unwrap(), "=");
        assert_eq!(validate_operator(" like ").unwrap(), "LIKE");
        assert_eq!(validate_operator("not   Like").unwrap(), "NOT LIKE");
        assert_eq!(validate_operator("is not").unwrap(), "IS NOT");
        assert_eq!(validate_operator("<>").unwrap(), "<>");
    }

    #[test]
    fn unknown_operators_are_rejected() {
        for bad in ["==", "ILIKE", "; DROP TABLE users", "", "= 1 OR 1", "IN"] {
            let err = validate_operator(bad).unwrap_err();
            assert!(err.is_query());
            assert!(err.message().contains(bad), "{bad}");
        }
    }

    #[test]
    fn basic_clause() {
        let clause = Clause::basic("age", ">=", 18).unwrap();
        assert_eq!(render(&clause), (r#""age" >= $1"#.to_string(), vec![Value::Int(18)]));
        assert_eq!(clause.param_count(), 1);
    }

    #[test]
    fn is_null_value_is_not_bound() {
        let clause = Clause::basic("deleted_at", "is", Value::Null).unwrap();
        assert_eq!(render(&clause), (r#""deleted_at" IS NULL"#.to_string(), vec![]));
        assert_eq!(clause.param_count(), 0);
    }

    #[test]
    fn is_boolean_renders_keyword() {
        let clause = Clause::basic("active", "is not", true).unwrap();
        assert_eq!(render(&clause), (r#""active" IS NOT TRUE"#.to_string(), vec![]));
        assert_eq!(clause.param_count(), 0);

        let clause = Clause::basic("active", "IS", false).unwrap();
        assert_eq!(render(&clause).0, r#""active" IS FALSE"#);
    }

    #[test]
    fn is_rejects_other_values() {
        let err = Clause::basic("age", "is", 18).unwrap_err();
        assert!(err.is_query());
        assert!(err.message().contains("IS"));
        assert!(Clause::basic("name", "is not", "x").is_err());
    }

    #[test]
    fn in_list_rejects_empty() {
        let err = Clause::in_list("id", Vec::<i64>::new(), false).unwrap_err();
        assert!(err.is_query());
        assert!(Clause::in_list("id", Vec::<i64>::new(), true).is_err());
    }

    #[test]
    fn in_and_between_render() {
        let clause = Clause::in_list("id", vec![1, 2, 3], true).unwrap();
        let (sql, params) = render(&clause);
        assert_eq!(sql, r#""id" NOT IN ($1, $2, $3)"#);
        assert_eq!(params.len(), 3);

        let clause = Clause::between("age", 18, 65, false);
        assert_eq!(render(&clause).0, r#""age" BETWEEN $1 AND $2"#);
    }

    #[test]
    fn conjunction_with_raw_column() {
        let mut w = SqlWriter::new(&MYSQL);
        write_conjunction(
            &mut w,
            &[
                Clause::null("deleted_at", false),
                Clause::basic(raw("COUNT(*)"), ">", 5).unwrap(),
            ],
        );
        assert_eq!(w.as_str(), "`deleted_at` IS NULL AND COUNT(*) > ?");
    }
}
