//! Builder state, fluent surface and SQL assembly.

use crate::condition::{Clause, validate_operator, write_conjunction};
use crate::dialect::SqlDialect;
use crate::error::{DbError, DbResult};
use crate::ident::Column;
use crate::sql::SqlWriter;
use crate::value::Value;

/// JOIN flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

impl JoinKind {
    fn keyword(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
        }
    }
}

/// ORDER BY direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// Parse `asc` / `desc` (case-insensitive, surrounding whitespace ignored).
    pub fn parse(direction: &str) -> DbResult<Self> {
        match direction.trim().to_ascii_uppercase().as_str() {
            "ASC" => Ok(SortDirection::Asc),
            "DESC" => Ok(SortDirection::Desc),
            _ => Err(DbError::query(format!(
                "Invalid order direction '{direction}'"
            ))
            .with_debug("expected ASC or DESC")),
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Join {
    kind: JoinKind,
    table: String,
    first: Column,
    operator: &'static str,
    second: Column,
}

/// Fluent SELECT/UPDATE/DELETE/INSERT builder for one table.
///
/// Builder methods never fail; the first invalid argument (unknown operator,
/// empty IN list, bad sort direction) is kept and reported by
/// [`to_sql`](Self::to_sql) or any terminal operation.
#[derive(Clone, Debug)]
pub struct QueryBuilder {
    pub(super) dialect: &'static dyn SqlDialect,
    /// Target table
    table: String,
    /// SELECT DISTINCT
    distinct: bool,
    /// Projection; empty means `*`
    pub(super) columns: Vec<Column>,
    /// JOIN clauses
    joins: Vec<Join>,
    /// WHERE conditions (joined with AND)
    wheres: Vec<Clause>,
    /// GROUP BY columns
    groups: Vec<Column>,
    /// HAVING conditions (joined with AND)
    havings: Vec<Clause>,
    /// ORDER BY entries
    pub(super) orders: Vec<(Column, SortDirection)>,
    pub(super) limit: Option<u64>,
    pub(super) offset: Option<u64>,
    /// First recorded argument error
    build_error: Option<DbError>,
}

impl QueryBuilder {
    /// Create a builder for `table`.
    pub fn new(table: &str, dialect: &'static dyn SqlDialect) -> Self {
        Self {
            dialect,
            table: table.to_string(),
            distinct: false,
            columns: Vec::new(),
            joins: Vec::new(),
            wheres: Vec::new(),
            groups: Vec::new(),
            havings: Vec::new(),
            orders: Vec::new(),
            limit: None,
            offset: None,
            build_error: None,
        }
    }

    /// The table this builder targets.
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// The dialect used by [`to_sql`](Self::to_sql).
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        self.dialect
    }

    fn record<T>(&mut self, result: DbResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                if self.build_error.is_none() {
                    self.build_error = Some(err);
                }
                None
            }
        }
    }

    // ==================== Projection ====================

    /// Replace the projection.
    ///
    /// Plain strings are quoted identifiers (`"name as n"` becomes
    /// `"name" as n`); use [`raw`](crate::raw) for expressions.
    pub fn select<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// SELECT DISTINCT.
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    // ==================== WHERE ====================

    /// `column <operator> value`; the operator must be whitelisted.
    pub fn where_cmp(
        mut self,
        column: impl Into<Column>,
        operator: &str,
        value: impl Into<Value>,
    ) -> Self {
        if let Some(clause) = self.record(Clause::basic(column, operator, value)) {
            self.wheres.push(clause);
        }
        self
    }

    /// `column = value`
    pub fn where_eq(self, column: impl Into<Column>, value: impl Into<Value>) -> Self {
        self.where_cmp(column, "=", value)
    }

    /// `column IN (...)`; an empty list is an error.
    pub fn where_in<V: Into<Value>>(mut self, column: impl Into<Column>, values: Vec<V>) -> Self {
        if let Some(clause) = self.record(Clause::in_list(column, values, false)) {
            self.wheres.push(clause);
        }
        self
    }

    /// `column NOT IN (...)`; an empty list is an error.
    pub fn where_not_in<V: Into<Value>>(mut self, column: impl Into<Column>, values: Vec<V>) -> Self {
        if let Some(clause) = self.record(Clause::in_list(column, values, true)) {
            self.wheres.push(clause);
        }
        self
    }

    /// `column BETWEEN low AND high`
    pub fn where_between(
        mut self,
        column: impl Into<Column>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.wheres.push(Clause::between(column, low, high, false));
        self
    }

    /// `column NOT BETWEEN low AND high`
    pub fn where_not_between(
        mut self,
        column: impl Into<Column>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.wheres.push(Clause::between(column, low, high, true));
        self
    }

    /// `column IS NULL`
    pub fn where_null(mut self, column: impl Into<Column>) -> Self {
        self.wheres.push(Clause::null(column, false));
        self
    }

    /// `column IS NOT NULL`
    pub fn where_not_null(mut self, column: impl Into<Column>) -> Self {
        self.wheres.push(Clause::null(column, true));
        self
    }

    /// `column LIKE pattern`
    pub fn where_like(self, column: impl Into<Column>, pattern: impl Into<Value>) -> Self {
        self.where_cmp(column, "LIKE", pattern)
    }

    /// `column NOT LIKE pattern`
    pub fn where_not_like(self, column: impl Into<Column>, pattern: impl Into<Value>) -> Self {
        self.where_cmp(column, "NOT LIKE", pattern)
    }

    /// Number of WHERE conditions added so far.
    pub fn where_count(&self) -> usize {
        self.wheres.len()
    }

    // ==================== JOIN ====================

    fn add_join(
        mut self,
        kind: JoinKind,
        table: &str,
        first: impl Into<Column>,
        operator: &str,
        second: impl Into<Column>,
    ) -> Self {
        if let Some(operator) = self.record(validate_operator(operator)) {
            self.joins.push(Join {
                kind,
                table: table.to_string(),
                first: first.into(),
                operator,
                second: second.into(),
            });
        }
        self
    }

    /// `INNER JOIN table ON first <op> second`
    pub fn join(
        self,
        table: &str,
        first: impl Into<Column>,
        operator: &str,
        second: impl Into<Column>,
    ) -> Self {
        self.add_join(JoinKind::Inner, table, first, operator, second)
    }

    /// `LEFT JOIN table ON first <op> second`
    pub fn left_join(
        self,
        table: &str,
        first: impl Into<Column>,
        operator: &str,
        second: impl Into<Column>,
    ) -> Self {
        self.add_join(JoinKind::Left, table, first, operator, second)
    }

    /// `RIGHT JOIN table ON first <op> second`
    pub fn right_join(
        self,
        table: &str,
        first: impl Into<Column>,
        operator: &str,
        second: impl Into<Column>,
    ) -> Self {
        self.add_join(JoinKind::Right, table, first, operator, second)
    }

    // ==================== GROUP BY / HAVING ====================

    /// Append GROUP BY columns.
    pub fn group_by<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        self.groups.extend(columns.into_iter().map(Into::into));
        self
    }

    /// `HAVING column <operator> value`; use [`raw`](crate::raw) for
    /// aggregate expressions.
    pub fn having(
        mut self,
        column: impl Into<Column>,
        operator: &str,
        value: impl Into<Value>,
    ) -> Self {
        if let Some(clause) = self.record(Clause::basic(column, operator, value)) {
            self.havings.push(clause);
        }
        self
    }

    // ==================== ORDER / LIMIT ====================

    /// Append an ORDER BY entry; `direction` is `asc` or `desc`.
    pub fn order_by(mut self, column: impl Into<Column>, direction: &str) -> Self {
        if let Some(direction) = self.record(SortDirection::parse(direction)) {
            self.orders.push((column.into(), direction));
        }
        self
    }

    /// Set LIMIT.
    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    /// Set OFFSET.
    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    // ==================== Assembly ====================

    fn validate(&self) -> DbResult<()> {
        match &self.build_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn write_where(&self, w: &mut SqlWriter) {
        if !self.wheres.is_empty() {
            w.push(" WHERE ");
            write_conjunction(w, &self.wheres);
        }
    }

    fn write_column_list(w: &mut SqlWriter, columns: &[Column]) {
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                w.push(", ");
            }
            w.push_column(column);
        }
    }

    /// Render the SELECT statement for `dialect`.
    pub(crate) fn build_select(&self, dialect: &'static dyn SqlDialect) -> DbResult<(String, Vec<Value>)> {
        self.validate()?;
        let mut w = SqlWriter::new(dialect);

        w.push(if self.distinct { "SELECT DISTINCT " } else { "SELECT " });
        if self.columns.is_empty() {
            w.push("*");
        } else {
            Self::write_column_list(&mut w, &self.columns);
        }
        w.push(" FROM ").push_ident(&self.table);

        for join in &self.joins {
            w.push(" ")
                .push(join.kind.keyword())
                .push(" ")
                .push_ident(&join.table)
                .push(" ON ")
                .push_column(&join.first)
                .push(" ")
                .push(join.operator)
                .push(" ")
                .push_column(&join.second);
        }

        // WHERE values are bound before HAVING values.
        self.write_where(&mut w);

        if !self.groups.is_empty() {
            w.push(" GROUP BY ");
            Self::write_column_list(&mut w, &self.groups);
        }

        if !self.havings.is_empty() {
            w.push(" HAVING ");
            write_conjunction(&mut w, &self.havings);
        }

        if !self.orders.is_empty() {
            w.push(" ORDER BY ");
            for (i, (column, direction)) in self.orders.iter().enumerate() {
                if i > 0 {
                    w.push(", ");
                }
                w.push_column(column).push(" ").push(direction.keyword());
            }
        }

        match (self.limit, self.offset) {
            (Some(limit), _) => {
                w.push(&format!(" LIMIT {limit}"));
            }
            (None, Some(_)) => {
                if let Some(unbounded) = dialect.unbounded_limit() {
                    w.push(" LIMIT ").push(unbounded);
                }
            }
            (None, None) => {}
        }
        if let Some(offset) = self.offset {
            w.push(&format!(" OFFSET {offset}"));
        }

        Ok(w.finish())
    }

    /// Render the UPDATE statement for `dialect`. SET values are bound
    /// before WHERE values.
    pub(crate) fn build_update(
        &self,
        dialect: &'static dyn SqlDialect,
        data: &[(String, Value)],
    ) -> DbResult<(String, Vec<Value>)> {
        self.validate()?;
        if data.is_empty() {
            return Err(DbError::query("No data provided for UPDATE")
                .with_debug(format!("table: {}", self.table)));
        }
        if self.wheres.is_empty() {
            return Err(DbError::query("Refusing to UPDATE without a WHERE clause")
                .with_debug(format!("table: {}", self.table)));
        }

        let mut w = SqlWriter::new(dialect);
        w.push("UPDATE ").push_ident(&self.table).push(" SET ");
        for (i, (column, value)) in data.iter().enumerate() {
            if i > 0 {
                w.push(", ");
            }
            w.push_ident(column).push(" = ").push_bind(value.clone());
        }
        self.write_where(&mut w);
        Ok(w.finish())
    }

    /// Render the DELETE statement for `dialect`.
    pub(crate) fn build_delete(&self, dialect: &'static dyn SqlDialect) -> DbResult<(String, Vec<Value>)> {
        self.validate()?;
        if self.wheres.is_empty() {
            return Err(DbError::query("Refusing to DELETE without a WHERE clause")
                .with_debug(format!("table: {}", self.table)));
        }

        let mut w = SqlWriter::new(dialect);
        w.push("DELETE FROM ").push_ident(&self.table);
        self.write_where(&mut w);
        Ok(w.finish())
    }

    /// Render the INSERT statement for `dialect`, optionally with
    /// `RETURNING <column>`.
    pub(crate) fn build_insert(
        &self,
        dialect: &'static dyn SqlDialect,
        data: &[(String, Value)],
        returning: Option<&str>,
    ) -> DbResult<(String, Vec<Value>)> {
        self.validate()?;
        if data.is_empty() {
            return Err(DbError::query("No data provided for INSERT")
                .with_debug(format!("table: {}", self.table)));
        }

        let mut w = SqlWriter::new(dialect);
        w.push("INSERT INTO ").push_ident(&self.table).push(" (");
        for (i, (column, _)) in data.iter().enumerate() {
            if i > 0 {
                w.push(", ");
            }
            w.push_ident(column);
        }
        w.push(") VALUES (")
            .push_bind_list(data.iter().map(|(_, value)| value.clone()))
            .push(")");
        if let Some(column) = returning {
            w.push(" RETURNING ").push_ident(column);
        }
        Ok(w.finish())
    }

    /// SELECT SQL and parameters.
    pub fn to_sql(&self) -> DbResult<(String, Vec<Value>)> {
        self.build_select(self.dialect)
    }

    /// UPDATE SQL and parameters for `data` (SET values first).
    pub fn to_update_sql(&self, data: &[(String, Value)]) -> DbResult<(String, Vec<Value>)> {
        self.build_update(self.dialect, data)
    }

    /// DELETE SQL and parameters.
    pub fn to_delete_sql(&self) -> DbResult<(String, Vec<Value>)> {
        self.build_delete(self.dialect)
    }

    /// INSERT SQL and parameters for `data`.
    pub fn to_insert_sql(&self, data: &[(String, Value)]) -> DbResult<(String, Vec<Value>)> {
        self.build_insert(self.dialect, data, None)
    }
}
