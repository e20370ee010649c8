//! Terminal operations: run the builder against a [`Database`].

use super::QueryBuilder;
use crate::database::Database;
use crate::driver::Driver;
use crate::error::{DbError, DbResult};
use crate::ident::Column;
use crate::row::Row;
use crate::value::Value;

/// Aggregate functions accepted by [`QueryBuilder::aggregate`].
pub const AGGREGATE_FUNCTIONS: [&str; 5] = ["COUNT", "SUM", "AVG", "MIN", "MAX"];

fn validate_aggregate(function: &str) -> DbResult<&'static str> {
    let normalized = function.trim().to_ascii_uppercase();
    AGGREGATE_FUNCTIONS
        .iter()
        .copied()
        .find(|f| *f == normalized)
        .ok_or_else(|| {
            DbError::query(format!("Invalid aggregate function '{function}'"))
                .with_debug(format!("allowed: {}", AGGREGATE_FUNCTIONS.join(", ")))
        })
}

impl QueryBuilder {
    /// Run the SELECT and return every row.
    pub async fn get<D: Driver>(&self, db: &mut Database<D>) -> DbResult<Vec<Row>> {
        let (sql, params) = self.build_select(D::dialect())?;
        db.query(&sql, &params).await
    }

    /// Run the SELECT with `LIMIT 1` and return the first row.
    ///
    /// The builder itself is left untouched.
    pub async fn first<D: Driver>(&self, db: &mut Database<D>) -> DbResult<Option<Row>> {
        let rows = self.clone().limit(1).get(db).await?;
        Ok(rows.into_iter().next())
    }

    /// Whether the SELECT matches at least one row.
    pub async fn exists<D: Driver>(&self, db: &mut Database<D>) -> DbResult<bool> {
        Ok(self.first(db).await?.is_some())
    }

    /// Run `FUNCTION(column)` over the filtered rows.
    ///
    /// Projection, LIMIT, OFFSET and ORDER BY are replaced on a copy; the
    /// caller's builder is unchanged. Returns `None` for no row or SQL NULL.
    pub async fn aggregate<D: Driver>(
        &self,
        db: &mut Database<D>,
        function: &str,
        column: &str,
    ) -> DbResult<Option<Value>> {
        let function = validate_aggregate(function)?;
        let target = if column == "*" {
            "*".to_string()
        } else {
            D::dialect().quote(column)
        };

        let mut scalar = self.clone();
        scalar.columns = vec![Column::Raw(format!("{function}({target}) as aggregate"))];
        scalar.orders.clear();
        scalar.limit = None;
        scalar.offset = None;

        let row = scalar.get(db).await?.into_iter().next();
        Ok(row
            .and_then(|row| row.get("aggregate").cloned())
            .filter(|value| !value.is_null()))
    }

    /// `COUNT(*)`; 0 when nothing matches.
    pub async fn count<D: Driver>(&self, db: &mut Database<D>) -> DbResult<i64> {
        match self.aggregate(db, "COUNT", "*").await? {
            None => Ok(0),
            Some(value) => value.as_i64().ok_or_else(|| {
                DbError::query("COUNT returned a non-integer value")
                    .with_debug(format!("value: {value:?}"))
            }),
        }
    }

    /// `SUM(column)`; `None` on empty input.
    pub async fn sum<D: Driver>(&self, db: &mut Database<D>, column: &str) -> DbResult<Option<Value>> {
        self.aggregate(db, "SUM", column).await
    }

    /// `AVG(column)`; `None` on empty input.
    pub async fn avg<D: Driver>(&self, db: &mut Database<D>, column: &str) -> DbResult<Option<Value>> {
        self.aggregate(db, "AVG", column).await
    }

    /// `MIN(column)`; `None` on empty input.
    pub async fn min<D: Driver>(&self, db: &mut Database<D>, column: &str) -> DbResult<Option<Value>> {
        self.aggregate(db, "MIN", column).await
    }

    /// `MAX(column)`; `None` on empty input.
    pub async fn max<D: Driver>(&self, db: &mut Database<D>, column: &str) -> DbResult<Option<Value>> {
        self.aggregate(db, "MAX", column).await
    }

    /// INSERT `data`; returns affected rows.
    pub async fn insert<D: Driver>(&self, db: &mut Database<D>, data: &[(String, Value)]) -> DbResult<u64> {
        let (sql, params) = self.build_insert(D::dialect(), data, None)?;
        db.execute(&sql, &params).await
    }

    /// INSERT `data` and return the generated id.
    ///
    /// PostgreSQL reads `RETURNING id_column`; MySQL and SQLite use the id
    /// reported by the driver.
    pub async fn insert_get_id<D: Driver>(
        &self,
        db: &mut Database<D>,
        data: &[(String, Value)],
        id_column: &str,
    ) -> DbResult<Option<i64>> {
        let dialect = D::dialect();
        if dialect.returns_inserted_id() {
            let (sql, params) = self.build_insert(dialect, data, Some(id_column))?;
            let rows = db.query(&sql, &params).await?;
            Ok(rows
                .first()
                .and_then(|row| row.get_index(0))
                .and_then(Value::as_i64))
        } else {
            let (sql, params) = self.build_insert(dialect, data, None)?;
            Ok(db.execute_outcome(&sql, &params).await?.last_insert_id)
        }
    }

    /// UPDATE matching rows with `data`; refuses to run without WHERE.
    pub async fn update<D: Driver>(&self, db: &mut Database<D>, data: &[(String, Value)]) -> DbResult<u64> {
        let (sql, params) = self.build_update(D::dialect(), data)?;
        db.execute(&sql, &params).await
    }

    /// DELETE matching rows; refuses to run without WHERE.
    pub async fn delete<D: Driver>(&self, db: &mut Database<D>) -> DbResult<u64> {
        let (sql, params) = self.build_delete(D::dialect())?;
        db.execute(&sql, &params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_functions_are_whitelisted() {
        assert_eq!(validate_aggregate(" sum ").unwrap(), "SUM");
        assert_eq!(validate_aggregate("count").unwrap(), "COUNT");
        let err = validate_aggregate("COUNT(*); DROP TABLE t; --").unwrap_err();
        assert!(err.is_query());
    }
}
