//! DELETE builder.

use super::{check_row, key_predicate, render_predicates, require_table, Predicate, Statement};
use crate::dialect::Dialect;
use crate::error::Result;
use crate::record::RowValue;
use crate::table::TableDescriptor;
use crate::value::{SqlValue, ToSqlValue};

/// Builds `DELETE`.
///
/// Rows are targeted by key, several rows are combined with `OR`. Raw
/// predicates are `AND`ed to that. With neither, every row is deleted.
#[derive(Clone)]
pub struct Delete<'a> {
    table: Option<&'a TableDescriptor>,
    rows: Vec<&'a dyn RowValue>,
    filters: Vec<Predicate>,
    dialect: Dialect,
}

impl Default for Delete<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Delete<'a> {
    /// Creates a new DELETE builder.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            table: None,
            rows: Vec::new(),
            filters: Vec::new(),
            dialect: Dialect::Generic,
        }
    }

    /// Sets the target table.
    #[must_use]
    pub const fn table(mut self, table: &'a TableDescriptor) -> Self {
        self.table = Some(table);
        self
    }

    /// Deletes the row with the same key as `row`.
    #[must_use]
    pub fn value(mut self, row: &'a dyn RowValue) -> Self {
        self.rows.push(row);
        self
    }

    /// Deletes the rows with the same keys as `rows`.
    #[must_use]
    pub fn values<R: RowValue + 'a>(mut self, rows: &'a [R]) -> Self {
        self.rows.extend(rows.iter().map(|row| row as &dyn RowValue));
        self
    }

    /// Adds `<column> = ?`.
    #[must_use]
    pub fn filter(mut self, column: &str, value: impl ToSqlValue) -> Self {
        self.filters.push(Predicate::eq(column, value));
        self
    }

    /// Adds a raw predicate fragment with its parameters.
    #[must_use]
    pub fn filter_raw<I>(mut self, sql: &str, params: I) -> Self
    where
        I: IntoIterator,
        I::Item: ToSqlValue,
    {
        self.filters.push(Predicate::raw(sql, params));
        self
    }

    /// Sets the dialect used by [`Delete::build`].
    #[must_use]
    pub const fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Builds the statement for the configured dialect.
    ///
    /// # Errors
    ///
    /// Returns an error if the table is missing, a row has the wrong type or
    /// rows are given for a table without a key.
    pub fn build(&self) -> Result<(String, Vec<SqlValue>)> {
        self.build_with(self.dialect)
    }
}

impl Statement for Delete<'_> {
    fn build_with(&self, dialect: Dialect) -> Result<(String, Vec<SqlValue>)> {
        let table = require_table(self.table)?;
        let mut params = Vec::new();
        let mut predicates = Vec::new();

        if !self.rows.is_empty() {
            let mut groups = Vec::with_capacity(self.rows.len());
            for row in &self.rows {
                check_row(table, *row)?;
                groups.push(key_predicate(table, *row, dialect, &mut params)?);
            }
            predicates.push(if groups.len() == 1 {
                groups.remove(0)
            } else {
                let joined: Vec<String> = groups.iter().map(|g| format!("({g})")).collect();
                format!("({})", joined.join(" OR "))
            });
        }
        predicates.extend(render_predicates(&self.filters, dialect, &mut params));

        let mut sql = format!("DELETE FROM {}", dialect.quote_identifier(table.remote_name()));
        if !predicates.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&predicates.join(" AND "));
        }
        Ok((sql, params))
    }
}
