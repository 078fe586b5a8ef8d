//! UPDATE builder.

use super::{
    check_row, column_value, key_predicate, render_predicates, require_table, Predicate, Statement,
};
use crate::dialect::Dialect;
use crate::error::{Result, ShapeError};
use crate::record::RowValue;
use crate::table::TableDescriptor;
use crate::value::{SqlValue, ToSqlValue};

/// Builds `UPDATE`.
///
/// Given a row, every non-key column is written and the row is targeted by
/// its auto-increment column, or else by its primary key. Explicit `set`
/// assignments and raw predicates can be added on top or used alone.
#[derive(Clone)]
pub struct Update<'a> {
    table: Option<&'a TableDescriptor>,
    row: Option<&'a dyn RowValue>,
    sets: Vec<(String, SqlValue)>,
    filters: Vec<Predicate>,
    dialect: Dialect,
}

impl Default for Update<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Update<'a> {
    /// Creates a new UPDATE builder.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            table: None,
            row: None,
            sets: Vec::new(),
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

    /// Writes `row` back to the row with the same key.
    #[must_use]
    pub fn value(mut self, row: &'a dyn RowValue) -> Self {
        self.row = Some(row);
        self
    }

    /// Adds `<column> = ?` to the `SET` list.
    #[must_use]
    pub fn set(mut self, column: &str, value: impl ToSqlValue) -> Self {
        self.sets.push((String::from(column), value.to_sql_value()));
        self
    }

    /// Adds `<column> = ?` to the `WHERE` clause.
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

    /// Sets the dialect used by [`Update::build`].
    #[must_use]
    pub const fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Builds the statement for the configured dialect.
    ///
    /// # Errors
    ///
    /// Returns an error if the table is missing, the row has the wrong type,
    /// the table has no key to target a row by, or nothing would be set.
    pub fn build(&self) -> Result<(String, Vec<SqlValue>)> {
        self.build_with(self.dialect)
    }
}

impl Statement for Update<'_> {
    fn build_with(&self, dialect: Dialect) -> Result<(String, Vec<SqlValue>)> {
        let table = require_table(self.table)?;
        let mut params = Vec::new();
        let mut assignments = Vec::new();
        let mut predicates = Vec::new();

        if let Some(row) = self.row {
            check_row(table, row)?;
            let keys = table.key_fields();
            for field in table.fields() {
                if keys.iter().any(|key| key.remote_name == field.remote_name) {
                    continue;
                }
                assignments.push(format!("{} = ?", dialect.quote_identifier(&field.remote_name)));
                params.push(column_value(row, field));
            }
        }

        for (column, value) in &self.sets {
            assignments.push(format!("{} = ?", dialect.quote_identifier(column)));
            params.push(value.clone());
        }

        if assignments.is_empty() {
            return Err(ShapeError::NothingToUpdate(String::from(table.remote_name())));
        }

        if let Some(row) = self.row {
            predicates.push(key_predicate(table, row, dialect, &mut params)?);
        }
        predicates.extend(render_predicates(&self.filters, dialect, &mut params));

        let mut sql = format!(
            "UPDATE {} SET {}",
            dialect.quote_identifier(table.remote_name()),
            assignments.join(", ")
        );
        if !predicates.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&predicates.join(" AND "));
        }
        Ok((sql, params))
    }
}
