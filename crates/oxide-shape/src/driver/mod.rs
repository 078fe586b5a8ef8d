//! Connection drivers.
//!
//! A [`Driver`] owns one physical connection and runs SQL text with bound
//! parameters on it. The [`Transport`](crate::transport::Transport) serializes
//! every call, so drivers never see concurrent use.

mod sqlite;

pub use sqlite::SqliteDriver;

use oxide_shape_core::{FieldValues, Record, SqlValue, TableDescriptor};

use crate::error::Result;

/// Outcome of a statement that changes rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecStatus {
    /// Rows changed by the statement.
    pub rows_affected: u64,
    /// Row id of the last inserted row.
    pub last_insert_id: i64,
}

/// One result row, columns in query order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl Row {
    /// Creates a row from matching column and value lists.
    #[must_use]
    pub fn new(columns: Vec<String>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    /// Returns the column names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the values.
    #[must_use]
    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns whether the row has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the value of a column.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.values.get(index)
    }

    /// Moves the value of a column out, leaving `NULL` behind.
    pub fn take(&mut self, column: &str) -> Option<SqlValue> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.values
            .get_mut(index)
            .map(|value| std::mem::replace(value, SqlValue::Null))
    }

    /// Consumes the row into its values.
    #[must_use]
    pub fn into_values(self) -> Vec<SqlValue> {
        self.values
    }

    /// Decodes the row into a record of `table`.
    ///
    /// Columns are read by remote name and handed to the record by local
    /// name. A mapped column missing from the row is a decode error.
    ///
    /// # Errors
    ///
    /// Returns an error if a column is missing or has an incompatible value.
    pub fn decode<T: Record>(mut self, table: &TableDescriptor) -> Result<T> {
        let mut fields = FieldValues::new();
        for field in table.fields() {
            if let Some(value) = self.take(&field.remote_name) {
                fields.insert(field.local_name.clone(), value);
            }
        }
        Ok(T::from_fields(&mut fields)?)
    }
}

/// A single database connection.
pub trait Driver: Send {
    /// Runs a statement that returns no rows.
    ///
    /// # Errors
    ///
    /// Returns the driver error, unchanged.
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<ExecStatus>;

    /// Runs a query and collects its rows.
    ///
    /// # Errors
    ///
    /// Returns the driver error, unchanged.
    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>>;

    /// Opens a transaction on the connection.
    ///
    /// # Errors
    ///
    /// Returns the driver error, unchanged.
    fn begin(&mut self) -> Result<()>;

    /// Commits the open transaction.
    ///
    /// # Errors
    ///
    /// Returns the driver error, unchanged.
    fn commit(&mut self) -> Result<()>;

    /// Rolls back the open transaction.
    ///
    /// # Errors
    ///
    /// Returns the driver error, unchanged.
    fn rollback(&mut self) -> Result<()>;

    /// Closes the connection.
    ///
    /// # Errors
    ///
    /// Returns the driver error, unchanged.
    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
