//! INSERT and REPLACE builders.

use super::{check_row, column_list, column_value, placeholders, require_table, Statement};
use crate::dialect::Dialect;
use crate::error::{Result, ShapeError};
use crate::field::FieldDescriptor;
use crate::record::RowValue;
use crate::table::TableDescriptor;
use crate::value::SqlValue;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Verb {
    Insert,
    Replace,
}

#[derive(Clone)]
struct Rows<'a> {
    table: Option<&'a TableDescriptor>,
    rows: Vec<&'a dyn RowValue>,
    dialect: Dialect,
}

impl<'a> Rows<'a> {
    const fn new() -> Self {
        Self {
            table: None,
            rows: Vec::new(),
            dialect: Dialect::Generic,
        }
    }

    fn build(&self, verb: Verb, dialect: Dialect) -> Result<(String, Vec<SqlValue>)> {
        let table = require_table(self.table)?;
        if self.rows.is_empty() {
            return Err(ShapeError::NoValues);
        }
        for row in &self.rows {
            check_row(table, *row)?;
        }

        let columns: Vec<&FieldDescriptor> = table
            .fields()
            .iter()
            .filter(|field| verb == Verb::Replace || !field.is_auto_increment)
            .collect();
        let keyword = match verb {
            Verb::Insert => "INSERT",
            Verb::Replace => "REPLACE",
        };
        let name = dialect.quote_identifier(table.remote_name());

        if columns.is_empty() {
            // Only auto-increment columns: one NULL tuple per row.
            let nulls = vec!["NULL"; table.fields().len()].join(", ");
            let tuples = vec![format!("({nulls})"); self.rows.len()];
            let sql = format!(
                "{keyword} INTO {name} ({}) VALUES {}",
                column_list(dialect, table.fields()),
                tuples.join(", ")
            );
            return Ok((sql, vec![]));
        }

        let mut params = Vec::with_capacity(columns.len() * self.rows.len());
        let tuples: Vec<String> = self
            .rows
            .iter()
            .map(|row| {
                params.extend(columns.iter().map(|field| column_value(*row, field)));
                format!("({})", placeholders(columns.len()))
            })
            .collect();

        let sql = format!(
            "{keyword} INTO {name} ({}) VALUES {}",
            column_list(dialect, columns.iter().copied()),
            tuples.join(", ")
        );
        Ok((sql, params))
    }
}

/// Builds `INSERT` for one or more rows of the table's source type.
///
/// Auto-increment columns are left out so the database assigns them.
#[derive(Clone)]
pub struct Insert<'a> {
    inner: Rows<'a>,
}

/// Builds `REPLACE` for one or more rows; every column is written, keys
/// included.
#[derive(Clone)]
pub struct Replace<'a> {
    inner: Rows<'a>,
}

macro_rules! row_builder {
    ($name:ident, $verb:expr) => {
        impl Default for $name<'_> {
            fn default() -> Self {
                Self::new()
            }
        }

        impl<'a> $name<'a> {
            /// Creates an empty builder.
            #[must_use]
            pub const fn new() -> Self {
                Self { inner: Rows::new() }
            }

            /// Sets the target table.
            #[must_use]
            pub const fn table(mut self, table: &'a TableDescriptor) -> Self {
                self.inner.table = Some(table);
                self
            }

            /// Adds a row. Its type must be the table's source type.
            #[must_use]
            pub fn value(mut self, row: &'a dyn RowValue) -> Self {
                self.inner.rows.push(row);
                self
            }

            /// Adds several rows.
            #[must_use]
            pub fn values<R: RowValue + 'a>(mut self, rows: &'a [R]) -> Self {
                self.inner
                    .rows
                    .extend(rows.iter().map(|row| row as &dyn RowValue));
                self
            }

            /// Sets the dialect used by `build`.
            #[must_use]
            pub const fn dialect(mut self, dialect: Dialect) -> Self {
                self.inner.dialect = dialect;
                self
            }

            /// Builds the statement for the configured dialect.
            ///
            /// # Errors
            ///
            /// Returns an error if the table or rows are missing, or a row is
            /// not of the table's source type.
            pub fn build(&self) -> Result<(String, Vec<SqlValue>)> {
                self.build_with(self.inner.dialect)
            }
        }

        impl Statement for $name<'_> {
            fn build_with(&self, dialect: Dialect) -> Result<(String, Vec<SqlValue>)> {
                self.inner.build($verb, dialect)
            }
        }
    };
}

row_builder!(Insert, Verb::Insert);
row_builder!(Replace, Verb::Replace);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::fixtures::{
        ada, event_table, person_table, ticket_table, Event, Impostor, Person, Ticket,
    };

    #[test]
    fn test_insert_skips_auto_increment() {
        let table = person_table();
        let row = ada();
        let (sql, params) = Insert::new()
            .table(&table)
            .value(&row)
            .build_with(Dialect::Sqlite)
            .unwrap();
        assert_eq!(sql, "INSERT INTO `person` (`Name`, `Email`) VALUES (?, ?)");
        assert_eq!(
            params,
            vec![
                SqlValue::Text(String::from("Ada")),
                SqlValue::Text(String::from("ada@example.com")),
            ]
        );
    }

    #[test]
    fn test_insert_many_rows() {
        let table = person_table();
        let rows = vec![
            ada(),
            Person {
                id: 0,
                name: String::from("Grace"),
                email: String::from("grace@example.com"),
            },
        ];
        let (sql, params) = Insert::new()
            .table(&table)
            .values(&rows)
            .build_with(Dialect::Sqlite)
            .unwrap();
        assert_eq!(
            sql,
            "INSERT INTO `person` (`Name`, `Email`) VALUES (?, ?), (?, ?)"
        );
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn test_replace_writes_every_column() {
        let table = person_table();
        let row = ada();
        let (sql, params) = Replace::new()
            .table(&table)
            .value(&row)
            .build_with(Dialect::Sqlite)
            .unwrap();
        assert_eq!(
            sql,
            "REPLACE INTO `person` (`ID`, `Name`, `Email`) VALUES (?, ?, ?)"
        );
        assert_eq!(params[0], SqlValue::Int(1));
    }

    #[test]
    fn test_insert_rejects_other_type() {
        let table = person_table();
        let row = Impostor {
            id: 1,
            name: String::from("Ada"),
            email: String::from("ada@example.com"),
        };
        let err = Insert::new().table(&table).value(&row).build().unwrap_err();
        assert!(matches!(err, ShapeError::TypeMismatch { ref found, .. } if found.ends_with("Impostor")));
    }

    #[test]
    fn test_insert_requires_rows_and_table() {
        let table = person_table();
        assert_eq!(
            Insert::new().table(&table).build().unwrap_err(),
            ShapeError::NoValues
        );
        let row = Event {
            message: String::from("boot"),
        };
        assert_eq!(
            Insert::new().value(&row).build().unwrap_err(),
            ShapeError::MissingTable
        );
        let events = event_table();
        assert!(Insert::new().table(&events).value(&row).build().is_ok());
    }

    #[test]
    fn test_insert_key_only_rows() {
        let table = ticket_table();
        let rows = vec![Ticket { id: 0 }; 3];
        let (sql, params) = Insert::new()
            .table(&table)
            .values(&rows)
            .build_with(Dialect::Sqlite)
            .unwrap();
        assert_eq!(
            sql,
            "INSERT INTO `ticket` (`ID`) VALUES (NULL), (NULL), (NULL)"
        );
        assert!(params.is_empty());
    }
}
