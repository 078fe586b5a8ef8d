//! DROP, RENAME and row-copy builders used to reshape tables.

use super::{require_name, Statement};
use crate::dialect::Dialect;
use crate::error::{Result, ShapeError};
use crate::table::TableDescriptor;
use crate::value::SqlValue;

/// Builds `DROP TABLE`.
#[derive(Debug, Clone, Default)]
pub struct DropTable {
    name: Option<String>,
    if_exists: bool,
    dialect: Dialect,
}

impl DropTable {
    /// Creates a new DROP TABLE builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops the table of a descriptor.
    #[must_use]
    pub fn table(self, table: &TableDescriptor) -> Self {
        self.name(table.remote_name())
    }

    /// Drops a table by name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds `IF EXISTS`.
    #[must_use]
    pub const fn if_exists(mut self) -> Self {
        self.if_exists = true;
        self
    }

    /// Sets the dialect used by [`DropTable::build`].
    #[must_use]
    pub const fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Builds the statement for the configured dialect.
    ///
    /// # Errors
    ///
    /// Returns an error if no table name is set or it is empty.
    pub fn build(&self) -> Result<(String, Vec<SqlValue>)> {
        self.build_with(self.dialect)
    }
}

impl Statement for DropTable {
    fn build_with(&self, dialect: Dialect) -> Result<(String, Vec<SqlValue>)> {
        let name = require_name(self.name.as_deref())?;
        let sql = format!(
            "DROP TABLE {}{}",
            if self.if_exists { "IF EXISTS " } else { "" },
            dialect.quote_identifier(name)
        );
        Ok((sql, vec![]))
    }
}

/// Builds `ALTER TABLE <from> RENAME TO <to>`.
#[derive(Debug, Clone, Default)]
pub struct RenameTable {
    from: Option<String>,
    to: Option<String>,
    dialect: Dialect,
}

impl RenameTable {
    /// Creates a new RENAME builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Renames the table of a descriptor.
    #[must_use]
    pub fn table(self, table: &TableDescriptor) -> Self {
        self.name(table.remote_name())
    }

    /// Renames a table by name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.from = Some(name.into());
        self
    }

    /// Sets the new name.
    #[must_use]
    pub fn to(mut self, name: impl Into<String>) -> Self {
        self.to = Some(name.into());
        self
    }

    /// Sets the dialect used by [`RenameTable::build`].
    #[must_use]
    pub const fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Builds the statement for the configured dialect.
    ///
    /// # Errors
    ///
    /// Returns an error if either name is missing or empty.
    pub fn build(&self) -> Result<(String, Vec<SqlValue>)> {
        self.build_with(self.dialect)
    }
}

impl Statement for RenameTable {
    fn build_with(&self, dialect: Dialect) -> Result<(String, Vec<SqlValue>)> {
        let from = require_name(self.from.as_deref())?;
        let to = require_name(self.to.as_deref())?;
        let sql = format!(
            "ALTER TABLE {} RENAME TO {}",
            dialect.quote_identifier(from),
            dialect.quote_identifier(to)
        );
        Ok((sql, vec![]))
    }
}

/// Builds `INSERT INTO <target> (<new>) SELECT <old> AS <new> FROM <source>`.
///
/// Each pair maps a source column onto a target column. Target columns
/// without a pair take their default.
#[derive(Debug, Clone, Default)]
pub struct CopyRows {
    source: Option<String>,
    target: Option<String>,
    pairs: Vec<(String, String)>,
    dialect: Dialect,
}

impl CopyRows {
    /// Creates a new copy builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Table the rows are read from.
    #[must_use]
    pub fn from_table(mut self, name: impl Into<String>) -> Self {
        self.source = Some(name.into());
        self
    }

    /// Table the rows are written to.
    #[must_use]
    pub fn into_table(mut self, name: impl Into<String>) -> Self {
        self.target = Some(name.into());
        self
    }

    /// Copies source column `old` into target column `new`.
    #[must_use]
    pub fn pair(mut self, old: impl Into<String>, new: impl Into<String>) -> Self {
        self.pairs.push((old.into(), new.into()));
        self
    }

    /// Adds several column pairs.
    #[must_use]
    pub fn pairs<I, O, N>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (O, N)>,
        O: Into<String>,
        N: Into<String>,
    {
        self.pairs
            .extend(pairs.into_iter().map(|(old, new)| (old.into(), new.into())));
        self
    }

    /// Sets the dialect used by [`CopyRows::build`].
    #[must_use]
    pub const fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Builds the statement for the configured dialect.
    ///
    /// # Errors
    ///
    /// Returns an error if a table name is missing or empty, or no column
    /// pair is given.
    pub fn build(&self) -> Result<(String, Vec<SqlValue>)> {
        self.build_with(self.dialect)
    }
}

impl Statement for CopyRows {
    fn build_with(&self, dialect: Dialect) -> Result<(String, Vec<SqlValue>)> {
        let source = require_name(self.source.as_deref())?;
        let target = require_name(self.target.as_deref())?;
        if self.pairs.is_empty() {
            return Err(ShapeError::NoColumnPairs(String::from(target)));
        }

        let new_columns: Vec<String> = self
            .pairs
            .iter()
            .map(|(_, new)| dialect.quote_identifier(new))
            .collect();
        let projection: Vec<String> = self
            .pairs
            .iter()
            .map(|(old, new)| {
                format!(
                    "{} AS {}",
                    dialect.quote_identifier(old),
                    dialect.quote_identifier(new)
                )
            })
            .collect();

        let sql = format!(
            "INSERT INTO {} ({}) SELECT {} FROM {}",
            dialect.quote_identifier(target),
            new_columns.join(", "),
            projection.join(", "),
            dialect.quote_identifier(source)
        );
        Ok((sql, vec![]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::fixtures::person_table;

    #[test]
    fn test_drop() {
        let table = person_table();
        let (sql, _) = DropTable::new()
            .table(&table)
            .if_exists()
            .build_with(Dialect::Sqlite)
            .unwrap();
        assert_eq!(sql, "DROP TABLE IF EXISTS `person`");
        assert_eq!(DropTable::new().build().unwrap_err(), ShapeError::MissingTable);
        assert_eq!(
            DropTable::new().name("").build().unwrap_err(),
            ShapeError::TableWithoutName
        );
    }

    #[test]
    fn test_rename() {
        let (sql, _) = RenameTable::new()
            .name("_person_migration")
            .to("person")
            .build_with(Dialect::Sqlite)
            .unwrap();
        assert_eq!(sql, "ALTER TABLE `_person_migration` RENAME TO `person`");
        assert_eq!(
            RenameTable::new().name("a").build().unwrap_err(),
            ShapeError::MissingTable
        );
    }

    #[test]
    fn test_copy_rows() {
        let (sql, params) = CopyRows::new()
            .from_table("person")
            .into_table("_person_migration")
            .pair("ID", "ID")
            .pair("FullName", "Name")
            .build_with(Dialect::Sqlite)
            .unwrap();
        assert_eq!(
            sql,
            "INSERT INTO `_person_migration` (`ID`, `Name`) \
             SELECT `ID` AS `ID`, `FullName` AS `Name` FROM `person`"
        );
        assert!(params.is_empty());
    }

    #[test]
    fn test_copy_rows_needs_pairs() {
        let err = CopyRows::new()
            .from_table("person")
            .into_table("_person_migration")
            .build()
            .unwrap_err();
        assert_eq!(err, ShapeError::NoColumnPairs(String::from("_person_migration")));
    }
}
