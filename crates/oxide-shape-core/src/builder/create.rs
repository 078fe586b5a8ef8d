//! CREATE TABLE builder.

use super::{require_name, require_table, Statement};
use crate::dialect::Dialect;
use crate::error::Result;
use crate::field::FieldDescriptor;
use crate::table::TableDescriptor;
use crate::value::SqlValue;

/// Builds `CREATE TABLE` for a table descriptor.
///
/// Columns follow declaration order. A single-field primary key is marked
/// inline; a composite one becomes a table constraint. Each unique group
/// and each check expression becomes a named constraint.
#[derive(Debug, Clone, Copy)]
pub struct Create<'a> {
    table: Option<&'a TableDescriptor>,
    name: Option<&'a str>,
    if_not_exists: bool,
    dialect: Dialect,
}

impl Default for Create<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Create<'a> {
    /// Creates a new CREATE TABLE builder (`IF NOT EXISTS` on).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            table: None,
            name: None,
            if_not_exists: true,
            dialect: Dialect::Generic,
        }
    }

    /// Sets the table to create.
    #[must_use]
    pub const fn table(mut self, table: &'a TableDescriptor) -> Self {
        self.table = Some(table);
        self
    }

    /// Creates the table under another name (used for shadow tables).
    #[must_use]
    pub const fn name(mut self, name: &'a str) -> Self {
        self.name = Some(name);
        self
    }

    /// Toggles `IF NOT EXISTS`.
    #[must_use]
    pub const fn if_not_exists(mut self, enabled: bool) -> Self {
        self.if_not_exists = enabled;
        self
    }

    /// Sets the dialect used by [`Create::build`].
    #[must_use]
    pub const fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Builds the statement for the configured dialect.
    ///
    /// # Errors
    ///
    /// Returns an error if no table is set or the name is empty.
    pub fn build(&self) -> Result<(String, Vec<SqlValue>)> {
        self.build_with(self.dialect)
    }
}

impl Statement for Create<'_> {
    fn build_with(&self, dialect: Dialect) -> Result<(String, Vec<SqlValue>)> {
        let table = require_table(self.table)?;
        let name = require_name(Some(self.name.unwrap_or_else(|| table.remote_name())))?;
        let inline_key = table.primary_key().count() == 1;
        // Constraint names follow the table, not the shadow name.
        let base = table.remote_name();

        let mut parts: Vec<String> = table
            .fields()
            .iter()
            .map(|field| column_definition(dialect, field, inline_key))
            .collect();

        for field in table.fields() {
            if let Some(check) = &field.check_expression {
                parts.push(format!(
                    "CONSTRAINT {} CHECK({check})",
                    dialect.quote_identifier(&format!("{base}_{}_ck", field.remote_name))
                ));
            }
        }

        if !inline_key && table.primary_key().count() > 1 {
            parts.push(format!(
                "CONSTRAINT {} PRIMARY_KEY({})",
                dialect.quote_identifier(&format!("{base}_pk")),
                super::column_list(dialect, table.primary_key())
            ));
        }

        for (group, members) in table.unique_groups() {
            parts.push(format!(
                "CONSTRAINT {} UNIQUE({})",
                dialect.quote_identifier(&format!("{base}_{group}_uq")),
                super::column_list(dialect, members)
            ));
        }

        let sql = format!(
            "CREATE TABLE {}{} ({})",
            if self.if_not_exists { "IF NOT EXISTS " } else { "" },
            dialect.quote_identifier(name),
            parts.join(", ")
        );
        Ok((dialect.substitute(&sql), vec![]))
    }
}

fn column_definition(dialect: Dialect, field: &FieldDescriptor, inline_key: bool) -> String {
    let mut def = dialect.quote_identifier(&field.remote_name);
    def.push(' ');
    def.push_str(dialect.column_type(&field.remote_type, field.is_auto_increment));
    if field.is_primary_key && inline_key {
        def.push_str(" PRIMARY_KEY");
    }
    if field.is_auto_increment {
        def.push_str(" AUTO_INCREMENT");
    }
    if field.is_not_null {
        def.push_str(" NOT_NULL");
    }
    if let Some(default) = &field.default_value {
        def.push_str(" DEFAULT ");
        def.push_str(default);
    }
    def
}
