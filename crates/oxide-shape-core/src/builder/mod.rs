//! Statement builders.
//!
//! Each builder turns a [`TableDescriptor`] (plus row values or predicates)
//! into SQL text and bound parameters. Nothing is executed here. Builders
//! emit generic SQL and run it through [`Dialect::substitute`] as the last
//! step, so the same builder renders differently per dialect.
//!
//! # Example
//!
//! ```rust
//! use oxide_shape_core::builder::{Select, Statement};
//! use oxide_shape_core::record::{FieldDeclaration, ValueKind};
//! use oxide_shape_core::{Dialect, SqlValue, TableDescriptor};
//!
//! struct Person;
//!
//! let table = TableDescriptor::from_declarations(
//!     "Person",
//!     "person",
//!     std::any::TypeId::of::<Person>(),
//!     "Person",
//!     &[
//!         FieldDeclaration::new("id", ValueKind::Int(8), "NAME=ID,PRIMARY_KEY,AUTO_INCREMENT"),
//!         FieldDeclaration::new("name", ValueKind::Text, "NAME=Name"),
//!     ],
//! )
//! .unwrap();
//!
//! let (sql, params) = Select::new()
//!     .table(&table)
//!     .filter("Name", "Ada")
//!     .build_with(Dialect::Sqlite)
//!     .unwrap();
//!
//! assert_eq!(sql, "SELECT `ID`, `Name` FROM `person` WHERE `Name` = ?");
//! assert_eq!(params, vec![SqlValue::Text(String::from("Ada"))]);
//! ```

mod create;
mod delete;
mod insert;
mod schema;
mod select;
mod update;

pub use create::Create;
pub use delete::Delete;
pub use insert::{Insert, Replace};
pub use schema::{CopyRows, DropTable, RenameTable};
pub use select::{Order, Select};
pub use update::Update;

use crate::dialect::Dialect;
use crate::error::{Result, ShapeError};
use crate::field::FieldDescriptor;
use crate::record::RowValue;
use crate::table::TableDescriptor;
use crate::value::{SqlValue, ToSqlValue};

/// A buildable SQL statement.
pub trait Statement {
    /// Renders the statement for `dialect`.
    ///
    /// # Errors
    ///
    /// Returns a builder error if the statement is incomplete or a row value
    /// does not belong to the table.
    fn build_with(&self, dialect: Dialect) -> Result<(String, Vec<SqlValue>)>;
}

/// One `WHERE` fragment with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Predicate {
    /// `<column> = ?`
    Eq(String, SqlValue),
    /// Raw SQL fragment.
    Raw(String, Vec<SqlValue>),
}

impl Predicate {
    pub(crate) fn eq(column: &str, value: impl ToSqlValue) -> Self {
        Self::Eq(String::from(column), value.to_sql_value())
    }

    pub(crate) fn raw<I>(sql: &str, params: I) -> Self
    where
        I: IntoIterator,
        I::Item: ToSqlValue,
    {
        Self::Raw(
            String::from(sql),
            params.into_iter().map(ToSqlValue::to_sql_value).collect(),
        )
    }

    fn render(&self, dialect: Dialect, params: &mut Vec<SqlValue>) -> String {
        match self {
            Self::Eq(column, value) => {
                params.push(value.clone());
                format!("{} = ?", dialect.quote_identifier(column))
            }
            Self::Raw(sql, values) => {
                params.extend(values.iter().cloned());
                sql.clone()
            }
        }
    }
}

/// Renders predicates joined by `AND`.
pub(crate) fn render_predicates(
    predicates: &[Predicate],
    dialect: Dialect,
    params: &mut Vec<SqlValue>,
) -> Vec<String> {
    predicates
        .iter()
        .map(|predicate| predicate.render(dialect, params))
        .collect()
}

pub(crate) fn require_table(table: Option<&TableDescriptor>) -> Result<&TableDescriptor> {
    let table = table.ok_or(ShapeError::MissingTable)?;
    if table.remote_name().is_empty() {
        return Err(ShapeError::TableWithoutName);
    }
    Ok(table)
}

pub(crate) fn require_name(name: Option<&str>) -> Result<&str> {
    match name {
        None => Err(ShapeError::MissingTable),
        Some("") => Err(ShapeError::TableWithoutName),
        Some(name) => Ok(name),
    }
}

/// Rejects row values whose type is not the table's source type.
pub(crate) fn check_row(table: &TableDescriptor, row: &dyn RowValue) -> Result<()> {
    if row.row_type() == table.type_id() {
        Ok(())
    } else {
        Err(ShapeError::TypeMismatch {
            expected: String::from(table.type_name()),
            found: String::from(row.row_type_name()),
        })
    }
}

pub(crate) fn column_value(row: &dyn RowValue, field: &FieldDescriptor) -> SqlValue {
    row.column_value(&field.local_name).unwrap_or(SqlValue::Null)
}

pub(crate) fn column_list<'a>(
    dialect: Dialect,
    fields: impl IntoIterator<Item = &'a FieldDescriptor>,
) -> String {
    fields
        .into_iter()
        .map(|field| dialect.quote_identifier(&field.remote_name))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// `<key> = ? AND ...` for the row's key fields.
pub(crate) fn key_predicate(
    table: &TableDescriptor,
    row: &dyn RowValue,
    dialect: Dialect,
    params: &mut Vec<SqlValue>,
) -> Result<String> {
    let keys = table.key_fields();
    if keys.is_empty() {
        return Err(ShapeError::MissingKey(String::from(table.remote_name())));
    }
    let parts: Vec<String> = keys
        .iter()
        .map(|field| {
            params.push(column_value(row, field));
            format!("{} = ?", dialect.quote_identifier(&field.remote_name))
        })
        .collect();
    Ok(parts.join(" AND "))
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Hand-written records shared by the builder tests.

    use crate::error::Result;
    use crate::record::{FieldDeclaration, FieldValues, Record, ValueKind};
    use crate::table::TableDescriptor;
    use crate::value::{SqlValue, ToSqlValue};

    #[derive(Debug, Clone, PartialEq)]
    pub struct Person {
        pub id: i64,
        pub name: String,
        pub email: String,
    }

    impl Record for Person {
        const NAME: &'static str = "Person";
        const TABLE: &'static str = "person";

        fn declarations() -> Vec<FieldDeclaration> {
            vec![
                FieldDeclaration::new("id", ValueKind::Int(8), "NAME=ID,PRIMARY_KEY,AUTO_INCREMENT"),
                FieldDeclaration::new("name", ValueKind::Text, "NAME=Name,NOT_NULL"),
                FieldDeclaration::new("email", ValueKind::Text, "NAME=Email,UNIQUE"),
            ]
        }

        fn field_value(&self, field: &str) -> Option<SqlValue> {
            match field {
                "id" => Some(self.id.to_sql_value()),
                "name" => Some(self.name.clone().to_sql_value()),
                "email" => Some(self.email.clone().to_sql_value()),
                _ => None,
            }
        }

        fn from_fields(fields: &mut FieldValues) -> Result<Self> {
            Ok(Self {
                id: fields.take("id")?,
                name: fields.take("name")?,
                email: fields.take("email")?,
            })
        }
    }

    /// Same fields as [`Person`], different type.
    #[derive(Debug, Clone, PartialEq)]
    pub struct Impostor {
        pub id: i64,
        pub name: String,
        pub email: String,
    }

    impl Record for Impostor {
        const NAME: &'static str = "Impostor";
        const TABLE: &'static str = "person";

        fn declarations() -> Vec<FieldDeclaration> {
            Person::declarations()
        }

        fn field_value(&self, field: &str) -> Option<SqlValue> {
            Person {
                id: self.id,
                name: self.name.clone(),
                email: self.email.clone(),
            }
            .field_value(field)
        }

        fn from_fields(fields: &mut FieldValues) -> Result<Self> {
            let p = Person::from_fields(fields)?;
            Ok(Self {
                id: p.id,
                name: p.name,
                email: p.email,
            })
        }
    }

    /// Composite key, no auto-increment.
    #[derive(Debug, Clone, PartialEq)]
    pub struct Membership {
        pub group: String,
        pub member: String,
        pub role: String,
    }

    impl Record for Membership {
        const NAME: &'static str = "Membership";
        const TABLE: &'static str = "membership";

        fn declarations() -> Vec<FieldDeclaration> {
            vec![
                FieldDeclaration::new("group", ValueKind::Text, "PRIMARY_KEY"),
                FieldDeclaration::new("member", ValueKind::Text, "PRIMARY_KEY"),
                FieldDeclaration::new("role", ValueKind::Text, "DEFAULT='user'|CHECK=role <> ''"),
            ]
        }

        fn field_value(&self, field: &str) -> Option<SqlValue> {
            match field {
                "group" => Some(self.group.clone().to_sql_value()),
                "member" => Some(self.member.clone().to_sql_value()),
                "role" => Some(self.role.clone().to_sql_value()),
                _ => None,
            }
        }

        fn from_fields(fields: &mut FieldValues) -> Result<Self> {
            Ok(Self {
                group: fields.take("group")?,
                member: fields.take("member")?,
                role: fields.take("role")?,
            })
        }
    }

    /// No key at all.
    #[derive(Debug, Clone, PartialEq)]
    pub struct Event {
        pub message: String,
    }

    impl Record for Event {
        const NAME: &'static str = "Event";
        const TABLE: &'static str = "event";

        fn declarations() -> Vec<FieldDeclaration> {
            vec![FieldDeclaration::new("message", ValueKind::Text, "")]
        }

        fn field_value(&self, field: &str) -> Option<SqlValue> {
            (field == "message").then(|| self.message.clone().to_sql_value())
        }

        fn from_fields(fields: &mut FieldValues) -> Result<Self> {
            Ok(Self {
                message: fields.take("message")?,
            })
        }
    }

    /// Only an auto-increment key.
    #[derive(Debug, Clone, PartialEq)]
    pub struct Ticket {
        pub id: i64,
    }

    impl Record for Ticket {
        const NAME: &'static str = "Ticket";
        const TABLE: &'static str = "ticket";

        fn declarations() -> Vec<FieldDeclaration> {
            vec![FieldDeclaration::new(
                "id",
                ValueKind::Int(8),
                "NAME=ID,PRIMARY_KEY,AUTO_INCREMENT",
            )]
        }

        fn field_value(&self, field: &str) -> Option<SqlValue> {
            (field == "id").then(|| self.id.to_sql_value())
        }

        fn from_fields(fields: &mut FieldValues) -> Result<Self> {
            Ok(Self {
                id: fields.take("id")?,
            })
        }
    }

    pub fn ticket_table() -> TableDescriptor {
        TableDescriptor::build::<Ticket>(Ticket::TABLE).unwrap()
    }

    pub fn person_table() -> TableDescriptor {
        TableDescriptor::build::<Person>(Person::TABLE).unwrap()
    }

    pub fn membership_table() -> TableDescriptor {
        TableDescriptor::build::<Membership>(Membership::TABLE).unwrap()
    }

    pub fn event_table() -> TableDescriptor {
        TableDescriptor::build::<Event>(Event::TABLE).unwrap()
    }

    pub fn ada() -> Person {
        Person {
            id: 1,
            name: String::from("Ada"),
            email: String::from("ada@example.com"),
        }
    }
}
