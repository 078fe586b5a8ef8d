//! # oxide-shape-core
//!
//! Struct-mapped table descriptors and dialect-aware SQL statement builders.
//!
//! This crate provides:
//! - The [`Record`] trait, the compile-time description of a struct mapped
//!   to a table (usually implemented with `#[derive(Record)]`)
//! - [`FieldDescriptor`] and [`TableDescriptor`], the normalized shape of a
//!   table with a stable content hash
//! - Statement builders that turn a descriptor into SQL text and bound
//!   parameters for a [`Dialect`]
//!
//! Nothing here talks to a database. The `oxide-shape` crate executes the
//! statements and migrates tables when their shape changes.
//!
//! ## Declaring a table
//!
//! ```rust,ignore
//! use oxide_shape_derive::Record;
//!
//! #[derive(Record)]
//! #[record(name = "person")]
//! struct Person {
//!     #[sql("NAME=ID,PRIMARY_KEY,AUTO_INCREMENT")]
//!     id: i64,
//!     #[sql("NAME=Name,NOT_NULL")]
//!     name: String,
//!     // Not mapped: no tag.
//!     cache: Vec<String>,
//! }
//! ```
//!
//! ## Building statements
//!
//! ```rust,ignore
//! use oxide_shape_core::{builder::Insert, Dialect, TableDescriptor};
//!
//! let table = TableDescriptor::build::<Person>("person")?;
//! let (sql, params) = Insert::new()
//!     .table(&table)
//!     .value(&person)
//!     .build_with(Dialect::Sqlite)?;
//! // INSERT INTO `person` (`Name`) VALUES (?)
//! ```

pub mod builder;
pub mod dialect;
pub mod error;
pub mod field;
pub mod record;
pub mod table;
pub mod value;

pub use builder::Statement;
pub use dialect::Dialect;
pub use error::{Result, ShapeError};
pub use field::FieldDescriptor;
pub use record::{FieldDeclaration, FieldValues, Record, RowValue, SqlKind, ValueKind};
pub use table::{shape_hash, TableDescriptor};
pub use value::{FromSqlValue, SqlValue, ToSqlValue};
