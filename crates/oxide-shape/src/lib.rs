//! Struct-mapped SQL tables that follow their declaration.
//!
//! `oxide-shape` keeps database tables in step with the Rust structs mapped
//! onto them:
//! - A struct derives [`Record`] and tags its mapped fields
//! - Registering the type compares the declared shape with the shape stored
//!   for its table, then creates the table, does nothing, or migrates it
//! - A migration copies the surviving columns into a shadow table, swaps it
//!   in, and records the new shape, all in one transaction
//! - Every statement runs through one serialized connection
//!
//! # Architecture
//!
//! - **Driver** - One physical connection ([`SqliteDriver`] over sqlx)
//! - **Transport** - Connection lock, nested transactions, statement logging
//! - **Scheme** - Stored shapes, migration planning, column matching, stores
//! - **Database** - Typed CRUD over registered tables, deadlines
//!
//! # Example
//!
//! ```rust,ignore
//! use oxide_shape::prelude::*;
//!
//! #[derive(Debug, Clone, Record)]
//! #[record(name = "person")]
//! struct Person {
//!     #[sql("NAME=ID,PRIMARY_KEY,AUTO_INCREMENT")]
//!     id: i64,
//!     #[sql("NAME=Name,NOT_NULL")]
//!     name: String,
//! }
//!
//! let db = Database::open(&ShapeConfig::from_env()?)?;
//! db.register_as::<Person>("person", 1)?;
//! let id = db.insert(&Person { id: 0, name: "Ada".into() })?;
//! let ada: Person = db.select_by_id(id)?;
//! ```

pub mod config;
pub mod database;
pub mod deadline;
pub mod driver;
pub mod error;
pub mod scheme;
pub mod transport;

pub use config::ShapeConfig;
pub use database::Database;
pub use driver::{Driver, ExecStatus, Row, SqliteDriver};
pub use error::{DatabaseError, Result};
pub use scheme::{
    FieldMatcher, FieldPair, JsonFileStore, MemoryStore, Plan, RenameTolerant, SchemeEngine,
    SchemeRecord, SchemeStore, TableStore,
};
pub use transport::{Session, Transport, TransactionStatus};

pub use oxide_shape_core::{
    Dialect, FieldDescriptor, Record, ShapeError, SqlValue, Statement, TableDescriptor,
};
pub use oxide_shape_derive::Record;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::ShapeConfig;
    pub use crate::database::Database;
    pub use crate::error::{DatabaseError, Result};
    pub use crate::scheme::{FieldMatcher, FieldPair, RenameTolerant, SchemeRecord};
    pub use crate::transport::Session;
    pub use oxide_shape_core::builder::{
        CopyRows, Create, Delete, DropTable, Insert, Order, RenameTable, Replace, Select,
        Statement, Update,
    };
    pub use oxide_shape_core::{Dialect, Record, ShapeError, SqlValue, TableDescriptor};
    pub use oxide_shape_derive::Record;
}
