//! Error types for descriptors and statement builders.

use thiserror::Error;

/// Errors raised while describing tables or building statements.
///
/// Configuration errors (`UnsupportedKind`, `DuplicateColumn`, `NoFields`,
/// `EmptyTableName`) come from registering a type and are not recoverable
/// by retrying. The remaining variants are per-call builder errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    /// A field's value kind has no SQL type and the tag gives none.
    #[error("table: field '{field}' has unsupported value kind '{kind}'")]
    UnsupportedKind {
        /// Local field name.
        field: String,
        /// Rust type of the field.
        kind: String,
    },

    /// Two fields map to the same column.
    #[error("table: column '{column}' is declared more than once in '{table}'")]
    DuplicateColumn {
        /// Local type name.
        table: String,
        /// Colliding remote column name.
        column: String,
    },

    /// No field of the type carries a tag.
    #[error("table: '{0}' has no mapped fields")]
    NoFields(String),

    /// The SQL table name is empty.
    #[error("table: '{0}' must have a name")]
    EmptyTableName(String),

    /// The builder was never given a table.
    #[error("builder: must have a table")]
    MissingTable,

    /// The builder's table (or a nested source) has an empty name.
    #[error("builder: must have a table with name")]
    TableWithoutName,

    /// A sub-select has no name to alias it by.
    #[error("builder: sub-select must have a non-empty alias")]
    EmptyAlias,

    /// A row value is not of the table's bound type.
    #[error("builder: value of type '{found}' does not match table type '{expected}'")]
    TypeMismatch {
        /// Type the table was built from.
        expected: String,
        /// Type of the supplied value.
        found: String,
    },

    /// The statement has no rows to write.
    #[error("builder: no values")]
    NoValues,

    /// Row-targeted statements need an auto-increment or primary key.
    #[error("builder: table '{0}' has no AUTO_INCREMENT or PRIMARY_KEY column")]
    MissingKey(String),

    /// UPDATE with nothing in its SET list.
    #[error("builder: nothing to update in '{0}'")]
    NothingToUpdate(String),

    /// A migration copy without any column pairs.
    #[error("builder: copy into '{0}' has no matched columns")]
    NoColumnPairs(String),

    /// A column value could not be decoded into the field type.
    #[error("decode: field '{field}' expected {expected}, got {found}")]
    Decode {
        /// Local field name.
        field: String,
        /// Expected Rust type.
        expected: &'static str,
        /// Description of the stored value.
        found: String,
    },

    /// A row did not carry a required field.
    #[error("decode: field '{0}' is missing from the row")]
    MissingField(String),
}

/// Result type alias for descriptor and builder operations.
pub type Result<T> = std::result::Result<T, ShapeError>;
