//! Error types for the database layer.

use oxide_shape_core::ShapeError;

/// Errors that can occur while registering, migrating or querying tables.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Descriptor or builder error.
    #[error(transparent)]
    Shape(#[from] ShapeError),

    /// The table was never registered.
    #[error("scheme: table '{0}' does not exist")]
    TableNotExists(String),

    /// The declared shape differs from the applied one.
    #[error("scheme: table '{0}' is not migrated to the declared shape")]
    TableNotMigrated(String),

    /// The declared version is older than the applied one.
    #[error("scheme: table '{table}' is at version {remote}, client declares older version {local}")]
    OutdatedVersion {
        /// Table name.
        table: String,
        /// Declared version.
        local: i64,
        /// Applied version.
        remote: i64,
    },

    /// Same version, different shape.
    #[error("scheme: table '{table}' has a different shape under the same version {version}")]
    AmbiguousVersion {
        /// Table name.
        table: String,
        /// Shared version.
        version: i64,
    },

    /// No column of the old shape maps onto the new one.
    #[error("scheme: migration of table '{0}' is unsupported, no matching columns")]
    MigrationUnsupported(String),

    /// Another registration of the same table is in flight.
    #[error("scheme: registration of table '{0}' is already pending")]
    RegistrationPending(String),

    /// The transport already has a connection.
    #[error("transport: connection is already open")]
    AlreadyOpen,

    /// The transport has no connection.
    #[error("transport: connection is already closed")]
    AlreadyClosed,

    /// Commit or rollback without an open transaction.
    #[error("transaction: no transaction is open")]
    TransactionClosed,

    /// A nested level failed, the whole transaction was rolled back.
    #[error("transaction: rolled back after a nested failure")]
    TransactionAborted,

    /// Commit failed and the follow-up rollback failed too.
    #[error("transaction: state is unknown after a failed commit")]
    TransactionStateUnknown,

    /// Driver error, wrapped as is.
    #[error("Database error: {0}")]
    Driver(#[from] sqlx::Error),

    /// Snapshot (de)serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error (snapshot file or worker thread).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// INSERT changed fewer rows than given.
    #[error("database: rows of '{0}' were not inserted")]
    NotInserted(String),

    /// REPLACE changed no row.
    #[error("database: rows of '{0}' were not replaced")]
    NotReplaced(String),

    /// UPDATE changed no row.
    #[error("database: rows of '{0}' were not updated")]
    NotUpdated(String),

    /// DELETE changed no row.
    #[error("database: rows of '{0}' were not deleted")]
    NotDeleted(String),

    /// The query returned fewer rows than requested.
    #[error("database: response has less rows than requested")]
    LessThanRequested,

    /// The query returned more rows than requested.
    #[error("database: response has more rows than requested")]
    MoreThanRequested,

    /// The deadline elapsed before the operation finished.
    #[error("database: operation cancelled after its deadline")]
    Cancelled,

    /// The worker running the operation panicked.
    #[error("database: operation panicked")]
    Panicked,

    /// Invalid configuration.
    #[error("config: {0}")]
    Config(String),
}

/// Result type for database operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;
