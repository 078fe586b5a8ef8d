//! Typed access to registered tables.

use std::sync::Arc;
use std::time::Duration;

use oxide_shape_core::builder::{Delete, Insert, Replace, Select, Update};
use oxide_shape_core::{Dialect, Record, ShapeError, SqlValue, TableDescriptor, ToSqlValue};
use tracing::info;

use crate::config::ShapeConfig;
use crate::deadline;
use crate::driver::{Row, SqliteDriver};
use crate::error::{DatabaseError, Result};
use crate::scheme::{FieldMatcher, JsonFileStore, SchemeEngine, SchemeStore, TableStore};
use crate::transport::{Session, Transport};

/// A connection with its scheme engine.
///
/// Every table-bound operation locks the connection first, then checks that
/// the record type is registered and its stored shape is current. A table
/// whose shape drifted is refused with [`DatabaseError::TableNotMigrated`].
#[derive(Debug)]
pub struct Database {
    transport: Arc<Transport>,
    engine: SchemeEngine,
    deadline: Option<Duration>,
}

impl Database {
    /// Opens a database from `config`.
    ///
    /// Scheme records live in `config.scheme_file` if set, otherwise in the
    /// `config.scheme_table` table of the database itself.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::Config`] for a driver other than SQLite, or
    /// the connection and store errors.
    pub fn open(config: &ShapeConfig) -> Result<Self> {
        let dialect = config.dialect();
        if dialect != Dialect::Sqlite {
            return Err(DatabaseError::Config(format!(
                "unsupported driver '{}'",
                config.driver
            )));
        }

        let transport = Arc::new(Transport::new(dialect));
        transport.open(Box::new(SqliteDriver::connect(&config.url)?))?;

        let store: Box<dyn SchemeStore> = match &config.scheme_file {
            Some(path) => Box::new(JsonFileStore::open(path)?),
            None => Box::new(TableStore::new(
                Arc::clone(&transport),
                &config.scheme_table,
            )?),
        };
        info!(url = %config.url, driver = %dialect, "Database opened");

        let mut database = Self::with_transport(transport, store, config.scheme_version)?;
        database.deadline = config.deadline();
        Ok(database)
    }

    /// Creates a database over an open transport.
    ///
    /// # Errors
    ///
    /// Returns an error if `store` cannot be read.
    pub fn with_transport(
        transport: Arc<Transport>,
        store: Box<dyn SchemeStore>,
        version: i64,
    ) -> Result<Self> {
        let engine = SchemeEngine::new(Arc::clone(&transport), store, version)?;
        Ok(Self {
            transport,
            engine,
            deadline: None,
        })
    }

    /// Closes the connection.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::AlreadyClosed`] if it was closed before.
    pub fn close(&self) -> Result<()> {
        self.transport.close()?;
        info!("Database closed");
        Ok(())
    }

    /// Returns the transport.
    #[must_use]
    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    /// Returns the scheme engine.
    #[must_use]
    pub fn engine(&self) -> &SchemeEngine {
        &self.engine
    }

    /// Registers `T` under its default table name.
    ///
    /// # Errors
    ///
    /// See [`SchemeEngine::register_with`].
    pub fn register<T: Record>(&self) -> Result<Arc<TableDescriptor>> {
        self.engine.register::<T>()
    }

    /// Registers `T` as table `name` at `version`.
    ///
    /// # Errors
    ///
    /// See [`SchemeEngine::register_with`].
    pub fn register_as<T: Record>(&self, name: &str, version: i64) -> Result<Arc<TableDescriptor>> {
        self.engine.register_as::<T>(name, version)
    }

    /// Registers `T` with a custom column matcher.
    ///
    /// # Errors
    ///
    /// See [`SchemeEngine::register_with`].
    pub fn register_with<T: Record>(
        &self,
        name: &str,
        version: i64,
        matcher: &dyn FieldMatcher,
    ) -> Result<Arc<TableDescriptor>> {
        self.engine.register_with::<T>(name, version, matcher)
    }

    /// Drops table `name`.
    ///
    /// # Errors
    ///
    /// See [`SchemeEngine::drop_table`].
    pub fn drop_table(&self, name: &str) -> Result<()> {
        self.engine.drop_table(name)
    }

    fn with_table<T, R, F>(&self, op: F) -> Result<R>
    where
        T: Record,
        F: FnOnce(&Session<'_>, &TableDescriptor) -> Result<R>,
    {
        let session = self.transport.lock();
        let table = self.engine.table_for::<T>()?;
        op(&session, &table)
    }

    /// Inserts `row` and returns its row id.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::NotInserted`] if no row was inserted, or the
    /// table and driver errors.
    pub fn insert<T: Record>(&self, row: &T) -> Result<i64> {
        self.with_table::<T, _, _>(|session, table| {
            let status = session.execute(&Insert::new().table(table).value(row))?;
            if status.rows_affected != 1 {
                return Err(DatabaseError::NotInserted(table.remote_name().to_string()));
            }
            Ok(status.last_insert_id)
        })
    }

    /// Inserts all `rows` in one transaction and returns how many were
    /// inserted.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::NotInserted`] if the count differs, or the
    /// table and driver errors. Nothing is inserted on error.
    pub fn insert_all<T: Record>(&self, rows: &[T]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        self.with_table::<T, _, _>(|session, table| {
            session.transaction(|s| {
                let status = s.execute(&Insert::new().table(table).values(rows))?;
                if status.rows_affected != rows.len() as u64 {
                    return Err(DatabaseError::NotInserted(table.remote_name().to_string()));
                }
                Ok(status.rows_affected)
            })
        })
    }

    /// Inserts or replaces `row` by its key.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::NotReplaced`] if no row changed, or the table
    /// and driver errors.
    pub fn replace<T: Record>(&self, row: &T) -> Result<()> {
        self.with_table::<T, _, _>(|session, table| {
            let status = session.execute(&Replace::new().table(table).value(row))?;
            if status.rows_affected == 0 {
                return Err(DatabaseError::NotReplaced(table.remote_name().to_string()));
            }
            Ok(())
        })
    }

    /// Updates the row with the key of `row`.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::NotUpdated`] if no row matched, or the table
    /// and driver errors.
    pub fn update<T: Record>(&self, row: &T) -> Result<()> {
        self.with_table::<T, _, _>(|session, table| {
            let status = session.execute(&Update::new().table(table).value(row))?;
            if status.rows_affected == 0 {
                return Err(DatabaseError::NotUpdated(table.remote_name().to_string()));
            }
            Ok(())
        })
    }

    /// Deletes the row with the key of `row`.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::NotDeleted`] if no row matched, or the table
    /// and driver errors.
    pub fn delete<T: Record>(&self, row: &T) -> Result<()> {
        self.with_table::<T, _, _>(|session, table| {
            let status = session.execute(&Delete::new().table(table).value(row))?;
            if status.rows_affected == 0 {
                return Err(DatabaseError::NotDeleted(table.remote_name().to_string()));
            }
            Ok(())
        })
    }

    /// Runs a select over the table of `T`, shaped by `build`.
    ///
    /// ```rust,ignore
    /// let adults: Vec<Person> = db.query(|select| {
    ///     select.filter_raw("Age >= ?", [18]).order_by("Name", Order::Asc)
    /// })?;
    /// ```
    ///
    /// # Errors
    ///
    /// Returns the table, builder, driver and decode errors.
    pub fn query<T, F>(&self, build: F) -> Result<Vec<T>>
    where
        T: Record,
        F: for<'s> FnOnce(Select<'s>) -> Select<'s>,
    {
        self.with_table::<T, _, _>(|session, table| {
            let select = build(Select::new().table(table));
            session
                .query(&select)?
                .into_iter()
                .map(|row| row.decode::<T>(table))
                .collect()
        })
    }

    /// Returns every row of `T`.
    ///
    /// # Errors
    ///
    /// See [`Database::query`].
    pub fn select_all<T: Record>(&self) -> Result<Vec<T>> {
        self.query::<T, _>(|select| select)
    }

    /// Returns the rows of `T` where `column = value`.
    ///
    /// # Errors
    ///
    /// See [`Database::query`].
    pub fn select_where<T: Record>(&self, column: &str, value: impl ToSqlValue) -> Result<Vec<T>> {
        self.query::<T, _>(|select| select.filter(column, value))
    }

    /// Returns the single row of `T` where `column = value`.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::LessThanRequested`] for no row and
    /// [`DatabaseError::MoreThanRequested`] for several.
    pub fn select_single<T: Record>(&self, column: &str, value: impl ToSqlValue) -> Result<T> {
        let mut rows = self.query::<T, _>(|select| select.filter(column, value).limit(2))?;
        match rows.len() {
            0 => Err(DatabaseError::LessThanRequested),
            1 => rows.pop().ok_or(DatabaseError::LessThanRequested),
            _ => Err(DatabaseError::MoreThanRequested),
        }
    }

    /// Returns the row of `T` with auto-increment id `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::MissingKey`] if the table has no auto-increment
    /// column, otherwise see [`Database::select_single`].
    pub fn select_by_id<T: Record>(&self, id: i64) -> Result<T> {
        let table = self.engine.table_for::<T>()?;
        let column = auto_increment_column(&table)?;
        self.select_single::<T>(&column, id)
    }

    /// Returns the number of rows of `T`.
    ///
    /// # Errors
    ///
    /// Returns the table and driver errors.
    pub fn count<T: Record>(&self) -> Result<i64> {
        self.with_table::<T, _, _>(|session, table| {
            let rows = session.query(&Select::new().table(table).count())?;
            Ok(first_int(rows.into_iter().next().map(Row::into_values)))
        })
    }

    /// Returns the highest auto-increment id of `T`, 0 for an empty table.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::MissingKey`] if the table has no auto-increment
    /// column, or the table and driver errors.
    pub fn last_id<T: Record>(&self) -> Result<i64> {
        self.with_table::<T, _, _>(|session, table| {
            let column = auto_increment_column(table)?;
            let rows = session.query(&Select::new().table(table).max(&column))?;
            Ok(first_int(rows.into_iter().next().map(Row::into_values)))
        })
    }

    /// Runs `op` in a transaction on the locked connection.
    ///
    /// The transaction commits if `op` returns `Ok` and rolls back otherwise.
    ///
    /// # Errors
    ///
    /// Returns the error of `op` or of the transaction.
    pub fn exec<R>(&self, op: impl FnOnce(&Session<'_>) -> Result<R>) -> Result<R> {
        self.transport.lock().transaction(op)
    }

    /// Like [`Database::exec`], with the checked descriptor of `T`.
    ///
    /// # Errors
    ///
    /// Returns the table errors, the error of `op` or of the transaction.
    pub fn exec_with_table<T, R, F>(&self, op: F) -> Result<R>
    where
        T: Record,
        F: FnOnce(&Session<'_>, &TableDescriptor) -> Result<R>,
    {
        self.with_table::<T, _, _>(|session, table| session.transaction(|s| op(s, table)))
    }

    /// Runs `op` on a worker thread and waits at most `timeout`.
    ///
    /// On timeout the caller gets [`DatabaseError::Cancelled`] while `op`
    /// keeps running to completion.
    ///
    /// # Errors
    ///
    /// See [`deadline::with_deadline`].
    pub fn with_deadline<R, F>(self: &Arc<Self>, timeout: Duration, op: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&Self) -> Result<R> + Send + 'static,
    {
        let database = Arc::clone(self);
        deadline::with_deadline(timeout, move || op(&*database))
    }

    /// Runs `op` under the configured default deadline, if any.
    ///
    /// # Errors
    ///
    /// See [`Database::with_deadline`].
    pub fn run<R, F>(self: &Arc<Self>, op: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&Self) -> Result<R> + Send + 'static,
    {
        match self.deadline {
            Some(timeout) => self.with_deadline(timeout, op),
            None => op(&**self),
        }
    }
}

fn auto_increment_column(table: &TableDescriptor) -> Result<String> {
    table
        .auto_increment()
        .map(|f| f.remote_name.clone())
        .ok_or_else(|| ShapeError::MissingKey(table.remote_name().to_string()).into())
}

fn first_int(values: Option<Vec<SqlValue>>) -> i64 {
    match values.and_then(|v| v.into_iter().next()) {
        Some(SqlValue::Int(n)) => n,
        _ => 0,
    }
}
