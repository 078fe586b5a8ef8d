//! SQLite driver backed by one sqlx connection.

use std::str::FromStr;

use oxide_shape_core::SqlValue;
use sqlx::query::Query;
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqliteConnection, SqliteRow, SqliteValueRef,
};
use sqlx::{Column, ConnectOptions, Connection, Row as _, Sqlite, TypeInfo, ValueRef};
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

use super::{Driver, ExecStatus, Row};
use crate::error::Result;

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// A single SQLite connection driven by a private current-thread runtime.
///
/// Calls block the current thread. Do not use the driver from inside an
/// async task: the private runtime cannot be entered from another one.
pub struct SqliteDriver {
    runtime: Runtime,
    conn: SqliteConnection,
}

impl std::fmt::Debug for SqliteDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDriver").finish_non_exhaustive()
    }
}

impl SqliteDriver {
    /// Connects to `url`, creating the database file if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot start or the connection fails.
    pub fn connect(url: &str) -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let conn = runtime.block_on(options.connect())?;
        debug!(url = %url, "Connected to SQLite");
        Ok(Self { runtime, conn })
    }

    /// Connects to a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot start or the connection fails.
    pub fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:")
    }

    fn run(&mut self, sql: &str) -> Result<()> {
        let conn = &mut self.conn;
        self.runtime
            .block_on(sqlx::query(sql).execute(&mut *conn))?;
        Ok(())
    }
}

fn bind<'q>(query: SqliteQuery<'q>, value: &SqlValue) -> SqliteQuery<'q> {
    match value {
        SqlValue::Null => query.bind(None::<i64>),
        SqlValue::Bool(b) => query.bind(*b),
        SqlValue::Int(i) => query.bind(*i),
        SqlValue::Float(f) => query.bind(*f),
        SqlValue::Text(s) => query.bind(s.clone()),
        SqlValue::Blob(b) => query.bind(b.clone()),
    }
}

fn prepare<'q>(sql: &'q str, params: &[SqlValue]) -> SqliteQuery<'q> {
    params.iter().fold(sqlx::query(sql), bind)
}

fn decode_value(row: &SqliteRow, index: usize) -> Result<SqlValue> {
    let raw: SqliteValueRef<'_> = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }
    let storage = raw.type_info().name().to_string();
    let value = match storage.as_str() {
        "INTEGER" => SqlValue::Int(row.try_get_unchecked::<i64, _>(index)?),
        "REAL" => SqlValue::Float(row.try_get_unchecked::<f64, _>(index)?),
        "BLOB" => SqlValue::Blob(row.try_get_unchecked::<Vec<u8>, _>(index)?),
        _ => SqlValue::Text(row.try_get_unchecked::<String, _>(index)?),
    };
    Ok(value)
}

fn decode_row(row: &SqliteRow) -> Result<Row> {
    let columns: Vec<String> = row
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    let values = (0..columns.len())
        .map(|index| decode_value(row, index))
        .collect::<Result<Vec<_>>>()?;
    Ok(Row::new(columns, values))
}

impl Driver for SqliteDriver {
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<ExecStatus> {
        let conn = &mut self.conn;
        let result = self
            .runtime
            .block_on(prepare(sql, params).execute(&mut *conn))?;
        Ok(ExecStatus {
            rows_affected: result.rows_affected(),
            last_insert_id: result.last_insert_rowid(),
        })
    }

    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        let conn = &mut self.conn;
        let rows = self
            .runtime
            .block_on(prepare(sql, params).fetch_all(&mut *conn))?;
        rows.iter().map(decode_row).collect()
    }

    fn begin(&mut self) -> Result<()> {
        self.run("BEGIN")
    }

    fn commit(&mut self) -> Result<()> {
        self.run("COMMIT")
    }

    fn rollback(&mut self) -> Result<()> {
        self.run("ROLLBACK")
    }

    fn close(self: Box<Self>) -> Result<()> {
        let Self { runtime, conn } = *self;
        runtime.block_on(conn.close())?;
        Ok(())
    }
}
