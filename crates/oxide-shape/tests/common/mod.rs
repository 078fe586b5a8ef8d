#![allow(dead_code)]

use std::sync::Arc;
use std::thread::{self, ThreadId};

use oxide_shape::{
    Database, DatabaseError, Dialect, Driver, ExecStatus, MemoryStore, Result, Row, SqlValue,
    SqliteDriver, Transport,
};
use parking_lot::Mutex;

/// Statements seen by a [`Recording`] driver, with the calling thread.
pub type Log = Arc<Mutex<Vec<(ThreadId, String)>>>;

/// Forwards to an in-memory SQLite connection and logs every call.
pub struct Recording {
    inner: SqliteDriver,
    log: Log,
}

impl Recording {
    pub fn new(log: Log) -> Self {
        Self {
            inner: SqliteDriver::in_memory().unwrap(),
            log,
        }
    }

    fn record(&self, sql: &str) {
        self.log
            .lock()
            .push((thread::current().id(), sql.to_string()));
    }
}

impl Driver for Recording {
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<ExecStatus> {
        self.record(sql);
        self.inner.execute(sql, params)
    }

    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        self.record(sql);
        self.inner.query(sql, params)
    }

    fn begin(&mut self) -> Result<()> {
        self.record("BEGIN");
        self.inner.begin()
    }

    fn commit(&mut self) -> Result<()> {
        self.record("COMMIT");
        self.inner.commit()
    }

    fn rollback(&mut self) -> Result<()> {
        self.record("ROLLBACK");
        self.inner.rollback()
    }
}

/// Routes engine logs to the test output. Set `RUST_LOG` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A database over a recording driver with an in-memory scheme store.
pub fn recorded_database(version: i64) -> (Arc<Database>, Log) {
    init_tracing();
    let log: Log = Arc::default();
    let transport = Arc::new(Transport::with_driver(
        Dialect::Sqlite,
        Box::new(Recording::new(Arc::clone(&log))),
    ));
    let db = Database::with_transport(transport, Box::new(MemoryStore::new()), version).unwrap();
    (Arc::new(db), log)
}

/// Statements logged so far, without thread ids.
pub fn statements(log: &Log) -> Vec<String> {
    log.lock().iter().map(|(_, sql)| sql.clone()).collect()
}

/// Statements that change the schema or copy rows between tables.
pub fn ddl(log: &Log) -> Vec<String> {
    statements(log)
        .into_iter()
        .filter(|sql| {
            sql.starts_with("CREATE TABLE")
                || sql.starts_with("DROP TABLE")
                || sql.starts_with("ALTER TABLE")
                || (sql.starts_with("INSERT INTO") && sql.contains(" SELECT "))
        })
        .collect()
}

pub fn is_not_migrated(err: &DatabaseError) -> bool {
    matches!(err, DatabaseError::TableNotMigrated(_))
}
