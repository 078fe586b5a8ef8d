//! Serialized access to one connection.
//!
//! The [`Transport`] owns the driver behind a re-entrant lock. Every
//! statement runs through a [`Session`], the guard of that lock, so
//! statements from different threads never interleave. The same thread may
//! lock again while it holds a session; nested callers then share the open
//! transaction.
//!
//! Transactions are reference-counted per connection: only the outermost
//! commit or rollback reaches the driver, and a rollback at any nested level
//! turns the outermost commit into a rollback.

use std::cell::RefCell;

use oxide_shape_core::{Dialect, Statement};
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use tracing::{debug, warn};

use crate::driver::{Driver, ExecStatus, Row};
use crate::error::{DatabaseError, Result};

/// Status accumulated by the current transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionStatus {
    /// Row id of the last inserted row.
    pub last_insert_id: i64,
    /// Rows changed since the outermost `begin`.
    pub rows_affected: u64,
}

#[derive(Default)]
struct Link {
    driver: Option<Box<dyn Driver>>,
    depth: usize,
    failed: bool,
    status: TransactionStatus,
}

impl Link {
    fn driver(&mut self) -> Result<&mut Box<dyn Driver>> {
        self.driver.as_mut().ok_or(DatabaseError::AlreadyClosed)
    }
}

/// A connection shared between threads.
pub struct Transport {
    dialect: Dialect,
    link: ReentrantMutex<RefCell<Link>>,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("dialect", &self.dialect)
            .finish_non_exhaustive()
    }
}

impl Transport {
    /// Creates a closed transport for `dialect`.
    #[must_use]
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            link: ReentrantMutex::new(RefCell::new(Link::default())),
        }
    }

    /// Creates a transport already open on `driver`.
    #[must_use]
    pub fn with_driver(dialect: Dialect, driver: Box<dyn Driver>) -> Self {
        let transport = Self::new(dialect);
        transport.link.lock().borrow_mut().driver = Some(driver);
        transport
    }

    /// Returns the dialect statements are rendered for.
    #[must_use]
    pub const fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Attaches a connection.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::AlreadyOpen`] if a connection is attached.
    pub fn open(&self, driver: Box<dyn Driver>) -> Result<()> {
        let guard = self.link.lock();
        let mut link = guard.borrow_mut();
        if link.driver.is_some() {
            return Err(DatabaseError::AlreadyOpen);
        }
        link.driver = Some(driver);
        link.depth = 0;
        link.failed = false;
        Ok(())
    }

    /// Detaches and closes the connection, rolling back an open transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::AlreadyClosed`] if no connection is attached,
    /// or the driver error raised while closing.
    pub fn close(&self) -> Result<()> {
        let guard = self.link.lock();
        let (mut driver, open) = {
            let mut link = guard.borrow_mut();
            let driver = link.driver.take().ok_or(DatabaseError::AlreadyClosed)?;
            let open = link.depth > 0;
            link.depth = 0;
            link.failed = false;
            (driver, open)
        };
        if open {
            warn!("Closing with an open transaction, rolling back");
            if let Err(err) = driver.rollback() {
                warn!(error = %err, "Rollback on close failed");
            }
        }
        driver.close()
    }

    /// Returns whether a connection is attached.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.link.lock().borrow().driver.is_some()
    }

    /// Locks the connection for the current thread.
    ///
    /// Blocks while another thread holds a session.
    #[must_use]
    pub fn lock(&self) -> Session<'_> {
        Session {
            dialect: self.dialect,
            guard: self.link.lock(),
        }
    }
}

/// Exclusive use of the connection, held until dropped.
pub struct Session<'a> {
    dialect: Dialect,
    guard: ReentrantMutexGuard<'a, RefCell<Link>>,
}

impl std::fmt::Debug for Session<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("dialect", &self.dialect)
            .field("depth", &self.depth())
            .finish()
    }
}

impl Session<'_> {
    /// Returns the dialect statements are rendered for.
    #[must_use]
    pub const fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Builds and runs a statement that returns no rows.
    ///
    /// # Errors
    ///
    /// Returns a builder error, [`DatabaseError::AlreadyClosed`] or the
    /// driver error.
    pub fn execute(&self, statement: &impl Statement) -> Result<ExecStatus> {
        let (sql, params) = statement.build_with(self.dialect)?;
        debug!(sql = %sql, params = params.len(), "Executing SQL");
        let link = &mut *self.guard.borrow_mut();
        let status = link.driver()?.execute(&sql, &params)?;
        link.status.last_insert_id = status.last_insert_id;
        link.status.rows_affected += status.rows_affected;
        Ok(status)
    }

    /// Builds and runs a query.
    ///
    /// # Errors
    ///
    /// Returns a builder error, [`DatabaseError::AlreadyClosed`] or the
    /// driver error.
    pub fn query(&self, statement: &impl Statement) -> Result<Vec<Row>> {
        let (sql, params) = statement.build_with(self.dialect)?;
        debug!(sql = %sql, params = params.len(), "Executing SQL");
        self.guard.borrow_mut().driver()?.query(&sql, &params)
    }

    /// Opens a transaction, or joins the open one.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::AlreadyClosed`] or the driver error.
    pub fn begin(&self) -> Result<()> {
        let mut link = self.guard.borrow_mut();
        if link.depth == 0 {
            link.driver()?.begin()?;
            link.failed = false;
            link.status = TransactionStatus::default();
            debug!("Transaction opened");
        }
        link.depth += 1;
        Ok(())
    }

    /// Leaves one transaction level, committing at the outermost one.
    ///
    /// # Errors
    ///
    /// - [`DatabaseError::TransactionClosed`] without an open transaction
    /// - [`DatabaseError::TransactionAborted`] if a nested level rolled back
    /// - the driver error if the commit failed and was rolled back
    /// - [`DatabaseError::TransactionStateUnknown`] if the rollback after a
    ///   failed commit failed as well
    pub fn commit(&self) -> Result<()> {
        let mut link = self.guard.borrow_mut();
        if link.depth == 0 {
            return Err(DatabaseError::TransactionClosed);
        }
        link.depth -= 1;
        if link.depth > 0 {
            return Ok(());
        }
        let failed = std::mem::take(&mut link.failed);
        let driver = link.driver()?;
        if failed {
            driver.rollback()?;
            warn!("Nested transaction failed, rolled back");
            return Err(DatabaseError::TransactionAborted);
        }
        if let Err(err) = driver.commit() {
            return match driver.rollback() {
                Ok(()) => Err(err),
                Err(rollback) => {
                    warn!(error = %err, rollback = %rollback, "Rollback after failed commit failed");
                    Err(DatabaseError::TransactionStateUnknown)
                }
            };
        }
        debug!("Transaction committed");
        Ok(())
    }

    /// Leaves one transaction level, rolling back at the outermost one.
    ///
    /// A nested rollback only marks the transaction as failed.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::TransactionClosed`] without an open
    /// transaction, or the driver error.
    pub fn rollback(&self) -> Result<()> {
        let mut link = self.guard.borrow_mut();
        if link.depth == 0 {
            return Err(DatabaseError::TransactionClosed);
        }
        link.depth -= 1;
        if link.depth > 0 {
            link.failed = true;
            return Ok(());
        }
        link.failed = false;
        link.driver()?.rollback()?;
        debug!("Transaction rolled back");
        Ok(())
    }

    /// Runs `op` in a transaction: commit on `Ok`, rollback on `Err`.
    ///
    /// # Errors
    ///
    /// Returns the error of `op`, or the error of `begin`/`commit`.
    pub fn transaction<T>(&self, op: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        self.begin()?;
        let mut level = Level {
            session: self,
            open: true,
        };
        let outcome = op(self);
        level.open = false;
        match outcome {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = self.rollback() {
                    warn!(error = %rollback, "Rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Leaves one level of a transaction whose body unwound.
    fn abandon(&self) {
        let Ok(mut link) = self.guard.try_borrow_mut() else {
            return;
        };
        if link.depth == 0 {
            return;
        }
        link.depth -= 1;
        if link.depth > 0 {
            link.failed = true;
            return;
        }
        link.failed = false;
        match link.driver().and_then(|driver| driver.rollback()) {
            Ok(()) => warn!("Transaction body panicked, rolled back"),
            Err(err) => warn!(error = %err, "Rollback after panic failed"),
        }
    }

    /// Returns the status of the current transaction.
    #[must_use]
    pub fn status(&self) -> TransactionStatus {
        self.guard.borrow().status
    }

    /// Returns the number of open transaction levels.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.guard.borrow().depth
    }
}

/// One open level of [`Session::transaction`], left on unwind.
struct Level<'s, 'a> {
    session: &'s Session<'a>,
    open: bool,
}

impl Drop for Level<'_, '_> {
    fn drop(&mut self) {
        if self.open {
            self.session.abandon();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::Arc;

    use oxide_shape_core::builder::DropTable;
    use oxide_shape_core::SqlValue;
    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    struct Script {
        log: Vec<String>,
        fail_commit: bool,
        fail_rollback: bool,
    }

    struct Scripted(Arc<Mutex<Script>>);

    impl Driver for Scripted {
        fn execute(&mut self, sql: &str, _params: &[SqlValue]) -> Result<ExecStatus> {
            self.0.lock().log.push(sql.to_string());
            Ok(ExecStatus {
                rows_affected: 1,
                last_insert_id: 9,
            })
        }

        fn query(&mut self, sql: &str, _params: &[SqlValue]) -> Result<Vec<Row>> {
            self.0.lock().log.push(sql.to_string());
            Ok(Vec::new())
        }

        fn begin(&mut self) -> Result<()> {
            self.0.lock().log.push(String::from("BEGIN"));
            Ok(())
        }

        fn commit(&mut self) -> Result<()> {
            let mut script = self.0.lock();
            script.log.push(String::from("COMMIT"));
            if script.fail_commit {
                return Err(DatabaseError::Driver(sqlx::Error::PoolClosed));
            }
            Ok(())
        }

        fn rollback(&mut self) -> Result<()> {
            let mut script = self.0.lock();
            script.log.push(String::from("ROLLBACK"));
            if script.fail_rollback {
                return Err(DatabaseError::Driver(sqlx::Error::PoolClosed));
            }
            Ok(())
        }
    }

    fn scripted() -> (Transport, Arc<Mutex<Script>>) {
        let script = Arc::new(Mutex::new(Script::default()));
        let driver = Box::new(Scripted(Arc::clone(&script)));
        (Transport::with_driver(Dialect::Sqlite, driver), script)
    }

    fn drop_t() -> DropTable {
        DropTable::new().name("t")
    }

    #[test]
    fn test_open_close_errors() {
        let (transport, script) = scripted();
        assert!(transport.is_open());
        let err = transport
            .open(Box::new(Scripted(Arc::clone(&script))))
            .unwrap_err();
        assert!(matches!(err, DatabaseError::AlreadyOpen));

        transport.close().unwrap();
        assert!(!transport.is_open());
        assert!(matches!(transport.close(), Err(DatabaseError::AlreadyClosed)));
        assert!(matches!(
            transport.lock().execute(&drop_t()),
            Err(DatabaseError::AlreadyClosed)
        ));
    }

    #[test]
    fn test_nested_transaction_commits_once() {
        let (transport, script) = scripted();
        let session = transport.lock();
        session
            .transaction(|s| {
                s.execute(&drop_t())?;
                let inner = transport.lock();
                inner.transaction(|i| i.execute(&drop_t()))?;
                assert_eq!(s.depth(), 1);
                Ok(())
            })
            .unwrap();
        assert_eq!(session.depth(), 0);
        assert_eq!(session.status().rows_affected, 2);
        assert_eq!(session.status().last_insert_id, 9);
        assert_eq!(
            script.lock().log,
            vec!["BEGIN", "DROP TABLE `t`", "DROP TABLE `t`", "COMMIT"]
        );
    }

    #[test]
    fn test_nested_rollback_aborts_outer_commit() {
        let (transport, script) = scripted();
        let session = transport.lock();
        session.begin().unwrap();
        session.begin().unwrap();
        session.rollback().unwrap();
        let err = session.commit().unwrap_err();
        assert!(matches!(err, DatabaseError::TransactionAborted));
        assert_eq!(script.lock().log, vec!["BEGIN", "ROLLBACK"]);
    }

    #[test]
    fn test_commit_without_transaction() {
        let (transport, _) = scripted();
        let session = transport.lock();
        assert!(matches!(session.commit(), Err(DatabaseError::TransactionClosed)));
        assert!(matches!(session.rollback(), Err(DatabaseError::TransactionClosed)));
    }

    #[test]
    fn test_failed_commit_rolls_back() {
        let (transport, script) = scripted();
        script.lock().fail_commit = true;
        let session = transport.lock();
        session.begin().unwrap();
        let err = session.commit().unwrap_err();
        assert!(matches!(err, DatabaseError::Driver(_)));
        assert_eq!(script.lock().log, vec!["BEGIN", "COMMIT", "ROLLBACK"]);
    }

    #[test]
    fn test_failed_commit_and_rollback_is_unknown() {
        let (transport, script) = scripted();
        {
            let mut script = script.lock();
            script.fail_commit = true;
            script.fail_rollback = true;
        }
        let session = transport.lock();
        session.begin().unwrap();
        assert!(matches!(
            session.commit(),
            Err(DatabaseError::TransactionStateUnknown)
        ));
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let (transport, script) = scripted();
        let session = transport.lock();
        let err = session
            .transaction(|s| -> Result<()> {
                s.execute(&drop_t())?;
                Err(DatabaseError::NotDeleted(String::from("t")))
            })
            .unwrap_err();
        assert!(matches!(err, DatabaseError::NotDeleted(_)));
        assert_eq!(
            script.lock().log,
            vec!["BEGIN", "DROP TABLE `t`", "ROLLBACK"]
        );
    }

    #[test]
    fn test_panic_in_transaction_rolls_back() {
        let (transport, script) = scripted();
        let session = transport.lock();
        let unwound = panic::catch_unwind(AssertUnwindSafe(|| {
            session.transaction(|s| -> Result<()> {
                s.execute(&drop_t())?;
                s.transaction(|_| -> Result<()> { panic!("body failure") })
            })
        }));
        assert!(unwound.is_err());
        assert_eq!(session.depth(), 0);
        assert_eq!(
            script.lock().log,
            vec!["BEGIN", "DROP TABLE `t`", "ROLLBACK"]
        );

        session.transaction(|s| s.execute(&drop_t())).unwrap();
        assert_eq!(
            script.lock().log[3..],
            ["BEGIN", "DROP TABLE `t`", "COMMIT"]
        );
    }

    #[test]
    fn test_close_rolls_back_open_transaction() {
        let (transport, script) = scripted();
        transport.lock().begin().unwrap();
        transport.close().unwrap();
        assert_eq!(script.lock().log, vec!["BEGIN", "ROLLBACK"]);
    }
}
