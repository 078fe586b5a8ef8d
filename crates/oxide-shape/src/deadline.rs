//! Caller-side deadlines.
//!
//! The operation runs on a worker thread. When the deadline elapses first the
//! caller gets [`DatabaseError::Cancelled`]; the worker is not interrupted,
//! it runs to completion and its result is dropped.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::error::{DatabaseError, Result};

/// Runs `op` and waits at most `timeout` for its result.
///
/// # Errors
///
/// - the error returned by `op`
/// - [`DatabaseError::Cancelled`] if `timeout` elapsed first
/// - [`DatabaseError::Panicked`] if `op` panicked
/// - [`DatabaseError::Io`] if the worker thread cannot be spawned
pub fn with_deadline<T, F>(timeout: Duration, op: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel(1);
    thread::Builder::new()
        .name(String::from("oxide-shape-deadline"))
        .spawn(move || {
            // The receiver is gone once the caller gave up.
            let _ = tx.send(op());
        })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            warn!(timeout_ms = timeout.as_millis(), "Deadline elapsed");
            Err(DatabaseError::Cancelled)
        }
        Err(RecvTimeoutError::Disconnected) => Err(DatabaseError::Panicked),
    }
}
