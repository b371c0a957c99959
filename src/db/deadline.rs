use rusqlite::Connection;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::DbError;

/// VM instructions between deadline checks
const CHECK_INTERVAL_OPS: i32 = 1_000;

/// Run `work` against `conn`, aborting its statements once `timeout` passes.
///
/// The clock starts here, so callers must already hold the connection; time
/// spent waiting for it is not charged. Expiry is checked from the engine's
/// progress callback, which only fires for statements `work` runs, and is
/// reported as `DbError::Timeout`.
pub fn run_with_deadline<T, F>(conn: &Connection, timeout: Duration, work: F) -> Result<T, DbError>
where
    F: FnOnce(&Connection) -> Result<T, DbError>,
{
    let deadline = Instant::now() + timeout;
    let expired = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&expired);

    conn.progress_handler(
        CHECK_INTERVAL_OPS,
        Some(move || {
            let past = Instant::now() >= deadline;
            if past {
                flag.store(true, Ordering::Relaxed);
            }
            past
        }),
    );
    let _reset = ResetProgressHandler(conn);

    match work(conn) {
        Err(_) if expired.load(Ordering::Relaxed) => Err(DbError::Timeout(timeout)),
        outcome => outcome,
    }
}

/// Removes the progress callback when the guarded call ends
struct ResetProgressHandler<'a>(&'a Connection);

impl Drop for ResetProgressHandler<'_> {
    fn drop(&mut self) {
        self.0.progress_handler(0, None::<fn() -> bool>);
    }
}
