//! Best-effort execution boundary.
//!
//! Side effects behind this boundary (notification dispatch, live delivery)
//! are attempted once. Failures are logged and suppressed so they never
//! fail or roll back the operation that triggered them.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::warn;

/// Log and swallow a failed best-effort result.
pub fn suppress<T, E: Display>(operation: &'static str, result: Result<T, E>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(operation, error = %e, "best-effort operation failed, suppressed");
            None
        }
    }
}

/// Bounded fire-and-forget task spawner.
///
/// At most `limit` best-effort tasks run at once. When every permit is
/// taken the task is dropped (with a warning) instead of queueing, so no
/// backpressure ever reaches the caller.
#[derive(Clone)]
pub struct BestEffortRunner {
    permits: Arc<Semaphore>,
}

impl BestEffortRunner {
    pub fn new(limit: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(limit.max(1))),
        }
    }

    /// Spawn `fut` if a permit is free.
    ///
    /// Returns `None` when the task was dropped. Dropping the returned
    /// handle detaches the task; it still runs to completion.
    pub fn spawn<T, F>(&self, operation: &'static str, fut: F) -> Option<JoinHandle<T>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => Some(tokio::spawn(async move {
                let _permit = permit;
                fut.await
            })),
            Err(_) => {
                warn!(operation, "best-effort task limit reached, task dropped");
                None
            }
        }
    }

    /// Permits currently free.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

impl std::fmt::Debug for BestEffortRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BestEffortRunner")
            .field("available", &self.available())
            .finish()
    }
}
