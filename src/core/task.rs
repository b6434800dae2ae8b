//! Running query work from async code
//!
//! Connections and queries block on the database. Async callers hand that work
//! to tokio's blocking pool instead of stalling a runtime worker.

use super::error::{DatabaseError, Result};

/// Run blocking database work on the blocking thread pool.
///
/// There is no timeout; the work runs until the driver returns.
///
/// # Example
///
/// ```rust,no_run
/// use dbquery::core::task::run_blocking;
///
/// # async fn example() -> dbquery::Result<()> {
/// let rows = run_blocking(|| Ok(42u64)).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_blocking<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DatabaseError::other(format!("Task join error: {}", e)))?
}
