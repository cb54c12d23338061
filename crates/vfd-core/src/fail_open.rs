//! Fail-open utilities for graceful degradation
//!
//! Telemetry, frame captures, diagnostics and state persistence must never
//! take the pipeline down. Route those side effects through these helpers.
//!
//! DO NOT use fail-open for:
//! - Sanitization or sandbox validation (correctness)
//! - Queue operations (ordering and backpressure)

use std::future::Future;
use tracing::warn;

use crate::Result;

/// Execute an async operation that should fail open
///
/// Logs the error via `tracing::warn!` on failure and returns `None`.
///
/// ```no_run
/// use vfd_core::fail_open::fail_open;
/// use vfd_core::Result;
///
/// async fn append_event() -> Result<()> {
///     Ok(())
/// }
///
/// async fn example() {
///     let result = fail_open("telemetry", || append_event()).await;
///     // result is None if append_event() failed
/// }
/// ```
pub async fn fail_open<F, Fut, T>(operation_name: &str, f: F) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match f().await {
        Ok(val) => Some(val),
        Err(e) => {
            warn!("{} failed (fail-open): {}", operation_name, e);
            None
        }
    }
}

/// Blocking counterpart of [`fail_open`] for synchronous side effects
pub fn fail_open_blocking<F, T>(operation_name: &str, f: F) -> Option<T>
where
    F: FnOnce() -> Result<T>,
{
    match f() {
        Ok(val) => Some(val),
        Err(e) => {
            warn!("{} failed (fail-open): {}", operation_name, e);
            None
        }
    }
}
