//! Task spawning abstractions.
//!
//! Decode work is CPU bound and performs synchronous file reads, so it is
//! always placed on a runtime's blocking pool rather than its async workers.
//!
//! # Examples
//!
//! ```rust
//! use core_async::runtime::WorkerRuntime;
//! use core_async::task;
//!
//! let runtime = WorkerRuntime::builder().build().unwrap();
//! let handle = task::spawn_blocking_on(runtime.handle(), || {
//!     // CPU-intensive work
//!     42
//! });
//! # drop(handle);
//! ```

use crate::runtime::Handle;

pub use tokio::task::{spawn_blocking, JoinError, JoinHandle};

/// Runs a blocking closure on the blocking pool of the given runtime.
///
/// The closure always runs to completion; dropping the returned handle
/// detaches it.
pub fn spawn_blocking_on<F, R>(handle: &Handle, f: F) -> JoinHandle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    handle.spawn_blocking(f)
}

/// Result type for task operations.
pub type Result<T> = std::result::Result<T, JoinError>;
