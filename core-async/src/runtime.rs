//! Runtime utilities that abstract over the underlying executor.
//!
//! We wrap Tokio's runtime primitives so that downstream crates never need to
//! depend on Tokio directly. [`WorkerRuntime`] is the pool that decode tasks
//! run on; hosts that already own a Tokio runtime can hand its [`Handle`] to
//! the scheduler instead.

use std::io;
use std::time::Duration;
use tracing::{debug, warn};

pub use tokio::runtime::{Builder, Handle, Runtime};

/// Runs the provided future to completion on a lightweight current-thread
/// runtime.
///
/// # Errors
///
/// Returns an error if the runtime cannot be built.
pub fn block_on<F>(future: F) -> io::Result<F::Output>
where
    F: std::future::Future,
{
    let runtime = Builder::new_current_thread().enable_all().build()?;
    Ok(runtime.block_on(future))
}

/// Returns the handle of the runtime the current thread belongs to, if any.
pub fn try_current() -> Option<Handle> {
    Handle::try_current().ok()
}

/// A multi-threaded runtime whose blocking pool runs decode work.
pub struct WorkerRuntime {
    runtime: Option<Runtime>,
    handle: Handle,
    shutdown_timeout: Duration,
}

impl WorkerRuntime {
    /// Start configuring a new worker runtime.
    pub fn builder() -> WorkerRuntimeBuilder {
        WorkerRuntimeBuilder::default()
    }

    /// Handle used to spawn work onto this runtime.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Shut the runtime down, waiting at most `timeout` for running tasks.
    pub fn shutdown(mut self, timeout: Duration) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_timeout(timeout);
        }
    }
}

impl Drop for WorkerRuntime {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            if try_current().is_some() {
                // Dropping a runtime from inside an async context panics.
                warn!("WorkerRuntime dropped inside an async context, shutting down in background");
                runtime.shutdown_background();
            } else {
                runtime.shutdown_timeout(self.shutdown_timeout);
            }
        }
    }
}

/// Builder for [`WorkerRuntime`].
#[derive(Debug, Clone)]
pub struct WorkerRuntimeBuilder {
    worker_threads: usize,
    max_blocking_threads: usize,
    thread_name: String,
    shutdown_timeout: Duration,
}

impl Default for WorkerRuntimeBuilder {
    fn default() -> Self {
        Self {
            worker_threads: 1,
            max_blocking_threads: 4,
            thread_name: "core-async-worker".to_string(),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl WorkerRuntimeBuilder {
    /// Number of async worker threads (clamped to at least one).
    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads.max(1);
        self
    }

    /// Upper bound on threads running blocking work (clamped to at least one).
    pub fn max_blocking_threads(mut self, threads: usize) -> Self {
        self.max_blocking_threads = threads.max(1);
        self
    }

    /// Prefix for thread names, useful in logs and profilers.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// How long dropping the runtime waits for in-flight work.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Build the runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS refuses to spawn the worker threads.
    pub fn build(self) -> io::Result<WorkerRuntime> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(self.worker_threads)
            .max_blocking_threads(self.max_blocking_threads)
            .thread_name(self.thread_name.clone())
            .enable_all()
            .build()?;

        debug!(
            worker_threads = self.worker_threads,
            max_blocking_threads = self.max_blocking_threads,
            thread_name = %self.thread_name,
            "Worker runtime started"
        );

        let handle = runtime.handle().clone();
        Ok(WorkerRuntime {
            runtime: Some(runtime),
            handle,
            shutdown_timeout: self.shutdown_timeout,
        })
    }
}
