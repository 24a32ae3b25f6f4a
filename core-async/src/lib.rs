//! Runtime abstraction layer for the audio decode pipeline.
//!
//! Decode work is synchronous (codec calls and blocking file reads), so it runs
//! on the blocking pool of a dedicated multi-threaded Tokio runtime. Downstream
//! crates go through this crate instead of depending on Tokio directly.
//!
//! # Modules
//!
//! - `runtime`: Building the worker runtime, `block_on`, runtime handles
//! - `task`: Spawning blocking work onto a runtime
//! - `sync`: Channel primitives shared across threads
//!
//! # Examples
//!
//! ```rust
//! use core_async::runtime::WorkerRuntime;
//!
//! let runtime = WorkerRuntime::builder()
//!     .worker_threads(2)
//!     .thread_name("audio-decode")
//!     .build()
//!     .unwrap();
//!
//! let handle = runtime.handle().clone();
//! let result = core_async::runtime::block_on(async move {
//!     core_async::task::spawn_blocking_on(&handle, || 40 + 2).await.unwrap()
//! })
//! .unwrap();
//! assert_eq!(result, 42);
//! ```

pub mod runtime;
pub mod sync;
pub mod task;

pub use runtime::{Handle, WorkerRuntime};
pub use task::spawn_blocking_on;
