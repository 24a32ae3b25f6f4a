//! Synchronization primitives.
//!
//! Re-exports the Tokio broadcast channel behind the decoder event bus. Its
//! send half is not async, so blocking decode workers can publish into it
//! without entering an async context.

pub use tokio::sync::broadcast;
