//! # Core Runtime Module
//!
//! Provides the ambient runtime infrastructure shared by the decode pipeline:
//! - Logging and tracing infrastructure
//! - Forwarding of log events to the host application
//! - Decoder lifecycle event bus
//!
//! ## Overview
//!
//! Nothing in here is audio specific. It establishes the logging conventions
//! and the event broadcasting mechanism used by `core-decode`, so hosts can
//! surface decoder failures in whatever UI or log they own.

pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
