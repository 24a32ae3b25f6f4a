//! # Decode Scheduler
//!
//! Runs decode work on the blocking pool of a dedicated worker runtime.
//!
//! A decoder never has more than one worker at a time. Requests made while a
//! worker is already running for that decoder are counted by its
//! [`LifetimeGuard`](crate::lifetime::LifetimeGuard) and served by the same
//! worker, one decode step per request, in order.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use core_decode::{DecodeScheduler, FileDecoder, SchedulerConfig, SourceMode};
//!
//! let scheduler = DecodeScheduler::new(SchedulerConfig::default()).unwrap();
//! let (decoder, mut blocks) =
//!     FileDecoder::open_default("music.zs", SourceMode::Streamed, &scheduler).unwrap();
//!
//! decoder.schedule_decode().unwrap();
//! ```

use crate::error::{DecodeError, Result};
use core_async::runtime::{Handle, WorkerRuntime};
use core_runtime::events::{DecoderEvent, EventBus};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

/// Worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Threads available for decode work.
    ///
    /// Default: 2
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// Name given to the worker threads.
    ///
    /// Default: `"audio-decode"`
    #[serde(default = "default_thread_name")]
    pub thread_name: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
            thread_name: default_thread_name(),
        }
    }
}

impl SchedulerConfig {
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_threads == 0 {
            return Err(DecodeError::InvalidConfig(
                "worker_threads must be > 0".to_string(),
            ));
        }

        if self.thread_name.is_empty() {
            return Err(DecodeError::InvalidConfig(
                "thread_name must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn default_worker_threads() -> usize {
    2
}

fn default_thread_name() -> String {
    "audio-decode".to_string()
}

/// Shared handle to the decode worker pool.
///
/// Cloning is cheap; all clones dispatch onto the same runtime, which shuts
/// down when the last clone is dropped.
#[derive(Clone)]
pub struct DecodeScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    handle: Handle,
    runtime: Option<WorkerRuntime>,
    in_flight: Arc<AtomicUsize>,
    events: OnceLock<EventBus>,
}

impl DecodeScheduler {
    /// Build a dedicated worker runtime.
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        config.validate()?;

        let runtime = WorkerRuntime::builder()
            .worker_threads(1)
            .max_blocking_threads(config.worker_threads)
            .thread_name(config.thread_name.clone())
            .build()
            .map_err(|e| DecodeError::SchedulerError(e.to_string()))?;

        info!(
            workers = config.worker_threads,
            thread_name = %config.thread_name,
            "Decode scheduler started"
        );

        Ok(Self {
            inner: Arc::new(SchedulerInner {
                handle: runtime.handle().clone(),
                runtime: Some(runtime),
                in_flight: Arc::new(AtomicUsize::new(0)),
                events: OnceLock::new(),
            }),
        })
    }

    /// Dispatch onto a runtime owned by the host.
    pub fn from_handle(handle: Handle) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                handle,
                runtime: None,
                in_flight: Arc::new(AtomicUsize::new(0)),
                events: OnceLock::new(),
            }),
        }
    }

    /// Publish the lifecycle of every decoder opened through this scheduler.
    ///
    /// Only the first bus attached is kept. Decoders opened before it was
    /// attached stay silent.
    pub fn with_event_bus(self, bus: EventBus) -> Self {
        if self.inner.events.set(bus).is_err() {
            warn!("Decode scheduler already has an event bus");
        }
        self
    }

    pub fn handle(&self) -> &Handle {
        &self.inner.handle
    }

    pub fn event_bus(&self) -> Option<&EventBus> {
        self.inner.events.get()
    }

    /// Workers currently queued or running, across all decoders.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Returns `true` if the scheduler owns its runtime.
    pub fn owns_runtime(&self) -> bool {
        self.inner.runtime.is_some()
    }

    /// Run `work` on the blocking pool. It always runs to completion.
    pub fn dispatch<F>(&self, work: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let in_flight = self.inner.in_flight.clone();
        let queued = in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(in_flight = queued, "Dispatching decode worker");

        drop(core_async::spawn_blocking_on(&self.inner.handle, move || {
            work();
            in_flight.fetch_sub(1, Ordering::AcqRel);
        }));
    }

    pub(crate) fn emit(&self, event: DecoderEvent) {
        emit_event(self.inner.events.get(), event);
    }
}

impl std::fmt::Debug for DecodeScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeScheduler")
            .field("owns_runtime", &self.owns_runtime())
            .field("in_flight", &self.in_flight())
            .field("events", &self.inner.events.get().is_some())
            .finish()
    }
}

/// Publish to an optional bus. Having no subscribers is not an error.
pub(crate) fn emit_event(bus: Option<&EventBus>, event: DecoderEvent) {
    if let Some(bus) = bus {
        let _ = bus.emit(event);
    }
}
