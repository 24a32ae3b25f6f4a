//! # Decoder Configuration
//!
//! Configuration and statistics types for file decoders.

use crate::error::{DecodeError, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Output sample rates the built-in codec can be created against.
pub const SUPPORTED_SAMPLE_RATES: &[u32] = &[8_000, 12_000, 16_000, 24_000, 44_100, 48_000];

/// How the compressed data reaches the decode workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Whole file read into memory at construction.
    Buffered,
    /// File read packet by packet from disk on the worker.
    Streamed,
}

impl SourceMode {
    pub fn is_streamed(&self) -> bool {
        matches!(self, SourceMode::Streamed)
    }
}

/// File decoder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Sample rate the channel decoders are created against.
    ///
    /// Default: 48 kHz.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Maximum number of decoded blocks waiting for the consumer.
    ///
    /// When the queue is full, decode requests are deferred without touching
    /// the read position, so nothing is dropped.
    ///
    /// Default: 32 blocks (~640ms at 20ms per block).
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// How long reset and close wait for outstanding decode work.
    ///
    /// Default: 2 seconds.
    #[serde(default = "default_reset_wait_timeout")]
    pub reset_wait_timeout: Duration,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            queue_capacity: default_queue_capacity(),
            reset_wait_timeout: default_reset_wait_timeout(),
        }
    }
}

impl DecoderConfig {
    /// Small queue for interactive sounds that are reset often.
    pub fn low_latency() -> Self {
        Self {
            queue_capacity: 4,
            reset_wait_timeout: Duration::from_millis(250),
            ..Default::default()
        }
    }

    /// Large queue for long music tracks streamed from slow storage.
    pub fn high_capacity() -> Self {
        Self {
            queue_capacity: 256,
            ..Default::default()
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_reset_wait_timeout(mut self, timeout: Duration) -> Self {
        self.reset_wait_timeout = timeout;
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(DecodeError::InvalidConfig(
                "sample_rate must be > 0".to_string(),
            ));
        }

        if self.queue_capacity == 0 {
            return Err(DecodeError::InvalidConfig(
                "queue_capacity must be > 0".to_string(),
            ));
        }

        if self.reset_wait_timeout.is_zero() {
            return Err(DecodeError::InvalidConfig(
                "reset_wait_timeout must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_sample_rate() -> u32 {
    48_000
}

fn default_queue_capacity() -> usize {
    32
}

fn default_reset_wait_timeout() -> Duration {
    Duration::from_secs(2)
}

// ============================================================================
// Statistics
// ============================================================================

/// Snapshot of a decoder's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Blocks pushed onto the packet queue.
    pub blocks_produced: u64,
    /// Frames (samples per channel) pushed onto the packet queue.
    pub frames_produced: u64,
    /// Packets that produced silence instead of audio.
    pub soft_errors: u64,
    /// Decode requests postponed because the queue was full.
    pub deferred_steps: u64,
    /// Number of stream resets.
    pub resets: u64,
}

impl DecoderStats {
    /// Fraction of produced blocks that were affected by soft errors.
    pub fn soft_error_ratio(&self) -> f64 {
        if self.blocks_produced == 0 {
            return 0.0;
        }
        self.soft_errors as f64 / self.blocks_produced as f64
    }
}

/// Counters written by decode workers and read by the owner.
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    blocks_produced: AtomicU64,
    frames_produced: AtomicU64,
    soft_errors: AtomicU64,
    deferred_steps: AtomicU64,
    resets: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn record_block(&self, frames: usize) {
        self.blocks_produced.fetch_add(1, Ordering::Relaxed);
        self.frames_produced
            .fetch_add(frames as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_soft_error(&self) {
        self.soft_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_deferred(&self) {
        self.deferred_steps.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reset(&self) {
        self.resets.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> DecoderStats {
        DecoderStats {
            blocks_produced: self.blocks_produced.load(Ordering::Relaxed),
            frames_produced: self.frames_produced.load(Ordering::Relaxed),
            soft_errors: self.soft_errors.load(Ordering::Relaxed),
            deferred_steps: self.deferred_steps.load(Ordering::Relaxed),
            resets: self.resets.load(Ordering::Relaxed),
        }
    }
}
