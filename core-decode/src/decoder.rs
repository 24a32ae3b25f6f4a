//! # File Decoder
//!
//! Owner-facing handle of one decoding pipeline instance.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐ schedule_decode ┌──────────────────┐  push  ┌───────────────┐
//! │ FileDecoder  ├────────────────>│ Decode worker    ├───────>│ BlockConsumer │
//! │ (owner)      │                 │ (blocking pool)  │        │ (real-time)   │
//! └──────┬───────┘                 └────────┬─────────┘        └───────────────┘
//!        │        Arc<DecoderShared>        │
//!        └──────────────┬───────────────────┘
//!                       ▼
//!        LifetimeGuard · StreamEpoch · stats · DecoderCore
//! ```
//!
//! The [`LifetimeGuard`] admits at most one worker per instance, so the
//! `DecoderCore` lock is never contended by two workers. The owner only takes
//! it after waiting for the instance to go idle.
//!
//! Decoder state needs no mutual exclusion: exactly one thread touches it at
//! any time. The `parking_lot::Mutex` around it is still kept, deliberately,
//! because it is the safe-Rust handoff of `&mut DecoderCore` between the
//! owner and the worker. It is never waited on.
//!
//! Dropping a `FileDecoder` never blocks. If decode work is still pending, the
//! last worker to finish releases the file, the channel decoders and the
//! producer end of the queue.

use crate::channels::ChannelBank;
use crate::codec::{default_factory, CodecFactory};
use crate::config::{DecoderConfig, DecoderStats, SourceMode, StatsCounters};
use crate::error::{DecodeError, Result};
use crate::format::FileHeader;
use crate::lifetime::LifetimeGuard;
use crate::queue::{block_queue_with_epoch, BlockConsumer, BlockProducer, StreamEpoch};
use crate::scheduler::{emit_event, DecodeScheduler};
use crate::source::{PacketRead, PacketSource};
use core_runtime::events::{DecoderEvent, EventBus, ReleasedBy};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// Spins before the idle wait starts sleeping.
const IDLE_SPIN_LIMIT: u32 = 64;
const IDLE_SLEEP: Duration = Duration::from_micros(200);

/// What one decode step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StepOutcome {
    /// A block was pushed onto the queue.
    Produced { frames: usize },
    /// The queue was full; nothing was read.
    Deferred,
    /// The stream is closed.
    Closed,
    /// The read cursor is at the end of the data.
    Exhausted,
}

/// State only touched by the worker serving requests, or by the owner while
/// the instance is idle.
pub(crate) struct DecoderCore {
    source: PacketSource,
    bank: ChannelBank,
    producer: BlockProducer,
    frames: Vec<usize>,
}

impl DecoderCore {
    /// Decode one packet per channel and queue the interleaved block.
    pub(crate) fn step(&mut self, stats: &StatsCounters) -> StepOutcome {
        if !self.source.is_open() {
            return StepOutcome::Closed;
        }
        if self.source.is_exhausted() {
            return StepOutcome::Exhausted;
        }
        if !self.producer.has_room() {
            stats.record_deferred();
            return StepOutcome::Deferred;
        }

        for channel in 0..self.frames.len() {
            let frames = match self.source.next_packet() {
                PacketRead::Audio(packet) => self.bank.decode(channel, packet),
                PacketRead::Skipped | PacketRead::Truncated => 0,
            };
            if frames == 0 {
                stats.record_soft_error();
            }
            self.frames[channel] = frames;
        }

        let block = self.bank.interleave(&self.frames);
        let frames = block.frame_count();
        if self.producer.push(block).is_err() {
            // Room was checked above and this is the only producer.
            warn!("Packet queue full after room check, block dropped");
            return StepOutcome::Deferred;
        }
        stats.record_block(frames);

        StepOutcome::Produced { frames }
    }
}

/// State shared between the owner and decode workers.
pub(crate) struct DecoderShared {
    file: String,
    guard: LifetimeGuard,
    core: Mutex<Option<DecoderCore>>,
    stats: StatsCounters,
    epoch: Arc<StreamEpoch>,
    stream_open: AtomicBool,
    position: AtomicUsize,
    events: Option<EventBus>,
}

impl DecoderShared {
    /// Worker body: one decode step per outstanding request.
    fn serve_requests(&self) {
        loop {
            if !self.guard.is_retired() {
                self.run_step();
            }

            let completion = self.guard.finish_task();
            if completion.disposal.is_release() {
                self.release(ReleasedBy::Worker);
                return;
            }
            if completion.remaining == 0 {
                return;
            }
        }
    }

    fn run_step(&self) {
        let (outcome, reached_end) = {
            let mut core = self.core.lock();
            let Some(core) = core.as_mut() else {
                return;
            };
            let outcome = core.step(&self.stats);
            self.position
                .store(core.source.position(), Ordering::Release);
            (
                outcome,
                core.source.is_open() && core.source.is_exhausted(),
            )
        };

        match outcome {
            StepOutcome::Produced { frames } => debug!(file = %self.file, frames, "Decoded block"),
            StepOutcome::Deferred => debug!(file = %self.file, "Packet queue full, step deferred"),
            StepOutcome::Closed | StepOutcome::Exhausted => {}
        }

        if reached_end && self.epoch.mark_end_of_stream() {
            info!(file = %self.file, "End of stream reached");
            self.emit(DecoderEvent::EndOfStream {
                file: self.file.clone(),
            });
        }
    }

    /// Drop the file, the channel decoders and the queue producer.
    fn release(&self, by: ReleasedBy) {
        let core = self.core.lock().take();
        if let Some(core) = core {
            drop(core);
            debug!(file = %self.file, ?by, "Decoder released");
            self.emit(DecoderEvent::Released {
                file: self.file.clone(),
                by,
            });
        }
    }

    fn emit(&self, event: DecoderEvent) {
        emit_event(self.events.as_ref(), event);
    }
}

/// Owner handle of a decoding pipeline instance.
///
/// Construction hands back the [`BlockConsumer`] for the real-time side.
pub struct FileDecoder {
    shared: Arc<DecoderShared>,
    scheduler: DecodeScheduler,
    config: DecoderConfig,
    header: FileHeader,
    mode: SourceMode,
    path: PathBuf,
}

impl FileDecoder {
    /// Open `path` and build a decoder for it.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid, the file cannot be read, the
    /// header is malformed, or a channel decoder cannot be created. Nothing
    /// is kept on failure.
    #[instrument(skip_all, fields(path = %path.as_ref().display(), ?mode))]
    pub fn open(
        path: impl AsRef<Path>,
        mode: SourceMode,
        config: DecoderConfig,
        factory: Arc<dyn CodecFactory>,
        scheduler: &DecodeScheduler,
    ) -> Result<(Self, BlockConsumer)> {
        let path = path.as_ref();

        match Self::build(path, mode, config, factory, scheduler) {
            Ok((decoder, consumer)) => {
                info!(
                    channels = decoder.header.channels,
                    samples_per_channel = decoder.header.samples_per_channel,
                    "Opened audio file"
                );
                scheduler.emit(DecoderEvent::Opened {
                    file: decoder.shared.file.clone(),
                    channels: decoder.header.channels,
                    samples_per_channel: decoder.header.samples_per_channel,
                    streamed: mode.is_streamed(),
                });
                Ok((decoder, consumer))
            }
            Err(e) => {
                error!("Failed to open audio file: {}", e);
                scheduler.emit(DecoderEvent::OpenFailed {
                    file: path.display().to_string(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Open with the built-in codec and default configuration.
    pub fn open_default(
        path: impl AsRef<Path>,
        mode: SourceMode,
        scheduler: &DecodeScheduler,
    ) -> Result<(Self, BlockConsumer)> {
        Self::open(
            path,
            mode,
            DecoderConfig::default(),
            default_factory(),
            scheduler,
        )
    }

    fn build(
        path: &Path,
        mode: SourceMode,
        config: DecoderConfig,
        factory: Arc<dyn CodecFactory>,
        scheduler: &DecodeScheduler,
    ) -> Result<(Self, BlockConsumer)> {
        config.validate()?;

        let source = PacketSource::open(path, mode)?;
        let header = source.header();
        let bank = ChannelBank::new(factory, config.sample_rate, header.channels)?;
        debug!(
            codec = bank.codec_name(),
            sample_rate = config.sample_rate,
            "Created channel decoders"
        );

        let epoch = Arc::new(StreamEpoch::default());
        let (producer, consumer) = block_queue_with_epoch(config.queue_capacity, epoch.clone());
        let position = source.position();

        let shared = Arc::new(DecoderShared {
            file: path.display().to_string(),
            guard: LifetimeGuard::new(),
            core: Mutex::new(Some(DecoderCore {
                source,
                bank,
                producer,
                frames: vec![0; header.channels as usize],
            })),
            stats: StatsCounters::default(),
            epoch,
            stream_open: AtomicBool::new(true),
            position: AtomicUsize::new(position),
            events: scheduler.event_bus().cloned(),
        });

        Ok((
            Self {
                shared,
                scheduler: scheduler.clone(),
                config,
                header,
                mode,
                path: path.to_path_buf(),
            },
            consumer,
        ))
    }

    /// Request one more decoded block.
    ///
    /// Returns `Ok(false)` if the request was refused because the instance
    /// is being released.
    pub fn schedule_decode(&self) -> Result<bool> {
        if !self.is_stream_open() {
            return Err(DecodeError::StreamClosed);
        }

        match self.shared.guard.begin_task() {
            None => Ok(false),
            Some(true) => {
                let shared = self.shared.clone();
                self.scheduler.dispatch(move || shared.serve_requests());
                Ok(true)
            }
            Some(false) => Ok(true),
        }
    }

    /// Restart decoding from the first packet.
    ///
    /// Waits for outstanding decode work, rewinds the source, recreates the
    /// channel decoders, discards queued blocks and requests the first
    /// block.
    #[instrument(skip(self), fields(file = %self.shared.file))]
    pub fn reset_stream(&mut self) -> Result<()> {
        self.wait_idle()?;

        let position = self.with_core(|core| {
            core.source.rewind()?;
            core.bank.recreate()?;
            Ok(core.source.position())
        })?;
        self.shared.position.store(position, Ordering::Release);

        self.shared.epoch.advance();
        self.shared.stats.record_reset();
        info!("Stream reset");
        self.shared.emit(DecoderEvent::StreamReset {
            file: self.shared.file.clone(),
        });

        self.schedule_decode()?;
        Ok(())
    }

    /// Close the stream and discard every queued block.
    #[instrument(skip(self), fields(file = %self.shared.file))]
    pub fn close_stream(&mut self) -> Result<()> {
        if !self.is_stream_open() {
            return Ok(());
        }
        self.wait_idle()?;

        self.with_core(|core| {
            core.source.close();
            Ok(())
        })?;
        self.shared.stream_open.store(false, Ordering::Release);
        self.shared.epoch.advance();

        info!("Stream closed");
        self.shared.emit(DecoderEvent::StreamClosed {
            file: self.shared.file.clone(),
        });
        Ok(())
    }

    /// Reopen a closed stream and reset it to the first packet.
    #[instrument(skip(self), fields(file = %self.shared.file))]
    pub fn open_stream(&mut self) -> Result<()> {
        self.wait_idle()?;

        self.with_core(|core| core.source.reopen())?;
        self.shared.stream_open.store(true, Ordering::Release);

        self.reset_stream()
    }

    pub fn is_stream_open(&self) -> bool {
        self.shared.stream_open.load(Ordering::Acquire)
    }

    pub fn header(&self) -> FileHeader {
        self.header
    }

    pub fn channels(&self) -> u16 {
        self.header.channels
    }

    pub fn mode(&self) -> SourceMode {
        self.mode
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Read cursor as a byte offset into the file, as of the last decode
    /// step.
    pub fn position(&self) -> usize {
        self.shared.position.load(Ordering::Acquire)
    }

    /// Decode requests not yet served.
    pub fn outstanding_tasks(&self) -> usize {
        self.shared.guard.outstanding()
    }

    pub fn stats(&self) -> DecoderStats {
        self.shared.stats.snapshot()
    }

    /// Returns `true` once every packet of the current stream was decoded.
    /// Blocks may still be waiting in the queue.
    pub fn is_end_of_stream(&self) -> bool {
        self.shared.epoch.is_end_of_stream()
    }

    /// Wait until no decode request is outstanding.
    fn wait_idle(&self) -> Result<()> {
        let start = Instant::now();
        let mut spins = 0u32;

        while !self.shared.guard.is_idle() {
            let waited = start.elapsed();
            if waited >= self.config.reset_wait_timeout {
                let outstanding = self.shared.guard.outstanding();
                warn!(outstanding, ?waited, "Decode work still outstanding");
                return Err(DecodeError::DecoderBusy {
                    outstanding,
                    waited,
                });
            }

            if spins < IDLE_SPIN_LIMIT {
                spins += 1;
                std::thread::yield_now();
            } else {
                std::thread::sleep(IDLE_SLEEP);
            }
        }
        Ok(())
    }

    fn with_core<T>(&self, f: impl FnOnce(&mut DecoderCore) -> Result<T>) -> Result<T> {
        let mut core = self.shared.core.lock();
        let core = core
            .as_mut()
            .ok_or_else(|| DecodeError::Internal("decoder already released".to_string()))?;
        f(core)
    }
}

impl Drop for FileDecoder {
    fn drop(&mut self) {
        if self.shared.guard.retire().is_release() {
            self.shared.release(ReleasedBy::Owner);
        } else {
            debug!(
                file = %self.shared.file,
                outstanding = self.shared.guard.outstanding(),
                "Decoder dropped with work outstanding, worker will release it"
            );
        }
    }
}

impl std::fmt::Debug for FileDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDecoder")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("header", &self.header)
            .field("outstanding", &self.outstanding_tasks())
            .field("stream_open", &self.is_stream_open())
            .finish()
    }
}
