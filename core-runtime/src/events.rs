//! # Decoder Event Bus
//!
//! Broadcasts decoder lifecycle events over a `broadcast` channel, so the
//! owning system can react to decoders opening, failing, reaching the end of
//! their data or being released, without polling.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   emit    ┌───────────┐  subscribe   ┌────────────┐
//! │ Owner thread ├──────────>│           ├─────────────>│ Subscriber │
//! └──────────────┘           │ EventBus  │              └────────────┘
//! ┌──────────────┐   emit    │ (broadcast│  subscribe   ┌────────────┐
//! │ Decode worker├──────────>│  channel) ├─────────────>│ Subscriber │
//! └──────────────┘           └───────────┘              └────────────┘
//! ```
//!
//! Emitting never blocks, which makes it safe from decode workers. Slow
//! subscribers receive `RecvError::Lagged(n)` and keep going; `Closed` means
//! every sender was dropped.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{DecoderEvent, EventBus};
//!
//! let bus = EventBus::new(16);
//! let mut stream = bus.subscribe();
//!
//! bus.emit(DecoderEvent::StreamClosed { file: "music.zs".into() }).ok();
//! assert!(matches!(stream.try_recv(), Ok(DecoderEvent::StreamClosed { .. })));
//! ```

use core_async::sync::broadcast;
use serde::{Deserialize, Serialize};

pub use core_async::sync::broadcast::error::{RecvError, SendError, TryRecvError};
pub use core_async::sync::broadcast::Receiver;

pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 64;

/// Which side of the lifetime protocol released a decoder instance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReleasedBy {
    /// The owner dropped the decoder while no decode work was outstanding.
    Owner,
    /// The last outstanding decode task released it after the owner left.
    Worker,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum DecoderEvent {
    Opened {
        file: String,
        channels: u16,
        samples_per_channel: u32,
        streamed: bool,
    },
    OpenFailed {
        file: String,
        message: String,
    },
    StreamReset {
        file: String,
    },
    StreamClosed {
        file: String,
    },
    EndOfStream {
        file: String,
    },
    Released {
        file: String,
        by: ReleasedBy,
    },
}

impl DecoderEvent {
    pub fn description(&self) -> &str {
        match self {
            DecoderEvent::Opened { .. } => "Audio file opened for decoding",
            DecoderEvent::OpenFailed { .. } => "Audio file could not be opened",
            DecoderEvent::StreamReset { .. } => "Stream restarted from the beginning",
            DecoderEvent::StreamClosed { .. } => "Stream closed",
            DecoderEvent::EndOfStream { .. } => "All audio data decoded",
            DecoderEvent::Released { .. } => "Decoder released",
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            DecoderEvent::OpenFailed { .. } => EventSeverity::Error,
            DecoderEvent::Opened { .. } | DecoderEvent::EndOfStream { .. } => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// File the event refers to.
    pub fn file(&self) -> &str {
        match self {
            DecoderEvent::Opened { file, .. }
            | DecoderEvent::OpenFailed { file, .. }
            | DecoderEvent::StreamReset { file }
            | DecoderEvent::StreamClosed { file }
            | DecoderEvent::EndOfStream { file }
            | DecoderEvent::Released { file, .. } => file,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Broadcast channel for [`DecoderEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DecoderEvent>,
}

impl EventBus {
    /// Create a bus that buffers at most `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event to every current subscriber.
    ///
    /// Returns the number of subscribers that received it, or an error if
    /// there are none.
    pub fn emit(&self, event: DecoderEvent) -> Result<usize, SendError<DecoderEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<DecoderEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers_fails() {
        let bus = EventBus::new(4);
        let result = bus.emit(DecoderEvent::StreamReset {
            file: "a.zs".into(),
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_every_subscriber_receives_event() {
        let bus = EventBus::new(4);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let delivered = bus
            .emit(DecoderEvent::EndOfStream {
                file: "a.zs".into(),
            })
            .unwrap();
        assert_eq!(delivered, 2);

        assert_eq!(first.try_recv().unwrap().file(), "a.zs");
        assert_eq!(second.try_recv().unwrap().file(), "a.zs");
    }

    #[test]
    fn test_lagging_subscriber() {
        let bus = EventBus::new(2);
        let mut stream = bus.subscribe();

        for _ in 0..4 {
            bus.emit(DecoderEvent::StreamReset {
                file: "a.zs".into(),
            })
            .unwrap();
        }

        assert!(matches!(stream.try_recv(), Err(TryRecvError::Lagged(2))));
    }

    #[test]
    fn test_severity() {
        let failed = DecoderEvent::OpenFailed {
            file: "a.zs".into(),
            message: "bad magic".into(),
        };
        assert_eq!(failed.severity(), EventSeverity::Error);

        let released = DecoderEvent::Released {
            file: "a.zs".into(),
            by: ReleasedBy::Worker,
        };
        assert_eq!(released.severity(), EventSeverity::Debug);
        assert_eq!(released.description(), "Decoder released");
    }

    #[test]
    fn test_event_serialization() {
        let event = DecoderEvent::Released {
            file: "a.zs".into(),
            by: ReleasedBy::Owner,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"Released\""));
        assert!(json.contains("\"by\":\"owner\""));

        let back: DecoderEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
