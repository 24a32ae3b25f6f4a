//! Workspace facade crate.
//!
//! Exposes feature flags that map to the individual workspace crates, so host
//! applications can depend on `zero-audio` alone instead of wiring
//! `core-decode`, `core-runtime` and `core-async` individually.
//!
//! - `runtime`: the worker runtime abstraction (`core-async`)
//! - `support`: logging and the decoder event bus (`core-runtime`)
//! - `decode` (default): the decode pipeline (`core-decode`)

#[cfg(feature = "runtime")]
pub use core_async as runtime;

#[cfg(feature = "support")]
pub use core_runtime as support;
#[cfg(feature = "support")]
pub use core_runtime::events::{DecoderEvent, EventBus};
#[cfg(feature = "support")]
pub use core_runtime::logging::{init_logging, LoggingConfig};

#[cfg(feature = "decode")]
pub use core_decode as decode;
#[cfg(feature = "decode")]
pub use core_decode::{
    DecodeError, DecodeScheduler, DecodedFrameBlock, DecoderConfig, FileDecoder, FileEncoder,
    SchedulerConfig, SourceMode,
};

#[cfg(all(test, feature = "decode"))]
mod tests {
    use super::*;

    #[test]
    fn test_default_features_expose_pipeline() {
        let scheduler = DecodeScheduler::new(SchedulerConfig::default()).unwrap();
        let scheduler = scheduler.with_event_bus(EventBus::new(4));
        assert!(scheduler.event_bus().is_some());
        assert!(runtime::runtime::try_current().is_none());

        let bytes = FileEncoder::new(1).unwrap().encode(&[0.5; 10]).unwrap();
        let header = decode::format::parse_header(&bytes).unwrap();
        assert_eq!(header.channels, 1);
        assert!(DecoderConfig::default().validate().is_ok());
    }
}
