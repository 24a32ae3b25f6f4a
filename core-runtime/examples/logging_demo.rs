//! Logging system demonstration
//!
//! Run with:
//! ```bash
//! # Pretty format (default in debug)
//! cargo run -p core-runtime --example logging_demo
//!
//! # JSON format
//! cargo run -p core-runtime --example logging_demo -- json
//!
//! # With custom filter
//! cargo run -p core-runtime --example logging_demo -- compact "logging_demo=trace"
//! ```

use core_runtime::logging::{init_logging, strip_path, LogEntry, LogFormat, LogLevel, LogSink, LoggingConfig};
use std::env;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Stands in for a host UI that shows decoder failures to the user.
struct ConsoleSink;

impl LogSink for ConsoleSink {
    fn log(&self, entry: LogEntry) {
        eprintln!("[host] {:?} {}: {}", entry.level, entry.target, entry.message);
    }

    fn min_level(&self) -> LogLevel {
        LogLevel::Warn
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();

    let format = match args.get(1).map(String::as_str) {
        Some("json") => LogFormat::Json,
        Some("compact") => LogFormat::Compact,
        Some("pretty") => LogFormat::Pretty,
        _ => LogFormat::default(),
    };

    let mut config = LoggingConfig::default()
        .with_format(format)
        .with_level(LogLevel::Trace)
        .with_thread_info(true)
        .with_log_sink(Arc::new(ConsoleSink));

    if let Some(filter) = args.get(2) {
        config = config.with_filter(filter.clone());
    }

    if let Err(e) = init_logging(config) {
        eprintln!("Failed to initialize logging: {}", e);
        return;
    }

    info!("Logging demo started");
    open_file("/home/user/sounds/ambience.zs");
    info!("Logging demo finished");
}

#[instrument]
fn open_file(path: &str) {
    debug!(file = %strip_path(path), "Opening audio file");
    warn!(file = %strip_path(path), "Packet header mismatch, producing silence");
    error!(file = %strip_path(path), "Audio file is an incorrect format");
}
