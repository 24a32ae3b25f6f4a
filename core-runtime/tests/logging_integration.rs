//! Integration tests for the logging system

use core_runtime::logging::{init_logging, strip_path, LogEntry, LogFormat, LogLevel, LogSink, LoggingConfig};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct CollectingSink {
    entries: Mutex<Vec<LogEntry>>,
}

impl LogSink for CollectingSink {
    fn log(&self, entry: LogEntry) {
        self.entries.lock().unwrap().push(entry);
    }

    fn min_level(&self) -> LogLevel {
        LogLevel::Info
    }
}

#[test]
fn test_logging_configuration() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Json)
        .with_level(LogLevel::Debug)
        .with_thread_info(true);

    assert_eq!(config.format, LogFormat::Json);
    assert_eq!(config.level, LogLevel::Debug);
    assert!(config.display_thread_info);
    assert!(config.log_sink.is_none());
}

#[test]
fn test_path_stripping() {
    // Unix paths
    assert_eq!(strip_path("/home/user/sounds/ambience.zs"), "ambience.zs");

    // Windows paths
    assert_eq!(strip_path("C:\\Game\\Content\\ambience.zs"), "ambience.zs");

    // Edge cases
    assert_eq!(strip_path(""), "");
}

// Only one test in this binary may install the global subscriber.
#[test]
fn test_init_logging_forwards_to_sink_once() {
    let sink = Arc::new(CollectingSink::default());
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_filter("logging_integration=info")
        .with_log_sink(sink.clone());

    init_logging(config).unwrap();

    tracing::info!(file = "ambience.zs", "Audio file opened");
    tracing::debug!("below the filter");

    {
        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "Audio file opened");
        assert_eq!(entries[0].fields.get("file"), Some(&"ambience.zs".to_string()));
    }

    // A second initialization is rejected.
    assert!(init_logging(LoggingConfig::default()).is_err());
}
