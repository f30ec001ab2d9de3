use crate::csv_log::CsvLog;
use crate::error::{WatchError, WatchResult};
use crate::watcher::ReportedEvent;
use std::path::{Path, PathBuf};

/// Column names of the durable event log. Downstream tooling depends on them.
pub const EVENT_LOG_HEADER: &[&str] = &["timestamp", "event_type", "filename", "details"];

/// Appends change events to a CSV log, one row per event.
#[derive(Debug, Clone)]
pub struct EventLogger {
    log: CsvLog,
}

impl EventLogger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            log: CsvLog::new(path, EVENT_LOG_HEADER),
        }
    }

    pub fn path(&self) -> &Path {
        self.log.path()
    }

    pub fn append(&self, event: &ReportedEvent) -> WatchResult<()> {
        self.append_all(std::slice::from_ref(event))
    }

    pub fn append_all(&self, events: &[ReportedEvent]) -> WatchResult<()> {
        if events.is_empty() {
            return Ok(());
        }

        self.log
            .append_rows(events.iter().map(Self::row))
            .map_err(|source| WatchError::EventLog {
                path: self.log.path().to_path_buf(),
                source,
            })
    }

    fn row(event: &ReportedEvent) -> Vec<String> {
        vec![
            event
                .event
                .timestamp
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            event.event.kind.as_log_str().to_string(),
            event.event.display_name().into_owned(),
            event.details(),
        ]
    }
}
