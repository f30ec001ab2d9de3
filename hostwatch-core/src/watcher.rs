use crate::diff::{diff, ChangeDetail, ChangeEvent, ChangeKind};
use crate::error::WatchError;
use crate::event_log::EventLogger;
use crate::metadata::{extract_metadata, FileMetadataRecord};
use crate::snapshot::{snapshot, DirectorySnapshot};
use std::fs;
use std::future::Future;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub directory: PathBuf,
    pub interval: Duration,
    pub event_log: PathBuf,
    /// Create the watched directory before the first snapshot.
    pub create_directory: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("test_folder"),
            interval: Duration::from_secs(3),
            event_log: PathBuf::from("file_monitor_log.csv"),
            create_directory: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Idle,
    Polling,
    Diffing,
    Reporting,
    Sleeping,
    Stopped,
}

/// Result of looking up metadata for a created entry.
#[derive(Debug, Clone)]
pub enum MetadataOutcome {
    Available(FileMetadataRecord),
    /// The entry was gone by the time it was stated.
    Vanished,
    Unavailable(String),
}

/// A change event together with whatever was learned about it while reporting.
#[derive(Debug, Clone)]
pub struct ReportedEvent {
    pub event: ChangeEvent,
    pub metadata: Option<MetadataOutcome>,
}

impl ReportedEvent {
    /// Text for the `details` column of the event log.
    pub fn details(&self) -> String {
        match (&self.event.kind, &self.metadata) {
            (ChangeKind::Created, Some(MetadataOutcome::Available(record))) => record.summary(),
            (ChangeKind::Created, Some(MetadataOutcome::Vanished)) => {
                "details unavailable: entry no longer exists".to_string()
            }
            (ChangeKind::Created, Some(MetadataOutcome::Unavailable(reason))) => {
                format!("details unavailable: {reason}")
            }
            _ => self.event.detail.to_string(),
        }
    }

    /// Lines printed to the console for this event.
    pub fn console_lines(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "[{}] [{}] {}",
            self.event.timestamp.format("%H:%M:%S"),
            self.event.kind.label(),
            self.event.display_name()
        )];

        match &self.metadata {
            Some(MetadataOutcome::Available(record)) => {
                lines.push(format!("   Details: {}", record.summary()));
            }
            Some(MetadataOutcome::Vanished) | Some(MetadataOutcome::Unavailable(_)) => {
                lines.push("   Details: unavailable".to_string());
            }
            None => {}
        }

        if self.event.detail != ChangeDetail::None {
            lines.push(format!("   -> {}", self.event.detail));
        }

        lines
    }
}

/// What one polling cycle produced.
#[derive(Debug)]
pub struct CycleOutcome {
    /// Snapshot to diff the next cycle against.
    pub retained: Option<DirectorySnapshot>,
    pub events: Vec<ReportedEvent>,
    /// Set when no snapshot could be built; `retained` is then the previous one.
    pub snapshot_error: Option<WatchError>,
    pub log_error: Option<WatchError>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchSummary {
    pub cycles: u64,
    pub events: u64,
    pub failed_cycles: u64,
}

/// Polls one directory and reports what changed between cycles.
pub struct DirectoryWatcher {
    config: WatchConfig,
    logger: EventLogger,
    console: Box<dyn Write + Send>,
    state: WatcherState,
    summary: WatchSummary,
}

impl DirectoryWatcher {
    pub fn new(config: WatchConfig) -> Self {
        let logger = EventLogger::new(config.event_log.clone());
        Self {
            config,
            logger,
            console: Box::new(io::stdout()),
            state: WatcherState::Idle,
            summary: WatchSummary::default(),
        }
    }

    /// Redirect console output, e.g. to `io::sink()` in tests.
    pub fn with_console(mut self, console: impl Write + Send + 'static) -> Self {
        self.console = Box::new(console);
        self
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    pub fn state(&self) -> WatcherState {
        self.state
    }

    pub fn summary(&self) -> WatchSummary {
        self.summary
    }

    /// Take the cycle-0 snapshot. No events are produced for it.
    pub fn baseline(&mut self) -> Option<DirectorySnapshot> {
        self.state = WatcherState::Polling;
        match snapshot(&self.config.directory) {
            Ok(current) => {
                info!(
                    "Baseline snapshot of {} has {} entries",
                    self.config.directory.display(),
                    current.len()
                );
                Some(current)
            }
            Err(err) => {
                warn!("Baseline snapshot failed, will retry next cycle: {}", err);
                None
            }
        }
    }

    /// Run one snapshot, diff and report step against `previous`.
    pub fn cycle(&mut self, previous: Option<DirectorySnapshot>) -> CycleOutcome {
        self.summary.cycles += 1;
        self.state = WatcherState::Polling;

        let current = match snapshot(&self.config.directory) {
            Ok(current) => current,
            Err(err) => {
                warn!("Snapshot failed ({:?}), keeping previous state: {}", err.class(), err);
                self.summary.failed_cycles += 1;
                return CycleOutcome {
                    retained: previous,
                    events: Vec::new(),
                    snapshot_error: Some(err),
                    log_error: None,
                };
            }
        };

        let Some(previous) = previous else {
            info!("Baseline snapshot captured with {} entries", current.len());
            return CycleOutcome {
                retained: Some(current),
                events: Vec::new(),
                snapshot_error: None,
                log_error: None,
            };
        };

        self.state = WatcherState::Diffing;
        let changes = diff(&previous, &current);
        debug!("Cycle {} found {} changes", self.summary.cycles, changes.len());

        self.state = WatcherState::Reporting;
        let events: Vec<ReportedEvent> = changes
            .into_iter()
            .map(|event| self.describe(event))
            .collect();

        for event in &events {
            for line in event.console_lines() {
                if let Err(err) = writeln!(self.console, "{line}") {
                    debug!("Console write failed: {}", err);
                }
            }
        }
        if let Err(err) = self.console.flush() {
            debug!("Console flush failed: {}", err);
        }

        let log_error = match self.logger.append_all(&events) {
            Ok(()) => None,
            Err(err) => {
                warn!("Could not record {} events: {}", events.len(), err);
                Some(err)
            }
        };

        self.summary.events += events.len() as u64;

        CycleOutcome {
            retained: Some(current),
            events,
            snapshot_error: None,
            log_error,
        }
    }

    fn describe(&self, event: ChangeEvent) -> ReportedEvent {
        if event.kind != ChangeKind::Created {
            return ReportedEvent {
                event,
                metadata: None,
            };
        }

        let path = self.config.directory.join(&event.name);
        let metadata = match extract_metadata(&path) {
            Ok(Some(record)) => MetadataOutcome::Available(record),
            Ok(None) => {
                debug!("{} vanished before metadata could be read", path.display());
                MetadataOutcome::Vanished
            }
            Err(err) => {
                warn!("Details unavailable for {}: {}", event.display_name(), err);
                MetadataOutcome::Unavailable(err.to_string())
            }
        };

        ReportedEvent {
            event,
            metadata: Some(metadata),
        }
    }

    /// Poll until `shutdown` resolves, then return the totals.
    ///
    /// `shutdown` is polled once before any work so that signal-backed futures
    /// register their handler up front. After that it is only observed between
    /// cycles, while sleeping.
    pub async fn run<F>(&mut self, shutdown: F) -> WatchSummary
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let stopped_early = tokio::select! {
            biased;
            _ = &mut shutdown => true,
            _ = std::future::ready(()) => false,
        };
        if stopped_early {
            return self.stop();
        }

        if self.config.create_directory {
            if let Err(err) = fs::create_dir_all(&self.config.directory) {
                warn!(
                    "Could not create {}: {}",
                    self.config.directory.display(),
                    err
                );
            }
        }

        self.announce(&format!(
            "\n[INFO] Directory Monitor Running on: {}",
            self.config.directory.display()
        ));
        self.announce("[INFO] Press Ctrl+C to stop...\n");

        let mut previous = self.baseline();

        loop {
            self.state = WatcherState::Sleeping;
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(self.config.interval) => {}
            }

            previous = self.cycle(previous).retained;
        }

        self.stop()
    }

    fn stop(&mut self) -> WatchSummary {
        self.state = WatcherState::Stopped;
        self.announce("\n[INFO] Monitoring stopped.");
        info!(
            "Watcher stopped after {} cycles, {} events, {} failed cycles",
            self.summary.cycles, self.summary.events, self.summary.failed_cycles
        );

        self.summary
    }

    fn announce(&mut self, line: &str) {
        if let Err(err) = writeln!(self.console, "{line}").and_then(|()| self.console.flush()) {
            debug!("Console write failed: {}", err);
        }
    }
}
