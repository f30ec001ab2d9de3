pub mod csv_log;
pub mod diff;
pub mod error;
pub mod event_log;
pub mod metadata;
pub mod perf;
pub mod report;
pub mod snapshot;
pub mod watcher;

#[cfg(test)]
mod tests;

pub use diff::{diff, diff_at, ChangeDetail, ChangeEvent, ChangeKind};
pub use error::{ErrorClass, WatchError, WatchResult};
pub use event_log::{EventLogger, EVENT_LOG_HEADER};
pub use metadata::{extract_metadata, FileKind, FileMetadataRecord};
pub use perf::{PerformanceLog, PerformanceSample, PerformanceTracker, PERFORMANCE_LOG_HEADER};
pub use report::{EventCounts, Report, Stats};
pub use snapshot::{snapshot, DirectorySnapshot, EntrySnapshot};
pub use watcher::{
    CycleOutcome, DirectoryWatcher, MetadataOutcome, ReportedEvent, WatchConfig, WatchSummary,
    WatcherState,
};
