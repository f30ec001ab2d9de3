use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failures the directory watcher can hit during a polling cycle.
///
/// None of these stop the polling loop. Each variant carries a fixed
/// [`ErrorClass`] that decides how the loop degrades.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("failed to list directory {path}: {source}")]
    ListDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to stat entry {path}: {source}")]
    StatEntry {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read metadata for {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to append to event log {path}: {source}")]
    EventLog {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// How the polling loop reacts to a [`WatchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Skip this cycle's snapshot (or this write), keep the previous state, retry next cycle.
    Transient,
    /// Affects a single entry; the entry's event is still reported.
    PerEntry,
}

impl WatchError {
    pub fn class(&self) -> ErrorClass {
        match self {
            WatchError::ListDirectory { .. }
            | WatchError::StatEntry { .. }
            | WatchError::EventLog { .. } => ErrorClass::Transient,
            WatchError::Metadata { .. } => ErrorClass::PerEntry,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            WatchError::ListDirectory { path, .. }
            | WatchError::StatEntry { path, .. }
            | WatchError::Metadata { path, .. }
            | WatchError::EventLog { path, .. } => path,
        }
    }
}

pub type WatchResult<T> = std::result::Result<T, WatchError>;
