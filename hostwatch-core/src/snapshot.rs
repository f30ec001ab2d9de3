use crate::error::{WatchError, WatchResult};
use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use std::time::SystemTime;
use tracing::debug;

/// The comparable state of one directory entry.
///
/// Two snapshots of an untouched entry compare equal; any change to size,
/// modification time or mode bits makes them unequal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntrySnapshot {
    pub size: u64,
    pub mtime: SystemTime,
    /// Raw `st_mode`: entry type plus permission bits.
    pub mode: u32,
}

impl EntrySnapshot {
    pub fn from_metadata(metadata: &fs::Metadata) -> Self {
        Self {
            size: metadata.len(),
            mtime: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            mode: metadata.mode(),
        }
    }
}

/// A directory's immediate entries at one instant, keyed by raw file name.
///
/// Names are kept as `OsString` so that two distinct non-UTF-8 names never
/// collapse into one key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectorySnapshot {
    entries: BTreeMap<OsString, EntrySnapshot>,
}

impl DirectorySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<OsString>, entry: EntrySnapshot) {
        self.entries.insert(name.into(), entry);
    }

    pub fn get(&self, name: impl AsRef<OsStr>) -> Option<&EntrySnapshot> {
        self.entries.get(name.as_ref())
    }

    pub fn contains(&self, name: impl AsRef<OsStr>) -> bool {
        self.entries.contains_key(name.as_ref())
    }

    /// Entry names in byte order.
    pub fn names(&self) -> impl Iterator<Item = &OsStr> {
        self.entries.keys().map(OsString::as_os_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OsStr, &EntrySnapshot)> {
        self.entries
            .iter()
            .map(|(name, entry)| (name.as_os_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<OsString>> FromIterator<(N, EntrySnapshot)> for DirectorySnapshot {
    fn from_iter<I: IntoIterator<Item = (N, EntrySnapshot)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(name, entry)| (name.into(), entry))
                .collect(),
        }
    }
}

/// Capture the immediate entries of `directory`.
///
/// A missing directory yields an empty snapshot. Entries are stated without
/// following symlinks, and an entry that disappears between listing and
/// stating is skipped.
pub fn snapshot(directory: &Path) -> WatchResult<DirectorySnapshot> {
    let listing = match fs::read_dir(directory) {
        Ok(listing) => listing,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!("Watched directory {} does not exist", directory.display());
            return Ok(DirectorySnapshot::new());
        }
        Err(source) => {
            return Err(WatchError::ListDirectory {
                path: directory.to_path_buf(),
                source,
            })
        }
    };

    let mut snapshot = DirectorySnapshot::new();

    for entry in listing {
        let entry = entry.map_err(|source| WatchError::ListDirectory {
            path: directory.to_path_buf(),
            source,
        })?;
        let path = entry.path();

        let metadata = match fs::symlink_metadata(&path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("{} vanished before it could be stated", path.display());
                continue;
            }
            Err(source) => return Err(WatchError::StatEntry { path, source }),
        };

        snapshot.insert(entry.file_name(), EntrySnapshot::from_metadata(&metadata));
    }

    Ok(snapshot)
}
