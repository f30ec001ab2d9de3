//! Classification of two directory snapshots into change events.
//!
//! Entries are matched by raw name only. A file that is deleted and replaced
//! by another file with the same name within one polling interval shows up
//! as `Modified`, and a rename shows up as `Deleted` plus `Created`.

use crate::metadata::permission_string;
use crate::snapshot::{DirectorySnapshot, EntrySnapshot};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Created,
    Deleted,
    Modified,
}

impl ChangeKind {
    /// Console label, e.g. `CREATED`.
    pub fn label(&self) -> &'static str {
        match self {
            ChangeKind::Created => "CREATED",
            ChangeKind::Deleted => "DELETED",
            ChangeKind::Modified => "MODIFIED",
        }
    }

    /// Value written to the `event_type` column of the event log.
    pub fn as_log_str(&self) -> &'static str {
        match self {
            ChangeKind::Created => "created",
            ChangeKind::Deleted => "deleted",
            ChangeKind::Modified => "modified",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What changed about a modified entry.
///
/// Only the first matching attribute is reported: size, then mode bits,
/// then timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeDetail {
    None,
    Size { old: u64, new: u64 },
    Permissions { old_mode: u32, new_mode: u32 },
    Touched { mtime: SystemTime },
}

impl ChangeDetail {
    fn between(previous: &EntrySnapshot, current: &EntrySnapshot) -> Self {
        if previous.size != current.size {
            ChangeDetail::Size {
                old: previous.size,
                new: current.size,
            }
        } else if previous.mode != current.mode {
            ChangeDetail::Permissions {
                old_mode: previous.mode,
                new_mode: current.mode,
            }
        } else {
            ChangeDetail::Touched {
                mtime: current.mtime,
            }
        }
    }
}

impl fmt::Display for ChangeDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeDetail::None => Ok(()),
            ChangeDetail::Size { old, new } => write!(f, "Size change: {old}->{new} bytes"),
            ChangeDetail::Permissions { old_mode, new_mode } => write!(
                f,
                "Permissions changed: {} -> {}",
                permission_string(*old_mode),
                permission_string(*new_mode)
            ),
            ChangeDetail::Touched { mtime } => {
                let mtime: DateTime<Local> = (*mtime).into();
                write!(f, "Modified at: {}", mtime.format("%Y-%m-%d %H:%M:%S"))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub timestamp: DateTime<Local>,
    pub kind: ChangeKind,
    /// Raw entry name, exactly as listed by the filesystem.
    pub name: OsString,
    pub detail: ChangeDetail,
}

impl ChangeEvent {
    /// Name for console lines and log rows; invalid UTF-8 is replaced.
    pub fn display_name(&self) -> Cow<'_, str> {
        self.name.to_string_lossy()
    }
}

/// Diff two snapshots, stamping every event with the current local time.
pub fn diff(previous: &DirectorySnapshot, current: &DirectorySnapshot) -> Vec<ChangeEvent> {
    diff_at(previous, current, Local::now())
}

/// Diff two snapshots with a caller-supplied timestamp.
///
/// Events come out grouped as created, deleted, then modified, each group in
/// byte order of the names.
pub fn diff_at(
    previous: &DirectorySnapshot,
    current: &DirectorySnapshot,
    timestamp: DateTime<Local>,
) -> Vec<ChangeEvent> {
    let event = |kind, name: &OsStr, detail| ChangeEvent {
        timestamp,
        kind,
        name: name.to_os_string(),
        detail,
    };

    let created = current
        .names()
        .filter(|name| !previous.contains(*name))
        .map(|name| event(ChangeKind::Created, name, ChangeDetail::None));

    let deleted = previous
        .names()
        .filter(|name| !current.contains(*name))
        .map(|name| event(ChangeKind::Deleted, name, ChangeDetail::None));

    let modified = current.iter().filter_map(|(name, now)| {
        let before = previous.get(name)?;
        (before != now).then(|| event(ChangeKind::Modified, name, ChangeDetail::between(before, now)))
    });

    created.chain(deleted).chain(modified).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn entry(size: u64, secs: u64, mode: u32) -> EntrySnapshot {
        EntrySnapshot {
            size,
            mtime: SystemTime::UNIX_EPOCH + Duration::from_secs(secs),
            mode,
        }
    }

    #[test]
    fn size_wins_over_other_changes() {
        let before = entry(10, 100, 0o100644);
        let after = entry(20, 200, 0o100600);
        assert_eq!(
            ChangeDetail::between(&before, &after),
            ChangeDetail::Size { old: 10, new: 20 }
        );
    }

    #[test]
    fn mode_wins_over_mtime() {
        let before = entry(10, 100, 0o100644);
        let after = entry(10, 200, 0o100755);
        assert!(matches!(
            ChangeDetail::between(&before, &after),
            ChangeDetail::Permissions { .. }
        ));
    }

    #[test]
    fn detail_rendering() {
        let size = ChangeDetail::Size { old: 10, new: 20 }.to_string();
        assert!(size.contains("10->20"));

        let perms = ChangeDetail::Permissions {
            old_mode: 0o100644,
            new_mode: 0o100755,
        }
        .to_string();
        assert_eq!(perms, "Permissions changed: -rw-r--r-- -> -rwxr-xr-x");

        assert!(ChangeDetail::None.to_string().is_empty());
    }
}
