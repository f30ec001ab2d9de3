use crate::error::{WatchError, WatchResult};
use chrono::{DateTime, Local, TimeZone};
use nix::unistd::{Gid, Group, Uid, User};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

const S_IFMT: u32 = 0o170000;
const S_IFSOCK: u32 = 0o140000;
const S_IFLNK: u32 = 0o120000;
const S_IFREG: u32 = 0o100000;
const S_IFBLK: u32 = 0o060000;
const S_IFDIR: u32 = 0o040000;
const S_IFCHR: u32 = 0o020000;
const S_IFIFO: u32 = 0o010000;

/// Entry type, as reported to humans. Sockets, devices and FIFOs collapse into `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    RegularFile,
    Directory,
    Symlink,
    Other,
}

impl FileKind {
    pub fn from_mode(mode: u32) -> Self {
        match mode & S_IFMT {
            S_IFREG => FileKind::RegularFile,
            S_IFDIR => FileKind::Directory,
            S_IFLNK => FileKind::Symlink,
            _ => FileKind::Other,
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FileKind::RegularFile => "regular file",
            FileKind::Directory => "directory",
            FileKind::Symlink => "symbolic link",
            FileKind::Other => "other",
        };
        f.write_str(label)
    }
}

/// Human-readable attributes of a newly seen entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMetadataRecord {
    pub filename: String,
    pub file_type: FileKind,
    pub size: u64,
    pub owner: String,
    pub group: String,
    pub permissions: String,
    /// Last status change (ctime).
    pub changed: Option<DateTime<Local>>,
    pub modified: Option<DateTime<Local>>,
    pub accessed: Option<DateTime<Local>>,
    /// Birth time, only on filesystems that record it.
    pub created: Option<DateTime<Local>>,
}

impl FileMetadataRecord {
    /// One-line summary printed under a `CREATED` event.
    pub fn summary(&self) -> String {
        format!("{}, {} bytes, Owner: {}", self.file_type, self.size, self.owner)
    }
}

/// Read the attributes of `path` without following symlinks.
///
/// Returns `Ok(None)` when the path no longer exists, which is expected when
/// an entry is removed right after it was detected.
pub fn extract_metadata(path: &Path) -> WatchResult<Option<FileMetadataRecord>> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(WatchError::Metadata {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    Ok(Some(FileMetadataRecord {
        filename,
        file_type: FileKind::from_mode(metadata.mode()),
        size: metadata.len(),
        owner: owner_name(metadata.uid()),
        group: group_name(metadata.gid()),
        permissions: permission_string(metadata.mode()),
        changed: local_time(metadata.ctime(), metadata.ctime_nsec()),
        modified: local_time(metadata.mtime(), metadata.mtime_nsec()),
        accessed: local_time(metadata.atime(), metadata.atime_nsec()),
        created: metadata.created().ok().map(DateTime::<Local>::from),
    }))
}

/// Resolve a uid to a user name, falling back to the number itself.
pub fn owner_name(uid: u32) -> String {
    match User::from_uid(Uid::from_raw(uid)) {
        Ok(Some(user)) => user.name,
        _ => uid.to_string(),
    }
}

/// Resolve a gid to a group name, falling back to the number itself.
pub fn group_name(gid: u32) -> String {
    match Group::from_gid(Gid::from_raw(gid)) {
        Ok(Some(group)) => group.name,
        _ => gid.to_string(),
    }
}

/// `ls -l` style mode string, e.g. `-rw-r--r--` or `drwxrwxrwt`.
pub fn permission_string(mode: u32) -> String {
    let kind = match mode & S_IFMT {
        S_IFREG => '-',
        S_IFDIR => 'd',
        S_IFLNK => 'l',
        S_IFCHR => 'c',
        S_IFBLK => 'b',
        S_IFIFO => 'p',
        S_IFSOCK => 's',
        _ => '?',
    };

    let mut out = String::with_capacity(10);
    out.push(kind);
    out.push_str(&triplet(mode >> 6, mode & 0o4000 != 0, 's'));
    out.push_str(&triplet(mode >> 3, mode & 0o2000 != 0, 's'));
    out.push_str(&triplet(mode, mode & 0o1000 != 0, 't'));
    out
}

fn triplet(bits: u32, special: bool, special_char: char) -> String {
    let read = if bits & 0o4 != 0 { 'r' } else { '-' };
    let write = if bits & 0o2 != 0 { 'w' } else { '-' };
    let exec = match (bits & 0o1 != 0, special) {
        (true, true) => special_char,
        (false, true) => special_char.to_ascii_uppercase(),
        (true, false) => 'x',
        (false, false) => '-',
    };
    [read, write, exec].iter().collect()
}

fn local_time(secs: i64, nsecs: i64) -> Option<DateTime<Local>> {
    let nsecs = u32::try_from(nsecs).ok()?;
    Local.timestamp_opt(secs, nsecs).single()
}
