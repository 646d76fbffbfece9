//! Storage backend abstraction.
//!
//! The browser never touches `std::fs` directly; every filesystem call goes
//! through a [`Storage`] implementation so the core can run against any
//! backend that honours this contract.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Mode applied to newly created directories on Unix.
pub const DEFAULT_DIR_MODE: u32 = 0o775;

/// Kind of a storage entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    /// Device, socket, fifo and similar.
    Other,
}

/// Metadata of a single entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryStat {
    pub kind: EntryKind,
    /// Size in bytes (0 for directories).
    pub size: u64,
    pub modified: SystemTime,
}

impl EntryStat {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// A named child of a directory.
///
/// Symlinks are not followed: `stat` describes the link itself and
/// `is_symlink` is set, leaving the caller to decide whether the target
/// may be looked at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildEntry {
    pub name: String,
    pub stat: EntryStat,
    pub is_symlink: bool,
}

/// Filesystem operations the browser relies on.
///
/// `list_children` reports each child separately so a single unreadable
/// entry does not fail the whole listing.
pub trait Storage: Send + Sync {
    /// Resolve symlinks and relative components.
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;

    /// Metadata of `path`, following symlinks.
    fn stat(&self, path: &Path) -> io::Result<EntryStat>;

    /// Immediate children of a directory.
    fn list_children(&self, path: &Path) -> io::Result<Vec<io::Result<ChildEntry>>>;

    fn create_dir(&self, path: &Path) -> io::Result<()>;

    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Remove an empty directory.
    fn remove_dir(&self, path: &Path) -> io::Result<()>;

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Write `data` to `path`, replacing any previous content.
    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()>;

    /// Write `data` to a new file at `path`. Fails with
    /// [`io::ErrorKind::AlreadyExists`] if anything is already there.
    fn create_new(&self, path: &Path, data: &[u8]) -> io::Result<()>;

    /// Whether anything occupies `path`.
    fn exists(&self, path: &Path) -> bool {
        self.stat(path).is_ok()
    }

    fn is_empty_dir(&self, path: &Path) -> io::Result<bool> {
        Ok(self.list_children(path)?.is_empty())
    }
}

/// [`Storage`] backed by the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    dir_mode: u32,
}

impl LocalStorage {
    pub fn new() -> Self {
        Self {
            dir_mode: DEFAULT_DIR_MODE,
        }
    }

    /// Set the mode applied to created directories (Unix only).
    pub fn with_dir_mode(mut self, mode: u32) -> Self {
        self.dir_mode = mode;
        self
    }
}

impl Default for LocalStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn stat_from_metadata(metadata: &fs::Metadata) -> EntryStat {
    let kind = if metadata.is_dir() {
        EntryKind::Directory
    } else if metadata.is_file() {
        EntryKind::File
    } else {
        EntryKind::Other
    };

    EntryStat {
        kind,
        size: if metadata.is_file() { metadata.len() } else { 0 },
        modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
    }
}

impl Storage for LocalStorage {
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        fs::canonicalize(path)
    }

    fn stat(&self, path: &Path) -> io::Result<EntryStat> {
        fs::metadata(path).map(|m| stat_from_metadata(&m))
    }

    fn list_children(&self, path: &Path) -> io::Result<Vec<io::Result<ChildEntry>>> {
        let children = fs::read_dir(path)?
            .map(|entry| {
                let entry = entry?;
                let name = entry.file_name().into_string().map_err(|raw| {
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("non UTF-8 file name: {:?}", raw),
                    )
                })?;
                let metadata = fs::symlink_metadata(entry.path())?;
                Ok(ChildEntry {
                    name,
                    stat: stat_from_metadata(&metadata),
                    is_symlink: metadata.file_type().is_symlink(),
                })
            })
            .collect();
        Ok(children)
    }

    fn create_dir(&self, path: &Path) -> io::Result<()> {
        fs::create_dir(path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(self.dir_mode))?;
        }

        Ok(())
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        fs::write(path, data)
    }

    fn create_new(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        file.write_all(data)
    }

    /// Dangling symlinks count as existing, so nothing is ever written
    /// through them.
    fn exists(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok()
    }
}
