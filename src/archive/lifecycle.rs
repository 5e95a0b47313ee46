//! Lifecycle management for creating and opening archive files.
//!
//! Responsibilities:
//! - Enforce the single-file invariant and take OS locks.
//! - Bootstrap the header and empty tree on create, recover them on open.
//! - Verify the tree checksum before handing out a handle.
//! - Flush dirty state on close and on drop.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::constants::HEADER_LEN;
use crate::error::{ArchiveError, EntityKind, Result};
use crate::io::header::{Header, HeaderCodec};
use crate::lock::{FileLock, LockMode};
use crate::store::{AttrValue, GroupNode, decode_tree, encode_tree};
use crate::types::{AccessMode, FileVersion};

pub(crate) const SURVEYS_GROUP: &str = "surveys";
pub(crate) const FILE_VERSION_ATTR: &str = "file_version";
pub(crate) const DEFAULT_SURVEY_ATTR: &str = "default_survey";

/// Primary handle for interacting with an archive file.
///
/// Holds the file descriptor, lock, decoded header, and the in-memory group
/// tree. Mutations edit the tree and mark the handle dirty; `flush` rewrites
/// the tree blob and header in one pass.
#[derive(Debug)]
pub struct MtArchive {
    pub(crate) file: File,
    pub(crate) path: PathBuf,
    pub(crate) lock: Option<FileLock>,
    pub(crate) mode: AccessMode,
    pub(crate) header: Header,
    pub(crate) root: GroupNode,
    pub(crate) dirty: bool,
    pub(crate) closed: bool,
}

impl MtArchive {
    /// Create a new archive at `path`, truncating any existing file.
    pub fn create<P: AsRef<Path>>(path: P, file_version: FileVersion) -> Result<Self> {
        Self::create_with(path.as_ref(), file_version, AccessMode::Overwrite)
    }

    /// Create a new archive, failing with [`ArchiveError::AlreadyExists`]
    /// when `path` is already present.
    pub fn create_exclusive<P: AsRef<Path>>(path: P, file_version: FileVersion) -> Result<Self> {
        Self::create_with(path.as_ref(), file_version, AccessMode::ExclusiveCreate)
    }

    fn create_with(path: &Path, file_version: FileVersion, mode: AccessMode) -> Result<Self> {
        let file = match mode {
            AccessMode::ExclusiveCreate => OpenOptions::new()
                .read(true)
                .write(true)
                .create_new(true)
                .open(path)
                .map_err(|err| {
                    if err.kind() == io::ErrorKind::AlreadyExists {
                        ArchiveError::AlreadyExists {
                            path: path.to_path_buf(),
                        }
                    } else {
                        ArchiveError::Io(err)
                    }
                })?,
            _ => OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(path)?,
        };
        let lock = FileLock::acquire(&file, LockMode::Exclusive)?;

        let mut root = GroupNode::new();
        root.set_attr(
            FILE_VERSION_ATTR,
            AttrValue::Text(file_version.as_str().to_string()),
        );
        root.ensure_group(SURVEYS_GROUP);

        let mut archive = Self {
            file,
            path: path.to_path_buf(),
            lock: Some(lock),
            mode,
            header: Header::new(file_version),
            root,
            dirty: true,
            closed: false,
        };
        archive.flush()?;
        debug!(path = %archive.path.display(), version = %file_version, "created archive");
        Ok(archive)
    }

    /// Open an existing archive for mutation. Takes an exclusive lock.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path.as_ref(), AccessMode::ReadWrite)
    }

    /// Open an existing archive for reading. Takes a shared lock so multiple
    /// readers can coexist.
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path.as_ref(), AccessMode::ReadOnly)
    }

    fn open_with(path: &Path, mode: AccessMode) -> Result<Self> {
        if !path.exists() {
            return Err(ArchiveError::NotFound {
                kind: EntityKind::Archive,
                name: path.display().to_string(),
            });
        }
        let mut options = OpenOptions::new();
        options.read(true);
        if mode == AccessMode::ReadWrite {
            options.write(true);
        }
        let mut file = options.open(path)?;
        let lock_mode = match mode {
            AccessMode::ReadWrite => LockMode::Exclusive,
            _ => LockMode::Shared,
        };
        let lock = FileLock::acquire(&file, lock_mode)?;
        let header = HeaderCodec::read(&mut file)?;
        let root = read_tree(&mut file, &header)?;
        debug!(path = %path.display(), version = %header.file_version, "opened archive");
        Ok(Self {
            file,
            path: path.to_path_buf(),
            lock: Some(lock),
            mode,
            header,
            root,
            dirty: false,
            closed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_version(&self) -> FileVersion {
        self.header.file_version
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Whether the handle accepts mutations. Closing a handle demotes it to
    /// read-only; its in-memory tree stays readable.
    pub fn writable(&self) -> bool {
        self.mode != AccessMode::ReadOnly && !self.closed
    }

    pub(crate) fn assert_writable(&self) -> Result<()> {
        if self.writable() {
            Ok(())
        } else {
            Err(ArchiveError::ReadOnly)
        }
    }

    /// The survey a legacy single-survey archive resolves station-level
    /// operations through. Always `None` for current-version archives.
    pub fn default_survey(&self) -> Option<String> {
        match self.root.attr(DEFAULT_SURVEY_ATTR) {
            Some(AttrValue::Text(id)) => Some(id.clone()),
            _ => None,
        }
    }

    /// Rewrite the tree blob and header and fsync. No-op on a clean handle.
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        self.assert_writable()?;
        let blob = encode_tree(&self.root)?;
        self.header.tree_offset = HEADER_LEN as u64;
        self.header.tree_len = blob.len() as u64;
        self.header.tree_checksum = *blake3::hash(&blob).as_bytes();

        self.file.seek(SeekFrom::Start(HEADER_LEN as u64))?;
        self.file.write_all(&blob)?;
        self.file.set_len(HEADER_LEN as u64 + blob.len() as u64)?;
        HeaderCodec::write(&mut self.file, &self.header)?;
        self.file.sync_all()?;
        self.dirty = false;
        debug!(path = %self.path.display(), bytes = blob.len(), "flushed tree blob");
        Ok(())
    }

    /// Flush pending changes and release the lock. Idempotent; a second call
    /// is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if self.mode != AccessMode::ReadOnly && self.dirty {
            self.flush()?;
        }
        self.closed = true;
        self.lock = None;
        debug!(path = %self.path.display(), "closed archive");
        Ok(())
    }
}

impl Drop for MtArchive {
    fn drop(&mut self) {
        if !self.closed && self.mode != AccessMode::ReadOnly && self.dirty {
            if let Err(err) = self.flush() {
                warn!(path = %self.path.display(), error = %err, "flush on drop failed");
            }
        }
    }
}

fn read_tree(file: &mut File, header: &Header) -> Result<GroupNode> {
    let mut blob = vec![0u8; header.tree_len as usize];
    file.seek(SeekFrom::Start(header.tree_offset))?;
    file.read_exact(&mut blob)
        .map_err(|_| ArchiveError::CorruptFormat {
            reason: "tree blob truncated".into(),
        })?;
    if *blake3::hash(&blob).as_bytes() != header.tree_checksum {
        return Err(ArchiveError::CorruptFormat {
            reason: "tree checksum mismatch".into(),
        });
    }
    decode_tree(&blob)
}
