//! Advisory file locking for the single-writer model.
//!
//! Writers hold an exclusive lock for the lifetime of the handle; readers hold
//! a shared lock so multiple read-only handles can coexist. Locks are advisory
//! and cooperative, released on drop.

use std::fs::File;

use fs2::FileExt;

use crate::error::{ArchiveError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

impl LockMode {
    fn describe(self) -> &'static str {
        match self {
            LockMode::Shared => "shared",
            LockMode::Exclusive => "exclusive",
        }
    }
}

/// Held advisory lock on an archive file. Unlocks on drop.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    mode: LockMode,
}

impl FileLock {
    /// Acquire a lock on `file` without blocking. Fails with
    /// [`ArchiveError::Lock`] when another handle holds a conflicting lock.
    pub fn acquire(file: &File, mode: LockMode) -> Result<Self> {
        let handle = file.try_clone()?;
        let outcome = match mode {
            LockMode::Shared => FileExt::try_lock_shared(&handle),
            LockMode::Exclusive => FileExt::try_lock_exclusive(&handle),
        };
        outcome.map_err(|err| {
            ArchiveError::Lock(format!(
                "could not take {} lock: {err}",
                mode.describe()
            ))
        })?;
        Ok(Self { file: handle, mode })
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
