//! Error taxonomy for archive operations.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Hierarchy level or container entity an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Archive,
    Survey,
    Station,
    Run,
    Channel,
    Filter,
    Group,
    Dataset,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Archive => "archive",
            EntityKind::Survey => "survey",
            EntityKind::Station => "station",
            EntityKind::Run => "run",
            EntityKind::Channel => "channel",
            EntityKind::Filter => "filter",
            EntityKind::Group => "group",
            EntityKind::Dataset => "dataset",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by archive operations.
///
/// Structural and validation errors surface immediately at the failing
/// operation. The channel summary scan is the one documented exception: it
/// emits sentinel rows for partial metadata instead of failing the walk.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("{kind} `{name}` not found")]
    NotFound { kind: EntityKind, name: String },

    #[error("{kind} `{id}` already exists")]
    DuplicateId { kind: EntityKind, id: String },

    #[error("file version {version} does not permit this operation: {reason}")]
    InvalidVersion { version: String, reason: String },

    #[error("metadata validation failed for field(s): {}", fields.join(", "))]
    MetadataValidation { fields: Vec<String> },

    #[error("inconsistent hierarchy at `{path}`: {reason}")]
    InconsistentHierarchy { path: String, reason: String },

    #[error("corrupt archive: {reason}")]
    CorruptFormat { reason: String },

    #[error("path already exists: {}", path.display())]
    AlreadyExists { path: PathBuf },

    #[error("archive is open read-only")]
    ReadOnly,

    #[error("lock error: {0}")]
    Lock(String),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),
}
