//! Public types shared across the crate.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub mod filters;
pub mod metadata;
pub mod summary;
pub mod version;

pub use filters::{FilterKind, FilterRecord};
pub use metadata::{
    ChannelKind, ChannelMetadata, GeoPoint, Location, RunMetadata, StationMetadata,
    SurveyMetadata,
};
pub use summary::ChannelSummaryRow;
pub use version::{FileVersion, StructuralOp};

/// How an archive file is opened or created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Open an existing archive for reading; shared lock.
    ReadOnly,
    /// Open an existing archive for mutation; exclusive lock.
    ReadWrite,
    /// Create a new archive, truncating any existing file.
    Overwrite,
    /// Create a new archive, failing if the path exists.
    ExclusiveCreate,
}

/// Outcome of a single verification check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationStatus {
    Passed,
    Warning,
    Failed,
}

/// One named check in a [`VerificationReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationCheck {
    pub name: String,
    pub status: VerificationStatus,
    pub detail: Option<String>,
}

impl VerificationCheck {
    pub fn passed(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: VerificationStatus::Passed,
            detail: None,
        }
    }

    pub fn failed(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: VerificationStatus::Failed,
            detail: Some(detail.into()),
        }
    }

    pub fn warning(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: VerificationStatus::Warning,
            detail: Some(detail.into()),
        }
    }
}

/// Result of verifying an archive file on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub path: PathBuf,
    pub checks: Vec<VerificationCheck>,
    pub overall_status: VerificationStatus,
}

impl VerificationReport {
    /// Fold per-check statuses into the overall verdict: any failure fails
    /// the report, otherwise any warning demotes it to warning.
    pub fn from_checks(path: PathBuf, checks: Vec<VerificationCheck>) -> Self {
        let overall_status = if checks
            .iter()
            .any(|c| c.status == VerificationStatus::Failed)
        {
            VerificationStatus::Failed
        } else if checks
            .iter()
            .any(|c| c.status == VerificationStatus::Warning)
        {
            VerificationStatus::Warning
        } else {
            VerificationStatus::Passed
        };
        Self {
            path,
            checks,
            overall_status,
        }
    }
}

/// Size and shape counters for an open archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Stats {
    pub surveys: usize,
    pub stations: usize,
    pub runs: usize,
    pub channels: usize,
    pub total_samples: u64,
    pub file_bytes: u64,
}
