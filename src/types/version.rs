//! Schema version gate.
//!
//! The file version is fixed when an archive is created and never silently
//! migrated. Every survey-level structural mutation consults
//! [`FileVersion::permits`] before touching the tree; no other component
//! re-derives version rules.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Archive schema version.
///
/// `V1` is the legacy single-survey layout: the container owns exactly one
/// survey at its root. `V2` is the current layout with any number of surveys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FileVersion {
    V1,
    #[default]
    V2,
}

/// Survey-level structural mutation submitted to the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuralOp {
    /// Adding a survey when `existing_surveys` are already present.
    AddSurvey { existing_surveys: usize },
    RemoveSurvey,
}

impl FileVersion {
    /// Dotted version string stored in metadata, matching the wire values
    /// `"0.1.0"` and `"0.2.0"`.
    pub const fn as_str(self) -> &'static str {
        match self {
            FileVersion::V1 => "0.1.0",
            FileVersion::V2 => "0.2.0",
        }
    }

    pub(crate) const fn tag(self) -> u8 {
        match self {
            FileVersion::V1 => 1,
            FileVersion::V2 => 2,
        }
    }

    pub(crate) const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(FileVersion::V1),
            2 => Some(FileVersion::V2),
            _ => None,
        }
    }

    /// Whether this version admits the given structural mutation.
    pub fn permits(self, op: &StructuralOp) -> bool {
        match (self, op) {
            (FileVersion::V1, StructuralOp::AddSurvey { existing_surveys }) => {
                *existing_surveys == 0
            }
            _ => true,
        }
    }
}

impl fmt::Display for FileVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0.1.0" | "0.1" => Ok(FileVersion::V1),
            "0.2.0" | "0.2" => Ok(FileVersion::V2),
            other => Err(format!("unknown file version `{other}`")),
        }
    }
}
