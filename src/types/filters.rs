//! Survey-level filter and calibration records.
//!
//! Filters live in a registry under each survey, keyed by name; channels
//! reference them by name in application order. The engine stores them
//! opaquely, parameters included, and never evaluates a response.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response family of a filter record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    /// Zeros/poles/gain.
    Zpk,
    /// Frequency/amplitude/phase table.
    Fap,
    TimeDelay,
    Coefficient,
    Fir,
}

/// One named calibration entry in a survey's filter registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterRecord {
    pub name: String,
    pub kind: FilterKind,
    #[serde(default)]
    pub units_in: Option<String>,
    #[serde(default)]
    pub units_out: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
    /// Family-specific parameters, stored as written.
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
}

impl FilterRecord {
    pub fn new(name: impl Into<String>, kind: FilterKind) -> Self {
        Self {
            name: name.into(),
            kind,
            units_in: None,
            units_out: None,
            comments: None,
            parameters: BTreeMap::new(),
        }
    }
}
