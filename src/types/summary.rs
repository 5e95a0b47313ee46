//! Channel summary rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::metadata::ChannelKind;

/// One row of the channel summary index.
///
/// Derived, never authoritative. Missing metadata yields `None`/empty
/// sentinels instead of failing the scan, so one partially described channel
/// cannot block indexing of the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSummaryRow {
    pub survey: String,
    pub station: String,
    pub run: String,
    pub channel: String,
    pub kind: ChannelKind,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub n_samples: u64,
    pub sample_rate: Option<f64>,
    pub units: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub elevation: Option<f64>,
    pub azimuth: Option<f64>,
    pub tilt: Option<f64>,
}
