//! Metadata records for the four hierarchy levels.
//!
//! Records serialize field-for-field into group attributes and back, so a
//! reopened archive reconstructs exactly what was written. `validate()`
//! returns the offending field names; an empty list means the record is
//! acceptable for attachment.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Measurement class of a channel, derived from its component code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Electric,
    Magnetic,
    #[default]
    Auxiliary,
}

impl ChannelKind {
    /// Classify a component code by its leading letter: `e*` is electric,
    /// `h*` and `b*` are magnetic, anything else auxiliary.
    pub fn classify(component: &str) -> Self {
        match component.chars().next().map(|c| c.to_ascii_lowercase()) {
            Some('e') => ChannelKind::Electric,
            Some('h') | Some('b') => ChannelKind::Magnetic,
            _ => ChannelKind::Auxiliary,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ChannelKind::Electric => "electric",
            ChannelKind::Magnetic => "magnetic",
            ChannelKind::Auxiliary => "auxiliary",
        }
    }
}

/// Geographic point used for survey bounding-box corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Station location.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
}

fn in_lat_range(latitude: f64) -> bool {
    (-90.0..=90.0).contains(&latitude)
}

fn in_lon_range(longitude: f64) -> bool {
    (-180.0..=180.0).contains(&longitude)
}

fn ordered(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> bool {
    match (start, end) {
        (Some(s), Some(e)) => s <= e,
        _ => true,
    }
}

/// Survey-level metadata.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SurveyMetadata {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub time_period_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub time_period_end: Option<DateTime<Utc>>,
    /// Northwest corner of the station bounding box, maintained by
    /// `update_survey_metadata`.
    #[serde(default)]
    pub northwest_corner: Option<GeoPoint>,
    #[serde(default)]
    pub southeast_corner: Option<GeoPoint>,
    #[serde(default)]
    pub extra: BTreeMap<String, Value>,
}

impl SurveyMetadata {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Vec<String> {
        let mut fields = Vec::new();
        if self.id.trim().is_empty() {
            fields.push("id".to_string());
        }
        if !ordered(self.time_period_start, self.time_period_end) {
            fields.push("time_period_end".to_string());
        }
        for corner in [&self.northwest_corner, &self.southeast_corner] {
            if let Some(point) = corner {
                if !in_lat_range(point.latitude) {
                    fields.push("latitude".to_string());
                }
                if !in_lon_range(point.longitude) {
                    fields.push("longitude".to_string());
                }
            }
        }
        fields
    }
}

/// Station-level metadata, including the recorded-channel inventory split by
/// measurement class.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StationMetadata {
    pub id: String,
    #[serde(default)]
    pub geographic_name: Option<String>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub time_period_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub time_period_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub channels_recorded_electric: Vec<String>,
    #[serde(default)]
    pub channels_recorded_magnetic: Vec<String>,
    #[serde(default)]
    pub channels_recorded_auxiliary: Vec<String>,
    #[serde(default)]
    pub extra: BTreeMap<String, Value>,
}

impl StationMetadata {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Vec<String> {
        let mut fields = Vec::new();
        if self.id.trim().is_empty() {
            fields.push("id".to_string());
        }
        if let Some(location) = &self.location {
            if !in_lat_range(location.latitude) {
                fields.push("location.latitude".to_string());
            }
            if !in_lon_range(location.longitude) {
                fields.push("location.longitude".to_string());
            }
        }
        if !ordered(self.time_period_start, self.time_period_end) {
            fields.push("time_period_end".to_string());
        }
        fields
    }
}

/// Run-level metadata.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunMetadata {
    pub id: String,
    #[serde(default)]
    pub sample_rate: Option<f64>,
    #[serde(default)]
    pub time_period_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub time_period_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub channels_recorded_electric: Vec<String>,
    #[serde(default)]
    pub channels_recorded_magnetic: Vec<String>,
    #[serde(default)]
    pub channels_recorded_auxiliary: Vec<String>,
    #[serde(default)]
    pub extra: BTreeMap<String, Value>,
}

impl RunMetadata {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Vec<String> {
        let mut fields = Vec::new();
        if self.id.trim().is_empty() {
            fields.push("id".to_string());
        }
        if let Some(rate) = self.sample_rate {
            if !(rate > 0.0 && rate.is_finite()) {
                fields.push("sample_rate".to_string());
            }
        }
        if !ordered(self.time_period_start, self.time_period_end) {
            fields.push("time_period_end".to_string());
        }
        fields
    }
}

/// Channel-level metadata.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelMetadata {
    /// Component code, e.g. `ex`, `hy`, `temperature`. Doubles as the
    /// channel id within its run.
    pub component: String,
    #[serde(default)]
    pub kind: ChannelKind,
    #[serde(default)]
    pub units: Option<String>,
    #[serde(default)]
    pub sample_rate: Option<f64>,
    #[serde(default)]
    pub time_period_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub time_period_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub azimuth: Option<f64>,
    #[serde(default)]
    pub tilt: Option<f64>,
    /// Names of survey-level filter records applied to this channel, in
    /// application order.
    #[serde(default)]
    pub filter_names: Vec<String>,
    #[serde(default)]
    pub extra: BTreeMap<String, Value>,
}

impl ChannelMetadata {
    pub fn new(component: impl Into<String>) -> Self {
        let component = component.into();
        let kind = ChannelKind::classify(&component);
        Self {
            component,
            kind,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Vec<String> {
        let mut fields = Vec::new();
        if self.component.trim().is_empty() {
            fields.push("component".to_string());
        }
        if let Some(rate) = self.sample_rate {
            if !(rate > 0.0 && rate.is_finite()) {
                fields.push("sample_rate".to_string());
            }
        }
        if let Some(azimuth) = self.azimuth {
            if !(-360.0..=360.0).contains(&azimuth) {
                fields.push("azimuth".to_string());
            }
        }
        if let Some(tilt) = self.tilt {
            if !(-90.0..=90.0).contains(&tilt) {
                fields.push("tilt".to_string());
            }
        }
        fields
    }

    /// End time derived from start, sample count, and sample rate. `None`
    /// when start or a positive sample rate is missing.
    pub fn end_for(&self, n_samples: u64) -> Option<DateTime<Utc>> {
        let start = self.time_period_start?;
        let rate = self.sample_rate.filter(|r| *r > 0.0 && r.is_finite())?;
        let seconds = n_samples as f64 / rate;
        let delta = TimeDelta::from_std(std::time::Duration::from_secs_f64(seconds)).ok()?;
        start.checked_add_signed(delta)
    }

    /// Whether the declared time span agrees with the sample count at the
    /// declared rate, within half a sample interval. Channels without a full
    /// start/end/rate declaration are vacuously consistent.
    pub fn span_consistent(&self, n_samples: u64) -> bool {
        let (Some(start), Some(end)) = (self.time_period_start, self.time_period_end) else {
            return true;
        };
        let Some(rate) = self.sample_rate.filter(|r| *r > 0.0 && r.is_finite()) else {
            return true;
        };
        let declared = (end - start).num_nanoseconds().unwrap_or(i64::MAX) as f64 / 1.0e9;
        let derived = n_samples as f64 / rate;
        (declared - derived).abs() <= 0.5 / rate
    }
}
