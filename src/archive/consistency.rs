//! Metadata consistency propagation.
//!
//! Nothing here runs implicitly on mutation. Each operation recomputes one
//! level's declared metadata from the level below it, writes the result back,
//! and returns it:
//! - `validate_run_metadata` derives from the run's channels.
//! - `validate_station_metadata` derives from the runs' declared metadata.
//! - `update_survey_metadata` walks the whole subtree down to channels.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::archive::lifecycle::MtArchive;
use crate::error::{ArchiveError, Result};
use crate::store::attr_map_from;
use crate::types::{ChannelKind, GeoPoint, RunMetadata, StationMetadata, SurveyMetadata};

fn channel_path(survey: &str, station: &str, run: &str, channel: &str) -> String {
    format!("{survey}/{station}/{run}/{channel}")
}

fn fold_min(acc: Option<DateTime<Utc>>, value: DateTime<Utc>) -> Option<DateTime<Utc>> {
    Some(acc.map_or(value, |current| current.min(value)))
}

fn fold_max(acc: Option<DateTime<Utc>>, value: DateTime<Utc>) -> Option<DateTime<Utc>> {
    Some(acc.map_or(value, |current| current.max(value)))
}

impl MtArchive {
    /// Recompute a run's declared metadata from its channels.
    ///
    /// Start becomes the earliest channel start and end the latest derived
    /// channel end. The recorded-channel lists are rebuilt from the channels
    /// actually present, and a declared sample rate that disagrees with the
    /// channels' rate is reconciled to the channels' value with a warning.
    /// A run without channels is returned unchanged. Fails with
    /// [`ArchiveError::InconsistentHierarchy`] when a channel is missing its
    /// start time or sample rate.
    pub fn validate_run_metadata(
        &mut self,
        survey: &str,
        station: &str,
        run: &str,
    ) -> Result<RunMetadata> {
        self.assert_writable()?;
        let mut metadata = self.get_run(survey, station, run)?;
        let channel_ids = self.channel_ids(survey, station, run)?;
        if channel_ids.is_empty() {
            return Ok(metadata);
        }

        let mut start: Option<DateTime<Utc>> = None;
        let mut end: Option<DateTime<Utc>> = None;
        let mut channel_rate: Option<f64> = None;
        let mut electric = Vec::new();
        let mut magnetic = Vec::new();
        let mut auxiliary = Vec::new();

        for id in &channel_ids {
            let channel = self.get_channel(survey, station, run, id)?;
            let n_samples = self.channel_sample_count(survey, station, run, id)?;
            let ch_start = channel.time_period_start.ok_or_else(|| {
                ArchiveError::InconsistentHierarchy {
                    path: channel_path(survey, station, run, id),
                    reason: "channel missing start time".to_string(),
                }
            })?;
            if channel.sample_rate.is_none() {
                return Err(ArchiveError::InconsistentHierarchy {
                    path: channel_path(survey, station, run, id),
                    reason: "channel missing sample rate".to_string(),
                });
            }
            start = fold_min(start, ch_start);
            end = fold_max(end, channel.end_for(n_samples).unwrap_or(ch_start));
            if channel_rate.is_none() {
                channel_rate = channel.sample_rate;
            }
            match channel.kind {
                ChannelKind::Electric => electric.push(id.clone()),
                ChannelKind::Magnetic => magnetic.push(id.clone()),
                ChannelKind::Auxiliary => auxiliary.push(id.clone()),
            }
        }

        if let (Some(declared), Some(actual)) = (metadata.sample_rate, channel_rate) {
            if (declared - actual).abs() > f64::EPSILON {
                warn!(
                    survey,
                    station,
                    run,
                    declared,
                    actual,
                    "declared run sample rate disagrees with channels, reconciling"
                );
            }
        }
        metadata.sample_rate = channel_rate;
        metadata.time_period_start = start;
        metadata.time_period_end = end;
        metadata.channels_recorded_electric = electric;
        metadata.channels_recorded_magnetic = magnetic;
        metadata.channels_recorded_auxiliary = auxiliary;

        self.run_node_mut(survey, station, run)?.attrs = attr_map_from(&metadata)?;
        self.dirty = true;
        debug!(survey, station, run, "validated run metadata");
        Ok(metadata)
    }

    /// Recompute a station's declared time range and channel inventory from
    /// its runs' declared metadata. Does not descend into channels; run
    /// `validate_run_metadata` first for channel-accurate results.
    pub fn validate_station_metadata(
        &mut self,
        survey: &str,
        station: &str,
    ) -> Result<StationMetadata> {
        self.assert_writable()?;
        let mut metadata = self.get_station(survey, station)?;
        let run_ids = self.run_ids(survey, station)?;
        if run_ids.is_empty() {
            return Ok(metadata);
        }

        let mut start: Option<DateTime<Utc>> = None;
        let mut end: Option<DateTime<Utc>> = None;
        let mut electric = BTreeSet::new();
        let mut magnetic = BTreeSet::new();
        let mut auxiliary = BTreeSet::new();

        for id in &run_ids {
            let run = self.get_run(survey, station, id)?;
            if let Some(run_start) = run.time_period_start {
                start = fold_min(start, run_start);
            }
            if let Some(run_end) = run.time_period_end {
                end = fold_max(end, run_end);
            }
            electric.extend(run.channels_recorded_electric.iter().cloned());
            magnetic.extend(run.channels_recorded_magnetic.iter().cloned());
            auxiliary.extend(run.channels_recorded_auxiliary.iter().cloned());
        }

        metadata.time_period_start = start;
        metadata.time_period_end = end;
        metadata.channels_recorded_electric = electric.into_iter().collect();
        metadata.channels_recorded_magnetic = magnetic.into_iter().collect();
        metadata.channels_recorded_auxiliary = auxiliary.into_iter().collect();

        self.station_node_mut(survey, station)?.attrs = attr_map_from(&metadata)?;
        self.dirty = true;
        debug!(survey, station, "validated station metadata");
        Ok(metadata)
    }

    /// Recompute a survey's time range and geographic bounding box with a
    /// full walk down to channels. The only consistency operation that
    /// descends the entire subtree.
    pub fn update_survey_metadata(&mut self, survey: &str) -> Result<SurveyMetadata> {
        self.assert_writable()?;
        let mut metadata = self.get_survey(survey)?;

        let mut start: Option<DateTime<Utc>> = None;
        let mut end: Option<DateTime<Utc>> = None;
        let mut lat_min: Option<f64> = None;
        let mut lat_max: Option<f64> = None;
        let mut lon_min: Option<f64> = None;
        let mut lon_max: Option<f64> = None;

        for station_id in self.station_ids(survey)? {
            let station = self.get_station(survey, &station_id)?;
            if let Some(location) = station.location {
                lat_min = Some(lat_min.map_or(location.latitude, |v| v.min(location.latitude)));
                lat_max = Some(lat_max.map_or(location.latitude, |v| v.max(location.latitude)));
                lon_min = Some(lon_min.map_or(location.longitude, |v| v.min(location.longitude)));
                lon_max = Some(lon_max.map_or(location.longitude, |v| v.max(location.longitude)));
            }
            for run_id in self.run_ids(survey, &station_id)? {
                let run = self.get_run(survey, &station_id, &run_id)?;
                let mut saw_channel_times = false;
                for channel_id in self.channel_ids(survey, &station_id, &run_id)? {
                    let channel = self.get_channel(survey, &station_id, &run_id, &channel_id)?;
                    let Some(ch_start) = channel.time_period_start else {
                        continue;
                    };
                    let n_samples =
                        self.channel_sample_count(survey, &station_id, &run_id, &channel_id)?;
                    saw_channel_times = true;
                    start = fold_min(start, ch_start);
                    end = fold_max(end, channel.end_for(n_samples).unwrap_or(ch_start));
                }
                if !saw_channel_times {
                    if let Some(run_start) = run.time_period_start {
                        start = fold_min(start, run_start);
                    }
                    if let Some(run_end) = run.time_period_end {
                        end = fold_max(end, run_end);
                    }
                }
            }
        }

        metadata.time_period_start = start;
        metadata.time_period_end = end;
        // Northwest is the max-latitude/min-longitude extreme of the station
        // cloud, southeast the opposite pair.
        metadata.northwest_corner = match (lat_max, lon_min) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint {
                latitude,
                longitude,
            }),
            _ => None,
        };
        metadata.southeast_corner = match (lat_min, lon_max) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint {
                latitude,
                longitude,
            }),
            _ => None,
        };

        self.survey_node_mut(survey)?.attrs = attr_map_from(&metadata)?;
        self.dirty = true;
        debug!(survey, "updated survey metadata");
        Ok(metadata)
    }
}
