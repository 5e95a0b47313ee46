//! Ingestion of instrument recordings.
//!
//! Raw-file parsers and remote retrieval clients live outside this crate;
//! they hand over an [`InstrumentRecording`] and the core treats every source
//! uniformly from that shape. `ingest_recording` segments the record stream
//! into runs, numbers the runs consecutively after any existing numeric run
//! ids, writes one channel per component, and validates each run it created.

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::archive::MtArchive;
use crate::error::{ArchiveError, Result};
use crate::segment::{SegmentationConfig, segment_records};
use crate::types::ChannelMetadata;

/// One multiplexed sample row: a timestamp and one value per component.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedRecord {
    pub timestamp: DateTime<Utc>,
    pub values: Vec<f64>,
}

/// A recording handed over by a reader or retrieval client.
///
/// `records` is time-ordered; each row carries one value per entry in
/// `components`. `channel_metadata` aligns with `components` and is usually
/// only partially populated; missing start times and rates are stamped
/// during ingestion.
#[derive(Debug, Clone, Default)]
pub struct InstrumentRecording {
    pub components: Vec<String>,
    pub channel_metadata: Vec<ChannelMetadata>,
    pub records: Vec<TimedRecord>,
}

/// One row of a retrieval request, in network nomenclature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalRequest {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Parses one on-disk instrument file into a recording.
pub trait InstrumentReader {
    fn read(&mut self, path: &Path) -> Result<InstrumentRecording>;
}

/// Fetches recordings for a batch of request rows from a remote service.
pub trait RetrievalClient {
    fn fetch(&mut self, requests: &[RetrievalRequest]) -> Result<Vec<InstrumentRecording>>;
}

/// Write a recording into `survey`/`station`, one run per contiguous
/// segment. Returns the created run ids in order.
pub fn ingest_recording(
    archive: &mut MtArchive,
    survey: &str,
    station: &str,
    recording: &InstrumentRecording,
    config: &SegmentationConfig,
) -> Result<Vec<String>> {
    validate_recording(recording)?;

    let timestamps: Vec<DateTime<Utc>> =
        recording.records.iter().map(|r| r.timestamp).collect();
    let spans = segment_records(&timestamps, config)?;
    if spans.is_empty() {
        return Ok(Vec::new());
    }

    let mut next_number = next_run_number(&archive.run_ids(survey, station)?);
    let mut created = Vec::with_capacity(spans.len());
    for span in &spans {
        let run_id = format!("{next_number:03}");
        next_number += 1;

        let mut run_meta = crate::types::RunMetadata::new(&run_id);
        run_meta.sample_rate = Some(config.sample_rate());
        run_meta.time_period_start = Some(span.start);
        run_meta.time_period_end = Some(span.end);
        archive.add_run(survey, station, &run_id, Some(run_meta))?;

        for (column, component) in recording.components.iter().enumerate() {
            let samples: Vec<f64> = recording.records[span.records.clone()]
                .iter()
                .map(|record| record.values[column])
                .collect();
            let mut channel_meta = recording
                .channel_metadata
                .get(column)
                .cloned()
                .unwrap_or_else(|| ChannelMetadata::new(component));
            channel_meta.time_period_start = Some(span.start);
            channel_meta.sample_rate = Some(config.sample_rate());
            archive.add_channel(
                survey,
                station,
                &run_id,
                component,
                &samples,
                Some(channel_meta),
            )?;
        }
        archive.validate_run_metadata(survey, station, &run_id)?;
        debug!(
            survey,
            station,
            run = %run_id,
            records = span.len(),
            "ingested run segment"
        );
        created.push(run_id);
    }
    info!(
        survey,
        station,
        runs = created.len(),
        records = recording.records.len(),
        "ingested recording"
    );
    Ok(created)
}

fn validate_recording(recording: &InstrumentRecording) -> Result<()> {
    let mut fields = Vec::new();
    if recording.components.is_empty() {
        fields.push("components".to_string());
    }
    if recording
        .records
        .iter()
        .any(|record| record.values.len() != recording.components.len())
    {
        fields.push("records".to_string());
    }
    if fields.is_empty() {
        Ok(())
    } else {
        Err(ArchiveError::MetadataValidation { fields })
    }
}

/// The next run number after the largest numeric run id already present.
fn next_run_number(existing: &[String]) -> u32 {
    existing
        .iter()
        .filter_map(|id| id.parse::<u32>().ok())
        .max()
        .map_or(1, |max| max + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FileVersion;
    use chrono::{TimeDelta, TimeZone};

    fn scratch() -> (tempfile::TempDir, MtArchive) {
        let dir = tempfile::tempdir().unwrap();
        let mut archive =
            MtArchive::create(dir.path().join("ingest.mta"), FileVersion::V2).unwrap();
        archive.add_survey("s1", None).unwrap();
        archive.add_station("s1", "mt01", None).unwrap();
        (dir, archive)
    }

    fn recording(offsets: &[i64]) -> InstrumentRecording {
        let base = Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap();
        InstrumentRecording {
            components: vec!["ex".to_string(), "hy".to_string()],
            channel_metadata: vec![ChannelMetadata::new("ex"), ChannelMetadata::new("hy")],
            records: offsets
                .iter()
                .map(|s| TimedRecord {
                    timestamp: base + TimeDelta::seconds(*s),
                    values: vec![*s as f64, -(*s as f64)],
                })
                .collect(),
        }
    }

    fn one_hz(max_gap_intervals: f64) -> SegmentationConfig {
        SegmentationConfig::from_sample_rate(1.0, max_gap_intervals).unwrap()
    }

    #[test]
    fn contiguous_records_make_one_run() {
        let (_dir, mut archive) = scratch();
        let runs = ingest_recording(
            &mut archive,
            "s1",
            "mt01",
            &recording(&[0, 1, 2, 3, 4]),
            &one_hz(1.0),
        )
        .unwrap();
        assert_eq!(runs, vec!["001"]);
        assert_eq!(
            archive.channel_samples("s1", "mt01", "001", "ex").unwrap(),
            vec![0.0, 1.0, 2.0, 3.0, 4.0]
        );
        let meta = archive.get_run("s1", "mt01", "001").unwrap();
        assert_eq!(meta.channels_recorded_electric, vec!["ex"]);
        assert_eq!(meta.channels_recorded_magnetic, vec!["hy"]);
    }

    #[test]
    fn gap_splits_into_two_runs_at_the_gap() {
        let (_dir, mut archive) = scratch();
        let runs = ingest_recording(
            &mut archive,
            "s1",
            "mt01",
            &recording(&[0, 1, 2, 10, 11]),
            &one_hz(1.0),
        )
        .unwrap();
        assert_eq!(runs, vec!["001", "002"]);
        assert_eq!(
            archive.channel_samples("s1", "mt01", "001", "ex").unwrap(),
            vec![0.0, 1.0, 2.0]
        );
        assert_eq!(
            archive.channel_samples("s1", "mt01", "002", "ex").unwrap(),
            vec![10.0, 11.0]
        );
        let second = archive.get_run("s1", "mt01", "002").unwrap();
        assert_eq!(
            second.time_period_start,
            Some(Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 10).unwrap())
        );
    }

    #[test]
    fn numbering_continues_after_existing_runs() {
        let (_dir, mut archive) = scratch();
        archive.add_run("s1", "mt01", "007", None).unwrap();
        let runs = ingest_recording(
            &mut archive,
            "s1",
            "mt01",
            &recording(&[0, 1]),
            &one_hz(1.0),
        )
        .unwrap();
        assert_eq!(runs, vec!["008"]);
    }

    #[test]
    fn second_ingest_appends_runs() {
        let (_dir, mut archive) = scratch();
        ingest_recording(&mut archive, "s1", "mt01", &recording(&[0, 1]), &one_hz(1.0)).unwrap();
        let runs =
            ingest_recording(&mut archive, "s1", "mt01", &recording(&[100, 101]), &one_hz(1.0))
                .unwrap();
        assert_eq!(runs, vec!["002"]);
        assert_eq!(archive.run_ids("s1", "mt01").unwrap(), vec!["001", "002"]);
    }

    #[test]
    fn ragged_record_rows_rejected() {
        let (_dir, mut archive) = scratch();
        let mut bad = recording(&[0, 1]);
        bad.records[1].values.pop();
        let err = ingest_recording(&mut archive, "s1", "mt01", &bad, &one_hz(1.0)).unwrap_err();
        assert!(matches!(err, ArchiveError::MetadataValidation { .. }));
        assert!(archive.run_ids("s1", "mt01").unwrap().is_empty());
    }

    #[test]
    fn empty_recording_creates_nothing() {
        let (_dir, mut archive) = scratch();
        let empty = InstrumentRecording {
            components: vec!["ex".to_string()],
            channel_metadata: vec![ChannelMetadata::new("ex")],
            records: Vec::new(),
        };
        let runs = ingest_recording(&mut archive, "s1", "mt01", &empty, &one_hz(1.0)).unwrap();
        assert!(runs.is_empty());
    }
}
